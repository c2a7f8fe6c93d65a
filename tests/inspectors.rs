//! End-to-end checks of both inspections over real artifact files

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use artifact_inspector::pickle::Value;
use artifact_inspector::{inspect_model, inspect_scaler, render, ArtifactLoader};

/// A fitted-looking `StandardScaler` pickle (protocol 2) holding
/// `mean_ = [0.1, 0.2]` and `with_std = False` but no `scale_`
const SCALER_WITHOUT_SCALE: &[u8] = b"\x80\x02csklearn.preprocessing._data\nStandardScaler\nq\x00)\x81q\x01}q\x02(X\x05\x00\x00\x00mean_q\x03]q\x04(G\x3f\xb9\x99\x99\x99\x99\x99\x9aG\x3f\xc9\x99\x99\x99\x99\x99\x9aeX\x08\x00\x00\x00with_stdq\x05\x89ub.";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A scratch working directory laid out like the feature-extraction project
fn project_dir(model: Option<&str>, scaler: Option<&str>) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("vcf_feature_extractor").join("models");
    fs::create_dir_all(&models).unwrap();
    if let Some(name) = model {
        fs::copy(fixture(name), models.join("ensemble_model.pkl")).unwrap();
    }
    if let Some(name) = scaler {
        fs::copy(fixture(name), models.join("ensemble_scaler.pkl")).unwrap();
    }
    dir
}

struct Run {
    stdout: String,
    stderr: String,
    ok: bool,
}

fn run(binary: &str, cwd: &Path) -> Run {
    let output = Command::new(binary)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    Run {
        stdout: String::from_utf8(output.stdout).unwrap(),
        stderr: String::from_utf8(output.stderr).unwrap(),
        ok: output.status.success(),
    }
}

#[test]
fn test_scaler_report() {
    let report = render(&inspect_scaler(fixture("standard_scaler.pkl")));
    assert_eq!(report, "Scaler Mean: [0.1, 0.2]\nScaler Scale: [1.0, 2.0]");
}

#[test]
fn test_scaler_report_from_plain_pickle() {
    let report = render(&inspect_scaler(fixture("scaler_protocol2.pkl")));
    assert_eq!(
        report,
        "Scaler Mean: [3.5, -1.25, 1e-05]\nScaler Scale: [2.0, 0.5, 1e+16]"
    );
}

#[test]
fn test_scaler_without_mean_prints_only_error() {
    let report = render(&inspect_scaler(fixture("scaler_without_mean.pkl")));
    assert_eq!(
        report,
        "Error: 'StandardScaler' object has no attribute 'mean_'"
    );
}

#[test]
fn test_model_report() {
    let report = render(&inspect_model(fixture("ensemble_model.pkl")));
    assert_eq!(
        report,
        "Model Type: <class 'sklearn.ensemble._voting.VotingClassifier'>"
    );
}

#[test]
fn test_model_contents_decoded() {
    let value = ArtifactLoader::new()
        .load_value(fixture("ensemble_model.pkl"))
        .unwrap();
    let Value::Object(model) = value else {
        panic!("expected an object");
    };

    match model.attr("classes_") {
        Some(Value::Array(classes)) => assert_eq!(
            classes.elements(),
            vec![
                Value::Str("benign".to_string()),
                Value::Str("pathogenic".to_string())
            ]
        ),
        other => panic!("unexpected classes_ {other:?}"),
    }

    // The forest is stored once and referenced again from estimators_.
    let Some(Value::List(estimators)) = model.attr("estimators_") else {
        panic!("estimators_ should be a list");
    };
    assert_eq!(estimators.len(), 2);
    assert_eq!(
        estimators[0].type_name(),
        "sklearn.ensemble._forest.RandomForestClassifier"
    );
    assert_eq!(
        estimators[1].type_name(),
        "sklearn.linear_model._logistic.LogisticRegression"
    );
}

#[test]
fn test_scaler_is_idempotent() {
    let first = render(&inspect_scaler(fixture("standard_scaler.pkl")));
    let second = render(&inspect_scaler(fixture("standard_scaler.pkl")));
    assert_eq!(first, second);
}

#[test]
fn test_missing_artifacts() {
    let dir = project_dir(None, None);
    let report = render(&inspect_model(dir.path().join("ensemble_model.pkl")));
    assert!(report.starts_with("Error: failed to read "));
    assert_eq!(report.lines().count(), 1);

    let report = render(&inspect_scaler(dir.path().join("ensemble_scaler.pkl")));
    assert!(report.starts_with("Error: "));
    assert_eq!(report.lines().count(), 1);
}

#[test]
fn test_corrupt_and_compressed_artifacts() {
    let dir = tempfile::tempdir().unwrap();

    let truncated = dir.path().join("truncated.pkl");
    let bytes = fs::read(fixture("standard_scaler.pkl")).unwrap();
    fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();
    let report = render(&inspect_scaler(&truncated));
    assert!(report.starts_with("Error: failed to deserialize "));
    assert!(report.ends_with("pickle data was truncated"));

    let empty = dir.path().join("empty.pkl");
    fs::write(&empty, b"").unwrap();
    let report = render(&inspect_model(&empty));
    assert!(report.ends_with("ran out of input"));

    let gzipped = dir.path().join("model.pkl.gz");
    fs::write(&gzipped, b"\x1f\x8b\x08\x00\x00\x00\x00\x00").unwrap();
    assert_eq!(
        render(&inspect_model(&gzipped)),
        "Error: compressed joblib artifacts (gzip) are not supported"
    );
}

#[test]
fn test_binaries_use_fixed_paths() {
    let dir = project_dir(Some("ensemble_model.pkl"), Some("standard_scaler.pkl"));

    let model = run(env!("CARGO_BIN_EXE_inspect_model"), dir.path());
    assert!(model.ok);
    assert_eq!(
        model.stdout,
        "Model Type: <class 'sklearn.ensemble._voting.VotingClassifier'>\n"
    );

    let scaler = run(env!("CARGO_BIN_EXE_inspect_scaler"), dir.path());
    assert!(scaler.ok);
    assert_eq!(
        scaler.stdout,
        "Scaler Mean: [0.1, 0.2]\nScaler Scale: [1.0, 2.0]\n"
    );
}

#[test]
fn test_binaries_exit_zero_on_failure() {
    let dir = project_dir(None, Some("scaler_without_mean.pkl"));

    let model = run(env!("CARGO_BIN_EXE_inspect_model"), dir.path());
    assert!(model.ok);
    assert!(model.stdout.starts_with("Error: "));
    assert_eq!(model.stdout.lines().count(), 1);
    assert_eq!(model.stderr, "");

    let scaler = run(env!("CARGO_BIN_EXE_inspect_scaler"), dir.path());
    assert!(scaler.ok);
    assert_eq!(
        scaler.stdout,
        "Error: 'StandardScaler' object has no attribute 'mean_'\n"
    );
    assert_eq!(scaler.stderr, "");
}

#[test]
fn test_binary_missing_scale_prints_no_partial_report() {
    let dir = project_dir(None, None);
    fs::write(
        dir.path()
            .join("vcf_feature_extractor")
            .join("models")
            .join("ensemble_scaler.pkl"),
        SCALER_WITHOUT_SCALE,
    )
    .unwrap();

    let scaler = run(env!("CARGO_BIN_EXE_inspect_scaler"), dir.path());
    assert!(scaler.ok);
    assert_eq!(
        scaler.stdout,
        "Error: 'StandardScaler' object has no attribute 'scale_'\n"
    );
    assert!(!scaler.stdout.contains("Scaler Mean:"));
    assert_eq!(scaler.stderr, "");
}
