//! Scaler Inspector
//!
//! Loads the persisted feature scaler and prints its per-feature mean and
//! scale vectors.

use artifact_inspector::{config::InspectorConfig, inspect_scaler, logging, render};
use tracing::debug;

fn main() {
    let config = InspectorConfig::default();
    logging::init(&config.logging);

    let path = &config.artifacts.scaler_path;
    let result = inspect_scaler(path);
    if let Err(e) = &result {
        debug!(path = %path.display(), error = %e, "Scaler inspection failed");
    }

    println!("{}", render(&result));
}
