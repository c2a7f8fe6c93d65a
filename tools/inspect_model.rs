//! Model Inspector
//!
//! Loads the persisted ensemble model and prints its runtime type.

use artifact_inspector::{config::InspectorConfig, inspect_model, logging, render};
use tracing::debug;

fn main() {
    let config = InspectorConfig::default();
    logging::init(&config.logging);

    let path = &config.artifacts.model_path;
    let result = inspect_model(path);
    if let Err(e) = &result {
        debug!(path = %path.display(), error = %e, "Model inspection failed");
    }

    println!("{}", render(&result));
}
