// Gateway file to expose integration tests from the integration/ subdirectory
// This file allows Rust's test runner to discover tests in subdirectories

mod common;

#[path = "integration/test_ivf_properties.rs"]
mod test_ivf_properties;

#[path = "integration/test_dataset_pipeline.rs"]
mod test_dataset_pipeline;
