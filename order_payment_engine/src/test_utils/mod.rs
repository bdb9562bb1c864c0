//! Helpers for tests that need a real database, a fake gateway or some catalog data. Enabled by the `test_utils`
//! feature.
pub mod fixtures;
pub mod mock_gateway;
pub mod prepare_env;
