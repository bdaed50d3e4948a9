// Library exports for the diagnostic binary and integration tests

pub mod cli;
pub mod config;
