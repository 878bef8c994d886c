//! load-testplan library
//!
//! Loads templated YAML/JSON test plans, deep-merges them in order and
//! publishes the flattened result as step outputs, environment variables,
//! console lines, mirror files and a reusable job stub.

pub mod cli;
pub mod config;
pub mod emit;
pub mod error;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod sanitize;
pub mod source;
pub mod template;
pub mod value;

pub use error::{Error, Result};
