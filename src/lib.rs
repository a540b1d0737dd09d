pub mod types;
pub mod error;
pub mod config;
pub mod data;
pub mod provider;
pub mod utils;

#[cfg(test)]
mod testing;

pub use types::*;
pub use error::{DataLoaderError, Result};
