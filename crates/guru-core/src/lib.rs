pub mod config;
pub mod error;
pub mod types;

pub use config::GuruConfig;
pub use error::{GuruError, Result};
pub use types::*;
