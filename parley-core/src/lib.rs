//! Parley core types and error definitions.

pub mod error;
pub mod token_config;
pub mod types;

pub use error::{ParleyError, Result};
pub use token_config::token_literal;
pub use types::*;
