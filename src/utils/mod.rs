// Utility functions
pub mod error;
pub mod signature;

pub use error::*;
