pub mod entities;
pub mod errors;
pub mod markers;
pub mod ports;

pub use entities::*;
pub use errors::{DomainError, GenerationError, Result};
