pub mod error;

pub use error::{NashError, Result};
