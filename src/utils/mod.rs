//! The `utils` module holds the pieces shared by every other module: the
//! error types and logging setup.

pub mod error;
pub mod logging;
