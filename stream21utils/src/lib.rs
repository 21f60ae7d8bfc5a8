//!
//! # Stream21 Internal Utilities Crate
//!
//! Shared helpers for the Stream21 workspace:
//! * [ser] for saving and loading serde-compatible data in text formats
//! * [error] for building contextual errors while walking record streams and trees
//!

pub mod ser;
pub use ser::*;

pub mod error;
pub use error::*;

#[cfg(test)]
mod tests;
