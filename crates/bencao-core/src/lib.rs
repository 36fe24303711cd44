//! Bencao Core: shared errors and path helpers.
//!
//! This crate has no internal Bencao dependencies; every other crate in the
//! workspace builds on its [`Error`] and [`Result`] types.
//!
//! # Modules
//!
//! - [`error`]: Error type and Result alias
//! - [`util`]: Path helpers

pub mod error;
pub mod util;

pub use error::{Error, Result};
pub use util::paths::expand_tilde;
