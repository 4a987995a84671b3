//! Reusable building blocks: alignment engine, sequence I/O and utilities.

pub mod alignment;
pub mod io;
pub mod utils;
