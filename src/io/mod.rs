//! File-system side of the loader: finding inputs and opening them.

pub mod compression;
pub mod glob;
