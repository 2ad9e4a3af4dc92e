#![forbid(unsafe_code)]
//! Filesystem and process helpers for vsbuild.

pub mod error;
pub mod fs;
pub mod process;
