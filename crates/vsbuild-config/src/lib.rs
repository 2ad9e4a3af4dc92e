//! Parse and validate `vsbuild.toml`.

pub mod manifest;

pub use manifest::{DependencySpec, DevEnvSettings, Manifest, MANIFEST_FILE};
