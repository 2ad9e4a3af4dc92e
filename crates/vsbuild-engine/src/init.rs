//! Project scaffolding for `vsbuild init`.

use std::path::Path;

use vsbuild_config::{DevEnvSettings, Manifest, MANIFEST_FILE};

use crate::error::EngineError;
use crate::handler::DEFAULT_PLATFORM;

/// Write a starter `vsbuild.toml` into `dir`.
///
/// The directory is created if needed. When `solution` is given the manifest
/// gets a `[devenv]` table pointing at it and building for x64.
///
/// # Errors
/// Returns an error if:
/// - A `vsbuild.toml` already exists in `dir`
/// - The name is not a valid project name
/// - The directory or manifest cannot be written
pub fn init_project(name: &str, dir: &Path, solution: Option<&str>) -> Result<(), EngineError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        return Err(EngineError::ProjectExists {
            path: manifest_path.display().to_string(),
        });
    }

    let mut manifest = Manifest::new(name);
    manifest.devenv = solution.map(|file| DevEnvSettings {
        solution_file: Some(file.to_owned()),
        platforms: vec![DEFAULT_PLATFORM.to_owned()],
        ..DevEnvSettings::default()
    });
    let content = manifest.to_toml()?;
    // Round-trip through the parser so an invalid name is rejected before writing.
    Manifest::parse(&content, &manifest_path)?;

    vsbuild_util::fs::write_file(&manifest_path, content.as_bytes())?;
    tracing::debug!(path = %manifest_path.display(), "wrote manifest");
    Ok(())
}
