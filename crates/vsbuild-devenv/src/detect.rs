//! Locating the build tool: an Incredibuild override, or `devenv.com` found
//! through the `VSnnnCOMNTOOLS` variable or `vswhere.exe`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use crate::error::DevEnvError;
use crate::version::VsVersion;

/// Environment variables searched, in order, for a `vswhere.exe` install.
const PROGRAM_FILES_VARS: &[&str] = &["ProgramFiles", "ProgramFiles(x86)"];

/// Read an environment variable from the current process.
pub fn system_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolves build tool paths, remembering devenv locations per Visual Studio
/// version so discovery runs once per workspace rather than once per project.
#[derive(Debug, Default)]
pub struct ToolLocator {
    cache: Mutex<HashMap<String, PathBuf>>,
}

impl ToolLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the tool that should run a build or clean.
    ///
    /// When `allow_accelerator` is set and an accelerator path is configured,
    /// that path is verified and returned. Otherwise devenv is located for
    /// `version`.
    ///
    /// # Errors
    /// Returns an error if the accelerator path does not exist, no version is
    /// configured, or devenv cannot be located (see [`Self::devenv_path_with`]).
    pub fn resolve_tool_path(
        &self,
        version: Option<&VsVersion>,
        accelerator: Option<&str>,
        allow_accelerator: bool,
    ) -> Result<PathBuf, DevEnvError> {
        self.resolve_tool_path_with(version, accelerator, allow_accelerator, &system_env)
    }

    /// [`Self::resolve_tool_path`] with an explicit environment lookup.
    ///
    /// # Errors
    /// See [`Self::resolve_tool_path`].
    pub fn resolve_tool_path_with(
        &self,
        version: Option<&VsVersion>,
        accelerator: Option<&str>,
        allow_accelerator: bool,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<PathBuf, DevEnvError> {
        if allow_accelerator {
            if let Some(path) = accelerator {
                return verify_accelerator(path);
            }
        }
        let version = version.ok_or(DevEnvError::MissingVersion)?;
        self.devenv_path_with(version, env)
    }

    /// Locate `devenv.com` for `version`.
    ///
    /// Resolution order:
    /// 1. Cached result from an earlier call for the same version
    /// 2. `$VSnnnCOMNTOOLS`, if set and existing
    /// 3. `vswhere.exe` under `%ProgramFiles%` or `%ProgramFiles(x86)%`
    ///
    /// devenv is expected at `<common tools>/../IDE/devenv.com`.
    ///
    /// # Errors
    /// Returns an error naming the environment variable if neither source
    /// yields a common tools directory, or if devenv is not at the expected place.
    pub fn devenv_path_with(
        &self,
        version: &VsVersion,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<PathBuf, DevEnvError> {
        let key = version.cache_key();
        if let Some(cached) = self.cache().get(&key) {
            tracing::debug!(version = %version, path = %cached.display(), "using cached devenv location");
            return Ok(cached.clone());
        }

        let common_tools = common_tools_path(version, env)?;
        let devenv = common_tools.join("..").join("IDE").join("devenv.com");
        if !devenv.exists() {
            return Err(DevEnvError::DevEnvNotFound { path: devenv });
        }
        tracing::debug!(version = %version, path = %devenv.display(), "located devenv");

        self.cache().insert(key, devenv.clone());
        Ok(devenv)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, PathBuf>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Check that a configured accelerator executable exists.
///
/// # Errors
/// Returns [`DevEnvError::AcceleratorNotFound`] if nothing exists at `path`.
pub fn verify_accelerator(path: &str) -> Result<PathBuf, DevEnvError> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(DevEnvError::AcceleratorNotFound { path });
    }
    tracing::debug!(path = %path.display(), "using incredibuild");
    Ok(path)
}

fn common_tools_path(
    version: &VsVersion,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<PathBuf, DevEnvError> {
    let var = version.env_var_name();
    let from_env = env(&var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    if let Some(path) = &from_env {
        if path.exists() {
            tracing::debug!(%var, path = %path.display(), "common tools from environment");
            return Ok(path.clone());
        }
    }

    let candidates = vswhere_candidates(env);
    if let Some(vswhere) = candidates.iter().find(|c| c.exists()) {
        return common_tools_from_vswhere(vswhere, version);
    }

    let looked_in = format!(
        "[{}]",
        candidates
            .iter()
            .map(|c| c.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Err(match from_env {
        None => DevEnvError::EnvVarNotSet { var, looked_in },
        Some(target) => DevEnvError::EnvVarTargetMissing {
            var,
            target,
            looked_in,
        },
    })
}

fn vswhere_candidates(env: &dyn Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    PROGRAM_FILES_VARS
        .iter()
        .filter_map(|var| env(var))
        .map(|dir| {
            PathBuf::from(dir)
                .join("Microsoft Visual Studio")
                .join("Installer")
                .join("vswhere.exe")
        })
        .collect()
}

fn common_tools_from_vswhere(vswhere: &Path, version: &VsVersion) -> Result<PathBuf, DevEnvError> {
    let range = version.vswhere_range();
    tracing::debug!(vswhere = %vswhere.display(), %range, "querying vswhere");
    let output = vsbuild_util::process::run_command(
        Command::new(vswhere)
            .arg("-property")
            .arg("installationPath")
            .arg("-legacy")
            .arg("-format")
            .arg("value")
            .arg("-version")
            .arg(&range),
    )?;

    let install_path = output.stdout.lines().next().unwrap_or_default().trim();
    if !output.success || install_path.is_empty() {
        return Err(DevEnvError::VswhereNoMatch { range });
    }
    Ok(PathBuf::from(install_path).join("Common7").join("Tools"))
}
