//! Error types for vsbuild-devenv.

use std::path::PathBuf;

/// Errors produced by Visual Studio discovery and invocation.
#[derive(Debug, thiserror::Error)]
pub enum DevEnvError {
    /// No version was configured locally or in the workspace root.
    #[error("you must set the devenv version, for example `version = \"VS120\"` for the Visual Studio 2013 compiler or `\"VS100\"` for Visual Studio 2010, in the [devenv] table of vsbuild.toml — it selects the environment variable to read, e.g. VS120COMNTOOLS")]
    MissingVersion,

    /// The configured version string is not understood.
    #[error("cannot parse devenv version \"{version}\" — use \"VSnnn\" (e.g. \"VS120\") or \"nn.n\" / \"nn.+\" (e.g. \"15.0\")")]
    InvalidVersion { version: String },

    /// The accelerator path was configured but does not exist.
    #[error("the incredibuild path was set to \"{}\" but nothing exists at that location", path.display())]
    AcceleratorNotFound { path: PathBuf },

    /// The version's environment variable is unset and vswhere is unavailable.
    #[error("environment variable {var} is not set, and cannot find \"vswhere.exe\" to locate \"devenv.com\" (should be in {looked_in})")]
    EnvVarNotSet { var: String, looked_in: String },

    /// The environment variable points at a directory that does not exist.
    #[error("environment variable {var} is set, but its target ({}) does not exist, and cannot find \"vswhere.exe\" to locate \"devenv.com\" (should be in {looked_in})", target.display())]
    EnvVarTargetMissing {
        var: String,
        target: PathBuf,
        looked_in: String,
    },

    /// vswhere ran but reported no matching installation.
    #[error("vswhere.exe could not find a Visual Studio version in range {range}")]
    VswhereNoMatch { range: String },

    /// The common tools directory was found but devenv.com is not where expected.
    #[error("devenv could not be found at \"{}\"", path.display())]
    DevEnvNotFound { path: PathBuf },

    /// No solution file was given to the command builder.
    #[error("no solution file specified — set `solution_file` in the [devenv] table")]
    NoSolutionFile,

    /// No build tool path was given to the command builder.
    #[error("no build tool specified")]
    NoTool,

    /// The build tool could not be started or its output could not be forwarded.
    #[error("cannot run {}: {source}", tool.display())]
    Exec {
        tool: PathBuf,
        source: vsbuild_util::error::UtilError,
    },

    /// An error propagated from vsbuild-util.
    #[error("{0}")]
    Util(#[from] vsbuild_util::error::UtilError),
}
