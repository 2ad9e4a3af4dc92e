//! Error types for vsbuild-engine.

use vsbuild_devenv::Operation;

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Writing build output to the console failed.
    #[error("cannot write build output: {source}")]
    Console { source: std::io::Error },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] vsbuild_util::error::UtilError),

    /// A manifest operation failed.
    #[error("{0}")]
    Manifest(#[from] vsbuild_config::manifest::ManifestError),

    /// Visual Studio discovery or invocation failed.
    #[error("{0}")]
    DevEnv(#[from] vsbuild_devenv::DevEnvError),

    /// A configured output pattern does not compile.
    #[error("in project {project}: {source}")]
    InvalidPattern {
        project: String,
        source: vsbuild_output::PatternError,
    },

    /// A project already exists at the target path.
    #[error("vsbuild.toml already exists at {path} — cannot initialize over an existing project")]
    ProjectExists { path: String },

    /// Two workspace members share a project name.
    #[error("project name \"{name}\" is used by more than one workspace member")]
    DuplicateProject { name: String },

    /// A task was declared twice.
    #[error("task {path} is already declared")]
    DuplicateTask { path: String },

    /// A source dependency path does not exist.
    #[error("dependency \"{name}\" not found at {path}")]
    DependencyNotFound { name: String, path: String },

    /// A source dependency path is absolute or climbs too far.
    #[error("dependency \"{name}\" path escapes the workspace: {path}")]
    DependencyPathEscape { name: String, path: String },

    /// A source dependency points at a directory that is not a workspace member.
    #[error("dependency \"{name}\" at {path} is not a member of the workspace — add it to [workspace] members")]
    NotAWorkspaceMember { name: String, path: String },

    /// The build tool exited with a non-zero code.
    #[error("{tool} exited with code {code}.")]
    ToolFailed { tool: String, code: i32 },

    /// The build tool was killed before it could exit.
    #[error("{tool} was terminated by a signal")]
    ToolTerminated { tool: String },

    /// A task was configured for the other operation.
    #[error("task {task} is not a {expected} task")]
    WrongOperation { task: String, expected: Operation },

    /// A requested task does not exist.
    #[error("task \"{name}\" not found — run `vsbuild tasks` to list them")]
    UnknownTask { name: String },

    /// Task dependencies form a cycle.
    #[error("task dependency cycle: {cycle}")]
    DependencyCycle { cycle: String },
}
