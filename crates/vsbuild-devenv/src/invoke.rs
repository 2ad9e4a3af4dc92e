//! devenv / Incredibuild command lines.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use vsbuild_util::process::{run_streaming, OutputStream};

use crate::error::DevEnvError;

/// What a devenv invocation does to a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Build,
    Clean,
}

impl Operation {
    /// Task-name spelling, e.g. `build` in `buildX64Debug`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Clean => "clean",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for a single devenv or Incredibuild invocation.
#[derive(Debug, Clone)]
pub struct DevEnvCommand {
    tool: Option<PathBuf>,
    solution: Option<PathBuf>,
    operation: Operation,
    configuration: String,
    platform: String,
    accelerator: bool,
    working_dir: Option<PathBuf>,
}

impl DevEnvCommand {
    pub fn new(operation: Operation, configuration: &str, platform: &str) -> Self {
        Self {
            tool: None,
            solution: None,
            operation,
            configuration: configuration.to_owned(),
            platform: platform.to_owned(),
            accelerator: false,
            working_dir: None,
        }
    }

    /// Path of the executable to run (devenv.com or BuildConsole).
    pub fn tool(mut self, path: &Path) -> Self {
        self.tool = Some(path.to_path_buf());
        self
    }

    pub fn solution(mut self, path: &Path) -> Self {
        self.solution = Some(path.to_path_buf());
        self
    }

    /// Use Incredibuild switch syntax. Has no effect on a clean.
    pub fn accelerator(mut self, enabled: bool) -> Self {
        self.accelerator = enabled;
        self
    }

    pub fn working_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn tool_path(&self) -> Option<&Path> {
        self.tool.as_deref()
    }

    fn uses_accelerator(&self) -> bool {
        self.accelerator && self.operation == Operation::Build
    }

    /// Short name used in log lines.
    pub fn tool_name(&self) -> &'static str {
        if self.uses_accelerator() {
            "Incredibuild"
        } else {
            "DevEnv"
        }
    }

    fn target_switch(&self) -> &'static str {
        match self.operation {
            Operation::Build if self.accelerator => "/Build",
            Operation::Build => "/build",
            Operation::Clean => "/Clean",
        }
    }

    fn config_switch(&self) -> String {
        let (configuration, platform) = (&self.configuration, &self.platform);
        if self.uses_accelerator() {
            format!("/cfg=\"{configuration}|{platform}\"")
        } else {
            // `^|` escapes the pipe for cmd.exe, which devenv.com expects.
            format!("{configuration}^|{platform}")
        }
    }

    /// Build the argument list without executing: solution, target switch,
    /// then the configuration/platform switch.
    ///
    /// # Errors
    /// Returns an error if no solution file is set.
    pub fn build_args(&self) -> Result<Vec<String>, DevEnvError> {
        let Some(solution) = &self.solution else {
            return Err(DevEnvError::NoSolutionFile);
        };
        Ok(vec![
            solution.display().to_string(),
            self.target_switch().to_owned(),
            self.config_switch(),
        ])
    }

    /// The full command line as it would be logged.
    ///
    /// # Errors
    /// Returns an error if the tool or solution file is not set.
    pub fn command_line(&self) -> Result<String, DevEnvError> {
        let tool = self.tool.as_ref().ok_or(DevEnvError::NoTool)?;
        let mut parts = vec![tool.display().to_string()];
        parts.extend(self.build_args()?);
        Ok(parts.join(" "))
    }

    /// Run the tool, passing each chunk of stdout and stderr to `on_output`
    /// as it arrives.
    ///
    /// Returns the exit code, or `None` if the tool was killed by a signal.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The tool or solution file is not set
    /// - The tool cannot be started
    /// - `on_output` fails
    pub fn execute<F>(&self, on_output: F) -> Result<Option<i32>, DevEnvError>
    where
        F: Fn(OutputStream, &[u8]) -> std::io::Result<()> + Sync,
    {
        let tool = self.tool.as_ref().ok_or(DevEnvError::NoTool)?;
        let args = self.build_args()?;

        let mut cmd = Command::new(tool);
        cmd.args(&args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        tracing::info!(tool = self.tool_name(), "running {}", self.command_line()?);

        run_streaming(&mut cmd, on_output).map_err(|source| DevEnvError::Exec {
            tool: tool.clone(),
            source,
        })
    }
}
