//! Build and clean task descriptors.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vsbuild_devenv::{DevEnvCommand, DevEnvError, Operation};
use vsbuild_output::RegexRuleSet;

use crate::error::EngineError;
use crate::handler::{DevEnvHandler, ToolResolver};

/// Platform segment of the umbrella task that covers every platform.
pub const EVERY_PLATFORM: &str = "";

/// Group every devenv task is listed under.
pub const TASK_GROUP: &str = "DevEnv";

/// Configurations each project gets build and clean tasks for.
pub const CONFIGURATIONS: &[&str] = &["Debug", "Release"];

pub const OPERATIONS: &[Operation] = &[Operation::Build, Operation::Clean];

/// Upper-case the first character: `x64` becomes `X64`.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name of the task for `operation` on `platform` in `configuration`, e.g.
/// `buildX64Release`, or `buildRelease` for [`EVERY_PLATFORM`].
pub fn task_name(operation: Operation, platform: &str, configuration: &str) -> String {
    format!("{operation}{}{configuration}", capitalize(platform))
}

/// Name of the hook task every `operation` task depends on.
pub fn hook_name(operation: Operation) -> String {
    format!("before{}", capitalize(operation.as_str()))
}

/// Address of a task: `:<project>:<task>`.
pub fn task_path(project: &str, name: &str) -> String {
    format!(":{project}:{name}")
}

/// One (operation, platform, configuration) target of a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildConfiguration {
    pub operation: Operation,
    pub platform: String,
    pub configuration: String,
}

impl BuildConfiguration {
    pub fn new(operation: Operation, platform: &str, configuration: &str) -> Self {
        Self {
            operation,
            platform: platform.to_owned(),
            configuration: configuration.to_owned(),
        }
    }

    pub fn task_name(&self) -> String {
        task_name(self.operation, &self.platform, &self.configuration)
    }

    pub fn is_every_platform(&self) -> bool {
        self.platform == EVERY_PLATFORM
    }
}

/// Deferred lookup of the build tool, run when the task executes.
pub type ToolThunk = Arc<dyn Fn() -> Result<PathBuf, DevEnvError> + Send + Sync>;

/// What a configured devenv task runs.
#[derive(Clone)]
pub struct DevEnvAction {
    platform: String,
    solution: PathBuf,
    use_accelerator: bool,
    title: String,
    rules: Arc<RegexRuleSet>,
    resolve_tool: ToolThunk,
}

impl DevEnvAction {
    /// The platform passed to the tool; for an umbrella task configured
    /// directly this is the project's only platform.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn solution(&self) -> &Path {
        &self.solution
    }

    pub fn use_accelerator(&self) -> bool {
        self.use_accelerator
    }

    /// Heading of the summary banners, e.g. `app (x64 Release)`.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn rules(&self) -> &Arc<RegexRuleSet> {
        &self.rules
    }

    /// Locate the build tool.
    ///
    /// # Errors
    /// Returns an error if the tool cannot be resolved.
    pub fn resolve_tool(&self) -> Result<PathBuf, DevEnvError> {
        (self.resolve_tool)()
    }
}

impl fmt::Debug for DevEnvAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevEnvAction")
            .field("platform", &self.platform)
            .field("solution", &self.solution)
            .field("use_accelerator", &self.use_accelerator)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// A build or clean of one configuration, optionally bound to one platform.
///
/// Created with its operation and configuration fixed; configuring it with a
/// platform attaches a [`DevEnvAction`]. A task left unconfigured (no solution
/// file anywhere in its project's fallback chain) runs nothing.
#[derive(Debug, Clone)]
pub struct DevEnvTask {
    target: BuildConfiguration,
    description: String,
    action: Option<DevEnvAction>,
}

impl DevEnvTask {
    /// An unconfigured task for `platform` (use [`EVERY_PLATFORM`] for the umbrella).
    pub fn new(operation: Operation, platform: &str, configuration: &str) -> Self {
        let verb = match operation {
            Operation::Build => "Builds",
            Operation::Clean => "Cleans",
        };
        Self {
            target: BuildConfiguration::new(operation, platform, configuration),
            description: format!("{verb} all dependent projects in {configuration} mode."),
            action: None,
        }
    }

    pub fn name(&self) -> String {
        self.target.task_name()
    }

    pub fn target(&self) -> &BuildConfiguration {
        &self.target
    }

    pub fn operation(&self) -> Operation {
        self.target.operation
    }

    pub fn configuration(&self) -> &str {
        &self.target.configuration
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn action(&self) -> Option<&DevEnvAction> {
        self.action.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.action.is_some()
    }

    /// Configure this build task to run `handler`'s solution for `platform`.
    ///
    /// Returns whether the task was configured; it is left alone if no
    /// solution file is set.
    ///
    /// # Errors
    /// Returns [`EngineError::WrongOperation`] if this is a clean task.
    pub fn configure_build_task(
        &mut self,
        handler: &Arc<DevEnvHandler>,
        resolver: &ToolResolver,
        platform: &str,
    ) -> Result<bool, EngineError> {
        self.expect_operation(Operation::Build)?;
        Ok(self.configure(handler, resolver, platform))
    }

    /// Configure this clean task to run `handler`'s solution for `platform`.
    ///
    /// # Errors
    /// Returns [`EngineError::WrongOperation`] if this is a build task.
    pub fn configure_clean_task(
        &mut self,
        handler: &Arc<DevEnvHandler>,
        resolver: &ToolResolver,
        platform: &str,
    ) -> Result<bool, EngineError> {
        self.expect_operation(Operation::Clean)?;
        Ok(self.configure(handler, resolver, platform))
    }

    fn expect_operation(&self, expected: Operation) -> Result<(), EngineError> {
        if self.operation() == expected {
            Ok(())
        } else {
            Err(EngineError::WrongOperation {
                task: self.name(),
                expected,
            })
        }
    }

    fn configure(
        &mut self,
        handler: &Arc<DevEnvHandler>,
        resolver: &ToolResolver,
        platform: &str,
    ) -> bool {
        let Some(solution) = handler.solution_file() else {
            return false;
        };
        let operation = self.operation();
        let allow_accelerator = operation == Operation::Build;
        let use_accelerator = allow_accelerator && handler.incredibuild().is_some();
        let configuration = self.configuration().to_owned();

        let (verb, mode_verb) = match operation {
            Operation::Build => ("Builds", "building"),
            Operation::Clean => ("Cleans", "cleaning"),
        };
        let tool_name = if use_accelerator { "Incredibuild" } else { "DevEnv" };
        let file_name = solution
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.description = format!(
            "{verb} the solution '{file_name}' with {tool_name} in {configuration} mode, \
             first {mode_verb} all dependent projects. \
             Run with --no-project-deps to {operation} for this project only."
        );

        let thunk_handler = Arc::clone(handler);
        let thunk_resolver = resolver.clone();
        self.action = Some(DevEnvAction {
            platform: platform.to_owned(),
            solution,
            use_accelerator,
            title: format!("{} ({platform} {configuration})", handler.project()),
            rules: Arc::clone(handler.rules()),
            resolve_tool: Arc::new(move || {
                thunk_resolver.resolve(&thunk_handler, allow_accelerator)
            }),
        });
        tracing::debug!(
            project = handler.project(),
            task = %self.name(),
            platform,
            "configured devenv task"
        );
        true
    }

    /// Where the full output of a run is written:
    /// `<solution dir>/<operation>_<configuration>_<platform>.txt`.
    pub fn log_file(&self) -> Option<PathBuf> {
        let action = self.action.as_ref()?;
        let dir = action.solution.parent().unwrap_or_else(|| Path::new(""));
        Some(dir.join(format!(
            "{}_{}_{}.txt",
            self.operation(),
            self.configuration(),
            action.platform
        )))
    }

    /// Build the command line, resolving the tool now.
    ///
    /// Returns `None` for an unconfigured task.
    ///
    /// # Errors
    /// Returns an error if the build tool cannot be resolved.
    pub fn build_command(&self) -> Result<Option<DevEnvCommand>, DevEnvError> {
        let Some(action) = &self.action else {
            return Ok(None);
        };
        let tool = action.resolve_tool()?;
        let mut command =
            DevEnvCommand::new(self.operation(), self.configuration(), &action.platform)
                .tool(&tool)
                .solution(&action.solution)
                .accelerator(action.use_accelerator);
        if let Some(dir) = action.solution.parent().filter(|d| !d.as_os_str().is_empty()) {
            command = command.working_dir(dir);
        }
        Ok(Some(command))
    }
}
