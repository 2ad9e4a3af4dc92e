//! Per-project devenv configuration with field-by-field fallback to the
//! workspace root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vsbuild_config::DevEnvSettings;
use vsbuild_devenv::{DevEnvError, ToolLocator, VsVersion};
use vsbuild_output::RegexRuleSet;

use crate::error::EngineError;

/// Platform used when neither the project nor the workspace root lists any.
pub const DEFAULT_PLATFORM: &str = "x64";

/// The `[devenv]` settings of one project.
///
/// Every accessor returns the local value if set, otherwise the parent's,
/// otherwise a default.
#[derive(Debug)]
pub struct DevEnvHandler {
    project: String,
    project_dir: PathBuf,
    settings: DevEnvSettings,
    rules: Arc<RegexRuleSet>,
    parent: Option<Arc<DevEnvHandler>>,
}

impl DevEnvHandler {
    /// Create a handler for `project`, whose manifest lives in `project_dir`.
    ///
    /// A project that configures no extra output patterns shares its parent's
    /// rule set; otherwise its rule set is the built-in defaults plus its own.
    ///
    /// # Errors
    /// Returns an error if a configured output pattern does not compile.
    pub fn new(
        project: &str,
        project_dir: &Path,
        settings: DevEnvSettings,
        parent: Option<Arc<DevEnvHandler>>,
    ) -> Result<Self, EngineError> {
        let has_own_patterns =
            !settings.error_regexes.is_empty() || !settings.warning_regexes.is_empty();
        let rules = match &parent {
            Some(parent) if !has_own_patterns => Arc::clone(&parent.rules),
            _ => Arc::new(compile_rules(project, &settings)?),
        };
        Ok(Self {
            project: project.to_owned(),
            project_dir: project_dir.to_path_buf(),
            settings,
            rules,
            parent,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn parent(&self) -> Option<&Arc<DevEnvHandler>> {
        self.parent.as_ref()
    }

    /// The configured Visual Studio version string.
    pub fn version_string(&self) -> Option<&str> {
        self.settings
            .version
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.version_string()))
    }

    /// The configured Visual Studio version, parsed.
    ///
    /// # Errors
    /// Returns an error if the configured string is not a valid version.
    pub fn version(&self) -> Result<Option<VsVersion>, DevEnvError> {
        self.version_string().map(VsVersion::parse).transpose()
    }

    /// The solution file, resolved against the directory of the project that
    /// declares it.
    pub fn solution_file(&self) -> Option<PathBuf> {
        match &self.settings.solution_file {
            Some(file) => Some(self.project_dir.join(file)),
            None => self.parent.as_ref().and_then(|p| p.solution_file()),
        }
    }

    /// The platforms to build; never empty.
    pub fn platforms(&self) -> Vec<String> {
        if !self.settings.platforms.is_empty() {
            return self.settings.platforms.clone();
        }
        match &self.parent {
            Some(parent) => parent.platforms(),
            None => vec![DEFAULT_PLATFORM.to_owned()],
        }
    }

    /// Path to the Incredibuild console, if one is configured.
    pub fn incredibuild(&self) -> Option<&str> {
        self.settings
            .incredibuild
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.incredibuild()))
    }

    pub fn rules(&self) -> &Arc<RegexRuleSet> {
        &self.rules
    }
}

fn compile_rules(project: &str, settings: &DevEnvSettings) -> Result<RegexRuleSet, EngineError> {
    let invalid = |source| EngineError::InvalidPattern {
        project: project.to_owned(),
        source,
    };
    let mut rules = RegexRuleSet::with_defaults();
    for pattern in &settings.error_regexes {
        rules.add_error_pattern(pattern).map_err(invalid)?;
    }
    for pattern in &settings.warning_regexes {
        rules.add_warning_pattern(pattern).map_err(invalid)?;
    }
    Ok(rules)
}

/// Environment variable lookup, swappable so resolution can be tested
/// without touching the process environment.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves build tool paths for handlers, sharing one [`ToolLocator`] cache
/// across the whole workspace.
#[derive(Clone)]
pub struct ToolResolver {
    locator: Arc<ToolLocator>,
    env: EnvLookup,
}

impl ToolResolver {
    /// A resolver reading the process environment.
    pub fn system() -> Self {
        Self::with_env(Arc::new(vsbuild_devenv::system_env))
    }

    pub fn with_env(env: EnvLookup) -> Self {
        Self {
            locator: Arc::new(ToolLocator::new()),
            env,
        }
    }

    /// Resolve the tool that runs `handler`'s solution. Incredibuild is used
    /// only when `allow_accelerator` is set and a path is configured.
    ///
    /// # Errors
    /// Returns an error if the version is missing or invalid, or the tool
    /// cannot be located.
    pub fn resolve(
        &self,
        handler: &DevEnvHandler,
        allow_accelerator: bool,
    ) -> Result<PathBuf, DevEnvError> {
        let accelerator = handler.incredibuild().filter(|_| allow_accelerator);
        let version = match accelerator {
            Some(_) => None,
            None => handler.version()?,
        };
        self.locator.resolve_tool_path_with(
            version.as_ref(),
            accelerator,
            allow_accelerator,
            self.env.as_ref(),
        )
    }
}

impl std::fmt::Debug for ToolResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolResolver")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}
