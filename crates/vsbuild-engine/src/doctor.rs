//! Environment checks behind `vsbuild doctor`.

use std::path::PathBuf;

use vsbuild_devenv::DevEnvError;

use crate::handler::ToolResolver;
use crate::workspace::Workspace;

/// The effective devenv settings of one project and whether its tools resolve.
#[derive(Debug)]
pub struct ProjectCheck {
    pub project: String,
    pub version: Option<String>,
    pub solution_file: Option<PathBuf>,
    pub platforms: Vec<String>,
    pub incredibuild: Option<String>,
    /// Tool used by build tasks; `None` when there is no solution file.
    pub build_tool: Option<Result<PathBuf, DevEnvError>>,
    /// Tool used by clean tasks, only checked when it differs from the build tool.
    pub clean_tool: Option<Result<PathBuf, DevEnvError>>,
}

impl ProjectCheck {
    /// Whether every tool this project needs can be found.
    pub fn is_ok(&self) -> bool {
        [&self.build_tool, &self.clean_tool]
            .into_iter()
            .flatten()
            .all(Result::is_ok)
    }
}

/// Resolve the settings and tools of every project in `workspace`.
pub fn check_workspace(workspace: &Workspace, resolver: &ToolResolver) -> Vec<ProjectCheck> {
    workspace
        .projects()
        .iter()
        .map(|project| {
            let handler = &project.handler;
            let solution_file = handler.solution_file();
            let has_solution = solution_file.is_some();
            let build_tool = has_solution.then(|| resolver.resolve(handler, true));
            let clean_tool = (has_solution && handler.incredibuild().is_some())
                .then(|| resolver.resolve(handler, false));
            ProjectCheck {
                project: project.name.clone(),
                version: handler.version_string().map(str::to_owned),
                solution_file,
                platforms: handler.platforms(),
                incredibuild: handler.incredibuild().map(str::to_owned),
                build_tool,
                clean_tool,
            }
        })
        .collect()
}
