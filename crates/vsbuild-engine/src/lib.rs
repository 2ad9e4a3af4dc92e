//! Task wiring and execution for Visual Studio solution builds.

pub mod doctor;
pub mod error;
pub mod execute;
pub mod graph;
pub mod handler;
pub mod init;
pub mod task;
pub mod workspace;

pub use doctor::{check_workspace, ProjectCheck};
pub use error::EngineError;
pub use execute::{execute_plan, run_devenv_task, TaskReport, TaskStatus};
pub use graph::{Task, TaskGraph, TaskId, TaskKind, WiringOptions};
pub use handler::{DevEnvHandler, EnvLookup, ToolResolver};
pub use init::init_project;
pub use task::{task_name, BuildConfiguration, DevEnvAction, DevEnvTask, EVERY_PLATFORM};
pub use workspace::{Project, Workspace};
