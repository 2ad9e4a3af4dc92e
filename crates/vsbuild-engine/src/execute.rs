//! Running planned tasks.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use vsbuild_output::{ErrorHighlightingOutput, StyledTextOutput};

use crate::error::EngineError;
use crate::graph::{TaskGraph, TaskId, TaskKind};
use crate::task::DevEnvTask;

/// What happened when a task ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// A hook, or a devenv task with no solution file.
    NoOp,
    /// The build tool ran and exited with code 0.
    Succeeded {
        log_file: PathBuf,
        warnings: usize,
        errors: usize,
    },
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub path: String,
    pub status: TaskStatus,
    pub duration: Duration,
}

/// Run one devenv task, printing its output through `output`.
///
/// The tool path is resolved now. Output is highlighted line by line while
/// the tool runs; afterwards the full transcript is written to the task's log
/// file and the warning/error summary is printed, before a non-zero exit
/// code fails the task.
///
/// # Errors
/// Returns an error if:
/// - The build tool cannot be resolved or started
/// - The console or the log file cannot be written
/// - The build tool exits with a non-zero code or is killed
pub fn run_devenv_task<O>(task: &DevEnvTask, output: O) -> Result<TaskStatus, EngineError>
where
    O: StyledTextOutput + Send,
{
    let (Some(action), Some(log_file)) = (task.action(), task.log_file()) else {
        tracing::debug!(task = %task.name(), "no solution file, nothing to run");
        return Ok(TaskStatus::NoOp);
    };
    let Some(command) = task.build_command()? else {
        return Ok(TaskStatus::NoOp);
    };
    let tool_file = command
        .tool_path()
        .and_then(|t| t.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| command.tool_name().to_owned());

    let sink = ErrorHighlightingOutput::new(action.title(), output, Arc::clone(action.rules()));
    // A broken console must not stop the tool or lose its log, so console
    // errors are held back until the transcript is on disk.
    let console_error: Mutex<Option<io::Error>> = Mutex::new(None);
    let executed = command.execute(|_, bytes| {
        if let Err(e) = sink.write(bytes) {
            keep_first(&console_error, e);
        }
        Ok(())
    });
    if let Err(e) = sink.finish() {
        keep_first(&console_error, e);
    }

    let logged = vsbuild_util::fs::write_file(&log_file, sink.transcript().as_bytes());
    if let Err(e) = sink.summarise() {
        keep_first(&console_error, e);
    }

    let code = executed?;
    logged?;
    tracing::info!(log = %log_file.display(), ?code, "{} finished", command.tool_name());

    match code {
        Some(0) => {}
        Some(code) => {
            return Err(EngineError::ToolFailed {
                tool: tool_file,
                code,
            });
        }
        None => return Err(EngineError::ToolTerminated { tool: tool_file }),
    }
    let console_error = console_error
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(source) = console_error {
        return Err(EngineError::Console { source });
    }

    Ok(TaskStatus::Succeeded {
        log_file,
        warnings: sink.warnings().len(),
        errors: sink.errors().len(),
    })
}

fn keep_first(slot: &Mutex<Option<io::Error>>, error: io::Error) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        tracing::debug!("console write failed, continuing to capture output: {error}");
        *slot = Some(error);
    }
}

/// Run every task of `levels` in order, the tasks of one level in parallel.
///
/// `new_output` supplies a fresh console for each devenv task. When a task
/// fails, the rest of its level still finishes, then the first failure is
/// returned and later levels are not started.
///
/// # Errors
/// Returns the first error of the first level that had a failing task.
pub fn execute_plan<O, F>(
    graph: &TaskGraph,
    levels: &[Vec<TaskId>],
    new_output: F,
) -> Result<Vec<TaskReport>, EngineError>
where
    O: StyledTextOutput + Send,
    F: Fn() -> O + Sync,
{
    let mut reports = Vec::new();
    for level in levels {
        let results: Vec<Result<TaskReport, EngineError>> = level
            .par_iter()
            .map(|&id| run_task(graph, id, &new_output))
            .collect();
        for result in results {
            reports.push(result?);
        }
    }
    Ok(reports)
}

fn run_task<O, F>(graph: &TaskGraph, id: TaskId, new_output: &F) -> Result<TaskReport, EngineError>
where
    O: StyledTextOutput + Send,
    F: Fn() -> O + Sync,
{
    let Some(task) = graph.task(id) else {
        return Err(EngineError::UnknownTask {
            name: format!("#{id}"),
        });
    };
    let path = task.path();
    let start = Instant::now();

    let status = match &task.kind {
        TaskKind::Hook { .. } => TaskStatus::NoOp,
        TaskKind::DevEnv(devenv) if !devenv.is_configured() => TaskStatus::NoOp,
        TaskKind::DevEnv(devenv) => {
            eprintln!("    Running {path}");
            let status = run_devenv_task(devenv, new_output());
            if let Err(e) = &status {
                eprintln!("    Failed {path}: {e}");
            }
            status?
        }
    };

    let duration = start.elapsed();
    if let TaskStatus::Succeeded {
        warnings, errors, ..
    } = &status
    {
        eprintln!(
            "    Finished {path} in {:.2}s ({warnings} warning(s), {errors} error line(s))",
            duration.as_secs_f64()
        );
    }
    Ok(TaskReport {
        path,
        status,
        duration,
    })
}
