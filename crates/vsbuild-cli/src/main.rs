#![forbid(unsafe_code)]

use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vsbuild_config::MANIFEST_FILE;
use vsbuild_engine::{
    check_workspace, execute_plan, init_project, TaskGraph, TaskKind, TaskStatus, ToolResolver,
    WiringOptions, Workspace,
};
use vsbuild_output::DefaultStyledTextOutput;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "vsbuild", about = "Build and clean Visual Studio solutions across a workspace")]
#[command(version)]
struct Cli {
    /// Show debug logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    /// Workspace root containing vsbuild.toml (defaults to the current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a vsbuild.toml
    Init {
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
        /// Solution file to build, relative to the project directory
        #[arg(long)]
        solution: Option<String>,
    },
    /// List the tasks of every project
    Tasks,
    /// Run tasks and everything they depend on
    Run {
        /// `:project:task`, or a bare task name to run it in every project
        #[arg(required = true)]
        tasks: Vec<String>,
        /// Don't build source dependencies first
        #[arg(long)]
        no_project_deps: bool,
    },
    /// Check that Visual Studio can be found for every project
    Doctor,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Init { name, solution } => cmd_init(cli.project_dir, name, solution),
        Command::Tasks => workspace_root(cli.project_dir).and_then(|root| cmd_tasks(&root)),
        Command::Run {
            tasks,
            no_project_deps,
        } => workspace_root(cli.project_dir)
            .and_then(|root| cmd_run(&root, &tasks, no_project_deps)),
        Command::Doctor => workspace_root(cli.project_dir).and_then(|root| cmd_doctor(&root)),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// The workspace root: `--project-dir` or the current directory, which must
/// contain a `vsbuild.toml`.
fn workspace_root(project_dir: Option<PathBuf>) -> Result<PathBuf, Box<dyn Error>> {
    let dir = match project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    if !dir.join(MANIFEST_FILE).exists() {
        return Err(format!(
            "no {MANIFEST_FILE} found in {} — run `vsbuild init` to create one",
            dir.display()
        )
        .into());
    }
    Ok(dir)
}

fn cmd_init(project_dir: Option<PathBuf>, name: Option<String>, solution: Option<String>) -> CliResult {
    let dir = match project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let project_name = name.unwrap_or_else(|| default_project_name(&dir));

    init_project(&project_name, &dir, solution.as_deref())?;

    eprintln!("    Created project `{project_name}` in {}", dir.display());
    if solution.is_some() {
        eprintln!("    Set `version` in the [devenv] table, e.g. version = \"VS120\"");
    }
    Ok(())
}

fn default_project_name(dir: &Path) -> String {
    dir.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("project")
        .replace(char::is_whitespace, "-")
}

fn cmd_tasks(root: &Path) -> CliResult {
    let workspace = Workspace::load(root)?;
    let graph = TaskGraph::for_workspace(&workspace, &ToolResolver::system(), WiringOptions::default())?;

    for project in workspace.projects() {
        println!("{}", project.name);
        let mut tasks: Vec<_> = graph
            .tasks()
            .filter(|(_, t)| t.project == project.name)
            .map(|(_, t)| t)
            .collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        let width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);
        let no_solution = project.handler.solution_file().is_none();
        for task in tasks {
            let note = match task.kind {
                TaskKind::DevEnv(_) if no_solution => " (no solution file, does nothing)",
                _ => "",
            };
            println!(
                "  {:<width$}  [{}] {}{note}",
                task.name,
                task.group(),
                task.description()
            );
        }
        println!();
    }
    Ok(())
}

fn cmd_run(root: &Path, selectors: &[String], no_project_deps: bool) -> CliResult {
    let workspace = Workspace::load(root)?;
    let options = WiringOptions {
        build_project_deps: !no_project_deps,
    };
    let graph = TaskGraph::for_workspace(&workspace, &ToolResolver::system(), options)?;

    let requested = graph.select(selectors)?;
    let levels = graph.plan(&requested)?;
    let total: usize = levels.iter().map(Vec::len).sum();
    eprintln!("    Planned {total} task(s) in {} stage(s)", levels.len());

    let start = Instant::now();
    let reports = execute_plan(&graph, &levels, DefaultStyledTextOutput::<io::Stdout>::stdout)?;
    let ran = reports
        .iter()
        .filter(|r| r.status != TaskStatus::NoOp)
        .count();
    eprintln!(
        "    Finished {ran} build(s) in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn cmd_doctor(root: &Path) -> CliResult {
    eprintln!("Checking environment...");
    eprintln!();

    let workspace = Workspace::load(root)?;
    let mut issues = 0u32;

    for check in check_workspace(&workspace, &ToolResolver::system()) {
        eprintln!("  [ok] Project: {}", check.project);
        let Some(solution) = &check.solution_file else {
            eprintln!("       [--] No solution file — nothing to build");
            continue;
        };
        if solution.exists() {
            eprintln!("       [ok] Solution: {}", solution.display());
        } else {
            eprintln!("       [!!] Solution: {} does not exist", solution.display());
            issues = issues.saturating_add(1);
        }
        match &check.version {
            Some(version) => eprintln!("       [ok] Version: {version}"),
            None if check.incredibuild.is_some() => {
                eprintln!("       [--] Version: not set (only Incredibuild builds will work)");
            }
            None => eprintln!("       [!!] Version: not set"),
        }
        eprintln!("       [ok] Platforms: {}", check.platforms.join(", "));

        for (label, tool) in [("Build tool", &check.build_tool), ("Clean tool", &check.clean_tool)] {
            match tool {
                Some(Ok(path)) => eprintln!("       [ok] {label}: {}", path.display()),
                Some(Err(e)) => {
                    eprintln!("       [!!] {label}: {e}");
                    issues = issues.saturating_add(1);
                }
                None => {}
            }
        }
    }

    eprintln!();
    if issues > 0 {
        eprintln!("{issues} issue(s) found — fix them before building");
        Err(format!("{issues} issue(s) found").into())
    } else {
        eprintln!("All checks passed");
        Ok(())
    }
}
