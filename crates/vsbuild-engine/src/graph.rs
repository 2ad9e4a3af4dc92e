//! The task graph: declaring hook and devenv tasks for every project, wiring
//! them together, and ordering a request into parallel levels.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use vsbuild_devenv::Operation;

use crate::error::EngineError;
use crate::handler::{DevEnvHandler, ToolResolver};
use crate::task::{
    hook_name, task_name, task_path, DevEnvTask, CONFIGURATIONS, EVERY_PLATFORM, OPERATIONS,
    TASK_GROUP,
};
use crate::workspace::Workspace;

/// Index of a task in its [`TaskGraph`].
pub type TaskId = usize;

/// What running a task does.
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// An extension point with no action of its own.
    Hook { description: String },
    DevEnv(DevEnvTask),
}

#[derive(Debug, Clone)]
pub struct Task {
    pub project: String,
    pub name: String,
    pub kind: TaskKind,
    deps: BTreeSet<TaskId>,
}

impl Task {
    /// `:<project>:<name>`
    pub fn path(&self) -> String {
        task_path(&self.project, &self.name)
    }

    pub fn group(&self) -> &'static str {
        TASK_GROUP
    }

    pub fn description(&self) -> &str {
        match &self.kind {
            TaskKind::Hook { description } => description,
            TaskKind::DevEnv(task) => task.description(),
        }
    }

    pub fn devenv(&self) -> Option<&DevEnvTask> {
        match &self.kind {
            TaskKind::DevEnv(task) => Some(task),
            TaskKind::Hook { .. } => None,
        }
    }

    pub fn dependencies(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.deps.iter().copied()
    }
}

/// Switches that change how the graph is wired for one run.
#[derive(Debug, Clone, Copy)]
pub struct WiringOptions {
    /// Make tasks depend on the matching tasks of source dependencies.
    pub build_project_deps: bool,
}

impl Default for WiringOptions {
    fn default() -> Self {
        Self {
            build_project_deps: true,
        }
    }
}

/// All tasks of a workspace and the edges between them.
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<String, TaskId>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare, configure and wire the tasks of every project in `workspace`.
    ///
    /// Runs in three passes so that cross-project edges are only added once
    /// every project's per-platform tasks exist.
    ///
    /// # Errors
    /// Returns an error if a task is declared twice.
    pub fn for_workspace(
        workspace: &Workspace,
        resolver: &ToolResolver,
        options: WiringOptions,
    ) -> Result<Self, EngineError> {
        let mut graph = Self::new();
        for project in workspace.projects() {
            graph.declare_project_tasks(&project.name)?;
        }
        for project in workspace.projects() {
            graph.configure_project_tasks(&project.handler, resolver)?;
        }
        if options.build_project_deps {
            for project in workspace.projects() {
                graph.wire_source_dependencies(&project.name, &project.source_deps);
            }
        }
        Ok(graph)
    }

    /// Add a task with no dependencies.
    ///
    /// # Errors
    /// Returns an error if the project already has a task of that name.
    pub fn add_task(&mut self, project: &str, name: &str, kind: TaskKind) -> Result<TaskId, EngineError> {
        let path = task_path(project, name);
        if self.index.contains_key(&path) {
            return Err(EngineError::DuplicateTask { path });
        }
        let id = self.tasks.len();
        self.tasks.push(Task {
            project: project.to_owned(),
            name: name.to_owned(),
            kind,
            deps: BTreeSet::new(),
        });
        self.index.insert(path, id);
        Ok(id)
    }

    /// Make `task` depend on `dependency`. Unknown ids and self-edges are ignored.
    pub fn depends_on(&mut self, task: TaskId, dependency: TaskId) {
        if task == dependency || dependency >= self.tasks.len() {
            return;
        }
        if let Some(t) = self.tasks.get_mut(task) {
            if t.deps.insert(dependency) {
                tracing::debug!(task = task, dependency = dependency, "added task dependency");
            }
        }
    }

    pub fn find(&self, project: &str, name: &str) -> Option<TaskId> {
        self.index.get(&task_path(project, name)).copied()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// First pass: the `beforeBuild`/`beforeClean` hooks and the umbrella
    /// task for every operation and configuration, each umbrella depending on
    /// its hook.
    ///
    /// # Errors
    /// Returns an error if the project's tasks were already declared.
    pub fn declare_project_tasks(&mut self, project: &str) -> Result<(), EngineError> {
        for &operation in OPERATIONS {
            let hook = self.add_task(
                project,
                &hook_name(operation),
                TaskKind::Hook {
                    description: format!(
                        "This task is a dependency of all {operation} tasks, so will run before any of them"
                    ),
                },
            )?;
            for configuration in CONFIGURATIONS {
                let task = DevEnvTask::new(operation, EVERY_PLATFORM, configuration);
                let umbrella = self.add_task(project, &task.name(), TaskKind::DevEnv(task))?;
                self.depends_on(umbrella, hook);
            }
        }
        tracing::debug!(project, "declared tasks");
        Ok(())
    }

    /// Second pass, once the project's settings are final: with one platform
    /// the umbrella tasks are configured directly; with several, a task per
    /// platform is created and the umbrella just depends on them.
    ///
    /// # Errors
    /// Returns an error if a per-platform task already exists.
    pub fn configure_project_tasks(
        &mut self,
        handler: &Arc<DevEnvHandler>,
        resolver: &ToolResolver,
    ) -> Result<(), EngineError> {
        let project = handler.project().to_owned();
        let platforms = handler.platforms();

        for &operation in OPERATIONS {
            let Some(hook) = self.find(&project, &hook_name(operation)) else {
                continue;
            };
            for configuration in CONFIGURATIONS {
                let umbrella_name = task_name(operation, EVERY_PLATFORM, configuration);
                let Some(umbrella) = self.find(&project, &umbrella_name) else {
                    continue;
                };
                match platforms.as_slice() {
                    [only] => {
                        self.configure_devenv(umbrella, handler, resolver, only)?;
                    }
                    _ => {
                        for platform in &platforms {
                            let task = DevEnvTask::new(operation, platform, configuration);
                            let id = self.add_task(&project, &task.name(), TaskKind::DevEnv(task))?;
                            self.configure_devenv(id, handler, resolver, platform)?;
                            self.depends_on(id, hook);
                            self.depends_on(umbrella, id);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn configure_devenv(
        &mut self,
        id: TaskId,
        handler: &Arc<DevEnvHandler>,
        resolver: &ToolResolver,
        platform: &str,
    ) -> Result<bool, EngineError> {
        let Some(Task {
            kind: TaskKind::DevEnv(task),
            ..
        }) = self.tasks.get_mut(id)
        else {
            return Ok(false);
        };
        match task.operation() {
            Operation::Build => task.configure_build_task(handler, resolver, platform),
            Operation::Clean => task.configure_clean_task(handler, resolver, platform),
        }
    }

    /// Third pass: every configured devenv task of `project` depends on the
    /// same-named task and on the matching umbrella task of each upstream
    /// project. Missing upstream tasks are skipped.
    pub fn wire_source_dependencies(&mut self, project: &str, upstream: &[String]) {
        let configured: Vec<(TaskId, String, Operation, String)> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.project == project)
            .filter_map(|(id, t)| {
                let task = t.devenv().filter(|d| d.is_configured())?;
                Some((
                    id,
                    t.name.clone(),
                    task.operation(),
                    task.configuration().to_owned(),
                ))
            })
            .collect();

        for (id, name, operation, configuration) in configured {
            let umbrella_name = task_name(operation, EVERY_PLATFORM, &configuration);
            for dep_project in upstream {
                for dep_name in [&name, &umbrella_name] {
                    if let Some(dep) = self.find(dep_project, dep_name) {
                        tracing::debug!(
                            "{} depends on {}",
                            task_path(project, &name),
                            task_path(dep_project, dep_name)
                        );
                        self.depends_on(id, dep);
                    }
                }
            }
        }
    }

    /// Resolve task selectors: `:project:name` names one task, a bare name
    /// selects that task in every project declaring it.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownTask`] if a selector matches nothing.
    pub fn select(&self, selectors: &[String]) -> Result<Vec<TaskId>, EngineError> {
        let mut selected = Vec::new();
        for selector in selectors {
            let matches: Vec<TaskId> = if selector.starts_with(':') {
                self.index.get(selector.as_str()).copied().into_iter().collect()
            } else {
                self.tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.name == *selector)
                    .map(|(id, _)| id)
                    .collect()
            };
            if matches.is_empty() {
                return Err(EngineError::UnknownTask {
                    name: selector.clone(),
                });
            }
            for id in matches {
                if !selected.contains(&id) {
                    selected.push(id);
                }
            }
        }
        Ok(selected)
    }

    /// Order `requested` and everything it depends on into levels: every task
    /// comes after all its dependencies, and tasks within one level have no
    /// edges between them.
    ///
    /// # Errors
    /// Returns [`EngineError::DependencyCycle`] if the dependencies loop.
    pub fn plan(&self, requested: &[TaskId]) -> Result<Vec<Vec<TaskId>>, EngineError> {
        // Transitive closure of the request.
        let mut closure: BTreeSet<TaskId> = BTreeSet::new();
        let mut queue: VecDeque<TaskId> = requested.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            let Some(task) = self.tasks.get(id) else {
                continue;
            };
            if closure.insert(id) {
                queue.extend(task.dependencies());
            }
        }

        // Kahn's algorithm, one level at a time.
        let mut remaining: HashMap<TaskId, usize> = closure
            .iter()
            .map(|&id| {
                let pending = self
                    .tasks
                    .get(id)
                    .map_or(0, |t| t.deps.iter().filter(|d| closure.contains(d)).count());
                (id, pending)
            })
            .collect();
        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for &id in &closure {
            if let Some(task) = self.tasks.get(id) {
                for dep in task.dependencies() {
                    dependents.entry(dep).or_default().push(id);
                }
            }
        }

        let mut levels = Vec::new();
        let mut ready: Vec<TaskId> = remaining
            .iter()
            .filter(|(_, &n)| n == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut done: HashSet<TaskId> = HashSet::new();
        while !ready.is_empty() {
            ready.sort_unstable();
            let mut next = Vec::new();
            for &id in &ready {
                done.insert(id);
                for &dependent in dependents.get(&id).map(Vec::as_slice).unwrap_or_default() {
                    if let Some(n) = remaining.get_mut(&dependent) {
                        *n = n.saturating_sub(1);
                        if *n == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
            levels.push(std::mem::take(&mut ready));
            ready = next;
        }

        if done.len() < closure.len() {
            let cycle = closure
                .iter()
                .filter(|id| !done.contains(id))
                .filter_map(|&id| self.tasks.get(id).map(Task::path))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(EngineError::DependencyCycle { cycle });
        }
        Ok(levels)
    }
}
