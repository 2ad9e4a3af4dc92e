//! Loading a workspace: the root project, its members and the source
//! dependencies between them.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use vsbuild_config::{Manifest, MANIFEST_FILE};

use crate::error::EngineError;
use crate::handler::DevEnvHandler;

/// Maximum number of `..` components a dependency path may start with.
///
/// Allows sibling layouts such as `../core` while rejecting paths that wander
/// out of the workspace tree.
const MAX_PARENT_TRAVERSAL: usize = 3;

/// One project of the workspace.
#[derive(Debug)]
pub struct Project {
    pub name: String,
    /// Canonical project directory.
    pub dir: PathBuf,
    pub manifest: Manifest,
    /// Names of the projects this one consumes as source dependencies.
    pub source_deps: Vec<String>,
    pub handler: Arc<DevEnvHandler>,
}

/// The root project plus every `[workspace] members` entry.
#[derive(Debug)]
pub struct Workspace {
    root_dir: PathBuf,
    projects: Vec<Project>,
}

impl Workspace {
    /// Load the workspace whose root manifest is in `root_dir`.
    ///
    /// The root project comes first, followed by members in declaration
    /// order. Every member's devenv handler falls back to the root's.
    ///
    /// # Errors
    /// Returns an error if:
    /// - A manifest is missing or invalid
    /// - Two projects share a name
    /// - A source dependency is absolute, climbs too far, does not exist, or
    ///   is not a workspace member
    /// - A configured output pattern does not compile
    pub fn load(root_dir: &Path) -> Result<Self, EngineError> {
        let root_dir = vsbuild_util::fs::canonicalize(root_dir)?;
        let root_manifest = Manifest::from_path(&root_dir.join(MANIFEST_FILE))?;

        let mut loaded = vec![(root_dir.clone(), root_manifest.clone())];
        let members = root_manifest
            .workspace
            .as_ref()
            .map(|w| w.members.clone())
            .unwrap_or_default();
        for member in &members {
            let dir = vsbuild_util::fs::canonicalize(&root_dir.join(member))?;
            if dir == root_dir {
                continue;
            }
            let manifest = Manifest::from_path(&dir.join(MANIFEST_FILE))?;
            loaded.push((dir, manifest));
        }

        let mut by_dir: HashMap<PathBuf, String> = HashMap::new();
        for (dir, manifest) in &loaded {
            let name = &manifest.project.name;
            if by_dir.values().any(|n| n == name) {
                return Err(EngineError::DuplicateProject { name: name.clone() });
            }
            by_dir.insert(dir.clone(), name.clone());
        }

        let mut root_handler: Option<Arc<DevEnvHandler>> = None;
        let mut projects = Vec::with_capacity(loaded.len());
        for (dir, manifest) in loaded {
            let source_deps = manifest
                .dependencies
                .iter()
                .map(|(dep_name, spec)| {
                    let dep_dir = resolve_path_dep(&dir, dep_name, &spec.path)?;
                    by_dir
                        .get(&dep_dir)
                        .cloned()
                        .ok_or_else(|| EngineError::NotAWorkspaceMember {
                            name: dep_name.clone(),
                            path: dep_dir.display().to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let handler = Arc::new(DevEnvHandler::new(
                &manifest.project.name,
                &dir,
                manifest.devenv_settings(),
                root_handler.clone(),
            )?);
            if root_handler.is_none() {
                root_handler = Some(Arc::clone(&handler));
            }
            tracing::debug!(
                project = %manifest.project.name,
                dir = %dir.display(),
                deps = ?source_deps,
                "loaded project"
            );

            projects.push(Project {
                name: manifest.project.name.clone(),
                dir,
                manifest,
                source_deps,
                handler,
            });
        }

        Ok(Self { root_dir, projects })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }
}

/// Resolve a path-based dependency relative to the declaring project's
/// directory and canonicalize it.
fn resolve_path_dep(parent_dir: &Path, dep_name: &str, rel_path: &str) -> Result<PathBuf, EngineError> {
    if Path::new(rel_path).is_absolute() {
        return Err(EngineError::DependencyPathEscape {
            name: dep_name.to_owned(),
            path: rel_path.to_owned(),
        });
    }

    let parent_escapes = Path::new(rel_path)
        .components()
        .take_while(|c| matches!(c, Component::ParentDir))
        .count();
    if parent_escapes > MAX_PARENT_TRAVERSAL {
        return Err(EngineError::DependencyPathEscape {
            name: dep_name.to_owned(),
            path: parent_dir.join(rel_path).display().to_string(),
        });
    }

    let resolved = parent_dir.join(rel_path);
    resolved
        .canonicalize()
        .map_err(|_| EngineError::DependencyNotFound {
            name: dep_name.to_owned(),
            path: resolved.display().to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    fn write_manifest(dir: &Path, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), content).unwrap();
    }

    fn two_project_workspace(root: &Path) {
        write_manifest(
            root,
            "[project]\nname = \"root\"\n\n[workspace]\nmembers = [\"core\", \"app\"]\n\n\
             [devenv]\nversion = \"VS120\"\nplatforms = [\"x64\", \"Win32\"]\n",
        );
        write_manifest(
            &root.join("core"),
            "[project]\nname = \"core\"\n\n[devenv]\nsolution_file = \"core.sln\"\n",
        );
        write_manifest(
            &root.join("app"),
            "[project]\nname = \"app\"\n\n[devenv]\nsolution_file = \"app.sln\"\n\n\
             [dependencies]\ncore = { path = \"../core\" }\n",
        );
    }

    #[test]
    fn single_project() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(tmp.path(), "[project]\nname = \"solo\"\n");
        let ws = Workspace::load(tmp.path()).unwrap();
        assert_eq!(ws.projects().len(), 1);
        let solo = ws.project("solo").unwrap();
        assert!(solo.source_deps.is_empty());
        assert!(solo.handler.parent().is_none());
    }

    #[test]
    fn members_inherit_from_root() {
        let tmp = tempfile::tempdir().unwrap();
        two_project_workspace(tmp.path());
        let ws = Workspace::load(tmp.path()).unwrap();

        let names: Vec<_> = ws.projects().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["root", "core", "app"]);

        let app = ws.project("app").unwrap();
        assert_eq!(app.source_deps, vec!["core"]);
        assert_eq!(app.handler.version_string(), Some("VS120"));
        assert_eq!(app.handler.platforms(), vec!["x64", "Win32"]);
        assert!(app.handler.solution_file().unwrap().ends_with("app/app.sln"));
    }

    #[test]
    fn missing_member_manifest_fails() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(
            tmp.path(),
            "[project]\nname = \"root\"\n\n[workspace]\nmembers = [\"lib\"]\n",
        );
        fs::create_dir_all(tmp.path().join("lib")).unwrap();
        let err = Workspace::load(tmp.path()).unwrap_err();
        assert!(matches!(err, EngineError::Manifest(_)), "got {err:?}");
    }

    #[test]
    fn duplicate_names_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(
            tmp.path(),
            "[project]\nname = \"root\"\n\n[workspace]\nmembers = [\"a\", \"b\"]\n",
        );
        write_manifest(&tmp.path().join("a"), "[project]\nname = \"same\"\n");
        write_manifest(&tmp.path().join("b"), "[project]\nname = \"same\"\n");
        let err = Workspace::load(tmp.path()).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateProject { .. }), "got {err:?}");
    }

    #[test]
    fn dependency_outside_workspace_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("ws");
        write_manifest(
            &root,
            "[project]\nname = \"root\"\n\n[dependencies]\nother = { path = \"../other\" }\n",
        );
        write_manifest(&tmp.path().join("other"), "[project]\nname = \"other\"\n");
        let err = Workspace::load(&root).unwrap_err();
        assert!(matches!(err, EngineError::NotAWorkspaceMember { .. }), "got {err:?}");
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn missing_dependency_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(
            tmp.path(),
            "[project]\nname = \"root\"\n\n[dependencies]\nghost = { path = \"ghost\" }\n",
        );
        let err = Workspace::load(tmp.path()).unwrap_err();
        assert!(matches!(err, EngineError::DependencyNotFound { .. }), "got {err:?}");
    }

    #[test]
    fn absolute_dependency_rejected() {
        let err = resolve_path_dep(Path::new("/ws"), "abs", "/abs/path").unwrap_err();
        assert!(matches!(err, EngineError::DependencyPathEscape { .. }));
    }

    #[test]
    fn deep_traversal_rejected() {
        let err = resolve_path_dep(Path::new("/ws/a"), "deep", "../../../../x").unwrap_err();
        assert!(matches!(err, EngineError::DependencyPathEscape { .. }));
    }

    #[test]
    fn invalid_pattern_fails_load() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(
            tmp.path(),
            "[project]\nname = \"root\"\n\n[devenv]\nwarning_regexes = [\"[\"]\n",
        );
        let err = Workspace::load(tmp.path()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPattern { .. }), "got {err:?}");
    }
}
