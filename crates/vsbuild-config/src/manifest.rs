use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// File name of the per-project manifest.
pub const MANIFEST_FILE: &str = "vsbuild.toml";

/// The `vsbuild.toml` project manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub project: Project,
    /// Only meaningful in the workspace root manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<Workspace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devenv: Option<DevEnvSettings>,
    /// Source dependencies on other projects of the workspace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, DependencySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Workspace {
    #[serde(default)]
    pub members: Vec<String>,
}

/// The `[devenv]` table. Every field is optional so that a member project can
/// fall back to the workspace root's value field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DevEnvSettings {
    /// Visual Studio version, e.g. `"VS120"` or `"15.0"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Solution file, relative to the declaring project's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<String>,
    /// Path to the Incredibuild console, used instead of devenv for builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incredibuild: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_regexes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warning_regexes: Vec<String>,
}

/// A source dependency: another buildable project in the same workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencySpec {
    pub path: String,
}

impl Manifest {
    /// Create a minimal manifest for a project with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            project: Project {
                name: name.to_owned(),
            },
            workspace: None,
            devenv: None,
            dependencies: BTreeMap::new(),
        }
    }

    /// Read and parse a `vsbuild.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parse manifest `content`; `path` is only used in error messages.
    ///
    /// # Errors
    /// Returns an error if the content is invalid TOML or fails validation.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(content).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Serialize the manifest as human-readable TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ManifestError> {
        toml::to_string_pretty(self).map_err(|e| ManifestError::Serialize { source: e })
    }

    /// The `[devenv]` settings, or an empty table when absent.
    pub fn devenv_settings(&self) -> DevEnvSettings {
        self.devenv.clone().unwrap_or_default()
    }

    fn validate(&self, path: &Path) -> Result<(), ManifestError> {
        let name = &self.project.name;
        if name.trim().is_empty() || name.contains(':') || name.contains(char::is_whitespace) {
            return Err(ManifestError::InvalidName {
                path: path.display().to_string(),
                name: name.clone(),
            });
        }
        if let Some(devenv) = &self.devenv {
            if let Some(bad) = devenv
                .platforms
                .iter()
                .find(|p| p.trim().is_empty() || p.contains(char::is_whitespace))
            {
                return Err(ManifestError::InvalidPlatform {
                    path: path.display().to_string(),
                    platform: bad.clone(),
                });
            }
            // Task names capitalize the platform, so `x64` and `X64` would clash.
            let mut seen: HashMap<String, &str> = HashMap::new();
            for platform in &devenv.platforms {
                if let Some(first) = seen.insert(name_segment(platform), platform) {
                    return Err(ManifestError::DuplicatePlatform {
                        path: path.display().to_string(),
                        first: first.to_owned(),
                        second: platform.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn name_segment(platform: &str) -> String {
    let mut chars = platform.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid vsbuild.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("cannot serialize manifest: {source}")]
    Serialize { source: toml::ser::Error },
    #[error("invalid project name \"{name}\" in {path} — names must be non-empty and contain no whitespace or ':'")]
    InvalidName { path: String, name: String },
    #[error("invalid platform \"{platform}\" in {path} — platforms must be non-empty and contain no whitespace")]
    InvalidPlatform { path: String, platform: String },
    #[error("platforms \"{first}\" and \"{second}\" in {path} would produce the same task names")]
    DuplicatePlatform {
        path: String,
        first: String,
        second: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Manifest, ManifestError> {
        Manifest::parse(content, Path::new("vsbuild.toml"))
    }

    #[test]
    fn parse_minimal() {
        let manifest = parse("[project]\nname = \"app\"\n").unwrap();
        assert_eq!(manifest.project.name, "app");
        assert!(manifest.devenv.is_none());
        assert!(manifest.workspace.is_none());
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn parse_full() {
        let manifest = parse(
            r#"
[project]
name = "app"

[workspace]
members = ["libs/core", "app"]

[devenv]
version = "VS120"
solution_file = "app.sln"
platforms = ["x64", "Win32"]
incredibuild = "C:/IB/BuildConsole.exe"
error_regexes = ["FATAL.*"]
warning_regexes = ["WARN.*"]

[dependencies]
core = { path = "../libs/core" }
"#,
        )
        .unwrap();

        let devenv = manifest.devenv.as_ref().unwrap();
        assert_eq!(devenv.version.as_deref(), Some("VS120"));
        assert_eq!(devenv.solution_file.as_deref(), Some("app.sln"));
        assert_eq!(devenv.platforms, vec!["x64", "Win32"]);
        assert_eq!(devenv.incredibuild.as_deref(), Some("C:/IB/BuildConsole.exe"));
        assert_eq!(devenv.error_regexes, vec!["FATAL.*"]);
        assert_eq!(devenv.warning_regexes, vec!["WARN.*"]);
        assert_eq!(manifest.workspace.unwrap().members, vec!["libs/core", "app"]);
        assert_eq!(manifest.dependencies.get("core").unwrap().path, "../libs/core");
    }

    #[test]
    fn missing_project_name_is_parse_error() {
        let err = parse("[devenv]\nversion = \"VS120\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn name_with_colon_rejected() {
        let err = parse("[project]\nname = \"a:b\"\n").unwrap_err();
        assert!(err.to_string().contains("a:b"), "error was: {err}");
    }

    #[test]
    fn empty_platform_rejected() {
        let err = parse("[project]\nname = \"app\"\n[devenv]\nplatforms = [\"x64\", \"\"]\n")
            .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidPlatform { .. }), "got {err:?}");
    }

    #[test]
    fn misspelled_devenv_key_rejected() {
        let err = parse("[project]\nname = \"app\"\n[devenv]\nsolution-file = \"a.sln\"\n")
            .unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }), "got {err:?}");
        assert!(err.to_string().contains("solution-file"), "error was: {err}");
    }

    #[test]
    fn unknown_top_level_table_rejected() {
        let err = parse("[project]\nname = \"app\"\n[devnev]\nversion = \"VS120\"\n")
            .unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn unknown_dependency_key_rejected() {
        let err = parse("[project]\nname = \"app\"\n[dependencies]\ncore = { dir = \"../core\" }\n")
            .unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn platforms_differing_only_in_first_letter_case_rejected() {
        let err = parse("[project]\nname = \"app\"\n[devenv]\nplatforms = [\"x64\", \"X64\"]\n")
            .unwrap_err();
        match err {
            ManifestError::DuplicatePlatform { first, second, .. } => {
                assert_eq!(first, "x64");
                assert_eq!(second, "X64");
            }
            other => panic!("expected DuplicatePlatform, got {other:?}"),
        }
    }

    #[test]
    fn repeated_platform_rejected() {
        let err = parse("[project]\nname = \"app\"\n[devenv]\nplatforms = [\"Win32\", \"x64\", \"Win32\"]\n")
            .unwrap_err();
        assert!(err.to_string().contains("Win32"), "error was: {err}");
        assert!(matches!(err, ManifestError::DuplicatePlatform { .. }), "got {err:?}");
    }

    #[test]
    fn distinct_platforms_accepted() {
        let manifest =
            parse("[project]\nname = \"app\"\n[devenv]\nplatforms = [\"x64\", \"Win32\", \"ARM64\"]\n")
                .unwrap();
        assert_eq!(manifest.devenv_settings().platforms.len(), 3);
    }

    #[test]
    fn devenv_settings_default_when_absent() {
        let manifest = parse("[project]\nname = \"app\"\n").unwrap();
        assert_eq!(manifest.devenv_settings(), DevEnvSettings::default());
    }

    #[test]
    fn to_toml_omits_empty_sections() {
        let content = Manifest::new("app").to_toml().unwrap();
        assert!(content.contains("name = \"app\""), "content was: {content}");
        assert!(!content.contains("devenv"), "content was: {content}");
        assert!(!content.contains("dependencies"), "content was: {content}");
    }

    #[test]
    fn from_path_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(MANIFEST_FILE);
        std::fs::write(&path, "[project]\nname = \"core\"\n").unwrap();
        assert_eq!(Manifest::from_path(&path).unwrap().project.name, "core");
    }

    #[test]
    fn from_path_missing_file_names_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(MANIFEST_FILE);
        let err = Manifest::from_path(&path).unwrap_err().to_string();
        assert!(err.contains("vsbuild.toml"), "error was: {err}");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            #[allow(clippy::unwrap_used)]
            fn written_manifest_parses_back(
                name in "[a-zA-Z][a-zA-Z0-9_-]{0,20}",
                platforms in proptest::collection::btree_set("[a-z][A-Za-z0-9]{0,8}", 0..4),
                solution in proptest::option::of("[a-z]{1,10}\\.sln"),
            ) {
                let mut manifest = Manifest::new(&name);
                manifest.devenv = Some(DevEnvSettings {
                    solution_file: solution,
                    platforms: platforms.into_iter().collect(),
                    ..DevEnvSettings::default()
                });
                let content = manifest.to_toml().unwrap();
                let reparsed = parse(&content).unwrap();
                prop_assert_eq!(manifest, reparsed);
            }
        }
    }
}
