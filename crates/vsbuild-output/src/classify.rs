//! Whole-line classification of build tool output into warnings and errors.

use regex::Regex;

/// Error patterns every rule set starts with: MSBuild project failure
/// markers and compiler/linker errors such as `error C2065:` or
/// `fatal error LNK1120:`.
pub const DEFAULT_ERROR_PATTERNS: &[&str] = &[
    r"\d+>Build FAILED",
    r".* (error|fatal error) \w+\d{2,5}:.*",
];

/// Warning patterns every rule set starts with, e.g. `warning C4996:`.
pub const DEFAULT_WARNING_PATTERNS: &[&str] = &[r".* warning \w+\d{2,5}:.*"];

/// The outcome of classifying one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Normal,
    Warning,
    Error,
}

/// Classify `line` against ordered warning and error patterns.
///
/// Warning patterns are scanned first, then error patterns; the first match
/// in each list counts and an error match overrides a warning match.
pub fn classify(line: &str, warning_patterns: &[Regex], error_patterns: &[Regex]) -> LineClass {
    let mut class = LineClass::Normal;
    if warning_patterns.iter().any(|p| p.is_match(line)) {
        class = LineClass::Warning;
    }
    if error_patterns.iter().any(|p| p.is_match(line)) {
        class = LineClass::Error;
    }
    class
}

/// Two ordered lists of whole-line patterns.
#[derive(Debug, Clone, Default)]
pub struct RegexRuleSet {
    warning_patterns: Vec<Regex>,
    error_patterns: Vec<Regex>,
}

impl RegexRuleSet {
    /// An empty rule set that classifies every line as normal.
    pub fn new() -> Self {
        Self::default()
    }

    /// A rule set holding [`DEFAULT_ERROR_PATTERNS`] and [`DEFAULT_WARNING_PATTERNS`].
    pub fn with_defaults() -> Self {
        Self {
            warning_patterns: DEFAULT_WARNING_PATTERNS
                .iter()
                .filter_map(|p| compile_whole_line(p).ok())
                .collect(),
            error_patterns: DEFAULT_ERROR_PATTERNS
                .iter()
                .filter_map(|p| compile_whole_line(p).ok())
                .collect(),
        }
    }

    /// Append an error pattern. The pattern must match the entire line.
    ///
    /// # Errors
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn add_error_pattern(&mut self, pattern: &str) -> Result<(), PatternError> {
        self.error_patterns.push(compile_whole_line(pattern)?);
        Ok(())
    }

    /// Append a warning pattern. The pattern must match the entire line.
    ///
    /// # Errors
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn add_warning_pattern(&mut self, pattern: &str) -> Result<(), PatternError> {
        self.warning_patterns.push(compile_whole_line(pattern)?);
        Ok(())
    }

    pub fn warning_patterns(&self) -> &[Regex] {
        &self.warning_patterns
    }

    pub fn error_patterns(&self) -> &[Regex] {
        &self.error_patterns
    }

    pub fn classify(&self, line: &str) -> LineClass {
        classify(line, &self.warning_patterns, &self.error_patterns)
    }
}

fn compile_whole_line(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| PatternError::Invalid {
        pattern: pattern.to_owned(),
        source,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid output pattern `{pattern}`: {source}")]
    Invalid {
        pattern: String,
        source: regex::Error,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rules(warnings: &[&str], errors: &[&str]) -> RegexRuleSet {
        let mut set = RegexRuleSet::new();
        for w in warnings {
            set.add_warning_pattern(w).unwrap();
        }
        for e in errors {
            set.add_error_pattern(e).unwrap();
        }
        set
    }

    #[test]
    fn defaults_compile() {
        let set = RegexRuleSet::with_defaults();
        assert_eq!(set.error_patterns().len(), DEFAULT_ERROR_PATTERNS.len());
        assert_eq!(set.warning_patterns().len(), DEFAULT_WARNING_PATTERNS.len());
    }

    #[test]
    fn defaults_recognise_msvc_output() {
        let set = RegexRuleSet::with_defaults();
        assert_eq!(
            set.classify(r"1>c:\src\main.cpp(12): error C2065: 'x': undeclared identifier"),
            LineClass::Error
        );
        assert_eq!(
            set.classify("2>LINK : fatal error LNK1120: 1 unresolved externals"),
            LineClass::Error
        );
        assert_eq!(set.classify("3>Build FAILED."), LineClass::Normal);
        assert_eq!(set.classify("3>Build FAILED"), LineClass::Error);
        assert_eq!(
            set.classify(r"1>c:\src\util.cpp(7): warning C4996: 'strcpy': This function may be unsafe"),
            LineClass::Warning
        );
        assert_eq!(
            set.classify("========== Build: 1 succeeded, 0 failed =========="),
            LineClass::Normal
        );
    }

    #[test]
    fn matching_both_lists_is_error() {
        let set = rules(&[".*problem.*"], &[".*problem.*"]);
        assert_eq!(set.classify("a problem here"), LineClass::Error);
    }

    #[test]
    fn matching_neither_list_is_normal() {
        let set = rules(&["WARN.*"], &["ERR.*"]);
        assert_eq!(set.classify("all good"), LineClass::Normal);
    }

    #[test]
    fn patterns_match_whole_line_only() {
        let set = rules(&[], &["error"]);
        assert_eq!(set.classify("error"), LineClass::Error);
        assert_eq!(set.classify("an error occurred"), LineClass::Normal);
    }

    #[test]
    fn alternation_is_anchored_as_a_group() {
        let set = rules(&[], &["foo|bar"]);
        assert_eq!(set.classify("bar"), LineClass::Error);
        assert_eq!(set.classify("foobaz"), LineClass::Normal);
        assert_eq!(set.classify("xbar"), LineClass::Normal);
    }

    #[test]
    fn empty_rule_set_is_all_normal() {
        assert_eq!(RegexRuleSet::new().classify("error C1: x"), LineClass::Normal);
    }

    #[test]
    fn invalid_pattern_names_pattern() {
        let err = RegexRuleSet::new().add_error_pattern("(unclosed").unwrap_err();
        assert!(err.to_string().contains("(unclosed"), "error was: {err}");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_wins_whenever_both_match(line in "[a-z ]{0,40}") {
                let set = rules(&[".*"], &[".*"]);
                prop_assert_eq!(set.classify(&line), LineClass::Error);
            }

            #[test]
            fn defaults_never_panic(line in ".{0,200}") {
                let _ = RegexRuleSet::with_defaults().classify(&line);
            }
        }
    }
}
