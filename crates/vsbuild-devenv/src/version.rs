//! Visual Studio version strings.

use std::fmt;
use std::str::FromStr;

use crate::error::DevEnvError;

/// A Visual Studio version as written in `vsbuild.toml`.
///
/// Two spellings are accepted:
/// - `VSnnn` (case-insensitive), the prefix of the `VSnnnCOMNTOOLS`
///   environment variable, e.g. `VS120` for Visual Studio 2013;
/// - `nn.n` or `nn.+`, a vswhere-style version, e.g. `15.0` or `16.+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VsVersion {
    raw: String,
    major: String,
    minor: String,
    range_start: String,
    range_end: String,
}

impl VsVersion {
    /// Parse a version string.
    ///
    /// # Errors
    /// Returns [`DevEnvError::InvalidVersion`] if `version` matches neither spelling.
    pub fn parse(version: &str) -> Result<Self, DevEnvError> {
        let invalid = || DevEnvError::InvalidVersion {
            version: version.to_owned(),
        };
        let trimmed = version.trim();

        let (major, minor, wildcard) = if let Some(digits) = strip_vs_prefix(trimmed) {
            // The trailing zero belongs to the variable naming scheme: VS120 is 12.0.
            let major = digits
                .strip_suffix('0')
                .filter(|m| is_digits(m))
                .ok_or_else(invalid)?;
            (major, "0", true)
        } else {
            let (major, minor) = trimmed.split_once('.').ok_or_else(invalid)?;
            if !is_digits(major) || !(minor == "+" || is_digits(minor)) {
                return Err(invalid());
            }
            (major, minor, minor == "+")
        };

        let major_n: u32 = major.parse().map_err(|_| invalid())?;
        let (range_start, range_end) = if wildcard {
            let next = major_n.checked_add(1).ok_or_else(invalid)?;
            (format!("{major_n}.0"), format!("{next}.0"))
        } else {
            let minor_n: u32 = minor.parse().map_err(|_| invalid())?;
            let next = minor_n.checked_add(1).ok_or_else(invalid)?;
            (format!("{major_n}.{minor_n}"), format!("{major_n}.{next}"))
        };

        Ok(Self {
            raw: version.to_owned(),
            major: major.to_owned(),
            minor: minor.to_owned(),
            range_start,
            range_end,
        })
    }

    pub fn major(&self) -> &str {
        &self.major
    }

    pub fn minor(&self) -> &str {
        &self.minor
    }

    /// The environment variable naming this version's common tools directory,
    /// e.g. `VS120COMNTOOLS`.
    pub fn env_var_name(&self) -> String {
        format!("VS{}0COMNTOOLS", self.major)
    }

    /// The half-open version range passed to `vswhere -version`, e.g. `[12.0,13.0)`.
    pub fn vswhere_range(&self) -> String {
        format!("[{},{})", self.range_start, self.range_end)
    }

    pub fn range_start(&self) -> &str {
        &self.range_start
    }

    pub fn range_end(&self) -> &str {
        &self.range_end
    }

    /// Key under which a resolved devenv location is cached.
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.major, self.minor)
    }
}

impl FromStr for VsVersion {
    type Err = DevEnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn strip_vs_prefix(s: &str) -> Option<&str> {
    s.get(..2)
        .filter(|prefix| prefix.eq_ignore_ascii_case("vs"))
        .and_then(|_| s.get(2..))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
