use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("resolution name must not be empty")]
    EmptyName,

    #[error("{subject}: segment_count must be at least 1")]
    ZeroSegments { subject: String },

    #[error("{subject}: window_seconds must be a positive finite number, got {window_seconds}")]
    InvalidWindow { subject: String, window_seconds: f64 },

    #[error("duplicate resolution name '{name}'")]
    DuplicateName { name: String },

    #[error("at least one resolution is required")]
    NoResolutions,

    #[error("invalid resolution '{input}': {reason}")]
    InvalidSpec { input: String, reason: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// One named sliding window: `segment_count` slots covering `window_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub name: String,
    pub window_seconds: f64,
    pub segment_count: usize,
}

impl Resolution {
    pub fn new(name: impl Into<String>, window_seconds: f64, segment_count: usize) -> Self {
        Self {
            name: name.into(),
            window_seconds,
            segment_count,
        }
    }

    /// Simulated seconds between two rotations of the buffer.
    pub fn rotation_period(&self) -> f64 {
        self.window_seconds / self.segment_count as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        check_window(&format!("resolution '{}'", self.name), self.window_seconds, self.segment_count)
    }
}

// Shared with the estimator so a bad window never reaches the rotation loop.
pub(crate) fn check_window(subject: &str, window_seconds: f64, segment_count: usize) -> Result<(), ConfigError> {
    if segment_count == 0 {
        return Err(ConfigError::ZeroSegments {
            subject: subject.to_string(),
        });
    }
    if !window_seconds.is_finite() || window_seconds <= 0.0 {
        return Err(ConfigError::InvalidWindow {
            subject: subject.to_string(),
            window_seconds,
        });
    }
    Ok(())
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}:{}", self.name, self.window_seconds, self.segment_count)
    }
}

impl FromStr for Resolution {
    type Err = ConfigError;

    /// Parses `name=window_seconds:segment_count`, e.g. `10sec=10:10`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidSpec {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (name, rest) = s.split_once('=').ok_or_else(|| invalid("expected NAME=WINDOW:SEGMENTS"))?;
        let (window, segments) = rest
            .split_once(':')
            .ok_or_else(|| invalid("expected WINDOW:SEGMENTS after '='"))?;
        let window_seconds: f64 = window
            .trim()
            .parse()
            .map_err(|_| invalid("window is not a number"))?;
        let segment_count: usize = segments
            .trim()
            .parse()
            .map_err(|_| invalid("segment count is not an unsigned integer"))?;

        let resolution = Resolution::new(name.trim(), window_seconds, segment_count);
        resolution.validate()?;
        Ok(resolution)
    }
}

/// Ordered, non-empty set of resolutions with unique names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolutionSet(Vec<Resolution>);

impl ResolutionSet {
    pub fn new(resolutions: Vec<Resolution>) -> Result<Self, ConfigError> {
        if resolutions.is_empty() {
            return Err(ConfigError::NoResolutions);
        }
        let mut seen = HashSet::new();
        for r in &resolutions {
            r.validate()?;
            if !seen.insert(r.name.as_str()) {
                return Err(ConfigError::DuplicateName { name: r.name.clone() });
            }
        }
        Ok(Self(resolutions))
    }

    pub fn as_slice(&self) -> &[Resolution] {
        &self.0
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|r| r.name.as_str())
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::new(file.resolution)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Explicit resolutions win over a config file, which wins over the defaults.
    pub fn resolve(explicit: &[Resolution], config: Option<&Path>) -> Result<Self, ConfigError> {
        if !explicit.is_empty() {
            return Self::new(explicit.to_vec());
        }
        match config {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

impl Default for ResolutionSet {
    fn default() -> Self {
        Self(vec![
            Resolution::new("1sec", 1.0, 1),
            Resolution::new("10sec", 10.0, 10),
            Resolution::new("1min", 60.0, 60),
        ])
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    resolution: Vec<Resolution>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_form() {
        let r: Resolution = "10sec=10:10".parse().unwrap();
        assert_eq!(r, Resolution::new("10sec", 10.0, 10));
        assert_eq!(r.rotation_period(), 1.0);
    }

    #[test]
    fn parse_fractional_window() {
        let r: Resolution = "half=0.5:2".parse().unwrap();
        assert_eq!(r.rotation_period(), 0.25);
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!(matches!("10sec".parse::<Resolution>(), Err(ConfigError::InvalidSpec { .. })));
        assert!(matches!("10sec=10".parse::<Resolution>(), Err(ConfigError::InvalidSpec { .. })));
        assert!(matches!("x=a:1".parse::<Resolution>(), Err(ConfigError::InvalidSpec { .. })));
        assert!(matches!("x=1:-1".parse::<Resolution>(), Err(ConfigError::InvalidSpec { .. })));
    }

    #[test]
    fn degenerate_windows_rejected() {
        assert!(matches!("x=1:0".parse::<Resolution>(), Err(ConfigError::ZeroSegments { .. })));
        assert!(matches!("x=0:1".parse::<Resolution>(), Err(ConfigError::InvalidWindow { .. })));
        assert!(matches!("x=-5:1".parse::<Resolution>(), Err(ConfigError::InvalidWindow { .. })));
        assert!(matches!("x=inf:1".parse::<Resolution>(), Err(ConfigError::InvalidWindow { .. })));
        assert!(matches!("=1:1".parse::<Resolution>(), Err(ConfigError::EmptyName)));

        let err = "1sec=1:0".parse::<Resolution>().unwrap_err();
        assert_eq!(err.to_string(), "resolution '1sec': segment_count must be at least 1");
    }

    #[test]
    fn default_set_is_the_standard_trio() {
        let set = ResolutionSet::default();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["1sec", "10sec", "1min"]);
        assert!(set.as_slice().iter().all(|r| r.rotation_period() == 1.0));
    }

    #[test]
    fn set_rejects_duplicates_and_empty() {
        let dup = vec![Resolution::new("a", 1.0, 1), Resolution::new("a", 2.0, 2)];
        assert!(matches!(ResolutionSet::new(dup), Err(ConfigError::DuplicateName { .. })));
        assert!(matches!(ResolutionSet::new(vec![]), Err(ConfigError::NoResolutions)));
    }

    #[test]
    fn toml_keeps_declaration_order() {
        let content = r#"
[[resolution]]
name = "5min"
window_seconds = 300.0
segment_count = 30

[[resolution]]
name = "1sec"
window_seconds = 1.0
segment_count = 1
"#;
        let set = ResolutionSet::from_toml_str(content, Path::new("rates.toml")).unwrap();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["5min", "1sec"]);
        assert_eq!(set.as_slice()[0].rotation_period(), 10.0);
    }

    #[test]
    fn toml_errors_carry_path() {
        let err = ResolutionSet::from_toml_str("resolution = 3", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));

        let bad = "[[resolution]]\nname = \"x\"\nwindow_seconds = 1.0\nsegment_count = 0\n";
        let err = ResolutionSet::from_toml_str(bad, Path::new("zero.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroSegments { .. }));
    }

    #[test]
    fn resolve_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.toml");
        std::fs::write(&path, "[[resolution]]\nname = \"f\"\nwindow_seconds = 2.0\nsegment_count = 2\n").unwrap();

        let explicit = vec![Resolution::new("cli", 3.0, 3)];
        let set = ResolutionSet::resolve(&explicit, Some(&path)).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["cli"]);

        let set = ResolutionSet::resolve(&[], Some(&path)).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["f"]);

        let set = ResolutionSet::resolve(&[], None).unwrap();
        assert_eq!(set, ResolutionSet::default());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ResolutionSet::load(Path::new("/nonexistent/rates.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
