//! `testprof.toml` config loading.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::{MalformedEdgePolicy, PrefixMatch, ProfileFilter, TestprofResult};

/// Which sample ends up in the written artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactMode {
    #[default]
    Filtered,
    Unfiltered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Directory receiving one artifact per test execution.
    #[serde(default = "default_target_dir")]
    pub target_dir: PathBuf,

    #[serde(default)]
    pub mode: ArtifactMode,

    /// Symbol prefixes treated as test infrastructure.
    #[serde(default = "crate::default_ignored_prefixes")]
    pub ignored_prefixes: Vec<String>,

    #[serde(default)]
    pub prefix_match: PrefixMatch,

    #[serde(default)]
    pub malformed_edges: MalformedEdgePolicy,

    /// Embed request/environment metadata in artifacts.
    #[serde(default = "default_include_meta")]
    pub include_meta: bool,

    /// Fail at startup instead of running without profiling.
    #[serde(default)]
    pub require_profiler: bool,
}

fn default_target_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_include_meta() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_dir: default_target_dir(),
            mode: ArtifactMode::default(),
            ignored_prefixes: crate::default_ignored_prefixes(),
            prefix_match: PrefixMatch::default(),
            malformed_edges: MalformedEdgePolicy::default(),
            include_meta: default_include_meta(),
            require_profiler: false,
        }
    }
}

impl Config {
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn profile_filter(&self) -> TestprofResult<ProfileFilter> {
        Ok(ProfileFilter::new(self.ignored_prefixes.iter().cloned())?
            .with_matching(self.prefix_match)
            .with_malformed_policy(self.malformed_edges))
    }
}
