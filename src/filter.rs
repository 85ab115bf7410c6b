//! Removal of test-infrastructure edges from call-graph samples.

use serde::{Deserialize, Serialize};

use crate::{Edge, RawProfileSample, ROOT_KEY, TestprofError, TestprofResult};

/// Callee name of the runtime's lazy class-loading hook.
pub const AUTOLOAD_HOOK: &str = "spl_autoload_call";

/// Namespaces of the test framework, its support libraries and the
/// autoloader.
pub const DEFAULT_IGNORED_PREFIXES: &[&str] = &[
    "Composer\\Autoload",
    "DeepCopy",
    "PHPUnit",
    "Prophecy",
    "phpDocumentor\\Reflection",
    "Doctrine\\Instantiator",
    "SebastianBergmann\\CodeCoverage",
    "SebastianBergmann\\Comparator",
    "SebastianBergmann\\Diff",
    "SebastianBergmann\\Environment",
    "SebastianBergmann\\Exporter",
    "SebastianBergmann\\GlobalState",
    "SebastianBergmann\\Invoker",
    "SebastianBergmann\\RecursionContext",
    "SebastianBergmann\\Timer",
    "SebastianBergmann\\Version",
    "File_Iterator",
    "PHP_Invoker",
    "PHP_Timer",
    "PHP_Token",
    "Text_Template",
];

pub fn default_ignored_prefixes() -> Vec<String> {
    DEFAULT_IGNORED_PREFIXES.iter().map(|p| p.to_string()).collect()
}

/// How an ignored prefix is matched against a symbol name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixMatch {
    /// Plain string prefix: `Foo` matches `FooBar\baz`.
    #[default]
    Plain,
    /// The prefix must end at a namespace boundary (`\`, `::`, `_`) or at
    /// the end of the symbol.
    Hierarchical,
}

/// What to do with an edge key that does not split into caller and callee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedEdgePolicy {
    /// Remove the edge and log a warning.
    #[default]
    Drop,
    /// Fail the whole filter call.
    Reject,
}

#[derive(Debug, Clone)]
pub struct ProfileFilter {
    prefixes: Vec<String>,
    matching: PrefixMatch,
    malformed: MalformedEdgePolicy,
}

impl Default for ProfileFilter {
    fn default() -> Self {
        Self {
            prefixes: default_ignored_prefixes(),
            matching: PrefixMatch::default(),
            malformed: MalformedEdgePolicy::default(),
        }
    }
}

impl ProfileFilter {
    pub fn new<I, S>(prefixes: I) -> TestprofResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        if prefixes.is_empty() {
            return Err(TestprofError::InvalidArgument(
                "profile filter needs at least one ignored prefix".to_string(),
            ));
        }
        if prefixes.iter().any(|p| p.is_empty()) {
            return Err(TestprofError::InvalidArgument(
                "ignored prefixes must not be empty strings".to_string(),
            ));
        }
        Ok(Self {
            prefixes,
            matching: PrefixMatch::default(),
            malformed: MalformedEdgePolicy::default(),
        })
    }

    pub fn with_matching(mut self, matching: PrefixMatch) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_malformed_policy(mut self, policy: MalformedEdgePolicy) -> Self {
        self.malformed = policy;
        self
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn matching(&self) -> PrefixMatch {
        self.matching
    }

    pub fn malformed_policy(&self) -> MalformedEdgePolicy {
        self.malformed
    }

    /// Whether `symbol` belongs to one of the ignored namespaces.
    pub fn is_ignored_symbol(&self, symbol: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| self.matches_prefix(symbol, prefix))
    }

    /// Decides whether the edge stored under `key` survives filtering.
    pub fn keeps_edge(&self, key: &str) -> TestprofResult<bool> {
        if key == ROOT_KEY {
            return Ok(true);
        }
        let edge = Edge::parse(key)?;
        Ok(edge.callee != AUTOLOAD_HOOK
            && !self.is_ignored_symbol(edge.caller)
            && !self.is_ignored_symbol(edge.callee))
    }

    /// Returns a copy of `sample` holding only the surviving edges. Costs are
    /// passed through untouched.
    pub fn filter(&self, sample: &RawProfileSample) -> TestprofResult<RawProfileSample> {
        let mut out = RawProfileSample::new();
        for (key, cost) in sample.iter() {
            let keep = match self.keeps_edge(key) {
                Ok(keep) => keep,
                Err(err) => match self.malformed {
                    MalformedEdgePolicy::Drop => {
                        tracing::warn!("dropping edge: {err}");
                        false
                    }
                    MalformedEdgePolicy::Reject => return Err(err),
                },
            };
            if keep {
                out.insert(key, cost.clone());
            }
        }
        Ok(out)
    }

    fn matches_prefix(&self, symbol: &str, prefix: &str) -> bool {
        let Some(rest) = symbol.strip_prefix(prefix) else {
            return false;
        };
        match self.matching {
            PrefixMatch::Plain => true,
            PrefixMatch::Hierarchical => {
                rest.is_empty()
                    || rest.starts_with('\\')
                    || rest.starts_with("::")
                    || rest.starts_with('_')
            }
        }
    }
}
