//! Boundary to the external call-graph sampler.

use serde::{Deserialize, Serialize};

use std::collections::VecDeque;
use std::ops::BitOr;
use std::path::Path;

use crate::{RawProfileSample, TestprofError, TestprofResult};

/// Instrumentation requested from the sampler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SamplerFlags(u32);

impl SamplerFlags {
    pub const NONE: Self = Self(0);
    pub const CPU: Self = Self(1);
    pub const MEMORY_MU: Self = Self(2);
    pub const MEMORY_PMU: Self = Self(4);
    pub const MEMORY: Self = Self(2 | 4);
    pub const NO_BUILTINS: Self = Self(8);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SamplerFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Flags used for every test session.
pub const SESSION_FLAGS: SamplerFlags = SamplerFlags(SamplerFlags::MEMORY.0 | SamplerFlags::CPU.0);

/// Whether a sampler can actually profile. Resolved once when the pipeline
/// starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SamplerCapability {
    Available,
    Unavailable { reason: String },
}

impl SamplerCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

pub trait Sampler {
    fn capability(&self) -> SamplerCapability;

    fn enable(&mut self, flags: SamplerFlags) -> TestprofResult<()>;

    /// Stops the session started by [`Sampler::enable`] and returns its call
    /// graph.
    fn disable(&mut self) -> TestprofResult<RawProfileSample>;
}

/// Stand-in for a runtime without profiler support.
#[derive(Debug, Clone)]
pub struct UnavailableSampler {
    reason: String,
}

impl UnavailableSampler {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Sampler for UnavailableSampler {
    fn capability(&self) -> SamplerCapability {
        SamplerCapability::Unavailable {
            reason: self.reason.clone(),
        }
    }

    fn enable(&mut self, _flags: SamplerFlags) -> TestprofResult<()> {
        Err(TestprofError::ProfilerUnavailable(self.reason.clone()))
    }

    fn disable(&mut self) -> TestprofResult<RawProfileSample> {
        Err(TestprofError::ProfilerUnavailable(self.reason.clone()))
    }
}

/// Serves previously captured samples, one per session, in order.
#[derive(Debug, Clone, Default)]
pub struct ReplaySampler {
    queue: VecDeque<RawProfileSample>,
    active: Option<SamplerFlags>,
    sessions: usize,
}

impl ReplaySampler {
    pub fn new(samples: impl IntoIterator<Item = RawProfileSample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
            active: None,
            sessions: 0,
        }
    }

    pub fn from_json_files<P: AsRef<Path>>(paths: &[P]) -> TestprofResult<Self> {
        let samples = paths
            .iter()
            .map(|p| RawProfileSample::read_json(p.as_ref()))
            .collect::<TestprofResult<Vec<_>>>()?;
        Ok(Self::new(samples))
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Number of sessions started so far.
    pub fn sessions(&self) -> usize {
        self.sessions
    }

    pub fn active_flags(&self) -> Option<SamplerFlags> {
        self.active
    }
}

impl Sampler for ReplaySampler {
    fn capability(&self) -> SamplerCapability {
        SamplerCapability::Available
    }

    fn enable(&mut self, flags: SamplerFlags) -> TestprofResult<()> {
        if self.active.is_some() {
            return Err(TestprofError::Sampler(
                "sampler session already active".to_string(),
            ));
        }
        self.active = Some(flags);
        self.sessions = self.sessions.saturating_add(1);
        Ok(())
    }

    fn disable(&mut self) -> TestprofResult<RawProfileSample> {
        if self.active.take().is_none() {
            return Err(TestprofError::Sampler(
                "sampler disabled without an active session".to_string(),
            ));
        }
        self.queue
            .pop_front()
            .ok_or_else(|| TestprofError::Sampler("no recorded sample left to replay".to_string()))
    }
}
