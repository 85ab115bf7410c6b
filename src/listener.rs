//! Per-test profiling lifecycle: start the sampler before a test, stop it
//! after, filter the call graph and write the artifact.

use std::path::PathBuf;

use crate::{
    ArtifactMode, ArtifactWriter, Config, FilteredProfile, FilteredProfileCollection,
    MetadataProvider, Profile, ProfileCollection, ProfileFilter, Sampler, SamplerCapability,
    SESSION_FLAGS, TestIdentity, TestprofError, TestprofResult,
};

#[derive(Debug)]
pub struct ProfilingListener<S, M> {
    sampler: S,
    metadata: M,
    capability: SamplerCapability,
    writer: ArtifactWriter,
    filter: ProfileFilter,
    mode: ArtifactMode,
    include_meta: bool,
    active: Option<TestIdentity>,
    profiles: ProfileCollection,
}

impl<S: Sampler, M: MetadataProvider> ProfilingListener<S, M> {
    /// Validates the target directory and resolves the sampler capability.
    /// Both checks happen once, here.
    pub fn new(config: &Config, sampler: S, metadata: M) -> TestprofResult<Self> {
        let writer = ArtifactWriter::prepare(&config.target_dir)?;
        let filter = config.profile_filter()?;

        let capability = sampler.capability();
        if let SamplerCapability::Unavailable { reason } = &capability {
            if config.require_profiler {
                return Err(TestprofError::ProfilerUnavailable(reason.clone()));
            }
            tracing::warn!("profiler unavailable ({reason}), won't produce profiling output");
        }

        Ok(Self {
            sampler,
            metadata,
            capability,
            writer,
            filter,
            mode: config.mode,
            include_meta: config.include_meta,
            active: None,
            profiles: ProfileCollection::new(),
        })
    }

    pub fn capability(&self) -> &SamplerCapability {
        &self.capability
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Unfiltered profiles of every completed test, in completion order.
    pub fn profiles(&self) -> &ProfileCollection {
        &self.profiles
    }

    /// Filtered view of [`Self::profiles`]. With `malformed_edges = "reject"`
    /// a single profile holding a malformed edge key makes this return that
    /// error; the artifacts already written for the other tests are not
    /// affected.
    pub fn filtered_profiles(&self) -> TestprofResult<FilteredProfileCollection> {
        FilteredProfileCollection::from_profile_collection(&self.profiles, &self.filter)
    }

    pub fn into_profiles(self) -> ProfileCollection {
        self.profiles
    }

    pub fn start_test(&mut self, test: &TestIdentity) {
        if !self.capability.is_available() {
            return;
        }
        if let Some(active) = &self.active {
            tracing::warn!(
                "cannot profile {}: session for {} still active",
                test.artifact_name(),
                active.artifact_name()
            );
            return;
        }
        match self.sampler.enable(SESSION_FLAGS) {
            Ok(()) => self.active = Some(test.clone()),
            Err(err) => tracing::warn!("failed to start profiling {}: {err}", test.artifact_name()),
        }
    }

    /// Stops the session for `test` and writes its artifact. Failures are
    /// logged and leave no artifact for this test only.
    pub fn end_test(&mut self, test: &TestIdentity) -> Option<PathBuf> {
        if !self.capability.is_available() {
            return None;
        }
        match self.active.as_ref() {
            Some(active) if active == test => {}
            Some(active) => {
                tracing::warn!(
                    "end of {} does not match active session {}",
                    test.artifact_name(),
                    active.artifact_name()
                );
                return None;
            }
            None => {
                tracing::warn!("end of {} without an active session", test.artifact_name());
                return None;
            }
        }
        self.active = None;

        match self.finish_test(test) {
            Ok(path) => {
                tracing::debug!("wrote profile {}", path.display());
                Some(path)
            }
            Err(err) => {
                tracing::warn!("no profile written for {}: {err}", test.artifact_name());
                None
            }
        }
    }

    fn finish_test(&mut self, test: &TestIdentity) -> TestprofResult<PathBuf> {
        let data = self.sampler.disable()?;
        let meta = self.include_meta.then(|| self.metadata.capture());
        let profile = Profile::new(test.clone(), data);

        let path = match self.mode {
            ArtifactMode::Filtered => {
                let filtered = FilteredProfile::from_profile(&profile, &self.filter);
                // Keep the raw profile even when filtering fails.
                self.profiles.push(profile);
                self.writer.write(&filtered?, meta.as_ref())?
            }
            ArtifactMode::Unfiltered => {
                let path = self.writer.write(&profile, meta.as_ref());
                self.profiles.push(profile);
                path?
            }
        };
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CostRecord, MalformedEdgePolicy, ProfileArtifact, ProfiledTest, RawProfileSample,
        ReplaySampler, RequestMetadata, UnavailableSampler,
    };
    use uuid::Uuid;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("testprof-listener-{name}-{}", Uuid::new_v4()))
    }

    fn config(name: &str) -> Config {
        Config {
            target_dir: temp_dir(name),
            ..Config::default()
        }
    }

    fn meta() -> RequestMetadata {
        RequestMetadata {
            url: Some("phpunit".to_string()),
            request_date: "2024-03-05".to_string(),
            ..RequestMetadata::default()
        }
    }

    fn sample() -> RawProfileSample {
        [
            "main()",
            "Foo\\Bar::baz==>App\\Service::run",
            "PHPUnit\\Framework\\TestCase::run==>App\\Service::run",
            "App\\Service::run==>spl_autoload_call",
        ]
        .into_iter()
        .map(|k| (k, CostRecord::new().with("ct", 1).with("wt", 3)))
        .collect()
    }

    fn run(
        listener: &mut ProfilingListener<ReplaySampler, RequestMetadata>,
        test: &TestIdentity,
    ) -> Option<PathBuf> {
        listener.start_test(test);
        listener.end_test(test)
    }

    #[test]
    fn writes_filtered_artifact_with_meta() {
        let mut listener =
            ProfilingListener::new(&config("filtered"), ReplaySampler::new([sample()]), meta())
                .expect("listener");
        let test = TestIdentity::new("App\\Test\\FooTest", "testBar");
        let path = run(&mut listener, &test).expect("artifact");

        assert_eq!(path, listener.writer().target_dir().join("App_Test_FooTest::testBar.json"));
        let artifact = ProfileArtifact::read_json(&path).expect("read");
        let keys: Vec<&str> = artifact.profile.keys().collect();
        assert_eq!(keys, vec!["Foo\\Bar::baz==>App\\Service::run", "main()"]);
        assert_eq!(artifact.meta, Some(meta()));

        // The collection keeps the raw call graph.
        assert_eq!(listener.profiles().len(), 1);
        assert_eq!(listener.profiles().as_slice()[0].data().len(), 4);
        assert_eq!(
            listener.filtered_profiles().expect("filtered").as_slice()[0].data().len(),
            2
        );
    }

    #[test]
    fn unfiltered_mode_writes_raw_sample_without_meta() {
        let cfg = Config {
            mode: ArtifactMode::Unfiltered,
            include_meta: false,
            ..config("unfiltered")
        };
        let mut listener =
            ProfilingListener::new(&cfg, ReplaySampler::new([sample()]), meta()).expect("listener");
        let path = run(&mut listener, &TestIdentity::new("A", "t")).expect("artifact");

        let artifact = ProfileArtifact::read_json(&path).expect("read");
        assert_eq!(artifact.profile, sample());
        assert!(artifact.meta.is_none());
    }

    #[test]
    fn rerunning_a_test_overwrites_its_artifact() {
        let mut listener = ProfilingListener::new(
            &config("rerun"),
            ReplaySampler::new([sample(), RawProfileSample::new()]),
            meta(),
        )
        .expect("listener");
        let test = TestIdentity::new("App\\FooTest", "testBar").with_data_description("case 1");
        let first = run(&mut listener, &test).expect("first");
        let second = run(&mut listener, &test).expect("second");

        assert_eq!(first, second);
        assert_eq!(crate::list_artifacts(listener.writer().target_dir()).expect("list").len(), 1);
        assert!(ProfileArtifact::read_json(&second).expect("read").profile.is_empty());
        assert_eq!(listener.profiles().len(), 2);
    }

    #[test]
    fn unavailable_sampler_degrades_to_noop() {
        let mut listener = ProfilingListener::new(
            &config("noop"),
            UnavailableSampler::new("extension not loaded"),
            meta(),
        )
        .expect("listener");
        assert!(!listener.capability().is_available());

        let test = TestIdentity::new("A", "t");
        listener.start_test(&test);
        assert!(listener.end_test(&test).is_none());
        assert!(listener.profiles().is_empty());
        assert!(crate::list_artifacts(listener.writer().target_dir()).expect("list").is_empty());
    }

    #[test]
    fn unavailable_sampler_is_fatal_when_required() {
        let cfg = Config {
            require_profiler: true,
            ..config("required")
        };
        let err = ProfilingListener::new(&cfg, UnavailableSampler::new("missing"), meta())
            .expect_err("required");
        assert!(matches!(err, TestprofError::ProfilerUnavailable(_)));
    }

    #[test]
    fn file_as_target_dir_is_rejected() {
        let file = temp_dir("file");
        std::fs::write(&file, b"").expect("write");
        let cfg = Config {
            target_dir: file,
            ..Config::default()
        };
        let err = ProfilingListener::new(&cfg, ReplaySampler::default(), meta()).expect_err("file");
        assert!(matches!(err, TestprofError::InvalidTargetDirectory { .. }));
    }

    #[test]
    fn per_test_failures_do_not_stop_the_run() {
        let cfg = Config {
            malformed_edges: MalformedEdgePolicy::Reject,
            ..config("failures")
        };
        let broken: RawProfileSample = [("broken", CostRecord::default())].into_iter().collect();
        let mut listener =
            ProfilingListener::new(&cfg, ReplaySampler::new([broken, sample()]), meta())
                .expect("listener");

        assert!(run(&mut listener, &TestIdentity::new("A", "broken")).is_none());
        assert!(run(&mut listener, &TestIdentity::new("A", "ok")).is_some());
        // Sampler has nothing left to replay.
        assert!(run(&mut listener, &TestIdentity::new("A", "empty")).is_none());
        assert_eq!(listener.profiles().len(), 2);
        // The rejected profile is still recorded, so the filtered view reports it.
        assert!(matches!(
            listener.filtered_profiles(),
            Err(TestprofError::MalformedEdgeKey(_))
        ));
    }

    #[test]
    fn mismatched_end_is_ignored() {
        let mut listener =
            ProfilingListener::new(&config("mismatch"), ReplaySampler::new([sample()]), meta())
                .expect("listener");
        let a = TestIdentity::new("A", "a");
        let b = TestIdentity::new("A", "b");

        assert!(listener.end_test(&a).is_none());
        listener.start_test(&a);
        listener.start_test(&b);
        assert!(listener.end_test(&b).is_none());
        assert!(listener.end_test(&a).is_some());
        assert_eq!(listener.sampler().sessions(), 1);
    }
}
