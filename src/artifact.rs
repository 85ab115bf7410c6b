//! Profile artifact files: one JSON document per test execution.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::{ProfiledTest, RawProfileSample, RequestMetadata, TestIdentity, TestprofResult};

/// On-disk shape of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileArtifact {
    pub profile: RawProfileSample,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMetadata>,
}

impl ProfileArtifact {
    pub fn read_json(path: &Path) -> TestprofResult<Self> {
        let bytes = std::fs::read(path)?;
        let artifact: ProfileArtifact = serde_json::from_slice(&bytes)?;
        Ok(artifact)
    }
}

/// Writes artifacts into a single target directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    target_dir: PathBuf,
}

impl ArtifactWriter {
    /// Creates the target directory if absent and resolves it to an absolute
    /// path.
    pub fn prepare(target_dir: &Path) -> TestprofResult<Self> {
        Ok(Self {
            target_dir: crate::ensure_target_dir(target_dir)?,
        })
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn path_for(&self, identity: &TestIdentity) -> PathBuf {
        self.target_dir.join(identity.artifact_name())
    }

    /// Writes `profile` to its artifact path, replacing any earlier artifact
    /// of the same test.
    pub fn write<P: ProfiledTest>(
        &self,
        profile: &P,
        meta: Option<&RequestMetadata>,
    ) -> TestprofResult<PathBuf> {
        let path = self.path_for(profile.identity());
        let artifact = ArtifactRef {
            profile: profile.data(),
            meta,
        };
        std::fs::write(&path, serde_json::to_vec(&artifact)?)?;
        Ok(path)
    }
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    profile: &'a RawProfileSample,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a RequestMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CostRecord, Profile};
    use uuid::Uuid;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("testprof-artifact-{name}-{}", Uuid::new_v4()))
    }

    fn profile(wt: u64) -> Profile {
        let data: RawProfileSample = [("main()", CostRecord::new().with("ct", 1).with("wt", wt))]
            .into_iter()
            .collect();
        Profile::new(
            TestIdentity::new("App\\Test\\FooTest", "testBar").with_data_description("case 1"),
            data,
        )
    }

    #[test]
    fn write_uses_identity_file_name() {
        let writer = ArtifactWriter::prepare(&temp_dir("name")).expect("prepare");
        let path = writer.write(&profile(10), None).expect("write");
        assert_eq!(
            path.file_name().and_then(|s| s.to_str()),
            Some("App_Test_FooTest::testBar#case_1.json")
        );
        assert!(path.starts_with(writer.target_dir()));
    }

    #[test]
    fn rewriting_same_identity_overwrites() {
        let dir = temp_dir("overwrite");
        let writer = ArtifactWriter::prepare(&dir).expect("prepare");
        writer.write(&profile(10), None).expect("first");
        let path = writer.write(&profile(20), None).expect("second");

        assert_eq!(crate::list_artifacts(writer.target_dir()).expect("list").len(), 1);
        let artifact = ProfileArtifact::read_json(&path).expect("read");
        assert_eq!(artifact.profile.root().and_then(CostRecord::wt), Some(20));
        assert!(artifact.meta.is_none());
    }

    #[test]
    fn meta_is_embedded_when_given() {
        let writer = ArtifactWriter::prepare(&temp_dir("meta")).expect("prepare");
        let meta = RequestMetadata {
            url: Some("phpunit".to_string()),
            request_date: "2024-03-05".to_string(),
            ..RequestMetadata::default()
        };
        let path = writer.write(&profile(10), Some(&meta)).expect("write");

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("decode");
        assert_eq!(raw["profile"]["main()"]["wt"], serde_json::json!(10));
        assert_eq!(raw["meta"]["url"], serde_json::json!("phpunit"));
        assert_eq!(
            ProfileArtifact::read_json(&path).expect("read").meta,
            Some(meta)
        );
    }
}
