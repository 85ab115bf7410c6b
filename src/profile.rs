//! Call-graph samples bound to the test execution that produced them.

use serde::{Deserialize, Serialize};

use crate::{ProfileFilter, RawProfileSample, TestprofResult};

/// Identity of one test execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestIdentity {
    pub class_name: String,
    pub method_name: String,
    /// Distinguishes data-driven invocations of the same method. Empty when
    /// the test is not data-driven.
    #[serde(default)]
    pub data_description: String,
}

impl TestIdentity {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            data_description: String::new(),
        }
    }

    pub fn with_data_description(mut self, description: impl Into<String>) -> Self {
        self.data_description = description.into();
        self
    }

    pub fn is_data_driven(&self) -> bool {
        !self.data_description.is_empty()
    }

    /// File name of the artifact for this test. Stable across runs.
    pub fn artifact_name(&self) -> String {
        let mut id = format!(
            "{}::{}",
            self.class_name.replace(['\\', '/'], "_"),
            self.method_name.replace(['\\', '/'], "_")
        );
        if self.is_data_driven() {
            id.push('#');
            id.push_str(&self.data_description.replace([' ', '\\', '/'], "_"));
        }
        id.push_str(".json");
        id
    }
}

/// A test execution whose call graph can be written out.
pub trait ProfiledTest {
    fn identity(&self) -> &TestIdentity;

    fn data(&self) -> &RawProfileSample;

    fn test_class_name(&self) -> &str {
        &self.identity().class_name
    }

    fn test_method_name(&self) -> &str {
        &self.identity().method_name
    }

    fn test_data_description(&self) -> &str {
        &self.identity().data_description
    }
}

/// Unfiltered call graph of one test execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    identity: TestIdentity,
    data: RawProfileSample,
}

impl Profile {
    pub fn new(identity: TestIdentity, data: RawProfileSample) -> Self {
        Self { identity, data }
    }
}

impl ProfiledTest for Profile {
    fn identity(&self) -> &TestIdentity {
        &self.identity
    }

    fn data(&self) -> &RawProfileSample {
        &self.data
    }
}

/// Call graph of one test execution with infrastructure edges removed.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredProfile {
    identity: TestIdentity,
    data: RawProfileSample,
}

impl FilteredProfile {
    pub fn from_profile(profile: &Profile, filter: &ProfileFilter) -> TestprofResult<Self> {
        Ok(Self {
            identity: profile.identity.clone(),
            data: filter.filter(&profile.data)?,
        })
    }
}

impl ProfiledTest for FilteredProfile {
    fn identity(&self) -> &TestIdentity {
        &self.identity
    }

    fn data(&self) -> &RawProfileSample {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CostRecord;

    #[test]
    fn artifact_name_sanitizes_namespaces() {
        let id = TestIdentity::new("App\\Test\\FooTest", "testBar");
        assert_eq!(id.artifact_name(), "App_Test_FooTest::testBar.json");
    }

    #[test]
    fn artifact_name_appends_data_description() {
        let id = TestIdentity::new("App\\Test\\FooTest", "testBar").with_data_description("case 1");
        assert!(id.is_data_driven());
        assert_eq!(id.artifact_name(), "App_Test_FooTest::testBar#case_1.json");
    }

    #[test]
    fn artifact_name_never_contains_path_separators() {
        let id = TestIdentity::new("a/b\\C", "m/../n\\o").with_data_description("x/y\\z w");
        let name = id.artifact_name();
        assert!(!name.contains('/') && !name.contains('\\'), "{name}");
        assert_eq!(name, "a_b_C::m_.._n_o#x_y_z_w.json");

        let plain = TestIdentity::new("App\\FooTest", "a/b");
        assert_eq!(plain.artifact_name(), "App_FooTest::a_b.json");
    }

    #[test]
    fn filtered_profile_keeps_identity_and_leaves_source_untouched() {
        let raw: RawProfileSample = [
            ("main()", CostRecord::default()),
            ("PHPUnit\\Runner::run==>App\\A::b", CostRecord::default()),
        ]
        .into_iter()
        .collect();
        let profile = Profile::new(
            TestIdentity::new("App\\ATest", "testB").with_data_description("one"),
            raw.clone(),
        );
        let filtered =
            FilteredProfile::from_profile(&profile, &ProfileFilter::default()).expect("filter");

        assert_eq!(filtered.test_class_name(), "App\\ATest");
        assert_eq!(filtered.test_method_name(), "testB");
        assert_eq!(filtered.test_data_description(), "one");
        assert_eq!(filtered.data().len(), 1);
        assert_eq!(profile.data(), &raw);
    }
}
