//! Ordered collections of profiles gathered over a test run.

use crate::{FilteredProfile, Profile, ProfileFilter, TestprofResult};

/// Profiles in test-execution order. Append-only.
#[derive(Debug, Clone, Default)]
pub struct ProfileCollection {
    profiles: Vec<Profile>,
}

impl ProfileCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, profile: Profile) {
        self.profiles.push(profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Profile> {
        self.profiles.iter()
    }

    pub fn as_slice(&self) -> &[Profile] {
        &self.profiles
    }
}

impl FromIterator<Profile> for ProfileCollection {
    fn from_iter<I: IntoIterator<Item = Profile>>(iter: I) -> Self {
        Self {
            profiles: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ProfileCollection {
    type Item = &'a Profile;
    type IntoIter = std::slice::Iter<'a, Profile>;

    fn into_iter(self) -> Self::IntoIter {
        self.profiles.iter()
    }
}

/// Filtered counterpart of a [`ProfileCollection`], one entry per input
/// profile in the same order.
#[derive(Debug, Clone, Default)]
pub struct FilteredProfileCollection {
    profiles: Vec<FilteredProfile>,
}

impl FilteredProfileCollection {
    /// Filters every profile. Under [`MalformedEdgePolicy::Reject`] the first
    /// profile holding a malformed edge key fails the whole call, since no
    /// element may be dropped; per-test recovery belongs to the listener,
    /// which has already logged that test when it ended.
    ///
    /// [`MalformedEdgePolicy::Reject`]: crate::MalformedEdgePolicy::Reject
    pub fn from_profile_collection(
        profiles: &ProfileCollection,
        filter: &ProfileFilter,
    ) -> TestprofResult<Self> {
        let profiles = profiles
            .iter()
            .map(|profile| FilteredProfile::from_profile(profile, filter))
            .collect::<TestprofResult<Vec<_>>>()?;
        Ok(Self { profiles })
    }

    pub fn as_slice(&self) -> &[FilteredProfile] {
        &self.profiles
    }

    pub fn get(&self, index: usize) -> Option<&FilteredProfile> {
        self.profiles.get(index)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FilteredProfile> {
        self.profiles.iter()
    }

    pub fn into_vec(self) -> Vec<FilteredProfile> {
        self.profiles
    }
}

impl<'a> IntoIterator for &'a FilteredProfileCollection {
    type Item = &'a FilteredProfile;
    type IntoIter = std::slice::Iter<'a, FilteredProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.profiles.iter()
    }
}
