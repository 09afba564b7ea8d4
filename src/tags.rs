//! Resource tag composition.
//!
//! Every resource starts from the same base tags and overlays its own
//! `Name`. Overlays always produce a fresh [`TagSet`]; the base is never
//! touched.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::Configuration;

/// Tag key recording the deployment environment.
pub const ENVIRONMENT_TAG: &str = "rs:environment";
/// Tag key recording the resource owner.
pub const OWNER_TAG: &str = "rs:owner";
/// Tag key recording the billing project.
pub const PROJECT_TAG: &str = "rs:project";
/// Tag key holding the display name of a resource.
pub const NAME_TAG: &str = "Name";

const ENVIRONMENT: &str = "development";
const PROJECT: &str = "solutions";

/// Immutable set of string tags attached to a resource.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Base tags shared by every resource in the stack.
    #[must_use]
    pub fn base(config: &Configuration) -> Self {
        [
            (ENVIRONMENT_TAG, ENVIRONMENT),
            (OWNER_TAG, config.email()),
            (PROJECT_TAG, PROJECT),
        ]
        .into_iter()
        .collect()
    }

    /// Returns a copy of this set with `Name` set to `name`.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut tags = self.0.clone();
        tags.insert(NAME_TAG.to_owned(), name.into());
        Self(tags)
    }

    /// Returns a copy of this set overlaid with `other`. Keys present in both
    /// take the value from `other`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut tags = self.0.clone();
        tags.extend(
            other
                .0
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        Self(tags)
    }

    /// Looks up a tag value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of tags in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for TagSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
