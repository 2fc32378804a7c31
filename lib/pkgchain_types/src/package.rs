use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// One archive entry: name, version, and the content digest of the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub hash: Hash,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            hash,
        }
    }
}

/// A tracked archive: origin + suite + version plus its sorted package list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub origin: String,
    pub suite: String,
    pub version: String,
    pub packages: Vec<Package>,
    pub source_url: String,
}

impl Repository {
    /// Builds a Repository, sorting `packages` by name as the data model requires.
    pub fn new(
        origin: impl Into<String>,
        suite: impl Into<String>,
        version: impl Into<String>,
        mut packages: Vec<Package>,
        source_url: impl Into<String>,
    ) -> Self {
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            origin: origin.into(),
            suite: suite.into(),
            version: version.into(),
            packages,
            source_url: source_url.into(),
        }
    }

    /// Identity key: `origin + "-" + suite`.
    pub fn identity(&self) -> String {
        format!("{}-{}", self.origin, self.suite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_is_origin_dash_suite() {
        let repo = Repository::new("debian", "stable", "1.0", vec![], "http://example.test");
        assert_eq!(repo.identity(), "debian-stable");
    }

    #[test]
    fn constructor_sorts_packages_by_name() {
        let packages = vec![
            Package::new("zlib", "1.2", Hash::ZERO),
            Package::new("ace", "0.1", Hash::ZERO),
        ];
        let repo = Repository::new("debian", "stable", "1.0", packages, "http://example.test");
        assert_eq!(repo.packages[0].name, "ace");
        assert_eq!(repo.packages[1].name, "zlib");
    }
}
