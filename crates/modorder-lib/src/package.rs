//! Various types associated with packages.
//!
//! Packages are handed to the core by the metadata scanner as read only snapshots,
//! nothing in this crate mutates or persists them.

use std::collections::BTreeSet;
use serde::*;

use crate::rules::RuleEntry;

/// A unique, case normalized identifier for packages.
///
/// Identifiers are trimmed and lowercased on construction so `Author.Mod` and `author.mod` are the same package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
	pub fn new(id: impl AsRef<str>) -> Self {
		Self(id.as_ref().trim().to_lowercase())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for PackageId {
	fn from(value: String) -> Self { Self::new(value) }
}

impl From<&str> for PackageId {
	fn from(value: &str) -> Self { Self::new(value) }
}

impl From<PackageId> for String {
	fn from(value: PackageId) -> Self { value.0 }
}

impl AsRef<str> for PackageId {
	fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for PackageId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Where a package was acquired from.
///
/// Informational only, the core reports it so callers can tell the user where a missing package lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
	/// Shipped with the game itself.
	Expansion,
	/// Installed manually into the local mods folder.
	#[default] Local,
	/// Subscribed through the workshop client.
	Workshop,
	/// Cloned from a version control repository.
	Git,
}

/// A mod package known to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
	pub id: PackageId,
	pub name: String,
	/// Game versions the package declares support for, empty when unknown.
	pub supported_versions: BTreeSet<String>,
	/// Identifiers that can satisfy a dependency on this package.
	pub alternative_ids: BTreeSet<PackageId>,
	pub provenance: Provenance,
	/// Rules declared by the package's own manifest.
	pub manifest_rules: RuleEntry,
}

impl Package {
	pub fn new(id: impl Into<PackageId>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			supported_versions: Default::default(),
			alternative_ids: Default::default(),
			provenance: Default::default(),
			manifest_rules: Default::default(),
		}
	}

	pub fn supported_versions(mut self, versions: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.supported_versions = versions.into_iter().map(Into::into).collect();
		self
	}

	pub fn alternative_ids(mut self, ids: impl IntoIterator<Item = impl Into<PackageId>>) -> Self {
		self.alternative_ids = ids.into_iter().map(Into::into).collect();
		self
	}

	pub fn provenance(mut self, provenance: Provenance) -> Self {
		self.provenance = provenance;
		self
	}

	pub fn manifest_rules(mut self, rules: RuleEntry) -> Self {
		self.manifest_rules = rules;
		self
	}

	/// Checks if the package declares support for `target`.
	///
	/// Packages that declare no versions at all are assumed to support anything.
	pub fn supports(&self, target: &TargetVersion) -> bool {
		self.supported_versions.is_empty() || self.supported_versions.iter().any(|v| target.matches_key(v))
	}
}

impl std::hash::Hash for Package {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl std::cmp::PartialEq for Package {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl std::cmp::Eq for Package {}

impl AsRef<PackageId> for Package {
	fn as_ref(&self) -> &PackageId {
		&self.id
	}
}

mod game_version;
pub use game_version::GameVersion;
pub use game_version::TargetVersion;

mod catalog;
pub use catalog::Catalog;

mod active_set;
pub use active_set::ActiveSet;
