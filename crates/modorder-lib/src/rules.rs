//! Ordering and compatibility rules as declared by the different rule sources.
//!
//! # Usage
//! 1. Parse each rule document with [`RuleDocument::from_json_str()`], or build the manifest
//! document from a catalog with [`Catalog::manifest_document()`](crate::Catalog::manifest_document()).
//! 1. [`aggregate()`] the documents for a target version to get one [`EffectiveRuleSet`] per package.
//!
//! # Precedence
//! Sources are folded in the order `Manifest < Community < User`. A non empty value from a later
//! source replaces the earlier value entirely, values are never merged.
//! Within one source a non empty version specific variant replaces the base value.

use std::collections::{BTreeMap, BTreeSet};
use serde::*;

use crate::package::{PackageId, TargetVersion};

pub(crate) mod parse;
pub use parse::RuleParseError;

mod aggregate;
pub use aggregate::aggregate;
pub use aggregate::Aggregation;
pub use aggregate::Effective;
pub use aggregate::EffectiveRuleSet;

/// A set of package identifiers as found in list style rule fields.
pub type IdSet = BTreeSet<PackageId>;

/// Where a rule came from.
///
/// The derived `Ord` is the precedence, later variants override earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleSource {
	/// Declared by the package author in the package's own metadata.
	Manifest,
	/// The community curated rules database.
	Community,
	/// Overrides maintained locally by the user.
	User,
}

impl std::fmt::Display for RuleSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			RuleSource::Manifest => "manifest",
			RuleSource::Community => "community rules",
			RuleSource::User => "user rules",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleField {
	Dependencies,
	LoadAfter,
	LoadBefore,
	IncompatibleWith,
	ForceLoadPosition,
}

impl RuleField {
	/// Fields holding a list of package identifiers.
	pub const ID_LISTS: [RuleField; 4] = [RuleField::Dependencies, RuleField::LoadAfter, RuleField::LoadBefore, RuleField::IncompatibleWith];

	/// The key used for the field in rule documents.
	pub fn key(&self) -> &'static str {
		match self {
			RuleField::Dependencies => "dependencies",
			RuleField::LoadAfter => "loadAfter",
			RuleField::LoadBefore => "loadBefore",
			RuleField::IncompatibleWith => "incompatibleWith",
			RuleField::ForceLoadPosition => "forceLoadPosition",
		}
	}
}

impl std::fmt::Display for RuleField {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.key())
	}
}

/// A pin to the very start or very end of the load order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForcePosition {
	#[default] None,
	Top,
	Bottom,
}

/// Values that can be absent in a rule document.
///
/// Only non empty values take part in precedence.
pub trait RuleContent {
	fn is_unset(&self) -> bool;
}

impl RuleContent for IdSet {
	fn is_unset(&self) -> bool { self.is_empty() }
}

impl RuleContent for ForcePosition {
	fn is_unset(&self) -> bool { *self == ForcePosition::None }
}

/// One field of a rule entry, a base value plus per target version variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleValue<T> {
	pub base: T,
	pub by_version: BTreeMap<String, T>,
}

impl<T: RuleContent> RuleValue<T> {
	pub fn new(base: T) -> Self {
		Self { base, by_version: Default::default() }
	}

	/// Finds the value that applies to `target`.
	///
	/// Returns the variant key alongside the value when a version specific variant was used.
	/// `None` when neither a variant nor the base value is set.
	pub fn resolve(&self, target: &TargetVersion) -> Option<(&T, Option<&str>)> {
		let keys = self.by_version.iter()
			.filter(|(_, v)| !v.is_unset())
			.map(|(k, _)| k.as_str());
		if let Some(key) = target.select_key(keys) {
			if let Some(value) = self.by_version.get(key) {
				return Some((value, Some(key)))
			}
		}
		if self.base.is_unset() {
			None
		} else {
			Some((&self.base, None))
		}
	}

	pub fn is_unset(&self) -> bool {
		self.base.is_unset() && self.by_version.values().all(|v| v.is_unset())
	}
}

/// All the rules one source declares for one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
	/// Free text, ignored by the algorithm.
	pub comment: Option<String>,
	pub dependencies: RuleValue<IdSet>,
	pub load_after: RuleValue<IdSet>,
	pub load_before: RuleValue<IdSet>,
	pub incompatible_with: RuleValue<IdSet>,
	pub force_load_position: RuleValue<ForcePosition>,
}

impl RuleEntry {
	/// The list value of `field`, `None` for [`RuleField::ForceLoadPosition`].
	pub fn ids(&self, field: RuleField) -> Option<&RuleValue<IdSet>> {
		match field {
			RuleField::Dependencies => Some(&self.dependencies),
			RuleField::LoadAfter => Some(&self.load_after),
			RuleField::LoadBefore => Some(&self.load_before),
			RuleField::IncompatibleWith => Some(&self.incompatible_with),
			RuleField::ForceLoadPosition => None,
		}
	}

	pub fn ids_mut(&mut self, field: RuleField) -> Option<&mut RuleValue<IdSet>> {
		match field {
			RuleField::Dependencies => Some(&mut self.dependencies),
			RuleField::LoadAfter => Some(&mut self.load_after),
			RuleField::LoadBefore => Some(&mut self.load_before),
			RuleField::IncompatibleWith => Some(&mut self.incompatible_with),
			RuleField::ForceLoadPosition => None,
		}
	}

	/// Sets the base value of a list field.
	pub fn with_ids(mut self, field: RuleField, ids: impl IntoIterator<Item = impl Into<PackageId>>) -> Self {
		match self.ids_mut(field) {
			Some(value) => value.base = ids.into_iter().map(Into::into).collect(),
			None => log::warn!("`{}` does not hold package identifiers, ignoring", field),
		}
		self
	}

	/// Sets the variant of a list field for `version`.
	pub fn with_version_ids(mut self, field: RuleField, version: impl Into<String>, ids: impl IntoIterator<Item = impl Into<PackageId>>) -> Self {
		match self.ids_mut(field) {
			Some(value) => { value.by_version.insert(version.into(), ids.into_iter().map(Into::into).collect()); },
			None => log::warn!("`{}` does not hold package identifiers, ignoring", field),
		}
		self
	}

	pub fn with_position(mut self, position: ForcePosition) -> Self {
		self.force_load_position.base = position;
		self
	}

	pub fn with_version_position(mut self, version: impl Into<String>, position: ForcePosition) -> Self {
		self.force_load_position.by_version.insert(version.into(), position);
		self
	}

	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}

	pub fn is_unset(&self) -> bool {
		RuleField::ID_LISTS.iter().filter_map(|f| self.ids(*f)).all(|v| v.is_unset())
			&& self.force_load_position.is_unset()
	}
}

/// One rule document, every entry is keyed by the package it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
	pub source: RuleSource,
	/// Human readable name of the document for diagnostics, usually a file name.
	pub label: String,
	pub entries: BTreeMap<PackageId, RuleEntry>,
	/// Entries rejected while parsing the document.
	pub errors: Vec<RuleParseError>,
}

impl RuleDocument {
	pub fn new(source: RuleSource, label: impl Into<String>) -> Self {
		Self {
			source,
			label: label.into(),
			entries: Default::default(),
			errors: Default::default(),
		}
	}

	pub fn with_entry(mut self, id: impl Into<PackageId>, entry: RuleEntry) -> Self {
		self.entries.insert(id.into(), entry);
		self
	}

	pub fn get(&self, id: &PackageId) -> Option<&RuleEntry> {
		self.entries.get(id)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn ids(v: &[&str]) -> IdSet {
		v.iter().map(|s| PackageId::new(s)).collect()
	}

	#[test]
	fn source_precedence_is_manifest_community_user() {
		assert!(RuleSource::Manifest < RuleSource::Community);
		assert!(RuleSource::Community < RuleSource::User);
	}

	#[test]
	fn version_variant_replaces_base() {
		let value = RuleValue { base: ids(&["a", "b"]), by_version: [("1.4".to_string(), ids(&["c"]))].into() };
		let (resolved, key) = value.resolve(&TargetVersion::new("1.4")).unwrap();
		assert_eq!(resolved, &ids(&["c"]));
		assert_eq!(key, Some("1.4"));
		let (resolved, key) = value.resolve(&TargetVersion::new("1.3")).unwrap();
		assert_eq!(resolved, &ids(&["a", "b"]));
		assert_eq!(key, None);
	}

	#[test]
	fn empty_variant_falls_back_to_base() {
		let value = RuleValue { base: ids(&["a"]), by_version: [("1.4".to_string(), ids(&[]))].into() };
		assert_eq!(value.resolve(&TargetVersion::new("1.4")).unwrap().0, &ids(&["a"]));
	}

	#[test]
	fn unset_value_resolves_to_nothing() {
		let value = RuleValue::<ForcePosition>::default();
		assert!(value.resolve(&TargetVersion::new("1.4")).is_none());
		assert!(value.is_unset());
	}

	#[test]
	fn entry_builder_ignores_position_as_list() {
		let entry = RuleEntry::default().with_ids(RuleField::ForceLoadPosition, ["a"]);
		assert!(entry.is_unset());
	}
}
