//! Folding the rule sources into one effective rule set per package.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use super::*;

/// The winning value of one field and where it came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Effective<T> {
	pub value: T,
	/// `None` when no source set the field.
	pub source: Option<RuleSource>,
	/// The version variant key when a version specific value won.
	pub version_key: Option<String>,
}

impl<T: RuleContent + Clone> Effective<T> {
	/// Overwrites this value with `candidate` if the candidate is set.
	fn overlay(&mut self, source: RuleSource, candidate: Option<(&T, Option<&str>)>) {
		if let Some((value, key)) = candidate {
			self.value = value.clone();
			self.source = Some(source);
			self.version_key = key.map(str::to_string);
		}
	}
}

/// The final rules of one package after applying source and version precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectiveRuleSet {
	pub dependencies: Effective<IdSet>,
	pub load_after: Effective<IdSet>,
	pub load_before: Effective<IdSet>,
	pub incompatible_with: Effective<IdSet>,
	pub force_load_position: Effective<ForcePosition>,
}

impl EffectiveRuleSet {
	pub fn ids(&self, field: RuleField) -> Option<&Effective<IdSet>> {
		match field {
			RuleField::Dependencies => Some(&self.dependencies),
			RuleField::LoadAfter => Some(&self.load_after),
			RuleField::LoadBefore => Some(&self.load_before),
			RuleField::IncompatibleWith => Some(&self.incompatible_with),
			RuleField::ForceLoadPosition => None,
		}
	}

	fn ids_mut(&mut self, field: RuleField) -> Option<&mut Effective<IdSet>> {
		match field {
			RuleField::Dependencies => Some(&mut self.dependencies),
			RuleField::LoadAfter => Some(&mut self.load_after),
			RuleField::LoadBefore => Some(&mut self.load_before),
			RuleField::IncompatibleWith => Some(&mut self.incompatible_with),
			RuleField::ForceLoadPosition => None,
		}
	}

	fn apply(&mut self, source: RuleSource, entry: &RuleEntry, target: &TargetVersion) {
		for field in RuleField::ID_LISTS {
			if let (Some(effective), Some(value)) = (self.ids_mut(field), entry.ids(field)) {
				effective.overlay(source, value.resolve(target));
			}
		}
		self.force_load_position.overlay(source, entry.force_load_position.resolve(target));
	}

	pub fn is_unconstrained(&self) -> bool {
		RuleField::ID_LISTS.iter().filter_map(|f| self.ids(*f)).all(|e| e.value.is_empty())
			&& self.force_load_position.value == ForcePosition::None
	}
}

/// The result of [`aggregate()`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
	pub target: Option<String>,
	pub rule_sets: BTreeMap<PackageId, EffectiveRuleSet>,
	/// Every entry rejected in any of the documents.
	pub errors: Vec<RuleParseError>,
}

impl Aggregation {
	/// Packages no source mentions have no rules at all.
	pub fn get(&self, id: &PackageId) -> Option<&EffectiveRuleSet> {
		self.rule_sets.get(id)
	}
}

/// Merges `documents` into one [`EffectiveRuleSet`] per package referenced by any of them.
///
/// Documents are folded in precedence order of their [`RuleSource`], documents sharing a source
/// keep their relative order so a later one overrides an earlier one.
/// This is a pure function of its inputs, rerun it whenever a document or the target changes.
pub fn aggregate<'d>(documents: impl IntoIterator<Item = &'d RuleDocument>, target: &TargetVersion) -> Aggregation {
	let mut documents: Vec<&RuleDocument> = documents.into_iter().collect();
	/* Stable sort keeps documents of the same source in the given order */
	documents.sort_by_key(|d| d.source);

	let mut aggregation = Aggregation {
		target: Some(target.to_string()),
		..Default::default()
	};

	for document in documents {
		log::trace!("applying {} ({}) for target {}", document.label, document.source, target);
		aggregation.errors.extend(document.errors.iter().cloned());
		for (id, entry) in &document.entries {
			aggregation.rule_sets
				.entry(id.clone())
				.or_default()
				.apply(document.source, entry, target);
		}
	}

	if !aggregation.errors.is_empty() {
		log::warn!("{} rule entries were skipped due to parse errors", aggregation.errors.len());
	}
	log::debug!("aggregated rules for {} packages", aggregation.rule_sets.len());

	aggregation
}

#[cfg(test)]
mod test {
	use super::*;

	fn id(s: &str) -> PackageId { PackageId::new(s) }

	fn documents(manifest: &[&str], community: &[&str], user: &[&str]) -> Vec<RuleDocument> {
		vec![
			RuleDocument::new(RuleSource::User, "user").with_entry("a", RuleEntry::default().with_ids(RuleField::LoadAfter, user.iter().copied())),
			RuleDocument::new(RuleSource::Manifest, "manifest").with_entry("a", RuleEntry::default().with_ids(RuleField::LoadAfter, manifest.iter().copied())),
			RuleDocument::new(RuleSource::Community, "community").with_entry("a", RuleEntry::default().with_ids(RuleField::LoadAfter, community.iter().copied())),
		]
	}

	#[test]
	fn user_wins_over_community_over_manifest() {
		let target = TargetVersion::new("1.4");
		let all = aggregate(&documents(&["m"], &["c"], &["u"]), &target);
		let a = &all.get(&id("a")).unwrap().load_after;
		assert_eq!(a.value, [id("u")].into());
		assert_eq!(a.source, Some(RuleSource::User));

		let no_user = aggregate(&documents(&["m"], &["c"], &[]), &target);
		assert_eq!(no_user.get(&id("a")).unwrap().load_after.value, [id("c")].into());

		let manifest_only = aggregate(&documents(&["m"], &[], &[]), &target);
		assert_eq!(manifest_only.get(&id("a")).unwrap().load_after.source, Some(RuleSource::Manifest));
	}

	#[test]
	fn values_are_replaced_not_merged() {
		let all = aggregate(&documents(&["m1", "m2"], &["c"], &[]), &TargetVersion::new("1.4"));
		assert_eq!(all.get(&id("a")).unwrap().load_after.value, [id("c")].into());
	}

	#[test]
	fn version_variant_in_lower_source_loses_to_higher_base() {
		let docs = [
			RuleDocument::new(RuleSource::Manifest, "manifest").with_entry("a", RuleEntry::default().with_version_ids(RuleField::LoadBefore, "1.4", ["v"])),
			RuleDocument::new(RuleSource::Community, "community").with_entry("a", RuleEntry::default().with_ids(RuleField::LoadBefore, ["c"])),
		];
		let all = aggregate(&docs, &TargetVersion::new("1.4"));
		assert_eq!(all.get(&id("a")).unwrap().load_before.value, [id("c")].into());
	}

	#[test]
	fn fields_are_independent() {
		let docs = [
			RuleDocument::new(RuleSource::Manifest, "manifest").with_entry("a", RuleEntry::default().with_ids(RuleField::Dependencies, ["d"])),
			RuleDocument::new(RuleSource::User, "user").with_entry("a", RuleEntry::default().with_position(ForcePosition::Top)),
		];
		let all = aggregate(&docs, &TargetVersion::new("1.4"));
		let a = all.get(&id("a")).unwrap();
		assert_eq!(a.dependencies.value, [id("d")].into());
		assert_eq!(a.dependencies.source, Some(RuleSource::Manifest));
		assert_eq!(a.force_load_position.value, ForcePosition::Top);
		assert_eq!(a.force_load_position.source, Some(RuleSource::User));
	}

	#[test]
	fn parse_errors_are_carried_into_the_aggregation() {
		let doc = RuleDocument::from_json_str(RuleSource::User, "user.json", r#"{ "a": { "loadAfter": 5 } }"#).unwrap();
		let all = aggregate([&doc], &TargetVersion::new("1.4"));
		assert_eq!(all.errors.len(), 1);
		assert!(all.get(&id("a")).is_none());
	}
}
