//! Cross checks hard dependencies against the active set.
//!
//! The completer only reads the aggregation, active set and catalog so it can run on the same snapshot
//! as, and at the same time as, [`load_order::sort()`](crate::load_order::sort()).

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::package::{ActiveSet, Catalog, PackageId, Provenance, TargetVersion};
use crate::rules::Aggregation;

/// A package in the catalog that could be activated to satisfy a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCandidate {
	pub id: PackageId,
	pub name: String,
	pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
	/// An alternative identifier of the dependency is active, nothing to do.
	SatisfiedByAlternative(PackageId),
	/// The dependency, or one of its alternatives, is in the catalog but not active.
	AvailableLocally(Vec<LocalCandidate>),
	/// Nothing in the catalog can satisfy the dependency.
	RequiresAcquisition,
}

/// A dependency that isn't active itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStatus {
	pub dependency: PackageId,
	/// Active packages depending on it, in active order.
	pub required_by: Vec<PackageId>,
	pub availability: Availability,
}

impl DependencyStatus {
	pub fn is_satisfied_by_alternative(&self) -> bool {
		matches!(self.availability, Availability::SatisfiedByAlternative(_))
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
	pub entries: BTreeMap<PackageId, DependencyStatus>,
	/// Active packages whose declared game versions don't include the target.
	pub unsupported_version: Vec<PackageId>,
}

impl DependencyReport {
	/// Dependencies that are not satisfied, not even by an alternative.
	pub fn missing(&self) -> impl Iterator<Item = &DependencyStatus> {
		self.entries.values().filter(|s| !s.is_satisfied_by_alternative())
	}

	/// Dependencies satisfied through an alternative identifier.
	pub fn substituted(&self) -> impl Iterator<Item = &DependencyStatus> {
		self.entries.values().filter(|s| s.is_satisfied_by_alternative())
	}

	pub fn is_satisfied(&self) -> bool {
		self.missing().next().is_none()
	}

	/// The first local candidate of every dependency that is available locally.
	pub fn activatable(&self) -> Vec<PackageId> {
		self.entries.values()
			.filter_map(|s| match &s.availability {
				Availability::AvailableLocally(candidates) => candidates.first().map(|c| c.id.clone()),
				_ => None,
			})
			.collect()
	}
}

/// Produces the [`DependencyReport`] for `active`.
///
/// For every dependency `b` of an active package:
/// 1. `b` is active, satisfied.
/// 1. an alternative of `b` (from the catalog) is active, satisfied by substitution.
/// 1. `b` or an alternative is in the catalog, available locally.
/// 1. otherwise it requires acquisition.
pub fn complete(aggregation: &Aggregation, active: &ActiveSet, catalog: &Catalog, target: Option<&TargetVersion>) -> DependencyReport {
	let mut report = DependencyReport::default();

	for id in active {
		let Some(rules) = aggregation.get(id) else { continue };
		for dependency in &rules.dependencies.value {
			if dependency == id || active.contains(dependency) {
				continue;
			}

			if let Some(status) = report.entries.get_mut(dependency) {
				status.required_by.push(id.clone());
				continue;
			}

			let availability = availability(dependency, active, catalog);
			match &availability {
				Availability::SatisfiedByAlternative(alt) => log::debug!("{} dependency {} satisfied by {}", id, dependency, alt),
				Availability::AvailableLocally(_) => log::info!("{} depends on {} which is installed but not active", id, dependency),
				Availability::RequiresAcquisition => log::warn!("{} depends on {} which is not installed", id, dependency),
			}
			report.entries.insert(dependency.clone(), DependencyStatus {
				dependency: dependency.clone(),
				required_by: vec![id.clone()],
				availability,
			});
		}
	}

	if let Some(target) = target {
		for id in active {
			if let Some(package) = catalog.get(id) {
				if !package.supports(target) {
					log::warn!("{} does not declare support for {}", id, target);
					report.unsupported_version.push(id.clone());
				}
			}
		}
	}

	report
}

fn availability(dependency: &PackageId, active: &ActiveSet, catalog: &Catalog) -> Availability {
	let active_alternative = catalog.alternatives_of(dependency)
		.filter_map(|alt| active.position(alt).map(|p| (p, alt)))
		.min_by_key(|(p, _)| *p);
	if let Some((_, alt)) = active_alternative {
		return Availability::SatisfiedByAlternative(alt.clone())
	}

	let candidates: Vec<LocalCandidate> = std::iter::once(dependency)
		.chain(catalog.alternatives_of(dependency))
		.filter_map(|id| catalog.get(id))
		.map(|p| LocalCandidate { id: p.id.clone(), name: p.name.clone(), provenance: p.provenance })
		.collect();

	if candidates.is_empty() {
		Availability::RequiresAcquisition
	} else {
		Availability::AvailableLocally(candidates)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::Package;
	use crate::rules::{aggregate, RuleDocument, RuleEntry, RuleField, RuleSource};

	fn report(deps: &[(&str, &[&str])], active: &[&str], catalog: Vec<Package>) -> DependencyReport {
		let mut doc = RuleDocument::new(RuleSource::Manifest, "manifest");
		for (id, d) in deps {
			doc = doc.with_entry(*id, RuleEntry::default().with_ids(RuleField::Dependencies, d.iter().copied()));
		}
		let target = TargetVersion::new("1.4");
		let aggregation = aggregate([&doc], &target);
		complete(&aggregation, &ActiveSet::new(active.iter().copied()).unwrap(), &catalog.into_iter().collect(), Some(&target))
	}

	#[test]
	fn missing_from_catalog_requires_acquisition() {
		let r = report(&[("a", &["c"])], &["a", "b"], vec![Package::new("a", "A"), Package::new("b", "B")]);
		let c = &r.entries[&PackageId::new("c")];
		assert_eq!(c.availability, Availability::RequiresAcquisition);
		assert_eq!(c.required_by, [PackageId::new("a")]);
		assert!(!r.is_satisfied());
	}

	#[test]
	fn active_alternative_satisfies() {
		let r = report(&[("a", &["b"])], &["a", "b-fork"], vec![
			Package::new("a", "A"),
			Package::new("b", "B").alternative_ids(["b-fork"]),
			Package::new("b-fork", "B Fork"),
		]);
		assert!(r.is_satisfied());
		assert_eq!(r.substituted().count(), 1);
		assert_eq!(r.entries[&PackageId::new("b")].availability, Availability::SatisfiedByAlternative(PackageId::new("b-fork")));
	}

	#[test]
	fn inactive_catalog_package_is_available_locally() {
		let r = report(&[("a", &["b"]), ("c", &["b"])], &["a", "c"], vec![
			Package::new("a", "A"),
			Package::new("b", "B").provenance(Provenance::Workshop).alternative_ids(["b-fork"]),
			Package::new("b-fork", "B Fork"),
			Package::new("c", "C"),
		]);
		let b = &r.entries[&PackageId::new("b")];
		assert_eq!(b.required_by, [PackageId::new("a"), PackageId::new("c")]);
		let Availability::AvailableLocally(candidates) = &b.availability else { panic!("expected local candidates") };
		assert_eq!(candidates.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), ["b", "b-fork"]);
		assert_eq!(candidates[0].provenance, Provenance::Workshop);
		assert_eq!(r.activatable(), [PackageId::new("b")]);
	}

	#[test]
	fn active_dependencies_are_not_reported() {
		let r = report(&[("a", &["b", "a"])], &["a", "b"], vec![Package::new("a", "A"), Package::new("b", "B")]);
		assert!(r.entries.is_empty());
	}

	#[test]
	fn unsupported_versions_are_listed() {
		let r = report(&[], &["old", "new", "any"], vec![
			Package::new("old", "Old").supported_versions(["1.2"]),
			Package::new("new", "New").supported_versions(["1.4"]),
			Package::new("any", "Any"),
		]);
		assert_eq!(r.unsupported_version, [PackageId::new("old")]);
	}
}
