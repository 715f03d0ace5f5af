//! The owned, versioned state the pipeline runs against.
//!
//! Callers edit a [`ModList`] and hand out immutable [`Snapshot`]s to run the pipeline on,
//! possibly on other threads. Every edit bumps the revision so a result computed from an older snapshot
//! can be recognised and dropped with [`ModList::accept()`] instead of cancelling the work in flight.

use std::sync::Arc;

use crate::config::SortMode;
use crate::dependency_completer::{self, DependencyReport};
use crate::load_order::{self, SortReport};
use crate::package::{ActiveSet, Catalog, PackageId, TargetVersion};
use crate::rules::{self, Aggregation, RuleDocument, RuleParseError};

/// Everything one pipeline run reads. Never changes once created.
#[derive(Debug, Clone)]
pub struct Snapshot {
	revision: u64,
	pub catalog: Catalog,
	/// Community and user documents, the manifest document is taken from `catalog`.
	pub documents: Vec<RuleDocument>,
	pub active: ActiveSet,
	pub target: TargetVersion,
	pub sort_mode: SortMode,
}

/// The output of [`Snapshot::plan()`].
#[derive(Debug, Clone)]
pub struct Plan {
	pub revision: u64,
	pub sort: SortReport,
	pub dependencies: DependencyReport,
	pub parse_errors: Vec<RuleParseError>,
}

impl Snapshot {
	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// Aggregates the manifest rules of the catalog and the snapshot's documents.
	pub fn aggregate(&self) -> Aggregation {
		let manifest = self.catalog.manifest_document();
		rules::aggregate(std::iter::once(&manifest).chain(self.documents.iter()), &self.target)
	}

	pub fn sort(&self, aggregation: &Aggregation) -> SortReport {
		load_order::sort(aggregation, &self.active, &self.catalog, self.sort_mode)
	}

	pub fn complete(&self, aggregation: &Aggregation) -> DependencyReport {
		dependency_completer::complete(aggregation, &self.active, &self.catalog, Some(&self.target))
	}

	/// Aggregates once then runs both the sort and the dependency completer.
	pub fn plan(&self) -> Plan {
		let aggregation = self.aggregate();
		let sort = self.sort(&aggregation);
		let dependencies = self.complete(&aggregation);
		Plan {
			revision: self.revision,
			sort,
			dependencies,
			parse_errors: aggregation.errors,
		}
	}
}

/// The caller's mutable mod list.
#[derive(Debug, Clone)]
pub struct ModList {
	revision: u64,
	catalog: Catalog,
	documents: Vec<RuleDocument>,
	active: ActiveSet,
	target: TargetVersion,
	sort_mode: SortMode,
	snapshot: Option<Arc<Snapshot>>,
}

impl ModList {
	pub fn new(catalog: Catalog, active: ActiveSet, target: TargetVersion) -> Self {
		Self {
			revision: 0,
			catalog,
			documents: Default::default(),
			active,
			target,
			sort_mode: Default::default(),
			snapshot: None,
		}
	}

	fn touch(&mut self) {
		self.revision += 1;
		self.snapshot = None;
	}

	pub fn revision(&self) -> u64 {
		self.revision
	}

	pub fn active(&self) -> &ActiveSet {
		&self.active
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	pub fn target(&self) -> &TargetVersion {
		&self.target
	}

	/// Returns false when nothing changed.
	pub fn activate(&mut self, id: impl Into<PackageId>) -> bool {
		let changed = self.active.activate(id.into());
		if changed { self.touch(); }
		changed
	}

	pub fn deactivate(&mut self, id: &PackageId) -> bool {
		let changed = self.active.deactivate(id);
		if changed { self.touch(); }
		changed
	}

	pub fn move_to(&mut self, id: &PackageId, index: usize) -> bool {
		let changed = self.active.move_to(id, index);
		if changed { self.touch(); }
		changed
	}

	pub fn set_target_version(&mut self, target: TargetVersion) -> bool {
		if self.target == target {
			return false
		}
		self.target = target;
		self.touch();
		true
	}

	pub fn set_sort_mode(&mut self, sort_mode: SortMode) -> bool {
		if self.sort_mode == sort_mode {
			return false
		}
		self.sort_mode = sort_mode;
		self.touch();
		true
	}

	pub fn set_rule_documents(&mut self, documents: Vec<RuleDocument>) {
		self.documents = documents;
		self.touch();
	}

	pub fn set_catalog(&mut self, catalog: Catalog) {
		self.catalog = catalog;
		self.touch();
	}

	/// Replaces the active order with `order`, usually a sort result.
	///
	/// # Errors
	/// - [`Validation`](crate::Error::Validation) when `order` isn't a permutation of the active set.
	pub fn apply_order(&mut self, order: &[PackageId]) -> crate::Result<()> {
		let reordered = ActiveSet::new(order.iter().cloned())?;
		if reordered.len() != self.active.len() || !self.active.iter().all(|id| reordered.contains(id)) {
			return Err(crate::Error::Validation("order does not hold exactly the active packages".to_string()))
		}
		self.active = reordered;
		self.touch();
		Ok(())
	}

	/// Activates the first local candidate of every dependency the report found available locally.
	///
	/// Returns the newly activated identifiers, the pipeline should be run again afterwards.
	pub fn activate_available(&mut self, report: &DependencyReport) -> Vec<PackageId> {
		let mut activated = Vec::new();
		for id in report.activatable() {
			if self.active.activate(id.clone()) {
				log::info!("activating {}", id);
				activated.push(id);
			}
		}
		if !activated.is_empty() {
			self.touch();
		}
		activated
	}

	/// An immutable snapshot of the current revision, shared until the next edit.
	pub fn snapshot(&mut self) -> Arc<Snapshot> {
		if let Some(snapshot) = &self.snapshot {
			return snapshot.clone()
		}
		let snapshot = Arc::new(Snapshot {
			revision: self.revision,
			catalog: self.catalog.clone(),
			documents: self.documents.clone(),
			active: self.active.clone(),
			target: self.target.clone(),
			sort_mode: self.sort_mode,
		});
		self.snapshot = Some(snapshot.clone());
		snapshot
	}

	/// Hands `plan` back only if it was computed from the current revision.
	///
	/// # Errors
	/// - [`StaleSnapshot`](crate::Error::StaleSnapshot) when the list was edited after the snapshot was taken.
	pub fn accept(&self, plan: Plan) -> crate::Result<Plan> {
		if plan.revision == self.revision {
			Ok(plan)
		} else {
			log::debug!("dropping plan for revision {}, current is {}", plan.revision, self.revision);
			Err(crate::Error::StaleSnapshot { expected: self.revision, found: plan.revision })
		}
	}
}
