//! Computing a load order from the aggregated rules and the active package list.
//!
//! # Usage
//! 1. [`aggregate()`](crate::rules::aggregate()) the rule documents for the target version.
//! 1. [`sort()`] the active set with the aggregation to get a [`SortReport`].
//! 1. [`SortResult::Ordered`] holds the order, [`SortResult::CyclesFound`] the circular constraints that prevented one.
//!
//! # Process
//! The graph is rebuilt for every call, see [`ConstraintGraph::build()`].
//! Cycle detection gates the sort, a cyclic graph is never ordered and no constraint is ever silently dropped
//! to produce an order.

use serde::{Serialize, Deserialize};

use crate::package::{ActiveSet, Catalog, PackageId};
use crate::rules::{Aggregation, RuleField, RuleSource};
use crate::config::SortMode;

mod constraint_graph;
pub use constraint_graph::ConstraintGraph;
pub use constraint_graph::NodeData;

mod cycle_detector;
pub use cycle_detector::check as check_cycles;
pub use cycle_detector::CycleCheck;
pub use cycle_detector::Verified;
pub use cycle_detector::find_cycles;

mod sorter;
pub use sorter::topological_order;

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
	/// Derived from a rule field of the declaring package.
	Rule(RuleField),
	/// Keeps an unpinned package between the `TOP` and `BOTTOM` sentinels.
	Sentinel,
}

/// Label carried by every edge of the [`ConstraintGraph`] for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeLabel {
	pub kind: EdgeKind,
	/// The package whose rules produced the edge.
	pub declared_by: Option<PackageId>,
	pub source: Option<RuleSource>,
	/// Set when the rule came from a version specific variant.
	pub version_key: Option<String>,
}

impl EdgeLabel {
	pub(crate) fn sentinel() -> Self {
		Self { kind: EdgeKind::Sentinel, declared_by: None, source: None, version_key: None }
	}
}

impl std::fmt::Display for EdgeLabel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match (&self.kind, &self.declared_by) {
			(EdgeKind::Rule(field), Some(by)) => {
				write!(f, "{} of {}", field, by)?;
				if let Some(source) = self.source { write!(f, ", {}", source)?; }
				if let Some(key) = &self.version_key { write!(f, ", version {}", key)?; }
				Ok(())
			},
			(EdgeKind::Rule(field), None) => write!(f, "{}", field),
			(EdgeKind::Sentinel, _) => f.write_str("unpinned package"),
		}
	}
}

/// One step of a cycle, `node` must load before the next node of the cycle because of `edge`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleLink {
	pub node: NodeData,
	pub edge: EdgeLabel,
}

/// A circular chain of constraints, the last link leads back to the first node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
	pub links: Vec<CycleLink>,
}

impl Cycle {
	/// The real packages taking part in the cycle, in cycle order.
	pub fn packages(&self) -> Vec<&PackageId> {
		self.links.iter().filter_map(|l| l.node.package()).collect()
	}
}

impl std::fmt::Display for Cycle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		for link in &self.links {
			write!(f, "{} -[{}]-> ", link.node, link.edge)?;
		}
		match self.links.first() {
			Some(first) => write!(f, "{}", first.node),
			None => Ok(()),
		}
	}
}

pub(crate) fn describe_cycles(cycles: &[Cycle]) -> String {
	cycles.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("; ")
}

/// Two active packages that declare they can't be loaded together.
///
/// Ordering can't fix this, the caller has to deactivate one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incompatibility {
	pub declared_by: PackageId,
	pub conflicts_with: PackageId,
	pub source: Option<RuleSource>,
}

/// A rule naming a package that isn't in the catalog at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownTarget {
	pub declared_by: PackageId,
	pub field: RuleField,
	pub target: PackageId,
}

/// Either the order or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortResult {
	Ordered(Vec<PackageId>),
	CyclesFound(Vec<Cycle>),
}

impl SortResult {
	pub fn order(&self) -> Option<&[PackageId]> {
		match self {
			SortResult::Ordered(order) => Some(order),
			SortResult::CyclesFound(_) => None,
		}
	}

	/// # Errors
	/// - [`CircularConstraint`](crate::Error::CircularConstraint) when cycles were found.
	pub fn into_order(self) -> crate::Result<Vec<PackageId>> {
		match self {
			SortResult::Ordered(order) => Ok(order),
			SortResult::CyclesFound(cycles) => Err(crate::Error::CircularConstraint(cycles)),
		}
	}
}

/// Everything one sort produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortReport {
	pub result: SortResult,
	/// Incompatible pairs that are both active, reported once per pair.
	pub conflicts: Vec<Incompatibility>,
	/// Rules that reference packages missing from the catalog, these produced no edge.
	pub unknown_targets: Vec<UnknownTarget>,
}

/// Runs graph construction, cycle detection and, if the graph is acyclic, the sort.
pub fn sort(aggregation: &Aggregation, active: &ActiveSet, catalog: &Catalog, mode: SortMode) -> SortReport {
	let graph = ConstraintGraph::build(aggregation, active, catalog);
	let ranks = graph.tie_break_ranks(active, mode);

	let result = match cycle_detector::check(&graph, &ranks) {
		CycleCheck::Acyclic(verified) => {
			let order = topological_order(verified, &ranks);
			log::info!("sorted {} packages", order.len());
			SortResult::Ordered(order)
		},
		CycleCheck::CyclesFound(cycles) => {
			for cycle in &cycles {
				log::warn!("circular constraint: {}", cycle);
			}
			SortResult::CyclesFound(cycles)
		},
	};

	let ConstraintGraph { conflicts, unknown_targets, .. } = graph;
	SortReport { result, conflicts, unknown_targets }
}
