//! Building the directed constraint graph, an edge `a -> b` means `a` must load before `b`.

use std::collections::{BTreeSet, HashMap};

use petgraph::prelude::*;
use serde::{Serialize, Deserialize};

use super::*;
use crate::rules::{EffectiveRuleSet, ForcePosition};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeData {
	/// An active package.
	Package(PackageId),
	/// Sentinel separating packages pinned to the top from everything else.
	Top,
	/// Sentinel separating packages pinned to the bottom from everything else.
	Bottom,
}

impl NodeData {
	pub fn package(&self) -> Option<&PackageId> {
		match self {
			NodeData::Package(id) => Some(id),
			NodeData::Top | NodeData::Bottom => None,
		}
	}
}

impl std::fmt::Display for NodeData {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			NodeData::Package(id) => write!(f, "{}", id),
			NodeData::Top => f.write_str("TOP"),
			NodeData::Bottom => f.write_str("BOTTOM"),
		}
	}
}

/// Constraint graph over the active packages.
///
/// # Sentinels
/// The graph always contains a `TOP` and a `BOTTOM` node and every package sits in one of three bands:
///
/// `pinned top -> TOP -> unpinned -> BOTTOM -> pinned bottom`
///
/// Pinned packages only have an edge to (or from) their sentinel, unpinned packages have both sentinel edges.
/// A rule that contradicts a pin, such as a top package loading after an unpinned one, shows up as a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintGraph {
	pub graph: DiGraph<NodeData, EdgeLabel>,
	pub top: NodeIndex,
	pub bottom: NodeIndex,
	nodes: HashMap<PackageId, NodeIndex>,
	pub conflicts: Vec<Incompatibility>,
	pub unknown_targets: Vec<UnknownTarget>,
}

impl ConstraintGraph {
	/// Builds the graph for `active`.
	///
	/// - `dependencies(a) ∋ b` and `loadAfter(a) ∋ b` give `b -> a`.
	/// - `loadBefore(a) ∋ b` gives `a -> b`.
	/// - `incompatibleWith` gives no edge, active pairs are recorded in `conflicts`.
	/// - Rules naming inactive packages give no edge, ones naming packages missing from `catalog` are recorded in `unknown_targets`.
	pub fn build(aggregation: &Aggregation, active: &ActiveSet, catalog: &Catalog) -> Self {
		let mut graph = DiGraph::<NodeData, EdgeLabel>::with_capacity(active.len() + 2, active.len() * 3);
		let top = graph.add_node(NodeData::Top);
		let bottom = graph.add_node(NodeData::Bottom);
		let nodes = active.iter()
			.map(|id| (id.clone(), graph.add_node(NodeData::Package(id.clone()))))
			.collect::<HashMap<_, _>>();

		let mut this = Self {
			graph,
			top,
			bottom,
			nodes,
			conflicts: Default::default(),
			unknown_targets: Default::default(),
		};

		let empty = EffectiveRuleSet::default();
		let mut seen_conflicts = BTreeSet::<(PackageId, PackageId)>::new();

		for id in active {
			let src = this.nodes[id];
			let rules = aggregation.get(id).unwrap_or(&empty);

			this.add_position_edges(id, src, rules);

			for field in [RuleField::Dependencies, RuleField::LoadAfter, RuleField::LoadBefore] {
				let Some(effective) = rules.ids(field) else { continue };
				for other in &effective.value {
					if other == id {
						log::warn!("{} names itself in {}, ignoring", id, field);
						continue;
					}
					let Some(&dst) = this.nodes.get(other) else {
						this.note_missing_target(catalog, id, field, other);
						continue;
					};
					let label = EdgeLabel {
						kind: EdgeKind::Rule(field),
						declared_by: Some(id.clone()),
						source: effective.source,
						version_key: effective.version_key.clone(),
					};
					match field {
						RuleField::LoadBefore => { this.graph.add_edge(src, dst, label); },
						_ => { this.graph.add_edge(dst, src, label); },
					}
				}
			}

			for other in &rules.incompatible_with.value {
				if other == id {
					continue;
				}
				if !this.nodes.contains_key(other) {
					this.note_missing_target(catalog, id, RuleField::IncompatibleWith, other);
					continue;
				}
				let pair = if id < other { (id.clone(), other.clone()) } else { (other.clone(), id.clone()) };
				if seen_conflicts.insert(pair) {
					log::warn!("{} is incompatible with {}, both are active", id, other);
					this.conflicts.push(Incompatibility {
						declared_by: id.clone(),
						conflicts_with: other.clone(),
						source: rules.incompatible_with.source,
					});
				}
			}
		}

		log::debug!("constraint graph has {} nodes and {} edges", this.graph.node_count(), this.graph.edge_count());
		this
	}

	fn add_position_edges(&mut self, id: &PackageId, src: NodeIndex, rules: &EffectiveRuleSet) {
		let position = &rules.force_load_position;
		let pinned = |field| EdgeLabel {
			kind: EdgeKind::Rule(field),
			declared_by: Some(id.clone()),
			source: position.source,
			version_key: position.version_key.clone(),
		};
		match position.value {
			ForcePosition::Top => { self.graph.add_edge(src, self.top, pinned(RuleField::ForceLoadPosition)); },
			ForcePosition::Bottom => { self.graph.add_edge(self.bottom, src, pinned(RuleField::ForceLoadPosition)); },
			ForcePosition::None => {
				self.graph.add_edge(self.top, src, EdgeLabel::sentinel());
				self.graph.add_edge(src, self.bottom, EdgeLabel::sentinel());
			},
		}
	}

	fn note_missing_target(&mut self, catalog: &Catalog, id: &PackageId, field: RuleField, target: &PackageId) {
		if catalog.contains(target) {
			log::trace!("{} {} {} is not active, no edge", id, field, target);
		} else {
			log::warn!("{} {} references unknown package {}, no edge", id, field, target);
			self.unknown_targets.push(UnknownTarget { declared_by: id.clone(), field, target: target.clone() });
		}
	}

	pub fn node_index(&self, id: &PackageId) -> Option<NodeIndex> {
		self.nodes.get(id).copied()
	}

	/// Tie break rank of every node, indexed by `NodeIndex::index()`.
	///
	/// `TOP` ranks first and `BOTTOM` last. Packages rank by their position in `active`
	/// or, for [`SortMode::Alphabetical`], by identifier.
	pub fn tie_break_ranks(&self, active: &ActiveSet, mode: SortMode) -> Vec<usize> {
		let mut ranks = vec![0; self.graph.node_count()];
		let ordered: Vec<&PackageId> = match mode {
			SortMode::Topological => active.iter().collect(),
			SortMode::Alphabetical => {
				let mut ids: Vec<&PackageId> = active.iter().collect();
				ids.sort();
				ids
			},
		};
		for (i, id) in ordered.into_iter().enumerate() {
			ranks[self.nodes[id].index()] = i + 1;
		}
		ranks[self.top.index()] = 0;
		ranks[self.bottom.index()] = active.len() + 1;
		ranks
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::{Package, TargetVersion};
	use crate::rules::{aggregate, RuleDocument, RuleEntry};

	fn build(entries: Vec<(&str, RuleEntry)>, active: &[&str], catalog: &[&str]) -> ConstraintGraph {
		let mut doc = RuleDocument::new(RuleSource::User, "user");
		for (id, entry) in entries {
			doc = doc.with_entry(id, entry);
		}
		let aggregation = aggregate([&doc], &TargetVersion::new("1.4"));
		let catalog = catalog.iter().map(|id| Package::new(*id, *id)).collect::<Catalog>();
		ConstraintGraph::build(&aggregation, &ActiveSet::new(active.iter().copied()).unwrap(), &catalog)
	}

	fn has_edge(graph: &ConstraintGraph, from: &str, to: &str) -> bool {
		let (Some(a), Some(b)) = (graph.node_index(&from.into()), graph.node_index(&to.into())) else { return false };
		graph.graph.contains_edge(a, b)
	}

	#[test]
	fn edges_follow_rule_direction() {
		let graph = build(vec![
			("a", RuleEntry::default().with_ids(RuleField::Dependencies, ["b"])),
			("c", RuleEntry::default().with_ids(RuleField::LoadBefore, ["a"])),
			("d", RuleEntry::default().with_ids(RuleField::LoadAfter, ["c"])),
		], &["a", "b", "c", "d"], &["a", "b", "c", "d"]);

		assert!(has_edge(&graph, "b", "a"));
		assert!(has_edge(&graph, "c", "a"));
		assert!(has_edge(&graph, "c", "d"));
		assert!(!has_edge(&graph, "a", "b"));
	}

	#[test]
	fn inactive_targets_are_dropped_and_unknown_ones_recorded() {
		let graph = build(vec![
			("a", RuleEntry::default().with_ids(RuleField::LoadAfter, ["inactive", "nowhere"])),
		], &["a"], &["a", "inactive"]);

		/* TOP -> a -> BOTTOM only */
		assert_eq!(graph.graph.edge_count(), 2);
		assert_eq!(graph.unknown_targets.len(), 1);
		assert_eq!(graph.unknown_targets[0].target.as_str(), "nowhere");
	}

	#[test]
	fn incompatible_pairs_are_reported_once() {
		let graph = build(vec![
			("a", RuleEntry::default().with_ids(RuleField::IncompatibleWith, ["b"])),
			("b", RuleEntry::default().with_ids(RuleField::IncompatibleWith, ["a"])),
		], &["a", "b"], &["a", "b"]);
		assert_eq!(graph.conflicts.len(), 1);
		assert_eq!(graph.graph.edge_count(), 4);
	}

	#[test]
	fn pinned_packages_attach_to_their_sentinel_only() {
		let graph = build(vec![
			("a", RuleEntry::default().with_position(ForcePosition::Top)),
			("b", RuleEntry::default().with_position(ForcePosition::Bottom)),
		], &["a", "b", "c"], &["a", "b", "c"]);
		let (a, b, c) = (graph.node_index(&"a".into()).unwrap(), graph.node_index(&"b".into()).unwrap(), graph.node_index(&"c".into()).unwrap());
		assert!(graph.graph.contains_edge(a, graph.top));
		assert!(!graph.graph.contains_edge(graph.top, a));
		assert!(graph.graph.contains_edge(graph.bottom, b));
		assert!(!graph.graph.contains_edge(b, graph.bottom));
		assert!(graph.graph.contains_edge(graph.top, c));
		assert!(graph.graph.contains_edge(c, graph.bottom));
	}

	#[test]
	fn alphabetical_ranks_ignore_active_order() {
		let graph = build(vec![], &["c", "a", "b"], &[]);
		let ranks = graph.tie_break_ranks(&ActiveSet::new(["c", "a", "b"]).unwrap(), SortMode::Alphabetical);
		assert_eq!(ranks[graph.node_index(&"a".into()).unwrap().index()], 1);
		assert_eq!(ranks[graph.node_index(&"c".into()).unwrap().index()], 3);
		assert_eq!(ranks[graph.bottom.index()], 4);
	}
}
