//! Kahn's algorithm with a stable tie break.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::prelude::*;

use super::*;

/// Orders the packages of a verified acyclic graph.
///
/// Among all nodes whose predecessors are already placed the one with the lowest rank is placed next,
/// so unconstrained packages keep the order they were given in and sorting an already sorted list changes nothing.
/// The sentinels are dropped from the output.
pub fn topological_order(verified: Verified<'_>, ranks: &[usize]) -> Vec<PackageId> {
	let graph = verified.graph();
	let g = &graph.graph;

	let mut in_degree = vec![0usize; g.node_count()];
	for e in g.edge_references() {
		in_degree[e.target().index()] += 1;
	}

	let mut ready = BinaryHeap::new();
	for n in g.node_indices() {
		if in_degree[n.index()] == 0 {
			ready.push(Reverse((ranks[n.index()], n)));
		}
	}

	let mut order = Vec::with_capacity(g.node_count().saturating_sub(2));
	let mut placed = 0;
	while let Some(Reverse((_, n))) = ready.pop() {
		placed += 1;
		if let NodeData::Package(id) = &g[n] {
			log::trace!("placing {}", id);
			order.push(id.clone());
		}
		for e in g.edges_directed(n, Outgoing) {
			let t = e.target().index();
			in_degree[t] -= 1;
			if in_degree[t] == 0 {
				ready.push(Reverse((ranks[t], e.target())));
			}
		}
	}
	debug_assert_eq!(placed, g.node_count(), "verified graph was not acyclic");

	order
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::{Package, TargetVersion};
	use crate::rules::{aggregate, RuleDocument, RuleEntry, ForcePosition};

	fn sorted(entries: Vec<(&str, RuleEntry)>, active: &[&str], mode: SortMode) -> Vec<String> {
		let mut doc = RuleDocument::new(RuleSource::Manifest, "manifest");
		for (id, entry) in entries {
			doc = doc.with_entry(id, entry);
		}
		let aggregation = aggregate([&doc], &TargetVersion::new("1.4"));
		let active = ActiveSet::new(active.iter().copied()).unwrap();
		let catalog = active.iter().map(|id| Package::new(id.clone(), id.as_str())).collect::<Catalog>();
		match sort(&aggregation, &active, &catalog, mode).result {
			SortResult::Ordered(order) => order.into_iter().map(String::from).collect(),
			SortResult::CyclesFound(cycles) => panic!("unexpected cycles: {}", describe_cycles(&cycles)),
		}
	}

	#[test]
	fn unconstrained_keeps_input_order() {
		assert_eq!(sorted(vec![], &["c", "a", "b"], SortMode::Topological), ["c", "a", "b"]);
	}

	#[test]
	fn alphabetical_mode_breaks_ties_by_identifier() {
		assert_eq!(sorted(vec![], &["c", "a", "b"], SortMode::Alphabetical), ["a", "b", "c"]);
		let entries = vec![("c", RuleEntry::default().with_ids(RuleField::LoadBefore, ["a"]))];
		assert_eq!(sorted(entries, &["c", "a", "b"], SortMode::Alphabetical), ["b", "c", "a"]);
	}

	#[test]
	fn load_before_and_bottom_pin() {
		let entries = vec![
			("y", RuleEntry::default().with_ids(RuleField::LoadBefore, ["x"])),
			("z", RuleEntry::default().with_position(ForcePosition::Bottom)),
		];
		assert_eq!(sorted(entries, &["x", "y", "z"], SortMode::Topological), ["y", "x", "z"]);
	}

	#[test]
	fn pins_keep_their_relative_order() {
		let entries = vec![
			("b1", RuleEntry::default().with_position(ForcePosition::Bottom)),
			("b2", RuleEntry::default().with_position(ForcePosition::Bottom)),
			("t1", RuleEntry::default().with_position(ForcePosition::Top)),
			("t2", RuleEntry::default().with_position(ForcePosition::Top)),
		];
		assert_eq!(
			sorted(entries, &["b2", "m1", "t2", "b1", "m2", "t1"], SortMode::Topological),
			["t2", "t1", "m1", "m2", "b2", "b1"]
		);
	}

	#[test]
	fn dependencies_load_first() {
		let entries = vec![("a", RuleEntry::default().with_ids(RuleField::Dependencies, ["b", "c"]))];
		assert_eq!(sorted(entries, &["a", "b", "c", "d"], SortMode::Topological), ["b", "c", "a", "d"]);
	}
}
