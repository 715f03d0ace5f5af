//! Depth first search for circular constraints, run before any ordering is attempted.

use std::collections::HashSet;

use petgraph::prelude::*;

use super::*;

/// Proof that a [`ConstraintGraph`] was checked and is acyclic.
///
/// Only [`check()`] creates one so the sorter can't be handed an unchecked graph.
#[derive(Debug, Clone, Copy)]
pub struct Verified<'g>(&'g ConstraintGraph);

impl<'g> Verified<'g> {
	pub fn graph(&self) -> &'g ConstraintGraph {
		self.0
	}
}

pub enum CycleCheck<'g> {
	Acyclic(Verified<'g>),
	CyclesFound(Vec<Cycle>),
}

/// Checks `graph` for cycles. See [`find_cycles()`].
pub fn check<'g>(graph: &'g ConstraintGraph, ranks: &[usize]) -> CycleCheck<'g> {
	let cycles = find_cycles(graph, ranks);
	if cycles.is_empty() {
		CycleCheck::Acyclic(Verified(graph))
	} else {
		CycleCheck::CyclesFound(cycles)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
	Unvisited,
	OnStack,
	Done,
}

struct Frame {
	node: NodeIndex,
	/// Edge used to reach `node`, `None` for roots.
	via: Option<EdgeIndex>,
	successors: Vec<(NodeIndex, EdgeIndex)>,
	next: usize,
}

/// Finds the circular constraints in `graph`.
///
/// Every back edge found by the search is reported as the slice of the search stack from its
/// target to its source, so independent cycles are all reported rather than only the first.
/// Roots and successors are visited in `ranks` order to keep the report deterministic.
pub fn find_cycles(graph: &ConstraintGraph, ranks: &[usize]) -> Vec<Cycle> {
	let g = &graph.graph;
	let successors = |n: NodeIndex| {
		let mut s: Vec<(NodeIndex, EdgeIndex)> = g.edges_directed(n, Outgoing).map(|e| (e.target(), e.id())).collect();
		s.sort_by_key(|(t, e)| (ranks[t.index()], e.index()));
		s
	};

	let mut roots: Vec<NodeIndex> = g.node_indices().collect();
	roots.sort_by_key(|n| ranks[n.index()]);

	let mut marks = vec![Mark::Unvisited; g.node_count()];
	let mut seen = HashSet::<Vec<NodeIndex>>::new();
	let mut cycles = Vec::new();

	for root in roots {
		if marks[root.index()] != Mark::Unvisited {
			continue;
		}
		marks[root.index()] = Mark::OnStack;
		let mut stack = vec![Frame { node: root, via: None, successors: successors(root), next: 0 }];

		while let Some(frame) = stack.last_mut() {
			let Some(&(target, edge)) = frame.successors.get(frame.next) else {
				marks[frame.node.index()] = Mark::Done;
				stack.pop();
				continue;
			};
			frame.next += 1;

			match marks[target.index()] {
				Mark::Unvisited => {
					marks[target.index()] = Mark::OnStack;
					stack.push(Frame { node: target, via: Some(edge), successors: successors(target), next: 0 });
				},
				Mark::OnStack => {
					let start = stack.iter().rposition(|f| f.node == target).unwrap_or(0);
					let path = &stack[start..];
					let nodes: Vec<NodeIndex> = path.iter().map(|f| f.node).collect();
					if !seen.insert(nodes) {
						continue;
					}
					/* Each node leaves through the edge that reached the next frame, the last one through the back edge */
					let links = path.iter().enumerate().map(|(i, f)| {
						let leaving = path.get(i + 1).and_then(|next| next.via).unwrap_or(edge);
						CycleLink { node: g[f.node].clone(), edge: g[leaving].clone() }
					}).collect();
					let cycle = Cycle { links };
					log::debug!("found cycle {}", cycle);
					cycles.push(cycle);
				},
				Mark::Done => {},
			}
		}
	}

	cycles
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::{Package, TargetVersion};
	use crate::rules::{aggregate, RuleDocument, RuleEntry, ForcePosition};

	fn graph(entries: Vec<(&str, RuleEntry)>, active: &[&str]) -> (ConstraintGraph, Vec<usize>) {
		let mut doc = RuleDocument::new(RuleSource::Community, "community");
		for (id, entry) in entries {
			doc = doc.with_entry(id, entry);
		}
		let aggregation = aggregate([&doc], &TargetVersion::new("1.4"));
		let active = ActiveSet::new(active.iter().copied()).unwrap();
		let catalog = active.iter().map(|id| Package::new(id.clone(), id.as_str())).collect::<Catalog>();
		let graph = ConstraintGraph::build(&aggregation, &active, &catalog);
		let ranks = graph.tie_break_ranks(&active, SortMode::Topological);
		(graph, ranks)
	}

	fn before(ids: &[&str]) -> RuleEntry {
		RuleEntry::default().with_ids(RuleField::LoadBefore, ids.iter().copied())
	}

	fn names(cycle: &Cycle) -> Vec<&str> {
		cycle.packages().into_iter().map(|p| p.as_str()).collect()
	}

	#[test]
	fn two_node_cycle() {
		let (g, ranks) = graph(vec![("a", before(&["b"])), ("b", before(&["a"]))], &["a", "b", "c"]);
		let cycles = find_cycles(&g, &ranks);
		assert_eq!(cycles.len(), 1);
		assert_eq!(names(&cycles[0]), ["a", "b"]);
		assert!(petgraph::algo::is_cyclic_directed(&g.graph));
	}

	#[test]
	fn three_node_cycle_keeps_edge_labels() {
		let (g, ranks) = graph(vec![("a", before(&["b"])), ("b", before(&["c"])), ("c", before(&["a"]))], &["a", "b", "c", "d"]);
		let cycles = find_cycles(&g, &ranks);
		assert_eq!(cycles.len(), 1);
		assert_eq!(names(&cycles[0]), ["a", "b", "c"]);
		let declared: Vec<_> = cycles[0].links.iter().map(|l| l.edge.declared_by.as_ref().unwrap().as_str()).collect();
		assert_eq!(declared, ["a", "b", "c"]);
		assert!(cycles[0].links.iter().all(|l| l.edge.source == Some(RuleSource::Community)));
	}

	#[test]
	fn independent_cycles_are_all_reported() {
		let (g, ranks) = graph(vec![
			("a", before(&["b"])), ("b", before(&["a"])),
			("c", before(&["d"])), ("d", before(&["c"])),
		], &["a", "b", "c", "d"]);
		let cycles = find_cycles(&g, &ranks);
		assert_eq!(cycles.len(), 2);
		assert_eq!(names(&cycles[0]), ["a", "b"]);
		assert_eq!(names(&cycles[1]), ["c", "d"]);
	}

	#[test]
	fn acyclic_graph_agrees_with_petgraph() {
		let (g, ranks) = graph(vec![("a", before(&["b"])), ("b", before(&["c"]))], &["c", "b", "a"]);
		assert!(find_cycles(&g, &ranks).is_empty());
		assert!(!petgraph::algo::is_cyclic_directed(&g.graph));
		assert!(matches!(check(&g, &ranks), CycleCheck::Acyclic(_)));
	}

	#[test]
	fn pin_contradicted_by_rule_is_a_cycle_through_the_sentinel() {
		let (g, ranks) = graph(vec![
			("a", RuleEntry::default().with_position(ForcePosition::Top).with_ids(RuleField::LoadAfter, ["b"])),
		], &["a", "b"]);
		let cycles = find_cycles(&g, &ranks);
		assert_eq!(cycles.len(), 1);
		assert!(cycles[0].links.iter().any(|l| l.node == NodeData::Top));
		assert_eq!(names(&cycles[0]), ["b", "a"]);
	}
}
