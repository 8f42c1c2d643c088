//! Natural-loop discovery.
//!
//! Loops come from back edges (`u → v` where `v` dominates `u`), grouped by
//! header. Each loop records its preheader (the unique out-of-loop
//! predecessor of the header, when there is exactly one), latches, exits,
//! nesting depth, and children.

use crate::cfg::{BlockId, ControlFlowGraph};
use crate::dom::DominatorTree;
use rustc_hash::FxHashSet;

#[derive(Clone, Debug)]
pub struct LoopNode {
    pub header: BlockId,
    pub preheader: Option<BlockId>,
    pub blocks: Vec<BlockId>,
    pub latches: Vec<BlockId>,
    pub exits: Vec<BlockId>,
    pub depth: usize,
    pub children: Vec<usize>,
}

impl LoopNode {
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoopTree {
    nodes: Vec<LoopNode>,
}

impl LoopTree {
    pub fn compute(cfg: &ControlFlowGraph, dom: &DominatorTree) -> LoopTree {
        // Back edges grouped by header.
        let mut headers: Vec<(BlockId, Vec<BlockId>)> = Vec::new();
        for block in cfg.blocks() {
            for &successor in &block.successors {
                if dom.dominates(successor, block.id) {
                    match headers.iter_mut().find(|(h, _)| *h == successor) {
                        Some((_, latches)) => latches.push(block.id),
                        None => headers.push((successor, vec![block.id])),
                    }
                }
            }
        }

        let mut nodes = Vec::with_capacity(headers.len());
        for (header, latches) in headers {
            // Natural loop body: header plus everything that reaches a latch
            // without passing through the header.
            let mut blocks: FxHashSet<BlockId> = FxHashSet::default();
            blocks.insert(header);
            let mut stack: Vec<BlockId> = latches.clone();
            while let Some(block) = stack.pop() {
                if blocks.insert(block) {
                    for &pred in &cfg.block(block).predecessors {
                        stack.push(pred);
                    }
                }
            }

            let preheaders: Vec<BlockId> = cfg
                .block(header)
                .predecessors
                .iter()
                .copied()
                .filter(|pred| !blocks.contains(pred))
                .collect();
            let preheader = match preheaders.as_slice() {
                [single] => Some(*single),
                _ => None,
            };

            let mut exits: Vec<BlockId> = Vec::new();
            for &block in &blocks {
                for &successor in &cfg.block(block).successors {
                    if !blocks.contains(&successor) && !exits.contains(&successor) {
                        exits.push(successor);
                    }
                }
            }

            let mut block_list: Vec<BlockId> = blocks.into_iter().collect();
            block_list.sort_unstable();
            nodes.push(LoopNode {
                header,
                preheader,
                blocks: block_list,
                latches,
                exits,
                depth: 0,
                children: Vec::new(),
            });
        }

        // Nesting: a loop is a child of the smallest strictly-enclosing one.
        let mut parents: Vec<Option<usize>> = vec![None; nodes.len()];
        for i in 0..nodes.len() {
            let mut best: Option<usize> = None;
            for j in 0..nodes.len() {
                if i == j || nodes[i].header == nodes[j].header {
                    continue;
                }
                if nodes[j].contains(nodes[i].header)
                    && nodes[i].blocks.iter().all(|b| nodes[j].contains(*b))
                {
                    best = match best {
                        None => Some(j),
                        Some(current) if nodes[j].blocks.len() < nodes[current].blocks.len() => {
                            Some(j)
                        }
                        other => other,
                    };
                }
            }
            parents[i] = best;
        }
        for i in 0..nodes.len() {
            if let Some(parent) = parents[i] {
                nodes[parent].children.push(i);
            }
        }
        for i in 0..nodes.len() {
            let mut depth = 0;
            let mut current = parents[i];
            while let Some(parent) = current {
                depth += 1;
                current = parents[parent];
            }
            nodes[i].depth = depth;
        }

        LoopTree { nodes }
    }

    pub fn nodes(&self) -> &[LoopNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 → 1(header) → 2 → 3(latch) → 1, 1 → 4(exit).
    fn simple_loop() -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::new();
        for _ in 0..5 {
            cfg.add_block();
        }
        cfg.link(0, 1);
        cfg.link(1, 2);
        cfg.link(2, 3);
        cfg.link(3, 1);
        cfg.link(1, 4);
        cfg
    }

    #[test]
    fn discovers_the_canonical_loop_shape() {
        let cfg = simple_loop();
        let dom = DominatorTree::compute(&cfg);
        let loops = LoopTree::compute(&cfg, &dom);
        assert_eq!(loops.nodes().len(), 1);
        let node = &loops.nodes()[0];
        assert_eq!(node.header, 1);
        assert_eq!(node.preheader, Some(0));
        assert_eq!(node.blocks, vec![1, 2, 3]);
        assert_eq!(node.latches, vec![3]);
        assert_eq!(node.exits, vec![4]);
        assert_eq!(node.depth, 0);
    }

    #[test]
    fn nested_loops_get_depths() {
        // outer: 1..4 with latch 4; inner: 2..3 with latch 3.
        let mut cfg = ControlFlowGraph::new();
        for _ in 0..6 {
            cfg.add_block();
        }
        cfg.link(0, 1);
        cfg.link(1, 2);
        cfg.link(2, 3);
        cfg.link(3, 2); // inner back edge
        cfg.link(3, 4);
        cfg.link(4, 1); // outer back edge
        cfg.link(1, 5);
        let dom = DominatorTree::compute(&cfg);
        let loops = LoopTree::compute(&cfg, &dom);
        assert_eq!(loops.nodes().len(), 2);
        let outer = loops.nodes().iter().find(|n| n.header == 1).unwrap();
        let inner = loops.nodes().iter().find(|n| n.header == 2).unwrap();
        assert_eq!(outer.depth, 0);
        assert_eq!(inner.depth, 1);
        assert_eq!(outer.children.len(), 1);
    }

    #[test]
    fn loop_without_unique_preheader_reports_none() {
        let mut cfg = ControlFlowGraph::new();
        for _ in 0..5 {
            cfg.add_block();
        }
        // Two out-of-loop predecessors of the header.
        cfg.link(0, 2);
        cfg.link(1, 2);
        cfg.link(2, 3);
        cfg.link(3, 2);
        cfg.link(2, 4);
        // Make 1 reachable so dominators see it.
        cfg.link(0, 1);
        let dom = DominatorTree::compute(&cfg);
        let loops = LoopTree::compute(&cfg, &dom);
        let node = loops.nodes().iter().find(|n| n.header == 2).unwrap();
        assert_eq!(node.preheader, None);
    }
}
