//! Generic CFG traversal.
//!
//! Depth-first over alive blocks from the entry, with a deferral queue for
//! visitors that cannot finish a block until others have been seen.

use crate::cfg::{BlockId, ControlFlowGraph};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CfgVisitAction {
    Keep,
    Skip,
    Break,
    Defer,
}

pub trait CfgVisitor {
    fn visit(&mut self, block: BlockId, cfg: &mut ControlFlowGraph) -> CfgVisitAction;
}

/// Visit every reachable block depth-first; deferred blocks are revisited
/// after the walk, until none makes progress.
pub fn traverse_cfg<V: CfgVisitor>(cfg: &mut ControlFlowGraph, visitor: &mut V) {
    let mut visited = vec![false; cfg.len()];
    let mut deferred: VecDeque<BlockId> = VecDeque::new();
    let mut stack = vec![ControlFlowGraph::ENTRY];
    if cfg.is_empty() {
        return;
    }
    visited[ControlFlowGraph::ENTRY] = true;

    while let Some(block) = stack.pop() {
        match visitor.visit(block, cfg) {
            CfgVisitAction::Break => return,
            CfgVisitAction::Skip => continue,
            CfgVisitAction::Defer => deferred.push_back(block),
            CfgVisitAction::Keep => {}
        }
        let successors: Vec<BlockId> = cfg.block(block).successors.to_vec();
        for successor in successors.into_iter().rev() {
            if successor < visited.len() && !visited[successor] && cfg.block(successor).is_alive() {
                visited[successor] = true;
                stack.push(successor);
            }
        }
    }

    let mut budget = deferred.len() * deferred.len().max(1);
    while let Some(block) = deferred.pop_front() {
        match visitor.visit(block, cfg) {
            CfgVisitAction::Break => return,
            CfgVisitAction::Defer => {
                if budget == 0 {
                    return;
                }
                budget -= 1;
                deferred.push_back(block);
            }
            _ => {}
        }
    }
}
