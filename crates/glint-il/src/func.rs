//! A lowered function: its CFG plus cached analyses.

use crate::cfg::ControlFlowGraph;
use crate::dom::DominatorTree;
use crate::loops::LoopTree;

#[derive(Clone, Debug)]
pub struct IlFunction {
    pub name: String,
    pub cfg: ControlFlowGraph,
    dom: Option<DominatorTree>,
    loops: Option<LoopTree>,
}

impl IlFunction {
    pub fn new(name: impl Into<String>, cfg: ControlFlowGraph) -> Self {
        IlFunction {
            name: name.into(),
            cfg,
            dom: None,
            loops: None,
        }
    }

    /// Dominator tree, computed on first use and kept until invalidated.
    pub fn dominators(&mut self) -> &DominatorTree {
        if self.dom.is_none() {
            self.dom = Some(DominatorTree::compute(&self.cfg));
        }
        self.dom.as_ref().unwrap_or_else(|| unreachable!())
    }

    pub fn loop_tree(&mut self) -> &LoopTree {
        if self.loops.is_none() {
            let dom = DominatorTree::compute(&self.cfg);
            self.loops = Some(LoopTree::compute(&self.cfg, &dom));
        }
        self.loops.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// Drop cached analyses after a topology change.
    pub fn invalidate_analyses(&mut self) {
        self.dom = None;
        self.loops = None;
    }

    /// Every SSA result in the function is assigned exactly once.
    pub fn is_ssa(&self) -> bool {
        let mut seen = rustc_hash::FxHashSet::default();
        for block in self.cfg.blocks() {
            for instruction in &block.instructions {
                if let Some(result) = instruction.result {
                    if !seen.insert(result) {
                        return false;
                    }
                }
            }
        }
        true
    }
}
