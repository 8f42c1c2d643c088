//! Dominator tree.
//!
//! The iterative algorithm of Cooper, Harvey, and Kennedy over reverse
//! postorder. Recomputed whenever a pass changes CFG topology.

use crate::cfg::{BlockId, ControlFlowGraph};

#[derive(Clone, Debug)]
pub struct DominatorTree {
    /// Immediate dominator per block id; the entry dominates itself.
    idom: Vec<Option<BlockId>>,
    rpo_number: Vec<usize>,
}

impl DominatorTree {
    pub fn compute(cfg: &ControlFlowGraph) -> DominatorTree {
        let rpo = cfg.reverse_postorder();
        let mut rpo_number = vec![usize::MAX; cfg.len()];
        for (i, &block) in rpo.iter().enumerate() {
            rpo_number[block] = i;
        }
        let mut idom: Vec<Option<BlockId>> = vec![None; cfg.len()];
        if rpo.is_empty() {
            return DominatorTree { idom, rpo_number };
        }
        idom[ControlFlowGraph::ENTRY] = Some(ControlFlowGraph::ENTRY);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for &pred in &cfg.block(block).predecessors {
                    if rpo_number[pred] == usize::MAX || idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => Self::intersect(&idom, &rpo_number, pred, current),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if idom[block] != Some(new_idom) {
                        idom[block] = Some(new_idom);
                        changed = true;
                    }
                }
            }
        }
        DominatorTree { idom, rpo_number }
    }

    fn intersect(
        idom: &[Option<BlockId>],
        rpo_number: &[usize],
        a: BlockId,
        b: BlockId,
    ) -> BlockId {
        let (mut finger_a, mut finger_b) = (a, b);
        while finger_a != finger_b {
            while rpo_number[finger_a] > rpo_number[finger_b] {
                finger_a = idom[finger_a].unwrap_or(finger_a);
            }
            while rpo_number[finger_b] > rpo_number[finger_a] {
                finger_b = idom[finger_b].unwrap_or(finger_b);
            }
        }
        finger_a
    }

    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(block).copied().flatten()
    }

    /// Does `a` dominate `b`?
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom(current) {
                Some(next) if next != current => current = next,
                _ => return false,
            }
        }
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.rpo_number.get(block).is_some_and(|&n| n != usize::MAX)
    }
}
