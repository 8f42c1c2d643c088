//! Basic blocks and the control-flow graph.

use crate::instr::Instruction;
use smallvec::SmallVec;

pub type BlockId = usize;

#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    pub predecessors: SmallVec<[BlockId; 2]>,
    pub successors: SmallVec<[BlockId; 2]>,
    alive: bool,
}

impl BasicBlock {
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }
}

/// Blocks keep stable ids; removal tombstones a block and unlinks its edges.
#[derive(Clone, Debug, Default)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub const ENTRY: BlockId = 0;

    pub fn add_block(&mut self) -> BlockId {
        let id = self.blocks.len();
        self.blocks.push(BasicBlock {
            id,
            instructions: Vec::new(),
            predecessors: SmallVec::new(),
            successors: SmallVec::new(),
            alive: true,
        });
        id
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    #[inline]
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter(|b| b.alive)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.iter().filter(|b| b.alive).map(|b| b.id)
    }

    pub fn link(&mut self, from: BlockId, to: BlockId) {
        if !self.blocks[from].successors.contains(&to) {
            self.blocks[from].successors.push(to);
        }
        if !self.blocks[to].predecessors.contains(&from) {
            self.blocks[to].predecessors.push(from);
        }
    }

    pub fn unlink(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from].successors.retain(|&mut s| s != to);
        self.blocks[to].predecessors.retain(|&mut p| p != from);
    }

    /// Tombstone a block, unlinking every edge touching it.
    pub fn remove_node(&mut self, id: BlockId) {
        let successors: Vec<BlockId> = self.blocks[id].successors.to_vec();
        let predecessors: Vec<BlockId> = self.blocks[id].predecessors.to_vec();
        for to in successors {
            self.unlink(id, to);
        }
        for from in predecessors {
            self.unlink(from, id);
        }
        self.blocks[id].alive = false;
        self.blocks[id].instructions.clear();
    }

    /// Append `from`'s single successor `into` into `from`: instructions are
    /// concatenated, `into`'s out-edges transfer, and `into` is removed.
    pub fn merge_nodes(&mut self, from: BlockId, into_id: BlockId) {
        let moved: Vec<Instruction> = std::mem::take(&mut self.blocks[into_id].instructions);
        self.blocks[from].instructions.extend(moved);
        let out_edges: Vec<BlockId> = self.blocks[into_id].successors.to_vec();
        self.remove_node(into_id);
        for to in out_edges {
            self.link(from, to);
        }
    }

    /// Reverse postorder over alive blocks from the entry.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut order = Vec::new();
        let mut visited = vec![false; self.blocks.len()];
        // Iterative postorder.
        let mut stack: Vec<(BlockId, usize)> = Vec::new();
        if self.blocks.is_empty() || !self.blocks[Self::ENTRY].alive {
            return order;
        }
        visited[Self::ENTRY] = true;
        stack.push((Self::ENTRY, 0));
        while let Some(top) = stack.len().checked_sub(1) {
            let (block, next) = stack[top];
            let successors = &self.blocks[block].successors;
            if next < successors.len() {
                stack[top].1 += 1;
                let successor = successors[next];
                if !visited[successor] && self.blocks[successor].alive {
                    visited[successor] = true;
                    stack.push((successor, 0));
                }
            } else {
                order.push(block);
                stack.pop();
            }
        }
        order.reverse();
        order
    }

    /// CFG edge symmetry: every successor edge has a matching predecessor
    /// edge and vice versa.
    pub fn edges_consistent(&self) -> bool {
        for block in self.blocks() {
            for &successor in &block.successors {
                if !self.blocks[successor].predecessors.contains(&block.id) {
                    return false;
                }
            }
            for &predecessor in &block.predecessors {
                if !self.blocks[predecessor].successors.contains(&block.id) {
                    return false;
                }
            }
        }
        true
    }
}
