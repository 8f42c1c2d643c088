//! Global value numbering.
//!
//! Walks the CFG depth-first, canonicalizing variable operands through a
//! path-compressed equivalence map and fingerprinting pure result-producing
//! instructions as `(opcode, canonical operands)`. A repeated fingerprint
//! maps the new result onto the prior one and drops the instruction.
//! Commutative opcodes sort their operand identities before hashing.

use crate::cfg::{BlockId, ControlFlowGraph};
use crate::func::IlFunction;
use crate::instr::ILOpCode;
use crate::opt::{OptimizerPass, PassResult};
use crate::value::{IlVarId, Operand};
use crate::visit::{CfgVisitAction, CfgVisitor, traverse_cfg};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

type Fingerprint = (ILOpCode, SmallVec<[(u8, u64, u64); 2]>);

#[derive(Default)]
pub struct GlobalValueNumbering {
    sub_expressions: FxHashMap<Fingerprint, IlVarId>,
    map: FxHashMap<IlVarId, IlVarId>,
    changed: bool,
}

impl GlobalValueNumbering {
    /// Resolve a variable through the equivalence map with path compression.
    fn canonical(&mut self, var: IlVarId) -> IlVarId {
        let mut root = var;
        while let Some(&next) = self.map.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }
        let mut current = var;
        while current != root {
            let next = self.map[&current];
            self.map.insert(current, root);
            current = next;
        }
        root
    }

    fn map_operand(&mut self, operand: &mut Operand) {
        if let Operand::Var(var) = operand {
            let canonical = self.canonical(*var);
            if canonical != *var {
                *operand = Operand::Var(canonical);
            }
        }
    }

    fn fingerprint(opcode: ILOpCode, operands: &[Operand]) -> Fingerprint {
        let mut keys: SmallVec<[(u8, u64, u64); 2]> =
            operands.iter().map(Operand::key).collect();
        if opcode.is_commutative() {
            keys.sort_unstable();
        }
        (opcode, keys)
    }
}

impl CfgVisitor for GlobalValueNumbering {
    fn visit(&mut self, block: BlockId, cfg: &mut ControlFlowGraph) -> CfgVisitAction {
        let count = cfg.block(block).instructions.len();
        let mut keep = Vec::with_capacity(count);
        let instructions = std::mem::take(&mut cfg.block_mut(block).instructions);
        for mut instruction in instructions {
            for operand in instruction.operands.iter_mut() {
                self.map_operand(operand);
            }
            if instruction.is_pure() {
                if let Some(result) = instruction.result {
                    let fingerprint =
                        Self::fingerprint(instruction.opcode, &instruction.operands);
                    match self.sub_expressions.get(&fingerprint) {
                        Some(&prior) => {
                            self.map.insert(result, prior);
                            self.changed = true;
                            continue;
                        }
                        None => {
                            self.sub_expressions.insert(fingerprint, result);
                        }
                    }
                }
            }
            keep.push(instruction);
        }
        cfg.block_mut(block).instructions = keep;
        CfgVisitAction::Keep
    }
}

impl OptimizerPass for GlobalValueNumbering {
    fn name(&self) -> &'static str {
        "GlobalValueNumbering"
    }

    fn run(&mut self, func: &mut IlFunction) -> PassResult {
        self.changed = false;
        self.sub_expressions.clear();
        self.map.clear();
        traverse_cfg(&mut func.cfg, self);
        if self.changed {
            PassResult::Changed
        } else {
            PassResult::None
        }
    }
}
