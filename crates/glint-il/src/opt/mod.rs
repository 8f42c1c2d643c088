//! The optimizer pipeline.
//!
//! Passes run in a fixed order under a change-tracking scheduler: `Changed`
//! advances to the next pass, `Rerun` restarts the pipeline from the first
//! pass, and a restart budget bounds total work.

mod gvn;
mod reassociate;
mod simplify;
mod strength;
mod unroll;

pub use gvn::GlobalValueNumbering;
pub use reassociate::Reassociate;
pub use simplify::AlgebraicSimplifier;
pub use strength::StrengthReduction;
pub use unroll::LoopUnroller;

use crate::func::IlFunction;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassResult {
    None,
    Changed,
    Rerun,
}

pub trait OptimizerPass {
    fn name(&self) -> &'static str;
    fn run(&mut self, func: &mut IlFunction) -> PassResult;
}

/// Pipeline restarts are bounded; each pass also converges on its own, so
/// the budget is a backstop, not a tuning knob.
const MAX_RESTARTS: usize = 32;

/// Run the full pipeline to its fixed point.
pub fn optimize(func: &mut IlFunction) {
    let mut passes: Vec<Box<dyn OptimizerPass>> = vec![
        Box::new(GlobalValueNumbering::default()),
        Box::new(AlgebraicSimplifier::default()),
        Box::new(Reassociate::default()),
        Box::new(StrengthReduction::default()),
        Box::new(LoopUnroller::default()),
    ];
    let mut restarts = 0;
    let mut index = 0;
    while index < passes.len() {
        let result = passes[index].run(func);
        debug!(pass = passes[index].name(), ?result, "optimizer pass");
        match result {
            PassResult::Rerun if restarts < MAX_RESTARTS => {
                restarts += 1;
                index = 0;
            }
            _ => index += 1,
        }
    }
}
