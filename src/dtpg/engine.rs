//! SAT-based test generation engine: single-fault, and shared-CNF FFR/MFFC

use std::collections::HashMap;

use rustsat::solvers::{Solve, SolveIncremental, SolverResult};
use rustsat::types::TernaryVal;

use crate::cnf::{
    encode_detection, encode_faulty, encode_faulty_ffr, encode_faulty_mffc, encode_good, CnfLits,
};
use crate::dtpg::backtrace::BackTracer;
use crate::fault::{FaultDb, FaultId, TpgFault};
use crate::testvector::NodeValList;
use crate::tpg_network::{NodeId, TpgNetwork};

/// Outcome of one test generation attempt
pub enum DtpgOutcome {
    /// A pattern was found; `NodeValList` holds the capture-frame (time 1) PPI
    /// assignments, extended with a justified launch frame (time 0) when the
    /// back-tracer could find one
    Success(NodeValList),
    /// The SAT solver proved no assignment detects the fault
    Untestable,
    /// The solver could not decide within its resource limits
    Aborted,
}

/// Which shared-CNF granularity [`SatDtpgEngine`] builds per group of faults, mirroring
/// the Single/FFR/MFFC engines a classic ATPG tool picks from for fault-dropping
/// efficiency. `Ffr` and `Mffc` each build one CNF per group and reuse it across every
/// fault in the group via assumption literals ([`SatDtpgEngine::generate_ffr`],
/// [`SatDtpgEngine::generate_mffc`]); `Single` builds one CNF per fault
/// ([`SatDtpgEngine::generate`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DtpgScope {
    /// One CNF per fault
    Single,
    /// One shared CNF per FFR, one fault-selection assumption per solve
    Ffr,
    /// One shared CNF per MFFC, one FFR-root-selection assumption per solve
    Mffc,
}

/// Generates tests for one fault at a time via SAT, optionally justifying a launch
/// frame for sequential (broadside) faults via a pluggable [`BackTracer`]
pub struct SatDtpgEngine {
    backtracer: Box<dyn BackTracer>,
}

impl SatDtpgEngine {
    /// An engine using `backtracer` to justify launch frames
    pub fn new(backtracer: Box<dyn BackTracer>) -> SatDtpgEngine {
        SatDtpgEngine { backtracer }
    }

    /// Attempt to generate a test for `fault`
    pub fn generate(&mut self, net: &TpgNetwork, fault: &TpgFault) -> DtpgOutcome {
        let mut inst = rustsat::instances::SatInstance::new();
        let good = encode_good(&mut inst, net);
        let faulty = encode_faulty(&mut inst, net, fault, &good);
        encode_detection(&mut inst, net, &good, &faulty);

        let (cnf, _vm) = inst.into_cnf();
        let mut solver = rustsat_kissat::Kissat::default();
        if solver.add_cnf(cnf).is_err() {
            return DtpgOutcome::Aborted;
        }
        match solver.solve() {
            Ok(SolverResult::Unsat) => DtpgOutcome::Untestable,
            Ok(SolverResult::Interrupted) | Err(_) => DtpgOutcome::Aborted,
            Ok(SolverResult::Sat) => {
                let mut vals = NodeValList::new();
                for &ppi in net.ppis() {
                    let lit = good.lit(ppi);
                    let v = matches!(solver.lit_val(lit), Ok(TernaryVal::True));
                    vals.insert(ppi, 1, v);
                }
                self.backtracer.justify(net, &mut vals);
                DtpgOutcome::Success(vals)
            }
        }
    }

    /// Extract a PPI assignment from a solved incremental solver into a [`DtpgOutcome`],
    /// shared by [`SatDtpgEngine::generate_ffr`] and [`SatDtpgEngine::generate_mffc`]
    fn outcome_from<S: Solve, E>(
        &mut self,
        solver: &mut S,
        net: &TpgNetwork,
        good: &crate::cnf::CircuitCnf,
        result: Result<SolverResult, E>,
    ) -> DtpgOutcome {
        match result {
            Ok(SolverResult::Unsat) => DtpgOutcome::Untestable,
            Ok(SolverResult::Interrupted) | Err(_) => DtpgOutcome::Aborted,
            Ok(SolverResult::Sat) => {
                let mut vals = NodeValList::new();
                for &ppi in net.ppis() {
                    let lit = good.lit(ppi);
                    let v = matches!(solver.lit_val(lit), Ok(TernaryVal::True));
                    vals.insert(ppi, 1, v);
                }
                self.backtracer.justify(net, &mut vals);
                DtpgOutcome::Success(vals)
            }
        }
    }

    /// Build one shared CNF over `ffr_root`'s FFR, covering every fault in
    /// `fault_ids`, and solve each in turn by assumption: one Tseitin encoding pass,
    /// `fault_ids.len()` incremental solves
    pub fn generate_ffr(
        &mut self,
        net: &TpgNetwork,
        fdb: &FaultDb,
        ffr_root: NodeId,
        fault_ids: &[FaultId],
    ) -> Vec<(FaultId, DtpgOutcome)> {
        let mut inst = rustsat::instances::SatInstance::new();
        let good = encode_good(&mut inst, net);
        let faulty = encode_faulty_ffr(&mut inst, net, &good, fdb, ffr_root, fault_ids);
        encode_detection(&mut inst, net, &good, &faulty);

        let (cnf, _vm) = inst.into_cnf();
        let mut solver = rustsat_kissat::Kissat::default();
        if solver.add_cnf(cnf).is_err() {
            return fault_ids.iter().map(|&id| (id, DtpgOutcome::Aborted)).collect();
        }
        fault_ids
            .iter()
            .map(|&id| {
                let result = solver.solve_assumps(&faulty.select(id));
                let outcome = self.outcome_from(&mut solver, net, &good, result);
                (id, outcome)
            })
            .collect()
    }

    /// Build one shared CNF over `mffc_root`'s multi-level FFR cone, covering every
    /// fault in `faults_by_member` (keyed by the FFR-root member the fault sits
    /// under), and solve each in turn by assumption
    pub fn generate_mffc(
        &mut self,
        net: &TpgNetwork,
        mffc_root: NodeId,
        members: &[NodeId],
        faults_by_member: &HashMap<NodeId, Vec<TpgFault>>,
    ) -> Vec<(FaultId, DtpgOutcome)> {
        let mut inst = rustsat::instances::SatInstance::new();
        let good = encode_good(&mut inst, net);
        let faulty = encode_faulty_mffc(&mut inst, net, &good, mffc_root, members);
        encode_detection(&mut inst, net, &good, &faulty);

        let (cnf, _vm) = inst.into_cnf();
        let mut solver = rustsat_kissat::Kissat::default();
        if solver.add_cnf(cnf).is_err() {
            return faults_by_member
                .values()
                .flatten()
                .map(|f| (f.id(), DtpgOutcome::Aborted))
                .collect();
        }
        let mut out = Vec::new();
        for &member in members {
            let Some(faults) = faults_by_member.get(&member) else {
                continue;
            };
            for fault in faults {
                let assumps = faulty.select_fault(&good, member, fault.stuck_value());
                let result = solver.solve_assumps(&assumps);
                let outcome = self.outcome_from(&mut solver, net, &good, result);
                out.push((fault.id(), outcome));
            }
        }
        out
    }
}
