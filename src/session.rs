//! Top-level handle tying a network, its fault catalog and the generation engines
//! together
//!
//! Replaces the single global manager object of a classic ATPG tool with an owned,
//! explicit session: nothing here is global state, so nothing prevents a caller from
//! running several sessions (e.g. over different designs) side by side.

use std::collections::HashMap;

use kdam::BarExt;

use crate::detect_op::{DetectOp, DtpgContext, UntestOp};
use crate::dtpg::{DtpgOutcome, DtpgScope, SatDtpgEngine};
use crate::error::ElaborationError;
use crate::fault::{FaultDb, FaultId, FaultStatus, TpgFault};
use crate::network::Network;
use crate::rtpg::Rtpg;
use crate::sim::fsim::Fsim;
use crate::testvector::TestVector;
use crate::tpg_network::{NodeId, TpgNetwork};

/// An elaborated network plus its fault catalog, ready for DTPG or fault simulation
pub struct AtpgSession {
    net: TpgNetwork,
    fdb: FaultDb,
}

impl AtpgSession {
    /// Elaborate `src` and extract its fault catalog
    pub fn build(src: &Network) -> Result<AtpgSession, ElaborationError> {
        let net = TpgNetwork::build(src)?;
        let fdb = FaultDb::extract(&net);
        Ok(AtpgSession { net, fdb })
    }

    /// The elaborated network
    pub fn network(&self) -> &TpgNetwork {
        &self.net
    }

    /// The fault catalog
    pub fn faults(&self) -> &FaultDb {
        &self.fdb
    }

    /// The fault catalog, mutably
    pub fn faults_mut(&mut self) -> &mut FaultDb {
        &mut self.fdb
    }

    /// Fraction of representative faults no longer `Undetected` (detected or proven
    /// untestable)
    pub fn coverage(&self) -> f64 {
        let total = self.fdb.representatives().count();
        if total == 0 {
            return 1.0;
        }
        let undetected = self
            .fdb
            .representatives()
            .filter(|&id| matches!(self.fdb.status(id), FaultStatus::Undetected))
            .count();
        1.0 - (undetected as f64 / total as f64)
    }

    /// Run SAT-based DTPG over every remaining fault, in the order `scope` groups them,
    /// applying `detect`/`untest` to each outcome. `Ffr`/`Mffc` build one shared CNF per
    /// group via [`SatDtpgEngine::generate_ffr`]/[`SatDtpgEngine::generate_mffc`] and
    /// solve every fault in the group against it by assumption; `Single` builds one CNF
    /// per fault via [`SatDtpgEngine::generate`].
    pub fn run_dtpg(
        &mut self,
        scope: DtpgScope,
        engine: &mut SatDtpgEngine,
        detect: &mut dyn DetectOp,
        untest: &mut dyn UntestOp,
    ) -> Vec<TestVector> {
        let mut fsim = Fsim::new(&self.net);
        let mut patterns = Vec::new();
        let outcomes = match scope {
            DtpgScope::Single => self.run_single(engine),
            DtpgScope::Ffr => self.run_ffr(engine),
            DtpgScope::Mffc => self.run_mffc(engine),
        };

        let mut pb = kdam::Bar::builder()
            .total(outcomes.len())
            .desc("dtpg")
            .build()
            .unwrap();
        for (id, outcome) in outcomes {
            let _ = pb.update(1);
            match outcome {
                DtpgOutcome::Success(vals) => {
                    let tv = vals.to_test_vector(&self.net, 1);
                    let mut ctx = DtpgContext {
                        net: &self.net,
                        fdb: &mut self.fdb,
                        fsim: &mut fsim,
                        patterns: &mut patterns,
                    };
                    detect.on_detect(id, tv, &mut ctx);
                }
                DtpgOutcome::Untestable => {
                    let mut ctx = DtpgContext {
                        net: &self.net,
                        fdb: &mut self.fdb,
                        fsim: &mut fsim,
                        patterns: &mut patterns,
                    };
                    untest.on_untest(id, &mut ctx);
                }
                DtpgOutcome::Aborted => {}
            }
        }
        eprintln!();
        patterns
    }

    fn run_single(&mut self, engine: &mut SatDtpgEngine) -> Vec<(FaultId, DtpgOutcome)> {
        self.remaining_targets()
            .into_iter()
            .map(|id| {
                let fault = *self.fdb.fault(id);
                (id, engine.generate(&self.net, &fault))
            })
            .collect()
    }

    fn run_ffr(&mut self, engine: &mut SatDtpgEngine) -> Vec<(FaultId, DtpgOutcome)> {
        let targets: std::collections::HashSet<FaultId> = self.remaining_targets().into_iter().collect();
        let mut out = Vec::new();
        for (ffr_root, ids) in group_by(&self.net, &self.fdb, |net, n| net.node(n).ffr_root()) {
            let ids: Vec<FaultId> = ids.into_iter().filter(|id| targets.contains(id)).collect();
            if ids.is_empty() {
                continue;
            }
            out.extend(engine.generate_ffr(&self.net, &self.fdb, ffr_root, &ids));
        }
        out
    }

    fn run_mffc(&mut self, engine: &mut SatDtpgEngine) -> Vec<(FaultId, DtpgOutcome)> {
        let targets: std::collections::HashSet<FaultId> = self.remaining_targets().into_iter().collect();
        let mut out = Vec::new();
        for (mffc_root, ids) in group_by(&self.net, &self.fdb, mffc_root_of) {
            let ids: Vec<FaultId> = ids.into_iter().filter(|id| targets.contains(id)).collect();
            if ids.is_empty() {
                continue;
            }
            let members = self.net.mffc_members(mffc_root);

            // Faults sitting on an FFR root get the full per-member elem_var
            // treatment; faults on interior (non-root) FFR nodes fall back to the
            // FFR engine, grouped by their own FFR root.
            let mut by_member: HashMap<NodeId, Vec<TpgFault>> = HashMap::new();
            let mut interior: HashMap<NodeId, Vec<FaultId>> = HashMap::new();
            for id in ids {
                let fault = *self.fdb.fault(id);
                let node = fault.node();
                if self.net.node(node).is_ffr_root() {
                    by_member.entry(node).or_default().push(fault);
                } else {
                    interior.entry(self.net.node(node).ffr_root()).or_default().push(id);
                }
            }
            if !by_member.is_empty() {
                out.extend(engine.generate_mffc(&self.net, mffc_root, &members, &by_member));
            }
            for (ffr_root, ffr_ids) in interior {
                out.extend(engine.generate_ffr(&self.net, &self.fdb, ffr_root, &ffr_ids));
            }
        }
        out
    }

    fn remaining_targets(&self) -> Vec<FaultId> {
        self.fdb
            .representatives()
            .filter(|&id| !self.fdb.is_skipped(id) && matches!(self.fdb.status(id), FaultStatus::Undetected))
            .collect()
    }

    /// Run plain random pattern generation, fault-simulating each batch
    pub fn run_rtpg(&mut self, rtpg: &mut Rtpg, npat: usize) -> Vec<TestVector> {
        rtpg.run_plain(&self.net, &mut self.fdb, npat)
    }

    /// Run WSA-constrained random pattern generation
    pub fn run_rtpg_wsa(
        &mut self,
        rtpg: &mut Rtpg,
        npat: usize,
        thv: u32,
        nbits: usize,
    ) -> Vec<TestVector> {
        rtpg.run_wsa(&self.net, &mut self.fdb, npat, thv, nbits)
    }
}

/// Find the MFFC root reached by walking up `node`'s dominator chain
fn mffc_root_of(net: &TpgNetwork, mut node: NodeId) -> NodeId {
    while let Some(parent) = net.node(node).idom() {
        node = parent;
    }
    node
}

/// Group every representative fault by `key_of` its node, preserving first-seen
/// group order (the grouping itself, not catalog order, is what matters for the
/// shared-CNF engines: all of one group's faults must be handed to the same
/// `generate_ffr`/`generate_mffc` call)
fn group_by(
    net: &TpgNetwork,
    fdb: &FaultDb,
    key_of: impl Fn(&TpgNetwork, NodeId) -> NodeId,
) -> Vec<(NodeId, Vec<FaultId>)> {
    let mut groups: HashMap<NodeId, Vec<FaultId>> = HashMap::new();
    let mut order: Vec<NodeId> = Vec::new();
    for id in fdb.representatives() {
        let key = key_of(net, fdb.fault(id).node());
        if !groups.contains_key(&key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(id);
    }
    order.into_iter().map(|k| (k, groups.remove(&k).unwrap())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect_op::{BaseDetect, BaseUntest};
    use crate::dtpg::Just1;
    use crate::network::Signal;

    fn and_network() -> Network {
        let mut net = Network::new();
        net.add_inputs(2);
        let a = Signal::from_input(0);
        let b = Signal::from_input(1);
        let g = net.and(a, b);
        net.add_output(g);
        net.topo_sort();
        net
    }

    #[test]
    fn test_full_dtpg_reaches_complete_coverage() {
        let net = and_network();
        let mut session = AtpgSession::build(&net).unwrap();
        let mut engine = SatDtpgEngine::new(Box::new(Just1));
        let mut detect = BaseDetect;
        let mut untest = BaseUntest;
        session.run_dtpg(DtpgScope::Single, &mut engine, &mut detect, &mut untest);
        assert_eq!(session.coverage(), 1.0);
    }
}
