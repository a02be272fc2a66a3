//! Pluggable bookkeeping policies run when DTPG detects or proves a fault untestable
//!
//! [`DtpgEngine`](crate::dtpg::SatDtpgEngine) only produces a pattern or a verdict; what
//! happens next — recording it, dropping other faults it happens to also detect,
//! double-checking it by simulation — is a separate concern so the same engine can be
//! reused for production runs, quick sanity checks, and throughput benchmarks.

use crate::fault::{FaultDb, FaultId};
use crate::sim::fsim::Fsim;
use crate::testvector::{TestVector, TvDeck};
use crate::tpg_network::TpgNetwork;

/// Shared state a [`DetectOp`]/[`UntestOp`] needs to update
pub struct DtpgContext<'a> {
    /// The network under test
    pub net: &'a TpgNetwork,
    /// The fault catalog being worked through
    pub fdb: &'a mut FaultDb,
    /// A simulator reused for fault-dropping and verification
    pub fsim: &'a mut Fsim,
    /// Accepted patterns, in generation order
    pub patterns: &'a mut Vec<TestVector>,
}

/// Policy invoked when the DTPG engine finds a pattern detecting `fault`
pub trait DetectOp {
    /// Handle a freshly found `(fault, pattern)` pair
    fn on_detect(&mut self, fault: FaultId, tv: TestVector, ctx: &mut DtpgContext);
}

/// Policy invoked when the DTPG engine proves `fault` untestable
pub trait UntestOp {
    /// Handle a freshly proven-untestable fault
    fn on_untest(&mut self, fault: FaultId, ctx: &mut DtpgContext);
}

/// Records the pattern and marks the fault detected; no fault dropping
pub struct BaseDetect;

impl DetectOp for BaseDetect {
    fn on_detect(&mut self, fault: FaultId, tv: TestVector, ctx: &mut DtpgContext) {
        let idx = ctx.patterns.len() as u32;
        ctx.fdb.mark_detected(fault, idx);
        ctx.patterns.push(tv);
    }
}

/// Like [`BaseDetect`], but also fault-simulates the new pattern against every
/// remaining fault and marks any others it happens to detect too (classic fault
/// dropping, the main reason DTPG run time stays sub-quadratic in fault count)
pub struct DropDetect;

impl DetectOp for DropDetect {
    fn on_detect(&mut self, fault: FaultId, tv: TestVector, ctx: &mut DtpgContext) {
        let idx = ctx.patterns.len() as u32;
        ctx.fdb.mark_detected(fault, idx);
        let mut deck = TvDeck::new(ctx.net.ppis().len());
        deck.push(tv.clone());
        ctx.patterns.push(tv);
        ctx.fsim.load_deck(ctx.net, &deck);
        ctx.fsim.ppsfp(ctx.net, ctx.fdb, idx);
    }
}

/// Accumulates patterns without touching the fault catalog, for callers that batch a
/// whole deck's worth of patterns through a single later [`Fsim::ppsfp`] pass
pub struct TvListDetect;

impl DetectOp for TvListDetect {
    fn on_detect(&mut self, _fault: FaultId, tv: TestVector, ctx: &mut DtpgContext) {
        ctx.patterns.push(tv);
    }
}

/// Re-simulates the `(fault, pattern)` pair before accepting it, guarding against a
/// mismatch between the CNF encoding and the event-driven simulator; silently drops
/// the pattern if simulation disagrees rather than recording a false detection
pub struct VerifyDetect {
    inner: BaseDetect,
}

impl VerifyDetect {
    /// A verifying wrapper around [`BaseDetect`]'s bookkeeping
    pub fn new() -> VerifyDetect {
        VerifyDetect { inner: BaseDetect }
    }
}

impl Default for VerifyDetect {
    fn default() -> VerifyDetect {
        VerifyDetect::new()
    }
}

impl DetectOp for VerifyDetect {
    fn on_detect(&mut self, fault: FaultId, tv: TestVector, ctx: &mut DtpgContext) {
        let mut deck = TvDeck::new(ctx.net.ppis().len());
        deck.push(tv.clone());
        ctx.fsim.load_deck(ctx.net, &deck);
        let f = *ctx.fdb.fault(fault);
        let mask = ctx.fsim.detect_fault(ctx.net, &f);
        if mask & 1 != 0 {
            self.inner.on_detect(fault, tv, ctx);
        }
    }
}

/// Discards the pattern and leaves the fault catalog untouched, for measuring raw
/// engine throughput without bookkeeping overhead
pub struct DummyDetect;

impl DetectOp for DummyDetect {
    fn on_detect(&mut self, _fault: FaultId, _tv: TestVector, _ctx: &mut DtpgContext) {}
}

/// Marks the fault untestable in the catalog
pub struct BaseUntest;

impl UntestOp for BaseUntest {
    fn on_untest(&mut self, fault: FaultId, ctx: &mut DtpgContext) {
        ctx.fdb.mark_untestable(fault);
    }
}

/// Leaves the fault catalog untouched
pub struct DummyUntest;

impl UntestOp for DummyUntest {
    fn on_untest(&mut self, _fault: FaultId, _ctx: &mut DtpgContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtpg::{DtpgOutcome, Just1, SatDtpgEngine};
    use crate::fault::FaultDb;
    use crate::network::{Network, Signal};

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
    fn test_base_detect_records_pattern_and_marks_fault() {
        let net = and_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let mut fdb = FaultDb::extract(&tpg);
        let mut fsim = Fsim::new(&tpg);
        let mut patterns = Vec::new();
        let mut engine = SatDtpgEngine::new(Box::new(Just1));

        let target = fdb.representatives().next().unwrap();
        let fault = *fdb.fault(target);
        let mut op = BaseDetect;
        if let DtpgOutcome::Success(vals) = engine.generate(&tpg, &fault) {
            let tv = vals.to_test_vector(&tpg, 1);
            let mut ctx = DtpgContext {
                net: &tpg,
                fdb: &mut fdb,
                fsim: &mut fsim,
                patterns: &mut patterns,
            };
            op.on_detect(target, tv, &mut ctx);
            assert_eq!(patterns.len(), 1);
        }
    }
}
