//! Event-driven fault simulator
//!
//! Entry points matching the classic fault-simulation granularities: [`Fsim::detect_fault`]
//! (one fault, one packed word of patterns: SPSFP when the word holds a single active
//! lane, PPSFP when it holds up to 64), [`Fsim::ppsfp`] (runs the packed-pattern/
//! single-fault loop across a whole fault list and deck), [`Fsim::sppfp`] (one pattern,
//! up to 64 distinct faults packed one per lane), and [`Fsim::detect_fault_3v`] (one
//! fault, 3-valued/X-aware, for designs where some PPIs are left unassigned).
//!
//! Propagation is event-driven: injecting a fault schedules its node, and only nodes
//! whose recomputed value actually changes get their fanouts scheduled in turn, level
//! order guaranteeing each node is evaluated only after all of its fanins have settled.
//! SPPFP reuses the same event-driven core: gate evaluation is bitwise, so several
//! faults can share one packed word, each confined to its own lane.

use crate::fault::{FaultDb, FaultId, FaultSite, TpgFault};
use crate::sim::event_queue::EventQueue;
use crate::sim::simnode::{Pair, SimGraph};
use crate::testvector::{TestVector, TvDeck, Value3};
use crate::tpg_network::{NodeId, NodeKind, TpgNetwork};

fn stuck_word(v: bool) -> u64 {
    if v {
        u64::MAX
    } else {
        0
    }
}

fn stuck_pair(v: bool) -> Pair {
    if v {
        (0, u64::MAX)
    } else {
        (u64::MAX, 0)
    }
}

/// Lanes where a 3-valued pair is fully known (not X)
fn known(v: Pair) -> u64 {
    v.0 ^ v.1
}

/// Lanes where `faulty` is a known value, differs from `good`, and `good` is also
/// known: an X good or faulty value can't be claimed observed, since it stands for
/// "the actual silicon value isn't determined by this pattern"
fn detect3(faulty: Pair, good: Pair) -> u64 {
    let differs = (faulty.0 ^ good.0) | (faulty.1 ^ good.1);
    differs & known(faulty) & known(good)
}

/// Reusable fault simulation engine bound to one [`TpgNetwork`]
pub struct Fsim {
    graph: SimGraph,
    queue: EventQueue,
}

impl Fsim {
    /// Build a simulator over `net`
    pub fn new(net: &TpgNetwork) -> Fsim {
        let max_level = (0..net.nb_nodes())
            .map(|i| net.node(NodeId::from_index(i)).level())
            .max()
            .unwrap_or(0) as usize;
        Fsim {
            graph: SimGraph::build(net),
            queue: EventQueue::new(net.nb_nodes(), max_level),
        }
    }

    /// Drive every PPI from a packed word (bit `b` of `words[i]` is PPI `i`'s value in
    /// pattern `b`) and settle the good circuit
    pub fn load_inputs(&mut self, net: &TpgNetwork, words: &[u64]) {
        for (i, &ppi) in net.ppis().iter().enumerate() {
            self.graph.set_gval(ppi.index(), words[i]);
        }
        self.graph.eval_good_2v();
    }

    /// Drive every PPI from a [`TvDeck`], X entries already resolved to 0 by the deck
    pub fn load_deck(&mut self, net: &TpgNetwork, deck: &TvDeck) {
        let words: Vec<u64> = (0..net.ppis().len()).map(|i| deck.packed_input(i)).collect();
        self.load_inputs(net, &words);
    }

    /// Good-circuit value packed over the currently loaded patterns, at PPO `k`
    pub fn good_output(&self, net: &TpgNetwork, k: usize) -> u64 {
        self.graph.gval(net.ppos()[k].index())
    }

    /// Snapshot every node's good-circuit value, for [`Fsim::wsa`]
    pub fn snapshot(&self, net: &TpgNetwork) -> Vec<u64> {
        (0..net.nb_nodes()).map(|i| self.graph.gval(i)).collect()
    }

    /// Weighted switching activity: total bit-toggle count across every node between
    /// the currently loaded pattern and a prior [`Fsim::snapshot`]
    pub fn wsa(&self, net: &TpgNetwork, prev: &[u64]) -> u32 {
        (0..net.nb_nodes())
            .map(|i| (self.graph.gval(i) ^ prev[i]).count_ones())
            .sum()
    }

    fn eval_node_forced(&self, net: &TpgNetwork, node: usize, pin: usize, forced: u64) -> u64 {
        let n = net.node(NodeId::from_index(node));
        let gt = n.gate_type().expect("input-pin fault site must be on a gated node");
        let fanins: Vec<u64> = n
            .fanins()
            .iter()
            .enumerate()
            .map(|(k, &f)| if k == pin { forced } else { self.graph.gval(f.index()) })
            .collect();
        crate::sim::simnode::eval_gate_2v(gt, &fanins)
    }

    fn eval_node_forced_3v(&self, net: &TpgNetwork, node: usize, pin: usize, forced: Pair) -> Pair {
        let n = net.node(NodeId::from_index(node));
        let gt = n.gate_type().expect("input-pin fault site must be on a gated node");
        let fanins: Vec<Pair> = n
            .fanins()
            .iter()
            .enumerate()
            .map(|(k, &f)| if k == pin { forced } else { self.graph.gval3(f.index()) })
            .collect();
        crate::sim::simnode::eval_gate_3v(gt, &fanins)
    }

    /// Drive every PPI from one [`TestVector`], broadcasting each PPI's assigned value
    /// (`0`, `1` or `X`) across every lane, and settle the 3-valued good circuit
    pub fn load_inputs_3v(&mut self, net: &TpgNetwork, tv: &TestVector) {
        for (i, &ppi) in net.ppis().iter().enumerate() {
            let pair = match tv.get(i) {
                Value3::Zero => (u64::MAX, 0),
                Value3::One => (0, u64::MAX),
                Value3::X => (u64::MAX, u64::MAX),
            };
            self.graph.set_gval3(ppi.index(), pair);
        }
        self.graph.eval_good_3v();
    }

    /// 3-valued single-fault detection: simulate `fault` against the currently loaded
    /// (via [`Fsim::load_inputs_3v`]) pattern, returning the mask of lanes where some
    /// PPO's faulty value is known, differs from good, and good is also known. A
    /// fault whose propagation is blocked by an X side input, or whose effect is
    /// itself X at every observed PPO, is not counted as detected.
    pub fn detect_fault_3v(&mut self, net: &TpgNetwork, fault: &TpgFault) -> u64 {
        self.graph.clear_faulty();
        self.queue.clear();

        let origin = fault.node().index();
        let stuck = stuck_pair(fault.stuck_value());
        let injected = match fault.site() {
            FaultSite::Output => stuck,
            FaultSite::Input(k) => self.eval_node_forced_3v(net, origin, k as usize, stuck),
        };
        if injected == self.graph.gval3(origin) {
            return 0;
        }
        self.graph.inject_fault3(origin, injected);
        for &fo in net.node(fault.node()).fanouts() {
            self.queue.put(fo.index(), net.node(fo).level() as usize);
        }
        if matches!(net.node(fault.node()).kind(), NodeKind::Ppo(_)) {
            return detect3(injected, self.graph.gval3(origin));
        }

        let mut detected = 0u64;
        while let Some(i) = self.queue.pop() {
            let changed = self.graph.recompute_faulty_3v(i);
            let node = net.node(NodeId::from_index(i));
            if matches!(node.kind(), NodeKind::Ppo(_)) {
                detected |= detect3(self.graph.fval3(i), self.graph.gval3(i));
                continue;
            }
            if changed {
                for &fo in node.fanouts() {
                    self.queue.put(fo.index(), net.node(fo).level() as usize);
                }
            }
        }
        detected
    }

    /// Simulate one fault against the currently loaded patterns, returning the mask of
    /// lanes where a PPO differs from the good circuit
    pub fn detect_fault(&mut self, net: &TpgNetwork, fault: &TpgFault) -> u64 {
        self.graph.clear_faulty();
        self.queue.clear();

        let origin = fault.node().index();
        let stuck = stuck_word(fault.stuck_value());
        let injected = match fault.site() {
            FaultSite::Output => stuck,
            FaultSite::Input(k) => self.eval_node_forced(net, origin, k as usize, stuck),
        };
        if injected == self.graph.gval(origin) {
            return 0;
        }
        self.graph.inject_fault(origin, injected);
        for &fo in net.node(fault.node()).fanouts() {
            self.queue.put(fo.index(), net.node(fo).level() as usize);
        }
        if matches!(net.node(fault.node()).kind(), NodeKind::Ppo(_)) {
            return injected ^ self.graph.gval(origin);
        }

        let mut detected = 0u64;
        while let Some(i) = self.queue.pop() {
            let changed = self.graph.recompute_faulty_2v(i);
            let node = net.node(NodeId::from_index(i));
            if matches!(node.kind(), NodeKind::Ppo(_)) {
                detected |= self.graph.fval(i) ^ self.graph.gval(i);
                continue;
            }
            if changed {
                for &fo in node.fanouts() {
                    self.queue.put(fo.index(), net.node(fo).level() as usize);
                }
            }
        }
        detected
    }

    /// Single-pattern/parallel-faults sweep: inject up to 64 distinct faults, one per
    /// lane of the pattern currently loaded (via [`Fsim::load_inputs`]/
    /// [`Fsim::load_deck`]), and fault-simulate them together in a single event-driven
    /// pass. Gate evaluation is already bitwise, so a node untouched by a given
    /// fault's cone simply carries the (lane-uniform) good value through that fault's
    /// lane, and a node touched by several faults' cones computes each lane's faulty
    /// value independently in the same packed word. Returns, in `faults` order,
    /// whether each fault's lane showed a PPO difference.
    pub fn sppfp(&mut self, net: &TpgNetwork, faults: &[TpgFault]) -> Vec<bool> {
        assert!(
            faults.len() <= 64,
            "sppfp packs at most 64 faults into the lanes of one pattern word"
        );
        self.graph.clear_faulty();
        self.queue.clear();

        let mut combined_diff = 0u64;
        for (lane, fault) in faults.iter().enumerate() {
            let bit = 1u64 << lane;
            let origin = fault.node().index();
            let stuck = stuck_word(fault.stuck_value());
            let injected = match fault.site() {
                FaultSite::Output => stuck,
                FaultSite::Input(k) => self.eval_node_forced(net, origin, k as usize, stuck),
            };
            let good = self.graph.gval(origin);
            if injected == good {
                continue;
            }
            if matches!(net.node(fault.node()).kind(), NodeKind::Ppo(_)) {
                combined_diff |= (injected ^ good) & bit;
                continue;
            }
            self.graph.inject_fault_lane(origin, bit, injected);
            for &fo in net.node(fault.node()).fanouts() {
                self.queue.put(fo.index(), net.node(fo).level() as usize);
            }
        }

        while let Some(i) = self.queue.pop() {
            let changed = self.graph.recompute_faulty_2v(i);
            let node = net.node(NodeId::from_index(i));
            if matches!(node.kind(), NodeKind::Ppo(_)) {
                combined_diff |= self.graph.fval(i) ^ self.graph.gval(i);
                continue;
            }
            if changed {
                for &fo in node.fanouts() {
                    self.queue.put(fo.index(), net.node(fo).level() as usize);
                }
            }
        }

        (0..faults.len()).map(|lane| (combined_diff >> lane) & 1 != 0).collect()
    }

    /// Packed-pattern/single-fault sweep: simulate every non-skipped, undetected
    /// representative fault in `fdb` against the currently loaded deck, marking each
    /// one detected at `pattern_base + lane` for the lowest lane where it propagates
    pub fn ppsfp(&mut self, net: &TpgNetwork, fdb: &mut FaultDb, pattern_base: u32) {
        let targets: Vec<FaultId> = fdb.remaining().collect();
        for id in targets {
            let fault = *fdb.fault(id);
            let mask = self.detect_fault(net, &fault);
            if mask != 0 {
                let lane = mask.trailing_zeros();
                fdb.mark_detected(id, pattern_base + lane);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultDb;
    use crate::network::{Network, Signal};
    use crate::testvector::{TestVector, TvDeck, Value3};

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
    fn test_output_fault_detected_by_one_pattern() {
        let net = and_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let db = FaultDb::extract(&tpg);
        let mut fsim = Fsim::new(&tpg);

        let mut tv = TestVector::unassigned(2);
        tv.set(0, Value3::One);
        tv.set(1, Value3::One);
        let mut deck = TvDeck::new(2);
        deck.push(tv);
        fsim.load_deck(&tpg, &deck);

        let ppo = tpg.ppos()[0];
        let and_node = tpg.node(ppo).fanins()[0];
        let sa0 = db
            .faults_at(and_node)
            .iter()
            .map(|&id| *db.fault(id))
            .find(|f| matches!(f.site(), FaultSite::Output) && !f.stuck_value())
            .expect("sa0 fault should exist on the AND gate's output");
        let mask = fsim.detect_fault(&tpg, &sa0);
        assert_eq!(mask & 1, 1);
    }

    #[test]
    fn test_ppsfp_marks_detected() {
        let net = and_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let mut db = FaultDb::extract(&tpg);
        let mut fsim = Fsim::new(&tpg);

        let mut tv = TestVector::unassigned(2);
        tv.set(0, Value3::One);
        tv.set(1, Value3::One);
        let mut deck = TvDeck::new(2);
        deck.push(tv);
        fsim.load_deck(&tpg, &deck);
        fsim.ppsfp(&tpg, &mut db, 0);

        assert!(db.remaining().count() < db.len());
    }

    fn or_network() -> Network {
        let mut net = Network::new();
        net.add_inputs(2);
        let a = Signal::from_input(0);
        let b = Signal::from_input(1);
        let g = net.or(a, b);
        net.add_output(g);
        net.topo_sort();
        net
    }

    /// `z = a OR b`, pattern `a=1,b=X`: `b-input/sa0` is masked by `a` and must not be
    /// detected, but `z-output/sa0` changes a known good `1` to a known faulty `0` and
    /// must be detected. Neither outcome is reachable through 2-valued simulation,
    /// which can't represent the `X` on `b` at all.
    #[test]
    fn test_3v_detection_matches_or_masking() {
        let net = or_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let db = FaultDb::extract(&tpg);
        let mut fsim = Fsim::new(&tpg);

        let mut tv = TestVector::unassigned(2);
        tv.set(0, Value3::One);
        tv.set(1, Value3::X);
        fsim.load_inputs_3v(&tpg, &tv);

        let ppo = tpg.ppos()[0];
        let or_node = tpg.node(ppo).fanins()[0];
        let b_input_sa0 = db
            .faults_at(or_node)
            .iter()
            .map(|&id| *db.fault(id))
            .find(|f| matches!(f.site(), FaultSite::Input(1)) && !f.stuck_value())
            .expect("b-input/sa0 should exist on the OR gate");
        let z_output_sa0 = db
            .faults_at(or_node)
            .iter()
            .map(|&id| *db.fault(id))
            .find(|f| matches!(f.site(), FaultSite::Output) && !f.stuck_value())
            .expect("z-output/sa0 should exist on the OR gate");

        assert_eq!(fsim.detect_fault_3v(&tpg, &b_input_sa0), 0);
        assert_ne!(fsim.detect_fault_3v(&tpg, &z_output_sa0), 0);
    }

    #[test]
    fn test_sppfp_packs_distinct_faults_into_separate_lanes() {
        let net = and_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let db = FaultDb::extract(&tpg);
        let mut fsim = Fsim::new(&tpg);

        let mut tv = TestVector::unassigned(2);
        tv.set(0, Value3::One);
        tv.set(1, Value3::One);
        let mut deck = TvDeck::new(2);
        deck.push(tv);
        fsim.load_deck(&tpg, &deck);

        let ppo = tpg.ppos()[0];
        let and_node = tpg.node(ppo).fanins()[0];
        let sa0 = db
            .faults_at(and_node)
            .iter()
            .map(|&id| *db.fault(id))
            .find(|f| matches!(f.site(), FaultSite::Output) && !f.stuck_value())
            .unwrap();
        let sa1 = db
            .faults_at(and_node)
            .iter()
            .map(|&id| *db.fault(id))
            .find(|f| matches!(f.site(), FaultSite::Output) && f.stuck_value())
            .unwrap();

        let results = fsim.sppfp(&tpg, &[sa0, sa1]);
        // both inputs are 1, so the AND's good output is 1: sa0 (forces 0) is excited
        // and detected, sa1 (forces 1, matching good) is not
        assert_eq!(results, vec![true, false]);
    }
}
