//! Random test pattern generation
//!
//! [`Rtpg::run_plain`] drives the network with uniformly random patterns and
//! fault-simulates them in packed batches. [`Rtpg::run_wsa`] instead grows a single
//! chain of patterns by local mutation, using a Metropolis-style acceptance rule to
//! keep each step's weighted switching activity under a target so the test set stays
//! usable in a power-constrained test application.

use kdam::BarExt;
use rand::{Rng, SeedableRng};

use crate::fault::FaultDb;
use crate::sim::fsim::Fsim;
use crate::testvector::{TestVector, TvDeck, Value3};
use crate::tpg_network::TpgNetwork;

/// Random pattern generator, plain and WSA-constrained
pub struct Rtpg {
    rng: rand::rngs::SmallRng,
}

impl Rtpg {
    /// A generator seeded from `seed`
    pub fn new(seed: u64) -> Rtpg {
        Rtpg {
            rng: rand::rngs::SmallRng::seed_from_u64(seed),
        }
    }

    fn random_vector(&mut self, nb_ppis: usize) -> TestVector {
        let mut tv = TestVector::unassigned(nb_ppis);
        tv.fill_random(&mut self.rng);
        tv
    }

    /// Flip up to `nbits` random positions, each one actually flipped with
    /// probability 0.8 (so a single mutation step usually moves fewer than `nbits`
    /// bits, keeping successive patterns correlated)
    fn mutate(&mut self, tv: &TestVector, nbits: usize) -> TestVector {
        let mut out = tv.clone();
        for _ in 0..nbits {
            if self.rng.gen_bool(0.8) {
                let i = self.rng.gen_range(0..out.len());
                let flipped = match out.get(i) {
                    Value3::One => Value3::Zero,
                    _ => Value3::One,
                };
                out.set(i, flipped);
            }
        }
        out
    }

    /// Scores a candidate's weighted switching activity against a target `thv`: 1.0
    /// at or below the target, decaying linearly to 0.0 at twice the target
    fn evaluate(wsa: u32, thv: u32) -> f64 {
        if wsa < thv {
            1.0
        } else {
            (1.0 - (wsa - thv) as f64 / thv as f64).max(0.0)
        }
    }

    /// Generate `npat` independent uniformly-random patterns, packed-pattern/single-
    /// fault simulating them in batches of up to 64 against `fdb`
    pub fn run_plain(&mut self, net: &TpgNetwork, fdb: &mut FaultDb, npat: usize) -> Vec<TestVector> {
        let mut fsim = Fsim::new(net);
        let mut deck = TvDeck::new(net.ppis().len());
        let mut patterns = Vec::with_capacity(npat);
        let mut base = 0u32;
        let mut pb = kdam::Bar::builder().total(npat).desc("rtpg").build().unwrap();

        let flush = |deck: &mut TvDeck, fsim: &mut Fsim, fdb: &mut FaultDb, base: &mut u32| {
            if deck.is_empty() {
                return;
            }
            fsim.load_deck(net, deck);
            fsim.ppsfp(net, fdb, *base);
            *base += deck.len() as u32;
            deck.clear();
        };

        for _ in 0..npat {
            let tv = self.random_vector(net.ppis().len());
            patterns.push(tv.clone());
            deck.push(tv);
            if !deck.has_room() {
                flush(&mut deck, &mut fsim, fdb, &mut base);
            }
            let _ = pb.update(1);
        }
        flush(&mut deck, &mut fsim, fdb, &mut base);
        eprintln!();
        patterns
    }

    /// Generate up to `npat` patterns by local mutation of a single chain, rejecting
    /// (and discarding) any candidate whose weighted switching activity relative to
    /// the last accepted pattern scores too far below `thv` under a Metropolis
    /// criterion: always accept an improving or equal candidate, otherwise accept
    /// with probability equal to the ratio of the two scores
    pub fn run_wsa(
        &mut self,
        net: &TpgNetwork,
        fdb: &mut FaultDb,
        npat: usize,
        thv: u32,
        nbits: usize,
    ) -> Vec<TestVector> {
        let mut fsim = Fsim::new(net);
        let mut patterns = Vec::new();

        let mut current = self.random_vector(net.ppis().len());
        let mut deck = TvDeck::new(net.ppis().len());
        deck.push(current.clone());
        fsim.load_deck(net, &deck);
        let mut baseline = fsim.snapshot(net);
        let mut current_score = 1.0f64;

        let mut base_pattern = 0u32;
        let mut pb = kdam::Bar::builder().total(npat).desc("rtpg-wsa").build().unwrap();
        while patterns.len() < npat {
            let candidate = self.mutate(&current, nbits);
            deck.clear();
            deck.push(candidate.clone());
            fsim.load_deck(net, &deck);
            let wsa = fsim.wsa(net, &baseline);
            let score = Self::evaluate(wsa, thv);

            let accept = score >= current_score
                || self.rng.gen_bool((score / current_score.max(1e-9)).clamp(0.0, 1.0));
            if !accept {
                continue;
            }

            fsim.ppsfp(net, fdb, base_pattern);
            base_pattern += 1;
            baseline = fsim.snapshot(net);
            current = candidate.clone();
            current_score = score;
            patterns.push(candidate);
            let _ = pb.update(1);
        }
        eprintln!();
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultDb;
    use crate::network::{Network, Signal};
    use crate::tpg_network::TpgNetwork;

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
    fn test_run_plain_detects_some_faults() {
        let net = and_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let mut fdb = FaultDb::extract(&tpg);
        let mut rtpg = Rtpg::new(42);
        let patterns = rtpg.run_plain(&tpg, &mut fdb, 16);
        assert_eq!(patterns.len(), 16);
        assert!(fdb.remaining().count() < fdb.len());
    }

    #[test]
    fn test_run_wsa_respects_pattern_count() {
        let net = and_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let mut fdb = FaultDb::extract(&tpg);
        let mut rtpg = Rtpg::new(7);
        let patterns = rtpg.run_wsa(&tpg, &mut fdb, 8, 4, 1);
        assert_eq!(patterns.len(), 8);
    }
}
