//! Launch-frame justification for broadside sequential patterns
//!
//! A SAT solution only fixes the *capture* frame: the values the PPIs (including
//! flip-flop outputs) must hold when the fault is exercised. For a flip-flop-sourced
//! PPI that value must actually be producible by a preceding combinational frame. A
//! [`BackTracer`] searches backward from each required flip-flop input for a launch-frame
//! primary-input assignment that produces it.

use std::collections::HashMap;

use crate::testvector::NodeValList;
use crate::tpg_network::{GateType, NodeId, NodeKind, PpiSource, TpgNetwork};

/// Strategy for justifying one launch frame from the capture frame's flip-flop
/// requirements
pub trait BackTracer {
    /// Extend `vals` (already holding time-1 capture assignments) with time-0 launch
    /// assignments to primary inputs. Flip-flop PPIs that cannot be justified are left
    /// unassigned at time 0 (meaning: accept whatever reset/previous state they hold).
    fn justify(&mut self, net: &TpgNetwork, vals: &mut NodeValList);
}

/// Random fill-and-simulate: repeatedly assigns random launch-frame primary inputs and
/// forward-simulates, accepting the first attempt whose flip-flop outputs match
pub struct SimpleBackTracer {
    rng: rand::rngs::SmallRng,
    attempts: u32,
}

impl SimpleBackTracer {
    /// A back-tracer seeded from `seed`, retrying up to `attempts` times per fault
    pub fn new(seed: u64, attempts: u32) -> SimpleBackTracer {
        use rand::SeedableRng;
        SimpleBackTracer {
            rng: rand::rngs::SmallRng::seed_from_u64(seed),
            attempts,
        }
    }
}

impl BackTracer for SimpleBackTracer {
    fn justify(&mut self, net: &TpgNetwork, vals: &mut NodeValList) {
        let required = required_dff_values(net, vals);
        if required.is_empty() {
            return;
        }
        for _ in 0..self.attempts {
            let mut sg = crate::sim::simnode::SimGraph::build(net);
            let mut primaries = Vec::new();
            for &ppi in net.ppis() {
                if matches!(net.node(ppi).kind(), NodeKind::Ppi(PpiSource::Primary(_))) {
                    let v = rand::Rng::gen_bool(&mut self.rng, 0.5);
                    sg.set_gval(ppi.index(), if v { u64::MAX } else { 0 });
                    primaries.push((ppi, v));
                } else {
                    sg.set_gval(ppi.index(), 0);
                }
            }
            sg.eval_good_2v();
            let ok = required
                .iter()
                .all(|&(dffd, want)| (sg.gval(dffd.index()) != 0) == want);
            if ok {
                for (ppi, v) in primaries {
                    vals.insert(ppi, 0, v);
                }
                return;
            }
        }
    }
}

/// Single-path backward implication: walks from each required flip-flop value toward
/// the primary inputs, at each 2-input gate picking one fanin to force (no
/// backtracking over the choice)
pub struct Just1;

impl BackTracer for Just1 {
    fn justify(&mut self, net: &TpgNetwork, vals: &mut NodeValList) {
        let required = required_dff_values(net, vals);
        let mut assign = HashMap::new();
        for (dffd, want) in required {
            backward_justify(net, dffd, want, &mut assign, false);
        }
        for (node, v) in assign {
            if matches!(net.node(node).kind(), NodeKind::Ppi(PpiSource::Primary(_))) {
                vals.insert(node, 0, v);
            }
        }
    }
}

/// Backward implication that, when a gate offers a choice of which fanin to force
/// (e.g. an AND needing output 0 can pick either input), tries the alternative if the
/// first choice turns out to conflict with an earlier assignment
pub struct Just2;

impl BackTracer for Just2 {
    fn justify(&mut self, net: &TpgNetwork, vals: &mut NodeValList) {
        let required = required_dff_values(net, vals);
        let mut assign = HashMap::new();
        for (dffd, want) in required {
            if !backward_justify(net, dffd, want, &mut assign, true) {
                assign.clear();
                backward_justify(net, dffd, want, &mut assign, false);
            }
        }
        for (node, v) in assign {
            if matches!(net.node(node).kind(), NodeKind::Ppi(PpiSource::Primary(_))) {
                vals.insert(node, 0, v);
            }
        }
    }
}

/// Read off, for each flip-flop whose capture-frame PPI got a required value, the
/// corresponding `(DffD PPO node, value)` the launch frame must produce
fn required_dff_values(net: &TpgNetwork, vals: &NodeValList) -> Vec<(NodeId, bool)> {
    let mut out = Vec::new();
    for e in vals.iter() {
        if e.time != 1 {
            continue;
        }
        if let PpiSource::DffQ(idx) = match net.node(e.node).kind() {
            NodeKind::Ppi(s) => s,
            _ => continue,
        } {
            if let Some(&ppo) = net
                .ppos()
                .iter()
                .find(|&&p| matches!(net.node(p).kind(), NodeKind::Ppo(crate::tpg_network::PpoSource::DffD(i)) if i == idx))
            {
                out.push((ppo, e.value));
            }
        }
    }
    out
}

/// Backward-implies a required value at `target`, recording primary-input and (when
/// `allow_retry`) gate choices into `assign`. Returns whether justification succeeded.
fn backward_justify(
    net: &TpgNetwork,
    target: NodeId,
    want: bool,
    assign: &mut HashMap<NodeId, bool>,
    allow_retry: bool,
) -> bool {
    if let Some(&v) = assign.get(&target) {
        return v == want;
    }
    let node = net.node(target);
    match node.kind() {
        NodeKind::Ppi(_) => {
            assign.insert(target, want);
            true
        }
        NodeKind::Ppo(_) | NodeKind::DffControl => backward_justify(
            net,
            node.fanins()[0],
            want,
            assign,
            allow_retry,
        ),
        NodeKind::Logic(gt) => match gt {
            GateType::Const0 => !want,
            GateType::Const1 => want,
            GateType::Buff => backward_justify(net, node.fanins()[0], want, assign, allow_retry),
            GateType::Not => backward_justify(net, node.fanins()[0], !want, assign, allow_retry),
            GateType::And | GateType::Nand => {
                let need_and_one = want ^ (gt == GateType::Nand);
                let (a, b) = (node.fanins()[0], node.fanins()[1]);
                if need_and_one {
                    backward_justify(net, a, true, assign, allow_retry)
                        && backward_justify(net, b, true, assign, allow_retry)
                } else {
                    try_one_false(net, a, b, assign, allow_retry)
                }
            }
            GateType::Or | GateType::Nor => {
                let need_or_zero = want ^ (gt == GateType::Nor);
                let (a, b) = (node.fanins()[0], node.fanins()[1]);
                if !need_or_zero {
                    backward_justify(net, a, false, assign, allow_retry)
                        && backward_justify(net, b, false, assign, allow_retry)
                } else {
                    try_one_true(net, a, b, assign, allow_retry)
                }
            }
            GateType::Xor | GateType::Xnor => {
                let want_diff = want ^ (gt == GateType::Xnor);
                let (a, b) = (node.fanins()[0], node.fanins()[1]);
                backward_justify(net, a, true, assign, allow_retry)
                    && backward_justify(net, b, !want_diff, assign, allow_retry)
            }
        },
    }
}

fn try_one_false(
    net: &TpgNetwork,
    a: NodeId,
    b: NodeId,
    assign: &mut HashMap<NodeId, bool>,
    allow_retry: bool,
) -> bool {
    if backward_justify(net, a, false, assign, allow_retry) {
        return true;
    }
    if allow_retry {
        return backward_justify(net, b, false, assign, allow_retry);
    }
    false
}

fn try_one_true(
    net: &TpgNetwork,
    a: NodeId,
    b: NodeId,
    assign: &mut HashMap<NodeId, bool>,
    allow_retry: bool,
) -> bool {
    if backward_justify(net, a, true, assign, allow_retry) {
        return true;
    }
    if allow_retry {
        return backward_justify(net, b, true, assign, allow_retry);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Network, Signal};
    use crate::testvector::NodeVal;

    fn dff_network() -> Network {
        let mut net = Network::new();
        net.add_inputs(1);
        let a = Signal::from_input(0);
        let q = net.dff(a, Signal::one(), Signal::zero());
        net.add_output(q);
        net.topo_sort();
        net
    }

    #[test]
    fn test_just1_justifies_single_dff() {
        let net = dff_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let dffq = *net_ppi_dffq(&tpg);
        let mut vals = NodeValList::new();
        vals.insert(dffq, 1, true);
        let mut bt = Just1;
        bt.justify(&tpg, &mut vals);
        assert!(vals.iter().any(|e: &NodeVal| e.time == 0));
    }

    fn net_ppi_dffq(tpg: &TpgNetwork) -> Box<NodeId> {
        Box::new(
            *tpg.ppis()
                .iter()
                .find(|&&p| matches!(tpg.node(p).kind(), NodeKind::Ppi(PpiSource::DffQ(_))))
                .unwrap(),
        )
    }
}
