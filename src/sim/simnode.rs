//! Simulation-oriented mirror of [`crate::tpg_network::TpgNetwork`]
//!
//! A [`SimGraph`] holds the same topology as a `TpgNetwork` but adds the packed,
//! mutable good/faulty value state the fault simulator reads and writes on every
//! evaluation. It is built once per simulator instance and reused across every
//! pattern and fault.

use crate::tpg_network::{GateType, NodeKind, TpgNetwork};

/// One simulation-side node: a flattened, index-addressed copy of a `TpgNode`
#[derive(Clone, Debug)]
pub struct SimNode {
    fanins: Vec<usize>,
    fanouts: Vec<usize>,
    gate_type: Option<GateType>,
    level: u32,
    ffr_root: usize,
    is_ppo: bool,
}

impl SimNode {
    /// Fanin node indices
    pub fn fanins(&self) -> &[usize] {
        &self.fanins
    }

    /// Fanout node indices
    pub fn fanouts(&self) -> &[usize] {
        &self.fanouts
    }

    /// Level (longest path from any PPI)
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Index of the FFR root this node belongs to
    pub fn ffr_root(&self) -> usize {
        self.ffr_root
    }

    /// Whether this node is a primary/pseudo-primary output
    pub fn is_ppo(&self) -> bool {
        self.is_ppo
    }
}

/// Packed 2-valued evaluation of one primitive gate over a 64-bit pattern word
pub fn eval_gate_2v(gt: GateType, fanins: &[u64]) -> u64 {
    use GateType::*;
    match gt {
        Const0 => 0,
        Const1 => u64::MAX,
        Buff => fanins[0],
        Not => !fanins[0],
        And => fanins[0] & fanins[1],
        Nand => !(fanins[0] & fanins[1]),
        Or => fanins[0] | fanins[1],
        Nor => !(fanins[0] | fanins[1]),
        Xor => fanins[0] ^ fanins[1],
        Xnor => !(fanins[0] ^ fanins[1]),
    }
}

/// Packed `(v0, v1)` pair: `(1,0)` = 0, `(0,1)` = 1, `(1,1)` = X
pub type Pair = (u64, u64);

fn and3(a: Pair, b: Pair) -> Pair {
    (a.0 | b.0, a.1 & b.1)
}

fn or3(a: Pair, b: Pair) -> Pair {
    (a.0 & b.0, a.1 | b.1)
}

fn not3(a: Pair) -> Pair {
    (a.1, a.0)
}

fn xor3(a: Pair, b: Pair) -> Pair {
    let any_x = (a.0 & a.1) | (b.0 & b.1);
    let eq = (a.0 & b.0) | (a.1 & b.1);
    let ne = (a.1 & b.0) | (a.0 & b.1);
    (eq | any_x, ne | any_x)
}

/// Packed 3-valued evaluation of one primitive gate
pub fn eval_gate_3v(gt: GateType, fanins: &[Pair]) -> Pair {
    use GateType::*;
    match gt {
        Const0 => (u64::MAX, 0),
        Const1 => (0, u64::MAX),
        Buff => fanins[0],
        Not => not3(fanins[0]),
        And => and3(fanins[0], fanins[1]),
        Nand => not3(and3(fanins[0], fanins[1])),
        Or => or3(fanins[0], fanins[1]),
        Nor => not3(or3(fanins[0], fanins[1])),
        Xor => xor3(fanins[0], fanins[1]),
        Xnor => not3(xor3(fanins[0], fanins[1])),
    }
}

/// Simulation-side topology plus packed good/faulty state
pub struct SimGraph {
    nodes: Vec<SimNode>,
    /// Good-circuit value, `v1` lane (also the 2-valued value)
    gval1: Vec<u64>,
    /// Good-circuit value, `v0` lane (only meaningful in 3-valued mode)
    gval0: Vec<u64>,
    /// Faulty-circuit value, `v1` lane
    fval1: Vec<u64>,
    /// Faulty-circuit value, `v0` lane
    fval0: Vec<u64>,
    /// Nodes touched since the last [`SimGraph::clear_faulty`], for O(touched) reset
    touched: Vec<usize>,
}

impl SimGraph {
    /// Build the simulation graph from an elaborated network
    pub fn build(net: &TpgNetwork) -> SimGraph {
        let n = net.nb_nodes();
        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let node = net.node(crate::tpg_network::NodeId::from_index(i));
            nodes.push(SimNode {
                fanins: node.fanins().iter().map(|f| f.index()).collect(),
                fanouts: node.fanouts().iter().map(|f| f.index()).collect(),
                gate_type: node.gate_type(),
                level: node.level(),
                ffr_root: node.ffr_root().index(),
                is_ppo: matches!(node.kind(), NodeKind::Ppo(_)),
            });
        }
        SimGraph {
            nodes,
            gval1: vec![0; n],
            gval0: vec![u64::MAX; n],
            fval1: vec![0; n],
            fval0: vec![u64::MAX; n],
            touched: Vec::new(),
        }
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Node accessor
    pub fn node(&self, i: usize) -> &SimNode {
        &self.nodes[i]
    }

    /// Good-circuit value (2-valued)
    pub fn gval(&self, i: usize) -> u64 {
        self.gval1[i]
    }

    /// Set a node's good-circuit value directly (used to drive PPIs)
    pub fn set_gval(&mut self, i: usize, v: u64) {
        self.gval1[i] = v;
        self.gval0[i] = !v;
    }

    /// Good-circuit 3-valued pair
    pub fn gval3(&self, i: usize) -> Pair {
        (self.gval0[i], self.gval1[i])
    }

    /// Set a node's good-circuit 3-valued pair directly (used to drive PPIs)
    pub fn set_gval3(&mut self, i: usize, v: Pair) {
        self.gval0[i] = v.0;
        self.gval1[i] = v.1;
    }

    /// Faulty-circuit value (2-valued)
    pub fn fval(&self, i: usize) -> u64 {
        self.fval1[i]
    }

    /// Faulty-circuit 3-valued pair
    pub fn fval3(&self, i: usize) -> Pair {
        (self.fval0[i], self.fval1[i])
    }

    /// Sweep every node in (already topologically-sorted) index order, computing
    /// 2-valued good-circuit values from already-set PPI values
    pub fn eval_good_2v(&mut self) {
        for i in 0..self.nodes.len() {
            if let Some(gt) = self.nodes[i].gate_type {
                let fanins: Vec<u64> = self.nodes[i].fanins.iter().map(|&f| self.gval1[f]).collect();
                self.gval1[i] = eval_gate_2v(gt, &fanins);
            } else if self.nodes[i].is_ppo {
                self.gval1[i] = self.gval1[self.nodes[i].fanins[0]];
            }
        }
    }

    /// Sweep every node computing 3-valued good-circuit values
    pub fn eval_good_3v(&mut self) {
        for i in 0..self.nodes.len() {
            if let Some(gt) = self.nodes[i].gate_type {
                let fanins: Vec<Pair> = self.nodes[i]
                    .fanins
                    .iter()
                    .map(|&f| (self.gval0[f], self.gval1[f]))
                    .collect();
                let (v0, v1) = eval_gate_3v(gt, &fanins);
                self.gval0[i] = v0;
                self.gval1[i] = v1;
            } else if self.nodes[i].is_ppo {
                let f = self.nodes[i].fanins[0];
                self.gval0[i] = self.gval0[f];
                self.gval1[i] = self.gval1[f];
            }
        }
    }

    /// Start a faulty-circuit evaluation at `node` by forcing its faulty value and
    /// recording it as touched
    pub fn inject_fault(&mut self, node: usize, value: u64) {
        self.fval1[node] = value;
        self.fval0[node] = !value;
        self.touched.push(node);
    }

    /// Start a 3-valued faulty-circuit evaluation at `node` by forcing its faulty pair
    pub fn inject_fault3(&mut self, node: usize, value: Pair) {
        self.fval0[node] = value.0;
        self.fval1[node] = value.1;
        self.touched.push(node);
    }

    /// Overwrite the bits selected by `mask` in node `i`'s faulty value with the
    /// matching bits of `value`, leaving every other lane at its current faulty value
    /// (or the good value, if `i` hasn't been touched yet this round). Lets several
    /// distinct faults, each owning a disjoint lane of the same packed word, be
    /// injected and propagated together for fault-parallel (SPPFP) simulation.
    pub fn inject_fault_lane(&mut self, i: usize, mask: u64, value: u64) {
        let base = self.fval_or_good(i);
        self.fval1[i] = (base & !mask) | (value & mask);
        self.touched.push(i);
    }

    /// Recompute node `i`'s faulty value from its fanins' faulty values (falling back
    /// to the good value for fanins that were never touched), returning whether the
    /// value changed from the good-circuit one
    pub fn recompute_faulty_2v(&mut self, i: usize) -> bool {
        let gt = match self.nodes[i].gate_type {
            Some(gt) => gt,
            None => {
                // PPO: just forward its single fanin.
                let f = self.nodes[i].fanins[0];
                self.fval1[i] = self.fval_or_good(f);
                self.touched.push(i);
                return self.fval1[i] != self.gval1[i];
            }
        };
        let fanins: Vec<u64> = self.nodes[i]
            .fanins
            .iter()
            .map(|&f| self.fval_or_good(f))
            .collect();
        let v = eval_gate_2v(gt, &fanins);
        let changed = v != self.gval1[i];
        self.fval1[i] = v;
        self.touched.push(i);
        changed
    }

    fn fval_or_good(&self, i: usize) -> u64 {
        if self.touched.contains(&i) {
            self.fval1[i]
        } else {
            self.gval1[i]
        }
    }

    fn fval3_or_good(&self, i: usize) -> Pair {
        if self.touched.contains(&i) {
            (self.fval0[i], self.fval1[i])
        } else {
            (self.gval0[i], self.gval1[i])
        }
    }

    /// Recompute node `i`'s 3-valued faulty value from its fanins' faulty values
    /// (falling back to the good value for fanins never touched), returning whether
    /// the resulting pair changed from the good-circuit one
    pub fn recompute_faulty_3v(&mut self, i: usize) -> bool {
        let gt = match self.nodes[i].gate_type {
            Some(gt) => gt,
            None => {
                let f = self.nodes[i].fanins[0];
                let v = self.fval3_or_good(f);
                self.fval0[i] = v.0;
                self.fval1[i] = v.1;
                self.touched.push(i);
                return v != (self.gval0[i], self.gval1[i]);
            }
        };
        let fanins: Vec<Pair> = self.nodes[i].fanins.iter().map(|&f| self.fval3_or_good(f)).collect();
        let v = eval_gate_3v(gt, &fanins);
        let changed = v != (self.gval0[i], self.gval1[i]);
        self.fval0[i] = v.0;
        self.fval1[i] = v.1;
        self.touched.push(i);
        changed
    }

    /// Reset every touched node's faulty value back to its good value
    pub fn clear_faulty(&mut self) {
        for i in self.touched.drain(..) {
            self.fval1[i] = self.gval1[i];
            self.fval0[i] = self.gval0[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Network, Signal};
    use crate::tpg_network::TpgNetwork;

    #[test]
    fn test_and_good_value() {
        let mut net = Network::new();
        net.add_inputs(2);
        let a = Signal::from_input(0);
        let b = Signal::from_input(1);
        let g = net.and(a, b);
        net.add_output(g);
        net.topo_sort();
        let tpg = TpgNetwork::build(&net).unwrap();
        let mut sg = SimGraph::build(&tpg);
        let ppis = tpg.ppis().to_vec();
        sg.set_gval(ppis[0].index(), u64::MAX);
        sg.set_gval(ppis[1].index(), 0);
        sg.eval_good_2v();
        let ppo = tpg.ppos()[0];
        assert_eq!(sg.gval(ppo.index()), 0);
    }
}
