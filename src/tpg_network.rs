//! Elaborated, immutable circuit representation
//!
//! A [`TpgNetwork`] is built once from a parsed [`crate::Network`] and never mutated
//! afterwards. It generalizes the teacher's gate-inverter-graph representation into a
//! gate-level netlist in the traditional ATPG sense: every signal inversion and every
//! multi-literal expression is decomposed down to a small set of primitive [`GateType`]s,
//! so that every pin a stuck-at fault can sit on is a distinct node in the graph.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::ElaborationError;
use crate::network::{BinaryType, Gate, NaryType, Network, Signal, TernaryType};

/// Dense index of a [`TpgNode`] within a [`TpgNetwork`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn new(i: usize) -> NodeId {
        NodeId(i as u32)
    }

    /// Build a `NodeId` from a dense array index
    pub fn from_index(i: usize) -> NodeId {
        NodeId::new(i)
    }

    /// Dense array index for this node
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Primitive gate kind after complex-gate decomposition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateType {
    /// Constant 0
    Const0,
    /// Constant 1
    Const1,
    /// Non-inverting buffer
    Buff,
    /// Inverter
    Not,
    /// 2-input And
    And,
    /// 2-input Nand
    Nand,
    /// 2-input Or
    Or,
    /// 2-input Nor
    Nor,
    /// 2-input Xor
    Xor,
    /// 2-input Xnor
    Xnor,
}

impl GateType {
    fn arity(self) -> usize {
        match self {
            GateType::Const0 | GateType::Const1 => 0,
            GateType::Buff | GateType::Not => 1,
            _ => 2,
        }
    }
}

/// Where a PPI node's value originates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PpiSource {
    /// The `i`-th primary input of the source network
    Primary(u32),
    /// The Q output of the Dff at this source-network node index
    DffQ(usize),
}

/// Where a PPO node's value is consumed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PpoSource {
    /// The `i`-th primary output of the source network
    Primary(u32),
    /// The D input of the Dff at this source-network node index
    DffD(usize),
}

/// Role a [`TpgNode`] plays in the network
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Primary input or Dff output
    Ppi(PpiSource),
    /// Primary output or Dff input
    Ppo(PpoSource),
    /// Ordinary combinational logic
    Logic(GateType),
    /// Dff enable or reset control line
    DffControl,
}

/// One node of the elaborated circuit graph
#[derive(Clone, Debug)]
pub struct TpgNode {
    id: NodeId,
    kind: NodeKind,
    fanins: Vec<NodeId>,
    fanouts: Vec<NodeId>,
    level: u32,
    ffr_root: NodeId,
    idom: Option<NodeId>,
}

impl TpgNode {
    /// Identity of the node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Role the node plays in the network
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Ordered fanin list (empty for PPI and DffControl with a constant source)
    pub fn fanins(&self) -> &[NodeId] {
        &self.fanins
    }

    /// Nodes that use this node's value as a fanin
    pub fn fanouts(&self) -> &[NodeId] {
        &self.fanouts
    }

    /// Longest path length from any PPI
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Root of the FFR this node belongs to (itself if it is a root)
    pub fn ffr_root(&self) -> NodeId {
        self.ffr_root
    }

    /// Whether this node is the root of its own FFR
    pub fn is_ffr_root(&self) -> bool {
        self.ffr_root == self.id
    }

    /// Immediate dominator, `None` at a PPO or at an MFFC root
    pub fn idom(&self) -> Option<NodeId> {
        self.idom
    }

    /// Whether this node has no common dominator among its fanouts (MFFC root)
    pub fn is_mffc_root(&self) -> bool {
        self.idom.is_none() && !matches!(self.kind, NodeKind::Ppo(_))
    }

    /// The gate type of a logic node
    pub fn gate_type(&self) -> Option<GateType> {
        match self.kind {
            NodeKind::Logic(t) => Some(t),
            _ => None,
        }
    }
}

/// Immutable, post-elaboration circuit graph
///
/// Construct with [`TpgNetwork::build`]. Every node, fanout, level, FFR and MFFC
/// relationship is computed once and never changes afterwards.
#[derive(Clone, Debug)]
pub struct TpgNetwork {
    nodes: Vec<TpgNode>,
    ppis: Vec<NodeId>,
    ppos: Vec<NodeId>,
    /// `(source network node index, original input index) -> node whose output carries
    /// that pin's value`, sorted for binary search.
    complex_gate_map: Vec<(usize, u32, NodeId)>,
    outputs_sorted_by_tfi_size: Vec<usize>,
    const0: NodeId,
    const1: NodeId,
}

/// A small boolean-expression tree used to decompose a complex gate into primitives
///
/// Leaves reference the *original* input index of the complex gate being decomposed,
/// together with the polarity under which that input is used at this leaf.
enum Expr {
    Leaf(u32, bool),
    Bin(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Copy)]
enum BinOp {
    And,
    Or,
    Xor,
}

struct Elaborator<'a> {
    src: &'a Network,
    nodes: Vec<TpgNode>,
    /// Base (non-inverted) node representing the value of source var `i`
    var_base: Vec<Option<NodeId>>,
    /// Base node representing the value of source input `i`
    input_base: Vec<NodeId>,
    /// Memoized Not node for a given base node
    not_cache: HashMap<NodeId, NodeId>,
    complex_gate_map: Vec<(usize, u32, NodeId)>,
    ppis: Vec<NodeId>,
    ppos: Vec<NodeId>,
    const0: NodeId,
    const1: NodeId,
}

impl<'a> Elaborator<'a> {
    fn new(src: &'a Network) -> Elaborator<'a> {
        let mut nodes = Vec::new();
        let const0 = Elaborator::push_node(&mut nodes, NodeKind::Logic(GateType::Const0), vec![]);
        let const1 = Elaborator::push_node(&mut nodes, NodeKind::Logic(GateType::Const1), vec![]);
        Elaborator {
            src,
            nodes,
            var_base: vec![None; src.nb_nodes()],
            input_base: Vec::new(),
            not_cache: HashMap::new(),
            complex_gate_map: Vec::new(),
            ppis: Vec::new(),
            ppos: Vec::new(),
            const0,
            const1,
        }
    }

    fn push_node(nodes: &mut Vec<TpgNode>, kind: NodeKind, fanins: Vec<NodeId>) -> NodeId {
        let id = NodeId::new(nodes.len());
        nodes.push(TpgNode {
            id,
            kind,
            fanins,
            fanouts: Vec::new(),
            level: 0,
            ffr_root: id,
            idom: None,
        });
        id
    }

    fn new_node(&mut self, kind: NodeKind, fanins: Vec<NodeId>) -> NodeId {
        Elaborator::push_node(&mut self.nodes, kind, fanins)
    }

    /// Apply a polarity on top of an already-elaborated base node, materializing a
    /// shared Not node the first time a given base is used inverted.
    fn polarity(&mut self, base: NodeId, inverted: bool) -> NodeId {
        if !inverted {
            return base;
        }
        if base == self.const0 {
            return self.const1;
        }
        if base == self.const1 {
            return self.const0;
        }
        if let Some(n) = self.not_cache.get(&base) {
            return *n;
        }
        let n = self.new_node(NodeKind::Logic(GateType::Not), vec![base]);
        self.not_cache.insert(base, n);
        n
    }

    /// Resolve a source-network `Signal` into a fully polarity-applied `NodeId`
    fn resolve(&mut self, s: Signal) -> Result<NodeId, ElaborationError> {
        if s.is_constant() {
            return Ok(if s == Signal::one() {
                self.const1
            } else {
                self.const0
            });
        }
        if s.is_input() {
            let i = s.input() as usize;
            if i >= self.input_base.len() {
                return Err(ElaborationError::DanglingFanin {
                    node: 0,
                    signal: format!("{s}"),
                });
            }
            return Ok(self.polarity(self.input_base[i], s.is_inverted()));
        }
        let v = s.var() as usize;
        let base = self.var_base[v].ok_or_else(|| ElaborationError::DanglingFanin {
            node: v,
            signal: format!("{s}"),
        })?;
        Ok(self.polarity(base, s.is_inverted()))
    }

    /// Build the decomposition tree for a gate's full dependency list, tagging each
    /// leaf with its position among the gate's original inputs.
    fn build_expr(gate: &Gate) -> Expr {
        use Gate::*;
        match gate {
            Binary([_, _], BinaryType::And) => {
                Expr::Bin(BinOp::And, leaf(0), leaf(1))
            }
            Binary([_, _], BinaryType::Xor) => {
                Expr::Bin(BinOp::Xor, leaf(0), leaf(1))
            }
            Ternary([_, _, _], TernaryType::And) => Expr::Bin(
                BinOp::And,
                Box::new(Expr::Bin(BinOp::And, leaf(0), leaf(1))),
                leaf(2),
            ),
            Ternary([_, _, _], TernaryType::Xor) => Expr::Bin(
                BinOp::Xor,
                Box::new(Expr::Bin(BinOp::Xor, leaf(0), leaf(1))),
                leaf(2),
            ),
            Ternary([_, _, _], TernaryType::Mux) => {
                // s ? a : b  ==  (s & a) | (!s & b)
                let s_pos = leaf(0);
                let s_neg = Box::new(Expr::Leaf(0, true));
                let a = leaf(1);
                let b = leaf(2);
                Expr::Bin(
                    BinOp::Or,
                    Box::new(Expr::Bin(BinOp::And, s_pos, a)),
                    Box::new(Expr::Bin(BinOp::And, s_neg, b)),
                )
            }
            Ternary([_, _, _], TernaryType::Maj) => {
                // maj(a,b,c) = (a&b) | (b&c) | (a&c)
                let ab = Expr::Bin(BinOp::And, leaf(0), leaf(1));
                let bc = Expr::Bin(BinOp::And, leaf(1), leaf(2));
                let ac = Expr::Bin(BinOp::And, leaf(0), leaf(2));
                Expr::Bin(
                    BinOp::Or,
                    Box::new(Expr::Bin(BinOp::Or, Box::new(ab), Box::new(bc))),
                    Box::new(ac),
                )
            }
            Nary(v, tp) => {
                let op = match tp {
                    NaryType::And | NaryType::Nand => BinOp::And,
                    NaryType::Or | NaryType::Nor => BinOp::Or,
                    NaryType::Xor | NaryType::Xnor => BinOp::Xor,
                };
                let mut it = (0..v.len() as u32).map(|i| leaf(i));
                let first = it.next().expect("empty Nary decomposed as complex");
                it.fold(*first, |acc, l| Expr::Bin(op, Box::new(acc), l))
            }
            _ => unreachable!("build_expr called on a non-decomposable gate"),
        }
    }

    /// Decompose a Lut into a sum of products over its onset minterms
    fn build_lut_expr(num_vars: usize, onset: &[usize]) -> Expr {
        let mut terms = onset.iter().map(|&mask| {
            let mut lits: Vec<Expr> = (0..num_vars)
                .map(|i| Expr::Leaf(i as u32, (mask >> i) & 1 == 0))
                .collect();
            let mut it = lits.drain(..);
            let first = it.next().unwrap();
            it.fold(first, |acc, l| Expr::Bin(BinOp::And, Box::new(acc), Box::new(l)))
        });
        match terms.next() {
            None => Expr::Leaf(u32::MAX, false), // overwritten by caller: constant 0
            Some(first) => terms.fold(first, |acc, t| Expr::Bin(BinOp::Or, Box::new(acc), Box::new(t))),
        }
    }

    /// Collect, per original input index, how many times it is used and whether
    /// every use shares the same polarity.
    fn collect_usage(e: &Expr, usage: &mut HashMap<u32, (u32, bool, bool)>) {
        match e {
            Expr::Leaf(i, pol) => {
                let entry = usage.entry(*i).or_insert((0, *pol, true));
                entry.2 &= entry.1 == *pol;
                entry.0 += 1;
            }
            Expr::Bin(_, l, r) => {
                Elaborator::collect_usage(l, usage);
                Elaborator::collect_usage(r, usage);
            }
        }
    }

    fn materialize(&mut self, e: &Expr, leaf_base: &HashMap<u32, NodeId>) -> NodeId {
        match e {
            Expr::Leaf(i, pol) => {
                let base = leaf_base[i];
                self.polarity(base, *pol)
            }
            Expr::Bin(op, l, r) => {
                let ln = self.materialize(l, leaf_base);
                let rn = self.materialize(r, leaf_base);
                let gt = match op {
                    BinOp::And => GateType::And,
                    BinOp::Or => GateType::Or,
                    BinOp::Xor => GateType::Xor,
                };
                self.new_node(NodeKind::Logic(gt), vec![ln, rn])
            }
        }
    }

    /// Elaborate a multi-literal gate: decompose it into primitives and record, for
    /// every original input pin, which already-elaborated node's output carries that
    /// pin's value. A pin used more than once in the decomposition gets a dedicated
    /// Buff node so that its own stuck-at faults have a single, unambiguous site.
    fn elaborate_complex(
        &mut self,
        source_node: usize,
        deps: &[Signal],
        expr: Expr,
        final_inv: bool,
    ) -> Result<NodeId, ElaborationError> {
        let mut usage = HashMap::new();
        Elaborator::collect_usage(&expr, &mut usage);

        let mut leaf_base = HashMap::new();
        for (i, driver) in deps.iter().enumerate() {
            let i = i as u32;
            let driver_base = self.resolve(*driver)?;
            let (count, _, _) = *usage.get(&i).unwrap_or(&(0, false, true));
            let base = if count > 1 {
                self.new_node(NodeKind::Logic(GateType::Buff), vec![driver_base])
            } else {
                driver_base
            };
            leaf_base.insert(i, base);
            self.complex_gate_map.push((source_node, i, base));
        }
        self.complex_gate_map.sort();

        let chain_root = self.materialize(&expr, &leaf_base);
        Ok(self.polarity(chain_root, final_inv))
    }

    fn elaborate_node(&mut self, i: usize, gate: &Gate) -> Result<(), ElaborationError> {
        use Gate::*;
        match gate {
            Dff(_) => {
                // Handled in two passes: reserve the PPI here, resolve D/en/res later.
                let ppi = self.new_node(NodeKind::Ppi(PpiSource::DffQ(i)), vec![]);
                self.ppis.push(ppi);
                self.var_base[i] = Some(ppi);
            }
            Binary(_, _) | Ternary([_, _, _], TernaryType::And | TernaryType::Xor) => {
                let deps = gate.dependencies().to_vec();
                let expr = Elaborator::build_expr(gate);
                let node = self.elaborate_complex(i, &deps, expr, false)?;
                self.var_base[i] = Some(node);
            }
            Ternary(_, TernaryType::Mux | TernaryType::Maj) => {
                let deps = gate.dependencies().to_vec();
                let expr = Elaborator::build_expr(gate);
                let node = self.elaborate_complex(i, &deps, expr, false)?;
                self.var_base[i] = Some(node);
            }
            Nary(v, tp) => {
                let deps = v.to_vec();
                let expr = Elaborator::build_expr(gate);
                let final_inv = matches!(tp, NaryType::Nand | NaryType::Nor | NaryType::Xnor);
                let node = self.elaborate_complex(i, &deps, expr, final_inv)?;
                self.var_base[i] = Some(node);
            }
            Buf(s) => {
                let base = self.resolve(*s)?;
                self.var_base[i] = Some(base);
            }
            Lut(lut) => {
                let num_vars = lut.inputs.len();
                let hex = lut.lut.to_hex_string();
                let bits = u128::from_str_radix(&hex, 16).unwrap_or(0);
                let onset: Vec<usize> = (0..(1usize << num_vars))
                    .filter(|&m| (bits >> m) & 1 == 1)
                    .collect();
                if onset.is_empty() {
                    self.var_base[i] = Some(self.const0);
                } else if onset.len() == 1usize << num_vars {
                    self.var_base[i] = Some(self.const1);
                } else {
                    let deps = lut.inputs.to_vec();
                    let expr = Elaborator::build_lut_expr(num_vars, &onset);
                    let node = self.elaborate_complex(i, &deps, expr, false)?;
                    self.var_base[i] = Some(node);
                }
            }
        }
        Ok(())
    }

    fn finalize_dffs(&mut self) -> Result<(), ElaborationError> {
        for i in 0..self.src.nb_nodes() {
            if let Gate::Dff([d, en, res]) = self.src.gate(i) {
                let d_node = self.resolve(*d)?;
                let ppo = self.new_node(NodeKind::Ppo(PpoSource::DffD(i)), vec![d_node]);
                self.ppos.push(ppo);
                if *en != Signal::one() {
                    let en_node = self.resolve(*en)?;
                    self.new_node(NodeKind::DffControl, vec![en_node]);
                }
                if *res != Signal::zero() {
                    let res_node = self.resolve(*res)?;
                    self.new_node(NodeKind::DffControl, vec![res_node]);
                }
            }
        }
        Ok(())
    }

    fn run(mut self) -> Result<TpgNetwork, ElaborationError> {
        for i in 0..self.src.nb_inputs() {
            let ppi = self.new_node(NodeKind::Ppi(PpiSource::Primary(i as u32)), vec![]);
            self.ppis.push(ppi);
            self.input_base.push(ppi);
        }

        for i in 0..self.src.nb_nodes() {
            let gate = self.src.gate(i).clone();
            self.elaborate_node(i, &gate)?;
        }

        self.finalize_dffs()?;

        for o in 0..self.src.nb_outputs() {
            let s = self.src.output(o);
            let driver = self.resolve(s)?;
            let ppo = self.new_node(NodeKind::Ppo(PpoSource::Primary(o as u32)), vec![driver]);
            self.ppos.push(ppo);
        }

        // Materialize fanouts.
        let n = self.nodes.len();
        for i in 0..n {
            let fanins = self.nodes[i].fanins.clone();
            for f in fanins {
                self.nodes[f.index()].fanouts.push(NodeId::new(i));
            }
        }

        // Levels: forward sweep, construction order is already a valid topological order.
        for i in 0..n {
            let lvl = self.nodes[i]
                .fanins
                .iter()
                .map(|f| self.nodes[f.index()].level + 1)
                .max()
                .unwrap_or(0);
            self.nodes[i].level = lvl;
        }

        // FFR roots and immediate dominators: reverse sweep.
        for i in (0..n).rev() {
            let is_ppo = matches!(self.nodes[i].kind, NodeKind::Ppo(_));
            let fanouts = self.nodes[i].fanouts.clone();
            self.nodes[i].ffr_root = if is_ppo || fanouts.len() != 1 {
                NodeId::new(i)
            } else {
                self.nodes[fanouts[0].index()].ffr_root
            };
            self.nodes[i].idom = if is_ppo {
                None
            } else if fanouts.is_empty() {
                None
            } else {
                let mut acc = Some(fanouts[0]);
                for f in &fanouts[1..] {
                    acc = common_dominator(acc, Some(*f), &self.nodes);
                }
                acc
            };
        }

        let mut outputs_sorted_by_tfi_size: Vec<usize> = (0..self.ppos.len()).collect();
        let tfi_sizes: Vec<usize> = self
            .ppos
            .iter()
            .map(|p| tfi_size(&self.nodes, *p))
            .collect();
        outputs_sorted_by_tfi_size.sort_by_key(|&i| tfi_sizes[i]);

        Ok(TpgNetwork {
            nodes: self.nodes,
            ppis: self.ppis,
            ppos: self.ppos,
            complex_gate_map: self.complex_gate_map,
            outputs_sorted_by_tfi_size,
            const0: self.const0,
            const1: self.const1,
        })
    }
}

fn leaf(i: u32) -> Box<Expr> {
    Box::new(Expr::Leaf(i, false))
}

fn common_dominator(a: Option<NodeId>, b: Option<NodeId>, nodes: &[TpgNode]) -> Option<NodeId> {
    let (x, y) = (a?, b?);
    let mut ancestors = HashSet::new();
    let mut cur = Some(x);
    while let Some(n) = cur {
        ancestors.insert(n);
        cur = nodes[n.index()].idom;
    }
    let mut cur = Some(y);
    while let Some(n) = cur {
        if ancestors.contains(&n) {
            return Some(n);
        }
        cur = nodes[n.index()].idom;
    }
    None
}

fn tfi_size(nodes: &[TpgNode], root: NodeId) -> usize {
    let mut visited = HashSet::new();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        if visited.insert(n) {
            for f in &nodes[n.index()].fanins {
                stack.push(*f);
            }
        }
    }
    visited.len()
}

impl TpgNetwork {
    /// Elaborate a parsed [`Network`] into the immutable graph the simulator and the
    /// DTPG engines consume
    pub fn build(src: &Network) -> Result<TpgNetwork, ElaborationError> {
        if !src.is_topo_sorted() {
            return Err(ElaborationError::CombinationalLoop);
        }
        Elaborator::new(src).run()
    }

    /// Number of nodes in the elaborated graph, including PPI/PPO/control nodes
    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Node accessor
    pub fn node(&self, id: NodeId) -> &TpgNode {
        &self.nodes[id.index()]
    }

    /// All pseudo-primary inputs, in creation order (primary inputs first, then Dff outputs)
    pub fn ppis(&self) -> &[NodeId] {
        &self.ppis
    }

    /// All pseudo-primary outputs, in creation order (Dff inputs first, then primary outputs)
    pub fn ppos(&self) -> &[NodeId] {
        &self.ppos
    }

    /// Primary outputs ordered from the smallest transitive fanin cone to the largest
    pub fn ppos_sorted_by_tfi_size(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.outputs_sorted_by_tfi_size.iter().map(|&i| self.ppos[i])
    }

    /// The shared constant-0 node
    pub fn const0(&self) -> NodeId {
        self.const0
    }

    /// The shared constant-1 node
    pub fn const1(&self) -> NodeId {
        self.const1
    }

    /// Look up the node whose output carries the value of one input pin of a gate in
    /// the *source* network (before complex-gate decomposition). A stuck-at fault on
    /// that original pin is an output fault on the returned node.
    pub fn complex_fanin_site(&self, source_node: usize, input_index: u32) -> Option<NodeId> {
        self.complex_gate_map
            .binary_search_by(|&(n, i, _)| (n, i).cmp(&(source_node, input_index)))
            .ok()
            .map(|idx| self.complex_gate_map[idx].2)
    }

    /// All FFR roots the given MFFC root dominates (reachable via immediate-dominator edges)
    pub fn mffc_members(&self, mffc_root: NodeId) -> Vec<NodeId> {
        // Build the inverse of the idom relation lazily; the tree is small relative
        // to the node count for every circuit this toolkit targets.
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for n in &self.nodes {
            if let Some(d) = n.idom {
                children.entry(d).or_default().push(n.id);
            }
        }
        let mut members = Vec::new();
        let mut stack = vec![mffc_root];
        while let Some(n) = stack.pop() {
            if self.nodes[n.index()].is_ffr_root() {
                members.push(n);
            }
            if let Some(kids) = children.get(&n) {
                stack.extend(kids.iter().copied());
            }
        }
        members
    }

    /// Check the structural invariants of the network (used in tests)
    pub fn check_invariants(&self) {
        for n in &self.nodes {
            if let NodeKind::Logic(gt) = n.kind {
                assert_eq!(n.fanins.len(), gt.arity(), "bad fanin arity at {}", n.id);
            }
            if let NodeKind::Ppo(_) = n.kind {
                assert_eq!(n.fanins.len(), 1, "PPO with wrong fanin arity at {}", n.id);
            }
            for f in &n.fanins {
                let expected = self.nodes[f.index()].level + 1;
                assert!(n.level >= expected || n.fanins.is_empty());
            }
            assert!(n.ffr_root == n.id || self.nodes[n.ffr_root.index()].is_ffr_root());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Network, Signal};

    fn and_xor_network() -> Network {
        let mut net = Network::new();
        net.add_inputs(3);
        let a = Signal::from_input(0);
        let b = Signal::from_input(1);
        let c = Signal::from_input(2);
        let g1 = net.and(a, b);
        let g2 = net.xor(g1, c);
        net.add_output(g2);
        net.topo_sort();
        net
    }

    #[test]
    fn test_build_assigns_strictly_increasing_levels() {
        let net = and_xor_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        tpg.check_invariants();
        for n in 0..tpg.nb_nodes() {
            let node = tpg.node(NodeId::from_index(n));
            for &fanin in node.fanins() {
                assert!(tpg.node(fanin).level() < node.level());
            }
        }
    }

    #[test]
    fn test_forward_reference_is_rejected_as_combinational_loop() {
        let mut net = Network::new();
        net.add_inputs(2);
        let a = Signal::from_input(0);
        let b = Signal::from_input(1);
        net.add(Gate::and(a, b));
        net.add(Gate::and(a, b));
        // `replace` bypasses the builder's append-only discipline: node 0 now
        // references node 1, a forward reference `topo_sort`'s callers never produce.
        net.replace(0, Gate::and(a, Signal::from_var(1)));
        assert!(matches!(
            TpgNetwork::build(&net),
            Err(ElaborationError::CombinationalLoop)
        ));
    }

    use proptest::prelude::*;

    proptest! {
        /// Every elaborated node's level strictly dominates its fanins' levels, and
        /// every FFR root is its own root (invariant 2: level consistency), across a
        /// family of randomly sized adder/carry-chain networks.
        #[test]
        fn prop_level_and_ffr_invariants_hold(width in 1usize..32, kind in 0u8..2) {
            let net = if kind == 0 {
                crate::network::generators::adder::ripple_carry(width)
            } else {
                crate::network::generators::carry_chain::ripple_carry(width)
            };
            let mut net = net;
            net.topo_sort();
            let tpg = TpgNetwork::build(&net).unwrap();
            tpg.check_invariants();
            for n in 0..tpg.nb_nodes() {
                let node = tpg.node(NodeId::from_index(n));
                for &fanin in node.fanins() {
                    prop_assert!(tpg.node(fanin).level() < node.level());
                }
                let root = node.ffr_root();
                prop_assert!(root == node.id() || tpg.node(root).is_ffr_root());
            }
        }
    }
}
