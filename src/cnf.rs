//! Tseitin CNF encoding of the good and faulty circuits for SAT-based test generation
//!
//! Builds one boolean variable per [`crate::tpg_network::TpgNetwork`] node for the
//! good circuit, and (for one fault at a time) a faulty copy that shares the good
//! copy's literal at every node outside the fault's transitive fanout: only the cone
//! downstream of the fault site gets its own variables, forced to diverge from the
//! good circuit at the fault's own site. A final set of "difference" variables, one
//! per PPO, ties detection to at least one output differing between the two copies.
//! This mirrors the teacher's own `to_cnf` gate-by-gate Tseitin encoding, generalized
//! from the gate-inverter-graph's `And`/`Xor`/`Mux`/`Maj` gates to the elaborated
//! network's primitive [`GateType`]s.

use rustsat::instances::SatInstance;
use rustsat::types::Lit;

use crate::fault::TpgFault;
use crate::tpg_network::{GateType, NodeId, NodeKind, TpgNetwork};

fn encode_gate(inst: &mut SatInstance, gt: GateType, fanins: &[Lit]) -> Lit {
    match gt {
        GateType::Const0 => {
            let v = inst.new_var();
            inst.add_unit(!v.pos_lit());
            v.pos_lit()
        }
        GateType::Const1 => {
            let v = inst.new_var();
            inst.add_unit(v.pos_lit());
            v.pos_lit()
        }
        GateType::Buff => fanins[0],
        GateType::Not => !fanins[0],
        GateType::And | GateType::Nand => {
            let (a, b) = (fanins[0], fanins[1]);
            let n = inst.new_var().pos_lit();
            // n <-> a & b
            inst.add_ternary(!a, !b, n);
            inst.add_binary(a, !n);
            inst.add_binary(b, !n);
            if gt == GateType::Nand {
                !n
            } else {
                n
            }
        }
        GateType::Or | GateType::Nor => {
            let (a, b) = (fanins[0], fanins[1]);
            let n = inst.new_var().pos_lit();
            // n <-> a | b
            inst.add_ternary(a, b, !n);
            inst.add_binary(!a, n);
            inst.add_binary(!b, n);
            if gt == GateType::Nor {
                !n
            } else {
                n
            }
        }
        GateType::Xor | GateType::Xnor => {
            let (a, b) = (fanins[0], fanins[1]);
            let n = inst.new_var().pos_lit();
            // n <-> a xor b
            inst.add_ternary(!a, !b, !n);
            inst.add_ternary(a, b, !n);
            inst.add_ternary(!a, b, n);
            inst.add_ternary(a, !b, n);
            if gt == GateType::Xnor {
                !n
            } else {
                n
            }
        }
    }
}

/// Tseitin if-then-else: `sel ? stuck : natural`, where `stuck` is a compile-time
/// constant. Used to inject a fault at a single node while leaving every other
/// assumption-selected fault's injection point untouched in the same shared CNF.
fn encode_ite_override(inst: &mut SatInstance, sel: Lit, stuck: bool, natural: Lit) -> Lit {
    let out = inst.new_var().pos_lit();
    // sel -> (out == stuck)
    inst.add_binary(!sel, if stuck { out } else { !out });
    // !sel -> (out == natural)
    inst.add_ternary(sel, !natural, out);
    inst.add_ternary(sel, natural, !out);
    out
}

/// Every node index in `root`'s transitive fanout, including `root` itself
fn fanout_cone(net: &TpgNetwork, root: NodeId) -> Vec<bool> {
    let mut in_cone = vec![false; net.nb_nodes()];
    let mut stack = vec![root];
    in_cone[root.index()] = true;
    while let Some(n) = stack.pop() {
        for &fo in net.node(n).fanouts() {
            if !in_cone[fo.index()] {
                in_cone[fo.index()] = true;
                stack.push(fo);
            }
        }
    }
    in_cone
}

/// Every node index belonging to `mffc_root`'s multi-level FFR cone: nodes whose
/// dominator chain reaches `mffc_root` without passing through another MFFC's
/// boundary, plus `mffc_root`'s own transitive fanout
fn mffc_interior(net: &TpgNetwork, mffc_root: NodeId) -> Vec<bool> {
    let mut interior = fanout_cone(net, mffc_root);
    for i in 0..net.nb_nodes() {
        let mut cur = NodeId::from_index(i);
        loop {
            if cur == mffc_root {
                interior[i] = true;
                break;
            }
            match net.node(cur).idom() {
                Some(parent) => cur = parent,
                None => break,
            }
        }
    }
    interior
}

/// One circuit copy's node-indexed literals, shared by [`CircuitCnf`] and the
/// hierarchical engines' [`FfrFaultyCnf`]/[`MffcFaultyCnf`] so [`encode_detection`]
/// can tie any of them to the good circuit without caring which granularity built it
pub trait CnfLits {
    /// Literal carrying node `id`'s value in this copy
    fn lit(&self, id: NodeId) -> Lit;
}

/// One Tseitin-encoded copy of a network: one literal per node
pub struct CircuitCnf {
    lits: Vec<Lit>,
}

impl CircuitCnf {
    /// Literal carrying node `id`'s value in this copy
    pub fn lit(&self, id: NodeId) -> Lit {
        self.lits[id.index()]
    }
}

impl CnfLits for CircuitCnf {
    fn lit(&self, id: NodeId) -> Lit {
        self.lits[id.index()]
    }
}

/// Encode the good circuit into `inst`, one fresh literal per node, PPIs free and
/// every gate tied to its fanins by Tseitin clauses
pub fn encode_good(inst: &mut SatInstance, net: &TpgNetwork) -> CircuitCnf {
    let mut lits = vec![None; net.nb_nodes()];
    for i in 0..net.nb_nodes() {
        let id = NodeId::from_index(i);
        let node = net.node(id);
        let lit = if let Some(gt) = node.gate_type() {
            let fanin_lits: Vec<Lit> = node
                .fanins()
                .iter()
                .map(|&f| lits[f.index()].expect("fanins are encoded before their users"))
                .collect();
            encode_gate(inst, gt, &fanin_lits)
        } else if matches!(node.kind(), NodeKind::Ppo(_)) {
            lits[node.fanins()[0].index()].expect("PPO fanin encoded first")
        } else {
            inst.new_var().pos_lit()
        };
        lits[i] = Some(lit);
    }
    CircuitCnf {
        lits: lits.into_iter().map(|l| l.unwrap()).collect(),
    }
}

/// Encode the faulty copy of the network with `fault`'s own node forced to its stuck
/// value. Per the detection semantics (every node outside the fault's transitive
/// fanout behaves identically in both copies), every node index outside
/// [`fanout_cone`] of the fault's node reuses `good`'s own literal directly rather
/// than getting an independent, unconstrained fresh variable: only the downstream
/// cone is re-encoded.
pub fn encode_faulty(
    inst: &mut SatInstance,
    net: &TpgNetwork,
    fault: &TpgFault,
    good: &CircuitCnf,
) -> CircuitCnf {
    let cone = fanout_cone(net, fault.node());
    let fault_node = fault.node().index();
    let mut lits: Vec<Option<Lit>> = vec![None; net.nb_nodes()];
    for i in 0..net.nb_nodes() {
        let id = NodeId::from_index(i);
        if !cone[i] {
            lits[i] = Some(good.lit(id));
            continue;
        }
        let node = net.node(id);
        let lit = if i == fault_node && matches!(fault.site(), crate::fault::FaultSite::Output) {
            let v = inst.new_var().pos_lit();
            inst.add_unit(if fault.stuck_value() { v } else { !v });
            v
        } else if let Some(gt) = node.gate_type() {
            let mut fanin_lits: Vec<Lit> = node
                .fanins()
                .iter()
                .map(|&f| lits[f.index()].expect("fanins are encoded before their users"))
                .collect();
            if i == fault_node {
                if let crate::fault::FaultSite::Input(k) = fault.site() {
                    let v = inst.new_var().pos_lit();
                    inst.add_unit(if fault.stuck_value() { v } else { !v });
                    fanin_lits[k as usize] = v;
                }
            }
            encode_gate(inst, gt, &fanin_lits)
        } else if matches!(node.kind(), NodeKind::Ppo(_)) {
            lits[node.fanins()[0].index()].expect("PPO fanin encoded first")
        } else {
            inst.new_var().pos_lit()
        };
        lits[i] = Some(lit);
    }
    CircuitCnf {
        lits: lits.into_iter().map(|l| l.unwrap()).collect(),
    }
}

/// A faulty copy shared by every representative fault in one FFR: one selector
/// literal per candidate fault, muxed in via [`encode_ite_override`] so a single CNF
/// serves every solve, with assumptions (see [`FfrFaultyCnf::select`]) picking which
/// fault (if any) is actually injected for a given solver call
pub struct FfrFaultyCnf {
    lits: Vec<Lit>,
    selectors: std::collections::HashMap<crate::fault::FaultId, Lit>,
}

impl CnfLits for FfrFaultyCnf {
    fn lit(&self, id: NodeId) -> Lit {
        self.lits[id.index()]
    }
}

impl FfrFaultyCnf {
    /// Literal carrying node `id`'s faulty value in this shared copy
    pub fn lit(&self, id: NodeId) -> Lit {
        self.lits[id.index()]
    }

    /// Assumption literals selecting `fault` as the one injected fault for this solve:
    /// its own selector positive, every other candidate's selector negated
    pub fn select(&self, fault: crate::fault::FaultId) -> Vec<Lit> {
        self.selectors
            .iter()
            .map(|(&id, &sel)| if id == fault { sel } else { !sel })
            .collect()
    }
}

/// Encode one shared faulty CNF over `ffr_root`'s FFR, covering every fault in
/// `fault_ids` via a selector literal each. `ffr_root`'s FFR is its own transitive
/// fanout cone truncated at the next FFR boundary, but since every fault considered
/// here is rooted inside that FFR, the fault's own node's fanout cone already bounds
/// the region that needs re-encoding; outside it every node shares `good`'s literal.
pub fn encode_faulty_ffr(
    inst: &mut SatInstance,
    net: &TpgNetwork,
    good: &CircuitCnf,
    fdb: &crate::fault::FaultDb,
    ffr_root: NodeId,
    fault_ids: &[crate::fault::FaultId],
) -> FfrFaultyCnf {
    let cone = fanout_cone(net, ffr_root);
    let mut selectors = std::collections::HashMap::new();
    for &fid in fault_ids {
        let sel = inst.new_var().pos_lit();
        selectors.insert(fid, sel);
    }
    let faults_at_node: std::collections::HashMap<usize, Vec<crate::fault::FaultId>> = {
        let mut m: std::collections::HashMap<usize, Vec<crate::fault::FaultId>> =
            std::collections::HashMap::new();
        for &fid in fault_ids {
            m.entry(fdb.fault(fid).node().index()).or_default().push(fid);
        }
        m
    };

    let mut lits: Vec<Option<Lit>> = vec![None; net.nb_nodes()];
    for i in 0..net.nb_nodes() {
        let id = NodeId::from_index(i);
        if !cone[i] {
            lits[i] = Some(good.lit(id));
            continue;
        }
        let node = net.node(id);
        let local_faults = faults_at_node.get(&i);
        let mut fanin_lits: Vec<Lit> = node.gate_type().map_or_else(Vec::new, |_| {
            node.fanins()
                .iter()
                .map(|&f| lits[f.index()].expect("fanins are encoded before their users"))
                .collect()
        });
        if let Some(locals) = local_faults {
            for &fid in locals {
                let fault = fdb.fault(fid);
                let sel = selectors[&fid];
                if let crate::fault::FaultSite::Input(k) = fault.site() {
                    let natural = fanin_lits[k as usize];
                    fanin_lits[k as usize] = encode_ite_override(inst, sel, fault.stuck_value(), natural);
                }
            }
        }
        let natural_out = if let Some(gt) = node.gate_type() {
            encode_gate(inst, gt, &fanin_lits)
        } else if matches!(node.kind(), NodeKind::Ppo(_)) {
            lits[node.fanins()[0].index()].expect("PPO fanin encoded first")
        } else {
            good.lit(id)
        };
        let mut out = natural_out;
        if let Some(locals) = local_faults {
            for &fid in locals {
                let fault = fdb.fault(fid);
                if matches!(fault.site(), crate::fault::FaultSite::Output) {
                    let sel = selectors[&fid];
                    out = encode_ite_override(inst, sel, fault.stuck_value(), out);
                }
            }
        }
        lits[i] = Some(out);
    }
    FfrFaultyCnf {
        lits: lits.into_iter().map(|l| l.unwrap()).collect(),
        selectors,
    }
}

/// A faulty copy shared by every FFR root inside one MFFC, injecting a fault at the
/// granularity of "flip this FFR root's value" via one `elem_var` per member, exactly
/// one of which may be true per solve (see [`MffcFaultyCnf::select`])
pub struct MffcFaultyCnf {
    lits: Vec<Lit>,
    elem_vars: std::collections::HashMap<NodeId, Lit>,
}

impl CnfLits for MffcFaultyCnf {
    fn lit(&self, id: NodeId) -> Lit {
        self.lits[id.index()]
    }
}

impl MffcFaultyCnf {
    /// Literal carrying node `id`'s faulty value in this shared copy
    pub fn lit(&self, id: NodeId) -> Lit {
        self.lits[id.index()]
    }

    /// Assumption literals selecting `ffr_root` as the injected member for this solve
    pub fn select(&self, ffr_root: NodeId) -> Vec<Lit> {
        self.elem_vars
            .iter()
            .map(|(&id, &v)| if id == ffr_root { v } else { !v })
            .collect()
    }

    /// [`MffcFaultyCnf::select`]'s assumptions, plus a literal pinning `good`'s own
    /// value at `ffr_root` so the elem-toggle (`faulty = good xor elem`) produces
    /// `stuck_value` specifically rather than merely "some difference from good":
    /// toggling only ever flips to `good`'s complement, so forcing `good` itself to
    /// `!stuck_value` makes the toggled faulty value exactly `stuck_value`.
    pub fn select_fault(&self, good: &CircuitCnf, ffr_root: NodeId, stuck_value: bool) -> Vec<Lit> {
        let mut assumps = self.select(ffr_root);
        let g = good.lit(ffr_root);
        assumps.push(if stuck_value { !g } else { g });
        assumps
    }
}

/// Encode one shared faulty CNF over `mffc_root`'s multi-level FFR cone. Each member
/// FFR root in `members` (see [`TpgNetwork::mffc_members`]) gets an `elem_var`; when
/// true, that member's faulty value is forced to differ from its good value (an
/// unconditional XOR override standing in for "some fault was injected here", with
/// the actual stuck-at fault resolved downstream by the caller's backtrace/pattern
/// extraction). Exactly one `elem_var` may be true per solve, matched by a one-hot
/// clause set. Overriding a member's value unconditionally — rather than muxing it
/// with its normal gate computation — means a nested inner member's own injected
/// difference cannot propagate through an outer member while the outer one isn't
/// selected; this mirrors single-fault-at-a-time DTPG (only one `elem_var` is ever
/// true in a given solve) so it never actually arises in practice.
pub fn encode_faulty_mffc(
    inst: &mut SatInstance,
    net: &TpgNetwork,
    good: &CircuitCnf,
    mffc_root: NodeId,
    members: &[NodeId],
) -> MffcFaultyCnf {
    let cone = mffc_interior(net, mffc_root);
    let mut elem_vars = std::collections::HashMap::new();
    for &m in members {
        elem_vars.insert(m, inst.new_var().pos_lit());
    }
    let all: Vec<Lit> = members.iter().map(|m| elem_vars[m]).collect();
    inst.add_clause(all.clone());
    for i in 0..all.len() {
        for j in (i + 1)..all.len() {
            inst.add_binary(!all[i], !all[j]);
        }
    }

    let mut lits: Vec<Option<Lit>> = vec![None; net.nb_nodes()];
    for i in 0..net.nb_nodes() {
        let id = NodeId::from_index(i);
        if !cone[i] {
            lits[i] = Some(good.lit(id));
            continue;
        }
        let node = net.node(id);
        let natural = if let Some(gt) = node.gate_type() {
            let fanin_lits: Vec<Lit> = node
                .fanins()
                .iter()
                .map(|&f| lits[f.index()].expect("fanins are encoded before their users"))
                .collect();
            encode_gate(inst, gt, &fanin_lits)
        } else if matches!(node.kind(), NodeKind::Ppo(_)) {
            lits[node.fanins()[0].index()].expect("PPO fanin encoded first")
        } else {
            good.lit(id)
        };
        let out = if let Some(&elem) = elem_vars.get(&id) {
            // faulty = good xor elem
            let f = inst.new_var().pos_lit();
            let g = good.lit(id);
            inst.add_ternary(!g, !elem, !f);
            inst.add_ternary(g, elem, !f);
            inst.add_ternary(!g, elem, f);
            inst.add_ternary(g, !elem, f);
            let _ = natural;
            f
        } else {
            natural
        };
        lits[i] = Some(out);
    }
    MffcFaultyCnf {
        lits: lits.into_iter().map(|l| l.unwrap()).collect(),
        elem_vars,
    }
}

/// Add the clause asserting that at least one PPO differs between `good` and `faulty`,
/// returning the per-PPO "difference" literals created along the way
pub fn encode_detection(
    inst: &mut SatInstance,
    net: &TpgNetwork,
    good: &CircuitCnf,
    faulty: &impl CnfLits,
) -> Vec<Lit> {
    let mut diffs = Vec::with_capacity(net.ppos().len());
    for &ppo in net.ppos() {
        let g = good.lit(ppo);
        let f = faulty.lit(ppo);
        let d = inst.new_var().pos_lit();
        // d <-> g xor f
        inst.add_ternary(!g, !f, !d);
        inst.add_ternary(g, f, !d);
        inst.add_ternary(!g, f, d);
        inst.add_ternary(g, !f, d);
        diffs.push(d);
    }
    inst.add_clause(diffs.clone());
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{FaultDb, FaultSite};
    use crate::network::{Network, Signal};
    use rustsat::solvers::{Solve, SolverResult};

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
    fn test_sa0_on_and_output_is_satisfiable_with_both_inputs_one() {
        let net = and_network();
        let tpg = TpgNetwork::build(&net).unwrap();
        let db = FaultDb::extract(&tpg);
        let ppo = tpg.ppos()[0];
        let and_node = tpg.node(ppo).fanins()[0];
        let sa0 = db
            .faults_at(and_node)
            .iter()
            .map(|&id| *db.fault(id))
            .find(|f| matches!(f.site(), FaultSite::Output) && !f.stuck_value())
            .unwrap();

        let mut inst = SatInstance::new();
        let good = encode_good(&mut inst, &tpg);
        let faulty = encode_faulty(&mut inst, &tpg, &sa0, &good);
        encode_detection(&mut inst, &tpg, &good, &faulty);

        let (cnf, _) = inst.into_cnf();
        let mut solver = rustsat_kissat::Kissat::default();
        solver.add_cnf(cnf).unwrap();
        assert_eq!(solver.solve().unwrap(), SolverResult::Sat);
    }

    /// `z = AND(a, NOT(a))` is tautologically 0, so `z-output/sa0` cannot be excited
    /// by any input assignment: with good/faulty PPI literals shared, the detection
    /// clause is UNSAT. Before sharing literals outside the fault's fanout cone, this
    /// fault was wrongly reported testable because the faulty copy's independent `a`
    /// could take a different value than the good copy's.
    #[test]
    fn test_tautological_redundancy_is_unsatisfiable() {
        let mut net = Network::new();
        net.add_inputs(1);
        let a = Signal::from_input(0);
        let g = net.and(a, !a);
        net.add_output(g);
        net.topo_sort();
        let tpg = TpgNetwork::build(&net).unwrap();
        let db = FaultDb::extract(&tpg);
        let ppo = tpg.ppos()[0];
        let and_node = tpg.node(ppo).fanins()[0];
        let sa0 = db
            .faults_at(and_node)
            .iter()
            .map(|&id| *db.fault(id))
            .find(|f| matches!(f.site(), FaultSite::Output) && !f.stuck_value())
            .unwrap();

        let mut inst = SatInstance::new();
        let good = encode_good(&mut inst, &tpg);
        let faulty = encode_faulty(&mut inst, &tpg, &sa0, &good);
        encode_detection(&mut inst, &tpg, &good, &faulty);

        let (cnf, _) = inst.into_cnf();
        let mut solver = rustsat_kissat::Kissat::default();
        solver.add_cnf(cnf).unwrap();
        assert_eq!(solver.solve().unwrap(), SolverResult::Unsat);
    }
}
