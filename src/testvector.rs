//! Bit-packed test vectors and pattern decks

use std::fmt;

use crate::tpg_network::{NodeId, TpgNetwork};

/// Machine word width used throughout the simulator: one pattern per bit lane
pub const WORD_WIDTH: usize = 64;

/// A 3-valued logic value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value3 {
    /// Logic 0
    Zero,
    /// Logic 1
    One,
    /// Unknown / don't-care
    X,
}

impl Value3 {
    /// Pack into the `(v0, v1)` bit pair used by 3-valued simulation
    pub fn to_bits(self) -> (bool, bool) {
        match self {
            Value3::Zero => (true, false),
            Value3::One => (false, true),
            Value3::X => (true, true),
        }
    }

    /// Unpack from a `(v0, v1)` bit pair
    pub fn from_bits(v0: bool, v1: bool) -> Value3 {
        match (v0, v1) {
            (true, false) => Value3::Zero,
            (false, true) => Value3::One,
            (true, true) => Value3::X,
            (false, false) => panic!("(0,0) is not a valid 3-valued encoding"),
        }
    }
}

impl fmt::Display for Value3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value3::Zero => write!(f, "0"),
            Value3::One => write!(f, "1"),
            Value3::X => write!(f, "X"),
        }
    }
}

/// A single packed input assignment over PPIs, for one time frame
///
/// Combinational circuits use a single `TestVector`. Sequential (broadside) circuits
/// pair two: frame 0 loads scan state, frame 1 applies the functional clock.
#[derive(Clone, Debug)]
pub struct TestVector {
    values: Vec<Value3>,
}

impl TestVector {
    /// A fully-X vector over `nb_ppis` inputs
    pub fn unassigned(nb_ppis: usize) -> TestVector {
        TestVector {
            values: vec![Value3::X; nb_ppis],
        }
    }

    /// Number of PPIs this vector assigns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no PPIs (only meaningful for degenerate networks)
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value assigned to PPI `i`
    pub fn get(&self, i: usize) -> Value3 {
        self.values[i]
    }

    /// Assign PPI `i`
    pub fn set(&mut self, i: usize, v: Value3) {
        self.values[i] = v;
    }

    /// Fill every unassigned (X) entry with a concrete bit from a RNG
    pub fn fill_random(&mut self, rng: &mut impl rand::Rng) {
        for v in self.values.iter_mut() {
            if *v == Value3::X {
                *v = if rng.gen_bool(0.5) {
                    Value3::One
                } else {
                    Value3::Zero
                };
            }
        }
    }
}

/// A fixed-capacity buffer of up to [`WORD_WIDTH`] test vectors, packed one pattern
/// per bit lane for a single PPSFP call
pub struct TvDeck {
    nb_ppis: usize,
    /// `words[i]` packs bit `b` of every vector's assignment to PPI `i`
    words: Vec<u64>,
    vectors: Vec<TestVector>,
}

impl TvDeck {
    /// An empty deck sized for `nb_ppis` inputs
    pub fn new(nb_ppis: usize) -> TvDeck {
        TvDeck {
            nb_ppis,
            words: vec![0u64; nb_ppis],
            vectors: Vec::new(),
        }
    }

    /// Number of vectors currently loaded
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the deck holds no vectors
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Whether the deck has room for another vector
    pub fn has_room(&self) -> bool {
        self.vectors.len() < WORD_WIDTH
    }

    /// Append a vector, X entries resolved to 0
    pub fn push(&mut self, v: TestVector) {
        assert!(self.has_room(), "TvDeck is full");
        let lane = self.vectors.len();
        for i in 0..self.nb_ppis {
            let bit = matches!(v.get(i), Value3::One);
            if bit {
                self.words[i] |= 1u64 << lane;
            }
        }
        self.vectors.push(v);
    }

    /// Clear the deck without deallocating
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.vectors.clear();
    }

    /// The packed word for PPI `i`, one bit per loaded vector
    pub fn packed_input(&self, i: usize) -> u64 {
        self.words[i]
    }

    /// Original vectors, in load order
    pub fn vectors(&self) -> &[TestVector] {
        &self.vectors
    }
}

/// One `(node, time, value)` assignment making up a back-traced or DTPG pattern
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeVal {
    /// Node being assigned (always a PPI)
    pub node: NodeId,
    /// Time frame: 0 for combinational and scan-load, 1 for the broadside capture frame
    pub time: u8,
    /// Assigned value
    pub value: bool,
}

/// An ordered, conflict-free list of PPI assignments: the output of back-tracing and
/// the input to pattern construction
#[derive(Clone, Debug, Default)]
pub struct NodeValList {
    entries: Vec<NodeVal>,
}

impl NodeValList {
    /// An empty list
    pub fn new() -> NodeValList {
        NodeValList { entries: Vec::new() }
    }

    /// Insert an assignment, panicking on conflict (mirrors the source's "programming
    /// error; assertion" policy for `NodeValList` merge conflicts)
    pub fn insert(&mut self, node: NodeId, time: u8, value: bool) {
        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.node == node && e.time == time)
        {
            assert_eq!(
                existing.value, value,
                "conflicting assignment for node {node} at time {time}"
            );
            return;
        }
        self.entries.push(NodeVal { node, time, value });
    }

    /// Whether two entries ever disagree on the same `(node, time)` pair
    pub fn sanity_check(&self) -> bool {
        for (i, a) in self.entries.iter().enumerate() {
            for b in &self.entries[i + 1..] {
                if a.node == b.node && a.time == b.time && a.value != b.value {
                    return false;
                }
            }
        }
        true
    }

    /// Number of assignments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list has no assignments
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the assignments, sorted by `(node, time)`
    pub fn iter(&self) -> impl Iterator<Item = &NodeVal> {
        self.entries.iter()
    }

    /// Sort entries by `(node, time)` for deterministic output
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|e| (e.node, e.time));
    }

    /// Render as a [`TestVector`] over the network's PPIs at time frame `time`,
    /// unassigned PPIs left at X
    pub fn to_test_vector(&self, net: &TpgNetwork, time: u8) -> TestVector {
        let mut tv = TestVector::unassigned(net.ppis().len());
        for (i, &ppi) in net.ppis().iter().enumerate() {
            if let Some(e) = self
                .entries
                .iter()
                .find(|e| e.node == ppi && e.time == time)
            {
                tv.set(i, if e.value { Value3::One } else { Value3::Zero });
            }
        }
        tv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value3_roundtrip() {
        for v in [Value3::Zero, Value3::One, Value3::X] {
            let (v0, v1) = v.to_bits();
            assert_eq!(Value3::from_bits(v0, v1), v);
        }
    }

    #[test]
    fn test_node_val_list_conflict_free() {
        let mut l = NodeValList::new();
        l.insert(NodeId::from_index(0), 0, true);
        l.insert(NodeId::from_index(1), 0, false);
        l.insert(NodeId::from_index(0), 0, true);
        assert!(l.sanity_check());
        assert_eq!(l.len(), 2);
    }

    #[test]
    #[should_panic]
    fn test_node_val_list_rejects_conflict() {
        let mut l = NodeValList::new();
        l.insert(NodeId::from_index(0), 0, true);
        l.insert(NodeId::from_index(0), 0, false);
    }

    #[test]
    fn test_tv_deck_packing() {
        let mut deck = TvDeck::new(2);
        let mut v0 = TestVector::unassigned(2);
        v0.set(0, Value3::One);
        v0.set(1, Value3::Zero);
        deck.push(v0);
        let mut v1 = TestVector::unassigned(2);
        v1.set(0, Value3::Zero);
        v1.set(1, Value3::One);
        deck.push(v1);
        assert_eq!(deck.packed_input(0), 0b01);
        assert_eq!(deck.packed_input(1), 0b10);
    }
}
