//! Automatic test pattern generation for combinational and scan/broadside sequential logic
//!
//! A [`network::Network`] parsed from BLIF or ISCAS-89 (`.bench`) is elaborated into a
//! [`tpg_network::TpgNetwork`], a gate-level graph decomposed down to primitive gates so
//! that every pin is a distinct stuck-at fault site. [`fault::FaultDb`] extracts and
//! collapses that fault catalog; [`sim::fsim::Fsim`] simulates it; [`dtpg`] generates
//! tests for it with a SAT solver; [`rtpg`] generates tests for it at random.
//! [`session::AtpgSession`] ties a network and its catalog together for a caller to
//! drive through either generator.

#![warn(missing_docs)]

pub mod cnf;
pub mod detect_op;
pub mod dtpg;
pub mod error;
pub mod fault;
pub mod io;
pub mod network;
pub mod rtpg;
pub mod session;
pub mod sim;
pub mod testvector;
pub mod tpg_network;

pub use network::{Gate, Network, Signal};
