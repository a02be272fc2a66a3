//! SAT-based test pattern generation
//!
//! [`engine`] turns one fault into a CNF instance over the good and faulty circuits and
//! asks a SAT solver for a satisfying assignment. [`backtrace`] then extends that
//! combinational assignment into a full broadside pattern by justifying a launch cycle
//! that produces the flip-flop state the capture cycle needs.

pub mod backtrace;
pub mod engine;

pub use backtrace::{BackTracer, Just1, Just2, SimpleBackTracer};
pub use engine::{DtpgOutcome, DtpgScope, SatDtpgEngine};
