//! Error types for network elaboration and file parsing
//!
//! Solver outcomes are never errors (see [`crate::dtpg`]); only structural
//! problems discovered while building the immutable [`crate::tpg_network::TpgNetwork`]
//! or while reading an external file surface as a [`Result::Err`].

use thiserror::Error;

/// Failure while elaborating a parsed [`crate::Network`] into a [`crate::tpg_network::TpgNetwork`]
#[derive(Error, Debug)]
pub enum ElaborationError {
    /// A gate references a fanin signal that is out of bounds for the network
    #[error("dangling fanin: node {node} references signal {signal} which has no driver")]
    DanglingFanin {
        /// Node that carries the bad reference
        node: usize,
        /// Textual form of the offending signal
        signal: String,
    },

    /// The source network contains a combinational cycle
    #[error("combinational loop detected while computing node levels")]
    CombinationalLoop,
}

/// Failure while reading a BLIF or ISCAS-89 (`.bench`) file
#[derive(Error, Debug)]
pub enum ParseError {
    /// The underlying parser (`io::blif` / `io::bench`) rejected the file
    #[error("{0}")]
    Malformed(String),

    /// The file has an extension the toolkit does not recognize
    #[error("unrecognized file extension: {0}")]
    UnknownExtension(String),

    /// The file has no extension at all
    #[error("file has no extension: {0}")]
    NoExtension(String),

    /// Underlying I/O failure opening or reading the file
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path that failed to open or read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl From<String> for ParseError {
    fn from(s: String) -> Self {
        ParseError::Malformed(s)
    }
}
