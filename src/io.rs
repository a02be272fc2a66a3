//! Reading and writing circuit descriptions and test pattern decks

mod bench;
mod blif;
mod utils;

use std::fs::File;
use std::path::Path;

use crate::error::ParseError;
use crate::network::Network;
use crate::testvector::{TestVector, Value3};

pub use bench::{read_bench, write_bench};
pub use blif::{read_blif, write_blif};

fn extension(path: &Path) -> Result<&str, ParseError> {
    path.extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ParseError::NoExtension(path.display().to_string()))
}

fn open(path: &Path) -> Result<File, ParseError> {
    File::open(path).map_err(|e| ParseError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn create(path: &Path) -> Result<File, ParseError> {
    File::create(path).map_err(|e| ParseError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Parse a logic network from a file, dispatching on its extension (`.bench` for
/// ISCAS-89 or `.blif` for BLIF)
pub fn read_network_file(path: &Path) -> Result<Network, ParseError> {
    let ext = extension(path)?;
    let f = open(path)?;
    match ext {
        "bench" => Ok(read_bench(f)?),
        "blif" => Ok(read_blif(f)?),
        other => Err(ParseError::UnknownExtension(other.to_string())),
    }
}

/// Write a logic network to a file, dispatching on its extension
pub fn write_network_file(path: &Path, net: &Network) -> Result<(), ParseError> {
    let ext = extension(path)?;
    let mut f = create(path)?;
    match ext {
        "bench" => {
            write_bench(&mut f, net);
            Ok(())
        }
        "blif" => {
            write_blif(&mut f, net);
            Ok(())
        }
        other => Err(ParseError::UnknownExtension(other.to_string())),
    }
}

/// Write a deck of test vectors, one line per vector with one `0`/`1`/`X` character per
/// PPI, in PPI index order
pub fn write_pattern_file(path: &Path, patterns: &[TestVector]) -> Result<(), ParseError> {
    use std::io::Write;
    let mut f = create(path)?;
    for tv in patterns {
        let line: String = (0..tv.len())
            .map(|i| match tv.get(i) {
                Value3::Zero => '0',
                Value3::One => '1',
                Value3::X => 'X',
            })
            .collect();
        writeln!(f, "{line}").map_err(|e| ParseError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Read a deck of test vectors written by [`write_pattern_file`]
pub fn read_pattern_file(path: &Path) -> Result<Vec<TestVector>, ParseError> {
    use std::io::{BufRead, BufReader};
    let f = open(path)?;
    let mut out = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line.map_err(|e| ParseError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let mut tv = TestVector::unassigned(line.len());
        for (i, c) in line.chars().enumerate() {
            tv.set(
                i,
                match c {
                    '0' => Value3::Zero,
                    '1' => Value3::One,
                    _ => Value3::X,
                },
            );
        }
        out.push(tv);
    }
    Ok(out)
}
