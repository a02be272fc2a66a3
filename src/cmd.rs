//! Command line interface

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use quaigh_atpg::detect_op::{BaseUntest, DropDetect};
use quaigh_atpg::dtpg::{DtpgScope, Just2, SatDtpgEngine};
use quaigh_atpg::io::{read_bench, read_blif, read_network_file, write_pattern_file};
use quaigh_atpg::rtpg::Rtpg;
use quaigh_atpg::session::AtpgSession;
use quaigh_atpg::Network;

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Generate SAT-based test patterns for every stuck-at fault in a network
    Dtpg(DtpgArgs),

    /// Generate random test patterns and report the stuck-at coverage they reach
    Fsim(FsimArgs),
}

impl Cli {
    /// Dispatch to the selected subcommand
    pub fn run(&self) {
        match &self.command {
            Commands::Dtpg(a) => a.run(),
            Commands::Fsim(a) => a.run(),
        }
    }
}

/// Explicit input format selection, overriding extension-based detection
#[derive(Args)]
#[group(required = false, multiple = false)]
struct FormatArgs {
    /// Read the input as BLIF regardless of its extension
    #[arg(long)]
    blif: bool,

    /// Read the input as ISCAS-89 (.bench) regardless of its extension
    #[arg(long)]
    iscas89: bool,
}

fn read_input(file: &PathBuf, fmt: &FormatArgs) -> Network {
    // `read_blif`/`read_bench`/`read_network_file` already return a topologically
    // sorted network; no further sorting is needed (or exposed) here.
    if fmt.blif {
        let f = std::fs::File::open(file).unwrap_or_else(|e| panic!("cannot open {file:?}: {e}"));
        read_blif(f).unwrap_or_else(|e| panic!("failed to parse {file:?}: {e}"))
    } else if fmt.iscas89 {
        let f = std::fs::File::open(file).unwrap_or_else(|e| panic!("cannot open {file:?}: {e}"));
        read_bench(f).unwrap_or_else(|e| panic!("failed to parse {file:?}: {e}"))
    } else {
        read_network_file(file).unwrap_or_else(|e| panic!("failed to read {file:?}: {e}"))
    }
}

/// Which combinational cones a single SAT solve folds together
#[derive(Args)]
#[group(required = false, multiple = false)]
struct ScopeArgs {
    /// Solve one fault's constraints per SAT call, in catalog order (default)
    #[arg(long)]
    single: bool,

    /// Group faults by fanout-free region before solving
    #[arg(long)]
    ffr: bool,

    /// Group faults by multi-level fanout-free cone before solving
    #[arg(long)]
    mffc: bool,
}

impl From<&ScopeArgs> for DtpgScope {
    fn from(a: &ScopeArgs) -> DtpgScope {
        if a.ffr {
            DtpgScope::Ffr
        } else if a.mffc {
            DtpgScope::Mffc
        } else {
            DtpgScope::Single
        }
    }
}

/// Command arguments for SAT-based test pattern generation
#[derive(Args)]
pub struct DtpgArgs {
    /// Network to generate patterns for
    file: PathBuf,

    #[command(flatten)]
    format: FormatArgs,

    #[command(flatten)]
    scope: ScopeArgs,

    /// Output file for generated test patterns
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Per-fault SAT solve timeout, in milliseconds (advisory: the bundled solver
    /// backend does not currently support mid-solve cancellation, so this is recorded
    /// but not yet enforced)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl DtpgArgs {
    /// Run DTPG and print a coverage summary
    pub fn run(&self) {
        if self.timeout_ms.is_some() {
            tracing::warn!("--timeout-ms is accepted but not yet enforced by the solver backend");
        }
        let net = read_input(&self.file, &self.format);
        let mut session = AtpgSession::build(&net).unwrap_or_else(|e| panic!("elaboration failed: {e}"));

        let start = Instant::now();
        let mut engine = SatDtpgEngine::new(Box::new(Just2));
        let mut detect = DropDetect;
        let mut untest = BaseUntest;
        let patterns = session.run_dtpg((&self.scope).into(), &mut engine, &mut detect, &mut untest);

        tracing::info!(
            faults = session.faults().len(),
            patterns = patterns.len(),
            coverage = session.coverage(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dtpg finished"
        );
        println!(
            "{} patterns, {:.2}% stuck-at coverage",
            patterns.len(),
            session.coverage() * 100.0
        );

        if let Some(out) = &self.output {
            write_pattern_file(out, &patterns).unwrap_or_else(|e| panic!("failed to write {out:?}: {e}"));
        }
    }
}

/// Command arguments for random pattern generation
#[derive(Args)]
pub struct FsimArgs {
    /// Network to generate patterns for
    file: PathBuf,

    #[command(flatten)]
    format: FormatArgs,

    /// Number of patterns to generate
    #[arg(short = 'n', long)]
    num_patterns: usize,

    /// Random seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Enable WSA-constrained generation with the given switching-activity target per step
    #[arg(long)]
    wsa_limit: Option<u32>,

    /// Output file for generated test patterns
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

impl FsimArgs {
    /// Run RTPG/RTPG-WSA and print a coverage summary
    pub fn run(&self) {
        let net = read_input(&self.file, &self.format);
        let mut session = AtpgSession::build(&net).unwrap_or_else(|e| panic!("elaboration failed: {e}"));

        let mut rtpg = Rtpg::new(self.seed);
        let patterns = match self.wsa_limit {
            Some(thv) => session.run_rtpg_wsa(&mut rtpg, self.num_patterns, thv, 4),
            None => session.run_rtpg(&mut rtpg, self.num_patterns),
        };

        tracing::info!(
            faults = session.faults().len(),
            patterns = patterns.len(),
            coverage = session.coverage(),
            "fsim finished"
        );
        println!(
            "{} patterns, {:.2}% stuck-at coverage",
            patterns.len(),
            session.coverage() * 100.0
        );

        if let Some(out) = &self.output {
            write_pattern_file(out, &patterns).unwrap_or_else(|e| panic!("failed to write {out:?}: {e}"));
        }
    }
}
