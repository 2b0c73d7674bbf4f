use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};
use ethereum_types::H160;
use mpt_step::nibbles::Nibbles;
use stepper::driver::DEFAULT_MAX_STEPS;

/// Runs step-wise trie lookups against witness files and verifies the traces
/// they produce.
#[derive(Parser)]
#[command(version, propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,

    /// Gives up on a run after this many steps.
    #[arg(long, global = true, env = "STEPPER_MAX_STEPS", default_value_t = DEFAULT_MAX_STEPS)]
    pub(crate) max_steps: usize,

    /// Writes the output here instead of to stdout.
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Looks up a key and prints the resulting trace.
    Read {
        #[clap(flatten)]
        lookup: LookupArgs,
    },
    /// Inserts or updates a key and prints the resulting trace, which ends
    /// with the new root.
    Write {
        #[clap(flatten)]
        lookup: LookupArgs,

        /// The value to store, as hex.
        #[arg(short, long, value_parser = parse_hex_bytes)]
        value: Vec<u8>,
    },
    /// Checks every step of a trace file against the nodes it recorded.
    Verify {
        /// The trace file to check.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        trace: PathBuf,
    },
    /// Prints the minimal witness for one step of a trace file: the earlier
    /// steps and the nodes its transition reads.
    StepWitness {
        /// The trace file holding the step.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        trace: PathBuf,

        /// Index of the step.
        #[arg(short, long)]
        index: usize,
    },
    /// Checks a single step against a witness printed by `step-witness`.
    VerifyStep {
        /// The step witness file.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        witness: PathBuf,
    },
}

#[derive(Args)]
pub(crate) struct LookupArgs {
    /// The witness file holding the trie root and its nodes.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub(crate) witness: PathBuf,

    /// The key to look up, as hex. Every digit is one nibble.
    #[arg(short, long)]
    pub(crate) key: Nibbles,

    /// Treats the witness as this account's storage trie rather than the
    /// account trie.
    #[arg(short, long)]
    pub(crate) account: Option<H160>,
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}
