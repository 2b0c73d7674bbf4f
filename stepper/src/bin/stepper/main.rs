use anyhow::{bail, Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use mpt_step::{
    step::Step,
    store::{MemoryTrieStore, StateTries, TrieSelector, TrieSource},
};
use stepper::{
    driver::{step_witness, verify_step_witness, verify_trace_file, written_root, Driver},
    witness::{read_json_file, write_json, StepWitness, TraceFile, WitnessFile},
};
use tracing::{info, warn};

use self::cli::LookupArgs;

mod cli;

fn main() -> Result<()> {
    dotenv().ok();
    stepper::tracing::init();

    let args = cli::Cli::parse();
    let driver = Driver::new(args.max_steps);

    match args.command {
        cli::Command::Read { lookup } => {
            let (mut tries, source, witness) = load_witness(&lookup)?;
            let start = Step::start_read(None, witness.root.as_bytes(), &lookup.key);

            let trace = driver
                .run_in(start, &mut tries, source)
                .context("Read failed")?;
            if let Some(failure) = trace.steps.last().and_then(|step| step.fail_lookup) {
                warn!("Key {} not found ({:?})", lookup.key, failure);
            }

            write_json(args.output.as_deref(), &trace)?;
        }
        cli::Command::Write { lookup, value } => {
            if value.is_empty() {
                bail!("Deleting keys is not supported; pass a non-empty value");
            }

            let (mut tries, source, witness) = load_witness(&lookup)?;
            let start = Step::start_write(None, witness.root.as_bytes(), &lookup.key, value);

            let trace = driver
                .run_in(start, &mut tries, source)
                .context("Write failed")?;
            if let Some(root) = written_root(&trace) {
                info!("New root: {:x}", root);
            }

            write_json(args.output.as_deref(), &trace)?;
        }
        cli::Command::Verify { trace } => {
            let file: TraceFile = read_json_file(&trace)?;

            verify_trace_file(&file)
                .with_context(|| format!("{} does not verify", trace.display()))?;
            info!("All {} steps verified", file.steps.len());
        }
        cli::Command::StepWitness { trace, index } => {
            let file: TraceFile = read_json_file(&trace)?;

            let witness = step_witness(&file, index)
                .with_context(|| format!("{} has no step {}", trace.display(), index))?;
            info!(
                "Step {} reads {} earlier steps and {} nodes",
                index,
                witness.steps.len(),
                witness.nodes.len()
            );

            write_json(args.output.as_deref(), &witness)?;
        }
        cli::Command::VerifyStep { witness } => {
            let step: StepWitness = read_json_file(&witness)?;

            verify_step_witness(&step)
                .with_context(|| format!("{} does not verify", witness.display()))?;
            info!("Step {} verified", step.index);
        }
    }

    Ok(())
}

fn load_witness(
    lookup: &LookupArgs,
) -> Result<(StateTries<MemoryTrieStore>, TrieSource, WitnessFile)> {
    let witness: WitnessFile = read_json_file(&lookup.witness)?;
    let source = lookup
        .account
        .map_or(TrieSource::WorldAccounts, TrieSource::AccountStorage);

    let mut tries = StateTries::new();
    witness.load_into(tries.select(source));

    Ok((tries, source, witness))
}
