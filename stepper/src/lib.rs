//! Drives step-wise trie lookups to completion and checks recorded traces.
//!
//! The `stepper` binary is a thin CLI over this crate: it loads a
//! [witness][witness::WitnessFile], runs a read or write through the
//! [`Driver`][driver::Driver], and writes out a [trace
//! file][witness::TraceFile] holding every step plus the earlier steps and
//! nodes each transition read. Any one step can be cut out of such a file as
//! a [step witness][witness::StepWitness] and checked against nothing else.

pub mod driver;
pub mod tracing;
pub mod witness;
