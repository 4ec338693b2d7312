//! Benchmark driver for the dynamic succinct containers.
//!
//! Runs a query file against a dynamic bitvector (`bv`) or a dynamic
//! balanced-parentheses tree (`bp`), writes the query answers to the output
//! file, and prints a single machine-readable RESULT line to stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod bp_runner;
mod bv_runner;

#[derive(Debug, Parser)]
#[command(name = "dynbits")]
#[command(about = "Dynamic succinct bitvector and tree benchmarks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Dynamic bitvector: initial bits plus insert/delete/flip/rank/select
    /// queries
    Bv {
        /// Query input file
        input: PathBuf,
        /// Output file for rank/select answers
        output: PathBuf,
    },
    /// Dynamic balanced-parentheses tree: structural edits plus navigation
    /// queries
    Bp {
        /// Query input file
        input: PathBuf,
        /// Output file for answers and the final pre-order child counts
        output: PathBuf,
    },
}

/// Shared shape of the RESULT line both runners print.
fn print_result(algo: &str, time_ms: u128, space_bits: usize, params: &str) {
    println!(
        "RESULT\talgo={}\tname=dynbits\ttime={}\tspace={}\t{}",
        algo, time_ms, space_bits, params
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.mode {
        Mode::Bv { input, output } => bv_runner::run(&input, &output),
        Mode::Bp { input, output } => bp_runner::run(&input, &output),
    }
}
