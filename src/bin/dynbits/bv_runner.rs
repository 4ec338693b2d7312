//! `bv` mode: dynamic bitvector over a parsed query stream.

use anyhow::{Context, Result};
use dynbits::{query, Config, DynamicBitVec};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

pub fn run(input: &Path, output: &Path) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("could not read input file {}", input.display()))?;
    let parsed = query::parse_bv(&text).context("could not parse bv input")?;

    let file = fs::File::create(output)
        .with_context(|| format!("could not create output file {}", output.display()))?;
    let mut out = BufWriter::new(file);

    let config = Config::BV;
    // Construction is setup, not part of the measured query loop.
    let mut bv = DynamicBitVec::from_words(parsed.words, parsed.len, config);

    let start = Instant::now();
    let answers = query::run_bv_queries(&mut bv, &parsed.queries);
    let elapsed = start.elapsed();

    for answer in answers {
        writeln!(out, "{}", answer)?;
    }
    out.flush()?;

    super::print_result(
        "bv",
        elapsed.as_millis(),
        bv.space_used(),
        &format!(
            "param_min_leaf={}\tparam_initial_leaf={}\tparam_max_leaf={}",
            config.min_leaf_blocks, config.initial_leaf_blocks, config.max_leaf_blocks
        ),
    );
    Ok(())
}
