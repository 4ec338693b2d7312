//! `bp` mode: dynamic balanced-parentheses tree over a parsed query stream.

use anyhow::{Context, Result};
use dynbits::{query, Config, DynamicBpTree};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

pub fn run(input: &Path, output: &Path) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("could not read input file {}", input.display()))?;
    let queries = query::parse_bp(&text).context("could not parse bp input")?;

    let file = fs::File::create(output)
        .with_context(|| format!("could not create output file {}", output.display()))?;
    let mut out = BufWriter::new(file);

    let config = Config::BP;
    let mut tree = DynamicBpTree::with_config(config);

    let start = Instant::now();
    let answers = query::run_bp_queries(&mut tree, &queries);
    let elapsed = start.elapsed();

    for answer in answers {
        writeln!(out, "{}", answer)?;
    }
    // The final tree, one child count per node in depth-first pre-order.
    for count in tree.pre_order_child_counts() {
        writeln!(out, "{}", count)?;
    }
    out.flush()?;

    super::print_result(
        "bp",
        elapsed.as_millis(),
        tree.space_used(),
        &format!(
            "param_min_leaf={}\tparam_initial_leaf={}\tparam_max_leaf={}\tparam_chunk_size={}",
            config.min_leaf_blocks,
            config.initial_leaf_blocks,
            config.max_leaf_blocks,
            config.blocks_per_chunk
        ),
    );
    Ok(())
}
