//! # ims-expander
//!
//! Command-line front end for re-expanding ion mobility features.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a synthetic raw file and feature list
//! ims-expander demo demo/
//!
//! # Expand the features, writing JSON and Parquet
//! ims-expander -v expand demo/raw.json demo/features.json --parquet demo/expanded.parquet
//!
//! # Summarize a raw file or an exported Parquet file
//! ims-expander info demo/raw.json
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
