// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # onnx-compat
//!
//! Command-line interface for the ONNX compatibility pipeline.
//!
//! ## Usage
//! ```bash
//! # Convert a model: int64 -> int32, scalar inputs -> [1], float32 -> float16
//! onnx-compat convert --input model.onnx --output model_fp16.onnx
//!
//! # Keep full precision, only fix types and ranks
//! onnx-compat convert --input model.onnx --output model_int32.onnx --no-fp16
//!
//! # Inspect inputs, outputs and element types
//! onnx-compat inspect --model model_fp16.onnx
//!
//! # Check a model against the runtime's capabilities
//! onnx-compat check --model model_fp16.onnx
//! ```

mod commands;

use clap::{Parser, Subcommand};
use compat_passes::OutputDType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "onnx-compat",
    about = "Prepares ONNX graphs for constrained embedded inference runtimes",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (flags override its values).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Stage toggles for `convert`.
#[derive(clap::Args, Debug, Default)]
pub struct ConvertFlags {
    /// Keep 64-bit integer types.
    #[arg(long)]
    pub no_int32: bool,

    /// Skip float16 conversion.
    #[arg(long)]
    pub no_fp16: bool,

    /// Leave scalar inputs at rank 0.
    #[arg(long)]
    pub no_rank_fix: bool,

    /// Let graph inputs and outputs become float16 too.
    #[arg(long)]
    pub no_keep_io_types: bool,

    /// Element type of float outputs: float32 or float16.
    #[arg(long)]
    pub output_dtype: Option<OutputDType>,

    /// Reject int64 values outside the int32 range instead of truncating.
    #[arg(long)]
    pub check_range: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a model for the embedded runtime.
    Convert {
        /// Source model.
        #[arg(short, long)]
        input: PathBuf,

        /// Destination model.
        #[arg(short, long, default_value = "model_fp16.onnx")]
        output: PathBuf,

        #[command(flatten)]
        flags: ConvertFlags,

        /// Also write the stage report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Inspect a model: inputs, outputs, counts and element types.
    Inspect {
        /// Path to the model.
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Check a model against the runtime capability preset.
    Check {
        /// Path to the model.
        #[arg(short, long)]
        model: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Convert {
            input,
            output,
            flags,
            report,
        } => commands::convert::execute(cli.config, input, output, flags, report),
        Commands::Inspect { model } => commands::inspect::execute(model),
        Commands::Check { model } => commands::check::execute(model),
    }
}
