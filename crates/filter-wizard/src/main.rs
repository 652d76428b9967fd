//! filter-design: offline component value calculator for the lowpass topologies

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use filter_wizard::{compute, render_report, DesignParameters, FreeValues, Targets, Topology};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "filter-design")]
#[command(about = "Compute active lowpass filter component values")]
#[command(version)]
struct Args {
    /// Topology (sallen-key, boctor, mfb, or the full design name)
    #[arg(short, long)]
    topology: Topology,

    /// DC gain as a voltage ratio, in (1, 1000]
    #[arg(short, long, default_value = "100")]
    gain: f64,

    /// Cutoff exponent: the cutoff is 10^freq_exp Hz, in [0, 5]
    #[arg(short, long, default_value = "2")]
    freq_exp: f64,

    /// C1 in nF (Sallen-Key, Boctor)
    #[arg(long)]
    c1: Option<f64>,

    /// R3 in ohms (Sallen-Key)
    #[arg(long)]
    r3: Option<f64>,

    /// R5 in ohms (Boctor)
    #[arg(long)]
    r5: Option<f64>,

    /// R6 in ohms (Boctor)
    #[arg(long)]
    r6: Option<f64>,

    /// C5 in nF (multiple feedback)
    #[arg(long)]
    c5: Option<f64>,

    /// Output format
    #[arg(long, value_enum, default_value = "markdown")]
    format: Format,

    /// Output file
    #[arg(short, long, required_unless_present = "stdout")]
    output: Option<PathBuf>,

    /// Print to stdout instead of a file
    #[arg(long)]
    stdout: bool,
}

impl Args {
    fn free_params(&self) -> BTreeMap<String, f64> {
        [("c1", self.c1), ("r3", self.r3), ("r5", self.r5), ("r6", self.r6), ("c5", self.c5)]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let params = DesignParameters {
        free: FreeValues::from_params(args.topology, &args.free_params())?,
        targets: Targets {
            gain: args.gain,
            freq_exp: args.freq_exp,
        },
    };

    let values = compute(&params)
        .with_context(|| format!("Failed to compute {} values", args.topology))?;

    let text = match args.format {
        Format::Markdown => render_report(args.topology, &params.targets, &values, None)
            .context("Failed to render report")?,
        Format::Json => serde_json::to_string_pretty(&values)?,
    };

    match (&args.output, args.stdout) {
        (Some(path), false) => {
            fs::write(path, &text)
                .with_context(|| format!("Failed to write output file: {:?}", path))?;
            eprintln!("Wrote {} design: {:?}", args.topology, path);
        }
        _ => println!("{}", text),
    }

    Ok(())
}
