//
// cli.rs
// spherical-tools
//
// Defines the CLI surface with Clap and dispatches to the inject or read paths.
//

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tokio::task::JoinSet;

use crate::crop::{self, CROP_HELP};
use crate::models::{InjectOptions, Projection, StereoMode};
use crate::{inject, metadata};

/// Command-line interface glue code: one flag-driven binary for reads and injections.
#[derive(Parser, Debug)]
#[command(name = "spherical-tools")]
#[command(about = "Inject and read spherical video metadata on MP4 files", long_about = None)]
pub struct Cli {
    /// Inject metadata. This requires a source file and a single destination file
    #[arg(short, long)]
    pub inject: bool,

    /// Crop region. Must specify 6 integers in the form of "w:h:f_w:f_h:x:y"
    #[arg(short, long, value_name = "w:h:f_w:f_h:x:y")]
    pub crop: Option<String>,

    /// Inject stereo mode information
    #[arg(short, long, value_enum)]
    pub stereo: Option<StereoArg>,

    /// The software used for stitching the video
    #[arg(short = 'w', long, default_value = "Bubl")]
    pub software: String,

    /// Number of camera sources used during stitching
    #[arg(long, default_value_t = 4)]
    pub source_count: u32,

    /// Print parsed metadata as JSON instead of the raw XML document
    #[arg(long)]
    pub json: bool,

    /// Files to read metadata from, or source and destination when injecting
    #[arg(value_name = "file", required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum StereoArg {
    None,
    TopBottom,
    LeftRight,
}

impl From<StereoArg> for StereoMode {
    fn from(value: StereoArg) -> Self {
        match value {
            StereoArg::None => StereoMode::Mono,
            StereoArg::TopBottom => StereoMode::TopBottom,
            StereoArg::LeftRight => StereoMode::LeftRight,
        }
    }
}

pub async fn run() -> Result<()> {
    // Parse the raw CLI arguments once and dispatch to the selected mode.
    let cli = Cli::parse();

    if cli.inject {
        let options = build_inject_options(&cli)?;
        inject::process_file(&options)?;
        return Ok(());
    }

    // Reads are dispatched without sequencing between files, so output follows
    // completion order rather than argument order.
    let mut tasks = JoinSet::new();
    for file in cli.files.clone() {
        let as_json = cli.json;
        tasks.spawn_blocking(move || metadata::print_info(&file, as_json));
    }

    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined.context("read task panicked")? {
            eprintln!("{err:#}");
            failures += 1;
        }
    }
    if failures > 0 {
        bail!("{failures} file(s) could not be read");
    }
    Ok(())
}

/// Assemble and validate injection options from parsed arguments.
pub fn build_inject_options(cli: &Cli) -> Result<InjectOptions> {
    let [source, destination] = cli.files.as_slice() else {
        bail!("Injecting metadata requires both an input file and a single output file");
    };

    let crop = cli
        .crop
        .as_deref()
        .map(|spec| {
            crop::parse_crop_spec(spec).with_context(|| format!("Invalid crop argument\n{CROP_HELP}"))
        })
        .transpose()?;

    Ok(InjectOptions {
        stereo: cli.stereo.map(StereoMode::from).unwrap_or(StereoMode::Mono),
        projection: Projection::Equirectangular,
        software: cli.software.clone(),
        source_count: cli.source_count,
        source: source.clone(),
        destination: destination.clone(),
        crop,
    })
}
