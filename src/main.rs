//! Command-line entry point: acquires an image file and reports the first
//! violated invariant, if any.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use xv6fsck::{Image, Layout};

/// Offline consistency checker for an xv6-layout filesystem image.
#[derive(Parser, Debug)]
#[command(name = "xv6fsck")]
struct Args {
    /// Path to the filesystem image to check.
    image: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let Some(path) = args.image else {
        eprintln!("image not found.");
        return ExitCode::FAILURE;
    };
    match check(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn check(path: &PathBuf) -> anyhow::Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("{}: failed to open image", path.display()))?;
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .with_context(|| format!("{}: failed to map image", path.display()))?;
    let image = Image::open(&mmap, Layout::xv6())
        .with_context(|| format!("{}: failed to acquire image", path.display()))?;
    xv6fsck::validate::run_checks(&image)?;
    Ok(())
}
