//! CLI entry point for the translation driver (C9). Parses the configuration file (§6), wires it
//! to a [`Driver`], and writes the emitted artifact tree.
//!
//! This binary does not itself parse XEX containers or decode PPC opcodes — those are the image
//! loader and disassembler collaborators §1 places out of scope. It is wired here against
//! [`image::StaticImage`]/an empty [`flow::Decoder`] so the translation pipeline itself is
//! exercisable end to end; assembling this crate into a full recompiler toolchain means replacing
//! [`load_image`] and [`Disassembler`] with the real loader/disassembler crates.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use ppc_xenon_recomp::config::Config;
use ppc_xenon_recomp::driver::Driver;
use ppc_xenon_recomp::error::Error;
use ppc_xenon_recomp::flow::Decoder;
use ppc_xenon_recomp::image::{ImageSource, StaticImage};
use ppc_xenon_recomp::{emit::opcode::DecodedInstr, logging};

/// Static recompiler for PowerPC (Xenon/Xbox 360) executables.
#[derive(Debug, Parser)]
#[command(name = "ppc-xenon-recomp", version, about)]
struct Args {
    /// Path to the translation-run configuration file (§6).
    #[arg(short, long)]
    config: PathBuf,

    /// Overrides the configured output directory.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Raises log verbosity to `debug` regardless of `RUST_LOG`.
    #[arg(short, long)]
    verbose: bool,
}

/// A disassembler that never decodes anything. Stands in for the real PPC disassembler
/// collaborator (§1) until one is linked into the binary; with it, every function the image
/// claims to export decodes to zero instructions and translation reports a translation gap at its
/// entry address instead of emitting a body.
struct Disassembler;

impl Decoder for Disassembler {
    fn decode(&self, _address: u32) -> Option<DecodedInstr> {
        None
    }
}

/// Stands in for the real XEX loader collaborator (§1): an image with no code sections, no
/// imports, and an entry point of zero, so control-flow recovery legitimately finds nothing to
/// translate rather than silently fabricating a program.
fn load_image(_path: &std::path::Path) -> Result<StaticImage, Error> {
    Ok(StaticImage::default())
}

fn run(args: Args) -> Result<(), Error> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    logging::init();

    let mut config = Config::from_path(&args.config)?;
    if let Some(out_dir) = args.out_dir {
        config.out_dir = out_dir;
    }

    info!("loading image {}", config.image.display());
    let image = load_image(&config.image)?;
    let decoder = Disassembler;

    let driver = Driver::new(&config);
    let output = driver.translate(&image, &decoder)?;
    info!(
        "translated {} function(s); writing artifact to {}",
        output.functions.len(),
        config.out_dir.display()
    );
    driver.write_artifact(&output)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
