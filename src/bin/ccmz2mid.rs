//! CCMZ to MIDI converter
//!
//! Usage: `ccmz2mid <input.ccmz> [output.mid] [--direct]`
//!
//! - The output defaults to the input path with a `.mid` extension
//! - `--direct` selects the direct (unpaired) synthesis strategy
//! - Logging follows `RUST_LOG`, defaulting to `info`

use std::env;
use std::path::{Path, PathBuf};

use ccmz_lib::{decode, export_midi, ContainerSource, FileSource, SynthOptions};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let direct = args.iter().any(|a| a == "--direct");
    let paths: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let Some(input) = paths.first() else {
        eprintln!("Usage: ccmz2mid <input.ccmz> [output.mid] [--direct]");
        std::process::exit(1);
    };

    let output = paths
        .get(1)
        .map(|p| PathBuf::from(p.as_str()))
        .unwrap_or_else(|| Path::new(input.as_str()).with_extension("mid"));

    let options = if direct {
        SynthOptions::direct()
    } else {
        SynthOptions::default()
    };

    match convert(input, &output, &options) {
        Ok(path) => {
            log::info!("Saved MIDI file: {}", path.display());
        }
        Err(e) => {
            log::error!("Conversion failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn convert(input: &str, output: &Path, options: &SynthOptions) -> ccmz_lib::Result<PathBuf> {
    let buffer = FileSource::new().fetch(input)?;
    let container = decode(&buffer)?;
    log::info!(
        "Decoded version {} container from {}",
        container.version().tag(),
        input
    );

    export_midi(&container, output, options)
}
