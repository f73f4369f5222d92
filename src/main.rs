use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rusty_anritsu::data::export::{export_file, to_spectrum};
use rusty_anritsu::{DecoderConfig, LoadOptions, SpectrumData, DONE_LEVEL_FLOOR};

/// Decode an Anritsu spectrum analyzer save file.
#[derive(Parser)]
#[command(name = "rusty-anritsu")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Save file to decode
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Merge every save file in a directory (not supported yet)
    #[arg(long)]
    all: bool,

    /// Print the decoded record as JSON
    #[arg(long)]
    json: bool,

    /// Indent JSON output
    #[arg(long, requires = "json")]
    pretty: bool,

    /// Write the trace and metadata to .parquet, .json or .csv
    #[arg(short, long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// Lowest level a "# ... Done" line returns to
    #[arg(long, default_value_t = DONE_LEVEL_FLOOR)]
    done_floor: usize,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let options = LoadOptions {
        parse_all: cli.all,
        decoder: DecoderConfig {
            done_floor: cli.done_floor,
        },
    };
    let data = SpectrumData::load(None, Some(cli.file.as_path()), &options)
        .with_context(|| format!("loading {}", cli.file.display()))?;

    if cli.json {
        let json = if cli.pretty {
            data.to_json_pretty()?
        } else {
            data.to_json()?
        };
        println!("{json}");
    } else {
        print_summary(&data)?;
    }

    if let Some(path) = &cli.export {
        let spectrum = to_spectrum(&data)?;
        export_file(path, &[spectrum])
            .with_context(|| format!("exporting to {}", path.display()))?;
    }
    Ok(())
}

fn print_summary(data: &SpectrumData) -> Result<()> {
    if let Some(meta) = data.metadata() {
        for (key, value) in meta {
            println!("{key} = {}", value.as_scalar().unwrap_or_default());
        }
    }
    for key in data.record().keys().skip(1) {
        println!("[{key}]");
    }

    match data.spectrum() {
        Ok(series) => {
            let unit = series.frequency_unit.as_deref().unwrap_or("");
            let first = series.frequencies.first().copied().unwrap_or_default();
            let last = series.frequencies.last().copied().unwrap_or_default();
            println!("spectrum: {} points, {first} – {last} {unit}", series.len());
        }
        Err(e) if e.is_spectrum_not_found() => println!("spectrum: none"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
