use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dirstego_core::{commit_encode, decode, human_readable_size, plan_encode};
use tracing::{debug, Level};

/// Hide or extract a directory tree inside a set of PNG cover images.
///
/// Run without a subcommand for the interactive prompt described in the
/// project's container format spec; the flags below only relocate the four
/// conventional working directories.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory containing the data to hide (default: `<root>/Data_To_Hide/`).
    #[arg(long)]
    data: Option<PathBuf>,
    /// Directory containing the PNG cover photos (default: `<root>/Input_Photos/`).
    #[arg(long)]
    input: Option<PathBuf>,
    /// Directory the carrier PNGs are written to (default: `<root>/Processed_Photos/`).
    #[arg(long)]
    processed: Option<PathBuf>,
    /// Directory the reconstructed tree is written to (default: `<root>/Extracted_Data/`).
    #[arg(long)]
    extracted: Option<PathBuf>,
    /// Base directory the defaults above are resolved against.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Raise logging verbosity to trace.
    #[arg(short, long)]
    verbose: bool,
}

struct Paths {
    data: PathBuf,
    input: PathBuf,
    processed: PathBuf,
    extracted: PathBuf,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::TRACE } else { Level::WARN })
        .init();

    let paths = Paths {
        data: args.data.unwrap_or_else(|| args.root.join("Data_To_Hide")),
        input: args.input.unwrap_or_else(|| args.root.join("Input_Photos")),
        processed: args
            .processed
            .unwrap_or_else(|| args.root.join("Processed_Photos")),
        extracted: args
            .extracted
            .unwrap_or_else(|| args.root.join("Extracted_Data")),
    };

    match run(&paths) {
        Ok(()) => std::process::exit(0),
        Err(Abort::UserDeclined) => {
            println!("No new images have been modified/saved. Goodbye.");
            std::process::exit(0);
        }
        Err(Abort::Fatal(err)) => {
            eprintln!("Error - {err}");
            std::process::exit(1);
        }
    }
}

enum Abort {
    UserDeclined,
    Fatal(anyhow::Error),
}

impl<E> From<E> for Abort
where
    anyhow::Error: From<E>,
{
    fn from(err: E) -> Self {
        Abort::Fatal(anyhow::Error::from(err))
    }
}

fn run(paths: &Paths) -> Result<(), Abort> {
    println!("Enter 1 to hide data in an image set.");
    println!("Enter 2 to extract data from an image set");
    let choice = read_line()?;
    println!("***");

    match choice.trim() {
        "1" => hide(paths),
        "2" => extract(paths),
        _ => {
            println!("Invalid response.");
            Ok(())
        }
    }
}

fn hide(paths: &Paths) -> Result<(), Abort> {
    let data_str = paths.data.to_string_lossy();
    let trailing_separator = data_str.ends_with(std::path::MAIN_SEPARATOR) || data_str.ends_with('/');

    let plan = plan_encode(&paths.data, trailing_separator, &paths.input)?;
    println!(
        "Size of data to be hidden: {}",
        human_readable_size(plan.payload_bits_len())
    );
    println!("Do you wish to continue?");
    let answer = read_line()?;
    if !answer.starts_with(['y', 'Y']) {
        return Err(Abort::UserDeclined);
    }
    println!("***");

    debug!(target_dir = %paths.processed.display(), "committing encode");
    let report = commit_encode(&plan, &paths.processed)?;

    println!("Your data has successfully been hidden! (100% complete)");
    if !report.images_unused.is_empty() {
        println!();
        println!("Here are all the photos that didn't need to (and haven't been) processed...");
        for photo in &report.images_unused {
            println!("-> {photo}");
        }
    }
    Ok(())
}

fn extract(paths: &Paths) -> Result<(), Abort> {
    decode(&paths.processed, &paths.extracted)?;
    println!(
        "Success! The data from the image set has been extracted and can now be viewed. (100% complete)"
    );
    Ok(())
}

fn read_line() -> Result<String, Abort> {
    let mut line = String::new();
    io::stdout()
        .flush()
        .context("writing to stdout")
        .map_err(Abort::Fatal)?;
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading from stdin")
        .map_err(Abort::Fatal)?;
    Ok(line)
}
