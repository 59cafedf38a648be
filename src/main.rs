use std::process::ExitCode;

use clap::Parser;
use indicatif::MultiProgress;
use owo_colors::{OwoColorize, Stream};

use crate::{
    cli::Cli,
    config::{ConfigFile, Settings, SourceSettings},
    fetcher::{PageSource, fetch_all, scrape::Scholar, serpapi::SerpApi},
    output::{OutputDocument, output_path},
    record::normalize,
};

mod cli;
mod config;
mod date;
mod error;
mod fetcher;
mod logging;
mod output;
mod record;

fn main() -> ExitCode {
    let args = Cli::parse();
    let progress = logging::init(args.quiet, args.debug);
    match run(&args, progress) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{} {e:#}",
                "✗".if_supports_color(Stream::Stderr, |t| t.red())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli, progress: MultiProgress) -> anyhow::Result<()> {
    let file = ConfigFile::load(args.config.as_deref())?;
    let settings = Settings::resolve(args, file, |var| std::env::var(var).ok())?;

    let source: Box<dyn PageSource> = match settings.source {
        SourceSettings::SerpApi(s) => Box::new(SerpApi::new(s)),
        SourceSettings::Scrape(s) => Box::new(Scholar::new(s, progress)),
    };
    log::info!(
        "Fetching publications for author {} from {}",
        args.author_id,
        source.name()
    );
    let raw = fetch_all(source.as_ref(), &args.author_id)?;

    let fields = source.fields();
    let records: Vec<_> = raw
        .iter()
        .map(|r| normalize(r, fields))
        .filter(|r| !r.is_empty())
        .collect();
    if records.len() < raw.len() {
        log::warn!(
            "Dropped {} records without any usable field",
            raw.len() - records.len()
        );
    }

    let doc = OutputDocument::build(records, settings.order);
    let path = output_path(&settings.output_dir, &args.author_id);
    doc.write_to(&path)?;

    println!(
        "{} Saved {} publications ({} journal, {} others) to {}",
        "✓".if_supports_color(Stream::Stdout, |t| t.green()),
        doc.len(),
        doc.journal.len(),
        doc.others.len(),
        path.display()
    );
    Ok(())
}
