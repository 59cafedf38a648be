use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::date::SortOrder;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Export a Google Scholar author's publications to `scholar_data_<AUTHOR_ID>.json`
pub struct Cli {
    /// Google Scholar author identifier (the `user=` value of a profile URL)
    #[arg(value_name = "AUTHOR_ID", value_parser = parse_author_id)]
    pub author_id: String,
    /// Where the publications come from
    #[arg(long, value_enum, default_value_t = SourceKind::Serpapi)]
    pub source: SourceKind,
    /// Sort direction within each bucket [default: newest, or the config file's]
    #[arg(long, value_enum)]
    pub order: Option<SortOrder>,
    /// Pause before every request, in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,
    /// Endpoint of the selected source, overriding the configured one
    #[arg(long, value_name = "URL")]
    pub base_url: Option<Url>,
    /// Directory the JSON file is written to
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Configuration file to use instead of the default locations
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "debug")]
    pub quiet: bool,
    /// Log every request
    #[arg(short, long)]
    pub debug: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// SerpAPI's Google Scholar author engine (needs an API key)
    Serpapi,
    /// scholar.google.com profile pages, scraped directly
    Scrape,
}

// NOTE: The identifier is opaque to us; the collaborator is the only one who can tell whether it
// names a real profile. All we reject locally is an empty one.
fn parse_author_id(s: &str) -> Result<String, String> {
    let id = s.trim();
    if id.is_empty() {
        Err("author identifier must not be empty".to_string())
    } else {
        Ok(id.to_string())
    }
}
