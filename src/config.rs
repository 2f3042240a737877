use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// Average of recent sold listings, rendered in headless Chrome
    Ebay,
    /// First search hit's product page, plain HTTP
    Bestbuy,
}

#[derive(Debug, Parser)]
#[command(name = "price_tracker", version, about = "Scrape product prices and record them in Supabase")]
pub struct Cli {
    #[arg(value_enum)]
    pub source: Source,

    /// Items to search for. Overrides the items file.
    pub items: Vec<String>,

    /// One item per line; blank lines and `#` comments are ignored
    #[arg(long, env = "PRICE_TRACKER_ITEMS", default_value = "items.txt")]
    pub items_file: PathBuf,

    /// Request and page-load timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// How long to wait for listing prices to render, in seconds
    #[arg(long, default_value_t = 15)]
    pub render_wait: u64,

    /// Scrape and log only
    #[arg(long)]
    pub no_upload: bool,

    /// Save every fetched page into this directory
    #[arg(long)]
    pub dump_html: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: Source,
    pub items: Vec<String>,
    pub timeout: Duration,
    pub render_wait: Duration,
    pub upload: bool,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub dump_dir: Option<PathBuf>,
}

impl Config {
    /// Merges CLI arguments with the environment (and `.env`, if present).
    pub fn load(cli: Cli) -> Result<Self> {
        let _ = dotenv();

        let items = if cli.items.is_empty() {
            let text = fs::read_to_string(&cli.items_file)
                .with_context(|| format!("reading items file {}", cli.items_file.display()))?;
            parse_items(&text)
        } else {
            cli.items
        };
        if items.is_empty() {
            bail!("no items to search for");
        }

        Ok(Config {
            source: cli.source,
            items,
            timeout: Duration::from_secs(cli.timeout),
            render_wait: Duration::from_secs(cli.render_wait),
            upload: !cli.no_upload,
            supabase_url: non_empty_var("SUPABASE_URL"),
            supabase_key: non_empty_var("SUPABASE_KEY"),
            dump_dir: cli.dump_html,
        })
    }
}

pub fn parse_items(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_file_skips_blanks_and_comments() {
        let text = "# consoles\nNintendo Switch 2\n\n  PlayStation 5 Pro  \n#Xbox\n";
        assert_eq!(parse_items(text), vec!["Nintendo Switch 2", "PlayStation 5 Pro"]);
    }

    #[test]
    fn cli_items_override_file() {
        let cli = Cli::try_parse_from([
            "price_tracker",
            "bestbuy",
            "Nintendo Switch 2",
            "--items-file",
            "/nonexistent/items.txt",
            "--no-upload",
        ])
        .unwrap();
        let config = Config::load(cli).unwrap();
        assert_eq!(config.source, Source::Bestbuy);
        assert_eq!(config.items, vec!["Nintendo Switch 2"]);
        assert!(!config.upload);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.render_wait, Duration::from_secs(15));
    }

    #[test]
    fn missing_items_file_is_an_error() {
        let cli = Cli::try_parse_from(["price_tracker", "ebay", "--items-file", "/nonexistent/items.txt"]).unwrap();
        assert!(Config::load(cli).is_err());
    }
}
