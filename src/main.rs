use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use price_tracker::config::{Cli, Config, Source};
use price_tracker::fetcher::{ChromeRenderer, HttpFetcher};
use price_tracker::pipeline::{self, RunContext, Summary};
use price_tracker::sink::{Sink, SupabaseSink};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::load(Cli::parse())?;

    let sink = if config.upload {
        SupabaseSink::from_credentials(
            config.supabase_url.as_deref(),
            config.supabase_key.as_deref(),
            config.timeout,
        )
    } else {
        log::info!("Uploads disabled with --no-upload");
        None
    };
    let ctx = RunContext {
        sink: sink.as_ref().map(|s| s as &dyn Sink),
        dump_dir: config.dump_dir.as_deref(),
    };

    let reports = match config.source {
        Source::Ebay => {
            let renderer = ChromeRenderer::launch(config.timeout).context("launching headless Chrome")?;
            pipeline::run_all(&config.items, |item| {
                pipeline::scrape_ebay(&ctx, &renderer, item, config.render_wait)
            })
        }
        Source::Bestbuy => {
            let fetcher = HttpFetcher::new(config.timeout).context("building HTTP client")?;
            pipeline::run_all(&config.items, |item| pipeline::scrape_bestbuy(&ctx, &fetcher, item))
        }
    };

    log::info!("{}", Summary::from_reports(&reports));
    Ok(())
}
