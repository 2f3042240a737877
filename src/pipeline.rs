use std::fmt;
use std::path::Path;
use std::time::Duration;

use url::form_urlencoded;

use crate::archiver;
use crate::error::Result;
use crate::fetcher::{PageFetcher, Renderer, render_page};
use crate::models::{ItemReport, PriceQuote, Scraped, SinkOutcome, UploadRecord};
use crate::parser::{self, LISTING_PRICE_SELECTOR};
use crate::price::average_prices;
use crate::sink::{self, Sink};

const EBAY_SEARCH: &str = "https://www.ebay.com/sch/i.html";
const BESTBUY_SEARCH: &str = "https://www.bestbuy.com/site/searchpage.jsp?id=pcat17071&st=";

/// Sold, buy-it-now, used-condition listings.
pub fn ebay_search_url(item: &str) -> String {
    format!(
        "{}?_nkw={}&LH_ItemCondition=3&LH_BIN=1&rt=nc&LH_Sold=1",
        EBAY_SEARCH,
        quote_plus(item)
    )
}

pub fn bestbuy_search_url(item: &str) -> String {
    format!("{}{}", BESTBUY_SEARCH, quote_plus(item))
}

fn quote_plus(item: &str) -> String {
    form_urlencoded::byte_serialize(item.as_bytes()).collect()
}

/// Collaborators shared by every item in a run.
pub struct RunContext<'a> {
    pub sink: Option<&'a dyn Sink>,
    pub dump_dir: Option<&'a Path>,
}

impl RunContext<'_> {
    fn dump(&self, source: &str, item: &str, html: &str) {
        let Some(dir) = self.dump_dir else { return };
        match archiver::save_page(dir, source, item, html) {
            Ok(path) => log::debug!("Saved page to {}", path.display()),
            Err(e) => log::warn!("Could not save page for {}: {:#}", item, e),
        }
    }

    fn report(&self, item: &str, product_url: Option<&str>, quote: &PriceQuote) -> SinkOutcome {
        let record = UploadRecord::new(item, product_url, quote);
        sink::upload(self.sink, &record)
    }
}

pub fn scrape_ebay(ctx: &RunContext<'_>, renderer: &dyn Renderer, item: &str, wait: Duration) -> ItemReport {
    log::info!("Searching eBay: {}", item);
    finish(item, ebay_item(ctx, renderer, item, wait))
}

fn ebay_item(ctx: &RunContext<'_>, renderer: &dyn Renderer, item: &str, wait: Duration) -> Result<Scraped> {
    let url = ebay_search_url(item);
    let html = render_page(renderer, &url, LISTING_PRICE_SELECTOR, wait)?;
    ctx.dump("ebay", item, &html);

    let samples = parser::extract_listing_prices(&html);
    log::info!("First {} prices: {:?}", samples.len(), samples);
    let mean = average_prices(&samples);
    log::info!("Average of first {} prices: {}", samples.len(), mean);

    let quote = PriceQuote::Average { mean, samples };
    let sink = if quote.is_found() {
        ctx.report(item, Some(url.as_str()), &quote)
    } else {
        log::info!("No listing prices for {}", item);
        SinkOutcome::Skipped
    };

    Ok(Scraped {
        product_url: Some(url),
        quote,
        sink,
    })
}

pub fn scrape_bestbuy(ctx: &RunContext<'_>, fetcher: &dyn PageFetcher, item: &str) -> ItemReport {
    log::info!("Searching Best Buy: {}", item);
    finish(item, bestbuy_item(ctx, fetcher, item))
}

fn bestbuy_item(ctx: &RunContext<'_>, fetcher: &dyn PageFetcher, item: &str) -> Result<Scraped> {
    let search_url = bestbuy_search_url(item);
    let html = fetcher.fetch(&search_url)?;
    ctx.dump("bestbuy_search", item, &html);

    let Some(link) = parser::extract_product_link(&html, &search_url) else {
        log::info!("Not found: {}", item);
        return Ok(Scraped {
            product_url: None,
            quote: PriceQuote::NotFound,
            sink: SinkOutcome::Skipped,
        });
    };
    log::info!("Found: {}", link);

    let page = fetcher.fetch(&link)?;
    ctx.dump("bestbuy_product", item, &page);

    // The sentinel is recorded too, so a found product with no price still leaves a row.
    let quote = parser::extract_product_price(&page);
    log::info!("Price: {}", quote);
    let sink = ctx.report(item, Some(link.as_str()), &quote);

    Ok(Scraped {
        product_url: Some(link),
        quote,
        sink,
    })
}

fn finish(item: &str, outcome: Result<Scraped>) -> ItemReport {
    if let Err(e) = &outcome {
        log::error!("Skipping {}: {}", item, e);
    }
    ItemReport {
        item: item.to_string(),
        outcome,
    }
}

/// Runs `scrape_one` over every item in order. One item's failure never stops the rest.
pub fn run_all<F>(items: &[String], mut scrape_one: F) -> Vec<ItemReport>
where
    F: FnMut(&str) -> ItemReport,
{
    items.iter().map(|item| scrape_one(item.as_str())).collect()
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub priced: usize,
    pub failed: usize,
    pub uploaded: usize,
}

impl Summary {
    pub fn from_reports(reports: &[ItemReport]) -> Self {
        let mut summary = Summary {
            total: reports.len(),
            ..Default::default()
        };
        for report in reports {
            match &report.outcome {
                Ok(scraped) => {
                    if scraped.quote.is_found() {
                        summary.priced += 1;
                    }
                    if scraped.sink == SinkOutcome::Uploaded {
                        summary.uploaded += 1;
                    }
                }
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items: {} priced, {} failed, {} uploaded",
            self.total, self.priced, self.failed, self.uploaded
        )
    }
}
