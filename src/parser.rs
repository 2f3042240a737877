use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::PriceQuote;

pub const LISTING_PRICE_SELECTOR: &str = "span.su-styled-text.positive.bold.large-1.s-card__price";
pub const LISTING_SAMPLE_SIZE: usize = 3;

const LABELED_PRICE_SELECTORS: [&str; 3] = [
    r#"span[data-testid="customer-price"]"#,
    r#"span[data-testid="price-block-customer-price"]"#,
    r#"div[data-testid="price-block"]"#,
];

lazy_static! {
    static ref LISTING_PRICE_RE: Regex = Regex::new(
        r#"<span class="su-styled-text positive bold large-1 s-card__price">\s*(\$\d{1,3}(?:,\d{3})*(?:\.\d{2})?)\s*</span>"#
    )
    .unwrap();
    static ref SCRIPT_PRICE_RE: Regex = Regex::new(r#""customerPrice":(\d+(?:\.\d{2})?)"#).unwrap();
    static ref LABELED_PRICE_RE: Regex = Regex::new(r"\$\d+(?:,\d{3})?(?:\.\d{2})?").unwrap();
    static ref MONTHLY_PRICE_RE: Regex = Regex::new(r"\$\d+\.\d{2}/mo\.?").unwrap();

    static ref PRODUCT_ITEM: Selector = Selector::parse("li.product-list-item").unwrap();
    static ref PRODUCT_LINK: Selector = Selector::parse("a.product-list-item-link").unwrap();
    static ref SCRIPT: Selector = Selector::parse("script").unwrap();
    static ref LABELED_PRICES: Vec<Selector> = LABELED_PRICE_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect();
    static ref MONTHLY_MESSAGE: Selector =
        Selector::parse(r#"span[data-testid="message-parts-text"]"#).unwrap();
}

/// Listing prices from a rendered sold-items page, first few only.
///
/// Matches the raw markup against one exact price span; a class change on the
/// site yields no matches rather than an error.
pub fn extract_listing_prices(html: &str) -> Vec<String> {
    let matches: Vec<String> = LISTING_PRICE_RE
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect();
    log::debug!("Matched {} listing prices: {:?}", matches.len(), matches);

    matches.into_iter().take(LISTING_SAMPLE_SIZE).collect()
}

/// First product link on a search results page, resolved against `base_url`.
pub fn extract_product_link(html: &str, base_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let product = doc.select(&PRODUCT_ITEM).next()?;
    let link = product.select(&PRODUCT_LINK).next()?;
    let href = link.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }

    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Some(href.to_string()),
    }
}

/// Price from a product page. Strategies run strictly in order and the first hit wins.
pub fn extract_product_price(html: &str) -> PriceQuote {
    let doc = Html::parse_document(html);

    price_from_scripts(&doc)
        .or_else(|| price_from_labels(&doc))
        .or_else(|| price_from_monthly_messages(&doc))
        .map(PriceQuote::Text)
        .unwrap_or(PriceQuote::NotFound)
}

fn price_from_scripts(doc: &Html) -> Option<String> {
    doc.select(&SCRIPT).find_map(|script| {
        let text: String = script.text().collect();
        if !text.contains("customerPrice") {
            return None;
        }
        let caps = SCRIPT_PRICE_RE.captures(&text)?;
        log::debug!("Price taken from embedded script data");
        Some(format!("${}", &caps[1]))
    })
}

fn price_from_labels(doc: &Html) -> Option<String> {
    // Only the highest-priority label present is inspected.
    let elem = LABELED_PRICES
        .iter()
        .find_map(|selector| doc.select(selector).next())?;
    let text = stripped_text(elem);
    let found = LABELED_PRICE_RE.find(&text)?;
    log::debug!("Price taken from labeled price element");
    Some(found.as_str().to_string())
}

fn price_from_monthly_messages(doc: &Html) -> Option<String> {
    doc.select(&MONTHLY_MESSAGE).find_map(|span| {
        let text = stripped_text(span);
        let found = MONTHLY_PRICE_RE.find(&text)?;
        log::debug!("Price taken from monthly payment message");
        Some(found.as_str().to_string())
    })
}

fn stripped_text(elem: ElementRef<'_>) -> String {
    elem.text().map(str::trim).collect()
}
