use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::{Encoding, WINDOWS_1252};
use headless_chrome::protocol::cdp::Target;
use headless_chrome::{Browser, LaunchOptions, Tab};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect;

use crate::error::{Result, ScrapeError};

const MAX_REDIRECTS: usize = 10;

const BROWSER_HEADERS: [(&str, &str); 13] = [
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("sec-ch-ua", "\"Chromium\";v=\"140\", \"Not=A?Brand\";v=\"24\", \"Google Chrome\";v=\"140\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
    ("user-agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36"),
];

const CHROME_USER_AGENT_ARG: &str = "--user-agent=Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const CHROME_WINDOW: (u32, u32) = (1920, 1200);

lazy_static! {
    static ref META_CHARSET_RE: Regex =
        Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_:.-]+)"#).unwrap();
}

/// Fetches raw page markup for a URL.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain blocking GET with a desktop Chrome header set.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let redirect_policy = redirect::Policy::custom(|attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error(format!("Too many redirects (>{MAX_REDIRECTS})"))
            } else {
                attempt.follow()
            }
        });

        let mut headers = HeaderMap::new();
        for (name, value) in BROWSER_HEADERS {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        let client = Client::builder()
            .default_headers(headers)
            .redirect(redirect_policy)
            .timeout(timeout)
            .build()?;

        Ok(HttpFetcher { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status,
            });
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes()?;
        log::debug!("GET {} -> {} ({} bytes)", url, status, body.len());

        Ok(decode_body(&body, content_type.as_deref()))
    }
}

/// Decodes a response body, trusting what the bytes look like over what the
/// server declared: BOM, then UTF-8, then the declared charset, then a
/// `<meta charset>` near the top of the document, then windows-1252.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let encoding = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_meta(bytes))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(WINDOWS_1252);
    log::debug!("Decoding body as {}", encoding.name());

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::warn!("Body contained bytes invalid for {}", encoding.name());
    }
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

fn charset_from_meta(bytes: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]);
    META_CHARSET_RE
        .captures(&head)
        .map(|caps| caps[1].to_string())
}

/// One isolated browser tab. Dropping it tears the tab down.
pub trait RenderSession {
    fn navigate(&mut self, url: &str) -> Result<()>;
    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<()>;
    fn content(&mut self) -> Result<String>;
}

pub trait Renderer {
    fn open_session(&self) -> Result<Box<dyn RenderSession + '_>>;
}

/// Loads `url` in a fresh session and returns the rendered markup.
///
/// Waiting for `wait_for` is best effort: if the element never shows up the
/// page is captured as it stands.
pub fn render_page(renderer: &dyn Renderer, url: &str, wait_for: &str, wait: Duration) -> Result<String> {
    let mut session = renderer.open_session()?;
    session.navigate(url)?;

    if let Err(e) = session.wait_for_element(wait_for, wait) {
        log::warn!("{}; capturing page anyway", e);
    }

    session.content()
}

/// Headless Chrome, launched once and shared across items.
pub struct ChromeRenderer {
    browser: Browser,
    // Default-context tab used for browser-level commands.
    control: Arc<Tab>,
    page_timeout: Duration,
}

impl ChromeRenderer {
    pub fn launch(page_timeout: Duration) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(false)
            .sandbox(false)
            .window_size(Some(CHROME_WINDOW))
            .idle_browser_timeout(Duration::from_secs(600))
            .args(vec![
                OsStr::new("--headless=new"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-web-security"),
                OsStr::new("--disable-gpu"),
                OsStr::new(CHROME_USER_AGENT_ARG),
            ])
            .build()
            .map_err(|e| ScrapeError::Browser(anyhow::anyhow!(e.to_string())))?;

        let browser = Browser::new(options).map_err(ScrapeError::Browser)?;
        let control = browser.wait_for_initial_tab().map_err(ScrapeError::Browser)?;
        log::info!("Launched headless Chrome");

        Ok(ChromeRenderer {
            browser,
            control,
            page_timeout,
        })
    }
}

impl Renderer for ChromeRenderer {
    fn open_session(&self) -> Result<Box<dyn RenderSession + '_>> {
        let context = self.browser.new_context().map_err(ScrapeError::Browser)?;
        let context_id = context.get_id().to_string();
        let tab = match context.new_tab() {
            Ok(tab) => tab,
            Err(e) => {
                dispose_context(&self.control, &context_id);
                return Err(ScrapeError::Browser(e));
            }
        };
        tab.set_default_timeout(self.page_timeout);
        Ok(Box::new(ChromeSession {
            tab,
            control: &self.control,
            context_id,
        }))
    }
}

fn dispose_command(context_id: &str) -> Target::DisposeBrowserContext {
    Target::DisposeBrowserContext {
        browser_context_id: context_id.to_string(),
    }
}

fn dispose_context(control: &Tab, context_id: &str) {
    if let Err(e) = control.call_method(dispose_command(context_id)) {
        log::warn!("Failed to dispose browser context {}: {}", context_id, e);
    }
}

/// A tab in its own incognito context. Both go away on drop.
struct ChromeSession<'a> {
    tab: Arc<Tab>,
    control: &'a Tab,
    context_id: String,
}

impl RenderSession for ChromeSession<'_> {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(ScrapeError::Browser)?;
        Ok(())
    }

    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        match self.tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::debug!("wait for {} failed: {}", selector, e);
                Err(ScrapeError::RenderTimeout {
                    selector: selector.to_string(),
                })
            }
        }
    }

    fn content(&mut self) -> Result<String> {
        self.tab.get_content().map_err(ScrapeError::Browser)
    }
}

impl Drop for ChromeSession<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            log::warn!("Failed to close browser tab: {}", e);
        }
        dispose_context(self.control, &self.context_id);
    }
}
