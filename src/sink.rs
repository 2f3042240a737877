use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{Result, ScrapeError};
use crate::models::{SinkOutcome, UploadRecord};

pub const PRICE_TABLE: &str = "price_history";

/// Insert-only destination for scraped prices.
pub trait Sink {
    fn insert(&self, record: &UploadRecord) -> Result<()>;
}

/// Writes rows through the Supabase REST (PostgREST) endpoint.
pub struct SupabaseSink {
    client: Client,
    endpoint: String,
    key: String,
}

impl SupabaseSink {
    pub fn new(base_url: &str, key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(SupabaseSink {
            client,
            endpoint: table_endpoint(base_url, PRICE_TABLE),
            key: key.to_string(),
        })
    }

    /// Builds a sink only when both credentials are present.
    pub fn from_credentials(url: Option<&str>, key: Option<&str>, timeout: Duration) -> Option<Self> {
        log::info!("Supabase URL: {}", url.unwrap_or("<unset>"));
        log::info!("Supabase key: {}", if key.is_some() { "SET" } else { "NOT SET" });

        let (Some(url), Some(key)) = (url, key) else {
            log::warn!("SUPABASE_URL or SUPABASE_KEY not set. Data will not be uploaded.");
            return None;
        };

        match SupabaseSink::new(url, key, timeout) {
            Ok(sink) => Some(sink),
            Err(e) => {
                log::warn!("Could not create Supabase client, uploads disabled: {}", e);
                None
            }
        }
    }
}

impl Sink for SupabaseSink {
    fn insert(&self, record: &UploadRecord) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .map_err(ScrapeError::Sink)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ScrapeError::SinkStatus { status, body });
        }
        Ok(())
    }
}

fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

/// Sends the record if a sink is configured. Never fails the caller.
pub fn upload(sink: Option<&dyn Sink>, record: &UploadRecord) -> SinkOutcome {
    let Some(sink) = sink else {
        log::debug!("No sink configured, skipping upload for {}", record.item_name);
        return SinkOutcome::Skipped;
    };

    match sink.insert(record) {
        Ok(()) => {
            log::info!("Uploaded {} ({})", record.item_name, record.price);
            SinkOutcome::Uploaded
        }
        Err(e) => {
            log::error!("Failed to upload {}: {}", record.item_name, e);
            SinkOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceQuote;
    use crate::test_server::{OneShotServer, body, header_value};
    use std::cell::RefCell;

    struct Recording(RefCell<Vec<UploadRecord>>);

    impl Sink for Recording {
        fn insert(&self, record: &UploadRecord) -> Result<()> {
            self.0.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    struct Rejecting;

    impl Sink for Rejecting {
        fn insert(&self, _record: &UploadRecord) -> Result<()> {
            Err(ScrapeError::SinkStatus {
                status: reqwest::StatusCode::UNAUTHORIZED,
                body: "bad key".into(),
            })
        }
    }

    fn record() -> UploadRecord {
        UploadRecord::new("Nintendo Switch 2", Some("https://example.com/p"), &PriceQuote::Text("$449.99".into()))
    }

    #[test]
    fn missing_sink_is_skipped() {
        assert_eq!(upload(None, &record()), SinkOutcome::Skipped);
    }

    #[test]
    fn present_sink_receives_record() {
        let sink = Recording(RefCell::new(Vec::new()));
        assert_eq!(upload(Some(&sink), &record()), SinkOutcome::Uploaded);
        assert_eq!(sink.0.borrow()[0].price, "$449.99");
    }

    #[test]
    fn insert_failure_is_reported_not_raised() {
        assert_eq!(upload(Some(&Rejecting), &record()), SinkOutcome::Failed);
    }

    #[test]
    fn missing_credentials_disable_uploads() {
        let timeout = Duration::from_secs(5);
        assert!(SupabaseSink::from_credentials(None, Some("key"), timeout).is_none());
        assert!(SupabaseSink::from_credentials(Some("https://x.supabase.co"), None, timeout).is_none());
    }

    #[test]
    fn insert_posts_row_with_supabase_headers() {
        let server = OneShotServer::start("201 Created", &[], b"");
        let sink = SupabaseSink::new(&format!("{}/", server.url), "secret-key", Duration::from_secs(5)).unwrap();
        let sent = record();

        sink.insert(&sent).unwrap();

        let request = server.request();
        assert!(request.starts_with("POST /rest/v1/price_history HTTP/1.1\r\n"));
        assert_eq!(header_value(&request, "apikey"), Some("secret-key"));
        assert_eq!(header_value(&request, "authorization"), Some("Bearer secret-key"));
        assert_eq!(header_value(&request, "prefer"), Some("return=minimal"));
        assert_eq!(header_value(&request, "content-type"), Some("application/json"));

        let row: UploadRecord = serde_json::from_str(body(&request)).unwrap();
        assert_eq!(row, sent);
    }

    #[test]
    fn rejected_insert_is_a_sink_status_error() {
        let server = OneShotServer::start("401 Unauthorized", &[("Content-Type", "text/plain")], b"bad key");
        let sink = SupabaseSink::new(&server.url, "wrong-key", Duration::from_secs(5)).unwrap();

        match sink.insert(&record()) {
            Err(ScrapeError::SinkStatus { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(server.request().starts_with("POST /rest/v1/price_history"));
    }

    #[test]
    fn endpoint_targets_price_table() {
        assert_eq!(
            table_endpoint("https://abc.supabase.co/", PRICE_TABLE),
            "https://abc.supabase.co/rest/v1/price_history"
        );
    }
}
