use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("browser session failed: {0}")]
    Browser(#[source] anyhow::Error),

    #[error("timed out waiting for `{selector}`")]
    RenderTimeout { selector: String },

    #[error("upload failed: {0}")]
    Sink(#[source] reqwest::Error),

    #[error("upload rejected with HTTP {status}: {body}")]
    SinkStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
