pub mod archiver;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod price;
pub mod sink;

pub use error::{Result, ScrapeError};

#[cfg(test)]
mod test_server;
