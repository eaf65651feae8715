use std::env;
use std::time::Duration;

use crate::importers::RestatementPolicy;

/// Browser-like User-Agent sent on every request; Rosstat serves an
/// empty shell to unidentified clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub database_url: String,
    pub http_timeout_secs: u64,
    pub restatement_policy: RestatementPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            base_url: env::var("BASE_URL")
                .unwrap_or_else(|_| "https://rosstat.gov.ru".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:cpi.db".to_string()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            restatement_policy: match env::var("INCLUDE_RESTATEMENT").as_deref() {
                Ok("1") | Ok("true") => RestatementPolicy::IncludePriorDecember,
                _ => RestatementPolicy::Exclude,
            },
        }
    }

    /// Build the single HTTP client shared by the discoverer and the importer.
    /// The upstream site sets no timeout expectations, so one is set here.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .build()
    }
}
