use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Title of the data page anchor on the landing page. The upstream markup
/// embeds this literal text in the href itself.
pub const DATA_PAGE_TITLE: &str = "Индексы потребительских цен";

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No anchor matching the data page pattern found on the landing page")]
    DataPageLinkNotFound,
}

/// The href patterns the discoverer matches against. Kept as named, swappable
/// values rather than inline literals: they encode the site's current layout
/// and are the first thing to adjust when the markup changes.
#[derive(Debug, Clone)]
pub struct PagePatterns {
    data_page: Regex,
    table_link: Regex,
}

impl PagePatterns {
    /// `data_page_title` is the literal anchor text embedded in the data page
    /// href; parameterized so layout variants need no second implementation.
    pub fn new(base_url: &str, data_page_title: &str) -> Self {
        let data_page = Regex::new(&format!(
            "^/storage/mediabank/.{{8}}/{}\\.html$",
            regex::escape(data_page_title)
        ))
        .expect("data page pattern must compile");
        let table_link = Regex::new(&format!(
            "^{}/storage/mediabank/.{{8}}/.+\\.xlsx$",
            regex::escape(base_url)
        ))
        .expect("table link pattern must compile");
        Self {
            data_page,
            table_link,
        }
    }
}

#[derive(Clone)]
pub struct LinkDiscoverer {
    client: reqwest::Client,
    base_url: String,
    patterns: PagePatterns,
}

impl LinkDiscoverer {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::config::USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        let patterns = PagePatterns::new(&base_url, DATA_PAGE_TITLE);
        Self::with_patterns(client, base_url, patterns)
    }

    pub fn with_patterns(
        client: reqwest::Client,
        base_url: String,
        patterns: PagePatterns,
    ) -> Self {
        Self {
            client,
            base_url,
            patterns,
        }
    }

    /// Full discovery pipeline: landing page, data page link, data page,
    /// spreadsheet links. Short-circuits on the first failure; no partial
    /// results are returned.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn discover(&self) -> Result<Vec<String>, DiscoveryError> {
        let landing = self.fetch_landing_page().await?;
        let data_page_path = self.extract_data_page_link(&landing)?;
        info!("Resolved CPI data page: {}", data_page_path);
        let data_page = self.fetch_data_page(&data_page_path).await?;
        let links = self.extract_table_links(&data_page);
        if links.is_empty() {
            warn!("Data page contains no spreadsheet links");
        }
        Ok(links)
    }

    #[instrument(skip(self))]
    pub async fn fetch_landing_page(&self) -> Result<String, DiscoveryError> {
        let url = format!("{}/price", self.base_url);
        debug!("Fetching landing page: {}", url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let html = response.text().await?;
        debug!("Retrieved landing page, size: {} bytes", html.len());
        Ok(html)
    }

    #[instrument(skip(self))]
    pub async fn fetch_data_page(&self, path: &str) -> Result<String, DiscoveryError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching data page: {}", url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let html = response.text().await?;
        debug!("Retrieved data page, size: {} bytes", html.len());
        Ok(html)
    }

    /// Locate the relative href of the CPI data page: the first anchor whose
    /// href matches the data page pattern. Absence is reported explicitly, as
    /// it signals an upstream layout change.
    pub fn extract_data_page_link(&self, html: &str) -> Result<String, DiscoveryError> {
        let document = Html::parse_document(html);
        let anchor_selector = Selector::parse("a").unwrap();
        document
            .select(&anchor_selector)
            .filter_map(|anchor| anchor.value().attr("href"))
            .find(|href| self.patterns.data_page.is_match(href))
            .map(str::to_string)
            .ok_or(DiscoveryError::DataPageLinkNotFound)
    }

    /// All spreadsheet hrefs on the data page, in document order. Not
    /// deduplicated; may be empty.
    pub fn extract_table_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let anchor_selector = Selector::parse("a").unwrap();
        let links: Vec<String> = document
            .select(&anchor_selector)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter(|href| self.patterns.table_link.is_match(href))
            .map(str::to_string)
            .collect();
        debug!("Found {} spreadsheet links", links.len());
        links
    }
}
