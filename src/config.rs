//! Run configuration.
//!
//! Values come from the environment (after `.env` has been loaded by the
//! binary) and may be overridden field by field from the command line.

use std::str::FromStr;
use std::time::Duration;

use crate::error::TfrError;

/// Which shape the listing endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingFormat {
    /// JSON array of notice summaries.
    #[default]
    Json,
    /// Nested HTML table with one anchor per column.
    HtmlTable,
    /// Any HTML page; identifiers are harvested from detail-page links.
    DetailLinks,
}

impl ListingFormat {
    pub fn default_list_url(self) -> &'static str {
        match self {
            ListingFormat::Json => "https://tfr.faa.gov/tfrapi/exportTfrList",
            ListingFormat::HtmlTable => "https://tfr.faa.gov/tfr2/list.html",
            ListingFormat::DetailLinks => "https://tfr.faa.gov/tfr2/list.jsp",
        }
    }

    pub fn default_detail_template(self) -> &'static str {
        match self {
            ListingFormat::Json => "https://tfr.faa.gov/download/detail_{}.xml",
            ListingFormat::HtmlTable | ListingFormat::DetailLinks => {
                "https://tfr.faa.gov/save_pages/detail_{}.xml"
            }
        }
    }
}

impl FromStr for ListingFormat {
    type Err = TfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ListingFormat::Json),
            "html-table" | "html_table" | "html" => Ok(ListingFormat::HtmlTable),
            "detail-links" | "detail_links" | "links" => Ok(ListingFormat::DetailLinks),
            other => Err(TfrError::Config(format!("unknown listing format '{other}'"))),
        }
    }
}

/// Constants the extractor applies when reconciling a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionDefaults {
    /// Written to `dateExpire` when no expiration is present.
    pub sentinel_no_expiration: String,
    /// Upper-limit unit code that marks a flight level.
    pub flight_level_unit_code: String,
    /// Factor turning a flight level into feet.
    pub flight_level_multiplier: i64,
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            sentinel_no_expiration: "PERM".to_string(),
            flight_level_unit_code: "FL".to_string(),
            flight_level_multiplier: 100,
        }
    }
}

/// Retry policy for transient HTTP failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub listing_format: ListingFormat,
    pub list_url: String,
    /// Detail URL with `{}` (or `{id}`) standing for the normalised identifier.
    pub detail_url_template: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Size of the detail worker pool.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub defaults: ExtractionDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_format(ListingFormat::default())
    }
}

impl Settings {
    /// Defaults for a given listing shape, endpoints included.
    pub fn for_format(format: ListingFormat) -> Self {
        Self {
            listing_format: format,
            list_url: format.default_list_url().to_string(),
            detail_url_template: format.default_detail_template().to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            concurrency: 5,
            retry: RetryPolicy::default(),
            defaults: ExtractionDefaults::default(),
        }
    }

    /// Reads `TFR_*` variables from the process environment.
    pub fn from_env() -> Result<Self, TfrError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TfrError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup("TFR_LISTING_FORMAT") {
            Some(raw) => raw.parse()?,
            None => ListingFormat::default(),
        };
        let mut settings = Self::for_format(format);

        if let Some(url) = lookup("TFR_LIST_URL") {
            settings.list_url = url;
        }
        if let Some(template) = lookup("TFR_DETAIL_URL_TEMPLATE") {
            settings.detail_url_template = template;
        }
        if let Some(agent) = lookup("TFR_USER_AGENT") {
            settings.user_agent = agent;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TFR_TIMEOUT_SECS")? {
            settings.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TFR_CONNECT_TIMEOUT_SECS")? {
            settings.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "TFR_CONCURRENCY")? {
            settings.concurrency = n;
        }
        if let Some(n) = parse_var::<u32>(&lookup, "TFR_MAX_RETRIES")? {
            settings.retry.max_retries = n;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Switches listing shape.
    ///
    /// An endpoint still at the previous shape's default follows the new
    /// shape; one set explicitly (e.g. `TFR_LIST_URL`) is kept.
    pub fn with_format(mut self, format: ListingFormat) -> Self {
        let previous = self.listing_format;
        if self.list_url == previous.default_list_url() {
            self.list_url = format.default_list_url().to_string();
        }
        if self.detail_url_template == previous.default_detail_template() {
            self.detail_url_template = format.default_detail_template().to_string();
        }
        self.listing_format = format;
        self
    }

    pub fn validate(&self) -> Result<(), TfrError> {
        if self.concurrency == 0 {
            return Err(TfrError::Config("concurrency must be at least 1".into()));
        }
        if !self.detail_url_template.contains("{}") && !self.detail_url_template.contains("{id}")
        {
            return Err(TfrError::Config(format!(
                "detail URL template '{}' has no '{{}}' placeholder",
                self.detail_url_template
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, TfrError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TfrError::Config(format!("{key}: cannot parse '{raw}'"))),
    }
}
