//! Core data types for queries, harvested records, and failures.

use serde::{Deserialize, Serialize};

/// Limit applied when a caller does not ask for a specific number of records.
pub const DEFAULT_LIMIT: usize = 30;

/// What a query filters the timeline by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Hashtag,
    User,
}

impl QueryKind {
    /// Search expression for `term`, before URL encoding.
    pub fn search_expression(self, term: &str) -> String {
        match self {
            QueryKind::Hashtag => format!("#{term}"),
            QueryKind::User => format!("from:{term}"),
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKind::Hashtag => f.write_str("hashtag"),
            QueryKind::User => f.write_str("user"),
        }
    }
}

/// An immutable request for at most `limit` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    kind: QueryKind,
    term: String,
    limit: usize,
}

impl Query {
    /// Build a query. The term must be non-empty and the limit positive.
    pub fn new(kind: QueryKind, term: impl Into<String>, limit: usize) -> HarvestResult<Self> {
        let term = term.into();
        if term.trim().is_empty() {
            return Err(HarvestError::InvalidQuery("search term is empty".into()));
        }
        if limit == 0 {
            return Err(HarvestError::InvalidQuery(
                "limit must be greater than zero".into(),
            ));
        }
        Ok(Self { kind, term, limit })
    }

    pub fn hashtag(term: impl Into<String>, limit: usize) -> HarvestResult<Self> {
        Self::new(QueryKind::Hashtag, term, limit)
    }

    pub fn user(term: impl Into<String>, limit: usize) -> HarvestResult<Self> {
        Self::new(QueryKind::User, term, limit)
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Search URL for this query: `{base}?q=<urlencoded expression>`.
    pub fn url(&self, base: &str) -> String {
        let expression = self.kind.search_expression(&self.term);
        let encoded: String = url::form_urlencoded::byte_serialize(expression.as_bytes()).collect();
        format!("{base}?q={encoded}")
    }
}

/// The author block of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "fullname")]
    pub display_name: String,
    /// Profile path, always starting with `/`.
    #[serde(rename = "href")]
    pub handle: String,
    pub id: String,
}

/// One post as rendered in the feed.
///
/// Timestamps and counters are kept exactly as displayed: the feed shows
/// abbreviated counts such as `1.2K`, and consumers are expected to handle
/// them themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub account: Account,
    #[serde(rename = "date")]
    pub posted_at: String,
    #[serde(rename = "hashtags")]
    pub tags: Vec<String>,
    #[serde(rename = "likes")]
    pub like_count: String,
    #[serde(rename = "replies")]
    pub reply_count: String,
    #[serde(rename = "retweets")]
    pub repost_count: String,
    #[serde(rename = "text")]
    pub body: String,
}

/// Why the collector stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// At least `limit` items were loaded.
    LimitReached,
    /// The feed stopped growing before `limit` was reached.
    FeedExhausted { stalls: u32 },
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::LimitReached => "limit_reached",
            Termination::FeedExhausted { .. } => "feed_exhausted",
        }
    }
}

/// Output of one query session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Harvest {
    /// Records in feed order.
    pub records: Vec<Record>,
    pub termination: Termination,
    /// Items that were loaded but dropped because extraction failed.
    pub skipped: usize,
}

/// Failure reported by a browser backend.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

/// Failure to turn one item into a record. Never aborts a session.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Incomplete record: missing {field}")]
    IncompleteRecord { field: &'static str },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Session-level failures.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Failed to acquire browser session: {0}")]
    SessionAcquisition(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("None of the {} loaded items could be extracted (first failure: {})", .failures.len(), first_failure(.failures))]
    NoRecordExtracted { failures: Vec<ExtractError> },

    #[error("Harvest cancelled")]
    Cancelled,
}

fn first_failure(failures: &[ExtractError]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;
