use std::fmt;

/// Final category of one processed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultState {
    Success,
    Fail,
    Skipped,
}

impl ResultState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome a worker reports for one item
///
/// Created once per item and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlResult {
    pub state: ResultState,
    pub message: String,
    /// Title derived from the page; empty when the page never rendered
    pub title: String,
    pub url: String,
}

impl CrawlResult {
    pub fn success(url: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: ResultState::Success,
            message: message.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn fail(url: impl Into<String>, title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            state: ResultState::Fail,
            message: reason.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn skipped(url: impl Into<String>, title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            state: ResultState::Skipped,
            message: reason.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == ResultState::Success
    }
}

impl fmt::Display for CrawlResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.state, self.url, self.message)
    }
}
