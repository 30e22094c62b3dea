//! Crawl tasks and their stage labels

use std::fmt;
use url::Url;

/// Stage tag selecting which handler processes a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Top-level directory listing
    Top,
    /// Region (state) listing, paginated
    Region,
    /// Sub-region (city) listing, paginated
    SubRegion,
    /// Practitioner page, the unit of record extraction
    Detail,
}

impl Label {
    /// Converts the label to its database string
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Region => "region",
            Self::SubRegion => "subregion",
            Self::Detail => "detail",
        }
    }

    /// Parses a label from its database string
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "top" => Some(Self::Top),
            "region" => Some(Self::Region),
            "subregion" => Some(Self::SubRegion),
            "detail" => Some(Self::Detail),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// One unit of crawl work
///
/// The normalized URL is the task's identity. A task without a label is
/// routed to the default (top-level) handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub url: Url,
    pub label: Option<Label>,
    /// Pagination hops from the first page of the listing chain
    pub page_index: u32,
}

impl Task {
    /// Creates a task reached by link discovery
    pub fn new(url: Url, label: Label) -> Self {
        Self {
            url,
            label: Some(label),
            page_index: 0,
        }
    }

    /// Creates the unlabeled seed task
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            label: None,
            page_index: 0,
        }
    }

    /// Creates the follow-up task for a listing's next page
    pub fn next_page(&self, url: Url) -> Self {
        Self {
            url,
            label: self.label,
            page_index: self.page_index + 1,
        }
    }

    /// Frontier key of this task
    pub fn key(&self) -> &str {
        self.url.as_str()
    }

    /// Name of the stage handling this task, for logs
    pub fn stage(&self) -> &'static str {
        self.label.unwrap_or(Label::Top).to_db_string()
    }
}
