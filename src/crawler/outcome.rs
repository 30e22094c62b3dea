//! Handler results and the supervisor's view of a processed task

use crate::crawler::fetcher::FetchError;
use crate::crawler::record::DetailRecord;
use crate::crawler::task::Task;
use thiserror::Error;

/// What a handler produced from one page
#[derive(Debug, Default)]
pub struct HandlerOutput {
    /// New tasks discovered on the page
    pub enqueue: Vec<Task>,
    /// Record extracted from the page, detail pages only
    pub record: Option<DetailRecord>,
}

impl HandlerOutput {
    pub fn tasks(enqueue: Vec<Task>) -> Self {
        Self {
            enqueue,
            record: None,
        }
    }

    pub fn record(record: DetailRecord) -> Self {
        Self {
            enqueue: Vec::new(),
            record: Some(record),
        }
    }
}

/// A page from which nothing (more) could be extracted
///
/// Recoverable by definition: the supervisor logs it and moves on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionGap {
    #[error("no anchor with text '{region}' on the top-level listing")]
    RegionNotFound { region: String },

    #[error("no target region configured")]
    EmptyRegion,

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("unexpected page structure: {0}")]
    Structure(String),
}

/// Final outcome of one task as seen by the supervisor
#[derive(Debug)]
pub enum Outcome {
    /// Handler ran; its output is applied
    Success(HandlerOutput),
    /// Handler ran but could not extract; logged and discarded
    ExtractionGap(ExtractionGap),
    /// The page could not be fetched; logged and discarded
    Transport(FetchError),
}

impl Outcome {
    /// Short name used in logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ExtractionGap(_) => "extraction_gap",
            Self::Transport(_) => "transport_failure",
        }
    }
}
