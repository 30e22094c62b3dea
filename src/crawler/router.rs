//! Label-based dispatch
//!
//! The router owns one handler per stage, built once at startup. Dispatch
//! is a `match` over the closed label set; unlabeled tasks go to the
//! top-level handler.

use crate::config::RunConfig;
use crate::crawler::document::Document;
use crate::crawler::handlers::{
    DetailHandler, Handler, RegionHandler, SubRegionHandler, TopHandler,
};
use crate::crawler::outcome::{ExtractionGap, HandlerOutput};
use crate::crawler::task::{Label, Task};
use url::Url;

pub struct Router {
    top: TopHandler,
    region: RegionHandler,
    subregion: SubRegionHandler,
    detail: DetailHandler,
}

impl Router {
    /// Builds the handlers
    ///
    /// # Arguments
    ///
    /// * `run` - Run input, handed to the top-level handler only
    /// * `max_pages` - Pagination cap of the listing handlers
    pub fn new(run: RunConfig, max_pages: u32) -> Self {
        Self {
            top: TopHandler::new(run),
            region: RegionHandler::new(max_pages),
            subregion: SubRegionHandler::new(max_pages),
            detail: DetailHandler,
        }
    }

    /// Handler registered for a label; `None` selects the default handler
    pub fn handler_for(&self, label: Option<Label>) -> &dyn Handler {
        match label {
            None | Some(Label::Top) => &self.top,
            Some(Label::Region) => &self.region,
            Some(Label::SubRegion) => &self.subregion,
            Some(Label::Detail) => &self.detail,
        }
    }

    /// Parses a fetched body and runs the task's handler on it
    ///
    /// The parsed document lives only for the duration of this call.
    pub fn dispatch(
        &self,
        task: &Task,
        body: &str,
        page_url: &Url,
    ) -> Result<HandlerOutput, ExtractionGap> {
        let document = Document::parse(body, page_url);
        self.handler_for(task.label).handle(task, &document)
    }
}
