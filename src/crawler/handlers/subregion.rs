use super::listing::follow_listing;
use super::Handler;
use crate::crawler::document::Document;
use crate::crawler::outcome::{ExtractionGap, HandlerOutput};
use crate::crawler::task::{Label, Task};

/// Practitioner profile links on a city listing
pub const DETAIL_LINK_SELECTOR: &str = r#"a[href*="/pub/"]"#;

/// Handles city listings: profile links become Detail tasks
pub struct SubRegionHandler {
    max_pages: u32,
}

impl SubRegionHandler {
    pub fn new(max_pages: u32) -> Self {
        Self { max_pages }
    }
}

impl Handler for SubRegionHandler {
    fn label(&self) -> Label {
        Label::SubRegion
    }

    fn handle(&self, task: &Task, document: &Document) -> Result<HandlerOutput, ExtractionGap> {
        follow_listing(
            task,
            document,
            DETAIL_LINK_SELECTOR,
            Label::Detail,
            self.max_pages,
        )
    }
}
