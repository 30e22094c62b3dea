use super::listing::follow_listing;
use super::Handler;
use crate::crawler::document::Document;
use crate::crawler::outcome::{ExtractionGap, HandlerOutput};
use crate::crawler::task::{Label, Task};

/// City links on a region listing
pub const SUBREGION_LINK_SELECTOR: &str = r#"li > a[href*="/directory/md/location/"]"#;

/// Handles region listings: city links become SubRegion tasks
pub struct RegionHandler {
    max_pages: u32,
}

impl RegionHandler {
    pub fn new(max_pages: u32) -> Self {
        Self { max_pages }
    }
}

impl Handler for RegionHandler {
    fn label(&self) -> Label {
        Label::Region
    }

    fn handle(&self, task: &Task, document: &Document) -> Result<HandlerOutput, ExtractionGap> {
        follow_listing(
            task,
            document,
            SUBREGION_LINK_SELECTOR,
            Label::SubRegion,
            self.max_pages,
        )
    }
}
