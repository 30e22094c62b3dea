use super::Handler;
use crate::config::RunConfig;
use crate::crawler::document::Document;
use crate::crawler::outcome::{ExtractionGap, HandlerOutput};
use crate::crawler::task::{Label, Task};

/// Handles the top-level listing (and any unlabeled task)
///
/// Looks up the anchor whose text is the configured region and enqueues
/// every anchor whose href contains that anchor's href as a Region task.
pub struct TopHandler {
    run: RunConfig,
}

impl TopHandler {
    pub fn new(run: RunConfig) -> Self {
        Self { run }
    }
}

impl Handler for TopHandler {
    fn label(&self) -> Label {
        Label::Top
    }

    fn handle(&self, _task: &Task, document: &Document) -> Result<HandlerOutput, ExtractionGap> {
        let region = self.run.target_region.trim();
        if region.is_empty() {
            return Err(ExtractionGap::EmptyRegion);
        }

        let href = document
            .anchor_href_by_text(region)?
            .ok_or_else(|| ExtractionGap::RegionNotFound {
                region: region.to_string(),
            })?;

        let enqueue: Vec<Task> = document
            .links_containing(&href)?
            .into_iter()
            .map(|url| Task::new(url, Label::Region))
            .collect();

        if enqueue.is_empty() {
            return Err(ExtractionGap::Structure(format!(
                "anchor '{}' has no crawlable href ({})",
                region, href
            )));
        }

        tracing::info!(
            "Region '{}' ({}): {} listing link(s)",
            region,
            href,
            enqueue.len()
        );

        Ok(HandlerOutput::tasks(enqueue))
    }
}
