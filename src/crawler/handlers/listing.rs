//! Shared logic of the paginated listing stages

use crate::crawler::document::Document;
use crate::crawler::outcome::{ExtractionGap, HandlerOutput};
use crate::crawler::task::{Label, Task};

/// Anchor pointing at the next page of a listing
pub const NEXT_PAGE_SELECTOR: &str = "a.next_page";

/// Enqueues every `item_css` anchor as `item_label`, plus the listing's next
/// page under the task's own label while the chain is below `max_pages`
pub fn follow_listing(
    task: &Task,
    document: &Document,
    item_css: &str,
    item_label: Label,
    max_pages: u32,
) -> Result<HandlerOutput, ExtractionGap> {
    let mut enqueue: Vec<Task> = document
        .links(item_css)?
        .into_iter()
        .map(|url| Task::new(url, item_label))
        .collect();

    let items = enqueue.len();

    if let Some(next) = document.links(NEXT_PAGE_SELECTOR)?.into_iter().next() {
        if task.page_index + 1 < max_pages {
            enqueue.push(task.next_page(next));
        } else {
            tracing::info!(
                "Pagination cap of {} pages reached at {}, not following {}",
                max_pages,
                task.url,
                next
            );
        }
    }

    tracing::debug!(
        "{} page {} (#{}): {} {} link(s), {} follow-up(s)",
        task.stage(),
        task.url,
        task.page_index + 1,
        items,
        item_label,
        enqueue.len() - items
    );

    Ok(HandlerOutput::tasks(enqueue))
}
