//! Stage handlers
//!
//! One handler per label. A handler is a pure function of the task and its
//! parsed page: it returns the tasks discovered on the page and, for detail
//! pages, one record. Handlers never touch the network, the frontier or the
//! database; the supervisor applies their output.

mod detail;
mod listing;
mod region;
mod subregion;
mod top;

pub use detail::DetailHandler;
pub use region::RegionHandler;
pub use subregion::SubRegionHandler;
pub use top::TopHandler;

use crate::crawler::document::Document;
use crate::crawler::outcome::{ExtractionGap, HandlerOutput};
use crate::crawler::task::{Label, Task};

/// Processes the pages of one stage
pub trait Handler: Send + Sync {
    /// Stage this handler is registered for
    fn label(&self) -> Label;

    /// Extracts follow-up tasks and records from one page
    fn handle(&self, task: &Task, document: &Document) -> Result<HandlerOutput, ExtractionGap>;
}
