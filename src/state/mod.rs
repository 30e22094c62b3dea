//! State module for tracking crawl progress
//!
//! `RequestState` tracks each request of the persisted queue so an
//! interrupted run can pick up where it stopped.

mod request_state;

pub use request_state::RequestState;
