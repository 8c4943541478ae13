//! Interactive page view
//!
//! [`ViewController`] owns the request and display state; [`PageFetcher`]
//! runs its fetches concurrently and feeds results back, newest ticket wins.

pub mod fetcher;
pub mod state;

pub use fetcher::{PageFetcher, PageSource};
pub use state::{FetchTicket, ViewAction, ViewController, ViewRequest, ViewStatus};
