//! Page view state machine
//!
//! Every action puts the view into `Loading` and issues a ticket with a fresh
//! id. A completion only lands if it carries the latest id; anything older is
//! dropped. Overlapping fetches are never cancelled, just superseded.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::query::{FilterSelection, QueryResult};

/// What the view is currently asking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest {
    pub offset: u64,
    pub page_size: usize,
    pub filters: FilterSelection,
}

impl ViewRequest {
    pub fn new(page_size: usize) -> Self {
        Self {
            offset: 0,
            page_size: page_size.max(1),
            filters: FilterSelection::new(),
        }
    }

    /// Zero-based page index of `offset`
    pub fn page(&self) -> u64 {
        self.offset / self.page_size as u64
    }
}

/// User intent applied to the view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    /// Jump to a zero-based page
    SetPage(u64),
    /// Change rows per page; the offset moves down to a page boundary
    SetPageSize(usize),
    /// Replace the filter selection and go back to the first page
    SetFilters(FilterSelection),
    /// Fetch the current request again
    Refresh,
    /// Back to the first page with no filters
    Reset,
}

/// Display state of the view
#[derive(Debug, Clone)]
pub enum ViewStatus {
    Idle,
    Loading,
    Ready(Arc<QueryResult>),
    Error(String),
}

impl ViewStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewStatus::Loading)
    }

    /// Page on screen, if any
    pub fn page(&self) -> Option<&Arc<QueryResult>> {
        match self {
            ViewStatus::Ready(page) => Some(page),
            _ => None,
        }
    }
}

/// A fetch the view wants performed
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub id: u64,
    pub request: ViewRequest,
}

/// Single-writer controller for one page view
#[derive(Debug)]
pub struct ViewController {
    request: ViewRequest,
    status: ViewStatus,
    last_issued: u64,
}

impl ViewController {
    pub fn new(page_size: usize) -> Self {
        Self {
            request: ViewRequest::new(page_size),
            status: ViewStatus::Idle,
            last_issued: 0,
        }
    }

    pub fn request(&self) -> &ViewRequest {
        &self.request
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    /// Id of the most recent ticket, 0 before the first action
    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    /// Number of pages for the last page shown
    pub fn page_count(&self) -> Option<u64> {
        self.status
            .page()
            .map(|p| p.filtered_rows.div_ceil(self.request.page_size as u64))
    }

    /// Apply an action and issue the fetch it needs
    pub fn dispatch(&mut self, action: ViewAction) -> FetchTicket {
        match action {
            ViewAction::SetPage(page) => {
                self.request.offset = page.saturating_mul(self.request.page_size as u64);
            }
            ViewAction::SetPageSize(size) => {
                let size = size.max(1);
                self.request.offset = (self.request.offset / size as u64) * size as u64;
                self.request.page_size = size;
            }
            ViewAction::SetFilters(filters) => {
                self.request.filters = filters;
                self.request.offset = 0;
            }
            ViewAction::Refresh => {}
            ViewAction::Reset => {
                self.request.filters = FilterSelection::new();
                self.request.offset = 0;
            }
        }

        self.last_issued += 1;
        self.status = ViewStatus::Loading;
        debug!(
            "Issued fetch #{} offset={} size={}",
            self.last_issued, self.request.offset, self.request.page_size
        );
        FetchTicket {
            id: self.last_issued,
            request: self.request.clone(),
        }
    }

    /// Feed a finished fetch back into the view
    ///
    /// # Returns
    /// * `bool` - Whether the result was applied; stale results are not
    pub fn complete(&mut self, ticket_id: u64, result: Result<QueryResult>) -> bool {
        if ticket_id != self.last_issued {
            warn!(
                "Discarding stale fetch #{} (latest is #{})",
                ticket_id, self.last_issued
            );
            return false;
        }

        self.status = match result {
            Ok(page) => ViewStatus::Ready(Arc::new(page)),
            Err(e) => ViewStatus::Error(e.to_string()),
        };
        true
    }
}
