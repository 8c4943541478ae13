use serde::{Deserialize, Serialize};

/// Offset/limit pair bounding a result slice
///
/// Out-of-range windows are not errors; they are clamped into
/// `[0, filtered_rows]` by [`PaginationWindow::clamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationWindow {
    pub offset: u64,
    pub limit: u64,
}

impl PaginationWindow {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Exclusive end of the window, saturating
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.limit)
    }

    /// Clamp so that `offset + limit <= filtered_rows`
    pub fn clamp(self, filtered_rows: u64) -> Self {
        let offset = self.offset.min(filtered_rows);
        let limit = self.limit.min(filtered_rows - offset);
        Self { offset, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside() {
        assert_eq!(
            PaginationWindow::new(10, 5).clamp(100),
            PaginationWindow::new(10, 5)
        );
    }

    #[test]
    fn test_clamp_tail() {
        assert_eq!(
            PaginationWindow::new(95, 10).clamp(100),
            PaginationWindow::new(95, 5)
        );
    }

    #[test]
    fn test_clamp_past_end() {
        assert_eq!(
            PaginationWindow::new(500, 10).clamp(100),
            PaginationWindow::new(100, 0)
        );
    }

    #[test]
    fn test_end_saturates() {
        assert_eq!(PaginationWindow::new(u64::MAX, 10).end(), u64::MAX);
    }
}
