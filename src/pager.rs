//! Page windows over a record set.

use crate::config::PagingSettings;
use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};

/// A validated page of a result set, plus its slice bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub page: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
    /// Index of the first row in the window
    #[serde(skip)]
    pub start: usize,
    /// One past the last row in the window
    #[serde(skip)]
    pub end: usize,
}

impl PageWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The rows of `rows` covered by this window.
    ///
    /// `rows` is expected to hold `total_rows` items; a shorter slice yields
    /// only the overlapping part.
    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let end = self.end.min(rows.len());
        let start = self.start.min(end);
        rows.get(start..end).unwrap_or_default()
    }
}

/// Compute the window for `page` (1-based) over `total_rows` rows.
///
/// With no rows at all every page is accepted and the window is empty.
pub fn paginate(
    total_rows: usize,
    page: usize,
    page_size: usize,
    max_page_size: usize,
) -> Result<PageWindow> {
    if page_size == 0 || page_size > max_page_size {
        return Err(WorkflowError::InvalidPageSize {
            page_size,
            max: max_page_size,
        });
    }

    let total_pages = total_rows.div_ceil(page_size);
    if page == 0 {
        return Err(WorkflowError::InvalidPage { page, total_pages });
    }
    if total_rows > 0 && page > total_pages {
        return Err(WorkflowError::InvalidPage { page, total_pages });
    }

    // Saturating: an empty set accepts any page number
    let start = (page - 1).saturating_mul(page_size).min(total_rows);
    let end = start.saturating_add(page_size).min(total_rows);

    Ok(PageWindow {
        page,
        page_size,
        total_rows,
        total_pages,
        has_next: page < total_pages,
        has_prev: page > 1,
        start,
        end,
    })
}

/// Page parameters as received from a caller; unset fields take defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    pub fn resolve(&self, total_rows: usize, settings: &PagingSettings) -> Result<PageWindow> {
        paginate(
            total_rows,
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(settings.default_page_size),
            settings.max_page_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_page_over_empty_set() {
        let window = paginate(0, usize::MAX, 2, 100).expect("empty set accepts any page");
        assert_eq!((window.start, window.end), (0, 0));
        assert_eq!(window.total_pages, 0);
        assert!(!window.has_next);
        assert!(window.slice::<u8>(&[]).is_empty());

        let window = paginate(0, usize::MAX, usize::MAX, usize::MAX).expect("no overflow");
        assert_eq!((window.start, window.end), (0, 0));
    }

    #[test]
    fn test_first_page_of_three_rows() {
        let window = paginate(3, 1, 2, 100).expect("valid page");
        assert_eq!(window.total_pages, 2);
        assert!(window.has_next);
        assert!(!window.has_prev);

        let rows = ["row1", "row2", "row3"];
        assert_eq!(window.slice(&rows), ["row1", "row2"]);
    }

    #[test]
    fn test_last_page_is_partial() {
        let window = paginate(3, 2, 2, 100).expect("valid page");
        assert!(!window.has_next);
        assert!(window.has_prev);
        assert_eq!(window.slice(&["a", "b", "c"]), ["c"]);
    }

    #[test]
    fn test_page_past_end_is_rejected() {
        let err = paginate(3, 5, 2, 100).expect_err("page 5 of 2");
        assert!(matches!(
            err,
            WorkflowError::InvalidPage {
                page: 5,
                total_pages: 2
            }
        ));
        assert_eq!(err.to_string(), "Page 5 does not exist. Total pages: 2");
    }

    #[test]
    fn test_page_zero_is_rejected() {
        let err = paginate(3, 0, 2, 100).expect_err("page 0");
        assert_eq!(err.kind(), "invalid_page");
    }

    #[test]
    fn test_page_size_bounds() {
        assert_eq!(
            paginate(3, 1, 0, 100).expect_err("size 0").kind(),
            "invalid_page_size"
        );
        assert_eq!(
            paginate(3, 1, 101, 100).expect_err("size 101").kind(),
            "invalid_page_size"
        );
        assert!(paginate(3, 1, 100, 100).is_ok());
    }

    #[test]
    fn test_no_rows_accepts_any_page() {
        for page in [1, 2, 50] {
            let window = paginate(0, page, 10, 100).expect("empty set");
            assert!(window.is_empty());
            assert_eq!(window.total_pages, 0);
            assert!(!window.has_next);
            assert!(window.slice::<u8>(&[]).is_empty());
        }
    }

    #[test]
    fn test_pages_reconstruct_all_rows() {
        let rows: Vec<usize> = (0..47).collect();
        for page_size in 1..=100 {
            let first = paginate(rows.len(), 1, page_size, 100).expect("first page");
            let mut rebuilt = Vec::new();
            for page in 1..=first.total_pages {
                let window = paginate(rows.len(), page, page_size, 100).expect("page");
                rebuilt.extend_from_slice(window.slice(&rows));
            }
            assert_eq!(rebuilt, rows, "page_size {page_size}");
        }
    }

    #[test]
    fn test_request_defaults() {
        let settings = PagingSettings::default();
        let window = PageRequest::default()
            .resolve(30, &settings)
            .expect("defaults are valid");
        assert_eq!(window.page, 1);
        assert_eq!(window.page_size, 12);
        assert_eq!(window.total_pages, 3);
    }

    #[test]
    fn test_window_serializes_camel_case() {
        let window = paginate(3, 1, 2, 100).expect("valid page");
        let json = serde_json::to_value(window).expect("serialize");
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["hasNext"], true);
        assert!(json.get("start").is_none());
    }
}
