//! Pagination and result envelopes.

/// Sort direction, always keyed on message id.
///
/// Ids are assigned sequentially at archival time, so id order is
/// chronological order and the descending direction means "newest first".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn is_descending(self) -> bool {
        matches!(self, Self::Descending)
    }
}

/// Offset/limit window over an ordered scan.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct PaginationSpec {
    /// Sort direction by id.
    pub sort: SortOrder,
    /// Records to skip before emitting.
    pub offset: usize,
    /// Maximum records to emit. `None` = unbounded, subject to the
    /// configured contents cap when bodies are requested.
    pub limit: Option<usize>,
}

impl Default for PaginationSpec {
    fn default() -> Self {
        Self {
            sort: SortOrder::Ascending,
            offset: 0,
            limit: None,
        }
    }
}

impl PaginationSpec {
    /// The window for a "latest N" query: newest first, no offset.
    pub fn latest(limit: usize) -> Self {
        Self {
            sort: SortOrder::Descending,
            offset: 0,
            limit: Some(limit),
        }
    }
}

/// A paginated result slice together with the total match count.
///
/// `total` counts everything that matched the query, not the slice length,
/// and for search results it counts verified matches only.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult<T> {
    pub total: usize,
    pub data: Vec<T>,
}

impl<T> SearchResult<T> {
    pub fn empty() -> Self {
        Self {
            total: 0,
            data: Vec::new(),
        }
    }
}

/// Apply an offset/limit window to an already-sorted vector in place.
pub fn paginate_in_place<T>(items: &mut Vec<T>, spec: &PaginationSpec) {
    if spec.offset > 0 {
        if spec.offset >= items.len() {
            items.clear();
        } else {
            items.drain(..spec.offset);
        }
    }
    if let Some(limit) = spec.limit {
        items.truncate(limit);
    }
}
