/// Listing engines for soft-deletable entities
///
/// - [`cursor`]: keyset pagination with filters, search and sort, driven by an
///   opaque base64 cursor
/// - [`offset`]: page/per-page pagination with a total count
/// - [`query`]: the entity manifest trait and the shared predicate builder
///
/// # Example
///
/// ```no_run
/// use taskmm_shared::models::task::Task;
/// use taskmm_shared::pagination::{paginate_cursor, CursorRequest, Filters, Search};
///
/// # async fn example(conn: &mut sqlx::PgConnection) -> Result<(), Box<dyn std::error::Error>> {
/// let request = CursorRequest {
///     filters: Filters::new().eq("status", "TODO"),
///     search: Search::new(Some("report"), &["title", "description"]),
///     sort: Some("-created_at".to_string()),
///     cursor: None,
///     limit: 10,
/// };
///
/// let page = paginate_cursor::<Task>(conn, &request).await?;
/// println!("{} tasks, more: {}", page.items.len(), page.has_next);
/// # Ok(())
/// # }
/// ```

pub mod cursor;
pub mod offset;
pub mod query;

pub use cursor::{paginate_cursor, Cursor, CursorPage, CursorRequest};
pub use offset::{paginate_offset, Page};
pub use query::{Column, ColumnKind, Entity, FilterValue, Filters, Search, SortDirection, SortSpec, SqlValue};

/// Pagination errors
#[derive(Debug, thiserror::Error)]
pub enum PaginationError {
    /// Cursor could not be decoded or does not fit the sort column
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Cursor was minted for a different sort column
    #[error("Cursor does not match sort: cursor sorts by {cursor}, request sorts by {requested}")]
    SortMismatch { cursor: String, requested: String },

    /// Query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
