//! Keyset (cursor) pagination.
//!
//! A page is fetched with `limit + 1` rows: the extra row only signals that
//! another page exists and is never returned. The next cursor records the
//! sort-column value of the last returned row, and the following page starts
//! strictly after it.
//!
//! Pages are gapless and duplicate-free as long as the sort column's values
//! are unique within the filtered set (the primary key and creation
//! timestamps in practice). Rows sharing a sort value with a page boundary
//! are skipped. Nullable columns are never sort keys, so a cursor value is
//! never NULL.

use super::query::{push_predicates, ColumnKind, Entity, Filters, Search, SortSpec, SqlValue};
use super::PaginationError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, Postgres, QueryBuilder};

/// Position after the last row of a page
///
/// Wire format: base64 of `{"last_id": <sort value>, "sort": "<column>"}`.
/// `last_id` holds the sort column's value, which is not necessarily an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub last_id: serde_json::Value,
    pub sort: String,
}

impl Cursor {
    pub fn new(last: &SqlValue, sort: &str) -> Self {
        Self {
            last_id: last.to_json(),
            sort: sort.to_string(),
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::json!({
            "last_id": self.last_id,
            "sort": self.sort,
        });
        BASE64.encode(json.to_string())
    }

    /// Decodes a cursor, returning `None` for anything malformed
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = BASE64.decode(token.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// The `last_id` interpreted as a value of a column of `kind`
    pub fn value_for(&self, kind: ColumnKind) -> Option<SqlValue> {
        SqlValue::from_json(&self.last_id, kind)
    }
}

/// Parameters of a cursor-paginated listing
#[derive(Debug, Clone)]
pub struct CursorRequest {
    pub filters: Filters,
    pub search: Option<Search>,
    pub sort: Option<String>,
    pub cursor: Option<String>,
    pub limit: u32,
}

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub limit: u32,
    pub has_next: bool,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    /// Converts every item, keeping the paging information
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            limit: self.limit,
            has_next: self.has_next,
            next_cursor: self.next_cursor,
        }
    }

    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "limit": self.limit,
            "has_next": self.has_next,
            "next_cursor": self.next_cursor,
        })
    }
}

/// Builds the page query and returns it with the sort it applies
pub fn build_cursor_query<E: Entity>(
    request: &CursorRequest,
) -> Result<(QueryBuilder<'static, Postgres>, SortSpec), PaginationError> {
    let sort = SortSpec::parse::<E>(request.sort.as_deref());

    let after = match request.cursor.as_deref().filter(|c| !c.is_empty()) {
        Some(token) => {
            let cursor = Cursor::decode(token)
                .ok_or_else(|| PaginationError::InvalidCursor("malformed cursor".to_string()))?;

            if cursor.sort != sort.column.name {
                return Err(PaginationError::SortMismatch {
                    cursor: cursor.sort,
                    requested: sort.column.name.to_string(),
                });
            }

            let value = cursor.value_for(sort.column.kind).ok_or_else(|| {
                PaginationError::InvalidCursor(format!(
                    "cursor value does not fit column {}",
                    sort.column.name
                ))
            })?;
            Some(value)
        }
        None => None,
    };

    let mut qb = QueryBuilder::new(format!("SELECT {} FROM {}", E::SELECT, E::TABLE));
    push_predicates::<E>(&mut qb, &request.filters, request.search.as_ref());

    if let Some(value) = after {
        qb.push(" AND ")
            .push(sort.column.name)
            .push(" ")
            .push(sort.direction.after_operator())
            .push(" ");
        value.push_bind(&mut qb);
    }

    qb.push(" ORDER BY ")
        .push(sort.column.name)
        .push(" ")
        .push(sort.direction.as_sql())
        .push(" LIMIT ");
    qb.push_bind(i64::from(request.limit) + 1);

    Ok((qb, sort))
}

/// Trims an over-fetched result to `limit` rows and derives the next cursor
pub fn finish_page<E: Entity>(mut rows: Vec<E>, limit: u32, sort: &SortSpec) -> CursorPage<E> {
    let has_next = rows.len() > limit as usize;
    if has_next {
        rows.truncate(limit as usize);
    }

    let next_cursor = if has_next {
        rows.last()
            .map(|row| Cursor::new(&row.value_of(sort.column.name), sort.column.name).encode())
    } else {
        None
    };

    CursorPage {
        items: rows,
        limit,
        has_next,
        next_cursor,
    }
}

/// Fetches one page of `E`
///
/// # Errors
///
/// - `PaginationError::InvalidCursor` if the cursor cannot be decoded or its
///   value does not fit the sort column
/// - `PaginationError::SortMismatch` if the cursor was minted for another
///   sort column
/// - `PaginationError::Database` if the query fails
pub async fn paginate_cursor<E: Entity>(
    conn: &mut PgConnection,
    request: &CursorRequest,
) -> Result<CursorPage<E>, PaginationError> {
    let limit = request.limit.max(1);
    let request = CursorRequest {
        limit,
        ..request.clone()
    };

    let (mut qb, sort) = build_cursor_query::<E>(&request)?;
    let rows = qb.build_query_as::<E>().fetch_all(&mut *conn).await?;

    tracing::debug!(
        table = E::TABLE,
        sort = sort.column.name,
        rows = rows.len(),
        "Cursor page fetched"
    );

    Ok(finish_page(rows, limit, &sort))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::query::tests::Note;
    use crate::pagination::query::SortDirection;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::cmp::Ordering;

    fn request(sort: Option<&str>, cursor: Option<String>, limit: u32) -> CursorRequest {
        CursorRequest {
            filters: Filters::new(),
            search: None,
            sort: sort.map(str::to_string),
            cursor,
            limit,
        }
    }

    #[test]
    fn test_cursor_roundtrip_integer() {
        let cursor = Cursor::new(&SqlValue::Int(42), "id");
        let decoded = Cursor::decode(&cursor.encode()).unwrap();

        assert_eq!(decoded, cursor);
        assert_eq!(decoded.value_for(ColumnKind::BigInt), Some(SqlValue::Int(42)));
    }

    #[test]
    fn test_cursor_roundtrip_datetime() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap() + Duration::microseconds(123_456);
        let cursor = Cursor::new(&SqlValue::Timestamp(at), "created_at");
        let decoded = Cursor::decode(&cursor.encode()).unwrap();

        assert_eq!(decoded, cursor);
        assert_eq!(decoded.sort, "created_at");
        assert_eq!(decoded.value_for(ColumnKind::Timestamp), Some(SqlValue::Timestamp(at)));
    }

    #[test]
    fn test_cursor_wire_format() {
        let encoded = Cursor::new(&SqlValue::Int(7), "id").encode();
        let json = BASE64.decode(encoded).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value, serde_json::json!({"last_id": 7, "sort": "id"}));
    }

    #[test]
    fn test_cursor_decode_rejects_garbage() {
        assert!(Cursor::decode("not base64 !!").is_none());
        assert!(Cursor::decode(&BASE64.encode("not json")).is_none());
        assert!(Cursor::decode(&BASE64.encode("[1, 2]")).is_none());
        assert!(Cursor::decode(&BASE64.encode(r#"{"last_id": 1}"#)).is_none());
    }

    #[test]
    fn test_first_page_query() {
        let (qb, sort) = build_cursor_query::<Note>(&request(None, None, 10)).unwrap();

        assert_eq!(sort.column.name, "id");
        assert_eq!(sort.direction, SortDirection::Desc);
        assert_eq!(
            qb.sql(),
            "SELECT id, title, created_at, due_at FROM notes WHERE deleted_at IS NULL ORDER BY id DESC LIMIT $1"
        );
    }

    #[test]
    fn test_continuation_query_uses_strict_inequality() {
        let asc = Cursor::new(&SqlValue::Text("m".to_string()), "title").encode();
        let (qb, _) = build_cursor_query::<Note>(&request(Some("title"), Some(asc), 5)).unwrap();
        assert!(qb.sql().contains(" AND title > $1 ORDER BY title ASC LIMIT $2"));

        let desc = Cursor::new(&SqlValue::Int(9), "id").encode();
        let (qb, _) = build_cursor_query::<Note>(&request(Some("-id"), Some(desc), 5)).unwrap();
        assert!(qb.sql().contains(" AND id < $1 ORDER BY id DESC LIMIT $2"));
    }

    #[test]
    fn test_cursor_for_other_sort_is_rejected() {
        let cursor = Cursor::new(&SqlValue::Int(9), "id").encode();
        let result = build_cursor_query::<Note>(&request(Some("title"), Some(cursor), 5));

        assert!(matches!(
            result,
            Err(PaginationError::SortMismatch { ref cursor, ref requested })
                if cursor == "id" && requested == "title"
        ));
    }

    #[test]
    fn test_cursor_survives_unknown_sort_fallback() {
        // Both calls resolve to the id fallback, so the cursor stays valid
        let cursor = Cursor::new(&SqlValue::Int(9), "id").encode();
        assert!(build_cursor_query::<Note>(&request(Some("bogus"), Some(cursor), 5)).is_ok());
    }

    #[test]
    fn test_cursor_with_unusable_value_is_rejected() {
        let null = Cursor::new(&SqlValue::Null, "id").encode();
        assert!(matches!(
            build_cursor_query::<Note>(&request(Some("id"), Some(null), 5)),
            Err(PaginationError::InvalidCursor(_))
        ));

        let malformed = Some("%%%".to_string());
        assert!(matches!(
            build_cursor_query::<Note>(&request(None, malformed, 5)),
            Err(PaginationError::InvalidCursor(_))
        ));
    }

    fn notes(count: i64) -> Vec<Note> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (1..=count)
            .map(|id| Note {
                id,
                // Titles deliberately ordered differently from ids
                title: format!("note-{:03}", (id * 7) % 101),
                created_at: base + Duration::minutes(id * 13 % 50) + Duration::seconds(id),
                due_at: (id % 3 != 0).then(|| base + Duration::days(id % 4)),
            })
            .collect()
    }

    /// Evaluates the page query's semantics over an in-memory table
    fn fetch(table: &[Note], sort: &SortSpec, after: Option<SqlValue>, limit: u32) -> Vec<Note> {
        let mut rows: Vec<Note> = table
            .iter()
            .filter(|note| match &after {
                None => true,
                Some(last) => {
                    let value = note.value_of(sort.column.name);
                    let ordering = value.partial_cmp(last).unwrap();
                    match sort.direction {
                        SortDirection::Asc => ordering == Ordering::Greater,
                        SortDirection::Desc => ordering == Ordering::Less,
                    }
                }
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = a
                .value_of(sort.column.name)
                .partial_cmp(&b.value_of(sort.column.name))
                .unwrap();
            match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        rows.truncate(limit as usize + 1);
        rows
    }

    fn walk(table: &[Note], sort_spec: Option<&str>, limit: u32) -> Vec<Note> {
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let req = request(sort_spec, cursor.clone(), limit);
            let (_, sort) = build_cursor_query::<Note>(&req).unwrap();
            let after = cursor
                .as_deref()
                .and_then(Cursor::decode)
                .and_then(|c| c.value_for(sort.column.kind));

            let page = finish_page(fetch(table, &sort, after, limit), limit, &sort);
            assert!(page.items.len() <= limit as usize);
            seen.extend(page.items);

            if !page.has_next {
                assert!(page.next_cursor.is_none());
                return seen;
            }
            cursor = page.next_cursor;
        }
    }

    #[test]
    fn test_pages_concatenate_to_full_ordered_set() {
        let table = notes(23);

        for sort_spec in [None, Some("id"), Some("-id"), Some("title"), Some("-created_at")] {
            let sort = SortSpec::parse::<Note>(sort_spec);
            let mut expected = table.clone();
            expected.sort_by(|a, b| {
                let ordering = a
                    .value_of(sort.column.name)
                    .partial_cmp(&b.value_of(sort.column.name))
                    .unwrap();
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });

            for limit in [1, 2, 5, 22, 23, 24, 100] {
                assert_eq!(
                    walk(&table, sort_spec, limit),
                    expected,
                    "sort {:?} limit {}",
                    sort_spec,
                    limit
                );
            }
        }
    }

    #[test]
    fn test_nullable_sort_walks_every_row() {
        let table = notes(17);
        assert!(table.iter().any(|note| note.due_at.is_none()));

        let mut expected = table.clone();
        expected.sort_by(|a, b| b.id.cmp(&a.id));

        for sort_spec in [Some("due_at"), Some("-due_at")] {
            for limit in [1, 2, 4, 16, 17, 18] {
                assert_eq!(
                    walk(&table, sort_spec, limit),
                    expected,
                    "sort {:?} limit {}",
                    sort_spec,
                    limit
                );
            }

            let (qb, sort) = build_cursor_query::<Note>(&request(sort_spec, None, 2)).unwrap();
            assert_eq!(sort.column.name, "id");
            assert!(qb.sql().ends_with(" ORDER BY id DESC LIMIT $1"));
        }
    }

    #[test]
    fn test_page_ending_on_null_value_still_continues() {
        // Row 3 has no due date and ends the page
        let rows: Vec<Note> = notes(4).into_iter().rev().collect();
        assert!(rows[1].due_at.is_none());

        let sort = SortSpec::parse::<Note>(Some("-due_at"));
        let page = finish_page(rows, 2, &sort);
        let next = page.next_cursor.clone().unwrap();

        assert_eq!(Cursor::decode(&next).unwrap(), Cursor::new(&SqlValue::Int(3), "id"));
        assert!(build_cursor_query::<Note>(&request(Some("-due_at"), Some(next), 2)).is_ok());
    }

    #[test]
    fn test_finish_page_without_overflow() {
        let sort = SortSpec::parse::<Note>(None);

        let page = finish_page(notes(3), 3, &sort);
        assert_eq!(page.items.len(), 3);
        assert!(!page.has_next);
        assert!(page.next_cursor.is_none());

        let page = finish_page(Vec::<Note>::new(), 3, &sort);
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn test_finish_page_with_overflow() {
        let sort = SortSpec::parse::<Note>(Some("created_at"));
        let rows = notes(4);
        let last_kept: DateTime<Utc> = rows[2].created_at;

        let page = finish_page(rows, 3, &sort);
        assert_eq!(page.items.len(), 3);
        assert!(page.has_next);

        let cursor = Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(cursor.sort, "created_at");
        assert_eq!(
            cursor.value_for(ColumnKind::Timestamp),
            Some(SqlValue::Timestamp(last_kept))
        );
        assert_eq!(
            page.metadata(),
            serde_json::json!({"limit": 3, "has_next": true, "next_cursor": page.next_cursor})
        );
    }
}
