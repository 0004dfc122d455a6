//! Page/per-page pagination with a total count.

use super::query::{push_predicates, Entity, Filters};
use super::PaginationError;
use serde::Serialize;
use sqlx::{PgConnection, Postgres, QueryBuilder};

/// One page of an offset-paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, per_page: u32) -> Self {
        Self {
            items,
            total,
            page,
            per_page,
            total_pages: total_pages(total, per_page),
        }
    }

    /// Converts every item, keeping the paging information
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }

    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "total": self.total,
            "page": self.page,
            "per_page": self.per_page,
            "total_pages": self.total_pages,
        })
    }
}

/// `ceil(total / per_page)`
pub fn total_pages(total: i64, per_page: u32) -> i64 {
    let per_page = i64::from(per_page.max(1));
    (total.max(0) + per_page - 1) / per_page
}

/// Rows skipped before `page` (1-based)
pub fn offset_for(page: u32, per_page: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(per_page)
}

/// Fetches page `page` of `E`, `per_page` rows at a time, ordered by
/// primary key
///
/// `page` and `per_page` below 1 are treated as 1.
pub async fn paginate_offset<E: Entity>(
    conn: &mut PgConnection,
    filters: &Filters,
    page: u32,
    per_page: u32,
) -> Result<Page<E>, PaginationError> {
    let page = page.max(1);
    let per_page = per_page.max(1);

    let mut count_qb: QueryBuilder<'static, Postgres> =
        QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", E::TABLE));
    push_predicates::<E>(&mut count_qb, filters, None);
    let (total,): (i64,) = count_qb.build_query_as::<(i64,)>().fetch_one(&mut *conn).await?;

    let mut qb: QueryBuilder<'static, Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM {}", E::SELECT, E::TABLE));
    push_predicates::<E>(&mut qb, filters, None);
    qb.push(" ORDER BY ")
        .push(E::PRIMARY_KEY.name)
        .push(" ASC LIMIT ");
    qb.push_bind(i64::from(per_page));
    qb.push(" OFFSET ");
    qb.push_bind(offset_for(page, per_page));

    let items = qb.build_query_as::<E>().fetch_all(&mut *conn).await?;

    Ok(Page::new(items, total, page, per_page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 1), 25);
    }

    #[test]
    fn test_offset_for() {
        assert_eq!(offset_for(1, 10), 0);
        assert_eq!(offset_for(3, 10), 20);
        assert_eq!(offset_for(0, 10), 0);
    }

    #[test]
    fn test_last_page_size_matches_remainder() {
        for total in 0_i64..60 {
            for per_page in 1_u32..12 {
                let rows: Vec<i64> = (0..total).collect();
                let pages = total_pages(total, per_page);

                let mut seen = 0;
                for page in 1..=pages as u32 {
                    let offset = offset_for(page, per_page) as usize;
                    let slice: Vec<_> = rows.iter().skip(offset).take(per_page as usize).collect();
                    seen += slice.len() as i64;

                    if page as i64 == pages {
                        let remainder = total - i64::from(per_page) * (pages - 1);
                        assert_eq!(slice.len() as i64, remainder);
                        assert!(remainder > 0 && remainder <= i64::from(per_page));
                    } else {
                        assert_eq!(slice.len(), per_page as usize);
                    }
                }
                assert_eq!(seen, total);
            }
        }
    }

    #[test]
    fn test_page_metadata() {
        let page = Page::new(vec![1, 2, 3], 23, 3, 10).map(|n| n * 2);

        assert_eq!(page.items, vec![2, 4, 6]);
        assert_eq!(
            page.metadata(),
            serde_json::json!({"total": 23, "page": 3, "per_page": 10, "total_pages": 3})
        );
    }
}
