//! Offset, look-ahead and cursor pagination over a [`QueryBuilder`].

use serde::Serialize;

use crate::query::clamp_i64;
use crate::{FromRow, Model, Order, Operator, QueryBuilder, QueryExecutor, Record, Result, Value};

pub const MAX_PER_PAGE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    /// 1-based position of the first row on this page; 0 when there are no rows.
    pub from: u64,
    pub to: u64,
    pub has_more: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub first: u64,
    pub last: u64,
    pub prev: Option<u64>,
    pub next: Option<u64>,
}

/// One page of results plus totals.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
    pub links: PageLinks,
}

/// A page fetched without counting the whole result set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplePage<T> {
    pub data: Vec<T>,
    pub has_more: bool,
    pub page: u64,
}

/// A page keyed by the last seen value of an ascending column.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<Value>,
    pub has_more: bool,
}

fn clamp_per_page(per_page: u64) -> u64 {
    per_page.clamp(1, MAX_PER_PAGE)
}

/// Fetch page `page` (1-based) of `query`, `per_page` rows at a time.
///
/// `page` below 1 reads as 1 and `per_page` is clamped to `1..=1000`.
/// The total comes from a COUNT over a copy of the query.
pub async fn paginate<T: FromRow>(
    query: &QueryBuilder<T>,
    db: &dyn QueryExecutor,
    page: u64,
    per_page: u64,
) -> Result<Paginated<T>> {
    let page = page.max(1);
    let per_page = clamp_per_page(per_page);
    let offset = (page - 1).saturating_mul(per_page);

    let total = query.count(db).await?;
    let data = query
        .clone()
        .limit(clamp_i64(per_page))
        .offset(clamp_i64(offset))
        .execute(db)
        .await?;

    let last_page = total.div_ceil(per_page).max(1);
    let has_more = page < last_page;
    let has_previous = page > 1;

    Ok(Paginated {
        data,
        meta: PageMeta {
            total,
            per_page,
            current_page: page,
            last_page,
            from: if total > 0 { offset + 1 } else { 0 },
            to: offset.saturating_add(per_page).min(total),
            has_more,
            has_previous,
        },
        links: PageLinks {
            first: 1,
            last: last_page,
            prev: has_previous.then(|| page - 1),
            next: has_more.then(|| page + 1),
        },
    })
}

/// Fetch one page plus one look-ahead row to learn whether more follow.
pub async fn simple_paginate<T: FromRow>(
    query: &QueryBuilder<T>,
    db: &dyn QueryExecutor,
    page: u64,
    per_page: u64,
) -> Result<SimplePage<T>> {
    let page = page.max(1);
    let per_page = clamp_per_page(per_page);
    let offset = (page - 1).saturating_mul(per_page);

    let mut data = query
        .clone()
        .limit(clamp_i64(per_page + 1))
        .offset(clamp_i64(offset))
        .execute(db)
        .await?;

    let has_more = data.len() as u64 > per_page;
    data.truncate(per_page as usize);

    Ok(SimplePage {
        data,
        has_more,
        page,
    })
}

/// Fetch rows with `cursor_field > cursor` in ascending order.
///
/// `next_cursor` is the cursor column of the last row returned, present only
/// when more rows follow.
pub async fn cursor_paginate<T: FromRow>(
    query: &QueryBuilder<T>,
    db: &dyn QueryExecutor,
    cursor: Option<Value>,
    per_page: u64,
    cursor_field: &str,
) -> Result<CursorPage<T>> {
    let per_page = clamp_per_page(per_page);

    let mut page = query.clone();
    if let Some(cursor) = cursor.filter(|c| !c.is_null()) {
        page = page.filter(cursor_field, Operator::Gt, cursor);
    }
    let mut rows = page
        .order_by(cursor_field, Order::Asc)
        .limit(clamp_i64(per_page + 1))
        .fetch_rows(db)
        .await?;

    let has_more = rows.len() as u64 > per_page;
    rows.truncate(per_page as usize);

    let next_cursor = if has_more {
        rows.last().and_then(|row| row.get(cursor_field)).cloned()
    } else {
        None
    };

    Ok(CursorPage {
        data: rows
            .into_iter()
            .map(T::from_row)
            .collect::<Result<Vec<_>>>()?,
        next_cursor,
        has_more,
    })
}

/// Page numbers to show around `current`: at most `max_visible`, sliding
/// with the current page and pinned at both ends.
pub fn page_numbers(current: u64, last: u64, max_visible: u64) -> Vec<u64> {
    if last <= max_visible {
        return (1..=last).collect();
    }

    let half = max_visible / 2;
    let mut start = current.saturating_sub(half).max(1);
    let mut end = current.saturating_add(half).min(last);

    if current <= half {
        start = 1;
        end = max_visible;
    } else if current >= last - half {
        start = last - max_visible + 1;
        end = last;
    }

    (start..=end).collect()
}

impl<M: Model> Record<M> {
    /// Paginate every record of `M`.
    pub async fn paginate(
        db: &dyn QueryExecutor,
        page: u64,
        per_page: u64,
    ) -> Result<Paginated<Self>> {
        paginate(&Self::query(), db, page, per_page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::test_support::MockDb;
    use crate::Row;

    fn rows(range: std::ops::Range<i64>) -> Vec<Row> {
        range.map(|id| row! { "id" => id }).collect()
    }

    #[tokio::test]
    async fn first_page_of_fifty() {
        let db = MockDb::new();
        db.push_rows(vec![row! { "aggregate" => 50 }]);
        db.push_rows(rows(1..11));

        let query = QueryBuilder::table("items");
        let page = paginate(&query, &db, 1, 10).await.unwrap();

        assert_eq!(page.meta.total, 50);
        assert_eq!(page.meta.last_page, 5);
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.meta.from, 1);
        assert_eq!(page.meta.to, 10);
        assert_eq!(page.links.next, Some(2));
        assert_eq!(page.links.prev, None);

        let log = db.log();
        assert_eq!(log[0].0, "SELECT COUNT(*) AS aggregate FROM items");
        assert_eq!(log[1].0, "SELECT * FROM items LIMIT 10 OFFSET 0");
        assert_eq!(query.limit_value(), None);
    }

    #[tokio::test]
    async fn last_page_of_fifty() {
        let db = MockDb::new();
        db.push_rows(vec![row! { "aggregate" => 50 }]);
        db.push_rows(rows(41..51));

        let page = paginate(&QueryBuilder::table("items"), &db, 5, 10).await.unwrap();
        assert_eq!(page.links.next, None);
        assert_eq!(page.links.prev, Some(4));
        assert!(!page.meta.has_more);
        assert_eq!(page.meta.from, 41);
        assert_eq!(page.meta.to, 50);
        assert_eq!(db.log()[1].0, "SELECT * FROM items LIMIT 10 OFFSET 40");
    }

    #[tokio::test]
    async fn empty_table_has_one_page() {
        let db = MockDb::new();
        db.push_rows(vec![row! { "aggregate" => 0 }]);

        let page = paginate(&QueryBuilder::table("items"), &db, 0, 0).await.unwrap();
        assert_eq!(page.meta.current_page, 1);
        assert_eq!(page.meta.per_page, 1);
        assert_eq!(page.meta.last_page, 1);
        assert_eq!(page.meta.from, 0);
        assert_eq!(page.meta.to, 0);
    }

    #[tokio::test]
    async fn simple_paginate_uses_look_ahead_row() {
        let db = MockDb::new();
        db.push_rows(rows(1..5));

        let page = simple_paginate(&QueryBuilder::table("items"), &db, 2, 3)
            .await
            .unwrap();
        assert!(page.has_more);
        assert_eq!(page.data.len(), 3);
        assert_eq!(db.log()[0].0, "SELECT * FROM items LIMIT 4 OFFSET 3");
    }

    #[tokio::test]
    async fn cursor_paginate_returns_next_cursor() {
        let db = MockDb::new();
        db.push_rows(rows(11..14));

        let query = QueryBuilder::table("items");
        let page = cursor_paginate(&query, &db, Some(Value::Int(10)), 2, "id")
            .await
            .unwrap();

        assert!(page.has_more);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.next_cursor, Some(Value::Int(12)));
        assert_eq!(
            db.log()[0],
            (
                "SELECT * FROM items WHERE id > ? ORDER BY id ASC LIMIT 3".to_string(),
                vec![Value::Int(10)]
            )
        );
    }

    #[tokio::test]
    async fn cursor_paginate_last_page_has_no_cursor() {
        let db = MockDb::new();
        db.push_rows(rows(1..2));
        let page = cursor_paginate(&QueryBuilder::table("items"), &db, None, 5, "id")
            .await
            .unwrap();
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn page_number_window() {
        assert_eq!(page_numbers(1, 5, 7), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_numbers(2, 20, 7), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(page_numbers(10, 20, 7), vec![7, 8, 9, 10, 11, 12, 13]);
        assert_eq!(page_numbers(19, 20, 7), vec![14, 15, 16, 17, 18, 19, 20]);
    }

    #[test]
    fn meta_serializes_camel_case() {
        let meta = PageMeta {
            total: 1,
            per_page: 15,
            current_page: 1,
            last_page: 1,
            from: 1,
            to: 1,
            has_more: false,
            has_previous: false,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["perPage"], 15);
        assert_eq!(json["hasPrevious"], false);
    }
}
