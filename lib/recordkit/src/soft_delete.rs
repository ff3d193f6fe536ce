//! Soft deletes: rows are hidden by a timestamp column instead of being removed.

use crate::record::equalities;
use crate::{OrmError, QueryBuilder, QueryExecutor, Record, Result, Row, SoftDeletes, Value};

impl<M: SoftDeletes> Record<M> {
    /// Query including soft-deleted rows.
    pub fn with_trashed() -> QueryBuilder<Self> {
        Self::unscoped()
    }

    /// Query only soft-deleted rows.
    pub fn only_trashed() -> QueryBuilder<Self> {
        Self::unscoped().scope(format!("{} IS NOT NULL", M::DELETED_AT))
    }

    /// Remove the row for good.
    pub async fn force_delete(&mut self, db: &dyn QueryExecutor) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }
        self.delete_row(db).await?;
        Ok(true)
    }

    /// Clear the deletion mark.
    pub async fn restore(&mut self, db: &dyn QueryExecutor) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }
        self.write_deleted_at(db, M::DELETED_AT, Value::Null).await?;
        Ok(true)
    }

    /// Clear the deletion mark on every row matching `filter`. Returns the affected count.
    pub async fn restore_many(db: &dyn QueryExecutor, filter: &Row) -> Result<u64> {
        if filter.is_empty() {
            return Err(OrmError::InvalidArgument(format!(
                "refusing to restore every row of {} without a filter",
                M::table_name()
            )));
        }

        let (predicate, params) = equalities(filter);
        let sql = format!(
            "UPDATE {} SET {} = NULL WHERE {predicate}",
            M::table_name(),
            M::DELETED_AT
        );
        Ok(db.execute(&sql, &params).await?.affected_rows)
    }

    pub fn is_trashed(&self) -> bool {
        self.get(M::DELETED_AT).is_some_and(|value| !value.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::test_support::MockDb;

    #[derive(crate::Model)]
    #[model(table = "posts", fillable(title), soft_delete)]
    struct Post;

    #[derive(crate::Model)]
    #[model(table = "notes", soft_delete = "archived_at")]
    struct Note;

    struct Manual;

    impl crate::Model for Manual {
        const SOFT_DELETE_COLUMN: Option<&'static str> = Some("removed_at");

        fn table_name() -> &'static str {
            "manual"
        }
    }

    impl SoftDeletes for Manual {}

    #[test]
    fn default_queries_exclude_trashed() {
        assert_eq!(
            Record::<Post>::query().compile().sql,
            "SELECT * FROM posts WHERE deleted_at IS NULL"
        );
        assert_eq!(Record::<Post>::with_trashed().compile().sql, "SELECT * FROM posts");
        assert_eq!(
            Record::<Note>::only_trashed().compile().sql,
            "SELECT * FROM notes WHERE archived_at IS NOT NULL"
        );
    }

    #[test]
    fn or_filters_cannot_leak_trashed_rows() {
        let sql = Record::<Post>::query()
            .eq("title", "a")
            .or_eq("title", "b")
            .compile()
            .sql;
        assert_eq!(
            sql,
            "SELECT * FROM posts WHERE deleted_at IS NULL AND (title = ? OR title = ?)"
        );
    }

    #[tokio::test]
    async fn delete_marks_and_restore_clears() {
        let db = MockDb::new();
        let mut post = Record::<Post>::hydrate(row! {
            "id" => 1, "title" => "t", "deleted_at" => Value::Null
        });
        assert!(!post.is_trashed());

        assert!(post.delete(&db).await.unwrap());
        assert!(post.exists());
        assert!(post.is_trashed());
        assert!(!post.is_dirty_model());

        assert!(post.restore(&db).await.unwrap());
        assert!(!post.is_trashed());

        let log = db.log();
        assert_eq!(log[0].0, "UPDATE posts SET deleted_at = ? WHERE id = ?");
        assert!(matches!(log[0].1[0], Value::Datetime(_)));
        assert_eq!(log[1].0, "UPDATE posts SET deleted_at = ? WHERE id = ?");
        assert_eq!(log[1].1, vec![Value::Null, Value::Int(1)]);
    }

    #[tokio::test]
    async fn hand_written_impl_uses_one_column_everywhere() {
        assert_eq!(
            Record::<Manual>::query().compile().sql,
            "SELECT * FROM manual WHERE removed_at IS NULL"
        );
        assert_eq!(
            Record::<Manual>::only_trashed().compile().sql,
            "SELECT * FROM manual WHERE removed_at IS NOT NULL"
        );

        let db = MockDb::new();
        let mut record = Record::<Manual>::hydrate(row! { "id" => 9 });
        assert!(record.delete(&db).await.unwrap());
        assert!(record.exists());
        assert!(record.is_trashed());
        assert!(record.restore(&db).await.unwrap());
        assert!(!record.is_trashed());

        assert_eq!(
            db.statements(),
            vec![
                "UPDATE manual SET removed_at = ? WHERE id = ?",
                "UPDATE manual SET removed_at = ? WHERE id = ?",
            ]
        );
    }

    #[tokio::test]
    async fn force_delete_removes_row() {
        let db = MockDb::new();
        let mut note = Record::<Note>::hydrate(row! { "id" => 4 });
        assert!(note.force_delete(&db).await.unwrap());
        assert!(!note.exists());
        assert_eq!(db.statements(), vec!["DELETE FROM notes WHERE id = ?"]);
    }

    #[tokio::test]
    async fn restore_many_requires_filter() {
        let db = MockDb::new();
        assert!(Record::<Post>::restore_many(&db, &Row::new()).await.is_err());

        db.push_exec(2, None);
        let restored = Record::<Post>::restore_many(&db, &row! { "title" => "t" })
            .await
            .unwrap();
        assert_eq!(restored, 2);
        assert_eq!(
            db.statements(),
            vec!["UPDATE posts SET deleted_at = NULL WHERE title = ?"]
        );
    }
}
