//! Repository facade over a model's records.
//!
//! Filters given as a [`Row`] match every `column = value` pair. All reads go
//! through [`Record::query`], so soft-deleted rows stay hidden.

use std::future::Future;
use std::marker::PhantomData;
use std::ops::ControlFlow;

use crate::paginator::{Paginated, paginate};
use crate::{Model, QueryBuilder, QueryExecutor, Record, Result, Row, Value};

pub struct Repository<'a, M: Model> {
    db: &'a dyn QueryExecutor,
    _model: PhantomData<fn() -> M>,
}

impl<'a, M: Model> Repository<'a, M> {
    pub fn new(db: &'a dyn QueryExecutor) -> Self {
        Self {
            db,
            _model: PhantomData,
        }
    }

    /// A fresh query over the model's visible rows.
    pub fn query(&self) -> QueryBuilder<Record<M>> {
        Record::<M>::query()
    }

    fn query_where(&self, filter: Option<&Row>) -> QueryBuilder<Record<M>> {
        let mut query = self.query();
        for (column, value) in filter.into_iter().flat_map(Row::iter) {
            query = query.eq(column, value);
        }
        query
    }

    pub async fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<Record<M>>> {
        Record::<M>::find(self.db, id).await
    }

    pub async fn find_all(&self) -> Result<Vec<Record<M>>> {
        Record::<M>::all(self.db).await
    }

    pub async fn find_by(
        &self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Record<M>>> {
        self.query().eq(column, value).first(self.db).await
    }

    pub async fn find_many<I, V>(&self, ids: I) -> Result<Vec<Record<M>>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Record::<M>::find_many(self.db, ids).await
    }

    pub async fn find_many_by(
        &self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Record<M>>> {
        self.query().eq(column, value).execute(self.db).await
    }

    pub async fn find_where(&self, filter: &Row) -> Result<Vec<Record<M>>> {
        self.query_where(Some(filter)).execute(self.db).await
    }

    pub async fn find_one_where(&self, filter: &Row) -> Result<Option<Record<M>>> {
        self.query_where(Some(filter)).first(self.db).await
    }

    pub async fn first(&self, filter: Option<&Row>) -> Result<Option<Record<M>>> {
        self.query_where(filter).first(self.db).await
    }

    pub async fn create(&self, data: Row) -> Result<Record<M>> {
        Record::<M>::create(self.db, data).await
    }

    /// Batch-insert rows. Returns the number inserted.
    pub async fn create_many(&self, rows: Vec<Row>) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        Record::<M>::insert(self.db, rows).await
    }

    /// Load, fill and save one record. `None` when no record has `id`.
    pub async fn update(&self, id: impl Into<Value>, data: Row) -> Result<Option<Record<M>>> {
        let Some(mut record) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        record.fill(data);
        record.save(self.db).await?;
        Ok(Some(record))
    }

    pub async fn update_many(&self, filter: &Row, data: Row) -> Result<u64> {
        Record::<M>::update_where(self.db, data, filter).await
    }

    /// Delete the record with `id`. False when there is no such record.
    pub async fn delete(&self, id: impl Into<Value>) -> Result<bool> {
        match self.find_by_id(id).await? {
            Some(mut record) => record.delete(self.db).await,
            None => Ok(false),
        }
    }

    pub async fn delete_many(&self, filter: &Row) -> Result<u64> {
        Record::<M>::delete_where(self.db, filter).await
    }

    pub async fn count(&self, filter: Option<&Row>) -> Result<u64> {
        self.query_where(filter).count(self.db).await
    }

    pub async fn exists(&self, filter: &Row) -> Result<bool> {
        Ok(self.count(Some(filter)).await? > 0)
    }

    pub async fn paginate(&self, page: u64, per_page: u64) -> Result<Paginated<Record<M>>> {
        paginate(&self.query(), self.db, page, per_page).await
    }

    pub async fn paginate_where(
        &self,
        filter: &Row,
        page: u64,
        per_page: u64,
    ) -> Result<Paginated<Record<M>>> {
        paginate(&self.query_where(Some(filter)), self.db, page, per_page).await
    }

    pub async fn sum(&self, column: &str, filter: Option<&Row>) -> Result<f64> {
        self.query_where(filter).sum(self.db, column).await
    }

    pub async fn avg(&self, column: &str, filter: Option<&Row>) -> Result<f64> {
        self.query_where(filter).avg(self.db, column).await
    }

    pub async fn min(&self, column: &str, filter: Option<&Row>) -> Result<f64> {
        self.query_where(filter).min(self.db, column).await
    }

    pub async fn max(&self, column: &str, filter: Option<&Row>) -> Result<f64> {
        self.query_where(filter).max(self.db, column).await
    }

    /// Visit every record in pages of `size`. Returns the number of pages visited.
    pub async fn chunk<F, Fut>(&self, size: u64, callback: F) -> Result<u64>
    where
        F: FnMut(Vec<Record<M>>, u64) -> Fut,
        Fut: Future<Output = ControlFlow<()>>,
    {
        self.query().chunk(self.db, size, callback).await
    }

    pub async fn pluck(&self, column: &str, filter: Option<&Row>) -> Result<Vec<Value>> {
        self.query_where(filter).pluck(self.db, column).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::test_support::MockDb;

    #[derive(crate::Model)]
    #[model(table = "products", fillable(name, price), casts(price = "number"), soft_delete)]
    struct Product;

    #[tokio::test]
    async fn filtered_reads_are_scoped_and_anded() {
        let db = MockDb::new();
        db.push_rows(vec![row! { "id" => 1, "name" => "pen", "price" => "2.50" }]);
        let repo = Repository::<Product>::new(&db);

        let found = repo
            .find_where(&row! { "name" => "pen", "price" => 2.5 })
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("price"), Some(&Value::Float(2.5)));
        assert_eq!(
            db.log()[0],
            (
                "SELECT * FROM products WHERE deleted_at IS NULL AND (name = ? AND price = ?)"
                    .to_string(),
                vec![Value::from("pen"), Value::Float(2.5)]
            )
        );
    }

    #[tokio::test]
    async fn count_and_exists() {
        let db = MockDb::new();
        db.push_rows(vec![row! { "aggregate" => 3 }]);
        db.push_rows(vec![row! { "aggregate" => 0 }]);
        let repo = Repository::<Product>::new(&db);

        assert_eq!(repo.count(None).await.unwrap(), 3);
        assert!(!repo.exists(&row! { "name" => "ghost" }).await.unwrap());
        assert_eq!(
            db.statements()[0],
            "SELECT COUNT(*) AS aggregate FROM products WHERE deleted_at IS NULL"
        );
    }

    #[tokio::test]
    async fn update_missing_record_returns_none() {
        let db = MockDb::new();
        let repo = Repository::<Product>::new(&db);
        assert!(repo.update(9, row! { "name" => "x" }).await.unwrap().is_none());
        assert!(!repo.delete(9).await.unwrap());
        assert_eq!(db.log().len(), 2);
    }

    #[tokio::test]
    async fn update_fills_and_saves_changes() {
        let db = MockDb::new();
        db.push_rows(vec![row! { "id" => 4, "name" => "pen", "price" => 2 }]);
        let repo = Repository::<Product>::new(&db);

        let updated = repo
            .update(4, row! { "price" => 3, "id" => 99 })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.key(), Some(&Value::Int(4)));
        assert_eq!(db.statements()[1], "UPDATE products SET price = ? WHERE id = ?");
    }

    #[tokio::test]
    async fn delete_soft_deletes() {
        let db = MockDb::new();
        db.push_rows(vec![row! { "id" => 4, "deleted_at" => Value::Null }]);
        let repo = Repository::<Product>::new(&db);

        assert!(repo.delete(4).await.unwrap());
        assert_eq!(
            db.statements()[1],
            "UPDATE products SET deleted_at = ? WHERE id = ?"
        );
    }

    #[tokio::test]
    async fn create_many_skips_empty_input() {
        let db = MockDb::new();
        let repo = Repository::<Product>::new(&db);
        assert_eq!(repo.create_many(Vec::new()).await.unwrap(), 0);
        assert!(db.log().is_empty());
    }

    #[tokio::test]
    async fn chunk_walks_records() {
        let db = MockDb::new();
        db.push_rows(vec![row! { "id" => 1 }, row! { "id" => 2 }]);
        db.push_rows(vec![row! { "id" => 3 }]);
        let repo = Repository::<Product>::new(&db);

        let mut total = 0;
        let pages = repo
            .chunk(2, |records, _| {
                total += records.len();
                async { ControlFlow::Continue(()) }
            })
            .await
            .unwrap();
        assert_eq!(pages, 2);
        assert_eq!(total, 3);
    }
}
