//! Active records: one table row with change tracking.

use std::fmt;
use std::marker::PhantomData;

use serde::{Serialize, Serializer};

use crate::model::{cast_row, fillable_data};
use crate::{FromRow, Model, OrmError, QueryBuilder, QueryExecutor, Result, Row, Value};

/// Rows per multi-row INSERT statement.
pub const INSERT_BATCH_SIZE: usize = 1000;

/// A row of `M`'s table plus the snapshot it was loaded or saved with.
///
/// A record starts transient (`exists() == false`) and becomes persisted
/// when saved or hydrated from a query. `dirty` is set by every explicit
/// mutation and is independent of whether values actually changed; the
/// per-column diff against the snapshot is [`get_dirty`](Self::get_dirty).
pub struct Record<M: Model> {
    attributes: Row,
    original: Row,
    exists: bool,
    dirty: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for Record<M> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            original: self.original.clone(),
            exists: self.exists,
            dirty: self.dirty,
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &M::table_name())
            .field("attributes", &self.attributes)
            .field("exists", &self.exists)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<M: Model> Default for Record<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes as [`Record::to_json`].
impl<M: Model> Serialize for Record<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<M: Model> FromRow for Record<M> {
    fn from_row(row: Row) -> Result<Self> {
        Ok(Self::hydrate(row))
    }
}

impl<M: Model> Record<M> {
    /// An empty transient record.
    pub fn new() -> Self {
        Self {
            attributes: Row::new(),
            original: Row::new(),
            exists: false,
            dirty: false,
            _model: PhantomData,
        }
    }

    /// A transient record filled with the mass-assignable part of `data`.
    pub fn from_data(data: Row) -> Self {
        let mut record = Self::new();
        record.fill(data);
        record
    }

    /// A persisted record built from a fetched row, with casts applied.
    pub fn hydrate(row: Row) -> Self {
        let mut record = Self::new();
        record.load(row);
        record
    }

    /// Query `M`'s table. Soft-deleted rows are excluded for soft-delete models.
    pub fn query() -> QueryBuilder<Self> {
        let query = Self::unscoped();
        match M::SOFT_DELETE_COLUMN {
            Some(column) => query.scope(format!("{column} IS NULL")),
            None => query,
        }
    }

    pub(crate) fn unscoped() -> QueryBuilder<Self> {
        QueryBuilder::for_table(M::table_name())
    }

    pub async fn find(db: &dyn QueryExecutor, id: impl Into<Value>) -> Result<Option<Self>> {
        Self::query().eq(M::primary_key(), id).first(db).await
    }

    pub async fn find_or_fail(db: &dyn QueryExecutor, id: impl Into<Value>) -> Result<Self> {
        let id = id.into();
        match Self::find(db, id.clone()).await? {
            Some(record) => Ok(record),
            None => Err(OrmError::NotFound {
                table: M::table_name().to_string(),
                key: id.to_string(),
            }),
        }
    }

    /// Fetch every record whose key is in `ids`. An empty list issues no query.
    pub async fn find_many<I, V>(db: &dyn QueryExecutor, ids: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Self::query()
            .where_in(M::primary_key(), ids)
            .execute(db)
            .await
    }

    pub async fn all(db: &dyn QueryExecutor) -> Result<Vec<Self>> {
        Self::query().execute(db).await
    }

    /// Build a record from `data`, insert it, and return it with its key.
    pub async fn create(db: &dyn QueryExecutor, data: Row) -> Result<Self> {
        let mut record = Self::from_data(data);
        record.save(db).await?;
        Ok(record)
    }

    /// Insert many rows with multi-row INSERTs of up to [`INSERT_BATCH_SIZE`].
    ///
    /// Every row must have the same mass-assignable columns as the first.
    /// Returns the total number of rows inserted.
    pub async fn insert<I>(db: &dyn QueryExecutor, rows: I) -> Result<u64>
    where
        I: IntoIterator<Item = Row>,
    {
        let rows: Vec<Row> = rows.into_iter().map(|row| fillable_data::<M>(&row)).collect();
        let Some(first) = rows.first() else {
            return Ok(0);
        };

        let columns: Vec<String> = first.keys().map(str::to_string).collect();
        if columns.is_empty() {
            return Err(OrmError::InvalidArgument(format!(
                "no fillable columns to insert into {}",
                M::table_name()
            )));
        }
        for (i, row) in rows.iter().enumerate() {
            let uniform = row.len() == columns.len()
                && columns.iter().all(|column| row.contains_key(column));
            if !uniform {
                return Err(OrmError::InvalidArgument(format!(
                    "row {i} has different columns than the first row"
                )));
            }
        }

        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let mut inserted = 0;
        for batch in rows.chunks(INSERT_BATCH_SIZE) {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                M::table_name(),
                columns.join(", "),
                vec![row_placeholders.as_str(); batch.len()].join(", ")
            );
            let params: Vec<Value> = batch
                .iter()
                .flat_map(|row| {
                    columns
                        .iter()
                        .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                })
                .collect();

            let result = db.execute(&sql, &params).await?;
            tracing::debug!(
                table = M::table_name(),
                rows = batch.len(),
                "inserted batch"
            );
            inserted += result.affected_rows;
        }
        Ok(inserted)
    }

    /// Insert one row and return the generated key, if the table has one.
    pub async fn insert_get_id(db: &dyn QueryExecutor, data: Row) -> Result<Option<u64>> {
        insert_row(db, M::table_name(), &fillable_data::<M>(&data)).await
    }

    /// `UPDATE ... SET` the mass-assignable part of `data` on rows matching
    /// every `column = value` pair in `filter`. An empty filter updates every row.
    pub async fn update_where(db: &dyn QueryExecutor, data: Row, filter: &Row) -> Result<u64> {
        let data = fillable_data::<M>(&data);
        if data.is_empty() {
            return Err(OrmError::InvalidArgument(format!(
                "no fillable columns to update in {}",
                M::table_name()
            )));
        }

        let (set_clause, mut params) = assignments(&data);
        let mut sql = format!("UPDATE {} SET {set_clause}", M::table_name());
        if !filter.is_empty() {
            let (predicate, filter_params) = equalities(filter);
            sql.push_str(&format!(" WHERE {predicate}"));
            params.extend(filter_params);
        }

        Ok(db.execute(&sql, &params).await?.affected_rows)
    }

    /// Delete rows matching every `column = value` pair in `filter`.
    ///
    /// Always removes rows, also for soft-delete models. An empty filter is rejected.
    pub async fn delete_where(db: &dyn QueryExecutor, filter: &Row) -> Result<u64> {
        if filter.is_empty() {
            return Err(OrmError::InvalidArgument(format!(
                "refusing to delete from {} without a filter",
                M::table_name()
            )));
        }

        let (predicate, params) = equalities(filter);
        let sql = format!("DELETE FROM {} WHERE {predicate}", M::table_name());
        Ok(db.execute(&sql, &params).await?.affected_rows)
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// True after any explicit mutation, or when values differ from the snapshot.
    pub fn is_dirty_model(&self) -> bool {
        self.dirty || !self.get_dirty().is_empty()
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    pub fn original(&self) -> &Row {
        &self.original
    }

    pub fn into_attributes(self) -> Row {
        self.attributes
    }

    /// The primary key value, if set.
    pub fn key(&self) -> Option<&Value> {
        self.attributes
            .get(M::primary_key())
            .filter(|value| !value.is_null())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    /// Set one attribute. Marks the record dirty even when the value is unchanged.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(column, value);
        self.dirty = true;
        self
    }

    /// Merge the mass-assignable part of `data` into the attributes.
    pub fn fill(&mut self, data: Row) -> &mut Self {
        self.attributes.merge(fillable_data::<M>(&data));
        self.dirty = true;
        self
    }

    /// Columns whose value differs from the snapshot, with their current values.
    pub fn get_dirty(&self) -> Row {
        self.attributes
            .iter()
            .filter(|(column, value)| self.original.get(column) != Some(*value))
            .map(|(column, value)| (column, value.clone()))
            .collect()
    }

    /// Insert a transient record or update the changed columns of a persisted one.
    pub async fn save(&mut self, db: &dyn QueryExecutor) -> Result<()> {
        if self.exists {
            let changed = self.get_dirty();
            if changed.is_empty() {
                self.dirty = false;
                return Ok(());
            }

            let key = self.require_key()?;
            let (set_clause, mut params) = assignments(&changed);
            params.push(key);
            let sql = format!(
                "UPDATE {} SET {set_clause} WHERE {} = ?",
                M::table_name(),
                M::primary_key()
            );
            db.execute(&sql, &params).await?;
        } else {
            let data = fillable_data::<M>(&self.attributes);
            if let Some(id) = insert_row(db, M::table_name(), &data).await? {
                self.attributes.insert(M::primary_key(), id);
            }
            self.exists = true;
        }

        self.original = self.attributes.clone();
        self.dirty = false;
        Ok(())
    }

    /// Remove the record's row, or mark it deleted for soft-delete models.
    ///
    /// Returns false without issuing a statement when the record is not persisted.
    pub async fn delete(&mut self, db: &dyn QueryExecutor) -> Result<bool> {
        if !self.exists {
            return Ok(false);
        }
        match M::SOFT_DELETE_COLUMN {
            Some(column) => self.mark_deleted(db, column).await?,
            None => self.delete_row(db).await?,
        }
        Ok(true)
    }

    pub(crate) async fn delete_row(&mut self, db: &dyn QueryExecutor) -> Result<()> {
        let key = self.require_key()?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            M::table_name(),
            M::primary_key()
        );
        db.execute(&sql, &[key]).await?;
        self.exists = false;
        Ok(())
    }

    /// Set the soft-delete column of this row to `value` and mirror it locally.
    pub(crate) async fn write_deleted_at(
        &mut self,
        db: &dyn QueryExecutor,
        column: &str,
        value: Value,
    ) -> Result<()> {
        let key = self.require_key()?;
        let sql = format!(
            "UPDATE {} SET {column} = ? WHERE {} = ?",
            M::table_name(),
            M::primary_key()
        );
        db.execute(&sql, &[value.clone(), key]).await?;
        self.attributes.insert(column, value.clone());
        self.original.insert(column, value);
        Ok(())
    }

    async fn mark_deleted(&mut self, db: &dyn QueryExecutor, column: &str) -> Result<()> {
        self.write_deleted_at(db, column, Value::Datetime(crate::time::now()))
            .await
    }

    /// Reload the row from the database.
    ///
    /// Returns false, leaving the record untouched, when it is not persisted
    /// or its row no longer exists. Soft-deleted rows still reload.
    pub async fn refresh(&mut self, db: &dyn QueryExecutor) -> Result<bool> {
        if !self.exists {
            return Ok(false);
        }
        let key = self.require_key()?;
        let Some(row) = Self::unscoped()
            .cast::<Row>()
            .eq(M::primary_key(), key)
            .first(db)
            .await?
        else {
            return Ok(false);
        };
        self.load(row);
        Ok(true)
    }

    /// Attributes as JSON with hidden columns removed.
    pub fn to_json(&self) -> serde_json::Value {
        let mut visible = self.attributes.clone();
        for column in M::hidden() {
            visible.remove(column);
        }
        visible.to_json()
    }

    fn load(&mut self, row: Row) {
        self.attributes = cast_row::<M>(row);
        self.original = self.attributes.clone();
        self.exists = true;
        self.dirty = false;
    }

    fn require_key(&self) -> Result<Value> {
        self.key().cloned().ok_or_else(|| {
            OrmError::InvalidArgument(format!(
                "{} record has no {} value",
                M::table_name(),
                M::primary_key()
            ))
        })
    }
}

/// `INSERT` one row and return its generated key.
async fn insert_row(db: &dyn QueryExecutor, table: &str, data: &Row) -> Result<Option<u64>> {
    if data.is_empty() {
        return Err(OrmError::InvalidArgument(format!(
            "no fillable columns to insert into {table}"
        )));
    }
    let columns: Vec<&str> = data.keys().collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        vec!["?"; columns.len()].join(", ")
    );
    let params: Vec<Value> = data.values().cloned().collect();
    Ok(db.execute(&sql, &params).await?.last_insert_id)
}

/// `a = ?, b = ?` plus the values in column order.
fn assignments(data: &Row) -> (String, Vec<Value>) {
    let clause = data
        .keys()
        .map(|column| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    (clause, data.values().cloned().collect())
}

/// `a = ? AND b = ?` plus the values in column order.
pub(crate) fn equalities(filter: &Row) -> (String, Vec<Value>) {
    let clause = filter
        .keys()
        .map(|column| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    (clause, filter.values().cloned().collect())
}
