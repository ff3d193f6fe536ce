//! Fluent SELECT builder compiling to MySQL-dialect SQL with `?` placeholders.
//!
//! Clause methods take and return the builder by value, so a chain never
//! aliases another builder's state. Bound values are collected eagerly in the
//! order clauses are added; that order is the placeholder order of
//! [`QueryBuilder::compile`].

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::str::FromStr;

use crate::{FromRow, OrmError, QueryExecutor, Result, Row, Value};

/// MySQL accepts `LIMIT` with `OFFSET` only; this is its documented "all rows" limit.
const UNBOUNDED_LIMIT: u64 = u64::MAX;

/// Comparison operators accepted in WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    NotEq,
    Lt,
    Gt,
    Lte,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(match normalized.to_ascii_uppercase().as_str() {
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            "<>" => Operator::NotEq,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Lte,
            ">=" => Operator::Gte,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "BETWEEN" => Operator::Between,
            "IS NULL" => Operator::IsNull,
            "IS NOT NULL" => Operator::IsNotNull,
            _ => {
                return Err(OrmError::InvalidArgument(format!(
                    "unknown operator: {s}"
                )));
            }
        })
    }
}

/// How a clause attaches to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    fn as_sql(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

/// One WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// Column name, or the whole predicate for raw clauses.
    pub field: String,
    /// `None` marks a raw predicate rendered verbatim.
    pub operator: Option<Operator>,
    /// Number of parameters this clause contributed.
    pub placeholders: usize,
    pub logic: Logic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Cross => "CROSS",
        }
    }
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinKind,
    /// The table to join.
    pub table: String,
    /// ON predicate; empty for cross joins.
    pub on: String,
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// An ORDER BY term. Raw expressions carry no direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    pub expr: String,
    pub direction: Option<Order>,
}

/// SQL text plus the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A SELECT query builder for one table.
///
/// `T` is what terminal methods decode rows into: [`Row`] by default, or a
/// hydrated [`Record`](crate::Record) when obtained from a model.
pub struct QueryBuilder<T = Row> {
    table: String,
    select: Vec<String>,
    scopes: Vec<String>,
    wheres: Vec<WhereClause>,
    joins: Vec<JoinClause>,
    orders: Vec<OrderClause>,
    group_by: Vec<String>,
    having: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    params: Vec<Value>,
    distinct: bool,
    for_update: bool,
    lock_in_share_mode: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for QueryBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            select: self.select.clone(),
            scopes: self.scopes.clone(),
            wheres: self.wheres.clone(),
            joins: self.joins.clone(),
            orders: self.orders.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            limit: self.limit,
            offset: self.offset,
            params: self.params.clone(),
            distinct: self.distinct,
            for_update: self.for_update,
            lock_in_share_mode: self.lock_in_share_mode,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for QueryBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compiled = self.compile();
        f.debug_struct("QueryBuilder")
            .field("sql", &compiled.sql)
            .field("params", &compiled.params)
            .finish()
    }
}

impl QueryBuilder<Row> {
    /// Create a new query for `table` returning raw rows.
    pub fn table(table: impl Into<String>) -> Self {
        Self::for_table(table)
    }
}

impl<T> QueryBuilder<T> {
    /// Create a new query with an explicit table name.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: vec!["*".to_string()],
            scopes: Vec::new(),
            wheres: Vec::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            group_by: Vec::new(),
            having: None,
            limit: None,
            offset: None,
            params: Vec::new(),
            distinct: false,
            for_update: false,
            lock_in_share_mode: false,
            _marker: PhantomData,
        }
    }

    /// Reinterpret the rows this query produces.
    pub fn cast<U>(self) -> QueryBuilder<U> {
        QueryBuilder {
            table: self.table,
            select: self.select,
            scopes: self.scopes,
            wheres: self.wheres,
            joins: self.joins,
            orders: self.orders,
            group_by: self.group_by,
            having: self.having,
            limit: self.limit,
            offset: self.offset,
            params: self.params,
            distinct: self.distinct,
            for_update: self.for_update,
            lock_in_share_mode: self.lock_in_share_mode,
            _marker: PhantomData,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// Replace the selected columns. No columns selects `*`.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.select = if fields.is_empty() {
            vec!["*".to_string()]
        } else {
            fields
        };
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a condition that is always ANDed ahead of every other clause.
    ///
    /// Scopes bind no parameters; model defaults such as soft-delete
    /// filtering use them so that a later `or_filter` cannot widen them.
    pub fn scope(mut self, condition: impl Into<String>) -> Self {
        self.scopes.push(condition.into());
        self
    }

    /// Add a condition joined with AND.
    ///
    /// `IN`/`NOT IN` bind each element of a [`Value::List`] (a scalar binds
    /// as a one-element list). `BETWEEN` binds the first two elements of a
    /// list, padding with NULL. `IS NULL`/`IS NOT NULL` ignore `value`.
    pub fn filter(
        self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.push_condition(Logic::And, field.into(), operator, value.into())
    }

    /// Add a condition joined with OR.
    pub fn or_filter(
        self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.push_condition(Logic::Or, field.into(), operator, value.into())
    }

    /// Add an equality filter.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, Operator::Eq, value)
    }

    pub fn or_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.or_filter(field, Operator::Eq, value)
    }

    pub fn where_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_list(Logic::And, field.into(), Operator::In, collect(values))
    }

    pub fn or_where_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_list(Logic::Or, field.into(), Operator::In, collect(values))
    }

    pub fn where_not_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_list(Logic::And, field.into(), Operator::NotIn, collect(values))
    }

    pub fn or_where_not_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_list(Logic::Or, field.into(), Operator::NotIn, collect(values))
    }

    /// `field BETWEEN ? AND ?`, binding `min` then `max`.
    pub fn where_between(
        self,
        field: impl Into<String>,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Self {
        self.push_between(Logic::And, field.into(), min.into(), max.into())
    }

    pub fn or_where_between(
        self,
        field: impl Into<String>,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Self {
        self.push_between(Logic::Or, field.into(), min.into(), max.into())
    }

    pub fn where_null(self, field: impl Into<String>) -> Self {
        self.push_condition(Logic::And, field.into(), Operator::IsNull, Value::Null)
    }

    pub fn or_where_null(self, field: impl Into<String>) -> Self {
        self.push_condition(Logic::Or, field.into(), Operator::IsNull, Value::Null)
    }

    pub fn where_not_null(self, field: impl Into<String>) -> Self {
        self.push_condition(Logic::And, field.into(), Operator::IsNotNull, Value::Null)
    }

    pub fn or_where_not_null(self, field: impl Into<String>) -> Self {
        self.push_condition(Logic::Or, field.into(), Operator::IsNotNull, Value::Null)
    }

    /// Add a raw predicate with its own `?` bindings.
    ///
    /// The caller guarantees `sql` contains exactly `bindings.len()` placeholders.
    pub fn where_raw<I, V>(self, sql: impl Into<String>, bindings: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_raw(Logic::And, sql.into(), collect(bindings))
    }

    pub fn or_where_raw<I, V>(self, sql: impl Into<String>, bindings: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_raw(Logic::Or, sql.into(), collect(bindings))
    }

    /// Add an INNER JOIN.
    pub fn join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.push_join(JoinKind::Inner, table.into(), on.into())
    }

    pub fn left_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.push_join(JoinKind::Left, table.into(), on.into())
    }

    pub fn right_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.push_join(JoinKind::Right, table.into(), on.into())
    }

    pub fn cross_join(self, table: impl Into<String>) -> Self {
        self.push_join(JoinKind::Cross, table.into(), String::new())
    }

    /// Add an order-by clause.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.orders.push(OrderClause {
            expr: field.into(),
            direction: Some(order),
        });
        self
    }

    /// Add an ORDER BY expression rendered verbatim.
    pub fn order_by_raw(mut self, expr: impl Into<String>) -> Self {
        self.orders.push(OrderClause {
            expr: expr.into(),
            direction: None,
        });
        self
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the HAVING condition, replacing any previous one.
    pub fn having(mut self, condition: impl Into<String>) -> Self {
        self.having = Some(condition.into());
        self
    }

    /// Set the maximum number of results. Negative values clamp to 0.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.max(0) as u64);
        self
    }

    /// Set the offset for pagination. Negative values clamp to 0.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset.max(0) as u64);
        self
    }

    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    pub fn lock_in_share_mode(mut self) -> Self {
        self.lock_in_share_mode = true;
        self
    }

    /// Render the query. Pure: the same builder always compiles identically.
    pub fn compile(&self) -> CompiledQuery {
        let mut parts: Vec<String> = vec!["SELECT".to_string()];
        if self.distinct {
            parts.push("DISTINCT".to_string());
        }
        parts.push(self.select.join(", "));
        parts.push(format!("FROM {}", self.table));

        for join in &self.joins {
            match join.kind {
                JoinKind::Cross => parts.push(format!("CROSS JOIN {}", join.table)),
                kind => parts.push(format!(
                    "{} JOIN {} ON {}",
                    kind.as_sql(),
                    join.table,
                    join.on
                )),
            }
        }

        if let Some(where_clause) = self.build_where_clause() {
            parts.push(where_clause);
        }

        if !self.group_by.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }

        if let Some(having) = &self.having {
            parts.push(format!("HAVING {having}"));
        }

        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|o| match o.direction {
                    Some(dir) => format!("{} {}", o.expr, dir.as_sql()),
                    None => o.expr.clone(),
                })
                .collect();
            parts.push(format!("ORDER BY {}", orders.join(", ")));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => parts.push(format!("LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => parts.push(format!("LIMIT {limit}")),
            (None, Some(offset)) => {
                parts.push(format!("LIMIT {UNBOUNDED_LIMIT} OFFSET {offset}"))
            }
            (None, None) => {}
        }

        if self.for_update {
            parts.push("FOR UPDATE".to_string());
        } else if self.lock_in_share_mode {
            parts.push("LOCK IN SHARE MODE".to_string());
        }

        CompiledQuery {
            sql: parts.join(" "),
            params: self.params.clone(),
        }
    }

    /// Run the query and return the undecoded rows.
    pub async fn fetch_rows(&self, db: &dyn QueryExecutor) -> Result<Vec<Row>> {
        let compiled = self.compile();
        db.query(&compiled.sql, &compiled.params).await
    }

    /// Count matching rows. DISTINCT is dropped for the count.
    pub async fn count(&self, db: &dyn QueryExecutor) -> Result<u64> {
        let mut query = self.clone();
        query.distinct = false;
        let n = query.aggregate(db, "COUNT(*)").await?;
        Ok(n.max(0.0) as u64)
    }

    pub async fn sum(&self, db: &dyn QueryExecutor, field: &str) -> Result<f64> {
        self.aggregate(db, &format!("SUM({field})")).await
    }

    pub async fn avg(&self, db: &dyn QueryExecutor, field: &str) -> Result<f64> {
        self.aggregate(db, &format!("AVG({field})")).await
    }

    pub async fn min(&self, db: &dyn QueryExecutor, field: &str) -> Result<f64> {
        self.aggregate(db, &format!("MIN({field})")).await
    }

    pub async fn max(&self, db: &dyn QueryExecutor, field: &str) -> Result<f64> {
        self.aggregate(db, &format!("MAX({field})")).await
    }

    pub async fn exists(&self, db: &dyn QueryExecutor) -> Result<bool> {
        Ok(self.count(db).await? > 0)
    }

    /// Select only `field` and return that column.
    pub async fn pluck(&self, db: &dyn QueryExecutor, field: &str) -> Result<Vec<Value>> {
        let query = self.clone().select([field]);
        let rows = query.fetch_rows(db).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                row.get(field)
                    .or_else(|| row.values().next())
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect())
    }

    /// Iterate the result set in pages of `size` rows.
    pub fn chunks(&self, size: u64) -> Chunks<T> {
        Chunks {
            query: self.clone(),
            size: size.max(1),
            page: 0,
            done: false,
        }
    }

    async fn aggregate(&self, db: &dyn QueryExecutor, expr: &str) -> Result<f64> {
        let mut query = self.clone();
        query.select = vec![format!("{expr} AS aggregate")];
        let rows = query.fetch_rows(db).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("aggregate").or_else(|| row.values().next()))
            .and_then(Value::as_f64)
            .unwrap_or(0.0))
    }

    fn push_condition(
        mut self,
        logic: Logic,
        field: String,
        operator: Operator,
        value: Value,
    ) -> Self {
        match operator {
            Operator::IsNull | Operator::IsNotNull => {
                self.wheres.push(WhereClause {
                    field,
                    operator: Some(operator),
                    placeholders: 0,
                    logic,
                });
                self
            }
            Operator::In | Operator::NotIn => {
                let values = match value {
                    Value::List(values) => values,
                    scalar => vec![scalar],
                };
                self.push_list(logic, field, operator, values)
            }
            Operator::Between => {
                let mut bounds = match value {
                    Value::List(values) => values.into_iter(),
                    scalar => vec![scalar].into_iter(),
                };
                let min = bounds.next().unwrap_or(Value::Null);
                let max = bounds.next().unwrap_or(Value::Null);
                self.push_between(logic, field, min, max)
            }
            _ => {
                self.wheres.push(WhereClause {
                    field,
                    operator: Some(operator),
                    placeholders: 1,
                    logic,
                });
                self.params.push(value);
                self
            }
        }
    }

    fn push_list(
        mut self,
        logic: Logic,
        field: String,
        operator: Operator,
        values: Vec<Value>,
    ) -> Self {
        self.wheres.push(WhereClause {
            field,
            operator: Some(operator),
            placeholders: values.len(),
            logic,
        });
        self.params.extend(values);
        self
    }

    fn push_between(mut self, logic: Logic, field: String, min: Value, max: Value) -> Self {
        self.wheres.push(WhereClause {
            field,
            operator: Some(Operator::Between),
            placeholders: 2,
            logic,
        });
        self.params.push(min);
        self.params.push(max);
        self
    }

    fn push_raw(mut self, logic: Logic, sql: String, bindings: Vec<Value>) -> Self {
        self.wheres.push(WhereClause {
            field: sql,
            operator: None,
            placeholders: bindings.len(),
            logic,
        });
        self.params.extend(bindings);
        self
    }

    fn push_join(mut self, kind: JoinKind, table: String, on: String) -> Self {
        self.joins.push(JoinClause { kind, table, on });
        self
    }

    /// Build the WHERE clause. The first clause is introduced by `WHERE`
    /// whichever logic it was added with.
    fn build_where_clause(&self) -> Option<String> {
        if self.wheres.is_empty() && self.scopes.is_empty() {
            return None;
        }

        let mut conditions = Vec::with_capacity(self.wheres.len());
        for (i, clause) in self.wheres.iter().enumerate() {
            let condition = render_condition(clause);
            if i == 0 {
                conditions.push(condition);
            } else {
                conditions.push(format!("{} {}", clause.logic.as_sql(), condition));
            }
        }
        let user = conditions.join(" ");

        let predicate = match (self.scopes.is_empty(), self.wheres.is_empty()) {
            (true, _) => user,
            (false, true) => self.scopes.join(" AND "),
            (false, false) => format!("{} AND ({})", self.scopes.join(" AND "), user),
        };
        Some(format!("WHERE {predicate}"))
    }
}

impl<T: FromRow> QueryBuilder<T> {
    /// Run the query and decode every row.
    pub async fn execute(&self, db: &dyn QueryExecutor) -> Result<Vec<T>> {
        self.fetch_rows(db)
            .await?
            .into_iter()
            .map(T::from_row)
            .collect()
    }

    /// Run the query with `LIMIT 1` and return the first row, if any.
    pub async fn first(self, db: &dyn QueryExecutor) -> Result<Option<T>> {
        let query = self.limit(1);
        let rows = query.fetch_rows(db).await?;
        rows.into_iter().next().map(T::from_row).transpose()
    }

    /// Walk the result set in pages of `size`, handing each page and its
    /// zero-based index to `callback`.
    ///
    /// Stops on an empty page, a short page, or when the callback returns
    /// [`ControlFlow::Break`]. Returns the number of pages delivered.
    pub async fn chunk<F, Fut>(
        &self,
        db: &dyn QueryExecutor,
        size: u64,
        mut callback: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<T>, u64) -> Fut,
        Fut: Future<Output = ControlFlow<()>>,
    {
        let mut chunks = self.chunks(size);
        let mut delivered = 0;
        while let Some((page, rows)) = chunks.next_page(db).await? {
            delivered += 1;
            if callback(rows, page).await.is_break() {
                break;
            }
        }
        Ok(delivered)
    }
}

/// Cursor over a query's result set, one LIMIT/OFFSET page per fetch.
///
/// Finite: once a page comes back empty or short the cursor is exhausted.
/// Start over by calling [`QueryBuilder::chunks`] again.
pub struct Chunks<T> {
    query: QueryBuilder<T>,
    size: u64,
    page: u64,
    done: bool,
}

impl<T: FromRow> Chunks<T> {
    /// Fetch the next page, or `None` once the result set is exhausted.
    pub async fn next_batch(&mut self, db: &dyn QueryExecutor) -> Result<Option<Vec<T>>> {
        Ok(self.next_page(db).await?.map(|(_, rows)| rows))
    }

    /// Like [`next_batch`](Self::next_batch), with the page index.
    pub async fn next_page(&mut self, db: &dyn QueryExecutor) -> Result<Option<(u64, Vec<T>)>> {
        if self.done {
            return Ok(None);
        }

        let offset = self.page.saturating_mul(self.size);
        let query = self
            .query
            .clone()
            .limit(clamp_i64(self.size))
            .offset(clamp_i64(offset));
        let rows = query.execute(db).await?;

        if rows.is_empty() {
            self.done = true;
            return Ok(None);
        }
        if (rows.len() as u64) < self.size {
            self.done = true;
        }

        let page = self.page;
        self.page += 1;
        Ok(Some((page, rows)))
    }

    /// Index of the next page to be fetched.
    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

fn render_condition(clause: &WhereClause) -> String {
    let Some(operator) = clause.operator else {
        return format!("({})", clause.field);
    };

    match operator {
        Operator::IsNull | Operator::IsNotNull => format!("{} {}", clause.field, operator),
        Operator::In | Operator::NotIn if clause.placeholders == 0 => {
            // Empty lists match nothing (IN) or everything (NOT IN).
            if operator == Operator::In {
                "1 = 0".to_string()
            } else {
                "1 = 1".to_string()
            }
        }
        Operator::In | Operator::NotIn => {
            let placeholders = vec!["?"; clause.placeholders].join(", ");
            format!("{} {} ({})", clause.field, operator, placeholders)
        }
        Operator::Between => format!("{} BETWEEN ? AND ?", clause.field),
        _ => format!("{} {} ?", clause.field, operator),
    }
}

fn collect<I, V>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(Into::into).collect()
}

pub(crate) fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
