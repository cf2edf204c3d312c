//! Revisioned document store over SQLite.
//!
//! Every collection is one table of `(id, rev, deleted, body)` rows where `body`
//! is the JSON-encoded field record. Writes follow the revision contract:
//!
//! - an absent document is created by a write without a revision;
//! - a live document is only replaced when the caller presents its current revision;
//! - a tombstoned document may be resurrected by a write without a revision or
//!   with the tombstone's revision.
//!
//! All public operations are async. SQLite work runs on the blocking pool against a
//! single shared connection.

use crate::core::index::{field_expr, IndexCatalog, IndexName};
use crate::{PocketListsError, Result, Revision};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// The logical collections held by a [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionName {
    Notes,
    Lists,
    ListItems,
    HideDone,
    Theme,
}

impl CollectionName {
    pub const ALL: [CollectionName; 5] = [
        CollectionName::Notes,
        CollectionName::Lists,
        CollectionName::ListItems,
        CollectionName::HideDone,
        CollectionName::Theme,
    ];

    /// Name of the backing table.
    pub fn table(self) -> &'static str {
        match self {
            CollectionName::Notes => "notes",
            CollectionName::Lists => "lists",
            CollectionName::ListItems => "list_items",
            CollectionName::HideDone => "hide_done",
            CollectionName::Theme => "theme",
        }
    }

    fn create_table_sql(self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY NOT NULL,
                rev TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL
            )",
            self.table()
        )
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A field record that lives in exactly one collection.
pub trait DocumentFields: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: CollectionName;
}

/// A stored document: identity, revision, tombstone flag and typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<T> {
    pub id: String,
    pub rev: Revision,
    pub deleted: bool,
    pub fields: T,
}

/// One write submitted to [`Collection::write`] or [`Collection::bulk_docs`].
#[derive(Debug, Clone)]
pub struct DocumentWrite<T> {
    pub id: String,
    /// Revision last observed by the caller; `None` for new documents.
    pub rev: Option<Revision>,
    /// Writes a tombstone that keeps `fields` when `true`.
    pub deleted: bool,
    pub fields: T,
}

impl<T> DocumentWrite<T> {
    pub fn new(id: impl Into<String>, fields: T) -> Self {
        Self {
            id: id.into(),
            rev: None,
            deleted: false,
            fields,
        }
    }

    pub fn at(mut self, rev: Revision) -> Self {
        self.rev = Some(rev);
        self
    }

    pub fn tombstone(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Per-document result of a batch call.
#[derive(Debug)]
pub struct BulkOutcome {
    pub id: String,
    pub result: Result<Revision>,
}

impl BulkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Equality query against one declared index.
#[derive(Debug, Clone)]
pub struct Query {
    index: IndexName,
    selector: Vec<(&'static str, Value)>,
}

impl Query {
    pub fn on(index: IndexName) -> Self {
        Self {
            index,
            selector: Vec::new(),
        }
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.selector.push((field, value.into()));
        self
    }

    pub fn index(&self) -> IndexName {
        self.index
    }
}

struct StoredRow {
    id: String,
    rev: Revision,
    deleted: bool,
    body: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            rev: Revision::from(row.get::<_, String>(1)?),
            deleted: row.get(2)?,
            body: row.get(3)?,
        })
    }

    fn into_document<T: DeserializeOwned>(self) -> Result<Document<T>> {
        Ok(Document {
            fields: serde_json::from_str(&self.body)?,
            id: self.id,
            rev: self.rev,
            deleted: self.deleted,
        })
    }
}

/// Handle to an open document database.
///
/// Cloning is cheap; all clones share the same connection and [`IndexCatalog`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    catalog: Arc<IndexCatalog>,
}

impl Database {
    /// Opens (or creates) the database file at `path` and ensures every collection
    /// table exists. Indexes are not built here; see [`crate::build_indexes`].
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::StoreUnavailable`] if the file cannot be opened or
    /// is not a SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        for collection in CollectionName::ALL {
            conn.execute_batch(&collection.create_table_sql())?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            catalog: Arc::new(IndexCatalog::new()),
        })
    }

    /// Readiness of the secondary indexes declared on this database.
    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }

    /// Returns a typed handle to the collection that stores `T`.
    pub fn collection<T: DocumentFields>(&self) -> Collection<T> {
        Collection {
            db: self.clone(),
            _fields: PhantomData,
        }
    }

    /// Runs `f` against the raw connection on the blocking pool.
    pub async fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.run(move |conn, _| f(conn).map_err(PocketListsError::from))
            .await
    }

    async fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection, &IndexCatalog) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let catalog = Arc::clone(&self.catalog);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| {
                PocketListsError::StoreUnavailable("connection lock poisoned".to_string())
            })?;
            f(&mut guard, &catalog)
        })
        .await
        .map_err(|e| PocketListsError::StoreUnavailable(e.to_string()))?
    }
}

/// Typed access to one collection of a [`Database`].
pub struct Collection<T> {
    db: Database,
    _fields: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _fields: PhantomData,
        }
    }
}

impl<T: DocumentFields> Collection<T> {
    pub fn name(&self) -> CollectionName {
        T::COLLECTION
    }

    /// All live documents in ascending id order.
    pub async fn all_docs(&self) -> Result<Vec<Document<T>>> {
        let table = T::COLLECTION.table();
        self.db
            .run(move |conn, _| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, rev, deleted, body FROM {table} WHERE deleted = 0 ORDER BY id"
                ))?;
                let rows = stmt
                    .query_map([], StoredRow::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows.into_iter().map(StoredRow::into_document).collect()
            })
            .await
    }

    /// Fetches a live document.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] if `id` is absent or tombstoned.
    pub async fn get(&self, id: &str) -> Result<Document<T>> {
        let doc = self.get_with_deleted(id).await?;
        if doc.deleted {
            return Err(PocketListsError::NotFound(format!(
                "{} in {} was deleted",
                doc.id,
                T::COLLECTION
            )));
        }
        Ok(doc)
    }

    /// Fetches a document whether or not it is tombstoned.
    pub async fn get_with_deleted(&self, id: &str) -> Result<Document<T>> {
        let table = T::COLLECTION.table();
        let id = id.to_string();
        self.db
            .run(move |conn, _| match read_row(conn, table, &id)? {
                Some(row) => row.into_document(),
                None => Err(PocketListsError::NotFound(format!("{id} in {table}"))),
            })
            .await
    }

    /// Creates or replaces a live document. See the module docs for the revision rules.
    pub async fn put(&self, id: &str, rev: Option<&Revision>, fields: &T) -> Result<Revision> {
        let write = DocumentWrite {
            id: id.to_string(),
            rev: rev.cloned(),
            deleted: false,
            fields: fields.clone(),
        };
        self.write(write).await
    }

    /// Applies a single write, tombstone or not.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::Conflict`] when the revision does not match and
    /// [`PocketListsError::StoreWrite`] when SQLite rejects the row.
    pub async fn write(&self, write: DocumentWrite<T>) -> Result<Revision> {
        let table = T::COLLECTION.table();
        let body = serde_json::to_string(&write.fields)?;
        self.db
            .run(move |conn, _| {
                write_row(conn, table, &write.id, write.rev.as_ref(), write.deleted, &body)
            })
            .await
    }

    /// Tombstones a live document and returns the tombstone revision.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] if the document is absent or already
    /// removed, and [`PocketListsError::Conflict`] if `rev` is stale.
    pub async fn remove(&self, id: &str, rev: &Revision) -> Result<Revision> {
        let table = T::COLLECTION.table();
        let id = id.to_string();
        let rev = rev.clone();
        self.db
            .run(move |conn, _| {
                let row = require_current(conn, table, &id, &rev)?;
                write_row(conn, table, &id, Some(&rev), true, &row.body)
            })
            .await
    }

    /// Tombstones `id` and erases every `C` document matched by `children`,
    /// tombstoned or not, in one transaction. Returns the tombstone revision and the
    /// number of erased children.
    ///
    /// Nothing is changed when any step fails.
    ///
    /// # Errors
    ///
    /// Same as [`remove`](Self::remove); a child that cannot be erased fails with
    /// [`PocketListsError::StoreWrite`].
    pub async fn remove_with_children<C: DocumentFields>(
        &self,
        id: &str,
        rev: &Revision,
        children: Query,
    ) -> Result<(Revision, usize)> {
        if children.index.collection() != C::COLLECTION {
            return Err(PocketListsError::IndexUnavailable(format!(
                "{} is not declared on {}",
                children.index,
                C::COLLECTION
            )));
        }
        let table = T::COLLECTION.table();
        let child_table = C::COLLECTION.table();
        let id = id.to_string();
        let rev = rev.clone();
        self.db
            .run(move |conn, _| {
                let tx = conn.transaction()?;
                let row = require_current(&tx, table, &id, &rev)?;
                let (where_clause, values) = selector_clause(&children, true);
                let erased = tx
                    .execute(
                        &format!("DELETE FROM {child_table} {where_clause}"),
                        rusqlite::params_from_iter(values),
                    )
                    .map_err(|e| {
                        PocketListsError::StoreWrite(format!(
                            "children of {id} in {child_table}: {e}"
                        ))
                    })?;
                let tombstone = write_row(&tx, table, &id, Some(&rev), true, &row.body)?;
                tx.commit()?;
                Ok((tombstone, erased))
            })
            .await
    }

    /// Applies `write` only while `parent_id` is a live `P` document. The check and
    /// the write run in one transaction, so a concurrent removal of the parent is
    /// either seen or happens after the write.
    ///
    /// # Errors
    ///
    /// Returns [`PocketListsError::NotFound`] if the parent is absent or removed,
    /// otherwise the errors of [`write`](Self::write).
    pub async fn write_under<P: DocumentFields>(
        &self,
        parent_id: &str,
        write: DocumentWrite<T>,
    ) -> Result<Revision> {
        let table = T::COLLECTION.table();
        let parent_table = P::COLLECTION.table();
        let parent_id = parent_id.to_string();
        let body = serde_json::to_string(&write.fields)?;
        self.db
            .run(move |conn, _| {
                let tx = conn.transaction()?;
                require_live(&tx, parent_table, &parent_id)?;
                let rev =
                    write_row(&tx, table, &write.id, write.rev.as_ref(), write.deleted, &body)?;
                tx.commit()?;
                Ok(rev)
            })
            .await
    }

    /// Submits every write in one transaction and reports each document separately.
    ///
    /// Readers never observe half a batch, but individual documents may fail while
    /// the rest are committed.
    pub async fn bulk_docs(&self, writes: Vec<DocumentWrite<T>>) -> Result<Vec<BulkOutcome>> {
        self.bulk_docs_inner(None, writes).await
    }

    /// Like [`bulk_docs`](Self::bulk_docs), but the whole batch is refused with
    /// [`PocketListsError::NotFound`] unless `parent_id` is a live `P` document.
    pub async fn bulk_docs_under<P: DocumentFields>(
        &self,
        parent_id: &str,
        writes: Vec<DocumentWrite<T>>,
    ) -> Result<Vec<BulkOutcome>> {
        let parent = (P::COLLECTION.table(), parent_id.to_string());
        self.bulk_docs_inner(Some(parent), writes).await
    }

    async fn bulk_docs_inner(
        &self,
        parent: Option<(&'static str, String)>,
        writes: Vec<DocumentWrite<T>>,
    ) -> Result<Vec<BulkOutcome>> {
        let table = T::COLLECTION.table();
        let prepared: Vec<(DocumentWrite<T>, serde_json::Result<String>)> = writes
            .into_iter()
            .map(|w| {
                let body = serde_json::to_string(&w.fields);
                (w, body)
            })
            .collect();
        self.db
            .run(move |conn, _| {
                let tx = conn.transaction()?;
                if let Some((parent_table, parent_id)) = &parent {
                    require_live(&tx, parent_table, parent_id)?;
                }
                let outcomes: Vec<BulkOutcome> = prepared
                    .into_iter()
                    .map(|(w, body)| {
                        let result = body.map_err(PocketListsError::from).and_then(|body| {
                            write_row(&tx, table, &w.id, w.rev.as_ref(), w.deleted, &body)
                        });
                        BulkOutcome { id: w.id, result }
                    })
                    .collect();
                tx.commit()?;
                Ok(outcomes)
            })
            .await
    }

    /// Physically erases documents, tombstoned or not, in one transaction.
    ///
    /// Each `(id, rev)` must carry the current revision. The outcome revision is the
    /// one that was erased.
    pub async fn bulk_purge(&self, docs: Vec<(String, Revision)>) -> Result<Vec<BulkOutcome>> {
        let table = T::COLLECTION.table();
        self.db
            .run(move |conn, _| {
                let tx = conn.transaction()?;
                let outcomes: Vec<BulkOutcome> = docs
                    .into_iter()
                    .map(|(id, rev)| {
                        let result = purge_row(&tx, table, &id, &rev);
                        BulkOutcome { id, result }
                    })
                    .collect();
                tx.commit()?;
                Ok(outcomes)
            })
            .await
    }

    /// Runs an equality query through `query`'s index.
    ///
    /// When the index is ready the statement is pinned to it with `INDEXED BY`, and
    /// a missing index fails with [`PocketListsError::IndexUnavailable`]. While the
    /// index is pending or failed the same query runs as a plain table scan.
    pub async fn find(&self, query: Query) -> Result<Vec<Document<T>>> {
        self.find_inner(query, false).await
    }

    /// Like [`find`](Self::find) but also returns tombstoned documents.
    pub async fn find_with_deleted(&self, query: Query) -> Result<Vec<Document<T>>> {
        self.find_inner(query, true).await
    }

    async fn find_inner(&self, query: Query, include_deleted: bool) -> Result<Vec<Document<T>>> {
        let collection = T::COLLECTION;
        if query.index.collection() != collection {
            return Err(PocketListsError::IndexUnavailable(format!(
                "{} is not declared on {collection}",
                query.index
            )));
        }
        self.db
            .run(move |conn, catalog| {
                let indexed_by = if catalog.is_ready(query.index) {
                    format!("INDEXED BY {}", query.index.sql_name())
                } else {
                    log::debug!(
                        "index {} not ready, scanning {collection}",
                        query.index.sql_name()
                    );
                    String::new()
                };

                let (where_clause, values) = selector_clause(&query, include_deleted);
                let order = match query.index.sort_field() {
                    Some(field) => format!("{}, id", field_expr(field)),
                    None => "id".to_string(),
                };
                let sql = format!(
                    "SELECT id, rev, deleted, body FROM {} {indexed_by} {where_clause} ORDER BY {order}",
                    collection.table()
                );

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(values), StoredRow::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows.into_iter().map(StoredRow::into_document).collect()
            })
            .await
    }
}

fn read_row(conn: &Connection, table: &str, id: &str) -> Result<Option<StoredRow>> {
    let row = conn
        .query_row(
            &format!("SELECT id, rev, deleted, body FROM {table} WHERE id = ?1"),
            [id],
            StoredRow::from_row,
        )
        .optional()?;
    Ok(row)
}

fn require_live(conn: &Connection, table: &str, id: &str) -> Result<StoredRow> {
    match read_row(conn, table, id)? {
        Some(row) if !row.deleted => Ok(row),
        _ => Err(PocketListsError::NotFound(format!("{id} in {table}"))),
    }
}

fn require_current(conn: &Connection, table: &str, id: &str, rev: &Revision) -> Result<StoredRow> {
    let row = require_live(conn, table, id)?;
    if &row.rev != rev {
        return Err(PocketListsError::Conflict(format!(
            "{id}: revision {rev} is stale, current is {}",
            row.rev
        )));
    }
    Ok(row)
}

fn selector_clause(query: &Query, include_deleted: bool) -> (String, Vec<SqlValue>) {
    let mut clauses = Vec::new();
    if !include_deleted {
        clauses.push("deleted = 0".to_string());
    }
    for (n, (field, _)) in query.selector.iter().enumerate() {
        clauses.push(format!("{} = ?{}", field_expr(field), n + 1));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let values = query.selector.iter().map(|(_, v)| sql_value(v)).collect();
    (where_clause, values)
}

fn write_row(
    conn: &Connection,
    table: &str,
    id: &str,
    expected: Option<&Revision>,
    deleted: bool,
    body: &str,
) -> Result<Revision> {
    let current = read_row(conn, table, id)?;
    match (&current, expected) {
        (None, Some(rev)) => {
            return Err(PocketListsError::Conflict(format!(
                "{id} does not exist at revision {rev}"
            )));
        }
        (Some(row), None) if !row.deleted => {
            return Err(PocketListsError::Conflict(format!("{id} already exists")));
        }
        (Some(row), Some(rev)) if &row.rev != rev => {
            return Err(PocketListsError::Conflict(format!(
                "{id}: revision {rev} is stale, current is {}",
                row.rev
            )));
        }
        _ => {}
    }

    let rev = Revision::next(current.as_ref().map(|row| &row.rev), body, deleted);
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, rev, deleted, body) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET rev = excluded.rev, deleted = excluded.deleted, body = excluded.body"
        ),
        params![id, rev.as_str(), deleted, body],
    )
    .map_err(|e| PocketListsError::StoreWrite(format!("{id} in {table}: {e}")))?;
    log::debug!("wrote {id} in {table} at {rev}");
    Ok(rev)
}

fn purge_row(conn: &Connection, table: &str, id: &str, expected: &Revision) -> Result<Revision> {
    let row = read_row(conn, table, id)?
        .ok_or_else(|| PocketListsError::NotFound(format!("{id} in {table}")))?;
    if &row.rev != expected {
        return Err(PocketListsError::Conflict(format!(
            "{id}: revision {expected} is stale, current is {}",
            row.rev
        )));
    }
    conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])
        .map_err(|e| PocketListsError::StoreWrite(format!("{id} in {table}: {e}")))?;
    Ok(row.rev)
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
