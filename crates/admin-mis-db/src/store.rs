//! In-memory record storage with all-or-nothing transactions.
//!
//! Records are JSON objects keyed by their integer primary key. A [`Store`]
//! hands out read snapshots through [`Store::read`] and exclusive write
//! transactions through [`Store::begin`]. A [`Transaction`] works on a copy of
//! the tables and only publishes it on [`Transaction::commit`]; dropping an
//! uncommitted transaction discards every change.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use admin_mis_core::{MisError, MisResult};
use serde_json::{Map, Value};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::fields::{loose_eq, FieldType};
use crate::model::{ModelMeta, ModelRegistry};

/// A stored row.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Default)]
struct Table {
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

/// The full set of tables, keyed by `"app.model"`.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    tables: HashMap<String, Table>,
}

impl Tables {
    /// Rows of a model in primary-key order.
    pub fn all(&self, meta: &ModelMeta) -> Vec<&Record> {
        self.tables
            .get(&meta.label_lower())
            .map(|t| t.rows.values().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, meta: &ModelMeta, pk: i64) -> Option<&Record> {
        self.tables.get(&meta.label_lower())?.rows.get(&pk)
    }

    pub fn contains(&self, meta: &ModelMeta, pk: i64) -> bool {
        self.get(meta, pk).is_some()
    }

    pub fn count(&self, meta: &ModelMeta) -> usize {
        self.tables
            .get(&meta.label_lower())
            .map_or(0, |t| t.rows.len())
    }

    /// Inserts a record, assigning the primary key when it is auto-generated
    /// and absent. Returns the primary key.
    pub fn insert(&mut self, meta: &ModelMeta, mut record: Record) -> MisResult<i64> {
        let pk_name = meta.pk_name();
        let table = self.tables.entry(meta.label_lower()).or_default();
        let pk = match record.get(pk_name).and_then(Value::as_i64) {
            Some(pk) => pk,
            None if matches!(
                meta.pk().field_type,
                FieldType::AutoField | FieldType::BigAutoField
            ) =>
            {
                table.next_id.max(1)
            }
            None => {
                return Err(MisError::IntegrityError(format!(
                    "NOT NULL constraint failed: {}.{pk_name}",
                    meta.label_lower()
                )))
            }
        };
        if table.rows.contains_key(&pk) {
            return Err(MisError::IntegrityError(format!(
                "UNIQUE constraint failed: {}.{pk_name}",
                meta.label_lower()
            )));
        }
        record.insert(pk_name.to_string(), Value::from(pk));
        self.check_unique(meta, pk, &record)?;
        let table = self.tables.entry(meta.label_lower()).or_default();
        table.next_id = table.next_id.max(pk + 1);
        table.rows.insert(pk, record);
        Ok(pk)
    }

    /// Replaces the record stored under `pk`.
    pub fn update(&mut self, meta: &ModelMeta, pk: i64, mut record: Record) -> MisResult<()> {
        if !self.contains(meta, pk) {
            return Err(MisError::DoesNotExist(format!(
                "{} matching query does not exist.",
                meta.object_name
            )));
        }
        record.insert(meta.pk_name().to_string(), Value::from(pk));
        self.check_unique(meta, pk, &record)?;
        if let Some(table) = self.tables.get_mut(&meta.label_lower()) {
            table.rows.insert(pk, record);
        }
        Ok(())
    }

    /// Sets a single field of a stored record.
    pub fn set_field(&mut self, meta: &ModelMeta, pk: i64, field: &str, value: Value) {
        if let Some(record) = self
            .tables
            .get_mut(&meta.label_lower())
            .and_then(|t| t.rows.get_mut(&pk))
        {
            record.insert(field.to_string(), value);
        }
    }

    pub fn remove(&mut self, meta: &ModelMeta, pk: i64) -> Option<Record> {
        self.tables.get_mut(&meta.label_lower())?.rows.remove(&pk)
    }

    fn check_unique(&self, meta: &ModelMeta, pk: i64, record: &Record) -> MisResult<()> {
        for field in meta.fields.iter().filter(|f| f.unique && !f.primary_key) {
            let Some(value) = record.get(field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self.all(meta).into_iter().any(|other| {
                meta.pk_of(other) != Some(pk)
                    && other.get(field.name).is_some_and(|o| loose_eq(o, value))
            });
            if clash {
                return Err(MisError::IntegrityError(format!(
                    "UNIQUE constraint failed: {}.{}",
                    meta.label_lower(),
                    field.name
                )));
            }
        }
        Ok(())
    }
}

/// Shared handle to the registry and its tables.
#[derive(Clone)]
pub struct Store {
    registry: Arc<ModelRegistry>,
    inner: Arc<RwLock<Tables>>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            inner: Arc::new(RwLock::new(Tables::default())),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// A consistent read-only view of every table.
    pub async fn read(&self) -> OwnedRwLockReadGuard<Tables> {
        Arc::clone(&self.inner).read_owned().await
    }

    /// Starts an exclusive write transaction.
    pub async fn begin(&self) -> Transaction {
        let guard = Arc::clone(&self.inner).write_owned().await;
        let working = (*guard).clone();
        Transaction {
            guard,
            working,
            on_commit: Vec::new(),
        }
    }

    /// Inserts records in one transaction. Used for fixtures and tests.
    pub async fn seed(
        &self,
        meta: &ModelMeta,
        records: impl IntoIterator<Item = Value>,
    ) -> MisResult<Vec<i64>> {
        let mut txn = self.begin().await;
        let mut pks = Vec::new();
        for value in records {
            let Value::Object(record) = value else {
                return Err(MisError::SerializationError(
                    "fixture rows must be JSON objects".to_string(),
                ));
            };
            pks.push(txn.insert(meta, record)?);
        }
        txn.commit();
        Ok(pks)
    }
}

type Callback = Box<dyn FnOnce() + Send>;

/// A write transaction over a private copy of the tables.
pub struct Transaction {
    guard: OwnedRwLockWriteGuard<Tables>,
    working: Tables,
    on_commit: Vec<Callback>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("on_commit", &self.on_commit.len())
            .finish_non_exhaustive()
    }
}

impl Transaction {
    /// Registers a callback to run after a successful commit.
    pub fn on_commit(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_commit.push(Box::new(callback));
    }

    /// Publishes every change and runs the `on_commit` callbacks.
    pub fn commit(mut self) {
        *self.guard = std::mem::take(&mut self.working);
        let callbacks = std::mem::take(&mut self.on_commit);
        drop(self);
        for callback in callbacks {
            callback();
        }
    }
}

impl Deref for Transaction {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.working
    }
}

impl DerefMut for Transaction {
    fn deref_mut(&mut self) -> &mut Tables {
        &mut self.working
    }
}
