/// # Memory Driver Module
///
/// Stores documents per database and collection behind a shared lock.
/// Clones of a `MemoryDriver` share one store, so data written through one
/// session is visible after reconnecting or from another session.

use super::matcher;
use super::{
    ClientHandle, CollectionHandle, DatabaseHandle, Driver, DriverError, DriverResult,
    UpdateOutcome,
};
use crate::core::db::ConnectionSettings;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Collections = BTreeMap<String, Vec<Document>>;

#[derive(Debug, Default)]
struct MemoryStore {
    databases: BTreeMap<String, Collections>,
}

/// Driver keeping all data in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    store: Arc<Mutex<MemoryStore>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored in `database.collection`
    pub fn document_count(&self, database: &str, collection: &str) -> usize {
        self.store
            .lock()
            .ok()
            .and_then(|store| {
                store
                    .databases
                    .get(database)
                    .and_then(|colls| colls.get(collection))
                    .map(Vec::len)
            })
            .unwrap_or(0)
    }

    /// Names of the databases holding at least one collection
    pub fn database_names(&self) -> Vec<String> {
        self.store
            .lock()
            .map(|store| store.databases.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Driver for MemoryDriver {
    fn connect(&self, settings: &ConnectionSettings) -> DriverResult<Box<dyn ClientHandle>> {
        debug!(uri = %crate::core::db::redact_uri(&settings.uri), "Opening in-memory client");
        Ok(Box::new(MemoryClient {
            store: Arc::clone(&self.store),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct MemoryClient {
    store: Arc<Mutex<MemoryStore>>,
    closed: Arc<AtomicBool>,
}

impl ClientHandle for MemoryClient {
    fn database(&self, name: &str) -> DriverResult<Box<dyn DatabaseHandle>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        Ok(Box::new(MemoryDatabase {
            store: Arc::clone(&self.store),
            closed: Arc::clone(&self.closed),
            name: name.to_string(),
        }))
    }

    fn close(self: Box<Self>) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MemoryDatabase {
    store: Arc<Mutex<MemoryStore>>,
    closed: Arc<AtomicBool>,
    name: String,
}

impl DatabaseHandle for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> DriverResult<Box<dyn CollectionHandle>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        Ok(Box::new(MemoryCollection {
            store: Arc::clone(&self.store),
            closed: Arc::clone(&self.closed),
            database: self.name.clone(),
            name: name.to_string(),
        }))
    }
}

struct MemoryCollection {
    store: Arc<Mutex<MemoryStore>>,
    closed: Arc<AtomicBool>,
    database: String,
    name: String,
}

impl MemoryCollection {
    fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    fn lock(&self) -> DriverResult<MutexGuard<'_, MemoryStore>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        self.store.lock().map_err(|_| DriverError::Lock)
    }

    /// Runs `f` against this collection's documents, creating the
    /// collection on first use.
    fn with_documents<R>(
        &self,
        f: impl FnOnce(&mut Vec<Document>) -> DriverResult<R>,
    ) -> DriverResult<R> {
        let mut store = self.lock()?;
        let documents = store
            .databases
            .entry(self.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default();
        f(documents)
    }

    fn insert_into(&self, documents: &mut Vec<Document>, document: Document) -> DriverResult<Bson> {
        let (id, document) = with_id(document);
        let duplicate = documents.iter().any(|existing| {
            existing
                .get("_id")
                .map_or(false, |existing_id| matcher::values_equal(existing_id, &id))
        });
        if duplicate {
            return Err(DriverError::DuplicateKey {
                namespace: self.namespace(),
                key: id.to_string(),
            });
        }
        documents.push(document);
        Ok(id)
    }

    fn update(&self, filter: Document, update: Document, multi: bool) -> DriverResult<UpdateOutcome> {
        matcher::check_filter(&filter)?;
        matcher::check_update(&update)?;
        self.with_documents(|documents| {
            let mut outcome = UpdateOutcome::default();
            for document in documents.iter_mut() {
                if !matcher::matches(document, &filter)? {
                    continue;
                }
                outcome.matched += 1;
                let mut updated = document.clone();
                if matcher::apply_update(&mut updated, &update)? {
                    *document = updated;
                    outcome.modified += 1;
                }
                if !multi {
                    break;
                }
            }
            Ok(outcome)
        })
    }

    fn delete(&self, filter: Document, multi: bool) -> DriverResult<u64> {
        matcher::check_filter(&filter)?;
        self.with_documents(|documents| {
            let mut deleted = 0u64;
            let mut index = 0;
            while index < documents.len() {
                if matcher::matches(&documents[index], &filter)? {
                    documents.remove(index);
                    deleted += 1;
                    if !multi {
                        break;
                    }
                } else {
                    index += 1;
                }
            }
            Ok(deleted)
        })
    }
}

/// Returns the document's `_id`, generating an ObjectId in first position
/// when the document has none.
fn with_id(document: Document) -> (Bson, Document) {
    if let Some(id) = document.get("_id").cloned() {
        return (id, document);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut with_id = Document::new();
    with_id.insert("_id", id.clone());
    for (key, value) in document {
        with_id.insert(key, value);
    }
    (id, with_id)
}

impl CollectionHandle for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_one(&self, document: Document) -> DriverResult<Bson> {
        self.with_documents(|documents| self.insert_into(documents, document))
    }

    fn insert_many(&self, documents: Vec<Document>, ordered: bool) -> DriverResult<Vec<Bson>> {
        if documents.is_empty() {
            return Err(DriverError::BadValue(
                "documents must be a non-empty list".to_string(),
            ));
        }
        self.with_documents(|stored| {
            let mut ids = Vec::with_capacity(documents.len());
            let mut failures = Vec::new();
            for (index, document) in documents.into_iter().enumerate() {
                match self.insert_into(stored, document) {
                    Ok(id) => ids.push(id),
                    Err(e) => {
                        failures.push(format!("index {index}: {e}"));
                        if ordered {
                            break;
                        }
                    }
                }
            }
            if failures.is_empty() {
                Ok(ids)
            } else {
                Err(DriverError::BulkWrite {
                    inserted: ids.len(),
                    message: failures.join("; "),
                })
            }
        })
    }

    fn find(&self, filter: Document, limit: u64) -> DriverResult<Vec<Document>> {
        matcher::check_filter(&filter)?;
        self.with_documents(|documents| {
            let mut found = Vec::new();
            for document in documents.iter() {
                if limit > 0 && found.len() as u64 >= limit {
                    break;
                }
                if matcher::matches(document, &filter)? {
                    found.push(document.clone());
                }
            }
            Ok(found)
        })
    }

    fn update_one(&self, filter: Document, update: Document) -> DriverResult<UpdateOutcome> {
        self.update(filter, update, false)
    }

    fn update_many(&self, filter: Document, update: Document) -> DriverResult<UpdateOutcome> {
        self.update(filter, update, true)
    }

    fn delete_one(&self, filter: Document) -> DriverResult<u64> {
        self.delete(filter, false)
    }

    fn delete_many(&self, filter: Document) -> DriverResult<u64> {
        self.delete(filter, true)
    }
}
