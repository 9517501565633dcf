/// CRUD Module
///
/// Insert, find, update and delete on the collection selected in a
/// `Session`. Each operation checks for a selected collection first, forwards
/// to the driver, and maps driver errors onto `WriteFailure`/`ReadFailure`.

use crate::core::db::Session;
use crate::core::{Result, SessionError};
use crate::driver::DriverError;
use mongodb::bson::{Bson, Document};
use tracing::{info, warn};

fn write_failure(context: &str, e: DriverError) -> SessionError {
    warn!("{}: {}", context, e);
    SessionError::WriteFailure(format!("{context}: {e}"))
}

fn read_failure(context: &str, e: DriverError) -> SessionError {
    warn!("{}: {}", context, e);
    SessionError::ReadFailure(format!("{context}: {e}"))
}

impl Session {
    /// Inserts a single document into the current collection.
    ///
    /// # Returns
    ///
    /// The document's `_id`; generated by the database when the document has none.
    pub fn insert_one(&mut self, document: Document) -> Result<Bson> {
        let collection = self.collection()?;
        let id = collection
            .insert_one(document)
            .map_err(|e| write_failure("Failed to insert document", e))?;
        info!("Document inserted with ID: {}", id);
        Ok(id)
    }

    /// Inserts several documents into the current collection.
    ///
    /// Ordered by default: insertion stops at the first failure and earlier
    /// documents stay persisted. See `ConnectionSettings::ordered_inserts`.
    ///
    /// # Returns
    ///
    /// The ids of the inserted documents, in input order. An empty batch is
    /// rejected with `WriteFailure`.
    pub fn insert_many(&mut self, documents: Vec<Document>) -> Result<Vec<Bson>> {
        let ordered = self.settings().ordered_inserts;
        let collection = self.collection()?;
        let ids = collection
            .insert_many(documents, ordered)
            .map_err(|e| write_failure("Failed to insert documents", e))?;
        info!("Inserted {} document(s).", ids.len());
        Ok(ids)
    }

    /// Fetches the documents matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `filter` - Match criteria; an empty document matches everything
    /// * `limit` - Maximum number of documents to return, `0` for no limit
    pub fn find(&mut self, filter: Document, limit: u64) -> Result<Vec<Document>> {
        let collection = self.collection()?;
        let documents = collection
            .find(filter, limit)
            .map_err(|e| read_failure("Failed to fetch documents", e))?;
        info!("Fetched {} document(s).", documents.len());
        Ok(documents)
    }

    /// Updates the first document matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of modified documents; `0` when nothing matched.
    pub fn update_one(&mut self, filter: Document, update: Document) -> Result<u64> {
        let collection = self.collection()?;
        let outcome = collection
            .update_one(filter, update)
            .map_err(|e| write_failure("Failed to update document", e))?;
        info!(
            matched = outcome.matched,
            "Modified {} document(s).", outcome.modified
        );
        Ok(outcome.modified)
    }

    /// Updates every document matching `filter` and returns the modified count.
    pub fn update_many(&mut self, filter: Document, update: Document) -> Result<u64> {
        let collection = self.collection()?;
        let outcome = collection
            .update_many(filter, update)
            .map_err(|e| write_failure("Failed to update documents", e))?;
        info!(
            matched = outcome.matched,
            "Modified {} document(s).", outcome.modified
        );
        Ok(outcome.modified)
    }

    /// Deletes the first document matching `filter`; returns 0 or 1.
    pub fn delete_one(&mut self, filter: Document) -> Result<u64> {
        let collection = self.collection()?;
        let deleted = collection
            .delete_one(filter)
            .map_err(|e| write_failure("Failed to delete document", e))?;
        info!("Deleted {} document(s).", deleted);
        Ok(deleted)
    }

    /// Deletes every document matching `filter`.
    ///
    /// An empty filter deletes the whole collection.
    pub fn delete_many(&mut self, filter: Document) -> Result<u64> {
        let collection = self.collection()?;
        let deleted = collection
            .delete_many(filter)
            .map_err(|e| write_failure("Failed to delete documents", e))?;
        info!("Deleted {} document(s).", deleted);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::SessionError;
    use crate::test_utils::SessionFixture;
    use mongodb::bson::{doc, Bson, Document};

    #[test]
    fn test_crud_requires_collection() {
        let mut fixture = SessionFixture::connected();
        let session = &mut fixture.session;
        session.select_database("app").unwrap();

        assert!(matches!(session.insert_one(doc! {"a": 1}), Err(SessionError::NoCollectionSelected)));
        assert!(matches!(session.insert_many(vec![doc! {"a": 1}]), Err(SessionError::NoCollectionSelected)));
        assert!(matches!(session.find(doc! {}, 0), Err(SessionError::NoCollectionSelected)));
        assert!(matches!(
            session.update_one(doc! {}, doc! {"$set": {"a": 2}}),
            Err(SessionError::NoCollectionSelected)
        ));
        assert!(matches!(
            session.update_many(doc! {}, doc! {"$set": {"a": 2}}),
            Err(SessionError::NoCollectionSelected)
        ));
        assert!(matches!(session.delete_one(doc! {}), Err(SessionError::NoCollectionSelected)));
        assert!(matches!(session.delete_many(doc! {}), Err(SessionError::NoCollectionSelected)));
    }

    #[test]
    fn test_insert_one_keeps_supplied_id() {
        let mut fixture = SessionFixture::new("app", "users");
        let id = fixture
            .session
            .insert_one(doc! {"_id": "alice", "age": 30})
            .unwrap();
        assert_eq!(id, Bson::String("alice".to_string()));
    }

    #[test]
    fn test_duplicate_key_is_write_failure() {
        let mut fixture = SessionFixture::new("app", "users");
        fixture.session.insert_one(doc! {"_id": 1}).unwrap();
        match fixture.session.insert_one(doc! {"_id": 1}) {
            Err(SessionError::WriteFailure(msg)) => {
                assert!(msg.contains("Failed to insert document"));
                assert!(msg.contains("duplicate key"));
            }
            other => panic!("Expected WriteFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_many_rejects_empty_batch() {
        let mut fixture = SessionFixture::new("app", "users");
        match fixture.session.insert_many(Vec::new()) {
            Err(SessionError::WriteFailure(msg)) => {
                assert!(msg.contains("Failed to insert documents"));
                assert!(msg.contains("non-empty"));
            }
            other => panic!("Expected WriteFailure, got {:?}", other),
        }
        assert_eq!(fixture.driver.document_count("app", "users"), 0);
    }

    #[test]
    fn test_insert_many_ordered_stops_at_first_failure() {
        let mut fixture = SessionFixture::new("app", "users");
        let docs = vec![doc! {"_id": 1}, doc! {"_id": 2}, doc! {"_id": 1}, doc! {"_id": 3}];
        assert!(matches!(
            fixture.session.insert_many(docs),
            Err(SessionError::WriteFailure(_))
        ));

        let stored = fixture.session.find(doc! {}, 0).unwrap();
        let ids: Vec<&Bson> = stored.iter().filter_map(|d| d.get("_id")).collect();
        assert_eq!(ids, vec![&Bson::Int32(1), &Bson::Int32(2)]);
    }

    #[test]
    fn test_insert_many_unordered_continues_past_failure() {
        let mut fixture = SessionFixture::with_ordered_inserts("app", "users", false);
        let docs = vec![doc! {"_id": 1}, doc! {"_id": 1}, doc! {"_id": 2}];
        assert!(fixture.session.insert_many(docs).is_err());
        assert_eq!(fixture.session.find(doc! {}, 0).unwrap().len(), 2);
    }

    #[test]
    fn test_find_with_limit() {
        let mut fixture = SessionFixture::with_sample_data("app", "users");
        let total = fixture.session.find(doc! {}, 0).unwrap().len();
        assert_eq!(total, 5);
        assert_eq!(fixture.session.find(doc! {}, 2).unwrap().len(), 2);
        assert_eq!(fixture.session.find(doc! {}, 50).unwrap().len(), total);
    }

    #[test]
    fn test_invalid_filter_is_read_failure() {
        let mut fixture = SessionFixture::with_sample_data("app", "users");
        match fixture.session.find(doc! {"age": {"$bogus": 1}}, 0) {
            Err(SessionError::ReadFailure(msg)) => assert!(msg.contains("$bogus")),
            other => panic!("Expected ReadFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_replacement_document_is_rejected_by_update() {
        let mut fixture = SessionFixture::with_sample_data("app", "users");
        assert!(matches!(
            fixture.session.update_one(doc! {"name": "alice"}, doc! {"name": "zed"}),
            Err(SessionError::WriteFailure(_))
        ));
    }

    #[test]
    fn test_update_one_modifies_single_match() {
        let mut fixture = SessionFixture::with_sample_data("app", "users");
        let modified = fixture
            .session
            .update_one(doc! {"active": true}, doc! {"$set": {"active": false}})
            .unwrap();
        assert_eq!(modified, 1);
    }

    #[test]
    fn test_update_that_changes_nothing_reports_zero() {
        let mut fixture = SessionFixture::with_sample_data("app", "users");
        let modified = fixture
            .session
            .update_many(doc! {"name": "alice"}, doc! {"$set": {"name": "alice"}})
            .unwrap();
        assert_eq!(modified, 0);
    }

    #[test]
    fn test_delete_one_and_many() {
        let mut fixture = SessionFixture::with_sample_data("app", "users");
        assert_eq!(fixture.session.delete_one(doc! {"active": true}).unwrap(), 1);
        assert_eq!(fixture.session.delete_one(doc! {"name": "nobody"}).unwrap(), 0);

        let remaining_inactive: Vec<Document> =
            fixture.session.find(doc! {"active": false}, 0).unwrap();
        let deleted = fixture.session.delete_many(doc! {"active": false}).unwrap();
        assert_eq!(deleted as usize, remaining_inactive.len());
    }
}
