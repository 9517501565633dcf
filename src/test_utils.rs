/// # Test Utilities Module
///
/// Session fixtures backed by the in-memory driver, plus helpers for
/// asserting on error kinds. Each fixture owns its own store, so tests are
/// isolated from one another.

use crate::core::db::{ConnectionSettings, Session};
use crate::core::{Result, SessionError};
use crate::driver::MemoryDriver;
use mongodb::bson::{doc, Document};

/// A session plus a handle on the store behind it
pub struct SessionFixture {
    pub session: Session,
    pub driver: MemoryDriver,
}

impl SessionFixture {
    fn build(settings: ConnectionSettings) -> Self {
        let driver = MemoryDriver::new();
        let session = Session::with_driver(settings, driver.clone());
        SessionFixture { session, driver }
    }

    /// A session that has not connected yet
    pub fn disconnected() -> Self {
        Self::build(ConnectionSettings::default())
    }

    pub fn connected() -> Self {
        let mut fixture = Self::disconnected();
        fixture.session.connect().unwrap();
        fixture
    }

    /// A session with `database.collection` selected
    pub fn new(database: &str, collection: &str) -> Self {
        Self::with_ordered_inserts(database, collection, true)
    }

    pub fn with_ordered_inserts(database: &str, collection: &str, ordered: bool) -> Self {
        let settings = ConnectionSettings {
            ordered_inserts: ordered,
            ..Default::default()
        };
        let mut fixture = Self::build(settings);
        fixture.session.connect().unwrap();
        fixture.session.select_database(database).unwrap();
        fixture.session.select_collection(collection).unwrap();
        fixture
    }

    /// A selected collection pre-populated with `sample_documents()`
    pub fn with_sample_data(database: &str, collection: &str) -> Self {
        let mut fixture = Self::new(database, collection);
        fixture.session.insert_many(sample_documents()).unwrap();
        fixture
    }
}

/// Five users, three of them active
pub fn sample_documents() -> Vec<Document> {
    vec![
        doc! {"name": "alice", "age": 34, "active": true, "tags": ["admin"]},
        doc! {"name": "bob", "age": 27, "active": false},
        doc! {"name": "carol", "age": 41, "active": true, "address": {"city": "Oslo"}},
        doc! {"name": "dave", "age": 19, "active": false},
        doc! {"name": "erin", "age": 52, "active": true},
    ]
}

/// Error Testing Utilities
pub mod error_testing {
    use super::*;

    /// Asserts that `result` failed with the same variant as `expected`
    pub fn assert_error_kind<T: std::fmt::Debug>(result: Result<T>, expected: SessionError, context: &str) {
        match result {
            Ok(value) => panic!("{}: expected {:?}, got Ok({:?})", context, expected, value),
            Err(actual) => assert_eq!(
                std::mem::discriminant(&actual),
                std::mem::discriminant(&expected),
                "{}: expected {:?}, got {:?}",
                context,
                expected,
                actual
            ),
        }
    }

    /// Asserts that an error message carries useful context
    pub fn verify_error_message_quality<T>(result: &Result<T>, context: &str) {
        if let Err(e) = result {
            let message = e.to_string();
            assert!(!message.is_empty(), "{}: error message should not be empty", context);
            assert!(message.len() > 10, "{}: error message too short: {}", context, message);
        } else {
            panic!("{}: expected an error", context);
        }
    }
}
