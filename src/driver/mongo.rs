/// # MongoDB Driver Module
///
/// MongoDB driver over the blocking `mongodb::sync` API.

use super::{
    ClientHandle, CollectionHandle, DatabaseHandle, Driver, DriverResult, UpdateOutcome,
};
use crate::core::db::ConnectionSettings;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, Tls, TlsOptions};
use mongodb::sync::{Client, Collection, Database};
use tracing::debug;

/// Driver backed by a real MongoDB deployment
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

/// Builds client options from the URI, then layers the explicit settings on top.
///
/// A configured CA bundle enables TLS. Without one the driver's bundled
/// root store is used whenever the URI asks for TLS.
pub fn client_options(settings: &ConnectionSettings) -> DriverResult<ClientOptions> {
    let mut options = ClientOptions::parse(settings.uri.as_str()).run()?;

    if let Some(ca_file) = &settings.tls_ca_file {
        let mut tls = match options.tls.take() {
            Some(Tls::Enabled(tls)) => tls,
            _ => TlsOptions::default(),
        };
        tls.ca_file_path = Some(ca_file.clone());
        options.tls = Some(Tls::Enabled(tls));
    }
    if let Some(app_name) = &settings.app_name {
        options.app_name = Some(app_name.clone());
    }
    if let Some(timeout) = settings.connect_timeout {
        options.connect_timeout = Some(timeout);
    }
    if let Some(timeout) = settings.server_selection_timeout {
        options.server_selection_timeout = Some(timeout);
    }
    Ok(options)
}

impl Driver for MongoDriver {
    fn connect(&self, settings: &ConnectionSettings) -> DriverResult<Box<dyn ClientHandle>> {
        let options = client_options(settings)?;
        let client = Client::with_options(options)?;

        if settings.ping_on_connect {
            client
                .database("admin")
                .run_command(doc! { "ping": 1 })
                .run()?;
            debug!("Ping succeeded");
        }
        Ok(Box::new(MongoClient { client }))
    }
}

struct MongoClient {
    client: Client,
}

impl ClientHandle for MongoClient {
    fn database(&self, name: &str) -> DriverResult<Box<dyn DatabaseHandle>> {
        Ok(Box::new(MongoDatabase {
            inner: self.client.database(name),
        }))
    }

    fn close(self: Box<Self>) {
        // Dropping the last client handle tears down its connection pools
        drop(self.client);
    }
}

struct MongoDatabase {
    inner: Database,
}

impl DatabaseHandle for MongoDatabase {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn collection(&self, name: &str) -> DriverResult<Box<dyn CollectionHandle>> {
        Ok(Box::new(MongoCollection {
            inner: self.inner.collection::<Document>(name),
        }))
    }
}

struct MongoCollection {
    inner: Collection<Document>,
}

impl CollectionHandle for MongoCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn insert_one(&self, document: Document) -> DriverResult<Bson> {
        let result = self.inner.insert_one(document).run()?;
        Ok(result.inserted_id)
    }

    fn insert_many(&self, documents: Vec<Document>, ordered: bool) -> DriverResult<Vec<Bson>> {
        let result = self.inner.insert_many(documents).ordered(ordered).run()?;
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    fn find(&self, filter: Document, limit: u64) -> DriverResult<Vec<Document>> {
        let mut action = self.inner.find(filter);
        if limit > 0 {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let cursor = action.run()?;
        let documents = cursor.collect::<mongodb::error::Result<Vec<Document>>>()?;
        Ok(documents)
    }

    fn update_one(&self, filter: Document, update: Document) -> DriverResult<UpdateOutcome> {
        let result = self.inner.update_one(filter, update).run()?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    fn update_many(&self, filter: Document, update: Document) -> DriverResult<UpdateOutcome> {
        let result = self.inner.update_many(filter, update).run()?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    fn delete_one(&self, filter: Document) -> DriverResult<u64> {
        Ok(self.inner.delete_one(filter).run()?.deleted_count)
    }

    fn delete_many(&self, filter: Document) -> DriverResult<u64> {
        Ok(self.inner.delete_many(filter).run()?.deleted_count)
    }
}
