//! MongoDB-backed budget store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, ReturnDocument};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument};

use crate::budget::{stored_date, BudgetEntry, BudgetPatch, NewBudget};
use crate::error::StoreError;

use super::BudgetStore;

/// Collection holding budget documents.
pub const COLLECTION_NAME: &str = "budgets";

/// Database used when neither config nor URI names one.
pub const DEFAULT_DATABASE: &str = "test";

/// Budget as stored in MongoDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub date: BsonDateTime,
}

impl TryFrom<BudgetDocument> for BudgetEntry {
    type Error = StoreError;

    fn try_from(document: BudgetDocument) -> Result<Self, Self::Error> {
        let date = from_bson_datetime(document.date).map_err(|reason| StoreError::Malformed {
            id: document.id.to_hex(),
            reason,
        })?;

        Ok(BudgetEntry {
            id: document.id.to_hex(),
            title: document.title,
            amount: document.amount,
            category: document.category,
            date,
        })
    }
}

fn to_bson_datetime(date: OffsetDateTime) -> BsonDateTime {
    BsonDateTime::from_millis((stored_date(date).unix_timestamp_nanos() / 1_000_000) as i64)
}

fn from_bson_datetime(date: BsonDateTime) -> Result<OffsetDateTime, String> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(date.timestamp_millis()) * 1_000_000)
        .map_err(|e| format!("date out of range: {e}"))
}

/// `$set` body for the supplied patch fields.
fn set_document(patch: &BudgetPatch) -> Document {
    let mut set = Document::new();
    if let Some(title) = &patch.title {
        set.insert("title", title.as_str());
    }
    if let Some(amount) = patch.amount {
        set.insert("amount", amount);
    }
    if let Some(category) = &patch.category {
        set.insert("category", category.as_str());
    }
    if let Some(date) = patch.date {
        set.insert("date", to_bson_datetime(date));
    }
    set
}

/// Ids that are not valid ObjectIds cannot match any document.
fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn into_entry(document: Option<BudgetDocument>) -> Result<Option<BudgetEntry>, StoreError> {
    document.map(BudgetEntry::try_from).transpose()
}

/// Resolved driver handles.
#[derive(Debug)]
struct Connection {
    /// Driver client; cheap to clone.
    client: Client,
    /// Database holding [`COLLECTION_NAME`].
    database: String,
    /// Typed handle to the budgets collection.
    collection: Collection<BudgetDocument>,
}

impl Connection {
    /// Parse `uri` and build a client. `mongodb+srv` URIs resolve DNS here.
    async fn open(uri: &str, database: Option<&str>) -> Result<Self, mongodb::error::Error> {
        let options = ClientOptions::parse(uri).await?;

        let database = database
            .map(str::to_owned)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(options)?;
        let collection = client.database(&database).collection(COLLECTION_NAME);

        debug!(%database, collection = COLLECTION_NAME, "MongoDB client created");

        Ok(Self {
            client,
            database,
            collection,
        })
    }
}

/// Budget store over a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoBudgetStore {
    /// Connection string, kept for deferred resolution.
    uri: String,
    /// Database name override.
    database: Option<String>,
    /// Set once the connection string has been resolved.
    connection: Arc<OnceCell<Connection>>,
}

impl MongoBudgetStore {
    /// Build a client from a connection string.
    ///
    /// Only a syntactically invalid connection string is an error. When
    /// resolution fails (for example the DNS lookup behind `mongodb+srv`),
    /// the failure is logged and retried on each later operation, which
    /// fails until it succeeds. The driver connects lazily, so an
    /// unreachable server is not reported here either; call
    /// [`BudgetStore::ping`] to verify connectivity.
    pub async fn connect(uri: &str, database: Option<&str>) -> Result<Self, StoreError> {
        let connection = match Connection::open(uri, database).await {
            Ok(connection) => Some(connection),
            Err(e) if matches!(*e.kind, ErrorKind::InvalidArgument { .. }) => {
                return Err(StoreError::Connect(e.to_string()));
            }
            Err(e) => {
                error!(error = %e, "MongoDB connection error");
                None
            }
        };

        Ok(Self {
            uri: uri.to_string(),
            database: database.map(str::to_owned),
            connection: Arc::new(OnceCell::new_with(connection)),
        })
    }

    /// Name of the database in use, once known.
    pub fn database(&self) -> Option<&str> {
        self.connection
            .get()
            .map(|connection| connection.database.as_str())
            .or(self.database.as_deref())
    }

    /// Whether the connection string has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.connection.initialized()
    }

    async fn connection(&self) -> Result<&Connection, StoreError> {
        self.connection
            .get_or_try_init(|| Connection::open(&self.uri, self.database.as_deref()))
            .await
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl BudgetStore for MongoBudgetStore {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<BudgetEntry>, StoreError> {
        let collection = &self.connection().await?.collection;
        let documents: Vec<BudgetDocument> =
            collection.find(doc! {}).await?.try_collect().await?;
        documents.into_iter().map(BudgetEntry::try_from).collect()
    }

    #[instrument(skip(self, budget), fields(title = %budget.title))]
    async fn insert(&self, budget: NewBudget) -> Result<BudgetEntry, StoreError> {
        let collection = &self.connection().await?.collection;
        let document = BudgetDocument {
            id: ObjectId::new(),
            title: budget.title,
            amount: budget.amount,
            category: budget.category,
            date: to_bson_datetime(budget.date),
        };

        collection.insert_one(&document).await?;
        BudgetEntry::try_from(document)
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        id: &str,
        patch: BudgetPatch,
    ) -> Result<Option<BudgetEntry>, StoreError> {
        let collection = &self.connection().await?.collection;
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let filter = doc! { "_id": oid };

        // An empty $set is rejected by the server.
        if patch.is_empty() {
            return into_entry(collection.find_one(filter).await?);
        }

        let updated = collection
            .find_one_and_update(filter, doc! { "$set": set_document(&patch) })
            .return_document(ReturnDocument::After)
            .await?;
        into_entry(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<Option<BudgetEntry>, StoreError> {
        let collection = &self.connection().await?.collection;
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        into_entry(collection.find_one_and_delete(doc! { "_id": oid }).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let connection = self.connection().await?;
        connection
            .client
            .database(&connection.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;
    use time::macros::datetime;

    #[test]
    fn document_converts_to_entry() {
        let id = ObjectId::new();
        let date = datetime!(2024-03-01 12:00:00.250 UTC);
        let document = BudgetDocument {
            id,
            title: "Rent".into(),
            amount: 1200.0,
            category: "Housing".into(),
            date: to_bson_datetime(date),
        };

        let entry = BudgetEntry::try_from(document).unwrap();
        assert_eq!(entry.id, id.to_hex());
        assert_eq!(entry.date, date);
        assert_eq!(entry.amount, 1200.0);
    }

    #[test]
    fn set_document_contains_only_supplied_fields() {
        let patch = BudgetPatch {
            amount: Some(500.0),
            category: Some("Utilities".into()),
            ..Default::default()
        };

        let set = set_document(&patch);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("amount"), Some(&Bson::Double(500.0)));
        assert_eq!(set.get_str("category").unwrap(), "Utilities");
        assert!(set.get("title").is_none());
    }

    #[test]
    fn document_with_integer_amount_and_version_key_deserializes() {
        let raw = doc! {
            "_id": ObjectId::new(),
            "title": "Phone",
            "amount": 45_i32,
            "category": "Bills",
            "date": BsonDateTime::now(),
            "__v": 0_i32,
        };

        let document: BudgetDocument = mongodb::bson::from_document(raw).unwrap();
        assert_eq!(document.amount, 45.0);
    }

    #[test]
    fn malformed_ids_match_nothing() {
        assert!(parse_id("not-an-object-id").is_none());
        assert!(parse_id("65f0c0ffee0000000000abcd").is_some());
    }

    #[tokio::test]
    async fn connect_rejects_invalid_uri() {
        let result = MongoBudgetStore::connect("not-a-mongo-uri", None).await;
        assert!(matches!(result, Err(StoreError::Connect(_))));
    }

    const UNRESOLVABLE_SRV_URI: &str = "mongodb+srv://cluster0.does-not-exist.invalid/";

    #[tokio::test]
    async fn connect_survives_dns_failure() {
        let store = MongoBudgetStore::connect(UNRESOLVABLE_SRV_URI, None)
            .await
            .unwrap();
        assert!(!store.is_resolved());
        assert_eq!(store.database(), None);

        assert!(matches!(store.ping().await, Err(StoreError::Driver(_))));
        assert!(store.list().await.is_err());
        assert!(store.delete("65f0c0ffee0000000000abcd").await.is_err());
        assert!(!store.is_resolved());
    }

    #[tokio::test]
    async fn unresolved_store_answers_requests_with_errors() {
        use std::sync::Arc;

        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        use crate::api::{create_router, AppState};

        let store = MongoBudgetStore::connect(UNRESOLVABLE_SRV_URI, Some("budgets"))
            .await
            .unwrap();
        assert_eq!(store.database(), Some("budgets"));
        let app = create_router(AppState::new(Arc::new(store)));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app
            .oneshot(Request::builder().uri("/api/budgets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn connect_picks_database_from_uri_then_default() {
        let store = MongoBudgetStore::connect("mongodb://localhost:27017/budgets_db", None)
            .await
            .unwrap();
        assert!(store.is_resolved());
        assert_eq!(store.database(), Some("budgets_db"));

        let store = MongoBudgetStore::connect("mongodb://localhost:27017", None)
            .await
            .unwrap();
        assert_eq!(store.database(), Some(DEFAULT_DATABASE));

        let store =
            MongoBudgetStore::connect("mongodb://localhost:27017/ignored", Some("override"))
                .await
                .unwrap();
        assert_eq!(store.database(), Some("override"));
    }
}
