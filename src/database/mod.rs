use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;

use crate::utils::{AppError, AppResult};

pub const USERS: &str = "users";
pub const APPOINTMENTS: &str = "appointments";
pub const CONVERSATIONS: &str = "conversations";
pub const MEDICAL_REPORTS: &str = "medical_reports";

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        let db_name = database_name_from_uri(uri);
        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the handlers query on
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();
        // Only documents carrying the key take part in the uniqueness check
        let unique_sparse = || IndexOptions::builder().unique(true).sparse(true).build();

        let indexes: Vec<(&str, Document, Option<IndexOptions>)> = vec![
            (USERS, doc! { "email": 1 }, Some(unique())),
            (USERS, doc! { "user_id": 1 }, Some(unique())),
            (USERS, doc! { "role": 1, "is_verified": 1 }, None),
            (APPOINTMENTS, doc! { "patient_id": 1, "date": 1 }, None),
            (APPOINTMENTS, doc! { "doctor_id": 1, "date": 1, "time": 1 }, None),
            (APPOINTMENTS, doc! { "slot_key": 1 }, Some(unique_sparse())),
            (APPOINTMENTS, doc! { "payment.order_id": 1 }, None),
            (CONVERSATIONS, doc! { "participants": 1, "last_message_at": -1 }, None),
            (CONVERSATIONS, doc! { "pair_key": 1 }, Some(unique())),
            (MEDICAL_REPORTS, doc! { "patient_id": 1 }, None),
            (MEDICAL_REPORTS, doc! { "doctor_id": 1 }, None),
        ];

        for (collection, keys, options) in indexes {
            let label = format!("{}({})", collection, keys.keys().cloned().collect::<Vec<_>>().join(", "));
            let model = IndexModel::builder().keys(keys).options(options).build();

            match self.collection::<Document>(collection).create_index(model).await {
                Ok(_) => log::info!("   ✅ Index created: {}", label),
                Err(e) => log::debug!("   ℹ️  Index already exists: {} ({})", label, e),
            }
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub async fn ping(&self) -> bool {
        self.db.run_command(doc! { "ping": 1 }).await.is_ok()
    }
}

/// Parses a hex ObjectId from a path segment, naming the entity in the error
pub fn parse_object_id(id: &str, entity: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| AppError::InvalidRequest(format!("Invalid {} ID", entity)))
}

/// True when a write failed on a unique index
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == 11000
    )
}

/// Database name is the URI path segment, defaulting to "medimate"
fn database_name_from_uri(uri: &str) -> String {
    let without_scheme = uri.split("://").nth(1).unwrap_or(uri);
    without_scheme
        .split_once('/')
        .map(|(_, rest)| rest.split('?').next().unwrap_or(""))
        .filter(|name| !name.is_empty())
        .unwrap_or("medimate")
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Connects to the test database for tests marked `#[ignore]`
    pub(crate) async fn test_db() -> MongoDB {
        dotenv::dotenv().ok();
        let uri = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/medimate_test".to_string());
        MongoDB::new(&uri).await.expect("MongoDB must be running for ignored tests")
    }

    #[test]
    fn test_database_name_from_uri() {
        assert_eq!(database_name_from_uri("mongodb://localhost:27017/clinic"), "clinic");
        assert_eq!(
            database_name_from_uri("mongodb+srv://u:p@cluster.example.net/prod?retryWrites=true"),
            "prod"
        );
        assert_eq!(database_name_from_uri("mongodb://localhost:27017"), "medimate");
        assert_eq!(database_name_from_uri("mongodb://localhost:27017/?tls=true"), "medimate");
    }

    #[test]
    fn test_parse_object_id() {
        assert!(parse_object_id("65f1c0ffee0000000000abcd", "appointment").is_ok());
        match parse_object_id("nope", "appointment") {
            Err(AppError::InvalidRequest(msg)) => assert_eq!(msg, "Invalid appointment ID"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection() {
        let db = test_db().await;
        assert!(db.ping().await);
    }
}
