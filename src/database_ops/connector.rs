//! Dual-store façade: one MongoDB client, one Postgres pool.
//!
//! Callers never touch the underlying handles for queries; they go through
//! `query_relational` / `query_document`, which retry with linear backoff.
//! The relational target is checked against [`SafetyPolicy`] before a pool is
//! opened.

use mongodb::bson::Document;
use serde::Serialize;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::Postgres;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database_ops::db::Db;
use crate::database_ops::documents::DocumentStore;
use crate::database_ops::retry::{Exhausted, RetryPolicy};
use crate::database_ops::safety::SafetyPolicy;
use crate::error::{ConfigError, StoreError};
use crate::util::env::{env_first, env_flag, env_opt, env_parse, relational_url};

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub mongo_uri: Option<String>,
    pub mongo_database: String,
    pub relational_url: Option<String>,
    /// Branch/environment name of the relational target, when known.
    pub branch: Option<String>,
    pub force_connection: bool,
    pub max_connections: u32,
    pub retry: RetryPolicy,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            mongo_uri: None,
            mongo_database: "catalog".to_string(),
            relational_url: None,
            branch: None,
            force_connection: false,
            max_connections: 20,
            retry: RetryPolicy::default(),
        }
    }
}

impl ConnectorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mongo_uri: env_opt("MONGODB_URI"),
            mongo_database: env_opt("MONGODB_DATABASE").unwrap_or(defaults.mongo_database),
            relational_url: relational_url(),
            branch: env_first(&["RELATIONAL_BRANCH", "NEON_BRANCH"]),
            force_connection: env_flag("FORCE_CONNECTION", false),
            max_connections: env_parse("DB_MAX_CONNS", defaults.max_connections),
            retry: RetryPolicy::from_env(),
        }
    }
}

/// Positional parameter for [`StoreConnector::query_relational`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    TextArray(Vec<String>),
    Uuid(Uuid),
    Float(f64),
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::TextArray(v) => query.bind(v.clone()),
            SqlParam::Uuid(v) => query.bind(*v),
            SqlParam::Float(v) => query.bind(*v),
        };
    }
    query
}

fn exhausted<E: Into<StoreError>>(operation: &str, e: Exhausted<E>) -> StoreError {
    StoreError::RetriesExhausted {
        operation: operation.to_string(),
        attempts: e.attempts,
        source: Box::new(e.last.into()),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreHealth {
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub document: StoreHealth,
    pub relational: StoreHealth,
}

impl HealthReport {
    pub fn all_ok(&self) -> bool {
        self.document.ok && self.relational.ok
    }
}

pub struct StoreConnector {
    config: ConnectorConfig,
    safety: SafetyPolicy,
    documents: Option<DocumentStore>,
    relational: Option<Db>,
}

impl StoreConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        let safety = SafetyPolicy::default().with_force(config.force_connection);
        Self {
            config,
            safety,
            documents: None,
            relational: None,
        }
    }

    pub fn from_env() -> Self {
        Self::new(ConnectorConfig::from_env())
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn is_document_connected(&self) -> bool {
        self.documents.is_some()
    }

    pub fn is_relational_connected(&self) -> bool {
        self.relational.is_some()
    }

    /// Connects to MongoDB, or returns the existing client.
    pub async fn connect_document_store(&mut self) -> Result<&DocumentStore, StoreError> {
        let store = match self.documents.take() {
            Some(store) => store,
            None => {
                let uri = self
                    .config
                    .mongo_uri
                    .as_deref()
                    .ok_or(ConfigError::Missing { key: "MONGODB_URI" })?;
                DocumentStore::connect(uri, &self.config.mongo_database).await?
            }
        };
        Ok(self.documents.insert(store))
    }

    /// Validates the relational target against the safety policy without connecting.
    pub fn check_relational_target(&self) -> Result<&str, ConfigError> {
        let url = self
            .config
            .relational_url
            .as_deref()
            .ok_or(ConfigError::Missing { key: "DATABASE_URL" })?;
        self.safety.check(url, self.config.branch.as_deref())?;
        Ok(url)
    }

    /// Connects to Postgres, or returns the existing pool. The safety policy runs first.
    pub async fn connect_relational_store(&mut self) -> Result<&Db, StoreError> {
        let db = match self.relational.take() {
            Some(db) => db,
            None => {
                let url = self.check_relational_target()?;
                Db::connect(url, self.config.max_connections).await?
            }
        };
        Ok(self.relational.insert(db))
    }

    pub fn relational(&self) -> Result<&Db, StoreError> {
        self.relational
            .as_ref()
            .ok_or(StoreError::NotConnected("relational"))
    }

    pub fn documents(&self) -> Result<&DocumentStore, StoreError> {
        self.documents
            .as_ref()
            .ok_or(StoreError::NotConnected("document"))
    }

    pub async fn query_relational(
        &self,
        statement: &str,
        params: &[SqlParam],
    ) -> Result<Vec<PgRow>, StoreError> {
        let pool = &self.relational()?.pool;
        self.config
            .retry
            .run("relational query", move || async move {
                bind_params(sqlx::query(statement).persistent(false), params)
                    .fetch_all(pool)
                    .await
            })
            .await
            .map_err(|e| exhausted("relational query", e))
    }

    /// Like `query_relational` but returns the affected row count.
    pub async fn execute_relational(
        &self,
        statement: &str,
        params: &[SqlParam],
    ) -> Result<u64, StoreError> {
        let pool = &self.relational()?.pool;
        self.config
            .retry
            .run("relational execute", move || async move {
                bind_params(sqlx::query(statement).persistent(false), params)
                    .execute(pool)
                    .await
                    .map(|done| done.rows_affected())
            })
            .await
            .map_err(|e| exhausted("relational execute", e))
    }

    /// Runs an aggregation pipeline against `collection`.
    pub async fn query_document(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        let store = self.documents()?;
        let operation = format!("document aggregate on {collection}");
        self.config
            .retry
            .run(&operation, move || async move { store.aggregate(collection, pipeline).await })
            .await
            .map_err(|e| exhausted(&operation, e))
    }

    /// Releases both stores. Never fails; problems are logged.
    pub async fn disconnect(&mut self) {
        if let Some(store) = self.documents.take() {
            match tokio::time::timeout(DISCONNECT_TIMEOUT, store.client.shutdown()).await {
                Ok(()) => info!("document store disconnected"),
                Err(_) => warn!(
                    timeout_secs = DISCONNECT_TIMEOUT.as_secs(),
                    "document store shutdown timed out; dropping client"
                ),
            }
        }
        if let Some(db) = self.relational.take() {
            db.close().await;
            info!("relational store disconnected");
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        let document = match &self.documents {
            None => StoreHealth {
                ok: false,
                detail: "not connected".to_string(),
            },
            Some(store) => match store.ping().await {
                Ok(()) => StoreHealth {
                    ok: true,
                    detail: "connected and responding".to_string(),
                },
                Err(e) => StoreHealth {
                    ok: false,
                    detail: format!("error: {e}"),
                },
            },
        };
        let relational = match &self.relational {
            None => StoreHealth {
                ok: false,
                detail: "not connected".to_string(),
            },
            Some(db) => match db.ping().await {
                Ok(()) => StoreHealth {
                    ok: true,
                    detail: "connected and responding".to_string(),
                },
                Err(e) => StoreHealth {
                    ok: false,
                    detail: format!("error: {e}"),
                },
            },
        };
        HealthReport {
            document,
            relational,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> ConnectorConfig {
        ConnectorConfig {
            relational_url: Some(url.to_string()),
            retry: RetryPolicy {
                max_attempts: 1,
                delay: Duration::ZERO,
            },
            ..ConnectorConfig::default()
        }
    }

    #[tokio::test]
    async fn production_target_is_rejected_before_connecting() {
        let mut connector =
            StoreConnector::new(config("postgresql://u:p@ep-x.neon.tech/catalog"));
        connector.config.branch = Some("production".to_string());
        let err = connector.connect_relational_store().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Config(ConfigError::BlockedEnvironment { .. })
        ));
        assert!(!connector.is_relational_connected());
        // Nothing was opened, so querying still reports "not connected".
        let err = connector.query_relational("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotConnected("relational")));
    }

    #[tokio::test]
    async fn missing_urls_are_configuration_errors() {
        let mut connector = StoreConnector::new(ConnectorConfig::default());
        let err = connector.connect_document_store().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Config(ConfigError::Missing { key: "MONGODB_URI" })
        ));
        let err = connector.connect_relational_store().await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn unmarked_target_needs_force_flag() {
        let url = "postgresql://u:p@db.internal.example.com/catalog";
        let connector = StoreConnector::new(config(url));
        assert!(matches!(
            connector.check_relational_target(),
            Err(ConfigError::UnconfirmedTarget { .. })
        ));

        let forced = StoreConnector::new(ConnectorConfig {
            force_connection: true,
            ..config(url)
        });
        assert_eq!(forced.check_relational_target().unwrap(), url);
    }

    #[tokio::test]
    async fn disconnect_and_health_tolerate_unopened_stores() {
        let mut connector = StoreConnector::new(ConnectorConfig::default());
        let report = connector.health_check().await;
        assert!(!report.all_ok());
        assert_eq!(report.document.detail, "not connected");
        connector.disconnect().await;
        connector.disconnect().await;
        assert!(!connector.is_document_connected());
    }

    #[tokio::test]
    async fn document_query_requires_connection() {
        let connector = StoreConnector::new(ConnectorConfig::default());
        let err = connector
            .query_document("m_product", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotConnected("document")));
    }
}
