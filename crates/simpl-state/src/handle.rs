//! SurrealDB connection setup
//!
//! Supports an in-memory engine (tests), an on-disk SurrealKV directory
//! (single-node deployments) and a remote endpoint with credentials.

use std::path::Path;

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::Result;

const DEFAULT_NAMESPACE: &str = "simpl";
const DEFAULT_DATABASE: &str = "eval";

/// Configuration for a remote SurrealDB connection
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "simpl")
    pub namespace: String,
    /// Database name (default: "eval")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl RemoteConfig {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "simpl")
    /// - SURREALDB_DATABASE (optional, default: "eval")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let mut config = Self::new(endpoint, username, password).with_root(is_root);
        if let Ok(ns) = std::env::var("SURREALDB_NAMESPACE") {
            config = config.with_namespace(ns);
        }
        if let Ok(db) = std::env::var("SURREALDB_DATABASE") {
            config = config.with_database(db);
        }
        Ok(config)
    }
}

/// Where the store should live.
#[derive(Debug, Clone)]
pub enum DbTarget {
    /// `mem://`, lost on exit.
    Memory,
    /// `surrealkv://<dir>`
    Local(std::path::PathBuf),
    /// Any URL understood by `engine::any` (no credentials).
    Url(String),
    Remote(RemoteConfig),
}

impl DbTarget {
    /// Resolve from the environment.
    ///
    /// Remote credentials win, then `SURREALDB_URL`, then the local
    /// directory if one is given, else in-memory.
    pub fn from_env(local_dir: Option<&Path>) -> Self {
        if let Ok(config) = RemoteConfig::from_env() {
            return DbTarget::Remote(config);
        }
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return DbTarget::Url(url);
        }
        match local_dir {
            Some(dir) => DbTarget::Local(dir.to_path_buf()),
            None => DbTarget::Memory,
        }
    }
}

/// Open a connection for `target`, select namespace/database and run migrations.
#[instrument(skip_all)]
pub async fn connect(target: &DbTarget) -> Result<Surreal<Any>> {
    let (url, namespace, database) = match target {
        DbTarget::Memory => (
            "mem://".to_string(),
            DEFAULT_NAMESPACE,
            DEFAULT_DATABASE,
        ),
        DbTarget::Local(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            (
                format!("surrealkv://{}", dir.display()),
                DEFAULT_NAMESPACE,
                DEFAULT_DATABASE,
            )
        }
        DbTarget::Url(url) => (url.clone(), DEFAULT_NAMESPACE, DEFAULT_DATABASE),
        DbTarget::Remote(config) => (
            config.endpoint.clone(),
            config.namespace.as_str(),
            config.database.as_str(),
        ),
    };

    info!(%url, namespace, database, "Connecting to SurrealDB");

    let db = surrealdb::engine::any::connect(&url)
        .await
        .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

    if let DbTarget::Remote(config) = target {
        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {e}")))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Database authentication failed: {e}")))?;
        }
    }

    db.use_ns(namespace)
        .use_db(database)
        .await
        .map_err(|e| {
            StateError::Connection(format!("Failed to select namespace/database: {}", e))
        })?;

    migrations::init_schema(&db)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

    info!("SurrealDB connected and schema initialized");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_dir_used_when_no_remote_env() {
        if std::env::var("SURREALDB_ENDPOINT").is_ok() || std::env::var("SURREALDB_URL").is_ok()
        {
            return;
        }
        let target = DbTarget::from_env(Some(Path::new("/tmp/simpl-db")));
        assert!(matches!(target, DbTarget::Local(ref p) if p == Path::new("/tmp/simpl-db")));
        assert!(matches!(DbTarget::from_env(None), DbTarget::Memory));
    }

    #[test]
    fn remote_config_builder_overrides_defaults() {
        let config = RemoteConfig::new("wss://db.example", "user", "pw")
            .with_namespace("ns")
            .with_database("db")
            .with_root(true);
        assert_eq!(config.namespace, "ns");
        assert_eq!(config.database, "db");
        assert!(config.is_root);
    }

    #[tokio::test]
    async fn memory_connection_runs_migrations_twice() {
        let db = connect(&DbTarget::Memory).await.expect("connect");
        migrations::init_schema(&db).await.expect("idempotent");
    }
}
