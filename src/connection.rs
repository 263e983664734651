//! Connection lifecycle for one dataset session
//!
//! This module owns pool setup from a [`ConnectionProfile`], identity
//! verification before mutating work, and idempotent shutdown.

use crate::config::DatasetConfig;
use crate::dsn::ConnectionProfile;
use crate::error::DatabaseError;
use crate::schema_queries::get_identity_query;
use crate::types::{ConnectionIdentity, ConnectionStatus, DatabaseType};
use secrecy::ExposeSecret;
use sqlx::pool::PoolOptions;
use sqlx::{AnyPool, Row};
use std::sync::atomic::{AtomicBool, Ordering};

/// Owns the connection of one session
///
/// One instance per session/request; two interleaved workflows must not share
/// one manager.
pub struct ConnectionManager {
    pool: AnyPool,
    profile: ConnectionProfile,
    config: DatasetConfig,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Establish a connection for `profile`
    ///
    /// This function:
    /// 1. Rejects dialects without a compiled driver
    /// 2. Installs sqlx drivers
    /// 3. Builds the pool from the session config
    /// 4. Pings the database and reads its identity
    ///
    /// # Errors
    /// `ConnectionError` on bad credentials, unreachable host or unsupported dialect
    pub async fn connect(
        profile: ConnectionProfile,
        config: &DatasetConfig,
    ) -> Result<Self, DatabaseError> {
        if !profile.dialect.has_driver() {
            return Err(DatabaseError::ConnectionError(format!(
                "unsupported dialect: no {} driver is available ({})",
                profile.dialect, profile
            )));
        }

        // Install database drivers for sqlx::any
        // This MUST be called before creating AnyPool or AnyConnection
        sqlx::any::install_default_drivers();

        log::info!("Connecting to {}", profile);

        let min_connections = 1.min(config.max_connections);
        let pool = PoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(min_connections)
            .acquire_timeout(config.acquire_timeout())
            // An in-memory SQLite database lives only as long as its connection
            .idle_timeout(None)
            .max_lifetime(None)
            .test_before_acquire(true)
            .connect(profile.to_connection_string().expose_secret())
            .await
            .map_err(|e| {
                DatabaseError::ConnectionError(format!("Failed to connect to {}: {}", profile, e))
            })?;

        let manager = Self {
            pool,
            profile,
            config: config.clone(),
            closed: AtomicBool::new(false),
        };

        let identity = manager.read_identity().await.map_err(|e| {
            DatabaseError::ConnectionError(format!("Connected but identity check failed: {}", e))
        })?;

        log::info!(
            "✓ Database connected ({}): {}",
            manager.profile.dialect,
            identity
        );

        Ok(manager)
    }

    /// Verify the connection and report who we are talking to
    ///
    /// Never fails: an unusable connection is reported as `connected = false`
    /// with the reason in `detail`.
    pub async fn verify(&self) -> ConnectionStatus {
        if self.is_closed() {
            return ConnectionStatus {
                connected: false,
                identity: None,
                detail: "No database connection available (closed)".to_string(),
            };
        }

        match self.read_identity().await {
            Ok(identity) => ConnectionStatus {
                connected: true,
                detail: format!(
                    "Connected to: server {}, database {}, user {}",
                    identity.server, identity.database, identity.user
                ),
                identity: Some(identity),
            },
            Err(e) => ConnectionStatus {
                connected: false,
                identity: None,
                detail: format!("Connection verification failed: {}", e),
            },
        }
    }

    /// Fail-closed guard run before every mutating operation
    pub async fn require_connection(&self) -> Result<ConnectionIdentity, DatabaseError> {
        let status = self.verify().await;
        match status.identity {
            Some(identity) if status.connected => Ok(identity),
            _ => Err(DatabaseError::ConnectionError(status.detail)),
        }
    }

    /// Release the pool; calling again is a no-op
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close().await;
        log::info!("Closed database connection to {}", self.profile);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.pool.is_closed()
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn db_type(&self) -> DatabaseType {
        self.profile.dialect
    }

    async fn read_identity(&self) -> Result<ConnectionIdentity, sqlx::Error> {
        match get_identity_query(self.db_type()) {
            Some(sql) => {
                let row = sqlx::query(sql).fetch_one(&self.pool).await?;
                Ok(ConnectionIdentity {
                    server: row.try_get::<Option<String>, _>("server_name")?.unwrap_or_default(),
                    database: row
                        .try_get::<Option<String>, _>("database_name")?
                        .unwrap_or_default(),
                    user: row.try_get::<Option<String>, _>("user_name")?.unwrap_or_default(),
                })
            }
            None => {
                // SQLite: liveness ping, identity comes from the profile
                sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
                Ok(ConnectionIdentity {
                    server: if self.profile.host.is_empty() {
                        "localhost".to_string()
                    } else {
                        self.profile.host.clone()
                    },
                    database: self.profile.database.clone(),
                    user: self
                        .profile
                        .username()
                        .unwrap_or("sqlite")
                        .to_string(),
                })
            }
        }
    }
}
