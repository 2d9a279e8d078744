//! Persistence of decoded readings.
//!
//! The processor only sees [`TelemetryStore`]; the PostgreSQL and in-memory
//! stores are interchangeable behind it.

use crate::config::DatabaseConfig;
use crate::protocol::DecodedReading;
use async_trait::async_trait;
use deadpool_postgres::{Pool, PoolConfig, Runtime};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tracing::info;

const INSERT_TELEMETRY: &str = "INSERT INTO telemetry (
        timestamp, packet_id, packet_seq_ctrl, subsystem_id,
        temperature, battery, altitude, signal_strength
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create connection pool: {0}")]
    PoolSetup(#[from] deadpool_postgres::CreatePoolError),
    #[error("no database connection available: {0}")]
    Connection(#[from] deadpool_postgres::PoolError),
    #[error("database query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error("timestamp {0} cannot be represented")]
    Timestamp(u64),
    #[error("store unavailable")]
    Unavailable,
}

/// One `telemetry` row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: u64,
    pub packet_id: u16,
    pub packet_seq_ctrl: u16,
    pub subsystem_id: u16,
    pub temperature: f32,
    pub battery: f32,
    pub altitude: f32,
    pub signal: f32,
}

impl From<&DecodedReading> for TelemetryRecord {
    fn from(reading: &DecodedReading) -> Self {
        Self {
            timestamp: reading.secondary.timestamp,
            packet_id: reading.primary.packet_id,
            packet_seq_ctrl: reading.primary.sequence_control,
            subsystem_id: reading.secondary.subsystem_id,
            temperature: reading.payload.temperature,
            battery: reading.payload.battery,
            altitude: reading.payload.altitude,
            signal: reading.payload.signal,
        }
    }
}

impl TelemetryRecord {
    pub fn system_time(&self) -> Result<SystemTime, StorageError> {
        UNIX_EPOCH
            .checked_add(Duration::from_secs(self.timestamp))
            .ok_or(StorageError::Timestamp(self.timestamp))
    }
}

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Appends one row. Either the whole row is written or an error comes back.
    async fn append(&self, record: &TelemetryRecord) -> Result<(), StorageError>;
}

pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let mut pg = deadpool_postgres::Config::default();
        pg.host = Some(config.host.clone());
        pg.port = Some(config.port);
        pg.dbname = Some(config.name.clone());
        pg.user = Some(config.user.clone());
        pg.password = Some(config.password.clone());
        pg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = pg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        Ok(Self { pool })
    }

    /// Builds the pool and checks the database answers once.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let store = Self::new(config)?;
        store.ping().await?;
        info!(
            "Connected to database {} at {}:{}",
            config.name, config.host, config.port
        );
        Ok(store)
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for PostgresStore {
    async fn append(&self, record: &TelemetryRecord) -> Result<(), StorageError> {
        let timestamp = record.system_time()?;
        let packet_id = i32::from(record.packet_id);
        let packet_seq_ctrl = i32::from(record.packet_seq_ctrl);
        let subsystem_id = i32::from(record.subsystem_id);

        let client = self.pool.get().await?;
        let statement = client.prepare_cached(INSERT_TELEMETRY).await?;
        let params: [&(dyn ToSql + Sync); 8] = [
            &timestamp,
            &packet_id,
            &packet_seq_ctrl,
            &subsystem_id,
            &record.temperature,
            &record.battery,
            &record.altitude,
            &record.signal,
        ];
        client.execute(&statement, &params).await?;
        Ok(())
    }
}

impl core::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("PostgresStore")
            .field("max_size", &status.max_size)
            .field("size", &status.size)
            .finish()
    }
}

/// Bounded in-memory store. Oldest rows are evicted once `capacity` is reached.
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<VecDeque<TelemetryRecord>>,
    capacity: usize,
    available: AtomicBool,
}

impl MemoryStore {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            available: AtomicBool::new(true),
        }
    }

    /// While unavailable every append fails with [`StorageError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().await.iter().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn append(&self, record: &TelemetryRecord) -> Result<(), StorageError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        let mut records = self.records.lock().await;
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(*record);
        Ok(())
    }
}
