//! Device cache keyed by service tag.
//!
//! Entries never expire and are never overwritten: the first record stored
//! for a tag is the one every later lookup sees.

use dell_lookup_core::device::{format_date, parse_date};
use dell_lookup_core::{Config, DatabasePath, Device, Error, Result, ServiceTag};
use rusqlite::{named_params, params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// Storage for previously resolved devices.
///
/// `open` must precede every other call and `close` must follow the last one,
/// on failure paths too.
pub trait DeviceCache: Send {
    fn open(&mut self) -> Result<()>;
    fn get(&self, service_tag: &ServiceTag) -> Result<Option<Device>>;
    /// Stores `device` unless its tag is already cached.
    fn put(&mut self, device: &Device) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Pick the cache variant for this run. The cache still has to be opened.
pub fn select_cache(config: &Config, enabled: bool) -> Box<dyn DeviceCache> {
    if enabled {
        Box::new(SqliteDeviceCache::new(config.database_path.clone()))
    } else {
        info!("Device cache disabled");
        Box::new(DisabledDeviceCache)
    }
}

/// Cache that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDeviceCache;

impl DeviceCache for DisabledDeviceCache {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn get(&self, _service_tag: &ServiceTag) -> Result<Option<Device>> {
        Ok(None)
    }

    fn put(&mut self, _device: &Device) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// SQLite-backed cache, one row per service tag.
pub struct SqliteDeviceCache {
    path: DatabasePath,
    conn: Option<Connection>,
}

impl SqliteDeviceCache {
    pub fn new(path: DatabasePath) -> Self {
        Self { path, conn: None }
    }

    pub fn in_memory() -> Self {
        Self::new(DatabasePath::InMemory)
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::Storage("Device cache is not open".to_string()))
    }

    fn open_connection(path: &DatabasePath) -> Result<Connection> {
        match path {
            DatabasePath::InMemory => Connection::open_in_memory()
                .map_err(|e| Error::Storage(format!("Failed to open in-memory cache: {}", e))),
            DatabasePath::File(file) => {
                ensure_parent_dir(file)?;
                Connection::open(file).map_err(|e| {
                    Error::Storage(format!("Failed to open cache db {}: {}", file.display(), e))
                })
            }
        }
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS devices (
                service_tag TEXT PRIMARY KEY,
                device_type TEXT,
                name TEXT,
                warranty_type TEXT,
                warranty_expiration_date TEXT
            );
            ",
        )
        .map_err(|e| Error::Storage(format!("Failed to create cache schema: {}", e)))
    }
}

fn ensure_parent_dir(file: &Path) -> Result<()> {
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create cache directory: {}", e))
            })?;
        }
    }
    Ok(())
}

struct DeviceRow {
    service_tag: String,
    device_type: String,
    name: String,
    warranty_type: Option<String>,
    warranty_expiration_date: Option<String>,
}

impl DeviceRow {
    fn into_device(self) -> Result<Device> {
        let corrupt = |e: Error| {
            Error::Storage(format!("Corrupt cache row for {}: {}", self.service_tag, e))
        };

        let tag = ServiceTag::parse(&self.service_tag).map_err(corrupt)?;
        let date = self
            .warranty_expiration_date
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(corrupt)?;

        Device::from_parts(self.device_type.clone(), self.name.clone(), tag, self.warranty_type.clone(), date)
            .map_err(corrupt)
    }
}

impl DeviceCache for SqliteDeviceCache {
    fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = Self::open_connection(&self.path)?;
        Self::init_schema(&conn)?;
        info!(path = %self.path, "Device cache opened");
        self.conn = Some(conn);
        Ok(())
    }

    fn get(&self, service_tag: &ServiceTag) -> Result<Option<Device>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT service_tag, device_type, name, warranty_type, warranty_expiration_date
                 FROM devices WHERE service_tag = ?1",
                params![service_tag.as_str()],
                |row| {
                    Ok(DeviceRow {
                        service_tag: row.get(0)?,
                        device_type: row.get(1)?,
                        name: row.get(2)?,
                        warranty_type: row.get(3)?,
                        warranty_expiration_date: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::Storage(format!("Failed to read device {}: {}", service_tag, e)))?;

        match row {
            Some(row) => {
                debug!(service_tag = %service_tag, "Cache hit");
                row.into_device().map(Some)
            }
            None => {
                debug!(service_tag = %service_tag, "Cache miss");
                Ok(None)
            }
        }
    }

    fn put(&mut self, device: &Device) -> Result<()> {
        let conn = self.connection()?;
        let inserted = conn
            .execute(
                "INSERT INTO devices (
                    service_tag, device_type, name, warranty_type, warranty_expiration_date
                ) VALUES (
                    :service_tag, :device_type, :name, :warranty_type, :warranty_expiration_date
                ) ON CONFLICT DO NOTHING",
                named_params! {
                    ":service_tag": device.service_tag().as_str(),
                    ":device_type": device.device_type(),
                    ":name": device.name(),
                    ":warranty_type": device.warranty_type(),
                    ":warranty_expiration_date": device.warranty_expiration_date().map(format_date),
                },
            )
            .map_err(|e| {
                Error::Storage(format!("Failed to store device {}: {}", device.service_tag(), e))
            })?;

        if inserted == 0 {
            debug!(service_tag = %device.service_tag(), "Device already cached, keeping first record");
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, e)| Error::Storage(format!("Failed to close cache db: {}", e)))?;
            debug!(path = %self.path, "Device cache closed");
        }
        Ok(())
    }
}
