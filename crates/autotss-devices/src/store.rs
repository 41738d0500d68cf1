use std::sync::{Arc, Mutex, MutexGuard};

use autotss_core::types::{Device, UserId};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use crate::error::{DeviceError, Result};
use crate::types::UserRecord;

/// Flat per-user record store: one JSON device list and an enabled flag per
/// user.
pub trait DeviceStore: Send + Sync {
    /// Devices for `user`; empty when the user has no row.
    fn get_devices(&self, user: UserId) -> Result<Vec<Device>>;

    /// Replace the user's device list, creating the row (enabled) if needed.
    fn put_devices(&self, user: UserId, devices: &[Device]) -> Result<()>;

    /// Merge the `saved_blobs` of `updated` into the stored list, matching
    /// devices by ECID. Devices added or removed since `updated` was read are
    /// left as they are now. Returns how many records were appended.
    fn merge_saved_blobs(&self, user: UserId, updated: &[Device]) -> Result<usize>;

    /// Every enabled user with their devices, ordered by user id.
    fn get_enabled_users(&self) -> Result<Vec<UserRecord>>;

    fn get_user(&self, user: UserId) -> Result<Option<UserRecord>>;

    /// Returns false when the user has no row.
    fn set_enabled(&self, user: UserId, enabled: bool) -> Result<bool>;

    fn delete_user(&self, user: UserId) -> Result<bool>;

    /// Total devices across enabled users.
    fn count_enabled_devices(&self) -> Result<usize>;
}

pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves the connection itself usable.
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_devices(user: u64, json: &str) -> Result<Vec<Device>> {
    serde_json::from_str(json).map_err(|source| DeviceError::Corrupt { user, source })
}

impl DeviceStore for SqliteStore {
    fn get_devices(&self, user: UserId) -> Result<Vec<Device>> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT devices FROM autotss WHERE user = ?1",
                params![user.get() as i64],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => parse_devices(user.get(), &json),
            None => Ok(Vec::new()),
        }
    }

    fn put_devices(&self, user: UserId, devices: &[Device]) -> Result<()> {
        let json = serde_json::to_string(devices)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO autotss (user, devices, enabled, updated_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(user) DO UPDATE SET devices = ?2, updated_at = ?3",
            params![user.get() as i64, json, now],
        )?;
        debug!(%user, devices = devices.len(), "stored device list");
        Ok(())
    }

    fn merge_saved_blobs(&self, user: UserId, updated: &[Device]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let json: Option<String> = tx
            .query_row(
                "SELECT devices FROM autotss WHERE user = ?1",
                params![user.get() as i64],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            debug!(%user, "user removed during pass, nothing to merge");
            return Ok(0);
        };
        let mut current = parse_devices(user.get(), &json)?;

        let mut appended = 0;
        for device in current.iter_mut() {
            let Some(fresh) = updated.iter().find(|d| d.ecid == device.ecid) else {
                continue;
            };
            for blob in &fresh.saved_blobs {
                if device.record_saved(blob.clone()) {
                    appended += 1;
                }
            }
        }

        if appended > 0 {
            let now = chrono::Utc::now().to_rfc3339();
            tx.execute(
                "UPDATE autotss SET devices = ?2, updated_at = ?3 WHERE user = ?1",
                params![user.get() as i64, serde_json::to_string(&current)?, now],
            )?;
        }
        tx.commit()?;
        debug!(%user, appended, "merged saved blobs");
        Ok(appended)
    }

    fn get_enabled_users(&self) -> Result<Vec<UserRecord>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT user, devices FROM autotss WHERE enabled = 1 ORDER BY user")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut users = Vec::with_capacity(rows.len());
        for (id, json) in rows {
            let id = id as u64;
            // One unreadable row must not hide every other user from a batch.
            match parse_devices(id, &json) {
                Ok(devices) => users.push(UserRecord {
                    user: UserId(id),
                    devices,
                    enabled: true,
                }),
                Err(e) => warn!(user = id, error = %e, "skipping user with unreadable devices"),
            }
        }
        Ok(users)
    }

    fn get_user(&self, user: UserId) -> Result<Option<UserRecord>> {
        let conn = self.conn();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT devices, enabled FROM autotss WHERE user = ?1",
                params![user.get() as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((json, enabled)) = row else {
            return Ok(None);
        };
        Ok(Some(UserRecord {
            user,
            devices: parse_devices(user.get(), &json)?,
            enabled: enabled != 0,
        }))
    }

    fn set_enabled(&self, user: UserId, enabled: bool) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let n = self.conn().execute(
            "UPDATE autotss SET enabled = ?2, updated_at = ?3 WHERE user = ?1",
            params![user.get() as i64, enabled as i64, now],
        )?;
        Ok(n > 0)
    }

    fn delete_user(&self, user: UserId) -> Result<bool> {
        let n = self.conn().execute(
            "DELETE FROM autotss WHERE user = ?1",
            params![user.get() as i64],
        )?;
        Ok(n > 0)
    }

    fn count_enabled_devices(&self) -> Result<usize> {
        let total: i64 = self.conn().query_row(
            "SELECT COALESCE(SUM(json_array_length(devices)), 0) FROM autotss WHERE enabled = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(total as usize)
    }
}
