// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::name::Name;
use crate::store::KeyStore;
use crate::timeslot::Timeslot;

/// SQLite-backed key store.
///
/// Decryption keys are keyed by the URI form of their name, content keys by
/// the unix-millisecond value of their rounded hour.
#[derive(Debug)]
pub struct SqliteKeyStore {
    conn: Connection,
}

impl SqliteKeyStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens a store that lives only as long as the process.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS decryption_keys (
                 name TEXT PRIMARY KEY,
                 bits BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS content_keys (
                 hour_ms INTEGER PRIMARY KEY,
                 bits BLOB NOT NULL
             );",
        )?;
        Ok(Self { conn })
    }
}

impl KeyStore for SqliteKeyStore {
    type Error = rusqlite::Error;

    fn add_key(&mut self, name: &Name, bits: &[u8]) -> Result<(), Self::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO decryption_keys (name, bits) VALUES (?1, ?2)",
            params![name.to_string(), bits],
        )?;
        Ok(())
    }

    fn get_key(&self, name: &Name) -> Result<Option<Vec<u8>>, Self::Error> {
        self.conn
            .query_row(
                "SELECT bits FROM decryption_keys WHERE name = ?1",
                params![name.to_string()],
                |row| row.get(0),
            )
            .optional()
    }

    fn has_content_key(&self, timeslot: Timeslot) -> Result<bool, Self::Error> {
        Ok(self.get_content_key(timeslot)?.is_some())
    }

    fn add_content_key(&mut self, timeslot: Timeslot, bits: &[u8]) -> Result<(), Self::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO content_keys (hour_ms, bits) VALUES (?1, ?2)",
            params![timeslot.floor_hour().unix_millis(), bits],
        )?;
        Ok(())
    }

    fn get_content_key(&self, timeslot: Timeslot) -> Result<Option<Vec<u8>>, Self::Error> {
        self.conn
            .query_row(
                "SELECT bits FROM content_keys WHERE hour_ms = ?1",
                params![timeslot.floor_hour().unix_millis()],
                |row| row.get(0),
            )
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use crate::name::Name;
    use crate::store::KeyStore;
    use crate::timeslot::Timeslot;

    use super::SqliteKeyStore;

    #[test]
    fn round_trip() {
        let mut store = SqliteKeyStore::open_in_memory().unwrap();

        let name = Name::from("/c/key");
        store.add_key(&name, b"private bits").unwrap();
        assert_eq!(
            store.get_key(&name).unwrap(),
            Some(b"private bits".to_vec())
        );
        assert_eq!(store.get_key(&Name::from("/other")).unwrap(), None);

        let slot = Timeslot::from_iso("20240101T101500").unwrap();
        let same_hour = Timeslot::from_iso("20240101T104500").unwrap();
        store.add_content_key(slot, b"ckey").unwrap();
        assert!(store.has_content_key(same_hour).unwrap());
        assert_eq!(
            store.get_content_key(same_hour).unwrap(),
            Some(b"ckey".to_vec())
        );
    }
}
