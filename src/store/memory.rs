// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

use crate::name::Name;
use crate::store::KeyStore;
use crate::timeslot::Timeslot;

/// In-memory key store for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: HashMap<Name, Vec<u8>>,
    content_keys: BTreeMap<i64, Vec<u8>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored content-key rows, one per hour.
    pub fn content_key_count(&self) -> usize {
        self.content_keys.len()
    }
}

impl KeyStore for MemoryKeyStore {
    type Error = Infallible;

    fn add_key(&mut self, name: &Name, bits: &[u8]) -> Result<(), Self::Error> {
        self.keys.insert(name.clone(), bits.to_vec());
        Ok(())
    }

    fn get_key(&self, name: &Name) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.keys.get(name).cloned())
    }

    fn has_content_key(&self, timeslot: Timeslot) -> Result<bool, Self::Error> {
        Ok(self
            .content_keys
            .contains_key(&timeslot.floor_hour().unix_millis()))
    }

    fn add_content_key(&mut self, timeslot: Timeslot, bits: &[u8]) -> Result<(), Self::Error> {
        self.content_keys
            .insert(timeslot.floor_hour().unix_millis(), bits.to_vec());
        Ok(())
    }

    fn get_content_key(&self, timeslot: Timeslot) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self
            .content_keys
            .get(&timeslot.floor_hour().unix_millis())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::name::Name;
    use crate::store::KeyStore;
    use crate::timeslot::Timeslot;

    use super::MemoryKeyStore;

    #[test]
    fn decryption_keys_by_name() {
        let mut store = MemoryKeyStore::new();
        let name = Name::from("/c/key");

        assert_eq!(store.get_key(&name).unwrap(), None);
        store.add_key(&name, b"bits").unwrap();
        assert_eq!(store.get_key(&name).unwrap(), Some(b"bits".to_vec()));
    }

    #[test]
    fn content_keys_share_an_hour() {
        let mut store = MemoryKeyStore::new();
        let five_past = Timeslot::from_iso("20240101T100500").unwrap();
        let five_to = Timeslot::from_iso("20240101T105500").unwrap();
        let next_hour = Timeslot::from_iso("20240101T110500").unwrap();

        store.add_content_key(five_past, b"key-10").unwrap();
        assert!(store.has_content_key(five_to).unwrap());
        assert_eq!(
            store.get_content_key(five_to).unwrap(),
            Some(b"key-10".to_vec())
        );

        assert!(!store.has_content_key(next_hour).unwrap());
        store.add_content_key(next_hour, b"key-11").unwrap();
        assert_eq!(store.content_key_count(), 2);
    }
}
