//! Check-in store.
//!
//! Keeps the user's location check-ins as one JSON array in a
//! [`KeyValueStore`], newest first. The whole collection is written back
//! after every mutation. A single writer is assumed; concurrent writers
//! would overwrite each other.

mod record;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fix::Coordinates;
use crate::storage::KeyValueStore;

pub use record::{time_ago, CheckinRecord};

/// Asks the user to approve a destructive action.
pub trait Confirmation {
    /// Return `true` if the user approves `prompt`.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Approves every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirmation for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// The persisted list of check-ins.
#[derive(Debug)]
pub struct CheckinStore<S: KeyValueStore> {
    store: S,
    key: String,
    records: Vec<CheckinRecord>,
}

impl<S: KeyValueStore> CheckinStore<S> {
    /// Load the collection stored under `key`.
    ///
    /// A missing value gives an empty collection. So does a value that fails
    /// to parse: it is logged and left in place until the next mutation
    /// overwrites it. Records repeating an earlier id are dropped, keeping
    /// the first (newest) occurrence.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself cannot be read.
    pub fn load(store: S, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let records = match store.get(&key)? {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<CheckinRecord>>(&raw) {
                Ok(records) => dedup_ids(&key, records),
                Err(e) => {
                    warn!(key = %key, error = %e, "Stored check-ins are corrupt, starting empty");
                    Vec::new()
                }
            },
        };

        debug!(key = %key, count = records.len(), "Loaded check-ins");
        Ok(Self {
            store,
            key,
            records,
        })
    }

    /// All check-ins, newest first.
    #[must_use]
    pub fn records(&self) -> &[CheckinRecord] {
        &self.records
    }

    /// Find a check-in by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CheckinRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Number of check-ins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if there are no check-ins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The underlying key-value store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record a check-in at the current time.
    ///
    /// # Errors
    ///
    /// See [`CheckinStore::add_at`].
    pub fn add(
        &mut self,
        display_name: &str,
        comment: &str,
        position: Option<Coordinates>,
    ) -> Result<CheckinRecord> {
        self.add_at(display_name, comment, position, Utc::now())
    }

    /// Record a check-in created at `now`.
    ///
    /// Name and comment are stored trimmed. The new record goes to the front
    /// of the collection and the collection is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name or comment is blank or no
    /// valid position is available, or a storage error if persisting fails.
    /// Nothing changes when an error is returned.
    pub fn add_at(
        &mut self,
        display_name: &str,
        comment: &str,
        position: Option<Coordinates>,
        now: DateTime<Utc>,
    ) -> Result<CheckinRecord> {
        let display_name = display_name.trim();
        let comment = comment.trim();

        if display_name.is_empty() {
            return Err(Error::validation("display name is required"));
        }
        if comment.is_empty() {
            return Err(Error::validation("comment is required"));
        }
        let position = position
            .ok_or_else(|| Error::validation("no current position is available"))?;
        if !position.is_valid() {
            return Err(Error::validation(format!(
                "position ({position}) is out of range"
            )));
        }

        let record = CheckinRecord {
            id: self.next_id(now)?,
            display_name: display_name.to_string(),
            comment: comment.to_string(),
            latitude: position.latitude,
            longitude: position.longitude,
            created_at: now,
        };

        self.records.insert(0, record.clone());
        if let Err(e) = self.persist() {
            self.records.remove(0);
            return Err(e);
        }

        info!(id = %record.id, name = %record.display_name, "Check-in recorded");
        Ok(record)
    }

    /// Delete the check-in with `id` once `confirmation` approves.
    ///
    /// Returns `true` if a record was removed. An unknown id or a declined
    /// confirmation leaves the collection untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the updated collection fails.
    pub fn remove(&mut self, id: &str, confirmation: &dyn Confirmation) -> Result<bool> {
        if !confirmation.confirm("Delete this check-in?") {
            debug!(id, "Check-in removal declined");
            return Ok(false);
        }

        let Some(index) = self.records.iter().position(|r| r.id == id) else {
            debug!(id, "No check-in with this id");
            return Ok(false);
        };

        let removed = self.records.remove(index);
        if let Err(e) = self.persist() {
            self.records.insert(index, removed);
            return Err(e);
        }

        info!(id, "Check-in removed");
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string(&self.records)?;
        self.store.set(&self.key, &json)
    }

    /// Creation time in epoch milliseconds, bumped past the newest id so ids
    /// stay unique when two check-ins share a millisecond.
    ///
    /// When the newest id cannot be bumped, the creation time itself is used
    /// as long as no record holds it yet.
    fn next_id(&self, now: DateTime<Utc>) -> Result<String> {
        let candidate = now.timestamp_millis();
        let newest = self
            .records
            .iter()
            .filter_map(|r| r.id.parse::<i64>().ok())
            .max();

        let id = match newest {
            Some(max) if candidate <= max => match max.checked_add(1) {
                Some(next) => next,
                None if self.get(&candidate.to_string()).is_none() => candidate,
                None => return Err(Error::validation("no unused check-in id is available")),
            },
            _ => candidate,
        };
        Ok(id.to_string())
    }
}

fn dedup_ids(key: &str, records: Vec<CheckinRecord>) -> Vec<CheckinRecord> {
    let mut seen = HashSet::new();
    let total = records.len();
    let unique: Vec<CheckinRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();

    if unique.len() < total {
        warn!(
            key,
            dropped = total - unique.len(),
            "Stored check-ins repeat ids, keeping the newest of each"
        );
    }
    unique
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::storage::Storage;

    const KEY: &str = "ubicuidado_user_locations";

    /// In-memory store that can be told to fail writes.
    #[derive(Debug, Default)]
    struct MemoryStore {
        values: RefCell<HashMap<String, String>>,
        fail_writes: Cell<bool>,
        writes: Cell<usize>,
    }

    impl KeyValueStore for &MemoryStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.values.borrow().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes.get() {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.writes.set(self.writes.get() + 1);
            self.values
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    struct Decline;

    impl Confirmation for Decline {
        fn confirm(&self, _prompt: &str) -> bool {
            false
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
    }

    fn mexico_city() -> Option<Coordinates> {
        Some(Coordinates::new(19.43, -99.13))
    }

    #[test]
    fn test_load_missing_is_empty() {
        let store = MemoryStore::default();
        let checkins = CheckinStore::load(&store, KEY).unwrap();
        assert!(checkins.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty_and_untouched() {
        let store = MemoryStore::default();
        store
            .values
            .borrow_mut()
            .insert(KEY.to_string(), "{not json".to_string());

        let checkins = CheckinStore::load(&store, KEY).unwrap();
        assert!(checkins.is_empty());
        assert_eq!(store.values.borrow().get(KEY).unwrap(), "{not json");
    }

    #[test]
    fn test_add_rejects_blank_name() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();

        let err = checkins
            .add("", "x", Some(Coordinates::new(1.0, 1.0)))
            .unwrap_err();
        assert!(err.is_validation_error());

        let err = checkins.add("   ", "x", mexico_city()).unwrap_err();
        assert!(err.is_validation_error());
        assert!(checkins.is_empty());
        assert_eq!(store.writes.get(), 0);
    }

    #[test]
    fn test_add_rejects_blank_comment() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();

        let err = checkins.add("Ann", " \t", mexico_city()).unwrap_err();
        assert!(err.to_string().contains("comment"));
    }

    #[test]
    fn test_add_requires_position() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();

        let err = checkins.add("Ann", "note", None).unwrap_err();
        assert!(err.to_string().contains("position"));

        let err = checkins
            .add("Ann", "note", Some(Coordinates::new(f64::NAN, 0.0)))
            .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_add_prepends_and_persists() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();

        let first = checkins.add_at("Bob", "first", mexico_city(), at(0)).unwrap();
        let second = checkins
            .add_at("  Ann ", " note ", Some(Coordinates::new(19.43, -99.13)), at(1))
            .unwrap();

        assert_eq!(checkins.records()[0], second);
        assert_eq!(checkins.records()[1], first);
        assert_eq!(second.display_name, "Ann");
        assert_eq!(second.comment, "note");
        assert_eq!(second.id, at(1).timestamp_millis().to_string());
        assert_eq!(store.writes.get(), 2);

        let reloaded = CheckinStore::load(&store, KEY).unwrap();
        assert_eq!(reloaded.records(), checkins.records());
    }

    #[test]
    fn test_add_same_millisecond_gets_unique_ids() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();

        let a = checkins.add_at("A", "one", mexico_city(), at(0)).unwrap();
        let b = checkins.add_at("B", "two", mexico_city(), at(0)).unwrap();
        let c = checkins
            .add_at("C", "three", mexico_city(), at(0) - Duration::seconds(5))
            .unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_add_rolls_back_on_write_failure() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();
        store.fail_writes.set(true);

        assert!(checkins.add("Ann", "note", mexico_city()).is_err());
        assert!(checkins.is_empty());
    }

    #[test]
    fn test_remove_existing() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();
        let record = checkins.add_at("Ann", "note", mexico_city(), at(0)).unwrap();

        assert!(checkins.remove(&record.id, &AssumeYes).unwrap());
        assert!(checkins.is_empty());
        assert_eq!(store.values.borrow().get(KEY).unwrap(), "[]");
    }

    #[test]
    fn test_remove_nonexistent_is_noop() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();
        checkins.add_at("Ann", "note", mexico_city(), at(0)).unwrap();
        let before = checkins.records().to_vec();
        let writes = store.writes.get();

        assert!(!checkins.remove("nonexistent-id", &AssumeYes).unwrap());
        assert_eq!(checkins.records(), before.as_slice());
        assert_eq!(store.writes.get(), writes);
    }

    #[test]
    fn test_remove_declined() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();
        let record = checkins.add_at("Ann", "note", mexico_city(), at(0)).unwrap();

        assert!(!checkins.remove(&record.id, &Decline).unwrap());
        assert!(checkins.get(&record.id).is_some());
    }

    #[test]
    fn test_remove_restores_on_write_failure() {
        let store = MemoryStore::default();
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();
        let record = checkins.add_at("Ann", "note", mexico_city(), at(0)).unwrap();
        store.fail_writes.set(true);

        assert!(checkins.remove(&record.id, &AssumeYes).is_err());
        assert_eq!(checkins.records()[0], record);
    }

    fn stored(records: &[CheckinRecord]) -> MemoryStore {
        let store = MemoryStore::default();
        store
            .values
            .borrow_mut()
            .insert(KEY.to_string(), serde_json::to_string(records).unwrap());
        store
    }

    fn record_with_id(id: &str, name: &str) -> CheckinRecord {
        CheckinRecord {
            id: id.to_string(),
            display_name: name.to_string(),
            comment: "note".to_string(),
            latitude: 19.43,
            longitude: -99.13,
            created_at: at(0),
        }
    }

    #[test]
    fn test_add_after_largest_possible_id() {
        let store = stored(&[record_with_id(&i64::MAX.to_string(), "Max")]);
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();

        let record = checkins.add_at("Ann", "note", mexico_city(), at(5)).unwrap();
        assert_eq!(record.id, at(5).timestamp_millis().to_string());
        assert_eq!(checkins.len(), 2);

        // The creation time is now taken as well
        let err = checkins
            .add_at("Bob", "again", mexico_city(), at(5))
            .unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(checkins.len(), 2);
    }

    #[test]
    fn test_load_drops_repeated_ids() {
        let store = stored(&[
            record_with_id("100", "newest"),
            record_with_id("99", "other"),
            record_with_id("100", "stale copy"),
        ]);
        let mut checkins = CheckinStore::load(&store, KEY).unwrap();

        assert_eq!(checkins.len(), 2);
        assert_eq!(checkins.get("100").unwrap().display_name, "newest");

        assert!(checkins.remove("100", &AssumeYes).unwrap());
        assert!(checkins.get("100").is_none());
        assert_eq!(checkins.len(), 1);
    }

    #[test]
    fn test_round_trip_through_sqlite() {
        let storage = Storage::open_in_memory().unwrap();
        let mut checkins = CheckinStore::load(storage, KEY).unwrap();
        checkins.add_at("Ann", "note", mexico_city(), at(3)).unwrap();
        checkins
            .add_at("Luis", "en la plaza", Some(Coordinates::new(19.4326, -99.1332)), at(7))
            .unwrap();
        let expected = checkins.records().to_vec();

        let raw = checkins.store().get(KEY).unwrap().unwrap();
        let decoded: Vec<CheckinRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, expected);
    }
}
