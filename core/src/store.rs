//! Durable storage of days and settings over a [`KeyValueStore`].
//!
//! Two keys are used: [`DAYS_KEY`] holds one JSON object mapping `YYYY-MM-DD`
//! to a day record, and [`SETTINGS_KEY`] holds the settings record. Records are
//! migrated on every read and written back in the current shape only when the
//! caller saves. Unreadable data about to be overwritten is first copied to a
//! key under [`BACKUP_PREFIX`].
//!
//! Public operations never fail. Reads fall back to `None` or defaults and
//! writes that cannot land are logged and dropped; see [`StoreError`] for what
//! gets logged at which level.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::backend::KeyValueStore;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::migrate::{merge_settings, migrate_day};
use crate::models::{Day, Settings, date_key};

pub const DAYS_KEY: &str = "carbs-tracker-days";
pub const SETTINGS_KEY: &str = "carbs-tracker-settings";
/// Prefix of keys holding copies of records that could not be read.
pub const BACKUP_PREFIX: &str = "carbs-tracker-days.corrupt-";

type DayMap = Map<String, Value>;

#[derive(Serialize)]
struct ExportDocument {
    days: BTreeMap<String, Day>,
    settings: Settings,
}

pub struct Store {
    backend: Option<Box<dyn KeyValueStore>>,
}

impl Store {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Some(Box::new(backend)),
        }
    }

    /// Store backed by a SQLite file, created if missing.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// A store with no medium behind it. Reads return defaults, writes do nothing.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    #[must_use]
    pub fn backend(&self) -> Option<&dyn KeyValueStore> {
        self.backend.as_deref()
    }

    fn medium(&self) -> StoreResult<&dyn KeyValueStore> {
        self.backend().ok_or(StoreError::StorageUnavailable)
    }

    // --- Days ---

    /// The stored day, or `None` if there is none or it cannot be read.
    pub fn load(&self, date: NaiveDate) -> Option<Day> {
        self.load_entry(date).unwrap_or_else(|err| {
            absorb("day_load", &err);
            None
        })
    }

    /// Like [`Store::load`], but reports why a present entry could not be
    /// read instead of folding it into `None`.
    pub fn load_entry(&self, date: NaiveDate) -> StoreResult<Option<Day>> {
        let days = read_days(self.medium()?)?;
        days.get(&date_key(date))
            .map(|value| migrate_day(date, value))
            .transpose()
    }

    /// Copy the raw entry stored under `date` aside so it survives being
    /// overwritten. Returns the backup key, or `None` if there was nothing to
    /// copy or the copy could not be written.
    pub fn backup_entry(&self, date: NaiveDate) -> Option<String> {
        self.try_backup_entry(date).unwrap_or_else(|err| {
            absorb("day_backup", &err);
            None
        })
    }

    fn try_backup_entry(&self, date: NaiveDate) -> StoreResult<Option<String>> {
        let backend = self.medium()?;
        let days = read_days(backend)?;
        let Some(value) = days.get(&date_key(date)) else {
            return Ok(None);
        };
        let backup = backup_key(&format!("{}-", date_key(date)));
        backend.set(&backup, &value.to_string())?;
        warn!("event=day_backup module=store status=ok date={date} key={backup}");
        Ok(Some(backup))
    }

    /// Keys of every copy made of an unreadable record, oldest first.
    pub fn backups(&self) -> Vec<String> {
        self.try_backups().unwrap_or_else(|err| {
            absorb("backups", &err);
            Vec::new()
        })
    }

    fn try_backups(&self) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .medium()?
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(BACKUP_PREFIX))
            .collect();
        keys.sort_by(|a, b| backup_stamp(a).cmp(backup_stamp(b)).then_with(|| a.cmp(b)));
        Ok(keys)
    }

    /// Every stored day, migrated. Entries that fail to migrate are skipped
    /// and left in storage untouched.
    pub fn load_all(&self) -> BTreeMap<NaiveDate, Day> {
        self.try_load_all().unwrap_or_else(|err| {
            absorb("day_load_all", &err);
            BTreeMap::new()
        })
    }

    fn try_load_all(&self) -> StoreResult<BTreeMap<NaiveDate, Day>> {
        let days = read_days(self.medium()?)?;
        let mut loaded = BTreeMap::new();
        for (key, value) in &days {
            let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") else {
                warn!("event=day_load_all module=store status=skipped reason=bad_date key={key}");
                continue;
            };
            // Point lookups only ever see the zero-padded key.
            if date_key(date) != *key {
                warn!(
                    "event=day_load_all module=store status=skipped reason=non_canonical_key key={key}"
                );
                continue;
            }
            match migrate_day(date, value) {
                Ok(day) => {
                    loaded.insert(date, day);
                }
                Err(err) => absorb("day_load_all", &err),
            }
        }
        Ok(loaded)
    }

    /// Insert or wholly replace the day stored under `day.date`.
    pub fn save(&self, day: &Day) {
        if let Err(err) = self.try_save(day) {
            absorb("day_save", &err);
        }
    }

    fn try_save(&self, day: &Day) -> StoreResult<()> {
        let backend = self.medium()?;
        let mut days = days_for_write(backend)?;
        let value = serde_json::to_value(day).map_err(|e| StoreError::malformed(day.key(), e))?;
        days.insert(day.key(), value);
        backend.set(DAYS_KEY, &Value::Object(days).to_string())
    }

    /// Remove a stored day. Does nothing if there is none. Removing the last
    /// day removes the days key itself.
    pub fn delete(&self, date: NaiveDate) {
        if let Err(err) = self.try_delete(date) {
            absorb("day_delete", &err);
        }
    }

    fn try_delete(&self, date: NaiveDate) -> StoreResult<()> {
        let backend = self.medium()?;
        let mut days = read_days(backend)?;
        if days.remove(&date_key(date)).is_none() {
            return Ok(());
        }
        if days.is_empty() {
            backend.remove(DAYS_KEY)
        } else {
            backend.set(DAYS_KEY, &Value::Object(days).to_string())
        }
    }

    // --- Settings ---

    /// Stored settings layered over [`Settings::default`].
    pub fn load_settings(&self) -> Settings {
        self.try_load_settings().unwrap_or_else(|err| {
            absorb("settings_load", &err);
            Settings::default()
        })
    }

    fn try_load_settings(&self) -> StoreResult<Settings> {
        let Some(raw) = self.medium()?.get(SETTINGS_KEY)? else {
            return Ok(Settings::default());
        };
        let value: Value =
            serde_json::from_str(&raw).map_err(|e| StoreError::malformed(SETTINGS_KEY, e))?;
        merge_settings(&value, Settings::default())
    }

    pub fn save_settings(&self, settings: &Settings) {
        if let Err(err) = self.try_save_settings(settings) {
            absorb("settings_save", &err);
        }
    }

    fn try_save_settings(&self, settings: &Settings) -> StoreResult<()> {
        let backend = self.medium()?;
        let raw =
            serde_json::to_string(settings).map_err(|e| StoreError::malformed(SETTINGS_KEY, e))?;
        backend.set(SETTINGS_KEY, &raw)
    }

    /// A fresh day from the current settings. Not persisted.
    pub fn create_default_day(&self, date: NaiveDate) -> Day {
        Day::from_settings(date, &self.load_settings())
    }

    // --- Export / import ---

    /// Pretty-printed JSON document of every readable day and the settings.
    pub fn export_all(&self) -> String {
        let doc = ExportDocument {
            days: self
                .load_all()
                .into_values()
                .map(|day| (day.key(), day))
                .collect(),
            settings: self.load_settings(),
        };
        serde_json::to_string_pretty(&doc).unwrap_or_else(|err| {
            error!("event=export module=store status=error error={err}");
            String::from("{}")
        })
    }

    /// Replace stored days and/or settings from an exported document.
    ///
    /// Each of `days` and `settings` is optional, but at least one must be
    /// given. Returns `false` without touching storage if the document is not
    /// a JSON object, a present section is not an object, or the write fails.
    pub fn import_all(&self, document: &str) -> bool {
        match self.try_import(document) {
            Ok(imported) => imported,
            Err(err) => {
                absorb("import", &err);
                false
            }
        }
    }

    fn try_import(&self, document: &str) -> StoreResult<bool> {
        let backend = self.medium()?;
        let doc = match serde_json::from_str::<Value>(document) {
            Ok(Value::Object(doc)) => doc,
            Ok(_) => {
                return Err(StoreError::MalformedImportDocument(
                    "expected a JSON object".to_string(),
                ));
            }
            Err(e) => return Err(StoreError::MalformedImportDocument(e.to_string())),
        };

        let mut writes = Vec::new();
        if let Some(days) = import_section(&doc, "days")? {
            writes.push((DAYS_KEY, days));
        }
        if let Some(settings) = import_section(&doc, "settings")? {
            writes.push((SETTINGS_KEY, settings));
        }
        if writes.is_empty() {
            warn!("event=import module=store status=skipped reason=no_sections");
            return Ok(false);
        }

        let entries: Vec<(&str, &str)> = writes.iter().map(|(k, v)| (*k, v.as_str())).collect();
        backend.set_many(&entries)?;
        info!(
            "event=import module=store status=ok sections={}",
            writes.len()
        );
        Ok(true)
    }
}

/// Compact JSON for a present, non-null section, or an error if it is not an object.
fn import_section(doc: &Map<String, Value>, name: &str) -> StoreResult<Option<String>> {
    match doc.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => Ok(Some(value.to_string())),
        Some(_) => Err(StoreError::MalformedImportDocument(format!(
            "`{name}` must be an object"
        ))),
    }
}

fn parse_days(raw: &str) -> StoreResult<DayMap> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(days)) => Ok(days),
        Ok(_) => Err(StoreError::malformed(DAYS_KEY, "expected a JSON object")),
        Err(e) => Err(StoreError::malformed(DAYS_KEY, e)),
    }
}

fn read_days(backend: &dyn KeyValueStore) -> StoreResult<DayMap> {
    match backend.get(DAYS_KEY)? {
        Some(raw) => parse_days(&raw),
        None => Ok(DayMap::new()),
    }
}

/// The stored day map to write into. An unreadable blob is copied aside to a
/// timestamped key first and replaced with an empty map.
fn days_for_write(backend: &dyn KeyValueStore) -> StoreResult<DayMap> {
    let Some(raw) = backend.get(DAYS_KEY)? else {
        return Ok(DayMap::new());
    };
    match parse_days(&raw) {
        Ok(days) => Ok(days),
        Err(err) => {
            let backup = backup_key("");
            warn!("event=day_save module=store status=backup key={backup} error={err}");
            backend.set(&backup, &raw)?;
            Ok(DayMap::new())
        }
    }
}

const BACKUP_STAMP: &str = "%Y%m%dT%H%M%S";

/// `BACKUP_PREFIX`, then `scope` (empty for the whole map, `YYYY-MM-DD-` for a
/// single entry), then a local timestamp.
fn backup_key(scope: &str) -> String {
    format!("{BACKUP_PREFIX}{scope}{}", Local::now().format(BACKUP_STAMP))
}

/// The timestamp suffix of a backup key.
fn backup_stamp(key: &str) -> &str {
    key.rsplit('-').next().unwrap_or(key)
}

fn absorb(event: &str, err: &StoreError) {
    match err {
        StoreError::StorageUnavailable => {
            debug!("event={event} module=store status=skipped reason=unavailable");
        }
        StoreError::MalformedRecord { .. } | StoreError::MalformedImportDocument(_) => {
            warn!("event={event} module=store status=malformed error={err}");
        }
        StoreError::QuotaExceeded { .. } | StoreError::Sqlite(_) => {
            error!("event={event} module=store status=error error={err}");
        }
    }
}
