//! JSON Lines backed key to tag cache.
//!
//! Store layout: one [`TagEntry`] per line, appended on every `put` and
//! `remove`. Later lines override earlier ones for the same key; a removal is
//! a tombstone line. `init` reloads the file, drops tombstones and entries the
//! [`RetentionPolicy`] no longer keeps for the new trading date, and rewrites
//! the file compacted.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};

/// Which entries from earlier trading dates survive `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Only entries written on the current trading date.
    #[default]
    CurrentDay,
    /// Entries written within the last `n` calendar days, today included.
    KeepDays(u32),
    /// Never evict.
    KeepAll,
}

impl RetentionPolicy {
    fn keeps(&self, age_days: i64) -> bool {
        match self {
            Self::CurrentDay => age_days == 0,
            Self::KeepDays(n) => age_days >= 0 && age_days < i64::from(*n),
            Self::KeepAll => true,
        }
    }
}

/// One persisted mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub key: String,
    pub tag: String,
    /// Trading date the entry was written on (`YYYYMMDD`).
    pub date: u32,
    /// Lifetime in days overriding the policy; 0 uses the policy.
    #[serde(default)]
    pub ttl: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub removed: bool,
}

impl TagEntry {
    fn retained(&self, today: NaiveDate, policy: RetentionPolicy) -> bool {
        let Some(written) = parse_date(self.date) else {
            return false;
        };
        let age = (today - written).num_days();
        if self.ttl > 0 {
            age >= 0 && age < i64::from(self.ttl)
        } else {
            policy.keeps(age)
        }
    }
}

fn parse_date(yyyymmdd: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        (yyyymmdd / 10_000) as i32,
        yyyymmdd / 100 % 100,
        yyyymmdd % 100,
    )
}

struct CacheState {
    path: PathBuf,
    trading_date: u32,
    entries: HashMap<String, TagEntry>,
    /// None when the store could not be opened; the cache then runs in memory.
    writer: Option<BufWriter<File>>,
}

/// Durable key to tag cache scoped to a trading date.
///
/// All methods take `&self`; the cache is shared between the order path and
/// the gateway event path.
pub struct TagCache {
    name: &'static str,
    policy: RetentionPolicy,
    state: Mutex<Option<CacheState>>,
}

impl TagCache {
    /// Create an uninitialized cache. `name` labels log lines.
    pub fn new(name: &'static str, policy: RetentionPolicy) -> Self {
        Self {
            name,
            policy,
            state: Mutex::new(None),
        }
    }

    /// Open the store at `path` for `trading_date`.
    ///
    /// Previous in-memory contents are discarded. Unreadable lines are
    /// skipped and reported through `on_warning`. If the date is invalid or
    /// the store cannot be read or rewritten, an error is returned and the
    /// cache keeps working in memory for the new date.
    pub fn init<F>(&self, path: impl AsRef<Path>, trading_date: u32, on_warning: F) -> CacheResult<()>
    where
        F: Fn(&str),
    {
        let mut state = CacheState {
            path: path.as_ref().to_path_buf(),
            trading_date,
            entries: HashMap::new(),
            writer: None,
        };
        let result = match parse_date(trading_date) {
            Some(today) => self.reload(&mut state, today, &on_warning),
            None => Err(CacheError::InvalidTradingDate(trading_date)),
        };
        *self.state.lock() = Some(state);
        result
    }

    fn reload<F>(&self, state: &mut CacheState, today: NaiveDate, on_warning: &F) -> CacheResult<()>
    where
        F: Fn(&str),
    {
        if let Some(parent) = state.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let loaded = self.load(&state.path, on_warning)?;
        let total = loaded.len();
        state.entries = loaded
            .into_iter()
            .filter(|(_, e)| !e.removed && e.retained(today, self.policy))
            .collect();

        state.writer = Some(Self::compact(&state.path, &state.entries)?);

        info!(
            cache = self.name,
            path = %state.path.display(),
            trading_date = state.trading_date,
            loaded = total,
            retained = state.entries.len(),
            "Tag cache initialized"
        );
        Ok(())
    }

    fn load<F>(&self, path: &Path, on_warning: &F) -> CacheResult<HashMap<String, TagEntry>>
    where
        F: Fn(&str),
    {
        let mut entries = HashMap::new();
        if !path.exists() {
            return Ok(entries);
        }

        let reader = BufReader::new(File::open(path)?);
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TagEntry>(&line) {
                Ok(entry) => {
                    entries.insert(entry.key.clone(), entry);
                }
                Err(e) => on_warning(&format!(
                    "[{}] skipping corrupt line {} in {}: {}",
                    self.name,
                    lineno + 1,
                    path.display(),
                    e
                )),
            }
        }
        Ok(entries)
    }

    /// Rewrite the store with only `entries` and reopen it for appending.
    fn compact(path: &Path, entries: &HashMap<String, TagEntry>) -> CacheResult<BufWriter<File>> {
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            let mut sorted: Vec<&TagEntry> = entries.values().collect();
            sorted.sort_by(|a, b| a.key.cmp(&b.key));
            for entry in sorted {
                writeln!(writer, "{}", serde_json::to_string(entry)?)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    /// Tag for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .as_ref()
            .and_then(|s| s.entries.get(key))
            .map(|e| e.tag.clone())
    }

    /// Insert or update `key`, persisting it immediately.
    ///
    /// `ttl_hint` is a lifetime in days (0 for the policy default). Storage
    /// failures go to `on_warning`; the in-memory entry is kept regardless.
    pub fn put<F>(&self, key: &str, tag: &str, ttl_hint: u32, on_warning: F)
    where
        F: Fn(&str),
    {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            on_warning(&format!("[{}] put before init, key {key} dropped", self.name));
            return;
        };

        let entry = TagEntry {
            key: key.to_string(),
            tag: tag.to_string(),
            date: state.trading_date,
            ttl: ttl_hint,
            removed: false,
        };
        if state.entries.get(key) == Some(&entry) {
            return;
        }

        match state.writer.as_mut() {
            Some(writer) => {
                if let Err(e) = Self::append(writer, &entry) {
                    on_warning(&format!(
                        "[{}] failed to persist {key} to {}: {e}",
                        self.name,
                        state.path.display()
                    ));
                }
            }
            None => on_warning(&format!("[{}] store unavailable, {key} kept in memory only", self.name)),
        }

        debug!(cache = self.name, key, tag, "Tag cached");
        state.entries.insert(entry.key.clone(), entry);
    }

    /// Remove `key`, persisting the removal.
    ///
    /// Storage failures go to `on_warning`; the in-memory entry is removed
    /// regardless.
    pub fn remove<F>(&self, key: &str, on_warning: F)
    where
        F: Fn(&str),
    {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return;
        };
        if state.entries.remove(key).is_none() {
            return;
        }

        let tombstone = TagEntry {
            key: key.to_string(),
            tag: String::new(),
            date: state.trading_date,
            ttl: 0,
            removed: true,
        };
        if let Some(writer) = state.writer.as_mut() {
            if let Err(e) = Self::append(writer, &tombstone) {
                on_warning(&format!(
                    "[{}] failed to persist removal of {key} to {}: {e}",
                    self.name,
                    state.path.display()
                ));
            }
        }
        debug!(cache = self.name, key, "Tag removed");
    }

    fn append(writer: &mut BufWriter<File>, entry: &TagEntry) -> CacheResult<()> {
        writeln!(writer, "{}", serde_json::to_string(entry)?)?;
        writer.flush()?;
        Ok(())
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().as_ref().map_or(0, |s| s.entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trading date of the last `init`.
    #[must_use]
    pub fn trading_date(&self) -> Option<u32> {
        self.state.lock().as_ref().map(|s| s.trading_date)
    }
}

impl std::fmt::Debug for TagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagCache")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}
