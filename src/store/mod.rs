//! Small persisted key/value state: the chosen policy and the last autofixed
//! payload, which expires after a TTL and is purged on the next read.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::{DatasetPayload, Policy};

pub const DEFAULT_FIXED_TTL: Duration = Duration::from_secs(60 * 60);

/// Cached autofixed payload. Timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedCopy {
    pub payload: DatasetPayload,
    pub saved_at: i64,
    pub expires_at: i64,
}

impl FixedCopy {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreState {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    policy: Option<Policy>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    fixed: Option<FixedCopy>,
}

#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    state: StoreState,
}

pub fn default_store_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/riskgate/store.json")
}

pub fn unix_ms(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}

impl Store {
    /// Opens the store at `path`. A missing file is an empty store; an
    /// unreadable one is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<StoreState>(&s) {
                Ok(state) => state,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "store is corrupt; starting empty");
                    StoreState::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read store: {}", path.display()));
            }
        };
        Ok(Self { path, state })
    }

    pub fn in_home(home_dir: &Path) -> Result<Self> {
        Self::open(default_store_path(home_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> Option<Policy> {
        self.state.policy
    }

    pub fn set_policy(&mut self, policy: Policy) -> Result<()> {
        self.state.policy = Some(policy);
        self.persist()
    }

    pub fn save_fixed(
        &mut self,
        payload: &DatasetPayload,
        now: OffsetDateTime,
        ttl: Duration,
    ) -> Result<FixedCopy> {
        let saved_at = unix_ms(now);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let copy = FixedCopy {
            payload: payload.clone(),
            saved_at,
            expires_at: saved_at.saturating_add(ttl_ms),
        };
        self.state.fixed = Some(copy.clone());
        self.persist()?;
        Ok(copy)
    }

    /// Returns the cached copy if still fresh. A stale entry is removed.
    pub fn fixed(&mut self, now: OffsetDateTime) -> Result<Option<FixedCopy>> {
        let now_ms = unix_ms(now);
        match &self.state.fixed {
            Some(copy) if copy.is_expired(now_ms) => {
                tracing::debug!(expires_at = copy.expires_at, now_ms, "purging stale fixed copy");
                self.state.fixed = None;
                self.persist()?;
                Ok(None)
            }
            other => Ok(other.clone()),
        }
    }

    /// Returns whether there was anything to clear.
    pub fn clear_fixed(&mut self) -> Result<bool> {
        if self.state.fixed.take().is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(&self.state).context("failed to encode store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .with_context(|| format!("failed to write store: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace store: {}", self.path.display()))?;
        Ok(())
    }
}
