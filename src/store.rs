//! Persisted snapshot store
//!
//! One JSON document: an ordered list of snapshot records, one per
//! observed display configuration plus any user layouts. A standing
//! sentinel record (no displays, phony = "Global") always exists.
//! Malformed records are dropped on load rather than aborting; a corrupt
//! or missing file starts a fresh document.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::constants;
use crate::snapshot::Snapshot;

pub struct SnapshotStore {
    path: PathBuf,
    pub snapshots: Vec<Snapshot>,
}

impl SnapshotStore {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path.push(constants::config::HISTORY_FILENAME);
        path
    }

    pub fn load(path: PathBuf) -> Self {
        let snapshots = match fs::read_to_string(&path) {
            Ok(contents) => parse_document(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no snapshot store yet, starting fresh");
                Vec::new()
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read snapshot store, starting fresh");
                Vec::new()
            }
        };
        let mut store = Self { path, snapshots };
        store.ensure_global_sentinel();
        store
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state directory {:?}", parent))?;
        }
        let json =
            serde_json::to_string(&self.snapshots).context("failed to serialize snapshot store")?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write snapshot store to {:?}", self.path))?;
        Ok(())
    }

    fn ensure_global_sentinel(&mut self) {
        if !self.snapshots.iter().any(|s| s.is_global()) {
            self.snapshots.push(Snapshot::global());
        }
    }
}

fn parse_document(contents: &str) -> Vec<Snapshot> {
    let records: Vec<Value> = match serde_json::from_str(contents) {
        Ok(records) => records,
        Err(err) => {
            warn!(%err, "snapshot store is not valid JSON, starting fresh");
            return Vec::new();
        }
    };
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Snapshot>(record) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(%err, "dropping malformed snapshot record");
                None
            }
        })
        .collect()
}
