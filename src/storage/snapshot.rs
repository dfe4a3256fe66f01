//! JSON snapshot persistence
//!
//! The store is in-memory; a snapshot file lets the server survive
//! restarts. Snapshots are written to a temporary file and renamed into
//! place, so a crash mid-write leaves the previous snapshot intact.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::MetricDatum;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// File name of the snapshot inside the data directory
pub const SNAPSHOT_FILE_NAME: &str = "metrics-snapshot.json";

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    created_at: i64,
    datums: Vec<MetricDatum>,
}

/// Path of the snapshot file inside `data_dir`
pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_FILE_NAME)
}

/// Write `datums` to `path`, replacing any existing snapshot
pub fn write_snapshot(path: &Path, datums: Vec<MetricDatum>) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let count = datums.len();
    let file = SnapshotFile {
        version: SNAPSHOT_VERSION,
        created_at: crate::types::now_millis(),
        datums,
    };

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(fs::File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, &file)?;
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;

    info!(path = %path.display(), datums = count, "Wrote metrics snapshot");
    Ok(count)
}

/// Read a snapshot from `path`
///
/// A missing file is an empty snapshot. Every datum is re-validated, so a
/// hand-edited file cannot smuggle in a datum breaking the store invariants.
pub fn read_snapshot(path: &Path) -> Result<Vec<MetricDatum>> {
    if !path.exists() {
        debug!(path = %path.display(), "No snapshot found");
        return Ok(Vec::new());
    }

    let reader = BufReader::new(fs::File::open(path)?);
    let file: SnapshotFile = serde_json::from_reader(reader)?;

    if file.version != SNAPSHOT_VERSION {
        return Err(Error::Serialization(format!(
            "Unsupported snapshot version {} in {}",
            file.version,
            path.display()
        )));
    }

    for datum in &file.datums {
        datum.identity.validate()?;
        datum.aggregate.validate()?;
    }

    info!(path = %path.display(), datums = file.datums.len(), "Read metrics snapshot");
    Ok(file.datums)
}
