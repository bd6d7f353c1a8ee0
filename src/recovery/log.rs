//! Append-only checkpoint log.
//!
//! A single binary file of length-prefixed records: one header, one
//! manifest, then one record per generated partition, then one record per
//! completed stats. The file is the sole resumption artifact after a crash;
//! a truncated tail record is detected and ignored so every record boundary
//! is a valid recovery point.

use crate::error::{Error, Result};
use crate::partition::ordered::Partition;
use crate::plan::GenerationMode;
use crate::stats::Stats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

/// Experiment configuration persisted as plain key/value pairs, so the log
/// stays readable across versions of the richer config types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentHeader {
    pub experiment_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub config: BTreeMap<String, String>,
}

/// Declared partition count and the generation mode that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub count: u64,
    pub mode: GenerationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LogRecord {
    Header(ExperimentHeader),
    Manifest(Manifest),
    Partition(Partition),
    Stats(Stats),
}

/// Append-side handle, bound to one experiment from planning to writing.
pub struct RecoveryWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RecoveryWriter {
    /// Create (truncating any previous log at `path`) and write the header.
    pub async fn create(path: &Path, header: &ExperimentHeader) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await?;
        let mut writer = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        };
        writer.append(&LogRecord::Header(header.clone())).await?;
        debug!(path = %writer.path.display(), "created recovery log");
        Ok(writer)
    }

    pub async fn write_manifest(&mut self, manifest: Manifest) -> Result<()> {
        self.append(&LogRecord::Manifest(manifest)).await
    }

    pub async fn write_partition(&mut self, partition: &Partition) -> Result<()> {
        self.append(&LogRecord::Partition(partition.clone())).await
    }

    pub async fn write_stats(&mut self, stats: &Stats) -> Result<()> {
        self.append(&LogRecord::Stats(stats.clone())).await
    }

    /// Frame one record and flush it; every append is a recovery point.
    async fn append(&mut self, record: &LogRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| Error::Checkpoint("record exceeds frame size".into()))?;
        self.writer.write_all(&len.to_le_bytes()).await?;
        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Delete a recovery log; called only on fully successful completion.
pub async fn remove(path: &Path) -> Result<()> {
    tokio::fs::remove_file(path).await?;
    debug!(path = %path.display(), "removed recovery log");
    Ok(())
}

/// Everything recoverable from a (possibly truncated) log.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredState {
    pub header: ExperimentHeader,
    pub manifest: Manifest,
    /// Partition records in log order (canonical generation order).
    pub partitions: Vec<Partition>,
    /// Stats records in collection order.
    pub stats: Vec<Stats>,
}

/// Read a checkpoint log for resumption.
///
/// Truncation mid-record is tolerated (the partial tail is dropped); a
/// malformed or missing header/manifest is a structural error surfaced as
/// [`Error::Recovery`].
pub async fn read(path: &Path) -> Result<RecoveredState> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Recovery(format!("cannot read {}: {e}", path.display())))?;

    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset + 4 <= bytes.len() {
        let len = u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("4 bytes"))
            as usize;
        let start = offset + 4;
        let end = match start.checked_add(len) {
            Some(end) if end <= bytes.len() => end,
            _ => {
                warn!(
                    offset,
                    "recovery log ends mid-record; dropping partial tail"
                );
                break;
            }
        };
        match serde_json::from_slice::<LogRecord>(&bytes[start..end]) {
            Ok(record) => records.push(record),
            Err(e) => {
                if records.is_empty() {
                    return Err(Error::Recovery(format!("malformed header record: {e}")));
                }
                warn!(offset, "undecodable record; treating as truncation point: {e}");
                break;
            }
        }
        offset = end;
    }
    if offset + 4 > bytes.len() && offset < bytes.len() {
        warn!("recovery log ends inside a length prefix; dropping partial tail");
    }

    let mut iter = records.into_iter();
    let header = match iter.next() {
        Some(LogRecord::Header(h)) => h,
        Some(_) => return Err(Error::Recovery("first record is not a header".into())),
        None => return Err(Error::Recovery("log contains no readable header".into())),
    };
    let manifest = match iter.next() {
        Some(LogRecord::Manifest(m)) => m,
        Some(_) => return Err(Error::Recovery("second record is not a manifest".into())),
        None => {
            return Err(Error::Recovery(
                "log ends before the partition manifest".into(),
            ))
        }
    };

    let mut partitions = Vec::new();
    let mut stats = Vec::new();
    for record in iter {
        match record {
            LogRecord::Partition(p) => {
                if !stats.is_empty() {
                    return Err(Error::Recovery(
                        "partition record found after stats records".into(),
                    ));
                }
                partitions.push(p);
            }
            LogRecord::Stats(s) => stats.push(s),
            LogRecord::Header(_) | LogRecord::Manifest(_) => {
                return Err(Error::Recovery("duplicate header or manifest record".into()))
            }
        }
    }

    if partitions.len() as u64 > manifest.count {
        return Err(Error::Recovery(format!(
            "log declares {} partitions but contains {}",
            manifest.count,
            partitions.len()
        )));
    }
    if stats.len() > partitions.len() {
        return Err(Error::Recovery(format!(
            "log contains {} stats for {} partitions",
            stats.len(),
            partitions.len()
        )));
    }

    debug!(
        declared = manifest.count,
        partitions = partitions.len(),
        stats = stats.len(),
        "read recovery log"
    );
    Ok(RecoveredState {
        header,
        manifest,
        partitions,
        stats,
    })
}
