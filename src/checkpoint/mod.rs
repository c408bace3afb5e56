//! Checkpoint and restore of trace files.
//!
//! A [`TraceCheckpoint`] is a plain serializable snapshot of a [`BtfFile`]:
//! its scale, header, dictionary, records and comments. Restoring replays
//! every record through [`BtfFile::append`], so a tampered or truncated
//! checkpoint is rejected instead of producing an inconsistent file.

use crate::registry::{IdHash, Registry};
use crate::trace::{BtfEntry, BtfFile, Comment, EntityType, TimeScale, TraceHeader};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// One dictionary row: hash, name and the entity type recorded for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub hash: IdHash,
    pub name: String,
    pub entity_type: Option<EntityType>,
}

/// Serializable snapshot of a [`BtfFile`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceCheckpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: String,

    /// When the checkpoint was taken
    pub timestamp: DateTime<Utc>,

    pub time_scale: TimeScale,
    pub header: TraceHeader,
    pub dictionary: Vec<DictionaryEntry>,
    pub entries: Vec<BtfEntry>,
    pub comments: Vec<Comment>,
}

impl TraceCheckpoint {
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        serde_json::from_str(json).map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        bincode::deserialize(bytes).map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))
    }
}

impl BtfFile {
    /// Snapshot this file.
    pub fn checkpoint(&self) -> TraceCheckpoint {
        TraceCheckpoint {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            time_scale: self.time_scale(),
            header: self.header().clone(),
            dictionary: self
                .registry()
                .iter()
                .map(|(hash, name, entity_type)| DictionaryEntry {
                    hash,
                    name: name.to_string(),
                    entity_type,
                })
                .collect(),
            entries: self.entries().to_vec(),
            comments: self.comments().to_vec(),
        }
    }

    /// Rebuild a file from a snapshot.
    ///
    /// Names registered after restore are hashed with the default FNV-1a
    /// function, whatever hashed the saved dictionary.
    pub fn restore(checkpoint: TraceCheckpoint) -> Result<BtfFile, CheckpointError> {
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }

        let mut registry = Registry::new();
        for row in checkpoint.dictionary {
            registry
                .insert(row.hash, row.name, row.entity_type)
                .map_err(CheckpointError::InvalidDictionary)?;
        }

        let mut file = BtfFile::with_registry(checkpoint.time_scale, registry);
        file.set_header(checkpoint.header);
        for (index, entry) in checkpoint.entries.into_iter().enumerate() {
            file.append(entry)
                .map_err(|error| CheckpointError::InvalidRecord { index, error })?;
        }
        for comment in checkpoint.comments {
            file.restore_comment(comment);
        }

        info!(checkpoint = %checkpoint.id, records = file.len(), "trace restored");
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LifecycleEvent;
    use crate::error::TraceError;
    use crate::trace::Tick;

    fn sample() -> BtfFile {
        let mut file = BtfFile::new(TimeScale::Micro);
        file.header_entry("model demo");
        file.stimulus_event(1, "tick").unwrap();
        file.process_event(1, EntityType::Task, "tick", "taskA", 0, LifecycleEvent::Activate)
            .unwrap();
        file.comment("dispatch");
        file.process_event(2, EntityType::Task, "core0", "taskA", 0, LifecycleEvent::Start)
            .unwrap();
        file.task_migration_event(3, "core0", "core1", "taskA", 0)
            .unwrap();
        file
    }

    fn rendered(file: &BtfFile) -> Vec<u8> {
        let mut out = Vec::new();
        file.write_btf(&mut out).unwrap();
        out
    }

    #[test]
    fn json_checkpoint_restores_the_same_trace() {
        let file = sample();
        let json = file.checkpoint().to_json().unwrap();

        let restored = BtfFile::restore(TraceCheckpoint::from_json(&json).unwrap()).unwrap();

        assert_eq!(rendered(&restored), rendered(&file));
        assert_eq!(restored.registry().len(), file.registry().len());
    }

    #[test]
    fn binary_checkpoint_restores_the_same_trace() {
        let file = sample();
        let bytes = file.checkpoint().to_bytes().unwrap();

        let restored = BtfFile::restore(TraceCheckpoint::from_bytes(&bytes).unwrap()).unwrap();

        assert_eq!(rendered(&restored), rendered(&file));
    }

    #[test]
    fn restored_stimulus_keeps_counting() {
        let mut restored = BtfFile::restore(sample().checkpoint()).unwrap();
        assert_eq!(restored.stimulus_event(4, "tick").unwrap(), 1);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut checkpoint = sample().checkpoint();
        checkpoint.version = 99;

        let err = BtfFile::restore(checkpoint).unwrap_err();
        assert_eq!(
            err,
            CheckpointError::UnsupportedVersion {
                found: 99,
                supported: CHECKPOINT_VERSION
            }
        );
    }

    #[test]
    fn missing_dictionary_row_is_rejected() {
        let mut checkpoint = sample().checkpoint();
        let core = checkpoint
            .dictionary
            .iter()
            .position(|row| row.name == "core1")
            .unwrap();
        let removed = checkpoint.dictionary.remove(core);

        let err = BtfFile::restore(checkpoint).unwrap_err();
        assert_eq!(
            err,
            CheckpointError::InvalidRecord {
                index: 3,
                error: TraceError::UnknownIdentifier(removed.hash),
            }
        );
    }

    #[test]
    fn reordered_records_are_rejected() {
        let mut checkpoint = sample().checkpoint();
        checkpoint.entries.swap(0, 3);

        let err = BtfFile::restore(checkpoint).unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn record_between_time_units_is_rejected() {
        let mut checkpoint = sample().checkpoint();
        let shifted = Tick::new(checkpoint.entries[3].time.ticks() + 1);
        checkpoint.entries[3].time = shifted;

        let err = BtfFile::restore(checkpoint).unwrap_err();
        assert_eq!(
            err,
            CheckpointError::InvalidRecord {
                index: 3,
                error: TraceError::SubUnitTime {
                    time: shifted,
                    scale: TimeScale::Micro,
                },
            }
        );
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            TraceCheckpoint::from_json("{"),
            Err(CheckpointError::DeserializationFailed(_))
        ));
        assert!(matches!(
            TraceCheckpoint::from_bytes(&[1, 2, 3]),
            Err(CheckpointError::DeserializationFailed(_))
        ));
    }
}
