//! Save files on disk.
//!
//! Every write goes to a temporary sibling first and is renamed over the
//! target only once complete, so an interrupted save keeps the old file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::body::SnapshotError;
use crate::codec::CodecError;
use crate::scores::HighScores;
use crate::session::{SessionState, Simulation};

/// Default high-score file name.
pub const DEFAULT_SAVE_FILE: &str = "gravity.save";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt save data: {0}")]
    Codec(#[from] CodecError),
    #[error("corrupt world data: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("session encoding failed: {0}")]
    Encoding(#[from] postcard::Error),
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces `path` with `data` via a temporary file and rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let temp = temp_path(path);
    let result = fs::write(&temp, data).and_then(|()| fs::rename(&temp, path));
    if let Err(source) = result {
        let _ = fs::remove_file(&temp);
        return Err(io_error(path, source));
    }
    tracing::debug!(path = %path.display(), bytes = data.len(), "file saved");
    Ok(())
}

/// Reads `path`; a missing file is `Ok(None)`.
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "no save file");
            Ok(None)
        }
        Err(e) => Err(io_error(path, e)),
    }
}

pub fn save_high_scores(path: &Path, scores: &HighScores) -> Result<(), StorageError> {
    let mut data = Vec::new();
    scores.save(&mut data)?;
    write_atomic(path, &data)
}

pub fn load_high_scores(path: &Path) -> Result<Option<HighScores>, StorageError> {
    read_optional(path)?
        .map(|data| HighScores::load(&mut data.as_slice()).map_err(StorageError::from))
        .transpose()
}

/// On-disk form of a session: scalar state plus the encoded world.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    state: SessionState,
    world: Vec<u8>,
}

pub fn save_session(path: &Path, sim: &Simulation) -> Result<(), StorageError> {
    let mut world = Vec::new();
    sim.save_world(&mut world)?;
    let file = SessionFile {
        state: sim.state(),
        world,
    };
    write_atomic(path, &postcard::to_allocvec(&file)?)
}

/// Restores a session saved with [`save_session`]. Returns `false` if there
/// is no file. On error `sim` is left as it was.
pub fn load_session(path: &Path, sim: &mut Simulation, now: f64) -> Result<bool, StorageError> {
    let Some(data) = read_optional(path)? else {
        return Ok(false);
    };
    let file: SessionFile = postcard::from_bytes(&data)?;
    sim.load_world(&mut file.world.as_slice())?;
    sim.restore_state(file.state, now);
    tracing::info!(path = %path.display(), "session loaded");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{scratch_path, simulation};

    #[test]
    fn test_missing_file_is_none() {
        let path = scratch_path("missing");
        assert!(read_optional(&path).unwrap().is_none());
        assert!(load_high_scores(&path).unwrap().is_none());
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let path = scratch_path("atomic");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(read_optional(&path).unwrap().unwrap(), b"second");
        assert!(!temp_path(&path).exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_failed_write_keeps_nothing_behind() {
        let path = scratch_path("no-such-dir").join("file.save");
        let err = write_atomic(&path, b"data").unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_high_scores_file() {
        let path = scratch_path("scores");
        let mut scores = HighScores::new();
        scores.insert(4200);
        save_high_scores(&path, &scores).unwrap();
        assert_eq!(load_high_scores(&path).unwrap(), Some(scores));

        fs::write(&path, [1, 2, 3]).unwrap();
        assert!(matches!(load_high_scores(&path), Err(StorageError::Codec(_))));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_session_file_roundtrip() {
        let path = scratch_path("session");
        let mut sim = simulation();
        sim.request_step();
        sim.advance(0.005, 0.0);
        save_session(&path, &sim).unwrap();

        let mut restored = Simulation::new(sim.viewport, 120, 0.0);
        assert!(load_session(&path, &mut restored, 3.0).unwrap());
        assert_eq!(restored.state(), sim.state());
        assert_eq!(restored.arena.len(), 2);
        fs::remove_file(&path).unwrap();
    }
}
