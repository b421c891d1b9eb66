//! JSON snapshot persistence for the in-memory engine.
//!
//! The whole tree is written to a temporary file in the target directory and
//! then renamed over the snapshot, so a crash mid-write leaves the previous
//! snapshot intact.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::state::TreeState;

/// Load a snapshot. Returns `Ok(None)` if the file does not exist.
pub(crate) fn read_snapshot(path: &Path) -> StoreResult<Option<TreeState>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = fs::File::open(path)?;
    let state: TreeState = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))?;
    if !state.nodes.contains_key(&state.root) {
        return Err(StoreError::Serialization(format!(
            "{}: snapshot has no root node",
            path.display()
        )));
    }
    debug!(path = %path.display(), nodes = state.nodes.len(), "loaded snapshot");
    Ok(Some(state))
}

/// Atomically replace the snapshot at `path`.
pub(crate) fn write_snapshot(path: &Path, state: &TreeState) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    debug!(path = %path.display(), nodes = state.nodes.len(), "wrote snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_snapshot(&dir.path().join("none.json")).unwrap().is_none());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tree.json");
        let state = TreeState::new();
        write_snapshot(&path, &state).unwrap();

        let loaded = read_snapshot(&path).unwrap().expect("snapshot should exist");
        assert_eq!(loaded.root, state.root);
        assert_eq!(loaded.nodes.len(), 1);
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        fs::write(&path, b"{ not json").unwrap();
        let err = read_snapshot(&path).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
