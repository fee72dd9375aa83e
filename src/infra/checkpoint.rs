// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Writes module records into the model repository with burn's
// CompactRecorder (MessagePack, half precision).
//
// File naming convention:
//   <repository>/
//     checkpoint-0.mpk         ← graph after iteration 0
//     checkpoint-0-head.mpk    ← classification head, when attached
//     checkpoint-5.mpk
//     ...
//
// Saving is additive: a tag only ever touches its own files, so
// earlier checkpoints survive later ones. Saving the same tag
// twice overwrites that tag's files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};

use crate::error::{Error, Result};

const PREFIX: &str = "checkpoint-";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Save `module` as `checkpoint-<tag><suffix>.<ext>` and return the
    /// written path. The directory is created if missing.
    pub fn save<B: Backend, M: Module<B>>(&self, module: &M, tag: &str, suffix: &str) -> Result<PathBuf> {
        // the recorder replaces anything after a dot with its extension
        if tag.is_empty() || tag.contains(['.', '/', '\\']) {
            return Err(Error::InvalidInput(format!("checkpoint tag '{tag}' is not a plain name")));
        }
        fs::create_dir_all(&self.dir)?;

        let stem = self.dir.join(format!("{PREFIX}{tag}{suffix}"));
        CompactRecorder::new()
            .record(module.clone().into_record(), stem.clone())
            .map_err(|e| Error::Checkpoint(format!("cannot write '{}': {e}", stem.display())))?;

        let path = stem.with_extension(<CompactRecorder as FileRecorder<B>>::file_extension());
        tracing::debug!(path = %path.display(), "checkpoint written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = NdArray;

    fn linear() -> Linear<TestBackend> {
        LinearConfig::new(2, 2).init(&Default::default())
    }

    #[test]
    fn test_save_creates_directory_and_names_file_by_tag() {
        let root = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(root.path().join("repo"));

        let path = manager.save::<TestBackend, _>(&linear(), "3", "").unwrap();
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "checkpoint-3.mpk");
    }

    #[test]
    fn test_dotted_tag_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(root.path());
        assert!(matches!(
            manager.save::<TestBackend, _>(&linear(), "0.5", ""),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
