//! Artifact stores
//!
//! Stores persist whole [`ArtifactBundle`]s. A save either replaces the
//! previous bundle completely or leaves it untouched.

use crate::bundle::ArtifactBundle;
use churnguard_core::{Error, Result};
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the bundle inside an artifact directory
pub const BUNDLE_FILE_NAME: &str = "churnguard-bundle.json";

/// Persistence for paired training artifacts
pub trait ArtifactStore: Send + Sync {
    /// Persist a bundle, replacing any previous one
    fn save(&self, bundle: &ArtifactBundle) -> Result<()>;

    /// Load and verify the most recently saved bundle
    fn load(&self) -> Result<ArtifactBundle>;
}

/// Stores the bundle as a single JSON file in a directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Artifact directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the bundle file
    pub fn bundle_path(&self) -> PathBuf {
        self.dir.join(BUNDLE_FILE_NAME)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, bundle: &ArtifactBundle) -> Result<()> {
        bundle.verify()?;
        fs::create_dir_all(&self.dir)?;

        let json = bundle.to_json()?;
        let tmp = self
            .dir
            .join(format!(".{BUNDLE_FILE_NAME}.{}.tmp", bundle.run_id));

        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, self.bundle_path())
        })();

        if let Err(e) = written {
            // Best effort: a leftover temp file is harmless but untidy.
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            run_id = %bundle.run_id,
            fingerprint = bundle.manifest.fingerprint(),
            path = %self.bundle_path().display(),
            "artifact bundle saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<ArtifactBundle> {
        let path = self.bundle_path();
        debug!(path = %path.display(), "loading artifact bundle");
        let json = fs::read_to_string(&path)?;
        let bundle = ArtifactBundle::from_json(&json)?;
        info!(
            run_id = %bundle.run_id,
            fingerprint = bundle.manifest.fingerprint(),
            "artifact bundle loaded"
        );
        Ok(bundle)
    }
}

/// Keeps the serialized bundle in memory
///
/// Bundles go through the same JSON form as on disk, so loading exercises
/// the same verification path.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    slot: Mutex<Option<String>>,
}

impl MemoryArtifactStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a bundle has been saved
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save(&self, bundle: &ArtifactBundle) -> Result<()> {
        bundle.verify()?;
        let json = bundle.to_json()?;
        *self.slot.lock() = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<ArtifactBundle> {
        let guard = self.slot.lock();
        let json = guard
            .as_deref()
            .ok_or_else(|| Error::config("no artifact bundle has been saved"))?;
        ArtifactBundle::from_json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BUNDLE_FORMAT_VERSION;
    use crate::config::TrainingConfig;
    use crate::training::TrainingPipeline;
    use churnguard_core::fixtures::sample_batch;
    use churnguard_core::SchemaRegistry;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn bundle() -> ArtifactBundle {
        TrainingPipeline::new(
            Arc::new(SchemaRegistry::telco().unwrap()),
            TrainingConfig::default(),
        )
        .unwrap()
        .run(sample_batch(100))
        .unwrap()
    }

    #[test]
    fn test_fs_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().join("artifacts"));
        let saved = bundle();

        store.save(&saved).unwrap();
        assert!(store.bundle_path().exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, saved);

        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_fs_store_replaces_previous_bundle() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let first = bundle();
        let second = bundle();

        store.save(&first).unwrap();
        store.save(&second).unwrap();
        assert_eq!(store.load().unwrap().run_id, second.run_id);
    }

    #[test]
    fn test_missing_bundle_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = FsArtifactStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_unknown_format_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.save(&bundle()).unwrap();

        let json = fs::read_to_string(store.bundle_path()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["format_version"] = serde_json::json!(BUNDLE_FORMAT_VERSION + 1);
        fs::write(store.bundle_path(), value.to_string()).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("format version")));
    }

    #[test]
    fn test_mismatched_pair_on_disk_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.save(&bundle()).unwrap();

        let json = fs::read_to_string(store.bundle_path()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["model"]["manifest_fingerprint"] = serde_json::json!("0".repeat(64));
        fs::write(store.bundle_path(), value.to_string()).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn test_tampered_manifest_on_disk_is_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.save(&bundle()).unwrap();

        let json = fs::read_to_string(store.bundle_path()).unwrap();
        let tampered = json.replacen("Contract=One year", "Contract=Three year", 1);
        assert_ne!(json, tampered);
        fs::write(store.bundle_path(), tampered).unwrap();

        let err = store.load().unwrap_err();
        assert!(
            matches!(err, Error::SchemaMismatch(ref msg) if msg.contains("fingerprint")),
            "got {err:?}"
        );
    }

    #[test]
    fn test_corrupted_model_state_on_disk_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.save(&bundle()).unwrap();
        let json = fs::read_to_string(store.bundle_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let mut truncated = value.clone();
        let means = truncated["model"]["state"]["means"].as_array_mut().unwrap();
        means.truncate(means.len() - 1);
        fs::write(store.bundle_path(), truncated.to_string()).unwrap();
        assert!(matches!(store.load(), Err(Error::SchemaMismatch(_))));

        let mut zero_scale = value;
        zero_scale["model"]["state"]["scales"][0] = serde_json::json!(0.0);
        fs::write(store.bundle_path(), zero_scale.to_string()).unwrap();
        assert!(matches!(store.load(), Err(Error::Model(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryArtifactStore::new();
        assert!(store.is_empty());
        assert!(matches!(store.load(), Err(Error::Config(_))));

        let saved = bundle();
        store.save(&saved).unwrap();
        assert!(!store.is_empty());
        assert_eq!(store.load().unwrap(), saved);
    }
}
