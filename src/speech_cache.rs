//! Content-addressed cache of synthesized speech.
//!
//! An artifact is identified by a SHA-256 key over
//! `(text, voice model, voice, instructions)`. The same key names the file
//! on disk: `speech_<YYYYMMDD_HHMMSS>_<first 8 hex of key>.mp3`.
//!
//! # Lookup
//!
//! 1. In-memory map of artifacts produced or found by this process; an
//!    entry whose file has since disappeared is dropped.
//! 2. Directory scan for `speech_*_<8hex>.mp3` whose `.key` sidecar holds
//!    the full key; the newest name wins.
//! 3. Miss: the synthesizer writes into a temporary file in the cache
//!    directory, which is atomically renamed into place. An empty output
//!    is a failure and is never cached.
//!
//! Requests for one key are serialized by a per-key async lock, so a key
//! is synthesized at most once even under concurrent callers, and readers
//! never observe a partially written file.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use docent_core::error::RagError;

use crate::presets::{Voice, VoiceModel};
use crate::tts::{SpeechRequest, SpeechSynthesizer};

const FILE_PREFIX: &str = "speech_";
const FILE_EXT: &str = ".mp3";
const KEY_EXT: &str = ".key";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const SHORT_KEY_LEN: usize = 8;

/// A synthesized audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechArtifact {
    /// Full hex SHA-256 cache key.
    pub key: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl SpeechArtifact {
    pub fn short_key(&self) -> &str {
        &self.key[..SHORT_KEY_LEN.min(self.key.len())]
    }
}

/// Cache key for one synthesis request.
///
/// Each field is length-prefixed so that field boundaries are unambiguous.
pub fn cache_key(text: &str, model: VoiceModel, voice: Voice, instructions: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [text, model.as_str(), voice.as_str(), instructions] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub struct SpeechCache {
    dir: PathBuf,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    entries: Mutex<HashMap<String, SpeechArtifact>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SpeechCache {
    pub fn new(dir: impl Into<PathBuf>, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            dir: dir.into(),
            synthesizer,
            entries: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the artifact for these inputs, synthesizing it on a miss.
    pub async fn synthesize(
        &self,
        text: &str,
        model: VoiceModel,
        voice: Voice,
        instructions: &str,
    ) -> Result<SpeechArtifact, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::Synthesis("nothing to synthesize".to_string()));
        }

        let key = cache_key(text, model, voice, instructions);

        if let Some(hit) = self.remembered(&key) {
            tracing::debug!(key = %hit.short_key(), "speech cache hit");
            return Ok(hit);
        }

        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.lookup_or_create(&key, text, model, voice, instructions)
                .await
        };
        drop(lock);
        self.prune_locks();
        result
    }

    /// Artifact for `key` if it is already cached, without synthesizing.
    pub fn lookup(&self, key: &str) -> Option<SpeechArtifact> {
        self.remembered(key).or_else(|| self.scan_disk(key))
    }

    async fn lookup_or_create(
        &self,
        key: &str,
        text: &str,
        model: VoiceModel,
        voice: Voice,
        instructions: &str,
    ) -> Result<SpeechArtifact, RagError> {
        if let Some(hit) = self.lookup(key) {
            tracing::debug!(key = %hit.short_key(), path = %hit.path.display(), "speech cache hit");
            self.remember(hit.clone());
            return Ok(hit);
        }

        tracing::info!(key = &key[..SHORT_KEY_LEN], %voice, %model, "synthesizing speech");

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| RagError::Synthesis(format!("{}: {}", self.dir.display(), e)))?;

        let tmp = tempfile::Builder::new()
            .prefix(".speech-")
            .suffix(".part")
            .tempfile_in(&self.dir)
            .map_err(|e| RagError::Synthesis(format!("temporary file: {}", e)))?;

        let request = SpeechRequest::new(text, model, voice, instructions);
        self.synthesizer.synthesize(&request, tmp.path()).await?;

        let written = std::fs::metadata(tmp.path()).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(RagError::Synthesis(
                "synthesizer produced no audio".to_string(),
            ));
        }

        let created_at = Utc::now();
        let path = self.dir.join(file_name(created_at, key));
        let key_path = sidecar(&path);
        std::fs::write(&key_path, key)
            .map_err(|e| RagError::Synthesis(format!("{}: {}", key_path.display(), e)))?;
        if let Err(e) = tmp.persist(&path) {
            let _ = std::fs::remove_file(&key_path);
            return Err(RagError::Synthesis(format!("{}: {}", path.display(), e.error)));
        }

        let artifact = SpeechArtifact {
            key: key.to_string(),
            path,
            created_at,
        };
        self.remember(artifact.clone());
        Ok(artifact)
    }

    fn remembered(&self, key: &str) -> Option<SpeechArtifact> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key).cloned() {
            Some(a) if a.path.is_file() => Some(a),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn remember(&self, artifact: SpeechArtifact) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(artifact.key.clone(), artifact);
    }

    fn scan_disk(&self, key: &str) -> Option<SpeechArtifact> {
        let short = key.get(..SHORT_KEY_LEN)?;
        let suffix = format!("_{}{}", short, FILE_EXT);
        let read_dir = std::fs::read_dir(&self.dir).ok()?;

        let mut candidates: Vec<String> = read_dir
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with(FILE_PREFIX) && name.ends_with(&suffix))
            .collect();
        candidates.sort_unstable_by(|a, b| b.cmp(a));

        // The short key in the name can collide; the sidecar settles it.
        let newest = candidates.into_iter().find(|name| {
            std::fs::read_to_string(sidecar(&self.dir.join(name)))
                .map(|stored| stored.trim() == key)
                .unwrap_or(false)
        })?;

        let stamp = &newest[FILE_PREFIX.len()..newest.len() - suffix.len()];
        let created_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map(|t| t.and_utc())
            .unwrap_or_else(|_| Utc::now());

        Some(SpeechArtifact {
            key: key.to_string(),
            path: self.dir.join(newest),
            created_at,
        })
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    fn prune_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Path of the file holding the full key next to an artifact.
fn sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(KEY_EXT);
    PathBuf::from(name)
}

fn file_name(created_at: DateTime<Utc>, key: &str) -> String {
    format!(
        "{}{}_{}{}",
        FILE_PREFIX,
        created_at.format(TIMESTAMP_FORMAT),
        &key[..SHORT_KEY_LEN],
        FILE_EXT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingSynth {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for CountingSynth {
        async fn synthesize(&self, request: &SpeechRequest, dest: &Path) -> Result<(), RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(dest, request.input.as_bytes())
                .await
                .map_err(|e| RagError::Synthesis(e.to_string()))
        }
    }

    struct FailingSynth;

    #[async_trait]
    impl SpeechSynthesizer for FailingSynth {
        async fn synthesize(&self, _: &SpeechRequest, _: &Path) -> Result<(), RagError> {
            Err(RagError::Synthesis("service unavailable".to_string()))
        }
    }

    fn counting() -> Arc<CountingSynth> {
        Arc::new(CountingSynth {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_cache_key_depends_on_every_input() {
        let base = cache_key("Hello", VoiceModel::Tts1, Voice::Alloy, "");
        assert_eq!(base.len(), 64);
        assert_eq!(base, cache_key("Hello", VoiceModel::Tts1, Voice::Alloy, ""));
        assert_ne!(base, cache_key("Hello!", VoiceModel::Tts1, Voice::Alloy, ""));
        assert_ne!(base, cache_key("Hello", VoiceModel::Tts1Hd, Voice::Alloy, ""));
        assert_ne!(base, cache_key("Hello", VoiceModel::Tts1, Voice::Echo, ""));
        assert_ne!(base, cache_key("Hello", VoiceModel::Tts1, Voice::Alloy, "x"));
        // Field boundaries are not ambiguous.
        assert_ne!(
            cache_key("ab", VoiceModel::Tts1, Voice::Alloy, "c"),
            cache_key("a", VoiceModel::Tts1, Voice::Alloy, "bc")
        );
    }

    #[tokio::test]
    async fn test_file_name_layout() {
        let tmp = TempDir::new().unwrap();
        let synth = counting();
        let cache = SpeechCache::new(tmp.path().join("speech_files"), synth.clone());
        let a = cache
            .synthesize("Hello", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .unwrap();
        let name = a.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("speech_"));
        assert!(name.ends_with(&format!("_{}.mp3", &a.key[..8])));
        assert_eq!(name.len(), "speech_YYYYMMDD_HHMMSS_xxxxxxxx.mp3".len());
        assert_eq!(std::fs::read_to_string(&a.path).unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_no_temporary_files_left() {
        let tmp = TempDir::new().unwrap();
        let cache = SpeechCache::new(tmp.path(), counting());
        cache
            .synthesize("Hello", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .unwrap();
        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("speech_")));
        assert!(names.iter().any(|n| n.ends_with(".mp3")));
        assert!(names.iter().any(|n| n.ends_with(".mp3.key")));
    }

    #[tokio::test]
    async fn test_short_key_collision_on_disk_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let key = cache_key("Hello", VoiceModel::Tts1, Voice::Alloy, "");
        let mut other = key[..SHORT_KEY_LEN].to_string();
        other.push_str(&"0".repeat(key.len() - SHORT_KEY_LEN));
        let foreign = tmp.path().join(format!("speech_20200101_000000_{}.mp3", &key[..8]));
        std::fs::write(&foreign, "someone else").unwrap();
        std::fs::write(sidecar(&foreign), &other).unwrap();

        let synth = counting();
        let cache = SpeechCache::new(tmp.path(), synth.clone());
        assert!(cache.lookup(&key).is_none());

        let a = cache
            .synthesize("Hello", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .unwrap();
        assert_ne!(a.path, foreign);
        assert_eq!(std::fs::read_to_string(&a.path).unwrap(), "Hello");
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_artifact_without_key_file_is_not_reused() {
        let tmp = TempDir::new().unwrap();
        let key = cache_key("Hello", VoiceModel::Tts1, Voice::Alloy, "");
        std::fs::write(
            tmp.path().join(format!("speech_20200101_000000_{}.mp3", &key[..8])),
            "stale",
        )
        .unwrap();

        let cache = SpeechCache::new(tmp.path(), counting());
        assert!(cache.lookup(&key).is_none());
    }

    #[tokio::test]
    async fn test_disk_hit_survives_new_cache_instance() {
        let tmp = TempDir::new().unwrap();
        let first = counting();
        let a = SpeechCache::new(tmp.path(), first.clone())
            .synthesize("Hello", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .unwrap();

        let second = counting();
        let b = SpeechCache::new(tmp.path(), second.clone())
            .synthesize("Hello", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .unwrap();

        assert_eq!(a.path, b.path);
        assert_eq!(a.key, b.key);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deleted_file_is_resynthesized() {
        let tmp = TempDir::new().unwrap();
        let synth = counting();
        let cache = SpeechCache::new(tmp.path(), synth.clone());
        let a = cache
            .synthesize("Hello", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .unwrap();
        std::fs::remove_file(&a.path).unwrap();

        let b = cache
            .synthesize("Hello", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .unwrap();
        assert!(b.path.is_file());
        assert_eq!(synth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_synthesis_error() {
        let tmp = TempDir::new().unwrap();
        let cache = SpeechCache::new(tmp.path(), Arc::new(FailingSynth));
        let err = cache
            .synthesize("Hello", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Synthesis(_)));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let tmp = TempDir::new().unwrap();
        let synth = counting();
        let cache = SpeechCache::new(tmp.path(), synth.clone());
        assert!(cache
            .synthesize("   ", VoiceModel::Tts1, Voice::Alloy, "")
            .await
            .is_err());
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }
}
