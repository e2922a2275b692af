//! Sample cache keyed by a stable hash of the sample path.

use crate::audio_data::{LoadOptions, SampleData, SampleDecoder};
use crate::error::{Result, SoundError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Stable 32-bit identifier of a sample, derived from its normalized path.
///
/// Path normalization is case-insensitive and treats `\` and `/` alike, so
/// `Sounds\Door.WAV` and `sounds/door.wav` share an id. Collisions between
/// different paths are not detected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId(u32);

impl SampleId {
    /// Returned when a sample could not be loaded.
    pub const INVALID: SampleId = SampleId(0);

    pub fn from_path(path: &str) -> Self {
        // FNV-1a over the normalized bytes
        let mut hash: u32 = 0x811c_9dc5;
        for byte in normalize_path(path).bytes() {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(0x0100_0193);
        }
        if hash == 0 { SampleId(1) } else { SampleId(hash) }
    }

    pub const fn from_raw(raw: u32) -> Self {
        SampleId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SampleId({:#010x})", self.0)
    }
}

pub fn normalize_path(path: &str) -> String {
    path.trim()
        .chars()
        .map(|c| if c == '\\' { '/' } else { c.to_ascii_lowercase() })
        .collect()
}

/// How a cache lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// The sample was already decoded.
    Hit,
    /// Only the path was known; the sample was decoded by this call.
    DecodedOnDemand,
}

#[derive(Debug)]
struct CacheEntry {
    path: PathBuf,
    data: Option<SampleData>,
}

/// Owns every decoded sample, keyed by [`SampleId`].
pub struct SampleCache {
    entries: HashMap<SampleId, CacheEntry>,
    decoder: Box<dyn SampleDecoder>,
    options: LoadOptions,
    extensions: Vec<String>,
}

impl SampleCache {
    pub fn new(
        decoder: Box<dyn SampleDecoder>,
        options: LoadOptions,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            decoder,
            options,
            extensions,
        }
    }

    /// Registers `path` and returns its id.
    ///
    /// With `metadata_only` the path is recorded and decoding is deferred to
    /// the first [`ensure_decoded`](Self::ensure_decoded). A decode failure
    /// is logged and yields [`SampleId::INVALID`].
    pub fn load(&mut self, path: &str, metadata_only: bool) -> SampleId {
        let id = SampleId::from_path(path);

        if let Some(entry) = self.entries.get_mut(&id) {
            if metadata_only || entry.data.is_some() {
                return id;
            }
        } else if metadata_only {
            log::debug!("Registered {} for lazy decoding as {}", path, id);
            self.entries.insert(
                id,
                CacheEntry {
                    path: PathBuf::from(path),
                    data: None,
                },
            );
            return id;
        }

        match self.decode_path(Path::new(path)) {
            Ok(data) => {
                log::debug!(
                    "Loaded {} as {} ({} frames @ {} Hz)",
                    path,
                    id,
                    data.total_frames(),
                    data.sample_rate()
                );
                self.entries.insert(
                    id,
                    CacheEntry {
                        path: PathBuf::from(path),
                        data: Some(data),
                    },
                );
                id
            }
            Err(e) => {
                log::warn!("Failed to load sample {}: {}", path, e);
                SampleId::INVALID
            }
        }
    }

    /// Decodes an in-memory buffer and stores it under `override_id`, or
    /// under the hash of `path` when no override is given.
    ///
    /// An existing entry under the same id is replaced.
    pub fn load_from_memory(
        &mut self,
        bytes: &[u8],
        path: &str,
        override_id: Option<SampleId>,
    ) -> SampleId {
        let id = Self::memory_id(path, override_id);

        let extension = Path::new(path).extension().and_then(|e| e.to_str());
        let data = match self
            .decoder
            .decode_memory(bytes, extension, &self.options)
        {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to decode in-memory sample {}: {}", path, e);
                return SampleId::INVALID;
            }
        };

        if let Some(previous) = self.entries.get(&id) {
            log::warn!(
                "Sample {} already cached from {}, replacing it with {}",
                id,
                previous.path.display(),
                path
            );
        }

        self.entries.insert(
            id,
            CacheEntry {
                path: PathBuf::from(path),
                data: Some(data),
            },
        );
        id
    }

    /// The id [`load_from_memory`](Self::load_from_memory) stores under.
    pub fn memory_id(path: &str, override_id: Option<SampleId>) -> SampleId {
        override_id
            .filter(|id| id.is_valid())
            .unwrap_or_else(|| SampleId::from_path(path))
    }

    /// Returns decoded data for `id`, decoding it now if only the path was
    /// registered.
    pub fn ensure_decoded(&mut self, id: SampleId) -> Option<(SampleData, CacheLookup)> {
        let path = {
            let entry = self.entries.get(&id)?;
            if let Some(data) = &entry.data {
                return Some((data.clone(), CacheLookup::Hit));
            }
            entry.path.clone()
        };

        log::warn!(
            "Decoding {} ({}) on demand; preload it to avoid a stall",
            path.display(),
            id
        );

        match self.decode_path(&path) {
            Ok(data) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.data = Some(data.clone());
                }
                Some((data, CacheLookup::DecodedOnDemand))
            }
            Err(e) => {
                log::error!("Failed to decode {} on demand: {}", path.display(), e);
                None
            }
        }
    }

    /// Removes `id` from the cache. Callers must have halted every channel
    /// playing it first.
    pub fn remove(&mut self, id: SampleId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                log::debug!("Unloaded {} ({})", id, entry.path.display());
                true
            }
            None => {
                log::error!("Cannot unload {}: not cached", id);
                false
            }
        }
    }

    pub fn contains(&self, id: SampleId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn is_decoded(&self, id: SampleId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.data.is_some())
    }

    pub fn path(&self, id: SampleId) -> Option<&Path> {
        self.entries.get(&id).map(|e| e.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn decode_path(&self, path: &Path) -> Result<SampleData> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !self.extensions.is_empty()
            && !self
                .extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(extension))
        {
            return Err(SoundError::AudioFormat(format!(
                "Unsupported file extension '{}'",
                extension
            )));
        }
        self.decoder.decode_file(path, &self.options)
    }
}

impl std::fmt::Debug for SampleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleCache")
            .field("entries", &self.entries.len())
            .field("options", &self.options)
            .finish()
    }
}
