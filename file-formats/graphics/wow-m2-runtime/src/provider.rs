//! File and texture providers consumed by the runtime
//!
//! Archive access and texture decoding live outside this crate. The loader
//! only needs raw bytes by path, and the renderer only needs an opaque
//! texture handle per filename.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of raw file bytes
pub trait FileProvider: Send + Sync {
    /// Bytes of the file at `path`, or `None` when it does not exist
    fn open(&self, path: &str) -> Option<Vec<u8>>;

    /// Check if a file exists
    fn exists(&self, path: &str) -> bool {
        self.open(path).is_some()
    }
}

/// Opaque texture handle issued by a [`TextureProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureHandle(pub u64);

/// A texture usable for binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureRef {
    pub handle: TextureHandle,
    /// Layer inside a texture array
    pub array_index: u32,
    pub width: u32,
    pub height: u32,
}

/// Resolves texture filenames to bindable handles
pub trait TextureProvider: Send + Sync {
    fn load(&self, filename: &str) -> Option<TextureRef>;
}

/// Normalize a game path for lookups: forward slashes, lowercase
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_ascii_lowercase()
}

/// Path without its final extension
pub fn strip_extension(path: &str) -> &str {
    path.rfind('.')
        .filter(|&dot| !path[dot..].contains(['\\', '/']))
        .map_or(path, |dot| &path[..dot])
}

/// In-memory file provider, keyed case-insensitively
#[derive(Debug, Default)]
pub struct MemoryProvider {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: &str, data: Vec<u8>) {
        self.files.write().insert(normalize_path(path), data);
    }

    /// Remove a file
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.write().remove(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl FileProvider for MemoryProvider {
    fn open(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().get(&normalize_path(path)).cloned()
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(&normalize_path(path))
    }
}

/// File provider reading from an extracted directory tree
///
/// Game paths use `\`; they are mapped onto the host separator and matched
/// case-insensitively per path component.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut current = self.root.clone();
        for component in path.split(['\\', '/']).filter(|c| !c.is_empty()) {
            let direct = current.join(component);
            if direct.exists() {
                current = direct;
                continue;
            }
            let entries = std::fs::read_dir(&current).ok()?;
            let found = entries
                .filter_map(std::result::Result::ok)
                .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(component))?;
            current = found.path();
        }
        current.is_file().then_some(current)
    }
}

impl FileProvider for DirectoryProvider {
    fn open(&self, path: &str) -> Option<Vec<u8>> {
        let resolved = self.resolve(path)?;
        match std::fs::read(&resolved) {
            Ok(data) => Some(data),
            Err(err) => {
                log::warn!("Failed to read {}: {}", resolved.display(), err);
                None
            }
        }
    }
}
