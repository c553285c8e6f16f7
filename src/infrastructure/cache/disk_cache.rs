//! Disk-based byte cache with a journal for persistence across sessions.
//!
//! Entries are written to a temporary file and renamed into place on commit,
//! so an interrupted write never replaces a valid entry. LRU order and size
//! accounting are kept in an append-only journal that is replayed on open.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::DiskEntry;
use crate::domain::errors::{CacheError, CacheResult};

/// Maximum disk cache size in bytes (100 MB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 100 * 1024 * 1024;

/// Directory created under the cache root.
pub const DIRECTORY_NAME: &str = "pixload";

/// Sub-directory holding downloaded image bytes.
pub const DISK_SUBDIR: &str = "disk";

/// Bumped whenever the on-disk layout changes incompatibly.
pub const INTERNAL_VERSION: u32 = 1;

const JOURNAL_FILE: &str = "journal";
const JOURNAL_TMP_FILE: &str = "journal.tmp";
const JOURNAL_MAGIC: &str = "pixload.disk";
const JOURNAL_FORMAT: &str = "1";
const ENTRY_EXT: &str = "img";
const TEMP_SUFFIX: &str = ".tmp";
const COMPACT_THRESHOLD: usize = 2000;

/// Maps a cache key to a filesystem-safe entry name.
#[must_use]
pub fn entry_name(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

struct State {
    index: LruCache<String, u64>,
    size: u64,
    journal: Option<fs::File>,
    redundant_ops: usize,
}

struct Replayed {
    index: LruCache<String, u64>,
    redundant_ops: usize,
}

/// Persistent byte cache keyed by request-derived keys.
pub struct DiskCache {
    dir: PathBuf,
    max_size: u64,
    app_version: u32,
    disabled: AtomicBool,
    state: Mutex<State>,
}

impl DiskCache {
    /// Opens (or creates) the cache in `dir`.
    ///
    /// A journal written by a different `app_version` or internal version is
    /// discarded along with every entry.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or the journal cannot
    /// be rewritten.
    pub async fn open(dir: PathBuf, app_version: u32, max_size: u64) -> CacheResult<Self> {
        fs::create_dir_all(&dir).await?;

        let journal_path = dir.join(JOURNAL_FILE);
        let mut replayed = match fs::read_to_string(&journal_path).await {
            Ok(content) => match replay(&content, app_version) {
                Ok(replayed) => replayed,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Discarding disk cache");
                    wipe(&dir).await?;
                    Replayed::empty()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Replayed::empty(),
            Err(e) => return Err(e.into()),
        };

        let size = validate_entries(&dir, &mut replayed.index).await;
        remove_strays(&dir, &replayed.index).await;

        let cache = Self {
            dir,
            max_size,
            app_version,
            disabled: AtomicBool::new(false),
            state: Mutex::new(State {
                index: replayed.index,
                size,
                journal: None,
                redundant_ops: replayed.redundant_ops,
            }),
        };

        {
            let mut state = cache.state.lock().await;
            cache.rebuild_journal(&mut state).await?;
            cache.trim_to_size(&mut state).await;
            debug!(
                dir = %cache.dir.display(),
                entries = state.index.len(),
                size = state.size,
                "Opened disk cache"
            );
        }

        Ok(cache)
    }

    /// Opens the cache in `<cache_root>/pixload/disk`.
    ///
    /// # Errors
    /// Returns error if the cache cannot be opened.
    pub async fn open_in(cache_root: &Path, app_version: u32, max_size: u64) -> CacheResult<Self> {
        Self::open(Self::directory(cache_root), app_version, max_size).await
    }

    /// Opens a cache in the default location (e.g. ~/.cache/pixload/disk).
    ///
    /// # Errors
    /// Returns error if the cache cannot be opened.
    pub async fn default_location(app_version: u32) -> CacheResult<Self> {
        Self::open(dirs_cache_path(), app_version, DEFAULT_MAX_CACHE_SIZE).await
    }

    /// Cache directory for a given root.
    #[must_use]
    pub fn directory(cache_root: &Path) -> PathBuf {
        cache_root.join(DIRECTORY_NAME).join(DISK_SUBDIR)
    }

    /// Directory holding the entries and journal.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Version the cache was opened with.
    #[must_use]
    pub const fn app_version(&self) -> u32 {
        self.app_version
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{ENTRY_EXT}"))
    }

    /// Looks up an entry and marks it most recently used.
    pub async fn get(&self, key: &str) -> Option<DiskEntry> {
        if self.is_disabled() {
            return None;
        }
        let name = entry_name(key);
        let mut state = self.state.lock().await;
        let Some(len) = state.index.get(&name).copied() else {
            trace!(key = %key, "Disk cache miss");
            return None;
        };

        self.append_journal(&mut state, &format!("READ {name}\n")).await;
        state.redundant_ops += 1;
        self.compact_if_needed(&mut state).await;

        trace!(key = %key, "Disk cache hit");
        Some(DiskEntry::new(key, self.entry_path(&name), len))
    }

    /// Checks if an entry exists without touching the LRU order.
    pub async fn exist(&self, key: &str) -> bool {
        if self.is_disabled() {
            return false;
        }
        let name = entry_name(key);
        self.state.lock().await.index.contains(&name)
    }

    /// Starts writing an entry. Nothing is visible until
    /// [`DiskEditor::commit`] succeeds.
    ///
    /// # Errors
    /// Returns error if the cache is disabled or the temporary file cannot be
    /// created.
    pub async fn edit(self: &Arc<Self>, key: &str) -> CacheResult<DiskEditor> {
        if self.is_disabled() {
            return Err(CacheError::Disabled);
        }
        let name = entry_name(key);
        let dir = self.dir.clone();
        let prefix = format!("{name}.");
        let temp = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(TEMP_SUFFIX)
                .tempfile_in(&dir)
        })
        .await
        .map_err(std::io::Error::other)??;

        let (file, temp_path) = temp.into_parts();
        trace!(key = %key, "Opened disk cache editor");
        Ok(DiskEditor {
            cache: Arc::clone(self),
            key: key.to_string(),
            name,
            file: fs::File::from_std(file),
            temp_path,
            written: 0,
        })
    }

    /// Writes `bytes` as a complete entry.
    ///
    /// # Errors
    /// Returns error if the entry cannot be written or committed.
    pub async fn put(self: &Arc<Self>, key: &str, bytes: &[u8]) -> CacheResult<DiskEntry> {
        let mut editor = self.edit(key).await?;
        editor.write(bytes).await?;
        editor.commit().await
    }

    async fn commit_edit(
        &self,
        key: &str,
        name: &str,
        temp_path: tempfile::TempPath,
        len: u64,
    ) -> CacheResult<DiskEntry> {
        if len > self.max_size {
            return Err(CacheError::TooLarge {
                size: len,
                max_size: self.max_size,
            });
        }

        let path = self.entry_path(name);
        let mut state = self.state.lock().await;
        temp_path.persist(&path)?;

        if let Some(old) = state.index.put(name.to_string(), len) {
            state.size = state.size.saturating_sub(old);
            state.redundant_ops += 1;
        }
        state.size += len;
        self.append_journal(&mut state, &format!("CLEAN {name} {len}\n"))
            .await;
        debug!(key = %key, size = len, total = state.size, "Stored entry in disk cache");

        self.trim_to_size(&mut state).await;
        self.compact_if_needed(&mut state).await;
        Ok(DiskEntry::new(key, path, len))
    }

    /// Removes an entry. Returns true if one existed.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be deleted.
    pub async fn remove(&self, key: &str) -> CacheResult<bool> {
        let name = entry_name(key);
        let mut state = self.state.lock().await;
        let Some(len) = state.index.pop(&name) else {
            return Ok(false);
        };
        state.size = state.size.saturating_sub(len);
        remove_file_if_exists(&self.entry_path(&name)).await?;
        self.append_journal(&mut state, &format!("REMOVE {name}\n"))
            .await;
        state.redundant_ops += 1;
        debug!(key = %key, "Removed entry from disk cache");
        Ok(true)
    }

    /// Removes every entry.
    ///
    /// # Errors
    /// Returns error if the journal cannot be rewritten.
    pub async fn clear(&self) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        let names: Vec<String> = state.index.iter().map(|(name, _)| name.clone()).collect();
        for name in names {
            if let Err(e) = remove_file_if_exists(&self.entry_path(&name)).await {
                warn!(name = %name, error = %e, "Failed to remove cache file");
            }
        }
        state.index.clear();
        state.size = 0;
        self.rebuild_journal(&mut state).await?;
        debug!("Cleared disk cache");
        Ok(())
    }

    /// Returns the current cache size in bytes.
    pub async fn size(&self) -> u64 {
        self.state.lock().await.size
    }

    /// Byte budget.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Returns the number of cached entries.
    pub async fn len(&self) -> usize {
        self.state.lock().await.index.len()
    }

    /// Returns true if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Short-circuits every read and write while set.
    pub fn set_disabled(&self, disabled: bool) {
        if self.disabled.swap(disabled, Ordering::AcqRel) != disabled {
            debug!(disabled, "Disk cache toggled");
        }
    }

    /// Returns true while the cache is bypassed.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    async fn trim_to_size(&self, state: &mut State) {
        while state.size > self.max_size {
            let Some((name, len)) = state.index.pop_lru() else {
                break;
            };
            state.size = state.size.saturating_sub(len);
            if let Err(e) = remove_file_if_exists(&self.entry_path(&name)).await {
                warn!(name = %name, error = %e, "Failed to remove evicted cache file");
            }
            self.append_journal(state, &format!("REMOVE {name}\n")).await;
            state.redundant_ops += 1;
            trace!(name = %name, "Evicted entry from disk cache");
        }
    }

    async fn append_journal(&self, state: &mut State, line: &str) {
        let Some(journal) = state.journal.as_mut() else {
            return;
        };
        let result = async {
            journal.write_all(line.as_bytes()).await?;
            journal.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!(error = %e, "Failed to append to disk cache journal");
            state.journal = None;
        }
    }

    async fn compact_if_needed(&self, state: &mut State) {
        if state.redundant_ops < COMPACT_THRESHOLD || state.redundant_ops < state.index.len() {
            return;
        }
        if let Err(e) = self.rebuild_journal(state).await {
            warn!(error = %e, "Failed to compact disk cache journal");
        }
    }

    /// Writes a fresh journal holding only the live entries, oldest first,
    /// and swaps it in atomically.
    async fn rebuild_journal(&self, state: &mut State) -> CacheResult<()> {
        state.journal = None;

        let mut content = format!(
            "{JOURNAL_MAGIC}\n{JOURNAL_FORMAT}\n{}\n{INTERNAL_VERSION}\n\n",
            self.app_version
        );
        for (name, len) in state.index.iter().rev() {
            content.push_str(&format!("CLEAN {name} {len}\n"));
        }

        let tmp_path = self.dir.join(JOURNAL_TMP_FILE);
        let journal_path = self.dir.join(JOURNAL_FILE);
        {
            let mut tmp = fs::File::create(&tmp_path).await?;
            tmp.write_all(content.as_bytes()).await?;
            tmp.sync_all().await?;
        }
        fs::rename(&tmp_path, &journal_path).await?;

        state.journal = Some(
            fs::OpenOptions::new()
                .append(true)
                .open(&journal_path)
                .await?,
        );
        state.redundant_ops = 0;
        trace!(entries = state.index.len(), "Rebuilt disk cache journal");
        Ok(())
    }
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache")
            .field("dir", &self.dir)
            .field("max_size", &self.max_size)
            .field("app_version", &self.app_version)
            .finish_non_exhaustive()
    }
}

/// An in-progress write to the disk cache.
///
/// Dropping the editor without committing deletes the temporary file and
/// leaves any previous entry untouched.
pub struct DiskEditor {
    cache: Arc<DiskCache>,
    key: String,
    name: String,
    file: fs::File,
    temp_path: tempfile::TempPath,
    written: u64,
}

impl DiskEditor {
    /// Appends a chunk.
    ///
    /// # Errors
    /// Returns error if the temporary file cannot be written.
    pub async fn write(&mut self, chunk: &[u8]) -> CacheResult<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Key being written.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Flushes the data and atomically publishes the entry.
    ///
    /// # Errors
    /// Returns error if the data cannot be synced or renamed into place.
    pub async fn commit(mut self) -> CacheResult<DiskEntry> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        let Self {
            cache,
            key,
            name,
            file,
            temp_path,
            written,
        } = self;
        drop(file);
        cache.commit_edit(&key, &name, temp_path, written).await
    }

    /// Discards the write and hands back what was written so far.
    ///
    /// # Errors
    /// Returns error if the temporary file cannot be read back.
    pub async fn into_bytes(mut self) -> CacheResult<Vec<u8>> {
        self.file.flush().await?;
        let bytes = fs::read(&self.temp_path).await?;
        trace!(key = %self.key, len = bytes.len(), "Reclaimed disk cache editor");
        Ok(bytes)
    }

    /// Discards the write.
    pub fn abort(self) {
        trace!(key = %self.key, "Aborted disk cache editor");
    }
}

impl std::fmt::Debug for DiskEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskEditor")
            .field("key", &self.key)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl Replayed {
    fn empty() -> Self {
        Self {
            index: LruCache::unbounded(),
            redundant_ops: 0,
        }
    }
}

fn replay(content: &str, app_version: u32) -> CacheResult<Replayed> {
    let mut lines = content.lines();
    let expected = [
        JOURNAL_MAGIC.to_string(),
        JOURNAL_FORMAT.to_string(),
        app_version.to_string(),
        INTERNAL_VERSION.to_string(),
        String::new(),
    ];
    for (number, want) in expected.iter().enumerate() {
        let got = lines.next().unwrap_or_default();
        if got != want {
            return Err(CacheError::corrupt_journal(
                number + 1,
                format!("unexpected header {got:?}"),
            ));
        }
    }

    let mut replayed = Replayed::empty();
    for (offset, line) in lines.enumerate() {
        let number = offset + expected.len() + 1;
        let mut parts = line.split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("CLEAN"), Some(name), Some(len)) => {
                let len = len
                    .parse::<u64>()
                    .map_err(|e| CacheError::corrupt_journal(number, e.to_string()))?;
                if replayed.index.put(name.to_string(), len).is_some() {
                    replayed.redundant_ops += 1;
                }
            }
            (Some("READ"), Some(name), None) => {
                replayed.index.get(name);
                replayed.redundant_ops += 1;
            }
            (Some("REMOVE"), Some(name), None) => {
                replayed.index.pop(name);
                replayed.redundant_ops += 1;
            }
            // A torn final line from a crash mid-append is ignored.
            _ if offset + expected.len() + 1 == content.lines().count() => {}
            _ => return Err(CacheError::corrupt_journal(number, line.to_string())),
        }
    }
    Ok(replayed)
}

/// Drops index entries whose files are gone and returns the verified size.
async fn validate_entries(dir: &Path, index: &mut LruCache<String, u64>) -> u64 {
    let names: Vec<(String, u64)> = index.iter().map(|(n, l)| (n.clone(), *l)).collect();
    let mut size = 0;
    for (name, len) in names {
        let path = dir.join(format!("{name}.{ENTRY_EXT}"));
        match fs::metadata(&path).await {
            Ok(meta) if meta.len() == len => size += len,
            _ => {
                debug!(name = %name, "Dropping disk cache entry without valid file");
                index.pop(&name);
            }
        }
    }
    size
}

/// Deletes temporary files left by interrupted writes and files the journal
/// does not know about.
async fn remove_strays(dir: &Path, index: &LruCache<String, u64>) {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name == JOURNAL_FILE {
            continue;
        }
        let stray = if file_name == JOURNAL_TMP_FILE || file_name.ends_with(TEMP_SUFFIX) {
            true
        } else if path.extension().is_some_and(|ext| ext == ENTRY_EXT) {
            path.file_stem()
                .and_then(|s| s.to_str())
                .is_none_or(|stem| !index.contains(stem))
        } else {
            false
        };
        if stray {
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove stray cache file");
            } else {
                trace!(path = %path.display(), "Removed stray cache file");
            }
        }
    }
}

async fn wipe(dir: &Path) -> CacheResult<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir).await?;
    Ok(())
}

async fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Returns the default cache directory path.
fn dirs_cache_path() -> PathBuf {
    directories::ProjectDirs::from("org", "pixload", DIRECTORY_NAME).map_or_else(
        || DiskCache::directory(&std::env::temp_dir()),
        |dirs| dirs.cache_dir().join(DISK_SUBDIR),
    )
}
