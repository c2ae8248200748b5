//! The set of tracked files and where it lives between runs.
//!
//! A run loads the [`FileSet`] saved by the previous one, merges in any newly
//! [`discover`]ed input files, works through the records and saves the whole
//! set back. Records are keyed by their absolute input path, so a file that is
//! already tracked is never re-added (and never re-submitted).
//!
//! Storage sits behind [`FileSetStore`]: [`JsonFileStore`] for the CLI,
//! [`MemoryStore`] for tests and embedding.

use crate::error::XmlpsError;
use crate::formats::FormatRegistry;
use crate::record::FileRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Current on-disk layout version.
const STORE_VERSION: u32 = 1;

/// Tracked files keyed by input path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSet {
    records: BTreeMap<PathBuf, FileRecord>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut FileRecord> {
        self.records.get_mut(path)
    }

    /// Track a record under its `filepath`. Returns `false` (and keeps the
    /// existing record) if that path is already tracked.
    pub fn insert(&mut self, record: FileRecord) -> bool {
        if self.records.contains_key(&record.filepath) {
            return false;
        }
        self.records.insert(record.filepath.clone(), record);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileRecord)> {
        self.records.iter()
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.records.values_mut()
    }
}

/// Load/save contract for the tracked file set.
pub trait FileSetStore {
    /// The previously saved set, or an empty one if nothing was saved yet.
    fn load(&self) -> Result<FileSet, XmlpsError>;

    /// Replace whatever was saved before with `files`.
    fn save(&self, files: &FileSet) -> Result<(), XmlpsError>;
}

/// On-disk envelope; `F` is `&FileSet` when saving, `FileSet` when loading.
#[derive(Serialize, Deserialize)]
struct StoreDocument<F> {
    version: u32,
    files: F,
}

/// Pretty-printed JSON file, rewritten atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileSetStore for JsonFileStore {
    fn load(&self) -> Result<FileSet, XmlpsError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No file store at {}; starting empty", self.path.display());
                return Ok(FileSet::new());
            }
            Err(e) => {
                return Err(XmlpsError::StoreRead {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let doc: StoreDocument<FileSet> =
            serde_json::from_slice(&bytes).map_err(|e| XmlpsError::CorruptStore {
                path: self.path.clone(),
                detail: e.to_string(),
            })?;
        if doc.version != STORE_VERSION {
            return Err(XmlpsError::CorruptStore {
                path: self.path.clone(),
                detail: format!("unsupported store version {}", doc.version),
            });
        }

        debug!("Loaded {} tracked files from {}", doc.files.len(), self.path.display());
        Ok(doc.files)
    }

    /// Write to a temp file in the same directory, then rename over the
    /// target so an interrupted save never leaves a truncated store.
    fn save(&self, files: &FileSet) -> Result<(), XmlpsError> {
        let write_err = |source: std::io::Error| XmlpsError::StoreWrite {
            path: self.path.clone(),
            source,
        };

        let doc = StoreDocument {
            version: STORE_VERSION,
            files,
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("Saved {} tracked files to {}", files.len(), self.path.display());
        Ok(())
    }
}

/// In-process store; nothing touches the file system.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<FileSet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-populated set.
    pub fn with_files(files: FileSet) -> Self {
        Self {
            saved: Mutex::new(Some(files)),
        }
    }
}

impl FileSetStore for MemoryStore {
    fn load(&self) -> Result<FileSet, XmlpsError> {
        let saved = self.saved.lock().unwrap_or_else(|e| e.into_inner());
        Ok(saved.clone().unwrap_or_default())
    }

    fn save(&self, files: &FileSet) -> Result<(), XmlpsError> {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(files.clone());
        Ok(())
    }
}

/// Add every supported input file under `root` that is not tracked yet.
///
/// `root` may be a single file or a directory (walked recursively). Paths are
/// made absolute before they are used as keys. Returns how many records were
/// added; a missing `root` adds nothing.
///
/// Paths that are not valid UTF-8 cannot be stored as JSON keys and are
/// skipped with a warning. Files written by an earlier retrieve are never
/// tracked as inputs.
pub fn discover(
    root: &Path,
    files: &mut FileSet,
    registry: &FormatRegistry,
    citation_style_hash: &str,
) -> usize {
    let outputs: HashSet<PathBuf> = files
        .records()
        .filter_map(|r| r.output_path.clone())
        .collect();
    let mut added = 0;
    let mut consider = |path: &Path| {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        if files.contains(&path) || outputs.contains(&path) {
            return;
        }
        if path.to_str().is_none() {
            warn!("Skipping {}: file name is not valid UTF-8", path.display());
            return;
        }
        let record = FileRecord::new(path, citation_style_hash);
        if registry.accepts_input(&record.ext) {
            debug!("Tracking {}", record.filepath.display());
            files.insert(record);
            added += 1;
        }
    };

    if root.is_file() {
        consider(root);
    } else if root.is_dir() {
        for entry in WalkDir::new(root).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => consider(entry.path()),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable entry under {}: {}", root.display(), e),
            }
        }
    } else {
        warn!("{} is neither a file nor a directory", root.display());
    }

    info!("Discovered {} new files under {}", added, root.display());
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{JobId, JobStatus};
    use chrono::Utc;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn discover_picks_supported_extensions_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.doc", "b.docx", "c.pdf", "d.odt", "e.txt"] {
            touch(&dir.path().join(name));
        }

        let mut files = FileSet::new();
        let added = discover(dir.path(), &mut files, &FormatRegistry::builtin(), "h");

        assert_eq!(added, 4);
        let mut exts: Vec<_> = files.records().map(|r| r.ext.clone()).collect();
        exts.sort();
        assert_eq!(exts, vec!["doc", "docx", "odt", "pdf"]);
        assert!(files.records().all(|r| r.filepath.is_absolute()));
    }

    #[test]
    fn discover_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("1017687ar/Input.doc"));
        touch(&dir.path().join("deep/er/Paper.pdf"));

        let mut files = FileSet::new();
        assert_eq!(discover(dir.path(), &mut files, &FormatRegistry::builtin(), "h"), 2);
    }

    #[test]
    fn discover_keeps_known_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Input.doc");
        touch(&path);

        let mut known = FileRecord::new(std::path::absolute(&path).unwrap(), "h");
        known.job_id = Some(JobId::from(42));
        let mut files = FileSet::new();
        files.insert(known.clone());

        assert_eq!(discover(dir.path(), &mut files, &FormatRegistry::builtin(), "h"), 0);
        assert_eq!(files.len(), 1);
        assert_eq!(files.records().next(), Some(&known));
    }

    #[test]
    fn discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("Paper.pdf");
        let txt = dir.path().join("notes.txt");
        touch(&pdf);
        touch(&txt);

        let mut files = FileSet::new();
        let registry = FormatRegistry::builtin();
        assert_eq!(discover(&pdf, &mut files, &registry, "h"), 1);
        assert_eq!(discover(&pdf, &mut files, &registry, "h"), 0);
        assert_eq!(discover(&txt, &mut files, &registry, "h"), 0);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn discover_missing_root_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FileSet::new();
        let added = discover(&dir.path().join("nope"), &mut files, &FormatRegistry::builtin(), "h");
        assert_eq!(added, 0);
        assert!(files.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn discover_skips_non_utf8_names_and_store_still_saves() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Good.doc"));
        touch(&dir.path().join(OsStr::from_bytes(b"Bad\xff.doc")));

        let mut files = FileSet::new();
        let added = discover(dir.path(), &mut files, &FormatRegistry::builtin(), "h");
        assert_eq!(added, 1);
        assert_eq!(files.records().next().unwrap().filename, "Good.doc");

        let store = JsonFileStore::new(dir.path().join("files.json"));
        store.save(&files).unwrap();
        assert_eq!(store.load().unwrap(), files);
    }

    #[test]
    fn discover_ignores_retrieved_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = std::path::absolute(dir.path().join("Input.doc")).unwrap();
        let output = input.with_file_name("Input.xmp.pdf");
        touch(&input);
        touch(&output);

        let mut record = FileRecord::new(input.clone(), "h");
        record.job_id = Some(JobId::from(7));
        record.output_path = Some(output.clone());
        let mut files = FileSet::new();
        files.insert(record);

        assert_eq!(discover(dir.path(), &mut files, &FormatRegistry::builtin(), "h"), 0);
        assert!(!files.contains(&output));
    }

    #[test]
    fn json_store_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("files.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state/files.json"));

        let mut files = FileSet::new();
        let fresh = FileRecord::new("/data/a/Input.doc", "3f0f");
        let mut done = FileRecord::new("/data/b/Paper.pdf", "3f0f");
        done.job_id = Some(JobId::from(42));
        done.submitted_at = Some(Utc::now());
        done.job_status = Some(JobStatus::COMPLETED);
        done.output_format = Some("xml".into());
        done.output_binary = Some(false);
        done.output_filename = Some("Paper.nlm3.xml".into());
        done.output_path = Some(PathBuf::from("/data/b/Paper.nlm3.xml"));
        done.retrieved_at = Some(Utc::now());
        files.insert(fresh);
        files.insert(done);

        store.save(&files).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, files);
    }

    #[test]
    fn json_store_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("files.json"));

        let mut files = FileSet::new();
        files.insert(FileRecord::new("/data/Input.doc", "h"));
        store.save(&files).unwrap();
        store.save(&FileSet::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.json");
        std::fs::write(&path, b"\x80\x03}q\x00(X").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, XmlpsError::CorruptStore { .. }));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());

        let mut files = FileSet::new();
        files.insert(FileRecord::new("/data/Input.doc", "h"));
        store.save(&files).unwrap();
        assert_eq!(store.load().unwrap(), files);
    }

    #[test]
    fn insert_refuses_duplicates() {
        let mut files = FileSet::new();
        assert!(files.insert(FileRecord::new("/data/Input.doc", "h")));
        assert!(!files.insert(FileRecord::new("/data/Input.doc", "other")));
        assert_eq!(files.get(Path::new("/data/Input.doc")).unwrap().citation_style_hash, "h");
    }
}
