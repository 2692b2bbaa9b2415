//! File-backed content driver.
//!
//! One front-matter file per slug under the content root. `list` goes
//! through a JSON directory index (slug → file, mtime, title, status) kept
//! next to the content. The index is a cache, not a source of truth: it
//! self-invalidates when any file's mtime is newer than the recorded value
//! or the slug set changed, and is rebuilt wholesale when absent or
//! unparseable.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{entities::Page, error::ContentError, slug::Slug, types::PageStatus};

use super::{ContentDriver, PageFilter, frontmatter};

const PAGE_EXTENSION: &str = "md";
const INDEX_FILE: &str = ".index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    file: String,
    mtime_ms: i64,
    title: String,
    status: PageStatus,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ContentIndex {
    entries: BTreeMap<String, IndexEntry>,
}

pub struct FileDriver {
    root: PathBuf,
}

impl FileDriver {
    /// Open (creating if needed) a content root.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn page_path(&self, slug: &Slug) -> PathBuf {
        self.root.join(format!("{slug}.{PAGE_EXTENSION}"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Total number of pages on disk. Cheap: one directory scan, no parsing.
    pub async fn count(&self) -> Result<u64, ContentError> {
        Ok(self.scan().await?.len() as u64)
    }

    /// Enumerate page files and their mtimes.
    async fn scan(&self) -> Result<BTreeMap<String, i64>, ContentError> {
        let mut found = BTreeMap::new();
        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(fs_error)?;
        while let Some(entry) = dir.next_entry().await.map_err(fs_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PAGE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if Slug::new(stem).is_err() {
                warn!(file = %path.display(), "skipping file whose name is not a valid slug");
                continue;
            }
            let metadata = entry.metadata().await.map_err(fs_error)?;
            found.insert(stem.to_string(), mtime_ms(&metadata));
        }
        Ok(found)
    }

    async fn load_index(&self) -> Option<ContentIndex> {
        let raw = tokio::fs::read(self.index_path()).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    fn index_is_fresh(index: &ContentIndex, scanned: &BTreeMap<String, i64>) -> bool {
        if index.entries.len() != scanned.len() {
            return false;
        }
        scanned.iter().all(|(slug, mtime)| {
            index
                .entries
                .get(slug)
                .is_some_and(|entry| *mtime <= entry.mtime_ms)
        })
    }

    async fn rebuild_index(
        &self,
        scanned: &BTreeMap<String, i64>,
    ) -> Result<ContentIndex, ContentError> {
        let mut index = ContentIndex::default();
        for (slug, mtime) in scanned {
            let slug = Slug::new(slug.clone()).map_err(ContentError::from)?;
            let page = self.load(&slug).await?;
            index.entries.insert(
                slug.as_str().to_string(),
                IndexEntry {
                    file: format!("{slug}.{PAGE_EXTENSION}"),
                    mtime_ms: *mtime,
                    title: page.title,
                    status: page.status,
                },
            );
        }

        // Best-effort persist; a write failure only costs the next caller a
        // rebuild.
        match serde_json::to_vec(&index) {
            Ok(raw) => {
                if let Err(err) = write_atomic(&self.index_path(), &raw).await {
                    warn!(error = %err, "content index write failed");
                }
            }
            Err(err) => warn!(error = %err, "content index serialization failed"),
        }

        debug!(pages = index.entries.len(), "rebuilt content index");
        Ok(index)
    }

    async fn current_index(&self) -> Result<ContentIndex, ContentError> {
        let scanned = self.scan().await?;
        if let Some(index) = self.load_index().await
            && Self::index_is_fresh(&index, &scanned)
        {
            return Ok(index);
        }
        self.rebuild_index(&scanned).await
    }
}

#[async_trait]
impl ContentDriver for FileDriver {
    async fn exists(&self, slug: &Slug) -> Result<bool, ContentError> {
        tokio::fs::try_exists(self.page_path(slug))
            .await
            .map_err(fs_error)
    }

    async fn load(&self, slug: &Slug) -> Result<Page, ContentError> {
        let raw = match tokio::fs::read_to_string(self.page_path(slug)).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ContentError::not_found(slug.as_str()));
            }
            Err(err) => return Err(fs_error(err)),
        };
        frontmatter::decode(slug, &raw)
    }

    async fn save(&self, page: &Page) -> Result<(), ContentError> {
        let encoded = frontmatter::encode(page)?;
        write_atomic(&self.page_path(&page.slug), encoded.as_bytes())
            .await
            .map_err(fs_error)
    }

    async fn delete(&self, slug: &Slug) -> Result<(), ContentError> {
        match tokio::fs::remove_file(self.page_path(slug)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(fs_error(err)),
        }
    }

    async fn list(&self, filter: &PageFilter) -> Result<Vec<Page>, ContentError> {
        let index = self.current_index().await?;
        let mut pages = Vec::new();
        for (slug, entry) in &index.entries {
            if filter.status.is_some_and(|status| entry.status != status) {
                continue;
            }
            let slug = Slug::new(slug.clone()).map_err(ContentError::from)?;
            pages.push(self.load(&slug).await?);
        }
        Ok(pages)
    }
}

fn fs_error(err: std::io::Error) -> ContentError {
    ContentError::unavailable(format!("content filesystem error: {err}"))
}

fn mtime_ms(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
        .map(|since| since.as_millis() as i64)
        .unwrap_or_default()
}

async fn write_atomic(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
    tokio::fs::write(&tmp, payload).await?;
    match tokio::fs::rename(&tmp, path).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            Err(err)
        }
    }
}
