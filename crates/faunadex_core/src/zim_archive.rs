//! Direct reads from a `.zim` container.
//!
//! Only the article namespace is addressed, as `A/<url>`. Redirects come from
//! the directory entries themselves rather than from stub pages.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use zim::{DirectoryEntry, Namespace, Target, Zim};

use crate::archive::{ARTICLE_NAMESPACE, ArchiveEntry, ArticleSource};

struct OpenContainer {
    zim: Zim,
    /// `A/<url>` to the entry's position in the url pointer list.
    by_path: HashMap<String, u32>,
}

/// A ZIM file opened on first lookup. The container and its path table are
/// kept for the lifetime of the value.
pub struct ZimArchiveSource {
    path: PathBuf,
    container: RefCell<Option<OpenContainer>>,
}

impl ZimArchiveSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            container: RefCell::new(None),
        }
    }

    fn with_container<T>(&self, action: impl FnOnce(&OpenContainer) -> Result<T>) -> Result<T> {
        let mut slot = self.container.borrow_mut();
        if let Some(container) = slot.as_ref() {
            return action(container);
        }
        let zim = Zim::new(&self.path).map_err(|err| {
            anyhow!("failed to open ZIM container {}: {err:?}", self.path.display())
        })?;
        let by_path = zim
            .iterate_by_urls()
            .enumerate()
            .filter_map(|(index, entry)| Some((entry_path(&entry)?, u32::try_from(index).ok()?)))
            .collect::<HashMap<_, _>>();
        tracing::info!(path = %self.path.display(), articles = by_path.len(), "ZIM container indexed");
        action(slot.insert(OpenContainer { zim, by_path }))
    }

    fn read_entry(&self, container: &OpenContainer, index: u32) -> Result<DirectoryEntry> {
        container.zim.get_by_url_index(index).map_err(|err| {
            anyhow!(
                "failed to read directory entry {index} of {}: {err:?}",
                self.path.display()
            )
        })
    }
}

impl ArticleSource for ZimArchiveSource {
    fn entry(&self, path: &str) -> Result<Option<ArchiveEntry>> {
        if path.is_empty() {
            return Ok(None);
        }
        self.with_container(|container| {
            let Some(&index) = container.by_path.get(path) else {
                return Ok(None);
            };
            let entry = self.read_entry(container, index)?;
            match entry.target {
                Some(Target::Redirect(target_index)) => {
                    let target = self.read_entry(container, target_index)?;
                    let redirect = entry_path(&target);
                    if redirect.is_none() {
                        tracing::debug!(path, "redirect leaves the article namespace");
                    }
                    Ok(redirect.map(ArchiveEntry::Redirect))
                }
                Some(Target::Cluster(cluster_index, blob_index)) => {
                    let cluster = container.zim.get_cluster(cluster_index).map_err(|err| {
                        anyhow!(
                            "failed to read cluster {cluster_index} of {}: {err:?}",
                            self.path.display()
                        )
                    })?;
                    let blob = cluster.get_blob(blob_index).map_err(|err| {
                        anyhow!("failed to decompress {path} from {}: {err:?}", self.path.display())
                    })?;
                    let html = String::from_utf8_lossy(blob.as_ref()).into_owned();
                    Ok(Some(ArchiveEntry::Article(html)))
                }
                None => Ok(None),
            }
        })
    }

    fn describe(&self) -> String {
        format!("zim:{}", self.path.to_string_lossy().replace('\\', "/"))
    }
}

fn entry_path(entry: &DirectoryEntry) -> Option<String> {
    match entry.namespace {
        Namespace::Articles => Some(format!("{ARTICLE_NAMESPACE}/{}", entry.url)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::archive::open_archive;

    #[test]
    fn container_is_opened_on_first_lookup() {
        let temp = tempdir().expect("tempdir");
        let zim_path = temp.path().join("wiki.zim");
        fs::write(&zim_path, b"not a zim container").expect("write");

        let archive = ZimArchiveSource::new(&zim_path);
        assert!(archive.container.borrow().is_none());
        assert_eq!(archive.entry("").expect("empty path"), None);
        assert!(archive.container.borrow().is_none());

        let err = archive.read_article("A/Bowfin").err().expect("garbage must fail");
        assert!(err.to_string().contains("failed to open ZIM container"));
        assert!(archive.container.borrow().is_none());
    }

    #[test]
    fn open_archive_routes_zim_files_here() {
        let temp = tempdir().expect("tempdir");
        let zim_path = temp.path().join("Wiki.ZIM");
        fs::write(&zim_path, b"ZIM").expect("write");

        let archive = open_archive(&zim_path).expect("open is lazy");
        assert!(archive.describe().starts_with("zim:"));
        assert!(archive.article_exists("A/Bowfin").is_err());
    }
}
