//! Read-only access to an offline wiki dump.
//!
//! Dumps come as a `.zim` container (read directly with the `zim` feature) or in
//! exploded form: the directory written by `zimdump dump`, or that directory
//! packed into a zip. Entry paths look like `A/Largemouth_bass`. In exploded
//! dumps, redirect entries are short HTML stubs with a meta refresh.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::html::{WIKI_PREFIX, decoded_slug};

pub const ARTICLE_NAMESPACE: &str = "A";

static META_REFRESH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta[^>]*http-equiv\s*=\s*["']?refresh["']?[^>]*content\s*=\s*["']?\s*\d*\s*;\s*url\s*=\s*([^"'>\s]+)"#,
    )
    .unwrap()
});
static WIKI_REDIRECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*#REDIRECT\s*\[\[([^\]|#]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
    Article(String),
    /// Target path in the same addressing scheme as the entry itself.
    Redirect(String),
}

/// Lookup contract shared by every archive backend.
///
/// `Ok(None)` means the path is not in the archive, which callers treat as a
/// normal outcome. `Err` is kept for failures of the archive itself.
pub trait ArticleSource {
    fn entry(&self, path: &str) -> Result<Option<ArchiveEntry>>;

    fn describe(&self) -> String;

    /// Article HTML at `path`, following at most one redirect.
    fn read_article(&self, path: &str) -> Result<Option<String>> {
        match self.entry(path)? {
            Some(ArchiveEntry::Article(html)) => Ok(Some(html)),
            Some(ArchiveEntry::Redirect(target)) => match self.entry(&target)? {
                Some(ArchiveEntry::Article(html)) => Ok(Some(html)),
                Some(ArchiveEntry::Redirect(next)) => {
                    tracing::debug!(path, redirect = %target, next = %next, "redirect chain longer than one hop");
                    Ok(None)
                }
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn article_exists(&self, path: &str) -> Result<bool> {
        Ok(self.entry(path)?.is_some())
    }
}

/// Archive paths to try for a `/wiki/<slug>` path: decoded first, then the raw
/// form when it differs. Dumps are inconsistent about which one they index.
pub fn article_path_candidates(wiki_path: &str) -> Vec<String> {
    let raw = wiki_path.strip_prefix(WIKI_PREFIX).unwrap_or(wiki_path);
    let decoded = decoded_slug(wiki_path);
    let mut out = vec![format!("{ARTICLE_NAMESPACE}/{decoded}")];
    if decoded != raw {
        out.push(format!("{ARTICLE_NAMESPACE}/{raw}"));
    }
    out
}

pub fn read_wiki_path(source: &dyn ArticleSource, wiki_path: &str) -> Result<Option<String>> {
    for candidate in article_path_candidates(wiki_path) {
        if let Some(html) = source.read_article(&candidate)? {
            return Ok(Some(html));
        }
    }
    Ok(None)
}

pub fn wiki_path_exists(source: &dyn ArticleSource, wiki_path: &str) -> Result<bool> {
    for candidate in article_path_candidates(wiki_path) {
        if source.article_exists(&candidate)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Pick a backend for `path` based on what is on disk.
pub fn open_archive(path: &Path) -> Result<Box<dyn ArticleSource>> {
    if !path.exists() {
        bail!("archive not found: {}", path.display());
    }
    if path.is_dir() {
        return Ok(Box::new(DirectoryArchive::open(path)?));
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("zip") => Ok(Box::new(ZipArchiveSource::new(path))),
        Some("zim") => open_zim(path),
        _ => bail!(
            "unsupported archive {} (expected a .zim, a .zip or a dump directory)",
            path.display()
        ),
    }
}

#[cfg(feature = "zim")]
fn open_zim(path: &Path) -> Result<Box<dyn ArticleSource>> {
    Ok(Box::new(crate::zim_archive::ZimArchiveSource::new(path)))
}

#[cfg(not(feature = "zim"))]
fn open_zim(path: &Path) -> Result<Box<dyn ArticleSource>> {
    bail!(
        "{} is a ZIM container; rebuild with `--features zim` to read it directly, or explode it with `zimdump dump --dir <dir> {}` and pass the directory as the archive",
        path.display(),
        path.display()
    )
}

#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("archive directory not found: {}", root.display());
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn candidate_files(&self, path: &str) -> Vec<PathBuf> {
        let relative = Path::new(path);
        let scoped = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !scoped {
            return Vec::new();
        }
        let exact = self.root.join(relative);
        let with_extension = self.root.join(format!("{path}.html"));
        vec![exact, with_extension]
    }
}

impl ArticleSource for DirectoryArchive {
    fn entry(&self, path: &str) -> Result<Option<ArchiveEntry>> {
        for file in self.candidate_files(path) {
            if !file.is_file() {
                continue;
            }
            let bytes =
                fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            return Ok(Some(classify_body(path, &bytes)));
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        format!("directory:{}", self.root.to_string_lossy().replace('\\', "/"))
    }
}

/// A dump directory packed into a zip file. The zip is opened on first lookup
/// and the handle kept for the lifetime of the value.
pub struct ZipArchiveSource {
    path: PathBuf,
    archive: RefCell<Option<ZipArchive<File>>>,
}

impl ZipArchiveSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            archive: RefCell::new(None),
        }
    }

    fn with_archive<T>(&self, action: impl FnOnce(&mut ZipArchive<File>) -> Result<T>) -> Result<T> {
        let mut slot = self.archive.borrow_mut();
        if let Some(archive) = slot.as_mut() {
            return action(archive);
        }
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        let archive = ZipArchive::new(file)
            .with_context(|| format!("failed to read zip directory of {}", self.path.display()))?;
        action(slot.insert(archive))
    }
}

impl ArticleSource for ZipArchiveSource {
    fn entry(&self, path: &str) -> Result<Option<ArchiveEntry>> {
        if path.is_empty() {
            return Ok(None);
        }
        self.with_archive(|archive| {
            for name in [path.to_string(), format!("{path}.html")] {
                let mut file = match archive.by_name(&name) {
                    Ok(file) => file,
                    Err(ZipError::FileNotFound) => continue,
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("failed to look up {name} in {}", self.path.display())
                        });
                    }
                };
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).with_context(|| {
                    format!("failed to decompress {name} from {}", self.path.display())
                })?;
                return Ok(Some(classify_body(path, &bytes)));
            }
            Ok(None)
        })
    }

    fn describe(&self) -> String {
        format!("zip:{}", self.path.to_string_lossy().replace('\\', "/"))
    }
}

/// In-memory archive, mostly for fixtures.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: BTreeMap<String, ArchiveEntry>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_article(mut self, path: &str, html: &str) -> Self {
        self.insert_article(path, html);
        self
    }

    pub fn with_redirect(mut self, path: &str, target: &str) -> Self {
        self.entries
            .insert(path.to_string(), ArchiveEntry::Redirect(target.to_string()));
        self
    }

    pub fn insert_article(&mut self, path: &str, html: &str) {
        self.entries
            .insert(path.to_string(), ArchiveEntry::Article(html.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArticleSource for MemoryArchive {
    fn entry(&self, path: &str) -> Result<Option<ArchiveEntry>> {
        Ok(self.entries.get(path).cloned())
    }

    fn describe(&self) -> String {
        format!("memory ({} entries)", self.entries.len())
    }
}

fn classify_body(path: &str, bytes: &[u8]) -> ArchiveEntry {
    let body = String::from_utf8_lossy(bytes).into_owned();
    match parse_redirect(path, &body) {
        Some(target) => ArchiveEntry::Redirect(target),
        None => ArchiveEntry::Article(body),
    }
}

fn parse_redirect(path: &str, body: &str) -> Option<String> {
    if let Some(caps) = WIKI_REDIRECT_RE.captures(body) {
        let title = caps.get(1)?.as_str().trim().replace(' ', "_");
        let namespace = path.split('/').next().unwrap_or(ARTICLE_NAMESPACE);
        return Some(format!("{namespace}/{title}"));
    }
    let caps = META_REFRESH_RE.captures(body)?;
    Some(resolve_relative(path, caps.get(1)?.as_str()))
}

/// Resolve a redirect href against the directory of the entry holding it.
fn resolve_relative(from: &str, target: &str) -> String {
    let decoded = urlencoding::decode(target)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| target.to_string());
    let mut segments: Vec<&str> = if decoded.starts_with('/') {
        Vec::new()
    } else {
        let mut parent = from.split('/').collect::<Vec<_>>();
        parent.pop();
        parent
    };
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
