//! Export of each indexed species' article HTML into a flat pages directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::archive::{ArticleSource, read_wiki_path};
use crate::html::decoded_slug;
use crate::species::SpeciesCandidate;

const PROGRESS_EVERY: usize = 200;

static UNSAFE_FILENAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct PagesReport {
    pub pages_dir: String,
    pub total: usize,
    pub written: usize,
    /// Names of the species whose article could not be found, in index order.
    pub missing: Vec<String>,
}

/// `/wiki/Cope%27s_gray_treefrog` -> `Cope's_gray_treefrog.html`
pub fn page_filename(wiki_path: &str) -> String {
    let slug = decoded_slug(wiki_path);
    format!("{}.html", UNSAFE_FILENAME_RE.replace_all(&slug, "_"))
}

pub fn export_pages(
    source: &dyn ArticleSource,
    species: &[SpeciesCandidate],
    pages_dir: &Path,
) -> Result<PagesReport> {
    fs::create_dir_all(pages_dir)
        .with_context(|| format!("failed to create {}", pages_dir.display()))?;

    let mut report = PagesReport {
        pages_dir: pages_dir.to_string_lossy().replace('\\', "/"),
        total: species.len(),
        written: 0,
        missing: Vec::new(),
    };
    for (index, candidate) in species.iter().enumerate() {
        match read_wiki_path(source, &candidate.wiki_path)? {
            Some(html) => {
                let path = pages_dir.join(page_filename(&candidate.wiki_path));
                fs::write(&path, html)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                report.written += 1;
            }
            None => {
                tracing::debug!(wiki_path = %candidate.wiki_path, reason = "missing-article", "page not exported");
                report.missing.push(candidate.name.clone());
            }
        }
        if (index + 1) % PROGRESS_EVERY == 0 {
            tracing::info!(processed = index + 1, total = species.len(), "exporting pages");
        }
    }
    Ok(report)
}

/// Previously exported page for `wiki_path`, decoded lossily.
pub fn read_cached_page(pages_dir: &Path, wiki_path: &str) -> Result<Option<String>> {
    let path = pages_dir.join(page_filename(wiki_path));
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::archive::MemoryArchive;
    use crate::species::SpeciesType;

    #[test]
    fn page_filename_decodes_and_sanitizes() {
        assert_eq!(page_filename("/wiki/Cope%27s_gray_treefrog"), "Cope's_gray_treefrog.html");
        assert_eq!(page_filename("/wiki/AC%2FDC_fish"), "AC_DC_fish.html");
        assert_eq!(page_filename("/wiki/What?_fish*"), "What__fish_.html");
    }

    #[test]
    fn export_writes_found_pages_and_lists_missing_names() {
        let temp = tempdir().expect("tempdir");
        let pages_dir = temp.path().join("pages");
        let archive = MemoryArchive::new()
            .with_article("A/Bowfin", "<title>Bowfin</title>")
            .with_article("A/Cope's_gray_treefrog", "<title>Cope's gray treefrog</title>");
        let species = vec![
            SpeciesCandidate::new(SpeciesType::Fish, "Bowfin", "Amia calva", "/wiki/Bowfin"),
            SpeciesCandidate::new(SpeciesType::Fish, "Ghost fish", "", "/wiki/Ghost_fish"),
            SpeciesCandidate::new(
                SpeciesType::Amphibian,
                "Cope's gray treefrog",
                "Dryophytes chrysoscelis",
                "/wiki/Cope%27s_gray_treefrog",
            ),
        ];

        let report = export_pages(&archive, &species, &pages_dir).expect("export pages");
        assert_eq!(report.total, 3);
        assert_eq!(report.written, 2);
        assert_eq!(report.missing, vec!["Ghost fish".to_string()]);

        let cached = read_cached_page(&pages_dir, "/wiki/Cope%27s_gray_treefrog")
            .expect("read cached page");
        assert_eq!(cached.as_deref(), Some("<title>Cope's gray treefrog</title>"));
        assert_eq!(
            read_cached_page(&pages_dir, "/wiki/Ghost_fish").expect("read missing page"),
            None
        );

        let rerun = export_pages(&archive, &species, &pages_dir).expect("export pages again");
        assert_eq!(rerun.written, 2);
    }
}
