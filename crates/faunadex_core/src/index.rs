use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::archive::ArticleSource;
use crate::dedup::{DedupReport, dedupe, manual_additions};
use crate::fish::{FishCollector, FishReport};
use crate::parsers::{LIST_SOURCES, ListSource};
use crate::species::{SpeciesCandidate, SpeciesType};

#[derive(Debug, Clone, Serialize)]
pub struct SourceCount {
    pub label: String,
    pub path: String,
    pub found: bool,
    pub candidates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub archive: String,
    pub manual_additions: usize,
    pub sources: Vec<SourceCount>,
    pub fish_candidates: usize,
    pub fish: FishReport,
    pub dedup: DedupReport,
}

#[derive(Debug, Clone)]
pub struct BuiltIndex {
    pub species: Vec<SpeciesCandidate>,
    pub report: IndexReport,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub missing_latin: usize,
    pub name_equals_latin: usize,
}

/// Build the unique species index from the group list pages and the fish
/// collector.
pub fn build_species_index(source: &dyn ArticleSource) -> Result<BuiltIndex> {
    collect_index(source, LIST_SOURCES, &FishCollector::new(source))
}

/// Merge order: manual additions, then `list_sources` in order, then fish.
pub fn collect_index(
    source: &dyn ArticleSource,
    list_sources: &[ListSource],
    fish_collector: &FishCollector<'_>,
) -> Result<BuiltIndex> {
    let manual = manual_additions();
    let mut report = IndexReport {
        archive: source.describe(),
        manual_additions: manual.len(),
        sources: Vec::with_capacity(list_sources.len()),
        fish_candidates: 0,
        fish: FishReport::default(),
        dedup: DedupReport::default(),
    };

    let mut merged = manual;
    for list in list_sources {
        let Some(html) = source.read_article(list.path)? else {
            tracing::warn!(label = list.label, path = list.path, "list page not found in archive");
            report.sources.push(SourceCount {
                label: list.label.to_string(),
                path: list.path.to_string(),
                found: false,
                candidates: 0,
            });
            continue;
        };
        let species = (list.parser)(&html);
        tracing::info!(label = list.label, candidates = species.len(), "list page parsed");
        report.sources.push(SourceCount {
            label: list.label.to_string(),
            path: list.path.to_string(),
            found: true,
            candidates: species.len(),
        });
        merged.extend(species);
    }

    let (fish, fish_report) = fish_collector.collect()?;
    report.fish_candidates = fish.len();
    report.fish = fish_report;
    merged.extend(fish);

    let (species, dedup_report) = dedupe(merged);
    tracing::info!(
        input = dedup_report.input,
        unique = dedup_report.unique,
        "species index merged"
    );
    report.dedup = dedup_report;
    Ok(BuiltIndex { species, report })
}

pub fn render_species_index(species: &[SpeciesCandidate]) -> Result<String> {
    let mut rendered =
        serde_json::to_string_pretty(species).context("failed to serialize species index")?;
    rendered.push('\n');
    Ok(rendered)
}

/// Write the index as pretty JSON and return the SHA-256 of the written bytes.
pub fn write_species_index(path: &Path, species: &[SpeciesCandidate]) -> Result<String> {
    let rendered = render_species_index(species)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, &rendered).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(content_digest(&rendered))
}

pub fn load_species_index(path: &Path) -> Result<Vec<SpeciesCandidate>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn index_stats(species: &[SpeciesCandidate]) -> IndexStats {
    let mut by_type = SpeciesType::ALL
        .iter()
        .map(|kind| (kind.as_str().to_string(), 0usize))
        .collect::<BTreeMap<_, _>>();
    let mut missing_latin = 0usize;
    let mut name_equals_latin = 0usize;
    for candidate in species {
        *by_type.entry(candidate.kind.as_str().to_string()).or_default() += 1;
        if candidate.latin.trim().is_empty() {
            missing_latin += 1;
        } else if candidate.name.eq_ignore_ascii_case(&candidate.latin) {
            name_equals_latin += 1;
        }
    }
    IndexStats {
        total: species.len(),
        by_type,
        missing_latin,
        name_equals_latin,
    }
}

pub fn content_digest(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut output = String::with_capacity(64);
    for byte in digest.iter() {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
