//! Field extraction from exported species pages.
//!
//! Produces the record shape consumed by the assembly stage: the infobox
//! binomial, the IUCN conservation status, and a common name repaired from the
//! page title where the index only ever had the latin name.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::html::{page_title, strip_tags};
use crate::pages::read_cached_page;
use crate::species::{SpeciesCandidate, SpeciesType};

/// Longest phrases first so "Extinct in the Wild" is never read as "Extinct".
pub const IUCN_STATUSES: &[&str] = &[
    "Extinct in the Wild",
    "Critically Endangered",
    "Near Threatened",
    "Least Concern",
    "Data Deficient",
    "Endangered",
    "Vulnerable",
    "Extinct",
    "Secure",
];

const UNKNOWN_STATUS: &str = "Unknown";
const LOWERCASE_WORDS: &[&str] = &["of", "the", "and", "in", "on", "at", "to", "for", "a", "an"];

static IUCN_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives = IUCN_STATUSES
        .iter()
        .map(|status| regex::escape(status))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternatives}")).unwrap()
});
static BINOMIAL_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)class="binomial"[^>]*>(.*?)</(?:td|span)"#).unwrap());
static BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSpecies {
    pub name: String,
    pub species: String,
    #[serde(rename = "type")]
    pub kind: SpeciesType,
    pub wiki_path: String,
    pub conservation_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractReport {
    pub total: usize,
    pub pages_found: usize,
    pub names_fixed: usize,
    pub statuses: Vec<StatusCount>,
}

/// Binomial from the `class="binomial"` element with author and year dropped.
pub fn parse_binomial(html: &str) -> Option<String> {
    let caps = BINOMIAL_CLASS_RE.captures(html)?;
    let text = strip_tags(caps.get(1)?.as_str());
    let text = BRACKET_RE.replace_all(&text, "");
    let mut words = text.split_whitespace();
    let genus = words.next()?;
    let epithet = words.next()?;
    Some(format!("{genus} {epithet}"))
}

pub fn parse_conservation_status(html: &str) -> Option<String> {
    IUCN_RE.find(html).map(|m| capitalize_words(m.as_str()))
}

/// Page title, capitalized word by word when the title starts lower-case.
pub fn parse_title_name(html: &str) -> Option<String> {
    let title = page_title(html)?;
    if title.chars().next().is_some_and(char::is_lowercase) {
        return Some(capitalize_words(&title));
    }
    Some(title)
}

/// Capitalize all-lower or all-upper words, keeping short joining words
/// lower-case after the first position. Mixed-case words are left alone.
pub fn title_case_name(name: &str) -> String {
    name.split_whitespace()
        .enumerate()
        .map(|(index, word)| {
            let lowered = word.to_lowercase();
            if index > 0 && LOWERCASE_WORDS.contains(&lowered.as_str()) {
                lowered
            } else if word == lowered || word == word.to_uppercase() {
                capitalize(word)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn capitalize_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alphabetic = false;
    for ch in text.chars() {
        if previous_alphabetic {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_alphabetic = ch.is_alphabetic();
    }
    out
}

pub fn extract_one(entry: &SpeciesCandidate, html: Option<&str>) -> ExtractedSpecies {
    let mut name = entry.name.clone();
    let mut species = entry.latin.clone();
    let mut conservation_status = None;

    if let Some(html) = html {
        if let Some(binomial) = parse_binomial(html) {
            species = binomial;
        }
        conservation_status = parse_conservation_status(html);
        if entry.name == entry.latin
            && let Some(title) = parse_title_name(html)
            && !title.eq_ignore_ascii_case(&species)
        {
            name = title;
        }
    }

    ExtractedSpecies {
        name: title_case_name(&name),
        species,
        kind: entry.kind,
        wiki_path: entry.wiki_path.clone(),
        conservation_status,
    }
}

pub fn extract_all(
    species: &[SpeciesCandidate],
    pages_dir: &Path,
) -> Result<(Vec<ExtractedSpecies>, ExtractReport)> {
    let mut records = Vec::with_capacity(species.len());
    let mut pages_found = 0usize;
    let mut names_fixed = 0usize;
    let mut status_counts = BTreeMap::<String, usize>::new();

    for entry in species {
        let html = read_cached_page(pages_dir, &entry.wiki_path)?;
        if html.is_some() {
            pages_found += 1;
        }
        let record = extract_one(entry, html.as_deref());
        if entry.name == entry.latin && record.name != entry.name {
            names_fixed += 1;
        }
        let status = record
            .conservation_status
            .clone()
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string());
        *status_counts.entry(status).or_default() += 1;
        records.push(record);
    }

    let mut statuses = status_counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect::<Vec<_>>();
    statuses.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.status.cmp(&right.status))
    });

    let report = ExtractReport {
        total: records.len(),
        pages_found,
        names_fixed,
        statuses,
    };
    tracing::info!(
        total = report.total,
        pages_found = report.pages_found,
        names_fixed = report.names_fixed,
        "fields extracted"
    );
    Ok((records, report))
}

pub fn write_extracted(path: &Path, records: &[ExtractedSpecies]) -> Result<()> {
    let mut rendered =
        serde_json::to_string_pretty(records).context("failed to serialize extracted records")?;
    rendered.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::pages::page_filename;

    #[test]
    fn binomial_keeps_first_two_words() {
        let html = r#"<td class="binomial"><i><b>Micropterus salmoides</b></i><br /> <small>(Lacépède, 1802)</small>[2]</td>"#;
        assert_eq!(parse_binomial(html).as_deref(), Some("Micropterus salmoides"));
        let footnoted = r#"<span class="binomial"><i>Amia</i>[1] <i>calva</i></span>"#;
        assert_eq!(parse_binomial(footnoted).as_deref(), Some("Amia calva"));
        assert_eq!(parse_binomial(r#"<span class="binomial"><i>Amia</i></span>"#), None);
        assert_eq!(parse_binomial("<p>nothing</p>"), None);
    }

    #[test]
    fn conservation_status_prefers_longest_phrase() {
        assert_eq!(
            parse_conservation_status("<td>Extinct in the wild (IUCN 3.1)</td>").as_deref(),
            Some("Extinct In The Wild")
        );
        assert_eq!(
            parse_conservation_status("<a>LEAST CONCERN</a> then Endangered").as_deref(),
            Some("Least Concern")
        );
        assert_eq!(parse_conservation_status("<p>common</p>"), None);
    }

    #[test]
    fn title_name_is_capitalized_when_lower_case() {
        assert_eq!(
            parse_title_name("<title>american bullfrog - Wikipedia</title>").as_deref(),
            Some("American Bullfrog")
        );
        assert_eq!(
            parse_title_name("<title>Gila monster</title>").as_deref(),
            Some("Gila monster")
        );
    }

    #[test]
    fn title_case_keeps_small_words_and_mixed_case() {
        assert_eq!(title_case_name("bird of paradise"), "Bird of Paradise");
        assert_eq!(title_case_name("the GREAT auk"), "The Great Auk");
        assert_eq!(title_case_name("McKay's bunting"), "McKay's Bunting");
    }

    #[test]
    fn extract_one_repairs_latin_only_names() {
        let entry = SpeciesCandidate::new(
            SpeciesType::Reptile,
            "Crotalus horridus",
            "Crotalus horridus",
            "/wiki/Crotalus_horridus",
        );
        let html = r#"<title>Timber rattlesnake - Wikipedia</title><td class="binomial"><i>Crotalus horridus</i> Linnaeus, 1758</td><p>Least Concern</p>"#;
        let record = extract_one(&entry, Some(html));
        assert_eq!(record.name, "Timber Rattlesnake");
        assert_eq!(record.species, "Crotalus horridus");
        assert_eq!(record.conservation_status.as_deref(), Some("Least Concern"));

        let without_page = extract_one(&entry, None);
        assert_eq!(without_page.name, "Crotalus Horridus");
        assert_eq!(without_page.species, "Crotalus horridus");
        assert_eq!(without_page.conservation_status, None);
    }

    #[test]
    fn extract_all_reads_cached_pages_and_summarizes() {
        let temp = tempdir().expect("tempdir");
        let pages_dir = temp.path().join("pages");
        fs::create_dir_all(&pages_dir).expect("create pages");
        let species = vec![
            SpeciesCandidate::new(SpeciesType::Fish, "Bowfin", "Amia calva", "/wiki/Bowfin"),
            SpeciesCandidate::new(SpeciesType::Mammal, "Elk", "C. canadensis", "/wiki/Elk"),
            SpeciesCandidate::new(
                SpeciesType::Amphibian,
                "Ambystoma tigrinum",
                "Ambystoma tigrinum",
                "/wiki/Tiger_salamander",
            ),
            SpeciesCandidate::new(SpeciesType::Bird, "Dodo", "", "/wiki/Dodo"),
        ];
        fs::write(
            pages_dir.join(page_filename("/wiki/Bowfin")),
            "<title>Bowfin</title><p>Least Concern</p>",
        )
        .expect("write bowfin");
        fs::write(
            pages_dir.join(page_filename("/wiki/Elk")),
            r#"<title>Elk</title><span class="binomial"><i>Cervus canadensis</i></span> Least Concern"#,
        )
        .expect("write elk");
        fs::write(
            pages_dir.join(page_filename("/wiki/Tiger_salamander")),
            "<title>Tiger salamander</title><p>Endangered</p>",
        )
        .expect("write salamander");

        let (records, report) = extract_all(&species, &pages_dir).expect("extract all");
        assert_eq!(report.total, 4);
        assert_eq!(report.pages_found, 3);
        assert_eq!(report.names_fixed, 1);
        assert_eq!(records[1].species, "Cervus canadensis");
        assert_eq!(records[2].name, "Tiger Salamander");
        assert_eq!(
            report.statuses,
            vec![
                StatusCount { status: "Least Concern".to_string(), count: 2 },
                StatusCount { status: "Endangered".to_string(), count: 1 },
                StatusCount { status: "Unknown".to_string(), count: 1 },
            ]
        );

        let output = temp.path().join("extracted.json");
        write_extracted(&output, &records).expect("write extracted");
        let raw = fs::read_to_string(&output).expect("read extracted");
        assert!(raw.contains(r#""conservation_status": null"#));
        assert!(raw.contains(r#""type": "Amphibian""#));
    }
}
