//! Merge per-source candidates into one unique index.

use std::collections::HashSet;

use serde::Serialize;

use crate::species::{SpeciesCandidate, SpeciesType};

/// Species the automated sources miss, e.g. after a taxonomic split. These are
/// merged first and win every tie.
pub fn manual_additions() -> Vec<SpeciesCandidate> {
    vec![
        SpeciesCandidate::new(
            SpeciesType::Bird,
            "Woodhouse's scrub jay",
            "Aphelocoma woodhouseii",
            "/wiki/Woodhouse%27s_scrub_jay",
        ),
        SpeciesCandidate::new(
            SpeciesType::Bird,
            "California scrub jay",
            "Aphelocoma californica",
            "/wiki/California_scrub_jay",
        ),
    ]
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DedupReport {
    pub input: usize,
    pub unique: usize,
    pub missing_path: usize,
    pub duplicate_path: usize,
    pub duplicate_latin: usize,
    pub duplicate_name: usize,
}

impl DedupReport {
    pub fn rejected(&self) -> usize {
        self.missing_path + self.duplicate_path + self.duplicate_latin + self.duplicate_name
    }
}

#[derive(Debug, Default)]
struct SeenKeys {
    paths: HashSet<String>,
    latins: HashSet<String>,
    names: HashSet<(SpeciesType, String)>,
}

/// Single left-to-right pass; the first candidate holding a key keeps it.
///
/// A candidate must be new on all three keys: lower-cased `wiki_path`,
/// lower-cased non-empty `latin`, and `(type, lower-cased name)`. Keys of
/// rejected candidates are not recorded.
pub fn dedupe<I>(candidates: I) -> (Vec<SpeciesCandidate>, DedupReport)
where
    I: IntoIterator<Item = SpeciesCandidate>,
{
    let mut seen = SeenKeys::default();
    let mut report = DedupReport::default();
    let mut unique = Vec::new();

    for candidate in candidates {
        report.input += 1;
        if candidate.wiki_path.trim().is_empty() {
            report.missing_path += 1;
            continue;
        }
        let path_key = candidate.path_key();
        if seen.paths.contains(&path_key) {
            report.duplicate_path += 1;
            continue;
        }
        let latin_key = candidate.latin.trim().to_lowercase();
        if !latin_key.is_empty() && seen.latins.contains(&latin_key) {
            tracing::debug!(wiki_path = %candidate.wiki_path, reason = "duplicate-latin", "candidate dropped");
            report.duplicate_latin += 1;
            continue;
        }
        let name_key = (candidate.kind, candidate.name.trim().to_lowercase());
        if seen.names.contains(&name_key) {
            tracing::debug!(wiki_path = %candidate.wiki_path, reason = "duplicate-name", "candidate dropped");
            report.duplicate_name += 1;
            continue;
        }

        seen.paths.insert(path_key);
        if !latin_key.is_empty() {
            seen.latins.insert(latin_key);
        }
        seen.names.insert(name_key);
        unique.push(candidate);
    }

    report.unique = unique.len();
    (unique, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mammal(name: &str, latin: &str, path: &str) -> SpeciesCandidate {
        SpeciesCandidate::new(SpeciesType::Mammal, name, latin, path)
    }

    #[test]
    fn case_variant_paths_collapse_to_first() {
        let (unique, report) = dedupe(vec![
            mammal("Elk", "Cervus canadensis", "/wiki/Elk"),
            mammal("Wapiti", "", "/wiki/elk"),
        ]);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].name, "Elk");
        assert_eq!(report.duplicate_path, 1);
    }

    #[test]
    fn latin_collisions_ignore_empty_latin() {
        let (unique, report) = dedupe(vec![
            mammal("Cougar", "Puma concolor", "/wiki/Cougar"),
            mammal("Mountain lion", "puma concolor", "/wiki/Mountain_lion"),
            mammal("Ringtail", "", "/wiki/Ringtail"),
            mammal("Coati", "", "/wiki/Coati"),
        ]);
        let names = unique.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Cougar", "Ringtail", "Coati"]);
        assert_eq!(report.duplicate_latin, 1);
    }

    #[test]
    fn name_collisions_only_within_a_type() {
        let (unique, report) = dedupe(vec![
            SpeciesCandidate::new(SpeciesType::Bird, "Robin", "Turdus migratorius", "/wiki/American_robin"),
            SpeciesCandidate::new(SpeciesType::Mammal, "Robin", "", "/wiki/Robin_(mammal)"),
            SpeciesCandidate::new(SpeciesType::Bird, "robin", "Erithacus rubecula", "/wiki/European_robin"),
        ]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[1].kind, SpeciesType::Mammal);
        assert_eq!(report.duplicate_name, 1);
    }

    #[test]
    fn rejected_candidates_do_not_claim_keys() {
        // The second entry loses on path, so its latin must stay available.
        let (unique, report) = dedupe(vec![
            mammal("Elk", "", "/wiki/Elk"),
            mammal("Moose", "Alces alces", "/wiki/ELK"),
            mammal("Moose", "Alces alces", "/wiki/Moose"),
            mammal("No path", "Nullus", " "),
        ]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[1].wiki_path, "/wiki/Moose");
        assert_eq!(report.missing_path, 1);
        assert_eq!(report.rejected(), 2);
        assert_eq!(report.input, 4);
        assert_eq!(report.unique, 2);
    }

    #[test]
    fn manual_additions_win_over_later_sources() {
        let mut input = manual_additions();
        input.push(SpeciesCandidate::new(
            SpeciesType::Bird,
            "Western scrub jay",
            "Aphelocoma californica",
            "/wiki/Western_scrub_jay",
        ));
        let (unique, _) = dedupe(input);
        assert_eq!(unique.len(), 2);
        assert!(unique.iter().all(|s| s.kind == SpeciesType::Bird));
        assert_eq!(unique[1].name, "California scrub jay");
    }
}
