//! Fish collection.
//!
//! There is no single list of US fish, so fish are gathered in three passes:
//!
//! 1. per-state list pages (precise but incomplete),
//! 2. the global list of common fish names, kept only when the article's
//!    distribution text mentions a North American place,
//! 3. validation of every accumulated candidate against its own article's
//!    infobox, which also replaces the scraped latin and repairs the name.

use std::collections::HashSet;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::archive::{ArticleSource, read_wiki_path};
use crate::html::{
    clean, cut_before_first, decoded_slug, extract_link, first_anchor_text, first_italic_text,
    list_items, page_title, strip_parenthetical, trim_to_content, truncate_chars,
};
use crate::species::{SpeciesCandidate, SpeciesType};

/// Per-region fish lists, read in this order.
pub const FISH_REGION_PAGES: &[&str] = &[
    "A/List_of_fishes_of_Alabama",
    "A/List_of_fishes_of_Alaska",
    "A/List_of_fishes_of_California",
    "A/List_of_fishes_of_Florida",
    "A/List_of_fishes_of_Hawaii",
    "A/List_of_fishes_of_Illinois",
    "A/List_of_fishes_of_Kentucky",
    "A/List_of_fishes_of_Michigan",
    "A/List_of_fishes_of_Minnesota",
    "A/List_of_fishes_of_Missouri",
    "A/List_of_fishes_of_New_York",
    "A/List_of_fishes_of_North_Carolina",
    "A/List_of_fishes_of_Oregon",
    "A/List_of_fishes_of_Tennessee",
    "A/List_of_fishes_of_Texas",
    "A/List_of_fishes_of_Washington",
    "A/List_of_fishes_of_the_Great_Lakes",
];

pub const GLOBAL_FISH_PAGE: &str = "A/List_of_common_fish_names";

/// Infobox row label present on real species articles.
pub const INFOBOX_MARKER: &str = "Binomial name";

/// Section ids whose body is read as distribution text.
pub const DISTRIBUTION_SECTION_IDS: &[&str] = &[
    "Distribution",
    "Distribution_and_habitat",
    "Habitat_and_distribution",
    "Distribution_and_range",
    "Range",
    "Range_and_habitat",
    "Geographic_range",
    "Native_range",
    "Habitat",
    "Ecology_and_distribution",
];

/// Lead-section phrases that announce where a species occurs.
pub const OCCURRENCE_PHRASES: &[&str] = &[
    "native to",
    "found in",
    "found throughout",
    "ranges from",
    "range extends",
    "occurs in",
    "endemic to",
    "distributed",
    "inhabits",
];

/// Lower-case place names that mark a species as present in the region.
pub const NORTH_AMERICA_KEYWORDS: &[&str] = &[
    "north america",
    "united states",
    "canada",
    "alaska",
    "hawaii",
    "great lakes",
    "lake superior",
    "lake michigan",
    "lake huron",
    "lake erie",
    "lake ontario",
    "mississippi",
    "missouri river",
    "ohio river",
    "tennessee river",
    "colorado river",
    "columbia river",
    "rio grande",
    "hudson bay",
    "st. lawrence",
    "chesapeake",
    "gulf of mexico",
    "florida",
    "texas",
    "california",
    "appalachian",
    "pacific northwest",
    "gulf of maine",
];

const REGION_END_MARKERS: &[&str] = &[
    r#"class="navbox"#,
    r#"id="References""#,
    r#"id="See_also""#,
    r#"id="External_links""#,
];
const SECTION_TEXT_LIMIT: usize = 1000;
const BINOMIAL_WINDOW: usize = 2000;
const PLACEHOLDER_EPITHETS: &[&str] = &["sp", "spp"];

const TABLE_CLOSE: &str = "</table>";
/// Abbreviations whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "st", "mt", "ft", "pt", "co", "no", "ca", "approx", "etc", "e.g", "i.e", "vs",
];

static DATA_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<table\s[^>]*class\s*=\s*["'][^"']*\b(?:wikitable|sortable)\b"#).unwrap()
});
static ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<tr(?:\s[^>]*)?>(.*?)</tr>").unwrap());
static CELL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<td(?:\s[^>]*)?>(.*?)</td>").unwrap());
static HEADING_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<h([1-6])[\s>]").unwrap());
static HEADING_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</h[1-6]\s*>").unwrap());
static SECTION_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<h2[\s>]").unwrap());
static PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<p(?:\s[^>]*)?>(.*?)</p>").unwrap());
static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());
static BINOMIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<i(?:\s[^>]*)?>\s*(?:<b(?:\s[^>]*)?>\s*)?([A-Z][a-z]+)\s+([a-z][a-z-]*\.?)").unwrap()
});
static BINOMIAL_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][a-z]+) [a-z]+$").unwrap());

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationStats {
    pub checked: usize,
    pub validated: usize,
    pub missing_article: usize,
    pub no_infobox: usize,
    pub no_binomial: usize,
    pub placeholder_epithet: usize,
    pub renamed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FishReport {
    pub regional_pages_read: usize,
    pub regional_pages_missing: usize,
    pub regional_candidates: usize,
    pub global_page_found: bool,
    pub global_candidates: usize,
    pub global_already_seen: usize,
    pub global_missing_article: usize,
    pub global_no_infobox: usize,
    pub global_included: usize,
    pub global_excluded: usize,
    pub validation: ValidationStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoInfobox,
    NoBinomial,
    PlaceholderEpithet,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoInfobox => "no-infobox",
            Self::NoBinomial => "no-binomial",
            Self::PlaceholderEpithet => "placeholder-epithet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FishVerdict {
    Accepted(SpeciesCandidate),
    Dropped(DropReason),
}

/// Insertion-ordered fish candidates keyed by lower-cased `wiki_path`.
#[derive(Debug, Clone, Default)]
pub struct FishAccumulator {
    seen: HashSet<String>,
    candidates: Vec<SpeciesCandidate>,
}

impl FishAccumulator {
    pub fn contains(&self, wiki_path: &str) -> bool {
        self.seen.contains(&wiki_path.to_lowercase())
    }

    /// Returns false when the path was already accumulated; the first one wins.
    pub fn insert(&mut self, candidate: SpeciesCandidate) -> bool {
        if !self.seen.insert(candidate.path_key()) {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_candidates(self) -> Vec<SpeciesCandidate> {
        self.candidates
    }
}

pub struct FishCollector<'a> {
    source: &'a dyn ArticleSource,
    region_pages: &'a [&'a str],
    global_page: &'a str,
}

impl<'a> FishCollector<'a> {
    pub fn new(source: &'a dyn ArticleSource) -> Self {
        Self::with_pages(source, FISH_REGION_PAGES, GLOBAL_FISH_PAGE)
    }

    pub fn with_pages(
        source: &'a dyn ArticleSource,
        region_pages: &'a [&'a str],
        global_page: &'a str,
    ) -> Self {
        Self {
            source,
            region_pages,
            global_page,
        }
    }

    /// Run all three passes and return validated fish in accumulation order.
    pub fn collect(&self) -> Result<(Vec<SpeciesCandidate>, FishReport)> {
        let mut report = FishReport::default();
        let mut accumulator = FishAccumulator::default();
        self.collect_regional(&mut accumulator, &mut report)?;
        self.collect_global(&mut accumulator, &mut report)?;
        let fish = self.validate(accumulator.into_candidates(), &mut report.validation)?;
        Ok((fish, report))
    }

    pub fn collect_regional(
        &self,
        accumulator: &mut FishAccumulator,
        report: &mut FishReport,
    ) -> Result<()> {
        for page in self.region_pages {
            let Some(html) = self.source.read_article(page)? else {
                tracing::warn!(page, "regional fish list not found in archive");
                report.regional_pages_missing += 1;
                continue;
            };
            report.regional_pages_read += 1;
            let mut added = 0usize;
            for candidate in parse_fish_list(&html) {
                if accumulator.insert(candidate) {
                    added += 1;
                }
            }
            report.regional_candidates += added;
            tracing::info!(page, added, "regional fish list read");
        }
        Ok(())
    }

    pub fn collect_global(
        &self,
        accumulator: &mut FishAccumulator,
        report: &mut FishReport,
    ) -> Result<()> {
        let Some(html) = self.source.read_article(self.global_page)? else {
            tracing::warn!(page = self.global_page, "global fish list not found in archive");
            return Ok(());
        };
        report.global_page_found = true;

        let candidates = parse_fish_list(&html);
        report.global_candidates = candidates.len();
        for candidate in candidates {
            if accumulator.contains(&candidate.wiki_path) {
                report.global_already_seen += 1;
                continue;
            }
            let Some(article) = read_wiki_path(self.source, &candidate.wiki_path)? else {
                report.global_missing_article += 1;
                continue;
            };
            if !article.contains(INFOBOX_MARKER) {
                report.global_no_infobox += 1;
                continue;
            }
            let signal = distribution_signal(&article);
            if is_north_american(&signal) {
                tracing::debug!(wiki_path = %candidate.wiki_path, "global fish classified present");
                if accumulator.insert(candidate) {
                    report.global_included += 1;
                }
            } else {
                tracing::debug!(wiki_path = %candidate.wiki_path, "global fish classified absent");
                report.global_excluded += 1;
            }
        }
        tracing::info!(
            candidates = report.global_candidates,
            included = report.global_included,
            excluded = report.global_excluded,
            "global fish list classified"
        );
        Ok(())
    }

    pub fn validate(
        &self,
        candidates: Vec<SpeciesCandidate>,
        stats: &mut ValidationStats,
    ) -> Result<Vec<SpeciesCandidate>> {
        let mut out = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            stats.checked += 1;
            let Some(article) = read_wiki_path(self.source, &candidate.wiki_path)? else {
                tracing::debug!(wiki_path = %candidate.wiki_path, reason = "missing-article", "fish dropped");
                stats.missing_article += 1;
                continue;
            };
            let previous_name = candidate.name.clone();
            match validate_fish(candidate, &article) {
                FishVerdict::Accepted(fish) => {
                    if fish.name != previous_name {
                        stats.renamed += 1;
                    }
                    stats.validated += 1;
                    out.push(fish);
                }
                FishVerdict::Dropped(reason) => {
                    tracing::debug!(name = %previous_name, reason = reason.as_str(), "fish dropped");
                    match reason {
                        DropReason::NoInfobox => stats.no_infobox += 1,
                        DropReason::NoBinomial => stats.no_binomial += 1,
                        DropReason::PlaceholderEpithet => stats.placeholder_epithet += 1,
                    }
                }
            }
        }
        tracing::info!(
            checked = stats.checked,
            validated = stats.validated,
            renamed = stats.renamed,
            "fish validated"
        );
        Ok(out)
    }
}

/// Candidates from a fish list page: rows of its data tables (`wikitable` or
/// `sortable`), or its list items when no data table yields a candidate.
/// Banner, infobox and layout tables are never read as data.
pub fn parse_fish_list(html: &str) -> Vec<SpeciesCandidate> {
    let content = cut_before_first(trim_to_content(html), REGION_END_MARKERS);
    let rows = parse_table_rows(content);
    if rows.is_empty() {
        parse_list_rows(content)
    } else {
        rows
    }
}

fn parse_table_rows(content: &str) -> Vec<SpeciesCandidate> {
    DATA_TABLE_RE
        .find_iter(content)
        .flat_map(|open| {
            let table = &content[open.start()..];
            let end = table.find(TABLE_CLOSE).unwrap_or(table.len());
            table_row_candidates(&table[..end])
        })
        .collect()
}

fn table_row_candidates(table: &str) -> Vec<SpeciesCandidate> {
    ROW_RE
        .captures_iter(table)
        .filter_map(|row| {
            let cells = CELL_RE
                .captures_iter(row.get(1)?.as_str())
                .filter_map(|cell| cell.get(1).map(|m| m.as_str()))
                .collect::<Vec<_>>();
            let first = cells.first()?;
            let wiki_path = extract_link(first)?;
            let name = first_anchor_text(first).or_else(|| {
                let text = clean(first);
                if text.is_empty() { None } else { Some(text) }
            })?;
            let latin = cells
                .get(1)
                .and_then(|cell| first_italic_text(cell))
                .unwrap_or_default();
            Some(SpeciesCandidate::new(SpeciesType::Fish, name, latin, wiki_path))
        })
        .collect()
}

fn parse_list_rows(content: &str) -> Vec<SpeciesCandidate> {
    list_items(content)
        .into_iter()
        .filter_map(|item| {
            let wiki_path = extract_link(item)?;
            let name = first_anchor_text(item)?;
            let latin = first_italic_text(item).unwrap_or_default();
            Some(SpeciesCandidate::new(SpeciesType::Fish, name, latin, wiki_path))
        })
        .collect()
}

/// Lower-cased distribution text: the bodies of the distribution-like sections
/// plus the lead sentences that say where the species occurs.
pub fn distribution_signal(html: &str) -> String {
    let mut parts = Vec::new();
    for section_id in DISTRIBUTION_SECTION_IDS {
        if let Some(text) = section_text(html, section_id) {
            parts.push(text);
        }
    }
    parts.extend(lead_occurrence_sentences(html));
    parts.join(" ").to_lowercase()
}

pub fn is_north_american(signal: &str) -> bool {
    NORTH_AMERICA_KEYWORDS
        .iter()
        .any(|keyword| signal.contains(keyword))
}

/// Cleaned body of the section whose heading carries `id="<section_id>"`.
/// Subsections belong to the body; it ends at the next heading of the same or a
/// higher level.
fn section_text(html: &str, section_id: &str) -> Option<String> {
    let anchor = format!(r#"id="{section_id}""#);
    let anchor_at = html.find(&anchor)?;
    let level = HEADING_OPEN_RE
        .captures_iter(&html[..anchor_at])
        .last()
        .and_then(|caps| caps[1].parse::<u8>().ok())
        .unwrap_or(2);
    let after_anchor = &html[anchor_at + anchor.len()..];
    let body_start = HEADING_CLOSE_RE
        .find(after_anchor)
        .map(|m| m.end())
        .unwrap_or(0);
    let body = &after_anchor[body_start..];
    let body_end = HEADING_OPEN_RE
        .captures_iter(body)
        .find(|caps| caps[1].parse::<u8>().is_ok_and(|next| next <= level))
        .and_then(|caps| caps.get(0))
        .map(|m| m.start())
        .unwrap_or(body.len());
    let text = clean(&body[..body_end]);
    if text.is_empty() {
        return None;
    }
    Some(truncate_chars(&text, SECTION_TEXT_LIMIT).to_string())
}

fn lead_occurrence_sentences(html: &str) -> Vec<String> {
    let content = trim_to_content(html);
    let lead_end = SECTION_HEADING_RE
        .find(content)
        .map(|m| m.start())
        .unwrap_or(content.len());
    let lead = &content[..lead_end];

    let mut out = Vec::new();
    for paragraph in PARAGRAPH_RE.captures_iter(lead) {
        let Some(inner) = paragraph.get(1) else {
            continue;
        };
        let text = clean(inner.as_str());
        for sentence in split_sentences(&text) {
            let lowered = sentence.to_lowercase();
            if OCCURRENCE_PHRASES
                .iter()
                .any(|phrase| lowered.contains(phrase))
            {
                out.push(sentence.to_string());
            }
        }
    }
    out
}

/// Split prose at `.`, `!` or `?` followed by whitespace and a capital letter.
/// A period after an abbreviation (`St.`, `U.S.`, a lone initial) does not end
/// the sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for end in SENTENCE_END_RE.find_iter(text) {
        let next_is_capital = text[end.end()..]
            .chars()
            .next()
            .is_some_and(char::is_uppercase);
        if !next_is_capital {
            continue;
        }
        if end.as_str().starts_with('.') && ends_with_abbreviation(&text[start..end.start()]) {
            continue;
        }
        out.push(text[start..=end.start()].trim());
        start = end.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn ends_with_abbreviation(before: &str) -> bool {
    let word = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_start_matches(|ch: char| !ch.is_alphanumeric());
    word.chars().count() == 1
        || word.contains('.')
        || ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}

/// Genus and epithet of the first italic binomial after the infobox marker.
pub fn infobox_binomial(html: &str) -> Option<(String, String)> {
    let start = html.find(INFOBOX_MARKER)? + INFOBOX_MARKER.len();
    let window = truncate_chars(&html[start..], BINOMIAL_WINDOW);
    let caps = BINOMIAL_RE.captures(window)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

fn is_placeholder_epithet(epithet: &str) -> bool {
    PLACEHOLDER_EPITHETS.contains(&epithet.trim_end_matches('.'))
}

/// Check a fish candidate against its own article and rewrite `latin` and
/// `name` from it.
pub fn validate_fish(mut candidate: SpeciesCandidate, html: &str) -> FishVerdict {
    if !html.contains(INFOBOX_MARKER) {
        return FishVerdict::Dropped(DropReason::NoInfobox);
    }
    let Some((genus, epithet)) = infobox_binomial(html) else {
        return FishVerdict::Dropped(DropReason::NoBinomial);
    };
    if is_placeholder_epithet(&epithet) {
        return FishVerdict::Dropped(DropReason::PlaceholderEpithet);
    }
    let latin = format!("{genus} {epithet}");
    candidate.name = reconcile_name(&candidate, html, &latin, &genus);
    candidate.latin = latin;
    FishVerdict::Accepted(candidate)
}

fn reconcile_name(candidate: &SpeciesCandidate, html: &str, latin: &str, genus: &str) -> String {
    let current = candidate.name.trim();
    let same = |left: &str, right: &str| left.eq_ignore_ascii_case(right);
    let title = page_title(html)
        .map(|title| strip_parenthetical(&title))
        .filter(|title| !title.is_empty() && !same(title.as_str(), latin) && !same(title.as_str(), genus));

    let lacks_common_name = current.is_empty()
        || same(current, latin)
        || same(current, candidate.latin.as_str())
        || same(current, genus);

    let name = if lacks_common_name {
        match title {
            Some(title) => title,
            None => {
                let slug = strip_parenthetical(&decoded_slug(&candidate.wiki_path).replace('_', " "));
                if !slug.is_empty() && !looks_like_binomial(&slug, latin, genus) {
                    slug
                } else {
                    current.to_string()
                }
            }
        }
    } else {
        match title.filter(|title| title.as_str() != current) {
            Some(title) => title,
            None => current.to_string(),
        }
    };
    strip_parenthetical(&name)
}

fn looks_like_binomial(text: &str, latin: &str, genus: &str) -> bool {
    if text.eq_ignore_ascii_case(latin) {
        return true;
    }
    BINOMIAL_SHAPE_RE
        .captures(text)
        .is_some_and(|caps| caps[1].eq_ignore_ascii_case(genus))
}
