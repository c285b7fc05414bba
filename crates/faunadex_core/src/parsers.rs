//! List-page parsers, one per taxonomic group.
//!
//! Each parser is a pure function from one list page to candidates. They are
//! lossy on purpose: an item that does not fit the group's markup shape is
//! dropped without trace.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::html::{
    clean, cut_before_first, decode_entities, extract_link, first_anchor_text, has_italic,
    is_article_href, list_items, trim_to_content, wiki_path_from_href,
};
use crate::species::{SpeciesCandidate, SpeciesType};

pub type ListParser = fn(&str) -> Vec<SpeciesCandidate>;

#[derive(Debug, Clone, Copy)]
pub struct ListSource {
    pub label: &'static str,
    pub path: &'static str,
    pub kind: SpeciesType,
    pub parser: ListParser,
}

/// Group list pages in merge order. The reptile page is a redirect in current
/// dumps and is read through it.
pub const LIST_SOURCES: &[ListSource] = &[
    ListSource {
        label: "Mammals",
        path: "A/List_of_mammals_of_the_United_States",
        kind: SpeciesType::Mammal,
        parser: parse_mammals,
    },
    ListSource {
        label: "Birds",
        path: "A/List_of_birds_of_the_United_States",
        kind: SpeciesType::Bird,
        parser: parse_birds,
    },
    ListSource {
        label: "Amphibians",
        path: "A/List_of_amphibians_of_the_United_States",
        kind: SpeciesType::Amphibian,
        parser: parse_amphibians,
    },
    ListSource {
        label: "Reptiles",
        path: "A/List_of_North_American_reptiles",
        kind: SpeciesType::Reptile,
        parser: parse_reptiles,
    },
];

const REFERENCES_MARKER: &str = r#"id="References""#;

static MAMMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r##"<a\s[^>]*href="([^"#]+)"[^>]*title="([^"]+)"[^>]*>([^<]+)</a>\s*,\s*<i(?:\s[^>]*)?>([^<]+)</i>"##,
    )
    .unwrap()
});
static AMPHIBIAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r##"<li(?:\s[^>]*)?>\s*<i(?:\s[^>]*)?>\s*<a\s[^>]*href="([^"#]+)"[^>]*title="([^"]+)"[^>]*>([^<]+)</a>\s*</i>"##,
    )
    .unwrap()
});
static BIRD_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*,\s*([A-Z][a-z]+ [a-z]+(?:\s+[a-z]+)?)").unwrap());
static REPTILE_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s*\(\s*([A-Z][a-z]+ [a-z]+(?:\s+[a-z]+)?)\s*\)").unwrap()
});

/// `<a href=".." title="..">Common name</a>, <i>Abbreviated latin</i>`
pub fn parse_mammals(html: &str) -> Vec<SpeciesCandidate> {
    MAMMAL_RE
        .captures_iter(html)
        .filter(|caps| is_article_href(&caps[1]))
        .map(|caps| {
            SpeciesCandidate::new(
                SpeciesType::Mammal,
                clean(&caps[3]),
                clean(&caps[4]),
                wiki_path_from_href(&caps[1]),
            )
        })
        .collect()
}

/// List items shaped `Common name, Genus species` once tags are stripped.
pub fn parse_birds(html: &str) -> Vec<SpeciesCandidate> {
    let content = trim_to_content(html);
    list_items(content)
        .into_iter()
        .filter(|item| has_italic(item))
        .filter_map(|item| {
            let wiki_path = extract_link(item)?;
            let text = clean(item);
            let caps = BIRD_TEXT_RE.captures(&text)?;
            Some(SpeciesCandidate::new(
                SpeciesType::Bird,
                caps[1].trim(),
                caps[2].trim(),
                wiki_path,
            ))
        })
        .collect()
}

/// `<li><i><a href=".." title="Common">Latin</a></i> Author, Year</li>`.
/// The title doubles as the common name when it differs from the latin text.
pub fn parse_amphibians(html: &str) -> Vec<SpeciesCandidate> {
    AMPHIBIAN_RE
        .captures_iter(html)
        .filter(|caps| is_article_href(&caps[1]))
        .map(|caps| {
            let title = decode_entities(caps[2].trim());
            let latin = clean(&caps[3]);
            let name = if title != latin { title } else { latin.clone() };
            SpeciesCandidate::new(
                SpeciesType::Amphibian,
                name,
                latin,
                wiki_path_from_href(&caps[1]),
            )
        })
        .collect()
}

/// `Common name (Genus species)` list items between the content start and the
/// References heading. Items that miss the pattern fall back to their first
/// link text for both name and latin; those are never corrected later.
pub fn parse_reptiles(html: &str) -> Vec<SpeciesCandidate> {
    let content = cut_before_first(trim_to_content(html), &[REFERENCES_MARKER]);
    list_items(content)
        .into_iter()
        .filter(|item| has_italic(item))
        .filter_map(|item| {
            let wiki_path = extract_link(item)?;
            let text = clean(item);
            let (name, latin) = match REPTILE_TEXT_RE.captures(&text) {
                Some(caps) => (caps[1].trim().to_string(), caps[2].trim().to_string()),
                None => {
                    let fallback = first_anchor_text(item)?;
                    (fallback.clone(), fallback)
                }
            };
            Some(SpeciesCandidate::new(
                SpeciesType::Reptile,
                name,
                latin,
                wiki_path,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mammal_parser_reads_anchor_then_italic_latin() {
        let html = r#"<ul><li><a href="/wiki/Odocoileus_virginianus" title="White-tailed deer">White-tailed deer</a>, <i>O. virginianus</i></li></ul>"#;
        let species = parse_mammals(html);
        assert_eq!(
            species,
            vec![SpeciesCandidate::new(
                SpeciesType::Mammal,
                "White-tailed deer",
                "O. virginianus",
                "/wiki/Odocoileus_virginianus",
            )]
        );
    }

    #[test]
    fn mammal_parser_skips_denied_and_unshaped_links() {
        let html = concat!(
            r#"<a href="List_of_bats" title="List of bats">Bats</a>, <i>Chiroptera</i>"#,
            r#"<a href="Elk" title="Elk">Elk</a> <i>C. canadensis</i>"#,
            r#"<a href="Moose" title="Moose">Moose</a>, <i>A. alces</i>"#,
        );
        let species = parse_mammals(html);
        assert_eq!(species.len(), 1);
        assert_eq!(species[0].name, "Moose");
        assert_eq!(species[0].wiki_path, "/wiki/Moose");
    }

    #[test]
    fn bird_parser_splits_common_and_latin_text() {
        let html = r#"<div id="mw-content-text"><ul>
<li><a href="Bald_eagle" title="Bald eagle">Bald eagle</a>, <i>Haliaeetus leucocephalus</i></li>
<li><a href="Ruddy_duck" title="Ruddy duck">Ruddy duck</a>, <i>Oxyura jamaicensis rubida</i> (A)</li>
<li><a href="Bird_family" title="x">Family</a> no italics here</li>
<li><a href="Strange_bird">Strange bird</a> <i>no comma</i></li>
</ul></div>"#;
        let species = parse_birds(html);
        assert_eq!(species.len(), 2);
        assert_eq!(species[0].name, "Bald eagle");
        assert_eq!(species[0].latin, "Haliaeetus leucocephalus");
        assert_eq!(species[0].wiki_path, "/wiki/Bald_eagle");
        assert_eq!(species[1].latin, "Oxyura jamaicensis rubida");
        assert!(species.iter().all(|s| s.kind == SpeciesType::Bird));
    }

    #[test]
    fn bird_parser_ignores_items_before_content() {
        let html = r#"<ul><li><a href="Nav_bird">Nav bird</a>, <i>Navus birdus</i></li></ul><div id="mw-content-text"></div>"#;
        assert!(parse_birds(html).is_empty());
    }

    #[test]
    fn amphibian_parser_prefers_title_as_common_name() {
        let html = r#"<ul>
<li><i><a href="Lithobates_catesbeianus" title="American bullfrog">Lithobates catesbeianus</a></i> (Shaw, 1802)</li>
<li><i><a href="Ambystoma_tigrinum" title="Ambystoma tigrinum">Ambystoma tigrinum</a></i> (Green, 1825)</li>
<li>Plain <i><a href="Not_leading" title="Not leading">Not leading</a></i></li>
</ul>"#;
        let species = parse_amphibians(html);
        assert_eq!(species.len(), 2);
        assert_eq!(species[0].name, "American bullfrog");
        assert_eq!(species[0].latin, "Lithobates catesbeianus");
        assert_eq!(species[1].name, "Ambystoma tigrinum");
        assert_eq!(species[1].latin, "Ambystoma tigrinum");
    }

    #[test]
    fn reptile_parser_uses_parenthesized_latin_and_falls_back_to_link_text() {
        let html = r#"<ul><li><a href="Nav_snake">Nav snake</a> (<i>Navus anguis</i>)</li></ul>
<div id="mw-content-text"><ul>
<li><a href="Gila_monster" title="Gila monster">Gila monster</a> (<i>Heloderma suspectum</i>)</li>
<li><i><a href="Crotalus_horridus" title="Crotalus horridus">Crotalus horridus</a></i> Linnaeus</li>
</ul>
<h2 id="References">References</h2>
<ul><li><a href="Some_book">Some book</a> <i>Journal</i></li></ul></div>"#;
        let species = parse_reptiles(html);
        assert_eq!(species.len(), 2);
        assert_eq!(species[0].name, "Gila monster");
        assert_eq!(species[0].latin, "Heloderma suspectum");
        assert_eq!(species[1].name, "Crotalus horridus");
        assert_eq!(species[1].latin, "Crotalus horridus");
        assert_eq!(species[1].wiki_path, "/wiki/Crotalus_horridus");
    }

    #[test]
    fn list_sources_are_in_merge_order() {
        let labels = LIST_SOURCES.iter().map(|s| s.label).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Mammals", "Birds", "Amphibians", "Reptiles"]);
    }
}
