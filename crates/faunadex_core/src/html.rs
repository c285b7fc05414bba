//! Text-pattern helpers for wiki list and article markup.
//!
//! Every helper works on raw HTML strings with regular expressions; there is no
//! DOM. The shapes matched here are the ones Wikipedia's rendered markup uses in
//! offline dumps, and anything that does not fit is dropped by the callers.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Href fragments that never point at a species article.
pub const SKIP_HREF: &[&str] = &[
    "File:",
    "Help:",
    "Wikipedia:",
    "Template:",
    "Category:",
    "Special:",
    "#",
    "List_of",
    "Mammal",
    "Fauna_of",
    "ISBN",
    "ISSN",
    "OCLC",
    "doi:",
    "IUCN",
    "Binomial",
    "Family_(biology)",
    "Order_(biology)",
];

pub const CONTENT_MARKER: &str = r#"id="mw-content-text""#;
pub const WIKI_PREFIX: &str = "/wiki/";

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*);").unwrap());
static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r##"href="([^"#]+)""##).unwrap());
static LI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<li(?:\s[^>]*)?>(.*?)</li>").unwrap());
static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a(?:\s[^>]*)?>(.*?)</a>").unwrap());
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<i(?:\s[^>]*)?>(.*?)</i>").unwrap());
static ITALIC_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<i[\s>]").unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").unwrap());
static WIKIPEDIA_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-–—]\s*Wikipedia.*$").unwrap());
static TRAILING_PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").unwrap());

/// HTML 4 named entities, sorted by name for binary search.
const NAMED_ENTITIES: &[(&str, char)] = &[
    ("AElig", 'Æ'), ("Aacute", 'Á'), ("Acirc", 'Â'), ("Agrave", 'À'), ("Alpha", 'Α'),
    ("Aring", 'Å'), ("Atilde", 'Ã'), ("Auml", 'Ä'), ("Beta", 'Β'), ("Ccedil", 'Ç'), ("Chi", 'Χ'),
    ("Dagger", '‡'), ("Delta", 'Δ'), ("ETH", 'Ð'), ("Eacute", 'É'), ("Ecirc", 'Ê'),
    ("Egrave", 'È'), ("Epsilon", 'Ε'), ("Eta", 'Η'), ("Euml", 'Ë'), ("Gamma", 'Γ'),
    ("Iacute", 'Í'), ("Icirc", 'Î'), ("Igrave", 'Ì'), ("Iota", 'Ι'), ("Iuml", 'Ï'), ("Kappa", 'Κ'),
    ("Lambda", 'Λ'), ("Mu", 'Μ'), ("Ntilde", 'Ñ'), ("Nu", 'Ν'), ("OElig", 'Œ'), ("Oacute", 'Ó'),
    ("Ocirc", 'Ô'), ("Ograve", 'Ò'), ("Omega", 'Ω'), ("Omicron", 'Ο'), ("Oslash", 'Ø'),
    ("Otilde", 'Õ'), ("Ouml", 'Ö'), ("Phi", 'Φ'), ("Pi", 'Π'), ("Prime", '″'), ("Psi", 'Ψ'),
    ("Rho", 'Ρ'), ("Scaron", 'Š'), ("Sigma", 'Σ'), ("THORN", 'Þ'), ("Tau", 'Τ'), ("Theta", 'Θ'),
    ("Uacute", 'Ú'), ("Ucirc", 'Û'), ("Ugrave", 'Ù'), ("Upsilon", 'Υ'), ("Uuml", 'Ü'), ("Xi", 'Ξ'),
    ("Yacute", 'Ý'), ("Yuml", 'Ÿ'), ("Zeta", 'Ζ'), ("aacute", 'á'), ("acirc", 'â'), ("acute", '´'),
    ("aelig", 'æ'), ("agrave", 'à'), ("alefsym", 'ℵ'), ("alpha", 'α'), ("amp", '&'), ("and", '∧'),
    ("ang", '∠'), ("apos", '\''), ("aring", 'å'), ("asymp", '≈'), ("atilde", 'ã'), ("auml", 'ä'), ("bdquo", '„'),
    ("beta", 'β'), ("brvbar", '¦'), ("bull", '•'), ("cap", '∩'), ("ccedil", 'ç'), ("cedil", '¸'),
    ("cent", '¢'), ("chi", 'χ'), ("circ", 'ˆ'), ("clubs", '♣'), ("cong", '≅'), ("copy", '©'),
    ("crarr", '↵'), ("cup", '∪'), ("curren", '¤'), ("dArr", '⇓'), ("dagger", '†'), ("darr", '↓'),
    ("deg", '°'), ("delta", 'δ'), ("diams", '♦'), ("divide", '÷'), ("eacute", 'é'), ("ecirc", 'ê'),
    ("egrave", 'è'), ("empty", '∅'), ("emsp", '\u{2003}'), ("ensp", '\u{2002}'), ("epsilon", 'ε'),
    ("equiv", '≡'), ("eta", 'η'), ("eth", 'ð'), ("euml", 'ë'), ("euro", '€'), ("exist", '∃'),
    ("fnof", 'ƒ'), ("forall", '∀'), ("frac12", '½'), ("frac14", '¼'), ("frac34", '¾'),
    ("frasl", '⁄'), ("gamma", 'γ'), ("ge", '≥'), ("gt", '>'), ("hArr", '⇔'), ("harr", '↔'),
    ("hearts", '♥'), ("hellip", '…'), ("iacute", 'í'), ("icirc", 'î'), ("iexcl", '¡'),
    ("igrave", 'ì'), ("image", 'ℑ'), ("infin", '∞'), ("int", '∫'), ("iota", 'ι'), ("iquest", '¿'),
    ("isin", '∈'), ("iuml", 'ï'), ("kappa", 'κ'), ("lArr", '⇐'), ("lambda", 'λ'), ("lang", '〈'),
    ("laquo", '«'), ("larr", '←'), ("lceil", '⌈'), ("ldquo", '“'), ("le", '≤'), ("lfloor", '⌊'),
    ("lowast", '∗'), ("loz", '◊'), ("lrm", '\u{200e}'), ("lsaquo", '‹'), ("lsquo", '‘'),
    ("lt", '<'), ("macr", '¯'), ("mdash", '—'), ("micro", 'µ'), ("middot", '·'), ("minus", '−'),
    ("mu", 'μ'), ("nabla", '∇'), ("nbsp", '\u{a0}'), ("ndash", '–'), ("ne", '≠'), ("ni", '∋'),
    ("not", '¬'), ("notin", '∉'), ("nsub", '⊄'), ("ntilde", 'ñ'), ("nu", 'ν'), ("oacute", 'ó'),
    ("ocirc", 'ô'), ("oelig", 'œ'), ("ograve", 'ò'), ("oline", '‾'), ("omega", 'ω'),
    ("omicron", 'ο'), ("oplus", '⊕'), ("or", '∨'), ("ordf", 'ª'), ("ordm", 'º'), ("oslash", 'ø'),
    ("otilde", 'õ'), ("otimes", '⊗'), ("ouml", 'ö'), ("para", '¶'), ("part", '∂'), ("permil", '‰'),
    ("perp", '⊥'), ("phi", 'φ'), ("pi", 'π'), ("piv", 'ϖ'), ("plusmn", '±'), ("pound", '£'),
    ("prime", '′'), ("prod", '∏'), ("prop", '∝'), ("psi", 'ψ'), ("quot", '"'), ("rArr", '⇒'),
    ("radic", '√'), ("rang", '〉'), ("raquo", '»'), ("rarr", '→'), ("rceil", '⌉'), ("rdquo", '”'),
    ("real", 'ℜ'), ("reg", '®'), ("rfloor", '⌋'), ("rho", 'ρ'), ("rlm", '\u{200f}'),
    ("rsaquo", '›'), ("rsquo", '’'), ("sbquo", '‚'), ("scaron", 'š'), ("sdot", '⋅'), ("sect", '§'),
    ("shy", '\u{ad}'), ("sigma", 'σ'), ("sigmaf", 'ς'), ("sim", '∼'), ("spades", '♠'),
    ("sub", '⊂'), ("sube", '⊆'), ("sum", '∑'), ("sup", '⊃'), ("sup1", '¹'), ("sup2", '²'),
    ("sup3", '³'), ("supe", '⊇'), ("szlig", 'ß'), ("tau", 'τ'), ("there4", '∴'), ("theta", 'θ'),
    ("thetasym", 'ϑ'), ("thinsp", '\u{2009}'), ("thorn", 'þ'), ("tilde", '˜'), ("times", '×'),
    ("trade", '™'), ("uArr", '⇑'), ("uacute", 'ú'), ("uarr", '↑'), ("ucirc", 'û'), ("ugrave", 'ù'),
    ("uml", '¨'), ("upsih", 'ϒ'), ("upsilon", 'υ'), ("uuml", 'ü'), ("weierp", '℘'), ("xi", 'ξ'),
    ("yacute", 'ý'), ("yen", '¥'), ("yuml", 'ÿ'), ("zeta", 'ζ'), ("zwj", '\u{200d}'),
    ("zwnj", '\u{200c}'),
];

pub fn strip_tags(fragment: &str) -> String {
    TAG_RE.replace_all(fragment, "").into_owned()
}

/// Decode numeric references and the HTML 4 named entities. Unknown named
/// entities are left as-is. Runs in a single pass so `&amp;lt;` stays `&lt;`.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some(ch) => ch.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    NAMED_ENTITIES
        .binary_search_by(|(entity, _)| entity.cmp(&name))
        .ok()
        .map(|index| NAMED_ENTITIES[index].1)
}

pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Markup to plain text: tags removed, entities decoded, whitespace collapsed.
pub fn clean(fragment: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(fragment)))
}

pub fn is_denied_href(href: &str) -> bool {
    SKIP_HREF.iter().any(|fragment| href.contains(fragment))
}

/// Normalize an article href into a `/wiki/<slug>` path.
///
/// Dumps link articles relatively (`Foo`, `./Foo`, `../A/Foo`) while live
/// pages use `/wiki/Foo`; all of them collapse to the same path.
pub fn wiki_path_from_href(href: &str) -> String {
    let mut rest = href.trim();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("../") {
            rest = stripped.strip_prefix("A/").unwrap_or(stripped);
        } else {
            break;
        }
    }
    let slug = rest.strip_prefix(WIKI_PREFIX).unwrap_or(rest);
    format!("{WIKI_PREFIX}{slug}")
}

/// True when `href` can name a species article at all.
pub fn is_article_href(href: &str) -> bool {
    !href.trim().is_empty() && !href.contains("://") && !is_denied_href(href)
}

/// The first fragment-free href in `fragment`, as a wiki path. A denied first
/// href rejects the whole fragment rather than falling through to later links.
pub fn extract_link(fragment: &str) -> Option<String> {
    let caps = HREF_RE.captures(fragment)?;
    let href = caps.get(1)?.as_str();
    if !is_article_href(href) {
        return None;
    }
    Some(wiki_path_from_href(href))
}

/// Slice starting at the main content region, or the whole document when the
/// marker is absent.
pub fn trim_to_content(html: &str) -> &str {
    match html.find(CONTENT_MARKER) {
        Some(start) => &html[start..],
        None => html,
    }
}

/// Cut `html` before the earliest of `markers`.
pub fn cut_before_first<'a>(html: &'a str, markers: &[&str]) -> &'a str {
    let end = markers
        .iter()
        .filter_map(|marker| html.find(marker))
        .min()
        .unwrap_or(html.len());
    &html[..end]
}

/// Inner markup of every `<li>` element, in document order.
pub fn list_items(html: &str) -> Vec<&str> {
    LI_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

pub fn has_italic(fragment: &str) -> bool {
    ITALIC_OPEN_RE.is_match(fragment)
}

pub fn first_anchor_text(fragment: &str) -> Option<String> {
    let caps = ANCHOR_RE.captures(fragment)?;
    let text = clean(caps.get(1)?.as_str());
    if text.is_empty() { None } else { Some(text) }
}

pub fn first_italic_text(fragment: &str) -> Option<String> {
    ITALIC_RE
        .captures_iter(fragment)
        .filter_map(|caps| caps.get(1).map(|m| clean(m.as_str())))
        .find(|text| !text.is_empty())
}

/// Document `<title>` without the trailing " - Wikipedia" suffix.
pub fn page_title(html: &str) -> Option<String> {
    let caps = TITLE_RE.captures(html)?;
    let raw = decode_entities(caps.get(1)?.as_str());
    let title = WIKIPEDIA_SUFFIX_RE.replace(raw.trim(), "");
    let title = normalize_ws(&title);
    if title.is_empty() { None } else { Some(title) }
}

/// Drop one trailing parenthetical, e.g. `Bowfin (fish)` -> `Bowfin`.
pub fn strip_parenthetical(text: &str) -> String {
    TRAILING_PAREN_RE.replace(text, "").trim().to_string()
}

/// At most `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// `/wiki/Foo_%28fish%29` -> `Foo_(fish)`. Undecodable slugs come back raw.
pub fn decoded_slug(wiki_path: &str) -> String {
    let raw = wiki_path.strip_prefix(WIKI_PREFIX).unwrap_or(wiki_path);
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_tags_entities_and_whitespace() {
        assert_eq!(
            clean("<a href=\"x\">Gila&nbsp;monster</a>,\n  <i>Heloderma&#160;suspectum</i> &amp; more"),
            "Gila monster, Heloderma suspectum & more"
        );
    }

    #[test]
    fn decode_entities_is_single_pass() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("Lac&#xE9;p&#232;de"), "Lacépède");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn decode_entities_covers_accented_letters_and_symbols() {
        assert_eq!(decode_entities("Lac&eacute;p&egrave;de"), "Lacépède");
        assert_eq!(decode_entities("M&uuml;ller&apos;s &auml;sche"), "Müller's äsche");
        assert_eq!(decode_entities("45&deg;N &frac12; &hellip;"), "45°N ½ …");
        assert_eq!(decode_entities("&Eacute;&eacute;"), "Éé");
        assert_eq!(clean("<i>Salmo&nbsp;tru&shy;tta</i>"), "Salmo tru\u{ad}tta");
    }

    #[test]
    fn wiki_path_from_href_normalizes_relative_forms() {
        assert_eq!(wiki_path_from_href("Odocoileus_virginianus"), "/wiki/Odocoileus_virginianus");
        assert_eq!(wiki_path_from_href("/wiki/Elk"), "/wiki/Elk");
        assert_eq!(wiki_path_from_href("./Elk"), "/wiki/Elk");
        assert_eq!(wiki_path_from_href("../A/Elk"), "/wiki/Elk");
    }

    #[test]
    fn extract_link_rejects_denied_first_link() {
        assert_eq!(
            extract_link(r##"<a href="#cite_note-1">1</a> <a href="Bald_eagle">Bald eagle</a>"##),
            Some("/wiki/Bald_eagle".to_string())
        );
        assert_eq!(
            extract_link(r#"<a href="File:Eagle.jpg">img</a> <a href="Bald_eagle">x</a>"#),
            None
        );
        assert_eq!(extract_link(r#"<a href="https://doi.org/10.1/x">doi</a>"#), None);
        assert_eq!(extract_link("no links"), None);
    }

    #[test]
    fn denylist_uses_containment() {
        assert!(is_denied_href("List_of_birds_of_Texas"));
        assert!(is_denied_href("Category:Fish"));
        assert!(is_denied_href("Marsupial_Mammal_thing"));
        assert!(!is_denied_href("Largemouth_bass"));
    }

    #[test]
    fn list_items_skip_link_tags_and_keep_order() {
        let html = r#"<link rel="x"><ul><li class="a">one</li><li>two</li></ul>"#;
        assert_eq!(list_items(html), vec!["one", "two"]);
    }

    #[test]
    fn has_italic_ignores_img() {
        assert!(has_italic("<i>Bufo</i>"));
        assert!(has_italic(r#"<i class="x">Bufo</i>"#));
        assert!(!has_italic(r#"<img src="x.png">"#));
    }

    #[test]
    fn first_italic_and_anchor_text() {
        let item = r#"<a href="Bowfin">Bowfin</a> <i><a href="Amia">Amia</a> calva</i>"#;
        assert_eq!(first_anchor_text(item).as_deref(), Some("Bowfin"));
        assert_eq!(first_italic_text(item).as_deref(), Some("Amia calva"));
        assert_eq!(first_italic_text("<i></i>plain"), None);
    }

    #[test]
    fn page_title_drops_wikipedia_suffix() {
        assert_eq!(
            page_title("<html><head><title>Largemouth bass - Wikipedia</title></head>").as_deref(),
            Some("Largemouth bass")
        );
        assert_eq!(page_title("<title>Bowfin</title>").as_deref(), Some("Bowfin"));
        assert_eq!(page_title("<title> - Wikipedia</title>"), None);
        assert_eq!(page_title("<p>no title</p>"), None);
    }

    #[test]
    fn content_trimming_and_marker_cutting() {
        let html = r#"<nav>x</nav><div id="mw-content-text">body<h2 id="See_also">s</h2><h2 id="References">r</h2>"#;
        let content = trim_to_content(html);
        assert!(content.starts_with(CONTENT_MARKER));
        let cut = cut_before_first(content, &[r#"id="References""#, r#"id="See_also""#]);
        assert!(cut.ends_with("body<h2 "));
        assert_eq!(trim_to_content("plain"), "plain");
    }

    #[test]
    fn strip_parenthetical_and_truncate() {
        assert_eq!(strip_parenthetical("Bowfin (fish)"), "Bowfin");
        assert_eq!(strip_parenthetical("Bowfin"), "Bowfin");
        assert_eq!(truncate_chars("épée", 2), "ép");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn decoded_slug_handles_percent_escapes() {
        assert_eq!(decoded_slug("/wiki/Cope%27s_gray_treefrog"), "Cope's_gray_treefrog");
        assert_eq!(decoded_slug("/wiki/Bowfin"), "Bowfin");
    }
}
