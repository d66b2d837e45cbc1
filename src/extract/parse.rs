//! Markup heuristics for the wiki's hero and skin pages.
//!
//! Everything here is synchronous and works on a parsed [`Html`] tree.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::models::Hero;

/// Hero cards on the roster page.
static HERO_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".herocard-link a").expect("static selector"));

/// Tab panels on a hero page (catalog and recolor tabs).
static TAB_CONTENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".wds-tab__content").expect("static selector"));

/// Wiki-internal skin links inside a tab panel.
static SKIN_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".charcat-wrapper a[href^='/wiki/']").expect("static selector")
});

/// Rarity/chronology tables that carry the skin's ID row.
static SKIN_TABLES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "table.char-table-chronology, table.char-table-epic, \
         table.char-table-legendary, table.char-table-rare",
    )
    .expect("static selector")
});

static ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("static selector"));
static HEADER_CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("static selector"));
static DATA_CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("static selector"));

/// Header labels marking the ID row.
const ID_HEADER_MARKERS: &[&str] = &["ID NO.", "ID_NO."];

/// Minimum number of digits in a skin ID.
const MIN_SKIN_ID_DIGITS: usize = 6;

/// A skin link found on a hero page, before its own page is visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinCandidate {
    pub name: String,
    pub url: String,
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolve an href against the wiki base.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(|u| u.to_string())
}

/// Build the hero list from the roster page.
pub fn parse_heroes(html: &Html, base: &Url) -> Vec<Hero> {
    let mut heroes = Vec::new();

    for link in html.select(&HERO_LINKS) {
        let name = element_text(&link);
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        if let Some(url) = resolve_url(base, href) {
            heroes.push(Hero::new(name, url));
        }
    }

    debug!("Parsed {} heroes", heroes.len());
    heroes
}

/// Collect skin candidates from every tab panel of a hero page, in document
/// order. Links repeated across tabs are kept once.
pub fn parse_skin_candidates(html: &Html, base: &Url) -> Vec<SkinCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for tab in html.select(&TAB_CONTENTS) {
        for link in tab.select(&SKIN_LINKS) {
            let name = link.value().attr("title").unwrap_or("").trim();
            let href = link.value().attr("href").unwrap_or("");
            if name.is_empty() || href.is_empty() {
                continue;
            }
            let Some(url) = resolve_url(base, href) else {
                continue;
            };
            if seen.insert(url.clone()) {
                candidates.push(SkinCandidate {
                    name: name.to_string(),
                    url,
                });
            }
        }
    }

    candidates
}

fn is_id_header(text: &str) -> bool {
    ID_HEADER_MARKERS.iter().any(|marker| text.contains(marker))
}

fn is_skin_id(text: &str) -> bool {
    text.len() >= MIN_SKIN_ID_DIGITS && text.chars().all(|c| c.is_ascii_digit())
}

/// Find the numeric skin ID on a skin page.
///
/// Looks for a row in one of the known skin tables whose header reads
/// "ID NO." and returns the first data cell in that row made of at least
/// six digits.
pub fn extract_skin_id(html: &Html) -> Option<String> {
    for table in html.select(&SKIN_TABLES) {
        for row in table.select(&ROWS) {
            let has_id_header = row
                .select(&HEADER_CELLS)
                .any(|th| is_id_header(&element_text(&th)));
            if !has_id_header {
                continue;
            }

            if let Some(id) = row
                .select(&DATA_CELLS)
                .map(|td| element_text(&td))
                .find(|text| is_skin_id(text))
            {
                return Some(id);
            }
        }
    }
    None
}

/// Battlepass and Twitch-drop skins are not part of the catalog.
pub fn is_excluded(name: &str) -> bool {
    name.to_lowercase().contains("(battlepass)") || name.contains("Twitch")
}

/// Remove a `(<hero name>)` qualifier from a skin name.
pub fn strip_hero_suffix(name: &str, hero_name: &str) -> String {
    let qualifier = format!("({})", hero_name);
    if name.contains(&qualifier) {
        name.replace(&qualifier, "").trim().to_string()
    } else {
        name.to_string()
    }
}
