//! Hero and skin extraction, fronted by the TTL cache.
//!
//! [`Extractor::get_heroes`] and [`Extractor::get_hero_skins`] read through
//! and write through the cache; the `fetch_*` variants always hit the
//! network.

mod parse;

pub use parse::{
    extract_skin_id, is_excluded, parse_heroes, parse_skin_candidates, resolve_url,
    strip_hero_suffix, SkinCandidate,
};

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::TtlCache;
use crate::models::{default_skin_id, to_records, Hero, HeroSkin, SkinRecord};
use crate::scrapers::{FetchError, PageFetcher};

/// Cache key for the hero list.
pub const HEROES_CACHE_KEY: &str = "heroes";

/// Path of the roster page below the wiki base.
const HEROES_PAGE: &str = "Heroes";

/// Errors from extracting heroes or skins.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("No extractable skins for {hero}")]
    NoExtractableSkins { hero: String },
    #[error("Invalid wiki base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Failed to write cache: {0}")]
    Cache(#[from] std::io::Error),
}

/// Turns wiki pages into heroes and skins.
pub struct Extractor {
    fetcher: Arc<dyn PageFetcher>,
    cache: TtlCache,
    base: Url,
}

impl Extractor {
    /// Create an extractor for the wiki rooted at `wiki_base`
    /// (e.g. `https://marvelrivals.fandom.com/wiki`).
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        cache: TtlCache,
        wiki_base: &str,
    ) -> Result<Self, ExtractError> {
        let base = Url::parse(wiki_base).map_err(|source| ExtractError::InvalidBaseUrl {
            url: wiki_base.to_string(),
            source,
        })?;
        Ok(Self {
            fetcher,
            cache,
            base,
        })
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// URL of the roster page.
    pub fn heroes_url(&self) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), HEROES_PAGE)
    }

    /// Get heroes, from cache when fresh.
    pub async fn get_heroes(&self) -> Result<Vec<Hero>, ExtractError> {
        if let Some(heroes) = self.cache.get::<Vec<Hero>>(HEROES_CACHE_KEY) {
            if !heroes.is_empty() {
                return Ok(heroes);
            }
        }

        let heroes = self.fetch_heroes().await?;
        self.cache.set(HEROES_CACHE_KEY, &heroes)?;
        Ok(heroes)
    }

    /// Fetch the hero list from the roster page.
    pub async fn fetch_heroes(&self) -> Result<Vec<Hero>, ExtractError> {
        let url = self.heroes_url();
        let doc = self.fetcher.fetch(&url).await?;
        let heroes = parse_heroes(&doc.html(), &self.base);
        info!("Found {} heroes via {}", heroes.len(), self.fetcher.name());
        Ok(heroes)
    }

    /// Get a hero's skins, from cache when fresh.
    ///
    /// Cached skins are always attached to the `hero` passed in; hero fields
    /// stored in the cache are ignored. Fills in `hero.id` if it is unset,
    /// before the skins take their shared copy of the hero.
    pub async fn get_hero_skins(&self, hero: &mut Hero) -> Result<Vec<HeroSkin>, ExtractError> {
        let key = hero.skins_cache_key();
        if let Some(records) = self.cache.get::<Vec<SkinRecord>>(&key) {
            if let Some(first) = records.first() {
                hero.backfill_id(default_skin_id(&first.skinid));
                let base_hero = Arc::new(hero.clone());
                return Ok(records
                    .iter()
                    .map(|record| HeroSkin::from_record(&base_hero, record))
                    .collect());
            }
        }

        let skins = self.fetch_hero_skins(hero).await?;
        self.cache.set(&key, &to_records(&skins))?;
        Ok(skins)
    }

    /// Fetch a hero's page, follow every skin link and build the skin list.
    ///
    /// The result always ends with the synthesized default skin. Fails with
    /// [`ExtractError::NoExtractableSkins`] if no real skin survives
    /// filtering.
    pub async fn fetch_hero_skins(&self, hero: &mut Hero) -> Result<Vec<HeroSkin>, ExtractError> {
        let doc = self.fetcher.fetch(&hero.url).await?;
        let candidates = parse_skin_candidates(&doc.html(), &self.base);
        debug!("{}: {} skin candidates", hero.name, candidates.len());

        // (name, url, id) of every kept skin, attached to the hero once its ID is final
        let mut found = Vec::new();
        for candidate in candidates {
            // Fetched before the exclusion check; excluded pages still cost a request
            let skin_id = self.fetch_skin_id(&candidate).await;

            if is_excluded(&candidate.name) {
                debug!("Skipping excluded skin {}", candidate.name);
                continue;
            }
            let Some(skin_id) = skin_id else {
                debug!("No ID found for {}, dropping", candidate.name);
                continue;
            };

            let name = strip_hero_suffix(&candidate.name, &hero.name);
            found.push((name, candidate.url, skin_id));
        }

        let first_id = match found.first() {
            Some((_, _, id)) => id.clone(),
            None => {
                return Err(ExtractError::NoExtractableSkins {
                    hero: hero.name.clone(),
                })
            }
        };

        hero.backfill_id(default_skin_id(&first_id));
        let base_hero = Arc::new(hero.clone());

        let mut skins: Vec<HeroSkin> = found
            .into_iter()
            .map(|(name, url, id)| HeroSkin::new(&base_hero, name, url, id))
            .collect();
        skins.push(HeroSkin::default_for(&base_hero, &first_id));

        info!("{}: {} skins", hero.name, skins.len());
        Ok(skins)
    }

    /// Fetch a skin page and pull its ID. Fetch failures count as "no ID".
    async fn fetch_skin_id(&self, candidate: &SkinCandidate) -> Option<String> {
        match self.fetcher.fetch(&candidate.url).await {
            Ok(doc) => extract_skin_id(&doc.html()),
            Err(e) => {
                warn!("Error fetching skin page for {}: {}", candidate.name, e);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::scrapers::testing::MockFetcher;
    use tempfile::tempdir;

    fn extractor(fetcher: Arc<MockFetcher>, cache_dir: &std::path::Path) -> Extractor {
        Extractor::new(fetcher, TtlCache::new(cache_dir), BASE).unwrap()
    }

    fn groot() -> Hero {
        Hero::new("Groot", url("Groot"))
    }

    #[tokio::test]
    async fn test_get_heroes_caches_list() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(groot_and_iron_man());
        let extractor = extractor(fetcher.clone(), dir.path());

        let heroes = extractor.get_heroes().await.unwrap();
        assert_eq!(heroes.len(), 2);
        assert_eq!(heroes[1].name, "Iron Man");
        assert_eq!(heroes[1].url, url("Iron_Man"));
        assert_eq!(fetcher.fetch_count(), 1);

        let again = extractor.get_heroes().await.unwrap();
        assert_eq!(again, heroes);
        assert_eq!(fetcher.fetch_count(), 1, "second call must be served from cache");
    }

    #[tokio::test]
    async fn test_get_heroes_fetch_failure_caches_nothing() {
        let dir = tempdir().unwrap();
        let extractor = extractor(Arc::new(MockFetcher::new()), dir.path());

        let err = extractor.get_heroes().await.unwrap_err();
        assert!(matches!(err, ExtractError::Fetch(_)));
        assert!(!extractor.cache().path_for(HEROES_CACHE_KEY).exists());
    }

    #[tokio::test]
    async fn test_fetch_hero_skins_filters_and_synthesizes_default() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(groot_and_iron_man());
        let extractor = extractor(fetcher.clone(), dir.path());
        let mut hero = groot();

        let skins = extractor.fetch_hero_skins(&mut hero).await.unwrap();
        let names: Vec<_> = skins.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Celestial", "Bark Blue", "Groot (Default)"]);

        let default = skins.last().unwrap();
        assert_eq!(default.id, "1011001");
        assert_eq!(default.url, hero.url);
        assert_eq!(hero.id.as_deref(), Some("1011001"));
        for skin in &skins {
            assert_eq!(skin.base_hero.name, "Groot");
            assert_eq!(skin.base_hero.id.as_deref(), Some("1011001"));
        }

        // hero page + every candidate page, excluded ones included
        assert_eq!(fetcher.fetch_count(), 6);
    }

    #[tokio::test]
    async fn test_excluded_skins_never_appear() {
        let dir = tempdir().unwrap();
        let extractor = extractor(Arc::new(groot_and_iron_man()), dir.path());
        let mut hero = groot();

        let skins = extractor.fetch_hero_skins(&mut hero).await.unwrap();
        assert!(skins.iter().all(|s| !s.name.contains("Battlepass")));
        assert!(skins.iter().all(|s| !s.name.contains("Twitch")));
        assert!(skins.iter().all(|s| s.id != "1011900" && s.id != "1011901"));
    }

    #[tokio::test]
    async fn test_existing_hero_id_is_kept() {
        let dir = tempdir().unwrap();
        let extractor = extractor(Arc::new(groot_and_iron_man()), dir.path());
        let mut hero = groot();
        hero.id = Some("7777001".to_string());

        let skins = extractor.fetch_hero_skins(&mut hero).await.unwrap();
        assert_eq!(hero.id.as_deref(), Some("7777001"));
        assert_eq!(skins.last().unwrap().id, "1011001");
    }

    #[tokio::test]
    async fn test_no_extractable_skins_is_an_error() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_page(
                    &url("Groot"),
                    &hero_page(&[
                        ("Winter Soldier (Battlepass)", "WS_Battlepass"),
                        ("Mystery Skin", "Mystery"),
                    ]),
                )
                .with_page(&url("WS_Battlepass"), &skin_page("1011900"))
                .with_page(&url("Mystery"), "<p>nothing</p>"),
        );
        let extractor = extractor(fetcher, dir.path());
        let mut hero = groot();

        let err = extractor.get_hero_skins(&mut hero).await.unwrap_err();
        assert!(matches!(err, ExtractError::NoExtractableSkins { ref hero } if hero == "Groot"));
        assert!(hero.id.is_none());
        assert!(!extractor.cache().path_for("skins_Groot").exists());
    }

    #[tokio::test]
    async fn test_skin_page_fetch_failure_drops_candidate() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_page(
                    &url("Groot"),
                    &hero_page(&[("Missing Page", "Missing"), ("Bark Blue", "Bark_Blue")]),
                )
                .with_page(&url("Bark_Blue"), &skin_page("1011003")),
        );
        let extractor = extractor(fetcher, dir.path());
        let mut hero = groot();

        let skins = extractor.fetch_hero_skins(&mut hero).await.unwrap();
        assert_eq!(skins.len(), 2);
        assert_eq!(skins[0].name, "Bark Blue");
        assert_eq!(skins[1].id, "1011001");
    }

    #[tokio::test]
    async fn test_get_hero_skins_writes_flattened_records() {
        let dir = tempdir().unwrap();
        let extractor = extractor(Arc::new(groot_and_iron_man()), dir.path());
        let mut hero = groot();

        extractor.get_hero_skins(&mut hero).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("skins_Groot.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let payload = json["payload"].as_array().unwrap();
        assert_eq!(payload.len(), 3);
        assert_eq!(payload[0]["name"], "Groot");
        assert_eq!(payload[0]["id"], "1011001");
        assert_eq!(payload[0]["skin_name"], "Celestial");
        assert_eq!(payload[0]["skinid"], "1011002");
        assert_eq!(payload[2]["skin_name"], "Groot (Default)");
    }

    #[tokio::test]
    async fn test_get_hero_skins_cache_hit_uses_callers_hero() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(groot_and_iron_man());
        let extractor = extractor(fetcher.clone(), dir.path());

        let mut first = groot();
        let fetched = extractor.get_hero_skins(&mut first).await.unwrap();
        let fetches = fetcher.fetch_count();

        let mut fresh = groot();
        let cached = extractor.get_hero_skins(&mut fresh).await.unwrap();
        assert_eq!(cached, fetched);
        assert_eq!(fresh.id.as_deref(), Some("1011001"));
        assert!(cached
            .iter()
            .all(|s| s.base_hero.as_ref() == &fresh && s.base_hero.url == url("Groot")));
        assert_eq!(fetcher.fetch_count(), fetches, "cache hit must not fetch");
    }
}
