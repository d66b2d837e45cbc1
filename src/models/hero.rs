//! Hero and skin models.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Suffix appended to the hero name for the synthesized default skin.
const DEFAULT_SKIN_SUFFIX: &str = "(Default)";

/// A playable character scraped from the wiki roster page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub name: String,
    pub url: String,
    /// Derived from the hero's first skin; absent until a skin pass ran.
    #[serde(default)]
    pub id: Option<String>,
}

impl Hero {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            id: None,
        }
    }

    /// Cache key for this hero's skin list.
    pub fn skins_cache_key(&self) -> String {
        format!("skins_{}", self.name)
    }

    /// Set the hero ID if it has not been set yet.
    ///
    /// Returns true if the ID was filled in by this call.
    pub fn backfill_id(&mut self, id: String) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id);
        true
    }
}

/// A cosmetic variant of a hero.
///
/// Every skin points at its owning [`Hero`]; skins of one hero share the
/// same `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeroSkin {
    pub name: String,
    pub url: String,
    pub id: String,
    pub base_hero: Arc<Hero>,
}

impl HeroSkin {
    pub fn new(
        base_hero: &Arc<Hero>,
        name: impl Into<String>,
        url: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            id: id.into(),
            base_hero: Arc::clone(base_hero),
        }
    }

    /// Build the synthesized default skin for a hero.
    ///
    /// The ID shares the first four characters of `first_skin_id` and ends
    /// in `001`.
    pub fn default_for(base_hero: &Arc<Hero>, first_skin_id: &str) -> Self {
        Self::new(
            base_hero,
            format!("{} {}", base_hero.name, DEFAULT_SKIN_SUFFIX),
            base_hero.url.clone(),
            default_skin_id(first_skin_id),
        )
    }

    /// Flatten this skin with its hero into the on-disk record shape.
    pub fn to_record(&self) -> SkinRecord {
        SkinRecord {
            name: self.base_hero.name.clone(),
            id: self.base_hero.id.clone(),
            url: self.url.clone(),
            skinid: self.id.clone(),
            skin_name: self.name.clone(),
        }
    }

    /// Rebuild a skin from a stored record, attached to `base_hero`. Hero
    /// fields in the record are ignored.
    pub fn from_record(base_hero: &Arc<Hero>, record: &SkinRecord) -> Self {
        Self::new(
            base_hero,
            record.skin_name.clone(),
            record.url.clone(),
            record.skinid.clone(),
        )
    }
}

/// Derive the default-skin (and hero) ID from another skin's ID.
pub fn default_skin_id(skin_id: &str) -> String {
    let prefix: String = skin_id.chars().take(4).collect();
    format!("{}001", prefix)
}

/// Denormalized skin record as persisted in the cache and served by the API.
///
/// `name`/`id` describe the hero, `skin_name`/`skinid`/`url` the skin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinRecord {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    pub skinid: String,
    pub skin_name: String,
}

/// Flatten skins into records.
pub fn to_records(skins: &[HeroSkin]) -> Vec<SkinRecord> {
    skins.iter().map(HeroSkin::to_record).collect()
}
