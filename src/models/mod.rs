//! Data models for the hero catalog.

mod hero;

pub use hero::{default_skin_id, to_records, Hero, HeroSkin, SkinRecord};
