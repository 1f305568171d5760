use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tmntrando_game::{NUM_WORLDS, RegionIdx};

pub const VERSION: usize = include!("../../VERSION");

// What to do with an entrance whose nearest reverse candidate is too far away:
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmbiguousReversePolicy {
    // Log it, leave the reverse link unresolved, and keep shuffling.
    Warn,
    // Abort the run.
    Fail,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RandomizerSettings {
    pub version: usize,
    pub seed_label: String,
    pub reverse_distance_threshold: f32,
    pub ambiguous_reverse: AmbiguousReversePolicy,
    pub regions: Vec<RegionIdx>,
}

impl Default for RandomizerSettings {
    fn default() -> Self {
        RandomizerSettings {
            version: VERSION,
            seed_label: "inter".to_string(),
            reverse_distance_threshold: 32.0,
            ambiguous_reverse: AmbiguousReversePolicy::Warn,
            regions: (0..NUM_WORLDS).collect(),
        }
    }
}

pub fn parse_randomizer_settings(settings_json: &str) -> Result<RandomizerSettings> {
    let settings: RandomizerSettings = serde_json::from_str(settings_json)?;
    if settings.version > VERSION {
        bail!(
            "Settings version {} is newer than supported version {}",
            settings.version,
            VERSION
        );
    }
    if settings.seed_label.len() > 23 {
        bail!("Seed label '{}' is too long", settings.seed_label);
    }
    for (i, &region) in settings.regions.iter().enumerate() {
        if region >= NUM_WORLDS {
            bail!("Region {} is not an underworld region", region);
        }
        if settings.regions[..i].contains(&region) {
            bail!("Region {} is listed more than once", region);
        }
    }
    Ok(settings)
}

pub fn load_randomizer_settings(path: Option<&Path>) -> Result<RandomizerSettings> {
    match path {
        Some(path) => {
            let settings_str = std::fs::read_to_string(path)
                .with_context(|| format!("Unable to read settings at {}", path.display()))?;
            parse_randomizer_settings(&settings_str)
                .with_context(|| format!("Unable to parse settings at {}", path.display()))
        }
        None => Ok(RandomizerSettings::default()),
    }
}
