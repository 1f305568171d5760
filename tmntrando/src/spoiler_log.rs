use serde_derive::{Deserialize, Serialize};
use tmntrando_game::util::sorted_hashmap_iter;
use tmntrando_game::{EntranceIdx, RegionIdx};

use crate::randomize::EntranceRandomizer;
use crate::randomize::matching::RegionMatching;
use crate::randomize::reverse::ReverseLink;
use crate::settings::VERSION;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerEntrance {
    pub idx: EntranceIdx,
    pub ptr: String,
    pub region: Option<usize>,
    pub area: Option<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerLink {
    pub entrance: SpoilerEntrance,
    pub partner: SpoilerEntrance,
    // Where going through `entrance` now leads: the far side of `partner` before shuffling.
    pub arrives_at: Option<SpoilerEntrance>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerRegion {
    pub region: RegionIdx,
    pub links: Vec<SpoilerLink>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerUnresolved {
    pub entrance: SpoilerEntrance,
    pub nearest: SpoilerEntrance,
    pub distance: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerLog {
    pub version: usize,
    pub seed: usize,
    pub seed_label: String,
    pub regions: Vec<SpoilerRegion>,
    pub unresolved_reverse: Vec<SpoilerUnresolved>,
}

impl EntranceRandomizer<'_> {
    fn get_spoiler_entrance(&self, idx: EntranceIdx) -> SpoilerEntrance {
        let h = self.hierarchy[idx];
        SpoilerEntrance {
            idx,
            ptr: format!("{:#06x}", self.entrances[idx].ptr),
            region: h.map(|h| h.region),
            area: h.map(|h| h.area),
        }
    }

    pub fn get_spoiler_log(&self, seed: usize, regions: &[RegionMatching]) -> SpoilerLog {
        let mut spoiler_regions: Vec<SpoilerRegion> = vec![];
        for r in regions {
            let links = sorted_hashmap_iter(&r.assignment)
                .map(|(&a, &b)| SpoilerLink {
                    entrance: self.get_spoiler_entrance(a),
                    partner: self.get_spoiler_entrance(b),
                    arrives_at: self
                        .get_reverse_entrance(b)
                        .map(|x| self.get_spoiler_entrance(x)),
                })
                .collect();
            spoiler_regions.push(SpoilerRegion {
                region: r.region,
                links,
            });
        }

        let mut unresolved_reverse: Vec<SpoilerUnresolved> = vec![];
        for (idx, link) in self.reverse_links.iter().enumerate() {
            if let ReverseLink::Ambiguous { nearest, distance } = *link {
                unresolved_reverse.push(SpoilerUnresolved {
                    entrance: self.get_spoiler_entrance(idx),
                    nearest: self.get_spoiler_entrance(nearest),
                    distance,
                });
            }
        }

        SpoilerLog {
            version: VERSION,
            seed,
            seed_label: self.settings.seed_label.clone(),
            regions: spoiler_regions,
            unresolved_reverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::randomize::tests::{SCENARIO_SEED, scenario_entrances, scenario_game_data};
    use crate::randomize::EntranceRandomizer;
    use crate::settings::RandomizerSettings;

    #[test]
    fn test_spoiler_links() -> Result<()> {
        let entrances = scenario_entrances();
        let game_data = scenario_game_data("4,5\n6\n7\n")?;
        let settings = RandomizerSettings::default();
        let randomizer = EntranceRandomizer::new(&entrances, &game_data, &settings)?;
        let randomization = randomizer.randomize(SCENARIO_SEED)?;
        let spoiler = &randomization.spoiler_log;
        assert_eq!(spoiler.seed, SCENARIO_SEED);
        assert_eq!(spoiler.regions.len(), 5);
        assert!(spoiler.unresolved_reverse.is_empty());

        let links = &spoiler.regions[0].links;
        assert_eq!(links.len(), 8);
        let assignment = randomization.get_assignment();
        for link in links {
            assert_eq!(assignment[&link.entrance.idx], link.partner.idx);
            let far_side = randomizer.get_reverse_entrance(link.partner.idx);
            assert_eq!(link.arrives_at.as_ref().map(|x| x.idx), far_side);
        }
        // Links are listed in entrance order:
        let order: Vec<usize> = links.iter().map(|l| l.entrance.idx).collect();
        assert_eq!(order, (0..8).collect::<Vec<usize>>());

        let spoiler_str = serde_json::to_string_pretty(spoiler)?;
        assert!(spoiler_str.contains("\"arrives_at\""));
        Ok(())
    }
}
