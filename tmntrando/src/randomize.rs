pub mod matching;
pub mod reverse;

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail, ensure};
use hashbrown::HashSet;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tmntrando_game::util::sorted_hashmap_iter;
use tmntrando_game::{
    AreaIdx, Entrance, EntranceIdx, GameData, HierarchyIndex, OVERWORLD_REGION, RandoError,
    RegionIdx,
};

use crate::settings::{AmbiguousReversePolicy, RandomizerSettings};
use crate::spoiler_log::SpoilerLog;

use self::matching::{Assignment, RegionGroups, RegionMatching, match_region};
use self::reverse::{ReverseLink, resolve_reverse_entrance};

// Everything derived from the static tables and the original entrance data. Building it
// resolves every reverse entrance up front, before any entrance is modified.
pub struct EntranceRandomizer<'a> {
    pub entrances: &'a [Entrance],
    pub game_data: &'a GameData,
    pub settings: &'a RandomizerSettings,
    pub hierarchy: Vec<Option<HierarchyIndex>>, // Corresponds to `entrances`
    pub reverse_links: Vec<ReverseLink>,        // Corresponds to `entrances`
}

pub struct Randomization {
    pub seed: usize,
    pub regions: Vec<RegionMatching>,
    pub spoiler_log: SpoilerLog,
}

impl Randomization {
    pub fn get_assignment(&self) -> Assignment {
        let mut out = Assignment::new();
        for r in &self.regions {
            out.extend(r.assignment.iter().map(|(&a, &b)| (a, b)));
        }
        out
    }
}

// The region's random stream depends only on the seed and a fixed label, so that it is
// unaffected by anything else drawn from the seed.
pub fn get_region_rng(seed: usize, label: &str, region: RegionIdx) -> Result<StdRng> {
    let label = label.as_bytes();
    ensure!(label.len() < 24, "seed label is too long");
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&(seed as u64).to_le_bytes());
    rng_seed[8..8 + label.len()].copy_from_slice(label);
    rng_seed[8 + label.len()] = region as u8;
    Ok(StdRng::from_seed(rng_seed))
}

impl<'a> EntranceRandomizer<'a> {
    pub fn new(
        entrances: &'a [Entrance],
        game_data: &'a GameData,
        settings: &'a RandomizerSettings,
    ) -> Result<Self> {
        for (i, e) in entrances.iter().enumerate() {
            ensure!(e.idx == i, "entrance at position {} has index {}", i, e.idx);
        }
        let hierarchy: Vec<Option<HierarchyIndex>> = entrances
            .iter()
            .map(|e| game_data.hierarchy.get(e.ptr))
            .collect();
        let num_unclassified = hierarchy.iter().filter(|h| h.is_none()).count();
        if num_unclassified > 0 {
            info!("{num_unclassified} entrances are not in the hierarchy table and will not be shuffled");
        }

        let mut reverse_links: Vec<ReverseLink> = Vec::with_capacity(entrances.len());
        for e in entrances {
            let link = resolve_reverse_entrance(
                entrances,
                &hierarchy,
                e.idx,
                settings.reverse_distance_threshold,
            )?;
            if let ReverseLink::Ambiguous { nearest, distance } = link {
                let err = RandoError::AmbiguousReverseEntrance {
                    idx: e.idx,
                    ptr: e.ptr,
                    nearest,
                    distance,
                };
                match settings.ambiguous_reverse {
                    AmbiguousReversePolicy::Warn => warn!("{err}; leaving it unresolved"),
                    AmbiguousReversePolicy::Fail => bail!(err),
                }
            }
            reverse_links.push(link);
        }

        Ok(EntranceRandomizer {
            entrances,
            game_data,
            settings,
            hierarchy,
            reverse_links,
        })
    }

    pub fn get_reverse_entrance(&self, idx: EntranceIdx) -> Option<EntranceIdx> {
        self.reverse_links[idx].entrance()
    }

    pub fn get_region_groups(&self, region: RegionIdx) -> Result<RegionGroups> {
        let mut underworld_by_area: BTreeMap<AreaIdx, Vec<EntranceIdx>> = BTreeMap::new();
        let mut overworld: Vec<EntranceIdx> = vec![];
        for e in self.entrances {
            let Some(h) = self.hierarchy[e.idx] else {
                continue;
            };
            if !e.shuffle {
                continue;
            }
            if h.region == region && e.original.area_index as usize == region {
                underworld_by_area.entry(h.area).or_default().push(e.idx);
            } else if h.region == OVERWORLD_REGION && h.area == region {
                overworld.push(e.idx);
            }
        }

        let mut overworld_groups: Vec<Vec<EntranceIdx>> = vec![];
        let mut clustered: HashSet<EntranceIdx> = HashSet::new();
        for (cluster_idx, cluster) in self.game_data.clusters.clusters.iter().enumerate() {
            let members: Vec<EntranceIdx> = overworld
                .iter()
                .copied()
                .filter(|idx| cluster.contains(idx))
                .collect();
            if members.is_empty() {
                continue;
            }
            if members.len() != cluster.len() {
                bail!(RandoError::ClusterConsistency {
                    region,
                    cluster: cluster_idx,
                    present: members.len(),
                    expected: cluster.len(),
                });
            }
            for &idx in &members {
                if !clustered.insert(idx) {
                    bail!(RandoError::OverlappingCluster { region, idx });
                }
            }
            overworld_groups.push(members);
        }
        for &idx in &overworld {
            if !clustered.contains(&idx) {
                debug!("Region {region}: overworld entrance {idx} is in no cluster");
                overworld_groups.push(vec![idx]);
            }
        }

        let groups = RegionGroups {
            region,
            underworld: underworld_by_area.into_values().collect(),
            overworld: overworld_groups,
        };
        info!(
            "Region {region}: {} underworld entrances in {} areas, {} overworld entrances in {} groups",
            groups.underworld.iter().map(|g| g.len()).sum::<usize>(),
            groups.underworld.len(),
            overworld.len(),
            groups.overworld.len()
        );
        Ok(groups)
    }

    // Matches all regions. Nothing is modified here; see `apply_links`.
    pub fn randomize(&self, seed: usize) -> Result<Randomization> {
        let mut regions: Vec<RegionMatching> = vec![];
        for &region in &self.settings.regions {
            let groups = self.get_region_groups(region)?;
            let mut rng = get_region_rng(seed, &self.settings.seed_label, region)?;
            let matching = match_region(&groups, &mut rng)
                .with_context(|| format!("Unable to match entrances in region {region}"))?;
            info!(
                "Region {region}: {} entrance pairs",
                matching.assignment.len() / 2
            );
            regions.push(matching);
        }
        let spoiler_log = self.get_spoiler_log(seed, &regions);
        Ok(Randomization {
            seed,
            regions,
            spoiler_log,
        })
    }
}

/// Each matched entrance takes on its partner's original destination, so going
/// through `a` now leads where `b` used to lead (and vice versa). Where the entrances
/// themselves are located is unchanged.
pub fn apply_links(entrances: &mut [Entrance], randomization: &Randomization) -> Result<()> {
    for r in &randomization.regions {
        for (&a, &b) in r.assignment.iter() {
            ensure!(
                a < entrances.len() && b < entrances.len(),
                "assignment of {a} to {b} refers to a missing entrance"
            );
        }
    }
    for r in &randomization.regions {
        for (&a, &b) in sorted_hashmap_iter(&r.assignment) {
            let partner = entrances[b].original;
            entrances[a].current.relink_from(&partner);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tmntrando_game::{ClusterTable, EntranceFields, HierarchyTable};

    pub const SCENARIO_SEED: usize = 42;

    // World 0 has two areas, with entrances 0, 1 (area 0) and 2, 3 (area 1) leading out
    // to overworld sub-area 0. The overworld entrances 4, 5 lead into area 0 and 6, 7
    // into area 1, and entrance 8 is a door between two areas of world 0.
    pub fn scenario_entrances() -> Vec<Entrance> {
        let underworld_exit = |dest_x: u8, dest_y: u8| EntranceFields {
            area_index: 0,
            dest_x,
            dest_y,
            ..Default::default()
        };
        let overworld_door = |area_index: u8, tile_x: u8, tile_y: u8| EntranceFields {
            area_index,
            underworld: 1,
            pan_x_lo: area_index,
            dest_x: 0x40,
            tile_x,
            tile_y,
            ..Default::default()
        };
        let fields = vec![
            underworld_exit(0x12, 0x10),
            underworld_exit(0x80, 0x14),
            underworld_exit(0x10, 0x80),
            underworld_exit(0x81, 0x80),
            overworld_door(0, 0x10, 0x10),
            overworld_door(0, 0x80, 0x10),
            overworld_door(1, 0x10, 0x80),
            overworld_door(1, 0x80, 0x80),
            EntranceFields {
                area_index: 1,
                ..Default::default()
            },
        ];
        fields
            .into_iter()
            .enumerate()
            .map(|(i, f)| Entrance::new(0x10 + i * 0x0B, i, 0, true, f))
            .collect()
    }

    pub fn scenario_hierarchy_text() -> String {
        let mut lines = vec!["# pointer area zone".to_string()];
        let areas = [0, 0, 1, 1];
        for i in 0..4 {
            lines.push(format!("{:x} {:x} 0", 0x10 + i * 0x0B, areas[i]));
        }
        lines.push(format!("{:x} 0 0", 0x10 + 8 * 0x0B));
        // Remaining zones, so that the overworld zone gets index 6:
        for zone in 1..6 {
            lines.push(format!("{:x} 0 {:x}", 0x1000 + zone, zone));
        }
        for i in 4..8 {
            lines.push(format!("{:x} 0 ff", 0x10 + i * 0x0B));
        }
        lines.join("\n")
    }

    pub fn scenario_game_data(clusters: &str) -> Result<GameData> {
        Ok(GameData {
            hierarchy: HierarchyTable::parse(&scenario_hierarchy_text())?,
            clusters: ClusterTable::parse(clusters)?,
            entrance_tables: vec![],
        })
    }

    #[test]
    fn test_reverse_links_resolved_up_front() -> Result<()> {
        let entrances = scenario_entrances();
        let game_data = scenario_game_data("4,5\n6\n7\n")?;
        let settings = RandomizerSettings::default();
        let randomizer = EntranceRandomizer::new(&entrances, &game_data, &settings)?;
        let expected = [Some(4), Some(5), Some(6), Some(7), Some(0), Some(1), Some(2), Some(3)];
        for (i, &r) in expected.iter().enumerate() {
            assert_eq!(randomizer.get_reverse_entrance(i), r, "entrance {i}");
        }
        assert_eq!(randomizer.reverse_links[8], ReverseLink::NotApplicable);
        Ok(())
    }

    #[test]
    fn test_region_groups() -> Result<()> {
        let entrances = scenario_entrances();
        let game_data = scenario_game_data("4,5\n")?;
        let settings = RandomizerSettings::default();
        let randomizer = EntranceRandomizer::new(&entrances, &game_data, &settings)?;
        let groups = randomizer.get_region_groups(0)?;
        assert_eq!(groups.underworld, vec![vec![0, 1], vec![2, 3]]);
        // Overworld entrances outside every cluster stand alone:
        assert_eq!(groups.overworld, vec![vec![4, 5], vec![6], vec![7]]);

        let empty = randomizer.get_region_groups(1)?;
        assert!(empty.underworld.is_empty() && empty.overworld.is_empty());
        Ok(())
    }

    #[test]
    fn test_cluster_errors() -> Result<()> {
        let entrances = scenario_entrances();
        let settings = RandomizerSettings::default();

        let game_data = scenario_game_data("4,5,20\n")?;
        let randomizer = EntranceRandomizer::new(&entrances, &game_data, &settings)?;
        let err = randomizer.get_region_groups(0).err().unwrap();
        assert_eq!(
            err.downcast_ref::<RandoError>(),
            Some(&RandoError::ClusterConsistency {
                region: 0,
                cluster: 0,
                present: 2,
                expected: 3
            })
        );

        let game_data = scenario_game_data("4,5\n5\n")?;
        let randomizer = EntranceRandomizer::new(&entrances, &game_data, &settings)?;
        let err = randomizer.get_region_groups(0).err().unwrap();
        assert_eq!(
            err.downcast_ref::<RandoError>(),
            Some(&RandoError::OverlappingCluster { region: 0, idx: 5 })
        );
        Ok(())
    }

    #[test]
    fn test_randomize_and_apply() -> Result<()> {
        let mut entrances = scenario_entrances();
        let game_data = scenario_game_data("4,5\n6\n7\n")?;
        let settings = RandomizerSettings::default();
        let randomization = {
            let randomizer = EntranceRandomizer::new(&entrances, &game_data, &settings)?;
            randomizer.randomize(SCENARIO_SEED)?
        };
        let assignment = randomization.get_assignment();
        assert_eq!(assignment.len(), 8);

        apply_links(&mut entrances, &randomization)?;
        for (&a, &b) in assignment.iter() {
            assert_eq!(entrances[a].current.full_dest(), entrances[b].original.full_dest());
            assert_eq!(entrances[a].current.area_index, entrances[b].original.area_index);
            assert_eq!(entrances[a].current.zone, entrances[a].original.zone);
        }
        // Not part of any region's matching:
        assert_eq!(entrances[8].current, entrances[8].original);
        Ok(())
    }

    #[test]
    fn test_same_seed_same_result() -> Result<()> {
        let entrances = scenario_entrances();
        let game_data = scenario_game_data("4,5\n6\n7\n")?;
        let settings = RandomizerSettings::default();
        let randomizer = EntranceRandomizer::new(&entrances, &game_data, &settings)?;
        let a = randomizer.randomize(SCENARIO_SEED)?.get_assignment();
        let b = randomizer.randomize(SCENARIO_SEED)?.get_assignment();
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_region_rng_streams() -> Result<()> {
        use rand::RngCore;
        let mut a = get_region_rng(1, "inter", 0)?;
        let mut b = get_region_rng(1, "inter", 0)?;
        assert_eq!(a.next_u64(), b.next_u64());
        let mut c = get_region_rng(1, "inter", 1)?;
        let mut d = get_region_rng(2, "inter", 0)?;
        let x = get_region_rng(1, "inter", 0)?.next_u64();
        assert_ne!(x, c.next_u64());
        assert_ne!(x, d.next_u64());
        assert!(get_region_rng(1, &"x".repeat(24), 0).is_err());
        Ok(())
    }

    #[test]
    fn test_ambiguous_policy() -> Result<()> {
        let mut entrances = scenario_entrances();
        // Move entrance 0's destination far away from every overworld entrance:
        entrances[0].original.pan_y_hi = 0x10;
        entrances[0].current = entrances[0].original;
        let game_data = scenario_game_data("4,5\n6\n7\n")?;

        let settings = RandomizerSettings::default();
        let randomizer = EntranceRandomizer::new(&entrances, &game_data, &settings)?;
        assert!(matches!(
            randomizer.reverse_links[0],
            ReverseLink::Ambiguous { nearest: 4, .. }
        ));
        // Still shuffled:
        assert!(randomizer.randomize(SCENARIO_SEED)?.get_assignment().contains_key(&0));

        let settings = RandomizerSettings {
            ambiguous_reverse: AmbiguousReversePolicy::Fail,
            ..Default::default()
        };
        let err = EntranceRandomizer::new(&entrances, &game_data, &settings)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<RandoError>(),
            Some(RandoError::AmbiguousReverseEntrance { idx: 0, .. })
        ));
        Ok(())
    }
}
