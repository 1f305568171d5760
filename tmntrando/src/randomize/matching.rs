use std::collections::BTreeSet;

use anyhow::{Result, bail};
use hashbrown::HashMap;
use rand::Rng;
use rand::seq::SliceRandom;
use tmntrando_game::{EntranceIdx, RandoError, RegionIdx};

pub type Assignment = HashMap<EntranceIdx, EntranceIdx>;

// Entrances of one region, partitioned into the units that must be paired up together.
// Underworld groups are the region's areas; overworld groups are its clusters.
#[derive(Clone, Debug, Default)]
pub struct RegionGroups {
    pub region: RegionIdx,
    pub underworld: Vec<Vec<EntranceIdx>>,
    pub overworld: Vec<Vec<EntranceIdx>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchStep {
    pub chosen: EntranceIdx,
    pub other: EntranceIdx,
    // Entrances still waiting for a partner after this step:
    pub pending: Vec<EntranceIdx>,
}

#[derive(Clone, Debug, Default)]
pub struct RegionMatching {
    pub region: RegionIdx,
    pub assignment: Assignment,
    pub steps: Vec<MatchStep>,
}

/// Pairs every underworld entrance of the region with an overworld entrance.
///
/// Starting from one random group, an entrance waiting for a partner is picked and
/// matched with an entrance from the opposite side; the whole groups of both are then
/// queued, so groups are always drawn into the matching as a unit. A partner is only
/// taken from a group that would leave something queued afterward, unless the queue
/// already holds more than one entrance or this is the last free entrance; this keeps
/// the chain going until every entrance has been reached.
pub fn match_region<R: Rng>(groups: &RegionGroups, rng: &mut R) -> Result<RegionMatching> {
    let region = groups.region;
    let underworld_set: BTreeSet<EntranceIdx> = groups.underworld.iter().flatten().copied().collect();
    let overworld_set: BTreeSet<EntranceIdx> = groups.overworld.iter().flatten().copied().collect();
    let num_underworld: usize = groups.underworld.iter().map(|g| g.len()).sum();
    let num_overworld: usize = groups.overworld.iter().map(|g| g.len()).sum();
    if num_underworld != underworld_set.len()
        || num_overworld != overworld_set.len()
        || !underworld_set.is_disjoint(&overworld_set)
    {
        bail!(RandoError::matching_invariant(
            region,
            "an entrance belongs to more than one group"
        ));
    }
    if underworld_set.len() != overworld_set.len() {
        bail!(RandoError::RegionSizeMismatch {
            region,
            underworld: underworld_set.len(),
            overworld: overworld_set.len(),
        });
    }

    let all_groups: Vec<&Vec<EntranceIdx>> = groups
        .underworld
        .iter()
        .chain(groups.overworld.iter())
        .filter(|g| !g.is_empty())
        .collect();
    let num_total = underworld_set.len() + overworld_set.len();
    let mut out = RegionMatching {
        region,
        ..Default::default()
    };
    let mut to_assign: BTreeSet<EntranceIdx> = match all_groups.choose(rng) {
        Some(g) => g.iter().copied().collect(),
        None => return Ok(out),
    };

    while !to_assign.is_empty() {
        let assignment = &mut out.assignment;
        let pending: Vec<EntranceIdx> = to_assign.iter().copied().collect();
        let Some(&chosen) = pending.choose(rng) else {
            break;
        };
        let chosen_overworld = overworld_set.contains(&chosen);
        let pool = if chosen_overworld {
            &underworld_set
        } else {
            &overworld_set
        };

        let num_free = num_total - assignment.len() - to_assign.len();
        let mut valid: BTreeSet<EntranceIdx> = BTreeSet::new();
        for g in &all_groups {
            let free: Vec<EntranceIdx> = g
                .iter()
                .copied()
                .filter(|x| !assignment.contains_key(x) && !to_assign.contains(x))
                .collect();
            if free.len() > 1 || to_assign.len() > 1 || num_free < 2 {
                valid.extend(free);
            }
        }

        let mut candidates: Vec<EntranceIdx> = valid.intersection(pool).copied().collect();
        if candidates.is_empty() {
            // Nothing outside the queue can be taken, so pair within the queue:
            if to_assign.len() < 2 {
                bail!(RandoError::matching_invariant(
                    region,
                    format!("no legal partner for entrance {chosen}")
                ));
            }
            candidates = to_assign
                .iter()
                .copied()
                .filter(|&x| x != chosen && overworld_set.contains(&x) != chosen_overworld)
                .collect();
        }
        let Some(&other) = candidates.choose(rng) else {
            bail!(RandoError::matching_invariant(
                region,
                format!("no partner on the opposite side for entrance {chosen}")
            ));
        };

        assignment.insert(chosen, other);
        assignment.insert(other, chosen);
        for g in &all_groups {
            if g.contains(&chosen) || g.contains(&other) {
                to_assign.extend(g.iter().copied());
            }
        }
        to_assign.retain(|x| !assignment.contains_key(x));
        out.steps.push(MatchStep {
            chosen,
            other,
            pending: to_assign.iter().copied().collect(),
        });
    }

    check_assignment(region, &underworld_set, &overworld_set, &out.assignment)?;
    Ok(out)
}

fn check_assignment(
    region: RegionIdx,
    underworld_set: &BTreeSet<EntranceIdx>,
    overworld_set: &BTreeSet<EntranceIdx>,
    assignment: &Assignment,
) -> Result<()> {
    if assignment.len() != underworld_set.len() + overworld_set.len() {
        bail!(RandoError::matching_invariant(
            region,
            format!(
                "{} of {} entrances assigned",
                assignment.len(),
                underworld_set.len() + overworld_set.len()
            )
        ));
    }
    for (&a, &b) in assignment.iter() {
        if assignment.get(&b) != Some(&a) {
            bail!(RandoError::matching_invariant(
                region,
                format!("assignment of {a} to {b} is not symmetric")
            ));
        }
        let crosses = (underworld_set.contains(&a) && overworld_set.contains(&b))
            || (overworld_set.contains(&a) && underworld_set.contains(&b));
        if !crosses {
            bail!(RandoError::matching_invariant(
                region,
                format!("entrances {a} and {b} are not on opposite sides")
            ));
        }
    }
    Ok(())
}
