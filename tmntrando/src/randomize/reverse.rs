use anyhow::{Result, bail};
use tmntrando_game::{Entrance, EntranceIdx, HierarchyIndex, OVERWORLD_REGION, RandoError};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReverseLink {
    Found(EntranceIdx),
    // The entrance does not lead between the overworld and its own world.
    NotApplicable,
    // Several candidates, all further away than the distance threshold.
    Ambiguous {
        nearest: EntranceIdx,
        distance: f32,
    },
}

impl ReverseLink {
    pub fn entrance(&self) -> Option<EntranceIdx> {
        match self {
            ReverseLink::Found(idx) => Some(*idx),
            _ => None,
        }
    }
}

// Distance between where the underworld entrance sends the player on the overworld
// and where the overworld entrance sits.
fn get_distance(
    overworld: &Entrance,
    overworld_hierarchy: HierarchyIndex,
    underworld: &Entrance,
) -> f32 {
    let (dest_x, dest_y) = underworld.original.full_dest();
    let (loc_x, loc_y) = overworld.original.full_loc(overworld_hierarchy.region);
    let dx = (dest_x - loc_x) as f32;
    let dy = (dest_y - loc_y) as f32;
    (dx * dx + dy * dy).sqrt()
}

/// Infers the entrance on the other side of the passage through entrance `idx`,
/// reading only original field values. `hierarchy` gives the classification of
/// each entrance (by index), or `None` for entrances missing from the hierarchy table.
pub fn resolve_reverse_entrance(
    entrances: &[Entrance],
    hierarchy: &[Option<HierarchyIndex>],
    idx: EntranceIdx,
    max_distance: f32,
) -> Result<ReverseLink> {
    let e = &entrances[idx];
    let Some(e_hier) = hierarchy[idx] else {
        return Ok(ReverseLink::NotApplicable);
    };
    let e_area_index = e.original.area_index as usize;

    let candidates: Vec<EntranceIdx> = if e_hier.is_overworld() {
        entrances
            .iter()
            .filter(|c| match hierarchy[c.idx] {
                Some(h) => {
                    h.region == e_hier.area
                        && h.area == e_area_index
                        && c.original.area_index as usize == e_hier.area
                }
                None => false,
            })
            .map(|c| c.idx)
            .collect()
    } else if e_hier.region != e_area_index {
        return Ok(ReverseLink::NotApplicable);
    } else {
        entrances
            .iter()
            .filter(|c| match hierarchy[c.idx] {
                Some(h) => {
                    h.region == OVERWORLD_REGION
                        && h.area == e_hier.region
                        && c.original.area_index as usize == e_hier.area
                }
                None => false,
            })
            .map(|c| c.idx)
            .collect()
    };

    match candidates.len() {
        0 => bail!(RandoError::NoReverseCandidate { idx, ptr: e.ptr }),
        1 => return Ok(ReverseLink::Found(candidates[0])),
        _ => {}
    }

    let mut best: Option<(EntranceIdx, f32)> = None;
    for &c in &candidates {
        let distance = if e_hier.is_overworld() {
            get_distance(e, e_hier, &entrances[c])
        } else {
            // Candidates on this branch are all classified overworld entrances.
            let Some(c_hier) = hierarchy[c] else {
                continue;
            };
            get_distance(&entrances[c], c_hier, e)
        };
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((c, distance));
        }
    }
    let Some((nearest, distance)) = best else {
        bail!(RandoError::NoReverseCandidate { idx, ptr: e.ptr });
    };
    if distance > max_distance {
        Ok(ReverseLink::Ambiguous { nearest, distance })
    } else {
        Ok(ReverseLink::Found(nearest))
    }
}
