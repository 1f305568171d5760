use crate::{EntranceIdx, EntrancePtr, HierarchyIndex, RegionIdx};

// Data and algorithm errors that abort an entrance randomization run. These are raised
// through `anyhow`, so callers can recover the kind with `downcast_ref::<RandoError>()`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RandoError {
    #[error(
        "conflicting hierarchy for pointer {ptr:#x}: {first:?} on line {first_line}, {second:?} on line {second_line}"
    )]
    ConflictingHierarchy {
        ptr: EntrancePtr,
        first: HierarchyIndex,
        first_line: usize,
        second: HierarchyIndex,
        second_line: usize,
    },
    #[error("no reverse entrance candidate for entrance {idx} (pointer {ptr:#x})")]
    NoReverseCandidate { idx: EntranceIdx, ptr: EntrancePtr },
    #[error(
        "ambiguous reverse entrance for entrance {idx} (pointer {ptr:#x}): nearest candidate {nearest} is at distance {distance:.1}"
    )]
    AmbiguousReverseEntrance {
        idx: EntranceIdx,
        ptr: EntrancePtr,
        nearest: EntranceIdx,
        distance: f32,
    },
    #[error(
        "cluster {cluster} in region {region} is partially present: {present} of {expected} entrances"
    )]
    ClusterConsistency {
        region: RegionIdx,
        cluster: usize,
        present: usize,
        expected: usize,
    },
    #[error("entrance {idx} in region {region} belongs to more than one cluster")]
    OverlappingCluster { region: RegionIdx, idx: EntranceIdx },
    #[error(
        "region {region} has {underworld} underworld entrances but {overworld} overworld entrances"
    )]
    RegionSizeMismatch {
        region: RegionIdx,
        underworld: usize,
        overworld: usize,
    },
    #[error("matching invariant violated in region {region}: {reason}")]
    MatchingInvariant { region: RegionIdx, reason: String },
}

impl RandoError {
    pub fn matching_invariant(region: RegionIdx, reason: impl Into<String>) -> Self {
        RandoError::MatchingInvariant {
            region,
            reason: reason.into(),
        }
    }
}

