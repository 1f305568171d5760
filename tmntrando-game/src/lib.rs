// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod cluster;
pub mod error;
pub mod hierarchy;
pub mod util;

use anyhow::{Context, Result, ensure};
use hashbrown::HashMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::borrow::ToOwned;
use std::hash::Hash;
use std::path::Path;

pub use crate::cluster::ClusterTable;
pub use crate::error::RandoError;
pub use crate::hierarchy::HierarchyTable;

pub type EntrancePtr = usize; // File offset of the entrance record in the ROM
pub type EntranceIdx = usize; // Ordinal position among all entrance records (in table order)
pub type RegionIdx = usize; // Zone index from the hierarchy table: 0..5 are underworld worlds, 6 is the overworld
pub type AreaIdx = usize; // Area index, local to a region

pub const OVERWORLD_REGION: RegionIdx = 6;
pub const NUM_WORLDS: usize = 5;

// Each entrance record is laid out as: area_index, underworld, dest_x, dest_y,
// pan_x (lo, hi), pan_y (lo, hi), zone, tile_x, tile_y.
pub const ENTRANCE_RECORD_SIZE: usize = 11;

// Size of a zone along each axis, in grid units:
pub const ZONE_SPAN: i32 = 0x100;

#[derive(Default, Clone)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HierarchyIndex {
    pub region: RegionIdx,
    pub area: AreaIdx,
}

impl HierarchyIndex {
    pub fn is_overworld(&self) -> bool {
        self.region == OVERWORLD_REGION
    }
}

/// Number of zones per row in each underworld region. Regions not listed here
/// (the overworld in particular) have no fixed width, and all their zones are
/// laid out along a single row.
pub fn get_zone_width(region: RegionIdx) -> Option<usize> {
    match region {
        0 => Some(2),
        1 => Some(2),
        2 => Some(5),
        3 => Some(4),
        4 => Some(3),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntranceFields {
    pub area_index: u8,
    pub underworld: u8,
    pub dest_x: u8,
    pub dest_y: u8,
    pub pan_x_lo: u8,
    pub pan_x_hi: u8,
    pub pan_y_lo: u8,
    pub pan_y_hi: u8,
    pub zone: u8,
    pub tile_x: u8,
    pub tile_y: u8,
}

impl EntranceFields {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() == ENTRANCE_RECORD_SIZE,
            "entrance record has length {}, expected {}",
            data.len(),
            ENTRANCE_RECORD_SIZE
        );
        Ok(EntranceFields {
            area_index: data[0],
            underworld: data[1],
            dest_x: data[2],
            dest_y: data[3],
            pan_x_lo: data[4],
            pan_x_hi: data[5],
            pan_y_lo: data[6],
            pan_y_hi: data[7],
            zone: data[8],
            tile_x: data[9],
            tile_y: data[10],
        })
    }

    pub fn to_bytes(&self) -> [u8; ENTRANCE_RECORD_SIZE] {
        [
            self.area_index,
            self.underworld,
            self.dest_x,
            self.dest_y,
            self.pan_x_lo,
            self.pan_x_hi,
            self.pan_y_lo,
            self.pan_y_hi,
            self.zone,
            self.tile_x,
            self.tile_y,
        ]
    }

    pub fn pan_x(&self) -> u16 {
        (self.pan_x_hi as u16) << 8 | self.pan_x_lo as u16
    }

    pub fn pan_y(&self) -> u16 {
        (self.pan_y_hi as u16) << 8 | self.pan_y_lo as u16
    }

    pub fn full_dest(&self) -> (i32, i32) {
        (
            self.pan_x() as i32 + self.dest_x as i32,
            self.pan_y() as i32 + self.dest_y as i32,
        )
    }

    pub fn full_loc(&self, region: RegionIdx) -> (i32, i32) {
        let zone = self.zone as usize;
        let (col, row) = match get_zone_width(region) {
            Some(width) => (zone % width, zone / width),
            None => (zone, 0),
        };
        (
            col as i32 * ZONE_SPAN + self.tile_x as i32,
            row as i32 * ZONE_SPAN + self.tile_y as i32,
        )
    }

    // Copy the fields which determine where the entrance leads:
    pub fn relink_from(&mut self, other: &EntranceFields) {
        self.area_index = other.area_index;
        self.underworld = other.underworld;
        self.dest_x = other.dest_x;
        self.dest_y = other.dest_y;
        self.pan_x_lo = other.pan_x_lo;
        self.pan_x_hi = other.pan_x_hi;
        self.pan_y_lo = other.pan_y_lo;
        self.pan_y_hi = other.pan_y_hi;
    }
}

#[derive(Clone, Debug)]
pub struct Entrance {
    pub ptr: EntrancePtr,
    pub idx: EntranceIdx,
    pub table_idx: usize,
    pub shuffle: bool,
    pub original: EntranceFields,
    pub current: EntranceFields,
}

impl Entrance {
    pub fn new(
        ptr: EntrancePtr,
        idx: EntranceIdx,
        table_idx: usize,
        shuffle: bool,
        fields: EntranceFields,
    ) -> Self {
        Entrance {
            ptr,
            idx,
            table_idx,
            shuffle,
            original: fields,
            current: fields,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct EntranceTable {
    pub name: String,
    pub address: usize,
    pub count: usize,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
}

fn default_shuffle() -> bool {
    true
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct EntranceTableList {
    pub tables: Vec<EntranceTable>,
}

// Static data which stays fixed for the lifetime of the process:
pub struct GameData {
    pub hierarchy: HierarchyTable,
    pub clusters: ClusterTable,
    pub entrance_tables: Vec<EntranceTable>,
}

impl GameData {
    pub fn load(base_path: &Path) -> Result<GameData> {
        let hierarchy_path = base_path.join("hierarchy.txt");
        let clusters_path = base_path.join("clusters.txt");
        let tables_path = base_path.join("entrance_tables.json");

        let hierarchy = HierarchyTable::load(&hierarchy_path)?;
        let clusters = ClusterTable::load(&clusters_path)?;
        let tables_str = std::fs::read_to_string(&tables_path).with_context(|| {
            format!(
                "Unable to read entrance tables at {}",
                tables_path.display()
            )
        })?;
        let table_list: EntranceTableList =
            serde_json::from_str(&tables_str).with_context(|| {
                format!(
                    "Unable to parse entrance tables at {}",
                    tables_path.display()
                )
            })?;
        info!(
            "Loaded {} entrance tables ({} records)",
            table_list.tables.len(),
            table_list.tables.iter().map(|t| t.count).sum::<usize>()
        );
        Ok(GameData {
            hierarchy,
            clusters,
            entrance_tables: table_list.tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_vec_first_seen() {
        let mut v: IndexedVec<String> = IndexedVec::default();
        assert_eq!(v.add("b"), 0);
        assert_eq!(v.add("a"), 1);
        assert_eq!(v.add("b"), 0);
        assert_eq!(v.keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_full_positions() -> Result<()> {
        let fields =
            EntranceFields::from_bytes(&[3, 1, 0x10, 0x20, 0x34, 0x01, 0x00, 0x02, 7, 0x05, 0x06])?;
        assert_eq!(fields.pan_x(), 0x134);
        assert_eq!(fields.pan_y(), 0x200);
        assert_eq!(fields.full_dest(), (0x144, 0x220));

        // Region 2 is five zones wide, so zone 7 is in column 2 of row 1:
        assert_eq!(fields.full_loc(2), (0x205, 0x106));
        // The overworld has no fixed width:
        assert_eq!(fields.full_loc(OVERWORLD_REGION), (0x705, 0x06));
        Ok(())
    }

    #[test]
    fn test_relink_keeps_source_position() {
        let mut a = EntranceFields {
            area_index: 1,
            zone: 4,
            tile_x: 9,
            tile_y: 10,
            ..Default::default()
        };
        let b = EntranceFields {
            area_index: 2,
            underworld: 1,
            dest_x: 3,
            dest_y: 4,
            pan_x_lo: 5,
            pan_x_hi: 6,
            pan_y_lo: 7,
            pan_y_hi: 8,
            zone: 11,
            tile_x: 12,
            tile_y: 13,
        };
        a.relink_from(&b);
        assert_eq!(a.full_dest(), b.full_dest());
        assert_eq!(a.area_index, 2);
        assert_eq!((a.zone, a.tile_x, a.tile_y), (4, 9, 10));
    }
}
