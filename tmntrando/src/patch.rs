use std::path::Path;

use anyhow::{Context, Result, ensure};
use hashbrown::HashSet;
use log::info;
use tmntrando_game::{ENTRANCE_RECORD_SIZE, Entrance, EntranceFields, EntranceTable, GameData};

use crate::randomize::{EntranceRandomizer, Randomization, apply_links};
use crate::settings::RandomizerSettings;

// Offset of the first byte after the relink fields (area_index, underworld, dest_x,
// dest_y, pan_x, pan_y). The remaining bytes give the entrance's own position.
const RELINK_FIELDS_END: usize = 8;

#[derive(Clone)]
pub struct Rom {
    pub data: Vec<u8>,
    track_touched: bool,
    touched: HashSet<usize>,
}

impl Rom {
    pub fn new(data: Vec<u8>) -> Self {
        Rom {
            data,
            track_touched: false,
            touched: HashSet::new(),
        }
    }

    pub fn enable_tracking(&mut self) {
        self.track_touched = true;
        self.touched.clear();
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Unable to load ROM at path {}", path.display()))?;
        Ok(Rom::new(data))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.data)
            .with_context(|| format!("Unable to save ROM at path {}", path.display()))?;
        Ok(())
    }

    pub fn read_n(&self, addr: usize, n: usize) -> Result<&[u8]> {
        ensure!(addr + n <= self.data.len(), "read_n address out of bounds");
        Ok(&self.data[addr..(addr + n)])
    }

    pub fn write_u8(&mut self, addr: usize, x: isize) -> Result<()> {
        ensure!(addr < self.data.len(), "write_u8 address out of bounds");
        ensure!((0..=0xFF).contains(&x), "write_u8 data does not fit");
        self.data[addr] = x as u8;
        if self.track_touched {
            self.touched.insert(addr);
        }
        Ok(())
    }

    pub fn write_n(&mut self, addr: usize, x: &[u8]) -> Result<()> {
        ensure!(
            addr + x.len() <= self.data.len(),
            "write_n address out of bounds"
        );
        for (i, &b) in x.iter().enumerate() {
            self.write_u8(addr + i, b as isize)?;
        }
        Ok(())
    }

    // Returns a list of [start, end) ranges.
    #[allow(clippy::mut_range_bound)]
    pub fn get_modified_ranges(&self) -> Vec<(usize, usize)> {
        let mut addresses: Vec<usize> = self.touched.iter().copied().collect();
        addresses.sort();
        let mut ranges: Vec<(usize, usize)> = vec![];

        let mut i = 0;
        'r: while i < addresses.len() {
            for j in i..addresses.len() - 1 {
                if addresses[j + 1] != addresses[j] + 1 {
                    ranges.push((addresses[i], addresses[j] + 1));
                    i = j + 1;
                    continue 'r;
                }
            }
            ranges.push((addresses[i], addresses[addresses.len() - 1] + 1));
            break;
        }
        ranges
    }
}

/// Reads every entrance record described by `tables`. The `ptr` of each entrance is
/// the file offset of its record, and `idx` counts records across all tables in order.
pub fn read_entrances(rom: &Rom, tables: &[EntranceTable]) -> Result<Vec<Entrance>> {
    let mut entrances: Vec<Entrance> = vec![];
    for (table_idx, table) in tables.iter().enumerate() {
        for i in 0..table.count {
            let ptr = table.address + i * ENTRANCE_RECORD_SIZE;
            let data = rom.read_n(ptr, ENTRANCE_RECORD_SIZE).with_context(|| {
                format!("Unable to read {} record {} at {:#x}", table.name, i, ptr)
            })?;
            let fields = EntranceFields::from_bytes(data)?;
            let idx = entrances.len();
            entrances.push(Entrance::new(ptr, idx, table_idx, table.shuffle, fields));
        }
    }
    info!("Read {} entrance records", entrances.len());
    Ok(entrances)
}

/// Writes back the fields that determine where each entrance leads. The position
/// fields (zone, tile) are left untouched.
pub fn write_entrance_links(rom: &mut Rom, entrances: &[Entrance]) -> Result<()> {
    for e in entrances {
        if e.current == e.original {
            continue;
        }
        let data = e.current.to_bytes();
        rom.write_n(e.ptr, &data[..RELINK_FIELDS_END])
            .with_context(|| format!("Unable to write entrance {} at {:#x}", e.idx, e.ptr))?;
    }
    Ok(())
}

/// Shuffles the entrances of `base_rom` and returns the patched copy. The base ROM is
/// never modified, so a failed run leaves nothing half-written.
pub fn make_rom(
    base_rom: &Rom,
    game_data: &GameData,
    settings: &RandomizerSettings,
    seed: usize,
) -> Result<(Rom, Randomization)> {
    let mut entrances = read_entrances(base_rom, &game_data.entrance_tables)?;
    let randomization = {
        let randomizer = EntranceRandomizer::new(&entrances, game_data, settings)?;
        randomizer.randomize(seed)?
    };
    apply_links(&mut entrances, &randomization)?;

    let mut rom = base_rom.clone();
    rom.enable_tracking();
    write_entrance_links(&mut rom, &entrances)?;
    info!(
        "Rewrote entrance links in {} ROM ranges",
        rom.get_modified_ranges().len()
    );
    Ok((rom, randomization))
}
