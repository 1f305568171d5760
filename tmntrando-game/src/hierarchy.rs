use anyhow::{Context, Result, bail};
use hashbrown::HashMap;
use log::info;
use std::path::Path;

use crate::{EntrancePtr, HierarchyIndex, IndexedVec, RandoError};

/// Classification of entrance pointers into (region, area), built from the
/// hierarchy description: one `pointer area_label zone_label` triple of hex
/// values per line. Zones are numbered densely in first-seen order, and areas
/// are numbered densely in first-seen order within their zone.
#[derive(Default, Clone)]
pub struct HierarchyTable {
    pub zone_labels: IndexedVec<usize>,
    pub area_labels: Vec<IndexedVec<usize>>,
    pub index_by_ptr: HashMap<EntrancePtr, HierarchyIndex>,
}

pub(crate) fn parse_hex(token: &str) -> Result<usize> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    usize::from_str_radix(digits, 16).with_context(|| format!("invalid hex value '{token}'"))
}

impl HierarchyTable {
    pub fn parse(text: &str) -> Result<HierarchyTable> {
        let mut table = HierarchyTable::default();
        let mut line_by_ptr: HashMap<EntrancePtr, usize> = HashMap::new();
        for (i, line) in text.lines().enumerate() {
            let line_num = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 3 {
                bail!(
                    "hierarchy line {line_num}: expected 3 values, found {}",
                    tokens.len()
                );
            }
            let ptr = parse_hex(tokens[0]).with_context(|| format!("hierarchy line {line_num}"))?;
            let area_label =
                parse_hex(tokens[1]).with_context(|| format!("hierarchy line {line_num}"))?;
            let zone_label =
                parse_hex(tokens[2]).with_context(|| format!("hierarchy line {line_num}"))?;

            let region = table.zone_labels.add(&zone_label);
            if region == table.area_labels.len() {
                table.area_labels.push(IndexedVec::default());
            }
            let area = table.area_labels[region].add(&area_label);
            let hierarchy_idx = HierarchyIndex { region, area };

            if let Some(&existing) = table.index_by_ptr.get(&ptr) {
                if existing != hierarchy_idx {
                    bail!(RandoError::ConflictingHierarchy {
                        ptr,
                        first: existing,
                        first_line: line_by_ptr[&ptr],
                        second: hierarchy_idx,
                        second_line: line_num,
                    });
                }
                continue;
            }
            table.index_by_ptr.insert(ptr, hierarchy_idx);
            line_by_ptr.insert(ptr, line_num);
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<HierarchyTable> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read hierarchy table at {}", path.display()))?;
        let table = HierarchyTable::parse(&text)
            .with_context(|| format!("Unable to parse hierarchy table at {}", path.display()))?;
        info!(
            "Hierarchy: {} pointers in {} zones ({})",
            table.index_by_ptr.len(),
            table.zone_labels.keys.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn get(&self, ptr: EntrancePtr) -> Option<HierarchyIndex> {
        self.index_by_ptr.get(&ptr).copied()
    }

    pub fn num_regions(&self) -> usize {
        self.zone_labels.keys.len()
    }
}
