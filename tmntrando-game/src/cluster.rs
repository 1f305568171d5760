use anyhow::{Context, Result, ensure};
use hashbrown::HashSet;
use log::info;
use std::path::Path;

use crate::EntranceIdx;
use crate::hierarchy::parse_hex;

/// Groups of overworld entrance indices which must be reassigned as a unit.
/// Membership is only checked against a candidate pool when the clusters are
/// consulted (see `randomize`).
#[derive(Default, Clone, Debug)]
pub struct ClusterTable {
    pub clusters: Vec<Vec<EntranceIdx>>,
}

impl ClusterTable {
    pub fn parse(text: &str) -> Result<ClusterTable> {
        let mut clusters = vec![];
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cluster = line
                .split(',')
                .map(|token| parse_hex(token.trim()))
                .collect::<Result<Vec<EntranceIdx>>>()
                .with_context(|| format!("cluster line {}", i + 1))?;
            ensure!(!cluster.is_empty(), "cluster line {}: empty cluster", i + 1);
            let mut seen: HashSet<EntranceIdx> = HashSet::new();
            for &idx in &cluster {
                ensure!(
                    seen.insert(idx),
                    "cluster line {}: index {:#x} is listed more than once",
                    i + 1,
                    idx
                );
            }
            clusters.push(cluster);
        }
        Ok(ClusterTable { clusters })
    }

    pub fn load(path: &Path) -> Result<ClusterTable> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read cluster table at {}", path.display()))?;
        let table = ClusterTable::parse(&text)
            .with_context(|| format!("Unable to parse cluster table at {}", path.display()))?;
        info!(
            "Clusters: {} overworld clusters ({})",
            table.clusters.len(),
            path.display()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clusters() -> Result<()> {
        let table = ClusterTable::parse("# minimap groups\n1a,1b, 1c\n\n20\n")?;
        assert_eq!(table.clusters, vec![vec![0x1a, 0x1b, 0x1c], vec![0x20]]);
        assert!(ClusterTable::parse("1a,,1b\n").is_err());
        Ok(())
    }

    #[test]
    fn test_repeated_index_in_cluster() {
        let err = ClusterTable::parse("4,5\n6,7,7\n").err().unwrap();
        assert!(err.to_string().contains("cluster line 2"), "{err}");
        // The same index in two different clusters is only caught once clusters are consulted:
        assert!(ClusterTable::parse("4,5\n5\n").is_ok());
    }
}
