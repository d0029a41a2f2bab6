//! Coordinate registry and nearest-peer selection.

use crate::topology::{Coordinate, Topology};

/// Tracks the interconnect coordinate of every known cluster member.
///
/// Entries keep their first-seen order: when two peers sit at the same
/// distance, the one registered earlier wins the tie.
#[derive(Debug, Default, Clone)]
pub struct CoordinateRegistry {
    entries: Vec<(String, Coordinate)>,
}

impl CoordinateRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or update a member's coordinate. Updates keep the member's
    /// original position in the ordering.
    pub fn set(&mut self, node_id: impl Into<String>, coord: Coordinate) {
        let node_id = node_id.into();
        match self.entries.iter_mut().find(|(id, _)| *id == node_id) {
            Some((_, existing)) => *existing = coord,
            None => self.entries.push((node_id, coord)),
        }
    }

    /// Look up a member's coordinate.
    pub fn get(&self, node_id: &str) -> Option<&Coordinate> {
        self.entries
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, coord)| coord)
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick the registered member nearest to `local_id`, excluding
    /// `local_id` itself and any member at an unreachable distance.
    ///
    /// Returns `None` when the local node has no coordinate or no other
    /// reachable member is registered.
    pub fn nearest(&self, topology: &Topology, local_id: &str) -> Option<(&str, u64)> {
        let local = self.get(local_id)?;
        let mut best: Option<(&str, u64)> = None;
        for (id, coord) in &self.entries {
            if id == local_id {
                continue;
            }
            let Some(dist) = topology.distance(local, coord) else {
                continue;
            };
            // Strict comparison keeps the first-seen member on ties.
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((id.as_str(), dist));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{DimensionConfig, RoutingMode};

    fn topo() -> Topology {
        Topology::new(
            vec![
                DimensionConfig::new(32, vec![8, 12]),
                DimensionConfig::new(16, vec![4]),
            ],
            RoutingMode::OnePort,
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_picks_minimum_sum() {
        let topo = topo();
        let mut reg = CoordinateRegistry::new();
        reg.set("local", vec![0, 0]);
        reg.set("far", vec![16, 8]);
        reg.set("near", vec![1, 0]);
        reg.set("mid", vec![4, 4]);

        let (id, dist) = reg.nearest(&topo, "local").unwrap();
        assert_eq!(id, "near");
        assert_eq!(dist, 1);
    }

    #[test]
    fn test_ties_break_by_first_seen_order() {
        let topo = topo();
        let mut reg = CoordinateRegistry::new();
        reg.set("local", vec![0, 0]);
        reg.set("second", vec![0, 1]);
        reg.set("first-at-same-distance", vec![1, 0]);

        // Both candidates sit at distance 1; the earlier registration wins.
        let (id, dist) = reg.nearest(&topo, "local").unwrap();
        assert_eq!(id, "second");
        assert_eq!(dist, 1);
    }

    #[test]
    fn test_nearest_skips_self_and_unreachable() {
        let topo = topo();
        let mut reg = CoordinateRegistry::new();
        reg.set("local", vec![0, 0]);
        reg.set("wrong-arity", vec![3]);
        assert!(reg.nearest(&topo, "local").is_none());

        reg.set("ok", vec![2, 2]);
        let (id, _) = reg.nearest(&topo, "local").unwrap();
        assert_eq!(id, "ok");
    }

    #[test]
    fn test_nearest_requires_local_coordinate() {
        let topo = topo();
        let mut reg = CoordinateRegistry::new();
        reg.set("other", vec![1, 1]);
        assert!(reg.nearest(&topo, "local").is_none());
    }

    #[test]
    fn test_set_updates_in_place() {
        let mut reg = CoordinateRegistry::new();
        reg.set("a", vec![0, 0]);
        reg.set("b", vec![1, 1]);
        reg.set("a", vec![2, 2]);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get("a"), Some(&vec![2, 2]));
        // "a" keeps its first position.
        assert_eq!(reg.entries[0].0, "a");
    }
}
