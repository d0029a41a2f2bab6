//! Ring-plus-bypass topology and hop distances.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A node's position on the interconnect: one component per dimension, each
/// in `[0, size)` of the corresponding dimension.
pub type Coordinate = Vec<u64>;

/// Errors raised when a topology configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// A dimension must hold at least two positions.
    #[error("dimension {index} too small: size must be >= 2, got {size}")]
    DimensionTooSmall {
        /// Index of the offending dimension.
        index: usize,
        /// Configured size.
        size: u64,
    },

    /// A bypass arc must skip more than one position and fewer than the
    /// dimension size.
    #[error("dimension {index}: bypass arc {arc} out of range (1, {size})")]
    InvalidBypassArc {
        /// Index of the offending dimension.
        index: usize,
        /// The invalid arc length.
        arc: u64,
        /// Configured dimension size.
        size: u64,
    },
}

/// Configuration of a single interconnect dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionConfig {
    /// Number of positions on the ring.
    pub size: u64,
    /// Bypass arc lengths; an arc of length `k` permits one hop that skips
    /// `k` positions in either direction.
    #[serde(default)]
    pub bypass: Vec<u64>,
}

impl DimensionConfig {
    /// Create a dimension configuration.
    pub fn new(size: u64, bypass: Vec<u64>) -> Self {
        Self { size, bypass }
    }

    fn validate(&self, index: usize) -> Result<(), TopologyError> {
        if self.size < 2 {
            return Err(TopologyError::DimensionTooSmall {
                index,
                size: self.size,
            });
        }
        for &arc in &self.bypass {
            if arc <= 1 || arc >= self.size {
                return Err(TopologyError::InvalidBypassArc {
                    index,
                    arc,
                    size: self.size,
                });
            }
        }
        Ok(())
    }
}

/// How per-dimension distances aggregate into a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// One hop at a time: total is the sum of per-dimension distances.
    #[default]
    OnePort,
    /// Simultaneous movement in all dimensions: total is the maximum
    /// per-dimension distance.
    AllPort,
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingMode::OnePort => write!(f, "one-port"),
            RoutingMode::AllPort => write!(f, "all-port"),
        }
    }
}

/// A validated interconnect layout plus routing mode.
#[derive(Debug, Clone)]
pub struct Topology {
    dims: Vec<DimensionConfig>,
    mode: RoutingMode,
}

impl Topology {
    /// Build a topology, validating every dimension.
    pub fn new(dims: Vec<DimensionConfig>, mode: RoutingMode) -> Result<Self, TopologyError> {
        for (index, dim) in dims.iter().enumerate() {
            dim.validate(index)?;
        }
        Ok(Self { dims, mode })
    }

    /// Number of configured dimensions.
    pub fn dimension_count(&self) -> usize {
        self.dims.len()
    }

    /// The configured routing mode.
    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// Whether a coordinate has the right arity and every component is in
    /// range for its dimension.
    pub fn contains(&self, coord: &[u64]) -> bool {
        coord.len() == self.dims.len()
            && coord.iter().zip(&self.dims).all(|(&c, dim)| c < dim.size)
    }

    /// Hop distance between two coordinates, or `None` when the coordinates
    /// do not match the configured dimensions (unreachable).
    ///
    /// The per-arc estimate `ceil(ring / k)` does not combine bypass arcs of
    /// different lengths within one dimension; that approximation is the
    /// stated contract.
    pub fn distance(&self, a: &[u64], b: &[u64]) -> Option<u64> {
        if a.len() != self.dims.len() || b.len() != self.dims.len() {
            return None;
        }
        let per_dim = self
            .dims
            .iter()
            .enumerate()
            .map(|(i, dim)| dimension_distance(dim, a[i], b[i]));
        Some(match self.mode {
            RoutingMode::OnePort => per_dim.sum(),
            RoutingMode::AllPort => per_dim.max().unwrap_or(0),
        })
    }
}

/// Distance along a single ring dimension with bypass arcs.
fn dimension_distance(dim: &DimensionConfig, a: u64, b: u64) -> u64 {
    let s = dim.size;
    let delta = (b % s + s - a % s) % s;
    let ring = delta.min(s - delta);
    let mut best = ring;
    for &arc in &dim.bypass {
        let hops = ring.div_ceil(arc);
        if hops < best {
            best = hops;
        }
    }
    best
}
