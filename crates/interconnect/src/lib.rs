//! # Cirrus Interconnect
//!
//! Topology-aware distance computation for job placement.
//!
//! Cluster members sit on a d-dimensional interconnect where each dimension
//! is a ring augmented with fixed-stride bypass arcs. The scheduler asks for
//! the hop distance between two coordinates and places jobs on the nearest
//! registered peer.
//!
//! - [`Topology`] - per-dimension and aggregate distance computation
//! - [`CoordinateRegistry`] - first-seen-ordered coordinate table with
//!   nearest-peer selection
//!
//! ## Example
//!
//! ```rust
//! use cirrus_interconnect::{DimensionConfig, RoutingMode, Topology};
//!
//! let topology = Topology::new(
//!     vec![
//!         DimensionConfig::new(32, vec![8, 12]),
//!         DimensionConfig::new(16, vec![4]),
//!     ],
//!     RoutingMode::OnePort,
//! )
//! .unwrap();
//!
//! assert_eq!(topology.distance(&[0, 0], &[24, 0]), Some(1));
//! // Dimension-count mismatch is unreachable, not a huge sentinel.
//! assert_eq!(topology.distance(&[0, 0], &[1]), None);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod registry;
pub mod topology;

pub use registry::CoordinateRegistry;
pub use topology::{Coordinate, DimensionConfig, RoutingMode, Topology, TopologyError};
