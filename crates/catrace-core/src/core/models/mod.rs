//! # Core Models Module
//!
//! Data structures shared by every stage of backbone tracing.
//!
//! ## Key Components
//!
//! - [`voxel`] - Integer grid locations and their mapping to physical space
//! - [`volume`] - Dense confidence fields and the co-registered [`volume::VolumeSet`]
//! - [`trace`] - Ordered point runs produced by the confidence walker
//! - [`graph`] - Arena-backed connectivity graph keyed by voxel location
//! - [`chain`] - Output polylines with helix and sheet annotations
//! - [`ids`] - Stable identifiers for graph nodes
//!
//! ## Usage
//!
//! ```ignore
//! use catrace::core::models::{graph::Graph, voxel::Voxel};
//!
//! let mut graph = Graph::new();
//! let a = graph.add_node(Voxel::new(0, 0, 0));
//! let b = graph.add_node(Voxel::new(4, 0, 0));
//! graph.connect(a, b)?;
//! ```

pub mod chain;
pub mod graph;
pub mod ids;
pub mod trace;
pub mod volume;
pub mod voxel;
