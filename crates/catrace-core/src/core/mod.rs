//! # Core Module
//!
//! The stateless foundation of the tracing library.
//!
//! ## Overview
//!
//! The core module holds the data model shared by every pipeline stage, the
//! file formats used to exchange volumes and traces, and the numerical helpers
//! the algorithms in [`crate::engine`] are built from. Nothing in this module
//! keeps state between calls.
//!
//! ## Architecture
//!
//! - **Data Model** ([`models`]) - Voxels, confidence volumes, traces, the trace graph, and output chains
//! - **File I/O** ([`io`]) - MRC/CCP4 volumes and fixed-width Ca trace records with hybrid-36 numbering
//! - **Numerics** ([`utils`]) - Geometry, voxel sampling, screw-axis curves, and Nelder–Mead minimization
//!
//! ## Conventions
//!
//! - Volumes are indexed `[x, y, z]` and voxels are one ångström on a side;
//!   a voxel's physical position is its index plus the volume origin.
//! - All collections iterate in a deterministic order, so repeated runs on the
//!   same input produce identical output.

pub mod io;
pub mod models;
pub mod utils;
