//! # CATRACE Core Library
//!
//! Reconstructs polymer backbone traces from predicted 3D confidence volumes and
//! refines them through topological pruning and geometric idealization.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Voxel`, `Volume`,
//!   `Graph`, `TraceChain`), geometry and optimization utilities, and codecs
//!   for MRC volumes and the trace record format.
//!
//! - **[`engine`]: The Logic Core.** The tracing algorithms: the confidence
//!   walk, graph construction and repair, mask refinement, chain extraction and
//!   helix fitting, together with their configuration and progress reporting.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into
//!   the full two-pass tracing procedure.

pub mod core;
pub mod engine;
pub mod workflows;
