//! # Engine Module
//!
//! This module implements the backbone tracing engine: the algorithms that turn
//! co-registered confidence volumes into refined Ca chains.
//!
//! ## Overview
//!
//! A tracing run walks the Ca confidence field into raw traces, merges them into
//! a graph keyed by voxel location, repairs the graph topology, and extracts
//! ordered chains whose helical segments are replaced by an idealized model.
//! Every threshold the stages use lives in [`config::TracingConfig`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Walk, refinement, mask and helix parameters with validation
//! - **Tasks** ([`tasks`]) - One submodule per pipeline stage
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - Engine error type aggregating the lower layers

pub mod config;
pub mod error;
pub mod progress;
pub mod tasks;
pub(crate) mod utils;
