//! # Workflows Module
//!
//! High-level entry points that run the complete tracing procedure for one
//! structure.
//!
//! ## Overview
//!
//! A workflow validates its configuration, drives every engine stage in order,
//! reports progress, and returns everything a caller needs to write results.
//! The engine stages stay usable on their own; workflows only compose them.
//!
//! - **Tracing Workflow** ([`trace`]) - Two walks separated by graph repair and
//!   a backbone mask, followed by chain extraction and helix fitting.

pub mod trace;
