//! The stages of the tracing pipeline.
//!
//! Each submodule implements one step: the confidence walk ([`walk`]), graph
//! construction ([`graph_build`]) and repair ([`refine`]), the backbone mask
//! fed to the second walk ([`mask`]), chain extraction ([`extract`]) and the
//! idealized helix fit ([`helix`]). Stages are plain functions over the core
//! models and are composed by the workflows layer.

pub mod extract;
pub mod graph_build;
pub mod helix;
pub mod mask;
pub mod refine;
pub mod walk;
