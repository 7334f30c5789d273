//! Stateless numerical helpers shared by the engine: vector geometry and
//! voxel sampling ([`geometry`]), arc-length curves ([`curve`]), and a
//! derivative-free minimizer ([`minimize`]).

pub mod curve;
pub mod geometry;
pub mod minimize;
