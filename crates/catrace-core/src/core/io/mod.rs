//! Provides input/output functionality for the files the tracing pipeline
//! consumes and produces.
//!
//! Confidence volumes arrive as MRC/CCP4 maps ([`mrc`]); traces are exchanged
//! as fixed-width Ca records ([`records`]) whose numbering uses the hybrid-36
//! scheme ([`hybrid36`]). Both formats implement the [`traits::StructureFile`]
//! interface.

pub mod hybrid36;
pub mod mrc;
pub mod records;
pub mod traits;
