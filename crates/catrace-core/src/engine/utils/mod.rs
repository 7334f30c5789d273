//! Helpers shared by several pipeline stages: cylinder density sampling and
//! bounded connectivity searches over confidence volumes.

pub mod connectivity;
pub mod density;
