//! Domain layer: entities, ports (trait boundaries to the outside world),
//! and the pure error/result types services operate in.

pub mod errors;
pub mod models;
pub mod ports;
