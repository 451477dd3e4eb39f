//! Replays a CSV of geolocated traffic records into a collector, and reads
//! the collector back.

pub mod dataset;
pub mod pacing;
pub mod replay;
pub mod viewer;
