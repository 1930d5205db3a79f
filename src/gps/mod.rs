// src/gps/mod.rs
//! NMEA decoding and fix aggregation

pub mod data;
pub mod fix;
pub mod nmea;

pub use data::{GpsEvent, LocationEvent, RawSentenceEvent, SatelliteInfo, SatelliteStatusEvent, SessionStatus};
pub use fix::{FixAggregator, FixState};
pub use nmea::{DecodeOutcome, DecodedSentence, NmeaDecoder};
