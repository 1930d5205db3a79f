// src/lib.rs
//! NMEA Tail Library
//!
//! Tails a file that a GPS receiver keeps appending NMEA-0183 sentences to,
//! decodes GGA, RMC, GSA and GSV sentences and delivers location,
//! satellite, raw-sentence and session events to a consumer at a bounded
//! rate.

pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod gps;
pub mod session;
pub mod sink;
pub mod tail;
pub mod watch;

// Re-export main types for convenience
pub use config::{ConfigFile, ConfigSource, GpsConfig};
pub use error::{ParserError, Result};
pub use gps::data::{LocationEvent, RawSentenceEvent, SatelliteInfo, SatelliteStatusEvent, SessionStatus};
pub use session::{NmeaSession, SessionState};
pub use sink::EventSink;
pub use watch::{ChangeEvent, ChangeKind, ChangeNotifier, NotifyBridge, WatchToken};
