// src/error.rs
//! Error types for the NMEA tail reader

use crate::gps::nmea::DecoderError;
use std::{fmt, path::PathBuf};

pub type Result<T> = std::result::Result<T, ParserError>;

#[derive(Debug)]
pub enum ParserError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Watch(notify::Error),
    FileNotFound(PathBuf),
    Decoder(DecoderError),
    Config(String),
    Other(String),
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::Io(e) => write!(f, "IO error: {}", e),
            ParserError::Json(e) => write!(f, "JSON error: {}", e),
            ParserError::Watch(e) => write!(f, "Watch error: {}", e),
            ParserError::FileNotFound(path) => write!(f, "Could not open file: {}", path.display()),
            ParserError::Decoder(e) => write!(f, "Decoder error: {}", e),
            ParserError::Config(msg) => write!(f, "Config error: {}", msg),
            ParserError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for ParserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParserError::Io(e) => Some(e),
            ParserError::Json(e) => Some(e),
            ParserError::Watch(e) => Some(e),
            ParserError::Decoder(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ParserError {
    fn from(error: std::io::Error) -> Self {
        ParserError::Io(error)
    }
}

impl From<serde_json::Error> for ParserError {
    fn from(error: serde_json::Error) -> Self {
        ParserError::Json(error)
    }
}

impl From<notify::Error> for ParserError {
    fn from(error: notify::Error) -> Self {
        ParserError::Watch(error)
    }
}

impl From<DecoderError> for ParserError {
    fn from(error: DecoderError) -> Self {
        ParserError::Decoder(error)
    }
}
