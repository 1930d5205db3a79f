// src/gps/nmea.rs
//! NMEA sentence framing, checksum validation and decoding
//!
//! [`NmeaDecoder`] is fed raw chunks of a byte stream. Complete `$...*CC`
//! frames are validated and decoded; a trailing fragment is carried over
//! and completed by the next chunk, so chunk boundaries never change the
//! decoded result.

use super::data::{SatelliteInfo, MAX_SATELLITES};
use chrono::{NaiveDate, NaiveTime};
use log::{trace, warn};
use std::{collections::HashMap, fmt, str::FromStr};

/// Longest frame body accepted between `$` and `*`
pub const MAX_SENTENCE_LEN: usize = 256;

/// GGA (Global Positioning System Fix Data)
#[derive(Debug, Clone, PartialEq)]
pub struct GgaData {
    pub talker: String,
    pub time: Option<NaiveTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fix_quality: Option<u8>,
    pub satellites_used: Option<u8>,
    pub hdop: Option<f64>,
    pub altitude: Option<f64>,         // meters above MSL
    pub geoid_separation: Option<f64>, // meters
    pub dgps_age: Option<f64>,         // seconds
    pub dgps_station: Option<u16>,
}

/// GSV (Satellites in View), with satellites accumulated over the sequence
#[derive(Debug, Clone, PartialEq)]
pub struct GsvData {
    pub talker: String,
    pub total_messages: u8,
    pub message_number: u8,
    pub satellites_in_view: Option<u16>,
    pub satellites: Vec<SatelliteInfo>,
    /// Satellites beyond [`MAX_SATELLITES`] were dropped
    pub truncated: bool,
}

/// GSA (DOP and Active Satellites)
#[derive(Debug, Clone, PartialEq)]
pub struct GsaData {
    pub talker: String,
    pub selection_mode: Option<char>, // 'A' automatic, 'M' manual
    pub fix_mode: Option<u8>,         // 1 none, 2 2D, 3 3D
    pub prns: Vec<u16>,
    pub pdop: Option<f64>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
}

/// RMC (Recommended Minimum Navigation Information)
#[derive(Debug, Clone, PartialEq)]
pub struct RmcData {
    pub talker: String,
    pub time: Option<NaiveTime>,
    pub valid: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_knots: Option<f64>,
    pub track_angle: Option<f64>, // degrees true
    pub date: Option<NaiveDate>,
    pub magnetic_variation: Option<f64>, // degrees, west negative
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedSentence {
    Gga(GgaData),
    Gsv(GsvData),
    Gsa(GsaData),
    Rmc(RmcData),
    Unrecognized { address: String },
}

impl DecodedSentence {
    pub fn kind(&self) -> &str {
        match self {
            DecodedSentence::Gga(_) => "GGA",
            DecodedSentence::Gsv(_) => "GSV",
            DecodedSentence::Gsa(_) => "GSA",
            DecodedSentence::Rmc(_) => "RMC",
            DecodedSentence::Unrecognized { address } => address,
        }
    }
}

/// Why a single frame was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum MalformedReason {
    ChecksumMismatch { expected: u8, computed: u8 },
    InvalidChecksum(String),
    /// A new `$` started before the frame reached its `*`
    Truncated,
    TooLong,
    NotAscii,
    MissingFields { sentence: &'static str, found: usize, required: usize },
    InvalidField { sentence: &'static str, field: usize, value: String },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::ChecksumMismatch { expected, computed } => {
                write!(f, "checksum mismatch: expected {:02X}, computed {:02X}", expected, computed)
            }
            MalformedReason::InvalidChecksum(digits) => write!(f, "invalid checksum digits {:?}", digits),
            MalformedReason::Truncated => write!(f, "sentence truncated by a new start marker"),
            MalformedReason::TooLong => write!(f, "sentence exceeds {} bytes", MAX_SENTENCE_LEN),
            MalformedReason::NotAscii => write!(f, "sentence contains non-ASCII bytes"),
            MalformedReason::MissingFields { sentence, found, required } => {
                write!(f, "{} has {} fields, {} required", sentence, found, required)
            }
            MalformedReason::InvalidField { sentence, field, value } => {
                write!(f, "{} field {} has invalid value {:?}", sentence, field, value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Sentence { sentence: DecodedSentence, raw: String },
    Malformed(MalformedReason),
}

/// Unrecoverable decoder condition; the stream can no longer be trusted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    LengthOutOfBounds { length: usize, capacity: usize },
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderError::LengthOutOfBounds { length, capacity } => {
                write!(f, "feed length {} exceeds buffer of {} bytes", length, capacity)
            }
        }
    }
}

impl std::error::Error for DecoderError {}

/// XOR of every byte between `$` and `*`
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

#[derive(Debug, Default)]
pub struct NmeaDecoder {
    carry: Vec<u8>,
    gsv_sequences: HashMap<String, Vec<SatelliteInfo>>,
}

impl NmeaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    pub fn reset(&mut self) {
        self.carry.clear();
        self.gsv_sequences.clear();
    }

    /// Decode the first `length` bytes of `buffer`, prefixed by any fragment
    /// left over from the previous call.
    pub fn feed(&mut self, buffer: &[u8], length: usize) -> Result<Vec<DecodeOutcome>, DecoderError> {
        if length > buffer.len() {
            return Err(DecoderError::LengthOutOfBounds {
                length,
                capacity: buffer.len(),
            });
        }
        self.carry.extend_from_slice(&buffer[..length]);

        let mut outcomes = Vec::new();
        let mut pos = 0;

        loop {
            let start = match self.carry[pos..].iter().position(|&b| b == b'$') {
                Some(offset) => pos + offset,
                None => {
                    if pos < self.carry.len() {
                        trace!("Skipping {} bytes outside any sentence", self.carry.len() - pos);
                    }
                    pos = self.carry.len();
                    break;
                }
            };
            pos = start;

            let body_start = start + 1;
            let marker = self.carry[body_start..]
                .iter()
                .position(|&b| b == b'*' || b == b'$');

            match marker {
                None => {
                    if self.carry.len() - body_start > MAX_SENTENCE_LEN {
                        outcomes.push(DecodeOutcome::Malformed(MalformedReason::TooLong));
                        pos = self.carry.len();
                    }
                    break;
                }
                Some(offset) if self.carry[body_start + offset] == b'$' => {
                    outcomes.push(DecodeOutcome::Malformed(MalformedReason::Truncated));
                    pos = body_start + offset;
                }
                Some(offset) => {
                    let star = body_start + offset;
                    if offset > MAX_SENTENCE_LEN {
                        outcomes.push(DecodeOutcome::Malformed(MalformedReason::TooLong));
                        pos = star + 1;
                        continue;
                    }
                    if self.carry.len() < star + 3 {
                        // checksum digits not read yet
                        break;
                    }
                    let frame = &self.carry[start..star + 3];
                    match decode_frame(frame, &mut self.gsv_sequences) {
                        Ok((sentence, raw)) => {
                            outcomes.push(DecodeOutcome::Sentence { sentence, raw });
                            pos = star + 3;
                        }
                        Err(reason @ MalformedReason::InvalidChecksum(_)) => {
                            outcomes.push(DecodeOutcome::Malformed(reason));
                            pos = star + 1;
                        }
                        Err(reason) => {
                            outcomes.push(DecodeOutcome::Malformed(reason));
                            pos = star + 3;
                        }
                    }
                }
            }
        }

        self.carry.drain(..pos);
        Ok(outcomes)
    }
}

/// Validate and decode one `$...*CC` frame
fn decode_frame(
    frame: &[u8],
    gsv_sequences: &mut HashMap<String, Vec<SatelliteInfo>>,
) -> Result<(DecodedSentence, String), MalformedReason> {
    if !frame.is_ascii() {
        return Err(MalformedReason::NotAscii);
    }
    // ASCII checked above
    let text = String::from_utf8_lossy(frame).into_owned();
    let body = &text[1..text.len() - 3];
    let digits = &text[text.len() - 2..];

    let expected = u8::from_str_radix(digits, 16)
        .map_err(|_| MalformedReason::InvalidChecksum(digits.to_string()))?;
    let computed = checksum(body.as_bytes());
    if expected != computed {
        return Err(MalformedReason::ChecksumMismatch { expected, computed });
    }

    let fields: Vec<&str> = body.split(',').collect();
    let address = fields[0];

    let sentence = if address.len() == 5 && address.bytes().all(|b| b.is_ascii_alphanumeric()) {
        let (talker, kind) = address.split_at(2);
        match kind {
            "GGA" => DecodedSentence::Gga(parse_gga(talker, &fields)?),
            "GSV" => DecodedSentence::Gsv(parse_gsv(talker, &fields, gsv_sequences)?),
            "GSA" => DecodedSentence::Gsa(parse_gsa(talker, &fields)?),
            "RMC" => DecodedSentence::Rmc(parse_rmc(talker, &fields)?),
            _ => DecodedSentence::Unrecognized {
                address: address.to_string(),
            },
        }
    } else {
        DecodedSentence::Unrecognized {
            address: address.to_string(),
        }
    };

    Ok((sentence, text))
}

fn require_fields(sentence: &'static str, fields: &[&str], required: usize) -> Result<(), MalformedReason> {
    if fields.len() < required {
        return Err(MalformedReason::MissingFields {
            sentence,
            found: fields.len(),
            required,
        });
    }
    Ok(())
}

fn invalid(sentence: &'static str, field: usize, value: &str) -> MalformedReason {
    MalformedReason::InvalidField {
        sentence,
        field,
        value: value.to_string(),
    }
}

/// Parse an optional field; empty means absent, garbage is an error
fn optional<T: FromStr>(sentence: &'static str, fields: &[&str], index: usize) -> Result<Option<T>, MalformedReason> {
    let raw = fields[index].trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| invalid(sentence, index, raw))
}

/// Convert `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into signed decimal degrees
fn coordinate(
    sentence: &'static str,
    fields: &[&str],
    index: usize,
    negative: &str,
    positive: &str,
) -> Result<Option<f64>, MalformedReason> {
    let value = fields[index].trim();
    let hemisphere = fields[index + 1].trim();
    if value.is_empty() && hemisphere.is_empty() {
        return Ok(None);
    }

    let raw = value
        .parse::<f64>()
        .map_err(|_| invalid(sentence, index, value))?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    if hemisphere == negative {
        Ok(Some(-decimal))
    } else if hemisphere == positive {
        Ok(Some(decimal))
    } else {
        Err(invalid(sentence, index + 1, hemisphere))
    }
}

/// `hhmmss` with optional fractional seconds
fn utc_time(sentence: &'static str, fields: &[&str], index: usize) -> Result<Option<NaiveTime>, MalformedReason> {
    let raw = fields[index].trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() < 6 || !raw.is_ascii() {
        return Err(invalid(sentence, index, raw));
    }

    let hour = raw[0..2].parse::<u32>().map_err(|_| invalid(sentence, index, raw))?;
    let minute = raw[2..4].parse::<u32>().map_err(|_| invalid(sentence, index, raw))?;
    let seconds = raw[4..].parse::<f64>().map_err(|_| invalid(sentence, index, raw))?;
    let millis = ((seconds - seconds.trunc()) * 1000.0).round() as u32;

    NaiveTime::from_hms_milli_opt(hour, minute, seconds.trunc() as u32, millis.min(999))
        .map(Some)
        .ok_or_else(|| invalid(sentence, index, raw))
}

/// `ddmmyy`
fn utc_date(sentence: &'static str, fields: &[&str], index: usize) -> Result<Option<NaiveDate>, MalformedReason> {
    let raw = fields[index].trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(sentence, index, raw));
    }

    let day = raw[0..2].parse::<u32>().map_err(|_| invalid(sentence, index, raw))?;
    let month = raw[2..4].parse::<u32>().map_err(|_| invalid(sentence, index, raw))?;
    let year = raw[4..6].parse::<i32>().map_err(|_| invalid(sentence, index, raw))?;
    let year = if year < 80 { 2000 + year } else { 1900 + year };

    NaiveDate::from_ymd_opt(year, month, day)
        .map(Some)
        .ok_or_else(|| invalid(sentence, index, raw))
}

fn parse_gga(talker: &str, fields: &[&str]) -> Result<GgaData, MalformedReason> {
    const KIND: &str = "GGA";
    require_fields(KIND, fields, 15)?;

    Ok(GgaData {
        talker: talker.to_string(),
        time: utc_time(KIND, fields, 1)?,
        latitude: coordinate(KIND, fields, 2, "S", "N")?,
        longitude: coordinate(KIND, fields, 4, "W", "E")?,
        fix_quality: optional(KIND, fields, 6)?,
        satellites_used: optional(KIND, fields, 7)?,
        hdop: optional(KIND, fields, 8)?,
        altitude: optional(KIND, fields, 9)?,
        geoid_separation: optional(KIND, fields, 11)?,
        dgps_age: optional(KIND, fields, 13)?,
        dgps_station: optional(KIND, fields, 14)?,
    })
}

fn parse_rmc(talker: &str, fields: &[&str]) -> Result<RmcData, MalformedReason> {
    const KIND: &str = "RMC";
    require_fields(KIND, fields, 12)?;

    let valid = match fields[2].trim() {
        "A" => true,
        "V" | "" => false,
        other => return Err(invalid(KIND, 2, other)),
    };

    let magnetic_variation = match optional::<f64>(KIND, fields, 10)? {
        Some(variation) if fields[11].trim() == "W" => Some(-variation),
        variation => variation,
    };

    Ok(RmcData {
        talker: talker.to_string(),
        time: utc_time(KIND, fields, 1)?,
        valid,
        latitude: coordinate(KIND, fields, 3, "S", "N")?,
        longitude: coordinate(KIND, fields, 5, "W", "E")?,
        speed_knots: optional(KIND, fields, 7)?,
        track_angle: optional(KIND, fields, 8)?,
        date: utc_date(KIND, fields, 9)?,
        magnetic_variation,
    })
}

fn parse_gsa(talker: &str, fields: &[&str]) -> Result<GsaData, MalformedReason> {
    const KIND: &str = "GSA";
    require_fields(KIND, fields, 18)?;

    let selection_mode = match fields[1].trim() {
        "" => None,
        mode @ ("A" | "M") => mode.chars().next(),
        other => return Err(invalid(KIND, 1, other)),
    };

    let mut prns = Vec::new();
    for index in 3..=14 {
        if let Some(prn) = optional::<u16>(KIND, fields, index)? {
            prns.push(prn);
        }
    }

    Ok(GsaData {
        talker: talker.to_string(),
        selection_mode,
        fix_mode: optional(KIND, fields, 2)?,
        prns,
        pdop: optional(KIND, fields, 15)?,
        hdop: optional(KIND, fields, 16)?,
        vdop: optional(KIND, fields, 17)?,
    })
}

fn parse_gsv(
    talker: &str,
    fields: &[&str],
    gsv_sequences: &mut HashMap<String, Vec<SatelliteInfo>>,
) -> Result<GsvData, MalformedReason> {
    const KIND: &str = "GSV";
    require_fields(KIND, fields, 4)?;

    let total_messages = optional::<u8>(KIND, fields, 1)?.ok_or_else(|| invalid(KIND, 1, fields[1]))?;
    let message_number = optional::<u8>(KIND, fields, 2)?.ok_or_else(|| invalid(KIND, 2, fields[2]))?;
    let satellites_in_view = optional::<u16>(KIND, fields, 3)?;

    // Up to 4 satellites per message; a trailing signal id field is ignored
    let mut in_message = Vec::new();
    let mut index = 4;
    while index + 3 < fields.len() {
        if let Some(prn) = optional::<u16>(KIND, fields, index)? {
            let mut sat = SatelliteInfo::new(prn);
            sat.elevation = optional(KIND, fields, index + 1)?;
            sat.azimuth = optional(KIND, fields, index + 2)?;
            sat.snr = optional(KIND, fields, index + 3)?;
            in_message.push(sat);
        }
        index += 4;
    }

    let sequence = gsv_sequences.entry(talker.to_string()).or_default();
    if message_number <= 1 {
        sequence.clear();
    }

    let mut truncated = false;
    for sat in in_message {
        if let Some(existing) = sequence.iter_mut().find(|s| s.prn == sat.prn) {
            *existing = sat;
        } else if sequence.len() < MAX_SATELLITES {
            sequence.push(sat);
        } else {
            truncated = true;
        }
    }
    if truncated {
        warn!(
            "{}GSV lists more than {} satellites, excess dropped",
            talker, MAX_SATELLITES
        );
    }

    Ok(GsvData {
        talker: talker.to_string(),
        total_messages,
        message_number,
        satellites_in_view,
        satellites: sequence.clone(),
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
    const GSV_1: &str = "$GPGSV,3,1,12,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45*7F";
    const GSV_2: &str = "$GPGSV,3,2,12,15,11,050,30,17,35,120,38,19,60,270,42,22,05,010,*78";
    const GSA: &str = "$GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39";

    fn decode_all(input: &str) -> Vec<DecodeOutcome> {
        let mut decoder = NmeaDecoder::new();
        decoder.feed(input.as_bytes(), input.len()).unwrap()
    }

    fn single_sentence(input: &str) -> DecodedSentence {
        let outcomes = decode_all(input);
        assert_eq!(outcomes.len(), 1, "{:?}", outcomes);
        match outcomes.into_iter().next().unwrap() {
            DecodeOutcome::Sentence { sentence, .. } => sentence,
            other => panic!("expected sentence, got {:?}", other),
        }
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&GGA.as_bytes()[1..GGA.len() - 3]), 0x47);
    }

    #[test]
    fn test_gga_decoding() {
        let sentence = single_sentence(GGA);
        let DecodedSentence::Gga(gga) = sentence else {
            panic!("expected GGA");
        };
        assert_eq!(gga.talker, "GP");
        assert_eq!(gga.time, NaiveTime::from_hms_opt(12, 35, 19));
        assert!((gga.latitude.unwrap() - 48.1173).abs() < 1e-6);
        assert!((gga.longitude.unwrap() - 11.516_666_6).abs() < 1e-6);
        assert_eq!(gga.fix_quality, Some(1));
        assert_eq!(gga.satellites_used, Some(8));
        assert_eq!(gga.hdop, Some(0.9));
        assert_eq!(gga.altitude, Some(545.4));
        assert_eq!(gga.geoid_separation, Some(46.9));
        assert_eq!(gga.dgps_age, None);
    }

    #[test]
    fn test_southern_western_hemisphere() {
        let sentence = single_sentence("$GPGGA,123520,4807.038,S,01131.000,W,1,08,1.1,,M,46.9,M,,*65");
        let DecodedSentence::Gga(gga) = sentence else {
            panic!("expected GGA");
        };
        assert!(gga.latitude.unwrap() < 0.0);
        assert!(gga.longitude.unwrap() < 0.0);
        assert_eq!(gga.altitude, None);
    }

    #[test]
    fn test_rmc_decoding() {
        let DecodedSentence::Rmc(rmc) = single_sentence(RMC) else {
            panic!("expected RMC");
        };
        assert!(rmc.valid);
        assert_eq!(rmc.speed_knots, Some(22.4));
        assert_eq!(rmc.track_angle, Some(84.4));
        assert_eq!(rmc.date, NaiveDate::from_ymd_opt(1994, 3, 23));
        assert_eq!(rmc.magnetic_variation, Some(-3.1));
    }

    #[test]
    fn test_gsa_decoding() {
        let DecodedSentence::Gsa(gsa) = single_sentence(GSA) else {
            panic!("expected GSA");
        };
        assert_eq!(gsa.selection_mode, Some('A'));
        assert_eq!(gsa.fix_mode, Some(3));
        assert_eq!(gsa.prns, vec![4, 5, 9, 12, 24]);
        assert_eq!(gsa.pdop, Some(2.5));
        assert_eq!(gsa.hdop, Some(1.3));
        assert_eq!(gsa.vdop, Some(2.1));
    }

    #[test]
    fn test_gsv_accumulates_sequence() {
        let input = format!("{}\r\n{}\r\n", GSV_1, GSV_2);
        let outcomes = decode_all(&input);
        assert_eq!(outcomes.len(), 2);

        let DecodeOutcome::Sentence { sentence: DecodedSentence::Gsv(first), .. } = &outcomes[0] else {
            panic!("expected GSV");
        };
        assert_eq!(first.satellites.len(), 4);
        assert_eq!(first.satellites[0].prn, 1);
        assert_eq!(first.satellites[0].elevation, Some(40.0));
        assert_eq!(first.satellites[0].azimuth, Some(83.0));
        assert_eq!(first.satellites[0].snr, Some(46.0));

        let DecodeOutcome::Sentence { sentence: DecodedSentence::Gsv(second), .. } = &outcomes[1] else {
            panic!("expected GSV");
        };
        assert_eq!(second.message_number, 2);
        assert_eq!(second.satellites_in_view, Some(12));
        assert_eq!(second.satellites.len(), 8);
        assert_eq!(second.satellites[7].prn, 22);
        assert_eq!(second.satellites[7].snr, None);
        assert!(!second.truncated);
    }

    #[test]
    fn test_gsv_caps_at_capacity() {
        let mut decoder = NmeaDecoder::new();
        let mut last = None;
        for message in 1..=10u16 {
            let mut body = format!("GPGSV,10,{},40", message);
            for n in 0..4 {
                body.push_str(&format!(",{:02},10,100,30", (message - 1) * 4 + n + 1));
            }
            let line = format!("${}*{:02X}", body, checksum(body.as_bytes()));
            let outcomes = decoder.feed(line.as_bytes(), line.len()).unwrap();
            last = outcomes.into_iter().next();
        }

        let Some(DecodeOutcome::Sentence { sentence: DecodedSentence::Gsv(gsv), .. }) = last else {
            panic!("expected GSV");
        };
        assert_eq!(gsv.satellites.len(), MAX_SATELLITES);
        assert!(gsv.truncated);
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let corrupted = GGA.replace("545.4", "545.5");
        let outcomes = decode_all(&corrupted);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0],
            DecodeOutcome::Malformed(MalformedReason::ChecksumMismatch { expected: 0x47, .. })
        ));
    }

    #[test]
    fn test_every_single_byte_mutation_rejected() {
        for index in 1..GGA.len() - 3 {
            let mut bytes = GGA.as_bytes().to_vec();
            if bytes[index] == b'*' || bytes[index] == b'$' {
                continue;
            }
            bytes[index] ^= 0x01;
            if bytes[index] == b'*' || bytes[index] == b'$' {
                continue;
            }
            let mut decoder = NmeaDecoder::new();
            let outcomes = decoder.feed(&bytes, bytes.len()).unwrap();
            assert!(
                outcomes.iter().all(|o| matches!(o, DecodeOutcome::Malformed(_))),
                "mutation at {} accepted",
                index
            );
        }
    }

    #[test]
    fn test_lowercase_checksum_accepted() {
        let sentence = single_sentence(&RMC.replace("*6A", "*6a"));
        assert!(matches!(sentence, DecodedSentence::Rmc(_)));
    }

    #[test]
    fn test_split_feed_matches_whole() {
        let input = format!("{}\r\n{}\r\n{}", GGA, RMC, GSA);
        let whole = decode_all(&input);
        assert_eq!(whole.len(), 3);

        for split in 0..=input.len() {
            let mut decoder = NmeaDecoder::new();
            let (head, tail) = input.as_bytes().split_at(split);
            let mut outcomes = decoder.feed(head, head.len()).unwrap();
            outcomes.extend(decoder.feed(tail, tail.len()).unwrap());
            assert_eq!(outcomes, whole, "split at {}", split);
        }
    }

    #[test]
    fn test_partial_sentence_is_carried() {
        let mut decoder = NmeaDecoder::new();
        let outcomes = decoder.feed(&GGA.as_bytes()[..20], 20).unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(decoder.pending(), 20);
    }

    #[test]
    fn test_truncated_sentence_resyncs() {
        let input = format!("$GPGGA,123519,4807.0{}\r\n", RMC);
        let outcomes = decode_all(&input);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0], DecodeOutcome::Malformed(MalformedReason::Truncated));
        assert!(matches!(
            outcomes[1],
            DecodeOutcome::Sentence { sentence: DecodedSentence::Rmc(_), .. }
        ));
    }

    #[test]
    fn test_short_gga_is_malformed() {
        let outcomes = decode_all("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9*26");
        assert_eq!(
            outcomes,
            vec![DecodeOutcome::Malformed(MalformedReason::MissingFields {
                sentence: "GGA",
                found: 12,
                required: 15,
            })]
        );
    }

    #[test]
    fn test_invalid_field_is_malformed() {
        let outcomes = decode_all("$GPGGA,123519,48x7.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*0F");
        assert!(matches!(
            outcomes[0],
            DecodeOutcome::Malformed(MalformedReason::InvalidField { sentence: "GGA", field: 2, .. })
        ));
    }

    #[test]
    fn test_unrecognized_passes_through() {
        let outcomes = decode_all("$GPZDA,201530.00,04,07,2002,00,00*60");
        match &outcomes[0] {
            DecodeOutcome::Sentence { sentence, raw } => {
                assert_eq!(
                    sentence,
                    &DecodedSentence::Unrecognized {
                        address: "GPZDA".to_string()
                    }
                );
                assert_eq!(raw, "$GPZDA,201530.00,04,07,2002,00,00*60");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_other_talkers_recognized() {
        let DecodedSentence::Gga(gga) =
            single_sentence("$GNGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*59")
        else {
            panic!("expected GGA");
        };
        assert_eq!(gga.talker, "GN");
    }

    #[test]
    fn test_too_long_frame() {
        let input = format!("$GPTXT,{}", "A".repeat(MAX_SENTENCE_LEN + 10));
        let outcomes = decode_all(&input);
        assert_eq!(outcomes, vec![DecodeOutcome::Malformed(MalformedReason::TooLong)]);
    }

    #[test]
    fn test_length_out_of_bounds_is_fatal() {
        let mut decoder = NmeaDecoder::new();
        let result = decoder.feed(b"$GP", 10);
        assert_eq!(
            result,
            Err(DecoderError::LengthOutOfBounds {
                length: 10,
                capacity: 3
            })
        );
    }
}
