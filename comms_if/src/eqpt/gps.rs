//! # GPS receiver
//!
//! The receiver streams NMEA sentences over a serial line. The driver collects one sentence per
//! idle period on the line, and the mission core parses `GGA` sentences into a [`GpsFix`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of comma separated fields in a GGA sentence, including the address field.
const GGA_NUM_FIELDS: usize = 15;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of NMEA sentences.
pub trait PositionFixSource {
    /// Bring up the receiver.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Begin receiving the next sentence.
    fn start_receive(&mut self) -> Result<(), EqptError>;

    /// Take the sentence received since the last call to `start_receive`, if one has arrived.
    ///
    /// Once a sentence has been taken reception stops until `start_receive` is called again.
    fn poll_sentence(&mut self) -> Option<String>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A position fix decoded from a `GGA` sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// UTC time of the fix
    pub time: NaiveTime,

    /// Latitude, positive north
    pub latitude_deg: f64,

    /// Longitude, positive east
    pub longitude_deg: f64,

    /// Fix quality indicator, 0 means no fix
    pub quality: u8,

    /// Number of satellites used in the fix
    pub num_satellites: u8,

    /// Horizontal dilution of precision
    pub hdop: f64,

    /// Altitude above mean sea level
    pub altitude_m: f64,

    /// Height of the geoid above the WGS84 ellipsoid
    pub geoid_sep_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum GpsParseError {
    #[error("Sentence does not start with '$'")]
    NoStartDelimiter,

    #[error("Sentence is not a GGA sentence (address {0})")]
    NotGga(String),

    #[error("Checksum mismatch, expected {expected:02X} found {found:02X}")]
    ChecksumMismatch { expected: u8, found: u8 },

    #[error("Invalid checksum field: {0}")]
    InvalidChecksum(String),

    #[error("Expected 15 fields in a GGA sentence, found {0}")]
    WrongFieldCount(usize),

    #[error("Invalid {0} field: {1:?}")]
    InvalidField(&'static str, String),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the NMEA checksum of a sentence body (the characters between `$` and `*`).
pub fn nmea_checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GpsFix {
    /// True if the receiver reported a valid position.
    pub fn is_valid(&self) -> bool {
        self.quality > 0
    }
}

impl FromStr for GpsFix {
    type Err = GpsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('$').ok_or(GpsParseError::NoStartDelimiter)?;

        // Split off and verify the checksum if present
        let body = match s.find('*') {
            Some(i) => {
                let (body, cs) = (&s[..i], &s[i + 1..]);
                let found = u8::from_str_radix(cs, 16)
                    .map_err(|_| GpsParseError::InvalidChecksum(cs.to_string()))?;
                let expected = nmea_checksum(body);
                if expected != found {
                    return Err(GpsParseError::ChecksumMismatch { expected, found });
                }
                body
            }
            None => s,
        };

        let fields: Vec<&str> = body.split(',').collect();

        // Any talker ID is accepted (GP, GN, ...)
        if fields[0].len() != 5 || !fields[0].ends_with("GGA") {
            return Err(GpsParseError::NotGga(fields[0].to_string()));
        }

        if fields.len() != GGA_NUM_FIELDS {
            return Err(GpsParseError::WrongFieldCount(fields.len()));
        }

        let time = parse_time(fields[1])?;
        let latitude_deg = parse_coord(fields[2], fields[3], 'N', 'S', "latitude")?;
        let longitude_deg = parse_coord(fields[4], fields[5], 'E', 'W', "longitude")?;

        Ok(Self {
            time,
            latitude_deg,
            longitude_deg,
            quality: parse_field(fields[6], "quality")?,
            num_satellites: parse_field(fields[7], "satellites")?,
            hdop: parse_field(fields[8], "hdop")?,
            altitude_m: parse_field(fields[9], "altitude")?,
            geoid_sep_m: parse_field(fields[11], "geoid separation")?,
        })
    }
}

impl fmt::Display for GpsFix {
    /// Format the fix as a complete GGA sentence, including the checksum.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.time.second() as f64 + self.time.nanosecond() as f64 * 1e-9;

        let body = format!(
            "GPGGA,{:02}{:02}{:05.2},{},{},{},{},{},{:02},{:.1},{:.1},M,{:.1},M,,",
            self.time.hour(),
            self.time.minute(),
            secs,
            format_coord(self.latitude_deg.abs(), 2),
            if self.latitude_deg < 0.0 { 'S' } else { 'N' },
            format_coord(self.longitude_deg.abs(), 3),
            if self.longitude_deg < 0.0 { 'W' } else { 'E' },
            self.quality,
            self.num_satellites,
            self.hdop,
            self.altitude_m,
            self.geoid_sep_m
        );

        write!(f, "${}*{:02X}", body, nmea_checksum(&body))
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn parse_field<T: FromStr>(field: &str, name: &'static str) -> Result<T, GpsParseError> {
    field
        .parse()
        .map_err(|_| GpsParseError::InvalidField(name, field.to_string()))
}

/// Parse an `hhmmss.ss` time field
fn parse_time(field: &str) -> Result<NaiveTime, GpsParseError> {
    let err = || GpsParseError::InvalidField("time", field.to_string());

    if field.len() < 6 || !field.is_char_boundary(6) {
        return Err(err());
    }

    let h: u32 = field[0..2].parse().map_err(|_| err())?;
    let m: u32 = field[2..4].parse().map_err(|_| err())?;
    let s: f64 = field[4..].parse().map_err(|_| err())?;

    NaiveTime::from_hms_milli_opt(h, m, s.trunc() as u32, (s.fract() * 1000.0).round() as u32)
        .ok_or_else(err)
}

/// Parse a `(d)ddmm.mmmm` coordinate field with its hemisphere
fn parse_coord(
    field: &str,
    hemi: &str,
    pos: char,
    neg: char,
    name: &'static str,
) -> Result<f64, GpsParseError> {
    let raw: f64 = parse_field(field, name)?;
    let deg = (raw / 100.0).trunc();
    let value = deg + (raw - deg * 100.0) / 60.0;

    match hemi.chars().next() {
        Some(c) if c == pos => Ok(value),
        Some(c) if c == neg => Ok(-value),
        _ => Err(GpsParseError::InvalidField(name, hemi.to_string())),
    }
}

fn format_coord(value_deg: f64, deg_digits: usize) -> String {
    let deg = value_deg.trunc();
    let min = (value_deg - deg) * 60.0;
    format!("{:0width$}{:07.4}", deg as u32, min, width = deg_digits)
}

#[cfg(test)]
mod test {
    use super::*;

    fn with_checksum(body: &str) -> String {
        format!("${}*{:02X}", body, nmea_checksum(body))
    }

    #[test]
    fn test_parse_gga() {
        let s = with_checksum("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        let fix: GpsFix = s.parse().unwrap();

        assert_eq!(fix.time, NaiveTime::from_hms_opt(12, 35, 19).unwrap());
        assert!((fix.latitude_deg - (48.0 + 7.038 / 60.0)).abs() < 1e-9);
        assert!((fix.longitude_deg - (11.0 + 31.0 / 60.0)).abs() < 1e-9);
        assert_eq!(fix.quality, 1);
        assert_eq!(fix.num_satellites, 8);
        assert_eq!(fix.hdop, 0.9);
        assert_eq!(fix.altitude_m, 545.4);
        assert!(fix.is_valid());

        // Southern/western hemispheres and a GN talker
        let s = with_checksum("GNGGA,000001.50,3351.000,S,15112.000,W,2,10,1.1,12.0,M,0.0,M,,");
        let fix: GpsFix = s.parse().unwrap();
        assert!((fix.latitude_deg + 33.85).abs() < 1e-9);
        assert!((fix.longitude_deg + 151.2).abs() < 1e-9);
        assert_eq!(fix.time, NaiveTime::from_hms_milli_opt(0, 0, 1, 500).unwrap());
    }

    #[test]
    fn test_reject_malformed() {
        // Bad checksum
        let body = "GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,";
        let s = format!("${}*{:02X}", body, nmea_checksum(body) ^ 0x01);
        assert!(matches!(
            s.parse::<GpsFix>(),
            Err(GpsParseError::ChecksumMismatch { .. })
        ));
        let s = format!("${}*ZZ", body);
        assert!(matches!(s.parse::<GpsFix>(), Err(GpsParseError::InvalidChecksum(_))));

        // Other sentence types
        let s = with_checksum("GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        assert!(matches!(s.parse::<GpsFix>(), Err(GpsParseError::NotGga(_))));

        // Missing position (receiver without a fix)
        let s = with_checksum("GPGGA,123519,,,,,0,00,,,M,,M,,");
        assert!(s.parse::<GpsFix>().is_err());

        // Truncated
        assert!("$GPGGA,123519,4807.038,N".parse::<GpsFix>().is_err());
        assert_eq!("GPGGA".parse::<GpsFix>(), Err(GpsParseError::NoStartDelimiter));
    }

    #[test]
    fn test_display_is_parseable() {
        let fix = GpsFix {
            time: NaiveTime::from_hms_milli_opt(9, 5, 3, 250).unwrap(),
            latitude_deg: 50.9345,
            longitude_deg: -1.3962,
            quality: 1,
            num_satellites: 9,
            hdop: 0.8,
            altitude_m: 24.5,
            geoid_sep_m: 47.1,
        };

        let parsed: GpsFix = fix.to_string().parse().unwrap();
        assert_eq!(parsed.time, fix.time);
        assert!((parsed.latitude_deg - fix.latitude_deg).abs() < 1e-5);
        assert!((parsed.longitude_deg - fix.longitude_deg).abs() < 1e-5);
        assert_eq!(parsed.num_satellites, 9);
    }
}
