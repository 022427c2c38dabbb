//! Averaged inertial-sensor sample decoding.
//!
//! The controller answers a sample request with one comma-separated ASCII
//! record. Fields 2 through 7 are big-endian IEEE-754 singles rendered as
//! hex text behind a two-character tag; field 8 carries the sensor head's
//! communication error count the same way. Fewer than 9 fields means the
//! averaging window had nothing in it.

use thiserror::Error;

/// Minimum fields in a usable sample record.
const MIN_FIELDS: usize = 9;

/// Characters of field tag before the payload.
const TAG_LEN: usize = 2;

/// Hex digits in a full float payload. Shorter payloads are left-padded;
/// leading zero bytes get eaten somewhere in the controller's printf.
const HEX_DIGITS: usize = 8;

/// One averaged attitude sample from the mount's inertial sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub azimuth_deg: f32,
    pub altitude_deg: f32,
    pub yaw_deg: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    /// Transfer errors the sensor head has counted since power-up.
    pub comm_errors: u32,
}

/// Reasons a sample record is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Under 9 fields: the sensor had no valid sample to report.
    #[error("sample record has {got} fields, need {MIN_FIELDS}")]
    TooFewFields { got: usize },

    #[error("field {index} ({text:?}) is not a hex-coded float")]
    BadHexFloat { index: usize, text: String },

    #[error("error-count field {text:?} is not an integer")]
    BadErrorCount { text: String },
}

/// Decode one comma-separated sample record.
pub fn parse_sample(record: &str) -> Result<ImuSample, FrameError> {
    let fields: Vec<&str> = record.split(',').collect();
    if fields.len() < MIN_FIELDS {
        return Err(FrameError::TooFewFields { got: fields.len() });
    }
    Ok(ImuSample {
        azimuth_deg: hex_float(fields[2], 2)?,
        altitude_deg: hex_float(fields[3], 3)?,
        yaw_deg: hex_float(fields[4], 4)?,
        accel_x: hex_float(fields[5], 5)?,
        accel_y: hex_float(fields[6], 6)?,
        accel_z: hex_float(fields[7], 7)?,
        comm_errors: error_count(fields[8])?,
    })
}

/// Strip the tag, normalize to 8 hex digits, reinterpret as an f32.
fn hex_float(field: &str, index: usize) -> Result<f32, FrameError> {
    let bad = |field: &str| FrameError::BadHexFloat {
        index,
        text: field.to_string(),
    };
    // A field shorter than its tag decodes as zero, same as an empty payload.
    let body = field.get(TAG_LEN..).unwrap_or("");
    let body = body.trim().trim_start_matches("0x");
    if body.len() > HEX_DIGITS {
        return Err(bad(field));
    }
    let bits = u32::from_str_radix(&format!("{body:0>8}"), 16).map_err(|_| bad(field))?;
    Ok(f32::from_bits(bits))
}

fn error_count(field: &str) -> Result<u32, FrameError> {
    field
        .get(TAG_LEN..)
        .unwrap_or("")
        .trim()
        .parse()
        .map_err(|_| FrameError::BadErrorCount {
            text: field.to_string(),
        })
}
