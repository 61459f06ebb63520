//! # Position Report Decoder
//!
//! Decodes the two binary position formats sent by the device.
//!
//! ## Ten-byte format (type 4)
//!
//! | Bits    | Width | Field                                     |
//! |---------|-------|-------------------------------------------|
//! | 0       | 3     | magic                                     |
//! | 3       | 23    | longitude, `raw / 23301 - 180`            |
//! | 26      | 6     | course, `raw * 5` degrees                 |
//! | 32      | 10    | 2-minute intervals since midnight UTC     |
//! | 42      | 22    | latitude, `raw / 23301 - 90`              |
//! | 64      | 6     | speed, km/h                               |
//! | 70      | 10    | altitude, `raw * 5` meters                |
//! | 80      | 5     | battery, `raw * 3` percent (byte 11)      |
//! | 85..87  | 1 each| external power, checkin, distress (byte 11)|
//!
//! ## Eighteen-byte format (type 5)
//!
//! | Bits    | Width | Field                                     |
//! |---------|-------|-------------------------------------------|
//! | 0       | 3     | magic                                     |
//! | 3       | 26    | longitude, `raw / 186413 - 180`           |
//! | 29..31  | 1 each| external power, distress, checkin         |
//! | 32      | 29    | seconds since 2015-01-01T00:00:00Z        |
//! | 61      | 3     | satellites                                |
//! | 64      | 25    | latitude, `raw / 186413 - 90`             |
//! | 89      | 6     | course, `raw * 5` degrees                 |
//! | 95      | 6     | accuracy, meters                          |
//! | 101     | 11    | climb rate                                |
//! | 112     | 5     | battery, `raw * 3` percent                |
//! | 117     | 11    | speed, km/h                               |
//! | 128     | 16    | altitude, meters                          |

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tracing::debug;

use super::bits::{extract_bits, extract_flag};
use super::protocol::{PositionFormat, PositionReport, ReportFlags};
use crate::error::{GsatError, Layer, Result};

/// Minimum ten-byte report length
pub const TEN_BYTE_MIN_LEN: usize = 10;

/// Ten-byte report length including the battery/flags extension byte
pub const TEN_BYTE_EXTENDED_LEN: usize = 11;

/// Minimum eighteen-byte report length
pub const EIGHTEEN_BYTE_MIN_LEN: usize = 18;

/// Raw units per degree in the ten-byte format
const TEN_BYTE_DEGREE_SCALE: f64 = 23301.0;

/// Raw units per degree in the eighteen-byte format
const EIGHTEEN_BYTE_DEGREE_SCALE: f64 = 186413.0;

/// Course and altitude step in the ten-byte format
const FIVE_UNIT_STEP: u32 = 5;

/// Battery step, both formats
const BATTERY_STEP: u32 = 3;

/// Eighteen-byte epoch, 2015-01-01T00:00:00Z, as Unix seconds
pub const EIGHTEEN_BYTE_EPOCH_UNIX: i64 = 1_420_070_400;

/// Offset subtracted from the raw climb rate before scaling.
///
/// Device firmware documents this as `2^10`; deployed decoders evaluate it as
/// XOR, which is 8. Kept at 8 until device output shows otherwise.
pub const CLIMB_RATE_OFFSET: i32 = 8;

/// Raw climb rate units per m/s
const CLIMB_RATE_DIVISOR: i32 = 20;

/// Largest gap allowed between a ten-byte fix and its reference time
const TIME_ROLLOVER_WINDOW_HOURS: i64 = 12;

/// Start of the eighteen-byte time field
pub fn eighteen_byte_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(EIGHTEEN_BYTE_EPOCH_UNIX)
}

/// Decode a ten-byte position report
///
/// # Arguments
///
/// * `payload` - Report bytes without the message type byte (at least 10)
/// * `reference` - Time the report was received; defaults to now
///
/// The report only carries a time of day. The fix time is placed on the
/// reference date, then moved back one day if that lands more than 12 hours
/// away from the reference, which covers reports sent just before midnight and
/// received just after it.
///
/// # Errors
///
/// Returns `TooShort` if the payload is under 10 bytes.
pub fn decode_ten_byte(payload: &[u8], reference: Option<DateTime<Utc>>) -> Result<PositionReport> {
    if payload.len() < TEN_BYTE_MIN_LEN {
        return Err(GsatError::too_short(Layer::Codec, payload.len(), TEN_BYTE_MIN_LEN));
    }
    let reference = reference.unwrap_or_else(Utc::now);

    let magic = extract_bits(0, 3, payload)? as u8;
    let longitude = extract_bits(3, 23, payload)? as f64 / TEN_BYTE_DEGREE_SCALE - 180.0;
    let course = extract_bits(26, 6, payload)? * FIVE_UNIT_STEP;
    let intervals = extract_bits(32, 10, payload)?;
    let latitude = extract_bits(42, 22, payload)? as f64 / TEN_BYTE_DEGREE_SCALE - 90.0;
    let speed = extract_bits(64, 6, payload)?;
    let altitude = extract_bits(70, 10, payload)? * FIVE_UNIT_STEP;

    let time = ten_byte_time(intervals, reference);

    let (battery_percent, flags) = if payload.len() >= TEN_BYTE_EXTENDED_LEN {
        let battery = extract_bits(80, 5, payload)? * BATTERY_STEP;
        let flags = ReportFlags {
            on_external_power: extract_flag(85, payload)?,
            checkin: extract_flag(86, payload)?,
            distress: extract_flag(87, payload)?,
        };
        (battery as f64, Some(flags))
    } else {
        (0.0, None)
    };

    debug!("Decoded 10-byte position ({} bytes) at {}", payload.len(), time);

    Ok(PositionReport {
        magic,
        latitude,
        longitude,
        time,
        format: PositionFormat::TenByte,
        satellites: None,
        altitude: altitude as f64,
        speed: speed as f64,
        course: course as f64,
        accuracy: None,
        climb_rate: None,
        battery_percent,
        flags,
    })
}

/// Rebuild a full timestamp from a count of 2-minute intervals since midnight
fn ten_byte_time(intervals: u32, reference: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = Utc.from_utc_datetime(&reference.date_naive().and_time(NaiveTime::MIN));
    let time = midnight + Duration::minutes(2 * intervals as i64);

    let window = Duration::hours(TIME_ROLLOVER_WINDOW_HOURS);
    let delta = time - reference;
    if delta > window || delta < -window {
        time - Duration::days(1)
    } else {
        time
    }
}

/// Decode an eighteen-byte position report
///
/// # Arguments
///
/// * `payload` - Report bytes without the message type byte (at least 18)
///
/// # Errors
///
/// Returns `TooShort` if the payload is under 18 bytes.
pub fn decode_eighteen_byte(payload: &[u8]) -> Result<PositionReport> {
    if payload.len() < EIGHTEEN_BYTE_MIN_LEN {
        return Err(GsatError::too_short(Layer::Codec, payload.len(), EIGHTEEN_BYTE_MIN_LEN));
    }

    let magic = extract_bits(0, 3, payload)? as u8;
    let longitude = extract_bits(3, 26, payload)? as f64 / EIGHTEEN_BYTE_DEGREE_SCALE - 180.0;
    let flags = ReportFlags {
        on_external_power: extract_flag(29, payload)?,
        distress: extract_flag(30, payload)?,
        checkin: extract_flag(31, payload)?,
    };
    let seconds = extract_bits(32, 29, payload)?;
    let satellites = extract_bits(61, 3, payload)? as u8;
    let latitude = extract_bits(64, 25, payload)? as f64 / EIGHTEEN_BYTE_DEGREE_SCALE - 90.0;
    let course = extract_bits(89, 6, payload)? * FIVE_UNIT_STEP;
    let accuracy = extract_bits(95, 6, payload)?;
    let climb_raw = extract_bits(101, 11, payload)? as i32;
    let battery = extract_bits(112, 5, payload)? * BATTERY_STEP;
    let speed = extract_bits(117, 11, payload)?;
    let altitude = extract_bits(128, 16, payload)?;

    let time = eighteen_byte_epoch() + Duration::seconds(seconds as i64);

    // Integer division, truncating toward zero, matches deployed decoders
    let climb_rate = (climb_raw - CLIMB_RATE_OFFSET) / CLIMB_RATE_DIVISOR;

    debug!("Decoded 18-byte position ({} bytes) at {}", payload.len(), time);

    Ok(PositionReport {
        magic,
        latitude,
        longitude,
        time,
        format: PositionFormat::EighteenByte,
        satellites: Some(satellites),
        altitude: altitude as f64,
        speed: speed as f64,
        course: course as f64,
        accuracy: Some(accuracy as f64),
        climb_rate: Some(climb_rate as f64),
        battery_percent: battery as f64,
        flags: Some(flags),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_BYTE_SAMPLE: [u8; 10] = [0x08, 0xE6, 0x92, 0x63, 0x6D, 0x1F, 0x3C, 0x5D, 0x00, 0x07];

    const EIGHTEEN_BYTE_SAMPLE: [u8; 18] = [
        0x08, 0xE6, 0xA1, 0xD0, 0x0C, 0x1C, 0x0E, 0xE7, 0x7C, 0xF2, 0x51, 0x30, 0x38, 0x00, 0xD0,
        0x00, 0x00, 0x0E,
    ];

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_decode_ten_byte_sample() {
        let reference = utc(2015, 10, 21, 12, 20, 0);
        let report = decode_ten_byte(&TEN_BYTE_SAMPLE, Some(reference)).unwrap();

        assert_eq!(report.format, PositionFormat::TenByte);
        assert_eq!(report.magic, 0);
        assert_eq!(report.longitude, 2_333_257.0 / 23301.0 - 180.0);
        assert_eq!(report.latitude, 2_047_069.0 / 23301.0 - 90.0);
        assert!((report.longitude - -79.864512).abs() < 1e-6);
        assert!((report.latitude - -2.146732).abs() < 1e-6);
        assert_eq!(report.course, 175.0);
        assert_eq!(report.speed, 0.0);
        assert_eq!(report.altitude, 35.0);
        assert_eq!(report.time, utc(2015, 10, 21, 14, 32, 0));
        assert_eq!(report.satellites, None);
        assert_eq!(report.accuracy, None);
        assert_eq!(report.climb_rate, None);
        assert_eq!(report.battery_percent, 0.0);
        assert_eq!(report.flags, None);
    }

    #[test]
    fn test_decode_ten_byte_extension() {
        let mut payload = TEN_BYTE_SAMPLE.to_vec();
        // battery 20 * 3 = 60%, external power and distress set
        payload.push(0b10100_101);
        let report = decode_ten_byte(&payload, Some(utc(2015, 10, 21, 12, 20, 0))).unwrap();

        assert_eq!(report.battery_percent, 60.0);
        assert_eq!(
            report.flags,
            Some(ReportFlags {
                on_external_power: true,
                checkin: false,
                distress: true,
            })
        );
    }

    #[test]
    fn test_decode_ten_byte_midnight_rollover() {
        // 23:58 fix received at 00:10 the next day
        let mut payload = [0u8; 10];
        let intervals: u16 = 719;
        payload[4] = (intervals >> 2) as u8;
        payload[5] = ((intervals & 0b11) << 6) as u8;

        let reference = utc(2020, 3, 2, 0, 10, 0);
        let report = decode_ten_byte(&payload, Some(reference)).unwrap();
        assert_eq!(report.time, utc(2020, 3, 1, 23, 58, 0));
    }

    #[test]
    fn test_decode_ten_byte_same_day_within_window() {
        let mut payload = [0u8; 10];
        // 30 intervals = 01:00
        payload[4] = (30u16 >> 2) as u8;
        payload[5] = ((30u16 & 0b11) << 6) as u8;

        let reference = utc(2020, 3, 2, 12, 59, 0);
        let report = decode_ten_byte(&payload, Some(reference)).unwrap();
        assert_eq!(report.time, utc(2020, 3, 2, 1, 0, 0));
    }

    #[test]
    fn test_decode_ten_byte_default_reference_is_recent() {
        let report = decode_ten_byte(&TEN_BYTE_SAMPLE, None).unwrap();
        let age = Utc::now() - report.time;
        assert!(age < Duration::hours(37) && age > -Duration::hours(13));
    }

    #[test]
    fn test_decode_ten_byte_too_short() {
        let result = decode_ten_byte(&TEN_BYTE_SAMPLE[..9], None);
        assert!(matches!(
            result,
            Err(GsatError::TooShort { layer: Layer::Codec, actual: 9, minimum: 10 })
        ));
    }

    #[test]
    fn test_decode_eighteen_byte_sample() {
        let report = decode_eighteen_byte(&EIGHTEEN_BYTE_SAMPLE).unwrap();

        assert_eq!(report.format, PositionFormat::EighteenByte);
        assert_eq!(report.magic, 0);
        assert_eq!(report.longitude, 18_666_554.0 / 186413.0 - 180.0);
        assert_eq!(report.latitude, 16_376_994.0 / 186413.0 - 90.0);
        assert_eq!(report.time, utc(2015, 10, 21, 22, 21, 16));
        assert_eq!(report.satellites, Some(7));
        assert_eq!(report.course, 120.0);
        assert_eq!(report.course % 5.0, 0.0);
        assert_eq!(report.accuracy, Some(7.0));
        assert_eq!(report.climb_rate, Some(0.0));
        assert_eq!(report.battery_percent, 78.0);
        assert_eq!(report.speed, 0.0);
        assert_eq!(report.altitude, 14.0);
        assert_eq!(report.flags, Some(ReportFlags::default()));
    }

    #[test]
    fn test_decode_eighteen_byte_flags() {
        let mut payload = EIGHTEEN_BYTE_SAMPLE;
        // bits 29, 30, 31 = external power, distress, checkin
        payload[3] |= 0b0000_0101;
        let report = decode_eighteen_byte(&payload).unwrap();
        assert_eq!(
            report.flags,
            Some(ReportFlags {
                on_external_power: true,
                checkin: true,
                distress: false,
            })
        );
    }

    #[test]
    fn test_decode_eighteen_byte_climb_rate() {
        let mut payload = [0u8; 18];
        // raw climb rate 1024 at bits 101..112 (byte 12 bits 5-7, byte 13)
        let raw: u16 = 1024;
        payload[12] = (raw >> 8) as u8 & 0b111;
        payload[13] = raw as u8;
        let report = decode_eighteen_byte(&payload).unwrap();
        assert_eq!(report.climb_rate, Some(((1024 - 8) / 20) as f64));
        assert_eq!(report.climb_rate, Some(50.0));
    }

    #[test]
    fn test_decode_eighteen_byte_epoch() {
        let report = decode_eighteen_byte(&[0u8; 18]).unwrap();
        assert_eq!(report.time, utc(2015, 1, 1, 0, 0, 0));
        assert_eq!(report.longitude, -180.0);
        assert_eq!(report.latitude, -90.0);
    }

    #[test]
    fn test_decode_eighteen_byte_too_short() {
        let result = decode_eighteen_byte(&EIGHTEEN_BYTE_SAMPLE[..17]);
        assert!(matches!(result, Err(GsatError::TooShort { minimum: 18, .. })));
    }

    #[test]
    fn test_decode_eighteen_byte_ignores_trailing_bytes() {
        let mut payload = EIGHTEEN_BYTE_SAMPLE.to_vec();
        payload.extend_from_slice(&[0xFF, 0xFF]);
        let report = decode_eighteen_byte(&payload).unwrap();
        assert_eq!(report.altitude, 14.0);
    }
}
