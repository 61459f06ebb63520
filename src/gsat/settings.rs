//! # Settings Codec
//!
//! Decodes the settings dump a device sends (message type 2) and encodes
//! single-setting update commands.
//!
//! ## Settings dump layout
//!
//! All values are little-endian signed 32-bit integers.
//!
//! | Offset | Field                               | Present from length |
//! |--------|-------------------------------------|---------------------|
//! | 0      | protocol version (u8)               | always              |
//! | 1      | settings schema version (u8)        | always              |
//! | 2      | unused                              | always              |
//! | 6-50   | base settings 1-12                  | always (54 bytes)   |
//! | 54     | 16 reserved bytes                   | always              |
//! | 66     | low battery off                     | 70                  |
//! | 70     | GPS hibernate sleep                 | 74                  |
//! | 74     | cache reports                       | 78                  |
//! | 78     | moving sleep interval               | 82                  |
//! | 82     | moving threshold speed              | 86                  |
//! | 86     | require encrypted MT                | 90                  |
//! | 90     | GPS always on                       | 94                  |
//! | 94     | sleep with battery                  | 98                  |
//! | 98     | include seconds                     | 102                 |
//! | 102    | report format                       | 106                 |
//!
//! Fields past the end of a shorter dump are reported as absent. Older firmware
//! sends shorter dumps, newer firmware may send longer ones.

use tracing::debug;

use super::protocol::{
    hdop_setting_value, LedState, ProtocolVersion, ReportFormat, SettingId, MT_TYPE_SETTINGS_UPDATE,
    SETTINGS_UPDATE_SUBTYPE,
};
use crate::error::{GsatError, Layer, Result};

/// Shortest dump that carries every base setting
pub const SETTINGS_BASE_LEN: usize = 54;

/// Length of one encoded setting update
pub const SETTING_UPDATE_LEN: usize = 8;

/// HDOP is sent in tenths
const HDOP_SCALE: f64 = 10.0;

/// Snapshot of device settings
///
/// Settings added in later firmware are `None` when the dump is too short to
/// carry them.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub version: u8,
    pub settings_version: u8,

    pub gps_hdop: f64,
    pub gps_timeout: i32,
    pub iridium_tx_timeout: i32,
    pub iridium_signal_timeout: i32,
    pub iridium_tx_retries: i32,
    pub sleep_interval: i32,
    pub sos_sleep_interval: i32,
    pub sleep_when_powered: bool,
    pub led_mask: LedState,
    pub keep_radio_awake: bool,
    pub include_altitude: bool,
    pub gps_settle: i32,

    pub low_battery_off: Option<bool>,
    pub gps_hibernate_sleep: Option<bool>,
    pub cache_reports: Option<bool>,
    pub moving_sleep_interval: Option<i32>,
    pub moving_threshold_speed: Option<i32>,
    pub require_encrypted_mt: Option<bool>,
    pub gps_on_always: Option<bool>,
    pub sleep_with_battery: Option<bool>,
    pub include_seconds: Option<bool>,
    pub report_format: Option<i32>,
}

impl Settings {
    /// Value as it would be sent in an update command
    ///
    /// HDOP is returned in tenths, flags as 0/1 and LED state as its mask.
    pub fn raw_value(&self, setting: SettingId) -> Option<i32> {
        let flag = |on: bool| on as i32;
        match setting {
            SettingId::GpsHdop => Some(hdop_setting_value(self.gps_hdop)),
            SettingId::GpsTimeout => Some(self.gps_timeout),
            SettingId::IridiumTxTimeout => Some(self.iridium_tx_timeout),
            SettingId::IridiumSignalTimeout => Some(self.iridium_signal_timeout),
            SettingId::IridiumTxRetries => Some(self.iridium_tx_retries),
            SettingId::SleepInterval => Some(self.sleep_interval),
            SettingId::SosSleepInterval => Some(self.sos_sleep_interval),
            SettingId::SleepWhenPowered => Some(flag(self.sleep_when_powered)),
            SettingId::LedMask => Some(self.led_mask.to_mask()),
            SettingId::KeepRadioAwake => Some(flag(self.keep_radio_awake)),
            SettingId::IncludeAltitude => Some(flag(self.include_altitude)),
            SettingId::GpsSettle => Some(self.gps_settle),
            SettingId::LowBatteryOff => self.low_battery_off.map(flag),
            SettingId::GpsHibernateSleep => self.gps_hibernate_sleep.map(flag),
            SettingId::CacheReports => self.cache_reports.map(flag),
            SettingId::MovingSleepInterval => self.moving_sleep_interval,
            SettingId::MovingThresholdSpeed => self.moving_threshold_speed,
            SettingId::RequireEncryptedMt => self.require_encrypted_mt.map(flag),
            SettingId::GpsOnAlways => self.gps_on_always.map(flag),
            SettingId::SleepWithBattery => self.sleep_with_battery.map(flag),
            SettingId::IncludeSeconds => self.include_seconds.map(flag),
            SettingId::ReportFormat => self.report_format,
        }
    }

    /// Interpreted report format selector
    pub fn report_format(&self) -> Option<ReportFormat> {
        self.report_format.and_then(ReportFormat::from_setting)
    }
}

/// Reads little-endian i32 fields, gated by the dump length
struct FieldReader<'a> {
    payload: &'a [u8],
}

impl FieldReader<'_> {
    fn int(&self, offset: usize) -> Option<i32> {
        let bytes = self.payload.get(offset..offset + 4)?;
        Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn flag(&self, offset: usize) -> Option<bool> {
        self.int(offset).map(|value| value > 0)
    }
}

/// Decode a settings dump
///
/// # Arguments
///
/// * `payload` - Settings bytes without the message type byte
///
/// # Errors
///
/// Returns `TooShort` if the dump does not reach the end of the base settings
/// (54 bytes).
pub fn decode_settings(payload: &[u8]) -> Result<Settings> {
    if payload.len() < SETTINGS_BASE_LEN {
        return Err(GsatError::too_short(Layer::Codec, payload.len(), SETTINGS_BASE_LEN));
    }

    let fields = FieldReader { payload };
    let base = |offset: usize| {
        fields
            .int(offset)
            .ok_or_else(|| GsatError::too_short(Layer::Codec, payload.len(), offset + 4))
    };

    let settings = Settings {
        version: payload[0],
        settings_version: payload[1],

        gps_hdop: base(6)? as f64 / HDOP_SCALE,
        gps_timeout: base(10)?,
        iridium_tx_timeout: base(14)?,
        iridium_signal_timeout: base(18)?,
        iridium_tx_retries: base(22)?,
        sleep_interval: base(26)?,
        sos_sleep_interval: base(30)?,
        sleep_when_powered: base(34)? > 0,
        led_mask: LedState::from_mask(base(38)?),
        keep_radio_awake: base(42)? > 0,
        include_altitude: base(46)? > 0,
        gps_settle: base(50)?,

        low_battery_off: fields.flag(66),
        gps_hibernate_sleep: fields.flag(70),
        cache_reports: fields.flag(74),
        moving_sleep_interval: fields.int(78),
        moving_threshold_speed: fields.int(82),
        require_encrypted_mt: fields.flag(86),
        gps_on_always: fields.flag(90),
        sleep_with_battery: fields.flag(94),
        include_seconds: fields.flag(98),
        report_format: fields.int(102),
    };

    debug!(
        "Decoded settings v{} schema {} ({} bytes)",
        settings.version,
        settings.settings_version,
        payload.len()
    );

    Ok(settings)
}

/// Encode a single-setting update command
///
/// Layout: type(2), subtype(6), setting id (u16 LE), value (i32 LE).
/// Protocol versions below 2 have no settings command and get an empty payload.
pub fn encode_setting_update(setting: SettingId, value: i32, version: ProtocolVersion) -> Vec<u8> {
    if !version.is_binary() {
        return Vec::new();
    }

    let mut msg = Vec::with_capacity(SETTING_UPDATE_LEN);
    msg.push(MT_TYPE_SETTINGS_UPDATE);
    msg.push(SETTINGS_UPDATE_SUBTYPE);
    msg.extend_from_slice(&setting.id().to_le_bytes());
    msg.extend_from_slice(&value.to_le_bytes());
    msg
}
