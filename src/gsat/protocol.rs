//! # GSatMicro Protocol Constants and Types
//!
//! Core protocol definitions shared by the encoders and decoders.

use chrono::{DateTime, Utc};

use super::settings::Settings;

/// Firmware limit for a single mobile-terminated payload
pub const FIRMWARE_PAYLOAD_LIMIT: usize = 255;

/// Bytes added by the authentication wrap: marker(1) + hmac(10)
pub const WRAP_OVERHEAD: usize = 1 + HMAC_LEN;

/// Net bytes added by the encryption envelope:
/// marker(2) + nonce(7) + tag(8) - replaced auth marker(1)
pub const ENCRYPTION_OVERHEAD: usize = 2 + NONCE_LEN + TAG_LEN - 1;

/// Largest command (type byte included) that still fits once wrapped and encrypted
pub const MAX_COMMAND_LEN: usize = FIRMWARE_PAYLOAD_LIMIT - WRAP_OVERHEAD - ENCRYPTION_OVERHEAD;

/// Command header: type(1) + length(1)
pub const COMMAND_HEADER_LEN: usize = 2;

/// Largest text or raw-command body (226 bytes)
pub const MAX_BODY_LEN: usize = MAX_COMMAND_LEN - COMMAND_HEADER_LEN;

/// Truncated HMAC length (HMAC-SHA-256-80)
pub const HMAC_LEN: usize = 10;

/// AES-CCM nonce length
pub const NONCE_LEN: usize = 7;

/// AES-CCM authentication tag length (64 bits)
pub const TAG_LEN: usize = 8;

/// Leading byte of an authenticated command
pub const AUTH_MARKER: u8 = 0x00;

/// Leading byte of an encrypted payload
pub const ENCRYPTION_MARKER: u8 = 0xFF;

/// Mobile-terminated command type bytes
pub const MT_TYPE_RAW_COMMAND: u8 = 0;
pub const MT_TYPE_TEXT: u8 = 1;
pub const MT_TYPE_SETTINGS_UPDATE: u8 = 2;
pub const MT_TYPE_SETTINGS_REQUEST: u8 = 3;
pub const MT_TYPE_VERSION_REQUEST: u8 = 4;

/// Settings update subtype (single setting)
pub const SETTINGS_UPDATE_SUBTYPE: u8 = 6;

/// Mobile-originated report type bytes
pub const MO_TYPE_GSE: u8 = 0;
pub const MO_TYPE_TEXT: u8 = 1;
pub const MO_TYPE_SETTINGS: u8 = 2;
pub const MO_TYPE_SOFTWARE_VERSION: u8 = 3;
pub const MO_TYPE_TEN_BYTE_POSITION: u8 = 4;
pub const MO_TYPE_EIGHTEEN_BYTE_POSITION: u8 = 5;
pub const MO_TYPE_GSE_EXTENDED: u8 = 128;
pub const MO_TYPE_ENCRYPTED: u8 = 255;

/// Lua expression that makes a legacy device send its settings
pub const LEGACY_SETTINGS_REQUEST: &str = "cache.cache(cache.MO,gsattrack.encsettings())";

/// Protocol version reported by the device firmware
///
/// Versions below 2 talk over a plain-text channel with no envelope.
/// Version 2 and later use typed binary messages, HMAC and optional encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(pub u8);

impl ProtocolVersion {
    /// Version assumed when the device has not reported one
    pub const ASSUMED: ProtocolVersion = ProtocolVersion(6);

    /// First version with binary framing
    pub const FIRST_BINARY: ProtocolVersion = ProtocolVersion(2);

    /// Whether this version uses the typed binary envelope
    pub fn is_binary(self) -> bool {
        self >= Self::FIRST_BINARY
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::ASSUMED
    }
}

impl From<u8> for ProtocolVersion {
    fn from(value: u8) -> Self {
        ProtocolVersion(value)
    }
}

/// Device setting identifiers
///
/// Ids 13-15 are unused by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SettingId {
    /// GPS HDOP threshold, in tenths
    GpsHdop = 1,
    GpsTimeout = 2,
    IridiumTxTimeout = 3,
    IridiumSignalTimeout = 4,
    IridiumTxRetries = 5,
    SleepInterval = 6,
    SosSleepInterval = 7,
    SleepWhenPowered = 8,
    /// LED enable mask, see [`LedState`]
    LedMask = 9,
    KeepRadioAwake = 10,
    IncludeAltitude = 11,
    GpsSettle = 12,
    LowBatteryOff = 16,
    GpsHibernateSleep = 17,
    CacheReports = 18,
    MovingSleepInterval = 19,
    MovingThresholdSpeed = 20,
    RequireEncryptedMt = 21,
    GpsOnAlways = 22,
    SleepWithBattery = 23,
    IncludeSeconds = 24,
    /// Report format selector, see [`ReportFormat`]
    ReportFormat = 25,
}

impl SettingId {
    /// All settings, in id order
    pub const ALL: [SettingId; 22] = [
        SettingId::GpsHdop,
        SettingId::GpsTimeout,
        SettingId::IridiumTxTimeout,
        SettingId::IridiumSignalTimeout,
        SettingId::IridiumTxRetries,
        SettingId::SleepInterval,
        SettingId::SosSleepInterval,
        SettingId::SleepWhenPowered,
        SettingId::LedMask,
        SettingId::KeepRadioAwake,
        SettingId::IncludeAltitude,
        SettingId::GpsSettle,
        SettingId::LowBatteryOff,
        SettingId::GpsHibernateSleep,
        SettingId::CacheReports,
        SettingId::MovingSleepInterval,
        SettingId::MovingThresholdSpeed,
        SettingId::RequireEncryptedMt,
        SettingId::GpsOnAlways,
        SettingId::SleepWithBattery,
        SettingId::IncludeSeconds,
        SettingId::ReportFormat,
    ];

    /// Numeric id sent on the wire
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<SettingId> {
        Self::ALL.iter().copied().find(|setting| setting.id() == id)
    }

    /// Firmware key name
    pub fn name(self) -> &'static str {
        match self {
            SettingId::GpsHdop => "g_hdop",
            SettingId::GpsTimeout => "g_timeout",
            SettingId::IridiumTxTimeout => "i_tx_timeout",
            SettingId::IridiumSignalTimeout => "i_signal_timeout",
            SettingId::IridiumTxRetries => "i_tx_retries",
            SettingId::SleepInterval => "sleep",
            SettingId::SosSleepInterval => "sos_sleep",
            SettingId::SleepWhenPowered => "sleep_w_power",
            SettingId::LedMask => "led_mask",
            SettingId::KeepRadioAwake => "i_rx_always",
            SettingId::IncludeAltitude => "tx_altitude",
            SettingId::GpsSettle => "g_settle",
            SettingId::LowBatteryOff => "low_bat_off",
            SettingId::GpsHibernateSleep => "g_hibernate_sleep",
            SettingId::CacheReports => "cache_reports",
            SettingId::MovingSleepInterval => "moving_sleep",
            SettingId::MovingThresholdSpeed => "moving_thresh",
            SettingId::RequireEncryptedMt => "require_encrypted_mt",
            SettingId::GpsOnAlways => "g_on_always",
            SettingId::SleepWithBattery => "sleep_w_bat",
            SettingId::IncludeSeconds => "include_seconds",
            SettingId::ReportFormat => "report_format",
        }
    }
}

/// Convert an HDOP threshold to the tenths value the device expects
///
/// Halves round to even, as the device tooling does.
pub fn hdop_setting_value(hdop: f64) -> i32 {
    (hdop * 10.0).round_ties_even() as i32
}

/// LED enable flags, packed into bits 0-4 of the LED mask setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedState {
    pub gps: bool,
    pub message: bool,
    pub power: bool,
    pub satellite: bool,
    pub alarm: bool,
}

impl LedState {
    /// Pack into the LED mask (bit 0 = GPS)
    pub fn to_mask(self) -> i32 {
        [self.gps, self.message, self.power, self.satellite, self.alarm]
            .iter()
            .enumerate()
            .fold(0, |mask, (bit, &on)| if on { mask | (1 << bit) } else { mask })
    }

    /// Unpack from the LED mask; bits above 4 are ignored
    pub fn from_mask(mask: i32) -> Self {
        Self {
            gps: mask & 1 != 0,
            message: mask & (1 << 1) != 0,
            power: mask & (1 << 2) != 0,
            satellite: mask & (1 << 3) != 0,
            alarm: mask & (1 << 4) != 0,
        }
    }
}

/// Report format selected by the report format setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Legacy proprietary format, not decoded by this crate
    Gse,
    TenByte,
    EighteenByte,
}

impl ReportFormat {
    pub fn from_setting(value: i32) -> Option<ReportFormat> {
        match value {
            0 => Some(ReportFormat::Gse),
            1 => Some(ReportFormat::TenByte),
            2 => Some(ReportFormat::EighteenByte),
            _ => None,
        }
    }

    pub fn setting_value(self) -> i32 {
        match self {
            ReportFormat::Gse => 0,
            ReportFormat::TenByte => 1,
            ReportFormat::EighteenByte => 2,
        }
    }
}

/// Operator-originated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    /// Text message shown on the device
    Text { body: String },
    /// Raw Lua command executed by the firmware
    RawCommand { body: String },
    /// Ask the device to send its current settings
    SettingsRequest,
    /// Ask the device to send its software version
    VersionRequest,
    /// Change a single setting
    SettingUpdate { setting: SettingId, value: i32 },
}

impl OutboundCommand {
    /// Setting update for the LED mask
    pub fn led_mask(state: LedState) -> Self {
        OutboundCommand::SettingUpdate {
            setting: SettingId::LedMask,
            value: state.to_mask(),
        }
    }
}

/// Layout of a decoded position report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFormat {
    TenByte,
    EighteenByte,
}

/// Status flags carried by a position report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportFlags {
    pub on_external_power: bool,
    pub checkin: bool,
    pub distress: bool,
}

/// Normalized position fix
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    /// 3-bit magic number at the start of the report
    pub magic: u8,
    /// Degrees, negative south
    pub latitude: f64,
    /// Degrees, negative west
    pub longitude: f64,
    pub time: DateTime<Utc>,
    pub format: PositionFormat,
    /// Satellites used for the fix (18-byte only)
    pub satellites: Option<u8>,
    /// Meters
    pub altitude: f64,
    /// Kilometers per hour
    pub speed: f64,
    /// Degrees, 0-360
    pub course: f64,
    /// Estimated horizontal error in meters (18-byte only)
    pub accuracy: Option<f64>,
    /// Meters per second (18-byte only)
    pub climb_rate: Option<f64>,
    /// Zero when a 10-byte report has no extension byte
    pub battery_percent: f64,
    /// Absent when a 10-byte report has no extension byte
    pub flags: Option<ReportFlags>,
}

/// Free-text message sent from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub destination: String,
    pub body: String,
}

/// Decoded mobile-originated message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Text(TextMessage),
    Settings(Settings),
    Position(PositionReport),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limits() {
        assert_eq!(WRAP_OVERHEAD, 11);
        assert_eq!(ENCRYPTION_OVERHEAD, 16);
        assert_eq!(MAX_COMMAND_LEN, 228);
        assert_eq!(MAX_BODY_LEN, 226);
    }

    #[test]
    fn test_protocol_version_gates() {
        assert!(!ProtocolVersion(0).is_binary());
        assert!(!ProtocolVersion(1).is_binary());
        assert!(ProtocolVersion(2).is_binary());
        assert!(ProtocolVersion::default().is_binary());
        assert_eq!(ProtocolVersion::default().number(), 6);
    }

    #[test]
    fn test_led_mask_round_trip_all_combinations() {
        for mask in 0..32 {
            let state = LedState::from_mask(mask);
            assert_eq!(state.to_mask(), mask);
            assert_eq!(LedState::from_mask(state.to_mask()), state);
        }
    }

    #[test]
    fn test_led_mask_bit_positions() {
        let state = LedState {
            gps: true,
            message: false,
            power: true,
            satellite: true,
            alarm: true,
        };
        assert_eq!(state.to_mask(), 0b11101);
        assert!(LedState::from_mask(1).gps);
        assert!(LedState::from_mask(1 << 4).alarm);
        // Bits above 4 are not LEDs
        assert_eq!(LedState::from_mask(0xFF).to_mask(), 0x1F);
    }

    #[test]
    fn test_setting_ids() {
        assert_eq!(SettingId::GpsHdop.id(), 1);
        assert_eq!(SettingId::GpsSettle.id(), 12);
        assert_eq!(SettingId::LowBatteryOff.id(), 16);
        assert_eq!(SettingId::ReportFormat.id(), 25);
        for setting in SettingId::ALL {
            assert_eq!(SettingId::from_id(setting.id()), Some(setting));
        }
        assert_eq!(SettingId::from_id(13), None);
        assert_eq!(SettingId::from_id(26), None);
        assert_eq!(SettingId::SleepInterval.name(), "sleep");
    }

    #[test]
    fn test_hdop_setting_value() {
        assert_eq!(hdop_setting_value(2.5), 25);
        assert_eq!(hdop_setting_value(2.04), 20);
        assert_eq!(hdop_setting_value(0.0), 0);
    }

    #[test]
    fn test_hdop_setting_value_ties_to_even() {
        assert_eq!(hdop_setting_value(2.25), 22);
        assert_eq!(hdop_setting_value(0.25), 2);
    }

    #[test]
    fn test_report_format_values() {
        assert_eq!(ReportFormat::from_setting(1), Some(ReportFormat::TenByte));
        assert_eq!(ReportFormat::from_setting(2), Some(ReportFormat::EighteenByte));
        assert_eq!(ReportFormat::from_setting(7), None);
        assert_eq!(ReportFormat::Gse.setting_value(), 0);
    }
}
