//! Core value types shared by every component of the proxy.
//!
//! Numeric codes follow the radio interface numbering so that dumps and logs
//! line up with the remote endpoint's own diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::RadioError;

/// Outcome delivered to a caller's result target.
pub type CommandResult = Result<Payload, RadioError>;

/// Identifier correlating a submitted command to its eventual reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Serial(pub i32);

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation counter for the live remote-endpoint handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Epoch(pub u64);

impl Epoch {
    /// The epoch that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attribution tag identifying which caller is blamed for wakelock hold time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkSource {
    /// Calling process uid
    pub uid: u32,
    /// Calling package name
    pub package: String,
}

impl WorkSource {
    pub fn new(uid: u32, package: impl Into<String>) -> Self {
        Self {
            uid,
            package: package.into(),
        }
    }
}

impl Default for WorkSource {
    fn default() -> Self {
        Self::new(1001, "com.android.phone")
    }
}

impl fmt::Display for WorkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.package)
    }
}

/// Which wakelock a unit of accounting belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakelockKind {
    None,
    Request,
    Ack,
}

impl WakelockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakelockKind::None => "none",
            WakelockKind::Request => "request",
            WakelockKind::Ack => "ack",
        }
    }
}

impl fmt::Display for WakelockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of transmit power levels reported in a modem activity record.
pub const TX_POWER_LEVELS: usize = 5;

/// Fields in a modem activity record: timestamp, sleep, idle, tx levels, rx.
pub const ACTIVITY_INFO_FIELDS: usize = 3 + TX_POWER_LEVELS + 1;

/// Fields in a link capacity estimate: capacity kbps, confidence, suspended.
pub const LCE_DATA_FIELDS: usize = 3;

/// Radio commands understood by the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    GetSimStatus,
    GetCurrentCalls,
    Dial,
    GetImsi,
    Hangup,
    SignalStrength,
    VoiceRegistrationState,
    DataRegistrationState,
    Operator,
    RadioPower,
    SendSms,
    SetupDataCall,
    GetImei,
    DeactivateDataCall,
    QueryNetworkSelectionMode,
    SetNetworkSelectionAutomatic,
    DeviceIdentity,
    GetCellInfoList,
    GetHardwareConfig,
    GetRadioCapability,
    StartLce,
    #[serde(rename = "PULL_LCEDATA")]
    PullLceData,
    GetActivityInfo,
}

impl RequestKind {
    /// Every request kind, in wire-code order.
    pub const ALL: [RequestKind; 23] = [
        RequestKind::GetSimStatus,
        RequestKind::GetCurrentCalls,
        RequestKind::Dial,
        RequestKind::GetImsi,
        RequestKind::Hangup,
        RequestKind::SignalStrength,
        RequestKind::VoiceRegistrationState,
        RequestKind::DataRegistrationState,
        RequestKind::Operator,
        RequestKind::RadioPower,
        RequestKind::SendSms,
        RequestKind::SetupDataCall,
        RequestKind::GetImei,
        RequestKind::DeactivateDataCall,
        RequestKind::QueryNetworkSelectionMode,
        RequestKind::SetNetworkSelectionAutomatic,
        RequestKind::DeviceIdentity,
        RequestKind::GetCellInfoList,
        RequestKind::GetHardwareConfig,
        RequestKind::GetRadioCapability,
        RequestKind::StartLce,
        RequestKind::PullLceData,
        RequestKind::GetActivityInfo,
    ];

    /// Wire code of the command.
    pub fn code(&self) -> u32 {
        match self {
            RequestKind::GetSimStatus => 1,
            RequestKind::GetCurrentCalls => 9,
            RequestKind::Dial => 10,
            RequestKind::GetImsi => 11,
            RequestKind::Hangup => 12,
            RequestKind::SignalStrength => 19,
            RequestKind::VoiceRegistrationState => 20,
            RequestKind::DataRegistrationState => 21,
            RequestKind::Operator => 22,
            RequestKind::RadioPower => 23,
            RequestKind::SendSms => 25,
            RequestKind::SetupDataCall => 27,
            RequestKind::GetImei => 38,
            RequestKind::DeactivateDataCall => 41,
            RequestKind::QueryNetworkSelectionMode => 45,
            RequestKind::SetNetworkSelectionAutomatic => 46,
            RequestKind::DeviceIdentity => 98,
            RequestKind::GetCellInfoList => 109,
            RequestKind::GetHardwareConfig => 124,
            RequestKind::GetRadioCapability => 130,
            RequestKind::StartLce => 132,
            RequestKind::PullLceData => 134,
            RequestKind::GetActivityInfo => 135,
        }
    }

    /// Canonical command name.
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::GetSimStatus => "GET_SIM_STATUS",
            RequestKind::GetCurrentCalls => "GET_CURRENT_CALLS",
            RequestKind::Dial => "DIAL",
            RequestKind::GetImsi => "GET_IMSI",
            RequestKind::Hangup => "HANGUP",
            RequestKind::SignalStrength => "SIGNAL_STRENGTH",
            RequestKind::VoiceRegistrationState => "VOICE_REGISTRATION_STATE",
            RequestKind::DataRegistrationState => "DATA_REGISTRATION_STATE",
            RequestKind::Operator => "OPERATOR",
            RequestKind::RadioPower => "RADIO_POWER",
            RequestKind::SendSms => "SEND_SMS",
            RequestKind::SetupDataCall => "SETUP_DATA_CALL",
            RequestKind::GetImei => "GET_IMEI",
            RequestKind::DeactivateDataCall => "DEACTIVATE_DATA_CALL",
            RequestKind::QueryNetworkSelectionMode => "QUERY_NETWORK_SELECTION_MODE",
            RequestKind::SetNetworkSelectionAutomatic => "SET_NETWORK_SELECTION_AUTOMATIC",
            RequestKind::DeviceIdentity => "DEVICE_IDENTITY",
            RequestKind::GetCellInfoList => "GET_CELL_INFO_LIST",
            RequestKind::GetHardwareConfig => "GET_HARDWARE_CONFIG",
            RequestKind::GetRadioCapability => "GET_RADIO_CAPABILITY",
            RequestKind::StartLce => "START_LCE",
            RequestKind::PullLceData => "PULL_LCEDATA",
            RequestKind::GetActivityInfo => "GET_ACTIVITY_INFO",
        }
    }

    /// Look up a kind by its wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.code() == code)
    }

    /// Neutral payload delivered when a bounded-wait request times out.
    ///
    /// Only kinds whose callers block on the result define one.
    pub fn neutral_default(&self) -> Option<Payload> {
        match self {
            RequestKind::GetActivityInfo => Some(Payload::Ints(vec![0; ACTIVITY_INFO_FIELDS])),
            RequestKind::PullLceData => Some(Payload::Ints(vec![0; LCE_DATA_FIELDS])),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server-initiated events not tied to any caller request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicationKind {
    RadioStateChanged,
    CallStateChanged,
    VoiceNetworkStateChanged,
    NewSms,
    NitzTimeReceived,
    SignalStrength,
    DataCallListChanged,
    CallRing,
    SimStatusChanged,
    RilConnected,
    CellInfoList,
    LceData,
    ModemRestart,
}

impl IndicationKind {
    pub fn code(&self) -> u32 {
        match self {
            IndicationKind::RadioStateChanged => 1000,
            IndicationKind::CallStateChanged => 1001,
            IndicationKind::VoiceNetworkStateChanged => 1002,
            IndicationKind::NewSms => 1003,
            IndicationKind::NitzTimeReceived => 1008,
            IndicationKind::SignalStrength => 1009,
            IndicationKind::DataCallListChanged => 1010,
            IndicationKind::CallRing => 1018,
            IndicationKind::SimStatusChanged => 1019,
            IndicationKind::RilConnected => 1034,
            IndicationKind::CellInfoList => 1036,
            IndicationKind::LceData => 1045,
            IndicationKind::ModemRestart => 1047,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndicationKind::RadioStateChanged => "UNSOL_RADIO_STATE_CHANGED",
            IndicationKind::CallStateChanged => "UNSOL_CALL_STATE_CHANGED",
            IndicationKind::VoiceNetworkStateChanged => "UNSOL_VOICE_NETWORK_STATE_CHANGED",
            IndicationKind::NewSms => "UNSOL_NEW_SMS",
            IndicationKind::NitzTimeReceived => "UNSOL_NITZ_TIME_RECEIVED",
            IndicationKind::SignalStrength => "UNSOL_SIGNAL_STRENGTH",
            IndicationKind::DataCallListChanged => "UNSOL_DATA_CALL_LIST_CHANGED",
            IndicationKind::CallRing => "UNSOL_CALL_RING",
            IndicationKind::SimStatusChanged => "UNSOL_SIM_STATUS_CHANGED",
            IndicationKind::RilConnected => "UNSOL_RIL_CONNECTED",
            IndicationKind::CellInfoList => "UNSOL_CELL_INFO_LIST",
            IndicationKind::LceData => "UNSOL_LCE_DATA",
            IndicationKind::ModemRestart => "UNSOL_MODEM_RESTART",
        }
    }
}

impl fmt::Display for IndicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque reply or command body. Decoding specific records happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    None,
    Ints(Vec<i32>),
    Strings(Vec<String>),
    Raw(Vec<u8>),
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }
}

/// An unsolicited event as handed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indication {
    pub kind: IndicationKind,
    pub payload: Payload,
}
