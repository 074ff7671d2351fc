//! Status codes and data quality.
//!
//! Every value read from a device comes with a 32-bit status code. The top
//! two bits carry the severity (`00` good, `01` uncertain, `10` bad); the
//! rest identifies the condition. Codes are passed through untouched so the
//! exact device answer reaches the output.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse quality derived from a status code severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Good,
    Uncertain,
    Bad,
}

/// Raw device status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u32);

/// Well-known codes, used for readable output when no protocol code table
/// is compiled in.
const KNOWN_CODES: &[(u32, &str)] = &[
    (0x0000_0000, "Good"),
    (0x0030_0000, "GoodClamped"),
    (0x8001_0000, "BadUnexpectedError"),
    (0x8002_0000, "BadInternalError"),
    (0x8003_0000, "BadOutOfMemory"),
    (0x8004_0000, "BadResourceUnavailable"),
    (0x8005_0000, "BadCommunicationError"),
    (0x800A_0000, "BadTimeout"),
    (0x800B_0000, "BadServiceUnsupported"),
    (0x800C_0000, "BadShutdown"),
    (0x800D_0000, "BadServerNotConnected"),
    (0x800F_0000, "BadNothingToDo"),
    (0x8010_0000, "BadTooManyOperations"),
    (0x801F_0000, "BadUserAccessDenied"),
    (0x8025_0000, "BadSessionIdInvalid"),
    (0x8026_0000, "BadSessionClosed"),
    (0x802B_0000, "BadTimestampsToReturnInvalid"),
    (0x8031_0000, "BadNoCommunication"),
    (0x8032_0000, "BadWaitingForInitialData"),
    (0x8033_0000, "BadNodeIdInvalid"),
    (0x8034_0000, "BadNodeIdUnknown"),
    (0x8035_0000, "BadAttributeIdInvalid"),
    (0x8036_0000, "BadIndexRangeInvalid"),
    (0x8037_0000, "BadIndexRangeNoData"),
    (0x8038_0000, "BadDataEncodingInvalid"),
    (0x803A_0000, "BadNotReadable"),
    (0x803B_0000, "BadNotWritable"),
    (0x803C_0000, "BadOutOfRange"),
    (0x803D_0000, "BadNotSupported"),
    (0x8040_0000, "BadNotImplemented"),
    (0x8070_0000, "BadMaxAgeInvalid"),
    (0x8074_0000, "BadTypeMismatch"),
    (0x8086_0000, "BadSecureChannelClosed"),
    (0x8089_0000, "BadConfigurationError"),
    (0x808A_0000, "BadNotConnected"),
    (0x808B_0000, "BadDeviceFailure"),
    (0x808C_0000, "BadSensorFailure"),
    (0x808D_0000, "BadOutOfService"),
    (0x80AE_0000, "BadConnectionClosed"),
    (0x408F_0000, "UncertainNoCommunicationLastUsableValue"),
    (0x4090_0000, "UncertainLastUsableValue"),
    (0x4091_0000, "UncertainSubstituteValue"),
    (0x4092_0000, "UncertainInitialValue"),
    (0x4093_0000, "UncertainSensorNotAccurate"),
    (0x4094_0000, "UncertainEngineeringUnitsExceeded"),
];

impl StatusCode {
    /// The `Good` code.
    pub const GOOD: Self = Self(0);
    /// `BadNodeIdUnknown`.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    /// `BadTimeout`.
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    /// `UncertainLastUsableValue`.
    pub const UNCERTAIN_LAST_USABLE_VALUE: Self = Self(0x4090_0000);

    /// Wrap raw bits.
    #[inline]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Severity of the code.
    pub const fn quality(&self) -> Quality {
        match self.0 >> 30 {
            0 => Quality::Good,
            1 => Quality::Uncertain,
            _ => Quality::Bad,
        }
    }

    /// Good severity (sub-codes and info bits allowed).
    #[inline]
    pub const fn is_good(&self) -> bool {
        matches!(self.quality(), Quality::Good)
    }

    /// Symbolic name of the condition (info bits ignored).
    ///
    /// Uses the OPC UA code table when the `opcua` feature is enabled and
    /// falls back to a built-in list of common codes.
    pub fn condition_name(&self) -> Option<Cow<'static, str>> {
        #[cfg(feature = "opcua")]
        if let Some(name) = crate::protocols::opcua::condition_name(self.0) {
            return Some(Cow::Owned(name));
        }
        self.name().map(Cow::Borrowed)
    }

    /// Symbolic name from the built-in list of common codes.
    pub fn name(&self) -> Option<&'static str> {
        // Info bits in the low word do not change the condition.
        let condition = self.0 & 0xFFFF_0000;
        KNOWN_CODES
            .iter()
            .find(|(bits, _)| *bits == condition)
            .map(|(_, name)| *name)
    }
}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.condition_name(), self.0 & 0x0000_FFFF) {
            (Some(name), 0) => f.write_str(&name),
            (Some(name), _) => write!(f, "{} (0x{:08X})", name, self.0),
            (None, _) => {
                let severity = match self.quality() {
                    Quality::Good => "Good",
                    Quality::Uncertain => "Uncertain",
                    Quality::Bad => "Bad",
                };
                write!(f, "{} (0x{:08X})", severity, self.0)
            }
        }
    }
}
