//! # Register Map
//!
//! Page and register offsets exported by the RCIO firmware, plus the bit
//! layout of the status words the trackers decode. Numeric values are fixed
//! by the firmware.

/// Page of dynamic statuses (flags, alarms, board identity)
pub const PAGE_STATUS: u8 = 1;
/// Array of raw RC input values, in microseconds
pub const PAGE_RAW_RC_INPUT: u8 = 4;
/// Writeable setup page, also carries the firmware CRC
pub const PAGE_SETUP: u8 = 50;
/// Firmware build identifier as packed ASCII
pub const PAGE_GIT_HASH: u8 = 200;

/// Status page (PAGE_STATUS) register offsets:

/// Status flags word, see `STATUS_FLAGS_*`
pub const STATUS_FLAGS: u8 = 2;
/// Alarm word, see `STATUS_ALARMS_*`
pub const STATUS_ALARMS: u8 = 3;
/// Board type identifier
pub const STATUS_BOARD_TYPE: u8 = 9;

/// Status flag bits
pub const STATUS_FLAGS_OUTPUTS_ARMED: u16 = 1 << 0;
pub const STATUS_FLAGS_OVERRIDE: u16 = 1 << 1;
pub const STATUS_FLAGS_RC_OK: u16 = 1 << 2;
pub const STATUS_FLAGS_RC_PPM: u16 = 1 << 3;
pub const STATUS_FLAGS_RC_DSM: u16 = 1 << 4;
pub const STATUS_FLAGS_RC_SBUS: u16 = 1 << 5;
pub const STATUS_FLAGS_FMU_OK: u16 = 1 << 6;
pub const STATUS_FLAGS_INIT_OK: u16 = 1 << 10;
pub const STATUS_FLAGS_RC_ST24: u16 = 1 << 14;

/// Alarm bits
pub const STATUS_ALARMS_PWM_ERROR: u16 = 1 << 6;

/// Raw RC input page (PAGE_RAW_RC_INPUT) register offsets:

/// First channel value; channels follow consecutively
pub const RAW_RC_BASE: u8 = 6;

/// Setup page (PAGE_SETUP) register offsets:

/// Firmware CRC, low half then high half
pub const SETUP_CRC: u8 = 15;

/// Number of registers holding the git hash (two ASCII bytes each)
pub const GIT_HASH_REGISTERS: usize = 5;

/// Logical register address: a page plus an offset within it
///
/// Kernel-side callers pass these around packed into one 16-bit word,
/// page in the high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterAddress {
    pub page: u8,
    pub offset: u8,
}

impl RegisterAddress {
    pub const fn new(page: u8, offset: u8) -> Self {
        Self { page, offset }
    }

    /// Unpack a `page << 8 | offset` word
    pub const fn from_raw(raw: u16) -> Self {
        Self {
            page: (raw >> 8) as u8,
            offset: (raw & 0xFF) as u8,
        }
    }

    /// Pack into a `page << 8 | offset` word
    pub const fn raw(self) -> u16 {
        (self.page as u16) << 8 | self.offset as u16
    }
}

impl std::fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page, self.offset)
    }
}
