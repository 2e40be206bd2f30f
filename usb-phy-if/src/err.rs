#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyError {
    #[error("Unsupported reference clock rate: {0} Hz")]
    UnsupportedClockRate(u64),
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(&'static str),
    #[error("Register {offset:#x} timed out")]
    Timeout { offset: usize },
    #[error("Device not connected")]
    NotConnected,
    #[error("No PHY configuration for instance {0}")]
    MissingConfig(u8),
    #[error("Invalid PHY instance {0}")]
    InvalidInstance(u8),
    #[error("UTMI pad power released more times than requested")]
    PadPowerUnderflow,
    #[error("Port state does not allow this request")]
    InvalidPortState,
}
