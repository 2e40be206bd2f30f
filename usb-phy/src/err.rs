pub use usb_phy_if::err::PhyError;

pub type Result<T = ()> = core::result::Result<T, PhyError>;
