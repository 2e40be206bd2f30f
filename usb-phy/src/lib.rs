#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate log;

mod clock;
pub mod ehci;
pub mod err;
mod mmio;
mod osal;
pub mod phy;
pub mod reg;

pub use mmio::{Mmio, MmioWindow};
pub use osal::Kernel;
pub use usb_phy_if::host::*;
pub use usb_phy_if::platform::*;
pub use usb_phy_if::{KernelOp, PhyError, PhyMode};
