//! ULPI viewport
//!
//! 控制器通过 ULPI_VIEWPORT 寄存器间接读写外置收发器的寄存器。每次访问先发
//! WAKEUP 唤醒链路，再发 RUN 执行写入，两步都等待对应位自清。

use core::time::Duration;

use bitflags::bitflags;

use crate::{
    err::Result,
    reg::{Regmap, consts::*, offset::*},
};

/// ULPI 收发器寄存器地址
pub mod ulpi_reg {
    pub const IFC_CTRL: u8 = 0x07;
    pub const OTG_CTRL: u8 = 0x0a;

    /// 写 1 置位的影子地址
    pub const fn set(reg: u8) -> u8 {
        reg + 1
    }

    /// 写 1 清零的影子地址
    pub const fn clear(reg: u8) -> u8 {
        reg + 2
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IfcCtrl: u8 {
        const FS_LS_SERIAL_6PIN = 1 << 0;
        const FS_LS_SERIAL_3PIN = 1 << 1;
        const CARKIT_MODE = 1 << 2;
        const CLOCK_SUSPENDM = 1 << 3;
        const AUTO_RESUME = 1 << 4;
        const INDICATOR_COMPLEMENT = 1 << 5;
        const INDICATOR_PASSTHRU = 1 << 6;
        const INTERFACE_PROTECT_DISABLE = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OtgCtrl: u8 {
        const ID_PULLUP = 1 << 0;
        const DP_PULLDOWN = 1 << 1;
        const DM_PULLDOWN = 1 << 2;
        const DISCHRG_VBUS = 1 << 3;
        const CHRG_VBUS = 1 << 4;
        const DRV_VBUS = 1 << 5;
        const DRV_VBUS_EXT = 1 << 6;
        const USE_EXT_VBUS_IND = 1 << 7;
    }
}

pub(crate) struct UlpiViewport<'a> {
    regs: &'a Regmap,
    timeout: Duration,
}

impl<'a> UlpiViewport<'a> {
    pub fn new(regs: &'a Regmap, timeout: Duration) -> Self {
        Self { regs, timeout }
    }

    fn wakeup(&self) -> Result {
        self.regs.write(
            ULPI_VIEWPORT,
            ULPI_VIEWPORT::WAKEUP::SET + ULPI_VIEWPORT::RW::Write,
        );
        self.regs
            .wait_for(ULPI_VIEWPORT, ULPI_VIEWPORT::WAKEUP::CLEAR, self.timeout)
    }

    pub fn write(&self, addr: u8, value: u8) -> Result {
        self.wakeup()?;
        self.regs.write(
            ULPI_VIEWPORT,
            ULPI_VIEWPORT::RUN::SET
                + ULPI_VIEWPORT::RW::Write
                + ULPI_VIEWPORT::ADDR.val(addr as u32)
                + ULPI_VIEWPORT::DATA_WRITE.val(value as u32),
        );
        self.regs
            .wait_for(ULPI_VIEWPORT, ULPI_VIEWPORT::RUN::CLEAR, self.timeout)
    }
}
