//! 寄存器访问原语
//!
//! [`Regmap`] 把一个寄存器窗口和延时源绑在一起，提供带类型的读写、
//! 读改写以及有界轮询。它不打日志、不重试，超时如何处理由调用方决定。

use alloc::sync::Arc;
use core::{marker::PhantomData, time::Duration};

use tock_registers::{
    LocalRegisterCopy, RegisterLongName,
    fields::{Field, FieldValue},
};
use usb_phy_if::platform::RegisterIo;

use crate::{
    Kernel,
    err::{PhyError, Result},
};

pub mod consts;

/// 带类型的寄存器偏移
pub struct Reg<R: RegisterLongName> {
    offset: usize,
    _marker: PhantomData<R>,
}

impl<R: RegisterLongName> Clone for Reg<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: RegisterLongName> Copy for Reg<R> {}

impl<R: RegisterLongName> Reg<R> {
    pub const fn new(offset: usize) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// 同类寄存器数组中的第 `n` 个（步长 4 字节）
    pub const fn nth(self, n: usize) -> Self {
        Self::new(self.offset + n * 4)
    }
}

/// 寄存器偏移表
pub mod offset {
    use super::{Reg, consts::*};

    pub const USBCMD: Reg<USBCMD::Register> = Reg::new(0x140);
    pub const USBSTS: Reg<USBSTS::Register> = Reg::new(0x144);
    pub const ASYNCLISTADDR: Reg<ASYNCLISTADDR::Register> = Reg::new(0x158);
    pub const TXFILLTUNING: Reg<TXFILLTUNING::Register> = Reg::new(0x164);
    pub const ULPI_VIEWPORT: Reg<ULPI_VIEWPORT::Register> = Reg::new(0x170);
    pub const PORTSC1: Reg<PORTSC::Register> = Reg::new(0x184);
    pub const USBMODE: Reg<USBMODE::Register> = Reg::new(0x1a8);

    pub const USB_SUSP_CTRL: Reg<USB_SUSP_CTRL::Register> = Reg::new(0x400);
    pub const USB1_LEGACY_CTRL: Reg<USB1_LEGACY_CTRL::Register> = Reg::new(0x410);
    pub const ULPIS2S_CTRL: Reg<ULPIS2S_CTRL::Register> = Reg::new(0x418);
    pub const ULPI_TIMING_CTRL_0: Reg<ULPI_TIMING_CTRL_0::Register> = Reg::new(0x424);
    pub const ULPI_TIMING_CTRL_1: Reg<ULPI_TIMING_CTRL_1::Register> = Reg::new(0x428);

    pub const UTMIP_PLL_CFG1: Reg<UTMIP_PLL_CFG1::Register> = Reg::new(0x804);
    pub const UTMIP_XCVR_CFG0: Reg<UTMIP_XCVR_CFG0::Register> = Reg::new(0x808);
    pub const UTMIP_BIAS_CFG0: Reg<UTMIP_BIAS_CFG0::Register> = Reg::new(0x80c);
    pub const UTMIP_HSRX_CFG0: Reg<UTMIP_HSRX_CFG0::Register> = Reg::new(0x810);
    pub const UTMIP_HSRX_CFG1: Reg<UTMIP_HSRX_CFG1::Register> = Reg::new(0x814);
    pub const UTMIP_TX_CFG0: Reg<UTMIP_TX_CFG0::Register> = Reg::new(0x820);
    pub const UTMIP_MISC_CFG0: Reg<UTMIP_MISC_CFG0::Register> = Reg::new(0x824);
    pub const UTMIP_MISC_CFG1: Reg<UTMIP_MISC_CFG1::Register> = Reg::new(0x828);
    pub const UTMIP_DEBOUNCE_CFG0: Reg<UTMIP_DEBOUNCE_CFG0::Register> = Reg::new(0x82c);
    pub const UTMIP_BAT_CHRG_CFG0: Reg<UTMIP_BAT_CHRG_CFG0::Register> = Reg::new(0x830);
    pub const UTMIP_SPARE_CFG0: Reg<UTMIP_SPARE_CFG0::Register> = Reg::new(0x834);
    pub const UTMIP_XCVR_CFG1: Reg<UTMIP_XCVR_CFG1::Register> = Reg::new(0x838);
    pub const UTMIP_BIAS_CFG1: Reg<UTMIP_BIAS_CFG1::Register> = Reg::new(0x83c);

    pub const UHSIC_PLL_CFG1: Reg<UHSIC_PLL_CFG1::Register> = Reg::new(0x804);
    pub const UHSIC_HSRX_CFG0: Reg<UHSIC_HSRX_CFG0::Register> = Reg::new(0x808);
    pub const UHSIC_HSRX_CFG1: Reg<UHSIC_HSRX_CFG1::Register> = Reg::new(0x80c);
    pub const UHSIC_MISC_CFG0: Reg<UHSIC_MISC_CFG0::Register> = Reg::new(0x814);
    pub const UHSIC_MISC_CFG1: Reg<UHSIC_MISC_CFG1::Register> = Reg::new(0x818);
    pub const UHSIC_PADS_CFG0: Reg<UHSIC_PADS_CFG0::Register> = Reg::new(0x81c);
    pub const UHSIC_PADS_CFG1: Reg<UHSIC_PADS_CFG1::Register> = Reg::new(0x820);
    pub const UHSIC_STAT_CFG0: Reg<UHSIC_STAT_CFG0::Register> = Reg::new(0x828);

    /// AHB 仲裁器窗口内
    pub const AHB_MEM_PREFETCH_CFG3: Reg<AHB_MEM_PREFETCH_CFG::Register> = Reg::new(0xe4);
}

#[derive(Clone)]
pub struct Regmap {
    io: Arc<dyn RegisterIo>,
    kernel: Kernel,
}

impl Regmap {
    pub fn new(io: Arc<dyn RegisterIo>, kernel: Kernel) -> Self {
        Self { io, kernel }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn read<R: RegisterLongName>(&self, reg: Reg<R>) -> LocalRegisterCopy<u32, R> {
        LocalRegisterCopy::new(self.io.read(reg.offset))
    }

    pub fn read_raw<R: RegisterLongName>(&self, reg: Reg<R>) -> u32 {
        self.io.read(reg.offset)
    }

    pub fn write_raw<R: RegisterLongName>(&self, reg: Reg<R>, value: u32) {
        self.io.write(reg.offset, value);
    }

    /// 整个寄存器写入 `val`，未涉及的位清零
    pub fn write<R: RegisterLongName>(&self, reg: Reg<R>, val: FieldValue<u32, R>) {
        self.io.write(reg.offset, val.value);
    }

    pub fn modify<R: RegisterLongName>(&self, reg: Reg<R>, val: FieldValue<u32, R>) {
        let mut copy = self.read(reg);
        copy.modify(val);
        self.io.write(reg.offset, copy.get());
    }

    pub fn is_set<R: RegisterLongName>(&self, reg: Reg<R>, field: Field<u32, R>) -> bool {
        self.read(reg).is_set(field)
    }

    pub fn matches<R: RegisterLongName>(&self, reg: Reg<R>, val: FieldValue<u32, R>) -> bool {
        self.read_raw(reg) & val.mask() == val.value
    }

    /// 以 1μs 为步长轮询，直到 `(value & mask) == expected`
    ///
    /// 首次采样即匹配时不产生任何延时；始终不匹配时恰好在 `timeout`
    /// 之后返回 [`PhyError::Timeout`]。
    pub fn poll_until<R: RegisterLongName>(
        &self,
        reg: Reg<R>,
        mask: u32,
        expected: u32,
        timeout: Duration,
    ) -> Result {
        let mut remaining = timeout.as_micros();
        loop {
            if self.io.read(reg.offset) & mask == expected {
                return Ok(());
            }
            if remaining == 0 {
                return Err(PhyError::Timeout { offset: reg.offset });
            }
            self.kernel.delay(Duration::from_micros(1));
            remaining -= 1;
        }
    }

    /// 等待字段组合 `val` 成立
    pub fn wait_for<R: RegisterLongName>(
        &self,
        reg: Reg<R>,
        val: FieldValue<u32, R>,
        timeout: Duration,
    ) -> Result {
        self.poll_until(reg, val.mask(), val.value, timeout)
    }
}
