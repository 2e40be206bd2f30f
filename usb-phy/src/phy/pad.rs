//! UTMI 共享 pad 电源
//!
//! 所有 UTMI 实例共用实例 0 窗口里的一组偏置电路。计数从 0 变 1 时打开偏置，
//! 从 1 变 0 时关闭。计数器由平台创建一次并注入每个 PHY 句柄。

use alloc::boxed::Box;

use spin::Mutex;
use usb_phy_if::platform::ClockOp;

use crate::{
    err::{PhyError, Result},
    reg::{Regmap, consts::*, offset::*},
};

pub struct UtmiPad {
    count: Mutex<usize>,
}

impl Default for UtmiPad {
    fn default() -> Self {
        Self::new()
    }
}

impl UtmiPad {
    pub const fn new() -> Self {
        Self {
            count: Mutex::new(0),
        }
    }

    /// 当前持有 pad 电源的 PHY 数量
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    pub(crate) fn power_on(&self, pad: &PadResources) {
        if let Err(e) = pad.clk.enable() {
            warn!("UTMI pad: clock enable failed: {e}");
        }

        {
            let mut count = self.count.lock();
            if *count == 0 {
                pad.regs.modify(
                    UTMIP_BIAS_CFG0,
                    UTMIP_BIAS_CFG0::OTGPD::CLEAR + UTMIP_BIAS_CFG0::BIASPD::CLEAR,
                );
            }
            *count += 1;
        }

        pad.clk.disable();
    }

    pub(crate) fn power_off(&self, pad: &PadResources) -> Result {
        if let Err(e) = pad.clk.enable() {
            warn!("UTMI pad: clock enable failed: {e}");
        }

        let res = {
            let mut count = self.count.lock();
            match *count {
                0 => Err(PhyError::PadPowerUnderflow),
                n => {
                    *count = n - 1;
                    if *count == 0 {
                        pad.regs.modify(
                            UTMIP_BIAS_CFG0,
                            UTMIP_BIAS_CFG0::OTGPD::SET + UTMIP_BIAS_CFG0::BIASPD::SET,
                        );
                    }
                    Ok(())
                }
            }
        };

        pad.clk.disable();
        res
    }
}

/// pad 偏置寄存器所在窗口和 pad 时钟
pub(crate) struct PadResources {
    pub clk: Box<dyn ClockOp>,
    pub regs: Regmap,
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use core::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use usb_phy_if::{KernelOp, platform::RegisterIo};

    use super::*;
    use crate::Kernel;

    struct NoDelay;

    impl KernelOp for NoDelay {
        fn delay(&self, _duration: Duration) {}
    }

    struct BiasReg(AtomicU32);

    impl RegisterIo for BiasReg {
        fn read(&self, _offset: usize) -> u32 {
            self.0.load(Ordering::SeqCst)
        }

        fn write(&self, _offset: usize, value: u32) {
            self.0.store(value, Ordering::SeqCst);
        }
    }

    struct PadClock;

    impl ClockOp for PadClock {
        fn enable(&self) -> Result {
            Ok(())
        }
        fn disable(&self) {}
        fn rate(&self) -> u64 {
            0
        }
        fn set_rate(&self, _rate: u64) -> Result {
            Ok(())
        }
        fn parent_rate(&self) -> u64 {
            0
        }
    }

    const BIAS_OFF: u32 = (1 << 10) | (1 << 11);

    fn pad() -> (PadResources, Arc<BiasReg>) {
        let reg = Arc::new(BiasReg(AtomicU32::new(BIAS_OFF)));
        let res = PadResources {
            clk: Box::new(PadClock),
            regs: Regmap::new(reg.clone(), Kernel::new(NoDelay)),
        };
        (res, reg)
    }

    #[test]
    fn bias_follows_first_and_last_user() {
        let counter = UtmiPad::new();
        let (res, reg) = pad();

        counter.power_on(&res);
        assert_eq!(reg.read(0) & BIAS_OFF, 0);
        counter.power_on(&res);
        counter.power_off(&res).unwrap();
        assert_eq!(reg.read(0) & BIAS_OFF, 0, "bias dropped while still in use");
        counter.power_off(&res).unwrap();
        assert_eq!(reg.read(0) & BIAS_OFF, BIAS_OFF);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn unbalanced_release_is_an_error() {
        let counter = UtmiPad::new();
        let (res, reg) = pad();
        assert_eq!(counter.power_off(&res), Err(PhyError::PadPowerUnderflow));
        assert_eq!(counter.count(), 0);
        assert_eq!(reg.read(0), BIAS_OFF);
    }
}
