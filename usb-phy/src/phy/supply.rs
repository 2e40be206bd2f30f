//! VDD 稳压器与 VBUS 中断

use alloc::{boxed::Box, sync::Arc};

use spin::Mutex;
use usb_phy_if::platform::{PlatformOp, RegulatorOp};

use crate::{Kernel, err::Result};

/// 带开关状态的稳压器
///
/// 中断线程和 PHY 句柄都会打开它，`on` 保证只调用一次 `enable`。
pub(crate) struct Supply {
    regulator: Box<dyn RegulatorOp>,
    on: Mutex<bool>,
}

impl Supply {
    pub fn new(regulator: Box<dyn RegulatorOp>) -> Self {
        Self {
            regulator,
            on: Mutex::new(false),
        }
    }

    pub fn is_on(&self) -> bool {
        *self.on.lock()
    }

    /// 返回本次是否真正打开了稳压器
    pub fn enable(&self) -> Result<bool> {
        let mut on = self.on.lock();
        if *on {
            return Ok(false);
        }
        self.regulator.enable()?;
        *on = true;
        Ok(true)
    }

    pub fn disable(&self) {
        let mut on = self.on.lock();
        if *on {
            self.regulator.disable();
            *on = false;
        }
    }
}

/// VBUS 中断线程化处理：确保 VDD 已上电，再通知板级代码
pub(crate) fn vbus_irq_handler(
    supply: Option<Arc<Supply>>,
    kernel: Kernel,
    notify: Option<fn()>,
) -> impl Fn() + Send + Sync {
    move || {
        if let Some(supply) = &supply {
            match supply.enable() {
                // 稳压器输出建立后才能可靠检测 VBUS
                Ok(true) => kernel.delay_ms(15),
                Ok(false) => {}
                Err(e) => error!("VBUS: supply enable failed: {e}"),
            }
        }
        if let Some(notify) = notify {
            notify();
        }
    }
}

/// 已注册的中断，释放时自动 `free_irq`
pub(crate) struct IrqRegistration {
    platform: Arc<dyn PlatformOp>,
    irq: u32,
}

impl IrqRegistration {
    pub fn request(
        platform: Arc<dyn PlatformOp>,
        irq: u32,
        name: &'static str,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self> {
        platform.request_irq(irq, name, Box::new(handler))?;
        Ok(Self { platform, irq })
    }
}

impl Drop for IrqRegistration {
    fn drop(&mut self) {
        self.platform.free_irq(self.irq);
    }
}
