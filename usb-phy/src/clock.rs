use alloc::{boxed::Box, sync::Arc};

use usb_phy_if::platform::{ClockOp, PlatformOp};

use crate::err::Result;

/// 记录开关状态的时钟
///
/// 重复 enable/disable 不会改变平台侧的引用计数；释放时若仍开启则自动关闭。
pub(crate) struct GatedClock {
    name: &'static str,
    clk: Box<dyn ClockOp>,
    on: bool,
}

impl GatedClock {
    pub fn get(platform: &Arc<dyn PlatformOp>, name: &'static str) -> Result<Self> {
        let clk = platform
            .clk_get(name)
            .inspect_err(|e| error!("can't get clock {name}: {e}"))?;
        Ok(Self {
            name,
            clk,
            on: false,
        })
    }

    pub fn rate(&self) -> u64 {
        self.clk.rate()
    }

    pub fn parent_rate(&self) -> u64 {
        self.clk.parent_rate()
    }

    pub fn set_rate(&self, rate: u64) -> Result {
        self.clk
            .set_rate(rate)
            .inspect_err(|e| warn!("clock {}: set rate {rate} failed: {e}", self.name))
    }

    pub fn enable(&mut self) -> Result {
        if self.on {
            return Ok(());
        }
        self.clk
            .enable()
            .inspect_err(|e| error!("clock {}: enable failed: {e}", self.name))?;
        self.on = true;
        Ok(())
    }

    pub fn disable(&mut self) {
        if self.on {
            self.clk.disable();
            self.on = false;
        }
    }
}

impl Drop for GatedClock {
    fn drop(&mut self) {
        self.disable();
    }
}
