use alloc::sync::Arc;

use usb_phy_if::platform::GpioOp;

use crate::err::Result;

/// 已申请的 GPIO，释放时自动 `free`
pub(crate) struct GpioLine {
    gpio: Arc<dyn GpioOp>,
    line: u32,
}

impl GpioLine {
    pub fn request(gpio: Arc<dyn GpioOp>, line: u32, label: &'static str) -> Result<Self> {
        gpio.request(line, label)?;
        Ok(Self { gpio, line })
    }

    pub fn output(&self, high: bool) -> Result {
        self.gpio.direction_output(self.line, high)
    }

    pub fn set(&self, high: bool) {
        self.gpio.set_value(self.line, high);
    }
}

impl Drop for GpioLine {
    fn drop(&mut self) {
        self.gpio.free(self.line);
    }
}
