use alloc::sync::Arc;
use core::time::Duration;

use usb_phy_if::KernelOp;

/// 延时源句柄，可在各驱动之间廉价克隆
#[derive(Clone)]
pub struct Kernel(Arc<dyn KernelOp>);

impl Kernel {
    pub fn new(op: impl KernelOp) -> Self {
        Self(Arc::new(op))
    }

    pub fn from_arc(op: Arc<dyn KernelOp>) -> Self {
        Self(op)
    }

    pub fn delay(&self, duration: Duration) {
        self.0.delay(duration);
    }

    pub fn delay_us(&self, us: u64) {
        self.delay(Duration::from_micros(us));
    }

    pub fn delay_ms(&self, ms: u64) {
        self.delay(Duration::from_millis(ms));
    }
}
