use core::ptr::NonNull;

use mbarrier::wmb;
use usb_phy_if::platform::RegisterIo;

pub type Mmio = NonNull<u8>;

/// 直接映射的寄存器窗口
pub struct MmioWindow {
    base: usize,
    size: usize,
}

unsafe impl Send for MmioWindow {}
unsafe impl Sync for MmioWindow {}

impl MmioWindow {
    /// # Safety
    ///
    /// 调用者必须确保 `base` 指向有效的、已映射的设备内存，且长度至少为 `size`。
    pub unsafe fn new(base: Mmio, size: usize) -> Self {
        Self {
            base: base.as_ptr() as usize,
            size,
        }
    }

    fn addr(&self, offset: usize) -> usize {
        debug_assert!(offset + 4 <= self.size, "offset {offset:#x} out of window");
        self.base + offset
    }
}

impl RegisterIo for MmioWindow {
    fn read(&self, offset: usize) -> u32 {
        let addr = self.addr(offset) as *const u32;
        unsafe { addr.read_volatile() }
    }

    fn write(&self, offset: usize, value: u32) {
        let addr = self.addr(offset) as *mut u32;
        wmb();
        unsafe { addr.write_volatile(value) }
    }
}
