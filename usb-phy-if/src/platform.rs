//! 平台资源接口
//!
//! PHY 引擎不直接操作时钟、稳压器、GPIO 和中断控制器，而是通过这里的
//! trait 向平台层申请。所有句柄在 `Drop` 时释放（对应 `clk_put` /
//! `regulator_put`）。

use alloc::{boxed::Box, sync::Arc};

use crate::err::PhyError;

/// 32 位寄存器窗口
///
/// `offset` 为相对窗口基址的字节偏移。
pub trait RegisterIo: Send + Sync + 'static {
    fn read(&self, offset: usize) -> u32;
    fn write(&self, offset: usize, value: u32);
}

pub trait ClockOp: Send + Sync {
    fn enable(&self) -> Result<(), PhyError>;
    fn disable(&self);
    fn rate(&self) -> u64;
    fn set_rate(&self, rate: u64) -> Result<(), PhyError>;
    /// 父时钟频率，PLL 的参考晶振频率从这里取得
    fn parent_rate(&self) -> u64;
}

pub trait RegulatorOp: Send + Sync {
    fn enable(&self) -> Result<(), PhyError>;
    fn disable(&self);
}

pub trait GpioOp: Send + Sync {
    fn request(&self, gpio: u32, label: &'static str) -> Result<(), PhyError>;
    fn free(&self, gpio: u32);
    fn direction_output(&self, gpio: u32, high: bool) -> Result<(), PhyError>;
    fn set_value(&self, gpio: u32, high: bool);
    fn get_value(&self, gpio: u32) -> bool;
}

/// 中断处理函数，在线程化中断上下文中调用
pub type IrqHandler = Box<dyn Fn() + Send + Sync>;

/// 需要额外映射的寄存器窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWindow {
    /// 第一个 USB 控制器的窗口，UTMI 共享 pad 的偏置寄存器在这里
    Usb1,
    /// AHB 总线仲裁器，预取勘误寄存器在这里
    AhbGizmo,
}

pub trait PlatformOp: Send + Sync + 'static {
    fn clk_get(&self, name: &'static str) -> Result<Box<dyn ClockOp>, PhyError>;
    fn regulator_get(&self, name: &'static str) -> Result<Box<dyn RegulatorOp>, PhyError>;
    fn gpio(&self) -> Arc<dyn GpioOp>;
    fn request_irq(
        &self,
        irq: u32,
        name: &'static str,
        handler: IrqHandler,
    ) -> Result<(), PhyError>;
    fn free_irq(&self, irq: u32);
    fn map_registers(&self, window: RegisterWindow) -> Result<Arc<dyn RegisterIo>, PhyError>;
}
