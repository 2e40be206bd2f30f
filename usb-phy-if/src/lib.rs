#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod err;
pub mod host;
pub mod platform;

pub use err::PhyError;

use core::time::Duration;

/// 延时源
///
/// PHY 时序全部依赖这里的延时，测试中可以替换为虚拟时钟。
pub trait KernelOp: Send + Sync + 'static {
    fn delay(&self, duration: Duration);
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhyMode {
    #[default]
    Host,
    Device,
}
