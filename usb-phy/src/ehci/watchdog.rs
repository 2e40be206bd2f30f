//! HSIC 重连看门狗
//!
//! 每次 [`ReconnectWatchdog::poll`] 采样一次连接状态。检测到连接返回 `Ok`，
//! 仍需等待返回 `WouldBlock`，次数用尽或被取消返回错误。调度间隔由调用方
//! 决定：延迟任务在 `WouldBlock` 后按 [`ReconnectWatchdog::interval`] 重新排队。

use alloc::sync::Arc;
use core::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogError {
    /// 次数用尽，链路保持断开
    #[error("reconnect attempts exhausted")]
    GaveUp,
    #[error("watchdog cancelled")]
    Cancelled,
}

#[derive(Debug)]
pub struct ReconnectWatchdog {
    attempts_remaining: u32,
    interval: Duration,
    cancelled: Arc<AtomicBool>,
}

/// 可跨上下文取消看门狗
#[derive(Debug, Clone)]
pub struct WatchdogCancel(Arc<AtomicBool>);

impl WatchdogCancel {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl ReconnectWatchdog {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts_remaining: attempts,
            interval,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    pub fn cancel_handle(&self) -> WatchdogCancel {
        WatchdogCancel(self.cancelled.clone())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn poll(&mut self, probe: impl FnOnce() -> bool) -> nb::Result<(), WatchdogError> {
        if self.is_cancelled() {
            return Err(nb::Error::Other(WatchdogError::Cancelled));
        }
        if self.attempts_remaining == 0 {
            return Err(nb::Error::Other(WatchdogError::GaveUp));
        }

        self.attempts_remaining -= 1;
        if probe() {
            return Ok(());
        }

        if self.attempts_remaining == 0 {
            return Err(nb::Error::Other(WatchdogError::GaveUp));
        }
        Err(nb::Error::WouldBlock)
    }
}
