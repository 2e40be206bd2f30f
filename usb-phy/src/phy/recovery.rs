//! HSIC 链路恢复策略
//!
//! 芯片间链路在对端（通常是基带）异常后偶发训练失败。是否能、以及如何唤醒对端
//! 完全取决于板级连线，因此做成可注入的策略对象。默认策略不做任何额外动作。

use alloc::sync::Arc;

use usb_phy_if::platform::GpioOp;

use crate::Kernel;

pub trait RecoveryPolicy: Send {
    /// 对端是否在位（例如基带已上电且未处于复位）
    fn remote_present(&self) -> bool {
        true
    }

    /// 链路使能线，放弃恢复时拉低
    fn set_link_enabled(&mut self, _enabled: bool) {}

    /// 告知对端本端链路处于活动状态
    fn set_link_active(&mut self, _active: bool) {}

    /// 首次连接检测失败后，唤醒对端之后的额外检测次数；0 表示不恢复
    fn reconnect_attempts(&self) -> u32 {
        0
    }

    /// 唤醒对端
    fn kick_remote(&mut self, _kernel: &Kernel) {}

    /// 上电后寄存器初始化失败时重新上电的次数；0 表示不重试
    fn power_on_retries(&self) -> u32 {
        0
    }

    /// 向对端发送一次唤醒脉冲
    fn pulse_remote_wakeup(&mut self, _kernel: &Kernel) {}
}

/// 不做恢复，单次检测
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecovery;

impl RecoveryPolicy for NoRecovery {}

/// 通过 GPIO 唤醒对端所需的信号线
#[derive(Debug, Clone, Copy)]
pub struct KickLines {
    /// 对端在位检测（输入）
    pub remote_present: u32,
    /// HSIC 链路使能
    pub link_enable: u32,
    /// 本端 HSIC 活动状态
    pub link_active: u32,
    /// 主机侧活动指示
    pub host_active: u32,
    /// 对端唤醒脉冲
    pub remote_wakeup: u32,
}

/// 切换主机活动指示并向对端发送唤醒脉冲，然后重试连接检测
pub struct GpioKickRecovery {
    gpio: Arc<dyn GpioOp>,
    lines: KickLines,
    attempts: u32,
    power_on_retries: u32,
}

impl GpioKickRecovery {
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    pub const DEFAULT_POWER_ON_RETRIES: u32 = 5;

    pub fn new(gpio: Arc<dyn GpioOp>, lines: KickLines) -> Self {
        Self {
            gpio,
            lines,
            attempts: Self::DEFAULT_ATTEMPTS,
            power_on_retries: Self::DEFAULT_POWER_ON_RETRIES,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_power_on_retries(mut self, retries: u32) -> Self {
        self.power_on_retries = retries;
        self
    }
}

impl RecoveryPolicy for GpioKickRecovery {
    fn remote_present(&self) -> bool {
        self.gpio.get_value(self.lines.remote_present)
    }

    fn set_link_enabled(&mut self, enabled: bool) {
        debug!("HSIC: link enable -> {}", enabled as u8);
        self.gpio.set_value(self.lines.link_enable, enabled);
    }

    fn set_link_active(&mut self, active: bool) {
        debug!("HSIC: link active -> {}", active as u8);
        self.gpio.set_value(self.lines.link_active, active);
    }

    fn reconnect_attempts(&self) -> u32 {
        self.attempts
    }

    fn kick_remote(&mut self, kernel: &Kernel) {
        let gpio = &self.gpio;
        let lines = &self.lines;

        gpio.set_value(lines.host_active, false);
        // 等对端进入空闲
        kernel.delay_ms(30);
        gpio.set_value(lines.host_active, true);
        kernel.delay_ms(10);

        self.pulse_remote_wakeup(kernel);
    }

    fn power_on_retries(&self) -> u32 {
        self.power_on_retries
    }

    fn pulse_remote_wakeup(&mut self, kernel: &Kernel) {
        debug!("HSIC: remote wakeup pulse");
        self.gpio.set_value(self.lines.remote_wakeup, true);
        kernel.delay_ms(10);
        self.gpio.set_value(self.lines.remote_wakeup, false);
        kernel.delay_ms(10);
    }
}
