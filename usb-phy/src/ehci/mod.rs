//! EHCI 主机控制器协调器
//!
//! 通用 EHCI 驱动负责调度和传输，这里只在挂起、恢复、hub 请求和关机的
//! 节点插入 PHY 操作，并管理核心时钟与 HSIC 重连看门狗。
//!
//! 控制器寄存器锁由控制器提供。协调器在寄存器序列期间持有它，毫秒级睡眠前
//! 释放；PHY 本身从不获取该锁。

use alloc::sync::Arc;
use core::time::Duration;

use spin::{Mutex, MutexGuard};
use usb_phy_if::{
    host::{DelayedWorkOp, HostControllerOp, HubRequest, PortFeature},
    platform::PlatformOp,
};

use crate::{
    Kernel,
    clock::GatedClock,
    err::{PhyError, Result},
    phy::{PhyHandle, PhyParams, PortSpeed},
    reg::{Reg, Regmap, consts::*, offset::*},
};

mod watchdog;

pub use watchdog::{ReconnectWatchdog, WatchdogCancel, WatchdogError};

/// 端口状态握手超时
const PORT_HANDSHAKE: Duration = Duration::from_micros(2000);
const PORT_SUSPEND_HANDSHAKE: Duration = Duration::from_micros(5000);
const RESTORE_SUSPEND_HANDSHAKE: Duration = Duration::from_micros(1000);

/// resume 信号持续时间
const RESUME_SIGNALLING: Duration = Duration::from_millis(20);
const RESUME_DEADLINE: Duration = Duration::from_millis(25);
/// USB 2.0 根端口复位时长
const ROOT_RESET_DEADLINE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    pub sclk_rate: u64,
    pub emc_rate: u64,
    /// 总线挂起时切到最低核心时钟
    pub power_down_on_bus_suspend: bool,
    pub watchdog_attempts: u32,
    pub watchdog_interval: Duration,
    /// 端口复位前等待对端连接的次数
    pub reset_connect_attempts: u32,
    pub reset_connect_interval: Duration,
}

impl HostConfig {
    pub const fn for_instance(instance: u8) -> Self {
        Self {
            sclk_rate: if instance == 0 { 240_000_000 } else { 80_000_000 },
            emc_rate: 150_000_000,
            power_down_on_bus_suspend: false,
            watchdog_attempts: 40,
            watchdog_interval: Duration::from_millis(50),
            reset_connect_attempts: 20,
            reset_connect_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Running,
    Suspending,
    Suspended,
    Resuming,
}

/// `resume` 走了哪条路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePath {
    /// 端口状态保留，控制器重新进入挂起等待 hub 恢复
    Restored,
    /// 控制器被重新初始化
    Restarted,
}

pub struct HostParams {
    pub phy: PhyParams,
    pub config: HostConfig,
    pub work: Arc<dyn DelayedWorkOp>,
}

struct CoreClocks {
    usb2: GatedClock,
    usb2min: GatedClock,
    sclk: GatedClock,
    emc: GatedClock,
}

impl CoreClocks {
    fn acquire(platform: &Arc<dyn PlatformOp>, config: &HostConfig) -> Result<Self> {
        let mut usb2 = GatedClock::get(platform, "usb2")?;
        usb2.enable()?;
        // 只在总线挂起时使用，保证核心电压下限
        let usb2min = GatedClock::get(platform, "usb2min")?;

        let mut sclk = GatedClock::get(platform, "sclk")?;
        sclk.set_rate(config.sclk_rate)?;
        sclk.enable()?;

        let mut emc = GatedClock::get(platform, "emc")?;
        emc.set_rate(config.emc_rate)?;
        emc.enable()?;

        debug!("EHCI: sclk {} Hz, emc {} Hz", sclk.rate(), emc.rate());

        Ok(Self {
            usb2,
            usb2min,
            sclk,
            emc,
        })
    }
}

/// 释放锁睡眠，醒来后重新加锁
fn sleep_unlocked<'a>(
    lock: &'a Mutex<()>,
    guard: MutexGuard<'a, ()>,
    kernel: &Kernel,
    duration: Duration,
) -> MutexGuard<'a, ()> {
    drop(guard);
    kernel.delay(duration);
    lock.lock()
}

fn port_rwc_bits() -> u32 {
    (PORTSC::CSC::SET + PORTSC::PEC::SET + PORTSC::OCC::SET).value
}

fn port_wake_bits() -> u32 {
    (PORTSC::WKCN::SET + PORTSC::WKDS::SET + PORTSC::WKOC::SET).value
}

pub struct HostCoordinator<H: HostControllerOp> {
    hc: H,
    hc_lock: Arc<Mutex<()>>,
    phy: PhyHandle,
    regs: Regmap,
    kernel: Kernel,
    config: HostConfig,
    work: Arc<dyn DelayedWorkOp>,
    clocks: CoreClocks,

    bus_state: BusState,
    port_speed: Option<PortSpeed>,
    host_resumed: bool,
    bus_is_power_down: bool,
    hub_suspend_req: bool,
    port_resuming: bool,
    device_ready_for_reset: bool,
    shutting_down: bool,
    watchdog: Option<ReconnectWatchdog>,
}

impl<H: HostControllerOp> HostCoordinator<H> {
    pub fn probe(hc: H, params: HostParams) -> Result<Self> {
        let HostParams { phy, config, work } = params;
        let instance = phy.instance;
        let kernel = phy.kernel.clone();
        let regs = Regmap::new(phy.regs.clone(), kernel.clone());

        let clocks = CoreClocks::acquire(&phy.platform, &config)?;

        let mut phy = PhyHandle::open(phy)
            .inspect_err(|e| error!("EHCI{instance}: failed to open USB phy: {e}"))?;
        phy.power_on()
            .inspect_err(|e| error!("EHCI{instance}: failed to power on the phy: {e}"))?;

        let hc_lock = hc.register_lock();
        info!("EHCI{instance}: probed with {:?} PHY", phy.kind());

        Ok(Self {
            hc,
            hc_lock,
            phy,
            regs,
            kernel,
            config,
            work,
            clocks,
            bus_state: BusState::Running,
            port_speed: None,
            host_resumed: true,
            bus_is_power_down: false,
            hub_suspend_req: false,
            port_resuming: false,
            device_ready_for_reset: false,
            shutting_down: false,
            watchdog: None,
        })
    }

    pub fn phy(&self) -> &PhyHandle {
        &self.phy
    }

    pub fn controller(&self) -> &H {
        &self.hc
    }

    pub fn bus_state(&self) -> BusState {
        self.bus_state
    }

    /// 最近一次挂起时记录的端口速度
    pub fn port_speed(&self) -> Option<PortSpeed> {
        self.port_speed
    }

    pub fn host_resumed(&self) -> bool {
        self.host_resumed
    }

    pub fn bus_is_power_down(&self) -> bool {
        self.bus_is_power_down
    }

    pub fn device_ready_for_reset(&self) -> bool {
        self.device_ready_for_reset
    }

    pub fn watchdog(&self) -> Option<&ReconnectWatchdog> {
        self.watchdog.as_ref()
    }

    fn instance(&self) -> u8 {
        self.phy.instance()
    }

    fn power_up(&mut self) -> Result {
        self.clocks.emc.enable()?;
        self.clocks.sclk.enable()?;
        self.clocks.usb2.enable()?;

        self.phy.power_on()?;
        self.host_resumed = true;
        self.bus_is_power_down = false;
        Ok(())
    }

    fn power_down(&mut self) {
        self.host_resumed = false;
        self.phy.power_off();

        if self.bus_is_power_down {
            self.clocks.usb2min.disable();
            return;
        }
        self.clocks.usb2.disable();
        self.clocks.sclk.disable();
        self.clocks.emc.disable();
        self.hub_suspend_req = false;
    }

    fn arm_watchdog(&mut self) {
        let watchdog =
            ReconnectWatchdog::new(self.config.watchdog_attempts, self.config.watchdog_interval);
        self.work.schedule(watchdog.interval());
        self.watchdog = Some(watchdog);
    }

    fn cancel_watchdog(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.cancel();
        }
    }

    /// 返回看门狗的取消句柄，可在其他上下文中使用
    pub fn watchdog_cancel_handle(&self) -> Option<WatchdogCancel> {
        self.watchdog.as_ref().map(|w| w.cancel_handle())
    }

    pub fn suspend(&mut self) -> Result {
        let hsic = self.phy.is_hsic();
        self.bus_state = BusState::Suspending;

        {
            let _guard = self.hc_lock.lock();
            self.port_speed = PortSpeed::from_portsc(self.regs.read(PORTSC1));
            if let Err(e) = self.hc.halt() {
                warn!("EHCI{}: halt failed: {e}", self.instance());
            }
            self.hc.set_hw_accessible(false);
            if hsic {
                self.device_ready_for_reset = false;
            }
        }

        debug!(
            "EHCI{}: suspend, port speed {:?}",
            self.instance(),
            self.port_speed
        );

        if !(hsic && self.shutting_down) {
            self.power_down();
        }
        self.bus_state = BusState::Suspended;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<ResumePath> {
        self.bus_state = BusState::Resuming;
        self.hc.set_hw_accessible(true);
        self.power_up()?;

        let path = match self.port_speed {
            _ if self.phy.is_hsic() => self.restart()?,
            None => {
                // 等 PHY 发现新设备后再重启控制器
                self.kernel.delay_ms(10);
                self.restart()?
            }
            Some(speed) => match self.restore(speed) {
                Ok(()) => ResumePath::Restored,
                Err(_) => self.restart()?,
            },
        };

        debug!("EHCI{}: resume via {path:?}", self.instance());
        self.bus_state = BusState::Running;
        Ok(path)
    }

    /// 保留挂起前的端口状态，让控制器直接回到挂起
    fn restore(&mut self, speed: PortSpeed) -> Result {
        let instance = self.instance();
        let regs = &self.regs;
        let kernel = &self.kernel;

        self.phy.restore_start(speed);

        regs.modify(USBMODE, USBMODE::CM::Host);
        regs.modify(PORTSC1, PORTSC::PP::SET);
        kernel.delay_us(10);

        // LP0 唤醒后控制器寄存器已复位
        if regs.read_raw(ASYNCLISTADDR) == 0 {
            let force = match speed {
                PortSpeed::High => PORTSC::PTC::ForceEnableHs,
                PortSpeed::Full => PORTSC::PTC::ForceEnableFs,
                PortSpeed::Low => PORTSC::PTC::ForceEnableLs,
            };
            regs.modify(PORTSC1, force);
            kernel.delay_us(10);
            regs.modify(PORTSC1, PORTSC::PTC::Disabled);
            kernel.delay_us(10);
        }

        regs.wait_for(PORTSC1, PORTSC::CCS::SET, PORT_HANDSHAKE)
            .inspect_err(|_| error!("EHCI{instance}: timeout waiting for port connect"))?;
        regs.wait_for(PORTSC1, PORTSC::PE::SET, PORT_HANDSHAKE)
            .inspect_err(|_| error!("EHCI{instance}: timeout waiting for port enable"))?;

        // 避免恢复后立刻进入端口变化中断
        regs.modify(USBSTS, USBSTS::PCI::SET);

        let portsc = regs.read(PORTSC1);
        if portsc.is_set(PORTSC::PP) && portsc.is_set(PORTSC::PE) {
            regs.modify(PORTSC1, PORTSC::SUSP::SET);
            regs.wait_for(PORTSC1, PORTSC::SUSP::SET, RESTORE_SUSPEND_HANDSHAKE)
                .inspect_err(|_| error!("EHCI{instance}: timeout waiting for port suspend"))?;
        }

        self.phy.restore_end();
        Ok(())
    }

    fn restart(&mut self) -> Result<ResumePath> {
        let hsic = self.phy.is_hsic();

        if !hsic && self.port_speed.is_some() {
            self.phy.restore_end();
        }

        if !hsic {
            self.hc.restart()?;
            return Ok(ResumePath::Restarted);
        }

        let portsc = self.regs.read(PORTSC1);
        if !(portsc.is_set(PORTSC::PP) && portsc.is_set(PORTSC::PE)) {
            self.hc.restart()?;
            self.hc.set_configured();
        }

        if let Err(e) = self.phy.bus_idle() {
            warn!("EHCI{}: bus idle failed: {e}", self.instance());
        }

        if self.phy.is_device_connected() {
            self.device_ready_for_reset = true;
        } else {
            self.arm_watchdog();
        }
        Ok(ResumePath::Restarted)
    }

    pub fn bus_suspend(&mut self) -> Result {
        if self.phy.is_hsic() && self.shutting_down {
            return Ok(());
        }

        self.hc.bus_suspend()?;

        if self.config.power_down_on_bus_suspend && self.hub_suspend_req {
            if let Err(e) = self.phy.set_clock(false) {
                warn!("EHCI{}: PHY clock off failed: {e}", self.instance());
            }
            self.clocks.usb2min.enable()?;
            self.clocks.usb2.disable();
            self.clocks.emc.disable();

            self.hub_suspend_req = false;
            self.bus_is_power_down = true;
        }
        self.bus_state = BusState::Suspended;
        Ok(())
    }

    pub fn bus_resume(&mut self) -> Result {
        self.bus_state = BusState::Resuming;

        if self.config.power_down_on_bus_suspend && self.bus_is_power_down {
            if let Err(e) = self.clocks.usb2.enable() {
                error!("EHCI{}: usb2 clock enable failed: {e}", self.instance());
            }
            if let Err(e) = self.clocks.emc.enable() {
                error!("EHCI{}: emc clock enable failed: {e}", self.instance());
            }
            self.clocks.usb2min.disable();

            if let Err(e) = self.phy.set_clock(true) {
                warn!("EHCI{}: PHY clock on failed: {e}", self.instance());
            }
            self.kernel.delay_ms(50);
            self.bus_is_power_down = false;
        }

        self.phy.preresume();
        self.port_resuming = true;
        let res = self.hc.bus_resume();
        self.bus_state = BusState::Running;
        res
    }

    fn port_reg(&self, port: u8) -> Result<Reg<PORTSC::Register>> {
        if port == 0 || port > self.hc.port_count() {
            return Err(PhyError::InvalidPortState);
        }
        Ok(PORTSC1.nth(port as usize - 1))
    }

    pub fn hub_control(&mut self, req: HubRequest, buf: &mut [u8]) -> Result {
        let lock = self.hc_lock.clone();
        let guard = lock.lock();
        let port = req.port();

        match req {
            HubRequest::ClearPortFeature {
                feature: PortFeature::Enable,
                ..
            } => {
                // 通用路径会把读到的写 1 清零位原样写回
                let reg = self.port_reg(port)?;
                let value = self.regs.read_raw(reg) & !port_rwc_bits();
                self.regs.write_raw(reg, value & !PORTSC::PE::SET.value);
                return Ok(());
            }
            HubRequest::GetPortStatus { .. } => {
                if let Ok(reg) = self.port_reg(port)
                    && self.port_resuming
                    && !self.regs.is_set(reg, PORTSC::SUSP)
                {
                    // resume 完成，恢复断开检测
                    self.port_resuming = false;
                    self.phy.postresume();
                }
            }
            HubRequest::SetPortFeature {
                feature: PortFeature::Suspend,
                ..
            } => return self.suspend_port(port),
            HubRequest::ClearPortFeature {
                feature: PortFeature::Suspend,
                ..
            } => return self.resume_port(&lock, guard, port),
            HubRequest::SetPortFeature {
                feature: feature @ (PortFeature::Reset | PortFeature::Power),
                ..
            } if self.phy.is_hsic() => return self.hsic_port_feature(&lock, guard, feature, port),
            _ => {}
        }

        drop(guard);
        self.hc.hub_control(req, buf)
    }

    fn suspend_port(&mut self, port: u8) -> Result {
        let reg = self.port_reg(port)?;
        let mut portsc = self.regs.read(reg);
        if !portsc.is_set(PORTSC::PE) || portsc.is_set(PORTSC::PR) {
            return Err(PhyError::InvalidPortState);
        }

        portsc.modify(
            PORTSC::WKCN::CLEAR + PORTSC::WKDS::SET + PORTSC::WKOC::SET + PORTSC::SUSP::SET,
        );
        self.regs.write_raw(reg, portsc.get());

        // 传输未完成时端口挂起会延后
        if self
            .regs
            .wait_for(reg, PORTSC::SUSP::SET, PORT_SUSPEND_HANDSHAKE)
            .is_err()
        {
            error!("EHCI{}: timeout waiting for SUSPEND", self.instance());
        }

        self.hc.mark_port_suspended(port);
        self.hub_suspend_req = true;
        Ok(())
    }

    /// 控制器在端口进入 HS/FS 空闲时自行清除 FPR，驱动只需等待
    fn resume_port<'a>(
        &mut self,
        lock: &'a Mutex<()>,
        guard: MutexGuard<'a, ()>,
        port: u8,
    ) -> Result {
        let instance = self.instance();
        let reg = self.port_reg(port)?;
        let portsc = self.regs.read(reg);
        if portsc.is_set(PORTSC::PR) || !portsc.is_set(PORTSC::PE) {
            return Err(PhyError::InvalidPortState);
        }
        if !portsc.is_set(PORTSC::SUSP) {
            return Ok(());
        }

        // resume 期间关闭断开检测
        self.phy.preresume();
        self.hc.set_resume_deadline(port, Some(RESUME_DEADLINE));

        let regs = &self.regs;
        let sts = regs.read_raw(USBSTS);
        regs.write_raw(USBSTS, sts);
        self.kernel.delay_us(20);

        if regs.wait_for(USBSTS, USBSTS::SRI::SET, PORT_HANDSHAKE).is_err() {
            error!("EHCI{instance}: timeout waiting for SOF");
        }
        let sts = regs.read_raw(USBSTS);
        regs.write_raw(USBSTS, sts);
        if regs.wait_for(USBSTS, USBSTS::SRI::CLEAR, PORT_HANDSHAKE).is_err() {
            error!("EHCI{instance}: timeout clearing SRI");
        }
        if regs.wait_for(USBSTS, USBSTS::SRI::SET, PORT_HANDSHAKE).is_err() {
            error!("EHCI{instance}: timeout waiting for SOF");
        }
        self.kernel.delay_us(20);

        let value = portsc.get() & !(port_rwc_bits() | port_wake_bits());
        regs.write_raw(reg, value | PORTSC::FPR::SET.value);

        let _guard = sleep_unlocked(lock, guard, &self.kernel, RESUME_SIGNALLING);

        let regs = &self.regs;
        if regs.wait_for(reg, PORTSC::FPR::CLEAR, PORT_HANDSHAKE).is_err() {
            error!("EHCI{instance}: timeout waiting for RESUME");
        }
        if regs.wait_for(reg, PORTSC::SUSP::CLEAR, PORT_HANDSHAKE).is_err() {
            error!("EHCI{instance}: timeout waiting for SUSPEND");
        }

        self.hc.set_resume_deadline(port, None);
        self.port_resuming = true;
        Ok(())
    }

    fn hsic_port_feature<'a>(
        &mut self,
        lock: &'a Mutex<()>,
        guard: MutexGuard<'a, ()>,
        feature: PortFeature,
        port: u8,
    ) -> Result {
        let reg = self.port_reg(port)?;
        let portsc = self.regs.read(reg);
        if portsc.is_set(PORTSC::PO) {
            return Ok(());
        }
        let value = portsc.get() & !port_rwc_bits();

        match feature {
            PortFeature::Reset => {
                if portsc.is_set(PORTSC::FPR) {
                    return Err(PhyError::InvalidPortState);
                }
                self.hc.set_resume_deadline(port, Some(ROOT_RESET_DEADLINE));
                self.regs.write_raw(reg, value & !PORTSC::PE::SET.value);

                if port != 1 {
                    return Ok(());
                }
                self.reset_hsic_port(lock, guard)
            }
            PortFeature::Power => {
                if self.hc.has_port_power_control() {
                    self.regs.write_raw(reg, value | PORTSC::PP::SET.value);
                }
                if port != 1 || self.shutting_down {
                    return Ok(());
                }
                self.device_ready_for_reset = self
                    .phy
                    .bus_connect()
                    .inspect_err(|e| warn!("EHCI{}: bus connect failed: {e}", self.instance()))
                    .is_ok();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// 对端确认在线后才发起链路复位
    fn reset_hsic_port<'a>(&mut self, lock: &'a Mutex<()>, mut guard: MutexGuard<'a, ()>) -> Result {
        if !self.device_ready_for_reset {
            if let Err(e) = self.phy.bus_idle() {
                warn!("EHCI{}: bus idle failed: {e}", self.instance());
            }

            let mut wait = ReconnectWatchdog::new(
                self.config.reset_connect_attempts,
                self.config.reset_connect_interval,
            );
            loop {
                match wait.poll(|| self.phy.is_device_connected()) {
                    Ok(()) => {
                        self.device_ready_for_reset = true;
                        break;
                    }
                    Err(nb::Error::WouldBlock) => {
                        guard = sleep_unlocked(lock, guard, &self.kernel, wait.interval());
                    }
                    Err(nb::Error::Other(e)) => {
                        warn!("EHCI{}: device not ready for reset: {e}", self.instance());
                        break;
                    }
                }
            }
        }

        if !self.device_ready_for_reset {
            return Ok(());
        }
        self.device_ready_for_reset = false;
        let res = self.phy.bus_reset();
        drop(guard);
        res
    }

    /// 延迟任务入口：采样一次 HSIC 连接状态，必要时重新排队
    pub fn reconnect_work(&mut self) {
        let Some(watchdog) = self.watchdog.as_mut() else {
            return;
        };

        match watchdog.poll(|| self.phy.is_device_connected()) {
            Ok(()) => {
                debug!("EHCI{}: HSIC device connected", self.phy.instance());
                self.device_ready_for_reset = true;
                self.watchdog = None;
            }
            Err(nb::Error::WouldBlock) => self.work.schedule(watchdog.interval()),
            Err(nb::Error::Other(e)) => {
                warn!("EHCI{}: reconnect watchdog stopped: {e}", self.phy.instance());
                self.watchdog = None;
            }
        }
    }

    pub fn shutdown(&mut self) {
        info!("EHCI{}: shutdown", self.instance());
        if self.phy.is_hsic() {
            self.shutting_down = true;
        }
        self.cancel_watchdog();

        // 控制器关机需要访问寄存器
        if !self.host_resumed
            && let Err(e) = self.power_up()
        {
            error!("EHCI{}: power up for shutdown failed: {e}", self.instance());
        }
        self.hc.shutdown();
        self.power_down();
    }

    /// 取消看门狗并关闭 PHY，交还控制器
    ///
    /// 挂起或关机后 PHY 已经下电，此时不会再次下电。
    pub fn remove(mut self) -> H {
        self.work.cancel_sync();
        self.cancel_watchdog();
        self.hc.set_hw_accessible(false);

        let Self {
            hc,
            mut phy,
            clocks,
            ..
        } = self;

        phy.power_off();
        phy.close();
        drop(clocks);
        hc
    }
}

impl<H: HostControllerOp> core::fmt::Debug for HostCoordinator<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostCoordinator")
            .field("instance", &self.phy.instance())
            .field("bus_state", &self.bus_state)
            .field("port_speed", &self.port_speed)
            .finish()
    }
}
