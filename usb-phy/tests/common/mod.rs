#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
    time::Duration,
};

use crab_usb_phy::{
    ClockOp, DelayedWorkOp, GpioOp, HostControllerOp, HubRequest, IrqHandler, Kernel, KernelOp,
    PhyError, PhyMode, PlatformOp, RegisterIo, RegisterWindow, RegulatorOp,
    phy::{BoardConfig, NoRecovery, PhyConfig, PhyParams, RecoveryPolicy, UtmiPad},
};

pub const USBCMD: usize = 0x140;
pub const USBSTS: usize = 0x144;
pub const ASYNCLISTADDR: usize = 0x158;
pub const TXFILLTUNING: usize = 0x164;
pub const ULPI_VIEWPORT: usize = 0x170;
pub const PORTSC1: usize = 0x184;
pub const USBMODE: usize = 0x1a8;
pub const USB_SUSP_CTRL: usize = 0x400;
pub const ULPIS2S_CTRL: usize = 0x418;
pub const ULPI_TIMING_CTRL_0: usize = 0x424;
pub const ULPI_TIMING_CTRL_1: usize = 0x428;
pub const UTMIP_BIAS_CFG0: usize = 0x80c;
pub const UTMIP_TX_CFG0: usize = 0x820;
pub const UTMIP_MISC_CFG0: usize = 0x824;
pub const UHSIC_PADS_CFG1: usize = 0x820;
pub const UHSIC_STAT_CFG0: usize = 0x828;
pub const AHB_MEM_PREFETCH_CFG3: usize = 0xe4;

pub mod bits {
    pub const CLK_VALID: u32 = 1 << 7;
    pub const CLKEN: u32 = 1 << 6;
    pub const SUSP_CLR: u32 = 1 << 5;
    pub const SUSP_SET: u32 = 1 << 14;
    pub const PHY_RESET: u32 = 1 << 11;

    pub const BIAS_OFF: u32 = (1 << 10) | (1 << 11);
    pub const HS_DISCON_DISABLE: u32 = 1 << 8;
    pub const DPDM_OBSERVE: u32 = 1 << 26;

    pub const CCS: u32 = 1 << 0;
    pub const CSC: u32 = 1 << 1;
    pub const PE: u32 = 1 << 2;
    pub const FPR: u32 = 1 << 6;
    pub const SUSP: u32 = 1 << 7;
    pub const PR: u32 = 1 << 8;
    pub const LS_DPLUS: u32 = 1 << 11;
    pub const PP: u32 = 1 << 12;
    pub const WKCN: u32 = 1 << 20;
    pub const WKDS: u32 = 1 << 21;
    pub const WKOC: u32 = 1 << 22;
    pub const PHCD: u32 = 1 << 23;
    pub const PSPD_MASK: u32 = 0b11 << 26;

    pub const PSPD_FULL: u32 = 0 << 26;
    pub const PSPD_LOW: u32 = 1 << 26;
    pub const PSPD_HIGH: u32 = 2 << 26;
    pub const PSPD_IDLE: u32 = 3 << 26;

    pub const RS: u32 = 1 << 0;
    pub const PCI: u32 = 1 << 2;
    pub const SRI: u32 = 1 << 7;
    pub const HCH: u32 = 1 << 12;

    pub const VIEWPORT_RUN: u32 = 1 << 30;
    pub const VIEWPORT_WAKEUP: u32 = 1 << 31;

    pub const CONNECT_DETECT: u32 = 1 << 0;
    pub const RPD_STROBE: u32 = 1 << 10;
    pub const RPU_STROBE: u32 = 1 << 12;

    pub const CLK_PADOUT_ENA: u32 = 1 << 29;
}

// ==== 寄存器 ====

type Hook = Box<dyn FnMut(u32) -> u32 + Send>;

#[derive(Default)]
struct Bank {
    mem: BTreeMap<usize, u32>,
    log: Vec<(usize, u32)>,
    reads: BTreeMap<usize, usize>,
    read_hooks: BTreeMap<usize, Hook>,
    write_hooks: BTreeMap<usize, Hook>,
}

/// 内存寄存器窗口，带写日志和读写钩子
#[derive(Default)]
pub struct SimRegs(Mutex<Bank>);

impl SimRegs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, offset: usize) -> u32 {
        *self.0.lock().unwrap().mem.get(&offset).unwrap_or(&0)
    }

    pub fn set(&self, offset: usize, value: u32) {
        self.0.lock().unwrap().mem.insert(offset, value);
    }

    pub fn set_bits(&self, offset: usize, mask: u32) {
        let v = self.get(offset);
        self.set(offset, v | mask);
    }

    pub fn clear_bits(&self, offset: usize, mask: u32) {
        let v = self.get(offset);
        self.set(offset, v & !mask);
    }

    /// 按顺序记录的写入值
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.0
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn reads_of(&self, offset: usize) -> usize {
        *self.0.lock().unwrap().reads.get(&offset).unwrap_or(&0)
    }

    pub fn clear_log(&self) {
        self.0.lock().unwrap().log.clear();
    }

    /// 读取时由钩子决定返回值，存储值不变
    pub fn on_read(&self, offset: usize, hook: impl FnMut(u32) -> u32 + Send + 'static) {
        self.0
            .lock()
            .unwrap()
            .read_hooks
            .insert(offset, Box::new(hook));
    }

    /// 写入时由钩子决定存储值（日志里仍是原始写入值）
    pub fn on_write(&self, offset: usize, hook: impl FnMut(u32) -> u32 + Send + 'static) {
        self.0
            .lock()
            .unwrap()
            .write_hooks
            .insert(offset, Box::new(hook));
    }

    /// 视口的 RUN/WAKEUP 位立即自清
    pub fn auto_complete_viewport(&self) {
        self.on_write(ULPI_VIEWPORT, |v| {
            v & !(bits::VIEWPORT_RUN | bits::VIEWPORT_WAKEUP)
        });
    }
}

impl RegisterIo for SimRegs {
    fn read(&self, offset: usize) -> u32 {
        let mut bank = self.0.lock().unwrap();
        *bank.reads.entry(offset).or_default() += 1;
        let value = *bank.mem.get(&offset).unwrap_or(&0);
        match bank.read_hooks.get_mut(&offset) {
            Some(hook) => hook(value),
            None => value,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        let mut bank = self.0.lock().unwrap();
        bank.log.push((offset, value));
        let stored = match bank.write_hooks.get_mut(&offset) {
            Some(hook) => hook(value),
            None => value,
        };
        bank.mem.insert(offset, stored);
    }
}

// ==== 时间 ====

/// 虚拟微秒时钟，延时只推进计数
#[derive(Default)]
pub struct SimKernel {
    now_us: AtomicU64,
}

impl SimKernel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn now(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }
}

impl KernelOp for SimKernel {
    fn delay(&self, duration: Duration) {
        self.now_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }
}

// ==== 平台资源 ====

pub struct SimClock {
    pub name: &'static str,
    enabled: AtomicBool,
    enables: AtomicU32,
    rate: AtomicU64,
    parent_rate: AtomicU64,
    fail_enable: AtomicBool,
}

impl SimClock {
    fn new(name: &'static str, parent_rate: u64) -> Arc<Self> {
        Arc::new(Self {
            name,
            enabled: AtomicBool::new(false),
            enables: AtomicU32::new(0),
            rate: AtomicU64::new(0),
            parent_rate: AtomicU64::new(parent_rate),
            fail_enable: AtomicBool::new(false),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable_count(&self) -> u32 {
        self.enables.load(Ordering::SeqCst)
    }

    pub fn rate(&self) -> u64 {
        self.rate.load(Ordering::SeqCst)
    }

    pub fn fail_enable(&self, fail: bool) {
        self.fail_enable.store(fail, Ordering::SeqCst);
    }
}

struct ClockHandle(Arc<SimClock>);

impl ClockOp for ClockHandle {
    fn enable(&self) -> Result<(), PhyError> {
        if self.0.fail_enable.load(Ordering::SeqCst) {
            return Err(PhyError::ResourceUnavailable(self.0.name));
        }
        self.0.enabled.store(true, Ordering::SeqCst);
        self.0.enables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) {
        self.0.enabled.store(false, Ordering::SeqCst);
    }

    fn rate(&self) -> u64 {
        self.0.rate.load(Ordering::SeqCst)
    }

    fn set_rate(&self, rate: u64) -> Result<(), PhyError> {
        self.0.rate.store(rate, Ordering::SeqCst);
        Ok(())
    }

    fn parent_rate(&self) -> u64 {
        self.0.parent_rate.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct SimRegulator {
    enabled: AtomicBool,
    enables: AtomicU32,
}

impl SimRegulator {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable_count(&self) -> u32 {
        self.enables.load(Ordering::SeqCst)
    }
}

struct RegulatorHandle(Arc<SimRegulator>);

impl RegulatorOp for RegulatorHandle {
    fn enable(&self) -> Result<(), PhyError> {
        self.0.enabled.store(true, Ordering::SeqCst);
        self.0.enables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) {
        self.0.enabled.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default, Clone)]
pub struct GpioState {
    pub label: Option<&'static str>,
    pub output: bool,
    pub high: bool,
}

#[derive(Default)]
pub struct SimGpio {
    lines: Mutex<BTreeMap<u32, GpioState>>,
    /// (line, level) 的输出历史
    history: Mutex<Vec<(u32, bool)>>,
}

impl SimGpio {
    pub fn line(&self, gpio: u32) -> GpioState {
        self.lines
            .lock()
            .unwrap()
            .get(&gpio)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_requested(&self, gpio: u32) -> bool {
        self.line(gpio).label.is_some()
    }

    /// 设置输入电平
    pub fn drive_input(&self, gpio: u32, high: bool) {
        self.lines.lock().unwrap().entry(gpio).or_default().high = high;
    }

    pub fn history(&self, gpio: u32) -> Vec<bool> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(g, _)| *g == gpio)
            .map(|(_, h)| *h)
            .collect()
    }
}

impl GpioOp for SimGpio {
    fn request(&self, gpio: u32, label: &'static str) -> Result<(), PhyError> {
        let mut lines = self.lines.lock().unwrap();
        let line = lines.entry(gpio).or_default();
        if line.label.is_some() {
            return Err(PhyError::ResourceUnavailable(label));
        }
        line.label = Some(label);
        Ok(())
    }

    fn free(&self, gpio: u32) {
        if let Some(line) = self.lines.lock().unwrap().get_mut(&gpio) {
            line.label = None;
        }
    }

    fn direction_output(&self, gpio: u32, high: bool) -> Result<(), PhyError> {
        {
            let mut lines = self.lines.lock().unwrap();
            let line = lines.entry(gpio).or_default();
            line.output = true;
            line.high = high;
        }
        self.history.lock().unwrap().push((gpio, high));
        Ok(())
    }

    fn set_value(&self, gpio: u32, high: bool) {
        self.lines.lock().unwrap().entry(gpio).or_default().high = high;
        self.history.lock().unwrap().push((gpio, high));
    }

    fn get_value(&self, gpio: u32) -> bool {
        self.line(gpio).high
    }
}

pub struct SimPlatform {
    clocks: Mutex<BTreeMap<&'static str, Arc<SimClock>>>,
    regulators: Mutex<BTreeMap<&'static str, Arc<SimRegulator>>>,
    irqs: Mutex<BTreeMap<u32, IrqHandler>>,
    pub gpio: Arc<SimGpio>,
    pub usb1: Arc<SimRegs>,
    pub ahb: Arc<SimRegs>,
}

impl SimPlatform {
    /// 常用时钟齐全，`pll_u` 的父时钟为 `osc_rate`
    pub fn new(osc_rate: u64) -> Arc<Self> {
        let mut clocks = BTreeMap::new();
        for name in ["utmip-pad", "usb2", "usb2min", "sclk", "emc", "ulpi_link"] {
            clocks.insert(name, SimClock::new(name, 0));
        }
        clocks.insert("pll_u", SimClock::new("pll_u", osc_rate));

        Arc::new(Self {
            clocks: Mutex::new(clocks),
            regulators: Mutex::new(BTreeMap::new()),
            irqs: Mutex::new(BTreeMap::new()),
            gpio: Arc::new(SimGpio::default()),
            usb1: SimRegs::new(),
            ahb: SimRegs::new(),
        })
    }

    pub fn clock(&self, name: &str) -> Arc<SimClock> {
        self.clocks.lock().unwrap()[name].clone()
    }

    pub fn remove_clock(&self, name: &str) {
        self.clocks.lock().unwrap().remove(name);
    }

    pub fn add_regulator(&self, name: &'static str) -> Arc<SimRegulator> {
        let reg = Arc::new(SimRegulator::default());
        self.regulators.lock().unwrap().insert(name, reg.clone());
        reg
    }

    pub fn has_irq(&self, irq: u32) -> bool {
        self.irqs.lock().unwrap().contains_key(&irq)
    }

    pub fn fire_irq(&self, irq: u32) {
        let irqs = self.irqs.lock().unwrap();
        let handler = irqs.get(&irq).expect("irq not registered");
        handler();
    }
}

impl PlatformOp for SimPlatform {
    fn clk_get(&self, name: &'static str) -> Result<Box<dyn ClockOp>, PhyError> {
        let clk = self
            .clocks
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(PhyError::ResourceUnavailable(name))?;
        Ok(Box::new(ClockHandle(clk)))
    }

    fn regulator_get(&self, name: &'static str) -> Result<Box<dyn RegulatorOp>, PhyError> {
        let reg = self
            .regulators
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(PhyError::ResourceUnavailable(name))?;
        Ok(Box::new(RegulatorHandle(reg)))
    }

    fn gpio(&self) -> Arc<dyn GpioOp> {
        self.gpio.clone()
    }

    fn request_irq(
        &self,
        irq: u32,
        _name: &'static str,
        handler: IrqHandler,
    ) -> Result<(), PhyError> {
        self.irqs.lock().unwrap().insert(irq, handler);
        Ok(())
    }

    fn free_irq(&self, irq: u32) {
        self.irqs.lock().unwrap().remove(&irq);
    }

    fn map_registers(&self, window: RegisterWindow) -> Result<Arc<dyn RegisterIo>, PhyError> {
        Ok(match window {
            RegisterWindow::Usb1 => self.usb1.clone(),
            RegisterWindow::AhbGizmo => self.ahb.clone(),
        })
    }
}

// ==== 主机控制器 ====

#[derive(Default)]
pub struct SimWork {
    scheduled: Mutex<Vec<Duration>>,
    cancels: AtomicU32,
}

impl SimWork {
    pub fn scheduled(&self) -> Vec<Duration> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl DelayedWorkOp for SimWork {
    fn schedule(&self, delay: Duration) {
        self.scheduled.lock().unwrap().push(delay);
    }

    fn cancel_sync(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// 记录协调器调用的 EHCI 控制器
pub struct SimHost {
    lock: Arc<spin::Mutex<()>>,
    regs: Arc<SimRegs>,
    pub calls: Vec<&'static str>,
    pub deadlines: Vec<(u8, Option<Duration>)>,
    pub suspended_ports: Vec<u8>,
    pub delegated: Vec<HubRequest>,
    pub accessible: bool,
    pub ppc: bool,
}

impl SimHost {
    pub fn new(regs: Arc<SimRegs>) -> Self {
        Self {
            lock: Arc::new(spin::Mutex::new(())),
            regs,
            calls: Vec::new(),
            deadlines: Vec::new(),
            suspended_ports: Vec::new(),
            delegated: Vec::new(),
            accessible: true,
            ppc: true,
        }
    }

    fn assert_locked(&self, what: &str) {
        assert!(self.lock.is_locked(), "{what} called without register lock");
    }

    fn assert_unlocked(&self, what: &str) {
        assert!(!self.lock.is_locked(), "{what} called with register lock held");
    }
}

impl HostControllerOp for SimHost {
    fn register_lock(&self) -> Arc<spin::Mutex<()>> {
        self.lock.clone()
    }

    fn port_count(&self) -> u8 {
        1
    }

    fn has_port_power_control(&self) -> bool {
        self.ppc
    }

    fn halt(&mut self) -> Result<(), PhyError> {
        self.assert_locked("halt");
        self.calls.push("halt");
        self.regs.clear_bits(USBCMD, bits::RS);
        self.regs.set_bits(USBSTS, bits::HCH);
        Ok(())
    }

    fn restart(&mut self) -> Result<(), PhyError> {
        self.assert_unlocked("restart");
        self.calls.push("restart");
        self.regs.set_bits(USBCMD, bits::RS);
        self.regs.clear_bits(USBSTS, bits::HCH);
        Ok(())
    }

    fn set_hw_accessible(&mut self, accessible: bool) {
        self.accessible = accessible;
    }

    fn set_configured(&mut self) {
        self.calls.push("set_configured");
    }

    fn bus_suspend(&mut self) -> Result<(), PhyError> {
        self.assert_unlocked("bus_suspend");
        self.calls.push("bus_suspend");
        Ok(())
    }

    fn bus_resume(&mut self) -> Result<(), PhyError> {
        self.assert_unlocked("bus_resume");
        self.calls.push("bus_resume");
        Ok(())
    }

    fn hub_control(&mut self, req: HubRequest, _buf: &mut [u8]) -> Result<(), PhyError> {
        self.assert_unlocked("hub_control");
        self.delegated.push(req);
        Ok(())
    }

    fn set_resume_deadline(&mut self, port: u8, after: Option<Duration>) {
        self.assert_locked("set_resume_deadline");
        self.deadlines.push((port, after));
    }

    fn mark_port_suspended(&mut self, port: u8) {
        self.assert_locked("mark_port_suspended");
        self.suspended_ports.push(port);
    }

    fn shutdown(&mut self) {
        self.calls.push("shutdown");
    }
}

// ==== 组装 ====

/// 一组共享平台上的仿真资源
///
/// `regs` 是实例 0（USB1）的窗口，也就是平台 `map_registers(Usb1)` 返回的窗口。
pub struct Rig {
    pub regs: Arc<SimRegs>,
    pub kernel: Arc<SimKernel>,
    pub platform: Arc<SimPlatform>,
    pub pad: Arc<UtmiPad>,
}

impl Rig {
    pub fn new(osc_rate: u64) -> Self {
        let platform = SimPlatform::new(osc_rate);
        let regs = platform.usb1.clone();
        // 时钟有效位默认已置位，上电路径不会等满超时
        regs.set(USB_SUSP_CTRL, bits::CLK_VALID | bits::CLKEN);
        regs.set(UTMIP_BIAS_CFG0, bits::BIAS_OFF);
        Self {
            regs,
            kernel: SimKernel::new(),
            platform,
            pad: Arc::new(UtmiPad::new()),
        }
    }

    /// 另一个控制器的寄存器窗口
    pub fn window(&self) -> Arc<SimRegs> {
        let regs = SimRegs::new();
        regs.set(USB_SUSP_CTRL, bits::CLK_VALID | bits::CLKEN);
        regs
    }

    pub fn kernel(&self) -> Kernel {
        Kernel::from_arc(self.kernel.clone())
    }

    pub fn elapsed(&self) -> Duration {
        self.kernel.now()
    }

    pub fn params(&self, instance: u8, config: Option<PhyConfig>) -> PhyParams {
        self.params_on(self.regs.clone(), instance, config)
    }

    pub fn params_on(
        &self,
        regs: Arc<SimRegs>,
        instance: u8,
        config: Option<PhyConfig>,
    ) -> PhyParams {
        self.params_with(
            regs,
            instance,
            config,
            BoardConfig::default(),
            Box::new(NoRecovery),
        )
    }

    pub fn params_with(
        &self,
        regs: Arc<SimRegs>,
        instance: u8,
        config: Option<PhyConfig>,
        board: BoardConfig,
        recovery: Box<dyn RecoveryPolicy>,
    ) -> PhyParams {
        PhyParams {
            instance,
            regs,
            config,
            mode: PhyMode::Host,
            board,
            platform: self.platform.clone(),
            kernel: self.kernel(),
            pad: self.pad.clone(),
            recovery,
        }
    }
}
