//! USB PHY 句柄
//!
//! [`PhyHandle::open`] 根据配置一次性确定收发器类型，之后所有操作都分派到对应的
//! 驱动。不适用于当前类型的操作为空操作（例如 UTMI 上的 `bus_reset`）。
//!
//! ## 生命周期
//!
//! ```text
//! open ──► power_on ──► (set_clock / preresume / postresume / bus_*)* ──► power_off ──► close
//! ```
//!
//! 寄存器窗口和时钟在 `open` 成功到 `close` 之间有效，`close` 消耗句柄。

use alloc::{boxed::Box, sync::Arc};

use enum_dispatch::enum_dispatch;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tock_registers::LocalRegisterCopy;
use usb_phy_if::{
    PhyMode,
    platform::{PlatformOp, RegisterIo, RegisterWindow},
};

use crate::{
    Kernel,
    clock::GatedClock,
    err::{PhyError, Result},
    reg::{Regmap, consts::*, offset::*},
};

pub mod config;
pub mod freq;
mod gpio;
pub mod pad;
pub mod recovery;
mod supply;
mod uhsic;
mod ulpi;
mod ulpi_null;
mod utmi;
pub mod viewport;

pub use config::*;
pub use freq::XtalFreq;
pub use pad::UtmiPad;
pub use recovery::{GpioKickRecovery, KickLines, NoRecovery, RecoveryPolicy};

use gpio::GpioLine;
use pad::PadResources;
use supply::{IrqRegistration, Supply, vbus_irq_handler};
use uhsic::Uhsic;
use ulpi::Ulpi;
use ulpi_null::UlpiNull;
use utmi::Utmi;

/// 端口协商速度，PSPD = 3 表示链路空闲、无设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PortSpeed {
    Full = 0,
    Low = 1,
    High = 2,
}

impl PortSpeed {
    pub fn from_portsc(portsc: LocalRegisterCopy<u32, PORTSC::Register>) -> Option<Self> {
        Self::try_from(portsc.read(PORTSC::PSPD) as u8).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyState {
    Off,
    On,
    /// PHY 时钟已停
    Suspended,
    Resuming,
    /// 上电失败，寄存器状态未知
    Indeterminate,
}

/// 各驱动共用的实例信息
#[derive(Clone)]
pub(crate) struct PhyBase {
    pub instance: u8,
    pub mode: PhyMode,
    pub regs: Regmap,
    pub freq: &'static XtalFreq,
    pub timeouts: PollTimeouts,
}

#[enum_dispatch]
pub(crate) trait PhyOp {
    fn power_on(&mut self) -> Result;
    fn power_off(&mut self);

    fn clk_enable(&mut self) {}
    fn clk_disable(&mut self) {}
    fn preresume(&mut self) {}
    fn postresume(&mut self) {}
    fn restore_start(&mut self, _speed: PortSpeed) {}
    fn restore_end(&mut self) {}

    fn bus_connect(&mut self) -> Result {
        Ok(())
    }

    fn bus_reset(&mut self) -> Result {
        Ok(())
    }

    fn bus_idle(&mut self) -> Result {
        Ok(())
    }

    fn is_device_connected(&self) -> bool {
        true
    }
}

#[enum_dispatch(PhyOp)]
pub(crate) enum PhyDriver {
    Utmi(Utmi),
    Ulpi(Ulpi),
    UlpiNull(UlpiNull),
    Uhsic(Uhsic),
}

/// `PhyHandle::open` 参数
pub struct PhyParams {
    pub instance: u8,
    pub regs: Arc<dyn RegisterIo>,
    /// `None` 时实例 0、2 使用内置 UTMI 默认值
    pub config: Option<PhyConfig>,
    pub mode: PhyMode,
    pub board: BoardConfig,
    pub platform: Arc<dyn PlatformOp>,
    pub kernel: Kernel,
    pub pad: Arc<UtmiPad>,
    /// 仅 HSIC 使用
    pub recovery: Box<dyn RecoveryPolicy>,
}

pub struct PhyHandle {
    // 字段按释放顺序排列：先注销中断，再释放驱动资源，最后关闭 PLL
    _vbus_irq: Option<IrqRegistration>,
    driver: PhyDriver,
    supply: Option<Arc<Supply>>,
    base: PhyBase,
    kind: PhyKind,
    supply_off_on_power_off: bool,
    state: PhyState,
    _pll_u: GatedClock,
}

impl PhyHandle {
    pub fn open(params: PhyParams) -> Result<Self> {
        let PhyParams {
            instance,
            regs,
            config,
            mode,
            board,
            platform,
            kernel,
            pad,
            recovery,
        } = params;

        if instance > 2 {
            return Err(PhyError::InvalidInstance(instance));
        }

        let config = match config {
            Some(config) => config,
            None => PhyConfig::Utmi(
                UtmiConfig::default_for(instance).ok_or(PhyError::MissingConfig(instance))?,
            ),
        };
        let kind = config.kind();

        let mut pll_u = GatedClock::get(&platform, "pll_u")?;
        pll_u.enable()?;

        let table: &'static [XtalFreq] = match kind {
            PhyKind::Uhsic => &freq::UHSIC_FREQ_TABLE,
            _ => &freq::UTMI_FREQ_TABLE,
        };
        let parent_rate = pll_u.parent_rate();
        let freq = freq::lookup(table, parent_rate)
            .inspect_err(|_| error!("PHY{instance}: invalid pll_u parent rate {parent_rate}"))?;

        let base = PhyBase {
            instance,
            mode,
            regs: Regmap::new(regs.clone(), kernel.clone()),
            freq,
            timeouts: board.timeouts,
        };

        let driver: PhyDriver = match config {
            PhyConfig::Utmi(cfg) => {
                let pad_regs = if instance == 0 {
                    regs
                } else {
                    platform.map_registers(RegisterWindow::Usb1)?
                };
                let pad_res = PadResources {
                    clk: platform.clk_get("utmip-pad")?,
                    regs: Regmap::new(pad_regs, kernel.clone()),
                };
                Utmi::new(
                    base.clone(),
                    cfg,
                    pad,
                    pad_res,
                    platform.gpio(),
                    board.vbus_gpio,
                )
                .into()
            }
            PhyConfig::Ulpi(cfg) => {
                let clk = GatedClock::get(&platform, cfg.clk)?;
                let reset = GpioLine::request(platform.gpio(), cfg.reset_gpio, "ulpi_phy_reset_b")?;
                reset.output(false)?;
                Ulpi::new(base.clone(), clk, reset).into()
            }
            PhyConfig::UlpiNull(cfg) => UlpiNull::new(base.clone(), cfg).into(),
            PhyConfig::Uhsic(cfg) => {
                let ahb = if cfg.ahb_prefetch_fix {
                    Some(Regmap::new(
                        platform.map_registers(RegisterWindow::AhbGizmo)?,
                        kernel.clone(),
                    ))
                } else {
                    None
                };
                Uhsic::new(base.clone(), cfg, ahb, recovery).into()
            }
        };

        let supply = match board.vdd_supply {
            Some(name) => Some(Arc::new(Supply::new(platform.regulator_get(name)?))),
            None => None,
        };

        let vbus_irq = match board.vbus_irq {
            Some(irq) if instance == 0 => Some(
                IrqRegistration::request(
                    platform.clone(),
                    irq,
                    "usb_phy_vbus",
                    vbus_irq_handler(supply.clone(), kernel, board.vbus_notify),
                )
                .inspect_err(|e| error!("PHY{instance}: failed to register VBUS irq: {e}"))?,
            ),
            _ => None,
        };

        info!(
            "PHY{instance}: opened {kind:?} in {mode:?} mode, reference clock {} Hz",
            freq.freq
        );

        Ok(Self {
            _vbus_irq: vbus_irq,
            driver,
            supply,
            base,
            kind,
            supply_off_on_power_off: board.supply_off_on_power_off,
            state: PhyState::Off,
            _pll_u: pll_u,
        })
    }

    pub fn instance(&self) -> u8 {
        self.base.instance
    }

    pub fn kind(&self) -> PhyKind {
        self.kind
    }

    pub fn mode(&self) -> PhyMode {
        self.base.mode
    }

    pub fn state(&self) -> PhyState {
        self.state
    }

    pub fn freq(&self) -> &'static XtalFreq {
        self.base.freq
    }

    pub fn is_hsic(&self) -> bool {
        self.kind == PhyKind::Uhsic
    }

    pub fn power_on(&mut self) -> Result {
        if let Some(supply) = &self.supply {
            supply.enable()?;
        }

        let res = self.driver.power_on();
        self.state = match res {
            Ok(()) => PhyState::On,
            Err(_) => PhyState::Indeterminate,
        };
        res
    }

    /// 已关闭时为空操作，共享的 pad 计数不会被重复递减
    pub fn power_off(&mut self) {
        if self.state == PhyState::Off {
            debug!("PHY{}: already off", self.base.instance);
            return;
        }
        self.driver.power_off();

        if self.supply_off_on_power_off
            && let Some(supply) = &self.supply
        {
            supply.disable();
        }
        self.state = PhyState::Off;
    }

    /// 开关 PHY 时钟，超时返回给调用方，状态置为 `Indeterminate`
    pub fn set_clock(&mut self, on: bool) -> Result {
        let instance = self.base.instance;
        let regs = &self.base.regs;
        let timeout = self.base.timeouts.short;

        if on {
            // SUSP_CLR 需要脉冲写
            regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_CLR::SET);

            let valid = regs
                .wait_for(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_CLK_VALID::SET, timeout)
                .inspect_err(|_| error!("PHY{instance}: failed to turn on PHY clock (CLK_VALID)"));
            let clken = regs
                .wait_for(USB_SUSP_CTRL, USB_SUSP_CTRL::CLKEN::SET, timeout)
                .inspect_err(|_| error!("PHY{instance}: failed to turn on PHY clock (CLKEN)"));

            regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_CLR::CLEAR);
            self.settle_clock(valid.and(clken), PhyState::On)
        } else {
            if instance == 0 {
                regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_SET::SET);
                regs.kernel().delay_us(10);
                regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_SET::CLEAR);
            } else {
                regs.modify(PORTSC1, PORTSC::PHCD::SET);
            }

            let res = regs
                .wait_for(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_CLK_VALID::CLEAR, timeout)
                .inspect_err(|_| error!("PHY{instance}: failed to turn off PHY clock"));
            self.settle_clock(res, PhyState::Suspended)
        }
    }

    fn settle_clock(&mut self, res: Result, target: PhyState) -> Result {
        self.state = match res {
            Ok(()) => target,
            Err(_) => PhyState::Indeterminate,
        };
        res
    }

    pub fn clk_enable(&mut self) {
        self.driver.clk_enable();
    }

    pub fn clk_disable(&mut self) {
        self.driver.clk_disable();
    }

    pub fn preresume(&mut self) {
        self.driver.preresume();
        self.state = PhyState::Resuming;
    }

    pub fn postresume(&mut self) {
        self.driver.postresume();
        self.state = PhyState::On;
    }

    pub fn restore_start(&mut self, speed: PortSpeed) {
        self.driver.restore_start(speed);
    }

    pub fn restore_end(&mut self) {
        self.driver.restore_end();
    }

    pub fn bus_connect(&mut self) -> Result {
        if self.is_hsic()
            && let Some(supply) = &self.supply
            && !supply.is_on()
        {
            return Err(PhyError::NotConnected);
        }
        self.driver.bus_connect()
    }

    pub fn bus_reset(&mut self) -> Result {
        self.driver.bus_reset()
    }

    pub fn bus_idle(&mut self) -> Result {
        self.driver.bus_idle()
    }

    pub fn is_device_connected(&self) -> bool {
        self.driver.is_device_connected()
    }

    /// 读取当前端口速度
    pub fn port_speed(&self) -> Option<PortSpeed> {
        PortSpeed::from_portsc(self.base.regs.read(PORTSC1))
    }

    /// 依次注销 VBUS 中断、释放驱动持有的 GPIO 与时钟，最后关闭 pll_u
    ///
    /// 不会自动下电，调用方应先 [`PhyHandle::power_off`]。
    pub fn close(self) {
        let instance = self.base.instance;
        if self.state != PhyState::Off {
            warn!("PHY{instance}: closed while {:?}", self.state);
        }

        let Self {
            _vbus_irq: vbus_irq,
            driver,
            _pll_u: mut pll_u,
            ..
        } = self;
        drop(vbus_irq);
        drop(driver);
        pll_u.disable();
        info!("PHY{instance}: closed");
    }
}
