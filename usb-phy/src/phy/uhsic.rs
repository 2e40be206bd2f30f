//! 芯片间 HSIC 链路
//!
//! HSIC 没有 VBUS 和模拟线路状态，连接/复位通过 strobe 上下拉和强制收发器模式
//! 完成。链路训练依赖对端配合，失败时交给 [`RecoveryPolicy`] 处理。

use alloc::boxed::Box;

use tock_registers::{RegisterLongName, fields::FieldValue};

use super::{PhyBase, PhyOp, PortSpeed, config::UhsicConfig, recovery::RecoveryPolicy};
use crate::{
    err::{PhyError, Result},
    reg::{Reg, Regmap, consts::*, offset::*},
};

/// FIFO 填充阈值，低于该值时 HSIC 会出现下溢
const TXFIFO_THRESHOLD: u32 = 0x10;

pub(crate) struct Uhsic {
    base: PhyBase,
    config: UhsicConfig,
    /// AHB 仲裁器窗口，仅在需要修补预取配置时映射
    ahb: Option<Regmap>,
    recovery: Box<dyn RecoveryPolicy>,
}

impl Uhsic {
    pub fn new(
        base: PhyBase,
        config: UhsicConfig,
        ahb: Option<Regmap>,
        recovery: Box<dyn RecoveryPolicy>,
    ) -> Self {
        Self {
            base,
            config,
            ahb,
            recovery,
        }
    }

    fn fix_txfill_threshold(&self) {
        let regs = &self.base.regs;
        if regs.read(TXFILLTUNING).read(TXFILLTUNING::TXFIFO_THRES) != TXFIFO_THRESHOLD {
            regs.write(
                TXFILLTUNING,
                TXFILLTUNING::TXFIFO_THRES.val(TXFIFO_THRESHOLD),
            );
        }
    }

    /// 预取引擎勘误：只在寄存器尚未使能时写入修正值
    fn fix_ahb_prefetch(&self) {
        let Some(ahb) = &self.ahb else {
            return;
        };
        if ahb.is_set(AHB_MEM_PREFETCH_CFG3, AHB_MEM_PREFETCH_CFG::ENABLE) {
            return;
        }
        let value = AHB_MEM_PREFETCH_CFG::ENABLE::SET
            + AHB_MEM_PREFETCH_CFG::AHB_MST_ID.val(18)
            // 8 KiB
            + AHB_MEM_PREFETCH_CFG::ADDR_BNDRY.val(9)
            + AHB_MEM_PREFETCH_CFG::SPEC_THROTTLE.val(0)
            + AHB_MEM_PREFETCH_CFG::INACTIVITY_TIMEOUT.val(0x800);
        ahb.write(AHB_MEM_PREFETCH_CFG3, value);
        debug!(
            "HSIC{}: AHB prefetch config set to {:#010x}",
            self.base.instance,
            ahb.read_raw(AHB_MEM_PREFETCH_CFG3)
        );
    }

    /// 进入强制收发器模式并上拉 strobe，对端据此开始连接
    fn arm_connect_detect(&self) {
        let regs = &self.base.regs;
        regs.modify(
            UHSIC_MISC_CFG0,
            UHSIC_MISC_CFG0::DETECT_SHORT_CONNECT::SET,
        );
        regs.kernel().delay_us(1);
        regs.modify(UHSIC_MISC_CFG0, UHSIC_MISC_CFG0::FORCE_XCVR_MODE::SET);
        regs.modify(
            UHSIC_PADS_CFG1,
            UHSIC_PADS_CFG1::RPD_STROBE::CLEAR + UHSIC_PADS_CFG1::RPU_STROBE::SET,
        );
    }

    fn wait_connect_detect(&self) -> Result {
        self.base.regs.wait_for(
            UHSIC_STAT_CFG0,
            UHSIC_STAT_CFG0::CONNECT_DETECT::SET,
            self.base.timeouts.long,
        )
    }

    fn wait_link<R: RegisterLongName>(
        &self,
        reg: Reg<R>,
        val: FieldValue<u32, R>,
        what: &str,
    ) -> Result {
        self.base
            .regs
            .wait_for(reg, val, self.base.timeouts.long)
            .inspect_err(|_| error!("HSIC{}: timeout waiting for {what}", self.base.instance))
    }

    /// 初始化完成后端口应处于空闲（PSPD = 3），否则寄存器没有写进去
    fn link_init_failed(&self) -> bool {
        PortSpeed::from_portsc(self.base.regs.read(PORTSC1)).is_some()
    }

    fn init_link(&mut self) {
        let cfg = self.config;
        let freq = self.base.freq;

        self.recovery.set_link_enabled(true);

        let regs = &self.base.regs;
        let kernel = regs.kernel();

        debug!(
            "HSIC{}: power on, PORTSC1 {:#x}",
            self.base.instance,
            regs.read_raw(PORTSC1)
        );

        regs.modify(
            UHSIC_PADS_CFG1,
            UHSIC_PADS_CFG1::PD_BG::CLEAR
                + UHSIC_PADS_CFG1::PD_TX::CLEAR
                + UHSIC_PADS_CFG1::PD_TRK::CLEAR
                + UHSIC_PADS_CFG1::PD_RX::CLEAR
                + UHSIC_PADS_CFG1::PD_ZI::CLEAR
                + UHSIC_PADS_CFG1::RPD_DATA::CLEAR
                + UHSIC_PADS_CFG1::RPD_STROBE::CLEAR
                + UHSIC_PADS_CFG1::RX_SEL::SET,
        );
        kernel.delay_us(2);

        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_RESET::SET);
        kernel.delay_us(30);
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_ENABLE::SET);

        regs.modify(
            UHSIC_HSRX_CFG0,
            UHSIC_HSRX_CFG0::IDLE_WAIT.val(cfg.idle_wait_delay as u32)
                + UHSIC_HSRX_CFG0::ELASTIC_UNDERRUN_LIMIT.val(cfg.elastic_underrun_limit as u32)
                + UHSIC_HSRX_CFG0::ELASTIC_OVERRUN_LIMIT.val(cfg.elastic_overrun_limit as u32),
        );
        regs.modify(
            UHSIC_HSRX_CFG1,
            UHSIC_HSRX_CFG1::HS_SYNC_START_DLY.val(cfg.sync_start_delay as u32),
        );
        regs.modify(UHSIC_MISC_CFG0, UHSIC_MISC_CFG0::SUSPEND_EXIT_ON_EDGE::SET);
        regs.modify(
            UHSIC_MISC_CFG1,
            UHSIC_MISC_CFG1::PLLU_STABLE_COUNT.val(freq.stable_count as u32),
        );
        regs.modify(
            UHSIC_PLL_CFG1,
            UHSIC_PLL_CFG1::PLLU_ENABLE_DLY_COUNT.val(freq.enable_delay as u32)
                + UHSIC_PLL_CFG1::XTAL_FREQ_COUNT.val(freq.xtal_freq_count as u32),
        );

        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_RESET::CLEAR);
        kernel.delay_us(2);

        regs.modify(PORTSC1, PORTSC::PTS.val(0));

        self.fix_txfill_threshold();
        self.fix_ahb_prefetch();

        let regs = &self.base.regs;
        regs.modify(
            PORTSC1,
            PORTSC::WKOC::CLEAR + PORTSC::WKDS::CLEAR + PORTSC::WKCN::CLEAR,
        );
        regs.modify(
            UHSIC_PADS_CFG0,
            UHSIC_PADS_CFG0::TX_RTUNE.val(cfg.tx_rtune as u32),
        );

        if regs
            .wait_for(
                USB_SUSP_CTRL,
                USB_SUSP_CTRL::PHY_CLK_VALID::SET,
                self.base.timeouts.long,
            )
            .is_err()
        {
            error!(
                "HSIC{}: timeout waiting for phy clock to stabilize",
                self.base.instance
            );
        }
    }
}

impl PhyOp for Uhsic {
    fn power_on(&mut self) -> Result {
        let instance = self.base.instance;
        if let Some(preinit) = self.config.preinit {
            preinit();
        }

        let mut retries = self.recovery.power_on_retries();
        loop {
            self.init_link();

            // 对端异常复位后不需要恢复寄存器
            if retries == 0 || !self.recovery.remote_present() || !self.link_init_failed() {
                return Ok(());
            }
            retries -= 1;

            error!("HSIC{instance}: register init failed, retrying power on");
            self.power_off();
            // 可能处于系统恢复路径，只能忙等
            self.base.regs.kernel().delay_ms(10);
            self.recovery.pulse_remote_wakeup(self.base.regs.kernel());
        }
    }

    fn power_off(&mut self) {
        let regs = &self.base.regs;
        debug!("HSIC{}: power off", self.base.instance);

        regs.modify(
            UHSIC_PADS_CFG1,
            UHSIC_PADS_CFG1::RPU_STROBE::CLEAR + UHSIC_PADS_CFG1::RPD_STROBE::SET,
        );
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_RESET::SET);
        regs.kernel().delay_us(30);
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_ENABLE::CLEAR);

        if self.recovery.remote_present() {
            self.recovery.set_link_active(false);
        }
        self.recovery.set_link_enabled(false);
    }

    fn postresume(&mut self) {
        self.fix_txfill_threshold();
    }

    fn bus_connect(&mut self) -> Result {
        self.arm_connect_detect();

        if !self.recovery.remote_present() {
            return Err(PhyError::NotConnected);
        }
        self.recovery.set_link_active(true);

        self.wait_link(
            UHSIC_STAT_CFG0,
            UHSIC_STAT_CFG0::CONNECT_DETECT::SET,
            "connect detect",
        )?;
        self.wait_link(PORTSC1, PORTSC::LS_DPLUS::SET, "dplus state")
    }

    fn bus_reset(&mut self) -> Result {
        let regs = &self.base.regs;
        let kernel = regs.kernel();

        regs.modify(PORTSC1, PORTSC::PTC::ForceEnableHs);
        kernel.delay_us(2);
        regs.modify(PORTSC1, PORTSC::PTC::Disabled);
        kernel.delay_us(2);

        if !self.recovery.remote_present() {
            return Err(PhyError::NotConnected);
        }

        self.wait_link(PORTSC1, PORTSC::LS::SE0, "SE0")?;
        self.wait_link(PORTSC1, PORTSC::CCS::SET, "connection status")?;
        self.wait_link(PORTSC1, PORTSC::PSPD::High, "high speed configuration")?;

        let regs = &self.base.regs;
        regs.modify(USBCMD, USBCMD::RS::CLEAR);
        self.wait_link(USBSTS, USBSTS::HCH::SET, "controller halt")?;

        let regs = &self.base.regs;
        regs.modify(
            UHSIC_PADS_CFG1,
            UHSIC_PADS_CFG1::RPU_STROBE::CLEAR + UHSIC_PADS_CFG1::RPD_STROBE::SET,
        );
        regs.kernel().delay_ms(50);
        regs.modify(
            UHSIC_PADS_CFG1,
            UHSIC_PADS_CFG1::RPD_STROBE::CLEAR + UHSIC_PADS_CFG1::RPU_STROBE::SET,
        );

        regs.modify(USBCMD, USBCMD::RS::SET);
        regs.modify(UHSIC_PADS_CFG1, UHSIC_PADS_CFG1::RPU_STROBE::CLEAR);

        self.wait_link(USBCMD, USBCMD::RS::SET, "controller run")
    }

    fn bus_idle(&mut self) -> Result {
        let instance = self.base.instance;
        self.arm_connect_detect();

        if !self.recovery.remote_present() {
            self.recovery.set_link_enabled(false);
            return Err(PhyError::NotConnected);
        }
        self.recovery.set_link_active(true);

        if self.wait_connect_detect().is_ok() {
            return Ok(());
        }

        let attempts = self.recovery.reconnect_attempts();
        if attempts == 0 {
            return Err(PhyError::NotConnected);
        }

        warn!("HSIC{instance}: connect detect timeout, trying reconnection");
        self.recovery.set_link_active(false);
        self.recovery.kick_remote(self.base.regs.kernel());
        self.recovery.set_link_active(true);

        for _ in 0..attempts {
            if self.wait_connect_detect().is_ok() {
                return Ok(());
            }
        }

        // 从头恢复：关闭链路使能
        warn!("HSIC{instance}: reconnection failed, disabling link");
        self.recovery.set_link_enabled(false);
        Err(PhyError::NotConnected)
    }

    fn is_device_connected(&self) -> bool {
        let regs = &self.base.regs;
        if !regs.is_set(UHSIC_STAT_CFG0, UHSIC_STAT_CFG0::CONNECT_DETECT) {
            debug!("HSIC{}: no device connection", self.base.instance);
            return false;
        }
        self.wait_link(PORTSC1, PORTSC::LS_DPLUS::SET, "dplus state")
            .is_ok()
    }
}
