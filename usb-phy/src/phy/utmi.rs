//! 片内 UTMI 收发器

use alloc::sync::Arc;

use usb_phy_if::{PhyMode, platform::GpioOp};

use super::{
    PhyBase, PhyOp, PortSpeed,
    config::UtmiConfig,
    gpio::GpioLine,
    pad::{PadResources, UtmiPad},
};
use crate::{
    err::Result,
    reg::{consts::*, offset::*},
};

pub(crate) struct Utmi {
    base: PhyBase,
    config: UtmiConfig,
    pad: Arc<UtmiPad>,
    pad_res: PadResources,
    gpio: Arc<dyn GpioOp>,
    vbus_gpio: Option<u32>,
    vbus: Option<GpioLine>,
}

impl Utmi {
    pub fn new(
        base: PhyBase,
        config: UtmiConfig,
        pad: Arc<UtmiPad>,
        pad_res: PadResources,
        gpio: Arc<dyn GpioOp>,
        vbus_gpio: Option<u32>,
    ) -> Self {
        Self {
            base,
            config,
            pad,
            pad_res,
            gpio,
            vbus_gpio,
            vbus: None,
        }
    }

    fn vbus_enable(&mut self) {
        let Some(line) = self.vbus_gpio else {
            return;
        };
        if self.vbus.is_some() {
            return;
        }
        let vbus = match GpioLine::request(self.gpio.clone(), line, "VBUS_USB") {
            Ok(vbus) => vbus,
            Err(e) => {
                warn!("UTMI{}: VBUS gpio {line} request failed: {e}", self.base.instance);
                return;
            }
        };
        if let Err(e) = vbus.output(true) {
            warn!("UTMI{}: VBUS gpio {line} direction failed: {e}", self.base.instance);
            return;
        }
        vbus.set(true);
        self.vbus = Some(vbus);
    }

    fn vbus_disable(&mut self) {
        if let Some(vbus) = self.vbus.take() {
            vbus.set(false);
        }
    }
}

impl PhyOp for Utmi {
    fn power_on(&mut self) -> Result {
        let instance = self.base.instance;
        let mode = self.base.mode;
        let freq = self.base.freq;
        let cfg = self.config;
        let regs = &self.base.regs;

        debug!("UTMI{instance}: power on");

        // 复位期间才能改写收发器参数
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_RESET::SET);

        if instance == 0 {
            regs.modify(USB1_LEGACY_CTRL, USB1_LEGACY_CTRL::NO_LEGACY_MODE::SET);
        }

        regs.modify(UTMIP_TX_CFG0, UTMIP_TX_CFG0::FS_PREAMBLE_J::CLEAR);
        regs.modify(
            UTMIP_HSRX_CFG0,
            UTMIP_HSRX_CFG0::IDLE_WAIT.val(cfg.idle_wait_delay as u32)
                + UTMIP_HSRX_CFG0::ELASTIC_LIMIT.val(cfg.elastic_limit as u32),
        );
        regs.modify(
            UTMIP_HSRX_CFG1,
            UTMIP_HSRX_CFG1::HS_SYNC_START_DLY.val(cfg.hssync_start_delay as u32),
        );
        regs.modify(
            UTMIP_DEBOUNCE_CFG0,
            UTMIP_DEBOUNCE_CFG0::BIAS_DEBOUNCE_A.val(freq.debounce as u32),
        );
        regs.modify(UTMIP_MISC_CFG0, UTMIP_MISC_CFG0::SUSPEND_EXIT_ON_EDGE::CLEAR);
        regs.modify(
            UTMIP_MISC_CFG1,
            UTMIP_MISC_CFG1::PLL_ACTIVE_DLY_COUNT.val(freq.active_delay as u32)
                + UTMIP_MISC_CFG1::PLLU_STABLE_COUNT.val(freq.stable_count as u32),
        );
        regs.modify(
            UTMIP_PLL_CFG1,
            UTMIP_PLL_CFG1::XTAL_FREQ_COUNT.val(freq.xtal_freq_count as u32)
                + UTMIP_PLL_CFG1::PLLU_ENABLE_DLY_COUNT.val(freq.enable_delay as u32),
        );

        if mode == PhyMode::Device {
            regs.modify(
                USB_SUSP_CTRL,
                USB_SUSP_CTRL::WAKE_ON_CNNT_EN_DEV::CLEAR
                    + USB_SUSP_CTRL::WAKE_ON_DISCON_EN_DEV::CLEAR,
            );
        }

        self.pad.power_on(&self.pad_res);

        regs.modify(
            UTMIP_XCVR_CFG0,
            UTMIP_XCVR_CFG0::FORCE_PD_POWERDOWN::CLEAR
                + UTMIP_XCVR_CFG0::FORCE_PD2_POWERDOWN::CLEAR
                + UTMIP_XCVR_CFG0::FORCE_PDZI_POWERDOWN::CLEAR
                + UTMIP_XCVR_CFG0::SETUP.val(cfg.xcvr_setup as u32)
                + UTMIP_XCVR_CFG0::LSFSLEW.val(cfg.xcvr_lsfslew as u32)
                + UTMIP_XCVR_CFG0::LSRSLEW.val(cfg.xcvr_lsrslew as u32)
                + UTMIP_XCVR_CFG0::HSSLEW_MSB.val(0),
        );
        regs.modify(
            UTMIP_XCVR_CFG1,
            UTMIP_XCVR_CFG1::FORCE_PDDISC_POWERDOWN::CLEAR
                + UTMIP_XCVR_CFG1::FORCE_PDCHRP_POWERDOWN::CLEAR
                + UTMIP_XCVR_CFG1::FORCE_PDDR_POWERDOWN::CLEAR
                + UTMIP_XCVR_CFG1::TERM_RANGE_ADJ.val(cfg.term_range_adj as u32),
        );
        regs.modify(UTMIP_BAT_CHRG_CFG0, UTMIP_BAT_CHRG_CFG0::PD_CHRG::CLEAR);
        regs.modify(UTMIP_BIAS_CFG1, UTMIP_BIAS_CFG1::BIAS_PDTRK_COUNT.val(5));

        if instance == 0 {
            let fuse = match mode {
                PhyMode::Device => UTMIP_SPARE_CFG0::FUSE_SETUP_SEL::CLEAR,
                PhyMode::Host => UTMIP_SPARE_CFG0::FUSE_SETUP_SEL::SET,
            };
            regs.modify(UTMIP_SPARE_CFG0, fuse);
        }

        if instance == 2 {
            regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_ENABLE::SET);
        }

        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_RESET::CLEAR);

        if instance == 0 {
            regs.modify(
                USB1_LEGACY_CTRL,
                USB1_LEGACY_CTRL::VBUS_SENSE_CTL::ASessVld,
            );
            regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_SET::CLEAR);
        }

        self.clk_enable();

        if instance == 2 {
            self.base.regs.modify(PORTSC1, PORTSC::PTS.val(0));
        }

        if mode == PhyMode::Host {
            self.vbus_enable();
        }

        Ok(())
    }

    fn power_off(&mut self) {
        let instance = self.base.instance;
        debug!("UTMI{instance}: power off");

        self.clk_disable();

        match self.base.mode {
            PhyMode::Host => self.vbus_disable(),
            PhyMode::Device => self.base.regs.modify(
                USB_SUSP_CTRL,
                USB_SUSP_CTRL::WAKE_ON_CNNT_EN_DEV::SET
                    + USB_SUSP_CTRL::WAKEUP_DEBOUNCE_COUNT.val(5),
            ),
        }

        let regs = &self.base.regs;
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_RESET::SET);
        regs.modify(UTMIP_BAT_CHRG_CFG0, UTMIP_BAT_CHRG_CFG0::PD_CHRG::SET);
        regs.modify(
            UTMIP_XCVR_CFG0,
            UTMIP_XCVR_CFG0::FORCE_PD_POWERDOWN::SET
                + UTMIP_XCVR_CFG0::FORCE_PD2_POWERDOWN::SET
                + UTMIP_XCVR_CFG0::FORCE_PDZI_POWERDOWN::SET,
        );
        regs.modify(
            UTMIP_XCVR_CFG1,
            UTMIP_XCVR_CFG1::FORCE_PDDISC_POWERDOWN::SET
                + UTMIP_XCVR_CFG1::FORCE_PDCHRP_POWERDOWN::SET
                + UTMIP_XCVR_CFG1::FORCE_PDDR_POWERDOWN::SET,
        );

        if let Err(e) = self.pad.power_off(&self.pad_res) {
            error!("UTMI{instance}: {e}");
        }
    }

    fn clk_enable(&mut self) {
        let regs = &self.base.regs;
        match self.base.instance {
            0 => {
                regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_CLR::SET);
                regs.kernel().delay_us(10);
                regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_CLR::CLEAR);
            }
            2 => regs.modify(PORTSC1, PORTSC::PHCD::CLEAR),
            // 实例 1 的时钟由链路侧控制
            _ => {}
        }

        if regs
            .wait_for(
                USB_SUSP_CTRL,
                USB_SUSP_CTRL::PHY_CLK_VALID::SET,
                self.base.timeouts.short,
            )
            .is_err()
        {
            error!(
                "UTMI{}: timeout waiting for phy clock to stabilize",
                self.base.instance
            );
        }
    }

    fn clk_disable(&mut self) {
        let regs = &self.base.regs;
        match self.base.instance {
            0 => {
                regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_SET::SET);
                regs.kernel().delay_us(10);
                regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_SET::CLEAR);
            }
            2 => regs.modify(PORTSC1, PORTSC::PHCD::SET),
            _ => {}
        }

        if regs
            .wait_for(
                USB_SUSP_CTRL,
                USB_SUSP_CTRL::PHY_CLK_VALID::CLEAR,
                self.base.timeouts.short,
            )
            .is_err()
        {
            error!(
                "UTMI{}: timeout waiting for phy clock to stop",
                self.base.instance
            );
        }
    }

    fn preresume(&mut self) {
        self.base
            .regs
            .modify(UTMIP_TX_CFG0, UTMIP_TX_CFG0::HS_DISCON_DISABLE::SET);
    }

    fn postresume(&mut self) {
        self.base
            .regs
            .modify(UTMIP_TX_CFG0, UTMIP_TX_CFG0::HS_DISCON_DISABLE::CLEAR);
    }

    fn restore_start(&mut self, speed: PortSpeed) {
        let regs = &self.base.regs;
        let observe = match speed {
            PortSpeed::Low => UTMIP_MISC_CFG0::DPDM_OBSERVE_SEL::FsK,
            _ => UTMIP_MISC_CFG0::DPDM_OBSERVE_SEL::FsJ,
        };
        regs.modify(UTMIP_MISC_CFG0, observe);
        regs.kernel().delay_us(1);
        regs.modify(UTMIP_MISC_CFG0, UTMIP_MISC_CFG0::DPDM_OBSERVE::SET);
        regs.kernel().delay_us(10);
    }

    fn restore_end(&mut self) {
        let regs = &self.base.regs;
        regs.modify(UTMIP_MISC_CFG0, UTMIP_MISC_CFG0::DPDM_OBSERVE::CLEAR);
        regs.kernel().delay_us(10);
    }
}
