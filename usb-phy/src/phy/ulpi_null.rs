//! ULPI 直连模式（无外置收发器）
//!
//! 控制器的 ULPI 接口直接连到对端芯片，由 ULPIS2S 逻辑模拟收发器，时钟从
//! shadow clock 回环得到。

use super::{
    PhyBase, PhyOp,
    config::{UlpiNullConfig, UlpiTrimmer},
};
use crate::{
    PhyMode,
    err::Result,
    reg::{consts::*, offset::*},
};

pub(crate) struct UlpiNull {
    base: PhyBase,
    config: UlpiNullConfig,
}

impl UlpiNull {
    pub fn new(base: PhyBase, config: UlpiNullConfig) -> Self {
        Self { base, config }
    }
}

impl PhyOp for UlpiNull {
    fn power_on(&mut self) -> Result {
        let regs = &self.base.regs;
        let kernel = regs.kernel();
        let trimmer = self.config.trimmer.unwrap_or_default();
        let UlpiTrimmer {
            shadow_clk_delay,
            clock_out_delay,
            data_trimmer,
            stpdirnxt_trimmer,
        } = trimmer;

        debug!("ULPI-NULL{}: power on", self.base.instance);

        if let Some(preinit) = self.config.preinit {
            preinit();
        }

        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_RESET::SET);
        regs.modify(
            ULPI_TIMING_CTRL_0,
            ULPI_TIMING_CTRL_0::OUTPUT_PINMUX_BYP::SET + ULPI_TIMING_CTRL_0::CLKOUT_PINMUX_BYP::SET,
        );
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::ULPI_PHY_ENABLE::SET);

        regs.modify(
            ULPI_TIMING_CTRL_0,
            ULPI_TIMING_CTRL_0::SHADOW_CLK_LOOPBACK_EN::SET
                + ULPI_TIMING_CTRL_0::SHADOW_CLK_SEL::SET
                + ULPI_TIMING_CTRL_0::OUTPUT_PINMUX_BYP::SET
                + ULPI_TIMING_CTRL_0::CLKOUT_PINMUX_BYP::SET
                + ULPI_TIMING_CTRL_0::LBK_PAD_EN::SET
                + ULPI_TIMING_CTRL_0::SHADOW_CLK_DELAY.val(shadow_clk_delay as u32)
                + ULPI_TIMING_CTRL_0::CLOCK_OUT_DELAY.val(clock_out_delay as u32)
                + ULPI_TIMING_CTRL_0::LBK_PAD_E_INPUT_OR::SET,
        );
        regs.write_raw(ULPI_TIMING_CTRL_1, 0);
        kernel.delay_us(10);

        let spare = match self.base.mode {
            PhyMode::Host => ULPIS2S_CTRL::SPARE::Host,
            PhyMode::Device => ULPIS2S_CTRL::SPARE::Device,
        };
        regs.write(
            ULPIS2S_CTRL,
            ULPIS2S_CTRL::ENA::SET + ULPIS2S_CTRL::PLLU_MASTER_BLASTER60::SET + spare,
        );

        regs.modify(ULPI_TIMING_CTRL_0, ULPI_TIMING_CTRL_0::CORE_CLK_SEL::SET);
        kernel.delay_us(10);

        // 时钟输出打开之前无法锁存 trimmer
        regs.modify(ULPI_TIMING_CTRL_0, ULPI_TIMING_CTRL_0::CLK_OUT_ENA::SET);
        kernel.delay_us(10);

        let sel = ULPI_TIMING_CTRL_1::DATA_TRIMMER_SEL.val(data_trimmer as u32)
            + ULPI_TIMING_CTRL_1::STPDIRNXT_TRIMMER_SEL.val(stpdirnxt_trimmer as u32)
            + ULPI_TIMING_CTRL_1::DIR_TRIMMER_SEL.val(4);
        regs.write(ULPI_TIMING_CTRL_1, sel);
        kernel.delay_us(10);
        regs.write(
            ULPI_TIMING_CTRL_1,
            sel + ULPI_TIMING_CTRL_1::DATA_TRIMMER_LOAD::SET
                + ULPI_TIMING_CTRL_1::STPDIRNXT_TRIMMER_LOAD::SET
                + ULPI_TIMING_CTRL_1::DIR_TRIMMER_LOAD::SET,
        );

        regs.modify(ULPI_TIMING_CTRL_0, ULPI_TIMING_CTRL_0::CLK_PADOUT_ENA::SET);
        kernel.delay_us(10);

        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_CLR::SET);
        kernel.delay_us(100);
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_CLR::CLEAR);

        if regs
            .wait_for(
                USB_SUSP_CTRL,
                USB_SUSP_CTRL::PHY_CLK_VALID::SET,
                self.base.timeouts.short,
            )
            .is_err()
        {
            error!(
                "ULPI-NULL{}: timeout waiting for phy clock to stabilize",
                self.base.instance
            );
        }

        if let Some(postinit) = self.config.postinit {
            postinit();
        }

        Ok(())
    }

    fn power_off(&mut self) {
        debug!("ULPI-NULL{}: power off", self.base.instance);
        self.base
            .regs
            .modify(ULPI_TIMING_CTRL_0, ULPI_TIMING_CTRL_0::CLK_PADOUT_ENA::CLEAR);
    }
}
