//! 外置 ULPI 收发器

use super::{
    PhyBase, PhyOp,
    gpio::GpioLine,
    viewport::{IfcCtrl, OtgCtrl, UlpiViewport, ulpi_reg},
};
use crate::{
    clock::GatedClock,
    err::Result,
    reg::{consts::*, offset::*},
};

pub(crate) struct Ulpi {
    base: PhyBase,
    clk: GatedClock,
    reset: GpioLine,
}

impl Ulpi {
    pub fn new(base: PhyBase, clk: GatedClock, reset: GpioLine) -> Self {
        Self { base, clk, reset }
    }

    /// 通过 viewport 打开 VBUS 指示直通，VBUS 悬空时收发器会误报 VbusInvalid
    fn passthru_vbus_indicator(&self) -> Result {
        let viewport = UlpiViewport::new(&self.base.regs, self.base.timeouts.short);
        viewport.write(
            ulpi_reg::set(ulpi_reg::IFC_CTRL),
            IfcCtrl::INDICATOR_PASSTHRU.bits(),
        )?;
        viewport.write(
            ulpi_reg::set(ulpi_reg::OTG_CTRL),
            OtgCtrl::USE_EXT_VBUS_IND.bits(),
        )
    }

    /// 三组数据线延时同时选 4，稍后再锁存
    fn load_trimmers(&self) {
        let regs = &self.base.regs;
        let sel = ULPI_TIMING_CTRL_1::DATA_TRIMMER_SEL.val(4)
            + ULPI_TIMING_CTRL_1::STPDIRNXT_TRIMMER_SEL.val(4)
            + ULPI_TIMING_CTRL_1::DIR_TRIMMER_SEL.val(4);

        regs.write_raw(ULPI_TIMING_CTRL_1, 0);
        regs.write(ULPI_TIMING_CTRL_1, sel);
        regs.kernel().delay_us(10);
        regs.write(
            ULPI_TIMING_CTRL_1,
            sel + ULPI_TIMING_CTRL_1::DATA_TRIMMER_LOAD::SET
                + ULPI_TIMING_CTRL_1::STPDIRNXT_TRIMMER_LOAD::SET
                + ULPI_TIMING_CTRL_1::DIR_TRIMMER_LOAD::SET,
        );
    }
}

impl PhyOp for Ulpi {
    fn power_on(&mut self) -> Result {
        let instance = self.base.instance;
        let regs = &self.base.regs;
        debug!("ULPI{instance}: power on");

        self.reset.output(false)?;
        regs.kernel().delay_ms(5);
        self.reset.output(true)?;

        self.clk.enable()?;
        regs.kernel().delay_ms(1);

        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::PHY_RESET::SET);
        regs.modify(
            ULPI_TIMING_CTRL_0,
            ULPI_TIMING_CTRL_0::OUTPUT_PINMUX_BYP::SET + ULPI_TIMING_CTRL_0::CLKOUT_PINMUX_BYP::SET,
        );
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::ULPI_PHY_ENABLE::SET);

        self.load_trimmers();

        if let Err(e) = self.passthru_vbus_indicator() {
            error!("ULPI{instance}: viewport write failed: {e}");
            self.clk.disable();
            return Err(e);
        }

        let regs = &self.base.regs;
        regs.modify(
            PORTSC1,
            PORTSC::WKOC::SET + PORTSC::WKDS::SET + PORTSC::WKCN::SET,
        );

        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_CLR::SET);
        regs.kernel().delay_us(100);
        regs.modify(USB_SUSP_CTRL, USB_SUSP_CTRL::SUSP_CLR::CLEAR);

        Ok(())
    }

    fn power_off(&mut self) {
        debug!("ULPI{}: power off", self.base.instance);

        // 残留的唤醒使能会立刻把收发器拉出低功耗
        self.base.regs.modify(
            PORTSC1,
            PORTSC::WKOC::CLEAR + PORTSC::WKDS::CLEAR + PORTSC::WKCN::CLEAR,
        );

        if let Err(e) = self.reset.output(false) {
            warn!("ULPI{}: reset gpio: {e}", self.base.instance);
        }
        self.clk.disable();
    }
}
