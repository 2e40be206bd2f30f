//! 寄存器位字段定义
//!
//! 每个 USB 控制器窗口内包含三部分：
//!
//! ```text
//! 0x140 - 0x1ab   EHCI 操作寄存器（带厂商扩展）
//! 0x400 - 0x43f   PHY 接口控制（挂起、遗留模式、ULPI 时序）
//! 0x800 - 0x83f   UTMIP 或 UHSIC 收发器配置（两者共用偏移，含义不同）
//! ```

use tock_registers::register_bitfields;

// =============================================================================
// EHCI 操作寄存器
// =============================================================================

register_bitfields![u32,
    pub USBCMD [
        RS OFFSET(0) NUMBITS(1) [],
        HCRESET OFFSET(1) NUMBITS(1) [],
    ],

    pub USBSTS [
        // Port Change Detect
        PCI OFFSET(2) NUMBITS(1) [],
        // SOF Received
        SRI OFFSET(7) NUMBITS(1) [],
        HCH OFFSET(12) NUMBITS(1) [],
    ],

    pub ASYNCLISTADDR [
        ADDR OFFSET(5) NUMBITS(27) [],
    ],

    pub TXFILLTUNING [
        TXFIFO_THRES OFFSET(16) NUMBITS(5) [],
    ],

    pub ULPI_VIEWPORT [
        DATA_WRITE OFFSET(0) NUMBITS(8) [],
        DATA_READ OFFSET(8) NUMBITS(8) [],
        ADDR OFFSET(16) NUMBITS(8) [],
        RW OFFSET(29) NUMBITS(1) [
            Read = 0,
            Write = 1
        ],
        RUN OFFSET(30) NUMBITS(1) [],
        WAKEUP OFFSET(31) NUMBITS(1) [],
    ],

    pub PORTSC [
        CCS OFFSET(0) NUMBITS(1) [],
        CSC OFFSET(1) NUMBITS(1) [],
        PE OFFSET(2) NUMBITS(1) [],
        PEC OFFSET(3) NUMBITS(1) [],
        OCA OFFSET(4) NUMBITS(1) [],
        OCC OFFSET(5) NUMBITS(1) [],
        // Force Port Resume
        FPR OFFSET(6) NUMBITS(1) [],
        SUSP OFFSET(7) NUMBITS(1) [],
        PR OFFSET(8) NUMBITS(1) [],
        LS OFFSET(10) NUMBITS(2) [
            SE0 = 0,
            KState = 1,
            JState = 2
        ],
        // D+ 线路状态，HSIC 空闲时 strobe 为高
        LS_DPLUS OFFSET(11) NUMBITS(1) [],
        PP OFFSET(12) NUMBITS(1) [],
        PO OFFSET(13) NUMBITS(1) [],
        PTC OFFSET(16) NUMBITS(4) [
            Disabled = 0,
            ForceEnableHs = 5,
            ForceEnableFs = 6,
            ForceEnableLs = 7
        ],
        WKCN OFFSET(20) NUMBITS(1) [],
        WKDS OFFSET(21) NUMBITS(1) [],
        WKOC OFFSET(22) NUMBITS(1) [],
        PHCD OFFSET(23) NUMBITS(1) [],
        PSPD OFFSET(26) NUMBITS(2) [
            Full = 0,
            Low = 1,
            High = 2
        ],
        PTS OFFSET(30) NUMBITS(2) [],
    ],

    pub USBMODE [
        CM OFFSET(0) NUMBITS(2) [
            Idle = 0,
            Device = 2,
            Host = 3
        ],
    ],
];

// =============================================================================
// PHY 接口控制
// =============================================================================

register_bitfields![u32,
    pub USB_SUSP_CTRL [
        WAKE_ON_CNNT_EN_DEV OFFSET(3) NUMBITS(1) [],
        WAKE_ON_DISCON_EN_DEV OFFSET(4) NUMBITS(1) [],
        SUSP_CLR OFFSET(5) NUMBITS(1) [],
        CLKEN OFFSET(6) NUMBITS(1) [],
        PHY_CLK_VALID OFFSET(7) NUMBITS(1) [],
        // UTMIP_RESET / UHSIC_RESET，两个收发器共用这一位
        PHY_RESET OFFSET(11) NUMBITS(1) [],
        // UTMIP_PHY_ENABLE / UHSIC_PHY_ENABLE
        PHY_ENABLE OFFSET(12) NUMBITS(1) [],
        ULPI_PHY_ENABLE OFFSET(13) NUMBITS(1) [],
        SUSP_SET OFFSET(14) NUMBITS(1) [],
        WAKEUP_DEBOUNCE_COUNT OFFSET(16) NUMBITS(3) [],
    ],

    pub USB1_LEGACY_CTRL [
        NO_LEGACY_MODE OFFSET(0) NUMBITS(1) [],
        VBUS_SENSE_CTL OFFSET(1) NUMBITS(2) [
            VbusWakeup = 0,
            AbSessVldOrVbusWakeup = 1,
            AbSessVld = 2,
            ASessVld = 3
        ],
    ],

    pub ULPIS2S_CTRL [
        ENA OFFSET(0) NUMBITS(1) [],
        PLLU_MASTER_BLASTER60 OFFSET(3) NUMBITS(1) [],
        SPARE OFFSET(8) NUMBITS(4) [
            Device = 1,
            Host = 3
        ],
    ],

    pub ULPI_TIMING_CTRL_0 [
        CLOCK_OUT_DELAY OFFSET(0) NUMBITS(5) [],
        OUTPUT_PINMUX_BYP OFFSET(10) NUMBITS(1) [],
        CLKOUT_PINMUX_BYP OFFSET(11) NUMBITS(1) [],
        SHADOW_CLK_LOOPBACK_EN OFFSET(12) NUMBITS(1) [],
        SHADOW_CLK_SEL OFFSET(13) NUMBITS(1) [],
        CORE_CLK_SEL OFFSET(14) NUMBITS(1) [],
        SHADOW_CLK_DELAY OFFSET(16) NUMBITS(5) [],
        LBK_PAD_EN OFFSET(26) NUMBITS(1) [],
        LBK_PAD_E_INPUT_OR OFFSET(27) NUMBITS(1) [],
        CLK_OUT_ENA OFFSET(28) NUMBITS(1) [],
        CLK_PADOUT_ENA OFFSET(29) NUMBITS(1) [],
    ],

    pub ULPI_TIMING_CTRL_1 [
        DATA_TRIMMER_LOAD OFFSET(0) NUMBITS(1) [],
        DATA_TRIMMER_SEL OFFSET(1) NUMBITS(3) [],
        STPDIRNXT_TRIMMER_LOAD OFFSET(16) NUMBITS(1) [],
        STPDIRNXT_TRIMMER_SEL OFFSET(17) NUMBITS(3) [],
        DIR_TRIMMER_LOAD OFFSET(24) NUMBITS(1) [],
        DIR_TRIMMER_SEL OFFSET(25) NUMBITS(3) [],
    ],
];

// =============================================================================
// UTMIP 收发器
// =============================================================================

register_bitfields![u32,
    pub UTMIP_PLL_CFG1 [
        XTAL_FREQ_COUNT OFFSET(0) NUMBITS(12) [],
        PLLU_ENABLE_DLY_COUNT OFFSET(27) NUMBITS(5) [],
    ],

    pub UTMIP_XCVR_CFG0 [
        SETUP OFFSET(0) NUMBITS(4) [],
        LSRSLEW OFFSET(8) NUMBITS(2) [],
        LSFSLEW OFFSET(10) NUMBITS(2) [],
        FORCE_PD_POWERDOWN OFFSET(14) NUMBITS(1) [],
        FORCE_PD2_POWERDOWN OFFSET(16) NUMBITS(1) [],
        FORCE_PDZI_POWERDOWN OFFSET(18) NUMBITS(1) [],
        HSSLEW_MSB OFFSET(25) NUMBITS(7) [],
    ],

    pub UTMIP_BIAS_CFG0 [
        BIASPD OFFSET(10) NUMBITS(1) [],
        OTGPD OFFSET(11) NUMBITS(1) [],
    ],

    pub UTMIP_HSRX_CFG0 [
        ELASTIC_LIMIT OFFSET(10) NUMBITS(5) [],
        IDLE_WAIT OFFSET(15) NUMBITS(5) [],
    ],

    pub UTMIP_HSRX_CFG1 [
        HS_SYNC_START_DLY OFFSET(1) NUMBITS(5) [],
    ],

    pub UTMIP_TX_CFG0 [
        HS_DISCON_DISABLE OFFSET(8) NUMBITS(1) [],
        FS_PREAMBLE_J OFFSET(19) NUMBITS(1) [],
    ],

    pub UTMIP_MISC_CFG0 [
        SUSPEND_EXIT_ON_EDGE OFFSET(22) NUMBITS(1) [],
        DPDM_OBSERVE OFFSET(26) NUMBITS(1) [],
        DPDM_OBSERVE_SEL OFFSET(27) NUMBITS(4) [
            FsK = 0xe,
            FsJ = 0xf
        ],
    ],

    pub UTMIP_MISC_CFG1 [
        PLLU_STABLE_COUNT OFFSET(6) NUMBITS(12) [],
        PLL_ACTIVE_DLY_COUNT OFFSET(18) NUMBITS(5) [],
    ],

    pub UTMIP_DEBOUNCE_CFG0 [
        BIAS_DEBOUNCE_A OFFSET(0) NUMBITS(16) [],
    ],

    pub UTMIP_BAT_CHRG_CFG0 [
        PD_CHRG OFFSET(0) NUMBITS(1) [],
    ],

    pub UTMIP_SPARE_CFG0 [
        FUSE_SETUP_SEL OFFSET(3) NUMBITS(1) [],
    ],

    pub UTMIP_XCVR_CFG1 [
        FORCE_PDDISC_POWERDOWN OFFSET(0) NUMBITS(1) [],
        FORCE_PDCHRP_POWERDOWN OFFSET(2) NUMBITS(1) [],
        FORCE_PDDR_POWERDOWN OFFSET(4) NUMBITS(1) [],
        TERM_RANGE_ADJ OFFSET(18) NUMBITS(4) [],
    ],

    pub UTMIP_BIAS_CFG1 [
        BIAS_PDTRK_COUNT OFFSET(3) NUMBITS(5) [],
    ],
];

// =============================================================================
// UHSIC 收发器
// =============================================================================

register_bitfields![u32,
    pub UHSIC_PLL_CFG1 [
        XTAL_FREQ_COUNT OFFSET(0) NUMBITS(12) [],
        PLLU_ENABLE_DLY_COUNT OFFSET(14) NUMBITS(5) [],
    ],

    pub UHSIC_HSRX_CFG0 [
        ELASTIC_UNDERRUN_LIMIT OFFSET(2) NUMBITS(5) [],
        ELASTIC_OVERRUN_LIMIT OFFSET(8) NUMBITS(5) [],
        IDLE_WAIT OFFSET(13) NUMBITS(5) [],
    ],

    pub UHSIC_HSRX_CFG1 [
        HS_SYNC_START_DLY OFFSET(1) NUMBITS(5) [],
    ],

    pub UHSIC_MISC_CFG0 [
        SUSPEND_EXIT_ON_EDGE OFFSET(7) NUMBITS(1) [],
        DETECT_SHORT_CONNECT OFFSET(8) NUMBITS(1) [],
        FORCE_XCVR_MODE OFFSET(15) NUMBITS(1) [],
    ],

    pub UHSIC_MISC_CFG1 [
        PLLU_STABLE_COUNT OFFSET(2) NUMBITS(12) [],
    ],

    pub UHSIC_PADS_CFG0 [
        TX_RTUNE OFFSET(12) NUMBITS(4) [],
    ],

    pub UHSIC_PADS_CFG1 [
        PD_BG OFFSET(2) NUMBITS(1) [],
        PD_TX OFFSET(3) NUMBITS(1) [],
        PD_TRK OFFSET(4) NUMBITS(1) [],
        PD_RX OFFSET(5) NUMBITS(1) [],
        PD_ZI OFFSET(6) NUMBITS(1) [],
        RX_SEL OFFSET(7) NUMBITS(1) [],
        RPD_DATA OFFSET(9) NUMBITS(1) [],
        RPD_STROBE OFFSET(10) NUMBITS(1) [],
        RPU_DATA OFFSET(11) NUMBITS(1) [],
        RPU_STROBE OFFSET(12) NUMBITS(1) [],
    ],

    pub UHSIC_STAT_CFG0 [
        CONNECT_DETECT OFFSET(0) NUMBITS(1) [],
    ],
];

// =============================================================================
// AHB 仲裁器
// =============================================================================

register_bitfields![u32,
    pub AHB_MEM_PREFETCH_CFG [
        INACTIVITY_TIMEOUT OFFSET(0) NUMBITS(16) [],
        SPEC_THROTTLE OFFSET(16) NUMBITS(5) [],
        ADDR_BNDRY OFFSET(21) NUMBITS(5) [],
        AHB_MST_ID OFFSET(26) NUMBITS(5) [],
        ENABLE OFFSET(31) NUMBITS(1) [],
    ],
];
