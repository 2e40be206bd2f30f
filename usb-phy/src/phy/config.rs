//! PHY 配置记录
//!
//! 对应板级数据：模拟调校常量不在这里定义，只在缺省时提供已知可用的默认值。

use core::time::Duration;

/// UTMI 收发器调校参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmiConfig {
    pub hssync_start_delay: u8,
    pub elastic_limit: u8,
    pub idle_wait_delay: u8,
    pub term_range_adj: u8,
    pub xcvr_setup: u8,
    pub xcvr_lsfslew: u8,
    pub xcvr_lsrslew: u8,
}

impl UtmiConfig {
    /// 实例 0 和 2 的内置默认值，实例 1 没有 UTMI 收发器
    pub const fn default_for(instance: u8) -> Option<Self> {
        match instance {
            0 => Some(Self {
                hssync_start_delay: 9,
                idle_wait_delay: 17,
                elastic_limit: 16,
                term_range_adj: 6,
                xcvr_setup: 11,
                xcvr_lsfslew: 1,
                xcvr_lsrslew: 1,
            }),
            2 => Some(Self {
                hssync_start_delay: 9,
                idle_wait_delay: 17,
                elastic_limit: 16,
                term_range_adj: 6,
                xcvr_setup: 9,
                xcvr_lsfslew: 2,
                xcvr_lsrslew: 2,
            }),
            _ => None,
        }
    }
}

/// 外置 ULPI 收发器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UlpiConfig {
    pub reset_gpio: u32,
    /// 收发器参考时钟名
    pub clk: &'static str,
}

/// ULPI 接口时序微调
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UlpiTrimmer {
    pub shadow_clk_delay: u8,
    pub clock_out_delay: u8,
    pub data_trimmer: u8,
    pub stpdirnxt_trimmer: u8,
}

impl Default for UlpiTrimmer {
    fn default() -> Self {
        Self {
            shadow_clk_delay: 0,
            clock_out_delay: 0,
            data_trimmer: 4,
            stpdirnxt_trimmer: 4,
        }
    }
}

/// 无外置收发器的 ULPI 直连
#[derive(Debug, Clone, Copy, Default)]
pub struct UlpiNullConfig {
    pub trimmer: Option<UlpiTrimmer>,
    pub preinit: Option<fn()>,
    pub postinit: Option<fn()>,
}

/// 芯片间 HSIC 链路
#[derive(Debug, Clone, Copy)]
pub struct UhsicConfig {
    pub sync_start_delay: u8,
    pub idle_wait_delay: u8,
    pub elastic_underrun_limit: u8,
    pub elastic_overrun_limit: u8,
    /// 0 对应 40Ω
    pub tx_rtune: u8,
    /// 需要修补 AHB 预取配置
    pub ahb_prefetch_fix: bool,
    pub preinit: Option<fn()>,
}

impl Default for UhsicConfig {
    fn default() -> Self {
        Self {
            sync_start_delay: 9,
            idle_wait_delay: 17,
            elastic_underrun_limit: 16,
            elastic_overrun_limit: 16,
            tx_rtune: 0,
            ahb_prefetch_fix: false,
            preinit: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PhyConfig {
    Utmi(UtmiConfig),
    Ulpi(UlpiConfig),
    UlpiNull(UlpiNullConfig),
    Uhsic(UhsicConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyKind {
    Utmi,
    Ulpi,
    UlpiNull,
    Uhsic,
}

impl PhyConfig {
    pub fn kind(&self) -> PhyKind {
        match self {
            PhyConfig::Utmi(_) => PhyKind::Utmi,
            PhyConfig::Ulpi(_) => PhyKind::Ulpi,
            PhyConfig::UlpiNull(_) => PhyKind::UlpiNull,
            PhyConfig::Uhsic(_) => PhyKind::Uhsic,
        }
    }
}

/// 寄存器轮询超时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeouts {
    /// 时钟有效、线路状态等短等待
    pub short: Duration,
    /// 链路训练、连接检测等长等待
    pub long: Duration,
}

impl Default for PollTimeouts {
    fn default() -> Self {
        Self {
            short: Duration::from_millis(2),
            long: Duration::from_millis(50),
        }
    }
}

/// 板级数据
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardConfig {
    /// 主机模式下驱动 VBUS 的 GPIO
    pub vbus_gpio: Option<u32>,
    /// VBUS 检测中断，只在实例 0 上注册
    pub vbus_irq: Option<u32>,
    pub vdd_supply: Option<&'static str>,
    /// 芯片版本支持在断电时关闭 VDD
    pub supply_off_on_power_off: bool,
    pub timeouts: PollTimeouts,
    /// VBUS 中断的板级回调
    pub vbus_notify: Option<fn()>,
}
