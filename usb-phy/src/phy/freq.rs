//! 参考时钟时序表
//!
//! PLL 使能延时、稳定计数等参数只取决于参考晶振频率，按收发器类型各有一张表。

use crate::err::{PhyError, Result};

/// 单个参考频率下的 PLL 时序参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XtalFreq {
    pub freq: u64,
    pub enable_delay: u8,
    pub stable_count: u16,
    pub active_delay: u8,
    pub xtal_freq_count: u16,
    pub debounce: u16,
}

impl XtalFreq {
    const fn new(
        freq: u64,
        enable_delay: u8,
        stable_count: u16,
        active_delay: u8,
        xtal_freq_count: u16,
        debounce: u16,
    ) -> Self {
        Self {
            freq,
            enable_delay,
            stable_count,
            active_delay,
            xtal_freq_count,
            debounce,
        }
    }
}

pub static UTMI_FREQ_TABLE: [XtalFreq; 4] = [
    XtalFreq::new(12_000_000, 0x02, 0x2F, 0x04, 0x76, 0x7530),
    XtalFreq::new(13_000_000, 0x02, 0x33, 0x05, 0x7F, 0x7EF4),
    XtalFreq::new(19_200_000, 0x03, 0x4B, 0x06, 0xBB, 0xBB80),
    XtalFreq::new(26_000_000, 0x04, 0x66, 0x09, 0xFE, 0xFDE8),
];

pub static UHSIC_FREQ_TABLE: [XtalFreq; 4] = [
    XtalFreq::new(12_000_000, 0x02, 0x2F, 0x0, 0x1CA, 0x0),
    XtalFreq::new(13_000_000, 0x02, 0x33, 0x0, 0x1F0, 0x0),
    XtalFreq::new(19_200_000, 0x03, 0x4B, 0x0, 0x2DD, 0x0),
    XtalFreq::new(26_000_000, 0x04, 0x66, 0x0, 0x3E0, 0x0),
];

/// 精确匹配查表，不做就近取值
pub fn lookup(table: &'static [XtalFreq], rate: u64) -> Result<&'static XtalFreq> {
    table
        .iter()
        .find(|f| f.freq == rate)
        .ok_or(PhyError::UnsupportedClockRate(rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_rate_resolves() {
        for rate in [12_000_000, 13_000_000, 19_200_000, 26_000_000] {
            assert_eq!(lookup(&UTMI_FREQ_TABLE, rate).unwrap().freq, rate);
            assert_eq!(lookup(&UHSIC_FREQ_TABLE, rate).unwrap().freq, rate);
        }
    }

    #[test]
    fn unsupported_rate_is_rejected() {
        assert_eq!(
            lookup(&UTMI_FREQ_TABLE, 10_000_000),
            Err(PhyError::UnsupportedClockRate(10_000_000))
        );
        assert!(lookup(&UHSIC_FREQ_TABLE, 19_000_000).is_err());
    }

    #[test]
    fn tables_share_pll_timing() {
        for (utmi, uhsic) in UTMI_FREQ_TABLE.iter().zip(UHSIC_FREQ_TABLE.iter()) {
            assert_eq!(utmi.enable_delay, uhsic.enable_delay);
            assert_eq!(utmi.stable_count, uhsic.stable_count);
        }
        assert_eq!(UHSIC_FREQ_TABLE[3].xtal_freq_count, 0x3E0);
    }
}
