//! 主机控制器侧接口
//!
//! 协调器（coordinator）把通用 EHCI 驱动当作协作方，只在电源管理和
//! hub 请求的特定节点插入 PHY 操作，其余工作交回控制器完成。

use alloc::sync::Arc;
use core::time::Duration;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use spin::Mutex;

use crate::err::PhyError;

/// 端口特性选择子
///
/// 参照 USB 2.0 规范表 11-17。
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum PortFeature {
    Connection = 0,
    Enable = 1,
    Suspend = 2,
    OverCurrent = 3,
    Reset = 4,
    Power = 8,
    LowSpeed = 9,
    CConnection = 16,
    CEnable = 17,
    CSuspend = 18,
    COverCurrent = 19,
    CReset = 20,
    Test = 21,
    Indicator = 22,
}

/// 根集线器请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubRequest {
    GetPortStatus {
        index: u16,
    },
    SetPortFeature {
        feature: PortFeature,
        index: u16,
    },
    ClearPortFeature {
        feature: PortFeature,
        index: u16,
    },
    /// 协调器不关心的请求，原样交给控制器
    Other {
        type_req: u16,
        value: u16,
        index: u16,
        length: u16,
    },
}

impl HubRequest {
    pub const CLEAR_PORT_FEATURE: u16 = 0x2301;
    pub const SET_PORT_FEATURE: u16 = 0x2303;
    pub const GET_PORT_STATUS: u16 = 0xa300;

    pub fn decode(type_req: u16, value: u16, index: u16, length: u16) -> Self {
        let other = HubRequest::Other {
            type_req,
            value,
            index,
            length,
        };
        match type_req {
            Self::GET_PORT_STATUS => HubRequest::GetPortStatus { index },
            Self::SET_PORT_FEATURE => match PortFeature::try_from(value) {
                Ok(feature) => HubRequest::SetPortFeature { feature, index },
                Err(_) => other,
            },
            Self::CLEAR_PORT_FEATURE => match PortFeature::try_from(value) {
                Ok(feature) => HubRequest::ClearPortFeature { feature, index },
                Err(_) => other,
            },
            _ => other,
        }
    }

    /// 端口号（1-based），取 wIndex 低字节
    pub fn port(&self) -> u8 {
        let index = match *self {
            HubRequest::GetPortStatus { index }
            | HubRequest::SetPortFeature { index, .. }
            | HubRequest::ClearPortFeature { index, .. }
            | HubRequest::Other { index, .. } => index,
        };
        (index & 0xff) as u8
    }
}

/// 延迟任务
///
/// 平台在 `schedule` 指定的延时后，于进程上下文调用协调器的
/// `reconnect_work`。
pub trait DelayedWorkOp: Send + Sync {
    fn schedule(&self, delay: Duration);
    /// 取消尚未执行的任务，并等待正在执行的任务结束
    fn cancel_sync(&self);
}

/// 通用 EHCI 控制器
///
/// `halt`、`set_resume_deadline` 和 `mark_port_suspended` 在持有
/// `register_lock` 时调用，实现中不能再获取该锁；其余方法调用时不持有锁。
pub trait HostControllerOp: Send {
    /// 控制器寄存器锁，中断处理路径同样持有它
    fn register_lock(&self) -> Arc<Mutex<()>>;
    fn port_count(&self) -> u8;
    fn has_port_power_control(&self) -> bool;
    fn halt(&mut self) -> Result<(), PhyError>;
    /// 复位并重新初始化控制器，然后运行
    fn restart(&mut self) -> Result<(), PhyError>;
    fn set_hw_accessible(&mut self, accessible: bool);
    /// 根集线器已配置，重启后需要重新声明
    fn set_configured(&mut self);
    fn bus_suspend(&mut self) -> Result<(), PhyError>;
    fn bus_resume(&mut self) -> Result<(), PhyError>;
    fn hub_control(&mut self, req: HubRequest, buf: &mut [u8]) -> Result<(), PhyError>;
    /// 记录端口 resume 信号的截止时间，`None` 表示清除
    fn set_resume_deadline(&mut self, port: u8, after: Option<Duration>);
    fn mark_port_suspended(&mut self, port: u8);
    fn shutdown(&mut self);
}
