//! 车机连接状态模块 - 三态信号，核心只当布尔门用

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// 车机连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarConnectionState {
    /// 未连接
    #[default]
    NotConnected,
    /// 原生车机模式
    Native,
    /// 投影模式
    Projected,
}

impl CarConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarConnectionState::NotConnected => "not_connected",
            CarConnectionState::Native => "native",
            CarConnectionState::Projected => "projected",
        }
    }

    /// 门控只关心连没连上
    pub fn is_connected(&self) -> bool {
        !matches!(self, CarConnectionState::NotConnected)
    }
}

impl std::fmt::Display for CarConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 连接状态信号源
pub trait ConnectivitySignal: Send + Sync {
    fn state(&self) -> CarConnectionState;
}

/// 可写的共享连接状态（daemon 循环和测试共用）
pub struct SharedConnectivity {
    state: Mutex<CarConnectionState>,
}

impl SharedConnectivity {
    pub fn new(initial: CarConnectionState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    pub fn set(&self, state: CarConnectionState) {
        *self.state.lock().unwrap() = state;
    }
}

impl Default for SharedConnectivity {
    fn default() -> Self {
        Self::new(CarConnectionState::NotConnected)
    }
}

impl ConnectivitySignal for SharedConnectivity {
    fn state(&self) -> CarConnectionState {
        *self.state.lock().unwrap()
    }
}
