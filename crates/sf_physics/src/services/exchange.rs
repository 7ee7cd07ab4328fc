// crates/sf_physics/src/services/exchange.rs

//! 跨分区归约
//!
//! 分布式运行时由外部实现；单进程使用 [`SerialExchange`]，归约即恒等。

/// 全局归约服务
pub trait Exchange: Send + Sync {
    /// 全局求和
    fn sum(&self, local: f64) -> f64;

    /// 全局最大值
    fn max(&self, local: f64) -> f64;

    /// 全局最小值
    fn min(&self, local: f64) -> f64;

    /// 是否为主进程（只有主进程输出日志）
    fn is_master(&self) -> bool {
        true
    }
}

/// 单进程归约
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialExchange;

impl Exchange for SerialExchange {
    fn sum(&self, local: f64) -> f64 {
        local
    }

    fn max(&self, local: f64) -> f64 {
        local
    }

    fn min(&self, local: f64) -> f64 {
        local
    }
}
