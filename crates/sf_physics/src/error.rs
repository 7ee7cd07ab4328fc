// crates/sf_physics/src/error.rs

//! 耦合引擎错误类型
//!
//! 只有结构性问题（配置、参考压力、相定义、无法消除的边界通量不平衡）
//! 以错误返回；收敛不足只记录日志，数值退化就地稳定化。

use sf_config::ConfigError;
use sf_foundation::SfError;
use thiserror::Error;

/// 耦合引擎结果类型
pub type CouplingResult<T> = Result<T, CouplingError>;

/// 耦合引擎错误
#[derive(Debug, Error)]
pub enum CouplingError {
    /// 配置错误（构造时检测）
    #[error("耦合配置错误: {0}")]
    Configuration(String),

    /// 参考压力设置错误
    #[error("参考压力错误 (场 '{field}'): {reason}")]
    Reference {
        /// 压力场名
        field: String,
        /// 原因
        reason: String,
    },

    /// 相定义错误
    #[error("相 '{phase}' 定义错误: {reason}")]
    Phase {
        /// 相名
        phase: String,
        /// 原因
        reason: String,
    },

    /// 封闭域边界通量不平衡无法通过调整出流消除
    #[error("连续性误差无法通过调整出流消除: 入流 {mass_in:.6e}, 固定出流 {fixed_out:.6e}, 可调出流 {adjustable_out:.6e}")]
    ContinuityImbalance {
        /// 入流
        mass_in: f64,
        /// 固定出流
        fixed_out: f64,
        /// 可调出流
        adjustable_out: f64,
    },

    /// 修正周期缓存缺失（调用顺序错误）
    #[error("修正周期缓存缺失: {0}")]
    MissingCache(&'static str),

    /// 基础层错误
    #[error(transparent)]
    Foundation(#[from] SfError),
}

impl CouplingError {
    /// 创建配置错误
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// 创建参考压力错误
    pub fn reference(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Reference {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 创建相定义错误
    pub fn phase(phase: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Phase {
            phase: phase.into(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for CouplingError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_error() {
        let err: CouplingError = ConfigError::Missing("reference.ref_cell".into()).into();
        assert!(matches!(err, CouplingError::Configuration(_)));
        assert!(err.to_string().contains("ref_cell"));
    }

    #[test]
    fn test_from_foundation_error() {
        let err: CouplingError = SfError::invalid_input("dt <= 0").into();
        assert!(matches!(err, CouplingError::Foundation(_)));
    }

    #[test]
    fn test_reference_error_display() {
        let err = CouplingError::reference("p", "封闭域缺少参考单元");
        assert!(err.to_string().contains("'p'"));
    }
}
