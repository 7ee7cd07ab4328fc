// crates/sf_config/src/error.rs

//! 配置层错误类型

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),

    /// 组合不兼容
    #[error("配置组合不兼容: {0}")]
    Incompatible(String),
}

impl ConfigError {
    /// 构造无效值错误
    pub fn invalid(key: &str, value: impl ToString, reason: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ConfigError> for sf_foundation::SfError {
    fn from(err: ConfigError) -> Self {
        sf_foundation::SfError::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("controls.n_correctors", 0, "必须至少为 1");
        assert!(err.to_string().contains("n_correctors"));
    }

    #[test]
    fn test_into_foundation_error() {
        let err: sf_foundation::SfError = ConfigError::Missing("reference.ref_cell".into()).into();
        assert!(matches!(err, sf_foundation::SfError::Config { .. }));
    }
}
