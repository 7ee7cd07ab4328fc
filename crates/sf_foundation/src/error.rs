// crates/sf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `SfError` 枚举和 `SfResult` 类型别名。物理计算相关的错误
//! 在 `sf_physics` 中扩展，配置错误在 `sf_config` 中定义。
//!
//! # 示例
//!
//! ```
//! use sf_foundation::error::{SfError, SfResult};
//!
//! fn read_config() -> SfResult<()> {
//!     Err(SfError::config("缺少 PISO 配置段"))
//! }
//! assert!(read_config().is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type SfResult<T> = Result<T, SfError>;

/// SegFlow 基础错误类型
#[derive(Error, Debug)]
pub enum SfError {
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 错误描述
        message: String,
    },

    /// 数组尺寸不匹配
    #[error("尺寸不匹配: {name} 期望 {expected}, 实际 {actual}")]
    SizeMismatch {
        /// 数组名称
        name: String,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {kind} 索引 {index} 超出范围 [0, {len})")]
    IndexOutOfBounds {
        /// 索引类型（单元、面、补丁）
        kind: &'static str,
        /// 索引值
        index: usize,
        /// 容器长度
        len: usize,
    },

    /// 网格无效
    #[error("网格无效: {message}")]
    InvalidMesh {
        /// 错误描述
        message: String,
    },

    /// 数值错误（NaN / Inf）
    #[error("数值错误: {message}")]
    Numerical {
        /// 错误描述
        message: String,
    },
}

impl SfError {
    /// 创建无效输入错误
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 创建网格错误
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 创建数值错误
    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical {
            message: message.into(),
        }
    }

    /// 检查尺寸是否一致
    pub fn check_size(name: &str, expected: usize, actual: usize) -> SfResult<()> {
        if expected != actual {
            return Err(Self::SizeMismatch {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// 检查索引是否在范围内
    pub fn check_index(kind: &'static str, index: usize, len: usize) -> SfResult<()> {
        if index >= len {
            return Err(Self::IndexOutOfBounds { kind, index, len });
        }
        Ok(())
    }
}
