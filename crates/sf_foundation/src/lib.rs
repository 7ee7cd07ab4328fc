// crates/sf_foundation/src/lib.rs

//! SegFlow Foundation Layer
//!
//! 基础层，为配置层和物理层提供共享的底层抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `SfError` / `SfResult`
//! - [`float`]: 数值常量与稳定化辅助函数
//!
//! # 层级架构
//!
//! ```text
//! Layer 3: sf_physics    ─> 网格、场、离散、耦合引擎
//! Layer 2: sf_config     ─> CouplingConfig
//! Layer 1: sf_foundation ─> SfError, float (本层)
//! ```
//!
//! # 示例
//!
//! ```
//! use sf_foundation::float::{stabilise, VSMALL};
//! use sf_foundation::error::{SfError, SfResult};
//!
//! let a = stabilise(0.0, VSMALL);
//! assert!(a > 0.0);
//!
//! fn check(n: usize) -> SfResult<()> {
//!     if n == 0 {
//!         return Err(SfError::invalid_input("单元数为零"));
//!     }
//!     Ok(())
//! }
//! assert!(check(0).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod float;

pub use error::{SfError, SfResult};

/// 常用导入
pub mod prelude {
    pub use crate::error::{SfError, SfResult};
    pub use crate::float::{safe_div, stabilise, GREAT, ROOT_VSMALL, SMALL, VSMALL};
}
