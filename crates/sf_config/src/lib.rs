// crates/sf_config/src/lib.rs

//! SegFlow Config Layer
//!
//! 配置层，描述分离式压力-速度耦合引擎的全部用户参数。
//! 所有数值使用 f64，可通过 JSON 序列化读写。
//!
//! # 模块概览
//!
//! - [`coupling_config`]: 顶层 `CouplingConfig`（算法、流动模型、松弛、参考压力、限幅）
//! - [`controls`]: 修正循环控制 `CorrectorControls` 与残差控制
//! - [`linear_solver`]: 线性求解器参数
//! - [`error`]: 配置错误类型
//!
//! # 示例
//!
//! ```
//! use sf_config::{CouplingConfig, Algorithm};
//!
//! let config = CouplingConfig::simple();
//! assert_eq!(config.algorithm, Algorithm::Simple);
//! assert!(config.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod controls;
pub mod coupling_config;
pub mod error;
pub mod linear_solver;

pub use controls::{CorrectorControls, ResidualControl};
pub use coupling_config::{
    Algorithm, CouplingConfig, FlowModel, PhysicalLimits, PressureReference, RelaxationFactors,
    VelocityCorrection,
};
pub use error::ConfigError;
pub use linear_solver::{KrylovMethod, LinearSolverControls, LinearSolverSettings};
