// crates/sf_physics/src/numerics/mod.rs

//! 数值计算模块
//!
//! - [`linear_algebra`]: 稀疏矩阵与 Krylov 求解器
//! - [`matrix`]: 有限体积离散方程 `FvMatrix`
//! - [`fvm`]: 隐式算子
//! - [`fvc`]: 显式算子
//! - [`schemes`]: 离散格式服务

pub mod fvc;
pub mod fvm;
pub mod linear_algebra;
pub mod matrix;
pub mod schemes;

pub use matrix::{FvMatrix, FvScalarMatrix};
pub use schemes::{Discretization, GaussLinear};
