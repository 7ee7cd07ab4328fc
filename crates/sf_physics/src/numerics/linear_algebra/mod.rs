// crates/sf_physics/src/numerics/linear_algebra/mod.rs

//! 稀疏线性代数模块
//!
//! 为离散方程的隐式求解提供 CSR 稀疏矩阵、预条件器与 Krylov 迭代求解器。
//!
//! - [`csr`]: 压缩稀疏行矩阵与构建器
//! - [`preconditioner`]: 单位/Jacobi 预条件器
//! - [`solver`]: PCG（对称）与 BiCGStab（非对称）
//! - [`vector_ops`]: BLAS Level 1 风格向量运算

pub mod csr;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use csr::{CsrBuilder, CsrMatrix, CsrPattern};
pub use preconditioner::{IdentityPreconditioner, JacobiPreconditioner, Preconditioner};
pub use solver::{BiCgStabSolver, IterativeSolver, PcgSolver, SolverConfig, SolverResult, SolverStatus};
pub use vector_ops::{axpy, copy, dot, norm2, norm_inf};
