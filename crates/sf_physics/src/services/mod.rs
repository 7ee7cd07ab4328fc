// crates/sf_physics/src/services/mod.rs

//! 外部服务接口
//!
//! 耦合算法只通过这些 trait 访问物性、应力、源项、线性求解与并行归约：
//!
//! - [`thermo`]: 密度与可压缩性 ψ = ∂ρ/∂p
//! - [`stress`]: 动量方程的粘性应力项
//! - [`sources`]: 动量源、面力（重力）与相间动量传递
//! - [`linear_solve`]: 离散方程的线性求解
//! - [`exchange`]: 跨分区归约

pub mod exchange;
pub mod linear_solve;
pub mod sources;
pub mod stress;
pub mod thermo;

pub use exchange::{Exchange, SerialExchange};
pub use linear_solve::{KrylovSolver, LinearSolve, SolvePerformance};
pub use sources::{
    ConstantDrag, FaceForceModel, Gravity, MomentumSource, MomentumTransfer, NoSources, NoTransfer,
    UniformAcceleration,
};
pub use stress::{LaminarStress, StressModel};
pub use thermo::{ConstantDensity, PerfectGas, ThermoModel};
