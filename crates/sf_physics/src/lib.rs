// crates/sf_physics/src/lib.rs

//! SegFlow 物理层
//!
//! 非结构网格上的有限体积分离式压力-速度耦合引擎（SIMPLE / PISO / PIMPLE），
//! 覆盖不可压缩、可压缩、单相与欧拉多相格式。
//!
//! # 模块概览
//!
//! - [`mesh`]: 网格接口 `FvMesh`、多面体网格与结构化网格构建器
//! - [`fields`]: 体心场、边界条件与面通量
//! - [`numerics`]: ldu 离散方程 `FvMatrix`、隐式/显式算子、稀疏线性代数
//! - [`services`]: 物性、应力、源项、线性求解、并行归约等外部服务
//! - [`coupling`]: 修正状态机与动量/压力/重构/可压缩性组件
//!
//! # 单个时间步
//!
//! ```text
//! 保存旧时间层
//! └─ 外层修正（outer）
//!    ├─ 动量方程组装（松弛后缓存）
//!    └─ 压力修正（PISO）
//!       ├─ 非正交修正：压力方程组装 → 线性求解
//!       │  └─ 最后一次：通量 φ = phiHbyA + pEqn.flux(p)
//!       ├─ 速度重构
//!       └─ 最后一次：密度修正 / 参考压力
//! ```
//!
//! # 示例
//!
//! ```no_run
//! use glam::DVec3;
//! use sf_config::CouplingConfig;
//! use sf_physics::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mesh = CartesianMeshBuilder::new(10, 1, 1).lengths(1.0, 0.1, 0.1).build()?;
//! let u = VolVectorField::uniform(
//!     "U",
//!     &mesh,
//!     DVec3::ZERO,
//!     vec![
//!         BoundaryCondition::fixed_value(1, DVec3::X),
//!         BoundaryCondition::ZeroGradient,
//!     ],
//! )?;
//! let p = VolScalarField::uniform(
//!     "p",
//!     &mesh,
//!     0.0,
//!     vec![BoundaryCondition::ZeroGradient, BoundaryCondition::fixed_value(1, 0.0)],
//! )?;
//! let phase = Phase::new(
//!     "fluid",
//!     &mesh,
//!     u,
//!     Box::new(ConstantDensity::new(&mesh, 1.0)?),
//!     Box::new(LaminarStress::new(1e-3)),
//! )?;
//! let fields = FlowFields::single_phase(&mesh, p, phase)?;
//! let mut solver =
//!     SegregatedFlowSolver::new(mesh, CouplingConfig::piso(2), fields, FlowServices::default())?;
//! let report = solver.solve_time_step(1e-3)?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coupling;
pub mod error;
pub mod fields;
pub mod mesh;
pub mod numerics;
pub mod services;

pub use coupling::{
    CorrectorContext, CorrectorLevel, CorrectorStateMachine, CouplingStrategy, FlowFields,
    FlowServices, Formulation, Phase, PhaseSystem, SegregatedFlowSolver, StepReport,
};
pub use error::{CouplingError, CouplingResult};
pub use fields::{BoundaryCondition, FaceFlux, FieldValue, VolField, VolScalarField, VolVectorField};
pub use mesh::{CartesianMeshBuilder, FvMesh, Patch, PolyMesh};
pub use numerics::{Discretization, FvMatrix, FvScalarMatrix, GaussLinear};

/// 常用导入
pub mod prelude {
    pub use crate::coupling::{
        FlowFields, FlowServices, Phase, SegregatedFlowSolver, StepReport,
    };
    pub use crate::error::{CouplingError, CouplingResult};
    pub use crate::fields::{BoundaryCondition, VolScalarField, VolVectorField};
    pub use crate::mesh::{CartesianMeshBuilder, FvMesh};
    pub use crate::services::{
        ConstantDensity, ConstantDrag, Gravity, KrylovSolver, LaminarStress, PerfectGas,
        SerialExchange, UniformAcceleration,
    };
}
