// crates/sf_physics/src/coupling/mod.rs

//! 压力-速度耦合
//!
//! - [`control`]: 外层/压力/非正交三级修正状态机
//! - [`phase`]: 相、相系统与流场集合
//! - [`momentum`]: 动量方程组装与预测
//! - [`pressure`]: `HbyA`/`phiHbyA` 通量预测与压力方程（含 Rhie–Chow 与多相可压缩项）
//! - [`reconstruct`]: 由压力解重构通量与速度
//! - [`compressibility`]: 参考压力、封闭域质量修正与密度更新
//! - [`reference`]: 参考压力解析、封闭域出流调整与压力限幅
//! - [`continuity`] / [`courant`]: 诊断量
//! - [`strategy`] / [`solver`]: 耦合策略与时间步驱动

pub mod cache;
pub mod compressibility;
pub mod continuity;
pub mod control;
pub mod courant;
pub mod momentum;
pub mod phase;
pub mod pressure;
pub mod reconstruct;
pub mod reference;
pub mod solver;
pub mod strategy;

pub use cache::{CouplingCache, DragCoefficients};
pub use compressibility::CompressibilityCorrector;
pub use continuity::{ContinuityErrors, ContinuityMonitor};
pub use control::{CorrectorContext, CorrectorLevel, CorrectorStateMachine};
pub use courant::{courant_number, suggest_time_step, CourantNumber};
pub use momentum::MomentumAssembler;
pub use phase::{mixture_flux, FlowFields, Phase, PhaseSystem};
pub use pressure::{FluxPredictor, PressureEquationAssembler};
pub use reconstruct::FluxVelocityReconstructor;
pub use reference::{adjust_phi, limit_pressure, PressureReferenceSpec};
pub use solver::{FlowServices, SegregatedFlowSolver, StepReport};
pub use strategy::{
    select_strategy, CouplingEnv, CouplingStages, CouplingStrategy, Formulation, MultiphaseCoupling, SinglePhaseCoupling,
};
