// crates/sf_physics/src/coupling/solver.rs

//! 分离式流动求解器
//!
//! 按修正状态机驱动一个时间步：
//!
//! ```text
//! 保存旧时间层 → start_time_step
//! while next_outer:
//!     begin_outer → 动量组装/预测
//!     for 压力修正:
//!         保存 p 上一迭代 → 通量预测
//!         for 非正交修正: 组装 → 求解 → (最后一次) 重构
//!         (最后一次) 密度修正 → 连续性误差
//! Courant 数与建议时间步
//! ```

use serde::Serialize;
use sf_config::{CouplingConfig, FlowModel};
use sf_foundation::SfError;

use super::cache::CouplingCache;
use super::continuity::{ContinuityErrors, ContinuityMonitor};
use super::control::CorrectorStateMachine;
use super::courant::{suggest_time_step, CourantNumber};
use super::phase::FlowFields;
use super::reference::PressureReferenceSpec;
use super::strategy::{select_strategy, CouplingEnv, CouplingStrategy, Formulation};
use crate::error::{CouplingError, CouplingResult};
use crate::mesh::FvMesh;
use crate::numerics::{Discretization, GaussLinear};
use crate::services::{
    Exchange, FaceForceModel, KrylovSolver, LinearSolve, MomentumSource, MomentumTransfer, NoSources,
    NoTransfer, SerialExchange, SolvePerformance,
};

/// 求解器使用的外部服务
pub struct FlowServices {
    /// 离散格式
    pub schemes: Box<dyn Discretization>,
    /// 线性求解
    pub linear: Box<dyn LinearSolve>,
    /// 并行归约
    pub exchange: Box<dyn Exchange>,
    /// 动量源
    pub sources: Box<dyn MomentumSource>,
    /// 面力（重力），同时进入动量预测与压力方程
    pub face_force: Option<Box<dyn FaceForceModel>>,
    /// 相间动量传递
    pub transfer: Box<dyn MomentumTransfer>,
}

impl Default for FlowServices {
    fn default() -> Self {
        Self {
            schemes: Box::new(GaussLinear),
            linear: Box::new(KrylovSolver),
            exchange: Box::new(SerialExchange),
            sources: Box::new(NoSources),
            face_force: None,
            transfer: Box::new(NoTransfer),
        }
    }
}

impl FlowServices {
    /// 替换离散格式
    pub fn with_schemes(mut self, schemes: impl Discretization + 'static) -> Self {
        self.schemes = Box::new(schemes);
        self
    }

    /// 替换线性求解器
    pub fn with_linear_solver(mut self, linear: impl LinearSolve + 'static) -> Self {
        self.linear = Box::new(linear);
        self
    }

    /// 替换并行归约
    pub fn with_exchange(mut self, exchange: impl Exchange + 'static) -> Self {
        self.exchange = Box::new(exchange);
        self
    }

    /// 设置动量源
    pub fn with_sources(mut self, sources: impl MomentumSource + 'static) -> Self {
        self.sources = Box::new(sources);
        self
    }

    /// 设置面力
    pub fn with_face_force(mut self, force: impl FaceForceModel + 'static) -> Self {
        self.face_force = Some(Box::new(force));
        self
    }

    /// 设置相间动量传递
    pub fn with_transfer(mut self, transfer: impl MomentumTransfer + 'static) -> Self {
        self.transfer = Box::new(transfer);
        self
    }
}

impl std::fmt::Debug for FlowServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowServices")
            .field("schemes", &self.schemes.name())
            .field("sources", &self.sources.name())
            .field("face_force", &self.face_force.as_ref().map(|m| m.name()))
            .field("transfer", &self.transfer.name())
            .finish()
    }
}

/// 单个时间步的报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// 步号（从 1 开始）
    pub step: usize,
    /// 步末时间
    pub time: f64,
    /// 本步时间步长
    pub dt: f64,
    /// 外层修正次数
    pub outer_iterations: usize,
    /// 残差控制是否满足
    pub converged: bool,
    /// 压力线性求解次数
    pub pressure_solves: usize,
    /// 速度线性求解次数
    pub velocity_solves: usize,
    /// 最后一次压力修正后的连续性误差
    pub continuity: Option<ContinuityErrors>,
    /// Courant 数
    pub courant: CourantNumber,
    /// 建议的下一个时间步长
    pub suggested_dt: f64,
}

impl StepReport {
    /// 单行摘要
    pub fn summary(&self) -> String {
        let mut line = format!(
            "步 {} t = {:.6e} Δt = {:.3e}: 外层 {} 次{}, 压力求解 {}, 速度求解 {}, Co 平均 {:.4} 最大 {:.4}",
            self.step,
            self.time,
            self.dt,
            self.outer_iterations,
            if self.converged { "(已收敛)" } else { "" },
            self.pressure_solves,
            self.velocity_solves,
            self.courant.mean,
            self.courant.max,
        );
        if let Some(c) = &self.continuity {
            line.push_str(&format!(
                ", 连续性误差 局部 {:.3e} 全局 {:.3e} 累计 {:.3e}",
                c.sum_local, c.global, c.cumulative
            ));
        }
        line
    }
}

/// 分离式压力-速度耦合求解器
pub struct SegregatedFlowSolver<M: FvMesh> {
    mesh: M,
    config: CouplingConfig,
    fields: FlowFields,
    services: FlowServices,
    reference: PressureReferenceSpec,
    strategy: Box<dyn CouplingStrategy>,
    machine: CorrectorStateMachine,
    cache: CouplingCache,
    continuity: ContinuityMonitor,
    initial_mass: f64,
    time: f64,
    step: usize,
}

impl<M: FvMesh> SegregatedFlowSolver<M> {
    /// 创建求解器
    ///
    /// 检查配置、场尺寸、相数与流动模型的组合，解析参考压力并选择耦合策略。
    pub fn new(mesh: M, config: CouplingConfig, fields: FlowFields, services: FlowServices) -> CouplingResult<Self> {
        config.validate()?;
        SfError::check_size(fields.phi.name(), mesh.n_faces(), fields.phi.values().len())?;

        let n_phases = fields.phases.len();
        if config.flow_model == FlowModel::SinglePhase && n_phases != 1 {
            return Err(CouplingError::configuration(format!(
                "单相流动模型需要恰好一个相，实际 {} 个",
                n_phases
            )));
        }

        let formulation = Formulation::of(&fields);
        if config.transonic {
            if config.flow_model == FlowModel::Multiphase {
                return Err(CouplingError::configuration("跨音速格式不支持多相流动"));
            }
            if formulation == Formulation::Incompressible {
                return Err(CouplingError::configuration("跨音速格式需要可压缩物性"));
            }
        }

        let incompressible = formulation == Formulation::Incompressible;
        let reference = PressureReferenceSpec::resolve(&mesh, &fields.p, &config, incompressible)?;
        let strategy = select_strategy(&config, &fields);
        let machine = CorrectorStateMachine::new(&config.controls, config.is_transient());
        let initial_mass = services.exchange.sum(fields.phases.total_mass(&mesh));

        log::info!(
            "分离式耦合求解器: 策略 {}, 算法 {:?}, 外层 {} / 压力 {} / 非正交 {}, 单元 {}",
            strategy.name(),
            config.algorithm,
            machine.n_outer(),
            machine.n_pressure(),
            machine.n_non_orth(),
            mesh.n_cells()
        );
        if reference.needs_reference() {
            log::debug!("封闭域参考压力: 单元 {:?}, 值 {}", reference.cell(), reference.value());
        }

        Ok(Self {
            mesh,
            config,
            fields,
            services,
            reference,
            strategy,
            machine,
            cache: CouplingCache::new(n_phases),
            continuity: ContinuityMonitor::new(),
            initial_mass,
            time: 0.0,
            step: 0,
        })
    }

    /// 推进一个时间步（稳态为一次伪时间迭代）
    pub fn solve_time_step(&mut self, dt: f64) -> CouplingResult<StepReport> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(SfError::invalid_input(format!("时间步长必须为正且有限: {}", dt)).into());
        }

        let env = CouplingEnv::new(
            &self.mesh,
            &self.config,
            &self.services,
            &self.reference,
            dt,
            self.initial_mass,
        );
        let strategy = self.strategy.as_ref();
        let fields = &mut self.fields;
        let cache = &mut self.cache;
        let machine = &mut self.machine;

        fields.store_old_time();
        machine.start_time_step();

        let predict = self.config.controls.momentum_predictor;
        let mut pressure_solves = 0;
        let mut velocity_solves = 0;
        let mut continuity = None;

        while let Some(outer) = machine.next_outer() {
            log::debug!("外层修正 {}{}", outer.index + 1, if outer.is_final { " (最终)" } else { "" });
            strategy.begin_outer(&env, fields, cache)?;

            let u_final = machine.transient() && outer.is_final;
            let perfs = strategy.assemble_momentum(&env, fields, cache, predict, u_final)?;
            record_velocity_residuals(machine, fields, &perfs);
            velocity_solves += perfs.len();

            for pc in machine.pressure_passes() {
                fields.p.store_prev_iter();
                strategy.predict_flux(&env, fields, cache)?;

                for nc in machine.non_orth_passes() {
                    let p_eqn = strategy.assemble_pressure(&env, fields, cache)?;
                    let final_inner = machine.final_inner_iteration(&pc, &nc);
                    let controls = self.config.solvers.for_field(fields.p.name(), final_inner);
                    let perf = self
                        .services
                        .linear
                        .solve_scalar(env.mesh, &p_eqn, &mut fields.p, controls);
                    if !perf.converged {
                        log::debug!(
                            "压力求解未收敛: {} 次迭代, 残差 {:.3e}",
                            perf.iterations,
                            perf.final_residual
                        );
                    }
                    machine.record_residual(&perf.field, perf.initial_residual);
                    pressure_solves += 1;

                    if nc.is_final {
                        let perfs = strategy.reconstruct(&env, fields, cache, &p_eqn, final_inner)?;
                        record_velocity_residuals(machine, fields, &perfs);
                        velocity_solves += perfs.len();
                    }
                }

                if pc.is_final {
                    strategy.correct_density(&env, fields, cache)?;
                    let (error, rho_ref) = strategy.continuity_error(&env, fields);
                    let errors =
                        self.continuity
                            .evaluate(env.mesh, &error, rho_ref, dt, self.services.exchange.as_ref());
                    if self.config.print_continuity_errors {
                        log::info!(
                            "连续性误差: 局部 {:.3e}, 全局 {:.3e}, 累计 {:.3e}",
                            errors.sum_local,
                            errors.global,
                            errors.cumulative
                        );
                    }
                    continuity = Some(errors);
                }
                cache.clear_pressure();
            }
            cache.clear_outer();
        }

        let courant = strategy.courant(&env, fields);
        let suggested_dt = suggest_time_step(courant.max, self.config.max_courant, dt);
        self.time += dt;
        self.step += 1;

        let report = StepReport {
            step: self.step,
            time: self.time,
            dt,
            outer_iterations: self.machine.outer_iterations(),
            converged: self.machine.converged(),
            pressure_solves,
            velocity_solves,
            continuity,
            courant,
            suggested_dt,
        };
        log::info!("{}", report.summary());
        Ok(report)
    }

    /// 网格
    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    /// 配置
    pub fn config(&self) -> &CouplingConfig {
        &self.config
    }

    /// 流场
    pub fn fields(&self) -> &FlowFields {
        &self.fields
    }

    /// 可变流场（时间步之间修改边界条件或相分数）
    pub fn fields_mut(&mut self) -> &mut FlowFields {
        &mut self.fields
    }

    /// 外部服务
    pub fn services(&self) -> &FlowServices {
        &self.services
    }

    /// 修正状态机
    pub fn machine(&self) -> &CorrectorStateMachine {
        &self.machine
    }

    /// 登记派生子求解器的完成标志
    pub fn register_solution_flag(&mut self, name: impl Into<String>) {
        self.machine.register_solution_flag(name);
    }

    /// 标记完成
    pub fn set_solution_finished(&mut self, name: &str) {
        self.machine.set_solution_finished(name);
    }

    /// 参考压力
    pub fn reference(&self) -> &PressureReferenceSpec {
        &self.reference
    }

    /// 策略名称
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// 压力方程形式
    pub fn formulation(&self) -> Formulation {
        self.strategy.formulation()
    }

    /// 初始总质量
    pub fn initial_mass(&self) -> f64 {
        self.initial_mass
    }

    /// 当前总质量
    pub fn total_mass(&self) -> f64 {
        self.services.exchange.sum(self.fields.phases.total_mass(&self.mesh))
    }

    /// 累计连续性误差
    pub fn cumulative_continuity_error(&self) -> f64 {
        self.continuity.cumulative()
    }

    /// 当前时间
    pub fn time(&self) -> f64 {
        self.time
    }

    /// 已完成的步数
    pub fn step(&self) -> usize {
        self.step
    }
}

/// 登记速度求解残差
///
/// 每相记为 `U.相名`，字段名 `U` 取各相的最大值。求解结果按相的顺序排列。
fn record_velocity_residuals(machine: &mut CorrectorStateMachine, fields: &FlowFields, perfs: &[SolvePerformance]) {
    let mut largest: Vec<(&str, f64)> = Vec::new();
    for (phase, perf) in fields.phases.phases().iter().zip(perfs) {
        machine.record_residual(&format!("{}.{}", perf.field, phase.name()), perf.initial_residual);
        match largest.iter_mut().find(|(name, _)| *name == perf.field) {
            Some((_, r)) => *r = r.max(perf.initial_residual),
            None => largest.push((perf.field.as_str(), perf.initial_residual)),
        }
    }
    for (name, r) in largest {
        machine.record_residual(name, r);
    }
}

impl<M: FvMesh + std::fmt::Debug> std::fmt::Debug for SegregatedFlowSolver<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegregatedFlowSolver")
            .field("strategy", &self.strategy.name())
            .field("time", &self.time)
            .field("step", &self.step)
            .field("services", &self.services)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::phase::Phase;
    use crate::fields::{BoundaryCondition, VolScalarField, VolVectorField};
    use crate::mesh::{CartesianMeshBuilder, PolyMesh};
    use crate::services::{ConstantDensity, LaminarStress};
    use glam::DVec3;

    fn channel_fields(mesh: &PolyMesh, n_phases: usize) -> FlowFields {
        let make_phase = |name: &str| {
            let u = VolVectorField::uniform(
                "U",
                mesh,
                DVec3::ZERO,
                vec![BoundaryCondition::fixed_value(1, DVec3::X), BoundaryCondition::ZeroGradient],
            )
            .unwrap();
            Phase::new(
                name,
                mesh,
                u,
                Box::new(ConstantDensity::new(mesh, 1.0).unwrap()),
                Box::new(LaminarStress::new(0.01)),
            )
            .unwrap()
        };
        let p = VolScalarField::uniform(
            "p",
            mesh,
            0.0,
            vec![BoundaryCondition::ZeroGradient, BoundaryCondition::fixed_value(1, 0.0)],
        )
        .unwrap();
        if n_phases == 1 {
            FlowFields::single_phase(mesh, p, make_phase("fluid")).unwrap()
        } else {
            let half = VolScalarField::calculated("alpha", mesh, vec![0.5; mesh.n_cells()]).unwrap();
            let phases = (0..n_phases)
                .map(|k| make_phase(&format!("phase{}", k)).with_alpha(mesh, half.clone()).unwrap())
                .collect();
            FlowFields::multiphase(mesh, p, phases).unwrap()
        }
    }

    #[test]
    fn test_rejects_non_positive_time_step() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let fields = channel_fields(&mesh, 1);
        let mut solver =
            SegregatedFlowSolver::new(mesh, CouplingConfig::piso(1), fields, FlowServices::default()).unwrap();
        assert!(solver.solve_time_step(0.0).is_err());
        assert!(solver.solve_time_step(f64::NAN).is_err());
        assert_eq!(solver.step(), 0);
    }

    #[test]
    fn test_single_phase_model_needs_one_phase() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let fields = channel_fields(&mesh, 2);
        let err = SegregatedFlowSolver::new(mesh, CouplingConfig::piso(1), fields, FlowServices::default())
            .unwrap_err();
        assert!(matches!(err, CouplingError::Configuration(_)));
    }

    #[test]
    fn test_transonic_needs_compressible_single_phase() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let fields = channel_fields(&mesh, 1);
        let mut config = CouplingConfig::piso(1);
        config.transonic = true;
        assert!(matches!(
            SegregatedFlowSolver::new(mesh, config, fields, FlowServices::default()),
            Err(CouplingError::Configuration(_))
        ));
    }

    #[test]
    fn test_step_report_counts() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let fields = channel_fields(&mesh, 1);
        let mut config = CouplingConfig::pimple(2, 3);
        config.controls.n_non_orth_correctors = 1;
        let mut solver = SegregatedFlowSolver::new(mesh, config, fields, FlowServices::default()).unwrap();
        assert_eq!(solver.strategy_name(), "incompressibleSinglePhase");

        let report = solver.solve_time_step(0.01).unwrap();
        assert_eq!(report.step, 1);
        assert_eq!(report.outer_iterations, 2);
        assert_eq!(report.pressure_solves, 2 * 3 * 2);
        assert_eq!(report.velocity_solves, 0);
        assert!(report.continuity.is_some());
        assert!((solver.time() - 0.01).abs() < 1e-15);
        assert!(report.summary().contains("步 1"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["pressure_solves"], 12);
        assert!(json["courant"]["max"].is_number());
    }
}
