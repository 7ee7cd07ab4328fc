// crates/sf_physics/src/coupling/strategy.rs

//! 耦合策略
//!
//! 求解器驱动只认识 [`CouplingStrategy`]：外层开始、动量组装/预测、通量预测、
//! 压力方程组装、重构、密度修正与连续性误差。组装与重构由默认方法经
//! [`CouplingStages`] 完成，单相与多相只提供名称、形式与连续性误差。

use sf_config::{CouplingConfig, FlowModel};

use super::cache::CouplingCache;
use super::compressibility::CompressibilityCorrector;
use super::courant::{courant_number, CourantNumber};
use super::momentum::MomentumAssembler;
use super::phase::FlowFields;
use super::pressure::PressureEquationAssembler;
use super::reconstruct::FluxVelocityReconstructor;
use super::reference::PressureReferenceSpec;
use super::solver::FlowServices;
use crate::error::CouplingResult;
use crate::mesh::FvMesh;
use crate::numerics::{Discretization, FvScalarMatrix};
use crate::services::SolvePerformance;

/// 一个时间步内各组件共享的只读环境
pub struct CouplingEnv<'a> {
    /// 网格
    pub mesh: &'a dyn FvMesh,
    /// 配置
    pub config: &'a CouplingConfig,
    /// 外部服务
    pub services: &'a FlowServices,
    /// 参考压力
    pub reference: &'a PressureReferenceSpec,
    /// 时间步长
    pub dt: f64,
    /// 初始总质量（封闭可压缩域）
    pub initial_mass: f64,
}

impl<'a> CouplingEnv<'a> {
    /// 创建
    pub fn new(
        mesh: &'a dyn FvMesh,
        config: &'a CouplingConfig,
        services: &'a FlowServices,
        reference: &'a PressureReferenceSpec,
        dt: f64,
        initial_mass: f64,
    ) -> Self {
        Self {
            mesh,
            config,
            services,
            reference,
            dt,
            initial_mass,
        }
    }

    /// 离散格式
    #[inline]
    pub fn schemes(&self) -> &'a dyn Discretization {
        self.services.schemes.as_ref()
    }

    /// 是否瞬态
    #[inline]
    pub fn transient(&self) -> bool {
        self.config.is_transient()
    }

    /// 面力 `ρ_f·g·Sf/|Sf|`；没有面力服务时为零
    pub fn face_force(&self, rho_f: &[f64]) -> Vec<f64> {
        match &self.services.face_force {
            Some(model) => model.face_force(self.mesh, rho_f),
            None => vec![0.0; self.mesh.n_faces()],
        }
    }
}

/// 压力方程形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formulation {
    /// 所有相 ψ = 0
    Incompressible,
    /// 至少一相可压缩
    Compressible,
}

impl Formulation {
    /// 由相系统判定
    pub fn of(fields: &FlowFields) -> Self {
        if fields.phases.incompressible() {
            Self::Incompressible
        } else {
            Self::Compressible
        }
    }
}

/// 单相与多相共用的组装器组合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouplingStages {
    momentum: MomentumAssembler,
    pressure: PressureEquationAssembler,
    reconstructor: FluxVelocityReconstructor,
}

impl CouplingStages {
    /// 创建；`multiphase` 决定权重与混合通量的取法
    pub fn new(multiphase: bool) -> Self {
        Self {
            momentum: MomentumAssembler::new(multiphase),
            pressure: PressureEquationAssembler::new(multiphase),
            reconstructor: FluxVelocityReconstructor::new(multiphase),
        }
    }
}

/// 耦合策略
pub trait CouplingStrategy: Send + Sync {
    /// 策略名称
    fn name(&self) -> &'static str;

    /// 压力方程形式
    fn formulation(&self) -> Formulation;

    /// 组装器
    fn stages(&self) -> &CouplingStages;

    /// 外层修正开始：更新物性并记录 `p0`
    fn begin_outer(&self, _env: &CouplingEnv<'_>, fields: &mut FlowFields, cache: &mut CouplingCache) -> CouplingResult<()> {
        for phase in fields.phases.phases_mut() {
            phase.thermo_mut().correct(&fields.p);
        }
        cache.set_p0(fields.p.internal().to_vec());
        Ok(())
    }

    /// 组装并缓存动量方程；`predict` 时以当前压力求解
    fn assemble_momentum(
        &self,
        env: &CouplingEnv<'_>,
        fields: &mut FlowFields,
        cache: &mut CouplingCache,
        predict: bool,
        final_iteration: bool,
    ) -> CouplingResult<Vec<SolvePerformance>> {
        let momentum = &self.stages().momentum;
        momentum.assemble_all(env, fields, cache);
        if predict {
            momentum.predict(env, fields, cache, final_iteration)
        } else {
            Ok(Vec::new())
        }
    }

    /// 通量预测：`HbyA`、`phiHbyA` 与压力扩散系数
    fn predict_flux(&self, env: &CouplingEnv<'_>, fields: &mut FlowFields, cache: &mut CouplingCache) -> CouplingResult<()> {
        self.stages().pressure.predict(env, fields, cache)
    }

    /// 组装压力方程
    fn assemble_pressure(&self, env: &CouplingEnv<'_>, fields: &FlowFields, cache: &mut CouplingCache) -> CouplingResult<FvScalarMatrix> {
        self.stages().pressure.assemble(env, fields, cache)
    }

    /// 由压力解重构通量与速度
    fn reconstruct(
        &self,
        env: &CouplingEnv<'_>,
        fields: &mut FlowFields,
        cache: &CouplingCache,
        p_eqn: &FvScalarMatrix,
        final_iteration: bool,
    ) -> CouplingResult<Vec<SolvePerformance>> {
        self.stages().reconstructor.reconstruct(env, fields, cache, p_eqn, final_iteration)
    }

    /// 最后一次压力修正后的参考压力与密度修正
    fn correct_density(&self, env: &CouplingEnv<'_>, fields: &mut FlowFields, cache: &CouplingCache) -> CouplingResult<()> {
        CompressibilityCorrector.correct(env, fields, cache)
    }

    /// 单位体积质量不平衡与参考密度
    fn continuity_error(&self, env: &CouplingEnv<'_>, fields: &FlowFields) -> (Vec<f64>, f64);

    /// 各相体积通量的 Courant 数（取最大）
    fn courant(&self, env: &CouplingEnv<'_>, fields: &FlowFields) -> CourantNumber {
        fields
            .phases
            .phases()
            .iter()
            .map(|phase| courant_number(env.mesh, phase.phi().values(), env.dt, env.services.exchange.as_ref()))
            .fold(CourantNumber::default(), CourantNumber::max_with)
    }
}

// ========== 单相 ==========

/// 单相耦合（不可压缩或可压缩）
#[derive(Debug, Clone, Copy)]
pub struct SinglePhaseCoupling {
    formulation: Formulation,
    stages: CouplingStages,
}

impl SinglePhaseCoupling {
    /// 创建
    pub fn new(formulation: Formulation) -> Self {
        Self {
            formulation,
            stages: CouplingStages::new(false),
        }
    }
}

impl CouplingStrategy for SinglePhaseCoupling {
    fn name(&self) -> &'static str {
        match self.formulation {
            Formulation::Incompressible => "incompressibleSinglePhase",
            Formulation::Compressible => "compressibleSinglePhase",
        }
    }

    fn formulation(&self) -> Formulation {
        self.formulation
    }

    fn stages(&self) -> &CouplingStages {
        &self.stages
    }

    /// 不可压缩：`e = div(φ)`；可压缩：`e = ∂ρ/∂t + div(φ)`。参考密度取平均密度。
    fn continuity_error(&self, env: &CouplingEnv<'_>, fields: &FlowFields) -> (Vec<f64>, f64) {
        let mesh = env.mesh;
        let phase = &fields.phases.phases()[0];
        let rho = phase.thermo().rho().internal();
        let mut error = env.schemes().divergence(mesh, fields.phi.values());

        if self.formulation == Formulation::Compressible && env.transient() {
            for ((e, r), r0) in error.iter_mut().zip(rho).zip(phase.thermo().rho_old()) {
                *e += (r - r0) / env.dt;
            }
        }

        let exchange = env.services.exchange.as_ref();
        let volumes = mesh.cell_volumes();
        let mass = exchange.sum(rho.iter().zip(volumes).map(|(r, v)| r * v).sum());
        let volume = exchange.sum(volumes.iter().sum());
        let rho_mean = if volume > 0.0 { mass / volume } else { 1.0 };
        (error, rho_mean)
    }
}

// ========== 多相 ==========

/// 欧拉多相耦合（共享压力）
#[derive(Debug, Clone, Copy)]
pub struct MultiphaseCoupling {
    formulation: Formulation,
    stages: CouplingStages,
}

impl MultiphaseCoupling {
    /// 创建
    pub fn new(formulation: Formulation) -> Self {
        Self {
            formulation,
            stages: CouplingStages::new(true),
        }
    }
}

impl CouplingStrategy for MultiphaseCoupling {
    fn name(&self) -> &'static str {
        "multiphaseEuler"
    }

    fn formulation(&self) -> Formulation {
        self.formulation
    }

    fn stages(&self) -> &CouplingStages {
        &self.stages
    }

    /// `e = div(φ) − Σ divU_k`，混合通量为体积通量，参考密度取 1
    fn continuity_error(&self, env: &CouplingEnv<'_>, fields: &FlowFields) -> (Vec<f64>, f64) {
        let mut error = env.schemes().divergence(env.mesh, fields.phi.values());
        for phase in fields.phases.phases() {
            if let Some(div_u) = phase.div_u() {
                for (e, d) in error.iter_mut().zip(div_u) {
                    *e -= d;
                }
            }
        }
        (error, 1.0)
    }
}

/// 按流动模型与相系统选择策略
pub fn select_strategy(config: &CouplingConfig, fields: &FlowFields) -> Box<dyn CouplingStrategy> {
    let formulation = Formulation::of(fields);
    match config.flow_model {
        FlowModel::SinglePhase => Box::new(SinglePhaseCoupling::new(formulation)),
        FlowModel::Multiphase => Box::new(MultiphaseCoupling::new(formulation)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::phase::Phase;
    use crate::fields::{VolScalarField, VolVectorField};
    use crate::mesh::CartesianMeshBuilder;
    use crate::services::{ConstantDensity, LaminarStress, PerfectGas};
    use glam::DVec3;

    fn fields(compressible: bool) -> FlowFields {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let p = VolScalarField::calculated("p", &mesh, vec![1e5; 2]).unwrap();
        let u = VolVectorField::calculated("U", &mesh, vec![DVec3::ZERO; 2]).unwrap();
        let thermo: Box<dyn crate::services::ThermoModel> = if compressible {
            Box::new(PerfectGas::new(&mesh, 287.0, 300.0, &p).unwrap())
        } else {
            Box::new(ConstantDensity::new(&mesh, 1.0).unwrap())
        };
        let phase = Phase::new("fluid", &mesh, u, thermo, Box::new(LaminarStress::new(0.0))).unwrap();
        FlowFields::single_phase(&mesh, p, phase).unwrap()
    }

    #[test]
    fn test_strategy_selection() {
        let mut config = CouplingConfig::piso(2);
        let s = select_strategy(&config, &fields(false));
        assert_eq!(s.formulation(), Formulation::Incompressible);
        assert_eq!(s.name(), "incompressibleSinglePhase");

        let s = select_strategy(&config, &fields(true));
        assert_eq!(s.formulation(), Formulation::Compressible);

        config.flow_model = FlowModel::Multiphase;
        assert_eq!(select_strategy(&config, &fields(false)).name(), "multiphaseEuler");
    }

    #[test]
    fn test_strategies_share_stage_behaviour() {
        let single = SinglePhaseCoupling::new(Formulation::Incompressible);
        let multi = MultiphaseCoupling::new(Formulation::Compressible);
        assert_eq!(*single.stages(), CouplingStages::new(false));
        assert_eq!(*multi.stages(), CouplingStages::new(true));
        assert_ne!(single.stages(), multi.stages());
    }

    #[test]
    fn test_face_force_defaults_to_zero() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let f = fields(false);
        let config = CouplingConfig::piso(1);
        let services = FlowServices::default();
        let reference = PressureReferenceSpec::resolve(&mesh, &f.p, &config, false).unwrap();
        let env = CouplingEnv::new(&mesh, &config, &services, &reference, 0.1, 0.0);
        assert_eq!(env.face_force(&[1.0; 3]), vec![0.0; 3]);
        assert!(env.transient());
    }
}
