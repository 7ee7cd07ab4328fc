// crates/sf_physics/src/coupling/phase.rs

//! 相与流场
//!
//! 单相流动视为 α ≡ 1 的单个相；多相流动的每个相持有自己的体积分数、
//! 速度、体积通量与物性，共享同一个压力场。

use sf_foundation::float::VSMALL;
use sf_foundation::SfError;

use crate::error::{CouplingError, CouplingResult};
use crate::fields::{FaceFlux, VolScalarField, VolVectorField};
use crate::mesh::FvMesh;
use crate::numerics::fvc;
use crate::services::{StressModel, ThermoModel};

/// 体积分数之和的容差
const ALPHA_SUM_TOL: f64 = 1e-6;

/// 默认残余体积分数
const DEFAULT_RESIDUAL_ALPHA: f64 = 1e-6;

/// 单个相
pub struct Phase {
    name: String,
    alpha: VolScalarField,
    u: VolVectorField,
    phi: FaceFlux,
    thermo: Box<dyn ThermoModel>,
    stress: Box<dyn StressModel>,
    residual_alpha: f64,
    mass_transfer: Option<Vec<f64>>,
    div_u: Option<Vec<f64>>,
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("thermo", &self.thermo.name())
            .field("stress", &self.stress.name())
            .field("residual_alpha", &self.residual_alpha)
            .finish()
    }
}

impl Phase {
    /// 创建 α ≡ 1 的相，体积通量取 `U_f·Sf`
    pub fn new(
        name: impl Into<String>,
        mesh: &dyn FvMesh,
        u: VolVectorField,
        thermo: Box<dyn ThermoModel>,
        stress: Box<dyn StressModel>,
    ) -> CouplingResult<Self> {
        let name = name.into();
        SfError::check_size(u.name(), mesh.n_cells(), u.internal().len())?;
        SfError::check_size("rho", mesh.n_cells(), thermo.rho().internal().len())?;
        let alpha = VolScalarField::calculated(format!("alpha.{}", name), mesh, vec![1.0; mesh.n_cells()])?;
        let phi = FaceFlux::new(format!("phi.{}", name), fvc::flux(mesh, &u));
        Ok(Self {
            name,
            alpha,
            u,
            phi,
            thermo,
            stress,
            residual_alpha: DEFAULT_RESIDUAL_ALPHA,
            mass_transfer: None,
            div_u: None,
        })
    }

    /// 设置体积分数场
    pub fn with_alpha(mut self, mesh: &dyn FvMesh, alpha: VolScalarField) -> CouplingResult<Self> {
        SfError::check_size(alpha.name(), mesh.n_cells(), alpha.internal().len())?;
        if let Some(c) = alpha
            .internal()
            .iter()
            .position(|a| !(-ALPHA_SUM_TOL..=1.0 + ALPHA_SUM_TOL).contains(a))
        {
            return Err(CouplingError::phase(
                &self.name,
                format!("单元 {} 体积分数 {} 超出 [0, 1]", c, alpha.internal()[c]),
            ));
        }
        self.alpha = alpha;
        Ok(self)
    }

    /// 设置残余体积分数
    pub fn with_residual_alpha(mut self, residual_alpha: f64) -> CouplingResult<Self> {
        if !(residual_alpha > 0.0 && residual_alpha < 1.0) {
            return Err(CouplingError::phase(
                &self.name,
                format!("残余体积分数必须在 (0, 1) 内: {}", residual_alpha),
            ));
        }
        self.residual_alpha = residual_alpha;
        Ok(self)
    }

    /// 设置相间质量传递率（单位体积，流入本相为正）
    pub fn with_mass_transfer(mut self, mesh: &dyn FvMesh, dmdt: Vec<f64>) -> CouplingResult<Self> {
        SfError::check_size("dmdt", mesh.n_cells(), dmdt.len())?;
        self.mass_transfer = Some(dmdt);
        Ok(self)
    }

    /// 相名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 体积分数
    #[inline]
    pub fn alpha(&self) -> &VolScalarField {
        &self.alpha
    }

    /// 可变体积分数（由外部输运更新）
    #[inline]
    pub fn alpha_mut(&mut self) -> &mut VolScalarField {
        &mut self.alpha
    }

    /// 速度
    #[inline]
    pub fn u(&self) -> &VolVectorField {
        &self.u
    }

    /// 可变速度
    #[inline]
    pub fn u_mut(&mut self) -> &mut VolVectorField {
        &mut self.u
    }

    /// 体积通量
    #[inline]
    pub fn phi(&self) -> &FaceFlux {
        &self.phi
    }

    /// 可变体积通量
    #[inline]
    pub fn phi_mut(&mut self) -> &mut FaceFlux {
        &mut self.phi
    }

    /// 物性
    #[inline]
    pub fn thermo(&self) -> &dyn ThermoModel {
        self.thermo.as_ref()
    }

    /// 可变物性
    #[inline]
    pub fn thermo_mut(&mut self) -> &mut dyn ThermoModel {
        self.thermo.as_mut()
    }

    /// 应力模型
    #[inline]
    pub fn stress(&self) -> &dyn StressModel {
        self.stress.as_ref()
    }

    /// 残余体积分数
    #[inline]
    pub fn residual_alpha(&self) -> f64 {
        self.residual_alpha
    }

    /// 质量传递率
    pub fn mass_transfer(&self) -> Option<&[f64]> {
        self.mass_transfer.as_deref()
    }

    /// 膨胀率 `divU`（可压缩或有质量传递的相）
    pub fn div_u(&self) -> Option<&[f64]> {
        self.div_u.as_deref()
    }

    pub(crate) fn set_div_u(&mut self, div_u: Option<Vec<f64>>) {
        self.div_u = div_u;
    }

    /// 是否不可压缩
    #[inline]
    pub fn incompressible(&self) -> bool {
        self.thermo.incompressible()
    }

    /// 保存旧时间层（α、U、φ、ρ）
    pub fn store_old_time(&mut self) {
        self.alpha.store_old_time();
        self.u.store_old_time();
        self.phi.store_old_time();
        self.thermo.store_old_time();
    }

    /// `αρ`
    pub fn alpha_rho(&self) -> Vec<f64> {
        self.alpha
            .internal()
            .iter()
            .zip(self.thermo.rho().internal())
            .map(|(a, r)| a * r)
            .collect()
    }

    /// 旧时间层 `α₀ρ₀`
    pub fn alpha_rho_old(&self) -> Vec<f64> {
        self.alpha
            .old_internal()
            .iter()
            .zip(self.thermo.rho_old())
            .map(|(a, r)| a * r)
            .collect()
    }
}

/// 相集合
#[derive(Debug)]
pub struct PhaseSystem {
    phases: Vec<Phase>,
}

impl PhaseSystem {
    /// 创建并检查相名唯一、体积分数之和为一
    pub fn new(mesh: &dyn FvMesh, phases: Vec<Phase>) -> CouplingResult<Self> {
        if phases.is_empty() {
            return Err(CouplingError::configuration("相列表为空"));
        }
        for (i, a) in phases.iter().enumerate() {
            if phases[..i].iter().any(|b| b.name == a.name) {
                return Err(CouplingError::phase(&a.name, "相名重复"));
            }
        }
        for c in 0..mesh.n_cells() {
            let sum: f64 = phases.iter().map(|ph| ph.alpha.internal()[c]).sum();
            if (sum - 1.0).abs() > ALPHA_SUM_TOL {
                return Err(CouplingError::configuration(format!(
                    "单元 {} 体积分数之和为 {}，应为 1",
                    c, sum
                )));
            }
        }
        Ok(Self { phases })
    }

    /// 相数
    #[inline]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// 是否为空（构造后恒为 false）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// 全部相
    #[inline]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// 全部相（可变）
    #[inline]
    pub fn phases_mut(&mut self) -> &mut [Phase] {
        &mut self.phases
    }

    /// 第 k 个相
    #[inline]
    pub fn get(&self, k: usize) -> Option<&Phase> {
        self.phases.get(k)
    }

    /// 按名称查找
    pub fn find(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }

    /// 所有相是否不可压缩
    pub fn incompressible(&self) -> bool {
        self.phases.iter().all(Phase::incompressible)
    }

    /// 各相体积分数
    pub fn alphas(&self) -> Vec<&[f64]> {
        self.phases.iter().map(|p| p.alpha.internal()).collect()
    }

    /// 总质量 `Σ_k ∫α_k ρ_k dV`（本分区）
    pub fn total_mass(&self, mesh: &dyn FvMesh) -> f64 {
        self.phases
            .iter()
            .map(|p| fvc::domain_integrate(mesh, &p.alpha_rho()))
            .sum()
    }
}

/// 耦合引擎操作的全部流场
///
/// 单相时 `phi` 为质量通量 `ρ_f·φv`；多相时为混合体积通量 `Σ α_f·φv_k`。
#[derive(Debug)]
pub struct FlowFields {
    /// 共享压力
    pub p: VolScalarField,
    /// 混合通量
    pub phi: FaceFlux,
    /// 相
    pub phases: PhaseSystem,
}

impl FlowFields {
    /// 单相流场
    pub fn single_phase(mesh: &dyn FvMesh, p: VolScalarField, phase: Phase) -> CouplingResult<Self> {
        SfError::check_size(p.name(), mesh.n_cells(), p.internal().len())?;
        let rho_f = fvc::interpolate_cells(mesh, phase.thermo().rho().internal());
        let phi = phase
            .phi()
            .values()
            .iter()
            .zip(&rho_f)
            .map(|(f, r)| f * r)
            .collect();
        Ok(Self {
            p,
            phi: FaceFlux::new("phi", phi),
            phases: PhaseSystem::new(mesh, vec![phase])?,
        })
    }

    /// 多相流场
    pub fn multiphase(mesh: &dyn FvMesh, p: VolScalarField, phases: Vec<Phase>) -> CouplingResult<Self> {
        SfError::check_size(p.name(), mesh.n_cells(), p.internal().len())?;
        let phases = PhaseSystem::new(mesh, phases)?;
        let phi = mixture_flux(mesh, &phases);
        Ok(Self {
            p,
            phi: FaceFlux::new("phi", phi),
            phases,
        })
    }

    /// 保存旧时间层
    pub fn store_old_time(&mut self) {
        self.p.store_old_time();
        self.phi.store_old_time();
        for phase in self.phases.phases_mut() {
            phase.store_old_time();
        }
    }
}

/// 混合体积通量 `Σ α_f·φv_k`
pub fn mixture_flux(mesh: &dyn FvMesh, phases: &PhaseSystem) -> Vec<f64> {
    let mut phi = vec![0.0; mesh.n_faces()];
    for phase in phases.phases() {
        let alpha_f = fvc::interpolate(mesh, phase.alpha());
        for ((m, &a), &f) in phi.iter_mut().zip(&alpha_f).zip(phase.phi().values()) {
            *m += a * f;
        }
    }
    phi
}

/// 质量通量转体积通量，密度为零的面通量取零
pub(crate) fn volumetric_flux(mass_flux: &[f64], rho_f: &[f64]) -> Vec<f64> {
    mass_flux
        .iter()
        .zip(rho_f)
        .map(|(&f, &r)| if r.abs() > VSMALL { f / r } else { 0.0 })
        .collect()
}
