// crates/sf_physics/src/coupling/momentum.rs

//! 动量方程组装与预测
//!
//! 每相一个方程：
//!
//! ```text
//! ddt(w, U) + div(φm, U) + divDevRhoReff(U) + Σ Kd·U = 源项 + 显式相间力
//! ```
//!
//! 权重 `w`：不可压缩单相为 ρ（新旧时间层均取当前 ρ），可压缩单相为 ρ 与 ρ₀，
//! 多相为 αρ 与 α₀ρ₀。`φm` 为对流质量通量。压力梯度不进入缓存的方程，
//! 只在预测步以面重构源项的形式临时加入。

use glam::DVec3;

use super::cache::{CouplingCache, DragCoefficients};
use super::phase::FlowFields;
use super::strategy::CouplingEnv;
use crate::error::CouplingResult;
use crate::numerics::FvMatrix;
use crate::services::SolvePerformance;

/// 动量方程组装器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentumAssembler {
    multiphase: bool,
}

impl MomentumAssembler {
    /// 创建；`multiphase` 决定权重与对流通量的取法
    pub fn new(multiphase: bool) -> Self {
        Self { multiphase }
    }

    /// 组装并松弛所有相的动量方程，写入缓存
    pub fn assemble_all(&self, env: &CouplingEnv<'_>, fields: &FlowFields, cache: &mut CouplingCache) {
        for k in 0..fields.phases.len() {
            let (eqn, drag) = self.assemble(env, fields, k);
            cache.set_momentum(k, eqn, drag);
        }
    }

    /// 组装相 k 的动量方程（已松弛）与其曳力系数
    pub fn assemble(&self, env: &CouplingEnv<'_>, fields: &FlowFields, k: usize) -> (FvMatrix<DVec3>, DragCoefficients) {
        let mesh = env.mesh;
        let schemes = env.schemes();
        let phase = &fields.phases.phases()[k];
        let u = phase.u();
        let (weight, weight_old, mass_flux) = self.weights(env, fields, k);

        let mut eqn = schemes.convection(mesh, &mass_flux, u);
        if env.transient() {
            eqn += schemes.transient(mesh, &weight, &weight_old, u, env.dt);
        }
        eqn += phase.stress().div_dev_rho_reff(mesh, schemes, &weight, u);
        env.services.sources.add_to(mesh, &weight, u, &mut eqn);

        let mut drag = Vec::new();
        if self.multiphase {
            let n_cells = mesh.n_cells();
            let transfer = env.services.transfer.as_ref();
            let alphas = fields.phases.alphas();
            let mut kd_sum = vec![0.0; n_cells];
            for j in 0..fields.phases.len() {
                if j == k {
                    continue;
                }
                if let Some(kd) = transfer.kd(k, j, &alphas) {
                    for (s, v) in kd_sum.iter_mut().zip(&kd) {
                        *s += v;
                    }
                    drag.push((j, kd));
                }
            }
            if !drag.is_empty() {
                eqn.add_sp(mesh, &kd_sum);
            }
            if let Some(force) = transfer.explicit_force(k, n_cells) {
                let neg: Vec<DVec3> = force.into_iter().map(|f| -f).collect();
                eqn.add_explicit(mesh, &neg);
            }
        }

        eqn.relax(mesh, u.internal(), env.config.relaxation.u_eqn);
        (eqn, drag)
    }

    /// 权重、旧时间层权重与对流质量通量
    fn weights(&self, env: &CouplingEnv<'_>, fields: &FlowFields, k: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let phase = &fields.phases.phases()[k];
        let rho = phase.thermo().rho().internal();
        if self.multiphase {
            let schemes = env.schemes();
            let alpha_f = schemes.interpolate(env.mesh, phase.alpha());
            let rho_f = schemes.interpolate(env.mesh, phase.thermo().rho());
            let mass_flux = phase
                .phi()
                .values()
                .iter()
                .zip(&alpha_f)
                .zip(&rho_f)
                .map(|((f, a), r)| a * r * f)
                .collect();
            (phase.alpha_rho(), phase.alpha_rho_old(), mass_flux)
        } else if phase.incompressible() {
            (rho.to_vec(), rho.to_vec(), fields.phi.values().to_vec())
        } else {
            (
                rho.to_vec(),
                phase.thermo().rho_old().to_vec(),
                fields.phi.values().to_vec(),
            )
        }
    }

    /// 动量预测：以当前压力梯度（面重构）求解缓存的方程
    pub fn predict(
        &self,
        env: &CouplingEnv<'_>,
        fields: &mut FlowFields,
        cache: &CouplingCache,
        final_iteration: bool,
    ) -> CouplingResult<Vec<SolvePerformance>> {
        let mesh = env.mesh;
        let schemes = env.schemes();
        let controls = env.config.solvers.for_field("U", final_iteration);
        let sn_grad = schemes.sn_grad(mesh, &fields.p);

        let mut performances = Vec::with_capacity(fields.phases.len());
        for k in 0..fields.phases.len() {
            let mut eqn = cache.momentum(k)?.clone();
            {
                let phases = fields.phases.phases();
                let phase = &phases[k];
                let rho_f = schemes.interpolate(mesh, phase.thermo().rho());
                let force = env.face_force(&rho_f);
                let alpha_f = if self.multiphase {
                    schemes.interpolate(mesh, phase.alpha())
                } else {
                    vec![1.0; mesh.n_faces()]
                };
                let face: Vec<f64> = (0..mesh.n_faces())
                    .map(|f| alpha_f[f] * (force[f] - sn_grad[f]) * mesh.mag_sf()[f])
                    .collect();
                let source: Vec<DVec3> = schemes.reconstruct(mesh, &face).into_iter().map(|v| -v).collect();
                eqn.add_explicit(mesh, &source);

                for (j, kd) in cache.drag(k) {
                    let partner: Vec<DVec3> = phases[*j]
                        .u()
                        .internal()
                        .iter()
                        .zip(kd)
                        .map(|(u, c)| -*u * *c)
                        .collect();
                    eqn.add_explicit(mesh, &partner);
                }
            }

            let u = fields.phases.phases_mut()[k].u_mut();
            performances.push(env.services.linear.solve_vector(mesh, &eqn, u, controls));
        }
        Ok(performances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::phase::Phase;
    use crate::coupling::reference::PressureReferenceSpec;
    use crate::coupling::solver::FlowServices;
    use crate::fields::{BoundaryCondition, VolScalarField, VolVectorField};
    use crate::mesh::{CartesianMeshBuilder, PolyMesh};
    use crate::services::{ConstantDensity, LaminarStress};
    use sf_config::CouplingConfig;

    fn channel(u0: DVec3) -> (PolyMesh, FlowFields) {
        let mesh = CartesianMeshBuilder::new(4, 1, 1).lengths(4.0, 1.0, 1.0).build().unwrap();
        let u = VolVectorField::uniform(
            "U",
            &mesh,
            u0,
            vec![BoundaryCondition::fixed_value(1, u0), BoundaryCondition::ZeroGradient],
        )
        .unwrap();
        let p = VolScalarField::uniform(
            "p",
            &mesh,
            0.0,
            vec![BoundaryCondition::ZeroGradient, BoundaryCondition::fixed_value(1, 0.0)],
        )
        .unwrap();
        let phase = Phase::new(
            "fluid",
            &mesh,
            u,
            Box::new(ConstantDensity::new(&mesh, 2.0).unwrap()),
            Box::new(LaminarStress::new(0.0)),
        )
        .unwrap();
        let mut fields = FlowFields::single_phase(&mesh, p, phase).unwrap();
        fields.store_old_time();
        (mesh, fields)
    }

    #[test]
    fn test_uniform_flow_equation_is_balanced() {
        let (mesh, fields) = channel(DVec3::X);
        let config = CouplingConfig::piso(1);
        let services = FlowServices::default();
        let reference = PressureReferenceSpec::resolve(&mesh, &fields.p, &config, true).unwrap();
        let env = CouplingEnv::new(&mesh, &config, &services, &reference, 0.1, 0.0);

        let (eqn, drag) = MomentumAssembler::new(false).assemble(&env, &fields, 0);
        assert!(drag.is_empty());

        // 均匀来流、无压力梯度：残差为零，A 含 ρ/Δt
        let u = fields.phases.phases()[0].u().internal();
        for r in eqn.residual(&mesh, u) {
            assert!(r.length() < 1e-10);
        }
        let a = eqn.a(&mesh);
        assert!(a.iter().all(|&v| v >= 2.0 / 0.1 - 1e-10));
    }

    #[test]
    fn test_predictor_keeps_uniform_flow() {
        let (mesh, mut fields) = channel(DVec3::X);
        let config = CouplingConfig::piso(1);
        let services = FlowServices::default();
        let reference = PressureReferenceSpec::resolve(&mesh, &fields.p, &config, true).unwrap();
        let env = CouplingEnv::new(&mesh, &config, &services, &reference, 0.1, 0.0);

        let assembler = MomentumAssembler::new(false);
        let mut cache = CouplingCache::new(1);
        assembler.assemble_all(&env, &fields, &mut cache);
        assembler.predict(&env, &mut fields, &cache, true).unwrap();
        for u in fields.phases.phases()[0].u().internal() {
            assert!((u.x - 1.0).abs() < 1e-8);
            assert!(u.y.abs() < 1e-12);
        }
    }
}
