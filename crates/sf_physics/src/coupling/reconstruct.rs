// crates/sf_physics/src/coupling/reconstruct.rs

//! 通量与速度重构
//!
//! 最后一次非正交修正之后：
//!
//! ```text
//! φ        = phiHbyA + pEqn.flux(p)              (与求解的矩阵逐位一致)
//! mSfGradp = pEqnIncomp.flux(p_relaxed)/D
//! U_k      = HbyA_k + reconstruct(rAtUf_k·(mSfGradp + F_k|Sf|))
//! ```
//!
//! 多相时各相体积通量为 `φv_k = phivHbyA_k + rAtUf_k·mSfGradp`（未松弛压力），
//! 膨胀率 `divU_k = −(pEqnComp_k & p)`。

use glam::DVec3;
use sf_config::VelocityCorrection;
use sf_foundation::float::VSMALL;

use super::cache::CouplingCache;
use super::phase::{volumetric_flux, FlowFields};
use super::reference::limit_pressure;
use super::strategy::CouplingEnv;
use crate::error::CouplingResult;
use crate::fields::VolScalarField;
use crate::numerics::FvScalarMatrix;
use crate::services::SolvePerformance;

/// 通量与速度重构器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluxVelocityReconstructor {
    multiphase: bool,
}

impl FluxVelocityReconstructor {
    /// 创建
    pub fn new(multiphase: bool) -> Self {
        Self { multiphase }
    }

    /// 由压力解重构通量、松弛压力并修正速度
    pub fn reconstruct(
        &self,
        env: &CouplingEnv<'_>,
        fields: &mut FlowFields,
        cache: &CouplingCache,
        p_eqn: &FvScalarMatrix,
        final_iteration: bool,
    ) -> CouplingResult<Vec<SolvePerformance>> {
        let mesh = env.mesh;
        let schemes = env.schemes();
        let phi_hbya = cache.phi_hbya()?;
        let d = cache.diffusivity()?;
        let incomp = cache.p_eqn_incomp()?;

        let phi: Vec<f64> = phi_hbya
            .iter()
            .zip(p_eqn.flux(mesh, &fields.p))
            .map(|(h, f)| h + f)
            .collect();

        if self.multiphase {
            let m = sf_grad_p(env, incomp, &fields.p, d);
            for k in 0..fields.phases.len() {
                let pred = cache.predictor(k)?;
                let phiv: Vec<f64> = pred
                    .phiv_hbya
                    .iter()
                    .zip(&pred.alpha_ratu_f)
                    .zip(&m)
                    .map(|((h, a), g)| h + a * g)
                    .collect();
                let div_u: Option<Vec<f64>> = cache.p_eqn_comp(k).map(|comp| {
                    comp.apply_to(mesh, fields.p.internal())
                        .into_iter()
                        .map(|v| -v)
                        .collect()
                });
                let phase = &mut fields.phases.phases_mut()[k];
                phase.phi_mut().assign(phiv);
                phase.set_div_u(div_u);
            }
        } else {
            let phase = &mut fields.phases.phases_mut()[0];
            let rho_f = schemes.interpolate(mesh, phase.thermo().rho());
            phase.phi_mut().assign(volumetric_flux(&phi, &rho_f));
        }
        fields.phi.assign(phi);

        fields.p.relax(env.config.relaxation.p);
        fields.p.correct_boundary_conditions(mesh);
        let m = sf_grad_p(env, incomp, &fields.p, d);

        let performances = match env.config.velocity_correction {
            VelocityCorrection::Reconstruct => {
                self.correct_explicit(env, fields, cache, &m)?;
                Vec::new()
            }
            VelocityCorrection::Implicit => self.correct_implicit(env, fields, cache, &m, final_iteration)?,
        };

        limit_pressure(mesh, &mut fields.p, &env.config.limits);
        Ok(performances)
    }

    /// `U_k = HbyA_k + reconstruct(rAtUf_k·(mSfGradp + F_k|Sf|))`
    fn correct_explicit(
        &self,
        env: &CouplingEnv<'_>,
        fields: &mut FlowFields,
        cache: &CouplingCache,
        m: &[f64],
    ) -> CouplingResult<()> {
        let mesh = env.mesh;
        for k in 0..fields.phases.len() {
            let pred = cache.predictor(k)?;
            let face: Vec<f64> = (0..mesh.n_faces())
                .map(|f| pred.alpha_ratu_f[f] * (m[f] + pred.face_force[f]))
                .collect();
            let correction = env.schemes().reconstruct(mesh, &face);
            let u = fields.phases.phases_mut()[k].u_mut();
            for ((ui, h), c) in u.internal_mut().iter_mut().zip(&pred.hbya).zip(correction) {
                *ui = *h + c;
            }
            u.correct_boundary_conditions(mesh);
        }
        Ok(())
    }

    /// 以重构压力梯度为显式源求解缓存的动量方程
    fn correct_implicit(
        &self,
        env: &CouplingEnv<'_>,
        fields: &mut FlowFields,
        cache: &CouplingCache,
        m: &[f64],
        final_iteration: bool,
    ) -> CouplingResult<Vec<SolvePerformance>> {
        let mesh = env.mesh;
        let schemes = env.schemes();
        let controls = env.config.solvers.for_field("U", final_iteration);
        let mut performances = Vec::with_capacity(fields.phases.len());

        for k in 0..fields.phases.len() {
            let pred = cache.predictor(k)?;
            let mut eqn = cache.momentum(k)?.clone();
            {
                let phases = fields.phases.phases();
                let alpha_f = if self.multiphase {
                    schemes.interpolate(mesh, phases[k].alpha())
                } else {
                    vec![1.0; mesh.n_faces()]
                };
                let face: Vec<f64> = (0..mesh.n_faces())
                    .map(|f| alpha_f[f] * (m[f] + pred.face_force[f]))
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

/// `mSfGradp = pEqnIncomp.flux(p)/D`，`D` 为零的面取零
fn sf_grad_p(env: &CouplingEnv<'_>, incomp: &FvScalarMatrix, p: &VolScalarField, d: &[f64]) -> Vec<f64> {
    incomp
        .flux(env.mesh, p)
        .into_iter()
        .zip(d)
        .map(|(f, &df)| if df.abs() > VSMALL { f / df } else { 0.0 })
        .collect()
}
