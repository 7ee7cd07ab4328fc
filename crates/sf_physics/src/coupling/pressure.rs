// crates/sf_physics/src/coupling/pressure.rs

//! 压力方程组装
//!
//! 每次压力修正先为每相构造通量预测 [`FluxPredictor`]：
//!
//! ```text
//! rAU      = 1/(A + max(α_res − α, 0)·ρ/Δt)
//! rAtU     = 1/max(A − H1, (1 − h1_clamp)·A)     (SIMPLE-C，逐相)
//! HbyA     = rAU·(H + max(α_res − α, 0)·ρ·U₀/Δt) + rAU·Σ Kd·U_j
//! phivHbyA = flux(HbyA) + ddtCorr + Σ interp(rAU·Kd)·φv_j + rAtUf·F·|Sf|
//! ```
//!
//! 再两步组合混合量：单相 `phiHbyA = ρf·phivHbyA`、`D = ρf·rAtUf`；
//! 多相 `phiHbyA = Σ αf·phivHbyA_k`、`D = |Σ αf·rAtUf_k|`。压力方程：
//!
//! ```text
//! pEqn = div(phiHbyA) − laplacian(D, p) + 可压缩项 [+ 跨音速项] = 0
//! ```
//!
//! 所有除法都经过稳定化，零面积面与零耦合面交换的通量为零。

use glam::DVec3;
use sf_foundation::float::{pos0, safe_div, stabilise, SMALL, VSMALL};

use super::cache::CouplingCache;
use super::phase::{FlowFields, Phase};
use super::reference::adjust_phi;
use super::strategy::CouplingEnv;
use crate::error::CouplingResult;
use crate::fields::{BoundaryCondition, VolScalarField};
use crate::numerics::{fvc, FvMatrix, FvScalarMatrix};

/// 单相通量预测
#[derive(Debug, Clone)]
pub struct FluxPredictor {
    /// `1/A`
    pub rau: Vec<f64>,
    /// 一致性格式下的 `1/(A − H1)`，否则等于 `rau`
    pub ratu: Vec<f64>,
    /// `HbyA` 单元值
    pub hbya: Vec<DVec3>,
    /// 预测体积通量 `phivHbyA`
    pub phiv_hbya: Vec<f64>,
    /// 压力扩散系数 `interp(max(α, α_res)·rAtU)`
    pub alpha_ratu_f: Vec<f64>,
    /// 面力通量密度 `F·|Sf|`
    pub face_force: Vec<f64>,
}

impl FluxPredictor {
    /// 面力对预测通量的贡献 `rAtUf·F·|Sf|`
    pub fn force_flux(&self) -> Vec<f64> {
        self.alpha_ratu_f
            .iter()
            .zip(&self.face_force)
            .map(|(d, f)| d * f)
            .collect()
    }
}

/// 压力方程组装器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressureEquationAssembler {
    multiphase: bool,
}

impl PressureEquationAssembler {
    /// 创建
    pub fn new(multiphase: bool) -> Self {
        Self { multiphase }
    }

    // ========== 通量预测 ==========

    /// 相 k 的通量预测（只读当前场与缓存的动量方程）
    pub fn flux_predictor(
        &self,
        env: &CouplingEnv<'_>,
        fields: &FlowFields,
        cache: &CouplingCache,
        k: usize,
    ) -> CouplingResult<FluxPredictor> {
        let mesh = env.mesh;
        let schemes = env.schemes();
        let config = env.config;
        let transient = env.transient();
        let n_internal = mesh.n_internal_faces();
        let mag_sf = mesh.mag_sf();

        let phases = fields.phases.phases();
        let phase = &phases[k];
        let u = phase.u();
        let u_eqn = cache.momentum(k)?;
        let alpha = phase.alpha().internal();
        let rho = phase.thermo().rho().internal();

        // 残余体积分数稳定项
        let residual: Vec<f64> = if self.multiphase && transient {
            alpha
                .iter()
                .zip(rho)
                .map(|(a, r)| (phase.residual_alpha() - a).max(0.0) * r / env.dt)
                .collect()
        } else {
            vec![0.0; mesh.n_cells()]
        };

        let mut a = u_eqn.a(mesh);
        for (ai, r) in a.iter_mut().zip(&residual) {
            *ai += r;
        }
        let rau: Vec<f64> = a.iter().map(|&ai| 1.0 / stabilise(ai, VSMALL)).collect();
        let consistent = config.controls.consistent;
        let ratu: Vec<f64> = if consistent {
            let clamp = 1.0 - config.controls.h1_clamp;
            a.iter()
                .zip(u_eqn.h1(mesh))
                .map(|(&ai, h1)| 1.0 / stabilise((ai - h1).max(clamp * ai), VSMALL))
                .collect()
        } else {
            rau.clone()
        };

        let mut hbya: Vec<DVec3> = u_eqn
            .h(mesh, u.internal())
            .into_iter()
            .zip(u.old_internal())
            .zip(&residual)
            .zip(&rau)
            .map(|(((h, &u0), &r), &ra)| (h + u0 * r) * ra)
            .collect();

        // constrainHbyA：固定值补丁取速度边界值
        let owner = mesh.owner();
        let mut hbya_b = vec![DVec3::ZERO; mesh.n_boundary_faces()];
        for (patch, bc) in mesh.patches().iter().zip(u.bcs()) {
            for f in patch.faces() {
                let b = f - n_internal;
                hbya_b[b] = if bc.fixes_value() { u.boundary()[b] } else { hbya[owner[f]] };
            }
        }
        let mut phiv = schemes.flux(mesh, &hbya, &hbya_b);

        if transient && config.ddt_flux_correction {
            let phiv_old = phase.phi().old();
            let u_old_flux = schemes.flux(mesh, u.old_internal(), u.old_boundary());
            let coeff: Vec<f64> = phase
                .alpha_rho_old()
                .iter()
                .zip(&rau)
                .map(|(ar, ra)| ar * ra)
                .collect();
            let coeff_f = schemes.interpolate_cells(mesh, &coeff);
            let alpha_f = self
                .multiphase
                .then(|| schemes.interpolate(mesh, phase.alpha()));
            for f in 0..n_internal {
                let corr = phiv_old[f] - u_old_flux[f];
                let mut c = 1.0 - (corr.abs() / (phiv_old[f].abs() + SMALL)).min(1.0);
                if let Some(af) = &alpha_f {
                    c *= pos0(af[f] - config.ddt_alpha_threshold);
                }
                phiv[f] += c * coeff_f[f] * corr / env.dt;
            }
        }

        let alpha_ratu: Vec<f64> = alpha
            .iter()
            .zip(&ratu)
            .map(|(a, r)| a.max(phase.residual_alpha()) * r)
            .collect();
        let alpha_ratu_f = schemes.interpolate_cells(mesh, &alpha_ratu);

        let rho_f = schemes.interpolate(mesh, phase.thermo().rho());
        let force = env.face_force(&rho_f);
        let face_force: Vec<f64> = force.iter().zip(mag_sf).map(|(f, m)| f * m).collect();
        for ((p, d), ff) in phiv.iter_mut().zip(&alpha_ratu_f).zip(&face_force) {
            *p += d * ff;
        }

        if consistent {
            let sn_grad = schemes.sn_grad(mesh, &fields.p);
            let g: Vec<f64> = (0..mesh.n_faces())
                .map(|f| (sn_grad[f] - force[f]) * mag_sf[f])
                .collect();
            let diff: Vec<f64> = ratu.iter().zip(&rau).map(|(t, r)| t - r).collect();
            let diff_f = schemes.interpolate_cells(mesh, &diff);
            for ((p, d), gf) in phiv.iter_mut().zip(&diff_f).zip(&g) {
                *p += d * gf;
            }
            for ((h, rec), d) in hbya.iter_mut().zip(schemes.reconstruct(mesh, &g)).zip(&diff) {
                *h += rec * *d;
            }
        }

        // 相间曳力的伙伴相耦合，固定速度边界面的通量保持不变
        let drag = cache.drag(k);
        if !drag.is_empty() {
            let mut coupled = vec![true; mesh.n_faces()];
            for (patch, bc) in mesh.patches().iter().zip(u.bcs()) {
                if bc.fixes_value() {
                    patch.faces().for_each(|f| coupled[f] = false);
                }
            }
            for (j, kd) in drag {
                let partner = &phases[*j];
                let rau_kd: Vec<f64> = rau.iter().zip(kd).map(|(r, c)| r * c).collect();
                for ((h, &uj), &c) in hbya.iter_mut().zip(partner.u().internal()).zip(&rau_kd) {
                    *h += uj * c;
                }
                let coeff_f = schemes.interpolate_cells(mesh, &rau_kd);
                for (f, phi_j) in partner.phi().values().iter().enumerate() {
                    if coupled[f] {
                        phiv[f] += coeff_f[f] * phi_j;
                    }
                }
            }
        }

        Ok(FluxPredictor {
            rau,
            ratu,
            hbya,
            phiv_hbya: phiv,
            alpha_ratu_f,
            face_force,
        })
    }

    /// 全部相的通量预测、混合通量、封闭域通量调整与固定通量压力边界
    pub fn predict(&self, env: &CouplingEnv<'_>, fields: &mut FlowFields, cache: &mut CouplingCache) -> CouplingResult<()> {
        let mut predictors = (0..fields.phases.len())
            .map(|k| self.flux_predictor(env, fields, cache, k))
            .collect::<CouplingResult<Vec<_>>>()?;

        if env.reference.needs_reference() {
            // 面力通量不参与边界通量平衡
            let forces: Vec<Vec<f64>> = predictors.iter().map(FluxPredictor::force_flux).collect();
            for (pred, force) in predictors.iter_mut().zip(&forces) {
                for (p, f) in pred.phiv_hbya.iter_mut().zip(force) {
                    *p -= f;
                }
            }
            let (mut phi, _) = self.mixture(env, fields, &predictors);
            let scale = adjust_phi(
                env.mesh,
                &mut phi,
                fields.phases.phases()[0].u(),
                env.services.exchange.as_ref(),
            )?;
            for (pred, force) in predictors.iter_mut().zip(&forces) {
                for ((p, s), f) in pred.phiv_hbya.iter_mut().zip(&scale).zip(force) {
                    *p = *p * s + f;
                }
            }
        }

        let (phi_hbya, diffusivity) = self.mixture(env, fields, &predictors);
        self.constrain_pressure(env, fields, &phi_hbya, &diffusivity);
        for (k, pred) in predictors.into_iter().enumerate() {
            cache.set_predictor(k, pred);
        }
        cache.set_mixture(phi_hbya, diffusivity);
        Ok(())
    }

    /// 混合 `phiHbyA` 与压力扩散系数 `D`
    fn mixture(&self, env: &CouplingEnv<'_>, fields: &FlowFields, predictors: &[FluxPredictor]) -> (Vec<f64>, Vec<f64>) {
        let mesh = env.mesh;
        let schemes = env.schemes();
        let n_faces = mesh.n_faces();
        if self.multiphase {
            let mut phi = vec![0.0; n_faces];
            let mut d = vec![0.0; n_faces];
            for (phase, pred) in fields.phases.phases().iter().zip(predictors) {
                let alpha_f = schemes.interpolate(mesh, phase.alpha());
                for f in 0..n_faces {
                    phi[f] += alpha_f[f] * pred.phiv_hbya[f];
                    d[f] += alpha_f[f] * pred.alpha_ratu_f[f];
                }
            }
            d.iter_mut().for_each(|v| *v = v.abs());
            (phi, d)
        } else {
            let rho_f = schemes.interpolate(mesh, fields.phases.phases()[0].thermo().rho());
            let pred = &predictors[0];
            let phi = rho_f.iter().zip(&pred.phiv_hbya).map(|(r, p)| r * p).collect();
            let d = rho_f.iter().zip(&pred.alpha_ratu_f).map(|(r, a)| r * a).collect();
            (phi, d)
        }
    }

    /// 固定通量压力边界：令修正后的边界通量等于边界速度通量
    pub fn constrain_pressure(&self, env: &CouplingEnv<'_>, fields: &mut FlowFields, phi_hbya: &[f64], d: &[f64]) {
        let mesh = env.mesh;
        let n_internal = mesh.n_internal_faces();
        let sf = mesh.sf();
        let mag_sf = mesh.mag_sf();

        for (patch_idx, patch) in mesh.patches().iter().enumerate() {
            if !matches!(fields.p.bcs()[patch_idx], BoundaryCondition::FixedFluxPressure(_)) {
                continue;
            }
            let gradient: Vec<f64> = patch
                .faces()
                .map(|f| {
                    let b = f - n_internal;
                    let target = self.boundary_flux(fields, b, sf[f]);
                    let denom = mag_sf[f] * d[f];
                    if denom.abs() > VSMALL {
                        (phi_hbya[f] - target) / denom
                    } else {
                        0.0
                    }
                })
                .collect();
            if let BoundaryCondition::FixedFluxPressure(g) = fields.p.bc_mut(patch_idx) {
                *g = gradient;
            }
        }
        fields.p.correct_boundary_conditions(mesh);
    }

    /// 边界面 b 上由速度边界值给出的目标通量
    fn boundary_flux(&self, fields: &FlowFields, b: usize, sf: DVec3) -> f64 {
        let phases = fields.phases.phases();
        if self.multiphase {
            phases
                .iter()
                .map(|ph| ph.alpha().boundary()[b] * ph.u().boundary()[b].dot(sf))
                .sum()
        } else {
            let phase = &phases[0];
            phase.thermo().rho().boundary()[b] * phase.u().boundary()[b].dot(sf)
        }
    }

    // ========== 方程组装 ==========

    /// 组装完整压力方程，并把不可压缩部分与各相可压缩部分写入缓存
    pub fn assemble(&self, env: &CouplingEnv<'_>, fields: &FlowFields, cache: &mut CouplingCache) -> CouplingResult<FvScalarMatrix> {
        let mesh = env.mesh;
        let p = &fields.p;
        let incomp = self.incompressible_part(env, p, cache.phi_hbya()?, cache.diffusivity()?);
        let p0 = cache.p0()?;

        let comps: Vec<Option<FvScalarMatrix>> = if self.multiphase {
            fields
                .phases
                .phases()
                .iter()
                .map(|phase| self.phase_compressibility(env, phase, p, p0))
                .collect()
        } else {
            vec![self.compressible_terms(env, &fields.phases.phases()[0], p, p0)]
        };

        let mut p_eqn = incomp.clone();
        for comp in comps.iter().flatten() {
            p_eqn += comp.clone();
        }

        let incompressible = fields.phases.incompressible();
        if env.config.transonic && !self.multiphase && !incompressible {
            p_eqn += self.transonic_term(env, &fields.phases.phases()[0], cache, p)?;
            p_eqn.relax(mesh, p.internal(), env.config.relaxation.p_eqn);
        }

        env.reference
            .apply(&mut p_eqn, p, incompressible, env.services.exchange.as_ref())?;
        cache.set_pressure_parts(incomp, comps);
        Ok(p_eqn)
    }

    /// `div(phiHbyA) − laplacian(D, p)`
    pub fn incompressible_part(&self, env: &CouplingEnv<'_>, p: &VolScalarField, phi_hbya: &[f64], d: &[f64]) -> FvScalarMatrix {
        let mut m = -env.schemes().laplacian(env.mesh, d, p);
        m.add_explicit_integrated(&fvc::surface_sum(env.mesh, phi_hbya));
        m
    }

    /// 单相可压缩项 `(ρ − ρ₀)/Δt + ψ·(p − p0)/Δt`（瞬态）
    fn compressible_terms(&self, env: &CouplingEnv<'_>, phase: &Phase, p: &VolScalarField, p0: &[f64]) -> Option<FvScalarMatrix> {
        if phase.incompressible() || !env.transient() {
            return None;
        }
        let mesh = env.mesh;
        let thermo = phase.thermo();
        let rdt = 1.0 / env.dt;
        let psi = thermo.psi();

        let mut m = FvMatrix::new(p.name(), mesh);
        let explicit: Vec<f64> = thermo
            .rho()
            .internal()
            .iter()
            .zip(thermo.rho_old())
            .zip(psi)
            .zip(p0)
            .map(|(((r, r0), s), p0)| (r - r0) * rdt - s * p0 * rdt)
            .collect();
        m.add_explicit(mesh, &explicit);
        let implicit: Vec<f64> = psi.iter().map(|s| s * rdt).collect();
        m.add_sp(mesh, &implicit);
        Some(m)
    }

    /// 跨音速项：迎风 `div(ψf·phivHbyA, p)` 的增量形式
    ///
    /// 在当前压力处残差与面通量都为零，只保留压力变化引起的质量通量变化。
    fn transonic_term(
        &self,
        env: &CouplingEnv<'_>,
        phase: &Phase,
        cache: &CouplingCache,
        p: &VolScalarField,
    ) -> CouplingResult<FvScalarMatrix> {
        let mesh = env.mesh;
        let schemes = env.schemes();
        let pred = cache.predictor(0)?;
        let psi_f = schemes.interpolate_cells(mesh, phase.thermo().psi());
        let phid: Vec<f64> = psi_f.iter().zip(&pred.phiv_hbya).map(|(s, f)| s * f).collect();

        let conv = schemes.convection_scalar(mesh, &phid, p);
        let mut m = conv.correction(mesh, p.internal());
        m.add_face_flux_correction(conv.flux(mesh, p).into_iter().map(|v| -v).collect());
        Ok(m)
    }

    /// 多相：相 k 的可压缩与质量传递部分 `pEqnComp_k`
    pub fn phase_compressibility(&self, env: &CouplingEnv<'_>, phase: &Phase, p: &VolScalarField, p0: &[f64]) -> Option<FvScalarMatrix> {
        let compressible = !phase.incompressible();
        if !compressible && phase.mass_transfer().is_none() {
            return None;
        }
        let mesh = env.mesh;
        let schemes = env.schemes();
        let n = mesh.n_cells();
        let rdt = 1.0 / env.dt;
        let thermo = phase.thermo();
        let rho = thermo.rho().internal();

        let mut m = FvMatrix::new(p.name(), mesh);
        let mut explicit = vec![0.0; n];

        if compressible {
            let alpha = phase.alpha().internal();
            let alpha_old = phase.alpha().old_internal();
            let rho_old = thermo.rho_old();
            let alpha_f = schemes.interpolate(mesh, phase.alpha());
            let rho_f = schemes.interpolate(mesh, thermo.rho());
            let alpha_phi: Vec<f64> = alpha_f.iter().zip(phase.phi().values()).map(|(a, f)| a * f).collect();
            let alpha_rho_phi: Vec<f64> = alpha_phi.iter().zip(&rho_f).map(|(af, r)| af * r).collect();
            let div_ap = schemes.divergence(mesh, &alpha_phi);
            let div_arp = schemes.divergence(mesh, &alpha_rho_phi);

            let mut implicit = vec![0.0; n];
            for c in 0..n {
                let ddt_ar = (alpha[c] * rho[c] - alpha_old[c] * rho_old[c]) * rdt;
                let ddt_a = (alpha[c] - alpha_old[c]) * rdt;
                let cont_err = ddt_ar + div_arp[c] - rho[c] * (ddt_a + div_ap[c]);
                let coeff = safe_div(alpha[c].max(0.0) * thermo.psi()[c], rho[c], 0.0);
                explicit[c] += safe_div(cont_err, rho[c], 0.0) - coeff * p0[c] * rdt;
                implicit[c] = coeff * rdt;
            }
            m.add_sp(mesh, &implicit);
        }

        if let Some(dmdt) = phase.mass_transfer() {
            for ((e, md), r) in explicit.iter_mut().zip(dmdt).zip(rho) {
                *e -= safe_div(*md, *r, 0.0);
            }
        }
        m.add_explicit(mesh, &explicit);
        Some(m)
    }
}
