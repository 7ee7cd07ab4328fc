// crates/sf_physics/src/coupling/compressibility.rs

//! 可压缩性修正
//!
//! 在最后一次压力修正的最后一次非正交修正之后执行：
//!
//! - 不可压缩封闭域：`p += p_ref − p[ref_cell]`
//! - 可压缩：`ρ += ψ(p − p0)`；稳态限幅到 `[rho_min, rho_max]`；按 `rho` 因子松弛
//! - 可压缩封闭域：松弛之后 `p += (M0 − ∫Σαρ)/∫Σαψ`，`ρ` 同步增加 `ψ·Δp`，
//!   总质量与 `rho` 松弛因子无关

use sf_foundation::float::VSMALL;

use super::cache::CouplingCache;
use super::phase::FlowFields;
use super::strategy::CouplingEnv;
use crate::error::CouplingResult;
use crate::numerics::fvc;

/// 可压缩性修正器
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressibilityCorrector;

impl CompressibilityCorrector {
    /// 执行修正；只在缓存缺少 `p0` 时返回错误
    pub fn correct(&self, env: &CouplingEnv<'_>, fields: &mut FlowFields, cache: &CouplingCache) -> CouplingResult<()> {
        let mesh = env.mesh;
        let exchange = env.services.exchange.as_ref();
        let closed = env.reference.closed();

        if fields.phases.incompressible() {
            if closed && env.reference.cell().is_some() {
                let shift = env.reference.value() - env.reference.cell_value(&fields.p, exchange);
                fields.p.shift(shift);
                fields.p.correct_boundary_conditions(mesh);
            }
            return Ok(());
        }

        let p0 = cache.p0()?;
        let dp: Vec<f64> = fields.p.internal().iter().zip(p0).map(|(p, p0)| p - p0).collect();
        let limits = &env.config.limits;
        for phase in fields.phases.phases_mut() {
            if phase.incompressible() {
                continue;
            }
            let thermo = phase.thermo_mut();
            let delta: Vec<f64> = thermo.psi().iter().zip(&dp).map(|(s, d)| s * d).collect();
            thermo.rho_mut().store_prev_iter();
            thermo.correct_rho(&delta, mesh);

            let rho = thermo.rho_mut();
            if !env.transient() {
                let clipped = rho.clamp(limits.rho_min, limits.rho_max);
                if clipped > 0 {
                    log::debug!("密度限幅: {} 个单元", clipped);
                }
            }
            rho.relax(env.config.relaxation.rho);
            rho.correct_boundary_conditions(mesh);
        }

        if closed {
            // 按松弛后的密度恢复初始质量
            let mut mass = 0.0;
            let mut compressibility = 0.0;
            for phase in fields.phases.phases() {
                mass += fvc::domain_integrate(mesh, &phase.alpha_rho());
                if !phase.incompressible() {
                    let alpha_psi: Vec<f64> = phase
                        .alpha()
                        .internal()
                        .iter()
                        .zip(phase.thermo().psi())
                        .map(|(a, s)| a * s)
                        .collect();
                    compressibility += fvc::domain_integrate(mesh, &alpha_psi);
                }
            }
            let mass = exchange.sum(mass);
            let compressibility = exchange.sum(compressibility);
            if compressibility > VSMALL {
                let shift = (env.initial_mass - mass) / compressibility;
                fields.p.shift(shift);
                fields.p.correct_boundary_conditions(mesh);
                for phase in fields.phases.phases_mut() {
                    if phase.incompressible() {
                        continue;
                    }
                    let thermo = phase.thermo_mut();
                    let delta: Vec<f64> = thermo.psi().iter().map(|s| s * shift).collect();
                    thermo.correct_rho(&delta, mesh);
                }
                log::debug!("封闭域质量修正: 压力平移 {:.6e}", shift);
            }
        }
        Ok(())
    }
}
