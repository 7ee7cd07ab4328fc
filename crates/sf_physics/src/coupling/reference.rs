// crates/sf_physics/src/coupling/reference.rs

//! 参考压力、封闭域通量调整与压力限幅

use sf_config::{CouplingConfig, PhysicalLimits};
use sf_foundation::float::{SMALL, VSMALL};

use crate::error::{CouplingError, CouplingResult};
use crate::fields::{VolScalarField, VolVectorField};
use crate::mesh::FvMesh;
use crate::numerics::FvScalarMatrix;
use crate::services::Exchange;

/// 边界通量不平衡的判定阈值
const IMBALANCE_TOL: f64 = 1e-8;

/// 已解析的参考压力设置
#[derive(Debug, Clone, PartialEq)]
pub struct PressureReferenceSpec {
    needs_reference: bool,
    closed: bool,
    cell: Option<usize>,
    value: f64,
}

impl PressureReferenceSpec {
    /// 解析并验证参考压力
    ///
    /// 压力没有任何固定值补丁时为封闭域；封闭域在稳态或不可压缩时
    /// 必须给出参考单元。
    pub fn resolve(
        mesh: &dyn FvMesh,
        p: &VolScalarField,
        config: &CouplingConfig,
        incompressible: bool,
    ) -> CouplingResult<Self> {
        let closed = p.needs_reference();
        let needs_reference = closed && (!config.is_transient() || incompressible);
        let cell = config.reference.ref_cell;

        if let Some(c) = cell {
            if c >= mesh.n_cells() {
                return Err(CouplingError::reference(
                    p.name(),
                    format!("参考单元 {} 超出范围 (单元数 {})", c, mesh.n_cells()),
                ));
            }
        } else if needs_reference {
            return Err(CouplingError::reference(p.name(), "封闭域需要参考单元 reference.ref_cell"));
        }

        Ok(Self {
            needs_reference,
            closed,
            cell,
            value: config.reference.ref_value,
        })
    }

    /// 压力方程是否需要固定参考值
    #[inline]
    pub fn needs_reference(&self) -> bool {
        self.needs_reference
    }

    /// 压力是否没有固定值边界
    #[inline]
    pub fn closed(&self) -> bool {
        self.closed
    }

    /// 本分区的参考单元
    #[inline]
    pub fn cell(&self) -> Option<usize> {
        self.cell
    }

    /// 参考值
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// 参考单元的当前压力（跨分区归约）
    pub fn cell_value(&self, p: &VolScalarField, exchange: &dyn Exchange) -> f64 {
        exchange.sum(self.cell.map_or(0.0, |c| p.internal()[c]))
    }

    /// 把参考值加入压力方程
    ///
    /// 不可压缩取给定参考值，可压缩稳态取参考单元的当前压力。
    pub fn apply(
        &self,
        eqn: &mut FvScalarMatrix,
        p: &VolScalarField,
        incompressible: bool,
        exchange: &dyn Exchange,
    ) -> CouplingResult<()> {
        if !self.needs_reference {
            return Ok(());
        }
        let value = if incompressible {
            self.value
        } else {
            self.cell_value(p, exchange)
        };
        if let Some(c) = self.cell {
            eqn.set_reference(c, value)?;
        }
        Ok(())
    }
}

/// 封闭域边界通量调整
///
/// 速度固定值补丁上的出流为固定出流，其余补丁上的出流可调。把可调出流
/// 按同一比例缩放，使总入流等于总出流。返回每个面的缩放因子（未调整的面为 1）。
/// 没有可调出流且不平衡不可忽略时返回错误。
pub fn adjust_phi(
    mesh: &dyn FvMesh,
    phi: &mut [f64],
    u: &VolVectorField,
    exchange: &dyn Exchange,
) -> CouplingResult<Vec<f64>> {
    let mut mass_in = 0.0;
    let mut fixed_out = 0.0;
    let mut adjustable_out = 0.0;
    for (patch, bc) in mesh.patches().iter().zip(u.bcs()) {
        for f in patch.faces() {
            let v = phi[f];
            if v < 0.0 {
                mass_in -= v;
            } else if bc.fixes_value() {
                fixed_out += v;
            } else {
                adjustable_out += v;
            }
        }
    }
    let mass_in = exchange.sum(mass_in);
    let fixed_out = exchange.sum(fixed_out);
    let adjustable_out = exchange.sum(adjustable_out);

    let total = VSMALL + mass_in + fixed_out + adjustable_out;
    let mut scale = vec![1.0; mesh.n_faces()];

    if adjustable_out > VSMALL && adjustable_out / total > SMALL {
        let corr = (mass_in - fixed_out) / adjustable_out;
        for (patch, bc) in mesh.patches().iter().zip(u.bcs()) {
            if bc.fixes_value() {
                continue;
            }
            for f in patch.faces() {
                if phi[f] > 0.0 {
                    phi[f] *= corr;
                    scale[f] = corr;
                }
            }
        }
        log::debug!("封闭域出流调整系数 {:.6}", corr);
    } else if (fixed_out - mass_in).abs() / total > IMBALANCE_TOL {
        return Err(CouplingError::ContinuityImbalance {
            mass_in,
            fixed_out,
            adjustable_out,
        });
    }
    Ok(scale)
}

/// 按 `p_min`/`p_max` 限幅压力，返回被限制的单元数
pub fn limit_pressure(mesh: &dyn FvMesh, p: &mut VolScalarField, limits: &PhysicalLimits) -> usize {
    if limits.p_min.is_none() && limits.p_max.is_none() {
        return 0;
    }
    let lower = limits.p_min.unwrap_or(f64::NEG_INFINITY);
    let upper = limits.p_max.unwrap_or(f64::INFINITY);
    let count = p.clamp(lower, upper);
    if count > 0 {
        p.correct_boundary_conditions(mesh);
        log::debug!("压力限幅: {} 个单元被限制在 [{:e}, {:e}]", count, lower, upper);
    }
    count
}
