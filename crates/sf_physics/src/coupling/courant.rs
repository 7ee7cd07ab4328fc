// crates/sf_physics/src/coupling/courant.rs

//! Courant 数与时间步建议
//!
//! `Co = 0.5·Σ_f|φ|/V·Δt`，按单元取最大值与体积加权平均。

use serde::Serialize;
use sf_foundation::float::SMALL;

use crate::mesh::FvMesh;
use crate::services::Exchange;

/// 时间步最大增长比例
const MAX_DELTA_T_FACTOR: f64 = 1.2;

/// Courant 数
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CourantNumber {
    /// 体积加权平均
    pub mean: f64,
    /// 最大值
    pub max: f64,
}

impl CourantNumber {
    /// 取两者的较大值
    pub fn max_with(self, other: Self) -> Self {
        Self {
            mean: self.mean.max(other.mean),
            max: self.max.max(other.max),
        }
    }
}

/// 由体积通量计算 Courant 数
pub fn courant_number(mesh: &dyn FvMesh, phi: &[f64], dt: f64, exchange: &dyn Exchange) -> CourantNumber {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let n_internal = mesh.n_internal_faces();

    let mut sum_phi = vec![0.0; mesh.n_cells()];
    for f in 0..mesh.n_faces() {
        let v = phi[f].abs();
        sum_phi[owner[f]] += v;
        if f < n_internal {
            sum_phi[neighbour[f]] += v;
        }
    }

    let volumes = mesh.cell_volumes();
    let local_max = sum_phi
        .iter()
        .zip(volumes)
        .map(|(s, v)| s / v)
        .fold(0.0, f64::max);
    let total_phi: f64 = exchange.sum(sum_phi.iter().sum());
    let total_volume: f64 = exchange.sum(volumes.iter().sum());

    CourantNumber {
        mean: 0.5 * total_phi / total_volume.max(f64::MIN_POSITIVE) * dt,
        max: 0.5 * exchange.max(local_max) * dt,
    }
}

/// 按目标最大 Courant 数建议下一个时间步：增长受 10% 阻尼与 1.2 倍上限约束
pub fn suggest_time_step(co_max: f64, max_courant: f64, dt: f64) -> f64 {
    let factor = max_courant / (co_max + SMALL);
    dt * factor.min(1.0 + 0.1 * factor).min(MAX_DELTA_T_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CartesianMeshBuilder;
    use crate::services::SerialExchange;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_flow_courant() {
        // 4 个单元，Δx = 0.25，单位速度：Co = u·Δt/Δx
        let mesh = CartesianMeshBuilder::new(4, 1, 1).build().unwrap();
        let phi: Vec<f64> = (0..mesh.n_faces())
            .map(|f| mesh.sf()[f].x)
            .collect();
        let co = courant_number(&mesh, &phi, 0.1, &SerialExchange);
        assert_relative_eq!(co.max, 0.4, epsilon = 1e-12);
        assert_relative_eq!(co.mean, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_time_step_growth_is_limited() {
        assert_relative_eq!(suggest_time_step(0.01, 1.0, 1.0), 1.2);
        assert_relative_eq!(suggest_time_step(2.0, 1.0, 1.0), 0.5, epsilon = 1e-12);
        assert!(suggest_time_step(0.95, 1.0, 1.0) < 1.2);
    }
}
