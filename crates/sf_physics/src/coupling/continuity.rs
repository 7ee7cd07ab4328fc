// crates/sf_physics/src/coupling/continuity.rs

//! 连续性误差统计

use serde::Serialize;

use crate::mesh::FvMesh;
use crate::services::Exchange;

/// 一次压力修正后的连续性误差
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ContinuityErrors {
    /// `Δt·Σ|e|V/(ρ̄·ΣV)`
    pub sum_local: f64,
    /// `Δt·Σ e V/(ρ̄·ΣV)`
    pub global: f64,
    /// 累计全局误差
    pub cumulative: f64,
}

/// 累计连续性误差
#[derive(Debug, Clone, Default)]
pub struct ContinuityMonitor {
    cumulative: f64,
}

impl ContinuityMonitor {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 由单位体积的质量不平衡 `e` 计算误差并累加
    pub fn evaluate(
        &mut self,
        mesh: &dyn FvMesh,
        error: &[f64],
        reference_density: f64,
        dt: f64,
        exchange: &dyn Exchange,
    ) -> ContinuityErrors {
        let volumes = mesh.cell_volumes();
        let total_volume = exchange.sum(volumes.iter().sum());
        let abs_sum = exchange.sum(error.iter().zip(volumes).map(|(e, v)| e.abs() * v).sum());
        let sum = exchange.sum(error.iter().zip(volumes).map(|(e, v)| e * v).sum());

        let scale = dt / (reference_density.abs().max(f64::MIN_POSITIVE) * total_volume.max(f64::MIN_POSITIVE));
        let global = sum * scale;
        self.cumulative += global;
        ContinuityErrors {
            sum_local: abs_sum * scale,
            global,
            cumulative: self.cumulative,
        }
    }

    /// 累计全局误差
    pub fn cumulative(&self) -> f64 {
        self.cumulative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CartesianMeshBuilder;
    use crate::services::SerialExchange;
    use approx::assert_relative_eq;

    #[test]
    fn test_continuity_errors_accumulate() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let mut monitor = ContinuityMonitor::new();

        let errors = monitor.evaluate(&mesh, &[1.0, -3.0], 2.0, 0.5, &SerialExchange);
        assert_relative_eq!(errors.sum_local, 0.5 * (0.5 + 1.5) / 2.0);
        assert_relative_eq!(errors.global, 0.5 * (0.5 - 1.5) / 2.0);

        let errors = monitor.evaluate(&mesh, &[1.0, -3.0], 2.0, 0.5, &SerialExchange);
        assert_relative_eq!(errors.cumulative, 2.0 * 0.5 * (0.5 - 1.5) / 2.0);
        assert_relative_eq!(monitor.cumulative(), errors.cumulative);
    }
}
