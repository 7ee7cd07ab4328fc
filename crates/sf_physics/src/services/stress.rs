// crates/sf_physics/src/services/stress.rs

//! 应力（湍流/粘性）封闭服务

use glam::DVec3;

use crate::fields::VolVectorField;
use crate::mesh::FvMesh;
use crate::numerics::{fvc, Discretization, FvMatrix};

/// 动量方程中的偏应力项
pub trait StressModel: Send + Sync {
    /// 模型名称
    fn name(&self) -> &'static str;

    /// `∇·(ρ ν_eff dev2(∇U + ∇Uᵀ))` 的离散方程（取负号，直接加到动量方程）
    fn div_dev_rho_reff(
        &self,
        mesh: &dyn FvMesh,
        schemes: &dyn Discretization,
        rho: &[f64],
        u: &VolVectorField,
    ) -> FvMatrix<DVec3>;
}

/// 层流（常运动粘度）
#[derive(Debug, Clone, Copy)]
pub struct LaminarStress {
    nu: f64,
}

impl LaminarStress {
    /// 以运动粘度创建
    pub fn new(nu: f64) -> Self {
        Self { nu: nu.max(0.0) }
    }

    /// 运动粘度
    pub fn nu(&self) -> f64 {
        self.nu
    }
}

impl StressModel for LaminarStress {
    fn name(&self) -> &'static str {
        "laminar"
    }

    fn div_dev_rho_reff(
        &self,
        mesh: &dyn FvMesh,
        schemes: &dyn Discretization,
        rho: &[f64],
        u: &VolVectorField,
    ) -> FvMatrix<DVec3> {
        let mu_f: Vec<f64> = schemes
            .interpolate_cells(mesh, rho)
            .into_iter()
            .map(|r| r * self.nu)
            .collect();

        let mut m = -schemes.laplacian_vector(mesh, &mu_f, u);
        if self.nu == 0.0 {
            return m;
        }

        // 显式转置部分 ∇·(μ dev2(∇Uᵀ))
        let grad_u = schemes.grad_vector(mesh, u);
        let n_internal = mesh.n_internal_faces();
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let w = mesh.weights();
        let sf = mesh.sf();

        let mut face_stress = vec![DVec3::ZERO; mesh.n_faces()];
        for f in 0..mesh.n_faces() {
            let g = if f < n_internal {
                grad_u[owner[f]] * w[f] + grad_u[neighbour[f]] * (1.0 - w[f])
            } else {
                grad_u[owner[f]]
            };
            let trace = g.x_axis.x + g.y_axis.y + g.z_axis.z;
            face_stress[f] = (g * sf[f] - sf[f] * (2.0 / 3.0 * trace)) * mu_f[f];
        }
        let div_t: Vec<DVec3> = fvc::surface_sum(mesh, &face_stress).into_iter().map(|v| -v).collect();
        m.add_explicit_integrated(&div_t);
        m
    }
}
