// crates/sf_physics/src/services/sources.rs

//! 动量源、面力与相间动量传递服务
//!
//! - [`MomentumSource`]: 加到动量方程右端的体积力（[`UniformAcceleration`]、[`NoSources`]）
//! - [`FaceForceModel`]: 以面法向分量形式进入通量预测的力（[`Gravity`]）
//! - [`MomentumTransfer`]: 多相曳力系数与显式相间力（[`ConstantDrag`]）

use glam::DVec3;

use crate::fields::VolVectorField;
use crate::mesh::FvMesh;
use crate::numerics::FvMatrix;

/// 动量源
pub trait MomentumSource: Send + Sync {
    /// 名称
    fn name(&self) -> &'static str;

    /// 把源项加到动量方程，`rho` 为单元密度（多相为 αρ）
    fn add_to(&self, mesh: &dyn FvMesh, rho: &[f64], u: &VolVectorField, eqn: &mut FvMatrix<DVec3>);
}

/// 无源项
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSources;

impl MomentumSource for NoSources {
    fn name(&self) -> &'static str {
        "none"
    }

    fn add_to(&self, _mesh: &dyn FvMesh, _rho: &[f64], _u: &VolVectorField, _eqn: &mut FvMatrix<DVec3>) {}
}

/// 均匀加速度体积力 `ρ·a`
#[derive(Debug, Clone, Copy)]
pub struct UniformAcceleration {
    acceleration: DVec3,
}

impl UniformAcceleration {
    /// 创建
    pub fn new(acceleration: DVec3) -> Self {
        Self { acceleration }
    }
}

impl MomentumSource for UniformAcceleration {
    fn name(&self) -> &'static str {
        "uniformAcceleration"
    }

    fn add_to(&self, mesh: &dyn FvMesh, rho: &[f64], _u: &VolVectorField, eqn: &mut FvMatrix<DVec3>) {
        let force: Vec<DVec3> = rho.iter().map(|r| -self.acceleration * *r).collect();
        eqn.add_explicit(mesh, &force);
    }
}

/// 面力模型：返回每个面上的力密度法向分量 `F`，通量贡献为 `F·|Sf|`
pub trait FaceForceModel: Send + Sync {
    /// 名称
    fn name(&self) -> &'static str;

    /// 面力，`rho_f` 为面密度（长度为总面数）
    fn face_force(&self, mesh: &dyn FvMesh, rho_f: &[f64]) -> Vec<f64>;
}

/// 重力 `F = ρ_f·g·n`
#[derive(Debug, Clone, Copy)]
pub struct Gravity {
    g: DVec3,
}

impl Gravity {
    /// 创建
    pub fn new(g: DVec3) -> Self {
        Self { g }
    }

    /// 重力加速度
    pub fn g(&self) -> DVec3 {
        self.g
    }
}

impl FaceForceModel for Gravity {
    fn name(&self) -> &'static str {
        "gravity"
    }

    fn face_force(&self, mesh: &dyn FvMesh, rho_f: &[f64]) -> Vec<f64> {
        mesh.sf()
            .iter()
            .zip(mesh.mag_sf())
            .zip(rho_f)
            .map(|((sf, &mag), &rho)| {
                if mag > 0.0 {
                    rho * self.g.dot(*sf) / mag
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// 相间动量传递
pub trait MomentumTransfer: Send + Sync {
    /// 名称
    fn name(&self) -> &'static str;

    /// 相对 (i, j) 的隐式曳力系数 `Kd`（单位体积），无耦合时返回 `None`
    fn kd(&self, i: usize, j: usize, alphas: &[&[f64]]) -> Option<Vec<f64>>;

    /// 相 i 的显式相间力（单位体积），默认无
    fn explicit_force(&self, _i: usize, _n_cells: usize) -> Option<Vec<DVec3>> {
        None
    }
}

/// 常系数曳力 `Kd = K·α_i·α_j`，作用于所有相对
#[derive(Debug, Clone, Copy)]
pub struct ConstantDrag {
    k: f64,
}

impl ConstantDrag {
    /// 创建
    pub fn new(k: f64) -> Self {
        Self { k: k.max(0.0) }
    }
}

impl MomentumTransfer for ConstantDrag {
    fn name(&self) -> &'static str {
        "constantDrag"
    }

    fn kd(&self, i: usize, j: usize, alphas: &[&[f64]]) -> Option<Vec<f64>> {
        if i == j || self.k == 0.0 {
            return None;
        }
        Some(
            alphas[i]
                .iter()
                .zip(alphas[j])
                .map(|(a, b)| self.k * a.max(0.0) * b.max(0.0))
                .collect(),
        )
    }
}

/// 无相间传递
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransfer;

impl MomentumTransfer for NoTransfer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn kd(&self, _i: usize, _j: usize, _alphas: &[&[f64]]) -> Option<Vec<f64>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::BoundaryCondition;
    use crate::mesh::{CartesianMeshBuilder, FvMesh};

    #[test]
    fn test_uniform_acceleration_source() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let u = VolVectorField::uniform(
            "U",
            &mesh,
            DVec3::ZERO,
            vec![BoundaryCondition::ZeroGradient, BoundaryCondition::ZeroGradient],
        )
        .unwrap();
        let mut eqn = FvMatrix::new("U", &mesh);
        UniformAcceleration::new(DVec3::new(0.0, -9.81, 0.0)).add_to(&mesh, &[2.0, 2.0], &u, &mut eqn);
        // 源项为 ρ·a·V
        let expected = -2.0 * 9.81 * mesh.cell_volumes()[0];
        assert!((eqn.source()[0].y - expected).abs() < 1e-12);
        assert!(eqn.source()[0].x.abs() < 1e-15);
    }

    #[test]
    fn test_gravity_face_force() {
        let mesh = CartesianMeshBuilder::new(1, 2, 1).build().unwrap();
        let force = Gravity::new(DVec3::new(0.0, -10.0, 0.0)).face_force(&mesh, &[1.0; 3]);
        // 内部面法向 +y，底面法向 −y
        assert!((force[0] + 10.0).abs() < 1e-12);
        assert!((force[1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_drag() {
        let a: &[f64] = &[0.5, 1.0];
        let b: &[f64] = &[0.5, 0.0];
        let drag = ConstantDrag::new(4.0);
        assert_eq!(drag.kd(0, 1, &[a, b]), Some(vec![1.0, 0.0]));
        assert_eq!(drag.kd(0, 0, &[a, b]), None);
    }
}
