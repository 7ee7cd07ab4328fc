// crates/sf_physics/src/numerics/schemes.rs

//! 离散格式服务
//!
//! 耦合引擎只通过 [`Discretization`] 调用离散算子。默认实现 [`GaussLinear`]：
//! 线性插值、迎风对流、带非正交修正的拉普拉斯、Euler 时间格式。

use glam::{DMat3, DVec3};

use super::matrix::{FvMatrix, FvScalarMatrix};
use super::{fvc, fvm};
use crate::fields::{VolScalarField, VolVectorField};
use crate::mesh::FvMesh;

/// 离散算子集合
pub trait Discretization: Send + Sync {
    /// 格式名称
    fn name(&self) -> &'static str;

    /// 瞬态项 `∂(ρU)/∂t`，`rho_old` 为旧时间层密度
    fn transient(&self, mesh: &dyn FvMesh, rho: &[f64], rho_old: &[f64], u: &VolVectorField, dt: f64) -> FvMatrix<DVec3>;

    /// 对流项 `∇·(φU)`
    fn convection(&self, mesh: &dyn FvMesh, phi: &[f64], u: &VolVectorField) -> FvMatrix<DVec3>;

    /// 标量对流项 `∇·(φp)`
    fn convection_scalar(&self, mesh: &dyn FvMesh, phi: &[f64], p: &VolScalarField) -> FvScalarMatrix;

    /// 标量拉普拉斯 `∇·(γ∇p)`
    fn laplacian(&self, mesh: &dyn FvMesh, gamma_f: &[f64], p: &VolScalarField) -> FvScalarMatrix;

    /// 矢量拉普拉斯 `∇·(γ∇U)`
    fn laplacian_vector(&self, mesh: &dyn FvMesh, gamma_f: &[f64], u: &VolVectorField) -> FvMatrix<DVec3>;

    /// 体心场插值到面
    fn interpolate(&self, mesh: &dyn FvMesh, field: &VolScalarField) -> Vec<f64>;

    /// 派生体心量插值到面
    fn interpolate_cells(&self, mesh: &dyn FvMesh, values: &[f64]) -> Vec<f64>;

    /// 体积通量 `U_f·Sf`
    fn flux(&self, mesh: &dyn FvMesh, internal: &[DVec3], boundary: &[DVec3]) -> Vec<f64>;

    /// 面法向梯度
    fn sn_grad(&self, mesh: &dyn FvMesh, p: &VolScalarField) -> Vec<f64>;

    /// 体心梯度
    fn grad(&self, mesh: &dyn FvMesh, p: &VolScalarField) -> Vec<DVec3>;

    /// 速度梯度张量
    fn grad_vector(&self, mesh: &dyn FvMesh, u: &VolVectorField) -> Vec<DMat3>;

    /// 由面通量重构体心矢量
    fn reconstruct(&self, mesh: &dyn FvMesh, face_values: &[f64]) -> Vec<DVec3>;

    /// 面通量散度（单位体积）
    fn divergence(&self, mesh: &dyn FvMesh, phi: &[f64]) -> Vec<f64>;
}

/// Gauss 线性格式
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussLinear;

impl Discretization for GaussLinear {
    fn name(&self) -> &'static str {
        "Gauss linear"
    }

    fn transient(&self, mesh: &dyn FvMesh, rho: &[f64], rho_old: &[f64], u: &VolVectorField, dt: f64) -> FvMatrix<DVec3> {
        fvm::ddt(mesh, rho, rho_old, u, dt)
    }

    fn convection(&self, mesh: &dyn FvMesh, phi: &[f64], u: &VolVectorField) -> FvMatrix<DVec3> {
        fvm::div(mesh, phi, u)
    }

    fn convection_scalar(&self, mesh: &dyn FvMesh, phi: &[f64], p: &VolScalarField) -> FvScalarMatrix {
        fvm::div(mesh, phi, p)
    }

    fn laplacian(&self, mesh: &dyn FvMesh, gamma_f: &[f64], p: &VolScalarField) -> FvScalarMatrix {
        fvm::laplacian(mesh, gamma_f, p)
    }

    fn laplacian_vector(&self, mesh: &dyn FvMesh, gamma_f: &[f64], u: &VolVectorField) -> FvMatrix<DVec3> {
        fvm::laplacian(mesh, gamma_f, u)
    }

    fn interpolate(&self, mesh: &dyn FvMesh, field: &VolScalarField) -> Vec<f64> {
        fvc::interpolate(mesh, field)
    }

    fn interpolate_cells(&self, mesh: &dyn FvMesh, values: &[f64]) -> Vec<f64> {
        fvc::interpolate_cells(mesh, values)
    }

    fn flux(&self, mesh: &dyn FvMesh, internal: &[DVec3], boundary: &[DVec3]) -> Vec<f64> {
        fvc::flux_with(mesh, internal, boundary)
    }

    fn sn_grad(&self, mesh: &dyn FvMesh, p: &VolScalarField) -> Vec<f64> {
        fvc::sn_grad(mesh, p)
    }

    fn grad(&self, mesh: &dyn FvMesh, p: &VolScalarField) -> Vec<DVec3> {
        fvc::grad(mesh, p)
    }

    fn grad_vector(&self, mesh: &dyn FvMesh, u: &VolVectorField) -> Vec<DMat3> {
        fvc::grad_vector(mesh, u)
    }

    fn reconstruct(&self, mesh: &dyn FvMesh, face_values: &[f64]) -> Vec<DVec3> {
        fvc::reconstruct(mesh, face_values)
    }

    fn divergence(&self, mesh: &dyn FvMesh, phi: &[f64]) -> Vec<f64> {
        fvc::div(mesh, phi)
    }
}
