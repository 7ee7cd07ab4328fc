// crates/sf_physics/src/numerics/fvc.rs

//! 显式有限体积算子
//!
//! 所有面量长度为总面数（内部面在前）。没有边界条件的派生体心量
//! （如 `1/A`）在边界面取 owner 单元值。

use glam::{DMat3, DVec3};
use sf_foundation::float::{SMALL, VSMALL};

use crate::fields::{FieldValue, VolField, VolScalarField, VolVectorField};
use crate::mesh::FvMesh;

/// 派生体心量的边界值（owner 单元值）
pub fn patch_internal<T: FieldValue>(mesh: &dyn FvMesh, values: &[T]) -> Vec<T> {
    let owner = mesh.owner();
    (mesh.n_internal_faces()..mesh.n_faces())
        .map(|f| values[owner[f]])
        .collect()
}

/// 线性插值到面，边界面取给定边界值
pub fn interpolate_with<T: FieldValue>(mesh: &dyn FvMesh, internal: &[T], boundary: &[T]) -> Vec<T> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let w = mesh.weights();
    let n_internal = mesh.n_internal_faces();

    let mut faces = Vec::with_capacity(mesh.n_faces());
    for f in 0..n_internal {
        faces.push(internal[owner[f]] * w[f] + internal[neighbour[f]] * (1.0 - w[f]));
    }
    faces.extend_from_slice(boundary);
    faces
}

/// 线性插值体心场
pub fn interpolate<T: FieldValue>(mesh: &dyn FvMesh, field: &VolField<T>) -> Vec<T> {
    interpolate_with(mesh, field.internal(), field.boundary())
}

/// 线性插值派生体心量
pub fn interpolate_cells<T: FieldValue>(mesh: &dyn FvMesh, values: &[T]) -> Vec<T> {
    interpolate_with(mesh, values, &patch_internal(mesh, values))
}

/// 体积通量 `U_f·Sf`
pub fn flux_with(mesh: &dyn FvMesh, internal: &[DVec3], boundary: &[DVec3]) -> Vec<f64> {
    interpolate_with(mesh, internal, boundary)
        .iter()
        .zip(mesh.sf())
        .map(|(u, sf)| u.dot(*sf))
        .collect()
}

/// 速度场的体积通量
pub fn flux(mesh: &dyn FvMesh, u: &VolVectorField) -> Vec<f64> {
    flux_with(mesh, u.internal(), u.boundary())
}

/// Gauss 线性梯度
pub fn grad_with(mesh: &dyn FvMesh, internal: &[f64], boundary: &[f64]) -> Vec<DVec3> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let sf = mesh.sf();
    let n_internal = mesh.n_internal_faces();
    let faces = interpolate_with(mesh, internal, boundary);

    let mut g = vec![DVec3::ZERO; mesh.n_cells()];
    for f in 0..n_internal {
        let v = sf[f] * faces[f];
        g[owner[f]] += v;
        g[neighbour[f]] -= v;
    }
    for f in n_internal..mesh.n_faces() {
        g[owner[f]] += sf[f] * faces[f];
    }
    for (gi, &vol) in g.iter_mut().zip(mesh.cell_volumes()) {
        *gi /= vol;
    }
    g
}

/// 标量场梯度
pub fn grad(mesh: &dyn FvMesh, field: &VolScalarField) -> Vec<DVec3> {
    grad_with(mesh, field.internal(), field.boundary())
}

/// 速度梯度张量 `(∇U)_ij = ∂U_j/∂x_i`
pub fn grad_vector(mesh: &dyn FvMesh, u: &VolVectorField) -> Vec<DMat3> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let sf = mesh.sf();
    let n_internal = mesh.n_internal_faces();
    let faces = interpolate(mesh, u);

    let outer = |s: DVec3, v: DVec3| DMat3::from_cols(s * v.x, s * v.y, s * v.z);
    let mut g = vec![DMat3::ZERO; mesh.n_cells()];
    for f in 0..n_internal {
        let t = outer(sf[f], faces[f]);
        g[owner[f]] += t;
        g[neighbour[f]] -= t;
    }
    for f in n_internal..mesh.n_faces() {
        g[owner[f]] += outer(sf[f], faces[f]);
    }
    for (gi, &vol) in g.iter_mut().zip(mesh.cell_volumes()) {
        *gi *= 1.0 / vol;
    }
    g
}

/// 单个分量的梯度
pub fn component_grad<T: FieldValue>(mesh: &dyn FvMesh, field: &VolField<T>, cmpt: usize) -> Vec<DVec3> {
    let internal: Vec<f64> = field.internal().iter().map(|v| v.component(cmpt)).collect();
    let boundary: Vec<f64> = field.boundary().iter().map(|v| v.component(cmpt)).collect();
    grad_with(mesh, &internal, &boundary)
}

/// 面法向梯度（内部面含非正交修正）
pub fn sn_grad(mesh: &dyn FvMesh, field: &VolScalarField) -> Vec<f64> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let delta = mesh.delta_coeffs();
    let n_internal = mesh.n_internal_faces();
    let p = field.internal();

    let mut sn = vec![0.0; mesh.n_faces()];
    for f in 0..n_internal {
        sn[f] = delta[f] * (p[neighbour[f]] - p[owner[f]]);
    }
    for f in n_internal..mesh.n_faces() {
        sn[f] = delta[f] * (field.boundary()[f - n_internal] - p[owner[f]]);
    }

    if !mesh.is_orthogonal() {
        let g = interpolate_cells(mesh, &grad(mesh, field));
        let k = mesh.corr_vecs();
        for f in 0..n_internal {
            sn[f] += k[f].dot(g[f]);
        }
    }
    sn
}

/// 面积分 `Σ_f ±v_f`（owner 正、neighbour 负）
pub fn surface_sum<T: FieldValue>(mesh: &dyn FvMesh, face_values: &[T]) -> Vec<T> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let n_internal = mesh.n_internal_faces();

    let mut sum = vec![T::ZERO; mesh.n_cells()];
    for f in 0..n_internal {
        sum[owner[f]] += face_values[f];
        sum[neighbour[f]] -= face_values[f];
    }
    for f in n_internal..mesh.n_faces() {
        sum[owner[f]] += face_values[f];
    }
    sum
}

/// 面通量的散度（单位体积）
pub fn div(mesh: &dyn FvMesh, phi: &[f64]) -> Vec<f64> {
    surface_sum(mesh, phi)
        .into_iter()
        .zip(mesh.cell_volumes())
        .map(|(s, &v)| s / v)
        .collect()
}

/// 由面通量重构体心矢量：`(Σ Sf⊗Sf/|Sf|)⁻¹ · Σ (Sf/|Sf|)·F`
///
/// 网格没有面的方向（一维、二维网格）对角置一，该分量结果为零。
pub fn reconstruct(mesh: &dyn FvMesh, face_values: &[f64]) -> Vec<DVec3> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let sf = mesh.sf();
    let mag_sf = mesh.mag_sf();
    let n_internal = mesh.n_internal_faces();
    let n_cells = mesh.n_cells();

    let mut tensor = vec![DMat3::ZERO; n_cells];
    let mut rhs = vec![DVec3::ZERO; n_cells];

    let mut accumulate = |cell: usize, f: usize| {
        if mag_sf[f] <= VSMALL {
            return;
        }
        let n = sf[f] / mag_sf[f];
        tensor[cell] += DMat3::from_cols(sf[f] * n.x, sf[f] * n.y, sf[f] * n.z);
        rhs[cell] += n * face_values[f];
    };
    for f in 0..n_internal {
        accumulate(owner[f], f);
        accumulate(neighbour[f], f);
    }
    for f in n_internal..mesh.n_faces() {
        accumulate(owner[f], f);
    }

    tensor
        .into_iter()
        .zip(rhs)
        .map(|(t, r)| solve_reconstruction_tensor(t, r))
        .collect()
}

fn solve_reconstruction_tensor(mut t: DMat3, r: DVec3) -> DVec3 {
    let scale = (t.x_axis.x + t.y_axis.y + t.z_axis.z).abs().max(VSMALL);
    for i in 0..3 {
        if t.col(i)[i].abs() <= SMALL * scale {
            let col = t.col_mut(i);
            *col = DVec3::ZERO;
            col[i] = 1.0;
            for j in 0..3 {
                if j != i {
                    t.col_mut(j)[i] = 0.0;
                }
            }
        }
    }
    let det = t.determinant();
    if det.abs() <= VSMALL {
        return DVec3::ZERO;
    }
    t.inverse() * r
}

/// 体积分 `Σ v·V`（本分区）
pub fn domain_integrate(mesh: &dyn FvMesh, values: &[f64]) -> f64 {
    values
        .iter()
        .zip(mesh.cell_volumes())
        .map(|(v, vol)| v * vol)
        .sum()
}
