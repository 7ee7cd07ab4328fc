// crates/sf_physics/src/numerics/fvm.rs

//! 隐式有限体积算子
//!
//! 每个算子返回一个 [`FvMatrix`]，约定 `Mψ − b = Σ 流出通量`：
//!
//! - [`laplacian`]: `∇·(γ∇ψ)`，非正交部分显式处理并记入面通量修正
//! - [`div`]: `∇·(φψ)`，迎风格式
//! - [`ddt`]: `∂(cψ)/∂t`，Euler 隐式
//! - [`sp`]: 隐式线性源

use sf_foundation::float::pos0;

use super::fvc;
use super::matrix::FvMatrix;
use crate::fields::{FieldValue, VolField};
use crate::mesh::FvMesh;

/// 拉普拉斯算子 `∇·(γ_f ∇ψ)`，`gamma_f` 为面上扩散系数（长度为总面数）
pub fn laplacian<T: FieldValue>(mesh: &dyn FvMesh, gamma_f: &[f64], psi: &VolField<T>) -> FvMatrix<T> {
    let mut m = FvMatrix::new(psi.name(), mesh);
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let mag_sf = mesh.mag_sf();
    let delta = mesh.delta_coeffs();
    let n_internal = mesh.n_internal_faces();

    for f in 0..n_internal {
        let coeff = gamma_f[f] * mag_sf[f] * delta[f];
        m.upper_mut()[f] = coeff;
        m.lower_mut()[f] = coeff;
        m.diag_mut()[owner[f]] -= coeff;
        m.diag_mut()[neighbour[f]] -= coeff;
    }

    for (patch, bc) in mesh.patches().iter().zip(psi.bcs()) {
        for (i, f) in patch.faces().enumerate() {
            let b = f - n_internal;
            let gamma_mag_sf = gamma_f[f] * mag_sf[f];
            m.internal_coeffs_mut()[b] = gamma_mag_sf * bc.gradient_internal_coeff(delta[f]);
            m.boundary_coeffs_mut()[b] = -(bc.gradient_boundary_coeff(i, delta[f]) * gamma_mag_sf);
        }
    }

    if !mesh.is_orthogonal() {
        let corr = non_orthogonal_correction(mesh, gamma_f, psi);
        let sum = fvc::surface_sum(mesh, &corr);
        for (s, c) in m.source_mut().iter_mut().zip(sum) {
            *s -= c;
        }
        m.add_face_flux_correction(corr);
    }
    m
}

/// 非正交修正通量 `γ|Sf|·k·(∇ψ)_f`，边界面为零
fn non_orthogonal_correction<T: FieldValue>(mesh: &dyn FvMesh, gamma_f: &[f64], psi: &VolField<T>) -> Vec<T> {
    let mag_sf = mesh.mag_sf();
    let k = mesh.corr_vecs();
    let n_internal = mesh.n_internal_faces();

    let mut corr = vec![T::ZERO; mesh.n_faces()];
    for cmpt in 0..T::N_COMPONENTS {
        let g = fvc::interpolate_cells(mesh, &fvc::component_grad(mesh, psi, cmpt));
        for f in 0..n_internal {
            corr[f].set_component(cmpt, gamma_f[f] * mag_sf[f] * k[f].dot(g[f]));
        }
    }
    corr
}

/// 迎风对流算子 `∇·(φψ)`
pub fn div<T: FieldValue>(mesh: &dyn FvMesh, phi: &[f64], psi: &VolField<T>) -> FvMatrix<T> {
    let mut m = FvMatrix::new(psi.name(), mesh);
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let delta = mesh.delta_coeffs();
    let n_internal = mesh.n_internal_faces();

    for f in 0..n_internal {
        let w = pos0(phi[f]);
        let lower = -w * phi[f];
        let upper = lower + phi[f];
        m.lower_mut()[f] = lower;
        m.upper_mut()[f] = upper;
        m.diag_mut()[owner[f]] -= lower;
        m.diag_mut()[neighbour[f]] -= upper;
    }

    for (patch, bc) in mesh.patches().iter().zip(psi.bcs()) {
        for (i, f) in patch.faces().enumerate() {
            let b = f - n_internal;
            m.internal_coeffs_mut()[b] = phi[f] * bc.value_internal_coeff();
            m.boundary_coeffs_mut()[b] = -(bc.value_boundary_coeff(i, delta[f]) * phi[f]);
        }
    }
    m
}

/// Euler 隐式时间导数 `(c·ψ − c_old·ψ_old)/Δt`
pub fn ddt<T: FieldValue>(
    mesh: &dyn FvMesh,
    coeff: &[f64],
    coeff_old: &[f64],
    psi: &VolField<T>,
    dt: f64,
) -> FvMatrix<T> {
    let mut m = FvMatrix::new(psi.name(), mesh);
    let rdt = 1.0 / dt;
    let old = psi.old_internal();
    for (c, &vol) in mesh.cell_volumes().iter().enumerate() {
        m.diag_mut()[c] = coeff[c] * vol * rdt;
        m.source_mut()[c] = old[c] * (coeff_old[c] * vol * rdt);
    }
    m
}

/// 隐式线性源 `coeff·ψ`（单位体积系数）
pub fn sp<T: FieldValue>(mesh: &dyn FvMesh, coeffs: &[f64], psi: &VolField<T>) -> FvMatrix<T> {
    let mut m = FvMatrix::new(psi.name(), mesh);
    m.add_sp(mesh, coeffs);
    m
}
