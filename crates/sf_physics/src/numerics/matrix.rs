// crates/sf_physics/src/numerics/matrix.rs

//! 离散方程 `FvMatrix`（ldu 存储）
//!
//! 每个单元一行：
//!
//! ```text
//! (diag_c + Σ ic_b)·ψ_c + Σ_f offdiag_f·ψ_nb = source_c + Σ bc_b
//! ```
//!
//! - `upper[f]`: owner 行中 neighbour 列的系数
//! - `lower[f]`: neighbour 行中 owner 列的系数
//! - `internal_coeffs[b]` / `boundary_coeffs[b]`: 边界面对对角与右端的贡献
//! - `face_flux_correction`: 显式非正交修正在面上的通量部分
//!
//! 面通量 `flux(ψ)`：内部面 `upper·ψ_N − lower·ψ_O`，边界面 `ic·ψ_c − bc`，
//! 再加上 `face_flux_correction`。按此定义，`Mψ − b` 恰好等于各单元流出通量之和
//! 减去显式源，压力求解后的面通量与矩阵严格一致。

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use sf_foundation::error::{SfError, SfResult};

use super::linear_algebra::{CsrBuilder, CsrMatrix};
use crate::fields::{FieldValue, VolField};
use crate::mesh::FvMesh;

/// 有限体积离散方程
#[derive(Debug, Clone)]
pub struct FvMatrix<T: FieldValue> {
    psi_name: String,
    diag: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    source: Vec<T>,
    internal_coeffs: Vec<f64>,
    boundary_coeffs: Vec<T>,
    face_flux_correction: Option<Vec<T>>,
}

/// 标量方程
pub type FvScalarMatrix = FvMatrix<f64>;

impl<T: FieldValue> FvMatrix<T> {
    /// 创建全零方程
    pub fn new(psi_name: impl Into<String>, mesh: &dyn FvMesh) -> Self {
        Self {
            psi_name: psi_name.into(),
            diag: vec![0.0; mesh.n_cells()],
            lower: vec![0.0; mesh.n_internal_faces()],
            upper: vec![0.0; mesh.n_internal_faces()],
            source: vec![T::ZERO; mesh.n_cells()],
            internal_coeffs: vec![0.0; mesh.n_boundary_faces()],
            boundary_coeffs: vec![T::ZERO; mesh.n_boundary_faces()],
            face_flux_correction: None,
        }
    }

    /// 求解变量名
    #[inline]
    pub fn psi_name(&self) -> &str {
        &self.psi_name
    }

    /// 对角系数
    #[inline]
    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    /// 可变对角系数
    #[inline]
    pub fn diag_mut(&mut self) -> &mut [f64] {
        &mut self.diag
    }

    /// 下三角系数（neighbour 行）
    #[inline]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// 可变下三角系数
    #[inline]
    pub fn lower_mut(&mut self) -> &mut [f64] {
        &mut self.lower
    }

    /// 上三角系数（owner 行）
    #[inline]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// 可变上三角系数
    #[inline]
    pub fn upper_mut(&mut self) -> &mut [f64] {
        &mut self.upper
    }

    /// 右端源项
    #[inline]
    pub fn source(&self) -> &[T] {
        &self.source
    }

    /// 可变右端源项
    #[inline]
    pub fn source_mut(&mut self) -> &mut [T] {
        &mut self.source
    }

    /// 边界内部系数
    #[inline]
    pub fn internal_coeffs(&self) -> &[f64] {
        &self.internal_coeffs
    }

    /// 可变边界内部系数
    #[inline]
    pub fn internal_coeffs_mut(&mut self) -> &mut [f64] {
        &mut self.internal_coeffs
    }

    /// 边界源系数
    #[inline]
    pub fn boundary_coeffs(&self) -> &[T] {
        &self.boundary_coeffs
    }

    /// 可变边界源系数
    #[inline]
    pub fn boundary_coeffs_mut(&mut self) -> &mut [T] {
        &mut self.boundary_coeffs
    }

    /// 面通量修正
    #[inline]
    pub fn face_flux_correction(&self) -> Option<&[T]> {
        self.face_flux_correction.as_deref()
    }

    /// 累加面通量修正（长度为总面数）
    pub fn add_face_flux_correction(&mut self, correction: Vec<T>) {
        match &mut self.face_flux_correction {
            Some(existing) => {
                for (e, c) in existing.iter_mut().zip(correction) {
                    *e += c;
                }
            }
            None => self.face_flux_correction = Some(correction),
        }
    }

    /// 上下三角是否相同
    pub fn is_symmetric(&self) -> bool {
        self.lower == self.upper
    }

    /// 含边界贡献的对角 `diag + Σ ic`
    pub fn diag_with_boundary(&self, mesh: &dyn FvMesh) -> Vec<f64> {
        let mut d = self.diag.clone();
        let owner = mesh.owner();
        let n_internal = mesh.n_internal_faces();
        for (b, &ic) in self.internal_coeffs.iter().enumerate() {
            d[owner[n_internal + b]] += ic;
        }
        d
    }

    /// 每行非对角系数绝对值之和
    pub fn sum_mag_off_diag(&self, mesh: &dyn FvMesh) -> Vec<f64> {
        let mut sum = vec![0.0; self.diag.len()];
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        for f in 0..self.upper.len() {
            sum[owner[f]] += self.upper[f].abs();
            sum[neighbour[f]] += self.lower[f].abs();
        }
        sum
    }

    /// 中心系数 `A = (diag + Σ ic)/V`
    pub fn a(&self, mesh: &dyn FvMesh) -> Vec<f64> {
        let mut a = self.diag_with_boundary(mesh);
        for (ai, &v) in a.iter_mut().zip(mesh.cell_volumes()) {
            *ai /= v;
        }
        a
    }

    /// `H(ψ) = (source + Σ bc − Σ offdiag·ψ_nb)/V`
    pub fn h(&self, mesh: &dyn FvMesh, psi: &[T]) -> Vec<T> {
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let n_internal = mesh.n_internal_faces();

        let mut h = self.source.clone();
        for f in 0..n_internal {
            let (o, n) = (owner[f], neighbour[f]);
            h[o] -= psi[n] * self.upper[f];
            h[n] -= psi[o] * self.lower[f];
        }
        for (b, &bc) in self.boundary_coeffs.iter().enumerate() {
            h[owner[n_internal + b]] += bc;
        }
        for (hi, &v) in h.iter_mut().zip(mesh.cell_volumes()) {
            *hi = *hi * (1.0 / v);
        }
        h
    }

    /// `H1 = −Σ offdiag / V`
    pub fn h1(&self, mesh: &dyn FvMesh) -> Vec<f64> {
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let mut h1 = vec![0.0; self.diag.len()];
        for f in 0..self.upper.len() {
            h1[owner[f]] -= self.upper[f];
            h1[neighbour[f]] -= self.lower[f];
        }
        for (hi, &v) in h1.iter_mut().zip(mesh.cell_volumes()) {
            *hi /= v;
        }
        h1
    }

    /// 方程在 ψ 处的面通量（长度为总面数）
    pub fn flux(&self, mesh: &dyn FvMesh, psi: &VolField<T>) -> Vec<T> {
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let n_internal = mesh.n_internal_faces();
        let values = psi.internal();

        let mut flux = vec![T::ZERO; mesh.n_faces()];
        for f in 0..n_internal {
            flux[f] = values[neighbour[f]] * self.upper[f] - values[owner[f]] * self.lower[f];
        }
        for b in 0..self.internal_coeffs.len() {
            let f = n_internal + b;
            flux[f] = values[owner[f]] * self.internal_coeffs[b] - self.boundary_coeffs[b];
        }
        if let Some(correction) = &self.face_flux_correction {
            for (fl, &c) in flux.iter_mut().zip(correction) {
                *fl += c;
            }
        }
        flux
    }

    /// 残差 `b − Mψ`（不除体积）
    pub fn residual(&self, mesh: &dyn FvMesh, psi: &[T]) -> Vec<T> {
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let n_internal = mesh.n_internal_faces();

        let mut r: Vec<T> = self
            .source
            .iter()
            .zip(&self.diag)
            .zip(psi)
            .map(|((&s, &d), &p)| s - p * d)
            .collect();
        for f in 0..n_internal {
            let (o, n) = (owner[f], neighbour[f]);
            r[o] -= psi[n] * self.upper[f];
            r[n] -= psi[o] * self.lower[f];
        }
        for b in 0..self.internal_coeffs.len() {
            let c = owner[n_internal + b];
            r[c] += self.boundary_coeffs[b] - psi[c] * self.internal_coeffs[b];
        }
        r
    }

    /// `M & ψ = (Mψ − b)/V`
    pub fn apply_to(&self, mesh: &dyn FvMesh, psi: &[T]) -> Vec<T> {
        self.residual(mesh, psi)
            .into_iter()
            .zip(mesh.cell_volumes())
            .map(|(r, &v)| -r * (1.0 / v))
            .collect()
    }

    /// 隐式欠松弛
    ///
    /// 先保证对角占优，再除以松弛因子，并把对角增量乘 ψ 加入源项。
    /// `alpha >= 1` 时不做任何修改。
    pub fn relax(&mut self, mesh: &dyn FvMesh, psi: &[T], alpha: f64) {
        if alpha >= 1.0 || alpha <= 0.0 {
            return;
        }
        let owner = mesh.owner();
        let n_internal = mesh.n_internal_faces();

        let d0 = self.diag.clone();
        let sum_off = self.sum_mag_off_diag(mesh);

        let mut d = self.diag.clone();
        for (b, &ic) in self.internal_coeffs.iter().enumerate() {
            d[owner[n_internal + b]] += ic.abs();
        }
        for (di, &so) in d.iter_mut().zip(&sum_off) {
            *di = di.abs().max(so) / alpha;
        }
        for (b, &ic) in self.internal_coeffs.iter().enumerate() {
            d[owner[n_internal + b]] -= ic;
        }

        for c in 0..d.len() {
            self.source[c] += psi[c] * (d[c] - d0[c]);
        }
        self.diag = d;
    }

    /// 设置参考值：把 `ψ[cell] = value` 以罚函数方式加入方程
    pub fn set_reference(&mut self, cell: usize, value: T) -> SfResult<()> {
        SfError::check_index("cell", cell, self.diag.len())?;
        let d = self.diag[cell];
        self.source[cell] += value * d;
        self.diag[cell] += d;
        Ok(())
    }

    /// 加入已体积积分的显式项（方程 `M + s = 0`）
    pub fn add_explicit_integrated(&mut self, values: &[T]) {
        for (s, &v) in self.source.iter_mut().zip(values) {
            *s -= v;
        }
    }

    /// 加入单位体积的显式项
    pub fn add_explicit(&mut self, mesh: &dyn FvMesh, values: &[T]) {
        for ((s, &v), &vol) in self.source.iter_mut().zip(values).zip(mesh.cell_volumes()) {
            *s -= v * vol;
        }
    }

    /// 隐式线性源 `+ coeff·ψ`（单位体积系数）
    pub fn add_sp(&mut self, mesh: &dyn FvMesh, coeffs: &[f64]) {
        for ((d, &c), &vol) in self.diag.iter_mut().zip(coeffs).zip(mesh.cell_volumes()) {
            *d += c * vol;
        }
    }

    /// 增量形式 `M − (M & ψ)`：在当前 ψ 处残差为零，只保留隐式线性化
    pub fn correction(&self, mesh: &dyn FvMesh, psi: &[T]) -> Self {
        let mut m = self.clone();
        for (s, r) in m.source.iter_mut().zip(self.residual(mesh, psi)) {
            *s -= r;
        }
        m
    }

    /// 按分量组装 CSR 矩阵与右端项
    pub fn to_csr(&self, mesh: &dyn FvMesh, component: usize) -> (CsrMatrix, Vec<f64>) {
        let n = self.diag.len();
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let n_internal = mesh.n_internal_faces();

        let mut builder = CsrBuilder::new_square(n);
        let diag = self.diag_with_boundary(mesh);
        for (c, &d) in diag.iter().enumerate() {
            builder.set(c, c, d);
        }
        for f in 0..n_internal {
            builder.add(owner[f], neighbour[f], self.upper[f]);
            builder.add(neighbour[f], owner[f], self.lower[f]);
        }

        let mut rhs: Vec<f64> = self.source.iter().map(|s| s.component(component)).collect();
        for (b, bc) in self.boundary_coeffs.iter().enumerate() {
            rhs[owner[n_internal + b]] += bc.component(component);
        }
        (builder.build(), rhs)
    }

    fn check_compatible(&self, other: &Self) {
        debug_assert_eq!(self.diag.len(), other.diag.len(), "方程单元数不一致");
        debug_assert_eq!(self.upper.len(), other.upper.len(), "方程内部面数不一致");
    }
}

impl<T: FieldValue> Neg for FvMatrix<T> {
    type Output = Self;

    fn neg(mut self) -> Self {
        self.diag.iter_mut().for_each(|v| *v = -*v);
        self.lower.iter_mut().for_each(|v| *v = -*v);
        self.upper.iter_mut().for_each(|v| *v = -*v);
        self.source.iter_mut().for_each(|v| *v = -*v);
        self.internal_coeffs.iter_mut().for_each(|v| *v = -*v);
        self.boundary_coeffs.iter_mut().for_each(|v| *v = -*v);
        if let Some(c) = &mut self.face_flux_correction {
            c.iter_mut().for_each(|v| *v = -*v);
        }
        self
    }
}

impl<T: FieldValue> AddAssign for FvMatrix<T> {
    fn add_assign(&mut self, rhs: Self) {
        self.check_compatible(&rhs);
        for (a, b) in self.diag.iter_mut().zip(&rhs.diag) {
            *a += b;
        }
        for (a, b) in self.lower.iter_mut().zip(&rhs.lower) {
            *a += b;
        }
        for (a, b) in self.upper.iter_mut().zip(&rhs.upper) {
            *a += b;
        }
        for (a, &b) in self.source.iter_mut().zip(&rhs.source) {
            *a += b;
        }
        for (a, b) in self.internal_coeffs.iter_mut().zip(&rhs.internal_coeffs) {
            *a += b;
        }
        for (a, &b) in self.boundary_coeffs.iter_mut().zip(&rhs.boundary_coeffs) {
            *a += b;
        }
        if let Some(c) = rhs.face_flux_correction {
            self.add_face_flux_correction(c);
        }
    }
}

impl<T: FieldValue> SubAssign for FvMatrix<T> {
    fn sub_assign(&mut self, rhs: Self) {
        *self += -rhs;
    }
}

impl<T: FieldValue> Add for FvMatrix<T> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl<T: FieldValue> Sub for FvMatrix<T> {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}
