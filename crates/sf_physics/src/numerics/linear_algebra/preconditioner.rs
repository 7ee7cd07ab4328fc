// crates/sf_physics/src/numerics/linear_algebra/preconditioner.rs

//! 预条件器
//!
//! - [`IdentityPreconditioner`]: 不做预条件
//! - [`JacobiPreconditioner`]: 对角缩放 `z = D⁻¹ r`

use super::csr::CsrMatrix;

/// 对角元绝对值低于此值时视为零
const ZERO_DIAGONAL_THRESHOLD: f64 = 1e-14;

/// 预条件器 trait
pub trait Preconditioner: Send + Sync {
    /// 应用预条件 `z = M⁻¹ r`
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 名称
    fn name(&self) -> &'static str;

    /// 矩阵数值变化后更新
    fn update(&mut self, matrix: &CsrMatrix);
}

/// 单位预条件器
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "Identity"
    }

    fn update(&mut self, _matrix: &CsrMatrix) {}
}

/// Jacobi（对角）预条件器
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// 从矩阵对角线构造，零对角元处退化为单位
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        let inv_diag = matrix
            .extract_diagonal()
            .into_iter()
            .map(|d| {
                if d.abs() > ZERO_DIAGONAL_THRESHOLD {
                    1.0 / d
                } else {
                    1.0
                }
            })
            .collect();
        Self { inv_diag }
    }

    /// 对角线倒数
    #[inline]
    pub fn inv_diagonal(&self) -> &[f64] {
        &self.inv_diag
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        for ((zi, &ri), &d) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * d;
        }
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        *self = Self::from_matrix(matrix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linear_algebra::csr::CsrBuilder;

    #[test]
    fn test_jacobi_preconditioner() {
        let mut builder = CsrBuilder::new_square(2);
        builder.set(0, 0, 4.0);
        builder.set(1, 1, 0.0);
        let precond = JacobiPreconditioner::from_matrix(&builder.build());
        assert_eq!(precond.inv_diagonal(), &[0.25, 1.0]);

        let mut z = [0.0; 2];
        precond.apply(&[2.0, 3.0], &mut z);
        assert_eq!(z, [0.5, 3.0]);
    }

    #[test]
    fn test_identity_preconditioner() {
        let mut z = [0.0; 3];
        IdentityPreconditioner.apply(&[1.0, 2.0, 3.0], &mut z);
        assert_eq!(z, [1.0, 2.0, 3.0]);
    }
}
