// crates/sf_physics/src/services/linear_solve.rs

//! 线性求解服务
//!
//! [`KrylovSolver`] 把 ldu 方程转为 CSR，按对称性选择 PCG 或 BiCGStab，
//! Jacobi 预条件。残差按尺度无关的方式归一化：
//!
//! ```text
//! r = Σ|b − Aψ| / (Σ|Aψ − Aψ̄| + Σ|b − Aψ̄| + SMALL)
//! ```
//!
//! 其中 ψ̄ 为 ψ 的平均值。未收敛只记录警告。

use glam::DVec3;
use serde::Serialize;
use sf_config::{KrylovMethod, LinearSolverControls};
use sf_foundation::float::SMALL;

use crate::fields::{FieldValue, VolField, VolScalarField, VolVectorField};
use crate::mesh::FvMesh;
use crate::numerics::linear_algebra::{
    BiCgStabSolver, CsrMatrix, IterativeSolver, JacobiPreconditioner, PcgSolver, SolverConfig,
    SolverResult,
};
use crate::numerics::linear_algebra::vector_ops::sum_abs;
use crate::numerics::FvMatrix;

/// 对称性判据
const SYMMETRY_TOL: f64 = 1e-12;

/// 一次线性求解的性能
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolvePerformance {
    /// 求解器名称
    pub solver: &'static str,
    /// 场名
    pub field: String,
    /// 初始归一化残差
    pub initial_residual: f64,
    /// 最终归一化残差
    pub final_residual: f64,
    /// 迭代次数
    pub iterations: usize,
    /// 是否收敛
    pub converged: bool,
}

impl SolvePerformance {
    fn skipped(field: &str, residual: f64) -> Self {
        Self {
            solver: "none",
            field: field.to_string(),
            initial_residual: residual,
            final_residual: residual,
            iterations: 0,
            converged: true,
        }
    }

    /// 合并多分量结果（取最大残差）
    fn merge(mut self, other: Self) -> Self {
        self.initial_residual = self.initial_residual.max(other.initial_residual);
        self.final_residual = self.final_residual.max(other.final_residual);
        self.iterations = self.iterations.max(other.iterations);
        self.converged &= other.converged;
        if other.solver != "none" {
            self.solver = other.solver;
        }
        self
    }
}

/// 线性求解服务
pub trait LinearSolve: Send + Sync {
    /// 求解标量方程，结果写回场并更新边界值
    fn solve_scalar(
        &self,
        mesh: &dyn FvMesh,
        eqn: &FvMatrix<f64>,
        psi: &mut VolScalarField,
        controls: &LinearSolverControls,
    ) -> SolvePerformance;

    /// 逐分量求解矢量方程
    fn solve_vector(
        &self,
        mesh: &dyn FvMesh,
        eqn: &FvMatrix<DVec3>,
        psi: &mut VolVectorField,
        controls: &LinearSolverControls,
    ) -> SolvePerformance;
}

/// Krylov 子空间求解器
#[derive(Debug, Clone, Copy, Default)]
pub struct KrylovSolver;

impl KrylovSolver {
    fn solve_component<T: FieldValue>(
        &self,
        mesh: &dyn FvMesh,
        eqn: &FvMatrix<T>,
        psi: &mut VolField<T>,
        component: usize,
        controls: &LinearSolverControls,
    ) -> SolvePerformance {
        let (a, b) = eqn.to_csr(mesh, component);
        let mut x: Vec<f64> = psi.internal().iter().map(|v| v.component(component)).collect();

        let norm_factor = normalisation_factor(&a, &b, &x);
        let initial = normalised_residual(&a, &b, &x, norm_factor);
        let field = if T::N_COMPONENTS > 1 {
            format!("{}.{}", eqn.psi_name(), ["x", "y", "z"][component.min(2)])
        } else {
            eqn.psi_name().to_string()
        };
        if initial < controls.atol {
            return SolvePerformance::skipped(&field, initial);
        }

        let symmetric = match controls.method {
            KrylovMethod::Pcg => true,
            KrylovMethod::Bicgstab => false,
            KrylovMethod::Auto => eqn.is_symmetric() || a.is_symmetric(SYMMETRY_TOL),
        };
        let config = SolverConfig::from(controls);
        let precond = JacobiPreconditioner::from_matrix(&a);
        let (name, result): (&'static str, SolverResult) = if symmetric {
            let mut solver = PcgSolver::new(config);
            (solver.name(), solver.solve(&a, &b, &mut x, &precond))
        } else {
            let mut solver = BiCgStabSolver::new(config);
            (solver.name(), solver.solve(&a, &b, &mut x, &precond))
        };

        for (v, &xi) in psi.internal_mut().iter_mut().zip(&x) {
            v.set_component(component, xi);
        }

        let final_residual = normalised_residual(&a, &b, &x, norm_factor);
        let perf = SolvePerformance {
            solver: name,
            field,
            initial_residual: initial,
            final_residual,
            iterations: result.iterations,
            converged: result.is_converged(),
        };
        log::debug!(
            "{}: 求解 {}, 初始残差 = {:.6e}, 最终残差 = {:.6e}, 迭代 {}",
            perf.solver,
            perf.field,
            perf.initial_residual,
            perf.final_residual,
            perf.iterations
        );
        if !perf.converged {
            log::warn!(
                "{} 求解 {} 未收敛: 状态 {:?}, 迭代 {}, 残差 {:.3e}",
                perf.solver,
                perf.field,
                result.status,
                perf.iterations,
                perf.final_residual
            );
        }
        perf
    }
}

impl LinearSolve for KrylovSolver {
    fn solve_scalar(
        &self,
        mesh: &dyn FvMesh,
        eqn: &FvMatrix<f64>,
        psi: &mut VolScalarField,
        controls: &LinearSolverControls,
    ) -> SolvePerformance {
        let perf = self.solve_component(mesh, eqn, psi, 0, controls);
        psi.correct_boundary_conditions(mesh);
        perf
    }

    fn solve_vector(
        &self,
        mesh: &dyn FvMesh,
        eqn: &FvMatrix<DVec3>,
        psi: &mut VolVectorField,
        controls: &LinearSolverControls,
    ) -> SolvePerformance {
        let mut perf = SolvePerformance::skipped(eqn.psi_name(), 0.0);
        for cmpt in 0..3 {
            // 网格没有面的方向不求解
            if mesh.sf().iter().all(|s| s[cmpt] == 0.0) {
                continue;
            }
            perf = perf.merge(self.solve_component(mesh, eqn, psi, cmpt, controls));
        }
        perf.field = eqn.psi_name().to_string();
        psi.correct_boundary_conditions(mesh);
        perf
    }
}

fn normalisation_factor(a: &CsrMatrix, b: &[f64], x: &[f64]) -> f64 {
    let n = x.len().max(1);
    let x_avg = x.iter().sum::<f64>() / n as f64;
    let x_ref = vec![x_avg; x.len()];

    let mut ax = vec![0.0; x.len()];
    let mut ax_ref = vec![0.0; x.len()];
    a.mul_vec(x, &mut ax);
    a.mul_vec(&x_ref, &mut ax_ref);

    let d1: Vec<f64> = ax.iter().zip(&ax_ref).map(|(l, r)| l - r).collect();
    let d2: Vec<f64> = b.iter().zip(&ax_ref).map(|(l, r)| l - r).collect();
    sum_abs(&d1) + sum_abs(&d2) + SMALL
}

fn normalised_residual(a: &CsrMatrix, b: &[f64], x: &[f64], norm_factor: f64) -> f64 {
    let mut ax = vec![0.0; x.len()];
    a.mul_vec(x, &mut ax);
    let r: Vec<f64> = b.iter().zip(&ax).map(|(l, r)| l - r).collect();
    sum_abs(&r) / norm_factor
}
