// crates/sf_physics/src/numerics/linear_algebra/solver.rs

//! 迭代线性求解器
//!
//! 求解稀疏线性系统 Ax = b：
//!
//! - [`PcgSolver`]: 预条件共轭梯度法（对称正定，压力方程）
//! - [`BiCgStabSolver`]: 双共轭梯度稳定法（非对称，动量方程）
//!
//! 收敛判据：`||r|| < atol` 或 `||r|| < rtol·||r₀||`。

use super::csr::CsrMatrix;
use super::preconditioner::Preconditioner;
use super::vector_ops::{axpy, copy, dot, norm2};

/// 停滞判据
const STAGNATION_TOL: f64 = 1e-30;
/// 发散判据（相对初始残差）
const DIVERGENCE_FACTOR: f64 = 1e6;

/// 求解器配置
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// 相对收敛容差
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 是否输出迭代信息
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-14,
            max_iter: 1000,
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// 创建求解器配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }

    /// 设置绝对容差
    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }
}

impl From<&sf_config::LinearSolverControls> for SolverConfig {
    fn from(controls: &sf_config::LinearSolverControls) -> Self {
        Self {
            rtol: controls.rtol,
            atol: controls.atol,
            max_iter: controls.max_iter,
            verbose: controls.verbose,
        }
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞
    Stagnated,
}

/// 求解器结果
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
}

impl SolverResult {
    fn new(status: SolverStatus, iterations: usize, residual_norm: f64, initial: f64) -> Self {
        Self {
            status,
            iterations,
            residual_norm,
            initial_residual_norm: initial,
        }
    }

    /// 是否收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// 相对残差
    pub fn relative_residual(&self) -> f64 {
        if self.initial_residual_norm > 0.0 {
            self.residual_norm / self.initial_residual_norm
        } else {
            0.0
        }
    }
}

/// 迭代求解器 trait
pub trait IterativeSolver {
    /// 求解 Ax = b，`x` 输入初始猜测、输出解
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult;

    /// 名称
    fn name(&self) -> &'static str;
}

/// r = b - A*x，返回 ||r||
fn initial_residual(matrix: &CsrMatrix, b: &[f64], x: &[f64], r: &mut [f64]) -> f64 {
    matrix.mul_vec(x, r);
    for (ri, &bi) in r.iter_mut().zip(b) {
        *ri = bi - *ri;
    }
    norm2(r)
}

/// 预条件共轭梯度法求解器
pub struct PcgSolver {
    config: SolverConfig,
    r: Vec<f64>,
    z: Vec<f64>,
    p: Vec<f64>,
    ap: Vec<f64>,
}

impl PcgSolver {
    /// 创建 PCG 求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            z: Vec::new(),
            p: Vec::new(),
            ap: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.z = vec![0.0; n];
            self.p = vec![0.0; n];
            self.ap = vec![0.0; n];
        }
    }
}

impl IterativeSolver for PcgSolver {
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);

        let initial_norm = initial_residual(matrix, b, x, &mut self.r);
        let tol = self.config.atol.max(self.config.rtol * initial_norm);
        if initial_norm < self.config.atol {
            return SolverResult::new(SolverStatus::Converged, 0, initial_norm, initial_norm);
        }

        precond.apply(&self.r, &mut self.z);
        copy(&self.z, &mut self.p);
        let mut rz = dot(&self.r, &self.z);

        for iter in 0..self.config.max_iter {
            matrix.mul_vec(&self.p, &mut self.ap);

            let pap = dot(&self.p, &self.ap);
            if pap.abs() < STAGNATION_TOL {
                return SolverResult::new(SolverStatus::Stagnated, iter, norm2(&self.r), initial_norm);
            }

            let alpha = rz / pap;
            axpy(alpha, &self.p, x);
            axpy(-alpha, &self.ap, &mut self.r);

            let res_norm = norm2(&self.r);
            if self.config.verbose {
                log::trace!("PCG iter {}: residual = {:.6e}", iter + 1, res_norm);
            }
            if res_norm < tol {
                return SolverResult::new(SolverStatus::Converged, iter + 1, res_norm, initial_norm);
            }

            precond.apply(&self.r, &mut self.z);
            let rz_new = dot(&self.r, &self.z);
            let beta = rz_new / rz;
            rz = rz_new;

            for i in 0..n {
                self.p[i] = self.z[i] + beta * self.p[i];
            }
        }

        SolverResult::new(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            norm2(&self.r),
            initial_norm,
        )
    }

    fn name(&self) -> &'static str {
        "PCG"
    }
}

/// 双共轭梯度稳定法求解器
pub struct BiCgStabSolver {
    config: SolverConfig,
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    z: Vec<f64>,
}

impl BiCgStabSolver {
    /// 创建 BiCGStab 求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            z: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.r0 = vec![0.0; n];
            self.p = vec![0.0; n];
            self.v = vec![0.0; n];
            self.s = vec![0.0; n];
            self.t = vec![0.0; n];
            self.z = vec![0.0; n];
        }
    }
}

impl IterativeSolver for BiCgStabSolver {
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);

        let initial_norm = initial_residual(matrix, b, x, &mut self.r);
        let tol = self.config.atol.max(self.config.rtol * initial_norm);
        if initial_norm < self.config.atol {
            return SolverResult::new(SolverStatus::Converged, 0, initial_norm, initial_norm);
        }

        // 影子残差在迭代中保持不变
        copy(&self.r, &mut self.r0);

        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        self.v.fill(0.0);
        self.p.fill(0.0);

        for iter in 0..self.config.max_iter {
            let rho = dot(&self.r0, &self.r);
            if rho.abs() < STAGNATION_TOL {
                return SolverResult::new(SolverStatus::Stagnated, iter, norm2(&self.r), initial_norm);
            }

            let beta = if iter == 0 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            precond.apply(&self.p, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if r0v.abs() < STAGNATION_TOL {
                return SolverResult::new(SolverStatus::Stagnated, iter, norm2(&self.r), initial_norm);
            }
            alpha = rho / r0v;

            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            let s_norm = norm2(&self.s);
            if s_norm < tol {
                axpy(alpha, &self.z, x);
                return SolverResult::new(SolverStatus::Converged, iter + 1, s_norm, initial_norm);
            }

            // x += α·M⁻¹p，在 z 被覆盖前更新
            axpy(alpha, &self.z, x);

            precond.apply(&self.s, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt.abs() < STAGNATION_TOL {
                1.0
            } else {
                dot(&self.t, &self.s) / tt
            };
            if omega.abs() < STAGNATION_TOL {
                return SolverResult::new(SolverStatus::Stagnated, iter + 1, s_norm, initial_norm);
            }

            axpy(omega, &self.z, x);

            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res_norm = norm2(&self.r);
            if self.config.verbose {
                log::trace!("BiCGStab iter {}: residual = {:.6e}", iter + 1, res_norm);
            }
            if res_norm < tol {
                return SolverResult::new(SolverStatus::Converged, iter + 1, res_norm, initial_norm);
            }
            if res_norm > initial_norm * DIVERGENCE_FACTOR {
                return SolverResult::new(SolverStatus::Diverged, iter + 1, res_norm, initial_norm);
            }
        }

        SolverResult::new(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            norm2(&self.r),
            initial_norm,
        )
    }

    fn name(&self) -> &'static str {
        "BiCGStab"
    }
}
