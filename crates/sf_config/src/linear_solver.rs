// crates/sf_config/src/linear_solver.rs

//! 线性求解器参数

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Krylov 方法选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KrylovMethod {
    /// 对称矩阵用 PCG，否则 BiCGStab
    #[default]
    Auto,
    /// 预条件共轭梯度
    Pcg,
    /// 双共轭梯度稳定法
    Bicgstab,
}

/// 单个方程的线性求解参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSolverControls {
    /// 方法
    #[serde(default)]
    pub method: KrylovMethod,
    /// 相对收敛容差
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    /// 绝对收敛容差
    #[serde(default = "default_atol")]
    pub atol: f64,
    /// 最大迭代次数
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// 是否输出迭代日志
    #[serde(default)]
    pub verbose: bool,
}

fn default_rtol() -> f64 { 1e-8 }
fn default_atol() -> f64 { 1e-12 }
fn default_max_iter() -> usize { 1000 }

impl Default for LinearSolverControls {
    fn default() -> Self {
        Self {
            method: KrylovMethod::Auto,
            rtol: default_rtol(),
            atol: default_atol(),
            max_iter: default_max_iter(),
            verbose: false,
        }
    }
}

impl LinearSolverControls {
    /// 最终迭代使用的更严格参数
    pub fn tightened(&self) -> Self {
        Self {
            rtol: self.rtol.min(1e-10),
            ..self.clone()
        }
    }

    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if self.rtol < 0.0 || self.atol < 0.0 {
            return Err(ConfigError::invalid(key, format!("({}, {})", self.rtol, self.atol), "容差不能为负"));
        }
        if self.max_iter == 0 {
            return Err(ConfigError::invalid(key, self.max_iter, "最大迭代次数必须至少为 1"));
        }
        Ok(())
    }
}

/// 各方程的线性求解器参数集合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSolverSettings {
    /// 压力方程
    #[serde(default)]
    pub p: LinearSolverControls,
    /// 最终迭代的压力方程
    #[serde(default = "default_final")]
    pub p_final: LinearSolverControls,
    /// 动量方程
    #[serde(default)]
    pub u: LinearSolverControls,
    /// 最终迭代的动量方程
    #[serde(default = "default_final")]
    pub u_final: LinearSolverControls,
}

fn default_final() -> LinearSolverControls {
    LinearSolverControls::default().tightened()
}

impl Default for LinearSolverSettings {
    fn default() -> Self {
        Self {
            p: LinearSolverControls::default(),
            p_final: default_final(),
            u: LinearSolverControls::default(),
            u_final: default_final(),
        }
    }
}

impl LinearSolverSettings {
    /// 按场名和是否最终迭代选择参数
    pub fn for_field(&self, field: &str, final_iteration: bool) -> &LinearSolverControls {
        let is_pressure = field.starts_with('p');
        match (is_pressure, final_iteration) {
            (true, false) => &self.p,
            (true, true) => &self.p_final,
            (false, false) => &self.u,
            (false, true) => &self.u_final,
        }
    }

    /// 验证
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.p.validate("solvers.p")?;
        self.p_final.validate("solvers.p_final")?;
        self.u.validate("solvers.u")?;
        self.u_final.validate("solvers.u_final")
    }
}
