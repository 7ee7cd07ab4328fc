// crates/sf_physics/src/coupling/control.rs

//! 修正循环状态机
//!
//! 三级嵌套循环：
//!
//! ```text
//! Outer (n_outer_correctors, 残差控制可提前结束)
//! └─ Pressure (n_correctors, 稳态强制为 1)
//!    └─ NonOrthogonal (n_non_orth_correctors + 1 次)
//! ```
//!
//! [`CorrectorStateMachine::is_final_corrector`] 只依赖迭代序号与当前收敛状态，
//! 对序号单调：某序号为最终迭代，则同一外层周期内更大的序号也是。

use std::collections::HashMap;

use sf_config::{CorrectorControls, ResidualControl};

/// 嵌套层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrectorLevel {
    /// 外层修正
    Outer,
    /// 内层压力修正
    Pressure,
    /// 非正交修正
    NonOrthogonal,
}

impl CorrectorLevel {
    /// 层级名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Outer => "outer",
            Self::Pressure => "pressure",
            Self::NonOrthogonal => "nonOrthogonal",
        }
    }
}

/// 当前修正位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectorContext {
    /// 层级
    pub level: CorrectorLevel,
    /// 0 起始序号
    pub index: usize,
    /// 是否该层最后一次
    pub is_final: bool,
}

/// 修正循环状态机
#[derive(Debug, Clone)]
pub struct CorrectorStateMachine {
    n_outer: usize,
    n_pressure: usize,
    n_non_orth: usize,
    transient: bool,
    residual_control: Vec<ResidualControl>,

    outer: Option<usize>,
    converged_at: Option<usize>,
    finished: bool,
    /// 本时间步第一次外迭代的初始残差
    first_residuals: HashMap<String, f64>,
    /// 当前外迭代中每个场第一次求解的初始残差
    current_residuals: HashMap<String, f64>,
    /// 派生子求解器按修正名登记的"流动求解完成"标志
    solution_flags: HashMap<String, bool>,
}

impl CorrectorStateMachine {
    /// 由控制参数创建
    pub fn new(controls: &CorrectorControls, transient: bool) -> Self {
        let n_pressure = if transient { controls.n_correctors.max(1) } else { 1 };
        if !transient && controls.n_correctors > 1 {
            log::debug!(
                "稳态格式每次外迭代只做一次压力修正 (n_correctors = {} 被忽略)",
                controls.n_correctors
            );
        }
        Self {
            n_outer: controls.n_outer_correctors.max(1),
            n_pressure,
            n_non_orth: controls.n_non_orth_correctors,
            transient,
            residual_control: controls.residual_control.clone(),
            outer: None,
            converged_at: None,
            finished: false,
            first_residuals: HashMap::new(),
            current_residuals: HashMap::new(),
            solution_flags: HashMap::new(),
        }
    }

    /// 是否瞬态
    #[inline]
    pub fn transient(&self) -> bool {
        self.transient
    }

    /// 外层上限
    #[inline]
    pub fn n_outer(&self) -> usize {
        self.n_outer
    }

    /// 压力修正上限
    #[inline]
    pub fn n_pressure(&self) -> usize {
        self.n_pressure
    }

    /// 非正交修正次数（实际执行 `n + 1` 次）
    #[inline]
    pub fn n_non_orth(&self) -> usize {
        self.n_non_orth
    }

    /// 新时间步：清空外层计数与残差记录
    pub fn start_time_step(&mut self) {
        self.outer = None;
        self.converged_at = None;
        self.finished = false;
        self.first_residuals.clear();
        self.current_residuals.clear();
    }

    /// 进入下一次外层修正，循环结束时返回 `None`
    ///
    /// 离开第 i 次（i ≥ 1）外迭代时检查残差控制；收敛后下一次外迭代
    /// 标记为最终迭代并且是最后一次。
    pub fn next_outer(&mut self) -> Option<CorrectorContext> {
        if self.finished {
            return None;
        }
        let next = match self.outer {
            None => 0,
            Some(i) => {
                if self.is_final_corrector(CorrectorLevel::Outer, i) {
                    self.finish(i);
                    return None;
                }
                if i >= 1 && self.converged_at.is_none() && self.residuals_converged() {
                    log::info!("外层修正在第 {} 次迭代满足残差控制", i + 1);
                    self.converged_at = Some(i);
                }
                i + 1
            }
        };

        self.outer = Some(next);
        self.current_residuals.clear();
        for flag in self.solution_flags.values_mut() {
            *flag = false;
        }
        Some(self.context(CorrectorLevel::Outer, next))
    }

    fn finish(&mut self, last: usize) {
        self.finished = true;
        if self.converged_at.is_none() && !self.residual_control.is_empty() {
            // 上限处的最终迭代也要检查一次
            if last >= 1 && self.residuals_converged() {
                self.converged_at = Some(last);
                return;
            }
            log::warn!("外层修正未在 {} 次迭代内收敛", self.n_outer);
        }
    }

    /// 当前外层序号
    #[inline]
    pub fn outer_index(&self) -> Option<usize> {
        self.outer
    }

    /// 本时间步已执行的外层迭代数
    pub fn outer_iterations(&self) -> usize {
        self.outer.map_or(0, |i| i + 1)
    }

    /// 残差控制是否已满足
    pub fn converged(&self) -> bool {
        self.converged_at.is_some()
    }

    /// 某层某序号是否为最终迭代
    pub fn is_final_corrector(&self, level: CorrectorLevel, index: usize) -> bool {
        match level {
            CorrectorLevel::Outer => {
                index + 1 >= self.n_outer || self.converged_at.map_or(false, |c| index > c)
            }
            CorrectorLevel::Pressure => index + 1 >= self.n_pressure,
            CorrectorLevel::NonOrthogonal => index >= self.n_non_orth,
        }
    }

    /// 构造上下文
    pub fn context(&self, level: CorrectorLevel, index: usize) -> CorrectorContext {
        CorrectorContext {
            level,
            index,
            is_final: self.is_final_corrector(level, index),
        }
    }

    /// 当前外层是否为最终迭代
    pub fn final_outer(&self) -> bool {
        self.outer
            .map_or(false, |i| self.is_final_corrector(CorrectorLevel::Outer, i))
    }

    /// 压力修正上下文序列
    pub fn pressure_passes(&self) -> Vec<CorrectorContext> {
        (0..self.n_pressure)
            .map(|i| self.context(CorrectorLevel::Pressure, i))
            .collect()
    }

    /// 非正交修正上下文序列
    pub fn non_orth_passes(&self) -> Vec<CorrectorContext> {
        (0..=self.n_non_orth)
            .map(|i| self.context(CorrectorLevel::NonOrthogonal, i))
            .collect()
    }

    /// 是否使用最终线性求解参数：瞬态且三级都是最后一次
    pub fn final_inner_iteration(&self, pressure: &CorrectorContext, non_orth: &CorrectorContext) -> bool {
        self.transient && self.final_outer() && pressure.is_final && non_orth.is_final
    }

    /// 记录一次线性求解的初始残差（外迭代内只保留第一次）
    pub fn record_residual(&mut self, field: &str, initial_residual: f64) {
        self.current_residuals
            .entry(field.to_string())
            .or_insert(initial_residual);
        if self.outer == Some(0) {
            self.first_residuals
                .entry(field.to_string())
                .or_insert(initial_residual);
        }
    }

    fn residuals_converged(&self) -> bool {
        if self.residual_control.is_empty() {
            return false;
        }
        let mut checked = false;
        for control in &self.residual_control {
            let Some(&r) = self.current_residuals.get(&control.field) else {
                continue;
            };
            checked = true;
            let absolute = r < control.tolerance;
            let relative = control.rel_tol > 0.0
                && self
                    .first_residuals
                    .get(&control.field)
                    .map_or(false, |&r0| r0 > 0.0 && r / r0 < control.rel_tol);
            log::debug!(
                "残差控制 {}: 初始残差 {:.3e}, 容差 {:.3e}, 相对容差 {:.3e}",
                control.field,
                r,
                control.tolerance,
                control.rel_tol
            );
            if !(absolute || relative) {
                return false;
            }
        }
        checked
    }

    /// 登记派生子求解器的完成标志
    pub fn register_solution_flag(&mut self, name: impl Into<String>) {
        self.solution_flags.insert(name.into(), false);
    }

    /// 标记完成
    pub fn set_solution_finished(&mut self, name: &str) {
        if let Some(flag) = self.solution_flags.get_mut(name) {
            *flag = true;
        }
    }

    /// 查询完成标志（未登记视为未完成）
    pub fn solution_finished(&self, name: &str) -> bool {
        self.solution_flags.get(name).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls(n_outer: usize, n_corr: usize, n_non_orth: usize) -> CorrectorControls {
        CorrectorControls {
            n_outer_correctors: n_outer,
            n_correctors: n_corr,
            n_non_orth_correctors: n_non_orth,
            ..Default::default()
        }
    }

    fn drain(sm: &mut CorrectorStateMachine) -> Vec<CorrectorContext> {
        let mut passes = Vec::new();
        while let Some(ctx) = sm.next_outer() {
            passes.push(ctx);
        }
        passes
    }

    #[test]
    fn test_outer_runs_to_cap_without_controls() {
        let mut sm = CorrectorStateMachine::new(&controls(3, 2, 0), true);
        sm.start_time_step();
        let passes = drain(&mut sm);
        assert_eq!(passes.len(), 3);
        assert!(!passes[0].is_final);
        assert!(!passes[1].is_final);
        assert!(passes[2].is_final);
        assert!(sm.next_outer().is_none());
    }

    #[test]
    fn test_final_is_monotone() {
        let sm = CorrectorStateMachine::new(&controls(4, 3, 2), true);
        for level in [CorrectorLevel::Outer, CorrectorLevel::Pressure, CorrectorLevel::NonOrthogonal] {
            let mut seen = false;
            for i in 0..10 {
                let f = sm.is_final_corrector(level, i);
                assert!(!seen || f, "{:?} 在 {} 处失去最终标志", level, i);
                seen |= f;
            }
            assert!(seen);
        }
        assert!(!sm.is_final_corrector(CorrectorLevel::NonOrthogonal, 1));
        assert!(sm.is_final_corrector(CorrectorLevel::NonOrthogonal, 2));
        assert!(sm.is_final_corrector(CorrectorLevel::Pressure, 2));
        assert!(!sm.is_final_corrector(CorrectorLevel::Pressure, 1));
    }

    #[test]
    fn test_non_orth_runs_n_plus_one() {
        let sm = CorrectorStateMachine::new(&controls(1, 1, 2), true);
        let passes = sm.non_orth_passes();
        assert_eq!(passes.len(), 3);
        assert!(passes[2].is_final);
        assert!(!passes[1].is_final);
    }

    #[test]
    fn test_steady_pressure_cap_is_one() {
        let sm = CorrectorStateMachine::new(&controls(5, 4, 0), false);
        assert_eq!(sm.n_pressure(), 1);
        let passes = sm.pressure_passes();
        assert_eq!(passes.len(), 1);
        assert!(passes[0].is_final);
    }

    #[test]
    fn test_residual_control_terminates_early() {
        let mut c = controls(10, 1, 0);
        c.residual_control.push(ResidualControl::new("p", 1e-3, 0.0));
        let mut sm = CorrectorStateMachine::new(&c, true);
        sm.start_time_step();

        let first = sm.next_outer().unwrap();
        assert_eq!(first.index, 0);
        sm.record_residual("p", 1e-5);

        // 第一次外迭代不检查
        let second = sm.next_outer().unwrap();
        assert!(!second.is_final);
        sm.record_residual("p", 1e-5);
        sm.record_residual("p", 1.0);

        let third = sm.next_outer().unwrap();
        assert!(third.is_final);
        assert!(sm.converged());
        assert!(sm.next_outer().is_none());
        assert_eq!(sm.outer_iterations(), 3);
    }

    #[test]
    fn test_relative_tolerance() {
        let mut c = controls(10, 1, 0);
        c.residual_control.push(ResidualControl::new("U", 0.0, 0.1));
        let mut sm = CorrectorStateMachine::new(&c, true);
        sm.start_time_step();

        sm.next_outer();
        sm.record_residual("U", 1.0);
        sm.next_outer();
        sm.record_residual("U", 0.5);
        let ctx = sm.next_outer().unwrap();
        assert!(!ctx.is_final);
        sm.record_residual("U", 0.05);
        let ctx = sm.next_outer().unwrap();
        assert!(ctx.is_final);
    }

    #[test]
    fn test_unconverged_cap_is_not_an_error() {
        let mut c = controls(2, 1, 0);
        c.residual_control.push(ResidualControl::new("p", 1e-12, 0.0));
        let mut sm = CorrectorStateMachine::new(&c, true);
        sm.start_time_step();
        let mut n = 0;
        while sm.next_outer().is_some() {
            sm.record_residual("p", 1.0);
            n += 1;
        }
        assert_eq!(n, 2);
        assert!(!sm.converged());
    }

    #[test]
    fn test_final_inner_iteration() {
        let mut sm = CorrectorStateMachine::new(&controls(1, 2, 1), true);
        sm.start_time_step();
        sm.next_outer();
        let p = sm.pressure_passes();
        let n = sm.non_orth_passes();
        assert!(!sm.final_inner_iteration(&p[0], &n[1]));
        assert!(!sm.final_inner_iteration(&p[1], &n[0]));
        assert!(sm.final_inner_iteration(&p[1], &n[1]));

        let mut steady = CorrectorStateMachine::new(&controls(1, 1, 0), false);
        steady.start_time_step();
        steady.next_outer();
        let p = steady.pressure_passes();
        let n = steady.non_orth_passes();
        assert!(!steady.final_inner_iteration(&p[0], &n[0]));
    }

    #[test]
    fn test_solution_flags_reset_on_outer() {
        let mut sm = CorrectorStateMachine::new(&controls(2, 1, 0), true);
        sm.register_solution_flag("sediment");
        sm.start_time_step();
        sm.next_outer();
        sm.set_solution_finished("sediment");
        assert!(sm.solution_finished("sediment"));
        sm.next_outer();
        assert!(!sm.solution_finished("sediment"));
        assert!(!sm.solution_finished("unknown"));
    }
}
