// crates/sf_config/src/controls.rs

//! 修正循环控制参数
//!
//! 对应外层（outer）、内层压力（PISO）与非正交三级嵌套修正循环。

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 修正循环控制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectorControls {
    /// 外层修正次数上限（SIMPLE/PIMPLE 外迭代）
    #[serde(default = "default_n_outer")]
    pub n_outer_correctors: usize,

    /// 内层压力修正次数上限（PISO）
    #[serde(default = "default_n_correctors")]
    pub n_correctors: usize,

    /// 非正交修正次数（0 表示只求解一次）
    #[serde(default)]
    pub n_non_orth_correctors: usize,

    /// 是否求解动量预测步
    #[serde(default)]
    pub momentum_predictor: bool,

    /// 是否使用 SIMPLE-C 一致性修正
    #[serde(default = "default_consistent")]
    pub consistent: bool,

    /// SIMPLE-C 中 H1 相对 A 的上限比例（H1 <= h1_clamp·A）
    #[serde(default = "default_h1_clamp")]
    pub h1_clamp: f64,

    /// 外层循环残差控制
    #[serde(default)]
    pub residual_control: Vec<ResidualControl>,
}

fn default_n_outer() -> usize { 1 }
fn default_n_correctors() -> usize { 2 }
fn default_consistent() -> bool { true }
fn default_h1_clamp() -> f64 { 0.99 }

impl Default for CorrectorControls {
    fn default() -> Self {
        Self {
            n_outer_correctors: default_n_outer(),
            n_correctors: default_n_correctors(),
            n_non_orth_correctors: 0,
            momentum_predictor: false,
            consistent: default_consistent(),
            h1_clamp: default_h1_clamp(),
            residual_control: Vec::new(),
        }
    }
}

impl CorrectorControls {
    /// 验证控制参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_outer_correctors == 0 {
            return Err(ConfigError::invalid(
                "controls.n_outer_correctors",
                self.n_outer_correctors,
                "外层修正次数必须至少为 1",
            ));
        }
        if self.n_correctors == 0 {
            return Err(ConfigError::invalid(
                "controls.n_correctors",
                self.n_correctors,
                "压力修正次数必须至少为 1",
            ));
        }
        if !(self.h1_clamp > 0.0 && self.h1_clamp < 1.0) {
            return Err(ConfigError::invalid(
                "controls.h1_clamp",
                self.h1_clamp,
                "H1 限幅比例必须在 (0, 1) 内",
            ));
        }
        for rc in &self.residual_control {
            rc.validate()?;
        }
        Ok(())
    }
}

/// 单个场的残差控制
///
/// 外层迭代中该场第一次线性求解的初始残差满足
/// `r < tolerance` 或 `r / r_first < rel_tol` 时视为收敛。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResidualControl {
    /// 场名（如 `U`、`p`）
    pub field: String,
    /// 绝对容差
    #[serde(default)]
    pub tolerance: f64,
    /// 相对容差（相对本时间步第一次外迭代）
    #[serde(default)]
    pub rel_tol: f64,
}

impl ResidualControl {
    /// 创建残差控制
    pub fn new(field: impl Into<String>, tolerance: f64, rel_tol: f64) -> Self {
        Self {
            field: field.into(),
            tolerance,
            rel_tol,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.field.is_empty() {
            return Err(ConfigError::Missing("controls.residual_control.field".into()));
        }
        if self.tolerance < 0.0 || self.rel_tol < 0.0 {
            return Err(ConfigError::invalid(
                &format!("controls.residual_control.{}", self.field),
                format!("({}, {})", self.tolerance, self.rel_tol),
                "容差不能为负",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_controls_valid() {
        assert!(CorrectorControls::default().validate().is_ok());
    }

    #[test]
    fn test_h1_clamp_bounds() {
        let mut c = CorrectorControls::default();
        c.h1_clamp = 1.0;
        assert!(c.validate().is_err());
        c.h1_clamp = 0.5;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_negative_residual_tolerance() {
        let mut c = CorrectorControls::default();
        c.residual_control.push(ResidualControl::new("p", -1.0, 0.0));
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let c: CorrectorControls = serde_json::from_str(r#"{"n_correctors": 3}"#).unwrap();
        assert_eq!(c.n_correctors, 3);
        assert_eq!(c.n_outer_correctors, 1);
        assert!(c.consistent);
        assert_eq!(c.h1_clamp, 0.99);
    }
}
