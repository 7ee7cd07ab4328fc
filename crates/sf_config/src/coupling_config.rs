// crates/sf_config/src/coupling_config.rs

//! CouplingConfig - 压力-速度耦合引擎顶层配置
//!
//! 所有参数在求解器构造时验证一次；运行过程中不再检查。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::controls::CorrectorControls;
use crate::error::ConfigError;
use crate::linear_solver::LinearSolverSettings;

/// 耦合算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// 稳态 SIMPLE
    Simple,
    /// 瞬态 PIMPLE（`n_outer_correctors == 1` 时即 PISO）
    #[default]
    Pimple,
}

impl Algorithm {
    /// 是否瞬态
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Pimple)
    }
}

/// 流动模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowModel {
    /// 单相（可压缩性由物性决定）
    #[default]
    SinglePhase,
    /// 欧拉多相
    Multiphase,
}

/// 压力求解后的速度修正方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VelocityCorrection {
    /// 显式重构 `U = HbyA + reconstruct(...)`
    #[default]
    Reconstruct,
    /// 以重构压力梯度为源项隐式求解缓存的动量方程
    Implicit,
}

/// 松弛因子
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaxationFactors {
    /// 动量方程隐式松弛
    #[serde(default = "default_one")]
    pub u_eqn: f64,
    /// 压力场松弛
    #[serde(default = "default_one")]
    pub p: f64,
    /// 密度场松弛
    #[serde(default = "default_one")]
    pub rho: f64,
    /// 压力方程松弛（仅跨音速）
    #[serde(default = "default_one")]
    pub p_eqn: f64,
}

fn default_one() -> f64 { 1.0 }

impl Default for RelaxationFactors {
    fn default() -> Self {
        Self {
            u_eqn: 1.0,
            p: 1.0,
            rho: 1.0,
            p_eqn: 1.0,
        }
    }
}

impl RelaxationFactors {
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("relaxation.u_eqn", self.u_eqn),
            ("relaxation.p", self.p),
            ("relaxation.rho", self.rho),
            ("relaxation.p_eqn", self.p_eqn),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(key, value, "松弛因子必须在 (0, 1] 内"));
            }
        }
        Ok(())
    }
}

/// 参考压力
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PressureReference {
    /// 参考单元（封闭域必需）
    #[serde(default)]
    pub ref_cell: Option<usize>,
    /// 参考值
    #[serde(default)]
    pub ref_value: f64,
}

/// 物理量限幅
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalLimits {
    /// 密度下限（仅稳态）
    #[serde(default)]
    pub rho_min: f64,
    /// 密度上限（仅稳态）
    #[serde(default = "default_rho_max")]
    pub rho_max: f64,
    /// 压力下限
    #[serde(default)]
    pub p_min: Option<f64>,
    /// 压力上限
    #[serde(default)]
    pub p_max: Option<f64>,
}

fn default_rho_max() -> f64 { sf_foundation::float::GREAT }

impl Default for PhysicalLimits {
    fn default() -> Self {
        Self {
            rho_min: 0.0,
            rho_max: default_rho_max(),
            p_min: None,
            p_max: None,
        }
    }
}

/// 耦合引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// 算法
    #[serde(default)]
    pub algorithm: Algorithm,

    /// 流动模型
    #[serde(default)]
    pub flow_model: FlowModel,

    /// 修正循环控制
    #[serde(default)]
    pub controls: CorrectorControls,

    /// 松弛因子
    #[serde(default)]
    pub relaxation: RelaxationFactors,

    /// 参考压力
    #[serde(default)]
    pub reference: PressureReference,

    /// 限幅
    #[serde(default)]
    pub limits: PhysicalLimits,

    /// 线性求解器
    #[serde(default)]
    pub solvers: LinearSolverSettings,

    /// 跨音速格式
    #[serde(default)]
    pub transonic: bool,

    /// 速度修正方式
    #[serde(default)]
    pub velocity_correction: VelocityCorrection,

    /// 是否加入瞬态通量-速度一致性修正（ddtCorr）
    #[serde(default = "default_true")]
    pub ddt_flux_correction: bool,

    /// 多相 ddtCorr 的体积分数过滤阈值
    #[serde(default = "default_ddt_alpha_threshold")]
    pub ddt_alpha_threshold: f64,

    /// 是否输出连续性误差
    #[serde(default = "default_true")]
    pub print_continuity_errors: bool,

    /// 最大 Courant 数（用于时间步建议）
    #[serde(default = "default_max_courant")]
    pub max_courant: f64,
}

fn default_true() -> bool { true }
fn default_ddt_alpha_threshold() -> f64 { 0.99 }
fn default_max_courant() -> f64 { 1.0 }

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            flow_model: FlowModel::default(),
            controls: CorrectorControls::default(),
            relaxation: RelaxationFactors::default(),
            reference: PressureReference::default(),
            limits: PhysicalLimits::default(),
            solvers: LinearSolverSettings::default(),
            transonic: false,
            velocity_correction: VelocityCorrection::default(),
            ddt_flux_correction: true,
            ddt_alpha_threshold: default_ddt_alpha_threshold(),
            print_continuity_errors: true,
            max_courant: default_max_courant(),
        }
    }
}

impl CouplingConfig {
    /// 稳态 SIMPLE 预设（欠松弛 U 0.7 / p 0.3）
    pub fn simple() -> Self {
        Self {
            algorithm: Algorithm::Simple,
            controls: CorrectorControls {
                n_correctors: 1,
                ..Default::default()
            },
            relaxation: RelaxationFactors {
                u_eqn: 0.7,
                p: 0.3,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// 瞬态 PISO 预设
    pub fn piso(n_correctors: usize) -> Self {
        Self {
            algorithm: Algorithm::Pimple,
            controls: CorrectorControls {
                n_outer_correctors: 1,
                n_correctors,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// 瞬态 PIMPLE 预设
    pub fn pimple(n_outer_correctors: usize, n_correctors: usize) -> Self {
        Self {
            algorithm: Algorithm::Pimple,
            controls: CorrectorControls {
                n_outer_correctors,
                n_correctors,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// 是否瞬态
    pub fn is_transient(&self) -> bool {
        self.algorithm.is_transient()
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串解析并验证
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: CouplingConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controls.validate()?;
        self.relaxation.validate()?;
        self.solvers.validate()?;

        if self.limits.rho_min < 0.0 || self.limits.rho_min > self.limits.rho_max {
            return Err(ConfigError::invalid(
                "limits.rho_min",
                format!("[{}, {}]", self.limits.rho_min, self.limits.rho_max),
                "密度限幅区间无效",
            ));
        }
        if let (Some(lo), Some(hi)) = (self.limits.p_min, self.limits.p_max) {
            if lo > hi {
                return Err(ConfigError::invalid(
                    "limits.p_min",
                    format!("[{}, {}]", lo, hi),
                    "压力限幅区间无效",
                ));
            }
        }
        if !(self.ddt_alpha_threshold > 0.0 && self.ddt_alpha_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "ddt_alpha_threshold",
                self.ddt_alpha_threshold,
                "必须在 (0, 1] 内",
            ));
        }
        if self.max_courant <= 0.0 {
            return Err(ConfigError::invalid("max_courant", self.max_courant, "必须为正"));
        }
        if self.flow_model == FlowModel::Multiphase && !self.is_transient() {
            return Err(ConfigError::Incompatible(
                "多相耦合只支持瞬态 PIMPLE 算法".into(),
            ));
        }
        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CouplingConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_transient());
        assert_eq!(config.controls.n_correctors, 2);
    }

    #[test]
    fn test_presets_valid() {
        assert!(CouplingConfig::simple().validate().is_ok());
        assert!(CouplingConfig::piso(3).validate().is_ok());
        assert!(CouplingConfig::pimple(5, 2).validate().is_ok());
        assert!(!CouplingConfig::simple().is_transient());
    }

    #[test]
    fn test_invalid_relaxation() {
        let mut config = CouplingConfig::default();
        config.relaxation.p = 0.0;
        assert!(config.validate().is_err());
        config.relaxation.p = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rho_limits() {
        let mut config = CouplingConfig::simple();
        config.limits.rho_min = 2.0;
        config.limits.rho_max = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiphase_requires_transient() {
        let mut config = CouplingConfig::simple();
        config.flow_model = FlowModel::Multiphase;
        assert!(matches!(config.validate(), Err(ConfigError::Incompatible(_))));
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut config = CouplingConfig::pimple(3, 2);
        config.reference.ref_cell = Some(4);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CouplingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.controls.n_outer_correctors, 3);
        assert_eq!(parsed.reference.ref_cell, Some(4));
    }

    #[test]
    fn test_from_json_partial() {
        let config = CouplingConfig::from_json(
            r#"{"algorithm": "simple", "relaxation": {"u_eqn": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, Algorithm::Simple);
        assert_eq!(config.relaxation.u_eqn, 0.5);
        assert_eq!(config.relaxation.p, 1.0);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        let result = CouplingConfig::from_json(r#"{"controls": {"n_correctors": 0}}"#);
        assert!(result.is_err());
    }
}
