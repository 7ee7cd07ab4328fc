// crates/sf_physics/src/coupling/cache.rs

//! 修正周期缓存
//!
//! 一次外迭代内各组件之间传递的中间量：松弛后的动量方程、曳力系数、
//! 压力快照 `p0`、每相通量预测、混合 `phiHbyA` 与压力扩散系数、
//! 压力方程的不可压缩部分与各相可压缩部分。
//!
//! 压力修正结束时清空压力相关部分，外迭代结束时全部清空。

use glam::DVec3;

use super::pressure::FluxPredictor;
use crate::error::{CouplingError, CouplingResult};
use crate::numerics::{FvMatrix, FvScalarMatrix};

/// 相 k 与伙伴相 j 的曳力系数 `(j, Kd)`
pub type DragCoefficients = Vec<(usize, Vec<f64>)>;

/// 修正周期缓存
#[derive(Debug, Default)]
pub struct CouplingCache {
    momentum: Vec<Option<FvMatrix<DVec3>>>,
    drag: Vec<DragCoefficients>,
    p0: Option<Vec<f64>>,

    predictors: Vec<Option<FluxPredictor>>,
    phi_hbya: Option<Vec<f64>>,
    diffusivity: Option<Vec<f64>>,
    p_eqn_incomp: Option<FvScalarMatrix>,
    p_eqn_comps: Vec<Option<FvScalarMatrix>>,
}

impl CouplingCache {
    /// 为 `n_phases` 个相创建空缓存
    pub fn new(n_phases: usize) -> Self {
        Self {
            momentum: vec![None; n_phases],
            drag: vec![Vec::new(); n_phases],
            p0: None,
            predictors: vec![None; n_phases],
            phi_hbya: None,
            diffusivity: None,
            p_eqn_incomp: None,
            p_eqn_comps: vec![None; n_phases],
        }
    }

    /// 相数
    pub fn n_phases(&self) -> usize {
        self.momentum.len()
    }

    // ========== 外迭代 ==========

    /// 缓存相 k 松弛后的动量方程与曳力系数
    pub fn set_momentum(&mut self, k: usize, eqn: FvMatrix<DVec3>, drag: DragCoefficients) {
        self.momentum[k] = Some(eqn);
        self.drag[k] = drag;
    }

    /// 相 k 的动量方程
    pub fn momentum(&self, k: usize) -> CouplingResult<&FvMatrix<DVec3>> {
        self.momentum
            .get(k)
            .and_then(Option::as_ref)
            .ok_or(CouplingError::MissingCache("UEqn"))
    }

    /// 相 k 的曳力系数
    pub fn drag(&self, k: usize) -> &[(usize, Vec<f64>)] {
        self.drag.get(k).map_or(&[], |d| d.as_slice())
    }

    /// 设置本次外迭代的压力快照
    pub fn set_p0(&mut self, p0: Vec<f64>) {
        self.p0 = Some(p0);
    }

    /// 压力快照
    pub fn p0(&self) -> CouplingResult<&[f64]> {
        self.p0.as_deref().ok_or(CouplingError::MissingCache("p0"))
    }

    // ========== 压力修正 ==========

    /// 缓存相 k 的通量预测
    pub fn set_predictor(&mut self, k: usize, predictor: FluxPredictor) {
        self.predictors[k] = Some(predictor);
    }

    /// 相 k 的通量预测
    pub fn predictor(&self, k: usize) -> CouplingResult<&FluxPredictor> {
        self.predictors
            .get(k)
            .and_then(Option::as_ref)
            .ok_or(CouplingError::MissingCache("HbyA"))
    }

    /// 缓存混合 `phiHbyA` 与压力扩散系数
    pub fn set_mixture(&mut self, phi_hbya: Vec<f64>, diffusivity: Vec<f64>) {
        self.phi_hbya = Some(phi_hbya);
        self.diffusivity = Some(diffusivity);
    }

    /// 混合 `phiHbyA`
    pub fn phi_hbya(&self) -> CouplingResult<&[f64]> {
        self.phi_hbya.as_deref().ok_or(CouplingError::MissingCache("phiHbyA"))
    }

    /// 压力扩散系数 `D`
    pub fn diffusivity(&self) -> CouplingResult<&[f64]> {
        self.diffusivity
            .as_deref()
            .ok_or(CouplingError::MissingCache("rAUf"))
    }

    /// 缓存压力方程的组成部分
    pub fn set_pressure_parts(&mut self, incomp: FvScalarMatrix, comps: Vec<Option<FvScalarMatrix>>) {
        self.p_eqn_incomp = Some(incomp);
        self.p_eqn_comps = comps;
    }

    /// 压力方程不可压缩部分 `div(phiHbyA) − laplacian(D, p)`
    pub fn p_eqn_incomp(&self) -> CouplingResult<&FvScalarMatrix> {
        self.p_eqn_incomp
            .as_ref()
            .ok_or(CouplingError::MissingCache("pEqnIncomp"))
    }

    /// 相 k 的可压缩部分（不可压缩且无质量传递时为 `None`）
    pub fn p_eqn_comp(&self, k: usize) -> Option<&FvScalarMatrix> {
        self.p_eqn_comps.get(k).and_then(Option::as_ref)
    }

    /// 清空压力修正相关量
    pub fn clear_pressure(&mut self) {
        self.predictors.iter_mut().for_each(|p| *p = None);
        self.phi_hbya = None;
        self.diffusivity = None;
        self.p_eqn_incomp = None;
        self.p_eqn_comps.iter_mut().for_each(|c| *c = None);
    }

    /// 清空全部缓存
    pub fn clear_outer(&mut self) {
        self.clear_pressure();
        self.momentum.iter_mut().for_each(|m| *m = None);
        self.drag.iter_mut().for_each(Vec::clear);
        self.p0 = None;
    }
}
