// crates/sf_physics/src/mesh/mod.rs

//! 有限体积网格抽象
//!
//! 耦合引擎只通过 [`FvMesh`] 读取几何量；网格在一个耦合周期内不可变。
//!
//! # 约定
//!
//! - 面按"内部面在前、边界面在后"排列，边界面按补丁连续分组
//! - 面积矢量 `Sf` 从 owner 指向 neighbour，边界面指向域外
//! - 所有按面存储的量长度为 `n_faces`，边界面的 neighbour 不存在
//!
//! # 子模块
//!
//! - [`poly`]: 通用多面体网格 `PolyMesh`
//! - [`cartesian`]: 结构化正交网格构建器

pub mod cartesian;
pub mod poly;

use glam::DVec3;
use std::ops::Range;

pub use cartesian::CartesianMeshBuilder;
pub use poly::PolyMesh;

/// 边界补丁
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    name: String,
    start: usize,
    size: usize,
}

impl Patch {
    /// 创建补丁（`start` 为全局面编号）
    pub fn new(name: impl Into<String>, start: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            start,
            size,
        }
    }

    /// 补丁名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 第一个面的全局编号
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// 面数
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// 全局面编号范围
    #[inline]
    pub fn faces(&self) -> Range<usize> {
        self.start..self.start + self.size
    }
}

/// 有限体积网格接口
pub trait FvMesh: Send + Sync {
    /// 单元数
    fn n_cells(&self) -> usize;

    /// 内部面数
    fn n_internal_faces(&self) -> usize;

    /// 总面数
    fn n_faces(&self) -> usize;

    /// 边界面数
    #[inline]
    fn n_boundary_faces(&self) -> usize {
        self.n_faces() - self.n_internal_faces()
    }

    /// 每个面的 owner 单元
    fn owner(&self) -> &[usize];

    /// 每个内部面的 neighbour 单元
    fn neighbour(&self) -> &[usize];

    /// 面积矢量
    fn sf(&self) -> &[DVec3];

    /// 面积
    fn mag_sf(&self) -> &[f64];

    /// 单元体积
    fn cell_volumes(&self) -> &[f64];

    /// 单元中心
    fn cell_centres(&self) -> &[DVec3];

    /// 面中心
    fn face_centres(&self) -> &[DVec3];

    /// 线性插值权重（owner 侧），边界面为 1
    fn weights(&self) -> &[f64];

    /// 非正交 delta 系数 `1/max(n·d, 0.05|d|)`
    fn delta_coeffs(&self) -> &[f64];

    /// 非正交修正矢量 `n - d·delta`，边界面为零
    fn corr_vecs(&self) -> &[DVec3];

    /// 边界补丁
    fn patches(&self) -> &[Patch];

    /// 网格是否正交（无需非正交修正）
    fn is_orthogonal(&self) -> bool {
        self.corr_vecs().iter().all(|k| k.length_squared() < 1e-24)
    }

    /// 按名称查找补丁
    fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches().iter().position(|p| p.name() == name)
    }

    /// 边界面局部编号（相对第一个边界面）
    #[inline]
    fn boundary_index(&self, face: usize) -> usize {
        face - self.n_internal_faces()
    }
}
