// crates/sf_physics/src/mesh/poly.rs

//! 通用多面体网格
//!
//! 由单元中心/体积与面连接/几何构造，构造时一次性计算插值权重、
//! 非正交 delta 系数与修正矢量。零面积面（未映射的非一致界面）
//! 的几何量退化为有限值，其通量自然为零。

use glam::DVec3;
use sf_foundation::error::{SfError, SfResult};
use sf_foundation::float::VSMALL;

use super::{FvMesh, Patch};

/// 非正交 delta 系数中 `n·d` 的下限比例
const NON_ORTH_DELTA_LIMIT: f64 = 0.05;

/// 多面体网格
#[derive(Debug, Clone)]
pub struct PolyMesh {
    n_cells: usize,
    n_internal_faces: usize,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    sf: Vec<DVec3>,
    mag_sf: Vec<f64>,
    cell_volumes: Vec<f64>,
    cell_centres: Vec<DVec3>,
    face_centres: Vec<DVec3>,
    weights: Vec<f64>,
    delta_coeffs: Vec<f64>,
    corr_vecs: Vec<DVec3>,
    patches: Vec<Patch>,
}

/// 构造 `PolyMesh` 所需的原始数据
#[derive(Debug, Clone, Default)]
pub struct PolyMeshParts {
    /// 单元中心
    pub cell_centres: Vec<DVec3>,
    /// 单元体积
    pub cell_volumes: Vec<f64>,
    /// 面 owner（全部面）
    pub owner: Vec<usize>,
    /// 面 neighbour（仅内部面）
    pub neighbour: Vec<usize>,
    /// 面中心（全部面）
    pub face_centres: Vec<DVec3>,
    /// 面积矢量（全部面）
    pub sf: Vec<DVec3>,
    /// 边界补丁
    pub patches: Vec<Patch>,
}

impl PolyMesh {
    /// 从原始数据构造并计算派生几何量
    pub fn new(parts: PolyMeshParts) -> SfResult<Self> {
        let PolyMeshParts {
            cell_centres,
            cell_volumes,
            owner,
            neighbour,
            face_centres,
            sf,
            patches,
        } = parts;

        let n_cells = cell_centres.len();
        let n_faces = owner.len();
        let n_internal_faces = neighbour.len();

        if n_cells == 0 {
            return Err(SfError::invalid_mesh("网格没有单元"));
        }
        SfError::check_size("cell_volumes", n_cells, cell_volumes.len())?;
        SfError::check_size("face_centres", n_faces, face_centres.len())?;
        SfError::check_size("sf", n_faces, sf.len())?;
        if n_internal_faces > n_faces {
            return Err(SfError::invalid_mesh("内部面数超过总面数"));
        }
        for &c in owner.iter().chain(neighbour.iter()) {
            SfError::check_index("单元", c, n_cells)?;
        }
        if let Some(c) = cell_volumes.iter().position(|&v| !(v > 0.0)) {
            return Err(SfError::invalid_mesh(format!("单元 {} 体积非正", c)));
        }

        // 补丁必须连续覆盖全部边界面
        let mut next = n_internal_faces;
        for patch in &patches {
            if patch.start() != next {
                return Err(SfError::invalid_mesh(format!(
                    "补丁 '{}' 起始面 {} 不连续（期望 {}）",
                    patch.name(),
                    patch.start(),
                    next
                )));
            }
            next += patch.size();
        }
        if next != n_faces {
            return Err(SfError::invalid_mesh(format!(
                "补丁覆盖到面 {}，总面数为 {}",
                next, n_faces
            )));
        }

        let mag_sf: Vec<f64> = sf.iter().map(|s| s.length()).collect();
        let mut weights = vec![1.0; n_faces];
        let mut delta_coeffs = vec![0.0; n_faces];
        let mut corr_vecs = vec![DVec3::ZERO; n_faces];

        for f in 0..n_faces {
            let co = cell_centres[owner[f]];
            let cf = face_centres[f];
            let d = if f < n_internal_faces {
                cell_centres[neighbour[f]] - co
            } else {
                cf - co
            };
            let n = if mag_sf[f] > VSMALL {
                sf[f] / mag_sf[f]
            } else {
                d.normalize_or_zero()
            };

            let nd = n.dot(d).max(NON_ORTH_DELTA_LIMIT * d.length());
            delta_coeffs[f] = if nd > VSMALL { 1.0 / nd } else { 0.0 };

            if f < n_internal_faces {
                let so = n.dot(cf - co).abs();
                let sn = n.dot(cell_centres[neighbour[f]] - cf).abs();
                weights[f] = if so + sn > VSMALL { sn / (so + sn) } else { 0.5 };
                corr_vecs[f] = n - d * delta_coeffs[f];
            }
        }

        Ok(Self {
            n_cells,
            n_internal_faces,
            owner,
            neighbour,
            sf,
            mag_sf,
            cell_volumes,
            cell_centres,
            face_centres,
            weights,
            delta_coeffs,
            corr_vecs,
            patches,
        })
    }

    /// 总体积
    pub fn total_volume(&self) -> f64 {
        self.cell_volumes.iter().sum()
    }
}

impl FvMesh for PolyMesh {
    #[inline]
    fn n_cells(&self) -> usize {
        self.n_cells
    }

    #[inline]
    fn n_internal_faces(&self) -> usize {
        self.n_internal_faces
    }

    #[inline]
    fn n_faces(&self) -> usize {
        self.owner.len()
    }

    fn owner(&self) -> &[usize] {
        &self.owner
    }

    fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    fn sf(&self) -> &[DVec3] {
        &self.sf
    }

    fn mag_sf(&self) -> &[f64] {
        &self.mag_sf
    }

    fn cell_volumes(&self) -> &[f64] {
        &self.cell_volumes
    }

    fn cell_centres(&self) -> &[DVec3] {
        &self.cell_centres
    }

    fn face_centres(&self) -> &[DVec3] {
        &self.face_centres
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn delta_coeffs(&self) -> &[f64] {
        &self.delta_coeffs
    }

    fn corr_vecs(&self) -> &[DVec3] {
        &self.corr_vecs
    }

    fn patches(&self) -> &[Patch] {
        &self.patches
    }
}
