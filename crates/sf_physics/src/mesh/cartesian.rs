// crates/sf_physics/src/mesh/cartesian.rs

//! 结构化正交网格构建器
//!
//! 生成 `nx × ny × nz` 的长方体网格。单元数为 1 的方向视为"空"方向，
//! 不生成该方向的边界面（成对面积矢量相互抵消），由此得到一维/二维网格。
//!
//! 补丁命名：`x_min`、`x_max`、`y_min`、`y_max`、`z_min`、`z_max`，
//! 仅生成非空方向的补丁，按此顺序排列。

use glam::DVec3;
use sf_foundation::error::{SfError, SfResult};

use super::poly::{PolyMesh, PolyMeshParts};
use super::Patch;

/// 结构化网格构建器
#[derive(Debug, Clone)]
pub struct CartesianMeshBuilder {
    n: [usize; 3],
    lengths: DVec3,
    origin: DVec3,
}

impl CartesianMeshBuilder {
    /// 创建构建器，默认边长 1
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            n: [nx, ny, nz],
            lengths: DVec3::ONE,
            origin: DVec3::ZERO,
        }
    }

    /// 设置各方向总长度
    pub fn lengths(mut self, lx: f64, ly: f64, lz: f64) -> Self {
        self.lengths = DVec3::new(lx, ly, lz);
        self
    }

    /// 设置原点
    pub fn origin(mut self, origin: DVec3) -> Self {
        self.origin = origin;
        self
    }

    #[inline]
    fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.n[0] * (j + self.n[1] * k)
    }

    /// 构建网格
    pub fn build(self) -> SfResult<PolyMesh> {
        let [nx, ny, nz] = self.n;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(SfError::invalid_input(format!(
                "网格尺寸必须为正: {}x{}x{}",
                nx, ny, nz
            )));
        }
        if self.lengths.min_element() <= 0.0 {
            return Err(SfError::invalid_input("网格边长必须为正"));
        }

        let h = DVec3::new(
            self.lengths.x / nx as f64,
            self.lengths.y / ny as f64,
            self.lengths.z / nz as f64,
        );
        let volume = h.x * h.y * h.z;
        let area = [h.y * h.z, h.x * h.z, h.x * h.y];
        let axes = [DVec3::X, DVec3::Y, DVec3::Z];

        let centre = |i: usize, j: usize, k: usize| -> DVec3 {
            self.origin + DVec3::new(i as f64 + 0.5, j as f64 + 0.5, k as f64 + 0.5) * h
        };

        let n_cells = nx * ny * nz;
        let mut cell_centres = Vec::with_capacity(n_cells);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    cell_centres.push(centre(i, j, k));
                }
            }
        }

        let mut owner = Vec::new();
        let mut neighbour = Vec::new();
        let mut face_centres = Vec::new();
        let mut sf = Vec::new();

        // 内部面：按方向依次生成
        for dir in 0..3 {
            for k in 0..nz {
                for j in 0..ny {
                    for i in 0..nx {
                        let idx = [i, j, k];
                        if idx[dir] + 1 >= self.n[dir] {
                            continue;
                        }
                        let mut nb = idx;
                        nb[dir] += 1;
                        owner.push(self.cell_index(i, j, k));
                        neighbour.push(self.cell_index(nb[0], nb[1], nb[2]));
                        face_centres.push(centre(i, j, k) + axes[dir] * (0.5 * h[dir]));
                        sf.push(axes[dir] * area[dir]);
                    }
                }
            }
        }

        // 边界面：非空方向的两侧
        let mut patches = Vec::new();
        let names = [["x_min", "x_max"], ["y_min", "y_max"], ["z_min", "z_max"]];
        for dir in 0..3 {
            if self.n[dir] == 1 {
                continue;
            }
            for (side, name) in names[dir].iter().enumerate() {
                let start = owner.len();
                let layer = if side == 0 { 0 } else { self.n[dir] - 1 };
                let sign = if side == 0 { -1.0 } else { 1.0 };
                for k in 0..nz {
                    for j in 0..ny {
                        for i in 0..nx {
                            if [i, j, k][dir] != layer {
                                continue;
                            }
                            owner.push(self.cell_index(i, j, k));
                            face_centres
                                .push(centre(i, j, k) + axes[dir] * (sign * 0.5 * h[dir]));
                            sf.push(axes[dir] * (sign * area[dir]));
                        }
                    }
                }
                patches.push(Patch::new(*name, start, owner.len() - start));
            }
        }

        PolyMesh::new(PolyMeshParts {
            cell_centres,
            cell_volumes: vec![volume; n_cells],
            owner,
            neighbour,
            face_centres,
            sf,
            patches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::FvMesh;

    #[test]
    fn test_channel_1d() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1)
            .lengths(2.0, 1.0, 1.0)
            .build()
            .unwrap();
        assert_eq!(mesh.n_cells(), 2);
        assert_eq!(mesh.n_internal_faces(), 1);
        assert_eq!(mesh.n_faces(), 3);
        assert_eq!(mesh.patches().len(), 2);
        assert_eq!(mesh.patches()[0].name(), "x_min");
        assert!((mesh.sf()[1].x + 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_box_2d_closed() {
        let mesh = CartesianMeshBuilder::new(2, 2, 1).build().unwrap();
        assert_eq!(mesh.n_cells(), 4);
        assert_eq!(mesh.n_internal_faces(), 4);
        assert_eq!(mesh.n_boundary_faces(), 8);

        // 每个单元的面积矢量之和为零
        let mut sum = vec![DVec3::ZERO; mesh.n_cells()];
        for f in 0..mesh.n_faces() {
            sum[mesh.owner()[f]] += mesh.sf()[f];
            if f < mesh.n_internal_faces() {
                sum[mesh.neighbour()[f]] -= mesh.sf()[f];
            }
        }
        for s in sum {
            assert!(s.length() < 1e-14);
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(CartesianMeshBuilder::new(0, 1, 1).build().is_err());
    }
}
