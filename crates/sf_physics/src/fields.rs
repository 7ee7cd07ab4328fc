// crates/sf_physics/src/fields.rs

//! 体心场、边界条件与面通量
//!
//! - [`VolField`]: 单元值 + 每个边界面的值 + 每个补丁的边界条件，
//!   可保存旧时间层与上一迭代值（用于松弛）
//! - [`BoundaryCondition`]: 固定值、零梯度、固定梯度、固定通量压力
//! - [`FaceFlux`]: 面通量（体积或质量），可保存旧时间层
//!
//! 边界条件以 OpenFOAM 风格的四个系数暴露给离散算子：
//! 值的内部/边界系数（对流项）与梯度的内部/边界系数（扩散项）。

use glam::DVec3;
use sf_foundation::error::{SfError, SfResult};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::mesh::FvMesh;

/// 场值类型（标量或三维矢量）
pub trait FieldValue:
    Copy
    + Debug
    + Default
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
    + AddAssign
    + SubAssign
    + Send
    + Sync
    + 'static
{
    /// 零值
    const ZERO: Self;
    /// 分量数
    const N_COMPONENTS: usize;

    /// 模
    fn mag(self) -> f64;
    /// 取分量
    fn component(self, i: usize) -> f64;
    /// 设置分量
    fn set_component(&mut self, i: usize, value: f64);
}

impl FieldValue for f64 {
    const ZERO: Self = 0.0;
    const N_COMPONENTS: usize = 1;

    #[inline]
    fn mag(self) -> f64 {
        self.abs()
    }

    #[inline]
    fn component(self, _i: usize) -> f64 {
        self
    }

    #[inline]
    fn set_component(&mut self, _i: usize, value: f64) {
        *self = value;
    }
}

impl FieldValue for DVec3 {
    const ZERO: Self = DVec3::ZERO;
    const N_COMPONENTS: usize = 3;

    #[inline]
    fn mag(self) -> f64 {
        self.length()
    }

    #[inline]
    fn component(self, i: usize) -> f64 {
        self[i]
    }

    #[inline]
    fn set_component(&mut self, i: usize, value: f64) {
        self[i] = value;
    }
}

/// 补丁边界条件
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryCondition<T> {
    /// 固定值（每个面一个值）
    FixedValue(Vec<T>),
    /// 零法向梯度
    ZeroGradient,
    /// 固定法向梯度
    FixedGradient(Vec<T>),
    /// 固定通量压力：梯度由耦合引擎按通量一致性更新
    FixedFluxPressure(Vec<T>),
}

impl<T: FieldValue> BoundaryCondition<T> {
    /// 均匀固定值
    pub fn fixed_value(n_faces: usize, value: T) -> Self {
        Self::FixedValue(vec![value; n_faces])
    }

    /// 均匀固定梯度
    pub fn fixed_gradient(n_faces: usize, gradient: T) -> Self {
        Self::FixedGradient(vec![gradient; n_faces])
    }

    /// 固定通量压力（初始梯度为零）
    pub fn fixed_flux_pressure(n_faces: usize) -> Self {
        Self::FixedFluxPressure(vec![T::ZERO; n_faces])
    }

    /// 条件类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FixedValue(_) => "fixedValue",
            Self::ZeroGradient => "zeroGradient",
            Self::FixedGradient(_) => "fixedGradient",
            Self::FixedFluxPressure(_) => "fixedFluxPressure",
        }
    }

    /// 是否固定值
    #[inline]
    pub fn fixes_value(&self) -> bool {
        matches!(self, Self::FixedValue(_))
    }

    /// 边界值是否可由内部解覆盖
    #[inline]
    pub fn assignable(&self) -> bool {
        !self.fixes_value()
    }

    /// 按面存储的数据长度（零梯度无数据）
    fn data_len(&self) -> Option<usize> {
        match self {
            Self::FixedValue(v) | Self::FixedGradient(v) | Self::FixedFluxPressure(v) => {
                Some(v.len())
            }
            Self::ZeroGradient => None,
        }
    }

    /// 值的内部系数
    #[inline]
    pub fn value_internal_coeff(&self) -> f64 {
        if self.fixes_value() {
            0.0
        } else {
            1.0
        }
    }

    /// 值的边界系数
    #[inline]
    pub fn value_boundary_coeff(&self, i: usize, delta: f64) -> T {
        match self {
            Self::FixedValue(v) => v[i],
            Self::ZeroGradient => T::ZERO,
            Self::FixedGradient(g) | Self::FixedFluxPressure(g) => {
                if delta > 0.0 {
                    g[i] * (1.0 / delta)
                } else {
                    T::ZERO
                }
            }
        }
    }

    /// 梯度的内部系数
    #[inline]
    pub fn gradient_internal_coeff(&self, delta: f64) -> f64 {
        if self.fixes_value() {
            -delta
        } else {
            0.0
        }
    }

    /// 梯度的边界系数
    #[inline]
    pub fn gradient_boundary_coeff(&self, i: usize, delta: f64) -> T {
        match self {
            Self::FixedValue(v) => v[i] * delta,
            Self::ZeroGradient => T::ZERO,
            Self::FixedGradient(g) | Self::FixedFluxPressure(g) => g[i],
        }
    }

    /// 由内部值计算边界值
    #[inline]
    pub fn evaluate(&self, i: usize, internal: T, delta: f64) -> T {
        match self {
            Self::FixedValue(v) => v[i],
            Self::ZeroGradient => internal,
            Self::FixedGradient(_) | Self::FixedFluxPressure(_) => {
                internal + self.value_boundary_coeff(i, delta)
            }
        }
    }
}

/// 体心场
#[derive(Debug, Clone)]
pub struct VolField<T: FieldValue> {
    name: String,
    internal: Vec<T>,
    boundary: Vec<T>,
    bcs: Vec<BoundaryCondition<T>>,
    old: Option<(Vec<T>, Vec<T>)>,
    prev_iter: Option<Vec<T>>,
}

/// 标量体心场
pub type VolScalarField = VolField<f64>;
/// 矢量体心场
pub type VolVectorField = VolField<DVec3>;

impl<T: FieldValue> VolField<T> {
    /// 创建场，边界条件按补丁顺序给出
    pub fn new(
        name: impl Into<String>,
        mesh: &dyn FvMesh,
        internal: Vec<T>,
        bcs: Vec<BoundaryCondition<T>>,
    ) -> SfResult<Self> {
        let name = name.into();
        SfError::check_size(&name, mesh.n_cells(), internal.len())?;
        if bcs.len() != mesh.patches().len() {
            return Err(SfError::config(format!(
                "场 '{}' 有 {} 个边界条件，网格有 {} 个补丁",
                name,
                bcs.len(),
                mesh.patches().len()
            )));
        }
        for (patch, bc) in mesh.patches().iter().zip(&bcs) {
            if let Some(len) = bc.data_len() {
                if len != patch.size() {
                    return Err(SfError::config(format!(
                        "场 '{}' 补丁 '{}' 的 {} 数据长度 {} 与面数 {} 不符",
                        name,
                        patch.name(),
                        bc.type_name(),
                        len,
                        patch.size()
                    )));
                }
            }
        }

        let mut field = Self {
            name,
            internal,
            boundary: vec![T::ZERO; mesh.n_boundary_faces()],
            bcs,
            old: None,
            prev_iter: None,
        };
        field.correct_boundary_conditions(mesh);
        Ok(field)
    }

    /// 创建均匀场
    pub fn uniform(
        name: impl Into<String>,
        mesh: &dyn FvMesh,
        value: T,
        bcs: Vec<BoundaryCondition<T>>,
    ) -> SfResult<Self> {
        Self::new(name, mesh, vec![value; mesh.n_cells()], bcs)
    }

    /// 派生场：所有补丁为零梯度
    pub fn calculated(name: impl Into<String>, mesh: &dyn FvMesh, internal: Vec<T>) -> SfResult<Self> {
        let bcs = mesh
            .patches()
            .iter()
            .map(|_| BoundaryCondition::ZeroGradient)
            .collect();
        Self::new(name, mesh, internal, bcs)
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 单元值
    #[inline]
    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// 可变单元值
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// 边界面值（按边界面局部编号）
    #[inline]
    pub fn boundary(&self) -> &[T] {
        &self.boundary
    }

    /// 边界条件
    #[inline]
    pub fn bcs(&self) -> &[BoundaryCondition<T>] {
        &self.bcs
    }

    /// 可变边界条件
    #[inline]
    pub fn bc_mut(&mut self, patch: usize) -> &mut BoundaryCondition<T> {
        &mut self.bcs[patch]
    }

    /// 是否需要参考值（没有任何固定值补丁）
    pub fn needs_reference(&self) -> bool {
        !self.bcs.iter().any(|bc| bc.fixes_value())
    }

    /// 按边界条件更新边界面值
    pub fn correct_boundary_conditions(&mut self, mesh: &dyn FvMesh) {
        let n_internal = mesh.n_internal_faces();
        let owner = mesh.owner();
        let delta = mesh.delta_coeffs();
        for (patch, bc) in mesh.patches().iter().zip(&self.bcs) {
            for (i, f) in patch.faces().enumerate() {
                self.boundary[f - n_internal] = bc.evaluate(i, self.internal[owner[f]], delta[f]);
            }
        }
    }

    /// 保存旧时间层
    pub fn store_old_time(&mut self) {
        self.old = Some((self.internal.clone(), self.boundary.clone()));
    }

    /// 旧时间层单元值（未保存时为当前值）
    pub fn old_internal(&self) -> &[T] {
        self.old.as_ref().map_or(&self.internal, |(i, _)| i)
    }

    /// 旧时间层边界值（未保存时为当前值）
    pub fn old_boundary(&self) -> &[T] {
        self.old.as_ref().map_or(&self.boundary, |(_, b)| b)
    }

    /// 保存上一迭代值
    pub fn store_prev_iter(&mut self) {
        self.prev_iter = Some(self.internal.clone());
    }

    /// 显式松弛 `ψ = ψ_prev + α(ψ − ψ_prev)`，未保存上一迭代值时不做任何事
    pub fn relax(&mut self, alpha: f64) {
        if alpha >= 1.0 {
            return;
        }
        if let Some(prev) = &self.prev_iter {
            for (v, &p) in self.internal.iter_mut().zip(prev) {
                *v = p + (*v - p) * alpha;
            }
        }
    }

    /// 加一个常数到单元值和边界值
    pub fn shift(&mut self, value: T) {
        for v in self.internal.iter_mut().chain(self.boundary.iter_mut()) {
            *v += value;
        }
    }
}

impl VolScalarField {
    /// 把内部值限制在区间内，返回被限制的单元数
    pub fn clamp(&mut self, lower: f64, upper: f64) -> usize {
        let mut count = 0;
        for v in &mut self.internal {
            let c = v.clamp(lower, upper);
            if c != *v {
                *v = c;
                count += 1;
            }
        }
        count
    }
}

/// 面通量
#[derive(Debug, Clone)]
pub struct FaceFlux {
    name: String,
    values: Vec<f64>,
    old: Option<Vec<f64>>,
}

impl FaceFlux {
    /// 创建通量场（长度为总面数）
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            old: None,
        }
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 可变当前值
    #[inline]
    pub fn values_mut(&mut self) -> &mut Vec<f64> {
        &mut self.values
    }

    /// 替换当前值
    pub fn assign(&mut self, values: Vec<f64>) {
        self.values = values;
    }

    /// 保存旧时间层
    pub fn store_old_time(&mut self) {
        self.old = Some(self.values.clone());
    }

    /// 旧时间层（未保存时为当前值）
    pub fn old(&self) -> &[f64] {
        self.old.as_deref().unwrap_or(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CartesianMeshBuilder;

    #[test]
    fn test_bc_coefficients() {
        let fixed = BoundaryCondition::fixed_value(1, 2.0);
        assert_eq!(fixed.value_internal_coeff(), 0.0);
        assert_eq!(fixed.value_boundary_coeff(0, 4.0), 2.0);
        assert_eq!(fixed.gradient_internal_coeff(4.0), -4.0);
        assert_eq!(fixed.gradient_boundary_coeff(0, 4.0), 8.0);

        let zg = BoundaryCondition::<f64>::ZeroGradient;
        assert_eq!(zg.value_internal_coeff(), 1.0);
        assert_eq!(zg.evaluate(0, 3.0, 2.0), 3.0);

        let grad = BoundaryCondition::fixed_gradient(1, 1.0);
        assert_eq!(grad.evaluate(0, 3.0, 2.0), 3.5);
    }

    #[test]
    fn test_field_boundary_and_reference() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let p = VolScalarField::uniform(
            "p",
            &mesh,
            1.0,
            vec![BoundaryCondition::ZeroGradient, BoundaryCondition::fixed_value(1, 0.0)],
        )
        .unwrap();
        assert!(!p.needs_reference());
        assert_eq!(p.boundary(), &[1.0, 0.0]);

        let closed = VolScalarField::uniform(
            "p",
            &mesh,
            1.0,
            vec![BoundaryCondition::ZeroGradient, BoundaryCondition::ZeroGradient],
        )
        .unwrap();
        assert!(closed.needs_reference());
    }

    #[test]
    fn test_bc_count_mismatch() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let result = VolScalarField::uniform("p", &mesh, 0.0, vec![BoundaryCondition::ZeroGradient]);
        assert!(result.is_err());
    }

    #[test]
    fn test_relax() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let mut p = VolScalarField::uniform(
            "p",
            &mesh,
            0.0,
            vec![BoundaryCondition::ZeroGradient, BoundaryCondition::ZeroGradient],
        )
        .unwrap();
        p.store_prev_iter();
        p.internal_mut().copy_from_slice(&[10.0, 20.0]);
        p.relax(0.3);
        assert!((p.internal()[0] - 3.0).abs() < 1e-12);
        assert!((p.internal()[1] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_old_time_fallback() {
        let mut phi = FaceFlux::new("phi", vec![1.0, 2.0]);
        assert_eq!(phi.old(), &[1.0, 2.0]);
        phi.store_old_time();
        phi.values_mut()[0] = 5.0;
        assert_eq!(phi.old()[0], 1.0);
    }
}
