// crates/sf_physics/src/services/thermo.rs

//! 热物性服务
//!
//! 耦合引擎需要的只是密度 ρ、旧时间层密度与可压缩性 `ψ = ∂ρ/∂p`：
//!
//! - [`ConstantDensity`]: 不可压缩，ψ = 0
//! - [`PerfectGas`]: 等温理想气体 `ρ = p/(R·T)`，ψ = 1/(R·T)

use sf_foundation::error::{SfError, SfResult};

use crate::fields::VolScalarField;
use crate::mesh::FvMesh;

/// 热物性模型
pub trait ThermoModel: Send + Sync {
    /// 模型名称
    fn name(&self) -> &'static str;

    /// 是否不可压缩
    fn incompressible(&self) -> bool;

    /// 当前密度场
    fn rho(&self) -> &VolScalarField;

    /// 可变密度场
    fn rho_mut(&mut self) -> &mut VolScalarField;

    /// 旧时间层密度
    fn rho_old(&self) -> &[f64] {
        self.rho().old_internal()
    }

    /// 可压缩性 ψ
    fn psi(&self) -> &[f64];

    /// 按压力更新物性（ψ）
    fn correct(&mut self, p: &VolScalarField);

    /// 密度增量修正 `ρ += δρ`
    fn correct_rho(&mut self, delta: &[f64], mesh: &dyn FvMesh) {
        let rho = self.rho_mut();
        for (r, &d) in rho.internal_mut().iter_mut().zip(delta) {
            *r += d;
        }
        rho.correct_boundary_conditions(mesh);
    }

    /// 保存旧时间层
    fn store_old_time(&mut self) {
        self.rho_mut().store_old_time();
    }
}

/// 常密度
#[derive(Debug, Clone)]
pub struct ConstantDensity {
    rho: VolScalarField,
    psi: Vec<f64>,
}

impl ConstantDensity {
    /// 创建均匀常密度
    pub fn new(mesh: &dyn FvMesh, rho: f64) -> SfResult<Self> {
        if !(rho > 0.0) {
            return Err(SfError::config(format!("密度必须为正: {}", rho)));
        }
        Ok(Self {
            rho: VolScalarField::calculated("rho", mesh, vec![rho; mesh.n_cells()])?,
            psi: vec![0.0; mesh.n_cells()],
        })
    }
}

impl ThermoModel for ConstantDensity {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn incompressible(&self) -> bool {
        true
    }

    fn rho(&self) -> &VolScalarField {
        &self.rho
    }

    fn rho_mut(&mut self) -> &mut VolScalarField {
        &mut self.rho
    }

    fn psi(&self) -> &[f64] {
        &self.psi
    }

    fn correct(&mut self, _p: &VolScalarField) {}
}

/// 等温理想气体
#[derive(Debug, Clone)]
pub struct PerfectGas {
    r_gas: f64,
    temperature: Vec<f64>,
    psi: Vec<f64>,
    rho: VolScalarField,
}

impl PerfectGas {
    /// 由气体常数、温度与初始压力创建
    pub fn new(mesh: &dyn FvMesh, r_gas: f64, temperature: f64, p: &VolScalarField) -> SfResult<Self> {
        if !(r_gas > 0.0) || !(temperature > 0.0) {
            return Err(SfError::config(format!(
                "气体常数与温度必须为正: R={}, T={}",
                r_gas, temperature
            )));
        }
        let temperature = vec![temperature; mesh.n_cells()];
        let psi: Vec<f64> = temperature.iter().map(|t| 1.0 / (r_gas * t)).collect();
        let rho = p.internal().iter().zip(&psi).map(|(p, s)| p * s).collect();
        Ok(Self {
            r_gas,
            temperature,
            psi,
            rho: VolScalarField::calculated("rho", mesh, rho)?,
        })
    }
}

impl ThermoModel for PerfectGas {
    fn name(&self) -> &'static str {
        "perfectGas"
    }

    fn incompressible(&self) -> bool {
        false
    }

    fn rho(&self) -> &VolScalarField {
        &self.rho
    }

    fn rho_mut(&mut self) -> &mut VolScalarField {
        &mut self.rho
    }

    fn psi(&self) -> &[f64] {
        &self.psi
    }

    fn correct(&mut self, _p: &VolScalarField) {
        for (psi, t) in self.psi.iter_mut().zip(&self.temperature) {
            *psi = 1.0 / (self.r_gas * t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CartesianMeshBuilder;

    #[test]
    fn test_constant_density() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let thermo = ConstantDensity::new(&mesh, 1000.0).unwrap();
        assert!(thermo.incompressible());
        assert_eq!(thermo.rho().internal(), &[1000.0, 1000.0]);
        assert_eq!(thermo.psi(), &[0.0, 0.0]);
        assert!(ConstantDensity::new(&mesh, 0.0).is_err());
    }

    #[test]
    fn test_perfect_gas_density() {
        let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
        let p = VolScalarField::calculated("p", &mesh, vec![1e5, 2e5]).unwrap();
        let mut thermo = PerfectGas::new(&mesh, 287.0, 300.0, &p).unwrap();
        let psi = 1.0 / (287.0 * 300.0);
        assert!((thermo.rho().internal()[1] - 2e5 * psi).abs() < 1e-12);

        thermo.store_old_time();
        thermo.correct_rho(&[0.5, 0.0], &mesh);
        assert!((thermo.rho().internal()[0] - 1e5 * psi - 0.5).abs() < 1e-12);
        assert!((thermo.rho_old()[0] - 1e5 * psi).abs() < 1e-12);
    }
}
