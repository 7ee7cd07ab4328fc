// crates/sf_physics/tests/multiphase.rs

//! 多相耦合测试
//! 单相退化、两相混合通量守恒与可压缩两相

use glam::DVec3;
use sf_config::{CouplingConfig, FlowModel};
use sf_physics::coupling::Formulation;
use sf_physics::numerics::fvc;
use sf_physics::prelude::*;
use sf_physics::PolyMesh;

fn channel_mesh() -> PolyMesh {
    CartesianMeshBuilder::new(3, 1, 1).lengths(3.0, 1.0, 1.0).build().unwrap()
}

fn pressure(mesh: &dyn FvMesh, outlet: f64) -> VolScalarField {
    VolScalarField::uniform(
        "p",
        mesh,
        outlet,
        vec![BoundaryCondition::ZeroGradient, BoundaryCondition::fixed_value(1, outlet)],
    )
    .unwrap()
}

fn velocity(mesh: &dyn FvMesh, inlet: DVec3) -> VolVectorField {
    VolVectorField::uniform(
        "U",
        mesh,
        DVec3::ZERO,
        vec![BoundaryCondition::fixed_value(1, inlet), BoundaryCondition::ZeroGradient],
    )
    .unwrap()
}

fn dense_phase(mesh: &dyn FvMesh, name: &str, inlet: DVec3, rho: f64) -> Phase {
    Phase::new(
        name,
        mesh,
        velocity(mesh, inlet),
        Box::new(ConstantDensity::new(mesh, rho).unwrap()),
        Box::new(LaminarStress::new(0.01)),
    )
    .unwrap()
}

fn phase(mesh: &dyn FvMesh, name: &str, inlet: DVec3) -> Phase {
    dense_phase(mesh, name, inlet, 1.0)
}

fn base_config() -> CouplingConfig {
    let mut config = CouplingConfig::piso(2);
    config.controls.consistent = false;
    config
}

/// 同一配置下分别以单相与 α ≡ 1 的多相系统推进三步
fn single_and_multi(config: CouplingConfig, rho: f64) -> (SegregatedFlowSolver<PolyMesh>, SegregatedFlowSolver<PolyMesh>) {
    let mesh = channel_mesh();
    let single_fields =
        FlowFields::single_phase(&mesh, pressure(&mesh, 0.0), dense_phase(&mesh, "fluid", DVec3::X, rho)).unwrap();
    let mut single = SegregatedFlowSolver::new(mesh, config.clone(), single_fields, FlowServices::default()).unwrap();

    let mesh = channel_mesh();
    let multi_fields =
        FlowFields::multiphase(&mesh, pressure(&mesh, 0.0), vec![dense_phase(&mesh, "fluid", DVec3::X, rho)]).unwrap();
    let mut config = config;
    config.flow_model = FlowModel::Multiphase;
    let mut multi = SegregatedFlowSolver::new(mesh, config, multi_fields, FlowServices::default()).unwrap();
    assert_eq!(multi.strategy_name(), "multiphaseEuler");

    for _ in 0..3 {
        single.solve_time_step(0.1).unwrap();
        multi.solve_time_step(0.1).unwrap();
    }
    (single, multi)
}

/// 单相的混合通量是质量通量，多相是体积通量
fn assert_reduces(single: &SegregatedFlowSolver<PolyMesh>, multi: &SegregatedFlowSolver<PolyMesh>, rho: f64) {
    let (s, m) = (single.fields(), multi.fields());
    for (a, b) in s.phi.values().iter().zip(m.phi.values()) {
        assert!((a - rho * b).abs() < 1e-9, "通量 {} vs {}", a, rho * b);
    }
    let (ps, pm) = (s.phases.phases()[0].phi(), m.phases.phases()[0].phi());
    for (a, b) in ps.values().iter().zip(pm.values()) {
        assert!((a - b).abs() < 1e-9, "相通量 {} vs {}", a, b);
    }
    for (a, b) in s.p.internal().iter().zip(m.p.internal()) {
        assert!((a - b).abs() < 1e-9, "压力 {} vs {}", a, b);
    }
    let (us, um) = (s.phases.phases()[0].u(), m.phases.phases()[0].u());
    for (a, b) in us.internal().iter().zip(um.internal()) {
        assert!((*a - *b).length() < 1e-9);
    }
}

/// α ≡ 1、ρ = 1 的单相多相系统与单相求解结果一致
#[test]
fn test_single_phase_reduction() {
    let (single, multi) = single_and_multi(base_config(), 1.0);
    assert_reduces(&single, &multi, 1.0);
}

/// 默认 PISO（SIMPLE-C 开启）下同样退化
#[test]
fn test_single_phase_reduction_with_consistent_correction() {
    let config = CouplingConfig::piso(2);
    assert!(config.controls.consistent);
    let (single, multi) = single_and_multi(config, 1.0);
    assert_reduces(&single, &multi, 1.0);
}

/// ρ ≠ 1：压力与速度一致，混合通量相差一个密度因子
#[test]
fn test_dense_single_phase_reduction() {
    let (single, multi) = single_and_multi(CouplingConfig::piso(2), 2.0);
    assert_reduces(&single, &multi, 2.0);
    assert!(single.fields().p.internal()[0] > 0.0);
}

/// 两相带曳力：混合体积通量逐单元守恒
#[test]
fn test_two_phase_mixture_flux_is_conservative() {
    let mesh = channel_mesh();
    let half = VolScalarField::calculated("alpha", &mesh, vec![0.5; 3]).unwrap();
    let phases = vec![
        phase(&mesh, "water", DVec3::X).with_alpha(&mesh, half.clone()).unwrap(),
        phase(&mesh, "air", DVec3::X * 2.0).with_alpha(&mesh, half).unwrap(),
    ];
    let fields = FlowFields::multiphase(&mesh, pressure(&mesh, 0.0), phases).unwrap();

    let mut config = base_config();
    config.flow_model = FlowModel::Multiphase;
    config.controls.momentum_predictor = true;
    let services = FlowServices::default().with_transfer(ConstantDrag::new(10.0));
    let mut solver = SegregatedFlowSolver::new(mesh, config, fields, services).unwrap();

    for _ in 0..2 {
        let report = solver.solve_time_step(0.05).unwrap();
        assert_eq!(report.velocity_solves, 2);
        assert!(report.continuity.unwrap().sum_local < 1e-8);
    }

    let fields = solver.fields();
    for s in fvc::surface_sum(solver.mesh(), fields.phi.values()) {
        assert!(s.abs() < 1e-8);
    }
    // 入口混合通量 = Σ α·U·Sf
    assert!((fields.phi.values()[2] + 1.5).abs() < 1e-10);
    for ph in fields.phases.phases() {
        assert!(ph.div_u().is_none());
        assert_eq!(ph.alpha().internal(), &[0.5, 0.5, 0.5]);
    }
}

/// 可压缩气相与不可压缩液相共享压力
#[test]
fn test_compressible_two_phase_step() {
    let mesh = channel_mesh();
    let p = pressure(&mesh, 1e5);
    let half = VolScalarField::calculated("alpha", &mesh, vec![0.5; 3]).unwrap();
    let gas = Phase::new(
        "air",
        &mesh,
        velocity(&mesh, DVec3::X * 2.0),
        Box::new(PerfectGas::new(&mesh, 287.0, 300.0, &p).unwrap()),
        Box::new(LaminarStress::new(0.01)),
    )
    .unwrap()
    .with_alpha(&mesh, half.clone())
    .unwrap();
    let liquid = phase(&mesh, "water", DVec3::X).with_alpha(&mesh, half).unwrap();
    let fields = FlowFields::multiphase(&mesh, p, vec![gas, liquid]).unwrap();

    let mut config = base_config();
    config.flow_model = FlowModel::Multiphase;
    let services = FlowServices::default().with_transfer(ConstantDrag::new(10.0));
    let mut solver = SegregatedFlowSolver::new(mesh, config, fields, services).unwrap();
    assert_eq!(solver.formulation(), Formulation::Compressible);

    for _ in 0..5 {
        let report = solver.solve_time_step(0.05).unwrap();
        assert_eq!(report.pressure_solves, 2);
        assert!(report.continuity.unwrap().sum_local < 1e-6);
    }

    let fields = solver.fields();
    let (gas, liquid) = (&fields.phases.phases()[0], &fields.phases.phases()[1]);
    let div_u = gas.div_u().expect("气相膨胀率");
    assert_eq!(div_u.len(), 3);
    assert!(div_u.iter().all(|d| d.is_finite()));
    assert!(liquid.div_u().is_none());
    assert!((fields.phi.values()[2] + 1.5).abs() < 1e-10);
    assert!(fields.p.internal().iter().all(|v| (v - 1e5).abs() < 1e3));
}
