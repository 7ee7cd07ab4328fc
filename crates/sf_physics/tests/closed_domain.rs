// crates/sf_physics/tests/closed_domain.rs

//! 封闭域测试
//! 验证可压缩质量守恒、静水平衡与参考压力不变性

use glam::DVec3;
use sf_config::CouplingConfig;
use sf_physics::prelude::*;
use sf_physics::PolyMesh;

fn walls<T: sf_physics::FieldValue>(mesh: &dyn FvMesh, value: impl Fn(usize) -> BoundaryCondition<T>) -> Vec<BoundaryCondition<T>> {
    mesh.patches().iter().map(|patch| value(patch.size())).collect()
}

fn still_phase(mesh: &dyn FvMesh, thermo: Box<dyn sf_physics::services::ThermoModel>) -> Phase {
    let u = VolVectorField::uniform(
        "U",
        mesh,
        DVec3::ZERO,
        walls(mesh, |n| BoundaryCondition::fixed_value(n, DVec3::ZERO)),
    )
    .unwrap();
    Phase::new("fluid", mesh, u, thermo, Box::new(LaminarStress::new(1e-3))).unwrap()
}

fn compressible_box(config: CouplingConfig) -> SegregatedFlowSolver<PolyMesh> {
    let mesh = CartesianMeshBuilder::new(2, 2, 1).build().unwrap();
    let mut p = VolScalarField::uniform("p", &mesh, 1e5, walls(&mesh, |_| BoundaryCondition::ZeroGradient)).unwrap();
    p.internal_mut().copy_from_slice(&[1.0e5, 1.002e5, 0.999e5, 1.0e5]);
    p.correct_boundary_conditions(&mesh);

    let gas = PerfectGas::new(&mesh, 287.0, 300.0, &p).unwrap();
    let phase = still_phase(&mesh, Box::new(gas));
    let fields = FlowFields::single_phase(&mesh, p, phase).unwrap();
    SegregatedFlowSolver::new(mesh, config, fields, FlowServices::default()).unwrap()
}

/// 封闭的 4 单元可压缩箱体：总质量 Σρ·V 保持初值
#[test]
fn test_closed_compressible_box_conserves_mass() {
    let mut solver = compressible_box(CouplingConfig::piso(2));
    assert_eq!(solver.strategy_name(), "compressibleSinglePhase");
    assert!(solver.reference().closed());
    assert!(!solver.reference().needs_reference());

    let m0 = solver.initial_mass();
    for _ in 0..3 {
        solver.solve_time_step(1e-3).unwrap();
        let mass = solver.total_mass();
        assert!((mass - m0).abs() < 1e-10 * m0, "质量漂移: {} -> {}", m0, mass);
    }
}

/// 密度欠松弛不破坏封闭域质量守恒
#[test]
fn test_closed_box_conserves_mass_with_density_relaxation() {
    let mut config = CouplingConfig::pimple(3, 2);
    config.relaxation.rho = 0.5;
    let mut solver = compressible_box(config);

    let m0 = solver.initial_mass();
    for _ in 0..3 {
        solver.solve_time_step(1e-3).unwrap();
        let mass = solver.total_mass();
        assert!((mass - m0).abs() < 1e-10 * m0, "质量漂移: {} -> {}", m0, mass);
    }
}

/// 静止水柱：重力由压力梯度平衡，速度与通量保持为零
#[test]
fn test_hydrostatic_column_stays_at_rest() {
    let g = 9.81;
    let mesh = CartesianMeshBuilder::new(1, 3, 1).lengths(1.0, 3.0, 1.0).build().unwrap();
    let p = VolScalarField::uniform("p", &mesh, 0.0, walls(&mesh, BoundaryCondition::fixed_flux_pressure)).unwrap();
    let phase = still_phase(&mesh, Box::new(ConstantDensity::new(&mesh, 1.0).unwrap()));
    let fields = FlowFields::single_phase(&mesh, p, phase).unwrap();

    let mut config = CouplingConfig::piso(2);
    config.controls.consistent = false;
    config.reference.ref_cell = Some(0);
    config.reference.ref_value = 0.0;
    let services = FlowServices::default().with_face_force(Gravity::new(DVec3::new(0.0, -g, 0.0)));
    let mut solver = SegregatedFlowSolver::new(mesh, config, fields, services).unwrap();

    for _ in 0..2 {
        solver.solve_time_step(0.01).unwrap();
    }

    let fields = solver.fields();
    for u in fields.phases.phases()[0].u().internal() {
        assert!(u.length() < 1e-8, "速度 {:?}", u);
    }
    for f in fields.phi.values() {
        assert!(f.abs() < 1e-8);
    }
    let p = fields.p.internal();
    assert!(p[0].abs() < 1e-8);
    assert!((p[1] - p[0] + g).abs() < 1e-6);
    assert!((p[2] - p[1] + g).abs() < 1e-6);
}

fn accelerated_box(ref_value: f64) -> SegregatedFlowSolver<PolyMesh> {
    let mesh = CartesianMeshBuilder::new(3, 1, 1).lengths(3.0, 1.0, 1.0).build().unwrap();
    let p = VolScalarField::uniform("p", &mesh, 0.0, walls(&mesh, |_| BoundaryCondition::ZeroGradient)).unwrap();
    let phase = still_phase(&mesh, Box::new(ConstantDensity::new(&mesh, 1.0).unwrap()));
    let fields = FlowFields::single_phase(&mesh, p, phase).unwrap();

    let mut config = CouplingConfig::piso(2);
    config.reference.ref_cell = Some(0);
    config.reference.ref_value = ref_value;
    let services = FlowServices::default().with_sources(UniformAcceleration::new(DVec3::new(2.0, 0.0, 0.0)));
    SegregatedFlowSolver::new(mesh, config, fields, services).unwrap()
}

/// 参考压力只平移压力，不改变通量与速度
#[test]
fn test_reference_pressure_invariance() {
    let mut a = accelerated_box(0.0);
    let mut b = accelerated_box(10.0);
    for _ in 0..2 {
        a.solve_time_step(0.1).unwrap();
        b.solve_time_step(0.1).unwrap();
    }

    let (fa, fb) = (a.fields(), b.fields());
    assert!((fb.p.internal()[0] - 10.0).abs() < 1e-8);
    for (pa, pb) in fa.p.internal().iter().zip(fb.p.internal()) {
        assert!((pb - pa - 10.0).abs() < 1e-6);
    }
    for (x, y) in fa.phi.values().iter().zip(fb.phi.values()) {
        assert!((x - y).abs() < 1e-8);
    }
    let (ua, ub) = (fa.phases.phases()[0].u(), fb.phases.phases()[0].u());
    for (x, y) in ua.internal().iter().zip(ub.internal()) {
        assert!((*x - *y).length() < 1e-8);
    }
    // 压力梯度平衡体积力
    assert!(fa.p.internal()[2] > fa.p.internal()[0]);
}

/// 整体平移已求得的压力后再推进一步，结果与未平移时相同
#[test]
fn test_shifted_pressure_gives_same_step() {
    let mut a = accelerated_box(0.0);
    let mut b = accelerated_box(0.0);
    for _ in 0..2 {
        a.solve_time_step(0.1).unwrap();
        b.solve_time_step(0.1).unwrap();
    }

    b.fields_mut().p.shift(5.0);
    assert!((b.fields().p.internal()[0] - 5.0).abs() < 1e-8);
    a.solve_time_step(0.1).unwrap();
    b.solve_time_step(0.1).unwrap();

    let (fa, fb) = (a.fields(), b.fields());
    for (x, y) in fa.phi.values().iter().zip(fb.phi.values()) {
        assert!((x - y).abs() < 1e-8, "通量 {} vs {}", x, y);
    }
    let (ua, ub) = (fa.phases.phases()[0].u(), fb.phases.phases()[0].u());
    for (x, y) in ua.internal().iter().zip(ub.internal()) {
        assert!((*x - *y).length() < 1e-8);
    }
    // 参考单元重新拉回零
    assert!(fb.p.internal()[0].abs() < 1e-8);
    for (pa, pb) in fa.p.internal().iter().zip(fb.p.internal()) {
        assert!((pa - pb).abs() < 1e-6);
    }
}

/// 封闭不可压缩域缺少参考单元时构造失败
#[test]
fn test_closed_incompressible_needs_reference_cell() {
    let mesh = CartesianMeshBuilder::new(3, 1, 1).build().unwrap();
    let p = VolScalarField::uniform("p", &mesh, 0.0, walls(&mesh, |_| BoundaryCondition::ZeroGradient)).unwrap();
    let phase = still_phase(&mesh, Box::new(ConstantDensity::new(&mesh, 1.0).unwrap()));
    let fields = FlowFields::single_phase(&mesh, p, phase).unwrap();
    let result = SegregatedFlowSolver::new(mesh, CouplingConfig::piso(1), fields, FlowServices::default());
    assert!(matches!(result, Err(CouplingError::Reference { .. })));
}
