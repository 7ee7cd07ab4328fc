// crates/sf_physics/tests/config_validation.rs

//! 配置与输入验证测试

use glam::DVec3;
use sf_config::{Algorithm, ConfigError, CouplingConfig, FlowModel};
use sf_physics::prelude::*;

fn open_fields(mesh: &dyn FvMesh) -> FlowFields {
    let u = VolVectorField::uniform(
        "U",
        mesh,
        DVec3::ZERO,
        vec![BoundaryCondition::fixed_value(1, DVec3::X), BoundaryCondition::ZeroGradient],
    )
    .unwrap();
    let p = VolScalarField::uniform(
        "p",
        mesh,
        0.0,
        vec![BoundaryCondition::ZeroGradient, BoundaryCondition::fixed_value(1, 0.0)],
    )
    .unwrap();
    let phase = Phase::new(
        "fluid",
        mesh,
        u,
        Box::new(ConstantDensity::new(mesh, 1.0).unwrap()),
        Box::new(LaminarStress::new(0.0)),
    )
    .unwrap();
    FlowFields::single_phase(mesh, p, phase).unwrap()
}

/// 配置验证拒绝越界参数
#[test]
fn test_invalid_config_values_are_rejected() {
    let mut bad = Vec::new();

    let mut c = CouplingConfig::piso(2);
    c.relaxation.p = 0.0;
    bad.push(c);

    let mut c = CouplingConfig::simple();
    c.relaxation.u_eqn = 1.5;
    bad.push(c);

    let mut c = CouplingConfig::piso(2);
    c.controls.n_outer_correctors = 0;
    bad.push(c);

    let mut c = CouplingConfig::piso(2);
    c.controls.h1_clamp = 1.0;
    bad.push(c);

    let mut c = CouplingConfig::piso(2);
    c.limits.rho_min = 2.0;
    c.limits.rho_max = 1.0;
    bad.push(c);

    let mut c = CouplingConfig::piso(2);
    c.limits.p_min = Some(1.0);
    c.limits.p_max = Some(0.0);
    bad.push(c);

    let mut c = CouplingConfig::piso(2);
    c.ddt_alpha_threshold = 0.0;
    bad.push(c);

    let mut c = CouplingConfig::piso(2);
    c.max_courant = 0.0;
    bad.push(c);

    for (i, config) in bad.iter().enumerate() {
        assert!(config.validate().is_err(), "第 {} 个配置应被拒绝", i);
    }
}

/// 多相只支持瞬态算法
#[test]
fn test_multiphase_requires_transient() {
    let mut config = CouplingConfig::simple();
    config.flow_model = FlowModel::Multiphase;
    assert!(matches!(config.validate(), Err(ConfigError::Incompatible(_))));

    config.algorithm = Algorithm::Pimple;
    assert!(config.validate().is_ok());
}

/// JSON 解析时同样执行验证
#[test]
fn test_from_json_validates() {
    assert!(CouplingConfig::from_json(r#"{"algorithm": "pimple"}"#).is_ok());
    assert!(matches!(
        CouplingConfig::from_json(r#"{"relaxation": {"p": -1.0}}"#),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(CouplingConfig::from_json("not json"), Err(ConfigError::Parse(_))));
}

/// 求解器构造时报告无效配置
#[test]
fn test_solver_rejects_invalid_config() {
    let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
    let fields = open_fields(&mesh);
    let mut config = CouplingConfig::piso(1);
    config.relaxation.rho = 0.0;
    let result = SegregatedFlowSolver::new(mesh, config, fields, FlowServices::default());
    assert!(matches!(result, Err(CouplingError::Configuration(_))));
}

/// 参考单元越界
#[test]
fn test_reference_cell_out_of_range() {
    let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
    let fields = open_fields(&mesh);
    let mut config = CouplingConfig::piso(1);
    config.reference.ref_cell = Some(5);
    let result = SegregatedFlowSolver::new(mesh, config, fields, FlowServices::default());
    assert!(matches!(result, Err(CouplingError::Reference { .. })));
}

/// 相定义错误
#[test]
fn test_invalid_phase_definitions() {
    let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
    let make = |name: &str| {
        let u = VolVectorField::calculated("U", &mesh, vec![DVec3::ZERO; 2]).unwrap();
        Phase::new(
            name,
            &mesh,
            u,
            Box::new(ConstantDensity::new(&mesh, 1.0).unwrap()),
            Box::new(LaminarStress::new(0.0)),
        )
        .unwrap()
    };
    let p = || VolScalarField::calculated("p", &mesh, vec![0.0; 2]).unwrap();

    // 体积分数越界
    let alpha = VolScalarField::calculated("alpha", &mesh, vec![1.5, 0.5]).unwrap();
    assert!(matches!(make("a").with_alpha(&mesh, alpha), Err(CouplingError::Phase { .. })));

    // 相名重复
    let half = VolScalarField::calculated("alpha", &mesh, vec![0.5; 2]).unwrap();
    let phases = vec![
        make("a").with_alpha(&mesh, half.clone()).unwrap(),
        make("a").with_alpha(&mesh, half.clone()).unwrap(),
    ];
    assert!(matches!(FlowFields::multiphase(&mesh, p(), phases), Err(CouplingError::Phase { .. })));

    // 体积分数之和不为一
    let phases = vec![make("a").with_alpha(&mesh, half).unwrap(), make("b")];
    assert!(matches!(
        FlowFields::multiphase(&mesh, p(), phases),
        Err(CouplingError::Configuration(_))
    ));

    // 残余体积分数越界
    assert!(make("a").with_residual_alpha(0.0).is_err());
}

/// 场尺寸与网格不一致
#[test]
fn test_size_mismatch_is_rejected() {
    let mesh = CartesianMeshBuilder::new(2, 1, 1).build().unwrap();
    let fields = open_fields(&mesh);
    let bigger = CartesianMeshBuilder::new(3, 1, 1).build().unwrap();
    let result = SegregatedFlowSolver::new(bigger, CouplingConfig::piso(1), fields, FlowServices::default());
    assert!(result.is_err());
}
