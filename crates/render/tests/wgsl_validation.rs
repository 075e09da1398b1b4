use wgpu::naga;

const PARTICLES: &str = include_str!("../src/shaders/particles.wgsl");

fn parse(source: &str) -> Result<naga::Module, String> {
    naga::front::wgsl::parse_str(source).map_err(|err| err.emit_to_string(source))
}

fn validate_wgsl(source: &str) -> Result<(), String> {
    let module = parse(source)?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );

    validator
        .validate(&module)
        .map(|_| ())
        .map_err(|err| err.emit_to_string(source))
}

#[test]
fn particles_shader_is_valid_wgsl() {
    validate_wgsl(PARTICLES).unwrap();
}

#[test]
fn particles_shader_exposes_pipeline_entry_points() {
    let module = parse(PARTICLES).unwrap();
    let names: Vec<_> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
    for expected in ["vs_billboard", "vs_mesh", "fs_main"] {
        assert!(names.contains(&expected), "missing entry point {expected}");
    }
}

#[test]
fn uniform_block_matches_rust_layout() {
    let module = parse(PARTICLES).unwrap();
    let (_, ty) = module
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some("ParticleUniforms"))
        .unwrap();
    match &ty.inner {
        naga::TypeInner::Struct { span, .. } => {
            assert_eq!(*span as usize, std::mem::size_of::<ember_render::ParticleUniforms>());
        }
        other => panic!("unexpected uniform type {other:?}"),
    }
}
