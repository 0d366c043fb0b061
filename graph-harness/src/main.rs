//! A thin smoke-test binary that wires `module-graph` together over a toy
//! set of declared modules and dumps the resulting build edges as JSON.
//! Not a CLI: there is nothing here to parse from argv.

use std::any::Any;

use config_store::{ArchSpec, ProductVariables};
use module_graph::{ActionContext, ActionOutput, ExpanderConfig, ModuleArena, ModuleType};
use rule_builder::{BuildEnv, RuleBuilder};
use target_decoder::{decode_targets, ArchFeatureMap};
use variant::{CompileMultilib, ConditionalProperties, MultilibOverrides, OsSupport, PropValue, Variant};

/// A minimal device-only module type: one source file in, one rule
/// compiling it into an object file out, per variant.
struct ToyLibrary;

impl ModuleType for ToyLibrary {
    fn type_name(&self) -> &'static str {
        "toy_library"
    }

    fn expander_config(&self) -> ExpanderConfig {
        ExpanderConfig {
            support: OsSupport::DeviceOnly,
            host_supported: None,
            device_supported: None,
            compile_multilib: None,
            compile_multilib_overrides: MultilibOverrides::default(),
            default_multilib: CompileMultilib::Both,
            use_target_variants: true,
            prefer_32: false,
        }
    }

    fn base_properties(&self) -> PropValue {
        PropValue::group([("srcs", PropValue::List(vec!["toy.c".to_string()]))])
    }

    fn conditional_properties(&self) -> ConditionalProperties {
        ConditionalProperties::default()
    }

    fn generate_actions(&self, variant: &Variant, _ctx: &ActionContext) -> ActionOutput {
        let src = variant
            .properties
            .as_group()
            .and_then(|g| g.get("srcs"))
            .and_then(|v| v.as_list())
            .and_then(|l| l.first())
            .cloned()
            .unwrap_or_else(|| "toy.c".to_string());
        let out = format!("out/toy_{}.o", variant.target.arch.arch_type);

        let mut rule = RuleBuilder::new();
        rule.command().text("compile").flag_with_input("-c", src);
        rule.command().flag_with_output("-o", out.clone());
        let result = rule.build(
            format!("toy_compile_{}", variant.target.arch.arch_type),
            "compiling toy library",
            BuildEnv::default(),
        );

        ActionOutput {
            edges: vec![result],
            provider: None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn main() {
    env_logger::init();

    let mut registry = module_graph::ModuleTypeRegistry::new();
    registry.register("toy_library", || Box::new(ToyLibrary));

    let mut arena = ModuleArena::new();
    let m = arena
        .register_module(&registry, "toy/pkg", "toylib", "toy_library")
        .expect("toy_library is registered");
    arena.set_own_visibility(m, None).expect("no visibility declared");
    arena.finish_registration();

    arena.run_defaults_deps().expect("no defaults declared");
    arena.run_defaults().expect("defaults fold succeeds");

    let vars = ProductVariables {
        host_arch: ArchSpec::new("x86_64"),
        host_secondary_arch: None,
        cross_host: None,
        cross_host_arch: None,
        cross_host_secondary_arch: None,
        device_arch: ArchSpec::new("arm64"),
        device_secondary_arch: None,
        fuchsia: false,
        platform_sdk_version: 34,
        platform_sdk_final: true,
        platform_sdk_codename: None,
    };
    let targets = decode_targets(&vars, &ArchFeatureMap::default()).expect("toy product variables decode");
    arena.run_arch(&targets).expect("arch expansion succeeds");
    arena.run_resolve_deps().expect("no dependency references declared");

    let violations = arena.check_visibility();
    for v in &violations {
        log::warn!("visibility violation: {v}");
    }

    let generated = arena.run_generate_actions();
    for (idx, edges) in generated {
        log::info!("module {} produced {} edge(s)", arena.base(idx).name, edges.len());
        for result in edges {
            let json = serde_json::to_string_pretty(&result.edge).expect("BuildEdge is serde-serializable");
            println!("{json}");
        }
    }
}
