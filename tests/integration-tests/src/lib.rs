#![cfg(test)]

//! End-to-end scenario tests spanning the variant-expansion and
//! build-graph workspace, one per concrete scenario. Each test exercises
//! the crates together through their public APIs rather than any single
//! crate's internals.

use std::collections::HashSet;

use config_store::{ArchSpec, ProductVariables};
use rule_builder::{BuildEnv, RuleBuilder};
use target_decoder::{decode_targets, ArchFeatureMap};
use variant::{
    expand_module, CompileMultilib, ConditionalProperties, ExpanderInput, MultilibOverrides,
    OsSupport, PartitionTags, PropValue,
};
use visibility::{compute_effective, enforce, validate_patterns, EffectiveRules};

fn list(items: &[&str]) -> PropValue {
    PropValue::List(items.iter().map(|s| s.to_string()).collect())
}

#[test]
fn scenario_1_arch_expansion() {
    let vars = ProductVariables {
        host_arch: ArchSpec::new("x86_64"),
        host_secondary_arch: Some(ArchSpec::new("x86")),
        cross_host: None,
        cross_host_arch: None,
        cross_host_secondary_arch: None,
        device_arch: ArchSpec::new("arm64"),
        device_secondary_arch: {
            let mut a = ArchSpec::new("arm");
            a.variant = Some("armv7-a-neon".to_string());
            Some(a)
        },
        fuchsia: false,
        platform_sdk_version: 34,
        platform_sdk_final: true,
        platform_sdk_codename: None,
    };
    let targets = decode_targets(&vars, &ArchFeatureMap::default()).unwrap();
    let partition = PartitionTags::default();
    let input = ExpanderInput {
        support: OsSupport::HostAndDeviceDefault,
        host_supported: Some(true),
        device_supported: None,
        compile_multilib: Some(CompileMultilib::Both),
        compile_multilib_overrides: MultilibOverrides::default(),
        default_multilib: CompileMultilib::Both,
        use_target_variants: true,
        prefer_32: false,
        partition: &partition,
        targets: &targets,
    };
    let base = PropValue::empty_group();
    let cond = ConditionalProperties::default();
    let variants = expand_module(&input, &base, &cond, &HashSet::new()).unwrap();

    let mut by_name: Vec<(String, bool)> = variants
        .iter()
        .map(|v| {
            let name = format!("{}_{}", v.target.os.name, v.target.arch.arch_type);
            (name, v.is_primary)
        })
        .collect();
    by_name.sort();

    assert_eq!(variants.len(), 4, "expected two host and two device variants");
    let primaries: Vec<&str> = by_name
        .iter()
        .filter(|(_, primary)| *primary)
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(primaries.len(), 2, "one primary per OS class");
}

#[test]
fn scenario_2_property_merge_order() {
    let vars = ProductVariables {
        host_arch: ArchSpec::new("x86_64"),
        host_secondary_arch: None,
        cross_host: None,
        cross_host_arch: None,
        cross_host_secondary_arch: None,
        device_arch: ArchSpec::new("arm64"),
        device_secondary_arch: {
            let mut a = ArchSpec::new("arm");
            a.variant = Some("armv7-a-neon".to_string());
            Some(a)
        },
        fuchsia: false,
        platform_sdk_version: 34,
        platform_sdk_final: true,
        platform_sdk_codename: None,
    };
    let targets = decode_targets(&vars, &ArchFeatureMap::default()).unwrap();
    let partition = PartitionTags::default();
    let input = ExpanderInput {
        support: OsSupport::DeviceOnly,
        host_supported: None,
        device_supported: None,
        compile_multilib: None,
        compile_multilib_overrides: MultilibOverrides::default(),
        default_multilib: CompileMultilib::Both,
        use_target_variants: true,
        prefer_32: false,
        partition: &partition,
        targets: &targets,
    };

    let base = PropValue::group([("a", list(&["root"]))]);
    let mut cond = ConditionalProperties::default();
    cond.target.linux = PropValue::group([("a", list(&["linux"]))]);
    cond.target.bionic = PropValue::group([("a", list(&["bionic"]))]);
    cond.target.android64 = PropValue::group([("a", list(&["android64"]))]);
    cond.target.by_os.insert("android".to_string(), PropValue::group([("a", list(&["android"]))]));
    cond.target
        .by_os_arch
        .insert(("android".to_string(), target_decoder::ArchType::Arm), PropValue::group([("a", list(&["android_arm"]))]));

    cond.arch.insert(
        target_decoder::ArchType::Arm,
        variant::ArchProperties {
            base: PropValue::group([("a", list(&["arm"]))]),
            ..Default::default()
        },
    );
    cond.multilib.insert(
        target_decoder::Multilib::Lib32,
        PropValue::group([("a", list(&["lib32"]))]),
    );

    let variants = expand_module(&input, &base, &cond, &HashSet::new()).unwrap();
    let secondary = variants
        .iter()
        .find(|v| !v.is_primary && v.os_class == target_decoder::OsClass::Device)
        .expect("a secondary device variant exists");

    let merged = secondary.properties.as_group().unwrap().get("a").unwrap().as_list().unwrap();
    assert_eq!(
        merged,
        &[
            "root", "linux", "bionic", "android", "android64", "arm", "lib32", "android_arm",
        ]
    );
}

#[test]
fn scenario_3_visibility_override_discards_defaults() {
    let d_patterns = validate_patterns("namespace", Some(&["//namespace".to_string()])).unwrap();
    let d_rules = EffectiveRules::patterns("namespace", d_patterns);

    let own = validate_patterns(
        "top",
        Some(&["//visibility:override".to_string(), "//other".to_string()]),
    )
    .unwrap();
    let effective = compute_effective("top", Some(own), None, &[d_rules]);

    assert!(enforce("other", "M", &effective, false, false).is_ok());
    let err = enforce("namespace", "M", &effective, false, false).unwrap_err();
    assert!(matches!(err, visibility::Error::NotVisible { .. }));
}

#[test]
fn scenario_4_namespace_resolution() {
    let mut tree = namespace::NamespaceTree::new();
    tree.register_namespace("top").unwrap();
    tree.register_namespace("top/nested").unwrap();
    tree.register_module("top/nested", "X").unwrap();
    tree.finalize();

    assert!(tree.resolve("top", "//top/nested:X").is_ok());
    assert!(tree.resolve("top", "X").is_err());

    let mut tree = namespace::NamespaceTree::new();
    tree.register_namespace("top").unwrap();
    tree.register_namespace("top/nested").unwrap();
    tree.register_module("top/nested", "X").unwrap();
    tree.add_import("top", "top/nested").unwrap();
    tree.finalize();
    assert!(tree.resolve("top", "X").is_ok());
}

#[test]
fn scenario_5_rule_builder_sandbox() {
    let mut rule = RuleBuilder::new();
    rule.sbox("out", "out.manifest");
    rule.sandbox_inputs();
    rule.command()
        .tool("compile")
        .flag_with_input("-c", "a.in".to_string())
        .outputs(["out/x".to_string(), "out/y".to_string()]);

    let result = rule.build("compile_x", "compiling x and y", BuildEnv::default());
    let manifest = result.manifest.expect("sandboxed command carries a manifest");
    let command = manifest.commands.first().expect("exactly one manifest command");

    let compile_copy = command
        .copy_before
        .iter()
        .find(|c| c.from == "compile")
        .expect("tool gets a copy_before mapping");
    assert!(compile_copy.to.starts_with("__SBOX_OUT_DIR__"));

    let input_copy = command
        .copy_before
        .iter()
        .find(|c| c.from == "a.in")
        .expect("declared input gets a copy_before mapping");
    assert!(input_copy.to.starts_with("__SBOX_OUT_DIR__"));

    assert_eq!(command.copy_after.len(), 2);
    assert_eq!(manifest.input_hash, rule_builder::sandbox::input_hash(&["a.in".to_string()]));
    assert!(command.chdir);
}

#[test]
fn scenario_6_visibility_default_propagation() {
    let top_default = validate_patterns("top", Some(&["//visibility:private".to_string()])).unwrap();
    let nested_default = validate_patterns("top/nested", Some(&["//outsider".to_string()])).unwrap();

    let nested_module = compute_effective("top/nested", None, Some(nested_default), &[]);
    assert!(nested_module.allows("top/nested", false));
    assert!(nested_module.allows("outsider", false));
    assert!(!nested_module.allows("top", false));

    let other_module = compute_effective("top/other", None, Some(top_default), &[]);
    assert!(other_module.allows("top", false));
    assert!(!other_module.allows("outsider", false));
}
