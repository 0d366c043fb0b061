/*!
Converts the product-variable record into the canonical set of `(Os, Arch)`
targets a build is responsible for.

This is deliberately the only crate that knows the closed set of
architecture and OS names; everything downstream (the variant expander, the
property merger) works in terms of the `Target` values this crate produces,
never in terms of raw strings from the product configuration.
*/

mod error;
mod registry;

pub use error::Error;
pub use registry::{os_by_name, ArchType, Os, OsClass};

use config_store::{ArchSpec, ProductVariables};
use std::collections::HashMap;
use std::fmt;

type Result<T> = std::result::Result<T, Error>;

/// The pointer-width / ABI-family bucket an arch belongs to. `Common` archs
/// (the universal "this doesn't vary by arch" target) have no bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Multilib {
    Lib32,
    Lib64,
}

impl fmt::Display for Multilib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Multilib::Lib32 => "lib32",
            Multilib::Lib64 => "lib64",
        })
    }
}

impl ArchType {
    /// The multilib bucket for this arch type, or `None` for `Common`.
    pub fn multilib(&self) -> Option<Multilib> {
        match self {
            ArchType::Arm | ArchType::Mips | ArchType::X86 => Some(Multilib::Lib32),
            ArchType::Arm64 | ArchType::Mips64 | ArchType::X86_64 => Some(Multilib::Lib64),
            ArchType::Common => None,
        }
    }
}

/// A fully-resolved architecture: its type, pointer-width bucket, optional
/// arch/CPU variants, ABI list, enabled features, and whether it runs
/// natively on the machine doing the build (false for emulated / crossed
/// variants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arch {
    pub arch_type: ArchType,
    pub multilib: Option<Multilib>,
    pub variant: Option<String>,
    pub cpu_variant: Option<String>,
    pub abi: Vec<String>,
    pub features: Vec<String>,
    pub native: bool,
}

impl Arch {
    pub fn common() -> Self {
        Self {
            arch_type: ArchType::Common,
            multilib: None,
            variant: None,
            cpu_variant: None,
            abi: Vec::new(),
            features: Vec::new(),
            native: true,
        }
    }
}

/// A `(Os, Arch)` pair: one concrete build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub os: Os,
    pub arch: Arch,
}

impl Target {
    /// The universal target: every common-arch variant is cloned for this,
    /// regardless of which concrete OS/arch pairs the build enumerates.
    pub fn common(os: Os) -> Self {
        Self {
            os,
            arch: Arch::common(),
        }
    }
}

/// The per-arch-variant feature map: either the arch type has a variant
/// (and features come from the variant-specific table) or it doesn't (and
/// features fall back to the OS's default feature list).
#[derive(Debug, Clone, Default)]
pub struct ArchFeatureMap {
    pub os_defaults: HashMap<String, Vec<String>>,
    pub variant_features: HashMap<(ArchType, String), Vec<String>>,
}

impl ArchFeatureMap {
    fn features_for(&self, os_name: &str, arch_type: ArchType, variant: Option<&str>) -> Vec<String> {
        match variant {
            Some(v) => self
                .variant_features
                .get(&(arch_type, v.to_string()))
                .cloned()
                .unwrap_or_default(),
            None => self.os_defaults.get(os_name).cloned().unwrap_or_default(),
        }
    }
}

/// The decoder's output: an ordered mapping from OS name to the list of
/// targets that OS must be built for. Host-class OS entries are always
/// inserted before device-class ones, satisfying the "host targets precede
/// device targets" ordering rule; within one OS, primary precedes
/// secondary.
#[derive(Debug, Clone, Default)]
pub struct TargetMap {
    order: Vec<String>,
    targets: HashMap<String, Vec<Target>>,
}

impl TargetMap {
    fn push(&mut self, os_name: &str, targets: Vec<Target>) {
        if !self.targets.contains_key(os_name) {
            self.order.push(os_name.to_string());
        }
        self.targets.entry(os_name.to_string()).or_default().extend(targets);
    }

    pub fn os_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn targets_for(&self, os_name: &str) -> &[Target] {
        self.targets.get(os_name).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn normalize_variant(arch_type: ArchType, variant: &Option<String>) -> Option<String> {
    let v = variant.as_deref()?;
    if v.is_empty() || v == arch_type.to_string() || v == "generic" {
        None
    } else {
        Some(v.to_string())
    }
}

fn normalize_abi(abi: &[String]) -> Vec<String> {
    abi.iter().filter(|a| !a.is_empty()).cloned().collect()
}

fn resolve_arch(
    os: &Os,
    spec: &ArchSpec,
    feature_map: &ArchFeatureMap,
    native: bool,
) -> Result<Arch> {
    let arch_type: ArchType = spec
        .arch
        .parse()
        .map_err(|_| error::Error::UnknownArch { name: spec.arch.clone() })?;
    let variant = normalize_variant(arch_type, &spec.variant);
    let cpu_variant = normalize_variant(arch_type, &spec.cpu_variant).filter(|c| Some(c.clone()) != variant);
    let features = feature_map.features_for(&os.name, arch_type, variant.as_deref());
    Ok(Arch {
        arch_type,
        multilib: arch_type.multilib(),
        variant,
        cpu_variant,
        abi: normalize_abi(&spec.abi),
        features,
        native,
    })
}

/// Build a primary (+ optional secondary) target list for one OS, applying
/// ordering rule (b) (primary precedes secondary) and rule (c) (clear the
/// secondary's native flag when it shares the primary's multilib bucket).
fn build_targets(
    os: &Os,
    primary: &ArchSpec,
    secondary: Option<&ArchSpec>,
    feature_map: &ArchFeatureMap,
    native: bool,
) -> Result<Vec<Target>> {
    let primary_arch = resolve_arch(os, primary, feature_map, native)?;
    let mut out = vec![Target {
        os: os.clone(),
        arch: primary_arch.clone(),
    }];
    if let Some(secondary) = secondary {
        let mut secondary_arch = resolve_arch(os, secondary, feature_map, native)?;
        if secondary_arch.multilib == primary_arch.multilib {
            secondary_arch.native = false;
        }
        out.push(Target {
            os: os.clone(),
            arch: secondary_arch,
        });
    }
    Ok(out)
}

/// Decode a product-variable record into the full `Os -> [Target]` mapping.
pub fn decode_targets(vars: &ProductVariables, feature_map: &ArchFeatureMap) -> Result<TargetMap> {
    if vars.host_arch.arch.is_empty() {
        return Err(error::Error::MissingHostArch);
    }

    let mut map = TargetMap::default();

    let host_os = os_by_name("linux_glibc").expect("built-in OS registry missing linux_glibc");
    let host_targets = build_targets(
        &host_os,
        &vars.host_arch,
        vars.host_secondary_arch.as_ref(),
        feature_map,
        true,
    )?;
    map.push(&host_os.name, host_targets);

    if let Some(cross_host_name) = &vars.cross_host {
        let cross_host = os_by_name(cross_host_name)
            .ok_or_else(|| error::Error::UnknownOs { name: cross_host_name.clone() })?;
        let primary = vars
            .cross_host_arch
            .as_ref()
            .filter(|a| !a.arch.is_empty())
            .context_missing_cross_host_arch()?;
        let cross_targets = build_targets(
            &cross_host,
            primary,
            vars.cross_host_secondary_arch.as_ref(),
            feature_map,
            false,
        )?;
        map.push(&cross_host.name, cross_targets);
    }

    let device_os_name = if vars.fuchsia { "fuchsia" } else { "android" };
    let device_os =
        os_by_name(device_os_name).expect("built-in OS registry missing device OS");
    let device_targets = build_targets(
        &device_os,
        &vars.device_arch,
        vars.device_secondary_arch.as_ref(),
        feature_map,
        true,
    )?;
    map.push(&device_os.name, device_targets);

    Ok(map)
}

trait MissingCrossHostArch<T> {
    fn context_missing_cross_host_arch(self) -> Result<T>;
}

impl<'a> MissingCrossHostArch<&'a ArchSpec> for Option<&'a ArchSpec> {
    fn context_missing_cross_host_arch(self) -> Result<&'a ArchSpec> {
        self.ok_or(error::Error::MissingCrossHostArch)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use config_store::ArchSpec;
    use maplit::hashmap;

    fn vars() -> ProductVariables {
        ProductVariables {
            host_arch: ArchSpec::new("x86_64"),
            host_secondary_arch: Some(ArchSpec::new("x86")),
            cross_host: None,
            cross_host_arch: None,
            cross_host_secondary_arch: None,
            device_arch: {
                let mut a = ArchSpec::new("arm64");
                a.variant = Some("armv8-a".to_string());
                a
            },
            device_secondary_arch: {
                let mut a = ArchSpec::new("arm");
                a.variant = Some("armv7-a-neon".to_string());
                Some(a)
            },
            fuchsia: false,
            platform_sdk_version: 34,
            platform_sdk_final: true,
            platform_sdk_codename: None,
        }
    }

    #[test]
    fn unknown_arch_name_is_rejected() {
        let mut v = vars();
        v.host_arch = ArchSpec::new("not-an-arch");
        let err = decode_targets(&v, &ArchFeatureMap::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownArch { .. }));
    }

    #[test]
    fn missing_host_arch_is_rejected() {
        let mut v = vars();
        v.host_arch = ArchSpec::new("");
        let err = decode_targets(&v, &ArchFeatureMap::default()).unwrap_err();
        assert_eq!(err, Error::MissingHostArch);
    }

    #[test]
    fn host_precedes_device_and_primary_precedes_secondary() {
        let map = decode_targets(&vars(), &ArchFeatureMap::default()).unwrap();
        let names: Vec<&str> = map.os_names().collect();
        assert_eq!(names, vec!["linux_glibc", "android"]);

        let host = map.targets_for("linux_glibc");
        assert_eq!(host[0].arch.arch_type, ArchType::X86_64);
        assert_eq!(host[1].arch.arch_type, ArchType::X86);

        let device = map.targets_for("android");
        assert_eq!(device[0].arch.arch_type, ArchType::Arm64);
        assert_eq!(device[1].arch.arch_type, ArchType::Arm);
    }

    #[test]
    fn same_bucket_secondary_loses_native_flag() {
        // host_arch x86_64 (lib64) + secondary x86 (lib32): different buckets,
        // both stay native.
        let map = decode_targets(&vars(), &ArchFeatureMap::default()).unwrap();
        let host = map.targets_for("linux_glibc");
        assert!(host[0].arch.native);
        assert!(host[1].arch.native);
    }

    #[test]
    fn secondary_sharing_bucket_clears_native() {
        let mut v = vars();
        // Force both host arches into the lib64 bucket.
        v.host_secondary_arch = Some(ArchSpec::new("x86_64"));
        let map = decode_targets(&v, &ArchFeatureMap::default()).unwrap();
        let host = map.targets_for("linux_glibc");
        assert!(host[0].arch.native);
        assert!(!host[1].arch.native);
    }

    #[test]
    fn variant_equal_to_arch_name_is_cleared() {
        let mut v = vars();
        v.device_arch.variant = Some("arm64".to_string());
        let map = decode_targets(&v, &ArchFeatureMap::default()).unwrap();
        assert_eq!(map.targets_for("android")[0].arch.variant, None);
    }

    #[test]
    fn generic_variant_is_cleared() {
        let mut v = vars();
        v.device_arch.variant = Some("generic".to_string());
        let map = decode_targets(&v, &ArchFeatureMap::default()).unwrap();
        assert_eq!(map.targets_for("android")[0].arch.variant, None);
    }

    #[test]
    fn empty_abi_entries_are_removed() {
        let mut v = vars();
        v.device_arch.abi = vec!["arm64-v8a".to_string(), "".to_string()];
        let map = decode_targets(&v, &ArchFeatureMap::default()).unwrap();
        assert_eq!(map.targets_for("android")[0].arch.abi, vec!["arm64-v8a"]);
    }

    #[test]
    fn features_come_from_variant_map_when_variant_present() {
        let mut v = vars();
        v.device_arch.variant = Some("armv8-a".to_string());
        let feature_map = ArchFeatureMap {
            variant_features: hashmap! {
                (ArchType::Arm64, "armv8-a".to_string()) => vec!["fp".to_string()],
            },
            ..Default::default()
        };
        let map = decode_targets(&v, &feature_map).unwrap();
        assert_eq!(map.targets_for("android")[0].arch.features, vec!["fp"]);
    }

    #[test]
    fn features_fall_back_to_os_defaults_when_variant_absent() {
        let mut v = vars();
        v.device_arch.variant = None;
        let feature_map = ArchFeatureMap {
            os_defaults: hashmap! { "android".to_string() => vec!["neon".to_string()] },
            ..Default::default()
        };
        let map = decode_targets(&v, &feature_map).unwrap();
        assert_eq!(map.targets_for("android")[0].arch.features, vec!["neon"]);
    }

    #[test]
    fn unknown_cross_host_os_fails() {
        let mut v = vars();
        v.cross_host = Some("not-an-os".to_string());
        v.cross_host_arch = Some(ArchSpec::new("x86_64"));
        let err = decode_targets(&v, &ArchFeatureMap::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownOs { .. }));
    }

    #[test]
    fn missing_cross_host_arch_fails() {
        let mut v = vars();
        v.cross_host = Some("windows".to_string());
        v.cross_host_arch = None;
        let err = decode_targets(&v, &ArchFeatureMap::default()).unwrap_err();
        assert!(matches!(err, Error::MissingCrossHostArch));
    }

    #[test]
    fn fuchsia_flag_selects_fuchsia_device_os() {
        let mut v = vars();
        v.fuchsia = true;
        let map = decode_targets(&v, &ArchFeatureMap::default()).unwrap();
        let names: Vec<&str> = map.os_names().collect();
        assert_eq!(names, vec!["linux_glibc", "fuchsia"]);
    }
}
