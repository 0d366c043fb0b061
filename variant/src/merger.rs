/*!
The property merger (spec section 4.3): folds a module's arch/OS/target
conditional property subtrees into its base properties in the fixed order
the spec prescribes, once per variant.
*/

use crate::props::{merge_into, PropValue};
use crate::types::PartitionTags;
use std::collections::{BTreeMap, HashSet};
use target_decoder::{Arch, ArchType, Multilib, Os, OsClass};

/// The `arch: { arm: {...}, arm64: {...}, arch_variants: {...}, ... }`
/// conditional block for one arch type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchProperties {
    /// Properties that apply to every variant of this arch type.
    pub base: PropValue,
    /// Keyed by the arch variant string (e.g. `"armv8-a"`).
    pub arch_variants: BTreeMap<String, PropValue>,
    /// Keyed by the CPU variant string.
    pub cpu_variants: BTreeMap<String, PropValue>,
    /// Keyed by one enabled feature name.
    pub features: BTreeMap<String, PropValue>,
}

/// The `target: { host: {...}, android: {...}, ... }` conditional block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetProperties {
    pub host: PropValue,
    pub android64: PropValue,
    pub android32: PropValue,
    pub bionic: PropValue,
    pub linux: PropValue,
    pub not_windows: PropValue,
    pub arm_on_x86: PropValue,
    pub arm_on_x86_64: PropValue,
    /// Keyed by OS name (e.g. `"android"`, `"linux_glibc"`).
    pub by_os: BTreeMap<String, PropValue>,
    /// Keyed by `(os name, arch type)`, e.g. `target.android_arm`.
    pub by_os_arch: BTreeMap<(String, ArchType), PropValue>,
    /// `target.linux_<arch>`.
    pub linux_by_arch: BTreeMap<ArchType, PropValue>,
    /// `target.bionic_<arch>`.
    pub bionic_by_arch: BTreeMap<ArchType, PropValue>,
    /// Keyed by partition tag name (`"vendor"`, `"product"`, `"soc"`,
    /// `"recovery"`).
    pub partition: BTreeMap<String, PropValue>,
}

/// All of a module's conditional property subtrees, as declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalProperties {
    pub arch: BTreeMap<ArchType, ArchProperties>,
    pub multilib: BTreeMap<Multilib, PropValue>,
    pub target: TargetProperties,
}

/// The per-variant context the merger needs to decide which conditional
/// subtrees apply.
pub struct VariantMergeCtx<'a> {
    pub os: &'a Os,
    pub arch: &'a Arch,
    pub os_class: OsClass,
    pub partition: &'a PartitionTags,
    /// The device's primary arch type. `target.android64`/`target.android32`
    /// key off this, not off the variant's own arch: a module's arm
    /// (32-bit) variant still picks up `android64` when the device it is
    /// being built for has a 64-bit primary arch, since those groups mean
    /// "this device is 64-/32-bit", not "this variant is". Also used to
    /// evaluate the `arm_on_x86`/`arm_on_x86_64` cross-compile groups.
    /// `None` for non-device variants.
    pub primary_device_arch_type: Option<ArchType>,
}

/// Fold every conditional subtree of `cond` that applies to this variant
/// into `base`, in the fixed order spec section 4.3 lays out. Arch- and
/// multilib-keyed steps are skipped entirely for common-arch variants,
/// since those groups only ever apply to a concrete arch type.
pub fn merge_variant(
    base: &mut PropValue,
    cond: &ConditionalProperties,
    ctx: &VariantMergeCtx,
    prepend_fields: &HashSet<String>,
) {
    let mut merge = |src: &PropValue, path: &str| merge_into(base, src, prepend_fields, path);

    if ctx.os_class == OsClass::Host || ctx.os_class == OsClass::HostCross {
        merge(&cond.target.host, "");
    }
    if ctx.os.is_linux_family {
        merge(&cond.target.linux, "");
        if let Some(v) = cond.target.linux_by_arch.get(&ctx.arch.arch_type) {
            merge(v, "");
        }
    }
    if ctx.os.is_bionic_family {
        merge(&cond.target.bionic, "");
        if let Some(v) = cond.target.bionic_by_arch.get(&ctx.arch.arch_type) {
            merge(v, "");
        }
    }
    if let Some(v) = cond.target.by_os.get(&ctx.os.name) {
        merge(v, "");
    }
    if ctx.os_class == OsClass::Device {
        match ctx.primary_device_arch_type.and_then(|t| t.multilib()) {
            Some(Multilib::Lib64) => merge(&cond.target.android64, ""),
            Some(Multilib::Lib32) => merge(&cond.target.android32, ""),
            None => {}
        }
    }

    if ctx.arch.arch_type != ArchType::Common {
        if let Some(arch_props) = cond.arch.get(&ctx.arch.arch_type) {
            merge(&arch_props.base, "");
            if let Some(variant) = ctx.arch.variant.as_deref() {
                if let Some(v) = arch_props.arch_variants.get(variant) {
                    merge(v, "");
                }
            }
            if let Some(cpu_variant) = ctx.arch.cpu_variant.as_deref() {
                if let Some(v) = arch_props.cpu_variants.get(cpu_variant) {
                    merge(v, "");
                }
            }
            for feature in &ctx.arch.features {
                if let Some(v) = arch_props.features.get(feature) {
                    merge(v, "");
                }
            }
        }
        if let Some(bucket) = ctx.arch.multilib {
            if let Some(v) = cond.multilib.get(&bucket) {
                merge(v, "");
            }
        }
    }

    if let Some(v) = cond
        .target
        .by_os_arch
        .get(&(ctx.os.name.clone(), ctx.arch.arch_type))
    {
        merge(v, "");
    }

    if ctx.os.name != "windows" {
        merge(&cond.target.not_windows, "");
    }

    if let Some(primary) = ctx.primary_device_arch_type {
        if ctx.arch.arch_type == ArchType::Arm {
            match primary {
                ArchType::X86 => merge(&cond.target.arm_on_x86, ""),
                ArchType::X86_64 => merge(&cond.target.arm_on_x86_64, ""),
                _ => {}
            }
        }
    }

    for tag in ctx.partition.active_tags() {
        if let Some(v) = cond.target.partition.get(tag) {
            merge(v, "");
        }
    }
}
