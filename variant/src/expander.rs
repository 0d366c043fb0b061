/*!
The architecture/OS/multilib variant expander (spec section 4.2).

Given a module's support-mode declaration and the already-decoded set of
candidate targets (from `target-decoder`), this answers exactly one
question: which concrete `(Os, Arch)` targets does this module need to be
cloned into, and which one of those is the "primary" variant for each OS
class it ends up in.
*/

use crate::error::Result;
use crate::types::{
    bucket_order, enabled_classes, CompileMultilib, EnabledClasses, MultilibOverrides, OsClassKey,
    OsSupport, PartitionTags,
};
use target_decoder::{Multilib, Os, OsClass, Target, TargetMap};

/// One cloned variant of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantTarget {
    pub target: Target,
    pub os_class: OsClass,
    pub is_primary: bool,
}

/// Everything the expander decided for one module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpansionResult {
    /// Empty means the module is disabled: it has no targets to build for.
    pub variants: Vec<VariantTarget>,
    /// The multilib value that would have applied had `use_target_variants`
    /// been honored; kept for multi-target bookkeeping when it was forced
    /// to `common` (spec section 4.2 step 3).
    pub extra_multilib: Option<CompileMultilib>,
}

impl ExpansionResult {
    pub fn is_disabled(&self) -> bool {
        self.variants.is_empty()
    }

    /// The full list of targets this module transitively represents
    /// ("multi-targets" in spec section 3's data model); every variant
    /// shares this same list.
    pub fn all_targets(&self) -> Vec<Target> {
        self.variants.iter().map(|v| v.target.clone()).collect()
    }
}

/// Everything the expander needs about one module to make its decision.
pub struct ExpanderInput<'a> {
    pub support: OsSupport,
    pub host_supported: Option<bool>,
    pub device_supported: Option<bool>,
    pub compile_multilib: Option<CompileMultilib>,
    pub compile_multilib_overrides: MultilibOverrides,
    pub default_multilib: CompileMultilib,
    pub use_target_variants: bool,
    pub prefer_32: bool,
    pub partition: &'a PartitionTags,
    pub targets: &'a TargetMap,
}

pub fn expand(input: &ExpanderInput) -> Result<ExpansionResult> {
    let enabled = enabled_classes(input.support, input.host_supported, input.device_supported);

    let mut extra_multilib = None;
    let mut variants = Vec::new();
    let mut primary_seen: Vec<OsClass> = Vec::new();

    for os_name in input.targets.os_names() {
        let candidates = input.targets.targets_for(os_name);
        let Some(os) = candidates.first().map(|t| t.os.clone()) else {
            continue;
        };
        if !class_allowed(&enabled, os.class) {
            continue;
        }

        let candidates = restrict_for_recovery(candidates, &os, input.partition);

        let chosen = effective_multilib(input, os.class);
        if !input.use_target_variants {
            let would_be = input
                .compile_multilib_overrides
                .get(&OsClassKey::from(os.class))
                .copied()
                .or(input.compile_multilib)
                .unwrap_or(input.default_multilib);
            extra_multilib.get_or_insert(would_be);
        }

        let os_targets = convert_multilib(&os, &candidates, chosen, input.prefer_32);

        for target in os_targets {
            let is_primary = !primary_seen.contains(&os.class);
            if is_primary {
                primary_seen.push(os.class);
            }
            variants.push(VariantTarget {
                target,
                os_class: os.class,
                is_primary,
            });
        }
    }

    Ok(ExpansionResult {
        variants,
        extra_multilib,
    })
}

fn class_allowed(enabled: &EnabledClasses, class: OsClass) -> bool {
    enabled.allows(class)
}

fn restrict_for_recovery(candidates: &[Target], os: &Os, partition: &PartitionTags) -> Vec<Target> {
    if partition.recovery && os.class == OsClass::Device {
        candidates.first().cloned().into_iter().collect()
    } else {
        candidates.to_vec()
    }
}

fn effective_multilib(input: &ExpanderInput, class: OsClass) -> CompileMultilib {
    if !input.use_target_variants {
        return CompileMultilib::Common;
    }
    input
        .compile_multilib_overrides
        .get(&OsClassKey::from(class))
        .copied()
        .or(input.compile_multilib)
        .unwrap_or(input.default_multilib)
}

fn convert_multilib(
    os: &Os,
    candidates: &[Target],
    multilib: CompileMultilib,
    prefer_32: bool,
) -> Vec<Target> {
    match multilib {
        CompileMultilib::Common => vec![Target::common(os.clone())],
        CompileMultilib::CommonFirst => {
            let mut out = vec![Target::common(os.clone())];
            if let Some(t) = first_by_bucket_order(candidates, prefer_32) {
                out.push(t);
            }
            out
        }
        CompileMultilib::Both => {
            let order = bucket_order(prefer_32);
            let mut out = Vec::new();
            for bucket in order {
                out.extend(
                    candidates
                        .iter()
                        .filter(|t| t.arch.multilib == Some(bucket))
                        .cloned(),
                );
            }
            out
        }
        CompileMultilib::Lib32 => filter_bucket(candidates, Multilib::Lib32),
        CompileMultilib::Lib64 => filter_bucket(candidates, Multilib::Lib64),
        CompileMultilib::First => first_by_bucket_order(candidates, prefer_32)
            .into_iter()
            .collect(),
        CompileMultilib::Prefer32 => {
            let lib32 = filter_bucket(candidates, Multilib::Lib32);
            if lib32.is_empty() {
                filter_bucket(candidates, Multilib::Lib64)
            } else {
                lib32
            }
        }
    }
}

fn filter_bucket(candidates: &[Target], bucket: Multilib) -> Vec<Target> {
    candidates
        .iter()
        .filter(|t| t.arch.multilib == Some(bucket))
        .cloned()
        .collect()
}

fn first_by_bucket_order(candidates: &[Target], prefer_32: bool) -> Option<Target> {
    for bucket in bucket_order(prefer_32) {
        if let Some(t) = candidates.iter().find(|t| t.arch.multilib == Some(bucket)) {
            return Some(t.clone());
        }
    }
    candidates.first().cloned()
}
