/*!
Variant expansion and property merging (spec section 4.2-4.3).

This crate turns one module's declared support mode and conditional
property subtrees into the list of concrete variants it must be cloned
into, each carrying its own fully-merged property tree. It depends only
on `target-decoder`'s output -- it never looks at product-variable strings
directly.
*/

pub mod error;
pub mod expander;
pub mod merger;
pub mod props;
pub mod types;

pub use error::{Error, Result};
pub use expander::{expand, ExpanderInput, ExpansionResult, VariantTarget};
pub use merger::{merge_variant, ArchProperties, ConditionalProperties, TargetProperties, VariantMergeCtx};
pub use props::PropValue;
pub use types::{
    bucket_order, CompileMultilib, EnabledClasses, MultilibOverrides, OsClassKey, OsSupport,
    PartitionTags,
};

use std::collections::HashSet;
use target_decoder::{ArchType, OsClass};

/// One fully-expanded, fully-merged variant of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub target: target_decoder::Target,
    pub os_class: OsClass,
    pub is_primary: bool,
    pub properties: PropValue,
}

/// Expand a module into its variants and merge each one's properties,
/// tying the expander and the merger together (spec sections 4.2 and 4.3
/// run back to back: first decide the target list, then merge once per
/// target).
///
/// Returns an empty `Vec` for a disabled module.
pub fn expand_module(
    expander_input: &ExpanderInput,
    base: &PropValue,
    cond: &ConditionalProperties,
    prepend_fields: &HashSet<String>,
) -> Result<Vec<Variant>> {
    let expansion = expand(expander_input)?;

    let primary_device_arch_type: Option<ArchType> = expansion
        .variants
        .iter()
        .find(|v| v.os_class == OsClass::Device && v.is_primary)
        .map(|v| v.target.arch.arch_type);

    let variants = expansion
        .variants
        .into_iter()
        .map(|v| {
            let mut properties = base.clone();
            let ctx = VariantMergeCtx {
                os: &v.target.os,
                arch: &v.target.arch,
                os_class: v.os_class,
                partition: expander_input.partition,
                primary_device_arch_type,
            };
            merge_variant(&mut properties, cond, &ctx, prepend_fields);
            Variant {
                target: v.target,
                os_class: v.os_class,
                is_primary: v.is_primary,
                properties,
            }
        })
        .collect();

    Ok(variants)
}
