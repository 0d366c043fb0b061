/*!
Visibility pattern parsing and effective-rule computation (spec section
4.5): which packages are allowed to depend on a module.
*/

pub mod error;

pub use error::{Error, Result};

const VENDOR: &str = "vendor";

/// One parsed visibility pattern, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Package(String),
    Subpackages(String),
    Public,
    Private,
    Override,
    AnyPartition,
    LegacyPublic,
}

fn parse_pattern(raw: &str, declaring_pkg: &str) -> Result<Pattern> {
    match raw {
        "//visibility:public" => Ok(Pattern::Public),
        "//visibility:private" => Ok(Pattern::Private),
        "//visibility:override" => Ok(Pattern::Override),
        "//visibility:any_partition" => Ok(Pattern::AnyPartition),
        "//visibility:legacy_public" => Ok(Pattern::LegacyPublic),
        ":__subpackages__" => Ok(Pattern::Subpackages(declaring_pkg.to_string())),
        ":__pkg__" => Ok(Pattern::Package(declaring_pkg.to_string())),
        _ => {
            let Some(rest) = raw.strip_prefix("//") else {
                return Err(Error::InvalidPattern {
                    pattern: raw.to_string(),
                });
            };
            match rest.rsplit_once(':') {
                Some((pkg, "__subpackages__")) => Ok(Pattern::Subpackages(pkg.to_string())),
                Some((pkg, "__pkg__")) => Ok(Pattern::Package(pkg.to_string())),
                Some(_) => Err(Error::InvalidPattern {
                    pattern: raw.to_string(),
                }),
                None if !rest.is_empty() && !rest.contains(':') => {
                    Ok(Pattern::Package(rest.to_string()))
                }
                None => Err(Error::InvalidPattern {
                    pattern: raw.to_string(),
                }),
            }
        }
    }
}

fn referenced_package(pattern: &Pattern) -> Option<&str> {
    match pattern {
        Pattern::Package(p) | Pattern::Subpackages(p) => Some(p),
        _ => None,
    }
}

fn is_within_vendor(pkg: &str) -> bool {
    pkg == VENDOR || pkg.starts_with("vendor/")
}

/// Parse and validate one module's declared visibility pattern list.
/// `patterns` is `None` when the module declared no `visibility` field at
/// all (distinct from declaring an empty list, which is `EmptyList`).
pub fn validate_patterns(declaring_pkg: &str, patterns: Option<&[String]>) -> Result<Vec<Pattern>> {
    let Some(patterns) = patterns else {
        return Ok(Vec::new());
    };
    if patterns.is_empty() {
        return Err(Error::EmptyList);
    }

    let parsed: Vec<Pattern> = patterns
        .iter()
        .map(|p| parse_pattern(p, declaring_pkg))
        .collect::<Result<_>>()?;

    if parsed.iter().any(|p| matches!(p, Pattern::LegacyPublic)) {
        return Err(Error::LegacyPublicForbidden);
    }

    let has_special = parsed
        .iter()
        .any(|p| matches!(p, Pattern::Public | Pattern::Private));
    if has_special && parsed.len() > 1 {
        return Err(Error::MixedSpecial);
    }

    if let Some(pos) = parsed.iter().position(|p| matches!(p, Pattern::Override)) {
        if pos != 0 {
            return Err(Error::MisplacedOverride);
        }
    }

    if !is_within_vendor(declaring_pkg) {
        for pattern in &parsed {
            if let Some(target) = referenced_package(pattern) {
                if is_within_vendor(target) && !matches!(pattern, Pattern::Subpackages(p) if p == VENDOR) {
                    return Err(Error::CrossVendor {
                        from: declaring_pkg.to_string(),
                        to: target.to_string(),
                    });
                }
            }
        }
    }

    Ok(parsed)
}

/// What a module's effective rules resolve to, once `public`/`private` are
/// accounted for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    Public,
    Private,
    Patterns(Vec<Pattern>),
}

/// The fully-resolved set of packages a module is visible to. The
/// declaring package is always implicitly visible to itself, independent
/// of the resolved pattern list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveRules {
    declaring_pkg: String,
    resolved: Resolved,
}

impl EffectiveRules {
    /// Does `requesting_pkg` satisfy these rules? `is_partition_builder`
    /// gates the `any_partition` pattern, which only ever matches a
    /// dedicated filesystem-builder module type.
    pub fn allows(&self, requesting_pkg: &str, is_partition_builder: bool) -> bool {
        if requesting_pkg == self.declaring_pkg {
            return true;
        }
        match &self.resolved {
            Resolved::Public => true,
            Resolved::Private => false,
            Resolved::Patterns(patterns) => patterns.iter().any(|p| match p {
                Pattern::Package(pkg) => requesting_pkg == pkg,
                Pattern::Subpackages(pkg) => {
                    requesting_pkg == pkg || requesting_pkg.starts_with(&format!("{pkg}/"))
                }
                Pattern::AnyPartition => is_partition_builder,
                _ => false,
            }),
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self.resolved, Resolved::Public)
    }

    pub fn public(declaring_pkg: impl Into<String>) -> Self {
        Self {
            declaring_pkg: declaring_pkg.into(),
            resolved: Resolved::Public,
        }
    }

    pub fn private(declaring_pkg: impl Into<String>) -> Self {
        Self {
            declaring_pkg: declaring_pkg.into(),
            resolved: Resolved::Private,
        }
    }

    pub fn patterns(declaring_pkg: impl Into<String>, patterns: Vec<Pattern>) -> Self {
        Self {
            declaring_pkg: declaring_pkg.into(),
            resolved: Resolved::Patterns(patterns),
        }
    }

    /// A human-readable suggestion for the minimal rule that would admit
    /// `requesting_pkg`, used in the `NotVisible` diagnostic.
    pub fn hint_for(requesting_pkg: &str) -> String {
        format!("//{requesting_pkg}:__pkg__")
    }
}

fn resolve_specials(patterns: Vec<Pattern>, declaring_pkg: &str) -> EffectiveRules {
    let resolved = if patterns.iter().any(|p| matches!(p, Pattern::Public)) {
        Resolved::Public
    } else if patterns.iter().any(|p| matches!(p, Pattern::Private)) || patterns.is_empty() {
        Resolved::Private
    } else {
        Resolved::Patterns(patterns)
    };
    EffectiveRules {
        declaring_pkg: declaring_pkg.to_string(),
        resolved,
    }
}

/// Compute a module's effective visibility rules (spec section 4.5 steps
/// 1-5).
///
/// `own` is the module's own (already-validated) pattern list, if it
/// declared one. `package_default_visibility` is the nearest enclosing
/// `default_visibility` found by searching upward through declaration-file
/// directories, already validated. `defaults_rules` is the already-computed
/// effective rules of each "defaults" module this module depends on.
pub fn compute_effective(
    declaring_pkg: &str,
    own: Option<Vec<Pattern>>,
    package_default_visibility: Option<Vec<Pattern>>,
    defaults_rules: &[EffectiveRules],
) -> EffectiveRules {
    let base = own.or(package_default_visibility).unwrap_or_default();

    if let Some(Pattern::Override) = base.first() {
        let tail = base[1..].to_vec();
        return resolve_specials(tail, declaring_pkg);
    }

    let mut merged = base;
    for rule in defaults_rules {
        match &rule.resolved {
            Resolved::Public => {
                if !merged.contains(&Pattern::Public) {
                    merged.push(Pattern::Public);
                }
            }
            Resolved::Private => {}
            Resolved::Patterns(patterns) => {
                for p in patterns {
                    if !merged.contains(p) {
                        merged.push(p.clone());
                    }
                }
            }
        }
    }

    resolve_specials(merged, declaring_pkg)
}

/// Enforce visibility for one dependency edge `parent -> child`, unless the
/// two are a prebuilt/source twin pair (exempt per spec section 4.5).
pub fn enforce(
    parent_pkg: &str,
    child_name: &str,
    child_rules: &EffectiveRules,
    is_partition_builder: bool,
    prebuilt_source_twin: bool,
) -> Result<()> {
    if prebuilt_source_twin {
        return Ok(());
    }
    if child_rules.allows(parent_pkg, is_partition_builder) {
        Ok(())
    } else {
        Err(Error::NotVisible {
            parent: parent_pkg.to_string(),
            child: child_name.to_string(),
            hint: EffectiveRules::hint_for(parent_pkg),
        })
    }
}
