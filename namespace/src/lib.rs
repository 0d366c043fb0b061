/*!
Namespace tree and name resolution (spec section 4.4).

A namespace is a directory-rooted scope: every declaration-file directory
belongs to exactly one namespace, the nearest ancestor directory (walking
up from the file towards the root) at which a namespace was explicitly
registered. Namespace paths are plain, slash-separated, and do not carry a
leading `//`; that syntax belongs to the qualified-reference grammar this
crate parses on the way in, and to the package-path grammar the
`visibility` crate parses separately.
*/

pub mod error;

pub use error::{Error, Result};

use std::collections::{BTreeMap, BTreeSet};

const ROOT: &str = "";

#[derive(Debug, Default)]
struct NamespaceData {
    imports: Vec<String>,
    modules: BTreeSet<String>,
    visible: Option<Vec<String>>,
    id: Option<usize>,
}

/// The namespace tree for one build: every registered namespace, the
/// modules declared in each, and (once finalized) each namespace's
/// resolved visible-namespaces list and stable integer id.
#[derive(Debug)]
pub struct NamespaceTree {
    namespaces: BTreeMap<String, NamespaceData>,
    finalized: bool,
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTree {
    /// A fresh tree with just the root namespace registered.
    pub fn new() -> Self {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(ROOT.to_string(), NamespaceData::default());
        Self {
            namespaces,
            finalized: false,
        }
    }

    /// Declare a new namespace rooted at `dir`. `dir` must not already have
    /// a namespace registered directly at it.
    pub fn register_namespace(&mut self, dir: &str) -> Result<()> {
        if self.finalized {
            return Err(Error::InsertAfterSort);
        }
        if self.namespaces.contains_key(dir) {
            return Err(Error::DuplicateNamespace {
                path: dir.to_string(),
            });
        }
        self.namespaces.insert(dir.to_string(), NamespaceData::default());
        Ok(())
    }

    /// Register a module declared in file directory `decl_dir`, returning
    /// the namespace path it lands in (the nearest ancestor directory with
    /// a registered namespace).
    pub fn register_module(&mut self, decl_dir: &str, name: &str) -> Result<String> {
        if self.finalized {
            return Err(Error::InsertAfterSort);
        }
        let ns_path = self.owning_namespace(decl_dir);
        self.namespaces
            .get_mut(&ns_path)
            .expect("owning_namespace always returns a registered path")
            .modules
            .insert(name.to_string());
        Ok(ns_path)
    }

    /// The namespace path that owns `decl_dir`: the longest registered
    /// ancestor directory, falling back to root.
    pub fn owning_namespace(&self, decl_dir: &str) -> String {
        let mut candidate = decl_dir;
        loop {
            if self.namespaces.contains_key(candidate) {
                return candidate.to_string();
            }
            match candidate.rsplit_once('/') {
                Some((parent, _)) => candidate = parent,
                None => return ROOT.to_string(),
            }
        }
    }

    /// Declare that `ns_path` imports `target`.
    pub fn add_import(&mut self, ns_path: &str, target: &str) -> Result<()> {
        if self.finalized {
            return Err(Error::InsertAfterSort);
        }
        if !self.namespaces.contains_key(target) {
            return Err(Error::UnknownNamespace {
                path: target.to_string(),
            });
        }
        self.namespaces
            .get_mut(ns_path)
            .ok_or_else(|| Error::UnknownNamespace {
                path: ns_path.to_string(),
            })?
            .imports
            .push(target.to_string());
        Ok(())
    }

    /// Compute every namespace's visible-namespaces list and assign stable
    /// integer ids in sorted-path order. No further registration or import
    /// calls are allowed after this.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        let imports: BTreeMap<String, Vec<String>> = self
            .namespaces
            .iter()
            .map(|(path, data)| (path.clone(), data.imports.clone()))
            .collect();

        for (path, data) in self.namespaces.iter_mut() {
            let mut visible = vec![path.clone()];
            for import in &imports[path] {
                if !visible.contains(import) {
                    visible.push(import.clone());
                }
            }
            if !visible.contains(&ROOT.to_string()) {
                visible.push(ROOT.to_string());
            }
            data.visible = Some(visible);
        }

        for (id, data) in self.namespaces.values_mut().enumerate() {
            data.id = Some(id);
        }

        self.finalized = true;
    }

    fn id_of(&self, ns_path: &str) -> Option<usize> {
        self.namespaces.get(ns_path).and_then(|d| d.id)
    }

    /// The globally unique module identifier for `name` declared in
    /// `ns_path`: `"<nsId>-<name>"`, with an empty id for the root
    /// namespace.
    pub fn module_id(&self, ns_path: &str, name: &str) -> Option<String> {
        let id = self.id_of(ns_path)?;
        let prefix = if ns_path == ROOT {
            String::new()
        } else {
            id.to_string()
        };
        Some(format!("{prefix}-{name}"))
    }

    /// Resolve `reference` as seen from `requester_ns`. A reference of the
    /// form `"//pkg:name"` is split into a namespace path and a module name
    /// and looked up directly, bypassing visibility-of-namespaces entirely.
    /// Anything else is searched through `requester_ns`'s visible list:
    /// self, then each import in declaration order, then root.
    pub fn resolve(&self, requester_ns: &str, reference: &str) -> Result<String> {
        if let Some(stripped) = reference.strip_prefix("//") {
            let (ns_path, name) = stripped.rsplit_once(':').unwrap_or(("", stripped));
            return self.resolve_qualified(ns_path, name);
        }
        self.resolve_unqualified(requester_ns, reference)
    }

    fn resolve_qualified(&self, ns_path: &str, name: &str) -> Result<String> {
        let data = self
            .namespaces
            .get(ns_path)
            .ok_or_else(|| Error::UnresolvedModule {
                name: name.to_string(),
                containing: Vec::new(),
                visible: Vec::new(),
            })?;
        if data.modules.contains(name) {
            Ok(self.module_id(ns_path, name).expect("namespace just looked up"))
        } else {
            Err(Error::UnresolvedModule {
                name: name.to_string(),
                containing: self.namespaces_containing(name),
                visible: vec![ns_path.to_string()],
            })
        }
    }

    fn resolve_unqualified(&self, requester_ns: &str, name: &str) -> Result<String> {
        let visible = self
            .visible(requester_ns)
            .ok_or_else(|| Error::UnresolvedModule {
                name: name.to_string(),
                containing: self.namespaces_containing(name),
                visible: Vec::new(),
            })?;
        for ns_path in visible {
            if let Some(data) = self.namespaces.get(ns_path) {
                if data.modules.contains(name) {
                    return Ok(self.module_id(ns_path, name).expect("namespace just looked up"));
                }
            }
        }
        Err(Error::UnresolvedModule {
            name: name.to_string(),
            containing: self.namespaces_containing(name),
            visible: visible.clone(),
        })
    }

    /// The resolved visible-namespaces list for `ns_path`, or `None` before
    /// `finalize()` has run.
    pub fn visible(&self, ns_path: &str) -> Option<&[String]> {
        self.namespaces.get(ns_path)?.visible.as_deref()
    }

    fn namespaces_containing(&self, name: &str) -> Vec<String> {
        self.namespaces
            .iter()
            .filter(|(_, data)| data.modules.contains(name))
            .map(|(path, _)| path.clone())
            .collect()
    }
}
