/*!
Typed path values for the build graph.

A module's declaration lives in some directory; every path it refers to
(a source file it owns, an output the build graph will produce, a path it
is merely allowed to write into) is distinct in what it's allowed to be used
for. Mixing these up is a common source of bugs in build systems that pass
plain `PathBuf` everywhere, so we give each kind its own newtype and only
expose the conversions that are actually safe.

None of the types here know how to discover files on disk: there is no
globbing or directory walking here, that's left to the declaration-language
front end, which is out of scope for this crate.
*/

mod error;

pub use error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, Error>;

/// A path to a file that a module declares as one of its own sources, relative
/// to the root of the source tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePath(PathBuf);

/// A path to a file the build graph will produce, relative to the output
/// root for the variant that produces it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputPath(PathBuf);

/// A path a rule is allowed to write into that is neither a declared output
/// nor a source; used for install rules and other path-policy decisions that
/// live outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WritablePath(PathBuf);

/// A path given relative to the directory containing a module's declaration.
/// This is the only path type that the declaration front end is expected to
/// produce directly; everything else is derived from it plus context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleRelativePath(PathBuf);

macro_rules! path_newtype {
    ($t:ty) => {
        impl $t {
            pub fn as_path(&self) -> &Path {
                &self.0
            }

            pub fn into_path_buf(self) -> PathBuf {
                self.0
            }
        }

        impl AsRef<Path> for $t {
            fn as_ref(&self) -> &Path {
                &self.0
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.display())
            }
        }
    };
}

path_newtype!(SourcePath);
path_newtype!(OutputPath);
path_newtype!(WritablePath);
path_newtype!(ModuleRelativePath);

impl ModuleRelativePath {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        error::ensure_relative(&path)?;
        Ok(Self(path))
    }

    /// Resolve against the declaration-file directory of the module that owns it.
    pub fn to_source_path(&self, module_dir: &Path) -> SourcePath {
        SourcePath(module_dir.join(&self.0))
    }
}

impl SourcePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

impl OutputPath {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        error::ensure_relative(&path)?;
        Ok(Self(path))
    }

    /// Resolve against the output root of the variant that owns this path.
    pub fn under(&self, variant_out_dir: &Path) -> PathBuf {
        variant_out_dir.join(&self.0)
    }
}

impl WritablePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

/// Read-only view a module's action-generation code gets of the wider build:
/// configuration lookup, error reporting, and the already-resolved list of
/// its dependencies. Mutating the graph is not possible through this trait;
/// all mutation happens through the mutator pipeline in `module-graph`.
pub trait BuildContext {
    /// Opaque dependency handle type; `module-graph` supplies the concrete one.
    type DepHandle;

    /// Look up a process-wide configuration value by key, computed at most
    /// once per process by the owning session (see `config-store`).
    fn config<T: 'static>(&self, key: &str) -> Option<&T>;

    /// Record a module-scoped error without aborting the rest of the mutator
    /// phase; see spec §7 propagation policy.
    fn report_error(&mut self, message: impl Into<String>);

    /// The dependencies this module declared, in declaration order.
    fn dependencies(&self) -> &[Self::DepHandle];
}
