/*!
The process-wide configuration store.

Two things live here: the keyed, compute-once cache that the rest of the
core uses to avoid recomputing expensive derived values (an API-level
table, a parsed arch-feature map) more than once per process, and the
product-variable record that the target decoder consumes.

Per the design notes on global mutable state, there is no `static` anywhere
in this crate: a `ConfigStore` is an explicit value a caller constructs once
(a "build session") and threads through everywhere it's needed.
*/

mod error;

pub use error::Error;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Result<T> = std::result::Result<T, Error>;

/// An opaque token identifying one cached value. Two lookups with equal
/// tokens observe the same computation; the store does not care what the
/// token means beyond equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A compute-once, multi-reader cache keyed by an opaque token.
///
/// The first caller to ask for a given key runs the supplied closure and
/// the result is shared with every subsequent caller, including ones
/// running on other threads; this matches spec section 5's requirement
/// that writers (the closures here) must not depend on visibility-engine
/// output, since by construction a closure only ever runs once and cannot
/// observe what any other module has since published.
#[derive(Default)]
pub struct ConfigStore {
    values: Mutex<HashMap<CacheKey, Arc<dyn Any + Send + Sync>>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the value for `key`, computing it with `init` if this is the
    /// first request for that key in this store's lifetime.
    pub fn get_or_init<T, F>(&self, key: impl Into<CacheKey>, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let key = key.into();
        let mut values = self.values.lock().expect("config store poisoned");
        if let Some(existing) = values.get(&key) {
            return existing
                .clone()
                .downcast::<T>()
                .expect("cache key reused with a different value type");
        }
        let value: Arc<T> = Arc::new(init());
        values.insert(key, value.clone());
        value
    }

    /// Like `get_or_init`, but the initializer may fail; a failed
    /// initialization is not cached, so the next caller retries.
    pub fn get_or_try_init<T, E, F>(&self, key: impl Into<CacheKey>, init: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::fmt::Display,
    {
        let key = key.into();
        {
            let values = self.values.lock().expect("config store poisoned");
            if let Some(existing) = values.get(&key) {
                return Ok(existing
                    .clone()
                    .downcast::<T>()
                    .expect("cache key reused with a different value type"));
            }
        }
        let value: Arc<T> = Arc::new(init().map_err(|e| error::Error::Init {
            key: key.0.clone(),
            message: e.to_string(),
        })?);
        let mut values = self.values.lock().expect("config store poisoned");
        Ok(values.entry(key).or_insert(value).clone().downcast::<T>().expect(
            "cache key reused with a different value type",
        ))
    }
}

/// A single architecture's declared configuration, as found in the
/// product-variable record. Arch type, variant, and CPU variant are kept
/// as raw strings here; normalizing them (clearing a variant equal to the
/// arch name or to "generic") is the target decoder's job, not this
/// crate's, since this record is meant to mirror what a front end would
/// hand over unmodified.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArchSpec {
    pub arch: String,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub cpu_variant: Option<String>,
    #[serde(default)]
    pub abi: Vec<String>,
}

impl ArchSpec {
    pub fn new(arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            variant: None,
            cpu_variant: None,
            abi: Vec::new(),
        }
    }
}

/// The product-variable input to the target decoder (spec section 4.1).
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProductVariables {
    pub host_arch: ArchSpec,
    #[serde(default)]
    pub host_secondary_arch: Option<ArchSpec>,
    #[serde(default)]
    pub cross_host: Option<String>,
    #[serde(default)]
    pub cross_host_arch: Option<ArchSpec>,
    #[serde(default)]
    pub cross_host_secondary_arch: Option<ArchSpec>,
    pub device_arch: ArchSpec,
    #[serde(default)]
    pub device_secondary_arch: Option<ArchSpec>,
    #[serde(default)]
    pub fuchsia: bool,
    pub platform_sdk_version: u32,
    pub platform_sdk_final: bool,
    #[serde(default)]
    pub platform_sdk_codename: Option<String>,
}

/// The codename -> finalized-API-level table (spec section 6, "Persisted
/// state"). Produced once per process by a one-shot singleton upstream;
/// this type only knows how to parse and query it.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct ApiLevelTable(HashMap<String, u32>);

impl ApiLevelTable {
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map(Self)
            .map_err(|source| error::Error::ApiLevelTableParse { source })
    }

    pub fn get(&self, codename: &str) -> Option<u32> {
        self.0.get(codename).copied()
    }
}

/// The resolved value of an API level reference once "current" has been
/// canonicalized.
///
/// Open question carried over from the source (spec section 9): whether
/// "current" should mean "the finalized platform SDK version" or "an
/// unbounded future level" is genuinely ambiguous pre-finalization. We
/// preserve the source's behavior rather than resolve the ambiguity:
/// finalized builds see a concrete number, unfinalized ones see
/// `ApiLevel::Future`, which sorts above every finalized level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApiLevel {
    Finalized(u32),
    Future,
}

/// Resolve an API level string (a decimal number, a codename, or the
/// literal `"current"`) against the platform's finalization state.
pub fn resolve_api_level(
    requested: &str,
    table: &ApiLevelTable,
    platform_sdk_version: u32,
    platform_sdk_final: bool,
) -> Result<ApiLevel> {
    if requested == "current" {
        return Ok(if platform_sdk_final {
            ApiLevel::Finalized(platform_sdk_version)
        } else {
            ApiLevel::Future
        });
    }
    if let Ok(n) = requested.parse::<u32>() {
        return Ok(ApiLevel::Finalized(n));
    }
    table
        .get(requested)
        .map(ApiLevel::Finalized)
        .ok_or_else(|| error::Error::UnknownCodename {
            codename: requested.to_string(),
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn cache_computes_once() {
        let store = ConfigStore::new();
        let calls = AtomicU32::new(0);
        let a = store.get_or_init("k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            42u32
        });
        let b = store.get_or_init("k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            99u32
        });
        assert_eq!(*a, 42);
        assert_eq!(*b, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_init_is_not_cached() {
        let store = ConfigStore::new();
        let first: Result<Arc<u32>> = store.get_or_try_init("k", || Err("boom"));
        assert!(first.is_err());
        let second: Result<Arc<u32>> = store.get_or_try_init("k", || Ok(7u32));
        assert_eq!(*second.unwrap(), 7);
    }

    #[test]
    fn current_resolves_to_finalized_version_when_platform_final() {
        let table = ApiLevelTable::default();
        let level = resolve_api_level("current", &table, 34, true).unwrap();
        assert_eq!(level, ApiLevel::Finalized(34));
    }

    #[test]
    fn current_resolves_to_future_when_platform_not_final() {
        let table = ApiLevelTable::default();
        let level = resolve_api_level("current", &table, 34, false).unwrap();
        assert_eq!(level, ApiLevel::Future);
        assert!(ApiLevel::Future > ApiLevel::Finalized(10_000));
    }

    #[test]
    fn codename_resolves_through_table() {
        let table = ApiLevelTable::from_json(r#"{"Tiramisu": 33}"#).unwrap();
        let level = resolve_api_level("Tiramisu", &table, 34, true).unwrap();
        assert_eq!(level, ApiLevel::Finalized(33));
    }

    #[test]
    fn unknown_codename_fails() {
        let table = ApiLevelTable::default();
        assert!(resolve_api_level("NotARealCodename", &table, 34, true).is_err());
    }
}
