/// The closed set of OS classes an `Os` can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsClass {
    Device,
    Host,
    HostCross,
    Generic,
}

/// One OS this build system knows how to target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Os {
    pub name: String,
    pub class: OsClass,
    pub default_disabled: bool,
    pub is_linux_family: bool,
    pub is_bionic_family: bool,
}

struct OsEntry {
    name: &'static str,
    class: OsClass,
    default_disabled: bool,
    is_linux_family: bool,
    is_bionic_family: bool,
}

/// The closed registry of known OSes. Adding a new OS means adding a row
/// here; nothing else in this crate infers OS properties dynamically.
const OS_REGISTRY: &[OsEntry] = &[
    OsEntry {
        name: "linux_glibc",
        class: OsClass::Host,
        default_disabled: false,
        is_linux_family: true,
        is_bionic_family: false,
    },
    OsEntry {
        name: "linux_musl",
        class: OsClass::Host,
        default_disabled: false,
        is_linux_family: true,
        is_bionic_family: false,
    },
    OsEntry {
        name: "darwin",
        class: OsClass::Host,
        default_disabled: false,
        is_linux_family: false,
        is_bionic_family: false,
    },
    OsEntry {
        name: "windows",
        class: OsClass::Host,
        default_disabled: true,
        is_linux_family: false,
        is_bionic_family: false,
    },
    OsEntry {
        name: "linux_bionic",
        class: OsClass::HostCross,
        default_disabled: false,
        is_linux_family: true,
        is_bionic_family: true,
    },
    OsEntry {
        name: "android",
        class: OsClass::Device,
        default_disabled: false,
        is_linux_family: true,
        is_bionic_family: true,
    },
    OsEntry {
        name: "fuchsia",
        class: OsClass::Device,
        default_disabled: false,
        is_linux_family: false,
        is_bionic_family: false,
    },
];

/// Look up an OS by name. Returns `None` for anything not in the closed set.
pub fn os_by_name(name: &str) -> Option<Os> {
    OS_REGISTRY.iter().find(|e| e.name == name).map(|e| Os {
        name: e.name.to_string(),
        class: e.class,
        default_disabled: e.default_disabled,
        is_linux_family: e.is_linux_family,
        is_bionic_family: e.is_bionic_family,
    })
}

/// The closed set of architecture types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ArchType {
    Arm,
    Arm64,
    Mips,
    Mips64,
    X86,
    X86_64,
    Common,
}

serde_plain::derive_fromstr_from_deserialize!(ArchType);
serde_plain::derive_display_from_serialize!(ArchType);
