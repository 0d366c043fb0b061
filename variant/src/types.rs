use std::collections::HashMap;
use target_decoder::{ArchType, Multilib, OsClass};

/// The closed set of OS-class support modes a module type can declare,
/// exactly as spec section 4.2 enumerates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsSupport {
    DeviceOnly,
    HostOnly,
    HostAndDevice,
    HostAndDeviceDefault,
    HostSupportedNoCross,
    None,
}

/// The OS classes this module is allowed to produce variants for, and
/// whether cross-compiled (host-cross) OS entries are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnabledClasses {
    pub host: bool,
    pub host_cross: bool,
    pub device: bool,
}

/// Resolve the effective set of enabled OS classes from the declared
/// support mode plus the module's own `host_supported`/`device_supported`
/// overrides (spec section 4.2 step 1).
pub fn enabled_classes(
    support: OsSupport,
    host_supported: Option<bool>,
    device_supported: Option<bool>,
) -> EnabledClasses {
    match support {
        OsSupport::DeviceOnly => EnabledClasses {
            host: false,
            host_cross: false,
            device: device_supported.unwrap_or(true),
        },
        OsSupport::HostOnly => EnabledClasses {
            host: host_supported.unwrap_or(true),
            host_cross: host_supported.unwrap_or(true),
            device: false,
        },
        OsSupport::HostSupportedNoCross => EnabledClasses {
            host: host_supported.unwrap_or(true),
            host_cross: false,
            device: false,
        },
        OsSupport::HostAndDeviceDefault => EnabledClasses {
            host: host_supported.unwrap_or(true),
            host_cross: host_supported.unwrap_or(true),
            device: device_supported.unwrap_or(true),
        },
        OsSupport::HostAndDevice => EnabledClasses {
            host: host_supported == Some(true),
            host_cross: host_supported == Some(true),
            device: device_supported.unwrap_or(true),
        },
        OsSupport::None => EnabledClasses::default(),
    }
}

impl EnabledClasses {
    pub fn allows(&self, class: OsClass) -> bool {
        match class {
            OsClass::Host => self.host,
            OsClass::HostCross => self.host_cross,
            OsClass::Device => self.device,
            OsClass::Generic => true,
        }
    }
}

/// The closed set of `compile_multilib` values (spec section 4.2 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMultilib {
    Common,
    CommonFirst,
    Both,
    Lib32,
    Lib64,
    First,
    Prefer32,
}

impl std::str::FromStr for CompileMultilib {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "common" => CompileMultilib::Common,
            "common_first" => CompileMultilib::CommonFirst,
            "both" => CompileMultilib::Both,
            "32" => CompileMultilib::Lib32,
            "64" => CompileMultilib::Lib64,
            "first" => CompileMultilib::First,
            "prefer32" => CompileMultilib::Prefer32,
            other => {
                return Err(crate::error::Error::InvalidMultilib {
                    value: other.to_string(),
                })
            }
        })
    }
}

/// Per-OS-class override of `compile_multilib`, keyed by the OS class it
/// applies to (spec section 4.2 step 3: "per-OS-class target override").
pub type MultilibOverrides = HashMap<OsClassKey, CompileMultilib>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsClassKey {
    Host,
    HostCross,
    Device,
}

impl From<OsClass> for OsClassKey {
    fn from(c: OsClass) -> Self {
        match c {
            OsClass::Host => OsClassKey::Host,
            OsClass::HostCross => OsClassKey::HostCross,
            OsClass::Device => OsClassKey::Device,
            OsClass::Generic => OsClassKey::Device,
        }
    }
}

/// Partition tags a module may carry (spec section 3 "Module"), driving
/// both the recovery-target restriction in the expander and the
/// partition-specific property groups in the merger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionTags {
    pub vendor: bool,
    pub product: bool,
    pub soc: bool,
    pub recovery: bool,
}

impl PartitionTags {
    pub fn active_tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.vendor {
            tags.push("vendor");
        }
        if self.product {
            tags.push("product");
        }
        if self.soc {
            tags.push("soc");
        }
        if self.recovery {
            tags.push("recovery");
        }
        tags
    }
}

pub(crate) fn bucket_order(prefer_32: bool) -> [Multilib; 2] {
    if prefer_32 {
        [Multilib::Lib32, Multilib::Lib64]
    } else {
        [Multilib::Lib64, Multilib::Lib32]
    }
}
