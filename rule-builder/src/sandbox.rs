/*!
The sandbox manifest (spec section 4.6/6): the serialized record a rule's
command is wrapped in when `sbox()` is enabled. The downstream executor is
out of scope for this crate (it is the thing that actually reads this
manifest and performs the copies); this module only knows how to build and
serialize the manifest, not how to execute it.
*/

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const SBOX_OUT_DIR_TOKEN: &str = "__SBOX_OUT_DIR__";

/// One file copied into or out of the sandbox before/after the command
/// runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copy {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub executable: bool,
}

/// A response file written inside the sandbox and mapped back to its
/// real-path counterpart once the command completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspFileMapping {
    pub sandbox_path: String,
    pub real_path: String,
}

/// One command entry in the manifest's ordered command list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCommand {
    pub command: String,
    pub copy_before: Vec<Copy>,
    pub copy_after: Vec<Copy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rsp_files: Vec<RspFileMapping>,
    pub chdir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_depfile: Option<String>,
}

/// The full sandbox manifest for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxManifest {
    pub commands: Vec<ManifestCommand>,
    /// SHA-256 of the sorted input list, hex-encoded. Changes whenever the
    /// logical input set changes, independent of command text, so the
    /// manifest (and therefore the executor's view of the rule) changes
    /// whenever inputs do.
    pub input_hash: String,
}

/// Compute the manifest's `input_hash`: SHA-256 over the sorted, newline
/// joined input list.
pub fn input_hash(inputs: &[String]) -> String {
    let mut sorted = inputs.to_vec();
    sorted.sort();
    let mut hasher = Sha256::new();
    for i in &sorted {
        hasher.update(i.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn input_hash_is_order_independent() {
        let a = input_hash(&["b".to_string(), "a".to_string()]);
        let b = input_hash(&["a".to_string(), "b".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn input_hash_changes_with_input_set() {
        let a = input_hash(&["a".to_string()]);
        let b = input_hash(&["a".to_string(), "b".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = SandboxManifest {
            commands: vec![ManifestCommand {
                command: "compile a.in".to_string(),
                copy_before: vec![Copy {
                    from: "a.in".to_string(),
                    to: format!("{SBOX_OUT_DIR_TOKEN}/a.in"),
                    executable: false,
                }],
                copy_after: vec![Copy {
                    from: format!("{SBOX_OUT_DIR_TOKEN}/out/x"),
                    to: "out/x".to_string(),
                    executable: false,
                }],
                rsp_files: vec![],
                chdir: true,
                output_depfile: None,
            }],
            input_hash: input_hash(&["a.in".to_string()]),
        };
        let json = serde_json::to_string(&manifest).unwrap();
        let back: SandboxManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
    }
}
