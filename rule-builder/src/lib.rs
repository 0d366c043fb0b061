/*!
The rule builder / sandboxed command abstraction (spec section 4.6): a
single-threaded accumulator that turns a sequence of command fragments into
one build-graph edge (section 6, "Dependency format produced"), optionally
wrapped in a path-remapping sandbox (section 6, "Sandbox manifest").

A `RuleBuilder` owns its command list exclusively until `build()` is
called; nothing here is shared across threads, matching section 5's
"Rule-builder state is exclusive to one module-action call; never shared."

Programmer-invariant violations (double `sbox()`, `sbox()` after
`command()`, no declared outputs) are fatal: they indicate a bug in the
caller's action-generation code, not bad user input, so this crate panics
rather than returning a `Result` for them (spec section 7).
*/

pub mod error;
pub mod sandbox;

pub use error::Error;
use sandbox::{Copy, ManifestCommand, RspFileMapping, SandboxManifest, SBOX_OUT_DIR_TOKEN};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Which filesystem format a depfile is written in. `Gcc` is the only
/// format the downstream executor (out of scope) is required to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepfileFormat {
    Gcc,
}

/// Which execution pool an edge is scheduled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    Local,
    HighMem,
    Remote,
}

/// Ambient state about the build that affects pool selection; not part of
/// the rule builder's own accumulated state, supplied only at `build()`
/// time.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildEnv {
    pub remote_exec_enabled: bool,
}

/// A response file: a path plus the content a `@file`-style command-line
/// argument would read from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolKind {
    Built,
    Prebuilt,
    Packaged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ToolRef {
    path: String,
    #[allow(dead_code)]
    kind: ToolKind,
}

/// One command fragment accumulated into a rule. Multiple commands in one
/// rule are joined with `&&` when the final edge command string is built.
#[derive(Debug, Default)]
pub struct CommandBuilder {
    text: String,
    inputs: Vec<String>,
    implicits: Vec<String>,
    order_only: Vec<String>,
    validations: Vec<String>,
    outputs: Vec<String>,
    symlink_outputs: Vec<String>,
    implicit_outputs: Vec<String>,
    depfiles: Vec<String>,
    tools: Vec<ToolRef>,
    rsp_files: Vec<RspFile>,
}

impl CommandBuilder {
    fn push_text(&mut self, s: &str) -> &mut Self {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(s);
        self
    }

    /// Append raw, unstructured text (a sub-shell operator, a literal
    /// argument that isn't a path).
    pub fn text(&mut self, s: impl fmt::Display) -> &mut Self {
        self.push_text(&s.to_string())
    }

    /// Append a bare flag with no argument.
    pub fn flag(&mut self, flag: impl fmt::Display) -> &mut Self {
        self.push_text(&flag.to_string())
    }

    pub fn flag_with_arg(&mut self, flag: impl fmt::Display, arg: impl fmt::Display) -> &mut Self {
        self.push_text(&format!("{flag}{arg}"))
    }

    pub fn flag_with_list(
        &mut self,
        flag: impl fmt::Display,
        sep: &str,
        items: impl IntoIterator<Item = impl fmt::Display>,
    ) -> &mut Self {
        let joined = items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(sep);
        self.push_text(&format!("{flag}{joined}"))
    }

    pub fn flag_for_each_arg(
        &mut self,
        flag: impl fmt::Display,
        items: impl IntoIterator<Item = impl fmt::Display>,
    ) -> &mut Self {
        let flag = flag.to_string();
        for item in items {
            self.push_text(&format!("{flag}{item}"));
        }
        self
    }

    pub fn input(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.push_text(&path);
        self.inputs.push(path);
        self
    }

    pub fn inputs(&mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        for p in paths {
            self.input(p);
        }
        self
    }

    pub fn flag_with_input(&mut self, flag: impl fmt::Display, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.inputs.push(path.clone());
        self.push_text(&format!("{flag}{path}"))
    }

    pub fn flag_with_input_list(
        &mut self,
        flag: impl fmt::Display,
        sep: &str,
        paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        self.inputs.extend(paths.iter().cloned());
        let joined = paths.join(sep);
        self.push_text(&format!("{flag}{joined}"))
    }

    pub fn flag_for_each_input(
        &mut self,
        flag: impl fmt::Display,
        paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        let flag = flag.to_string();
        for p in paths {
            let p = p.into();
            self.inputs.push(p.clone());
            self.push_text(&format!("{flag}{p}"));
        }
        self
    }

    /// A dependency edge that does not appear in the command line.
    pub fn implicit(&mut self, path: impl Into<String>) -> &mut Self {
        self.implicits.push(path.into());
        self
    }

    pub fn implicits(&mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        for p in paths {
            self.implicit(p);
        }
        self
    }

    /// An ordering-only dependency: must exist before the command runs,
    /// but a change to it doesn't force a rerun.
    pub fn order_only(&mut self, path: impl Into<String>) -> &mut Self {
        self.order_only.push(path.into());
        self
    }

    /// A validation dependency: built alongside this rule's outputs but
    /// never causes this rule itself to rerun.
    pub fn validation(&mut self, path: impl Into<String>) -> &mut Self {
        self.validations.push(path.into());
        self
    }

    pub fn output(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.push_text(&path);
        self.outputs.push(path);
        self
    }

    pub fn outputs(&mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        for p in paths {
            self.output(p);
        }
        self
    }

    pub fn flag_with_output(&mut self, flag: impl fmt::Display, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.outputs.push(path.clone());
        self.push_text(&format!("{flag}{path}"))
    }

    /// An output produced as a side effect, not named on the command line.
    pub fn implicit_output(&mut self, path: impl Into<String>) -> &mut Self {
        self.implicit_outputs.push(path.into());
        self
    }

    /// An output that is a symlink to another output or input.
    pub fn symlink_output(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.push_text(&path);
        self.symlink_outputs.push(path);
        self
    }

    pub fn dep_file(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.push_text(&path);
        self.depfiles.push(path);
        self
    }

    /// A depfile produced as a side effect, without a corresponding
    /// command-line argument.
    pub fn implicit_dep_file(&mut self, path: impl Into<String>) -> &mut Self {
        self.depfiles.push(path.into());
        self
    }

    pub fn flag_with_dep_file(&mut self, flag: impl fmt::Display, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.depfiles.push(path.clone());
        self.push_text(&format!("{flag}{path}"))
    }

    pub fn flag_with_rsp_file_input_list(
        &mut self,
        flag: impl fmt::Display,
        rsp_path: impl Into<String>,
        inputs: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        let rsp_path = rsp_path.into();
        let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        self.inputs.extend(inputs.iter().cloned());
        self.rsp_files.push(RspFile {
            path: rsp_path.clone(),
            content: inputs.join("\n"),
        });
        self.push_text(&format!("{flag}{rsp_path}"))
    }

    fn tool_ref(&mut self, path: impl Into<String>, kind: ToolKind) -> &mut Self {
        let path = path.into();
        self.tools.push(ToolRef {
            path: path.clone(),
            kind,
        });
        self.push_text(&path)
    }

    /// A tool invoked by this command, of unspecified provenance.
    pub fn tool(&mut self, path: impl Into<String>) -> &mut Self {
        self.tool_ref(path, ToolKind::Built)
    }

    /// A tool built from source earlier in the same build.
    pub fn built_tool(&mut self, path: impl Into<String>) -> &mut Self {
        self.tool_ref(path, ToolKind::Built)
    }

    /// A tool that ships prebuilt rather than being compiled.
    pub fn prebuilt_build_tool(&mut self, path: impl Into<String>) -> &mut Self {
        self.tool_ref(path, ToolKind::Prebuilt)
    }

    /// A tool referenced via a packaged tool archive; still appears on the
    /// command line.
    pub fn packaged_tool(&mut self, path: impl Into<String>) -> &mut Self {
        self.tool_ref(path, ToolKind::Packaged)
    }

    /// A packaged tool dependency with no command-line appearance (e.g. a
    /// plugin loaded indirectly by another tool already on the line).
    pub fn implicit_packaged_tool(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.tools.push(ToolRef {
            path,
            kind: ToolKind::Packaged,
        });
        self
    }
}

struct SandboxState {
    out_dir: String,
    manifest_path: String,
    sandbox_tools: bool,
    sandbox_inputs: bool,
}

/// A single-threaded accumulator for one build-graph edge.
#[derive(Default)]
pub struct RuleBuilder {
    commands: Vec<CommandBuilder>,
    temporary: BTreeSet<String>,
    restat: bool,
    high_mem: bool,
    remoteable: Option<bool>,
    rewrapper_params: Option<Vec<(String, String)>>,
    sandbox: Option<SandboxState>,
    missing_deps: Vec<String>,
}

/// The outcome of `build()`: the emitted edge, and (when sandboxed) the
/// manifest that edge's command depends on.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub edge: BuildEdge,
    pub manifest: Option<SandboxManifest>,
}

/// The build-graph edge this crate ultimately produces (spec section 6,
/// "Dependency format produced"). Kept `serde`-serializable so a harness
/// binary can dump it for inspection; actually consuming it is the
/// downstream executor's job and out of scope here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEdge {
    pub rule_name: String,
    pub command: String,
    pub command_deps: Vec<String>,
    pub pool: Pool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsp_file: Option<RspFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depfile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depfile_format: Option<DepfileFormat>,
    pub output: String,
    pub implicit_outputs: Vec<String>,
    pub symlink_outputs: Vec<String>,
    pub inputs: Vec<String>,
    pub order_only_inputs: Vec<String>,
    pub validations: Vec<String>,
    pub description: String,
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`, so the
/// result is safe to use as a rule name in any executor's syntax.
pub fn escape_rule_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl RuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new command fragment and return it for chaining.
    pub fn command(&mut self) -> &mut CommandBuilder {
        self.commands.push(CommandBuilder::default());
        self.commands.last_mut().expect("just pushed")
    }

    /// Mark `path` as an intermediate output: excluded from the edge's
    /// final output set and deleted by `delete_temporary_files()`.
    pub fn temporary(&mut self, path: impl Into<String>) -> &mut Self {
        self.temporary.insert(path.into());
        self
    }

    /// Append a final `rm -f` command over the sorted temporary-file set.
    pub fn delete_temporary_files(&mut self) -> &mut Self {
        if self.temporary.is_empty() {
            return self;
        }
        let sorted: Vec<&String> = self.temporary.iter().collect();
        let list = sorted
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        self.command().text(format!("rm -f {list}"));
        self
    }

    pub fn restat(&mut self) -> &mut Self {
        self.restat = true;
        self
    }

    pub fn high_mem(&mut self) -> &mut Self {
        self.high_mem = true;
        self
    }

    pub fn remoteable(&mut self, supports: bool) -> &mut Self {
        self.remoteable = Some(supports);
        self
    }

    pub fn rewrapper(&mut self, params: Vec<(String, String)>) -> &mut Self {
        let sandbox_inputs = self.sandbox.as_ref().map(|s| s.sandbox_inputs).unwrap_or(false);
        if !sandbox_inputs {
            panic!("{}", Error::RewrapperRequiresSandboxInputs);
        }
        self.rewrapper_params = Some(params);
        self
    }

    /// Enable sandboxing. Must be called before any `command()` and at
    /// most once.
    pub fn sbox(&mut self, out_dir: impl Into<String>, manifest_path: impl Into<String>) -> &mut Self {
        if self.sandbox.is_some() {
            panic!("{}", Error::DoubleSbox);
        }
        if !self.commands.is_empty() {
            panic!("{}", Error::SboxAfterCommand);
        }
        self.sandbox = Some(SandboxState {
            out_dir: out_dir.into(),
            manifest_path: manifest_path.into(),
            sandbox_tools: false,
            sandbox_inputs: false,
        });
        self
    }

    pub fn sandbox_tools(&mut self) -> &mut Self {
        self.sandbox.as_mut().expect("sbox() must be called first").sandbox_tools = true;
        self
    }

    pub fn sandbox_inputs(&mut self) -> &mut Self {
        let s = self.sandbox.as_mut().expect("sbox() must be called first");
        s.sandbox_tools = true;
        s.sandbox_inputs = true;
        self
    }

    /// Record that `name` could not be resolved; `build()` will emit a
    /// single error edge instead of the real command (spec section 7,
    /// "Missing-dependency mode").
    pub fn add_missing_dependency(&mut self, name: impl Into<String>) -> &mut Self {
        self.missing_deps.push(name.into());
        self
    }

    fn aggregate_outputs(&self) -> (Vec<String>, Vec<String>, Vec<String>) {
        let mut outputs = Vec::new();
        let mut implicit_outputs = Vec::new();
        let mut symlink_outputs = Vec::new();
        for c in &self.commands {
            for o in &c.outputs {
                if !self.temporary.contains(o) {
                    outputs.push(o.clone());
                }
            }
            for o in &c.implicit_outputs {
                if !self.temporary.contains(o) {
                    implicit_outputs.push(o.clone());
                }
            }
            symlink_outputs.extend(c.symlink_outputs.iter().cloned());
        }
        (outputs, implicit_outputs, symlink_outputs)
    }

    /// Finish accumulating and produce the edge (and, if sandboxed, the
    /// manifest). Panics on any of the programmer-invariant violations
    /// documented on this crate (no outputs).
    pub fn build(&mut self, name: impl Into<String>, description: impl Into<String>, env: BuildEnv) -> BuildResult {
        let (outputs, implicit_outputs, symlink_outputs) = self.aggregate_outputs();
        if outputs.is_empty() && implicit_outputs.is_empty() {
            panic!("{}", Error::NoOutputs);
        }

        let all_outputs: BTreeSet<&String> = outputs
            .iter()
            .chain(implicit_outputs.iter())
            .chain(symlink_outputs.iter())
            .collect();

        let mut depfiles: Vec<String> = self.commands.iter().flat_map(|c| c.depfiles.iter().cloned()).collect();
        let primary_depfile = if depfiles.is_empty() {
            None
        } else {
            Some(depfiles.remove(0))
        };

        let mut dep_fixer_text = None;
        if let Some(primary) = &primary_depfile {
            if !depfiles.is_empty() {
                let extra = depfiles.join(" ");
                dep_fixer_text = Some(format!("cat {extra} >> {primary}"));
            }
        }

        let all_depfiles: BTreeSet<&String> = primary_depfile.iter().chain(depfiles.iter()).collect();

        let mut raw_inputs: Vec<String> = Vec::new();
        let mut implicits: Vec<String> = Vec::new();
        let mut order_only: Vec<String> = Vec::new();
        let mut validations: Vec<String> = Vec::new();
        for c in &self.commands {
            raw_inputs.extend(c.inputs.iter().cloned());
            implicits.extend(c.implicits.iter().cloned());
            order_only.extend(c.order_only.iter().cloned());
            validations.extend(c.validations.iter().cloned());
        }

        let filter_self_produced = |list: Vec<String>| -> Vec<String> {
            list.into_iter()
                .filter(|p| !all_outputs.contains(p) && !all_depfiles.contains(p))
                .collect()
        };
        let inputs = filter_self_produced(raw_inputs);
        let implicits = filter_self_produced(implicits);

        let mut sorted_inputs_for_hash: Vec<String> = inputs.clone();
        sorted_inputs_for_hash.extend(implicits.iter().cloned());

        let rsp_files: Vec<RspFile> = self.commands.iter().flat_map(|c| c.rsp_files.iter().cloned()).collect();
        let (native_rsp_file, extra_rsp_files) = if rsp_files.is_empty() {
            (None, Vec::new())
        } else {
            let mut it = rsp_files.into_iter();
            let first = it.next();
            (first, it.collect::<Vec<_>>())
        };

        let command_deps: Vec<String> = self
            .commands
            .iter()
            .flat_map(|c| c.tools.iter().map(|t| t.path.clone()))
            .collect();

        let mut command_texts: Vec<String> = self.commands.iter().map(|c| c.text.clone()).collect();
        if let Some(text) = dep_fixer_text {
            command_texts.push(text);
        }
        for extra in &extra_rsp_files {
            command_texts.push(format!("printf '%s\\n' {} > {}", shell_escape(&extra.content), extra.path));
        }

        let mut command = if !self.missing_deps.is_empty() {
            format!(
                "echo 'missing dependencies: {}' >&2; exit 1",
                self.missing_deps.join(", ")
            )
        } else {
            command_texts.join(" && ")
        };

        let manifest = if let Some(sandbox) = &self.sandbox {
            let mut manifest_commands = Vec::new();
            let mut copy_before = Vec::new();
            if sandbox.sandbox_tools {
                for dep in &command_deps {
                    copy_before.push(Copy {
                        from: dep.clone(),
                        to: format!("{}/tools/{}", SBOX_OUT_DIR_TOKEN, base_name(dep)),
                        executable: true,
                    });
                }
            }
            if sandbox.sandbox_inputs {
                for input in &inputs {
                    copy_before.push(Copy {
                        from: input.clone(),
                        to: format!("{}/{}", SBOX_OUT_DIR_TOKEN, input),
                        executable: false,
                    });
                }
            }
            let copy_after: Vec<Copy> = outputs
                .iter()
                .chain(implicit_outputs.iter())
                .map(|o| Copy {
                    from: format!("{}/{}", SBOX_OUT_DIR_TOKEN, o),
                    to: o.clone(),
                    executable: false,
                })
                .collect();
            let rsp_mappings: Vec<RspFileMapping> = native_rsp_file
                .iter()
                .map(|r| RspFileMapping {
                    sandbox_path: format!("{}/{}", SBOX_OUT_DIR_TOKEN, r.path),
                    real_path: r.path.clone(),
                })
                .collect();
            manifest_commands.push(ManifestCommand {
                command: command.clone(),
                copy_before,
                copy_after,
                rsp_files: rsp_mappings,
                chdir: sandbox.sandbox_inputs,
                output_depfile: primary_depfile.clone(),
            });
            Some(SandboxManifest {
                commands: manifest_commands,
                input_hash: sandbox::input_hash(&sorted_inputs_for_hash),
            })
        } else {
            let hash = sandbox::input_hash(&sorted_inputs_for_hash);
            command = format!("{command} # {hash}");
            None
        };

        let pool = if self.high_mem && !env.remote_exec_enabled {
            Pool::HighMem
        } else if env.remote_exec_enabled && self.remoteable.unwrap_or(false) {
            Pool::Remote
        } else {
            Pool::Local
        };

        let primary_output = outputs
            .first()
            .or_else(|| implicit_outputs.first())
            .cloned()
            .unwrap_or_default();
        let remaining_implicit: Vec<String> = outputs
            .iter()
            .skip(1)
            .cloned()
            .chain(implicit_outputs.iter().cloned())
            .collect();

        let edge = BuildEdge {
            rule_name: escape_rule_name(&name.into()),
            command,
            command_deps,
            pool,
            rsp_file: native_rsp_file,
            depfile_format: primary_depfile.as_ref().map(|_| DepfileFormat::Gcc),
            depfile: primary_depfile,
            output: primary_output,
            implicit_outputs: remaining_implicit,
            symlink_outputs,
            inputs,
            order_only_inputs: order_only,
            validations,
            description: description.into(),
        };

        BuildResult {
            edge,
            manifest,
        }
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
