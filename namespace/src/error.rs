use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("namespace '{}' declared after a non-namespace module in the same file", path))]
    NamespaceNotFirst { path: String },

    #[snafu(display("namespace '{}' already declared", path))]
    DuplicateNamespace { path: String },

    #[snafu(display("import of unknown namespace '{}'", path))]
    UnknownNamespace { path: String },

    #[snafu(display("insert attempted after the namespace tree was sorted"))]
    InsertAfterSort,

    #[snafu(display(
        "module '{}' not found; namespaces containing it: {:?}; namespaces visible to requester: {:?}",
        name, containing, visible
    ))]
    UnresolvedModule {
        name: String,
        containing: Vec<String>,
        visible: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
