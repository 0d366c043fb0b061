use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("module {name:?} declared in {decl_dir:?} could not resolve dependency {reference:?}"))]
    UnresolvedDependency {
        name: String,
        decl_dir: String,
        reference: String,
    },

    #[snafu(display("visibility error for {module:?}: {source}"))]
    Visibility { module: String, source: visibility::Error },

    #[snafu(display("arch expansion failed for {module:?}: {source}"))]
    ArchExpansion { module: String, source: variant::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
