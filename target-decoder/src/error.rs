use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(super)))]
pub enum Error {
    #[snafu(display("Unknown architecture '{}'", name))]
    UnknownArch { name: String },

    #[snafu(display("Unknown OS '{}'", name))]
    UnknownOs { name: String },

    #[snafu(display("Product variables are missing a required host arch"))]
    MissingHostArch,

    #[snafu(display("A cross-host OS was specified without a cross-host arch"))]
    MissingCrossHostArch,
}
