use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("visibility list is present but empty"))]
    EmptyList,

    #[snafu(display("invalid visibility pattern '{}'", pattern))]
    InvalidPattern { pattern: String },

    #[snafu(display("'//visibility:public'/'//visibility:private' cannot be combined with other patterns"))]
    MixedSpecial,

    #[snafu(display("'//visibility:override' must be the first pattern in the list"))]
    MisplacedOverride,

    #[snafu(display("'//visibility:legacy_public' may not be used explicitly by a module"))]
    LegacyPublicForbidden,

    #[snafu(display(
        "package '{}' may not declare visibility into vendor package '{}'; only '//vendor:__subpackages__' is allowed from outside //vendor",
        from, to
    ))]
    CrossVendor { from: String, to: String },

    #[snafu(display(
        "'{}' is not visible to '{}'; add it to the target's visibility (e.g. \"{}\")",
        child, parent, hint
    ))]
    NotVisible {
        parent: String,
        child: String,
        hint: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
