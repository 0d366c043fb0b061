use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum Error {
    #[snafu(display("Failed to initialize cache entry '{}': {}", key, message))]
    Init { key: String, message: String },

    #[snafu(display("Failed to parse API level table: {}", source))]
    ApiLevelTableParse { source: serde_json::Error },

    #[snafu(display("Unknown platform codename '{}'", codename))]
    UnknownCodename { codename: String },
}
