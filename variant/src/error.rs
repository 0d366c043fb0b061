use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid compile_multilib value '{}'", value))]
    InvalidMultilib { value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
