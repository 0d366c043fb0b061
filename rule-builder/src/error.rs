use snafu::Snafu;

/// Builder invariant violations (spec section 4.6/7): these indicate a bug
/// in a module's action generator, not bad user input, so the rest of the
/// crate treats them as fatal `panic!`s rather than `Result`s. This enum
/// exists only so callers that do want to match on the *kind* of panic
/// message (tests, mostly) have something stable to `downcast` against via
/// `std::panic::catch_unwind` + `Any::downcast_ref::<String>`.
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("sbox() called more than once on the same rule"))]
    DoubleSbox,

    #[snafu(display("sbox() called after command() already started accumulating text"))]
    SboxAfterCommand,

    #[snafu(display("rewrapper() requires sandboxInputs() to have been called first"))]
    RewrapperRequiresSandboxInputs,

    #[snafu(display("rule has no declared outputs"))]
    NoOutputs,
}

pub type Result<T> = std::result::Result<T, Error>;
