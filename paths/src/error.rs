use snafu::{ensure, Snafu};
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum Error {
    #[snafu(display("Path '{}' must be relative, not absolute", path.display()))]
    AbsolutePath { path: PathBuf },
}

pub(super) fn ensure_relative(path: &Path) -> Result<(), Error> {
    ensure!(path.is_relative(), AbsolutePathSnafu { path });
    Ok(())
}
