//! Model archive packing.

use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Result;

/// Pack the contents of `directory` into a gzip-compressed tar.
///
/// The directory's files sit at the archive root, so unpacking next to
/// a model reader gives the same layout the agent's `save` produced.
pub fn pack_directory(directory: &Path) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", directory)?;
    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}
