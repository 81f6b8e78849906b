mod extract;
mod tar_reader;
#[cfg(test)]
pub(crate) mod test_archive;

pub use extract::*;
pub use tar_reader::*;

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

pub type GzTarReader = TarReader<GzDecoder<BufReader<File>>>;

/// Open a gzip compressed tar archive for streaming
pub fn open_tar_gz(path: &Path) -> io::Result<GzTarReader> {
    let file = File::open(path)?;
    Ok(TarReader::new(GzDecoder::new(BufReader::new(file))))
}
