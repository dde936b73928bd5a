//! In-place file rewriting through a sibling temporary path.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from the rewrite plumbing itself (as opposed to the line
/// processing streamed through it).
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("failed to open input file: {0}")]
    OpenInput(io::Error),
    #[error("failed to create output file: {0}")]
    CreateOutput(io::Error),
    #[error("failed to flush output file: {0}")]
    FlushOutput(io::Error),
    #[error("failed to rename output file: {0}")]
    Rename(io::Error),
}

/// A pending in-place rewrite: the source open for reading and a sibling
/// temporary file open for writing.
///
/// Both handles close on every exit path. Dropping the value without
/// calling [`Rewrite::commit`] leaves the temporary file behind instead of
/// clobbering the source, as does a failed rename.
pub struct Rewrite {
    pub input: BufReader<File>,
    pub output: BufWriter<File>,
    source: PathBuf,
    temp: PathBuf,
}

impl Rewrite {
    /// Opens `path` for reading and creates `path` + `suffix` next to it.
    pub fn begin(path: &Path, suffix: &str) -> Result<Self, RewriteError> {
        let input = File::open(path).map_err(RewriteError::OpenInput)?;

        let mut temp = path.as_os_str().to_owned();
        temp.push(suffix);
        let temp = PathBuf::from(temp);
        let output = File::create(&temp).map_err(RewriteError::CreateOutput)?;

        Ok(Self {
            input: BufReader::new(input),
            output: BufWriter::new(output),
            source: path.to_path_buf(),
            temp,
        })
    }

    /// Path of the temporary output file.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Flushes and closes both files, then renames the output over the
    /// source. With `keep_temp` the rename is skipped and the temporary
    /// file stays next to the untouched source.
    pub fn commit(self, keep_temp: bool) -> Result<(), RewriteError> {
        let Self {
            input,
            mut output,
            source,
            temp,
        } = self;
        output.flush().map_err(RewriteError::FlushOutput)?;
        drop(output);
        drop(input);

        if !keep_temp {
            std::fs::rename(&temp, &source).map_err(RewriteError::Rename)?;
        }
        Ok(())
    }
}
