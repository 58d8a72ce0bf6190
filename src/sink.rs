use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::{GptBotError, Result};

/// Receives response text as it becomes available.
pub trait ResponseSink {
    /// `is_complete` marks the last piece of the response.
    fn emit(&mut self, text: &str, is_complete: bool) -> Result<()>;
}

enum Target {
    Console(Box<dyn Write>),
    File { path: PathBuf, handle: Option<File> },
}

/// Console or file output for one run.
///
/// Console writes are flushed immediately and the final piece ends the line.
/// File output replaces any earlier contents: the file is created or truncated
/// at the first emit and every later piece is appended. Empty text never
/// reaches the file, and the run counts as not yet started until real content
/// has been written.
pub struct OutputSink {
    target: Target,
    first_chunk: bool,
}

impl OutputSink {
    pub fn console() -> Self {
        Self::writer(io::stdout())
    }

    pub fn writer(writer: impl Write + 'static) -> Self {
        Self {
            target: Target::Console(Box::new(writer)),
            first_chunk: true,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File {
                path: path.into(),
                handle: None,
            },
            first_chunk: true,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_first_chunk(&self) -> bool {
        self.first_chunk
    }
}

impl ResponseSink for OutputSink {
    fn emit(&mut self, text: &str, is_complete: bool) -> Result<()> {
        match &mut self.target {
            Target::Console(out) => {
                let console_error =
                    |err: io::Error| GptBotError::file_with("Failed to write response to console", err);
                out.write_all(text.as_bytes()).map_err(console_error)?;
                if is_complete {
                    out.write_all(b"\n").map_err(console_error)?;
                }
                out.flush().map_err(console_error)?;
            }
            Target::File { path, handle } => {
                let path = path.as_path();
                if self.first_chunk {
                    debug!(path = %path.display(), "truncating output file");
                    let file = OpenOptions::new()
                        .create(true)
                        .write(true)
                        .truncate(true)
                        .open(path)
                        .map_err(|err| GptBotError::file_unwritable(path, err))?;
                    *handle = Some(file);
                }
                if text.is_empty() {
                    return Ok(());
                }
                if let Some(file) = handle.as_mut() {
                    file.write_all(text.as_bytes())
                        .and_then(|()| file.flush())
                        .map_err(|err| GptBotError::file_unwritable(path, err))?;
                }
            }
        }

        if !text.is_empty() {
            self.first_chunk = false;
        }
        Ok(())
    }
}
