//! Reading captured slices.
//!
//! A slice is a gzip file of newline-delimited messages. Both the counting
//! pass and the fill pass read slices through [`for_each_line`], so they see
//! exactly the same lines.

mod count;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::debug;

use crate::config::MalformedPolicy;
use crate::error::{Error, Result};
use crate::extract::MalformedLine;

pub use count::{count_messages, MessageCount};

const READ_BUFFER: usize = 256 * 1024;

/// Calls `visit` with the 1-based line number and contents of every
/// non-blank line in `path`. Returns the number of lines visited.
pub fn for_each_line<F>(path: &Path, mut visit: F) -> Result<usize>
where
    F: FnMut(usize, &[u8]) -> Result<()>,
{
    let file = File::open(path).map_err(|err| with_path(err, path))?;
    if file.metadata()?.len() == 0 {
        return Ok(0);
    }
    let mut reader = BufReader::with_capacity(READ_BUFFER, MultiGzDecoder::new(file));
    let mut buf = Vec::with_capacity(4096);
    let mut line_no = 0;
    let mut visited = 0;
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|err| with_path(err, path))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let line = trim_line_end(&buf);
        if line.is_empty() {
            continue;
        }
        visit(line_no, line)?;
        visited += 1;
    }
    Ok(visited)
}

/// Applies `policy` to a line that did not decode.
pub fn reject_malformed(
    policy: MalformedPolicy,
    path: &Path,
    line: usize,
    malformed: MalformedLine,
) -> Result<()> {
    match policy {
        MalformedPolicy::Skip => {
            debug!("skipping malformed line {}:{line}: {malformed}", path.display());
            Ok(())
        }
        MalformedPolicy::Abort => Err(Error::MalformedMessage {
            path: path.to_path_buf(),
            line,
            reason: malformed.reason,
        }),
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

fn with_path(err: io::Error, path: &Path) -> Error {
    Error::Io(io::Error::new(
        err.kind(),
        format!("{}: {err}", path.display()),
    ))
}
