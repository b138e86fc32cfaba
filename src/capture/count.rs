use std::ops::Range;
use std::path::PathBuf;

use log::debug;

use super::{for_each_line, reject_malformed};
use crate::config::MalformedPolicy;
use crate::error::Result;
use crate::extract::RecordExtractor;

/// Totals of a counting pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCount {
    /// Trade records, i.e. rows the fill pass will produce.
    pub messages: usize,
    pub files: usize,
    pub lines: usize,
    pub malformed: usize,
    /// Trade records of each counted file, in input order.
    pub per_file: Vec<usize>,
}

impl MessageCount {
    /// Trade records of the files at `range` of the counted input.
    pub fn messages_in(&self, range: Range<usize>) -> usize {
        self.per_file[range].iter().sum()
    }
}

/// Counts the trade records in `files` with the same extractor the fill pass
/// uses, so the count is exactly the capacity the cache needs.
pub fn count_messages(
    files: &[PathBuf],
    extractor: &RecordExtractor,
    policy: MalformedPolicy,
) -> Result<MessageCount> {
    let mut count = MessageCount::default();
    for path in files {
        let mut messages = 0;
        let lines = for_each_line(path, |line_no, line| {
            match extractor.extract(line) {
                Ok(records) => messages += records.count(),
                Err(malformed) => {
                    count.malformed += 1;
                    reject_malformed(policy, path, line_no, malformed)?;
                }
            }
            Ok(())
        })?;
        count.messages += messages;
        count.lines += lines;
        count.files += 1;
        count.per_file.push(messages);
        debug!("counted {} ({messages} records in {lines} lines)", path.display());
    }
    Ok(count)
}
