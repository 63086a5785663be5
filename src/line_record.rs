use anyhow::anyhow;

/// A decoded line split at the first occurrence of the delimiter.
///
/// The text before the delimiter is the prefix, the text after it is the field. The line
/// terminator is not part of the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineRecord {
    line: String,
    prefix_end: usize,
    field_start: usize,
    prefix_len: usize,
}

impl LineRecord {
    pub(crate) fn new(line: String, delimiter: &str) -> Result<LineRecord, anyhow::Error> {
        match line.find(delimiter) {
            Some(prefix_end) => {
                let prefix_len = line[..prefix_end].chars().count();
                Ok(
                    LineRecord {
                        field_start: prefix_end + delimiter.len(),
                        prefix_end,
                        prefix_len,
                        line,
                    }
                )
            }
            None => Err(anyhow!("delimiter {:?} not found in line: {:?}", delimiter, line)),
        }
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.line[..self.prefix_end]
    }

    /// Prefix length in characters.
    pub(crate) fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    pub(crate) fn field(&self) -> &str {
        &self.line[self.field_start..]
    }

    pub(crate) fn line(&self) -> &str {
        &self.line
    }
}
