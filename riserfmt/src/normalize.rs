//! This module implements the line normalizer: it reads a file and drops or
//! cleans lines before the tokenizer ever sees them.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

/// Which lines to drop and how to clean the rest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineFilter {
  /// Lines whose first non-blank characters start with one of these
  /// (case-insensitively) are comments.
  pub comment_prefixes: &'static [&'static str],
  /// Strip leading and trailing whitespace. Trailing whitespace is always
  /// removed; leading whitespace only when this is set.
  pub trim: bool,
  /// Drop empty lines.
  pub skip_blank: bool
}

impl Default for LineFilter {
  fn default() -> Self {
    return Self::RAW;
  }
}

impl LineFilter {
  /// Keeps every line as-is apart from trailing whitespace.
  pub const RAW: Self = Self {
    comment_prefixes: &[],
    trim: false,
    skip_blank: false
  };

  /// Applies the filter to a single line. `None` means the line is dropped.
  pub fn apply<'a>(&self, line: &'a str) -> Option<&'a str> {
    let line = line.trim_end();
    let lead = line.trim_start();
    if self.skip_blank && lead.is_empty() {
      return None;
    }
    let commented = self.comment_prefixes.iter().any(|p| {
      lead.get(..p.len()).is_some_and(|s| s.eq_ignore_ascii_case(p))
    });
    if commented {
      return None;
    }
    return Some(if self.trim { lead } else { line });
  }
}

/// Applies a filter to text already in memory.
pub fn normalize_text(text: &str, filter: &LineFilter) -> Vec<String> {
  return text.lines()
    .filter_map(|l| filter.apply(l))
    .map(String::from)
    .collect();
}

/// A file known to exist, read lazily through a filter. Every call to
/// `lines()` re-opens the file, so the source can be walked more than once.
#[derive(Clone, Debug)]
pub struct LineSource {
  /// Where the file lives.
  path: PathBuf,
  /// The filter applied to every line.
  filter: LineFilter
}

impl LineSource {
  /// Checks that the path is a file and builds a source for it. This is the
  /// only place a missing file is reported.
  pub fn open<P: AsRef<Path>>(path: P, filter: LineFilter) -> io::Result<Self> {
    let path = path.as_ref().to_path_buf();
    if !path.is_file() {
      return Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} is not a readable file", path.display())
      ));
    }
    debug!("Opened line source {}.", path.display());
    return Ok(Self { path, filter });
  }

  /// The path of the underlying file.
  pub fn path(&self) -> &Path {
    return &self.path;
  }

  /// The filter in use.
  pub fn filter(&self) -> &LineFilter {
    return &self.filter;
  }

  /// Returns a fresh lazy iterator over the filtered lines.
  pub fn lines(&self) -> io::Result<FilteredLines<BufReader<File>>> {
    let file = File::open(&self.path)?;
    return Ok(FilteredLines::new(BufReader::new(file), self.filter));
  }

  /// Reads every filtered line into memory.
  pub fn read(&self) -> io::Result<Vec<String>> {
    return self.lines()?.collect();
  }

  /// Reads every filtered line into memory, along with the 1-based numbers
  /// of the lines that were not valid UTF-8.
  pub fn read_lossy(&self) -> io::Result<(Vec<String>, Vec<usize>)> {
    let mut lines = self.lines()?;
    let kept = lines.by_ref().collect::<io::Result<Vec<_>>>()?;
    return Ok((kept, lines.replaced().to_vec()));
  }
}

/// Reads one line without its line ending. Bytes that are not UTF-8 become
/// U+FFFD; the flag says whether that happened.
fn read_lossy_line<R: BufRead>(
  reader: &mut R,
  buf: &mut Vec<u8>
) -> io::Result<Option<(String, bool)>> {
  buf.clear();
  if reader.read_until(b'\n', buf)? == 0 {
    return Ok(None);
  }
  if buf.ends_with(b"\n") {
    buf.pop();
    if buf.ends_with(b"\r") {
      buf.pop();
    }
  }
  return Ok(Some(match String::from_utf8_lossy(buf) {
    Cow::Borrowed(s) => (s.to_string(), false),
    Cow::Owned(s) => (s, true)
  }));
}

/// Lazy iterator over the filtered lines of a reader. Every physical line is
/// read, so line positions never shift.
pub struct FilteredLines<R: BufRead> {
  /// Where the bytes come from.
  reader: R,
  /// Reused line buffer.
  buf: Vec<u8>,
  /// The filter to apply.
  filter: LineFilter,
  /// Physical lines read so far.
  line_no: usize,
  /// 1-based numbers of the lines that needed replacement characters.
  replaced: Vec<usize>
}

impl<R: BufRead> FilteredLines<R> {
  /// Wraps a reader.
  pub fn new(reader: R, filter: LineFilter) -> Self {
    return Self { reader, buf: Vec::new(), filter, line_no: 0, replaced: Vec::new() };
  }

  /// The lines read so far that were not valid UTF-8, 1-based.
  pub fn replaced(&self) -> &[usize] {
    return &self.replaced;
  }
}

impl<R: BufRead> Iterator for FilteredLines<R> {
  type Item = io::Result<String>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let (raw, lossy) = match read_lossy_line(&mut self.reader, &mut self.buf) {
        Ok(Some(line)) => line,
        Ok(None) => return None,
        Err(e) => return Some(Err(e))
      };
      self.line_no += 1;
      if lossy {
        debug!("Line {} is not valid UTF-8.", self.line_no);
        self.replaced.push(self.line_no);
      }
      if let Some(kept) = self.filter.apply(&raw) {
        return Some(Ok(kept.to_string()));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const DAS: LineFilter = LineFilter {
    comment_prefixes: &["c"],
    trim: true,
    skip_blank: true
  };

  #[test]
  fn comments_and_blanks_are_dropped() {
    let text = "c a comment\n  C another\n\n*NODE\r\n 1, 0.0, 0.0, 0.0  \n";
    let lines = normalize_text(text, &DAS);
    assert_eq!(lines, vec!["*NODE", "1, 0.0, 0.0, 0.0"]);
  }

  #[test]
  fn raw_filter_keeps_columns() {
    let lines = normalize_text("   12.0  zone\n\n", &LineFilter::RAW);
    assert_eq!(lines, vec!["   12.0  zone", ""]);
  }

  #[test]
  fn missing_file_is_not_found() {
    let err = LineSource::open("/definitely/not/here.das", DAS).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
  }

  #[test]
  fn source_is_restartable() {
    use std::io::Write;
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    writeln!(tmp, "c header\n$MODEL\n*NODE").unwrap();
    let src = LineSource::open(tmp.path(), DAS).unwrap();
    let first = src.read().unwrap();
    let second = src.read().unwrap();
    assert_eq!(first, vec!["$MODEL", "*NODE"]);
    assert_eq!(first, second);
  }

  #[test]
  fn invalid_bytes_keep_their_line() {
    let bytes: &[u8] = b"2 2\n1 0.5 \xb0\n2 0.7\r\n";
    let mut lines = FilteredLines::new(bytes, LineFilter::RAW);
    let kept = lines.by_ref().collect::<io::Result<Vec<_>>>().unwrap();
    assert_eq!(kept, vec!["2 2", "1 0.5 \u{fffd}", "2 0.7"]);
    assert_eq!(lines.replaced(), [2]);
  }
}
