// 🏗️ Dataset Segmenter - marker scanning over fixed-width clearing files
//
// A clearing file has no delimiters. Its structure is implied by 4-character
// markers at the start of each 180-character record:
//
//   5555 file header
//     4444 branch header
//       0000 transaction (contiguous, immediately after its branch header)
//     4444 ...
//   5555 ...
//
// The segmenter is a small recursive-descent parser over that buffer. It makes
// one forward pass: every search starts past whatever was already consumed.

use serde::Serialize;
use std::borrow::Cow;
use std::ops::Range;
use tracing::debug;

use crate::codes::CodeTable;
use crate::record::{
    BranchHeaderRecord, Direction, FileHeaderRecord, TransactionRecord, BRANCH_HEADER_MARKER,
    FILE_HEADER_MARKER, RECORD_LEN, TRANSACTION_MARKER,
};

// ============================================================================
// GROUPS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BranchGroup {
    pub header: BranchHeaderRecord,
    pub transactions: Vec<TransactionRecord>,

    /// Byte range covered by the header and its transactions
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileHeaderGroup {
    pub header: FileHeaderRecord,
    pub branches: Vec<BranchGroup>,
    pub source: String,

    /// Offset of the file header marker
    pub offset: usize,
}

impl FileHeaderGroup {
    pub fn direction(&self) -> Option<Direction> {
        self.header.direction()
    }

    pub fn transaction_count(&self) -> usize {
        self.branches.iter().map(|b| b.transactions.len()).sum()
    }
}

// ============================================================================
// SEGMENTER
// ============================================================================

/// Split a raw clearing buffer into file header groups.
///
/// The buffer is read as text (invalid UTF-8 becomes U+FFFD, one character
/// per bad sequence) and line breaks are removed first. Offsets and spans
/// count characters of that text, so a newline-delimited file segments
/// exactly like an undelimited one. A buffer with no file header marker
/// yields no groups. Records cut short at the end of the buffer are dropped.
pub fn segment(buffer: &[u8], source: &str, codes: &CodeTable) -> Vec<FileHeaderGroup> {
    let text = strip_line_breaks(String::from_utf8_lossy(buffer));
    let groups = Segmenter::new(&text, codes, source).file_groups();

    debug!(
        source,
        groups = groups.len(),
        branches = groups.iter().map(|g| g.branches.len()).sum::<usize>(),
        "segmented clearing buffer"
    );

    groups
}

fn strip_line_breaks(text: Cow<'_, str>) -> Cow<'_, str> {
    if text.contains(|c: char| c == '\n' || c == '\r') {
        Cow::Owned(text.chars().filter(|c| *c != '\n' && *c != '\r').collect())
    } else {
        text
    }
}

struct Segmenter<'a> {
    text: &'a str,

    /// Byte offset of every character, plus `text.len()` at the end
    bounds: Vec<usize>,
    codes: &'a CodeTable,
    source: &'a str,
}

impl<'a> Segmenter<'a> {
    fn new(text: &'a str, codes: &'a CodeTable, source: &'a str) -> Self {
        let bounds = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        Segmenter {
            text,
            bounds,
            codes,
            source,
        }
    }

    /// Full record starting at character `pos`, or `None` if the text ends first
    fn window(&self, pos: usize) -> Option<&'a str> {
        let start = *self.bounds.get(pos)?;
        let end = *self.bounds.get(pos.checked_add(RECORD_LEN)?)?;
        self.text.get(start..end)
    }

    /// Character position of the first `marker` at or after `from`
    fn find_marker(&self, marker: &str, from: usize) -> Option<usize> {
        let start = *self.bounds.get(from)?;
        let byte = self.text.get(start..)?.find(marker)? + start;
        self.bounds.binary_search(&byte).ok()
    }

    fn file_groups(&self) -> Vec<FileHeaderGroup> {
        let mut groups = Vec::new();
        let mut cursor = 0;

        while let Some(start) = self.find_marker(FILE_HEADER_MARKER, cursor) {
            let Some(header) = self.window(start).and_then(FileHeaderRecord::decode) else {
                break;
            };

            let (branches, next_file) = self.branch_groups(start + RECORD_LEN);
            groups.push(FileHeaderGroup {
                header,
                branches,
                source: self.source.to_string(),
                offset: start,
            });

            match next_file {
                Some(next) => cursor = next,
                None => break,
            }
        }

        groups
    }

    /// Branch groups up to the next file header. Also returns where that file
    /// header starts, if there is one.
    fn branch_groups(&self, from: usize) -> (Vec<BranchGroup>, Option<usize>) {
        let mut branches = Vec::new();
        let mut cursor = from;

        // Searched again only once the cursor has moved past it
        let mut next_file = self.find_marker(FILE_HEADER_MARKER, cursor);

        loop {
            if matches!(next_file, Some(pos) if pos < cursor) {
                next_file = self.find_marker(FILE_HEADER_MARKER, cursor);
            }

            let Some(start) = self.find_marker(BRANCH_HEADER_MARKER, cursor) else {
                return (branches, next_file);
            };

            if let Some(file_pos) = next_file {
                if file_pos < start {
                    return (branches, Some(file_pos));
                }
            }

            // Nothing past a truncated record can be complete either
            let Some(header) = self.window(start).and_then(BranchHeaderRecord::decode) else {
                return (branches, None);
            };

            let (transactions, end) = self.transactions(start + RECORD_LEN);
            branches.push(BranchGroup {
                header,
                transactions,
                span: start..end,
            });
            cursor = end;
        }
    }

    /// Contiguous transaction records starting at `from`; returns them with
    /// the position just past the last one.
    fn transactions(&self, from: usize) -> (Vec<TransactionRecord>, usize) {
        let mut transactions = Vec::new();
        let mut pos = from;

        while let Some(line) = self.window(pos) {
            if !line.starts_with(TRANSACTION_MARKER) {
                break;
            }
            if let Some(record) = TransactionRecord::decode(line, self.codes) {
                transactions.push(record);
            }
            pos += RECORD_LEN;
        }

        (transactions, pos)
    }
}

// ============================================================================
// TESTS
// ============================================================================
