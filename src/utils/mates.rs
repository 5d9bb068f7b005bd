//! Paired-end mate resolution.
//!
//! Files are matched on the first record header only: token 0 identifies the read
//! (the instrument tag, compared up to its first `.`), and a token 1 ending in `/1`
//! or `/2` declares which side of a pair the file holds.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use log::{debug, warn};
use crate::utils::file::{canonical_name, open_reader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MateMarker {
    First,
    Second,
}

impl MateMarker {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '1' => Some(MateMarker::First),
            '2' => Some(MateMarker::Second),
            _ => None,
        }
    }

    pub fn complement(&self) -> Self {
        match self {
            MateMarker::First => MateMarker::Second,
            MateMarker::Second => MateMarker::First,
        }
    }
}

/// A file together with the first header line of its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    path: PathBuf,
    header: String,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, header: impl Into<String>) -> Self {
        FileRecord {
            path: path.into(),
            header: header.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header token 0 with everything from the first `.` removed.
    pub fn instrument_tag(&self) -> &str {
        let full_tag = self.header.split_whitespace().next().unwrap_or("");
        full_tag.split('.').next().unwrap_or(full_tag)
    }

    /// Side of the pair, taken from the `/1` or `/2` suffix of header token 1.
    pub fn mate_marker(&self) -> Option<MateMarker> {
        let token = self.header.split_whitespace().nth(1)?;
        let mut chars = token.chars().rev();
        let side = chars.next()?;
        match chars.next() {
            Some('/') => MateMarker::from_char(side),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        canonical_name(&self.path)
    }
}

/// Two mate files, `first` carrying the `/1` marker and `second` the `/2` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatePair {
    pub first: FileRecord,
    pub second: FileRecord,
}

impl MatePair {
    /// Both canonical names joined by `_`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.first.name(), self.second.name())
    }
}

/// Unit of work handed to a stage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Single(FileRecord),
    Pair(MatePair),
}

impl WorkItem {
    pub fn name(&self) -> String {
        match self {
            WorkItem::Single(record) => record.name(),
            WorkItem::Pair(pair) => pair.name(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub pairs: Vec<MatePair>,
    pub singles: Vec<FileRecord>,
    /// Files that declared a mate marker but whose mate could not be found.
    pub unmatched: Vec<PathBuf>,
}

impl Resolution {
    pub fn total_files(&self) -> usize {
        self.pairs.len() * 2 + self.singles.len()
    }
}

/// Groups files into ordered mate pairs and unpaired singles.
///
/// Each file declaring a marker is matched against the first file, in input order, that
/// has the same instrument tag, a different path, the complementary marker and no group
/// yet. Files without a marker are never searched for a mate. Every record ends up in
/// exactly one pair or in `singles`.
pub fn resolve(records: &[FileRecord]) -> Resolution {
    let mut resolution = Resolution::default();
    let mut assigned: HashSet<usize> = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        if assigned.contains(&index) {
            continue;
        }

        let marker = match record.mate_marker() {
            Some(marker) => marker,
            None => {
                assigned.insert(index);
                resolution.singles.push(record.clone());
                continue;
            }
        };

        let wanted_tag = record.instrument_tag();
        let found = records.iter().enumerate().find(|(candidate_index, candidate)| {
            *candidate_index != index
                && !assigned.contains(candidate_index)
                && candidate.path() != record.path()
                && candidate.instrument_tag() == wanted_tag
                && candidate.mate_marker() == Some(marker.complement())
        });

        assigned.insert(index);
        match found {
            Some((candidate_index, candidate)) => {
                assigned.insert(candidate_index);
                let pair = match marker {
                    MateMarker::First => MatePair { first: record.clone(), second: candidate.clone() },
                    MateMarker::Second => MatePair { first: candidate.clone(), second: record.clone() },
                };
                debug!("Paired {:?} with {:?}", pair.first.path(), pair.second.path());
                resolution.pairs.push(pair);
            }
            None => {
                warn!(
                    "File {:?} was expected to be paired but no mate was found; treated as unpaired",
                    record.path()
                );
                resolution.unmatched.push(record.path().to_path_buf());
                resolution.singles.push(record.clone());
            }
        }
    }

    resolution
}


/// Reads the first line of a (possibly gzipped) file without touching the rest.
///
/// # Returns
/// `None` for an empty file or a blank first line.
pub fn read_first_line(path: &Path) -> io::Result<Option<String>> {
    let mut reader = BufReader::new(open_reader(path)?);
    let mut line = Vec::new();
    let bytes_read = reader.read_until(b'\n', &mut line)?;
    if bytes_read == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&line).trim().to_string();
    if line.is_empty() {
        Ok(None)
    } else {
        Ok(Some(line))
    }
}

/// Builds a FileRecord per path, leaving out files without a readable first line.
pub fn collect_records(paths: &[PathBuf]) -> Vec<FileRecord> {
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match read_first_line(path) {
            Ok(Some(header)) => records.push(FileRecord::new(path.clone(), header)),
            Ok(None) => debug!("Skipping {:?}: empty file", path),
            Err(e) => debug!("Skipping {:?}: unable to read header: {}", path, e),
        }
    }
    records
}
