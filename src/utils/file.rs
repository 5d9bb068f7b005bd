use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use flate2::read::GzDecoder;
use crate::config::defs::{BAM_EXT, FASTQ_EXTS, GZIP_EXT, SAM_EXT, TRIMMED_MARKER};

/// Enum to hold either an uncompressed or gzipped file reader
pub enum FileReader {
    Uncompressed(BufReader<File>),
    Gzipped(GzDecoder<File>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileReader::Uncompressed(r) => r.read(buf),
            FileReader::Gzipped(r) => r.read(buf),
        }
    }
}

pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]), // Gzip magic bytes
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Opens a file, decompressing on the fly when it carries the gzip magic bytes.
pub fn open_reader(path: &Path) -> io::Result<FileReader> {
    let is_gz = is_gzipped(path)?;
    let file = File::open(path)?;
    if is_gz {
        Ok(FileReader::Gzipped(GzDecoder::new(file)))
    } else {
        Ok(FileReader::Uncompressed(BufReader::new(file)))
    }
}

/// Splits a file name into its stem and every extension after the first dot.
///
/// # Arguments
///
/// * `path` - Any file path.
///
/// # Returns
/// (stem path with the same parent, extensions in order)
pub fn extension_remover(path: &Path) -> (PathBuf, Vec<String>) {
    let file_name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return (path.to_path_buf(), Vec::new()),
    };

    let mut parts = file_name.split('.');
    let stem = parts.next().unwrap_or_default().to_string();
    let extensions: Vec<String> = parts.map(String::from).collect();

    let stem_path = match path.parent() {
        Some(parent) => parent.join(&stem),
        None => PathBuf::from(&stem),
    };
    (stem_path, extensions)
}

/// Derives the name used for logs and outputs of a file: the file name without its
/// known trailing extensions (`.gz`, then a FASTQ, BAM or SAM extension) and without a
/// trailing `_trimmed` marker. Dots inside the name are kept.
pub fn canonical_name(path: &Path) -> String {
    let file_name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return String::new(),
    };

    let mut name = file_name.as_str();
    if let Some((rest, ext)) = name.rsplit_once('.') {
        if ext.eq_ignore_ascii_case(GZIP_EXT) {
            name = rest;
        }
    }
    if let Some((rest, ext)) = name.rsplit_once('.') {
        if FASTQ_EXTS.iter().chain([BAM_EXT, SAM_EXT].iter()).any(|e| e.eq_ignore_ascii_case(ext)) {
            name = rest;
        }
    }
    name.strip_suffix(TRIMMED_MARKER).unwrap_or(name).to_string()
}

/// Lists files directly inside `dir` whose extensions satisfy `filter`, sorted by path.
pub fn collect_files<F>(dir: &Path, filter: F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&[String]) -> bool,
{
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let (_, extensions) = extension_remover(&path);
        if filter(&extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn is_gzipped_fastq(extensions: &[String]) -> bool {
    match extensions.split_last() {
        Some((last, rest)) => {
            last.eq_ignore_ascii_case(GZIP_EXT)
                && rest
                    .last()
                    .map(|ext| FASTQ_EXTS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
                    .unwrap_or(false)
        }
        None => false,
    }
}

pub fn has_final_extension(extensions: &[String], wanted: &str) -> bool {
    extensions
        .last()
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}
