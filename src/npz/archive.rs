//! NPZ container access
//!
//! An NPZ file is a zip archive whose `<name>.npy` members each hold one
//! array. Members are only read when asked for, so unrequested columns
//! are never decompressed.

use crate::error::{ArchiveError, ArchiveResult};
use crate::npz::npy::NpyArray;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

const NPY_SUFFIX: &str = ".npy";

/// Upper bound on the buffer reserved from a member's declared size
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// Read handle over an NPZ archive
pub struct NpzArchive<R> {
    zip: ZipArchive<R>,
    /// Array names in container order, `.npy` suffix stripped
    names: Vec<String>,
    /// Archive description for error messages
    source: String,
}

impl NpzArchive<BufReader<File>> {
    /// Open an NPZ file from disk.
    ///
    /// The file handle is owned by the returned archive and closed when it
    /// is dropped.
    pub fn open<P: AsRef<Path>>(path: P) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path.display().to_string())
    }
}

impl<R: Read + Seek> NpzArchive<R> {
    /// Wrap any seekable reader holding an NPZ archive.
    pub fn from_reader(reader: R, source: impl Into<String>) -> ArchiveResult<Self> {
        let source = source.into();
        let zip = ZipArchive::new(reader).map_err(|e| ArchiveError::Zip {
            archive: source.clone(),
            source: e,
        })?;

        let mut names = Vec::with_capacity(zip.len());
        for member in zip.file_names() {
            match member.strip_suffix(NPY_SUFFIX) {
                Some(name) => names.push(name.to_string()),
                None => debug!(member, "Skipping non-NPY archive member"),
            }
        }

        debug!(archive = %source, arrays = names.len(), "Opened NPZ archive");

        Ok(Self {
            zip,
            names,
            source,
        })
    }

    /// Array names in container order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Check whether the archive holds an array called `name`
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Description of the archive (its path when opened from disk)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Read and parse one array
    pub fn read_array(&mut self, name: &str) -> ArchiveResult<NpyArray> {
        if !self.contains(name) {
            return Err(ArchiveError::MissingArray { name: name.into() });
        }

        let member = format!("{}{}", name, NPY_SUFFIX);
        let mut file = self.zip.by_name(&member).map_err(|e| ArchiveError::Zip {
            archive: self.source.clone(),
            source: e,
        })?;

        let mut bytes = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut bytes)
            .map_err(|source| ArchiveError::ReadMember {
                member: member.clone(),
                source,
            })?;

        NpyArray::parse(name, bytes)
    }
}

/// Capacity to reserve for a member; the zip header size is not trusted
/// beyond `MAX_PREALLOCATION`, `read_to_end` grows the rest.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared)
        .unwrap_or(usize::MAX)
        .min(MAX_PREALLOCATION)
}

/// Build an in-memory NPZ from `(name, descr, shape, data)` entries.
#[cfg(test)]
pub(crate) fn npz_fixture(entries: &[(&str, &str, &[usize], Vec<u8>)]) -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, descr, shape, data) in entries {
        writer
            .start_file(format!("{}.npy", name), SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(&crate::npz::npy::encode_npy(descr, shape, data))
            .unwrap();
    }
    writer.finish().unwrap().into_inner()
}
