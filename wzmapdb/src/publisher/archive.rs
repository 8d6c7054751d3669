//! Reproducible map packaging.
//!
//! A map folder is packed into a `.wz` file (a zip archive). The zip format
//! stores per-entry timestamps, creator OS and file attributes, so two
//! packagings of the same files on different machines would normally differ.
//! Every entry's metadata is therefore passed through [`EntryMetadata::pin`]
//! before it is written, and files are added in sorted path order, which
//! makes the output depend on file contents and relative paths only.
//!
//! An optional salt is appended as an extra entry named
//! [`SALT_ENTRY_NAME`]. Its only purpose is to change the archive hash when
//! two different maps would otherwise produce the same file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use walkdir::WalkDir;

use super::{PublishError, PublishResult};

/// Name of the salt entry.
pub const SALT_ENTRY_NAME: &str = ".map-package-disambiguate";

/// Deflate level used for every entry.
pub const COMPRESSION_LEVEL: u32 = 9;

const METHOD_DEFLATE: u16 = 8;
const ZIP_VERSION_20: u16 = 20;
const FLAG_UTF8_NAME: u16 = 0x800;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// Header fields of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    pub name: String,
    /// Low byte: zip spec version, high byte: creator OS.
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub dos_time: u16,
    pub dos_date: u16,
    pub external_attributes: u32,
}

impl EntryMetadata {
    /// Metadata as an ordinary zip writer would record it for a file.
    pub fn from_file(name: &str, metadata: &fs::Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let (dos_time, dos_date) = dos_timestamp(modified);

        #[cfg(unix)]
        let external_attributes = {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode() << 16
        };
        #[cfg(not(unix))]
        let external_attributes = 0;

        Self {
            name: name.to_string(),
            version_made_by: (3 << 8) | ZIP_VERSION_20,
            version_needed: ZIP_VERSION_20,
            flags: 0,
            dos_time,
            dos_date,
            external_attributes,
        }
    }

    /// Metadata for an entry with no backing file.
    pub fn synthetic(name: &str) -> Self {
        let (dos_time, dos_date) = dos_timestamp(SystemTime::now());
        Self {
            name: name.to_string(),
            version_made_by: ZIP_VERSION_20,
            version_needed: ZIP_VERSION_20,
            flags: 0,
            dos_time,
            dos_date,
            external_attributes: 0,
        }
    }

    /// Replace everything except the name with fixed values.
    ///
    /// Zero date and time, zero attributes, version 2.0 made on MS-DOS, and
    /// the UTF-8 file name flag.
    pub fn pin(self) -> Self {
        Self {
            name: self.name,
            version_made_by: ZIP_VERSION_20,
            version_needed: ZIP_VERSION_20,
            flags: FLAG_UTF8_NAME,
            dos_time: 0,
            dos_date: 0,
            external_attributes: 0,
        }
    }
}

fn dos_timestamp(time: SystemTime) -> (u16, u16) {
    let local: DateTime<Local> = time.into();
    if local.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let dos_time =
        ((local.hour() << 11) | (local.minute() << 5) | (local.second() / 2)) as u16;
    let dos_date =
        ((((local.year() - 1980) as u32) << 9) | (local.month() << 5) | local.day()) as u16;
    (dos_time, dos_date)
}

/// A finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArchive {
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

struct CentralEntry {
    metadata: EntryMetadata,
    crc: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    offset: u32,
}

/// Sequential zip writer applying [`EntryMetadata::pin`] to every entry.
struct ReproducibleZipWriter<W: Write> {
    out: W,
    offset: u64,
    entries: Vec<CentralEntry>,
}

impl<W: Write> ReproducibleZipWriter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            offset: 0,
            entries: Vec::new(),
        }
    }

    fn add(&mut self, metadata: EntryMetadata, data: &[u8]) -> io::Result<()> {
        let metadata = metadata.pin();

        let mut crc = Crc::new();
        crc.update(data);

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;

        let entry = CentralEntry {
            crc: crc.sum(),
            compressed_size: to_u32(compressed.len() as u64)?,
            uncompressed_size: to_u32(data.len() as u64)?,
            offset: to_u32(self.offset)?,
            metadata,
        };

        let name = entry.metadata.name.as_bytes();
        let mut header = Vec::with_capacity(30 + name.len());
        put_u32(&mut header, LOCAL_HEADER_SIGNATURE);
        put_u16(&mut header, entry.metadata.version_needed);
        put_u16(&mut header, entry.metadata.flags);
        put_u16(&mut header, METHOD_DEFLATE);
        put_u16(&mut header, entry.metadata.dos_time);
        put_u16(&mut header, entry.metadata.dos_date);
        put_u32(&mut header, entry.crc);
        put_u32(&mut header, entry.compressed_size);
        put_u32(&mut header, entry.uncompressed_size);
        put_u16(&mut header, name_length(name)?);
        put_u16(&mut header, 0);
        header.extend_from_slice(name);

        self.write(&header)?;
        self.write(&compressed)?;
        self.entries.push(entry);
        Ok(())
    }

    fn finish(mut self) -> io::Result<W> {
        let directory_offset = to_u32(self.offset)?;
        let mut directory = Vec::new();
        for entry in &self.entries {
            let name = entry.metadata.name.as_bytes();
            put_u32(&mut directory, CENTRAL_HEADER_SIGNATURE);
            put_u16(&mut directory, entry.metadata.version_made_by);
            put_u16(&mut directory, entry.metadata.version_needed);
            put_u16(&mut directory, entry.metadata.flags);
            put_u16(&mut directory, METHOD_DEFLATE);
            put_u16(&mut directory, entry.metadata.dos_time);
            put_u16(&mut directory, entry.metadata.dos_date);
            put_u32(&mut directory, entry.crc);
            put_u32(&mut directory, entry.compressed_size);
            put_u32(&mut directory, entry.uncompressed_size);
            put_u16(&mut directory, name_length(name)?);
            put_u16(&mut directory, 0); // extra
            put_u16(&mut directory, 0); // comment
            put_u16(&mut directory, 0); // disk
            put_u16(&mut directory, 0); // internal attributes
            put_u32(&mut directory, entry.metadata.external_attributes);
            put_u32(&mut directory, entry.offset);
            directory.extend_from_slice(name);
        }

        let count = u16::try_from(self.entries.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many archive entries"))?;
        let mut end = Vec::with_capacity(22);
        put_u32(&mut end, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(&mut end, 0);
        put_u16(&mut end, 0);
        put_u16(&mut end, count);
        put_u16(&mut end, count);
        put_u32(&mut end, to_u32(directory.len() as u64)?);
        put_u32(&mut end, directory_offset);
        put_u16(&mut end, 0);

        self.write(&directory)?;
        self.write(&end)?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn to_u32(value: u64) -> io::Result<u32> {
    u32::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "archive exceeds 4 GiB"))
}

fn name_length(name: &[u8]) -> io::Result<u16> {
    u16::try_from(name.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry name too long"))
}

/// Map a writer failure: zip format limits are archive failures, anything
/// else is a write failure.
fn archive_error(output: &Path, e: io::Error) -> PublishError {
    if e.kind() == io::ErrorKind::InvalidInput {
        PublishError::ArchiveFailed(format!("{}: {}", output.display(), e))
    } else {
        PublishError::WriteFailed {
            path: output.to_path_buf(),
            source: e,
        }
    }
}

/// Files under `folder` as `(relative name, path)`, sorted by name.
fn collect_files(folder: &Path) -> PublishResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(|e| PublishError::ReadFailed {
            path: e.path().unwrap_or(folder).to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop")),
        })?;
        if !entry.path().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(folder)
            .map_err(|_| PublishError::InvalidPath(entry.path().display().to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((name, entry.path().to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Pack a map folder into a reproducible archive.
///
/// # Arguments
///
/// * `folder` - Map folder to pack
/// * `output` - Archive path to write (overwritten if present)
/// * `salt` - Optional hash-collision salt
///
/// # Errors
///
/// Returns an error if a file cannot be read or the archive cannot be written.
pub fn pack_map_folder(
    folder: &Path,
    output: &Path,
    salt: Option<&str>,
) -> PublishResult<PackagedArchive> {
    if !folder.is_dir() {
        return Err(PublishError::InvalidPath(format!(
            "map folder does not exist: {}",
            folder.display()
        )));
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| PublishError::CreateDirectoryFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let write_failed = |e: io::Error| archive_error(output, e);

    let file = File::create(output).map_err(write_failed)?;
    let mut writer = ReproducibleZipWriter::new(BufWriter::new(file));

    for (name, path) in collect_files(folder)? {
        let read_failed = |e: io::Error| PublishError::ReadFailed {
            path: path.clone(),
            source: e,
        };
        let metadata = fs::metadata(&path).map_err(read_failed)?;
        let data = fs::read(&path).map_err(read_failed)?;
        writer
            .add(EntryMetadata::from_file(&name, &metadata), &data)
            .map_err(write_failed)?;
    }

    if let Some(salt) = salt {
        writer
            .add(EntryMetadata::synthetic(SALT_ENTRY_NAME), salt.as_bytes())
            .map_err(write_failed)?;
    }

    writer.finish().map_err(write_failed)?;

    let sha256 = super::checksum::calculate_file_checksum(output)?;
    let size = fs::metadata(output)
        .map_err(|e| PublishError::ReadFailed {
            path: output.to_path_buf(),
            source: e,
        })?
        .len();

    Ok(PackagedArchive {
        path: output.to_path_buf(),
        sha256,
        size,
    })
}
