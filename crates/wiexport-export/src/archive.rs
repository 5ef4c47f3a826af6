//! Output containers
//!
//! An [`Archive`] only receives bytes. The stream framing (header and
//! `(kind, name, length, payload)` records) is produced by [`write_header`]
//! and [`write_record`] and decoded again by [`read_stream`].

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use wiexport_core::{Error, Result};

use crate::records::{RecordReader, RecordWriter};

/// Magic bytes at the start of every archive stream
pub const STREAM_MAGIC: &[u8; 4] = b"WISC";

/// Destination of one export pass
pub trait Archive {
    fn is_open(&self) -> bool;

    /// Append raw bytes
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Commit everything written so far
    fn close(&mut self) -> Result<()>;

    /// Drop everything written so far; the archive is closed afterwards
    fn discard(&mut self);

    /// Dump the stream as a C byte-array declaration
    fn save_header_file(&self, path: &Path, symbol: &str) -> Result<()> {
        let _ = (path, symbol);
        Err(Error::UnsupportedFormat {
            format: "header dump from a streaming archive".to_string(),
        })
    }

    fn bytes_written(&self) -> u64;
}

/// Archive file written through a sibling temporary file.
///
/// Bytes go to `<path>.partial` and the file is renamed into place on
/// [`Archive::close`]. Discarding or dropping an open archive removes
/// the temporary file, so the destination never holds a failed export.
#[derive(Debug)]
pub struct FileArchive {
    path: PathBuf,
    temp_path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl FileArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(".partial");
        let temp_path = path.with_file_name(temp_name);

        let file = File::create(&temp_path).map_err(|e| {
            Error::from(e).with_context(format!("opening archive {}", path.display()))
        })?;
        debug!(path = %path.display(), "Archive opened");
        Ok(Self {
            path,
            temp_path,
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn not_open(&self) -> Error {
        Error::ArchiveNotOpen {
            path: self.path.display().to_string(),
        }
    }
}

impl Archive for FileArchive {
    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(self.not_open());
        };
        writer.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Err(self.not_open());
        };
        let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);
        if let Err(e) = fs::rename(&self.temp_path, &self.path) {
            let _ = fs::remove_file(&self.temp_path);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), bytes = self.written, "Archive closed");
        Ok(())
    }

    fn discard(&mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                warn!(path = %self.temp_path.display(), error = %e, "Failed to remove partial archive");
            }
        }
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl Drop for FileArchive {
    fn drop(&mut self) {
        self.discard();
    }
}

/// In-memory archive, used for header dumps and tests
#[derive(Debug, Default)]
pub struct MemoryArchive {
    bytes: Vec<u8>,
    open: bool,
    closed: bool,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            open: true,
            closed: false,
        }
    }

    /// An archive that reports it could not be opened
    pub fn unopened() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Closed successfully after writing
    pub fn is_committed(&self) -> bool {
        self.closed
    }
}

impl Archive for MemoryArchive {
    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::ArchiveNotOpen {
                path: "<memory>".to_string(),
            });
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::ArchiveNotOpen {
                path: "<memory>".to_string(),
            });
        }
        self.open = false;
        self.closed = true;
        Ok(())
    }

    fn discard(&mut self) {
        self.bytes.clear();
        self.open = false;
        self.closed = false;
    }

    fn save_header_file(&self, path: &Path, symbol: &str) -> Result<()> {
        let source = header_source(&self.bytes, symbol)?;
        fs::write(path, source)
            .map_err(|e| Error::from(e).with_context(format!("writing header {}", path.display())))
    }

    fn bytes_written(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// C source declaring `bytes` as `const uint8_t <symbol>[]`, 16 bytes per line
pub fn header_source(bytes: &[u8], symbol: &str) -> Result<String> {
    let valid = symbol
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::InvalidConfig {
            message: format!("'{}' is not a valid C identifier", symbol),
        });
    }

    let mut out = String::with_capacity(bytes.len() * 6 + 128);
    let _ = writeln!(out, "#pragma once");
    let _ = writeln!(out, "#include <stddef.h>");
    let _ = writeln!(out, "#include <stdint.h>");
    let _ = writeln!(out);
    let _ = writeln!(out, "const uint8_t {}[] = {{", symbol);
    for line in bytes.chunks(16) {
        let hex: Vec<String> = line.iter().map(|b| format!("0x{:02x}", b)).collect();
        let _ = writeln!(out, "    {},", hex.join(", "));
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out, "const size_t {}_size = {};", symbol, bytes.len());
    Ok(out)
}

/// Kind tag of an archive record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Mesh,
    Material,
    Object,
    Armature,
    Action,
    Light,
    Camera,
    World,
}

impl RecordKind {
    pub const ALL: [RecordKind; 8] = [
        RecordKind::Mesh,
        RecordKind::Material,
        RecordKind::Object,
        RecordKind::Armature,
        RecordKind::Action,
        RecordKind::Light,
        RecordKind::Camera,
        RecordKind::World,
    ];

    pub fn tag(&self) -> u32 {
        match self {
            RecordKind::Mesh => 1,
            RecordKind::Material => 2,
            RecordKind::Object => 3,
            RecordKind::Armature => 4,
            RecordKind::Action => 5,
            RecordKind::Light => 6,
            RecordKind::Camera => 7,
            RecordKind::World => 8,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordKind::Mesh => "mesh",
            RecordKind::Material => "material",
            RecordKind::Object => "object",
            RecordKind::Armature => "armature",
            RecordKind::Action => "action",
            RecordKind::Light => "light",
            RecordKind::Camera => "camera",
            RecordKind::World => "world",
        };
        f.pad(name)
    }
}

/// Write the stream header: magic, version, root entity name
pub fn write_header<A: Archive + ?Sized>(archive: &mut A, version: u32, root: &str) -> Result<()> {
    let mut w = RecordWriter::new();
    w.u32(version)?;
    w.string(root)?;
    archive.write(STREAM_MAGIC)?;
    archive.write(&w.into_bytes())
}

/// Append one framed record
pub fn write_record<A: Archive + ?Sized>(
    archive: &mut A,
    kind: RecordKind,
    name: &str,
    payload: &[u8],
) -> Result<()> {
    let mut w = RecordWriter::new();
    w.u32(kind.tag())?;
    w.string(name)?;
    w.count(payload.len())?;
    archive.write(&w.into_bytes())?;
    archive.write(payload)
}

/// One framed record of a decoded stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub name: String,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

/// A decoded archive stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveStream {
    pub version: u32,
    pub root: String,
    pub records: Vec<RawRecord>,
}

impl ArchiveStream {
    pub fn records_of(&self, kind: RecordKind) -> impl Iterator<Item = &RawRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }
}

/// Split an archive stream into its records
pub fn read_stream(bytes: &[u8]) -> Result<ArchiveStream> {
    if bytes.len() < STREAM_MAGIC.len() || &bytes[..4] != STREAM_MAGIC {
        return Err(Error::invalid_data("archive stream does not start with WISC"));
    }
    let mut r = RecordReader::new(&bytes[4..]);
    let version = r.u32()?;
    let root = r.string()?;

    let mut records = Vec::new();
    while r.remaining() > 0 {
        let offset = r.position() + 4;
        let tag = r.u32()?;
        let kind = RecordKind::from_tag(tag).ok_or_else(|| {
            Error::invalid_data(format!("unknown record kind {} at offset {}", tag, offset))
        })?;
        let name = r.string()?;
        let len = r.count(1)?;
        let payload = r.bytes(len)?;
        records.push(RawRecord { kind, name, payload });
    }

    Ok(ArchiveStream {
        version,
        root,
        records,
    })
}
