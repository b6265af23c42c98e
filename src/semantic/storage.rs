//! Binary storage for a vector collection.
//!
//! File format: `<collection>.bin`
//!
//! Header (48 bytes):
//! - version: u8 (1)
//! - metric: u8 (0 = cosine distance)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated):
//! - id: string
//! - embedding: [f32; dimensions] (little-endian)
//! - metadata_count: u16, then (key: string, value: string) pairs
//! - document: string
//!
//! Strings are a u32 little-endian byte length followed by UTF-8 bytes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::semantic::index::{Metadata, VectorEntry, VectorIndex};

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Distance metric tag for cosine distance, the only metric written today
pub const METRIC_COSINE: u8 = 0;

/// Header size in bytes: version(1) + metric(1) + model_id(32) + dimensions(2) + entry_count(8) + checksum(4)
const HEADER_SIZE: usize = 48;

/// Entries reserved up front when loading; the rest grow on demand
const PREALLOCATE_ENTRIES: u64 = 1024;

/// Upper bound for a single stored string, guards against reading garbage lengths
const MAX_STRING_LEN: u32 = 16 * 1024 * 1024;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Unsupported distance metric tag {0}")]
    UnsupportedMetric(u8),

    #[error("Model mismatch: collection was built with a different embedding model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Storage manager for one collection file.
pub struct VectorStorage {
    path: PathBuf,
}

impl VectorStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the vector index from storage.
    ///
    /// Fails if the file was written for another model or dimension count.
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<VectorIndex, VectorStorageError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let header = self.read_header(&mut reader)?;
        self.validate_header(&header, expected_model_id, expected_dimensions)?;

        let mut index = VectorIndex::with_capacity(
            header.dimensions as usize,
            header.entry_count.min(PREALLOCATE_ENTRIES) as usize,
        );

        for _ in 0..header.entry_count {
            let entry = self.read_entry(&mut reader, header.dimensions as usize)?;
            index.insert(entry).map_err(|e| {
                VectorStorageError::InvalidFormat(format!("stored entry rejected: {e}"))
            })?;
        }

        Ok(index)
    }

    /// Read just the header, without model or dimension expectations.
    pub fn peek_header(&self) -> Result<HeaderInfo, VectorStorageError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let header = self.read_header(&mut reader)?;

        Ok(HeaderInfo {
            model_id: header.model_id,
            dimensions: header.dimensions as usize,
            entry_count: header.entry_count,
        })
    }

    /// Save the vector index to storage.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(&self, index: &VectorIndex, model_id: &[u8; 32]) -> Result<(), VectorStorageError> {
        let temp_path = self.path.with_extension("tmp");

        let result = self.write_to_file(&temp_path, index, model_id);

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Delete the storage file if it exists.
    pub fn delete(&self) -> Result<(), VectorStorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn write_to_file(
        &self,
        path: &Path,
        index: &VectorIndex,
        model_id: &[u8; 32],
    ) -> Result<(), VectorStorageError> {
        let dimensions = u16::try_from(index.dimensions()).map_err(|_| {
            VectorStorageError::InvalidFormat(format!(
                "{} dimensions do not fit the file header",
                index.dimensions()
            ))
        })?;

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header = Header {
            version: FORMAT_VERSION,
            metric: METRIC_COSINE,
            model_id: *model_id,
            dimensions,
            entry_count: index.len() as u64,
        };
        self.write_header(&mut writer, &header)?;

        for entry in index.iter() {
            self.write_entry(&mut writer, entry)?;
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.sync_all()?;

        Ok(())
    }

    fn read_header(&self, reader: &mut impl Read) -> Result<Header, VectorStorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;

        let version = header_bytes[0];
        if version != FORMAT_VERSION {
            return Err(VectorStorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let stored_checksum = u32::from_le_bytes([
            header_bytes[44],
            header_bytes[45],
            header_bytes[46],
            header_bytes[47],
        ]);
        let computed_checksum = Self::compute_checksum(&header_bytes[0..44]);
        if stored_checksum != computed_checksum {
            return Err(VectorStorageError::ChecksumMismatch);
        }

        let metric = header_bytes[1];
        if metric != METRIC_COSINE {
            return Err(VectorStorageError::UnsupportedMetric(metric));
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&header_bytes[2..34]);

        let dimensions = u16::from_le_bytes([header_bytes[34], header_bytes[35]]);

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header_bytes[36..44]);
        let entry_count = u64::from_le_bytes(count_bytes);

        Ok(Header {
            version,
            metric,
            model_id,
            dimensions,
            entry_count,
        })
    }

    fn validate_header(
        &self,
        header: &Header,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<(), VectorStorageError> {
        if header.model_id != *expected_model_id {
            return Err(VectorStorageError::ModelMismatch);
        }

        if header.dimensions as usize != expected_dimensions {
            return Err(VectorStorageError::DimensionMismatch {
                expected: expected_dimensions,
                got: header.dimensions as usize,
            });
        }

        Ok(())
    }

    fn write_header(&self, writer: &mut impl Write, header: &Header) -> Result<(), VectorStorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];

        header_bytes[0] = header.version;
        header_bytes[1] = header.metric;
        header_bytes[2..34].copy_from_slice(&header.model_id);
        header_bytes[34..36].copy_from_slice(&header.dimensions.to_le_bytes());
        header_bytes[36..44].copy_from_slice(&header.entry_count.to_le_bytes());

        let checksum = Self::compute_checksum(&header_bytes[0..44]);
        header_bytes[44..48].copy_from_slice(&checksum.to_le_bytes());

        writer.write_all(&header_bytes)?;
        Ok(())
    }

    fn read_entry(
        &self,
        reader: &mut impl Read,
        dimensions: usize,
    ) -> Result<VectorEntry, VectorStorageError> {
        let id = read_string(reader)?;

        let mut embedding = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            let mut float_bytes = [0u8; 4];
            reader.read_exact(&mut float_bytes)?;
            embedding.push(f32::from_le_bytes(float_bytes));
        }

        let mut count_bytes = [0u8; 2];
        reader.read_exact(&mut count_bytes)?;
        let metadata_count = u16::from_le_bytes(count_bytes);

        let mut metadata = Metadata::new();
        for _ in 0..metadata_count {
            let key = read_string(reader)?;
            let value = read_string(reader)?;
            metadata.insert(key, value);
        }

        let document = read_string(reader)?;

        Ok(VectorEntry {
            id,
            embedding,
            metadata,
            document,
        })
    }

    fn write_entry(&self, writer: &mut impl Write, entry: &VectorEntry) -> Result<(), VectorStorageError> {
        write_string(writer, &entry.id)?;

        for &value in &entry.embedding {
            writer.write_all(&value.to_le_bytes())?;
        }

        let metadata_count = u16::try_from(entry.metadata.len()).map_err(|_| {
            VectorStorageError::InvalidFormat(format!("entry '{}' has too many metadata keys", entry.id))
        })?;
        writer.write_all(&metadata_count.to_le_bytes())?;
        for (key, value) in &entry.metadata {
            write_string(writer, key)?;
            write_string(writer, value)?;
        }

        write_string(writer, &entry.document)?;
        Ok(())
    }

    fn compute_checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

fn write_string(writer: &mut impl Write, value: &str) -> Result<(), VectorStorageError> {
    let len = u32::try_from(value.len())
        .ok()
        .filter(|len| *len <= MAX_STRING_LEN)
        .ok_or_else(|| VectorStorageError::InvalidFormat("string too long to store".to_string()))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_string(reader: &mut impl Read) -> Result<String, VectorStorageError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_STRING_LEN {
        return Err(VectorStorageError::InvalidFormat(format!(
            "string length {len} exceeds limit"
        )));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| VectorStorageError::InvalidFormat(e.to_string()))
}

/// File header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    metric: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
}

/// Public view of a collection file header.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub model_id: [u8; 32],
    pub dimensions: usize,
    pub entry_count: u64,
}
