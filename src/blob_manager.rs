//! Content-addressed storage for large serialized payloads.
//!
//! State documents stay small: shader sources, program binaries and the like
//! are stored as blobs and referenced from the document by id. A blob's id is
//! derived from its contents, so storing the same data twice yields the same
//! id and a single copy.
//!
//! `MemoryBlobManager` can be written to and read from a single archive
//! file:
//!
//! ```text
//! "GLSB" version:u8
//! (id_len:leb128 id:[u8; id_len] data_len:leb128 data:[u8; data_len])*
//! ```

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::prelude::*;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::fs;

use crate::error::BlobError;

/// Compute the id a blob with the given contents receives:
/// `[prefix]_HASH_SIZE.blob.ext`, where `HASH` is the first 64 bits of the
/// data's SHA-256 digest in upper-case hex. The bracketed prefix is omitted
/// when `prefix` is empty, and `ext` defaults to `raw`.
pub fn compute_unique_id(data: &[u8], prefix: &str, ext: &str) -> String {
    let digest = Sha256::digest(data);
    let mut leading = [0_u8; 8];
    leading.copy_from_slice(&digest[..8]);
    let hash = u64::from_be_bytes(leading);

    let ext = ext.trim_start_matches('.');
    let ext = if ext.is_empty() { "raw" } else { ext };

    if prefix.is_empty() {
        format!("{:016X}_{}.blob.{}", hash, data.len(), ext)
    } else {
        format!("[{}]_{:016X}_{}.blob.{}", prefix, hash, data.len(), ext)
    }
}

/// The prefix an id was created with, or the empty string.
pub fn get_prefix(id: &str) -> &str {
    if !id.starts_with('[') {
        return "";
    }
    match id.find(']') {
        Some(end) => &id[1..end],
        None => "",
    }
}

/// The extension an id was created with.
pub fn get_extension(id: &str) -> &str {
    match id.rfind('.') {
        Some(dot) => &id[dot + 1..],
        None => "",
    }
}

pub trait BlobManager {
    /// Store `data` under `id`, replacing anything already there. Returns
    /// the id.
    fn add_buf_using_id(&mut self, data: &[u8], id: &str) -> Result<String, BlobError>;

    fn get(&self, id: &str) -> Result<Vec<u8>, BlobError>;

    fn does_exist(&self, id: &str) -> bool;

    fn get_size(&self, id: &str) -> Option<u64>;

    /// All ids in the store, sorted.
    fn enumerate(&self) -> Vec<String>;

    fn add_buf_compute_unique_id(&mut self, data: &[u8], prefix: &str, ext: &str) -> Result<String, BlobError> {
        let id = compute_unique_id(data, prefix, ext);
        if self.does_exist(&id) {
            return Ok(id);
        }
        self.add_buf_using_id(data, &id)
    }

    /// Copy every blob in `other` into this store.
    fn populate(&mut self, other: &dyn BlobManager) -> Result<(), BlobError> {
        for id in other.enumerate() {
            let data = other.get(&id)?;
            self.add_buf_using_id(&data, &id)?;
        }
        Ok(())
    }
}

/// A blob store held entirely in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryBlobManager {
    blobs: BTreeMap<String, Vec<u8>>,
}

const ARCHIVE_MAGIC: &[u8; 4] = b"GLSB";
const ARCHIVE_VERSION: u8 = 1;

// Ids are short; anything longer is a corrupt length prefix.
const MAX_ID_LEN: u64 = 4096;

impl MemoryBlobManager {
    pub fn new() -> MemoryBlobManager {
        MemoryBlobManager::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn write_archive<W: Write>(&self, mut out: W) -> Result<(), BlobError> {
        out.write_all(ARCHIVE_MAGIC)?;
        out.write_all(&[ARCHIVE_VERSION])?;
        for (id, data) in &self.blobs {
            leb128::write::unsigned(&mut out, id.len() as u64)?;
            out.write_all(id.as_bytes())?;
            leb128::write::unsigned(&mut out, data.len() as u64)?;
            out.write_all(data)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn read_archive<R: Read>(mut input: R) -> Result<MemoryBlobManager, BlobError> {
        let mut header = [0_u8; 5];
        input.read_exact(&mut header).map_err(|_| {
            BlobError::BadArchive("file too short to hold a blob archive header".to_string())
        })?;
        if &header[..4] != ARCHIVE_MAGIC {
            return Err(BlobError::BadArchive("not a blob archive: bad magic number".to_string()));
        }
        if header[4] != ARCHIVE_VERSION {
            return Err(BlobError::BadArchive(format!(
                "blob archive version {} is not supported (expected {})",
                header[4], ARCHIVE_VERSION
            )));
        }

        let mut manager = MemoryBlobManager::new();
        while let Some(id_len) = read_length(&mut input)? {
            if id_len > MAX_ID_LEN {
                return Err(BlobError::BadArchive(format!("blob id length {} is too long", id_len)));
            }
            let id = read_bytes(&mut input, id_len)?;
            let id = String::from_utf8(id)
                .map_err(|_| BlobError::BadArchive("blob id is not UTF-8".to_string()))?;

            let data_len = read_length(&mut input)?
                .ok_or_else(|| BlobError::BadArchive(format!("blob {}: missing data length", id)))?;
            let data = read_bytes(&mut input, data_len)?;
            manager.blobs.insert(id, data);
        }

        Ok(manager)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BlobError> {
        let file = fs::File::create(path)?;
        self.write_archive(BufWriter::new(file))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<MemoryBlobManager, BlobError> {
        let file = fs::File::open(path)?;
        MemoryBlobManager::read_archive(BufReader::new(file))
    }
}

/// Read a LEB128 length, or `None` at a clean end of input.
fn read_length<R: Read>(input: &mut R) -> Result<Option<u64>, BlobError> {
    let mut first = [0_u8; 1];
    loop {
        match input.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let mut rest = (&first[..]).chain(input);
    match leb128::read::unsigned(&mut rest) {
        Ok(n) => Ok(Some(n)),
        Err(leb128::read::Error::IoError(e)) => Err(BlobError::BadArchive(format!("truncated length: {}", e))),
        Err(leb128::read::Error::Overflow) => Err(BlobError::BadArchive("length overflows u64".to_string())),
    }
}

fn read_bytes<R: Read>(input: &mut R, len: u64) -> Result<Vec<u8>, BlobError> {
    // Don't trust the length enough to preallocate it.
    let mut buf = Vec::new();
    input.take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(BlobError::BadArchive(format!(
            "truncated blob: expected {} bytes, found {}",
            len,
            buf.len()
        )));
    }
    Ok(buf)
}

impl BlobManager for MemoryBlobManager {
    fn add_buf_using_id(&mut self, data: &[u8], id: &str) -> Result<String, BlobError> {
        self.blobs.insert(id.to_string(), data.to_vec());
        Ok(id.to_string())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .get(id)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(id.to_string()))
    }

    fn does_exist(&self, id: &str) -> bool {
        self.blobs.contains_key(id)
    }

    fn get_size(&self, id: &str) -> Option<u64> {
        self.blobs.get(id).map(|data| data.len() as u64)
    }

    fn enumerate(&self) -> Vec<String> {
        self.blobs.keys().cloned().collect()
    }
}

/// A blob store that accepts everything and keeps nothing. Useful when only
/// the document itself is wanted.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullBlobManager;

impl BlobManager for NullBlobManager {
    fn add_buf_using_id(&mut self, _data: &[u8], id: &str) -> Result<String, BlobError> {
        Ok(id.to_string())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, BlobError> {
        Err(BlobError::NotFound(id.to_string()))
    }

    fn does_exist(&self, _id: &str) -> bool {
        false
    }

    fn get_size(&self, _id: &str) -> Option<u64> {
        None
    }

    fn enumerate(&self) -> Vec<String> {
        Vec::new()
    }
}
