//! Binary decoding of ZIP container records over any [`ReadAt`] source.
//!
//! ## Reading order
//!
//! An archive is located from its tail:
//! 1. Locate the End of Central Directory (EOCD) record
//! 2. Follow the ZIP64 locator when the EOCD fields are saturated
//! 3. Fetch the Central Directory with a single read
//! 4. Decode one Central Directory File Header each time the caller
//!    asks for the next entry
//! 5. For extraction, read each file's Local File Header and data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::IoContext;
use crate::io::ReadAt;
use crate::{Error, Result};

use super::encoding::FileNameEncoding;
use super::structures::*;

/// Largest archive comment the EOCD length field can describe
const MAX_COMMENT_SIZE: u64 = 65535;

/// Raw central directory plus the number of records it holds
pub struct CentralDirectory {
    pub data: Vec<u8>,
    pub total_entries: u64,
}

/// Record decoder for one archive.
///
/// Generic over the reader type so archives can come from a local file
/// or from memory. Typically used through
/// [`ZipArchive`](super::ZipArchive) rather than directly.
pub struct ZipParser<R: ReadAt> {
    /// Byte source
    reader: Arc<R>,
    /// Archive length in bytes
    size: u64,
    /// Where the archive came from, for error messages
    source: PathBuf,
}

impl<R: ReadAt> ZipParser<R> {
    /// `source` is only used to label errors.
    pub fn new(reader: Arc<R>, source: &Path) -> Self {
        let size = reader.size();
        Self {
            reader,
            size,
            source: source.to_path_buf(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::not_a_zip(&self.source, reason)
    }

    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset.saturating_add(buf.len() as u64) > self.size {
            return Err(self.corrupt("record extends past the end of the file"));
        }
        self.reader
            .read_exact_at(offset, buf)
            .await
            .at_path(&self.source)
    }

    /// Locate the EOCD record and return it with its file offset.
    ///
    /// Archives carrying a comment are scanned backwards over the
    /// last 64 KiB for the signature.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(self.corrupt("file is too small"));
        }

        // Common case: no archive comment
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.read_exact_at(offset, &mut buf).await?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf).map_err(|e| self.corrupt(e.0))?;
            return Ok((eocd, offset));
        }

        // EOCD not at expected location - the archive has a comment,
        // search backwards from the end of the file.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.read_exact_at(search_start, &mut buf).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length field must match the remaining bytes
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )
                    .map_err(|e| self.corrupt(e.0))?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(self.corrupt("end of central directory not found"))
    }

    /// Follow the ZIP64 locator that precedes the EOCD at `eocd_offset`.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The locator sits immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| self.corrupt("missing ZIP64 end of central directory locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.read_exact_at(locator_offset, &mut locator_buf).await?;

        let locator =
            Zip64EOCDLocator::from_bytes(&locator_buf).map_err(|e| self.corrupt(e.0))?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf).map_err(|e| self.corrupt(e.0))
    }

    /// Fetch the whole Central Directory in a single read.
    ///
    /// Records are decoded later, one per [`parse_cdfh`](Self::parse_cdfh)
    /// call, so listing stays lazy.
    pub async fn read_central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset.saturating_add(cd_size) > self.size {
            return Err(self.corrupt("central directory extends past the end of the file"));
        }

        let mut data = vec![0u8; cd_size as usize];
        self.read_exact_at(cd_offset, &mut data).await?;

        Ok(CentralDirectory {
            data,
            total_entries,
        })
    }

    /// Decode one CDFH record into a [`ZipEntry`].
    ///
    /// The cursor must be positioned at the start of a CDFH; on return it
    /// points at the next record.
    pub fn parse_cdfh(
        &self,
        cursor: &mut Cursor<&[u8]>,
        encoding: &FileNameEncoding,
    ) -> Result<ZipEntry> {
        self.decode_cdfh(cursor, encoding)
            .map_err(|e| self.corrupt(e.0))
    }

    fn decode_cdfh(
        &self,
        cursor: &mut Cursor<&[u8]>,
        encoding: &FileNameEncoding,
    ) -> RecordResult<ZipEntry> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(InvalidRecord("invalid central directory file header"));
        }

        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attributes = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut raw_file_name = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut raw_file_name)?;
        let file_name = encoding.decode(&raw_file_name, flags & FLAG_UTF8 != 0);

        // Directory entries end with '/'
        let is_directory = file_name.ends_with('/');

        // ZIP64 extended information lives in extra field 0x0001
        let extra_field_end = cursor.position() + extra_field_length as u64;

        while cursor.position() + 4 <= extra_field_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()?;
            let field_end = cursor.position() + field_size as u64;

            if header_id == 0x0001 {
                // Present only when the header field is 0xFFFFFFFF
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
            }
            cursor.set_position(field_end);
        }

        cursor.set_position(extra_field_end + file_comment_length as u64);
        if cursor.position() > cursor.get_ref().len() as u64 {
            return Err(InvalidRecord("truncated central directory"));
        }

        Ok(ZipEntry {
            file_name,
            raw_file_name,
            is_directory,
            version_made_by,
            flags,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            external_attributes,
            lfh_offset,
            last_mod_time,
            last_mod_date,
        })
    }

    /// Offset of the first content byte of `entry`.
    ///
    /// Name and extra field lengths in the local header can differ from
    /// the central copy, so the local header is consulted.
    pub async fn get_data_offset(&self, entry: &ZipEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.read_exact_at(entry.lfh_offset, &mut lfh_buf).await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(self.corrupt(format!(
                "invalid local file header for '{}'",
                entry.file_name
            )));
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26);

        let file_name_length = cursor.read_u16::<LittleEndian>().at_path(&self.source)? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>().at_path(&self.source)? as u64;

        // Fixed header, then name, then extra field
        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset.saturating_add(entry.compressed_size) > self.size {
            return Err(self.corrupt(format!(
                "data of '{}' extends past the end of the file",
                entry.file_name
            )));
        }

        Ok(data_offset)
    }

    /// Shared handle on the byte source
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}
