use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Error raised while decoding a fixed-size record
#[derive(Debug)]
pub struct InvalidRecord(pub &'static str);

impl std::fmt::Display for InvalidRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl From<std::io::Error> for InvalidRecord {
    fn from(_: std::io::Error) -> Self {
        InvalidRecord("truncated record")
    }
}

pub type RecordResult<T> = std::result::Result<T, InvalidRecord>;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// General purpose flag: sizes and CRC follow the data in a descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag: file name and comment are UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// Host system byte of `version made by` for MS-DOS and compatibles
pub const HOST_MSDOS: u8 = 0;
/// Host system byte of `version made by` for Unix
pub const HOST_UNIX: u8 = 3;
/// PKZIP 2.0, enough for deflate and directories
pub const VERSION_NEEDED: u16 = 20;

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> RecordResult<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(InvalidRecord("invalid end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }

    /// Single-disk record without a comment
    pub fn for_single_disk(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        // Writes into a Vec cannot fail
        let _ = buf.write_u16::<LittleEndian>(self.disk_number);
        let _ = buf.write_u16::<LittleEndian>(self.disk_with_cd);
        let _ = buf.write_u16::<LittleEndian>(self.disk_entries);
        let _ = buf.write_u16::<LittleEndian>(self.total_entries);
        let _ = buf.write_u32::<LittleEndian>(self.cd_size);
        let _ = buf.write_u32::<LittleEndian>(self.cd_offset);
        let _ = buf.write_u16::<LittleEndian>(self.comment_len);
        buf
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> RecordResult<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(InvalidRecord("invalid ZIP64 end of central directory locator"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> RecordResult<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(InvalidRecord("invalid ZIP64 end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor that trails streamed entry data
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Decoded relative path, directories end with `/`
    pub file_name: String,
    /// Raw file name bytes as stored in the central directory
    pub raw_file_name: Vec<u8>,
    pub is_directory: bool,
    pub version_made_by: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub external_attributes: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
}

impl ZipEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Host system byte from `version made by`
    pub fn host_system(&self) -> u8 {
        (self.version_made_by >> 8) as u8
    }

    /// Whether the entry name is flagged as UTF-8
    pub fn is_utf8(&self) -> bool {
        self.flags & FLAG_UTF8 != 0
    }
}

/// Header fields shared by local and central records of a written entry
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub file_name: String,
    pub version_made_by: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attributes: u32,
    pub lfh_offset: u32,
}

impl EntryHeader {
    /// Local file header, sizes are zero when a data descriptor follows
    pub fn local_header_bytes(&self) -> Vec<u8> {
        let name = self.file_name.as_bytes();
        let mut buf = Vec::with_capacity(LFH_SIZE + name.len());
        buf.extend_from_slice(LFH_SIGNATURE);
        let _ = buf.write_u16::<LittleEndian>(VERSION_NEEDED);
        let _ = buf.write_u16::<LittleEndian>(self.flags);
        let _ = buf.write_u16::<LittleEndian>(self.compression_method.as_u16());
        let _ = buf.write_u16::<LittleEndian>(self.last_mod_time);
        let _ = buf.write_u16::<LittleEndian>(self.last_mod_date);
        if self.flags & FLAG_DATA_DESCRIPTOR != 0 {
            let _ = buf.write_u32::<LittleEndian>(0);
            let _ = buf.write_u32::<LittleEndian>(0);
            let _ = buf.write_u32::<LittleEndian>(0);
        } else {
            let _ = buf.write_u32::<LittleEndian>(self.crc32);
            let _ = buf.write_u32::<LittleEndian>(self.compressed_size);
            let _ = buf.write_u32::<LittleEndian>(self.uncompressed_size);
        }
        let _ = buf.write_u16::<LittleEndian>(name.len() as u16);
        let _ = buf.write_u16::<LittleEndian>(0);
        buf.extend_from_slice(name);
        buf
    }

    pub fn data_descriptor_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
        let _ = buf.write_u32::<LittleEndian>(self.crc32);
        let _ = buf.write_u32::<LittleEndian>(self.compressed_size);
        let _ = buf.write_u32::<LittleEndian>(self.uncompressed_size);
        buf
    }

    pub fn central_header_bytes(&self) -> Vec<u8> {
        let name = self.file_name.as_bytes();
        let mut buf = Vec::with_capacity(CDFH_MIN_SIZE + name.len());
        buf.extend_from_slice(CDFH_SIGNATURE);
        let _ = buf.write_u16::<LittleEndian>(self.version_made_by);
        let _ = buf.write_u16::<LittleEndian>(VERSION_NEEDED);
        let _ = buf.write_u16::<LittleEndian>(self.flags);
        let _ = buf.write_u16::<LittleEndian>(self.compression_method.as_u16());
        let _ = buf.write_u16::<LittleEndian>(self.last_mod_time);
        let _ = buf.write_u16::<LittleEndian>(self.last_mod_date);
        let _ = buf.write_u32::<LittleEndian>(self.crc32);
        let _ = buf.write_u32::<LittleEndian>(self.compressed_size);
        let _ = buf.write_u32::<LittleEndian>(self.uncompressed_size);
        let _ = buf.write_u16::<LittleEndian>(name.len() as u16);
        let _ = buf.write_u16::<LittleEndian>(0); // extra field
        let _ = buf.write_u16::<LittleEndian>(0); // comment
        let _ = buf.write_u16::<LittleEndian>(0); // disk number start
        let _ = buf.write_u16::<LittleEndian>(0); // internal attributes
        let _ = buf.write_u32::<LittleEndian>(self.external_attributes);
        let _ = buf.write_u32::<LittleEndian>(self.lfh_offset);
        buf.extend_from_slice(name);
        buf
    }
}
