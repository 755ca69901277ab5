use flate2::{Decompress, FlushDecompress, Status};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::io::ReadAt;
use crate::{Error, Result};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipEntry};

const CHUNK_SIZE: usize = 64 * 1024;

/// Single-use stream over the decompressed content of one entry.
///
/// Data is pulled from the archive in bounded chunks; the CRC-32 and
/// length are checked once the last byte has been produced.
pub struct EntryReader<'a, R: ReadAt> {
    parser: &'a ZipParser<R>,
    name: String,
    method: CompressionMethod,
    position: u64,
    remaining: u64,
    inflater: Option<Decompress>,
    input: Vec<u8>,
    input_pos: usize,
    input_len: usize,
    stream_ended: bool,
    hasher: crc32fast::Hasher,
    produced: u64,
    expected_crc: u32,
    expected_size: u64,
    verified: bool,
}

impl<'a, R: ReadAt> EntryReader<'a, R> {
    pub(super) async fn new(parser: &'a ZipParser<R>, entry: &ZipEntry) -> Result<Self> {
        let inflater = match entry.compression_method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflate => Some(Decompress::new(false)),
            CompressionMethod::Unknown(method) => {
                return Err(Error::not_a_zip(
                    parser.source(),
                    format!(
                        "unsupported compression method {} for '{}'",
                        method, entry.file_name
                    ),
                ));
            }
        };
        let position = parser.get_data_offset(entry).await?;

        Ok(Self {
            parser,
            name: entry.file_name.clone(),
            method: entry.compression_method,
            position,
            remaining: entry.compressed_size,
            inflater,
            input: Vec::new(),
            input_pos: 0,
            input_len: 0,
            // Some writers store empty files as deflate with no payload
            stream_ended: entry.compressed_size == 0,
            hasher: crc32fast::Hasher::new(),
            produced: 0,
            expected_crc: entry.crc32,
            expected_size: entry.uncompressed_size,
            verified: false,
        })
    }

    fn corrupt(&self, reason: impl std::fmt::Display) -> Error {
        Error::not_a_zip(
            self.parser.source(),
            format!("entry '{}': {}", self.name, reason),
        )
    }

    /// Read the next chunk of content into `out`, returning 0 at the end
    pub async fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() || self.verified {
            return Ok(0);
        }

        let n = match self.method {
            CompressionMethod::Stored => self.read_stored(out).await?,
            _ => self.read_deflated(out).await?,
        };

        if n == 0 {
            self.verify()?;
        } else {
            self.hasher.update(&out[..n]);
            self.produced += n as u64;
            if self.produced > self.expected_size {
                return Err(self.corrupt("content is longer than its declared size"));
            }
        }
        Ok(n)
    }

    async fn read_stored(&mut self, out: &mut [u8]) -> Result<usize> {
        let n = (out.len() as u64).min(self.remaining) as usize;
        if n == 0 {
            return Ok(0);
        }
        self.read_raw(&mut out[..n]).await?;
        Ok(n)
    }

    async fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        self.parser
            .reader()
            .read_exact_at(self.position, buf)
            .await
            .map_err(|e| Error::io(self.parser.source(), e))?;
        self.position += buf.len() as u64;
        self.remaining -= buf.len() as u64;
        Ok(())
    }

    async fn read_deflated(&mut self, out: &mut [u8]) -> Result<usize> {
        loop {
            if self.stream_ended {
                return Ok(0);
            }

            if self.input_pos == self.input_len && self.remaining > 0 {
                let n = (CHUNK_SIZE as u64).min(self.remaining) as usize;
                let mut input = std::mem::take(&mut self.input);
                input.resize(n, 0);
                let read = self.read_raw(&mut input[..n]).await;
                self.input = input;
                read?;
                self.input_pos = 0;
                self.input_len = n;
            }

            let flush = if self.remaining == 0 {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            let Some(inflater) = self.inflater.as_mut() else {
                return Ok(0);
            };
            let before_in = inflater.total_in();
            let before_out = inflater.total_out();
            let status = inflater
                .decompress(&self.input[self.input_pos..self.input_len], out, flush)
                .map_err(|e| {
                    Error::not_a_zip(
                        self.parser.source(),
                        format!("entry '{}': {}", self.name, e),
                    )
                })?;
            let consumed = (inflater.total_in() - before_in) as usize;
            let written = (inflater.total_out() - before_out) as usize;
            self.input_pos += consumed;

            if status == Status::StreamEnd {
                self.stream_ended = true;
            }
            if written > 0 {
                return Ok(written);
            }
            if self.stream_ended {
                return Ok(0);
            }
            if consumed == 0 && self.input_pos == self.input_len && self.remaining == 0 {
                return Err(self.corrupt("deflate stream is truncated"));
            }
            if consumed == 0 && self.input_pos < self.input_len {
                return Err(self.corrupt("deflate stream made no progress"));
            }
        }
    }

    fn verify(&mut self) -> Result<()> {
        if self.verified {
            return Ok(());
        }
        if self.produced != self.expected_size {
            return Err(self.corrupt(format!(
                "expected {} bytes, got {}",
                self.expected_size, self.produced
            )));
        }
        let crc = std::mem::take(&mut self.hasher).finalize();
        if crc != self.expected_crc {
            return Err(self.corrupt(format!(
                "CRC-32 mismatch (expected {:08x}, got {:08x})",
                self.expected_crc, crc
            )));
        }
        self.verified = true;
        Ok(())
    }

    /// Read the whole entry into memory, failing past `limit` bytes
    pub async fn read_to_end(&mut self, limit: u64) -> Result<Vec<u8>> {
        if self.expected_size > limit {
            return Err(self.corrupt(format!("content exceeds {} bytes", limit)));
        }
        // Declared sizes are untrusted, grow with the data instead
        let mut data = Vec::with_capacity(self.expected_size.min(CHUNK_SIZE as u64) as usize);
        let mut buf = vec![0u8; CHUNK_SIZE.min(limit as usize).max(1)];
        loop {
            let n = self.read_chunk(&mut buf).await?;
            if n == 0 {
                return Ok(data);
            }
            data.extend_from_slice(&buf[..n]);
        }
    }

    /// Stream the entry into `writer`, one chunk at a time
    pub async fn copy_to<W: AsyncWrite + Unpin>(
        &mut self,
        writer: &mut W,
        dest: &std::path::Path,
    ) -> Result<u64> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = self.read_chunk(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(|e| Error::io(dest, e))?;
            total += n as u64;
        }
        writer.flush().await.map_err(|e| Error::io(dest, e))?;
        Ok(total)
    }
}
