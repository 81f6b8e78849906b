use log::{trace, warn};
use std::io::{self, Read, Write};

pub const BLOCK_LEN: u64 = 512;

const NAME: std::ops::Range<usize> = 0..100;
const MODE: std::ops::Range<usize> = 100..108;
const SIZE: std::ops::Range<usize> = 124..136;
const TYPEFLAG: usize = 156;
const LINKNAME: std::ops::Range<usize> = 157..257;
const MAGIC: std::ops::Range<usize> = 257..263;
const PREFIX: std::ops::Range<usize> = 345..500;

/// Longest GNU long-name payload we are willing to buffer
const MAX_LONG_NAME: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    Hardlink,
    Other(u8),
}

impl EntryKind {
    fn from_typeflag(flag: u8) -> EntryKind {
        match flag {
            b'0' | b'\0' | b'7' => EntryKind::Regular,
            b'1' => EntryKind::Hardlink,
            b'2' => EntryKind::Symlink,
            b'5' => EntryKind::Directory,
            other => EntryKind::Other(other),
        }
    }
}

/// One header from the archive, with its name already normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub link_target: String,
}

impl TarEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory || self.name.ends_with('/')
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, EntryKind::Symlink | EntryKind::Hardlink)
    }
}

/**
 * Minimal streaming tar parser. Only what a root filesystem image needs:
 * ustar/v7 headers, ustar name prefixes and GNU long names. Entries whose
 * name has a `..` segment never come out of `next_entry()`.
 *
 * Whatever part of an entry's payload the caller doesn't consume is skipped
 * automatically, so the stream is always at a block boundary when the next
 * header is read.
 */
pub struct TarReader<R: Read> {
    inner: R,
    remaining: u64,
    padding: u64,
    position: u64,
    finished: bool,
}

impl<R: Read> TarReader<R> {
    pub fn new(inner: R) -> Self {
        TarReader {
            inner,
            remaining: 0,
            padding: 0,
            position: 0,
            finished: false,
        }
    }

    /// Bytes consumed from the underlying stream so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Payload bytes of the current entry not yet read
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn next_entry(&mut self) -> io::Result<Option<TarEntry>> {
        let mut long_name: Option<String> = None;
        loop {
            if self.finished {
                return Ok(None);
            }
            self.skip_rest()?;

            let mut header = [0u8; BLOCK_LEN as usize];
            if !self.read_header(&mut header)? {
                self.finished = true;
                return Ok(None);
            }

            let mut entry = parse_header(&header);

            if entry.kind == EntryKind::Other(b'L') {
                let name = self.read_long_name(entry.size)?;
                long_name = Some(name);
                continue;
            }
            if let Some(name) = long_name.take() {
                entry.name = name;
            }
            entry.name = normalize_name(&entry.name);
            self.remaining = entry.size;
            self.padding = padding_for(entry.size);

            if has_parent_segment(&entry.name) {
                warn!("Skipping archive entry outside of root: {}", entry.name);
                continue;
            }

            trace!(
                "tar entry {:?} {:?} size={} mode={:o}",
                entry.name, entry.kind, entry.size, entry.mode
            );
            return Ok(Some(entry));
        }
    }

    /// Stream the rest of the current entry's payload into `out`
    pub fn copy_payload<W: Write>(&mut self, out: &mut W) -> io::Result<u64> {
        let mut buf = [0u8; 8192];
        let mut copied = 0;
        while self.remaining > 0 {
            let want = chunk_len(self.remaining, buf.len());
            let n = match self.inner.read(&mut buf[..want]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "archive ended inside an entry",
                    ));
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            out.write_all(&buf[..n])?;
            self.remaining -= n as u64;
            self.position += n as u64;
            copied += n as u64;
        }
        self.skip_padding()?;
        Ok(copied)
    }

    fn skip_rest(&mut self) -> io::Result<()> {
        if self.remaining > 0 {
            let skipped = self.discard(self.remaining)?;
            if skipped < self.remaining {
                self.finished = true;
            }
            self.remaining = 0;
        }
        self.skip_padding()
    }

    fn skip_padding(&mut self) -> io::Result<()> {
        if self.padding > 0 {
            self.discard(self.padding)?;
            self.padding = 0;
        }
        Ok(())
    }

    fn discard(&mut self, len: u64) -> io::Result<u64> {
        let skipped = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        self.position += skipped;
        Ok(skipped)
    }

    /* Returns false at the end of the archive: a clean EOF, an all-zero block,
     * or a header cut short by the end of the stream. */
    fn read_header(&mut self, header: &mut [u8]) -> io::Result<bool> {
        let mut read = 0;
        while read < header.len() {
            match self.inner.read(&mut header[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.position += read as u64;
        if read == 0 {
            return Ok(false);
        }
        if read < header.len() {
            warn!("Archive ends with a truncated header ({} bytes)", read);
            return Ok(false);
        }
        Ok(header.iter().any(|b| *b != 0))
    }

    fn read_long_name(&mut self, size: u64) -> io::Result<String> {
        if size > MAX_LONG_NAME {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("GNU long name of {} bytes", size),
            ));
        }
        self.remaining = size;
        self.padding = padding_for(size);
        let mut name = Vec::with_capacity(size as usize);
        self.copy_payload(&mut name)?;
        Ok(field_str(&name))
    }
}

/* Entry sizes can exceed usize on 32-bit hosts */
fn chunk_len(remaining: u64, buf_len: usize) -> usize {
    usize::try_from(remaining).unwrap_or(buf_len).min(buf_len)
}

fn padding_for(size: u64) -> u64 {
    (BLOCK_LEN - size % BLOCK_LEN) % BLOCK_LEN
}

fn parse_header(header: &[u8]) -> TarEntry {
    let mut name = field_str(&header[NAME]);
    if &header[MAGIC] == b"ustar\0" {
        let prefix = field_str(&header[PREFIX]);
        if !prefix.is_empty() {
            name = format!("{}/{}", prefix, name);
        }
    }
    TarEntry {
        name,
        kind: EntryKind::from_typeflag(header[TYPEFLAG]),
        size: parse_octal(&header[SIZE]),
        mode: parse_octal(&header[MODE]) as u32,
        link_target: field_str(&header[LINKNAME]),
    }
}

/// Text up to the first NUL
fn field_str(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Octal digits up to the first NUL or space. Garbage reads as 0.
fn parse_octal(field: &[u8]) -> u64 {
    let text: String = field
        .iter()
        .skip_while(|b| **b == b' ')
        .take_while(|b| **b != 0 && **b != b' ')
        .map(|b| *b as char)
        .collect();
    u64::from_str_radix(text.trim(), 8).unwrap_or(0)
}

pub fn normalize_name(name: &str) -> String {
    let mut name = name;
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            break;
        }
    }
    if name == "." {
        return String::new();
    }
    name.to_string()
}

pub fn has_parent_segment(name: &str) -> bool {
    name.split('/').any(|segment| segment == "..")
}
