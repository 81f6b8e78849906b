//! Builds small tar archives in memory for tests

use flate2::{Compression, write::GzEncoder};
use std::io::Write;

#[derive(Default)]
pub struct TarBuilder {
    data: Vec<u8>,
}

impl TarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(self, name: &str) -> Self {
        self.entry(name, "", b'5', 0o755, &[], "")
    }

    pub fn file(self, name: &str, contents: &[u8]) -> Self {
        self.entry(name, "", b'0', 0o644, contents, "")
    }

    pub fn file_with_mode(self, name: &str, mode: u32, contents: &[u8]) -> Self {
        self.entry(name, "", b'0', mode, contents, "")
    }

    pub fn symlink(self, name: &str, target: &str) -> Self {
        self.entry(name, "", b'2', 0o777, &[], target)
    }

    pub fn hardlink(self, name: &str, target: &str) -> Self {
        self.entry(name, "", b'1', 0o644, &[], target)
    }

    pub fn prefixed(self, prefix: &str, name: &str, contents: &[u8]) -> Self {
        self.entry(name, prefix, b'0', 0o644, contents, "")
    }

    pub fn long_file(self, name: &str, contents: &[u8]) -> Self {
        let mut long = name.as_bytes().to_vec();
        long.push(0);
        self.entry("././@LongLink", "", b'L', 0o644, &long, "")
            .entry(&name[..99], "", b'0', 0o644, contents, "")
    }

    /// Archive bytes without the end-of-archive marker
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.data.extend_from_slice(&[0u8; 1024]);
        self.data
    }

    pub fn finish_gz(self) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder
            .write_all(&self.finish())
            .expect("gzip into memory");
        encoder.finish().expect("gzip into memory")
    }

    fn entry(
        mut self,
        name: &str,
        prefix: &str,
        typeflag: u8,
        mode: u32,
        contents: &[u8],
        link: &str,
    ) -> Self {
        let mut header = [0u8; 512];
        put(&mut header[0..100], name.as_bytes());
        put(&mut header[100..108], format!("{:07o}\0", mode).as_bytes());
        put(&mut header[108..116], b"0000000\0");
        put(&mut header[116..124], b"0000000\0");
        put(
            &mut header[124..136],
            format!("{:011o}\0", contents.len()).as_bytes(),
        );
        put(&mut header[136..148], b"00000000000\0");
        header[156] = typeflag;
        put(&mut header[157..257], link.as_bytes());
        put(&mut header[257..263], b"ustar\0");
        put(&mut header[263..265], b"00");
        put(&mut header[345..500], prefix.as_bytes());

        header[148..156].copy_from_slice(b"        ");
        let checksum: u32 = header.iter().map(|b| *b as u32).sum();
        put(&mut header[148..156], format!("{:06o}\0 ", checksum).as_bytes());

        self.data.extend_from_slice(&header);
        self.data.extend_from_slice(contents);
        let padding = (512 - contents.len() % 512) % 512;
        self.data.extend(std::iter::repeat_n(0u8, padding));
        self
    }
}

fn put(field: &mut [u8], value: &[u8]) {
    let len = value.len().min(field.len());
    field[..len].copy_from_slice(&value[..len]);
}
