//! Tag-level access to a FIF file.
//!
//! Every tag is a 16-byte big-endian header `(kind, type, size, next)`
//! followed by `size` payload bytes. [`TagReader`] wraps any `Read + Seek`
//! source and hands out headers and decoded payloads.
use std::io::{Read, Seek, SeekFrom};

use anyhow::{bail, Context, Result};

use super::constants::*;

/// Header of one tag; the payload is read on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub kind: i32,
    pub ftype: u32,
    pub size: i32,
    pub next: i32,
    /// Byte offset of the header.
    pub pos: u64,
}

impl Tag {
    #[inline]
    pub fn data_pos(&self) -> u64 {
        self.pos + 16
    }

    /// Offset of the following tag, or `None` at the end of the chain.
    pub fn next_pos(&self) -> Option<u64> {
        match self.next {
            FIFFV_NEXT_SEQ => Some(self.data_pos() + self.size.max(0) as u64),
            n if n > 0 => Some(n as u64),
            _ => None,
        }
    }
}

pub struct TagReader<R> {
    inner: R,
}

impl<R: Read + Seek> TagReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn header_at(&mut self, pos: u64) -> Result<Tag> {
        self.inner
            .seek(SeekFrom::Start(pos))
            .with_context(|| format!("seek to tag @ {pos:#x}"))?;
        let mut b = [0u8; 16];
        self.inner
            .read_exact(&mut b)
            .with_context(|| format!("read tag header @ {pos:#x}"))?;
        Ok(Tag {
            kind: be_i32(&b[0..4]),
            ftype: be_u32(&b[4..8]),
            size: be_i32(&b[8..12]),
            next: be_i32(&b[12..16]),
            pos,
        })
    }

    /// Raw payload bytes.
    pub fn payload(&mut self, tag: &Tag) -> Result<Vec<u8>> {
        self.inner
            .seek(SeekFrom::Start(tag.data_pos()))
            .with_context(|| format!("seek to payload @ {:#x}", tag.data_pos()))?;
        let mut buf = vec![0u8; tag.size.max(0) as usize];
        self.inner
            .read_exact(&mut buf)
            .with_context(|| format!("read {} payload bytes of tag kind {}", buf.len(), tag.kind))?;
        Ok(buf)
    }

    pub fn int(&mut self, tag: &Tag) -> Result<i32> {
        let p = self.payload(tag)?;
        if p.len() < 4 {
            bail!("tag kind {}: expected an i32 payload, got {} bytes", tag.kind, p.len());
        }
        Ok(be_i32(&p[..4]))
    }

    pub fn float(&mut self, tag: &Tag) -> Result<f32> {
        let p = self.payload(tag)?;
        if p.len() < 4 {
            bail!("tag kind {}: expected an f32 payload, got {} bytes", tag.kind, p.len());
        }
        Ok(f32::from_be_bytes([p[0], p[1], p[2], p[3]]))
    }

    /// Latin-1 string payload.
    pub fn string(&mut self, tag: &Tag) -> Result<String> {
        Ok(self.payload(tag)?.into_iter().map(char::from).collect())
    }

    /// Flat list of every tag header in file order.
    ///
    /// Uses the directory embedded at `FIFF_DIR_POINTER` when the file has
    /// one, otherwise follows the `next` chain from offset 0.
    pub fn directory(&mut self) -> Result<Vec<Tag>> {
        if let Some(dir) = self.embedded_directory()? {
            return Ok(dir);
        }
        let mut out = Vec::new();
        let mut pos = Some(0u64);
        while let Some(p) = pos {
            let tag = self.header_at(p)?;
            pos = tag.next_pos();
            out.push(tag);
        }
        Ok(out)
    }

    fn embedded_directory(&mut self) -> Result<Option<Vec<Tag>>> {
        let id = self.header_at(0)?;
        if id.kind != FIFF_FILE_ID {
            bail!("not a FIF file (first tag kind {})", id.kind);
        }
        let Some(next) = id.next_pos() else { return Ok(None) };
        let ptr = self.header_at(next)?;
        if ptr.kind != FIFF_DIR_POINTER {
            return Ok(None);
        }
        let dirpos = self.int(&ptr)?;
        if dirpos <= 0 {
            return Ok(None);
        }
        let dir = self.header_at(dirpos as u64)?;
        if dir.ftype != FIFFT_DIR_ENTRY_STRUCT {
            return Ok(None);
        }
        // Directory entries reuse the header layout, with `next` holding the
        // absolute position of the tag they describe.
        let raw = self.payload(&dir)?;
        Ok(Some(
            raw.chunks_exact(16)
                .map(|e| Tag {
                    kind: be_i32(&e[0..4]),
                    ftype: be_u32(&e[4..8]),
                    size: be_i32(&e[8..12]),
                    next: FIFFV_NEXT_NONE,
                    pos: be_u32(&e[12..16]) as u64,
                })
                .collect(),
        ))
    }
}

#[inline]
pub(crate) fn be_i32(b: &[u8]) -> i32 {
    i32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[inline]
pub(crate) fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[inline]
pub(crate) fn be_f32(b: &[u8]) -> f32 {
    f32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tag_bytes(kind: i32, ftype: u32, payload: &[u8], next: i32) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&kind.to_be_bytes());
        b.extend_from_slice(&ftype.to_be_bytes());
        b.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        b.extend_from_slice(&next.to_be_bytes());
        b.extend_from_slice(payload);
        b
    }

    #[test]
    fn next_pos_rules() {
        let t = Tag { kind: 1, ftype: 3, size: 8, next: 0, pos: 100 };
        assert_eq!(t.next_pos(), Some(124));
        assert_eq!(Tag { next: 5000, ..t }.next_pos(), Some(5000));
        assert_eq!(Tag { next: -1, ..t }.next_pos(), None);
    }

    #[test]
    fn scans_chain_without_embedded_directory() {
        let mut file = tag_bytes(FIFF_FILE_ID, 31, &[0u8; 20], FIFFV_NEXT_SEQ);
        file.extend(tag_bytes(FIFF_DIR_POINTER, FIFFT_INT, &(-1i32).to_be_bytes(), FIFFV_NEXT_SEQ));
        file.extend(tag_bytes(FIFF_NCHAN, FIFFT_INT, &7i32.to_be_bytes(), FIFFV_NEXT_SEQ));
        file.extend(tag_bytes(FIFF_BAD_CHS, FIFFT_STRING, b"Fp1:O2", FIFFV_NEXT_NONE));

        let mut r = TagReader::new(Cursor::new(file));
        let dir = r.directory().unwrap();
        assert_eq!(dir.len(), 4);
        assert_eq!(r.int(&dir[2]).unwrap(), 7);
        assert_eq!(r.string(&dir[3]).unwrap(), "Fp1:O2");
    }

    #[test]
    fn rejects_non_fif() {
        let file = tag_bytes(FIFF_NCHAN, FIFFT_INT, &1i32.to_be_bytes(), FIFFV_NEXT_NONE);
        assert!(TagReader::new(Cursor::new(file)).directory().is_err());
    }
}
