//! Safetensors storage for averaged ERPs.
//!
//! An ERP file holds four tensors:
//!
//! ```text
//! erp       F32 [C, T]
//! tmin      F64 [1]
//! tstep     F64 [1]
//! ch_names  U8  [n]    newline-joined channel names
//! ```
//!
//! Files are written to a `.partial` sibling and renamed into place, so a
//! path that exists always holds a complete file.
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use serde_json::Value;

use crate::series::{Series, TimeAxis};

// ── Writer ────────────────────────────────────────────────────────────────────

/// Minimal safetensors builder for F32, F64 and U8 tensors.
///
/// ```rust,no_run
/// use alice_eeg::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("tstep", &[0.01], &[1]);
/// w.write_atomic(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f32_arr2(&mut self, name: &str, arr: &Array2<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_bytes(&mut self, name: &str, data: &[u8]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", vec![data.len()]));
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(
                name.clone(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let mut header = serde_json::to_vec(&header_map)?;
        let pad = (8 - header.len() % 8) % 8;
        header.extend(std::iter::repeat(b' ').take(pad));

        let mut out = Vec::with_capacity(8 + header.len() + offset);
        out.extend_from_slice(&(header.len() as u64).to_le_bytes());
        out.extend_from_slice(&header);
        for (_, data, _, _) in &self.entries {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    /// Write to `path` via a temporary sibling and a rename.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let bytes = self.encode()?;
        let tmp = partial_path(path);
        {
            let mut f = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path).with_context(|| format!("rename {} → {}", tmp.display(), path.display()))
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

// ── Reader ────────────────────────────────────────────────────────────────────

struct StFile {
    bytes: Vec<u8>,
    header: HashMap<String, Value>,
    data_start: usize,
}

impl StFile {
    fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("open {}", path.display()))?;
        if bytes.len() < 8 {
            bail!("{}: safetensors file too small", path.display());
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = u64::from_le_bytes(len) as usize;
        if bytes.len() < 8 + n {
            bail!("{}: truncated safetensors header", path.display());
        }
        let header: HashMap<String, Value> = serde_json::from_slice(&bytes[8..8 + n])
            .with_context(|| format!("parse safetensors header of {}", path.display()))?;
        Ok(Self { bytes, header, data_start: 8 + n })
    }

    fn raw(&self, name: &str) -> Result<(&[u8], Vec<usize>)> {
        let entry = self.header.get(name).ok_or_else(|| anyhow!("missing tensor '{name}'"))?;
        let as_usizes = |v: &Value| -> Option<Vec<usize>> {
            v.as_array()?.iter().map(|x| x.as_u64().map(|u| u as usize)).collect()
        };
        let offsets = as_usizes(&entry["data_offsets"]).ok_or_else(|| anyhow!("bad offsets for '{name}'"))?;
        let shape = as_usizes(&entry["shape"]).ok_or_else(|| anyhow!("bad shape for '{name}'"))?;
        let (s, e) = match offsets[..] {
            [s, e] if s <= e && self.data_start + e <= self.bytes.len() => (s, e),
            _ => bail!("tensor '{name}' lies outside the file"),
        };
        Ok((&self.bytes[self.data_start + s..self.data_start + e], shape))
    }

    fn f32(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
        let (raw, shape) = self.raw(name)?;
        let v = raw.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect();
        Ok((v, shape))
    }

    fn f64_scalar(&self, name: &str) -> Result<f64> {
        let (raw, _) = self.raw(name)?;
        let b: [u8; 8] = raw
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| anyhow!("tensor '{name}' is empty"))?;
        Ok(f64::from_le_bytes(b))
    }
}

// ── ERP files ────────────────────────────────────────────────────────────────

pub fn write_erp(erp: &Series, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f32_arr2("erp", &erp.data);
    w.add_f64("tmin", &[erp.axis.tmin], &[1]);
    w.add_f64("tstep", &[erp.axis.tstep], &[1]);
    w.add_bytes("ch_names", erp.ch_names.join("\n").as_bytes());
    w.write_atomic(path)
}

pub fn read_erp(path: &Path) -> Result<Series> {
    let f = StFile::open(path)?;
    let (values, shape) = f.f32("erp")?;
    let (n_ch, n_t) = match shape[..] {
        [c, t] => (c, t),
        _ => bail!("{}: 'erp' must be 2-D, got {:?}", path.display(), shape),
    };
    let data = Array2::from_shape_vec((n_ch, n_t), values)?;
    let (names, _) = f.raw("ch_names")?;
    let ch_names = std::str::from_utf8(names)?
        .split('\n')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    let axis = TimeAxis::new(f.f64_scalar("tmin")?, f.f64_scalar("tstep")?, n_t);
    Ok(Series::new(axis, ch_names, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erp_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("S01_erp_word.safetensors");
        let data = Array2::from_shape_fn((3, 11), |(c, t)| c as f32 - t as f32 * 0.5);
        let erp = Series::new(
            TimeAxis::new(-0.1, 0.01, 11),
            vec!["1".into(), "2".into(), "33".into()],
            data,
        )
        .unwrap();
        write_erp(&erp, &path).unwrap();
        assert!(!partial_path(&path).exists());
        assert_eq!(read_erp(&path).unwrap(), erp);
    }

    #[test]
    fn header_is_eight_byte_aligned() {
        let mut w = StWriter::new();
        w.add_bytes("x", b"abc");
        let bytes = w.encode().unwrap();
        let n = u64::from_le_bytes(bytes[..8].try_into().unwrap());
        assert_eq!(n % 8, 0);
    }

    #[test]
    fn missing_tensor_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x.safetensors");
        let mut w = StWriter::new();
        w.add_f64("tmin", &[0.0], &[1]);
        w.write_atomic(&path).unwrap();
        assert!(read_erp(&path).is_err());
    }
}
