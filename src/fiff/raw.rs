//! Preloaded raw FIF reader.
//!
//! Walks the `FIFFB_RAW_DATA` block, decodes every data buffer and returns a
//! calibrated `[n_chan, n_times]` array. Skipped buffers become zeros, as in
//! `mne.io.read_raw_fif(..., preload=True)`.
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{s, Array2};

use super::constants::*;
use super::info::MeasInfo;
use super::tag::{Tag, TagReader};
use super::tree::Block;

#[derive(Debug, Clone)]
pub struct RawFif {
    pub info: MeasInfo,
    /// `[n_chan, n_times]`, physical units.
    pub data: Array2<f64>,
}

pub fn read_raw_fif<P: AsRef<Path>>(path: P) -> Result<RawFif> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = TagReader::new(BufReader::new(file));

    let directory = reader.directory()?;
    let root = Block::read(&mut reader, &directory)?;
    let meas = root
        .find(FIFFB_MEAS)
        .ok_or_else(|| anyhow!("{}: FIFFB_MEAS not found", path.display()))?;
    let info = MeasInfo::read(&mut reader, meas)?;
    let raw_block = meas
        .find(FIFFB_RAW_DATA)
        .or_else(|| meas.find(FIFFB_CONTINUOUS_DATA))
        .ok_or_else(|| anyhow!("{}: no raw-data block", path.display()))?;

    let data = read_buffers(&mut reader, raw_block, &info)
        .with_context(|| format!("reading data buffers of {}", path.display()))?;
    Ok(RawFif { info, data })
}

enum Chunk {
    Data(Tag),
    Gap(usize),
}

fn read_buffers<R: Read + Seek>(
    reader: &mut TagReader<R>,
    block: &Block,
    info: &MeasInfo,
) -> Result<Array2<f64>> {
    let n_chan = info.chs.len();
    if n_chan == 0 {
        bail!("measurement info lists no channels");
    }
    let mut pending_skip = 0usize;
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut n_times = 0usize;

    for tag in &block.tags {
        match tag.kind {
            FIFF_DATA_SKIP => pending_skip += reader.int(tag)?.max(0) as usize,
            FIFF_DATA_BUFFER => {
                let width = sample_width(tag.ftype)
                    .ok_or_else(|| anyhow!("unsupported buffer type {}", tag.ftype))?;
                let n_samp = tag.size.max(0) as usize / (width * n_chan);
                // A skip is counted in buffers of the size that follows it;
                // one before the first buffer only moves the acquisition start.
                if pending_skip > 0 && !chunks.is_empty() {
                    let gap = pending_skip * n_samp;
                    chunks.push(Chunk::Gap(gap));
                    n_times += gap;
                }
                pending_skip = 0;
                chunks.push(Chunk::Data(*tag));
                n_times += n_samp;
            }
            _ => {}
        }
    }
    if !chunks.iter().any(|c| matches!(c, Chunk::Data(_))) {
        bail!("no FIFF_DATA_BUFFER tags in raw-data block");
    }

    let cals: Vec<f64> = info.chs.iter().map(|c| c.calibration()).collect();
    let mut out = Array2::<f64>::zeros((n_chan, n_times));
    let mut t0 = 0usize;
    for chunk in &chunks {
        match chunk {
            Chunk::Gap(n) => t0 += n,
            Chunk::Data(tag) => {
                let buf = decode_buffer(&reader.payload(tag)?, tag.ftype, n_chan, &cals)?;
                let n = buf.ncols();
                out.slice_mut(s![.., t0..t0 + n]).assign(&buf);
                t0 += n;
            }
        }
    }
    Ok(out)
}

/// Decode interleaved `[n_samp, n_chan]` big-endian samples into a
/// calibrated `[n_chan, n_samp]` block.
fn decode_buffer(bytes: &[u8], ftype: u32, n_chan: usize, cals: &[f64]) -> Result<Array2<f64>> {
    let width = sample_width(ftype).ok_or_else(|| anyhow!("unsupported buffer type {ftype}"))?;
    let n_samp = bytes.len() / (width * n_chan);
    let decode: fn(&[u8]) -> f64 = match ftype {
        FIFFT_FLOAT => |b: &[u8]| f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
        FIFFT_DOUBLE => |b: &[u8]| f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        FIFFT_INT => |b: &[u8]| i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
        FIFFT_SHORT | FIFFT_DAU_PACK16 => |b: &[u8]| i16::from_be_bytes([b[0], b[1]]) as f64,
        other => bail!("unsupported buffer type {other}"),
    };
    let mut out = Array2::<f64>::zeros((n_chan, n_samp));
    for (i, sample) in bytes.chunks_exact(width).take(n_samp * n_chan).enumerate() {
        let (t, c) = (i / n_chan, i % n_chan);
        out[[c, t]] = decode(sample) * cals[c];
    }
    Ok(out)
}
