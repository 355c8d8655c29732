//! Measurement info: channel table, sampling rate and bad channels.
use std::io::{Read, Seek};

use anyhow::{anyhow, bail, Result};

use super::constants::*;
use super::tag::{be_f32, be_i32, TagReader};
use super::tree::Block;

/// One `FIFFT_CH_INFO_STRUCT` record.
///
/// ```text
///  0  scanno     i32      24  loc[12]    f32 × 12
///  4  logno      i32      72  unit       i32
///  8  kind       i32      76  unit_mul   i32
/// 12  range      f32      80  ch_name    16 × u8, NUL padded
/// 16  cal        f32
/// 20  coil_type  i32
/// ```
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: i32,
    pub range: f32,
    pub cal: f32,
    /// First three `loc` entries: sensor position in metres.
    pub pos: [f32; 3],
}

impl ChannelInfo {
    pub const SIZE: usize = 96;

    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::SIZE {
            bail!("ch_info payload too short: {} bytes (need {})", raw.len(), Self::SIZE);
        }
        let name_bytes = &raw[80..96];
        let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(16);
        Ok(Self {
            name: name_bytes[..end].iter().copied().map(char::from).collect(),
            kind: be_i32(&raw[8..12]),
            range: be_f32(&raw[12..16]),
            cal: be_f32(&raw[16..20]),
            pos: [be_f32(&raw[24..28]), be_f32(&raw[28..32]), be_f32(&raw[32..36])],
        })
    }

    /// Factor from stored sample to physical unit.
    #[inline]
    pub fn calibration(&self) -> f64 {
        self.cal as f64 * self.range as f64
    }
}

#[derive(Debug, Clone)]
pub struct MeasInfo {
    pub sfreq: f64,
    pub chs: Vec<ChannelInfo>,
    pub bads: Vec<String>,
}

impl MeasInfo {
    pub fn read<R: Read + Seek>(reader: &mut TagReader<R>, meas: &Block) -> Result<Self> {
        let block = meas
            .find(FIFFB_MEAS_INFO)
            .ok_or_else(|| anyhow!("FIFFB_MEAS_INFO block not found"))?;

        let mut n_chan = None;
        let mut sfreq = None;
        let mut chs = Vec::new();
        let mut bads = Vec::new();
        for tag in &block.tags {
            match tag.kind {
                FIFF_NCHAN => n_chan = Some(reader.int(tag)? as usize),
                FIFF_SFREQ => sfreq = Some(reader.float(tag)? as f64),
                FIFF_CH_INFO => chs.push(ChannelInfo::parse(&reader.payload(tag)?)?),
                FIFF_BAD_CHS => {
                    bads = reader
                        .string(tag)?
                        .split(':')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                }
                _ => {}
            }
        }

        let n_chan = n_chan.ok_or_else(|| anyhow!("FIFF_NCHAN not found"))?;
        let sfreq = sfreq.ok_or_else(|| anyhow!("FIFF_SFREQ not found"))?;
        if chs.len() != n_chan {
            bail!("FIFF_NCHAN says {n_chan} channels but {} ch_info records found", chs.len());
        }
        Ok(Self { sfreq, chs, bads })
    }
}
