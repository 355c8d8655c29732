/// Shared helpers: synthetic FIFF recordings, WAV stimuli and word tables.
use std::fs;
use std::path::Path;

use alice_eeg::fiff::constants::*;
use alice_eeg::DataLayout;

/// One channel of a synthetic recording.
pub struct SynthChannel {
    pub name: String,
    pub kind: i32,
    pub pos: [f32; 3],
    pub samples: Vec<f32>,
}

#[allow(unused)]
pub fn eeg(name: &str, pos: [f32; 3], samples: Vec<f32>) -> SynthChannel {
    SynthChannel { name: name.into(), kind: FIFFV_EEG_CH, pos, samples }
}

#[allow(unused)]
pub fn stim(samples: Vec<f32>) -> SynthChannel {
    SynthChannel { name: "STI 014".into(), kind: FIFFV_STIM_CH, pos: [0.0; 3], samples }
}

fn tag(out: &mut Vec<u8>, kind: i32, ftype: u32, payload: &[u8], last: bool) {
    out.extend_from_slice(&kind.to_be_bytes());
    out.extend_from_slice(&ftype.to_be_bytes());
    out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
    let next = if last { FIFFV_NEXT_NONE } else { FIFFV_NEXT_SEQ };
    out.extend_from_slice(&next.to_be_bytes());
    out.extend_from_slice(payload);
}

fn ch_info(ch: &SynthChannel, idx: usize) -> Vec<u8> {
    let mut b = vec![0u8; 96];
    b[0..4].copy_from_slice(&(idx as i32 + 1).to_be_bytes());
    b[4..8].copy_from_slice(&(idx as i32 + 1).to_be_bytes());
    b[8..12].copy_from_slice(&ch.kind.to_be_bytes());
    b[12..16].copy_from_slice(&1f32.to_be_bytes());
    b[16..20].copy_from_slice(&1f32.to_be_bytes());
    for (k, v) in ch.pos.iter().enumerate() {
        b[24 + 4 * k..28 + 4 * k].copy_from_slice(&v.to_be_bytes());
    }
    let name = ch.name.as_bytes();
    let n = name.len().min(15);
    b[80..80 + n].copy_from_slice(&name[..n]);
    b
}

/// Minimal `*-raw.fif`: measurement info plus float data buffers of
/// `buffer` samples each.
#[allow(unused)]
pub fn write_fif(path: &Path, sfreq: f32, channels: &[SynthChannel], bads: &[&str]) {
    let n_times = channels[0].samples.len();
    let buffer = 1000;
    let mut out = Vec::new();
    tag(&mut out, FIFF_FILE_ID, 31, &[0u8; 20], false);
    tag(&mut out, FIFF_DIR_POINTER, FIFFT_INT, &(-1i32).to_be_bytes(), false);

    tag(&mut out, FIFF_BLOCK_START, FIFFT_INT, &FIFFB_MEAS.to_be_bytes(), false);
    tag(&mut out, FIFF_BLOCK_START, FIFFT_INT, &FIFFB_MEAS_INFO.to_be_bytes(), false);
    tag(&mut out, FIFF_NCHAN, FIFFT_INT, &(channels.len() as i32).to_be_bytes(), false);
    tag(&mut out, FIFF_SFREQ, FIFFT_FLOAT, &sfreq.to_be_bytes(), false);
    for (i, ch) in channels.iter().enumerate() {
        tag(&mut out, FIFF_CH_INFO, FIFFT_CH_INFO_STRUCT, &ch_info(ch, i), false);
    }
    if !bads.is_empty() {
        tag(&mut out, FIFF_BAD_CHS, FIFFT_STRING, bads.join(":").as_bytes(), false);
    }
    tag(&mut out, FIFF_BLOCK_END, FIFFT_INT, &FIFFB_MEAS_INFO.to_be_bytes(), false);

    tag(&mut out, FIFF_BLOCK_START, FIFFT_INT, &FIFFB_RAW_DATA.to_be_bytes(), false);
    tag(&mut out, FIFF_FIRST_SAMPLE, FIFFT_INT, &0i32.to_be_bytes(), false);
    let mut t0 = 0;
    while t0 < n_times {
        let t1 = (t0 + buffer).min(n_times);
        let mut payload = Vec::with_capacity((t1 - t0) * channels.len() * 4);
        for t in t0..t1 {
            for ch in channels {
                payload.extend_from_slice(&ch.samples[t].to_be_bytes());
            }
        }
        tag(&mut out, FIFF_DATA_BUFFER, FIFFT_FLOAT, &payload, false);
        t0 = t1;
    }
    tag(&mut out, FIFF_BLOCK_END, FIFFT_INT, &FIFFB_RAW_DATA.to_be_bytes(), false);
    tag(&mut out, FIFF_BLOCK_END, FIFFT_INT, &FIFFB_MEAS.to_be_bytes(), true);
    fs::write(path, out).unwrap();
}

/// Mono 16-bit WAV.
#[allow(unused)]
pub fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        w.write_sample(s).unwrap();
    }
    w.finalize().unwrap();
}

#[allow(unused)]
pub fn write_word_table(layout: &DataLayout, stimulus: &str, onsets: &[f64]) {
    let path = layout.word_table_path(stimulus);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let words: Vec<String> = (0..onsets.len()).map(|i| format!("w{i}")).collect();
    let json = serde_json::json!({ "time": onsets, "word": words });
    fs::write(path, serde_json::to_vec(&json).unwrap()).unwrap();
}

/// Positions on the upper half of a 9 cm sphere.
#[allow(unused)]
pub fn cap_positions(n: usize) -> Vec<[f32; 3]> {
    (0..n)
        .map(|i| {
            let az = i as f32 * 2.399_963;
            let z = 0.15 + 0.8 * i as f32 / n as f32;
            let r = (1.0 - z * z).sqrt();
            [0.09 * r * az.cos(), 0.09 * r * az.sin(), 0.09 * z]
        })
        .collect()
}

#[allow(unused)]
pub fn max_abs(x: impl IntoIterator<Item = f64>) -> f64 {
    x.into_iter().fold(0.0, |m, v| m.max(v.abs()))
}
