use crate::{
    audio_data::{LoadOptions, SampleData},
    error::{Result, SoundError},
};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer,
        codecs::DecoderOptions,
        errors::Error,
        formats::FormatOptions,
        io::{MediaSource, MediaSourceStream},
        meta::MetadataOptions,
        probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Turns encoded audio into [`SampleData`].
///
/// The sample cache owns one decoder and calls it from the update thread.
/// Implement this to plug in a custom codec or, in tests, to synthesize
/// audio without touching the filesystem.
pub trait SampleDecoder: Send {
    /// Decodes the file at `path`.
    fn decode_file(&self, path: &Path, options: &LoadOptions) -> Result<SampleData>;

    /// Decodes an in-memory copy of an encoded file (e.g. one embedded in a
    /// packed asset). `extension` is a format hint such as `"wav"`.
    fn decode_memory(
        &self,
        bytes: &[u8],
        extension: Option<&str>,
        options: &LoadOptions,
    ) -> Result<SampleData>;
}

/// Default decoder backed by Symphonia (WAV, FLAC, OGG/Vorbis, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SampleDecoder for SymphoniaDecoder {
    fn decode_file(&self, path: &Path, options: &LoadOptions) -> Result<SampleData> {
        let file = File::open(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        decode_source(Box::new(file), extension, options)
    }

    fn decode_memory(
        &self,
        bytes: &[u8],
        extension: Option<&str>,
        options: &LoadOptions,
    ) -> Result<SampleData> {
        decode_source(Box::new(Cursor::new(bytes.to_vec())), extension, options)
    }
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
    options: &LoadOptions,
) -> Result<SampleData> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SoundError::AudioLoading(format!("Failed to probe audio format: {:?}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| SoundError::AudioLoading("No default audio track found".to_string()))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SoundError::AudioLoading("Sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| SoundError::AudioLoading("Channel count not found".to_string()))?
        .count() as u16;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SoundError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break, // end-of-file
            Err(e) => {
                return Err(SoundError::AudioLoading(format!(
                    "Error reading packet: {:?}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(e)) => {
                log::debug!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => {
                return Err(SoundError::AudioLoading(format!(
                    "Error decoding packet: {:?}",
                    e
                )));
            }
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity();

        let mut tmp = SampleBuffer::<f32>::new(capacity as u64, spec);
        tmp.copy_interleaved_ref(decoded);
        samples.extend_from_slice(tmp.samples());
    }

    if samples.is_empty() {
        return Err(SoundError::AudioLoading(
            "Decoded stream contains no audio".to_string(),
        ));
    }

    SampleData::new(samples, sample_rate, channels).apply_options(options)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a 16-bit PCM WAV file in memory.
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, frames: &[i16]) -> Vec<u8> {
        let data_len = (frames.len() * 2) as u32;
        let block_align = channels * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for sample in frames {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_wav_from_memory() {
        let frames: Vec<i16> = (0..800).map(|i| ((i % 50) * 100) as i16).collect();
        let bytes = wav_bytes(8000, 2, &frames);

        let data = SymphoniaDecoder
            .decode_memory(&bytes, Some("wav"), &LoadOptions::default())
            .unwrap();

        assert_eq!(data.sample_rate(), 8000);
        assert_eq!(data.channels(), 2);
        assert_eq!(data.total_frames(), 400);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = SymphoniaDecoder.decode_memory(
            b"definitely not audio",
            Some("wav"),
            &LoadOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let result = SymphoniaDecoder.decode_file(
            Path::new("this/file/does/not/exist.wav"),
            &LoadOptions::default(),
        );
        assert!(matches!(result, Err(SoundError::Io(_))));
    }
}
