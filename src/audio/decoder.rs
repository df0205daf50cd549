// Audio decoder using Symphonia
// Decodes in-memory resource bytes to raw PCM samples

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;

/// Raw decoded audio at its native rate and channel layout
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved f32 samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Rearrange the interleaved samples to the given channel count.
    ///
    /// Mono is duplicated into every output channel, a downmix to mono
    /// averages, anything else truncates or repeats the last channel.
    pub fn remap_channels(self, channels: u16) -> DecodedAudio {
        if channels == self.channels || self.channels == 0 || channels == 0 {
            return self;
        }

        let from = self.channels as usize;
        let to = channels as usize;
        let frames = self.samples.len() / from;
        let mut remapped = Vec::with_capacity(frames * to);

        for frame in self.samples.chunks_exact(from) {
            if from == 1 {
                remapped.extend(std::iter::repeat(frame[0]).take(to));
            } else if to == 1 {
                remapped.push(frame.iter().sum::<f32>() / from as f32);
            } else {
                for ch in 0..to {
                    remapped.push(frame[ch.min(from - 1)]);
                }
            }
        }

        DecodedAudio {
            samples: remapped,
            sample_rate: self.sample_rate,
            channels,
        }
    }
}

/// Decode a complete audio resource from its raw bytes.
///
/// The container format is sniffed from the bytes, the first audio track is
/// selected and decoded to the end. Individual bad packets are skipped;
/// running out of packets is the end of the stream.
pub fn decode(bytes: Vec<u8>) -> Result<DecodedAudio, AudioError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("unrecognized format: {}", e)))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // End of stream
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(AudioError::Decode(format!("failed to read packet: {}", e))),
        };

        // Skip packets from other tracks
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let mut buffer =
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(AudioError::Decode(format!("decode failed: {}", e))),
        }
    }

    if samples.is_empty() {
        return Err(AudioError::Decode("stream contained no samples".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channels as u16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize, amplitude: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames * channels as usize {
                writer.write_sample(amplitude).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decodes_stereo_wav() {
        let bytes = wav_bytes(2, 44100, 4410, 8192);
        let decoded = decode(bytes).unwrap();

        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples.len(), 8820);

        // 8192 / 32768 = 0.25
        for &sample in &decoded.samples {
            approx::assert_relative_eq!(sample, 0.25, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_decodes_mono_wav() {
        let bytes = wav_bytes(1, 22050, 1000, 0);
        let decoded = decode(bytes).unwrap();

        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 1000);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let result = decode(vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03]);
        assert!(result.is_err());
    }

    #[test]
    fn test_remap_mono_to_stereo() {
        let audio = DecodedAudio {
            samples: vec![0.1, 0.2, 0.3],
            sample_rate: 44100,
            channels: 1,
        };
        let stereo = audio.remap_channels(2);
        assert_eq!(stereo.channels, 2);
        assert_eq!(stereo.samples, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_remap_stereo_to_mono_averages() {
        let audio = DecodedAudio {
            samples: vec![0.2, 0.4, -1.0, 1.0],
            sample_rate: 44100,
            channels: 2,
        };
        let mono = audio.remap_channels(1);
        assert_eq!(mono.channels, 1);
        approx::assert_relative_eq!(mono.samples[0], 0.3);
        approx::assert_relative_eq!(mono.samples[1], 0.0);
    }

    #[test]
    fn test_remap_same_count_is_identity() {
        let audio = DecodedAudio {
            samples: vec![0.5, -0.5],
            sample_rate: 48000,
            channels: 2,
        };
        let same = audio.clone().remap_channels(2);
        assert_eq!(same.samples, audio.samples);
    }
}
