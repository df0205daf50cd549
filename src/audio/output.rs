// Audio output using cpal
// Implements the backend traits on top of a ring-buffer output stream

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

use crate::audio::backend::{
    AudioBackend, AudioData, ContextState, GainControl, PlaybackContext, SourceNode,
};
use crate::audio::{decoder, resampler};
use crate::config::OutputConfig;
use crate::error::AudioError;

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// How long a feeder thread sleeps when the ring buffer is full
const FEED_INTERVAL: Duration = Duration::from_millis(1);

/// Backend that opens cpal output contexts.
pub struct CpalBackend {
    config: OutputConfig,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            config: OutputConfig::default(),
        }
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn create_context(&self) -> Result<Box<dyn PlaybackContext>, AudioError> {
        Ok(Box::new(CpalContext::open(&self.config)?))
    }
}

/// A cpal output stream plus the shared state its callback reads from.
pub struct CpalContext {
    stream: Stream,
    producer: Arc<Mutex<RingProducer>>,
    volume: Arc<Mutex<f32>>,
    clear_flag: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    suspended: bool,
}

impl CpalContext {
    /// Open the configured output device and start the stream
    pub fn open(config: &OutputConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = match config.device.as_deref() {
            Some(name) => host
                .output_devices()
                .map_err(|e| AudioError::Output(format!("failed to enumerate devices: {}", e)))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| AudioError::Output(format!("output device '{}' not found", name)))?,
            None => host.default_output_device().ok_or(AudioError::NoOutputDevice)?,
        };

        let stream_config = device
            .default_output_config()
            .map_err(|e| AudioError::Output(format!("failed to get output config: {}", e)))?;

        let sample_rate = stream_config.sample_rate().0;
        let channels = stream_config.channels();

        // Ring buffer for passing samples to the audio thread
        let ring_len = (sample_rate as usize * channels as usize)
            .saturating_mul(config.ring_buffer_ms as usize)
            / 1000;
        let rb = HeapRb::<f32>::new(ring_len.max(1024));
        let (producer, consumer) = rb.split();

        let volume = Arc::new(Mutex::new(1.0f32));
        let clear_flag = Arc::new(AtomicBool::new(false));

        // Build the output stream based on sample format
        let stream = match stream_config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &stream_config.into(),
                consumer,
                volume.clone(),
                clear_flag.clone(),
            )?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &stream_config.into(),
                consumer,
                volume.clone(),
                clear_flag.clone(),
            )?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &stream_config.into(),
                consumer,
                volume.clone(),
                clear_flag.clone(),
            )?,
            format => {
                return Err(AudioError::Output(format!(
                    "unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::Output(format!("failed to start stream: {}", e)))?;

        tracing::debug!("opened output stream: {} Hz, {} channels", sample_rate, channels);

        Ok(Self {
            stream,
            producer: Arc::new(Mutex::new(producer)),
            volume,
            clear_flag,
            sample_rate,
            channels,
            suspended: false,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut consumer: RingConsumer,
        volume: Arc<Mutex<f32>>,
        clear_flag: Arc<AtomicBool>,
    ) -> Result<Stream, AudioError> {
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let vol = *volume.lock();

                    // If clear flag is set, drain the buffer and output silence
                    if clear_flag.swap(false, Ordering::SeqCst) {
                        while consumer.try_pop().is_some() {}
                    }

                    for sample in data.iter_mut() {
                        let value = consumer.try_pop().unwrap_or(0.0) * vol;
                        *sample = T::from_sample(value);
                    }
                },
                move |err| {
                    tracing::error!("audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Output(format!("failed to build output stream: {}", e)))?;

        Ok(stream)
    }
}

impl PlaybackContext for CpalContext {
    fn create_gain(&mut self) -> Result<Box<dyn GainControl>, AudioError> {
        Ok(Box::new(CpalGain {
            volume: self.volume.clone(),
        }))
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<AudioData, AudioError> {
        let decoded = decoder::decode(bytes)?;
        let from_rate = decoded.sample_rate;
        let decoded = decoded.remap_channels(self.channels);
        let samples =
            resampler::resample(&decoded.samples, decoded.channels, from_rate, self.sample_rate)?;
        Ok(AudioData::new(samples, self.sample_rate, self.channels))
    }

    fn new_source(
        &mut self,
        data: AudioData,
        looping: bool,
    ) -> Result<Box<dyn SourceNode>, AudioError> {
        Ok(Box::new(CpalSource {
            data,
            looping,
            producer: self.producer.clone(),
            clear_flag: self.clear_flag.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
            started: false,
            feeder: None,
        }))
    }

    fn state(&self) -> ContextState {
        if self.suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        }
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if !self.suspended {
            return Ok(());
        }
        self.stream
            .play()
            .map_err(|e| AudioError::Output(format!("failed to resume stream: {}", e)))?;
        self.suspended = false;
        Ok(())
    }

    fn close(&mut self) {
        self.clear_flag.store(true, Ordering::SeqCst);
        if let Err(err) = self.stream.pause() {
            tracing::warn!("failed to pause stream on close: {}", err);
        }
    }
}

/// Volume handle shared with the output callback.
pub struct CpalGain {
    volume: Arc<Mutex<f32>>,
}

impl GainControl for CpalGain {
    fn gain(&self) -> f32 {
        *self.volume.lock()
    }

    fn set_gain(&mut self, gain: f32) {
        *self.volume.lock() = gain.clamp(0.0, 1.0);
    }
}

/// One-shot source that feeds its samples into the ring buffer from a
/// dedicated thread.
pub struct CpalSource {
    data: AudioData,
    looping: bool,
    producer: Arc<Mutex<RingProducer>>,
    clear_flag: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    started: bool,
    feeder: Option<JoinHandle<()>>,
}

impl SourceNode for CpalSource {
    fn start(&mut self, on_ended: Box<dyn FnOnce() + Send>) -> Result<(), AudioError> {
        if self.started {
            return Err(AudioError::SourceAlreadyStarted);
        }
        self.started = true;

        let samples = self.data.samples_shared();
        let producer = self.producer.clone();
        let cancel = self.cancel.clone();
        let looping = self.looping;

        self.feeder = Some(std::thread::spawn(move || {
            if samples.is_empty() {
                if !cancel.load(Ordering::Relaxed) {
                    on_ended();
                }
                return;
            }

            let mut offset = 0;
            loop {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }

                let written = {
                    let mut producer = producer.lock();
                    let mut written = 0;
                    for &sample in &samples[offset..] {
                        if producer.try_push(sample).is_ok() {
                            written += 1;
                        } else {
                            // Buffer full
                            break;
                        }
                    }
                    written
                };
                offset += written;

                if offset == samples.len() {
                    if looping {
                        offset = 0;
                    } else {
                        break;
                    }
                }

                if written == 0 {
                    std::thread::sleep(FEED_INTERVAL);
                }
            }

            // Everything is queued; wait for the device to drain it before
            // reporting completion.
            while producer.lock().occupied_len() > 0 {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                std::thread::sleep(FEED_INTERVAL);
            }

            if !cancel.load(Ordering::Relaxed) {
                on_ended();
            }
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if !self.started {
            return;
        }

        self.cancel.store(true, Ordering::Relaxed);

        if let Some(feeder) = self.feeder.take() {
            if !feeder.is_finished() {
                // Drop whatever the feeder already queued. A source that
                // completed naturally has nothing left in the ring, and
                // clearing here would eat a successor's samples.
                self.clear_flag.store(true, Ordering::SeqCst);
            }
            let _ = feeder.join();
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(samples: Vec<f32>, looping: bool, ring_len: usize) -> (CpalSource, RingConsumer) {
        let rb = HeapRb::<f32>::new(ring_len);
        let (producer, consumer) = rb.split();
        let source = CpalSource {
            data: AudioData::new(samples, 48000, 1),
            looping,
            producer: Arc::new(Mutex::new(producer)),
            clear_flag: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            started: false,
            feeder: None,
        };
        (source, consumer)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..2000 {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_source_feeds_then_completes_after_drain() {
        let (mut source, mut consumer) = source(vec![0.5; 512], false, 1024);

        let ended = Arc::new(AtomicBool::new(false));
        let ended_flag = ended.clone();
        source
            .start(Box::new(move || ended_flag.store(true, Ordering::SeqCst)))
            .unwrap();

        assert!(wait_until(|| consumer.occupied_len() == 512));
        // Completion is held back until the ring drains
        assert!(!ended.load(Ordering::SeqCst));

        let mut popped = 0;
        assert!(wait_until(|| {
            while consumer.try_pop().is_some() {
                popped += 1;
            }
            popped == 512
        }));

        assert!(wait_until(|| ended.load(Ordering::SeqCst)));
    }

    #[test]
    fn test_source_cannot_start_twice() {
        let (mut source, _consumer) = source(vec![0.0; 16], false, 64);

        source.start(Box::new(|| {})).unwrap();
        assert!(matches!(
            source.start(Box::new(|| {})),
            Err(AudioError::SourceAlreadyStarted)
        ));
    }

    #[test]
    fn test_stop_cancels_without_completion() {
        // Ring far smaller than the data, so the feeder stays blocked
        let (mut source, consumer) = source(vec![0.1; 100_000], false, 256);
        let clear_flag = source.clear_flag.clone();

        let ended = Arc::new(AtomicBool::new(false));
        let ended_flag = ended.clone();
        source
            .start(Box::new(move || ended_flag.store(true, Ordering::SeqCst)))
            .unwrap();

        assert!(wait_until(|| consumer.occupied_len() > 0));
        source.stop();

        assert!(!ended.load(Ordering::SeqCst));
        assert!(clear_flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut source, _consumer) = source(vec![0.1; 1024], true, 256);
        source.start(Box::new(|| {})).unwrap();

        source.stop();
        source.stop();
    }

    #[test]
    fn test_looping_source_wraps_instead_of_completing() {
        let (mut source, mut consumer) = source(vec![0.2; 100], true, 128);

        let ended = Arc::new(AtomicBool::new(false));
        let ended_flag = ended.clone();
        source
            .start(Box::new(move || ended_flag.store(true, Ordering::SeqCst)))
            .unwrap();

        // Keep draining; a looping source produces well past its own length
        let mut popped = 0usize;
        assert!(wait_until(|| {
            while consumer.try_pop().is_some() {
                popped += 1;
            }
            popped > 300
        }));
        assert!(!ended.load(Ordering::SeqCst));

        source.stop();
        assert!(!ended.load(Ordering::SeqCst));
    }

    #[test]
    fn test_empty_source_completes_immediately() {
        let (mut source, _consumer) = source(Vec::new(), false, 64);

        let ended = Arc::new(AtomicBool::new(false));
        let ended_flag = ended.clone();
        source
            .start(Box::new(move || ended_flag.store(true, Ordering::SeqCst)))
            .unwrap();

        assert!(wait_until(|| ended.load(Ordering::SeqCst)));
    }
}
