//! Decoded PCM Streams
//!
//! Players pull raw PCM bytes from an [`AudioStream`]:
//!
//! - [`MemoryStream`]: PCM already in memory (generated tones, preloaded data)
//! - [`DecoderStream`]: a file decoded by rodio into 16-bit little-endian PCM
//!
//! A stream is *single-buffer* when the whole payload should be preloaded into
//! one native buffer instead of being streamed through a small pool.

use std::cell::RefCell;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rodio::{Decoder, Source};
use tracing::debug;
use wisound_common::{WiSoundError, WiSoundResult};

use crate::audio_native::PcmFormat;

/// Sample layout of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Bits per sample (8 or 16 are playable).
    pub bits_per_sample: u16,
    /// Interleaved channel count.
    pub channels: u16,
    /// Frames per second.
    pub sample_rate: u32,
}

impl StreamFormat {
    /// Create a format.
    #[must_use]
    pub const fn new(bits_per_sample: u16, channels: u16, sample_rate: u32) -> Self {
        Self {
            bits_per_sample,
            channels,
            sample_rate,
        }
    }

    /// Bytes per single-channel sample.
    #[must_use]
    pub const fn bytes_per_sample(&self) -> u32 {
        self.bits_per_sample as u32 / 8
    }

    /// Bytes per interleaved frame.
    #[must_use]
    pub const fn bytes_per_frame(&self) -> u32 {
        self.bytes_per_sample() * self.channels as u32
    }

    /// Native buffer format, if the layout is supported.
    #[must_use]
    pub const fn pcm_format(&self) -> Option<PcmFormat> {
        PcmFormat::from_layout(self.bits_per_sample, self.channels)
    }

    /// Seconds of audio held by `bytes` bytes of PCM. Zero for degenerate formats.
    #[must_use]
    pub fn duration_of(&self, bytes: usize) -> f32 {
        let bytes_per_second = self.bytes_per_frame() as f32 * self.sample_rate as f32;
        if bytes_per_second <= 0.0 {
            return 0.0;
        }
        bytes as f32 / bytes_per_second
    }
}

/// A decoded PCM source a player can pull from.
pub trait AudioStream {
    /// Read up to `buf.len()` bytes. Returns 0 once the stream is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Rewind to the first byte.
    fn reset(&mut self);

    /// Whether the stream should be preloaded into one buffer.
    fn is_single_buffer(&self) -> bool;

    /// Sample layout.
    fn format(&self) -> StreamFormat;
}

/// Shared, reference-counted stream handle.
pub type SharedStream = Rc<RefCell<dyn AudioStream>>;

/// Wrap a stream into a [`SharedStream`].
pub fn shared<S: AudioStream + 'static>(stream: S) -> SharedStream {
    Rc::new(RefCell::new(stream))
}

/// PCM bytes held in memory.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    data: Rc<[u8]>,
    position: usize,
    format: StreamFormat,
    single_buffer: bool,
}

impl MemoryStream {
    /// Create a streaming (multi-buffer) memory stream.
    pub fn new(data: impl Into<Rc<[u8]>>, format: StreamFormat) -> Self {
        Self {
            data: data.into(),
            position: 0,
            format,
            single_buffer: false,
        }
    }

    /// Mark the stream as single-buffer.
    #[must_use]
    pub const fn with_single_buffer(mut self, single_buffer: bool) -> Self {
        self.single_buffer = single_buffer;
        self
    }

    /// Generate a 16-bit mono sine tone.
    pub fn sine(frequency: f32, seconds: f32, sample_rate: u32) -> Self {
        let frames = (seconds * sample_rate as f32) as usize;
        let mut data = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (t * frequency * std::f32::consts::TAU).sin() * 0.5;
            data.extend_from_slice(&((sample * f32::from(i16::MAX)) as i16).to_le_bytes());
        }
        Self::new(data, StreamFormat::new(16, 1, sample_rate))
    }

    /// Total payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current read offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }
}

impl AudioStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let remaining = &self.data[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        n
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn is_single_buffer(&self) -> bool {
        self.single_buffer
    }

    fn format(&self) -> StreamFormat {
        self.format
    }
}

/// An audio file decoded by rodio into 16-bit little-endian PCM.
pub struct DecoderStream {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    format: StreamFormat,
    single_buffer: bool,
}

impl std::fmt::Debug for DecoderStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderStream")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("single_buffer", &self.single_buffer)
            .finish_non_exhaustive()
    }
}

impl DecoderStream {
    /// Open a file. Files at or below `single_buffer_threshold` bytes are preloaded.
    pub fn open(path: impl AsRef<Path>, single_buffer_threshold: u64) -> WiSoundResult<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        let decoder = Self::decoder(path)?;
        let format = StreamFormat::new(16, decoder.channels(), decoder.sample_rate());
        let single_buffer = size <= single_buffer_threshold;

        debug!(
            "Opened {:?}: {} ch @ {} Hz, single buffer: {}",
            path, format.channels, format.sample_rate, single_buffer
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            format,
            single_buffer,
        })
    }

    /// Path of the decoded file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decoder(path: &Path) -> WiSoundResult<Decoder<BufReader<File>>> {
        let file = File::open(path)?;
        Decoder::new(BufReader::new(file)).map_err(|e| WiSoundError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

impl AudioStream for DecoderStream {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut written = 0;
        for frame in buf.chunks_exact_mut(2) {
            match self.decoder.next() {
                Some(sample) => {
                    frame.copy_from_slice(&sample.to_le_bytes());
                    written += 2;
                },
                None => break,
            }
        }
        written
    }

    fn reset(&mut self) {
        match Self::decoder(&self.path) {
            Ok(decoder) => self.decoder = decoder,
            Err(e) => tracing::warn!("Failed to rewind {:?}: {e}", self.path),
        }
    }

    fn is_single_buffer(&self) -> bool {
        self.single_buffer
    }

    fn format(&self) -> StreamFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stream_reads_in_chunks() {
        let mut stream = MemoryStream::new(vec![7u8; 10], StreamFormat::new(8, 1, 8000));
        let mut buf = [0u8; 4];

        assert_eq!(stream.read(&mut buf), 4);
        assert_eq!(stream.read(&mut buf), 4);
        assert_eq!(stream.read(&mut buf), 2);
        assert_eq!(stream.read(&mut buf), 0);

        stream.reset();
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.read(&mut buf), 4);
    }

    #[test]
    fn test_stream_format_math() {
        let format = StreamFormat::new(16, 2, 44100);
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.pcm_format(), Some(PcmFormat::Stereo16));
        assert!((format.duration_of(176_400) - 1.0).abs() < 1e-6);

        let broken = StreamFormat::new(16, 0, 44100);
        assert!(broken.duration_of(1024).abs() < f32::EPSILON);
        assert_eq!(StreamFormat::new(24, 2, 48000).pcm_format(), None);
    }

    #[test]
    fn test_sine_tone_length() {
        let tone = MemoryStream::sine(440.0, 0.5, 8000);
        assert_eq!(tone.len(), 8000);
        assert!(!tone.is_single_buffer());
        assert!(tone.clone().with_single_buffer(true).is_single_buffer());
    }

    #[test]
    fn test_decoder_stream_missing_file() {
        let result = DecoderStream::open("/nonexistent/theme.ogg", 1024);
        assert!(matches!(result, Err(WiSoundError::Io(_))));
    }

    #[test]
    fn test_decoder_stream_rejects_garbage() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").expect("Failed to write");

        let result = DecoderStream::open(&path, 1024);
        assert!(matches!(result, Err(WiSoundError::Decode { .. })));
    }
}
