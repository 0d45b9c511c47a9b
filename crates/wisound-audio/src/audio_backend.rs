//! Rodio Backend
//!
//! [`NativeAudio`] over rodio/cpal. Devices map to cpal devices, contexts to
//! rodio output streams, and voices to sinks fed one `SamplesBuffer` per
//! queued buffer.
//!
//! A sink reports how many sounds it still holds, so every queued buffer that
//! is no longer in the sink counts as processed.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use rodio::buffer::SamplesBuffer;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::cpal::{self, SampleRate};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};
use wisound_common::DEFAULT_MAX_VOICES;

use crate::audio_native::{
    BufferSlot, ContextAttributes, ContextId, DeviceId, Listener, NativeAudio, NativeError,
    PcmFormat, SourceState, VoiceHandle,
};

/// Uploaded PCM, widened to 16-bit samples.
#[derive(Debug, Clone, Default)]
struct PcmBuffer {
    channels: u16,
    sample_rate: u32,
    samples: Vec<i16>,
}

impl PcmBuffer {
    /// A playable source, or `None` while the buffer holds no formatted data.
    fn source(&self) -> Option<SamplesBuffer<i16>> {
        if self.channels == 0 || self.sample_rate == 0 || self.samples.is_empty() {
            return None;
        }
        Some(SamplesBuffer::new(
            self.channels,
            self.sample_rate,
            self.samples.clone(),
        ))
    }
}

/// Convert raw PCM bytes to signed 16-bit samples.
///
/// 8-bit data is unsigned and centered on 128. 16-bit data is little endian; a
/// trailing odd byte is dropped.
fn pcm_to_samples(format: PcmFormat, data: &[u8]) -> Vec<i16> {
    match format.bits_per_sample() {
        8 => data.iter().map(|&b| (i16::from(b) - 128) << 8).collect(),
        _ => data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    }
}

struct Voice {
    sink: Option<Sink>,
    queue: VecDeque<BufferSlot>,
    gain: f32,
    looping: bool,
    idle_state: SourceState,
}

impl Voice {
    fn new() -> Self {
        Self {
            sink: None,
            queue: VecDeque::new(),
            gain: 1.0,
            looping: false,
            idle_state: SourceState::Initial,
        }
    }

    fn state(&self) -> SourceState {
        match &self.sink {
            Some(sink) if sink.is_paused() => SourceState::Paused,
            Some(sink) if sink.empty() => SourceState::Stopped,
            Some(_) => SourceState::Playing,
            None => self.idle_state,
        }
    }

    fn processed(&self) -> usize {
        match &self.sink {
            Some(sink) => self.queue.len().saturating_sub(sink.len()),
            None if self.idle_state == SourceState::Stopped => self.queue.len(),
            None => 0,
        }
    }

    fn halt(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

struct OutputContext {
    device: DeviceId,
    // Dropping the stream silences every sink created from its handle
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

struct Inner {
    next_id: u32,
    devices: HashMap<u32, cpal::Device>,
    contexts: HashMap<u32, OutputContext>,
    current: Option<ContextId>,
    listener: Listener,
    voices: HashMap<VoiceHandle, Voice>,
    buffers: HashMap<BufferSlot, PcmBuffer>,
    error: Option<NativeError>,
    max_voices: usize,
}

impl Inner {
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    fn latch(&mut self, error: NativeError) {
        if self.error.is_none() {
            debug!("Native error latched: {error}");
            self.error = Some(error);
        }
    }

    fn is_queued(&self, slot: BufferSlot) -> bool {
        self.voices.values().any(|v| v.queue.contains(&slot))
    }

    fn current_handle(&self) -> Option<&OutputStreamHandle> {
        let id = self.current?;
        self.contexts.get(&id.0).map(|c| &c.handle)
    }

    fn voice_mut(&mut self, voice: VoiceHandle) -> Option<&mut Voice> {
        if !self.voices.contains_key(&voice) {
            self.latch(NativeError::InvalidName);
        }
        self.voices.get_mut(&voice)
    }

    /// Build a fresh sink holding every queued buffer.
    fn start_sink(&mut self, voice: VoiceHandle) {
        let sink = match self.current_handle().map(Sink::try_new) {
            Some(Ok(sink)) => sink,
            Some(Err(e)) => {
                warn!("Failed to create audio sink: {}", e);
                self.latch(NativeError::OutOfMemory);
                return;
            },
            None => {
                self.latch(NativeError::InvalidOperation);
                return;
            },
        };

        let Some(v) = self.voices.get(&voice) else {
            return;
        };
        sink.set_volume(v.gain);
        let repeat = v.looping && v.queue.len() == 1;
        for slot in &v.queue {
            let Some(source) = self.buffers.get(slot).and_then(PcmBuffer::source) else {
                continue;
            };
            if repeat {
                sink.append(source.repeat_infinite());
            } else {
                sink.append(source);
            }
        }

        if let Some(v) = self.voices.get_mut(&voice) {
            v.halt();
            v.sink = Some(sink);
        }
    }
}

/// Rodio-backed native sound API.
pub struct RodioBackend {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for RodioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RodioBackend")
            .field("devices", &inner.devices.len())
            .field("contexts", &inner.contexts.len())
            .field("voices", &inner.voices.len())
            .field("buffers", &inner.buffers.len())
            .field("max_voices", &inner.max_voices)
            .finish_non_exhaustive()
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioBackend {
    /// Create a backend with the default voice cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_voices(DEFAULT_MAX_VOICES)
    }

    /// Create a backend allowing at most `max_voices` live voices.
    #[must_use]
    pub fn with_max_voices(max_voices: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                devices: HashMap::new(),
                contexts: HashMap::new(),
                current: None,
                listener: Listener::default(),
                voices: HashMap::new(),
                buffers: HashMap::new(),
                error: None,
                max_voices,
            }),
        }
    }

    /// Names of the output devices on the default host.
    pub fn device_names() -> Vec<String> {
        let host = cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
                Vec::new()
            },
        }
    }

    /// Listener last applied.
    #[must_use]
    pub fn listener(&self) -> Listener {
        self.inner.lock().listener
    }

    /// Live voice count.
    #[must_use]
    pub fn voice_count(&self) -> usize {
        self.inner.lock().voices.len()
    }

    fn find_device(selector: Option<&str>) -> Option<cpal::Device> {
        let host = cpal::default_host();
        let Some(name) = selector else {
            return host.default_output_device();
        };

        let mut devices = match host.output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
                return None;
            },
        };
        let needle = name.to_lowercase();
        devices.find(|d| d.name().is_ok_and(|n| n.to_lowercase().contains(&needle)))
    }

    fn open_stream(
        device: &cpal::Device,
        attributes: Option<&ContextAttributes>,
    ) -> Option<(OutputStream, OutputStreamHandle)> {
        if let Some(attributes) = attributes {
            let rate = SampleRate(attributes.frequency);
            let config = device.supported_output_configs().ok().and_then(|mut ranges| {
                ranges
                    .find(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
                    .map(|r| r.with_sample_rate(rate))
            });

            match config {
                Some(config) => match OutputStream::try_from_device_config(device, config) {
                    Ok(stream) => return Some(stream),
                    Err(e) => warn!("Failed to open stream at {} Hz: {}", attributes.frequency, e),
                },
                None => warn!(
                    "Device does not support {} Hz, using its default rate",
                    attributes.frequency
                ),
            }
        }

        match OutputStream::try_from_device(device) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Failed to open output stream: {}", e);
                None
            },
        }
    }
}

impl NativeAudio for RodioBackend {
    fn open_device(&self, selector: Option<&str>) -> Option<DeviceId> {
        let device = Self::find_device(selector)?;
        let name = device.name().unwrap_or_default();
        let mut inner = self.inner.lock();
        let id = inner.next_id();
        inner.devices.insert(id, device);
        info!("Opened audio device {:?}", name);
        Some(DeviceId(id))
    }

    fn close_device(&self, device: DeviceId) {
        let mut inner = self.inner.lock();
        if inner.devices.remove(&device.0).is_none() {
            inner.latch(NativeError::InvalidName);
        }
    }

    fn create_context(
        &self,
        device: DeviceId,
        attributes: Option<&ContextAttributes>,
    ) -> Option<ContextId> {
        let mut inner = self.inner.lock();
        let Some(cpal_device) = inner.devices.get(&device.0) else {
            inner.latch(NativeError::InvalidName);
            return None;
        };

        let (stream, handle) = Self::open_stream(cpal_device, attributes)?;
        let id = inner.next_id();
        inner.contexts.insert(
            id,
            OutputContext {
                device,
                _stream: stream,
                handle,
            },
        );
        Some(ContextId(id))
    }

    fn make_context_current(&self, context: Option<ContextId>) -> bool {
        let mut inner = self.inner.lock();
        match context {
            Some(id) if !inner.contexts.contains_key(&id.0) => false,
            _ => {
                inner.current = context;
                true
            },
        }
    }

    fn destroy_context(&self, context: ContextId) {
        let mut inner = self.inner.lock();
        let Some(removed) = inner.contexts.remove(&context.0) else {
            inner.latch(NativeError::InvalidName);
            return;
        };
        if inner.current == Some(context) {
            inner.current = None;
        }

        // Voices die with their context
        for voice in inner.voices.values_mut() {
            voice.halt();
        }
        inner.voices.clear();
        debug!("Destroyed context {} on device {}", context.0, removed.device.0);
    }

    fn set_listener(&self, listener: &Listener) {
        self.inner.lock().listener = *listener;
    }

    fn gen_source(&self) -> Option<VoiceHandle> {
        let mut inner = self.inner.lock();
        if inner.current_handle().is_none() {
            inner.latch(NativeError::InvalidOperation);
            return None;
        }
        if inner.voices.len() >= inner.max_voices {
            inner.latch(NativeError::OutOfMemory);
            return None;
        }
        let voice = VoiceHandle::from_raw(inner.next_id());
        inner.voices.insert(voice, Voice::new());
        Some(voice)
    }

    fn delete_source(&self, voice: VoiceHandle) {
        let mut inner = self.inner.lock();
        match inner.voices.remove(&voice) {
            Some(mut v) => v.halt(),
            None => inner.latch(NativeError::InvalidName),
        }
    }

    fn source_play(&self, voice: VoiceHandle) {
        let mut inner = self.inner.lock();
        let resumed = match inner.voice_mut(voice) {
            Some(v) => match &v.sink {
                Some(sink) if !sink.empty() => {
                    sink.play();
                    true
                },
                _ => false,
            },
            None => return,
        };
        if !resumed {
            inner.start_sink(voice);
        }
    }

    fn source_pause(&self, voice: VoiceHandle) {
        let mut inner = self.inner.lock();
        if let Some(v) = inner.voice_mut(voice) {
            if v.state() == SourceState::Playing {
                if let Some(sink) = &v.sink {
                    sink.pause();
                }
            }
        }
    }

    fn source_stop(&self, voice: VoiceHandle) {
        let mut inner = self.inner.lock();
        if let Some(v) = inner.voice_mut(voice) {
            v.halt();
            v.idle_state = SourceState::Stopped;
        }
    }

    fn source_state(&self, voice: VoiceHandle) -> SourceState {
        let mut inner = self.inner.lock();
        inner.voice_mut(voice).map_or_else(SourceState::default, |v| v.state())
    }

    fn set_source_buffer(&self, voice: VoiceHandle, buffer: Option<BufferSlot>) {
        let mut inner = self.inner.lock();
        if let Some(slot) = buffer {
            if !inner.buffers.contains_key(&slot) {
                inner.latch(NativeError::InvalidName);
                return;
            }
        }
        if let Some(v) = inner.voice_mut(voice) {
            v.halt();
            v.queue.clear();
            v.queue.extend(buffer);
            v.idle_state = SourceState::Initial;
        }
    }

    fn set_source_looping(&self, voice: VoiceHandle, looping: bool) {
        let mut inner = self.inner.lock();
        if let Some(v) = inner.voice_mut(voice) {
            v.looping = looping;
        }
    }

    fn set_source_gain(&self, voice: VoiceHandle, gain: f32) {
        let mut inner = self.inner.lock();
        if let Some(v) = inner.voice_mut(voice) {
            v.gain = gain;
            if let Some(sink) = &v.sink {
                sink.set_volume(gain);
            }
        }
    }

    fn buffers_queued(&self, voice: VoiceHandle) -> usize {
        let mut inner = self.inner.lock();
        inner.voice_mut(voice).map_or(0, |v| v.queue.len())
    }

    fn buffers_processed(&self, voice: VoiceHandle) -> usize {
        let mut inner = self.inner.lock();
        inner.voice_mut(voice).map_or(0, |v| v.processed())
    }

    fn queue_buffers(&self, voice: VoiceHandle, buffers: &[BufferSlot]) {
        let mut inner = self.inner.lock();
        if buffers.iter().any(|slot| !inner.buffers.contains_key(slot)) {
            inner.latch(NativeError::InvalidName);
            return;
        }

        // Buffers without data still queue; they are processed at once
        let sources: Vec<SamplesBuffer<i16>> = buffers
            .iter()
            .filter_map(|slot| inner.buffers.get(slot).and_then(PcmBuffer::source))
            .collect();

        if let Some(v) = inner.voice_mut(voice) {
            if let Some(sink) = &v.sink {
                for source in sources {
                    sink.append(source);
                }
            }
            v.queue.extend(buffers.iter().copied());
        }
    }

    fn unqueue_buffer(&self, voice: VoiceHandle) -> Option<BufferSlot> {
        let mut inner = self.inner.lock();
        let v = inner.voice_mut(voice)?;
        if v.processed() == 0 {
            inner.latch(NativeError::InvalidValue);
            return None;
        }
        v.queue.pop_front()
    }

    fn gen_buffers(&self, count: usize) -> Vec<BufferSlot> {
        let mut inner = self.inner.lock();
        (0..count)
            .map(|_| {
                let slot = BufferSlot::from_raw(inner.next_id());
                inner.buffers.insert(slot, PcmBuffer::default());
                slot
            })
            .collect()
    }

    fn delete_buffers(&self, buffers: &[BufferSlot]) {
        let mut inner = self.inner.lock();
        for slot in buffers {
            if inner.is_queued(*slot) {
                inner.latch(NativeError::InvalidOperation);
                continue;
            }
            if inner.buffers.remove(slot).is_none() {
                inner.latch(NativeError::InvalidName);
            }
        }
    }

    fn buffer_data(
        &self,
        buffer: BufferSlot,
        format: Option<PcmFormat>,
        data: &[u8],
        sample_rate: u32,
    ) {
        let mut inner = self.inner.lock();
        let Some(format) = format else {
            inner.latch(NativeError::InvalidEnum);
            return;
        };
        if sample_rate == 0 {
            inner.latch(NativeError::InvalidValue);
            return;
        }
        if inner.is_queued(buffer) {
            inner.latch(NativeError::InvalidOperation);
            return;
        }
        match inner.buffers.get_mut(&buffer) {
            Some(stored) => {
                *stored = PcmBuffer {
                    channels: format.channels(),
                    sample_rate,
                    samples: pcm_to_samples(format, data),
                };
            },
            None => inner.latch(NativeError::InvalidName),
        }
    }

    fn take_error(&self) -> Option<NativeError> {
        self.inner.lock().error.take()
    }
}
