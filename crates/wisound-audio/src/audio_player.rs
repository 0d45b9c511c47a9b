//! Streaming Player
//!
//! Feeds one decoded stream into one native voice through a small pool of
//! fixed-size buffers.
//!
//! # Modes
//!
//! - **Single buffer**: the whole stream is decoded into one buffer at
//!   construction and bound statically to the voice on play.
//! - **Streaming**: a pool of buffers is filled on play and then recycled by
//!   [`StreamingPlayer::update`], which must run once per frame:
//!
//! ```text
//!            processed            fill()             queue
//! voice ──▶ [Buf] ──unqueue──▶ scratch ◀── stream ──▶ [Buf] ──▶ voice
//! ```
//!
//! Looping is emulated in [`fill`](StreamingPlayer::fill) instead of using the
//! native repeat flag, so each wrap-around can decrement a finite loop count.

use std::rc::Rc;

use tracing::{debug, warn};
use wisound_common::{AudioConfig, PlayerId, DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE};

use crate::audio_context::AudioContext;
use crate::audio_native::{BufferSlot, NativeAudio, PcmFormat, SourceState, VoiceHandle};
use crate::audio_stream::SharedStream;

/// Loop count that never runs out.
pub const LOOP_FOREVER: i32 = -1;

/// Receives a notification each time a player stops.
pub trait StopObserver {
    /// Called once per stop with the id of the player that stopped.
    fn on_audio_stop(&self, player: PlayerId);
}

/// Buffer sizing for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSettings {
    /// Bytes read from the stream per fill.
    pub buffer_size: usize,
    /// Buffers in the streaming pool.
    pub buffer_count: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }
}

impl From<&AudioConfig> for PlayerSettings {
    fn from(config: &AudioConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            buffer_count: config.buffer_count,
        }
    }
}

/// Plays one stream on one leased voice.
pub struct StreamingPlayer<N: NativeAudio> {
    id: PlayerId,
    context: Rc<AudioContext<N>>,
    stream: SharedStream,
    observer: Option<Rc<dyn StopObserver>>,
    settings: PlayerSettings,
    single_buffer: bool,
    format: Option<PcmFormat>,
    sample_rate: u32,
    buffers: Vec<BufferSlot>,
    voice: VoiceHandle,
    scratch: Option<Box<[u8]>>,
    seconds_per_buffer: f32,
    rendered_seconds: f32,
    loop_count: i32,
    playing: bool,
    paused: bool,
}

impl<N: NativeAudio> std::fmt::Debug for StreamingPlayer<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingPlayer")
            .field("id", &self.id)
            .field("single_buffer", &self.single_buffer)
            .field("voice", &self.voice)
            .field("buffers", &self.buffers)
            .field("loop_count", &self.loop_count)
            .field("playing", &self.playing)
            .field("paused", &self.paused)
            .field("rendered_seconds", &self.rendered_seconds)
            .finish_non_exhaustive()
    }
}

impl<N: NativeAudio> StreamingPlayer<N> {
    /// Create a player with default buffer sizing.
    pub fn new(context: Rc<AudioContext<N>>, stream: SharedStream) -> Self {
        Self::with_settings(context, stream, PlayerSettings::default())
    }

    /// Create a player.
    ///
    /// Single-buffer streams are decoded completely here. Streaming players only
    /// allocate their pool; filling starts on [`play`](Self::play).
    pub fn with_settings(
        context: Rc<AudioContext<N>>,
        stream: SharedStream,
        settings: PlayerSettings,
    ) -> Self {
        let settings = PlayerSettings {
            buffer_size: settings.buffer_size.max(1),
            buffer_count: settings.buffer_count.max(1),
        };

        let (single_buffer, format) = {
            let stream = stream.borrow();
            (stream.is_single_buffer(), stream.format())
        };

        let seconds_per_buffer = format.duration_of(settings.buffer_size);
        if seconds_per_buffer <= 0.0 {
            warn!("Stream format {:?} has no duration", format);
        }

        let count = if single_buffer {
            1
        } else {
            settings.buffer_count
        };
        let buffers = context.native().gen_buffers(count);

        let mut player = Self {
            id: PlayerId::NULL,
            context,
            stream,
            observer: None,
            settings,
            single_buffer,
            format: format.pcm_format(),
            sample_rate: format.sample_rate,
            buffers,
            voice: VoiceHandle::NULL,
            scratch: None,
            seconds_per_buffer,
            rendered_seconds: 0.0,
            loop_count: 0,
            playing: false,
            paused: false,
        };

        if player.single_buffer {
            player.preload();
        }

        player
    }

    /// Assign the id reported to the stop observer.
    #[must_use]
    pub fn with_id(mut self, id: PlayerId) -> Self {
        self.id = id;
        self
    }

    /// Attach the observer notified on every stop.
    #[must_use]
    pub fn with_observer(mut self, observer: Rc<dyn StopObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the stop observer.
    pub fn set_observer(&mut self, observer: Option<Rc<dyn StopObserver>>) {
        self.observer = observer;
    }

    /// Decode the whole stream into the single buffer.
    fn preload(&mut self) {
        let Some(&slot) = self.buffers.first() else {
            warn!("No buffer allocated for single-buffer stream");
            return;
        };

        let chunk = self.settings.buffer_size;
        let mut pcm = vec![0u8; chunk];
        let mut total = 0;
        {
            let mut stream = self.stream.borrow_mut();
            loop {
                let read = stream.read(&mut pcm[total..total + chunk]);
                if read == 0 {
                    break;
                }
                total += read;
                if total + chunk > pcm.len() {
                    let grown = pcm.len() * 2;
                    pcm.resize(grown, 0);
                }
            }
        }

        self.context
            .native()
            .buffer_data(slot, self.format, &pcm[..total], self.sample_rate);
        debug!("Preloaded {} bytes into buffer {}", total, slot.raw());
    }

    /// Start playback at `volume`. Does nothing when already playing.
    pub fn play(&mut self, volume: f32) {
        if self.playing {
            return;
        }

        let voice = self.context.acquire_voice();
        if voice.is_null() {
            return;
        }
        self.voice = voice;

        let native = self.context.native();
        if self.single_buffer {
            native.set_source_buffer(voice, self.buffers.first().copied());
            native.set_source_looping(voice, false);
            native.set_source_gain(voice, volume);
            native.source_play(voice);
        } else {
            native.set_source_looping(voice, false);
            native.set_source_gain(voice, volume);

            // Stale errors from earlier calls would abort this play
            if let Some(error) = native.take_error() {
                warn!("StreamingPlayer::play: native error cleared: {error}");
            }

            let mut queued = 0;
            for i in 0..self.buffers.len() {
                let slot = self.buffers[i];
                if !self.fill(slot) {
                    break;
                }
                self.context.native().queue_buffers(voice, &[slot]);
                queued += 1;
            }

            let native = self.context.native();
            if let Some(error) = native.take_error() {
                warn!("StreamingPlayer::play: native error: {error}");
                self.abort_play();
                return;
            }
            if queued == 0 {
                debug!("StreamingPlayer::play: stream has no data");
                self.abort_play();
                return;
            }

            native.source_play(voice);
        }

        self.playing = true;
        debug!("{} playing on voice {}", self.id, voice.raw());
    }

    /// Undo a play that never reached the playing state.
    fn abort_play(&mut self) {
        self.context.release_voice(self.voice);
        self.voice = VoiceHandle::NULL;
        self.stream.borrow_mut().reset();
    }

    /// Stop playback, return the voice and rewind the stream.
    ///
    /// Does nothing unless playing. Notifies the observer exactly once per stop.
    pub fn stop(&mut self) {
        if !self.playing || self.voice.is_null() {
            return;
        }

        self.context.release_voice(self.voice);
        self.stream.borrow_mut().reset();
        self.voice = VoiceHandle::NULL;
        self.playing = false;
        self.paused = false;

        debug!("{} stopped", self.id);
        if let Some(observer) = &self.observer {
            observer.on_audio_stop(self.id);
        }
    }

    /// Pause a playing voice.
    pub fn pause(&mut self) {
        if self.playing && !self.paused && !self.voice.is_null() {
            self.context.native().source_pause(self.voice);
            self.paused = true;
        }
    }

    /// Resume a paused voice.
    pub fn resume(&mut self) {
        if self.playing && self.paused && !self.voice.is_null() {
            self.context.native().source_play(self.voice);
            self.paused = false;
        }
    }

    /// Recycle consumed buffers and detect the end of playback.
    ///
    /// Call once per frame. Without it a streaming voice underflows.
    pub fn update(&mut self) {
        if self.voice.is_null() {
            return;
        }
        let voice = self.voice;

        if self.single_buffer {
            if self.playing && !self.paused {
                let state = self.context.native().source_state(voice);
                if state != SourceState::Playing {
                    self.stop();
                }
            }
        } else {
            let mut end = false;
            let processed = self.context.native().buffers_processed(voice);
            for _ in 0..processed {
                let Some(slot) = self.context.native().unqueue_buffer(voice) else {
                    break;
                };

                self.rendered_seconds += self.seconds_per_buffer;

                if self.fill(slot) {
                    self.context.native().queue_buffers(voice, &[slot]);
                } else {
                    end = true;
                    break;
                }
            }

            let native = self.context.native();
            if end && native.buffers_queued(voice) == 0 {
                self.stop();
                return;
            }

            // An underflow stops the voice between ticks
            if self.playing && !self.paused && native.source_state(voice) != SourceState::Playing
            {
                debug!("{} underflowed, restarting voice", self.id);
                native.source_play(voice);
            }
        }

        if let Some(error) = self.context.native().take_error() {
            warn!("StreamingPlayer::update: native error: {error}");
        }
    }

    /// Set the gain of the attached voice. No-op without a voice.
    pub fn set_volume(&mut self, volume: f32) {
        if !self.voice.is_null() {
            self.context.native().set_source_gain(self.voice, volume);
        }
    }

    /// Read the next chunk into `slot`, wrapping around when looping.
    ///
    /// Returns `false` once the stream is exhausted and no loop remains.
    fn fill(&mut self, slot: BufferSlot) -> bool {
        let chunk = self.settings.buffer_size;
        let scratch = self
            .scratch
            .get_or_insert_with(|| vec![0u8; chunk].into_boxed_slice());

        let mut stream = self.stream.borrow_mut();
        let mut length = stream.read(scratch);
        if length == 0 {
            if self.loop_count == 0 {
                return false;
            }
            if self.loop_count > 0 {
                self.loop_count -= 1;
            }

            stream.reset();
            length = stream.read(scratch);
            if length == 0 {
                return false;
            }
        }

        self.context
            .native()
            .buffer_data(slot, self.format, &scratch[..length], self.sample_rate);
        true
    }

    /// Player id.
    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    /// Whether play succeeded and no stop happened since.
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether playback is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Remaining loops (negative = forever).
    #[must_use]
    pub const fn loop_count(&self) -> i32 {
        self.loop_count
    }

    /// Set remaining loops (negative = forever, 0 = play once).
    pub fn set_loop(&mut self, count: i32) {
        self.loop_count = count;
    }

    /// Whether the stream will wrap around when exhausted.
    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.loop_count != 0
    }

    /// Coarse playback position: one buffer duration per consumed buffer.
    #[must_use]
    pub const fn rendered_seconds(&self) -> f32 {
        self.rendered_seconds
    }

    /// Duration of one full buffer at the stream's format.
    #[must_use]
    pub const fn seconds_per_buffer(&self) -> f32 {
        self.seconds_per_buffer
    }

    /// Whether the stream was preloaded into one buffer.
    #[must_use]
    pub const fn is_single_buffer(&self) -> bool {
        self.single_buffer
    }

    /// The leased voice, or the sentinel.
    #[must_use]
    pub const fn voice(&self) -> VoiceHandle {
        self.voice
    }

    /// Owned buffer slots, in pool order.
    #[must_use]
    pub fn buffers(&self) -> &[BufferSlot] {
        &self.buffers
    }
}

impl<N: NativeAudio> Drop for StreamingPlayer<N> {
    fn drop(&mut self) {
        self.stop();
        self.scratch = None;

        if !self.voice.is_null() {
            self.context.release_voice(self.voice);
            self.voice = VoiceHandle::NULL;
        }

        if !self.buffers.is_empty() {
            self.context.native().delete_buffers(&self.buffers);
            self.buffers.clear();
        }
    }
}
