//! Native Sound API Capability
//!
//! The source/buffer sound API that players drive, expressed as a trait so the
//! streaming logic can run against a real backend or a test double.
//!
//! The model follows the classic OpenAL shape:
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────────────────────┐
//! │  Device  │───│  Context  │───│ Voice (source)            │
//! └──────────┘   └───────────┘   │  queue: [Buf][Buf][Buf] ──┼──▶ output
//!                                └───────────────────────────┘
//! ```
//!
//! Voices consume queued buffers in order. Consumed buffers are reported as
//! *processed* and must be unqueued before they can be refilled. Every call is
//! infallible at the type level; failures latch a [`NativeError`] that callers
//! poll with [`NativeAudio::take_error`].

use thiserror::Error;

/// Opaque handle to a native playback voice. Zero means unallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VoiceHandle(u32);

impl VoiceHandle {
    /// The unallocated sentinel.
    pub const NULL: Self = Self(0);

    /// Wrap a raw native id.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw native id.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is the sentinel.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Opaque handle to a native PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSlot(u32);

impl BufferSlot {
    /// Wrap a raw native id.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw native id.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Opaque handle to an opened output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

/// Opaque handle to a created context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

/// Native buffer sample layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcmFormat {
    /// Unsigned 8-bit, one channel.
    Mono8,
    /// Unsigned 8-bit, interleaved stereo.
    Stereo8,
    /// Signed 16-bit little endian, one channel.
    Mono16,
    /// Signed 16-bit little endian, interleaved stereo.
    Stereo16,
}

impl PcmFormat {
    /// Resolve a format from sample width and channel count.
    ///
    /// Returns `None` for anything the native API cannot take.
    #[must_use]
    pub const fn from_layout(bits_per_sample: u16, channels: u16) -> Option<Self> {
        match (bits_per_sample, channels) {
            (8, 1) => Some(Self::Mono8),
            (8, 2) => Some(Self::Stereo8),
            (16, 1) => Some(Self::Mono16),
            (16, 2) => Some(Self::Stereo16),
            _ => None,
        }
    }

    /// Number of interleaved channels.
    #[must_use]
    pub const fn channels(self) -> u16 {
        match self {
            Self::Mono8 | Self::Mono16 => 1,
            Self::Stereo8 | Self::Stereo16 => 2,
        }
    }

    /// Bits per sample.
    #[must_use]
    pub const fn bits_per_sample(self) -> u16 {
        match self {
            Self::Mono8 | Self::Stereo8 => 8,
            Self::Mono16 | Self::Stereo16 => 16,
        }
    }
}

/// Playback state reported by a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceState {
    /// Never played since creation or rewind.
    #[default]
    Initial,
    /// Consuming queued buffers.
    Playing,
    /// Paused; queue untouched.
    Paused,
    /// Stopped explicitly or ran out of queued data.
    Stopped,
}

/// Latched native error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum NativeError {
    /// Unknown source or buffer name.
    #[error("invalid name (0xA001)")]
    InvalidName,
    /// Unknown enum, such as an unsupported buffer format.
    #[error("invalid enum (0xA002)")]
    InvalidEnum,
    /// Invalid value, such as unqueuing with nothing processed.
    #[error("invalid value (0xA003)")]
    InvalidValue,
    /// Operation not allowed in the current state.
    #[error("invalid operation (0xA004)")]
    InvalidOperation,
    /// Allocation failed or a limit was reached.
    #[error("out of memory (0xA005)")]
    OutOfMemory,
}

impl NativeError {
    /// OpenAL-compatible numeric code.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::InvalidName => 0xA001,
            Self::InvalidEnum => 0xA002,
            Self::InvalidValue => 0xA003,
            Self::InvalidOperation => 0xA004,
            Self::OutOfMemory => 0xA005,
        }
    }
}

/// Explicit context attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAttributes {
    /// Mixing frequency in Hz.
    pub frequency: u32,
    /// Refresh rate in Hz.
    pub refresh: u32,
    /// Synchronous context.
    pub synchronized: bool,
}

/// Listener properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    /// Forward vector.
    pub forward: [f32; 3],
    /// Up vector.
    pub up: [f32; 3],
    /// Velocity.
    pub velocity: [f32; 3],
    /// Position.
    pub position: [f32; 3],
}

impl Default for Listener {
    /// Facing down -Z with +Y up, at rest at the origin.
    fn default() -> Self {
        Self {
            forward: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
            velocity: [0.0; 3],
            position: [0.0; 3],
        }
    }
}

/// The native sound API consumed by the context manager and players.
///
/// Methods take `&self`: like the C API it mirrors, an implementation owns its
/// object tables and mutates them internally.
pub trait NativeAudio {
    /// Open an output device. `None` selects the platform default.
    fn open_device(&self, selector: Option<&str>) -> Option<DeviceId>;
    /// Close a device.
    fn close_device(&self, device: DeviceId);
    /// Create a context on a device, with default attributes when `None`.
    fn create_context(
        &self,
        device: DeviceId,
        attributes: Option<&ContextAttributes>,
    ) -> Option<ContextId>;
    /// Make a context current, or clear the current context.
    fn make_context_current(&self, context: Option<ContextId>) -> bool;
    /// Destroy a context.
    fn destroy_context(&self, context: ContextId);
    /// Apply listener orientation, velocity and position.
    fn set_listener(&self, listener: &Listener);

    /// Allocate one voice.
    fn gen_source(&self) -> Option<VoiceHandle>;
    /// Delete a voice.
    fn delete_source(&self, voice: VoiceHandle);
    /// Start or resume a voice.
    fn source_play(&self, voice: VoiceHandle);
    /// Pause a voice.
    fn source_pause(&self, voice: VoiceHandle);
    /// Stop a voice; all queued buffers become processed.
    fn source_stop(&self, voice: VoiceHandle);
    /// Current playback state.
    fn source_state(&self, voice: VoiceHandle) -> SourceState;
    /// Bind a single static buffer, or detach with `None`.
    fn set_source_buffer(&self, voice: VoiceHandle, buffer: Option<BufferSlot>);
    /// Native repeat flag.
    fn set_source_looping(&self, voice: VoiceHandle, looping: bool);
    /// Voice gain.
    fn set_source_gain(&self, voice: VoiceHandle, gain: f32);
    /// Buffers attached to the voice, processed or not.
    fn buffers_queued(&self, voice: VoiceHandle) -> usize;
    /// Buffers the voice has finished consuming.
    fn buffers_processed(&self, voice: VoiceHandle) -> usize;
    /// Append buffers to the voice queue.
    fn queue_buffers(&self, voice: VoiceHandle, buffers: &[BufferSlot]);
    /// Remove the oldest processed buffer. `None` latches [`NativeError::InvalidValue`].
    fn unqueue_buffer(&self, voice: VoiceHandle) -> Option<BufferSlot>;

    /// Allocate buffers.
    fn gen_buffers(&self, count: usize) -> Vec<BufferSlot>;
    /// Delete buffers.
    fn delete_buffers(&self, buffers: &[BufferSlot]);
    /// Upload PCM into a buffer. A `None` format latches [`NativeError::InvalidEnum`].
    fn buffer_data(
        &self,
        buffer: BufferSlot,
        format: Option<PcmFormat>,
        data: &[u8],
        sample_rate: u32,
    );

    /// Return and clear the latched error.
    fn take_error(&self) -> Option<NativeError>;
}
