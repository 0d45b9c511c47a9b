//! Device / Context Lifecycle
//!
//! [`AudioContext`] owns the single playback device/context pair and leases
//! voices to players. It is constructed explicitly and shared by reference
//! counting rather than living in global statics.
//!
//! Nothing here is fatal: a failed [`AudioContext::init`] leaves the context
//! inert, and every later call degrades to a logged no-op on the native side.

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use wisound_common::{AudioConfig, DEFAULT_FREQUENCY};

use crate::audio_native::{
    ContextAttributes, ContextId, DeviceId, Listener, NativeAudio, VoiceHandle,
};

/// Parameters for [`AudioContext::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Platform device selector (None = default device).
    pub device: Option<String>,
    /// Mixing frequency in Hz, or -1 for the device default.
    pub frequency: i32,
    /// Refresh rate in Hz.
    pub refresh: i32,
    /// Synchronous context.
    pub synchronized: bool,
}

impl ContextConfig {
    /// Default device, default context.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            device: None,
            frequency: DEFAULT_FREQUENCY,
            refresh: 0,
            synchronized: false,
        }
    }

    /// Explicit attributes, or `None` when the device default is requested.
    #[must_use]
    pub fn attributes(&self) -> Option<ContextAttributes> {
        if self.frequency == DEFAULT_FREQUENCY {
            return None;
        }
        Some(ContextAttributes {
            frequency: self.frequency.max(0) as u32,
            refresh: self.refresh.max(0) as u32,
            synchronized: self.synchronized,
        })
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&AudioConfig> for ContextConfig {
    fn from(config: &AudioConfig) -> Self {
        Self {
            device: config.device.clone(),
            frequency: config.frequency,
            refresh: config.refresh,
            synchronized: config.synchronized,
        }
    }
}

#[derive(Debug, Default)]
struct ContextState {
    device: Option<DeviceId>,
    context: Option<ContextId>,
    listener: Option<Listener>,
}

impl ContextState {
    const fn is_initialized(&self) -> bool {
        self.device.is_some()
    }
}

/// The process-wide device/context pair plus the voice allocator.
pub struct AudioContext<N: NativeAudio> {
    native: N,
    state: Mutex<ContextState>,
}

impl<N: NativeAudio> std::fmt::Debug for AudioContext<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AudioContext")
            .field("device", &state.device)
            .field("context", &state.context)
            .finish_non_exhaustive()
    }
}

impl<N: NativeAudio> AudioContext<N> {
    /// Wrap a native API. Nothing is opened until [`init`](Self::init).
    pub fn new(native: N) -> Self {
        Self {
            native,
            state: Mutex::new(ContextState::default()),
        }
    }

    /// Borrow the native API.
    #[must_use]
    pub const fn native(&self) -> &N {
        &self.native
    }

    /// Check if a device/context pair is live.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().is_initialized()
    }

    /// Listener defaults applied by the last successful init.
    #[must_use]
    pub fn listener(&self) -> Option<Listener> {
        self.state.lock().listener
    }

    /// Open the device, create and activate a context, and reset the listener.
    ///
    /// Does nothing when already initialized. Failures are logged and leave the
    /// context uninitialized so a later call can retry.
    pub fn init(&self, config: &ContextConfig) {
        let mut state = self.state.lock();
        if state.is_initialized() {
            return;
        }

        let Some(device) = self.native.open_device(config.device.as_deref()) else {
            error!("Failed to open audio device {:?}", config.device);
            return;
        };

        let attributes = config.attributes();
        let Some(context) = self.native.create_context(device, attributes.as_ref()) else {
            error!("Failed to create audio context with {:?}", attributes);
            self.native.close_device(device);
            return;
        };

        if !self.native.make_context_current(Some(context)) {
            warn!("Failed to make audio context current");
        }

        let listener = Listener::default();
        self.native.set_listener(&listener);

        state.device = Some(device);
        state.context = Some(context);
        state.listener = Some(listener);

        info!(
            "Audio context initialized (device: {:?}, attributes: {:?})",
            config.device, attributes
        );
    }

    /// Deactivate and destroy the context, then close the device.
    ///
    /// Safe to call at any time, any number of times.
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        if !state.is_initialized() {
            return;
        }

        if let Some(context) = state.context.take() {
            self.native.make_context_current(None);
            self.native.destroy_context(context);
        }

        if let Some(device) = state.device.take() {
            self.native.close_device(device);
        }

        state.listener = None;
        info!("Audio context destroyed");
    }

    /// Lease a voice. Returns [`VoiceHandle::NULL`] when none is available.
    pub fn acquire_voice(&self) -> VoiceHandle {
        match self.native.gen_source() {
            Some(voice) if !voice.is_null() => {
                debug!("Acquired voice {}", voice.raw());
                voice
            },
            _ => {
                warn!("Failed to generate audio source");
                VoiceHandle::NULL
            },
        }
    }

    /// Return a voice: stop it, drain its queue or detach its buffer, then delete it.
    ///
    /// The order matters. A voice must not be deleted while buffers are still
    /// attached to it.
    pub fn release_voice(&self, voice: VoiceHandle) {
        if voice.is_null() {
            return;
        }

        self.native.source_stop(voice);

        let queued = self.native.buffers_queued(voice);
        if queued > 0 {
            for _ in 0..queued {
                self.native.unqueue_buffer(voice);
            }
        } else {
            self.native.set_source_buffer(voice, None);
        }

        self.native.delete_source(voice);
        debug!("Released voice {} ({} buffers drained)", voice.raw(), queued);
    }
}

impl<N: NativeAudio> Drop for AudioContext<N> {
    fn drop(&mut self) {
        self.destroy();
    }
}
