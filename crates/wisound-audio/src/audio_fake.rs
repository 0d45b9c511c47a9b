//! In-memory [`NativeAudio`] double for tests.
//!
//! Records every call in a journal and lets tests decide when the "hardware"
//! consumes queued buffers.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::audio_native::{
    BufferSlot, ContextAttributes, ContextId, DeviceId, Listener, NativeAudio, NativeError,
    PcmFormat, SourceState, VoiceHandle,
};

/// One recorded native call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    OpenDevice(Option<String>),
    CloseDevice(DeviceId),
    CreateContext(Option<ContextAttributes>),
    MakeCurrent(Option<ContextId>),
    DestroyContext(ContextId),
    SetListener(Listener),
    GenSource(VoiceHandle),
    DeleteSource(VoiceHandle),
    Play(VoiceHandle),
    Pause(VoiceHandle),
    Stop(VoiceHandle),
    SetBuffer(VoiceHandle, Option<BufferSlot>),
    SetLooping(VoiceHandle, bool),
    SetGain(VoiceHandle, f32),
    Queue(VoiceHandle, BufferSlot),
    Unqueue(VoiceHandle, Option<BufferSlot>),
    GenBuffers(usize),
    DeleteBuffers(Vec<BufferSlot>),
    BufferData(BufferSlot, usize),
}

#[derive(Debug, Default)]
struct FakeVoice {
    queue: VecDeque<BufferSlot>,
    processed: usize,
    state: SourceState,
    gain: f32,
}

#[derive(Debug)]
struct FakeState {
    next_id: u32,
    fail_open: bool,
    fail_context: bool,
    fail_next_queue: bool,
    overreport: usize,
    max_voices: usize,
    voices: HashMap<VoiceHandle, FakeVoice>,
    buffers: HashMap<BufferSlot, Vec<u8>>,
    error: Option<NativeError>,
    journal: Vec<Call>,
}

impl FakeState {
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn latch(&mut self, error: NativeError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn is_queued(&self, slot: BufferSlot) -> bool {
        self.voices.values().any(|v| v.queue.contains(&slot))
    }
}

/// Test double for the native sound API.
#[derive(Debug)]
pub(crate) struct FakeNative {
    state: RefCell<FakeState>,
}

impl FakeNative {
    pub(crate) fn new() -> Self {
        Self {
            state: RefCell::new(FakeState {
                next_id: 1,
                fail_open: false,
                fail_context: false,
                fail_next_queue: false,
                overreport: 0,
                max_voices: 32,
                voices: HashMap::new(),
                buffers: HashMap::new(),
                error: None,
                journal: Vec::new(),
            }),
        }
    }

    pub(crate) fn set_fail_open(&self, fail: bool) {
        self.state.borrow_mut().fail_open = fail;
    }

    pub(crate) fn set_fail_context(&self, fail: bool) {
        self.state.borrow_mut().fail_context = fail;
    }

    /// Latch an error on the next `queue_buffers` call.
    pub(crate) fn fail_next_queue(&self) {
        self.state.borrow_mut().fail_next_queue = true;
    }

    /// Report `extra` more processed buffers than a voice really has.
    pub(crate) fn overreport_processed(&self, extra: usize) {
        self.state.borrow_mut().overreport = extra;
    }

    pub(crate) fn set_max_voices(&self, max: usize) {
        self.state.borrow_mut().max_voices = max;
    }

    /// Latch an error right now.
    pub(crate) fn inject_error(&self, error: NativeError) {
        self.state.borrow_mut().latch(error);
    }

    pub(crate) fn journal(&self) -> Vec<Call> {
        self.state.borrow().journal.clone()
    }

    pub(crate) fn clear_journal(&self) {
        self.state.borrow_mut().journal.clear();
    }

    pub(crate) fn voice_count(&self) -> usize {
        self.state.borrow().voices.len()
    }

    pub(crate) fn buffer_count(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Bytes last uploaded into a buffer.
    pub(crate) fn uploaded(&self, slot: BufferSlot) -> Vec<u8> {
        self.state
            .borrow()
            .buffers
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    /// Byte sizes of the buffers queued on a voice, oldest first.
    pub(crate) fn queued_sizes(&self, voice: VoiceHandle) -> Vec<usize> {
        let state = self.state.borrow();
        state.voices.get(&voice).map_or_else(Vec::new, |v| {
            v.queue
                .iter()
                .map(|slot| state.buffers.get(slot).map_or(0, Vec::len))
                .collect()
        })
    }

    pub(crate) fn gain(&self, voice: VoiceHandle) -> Option<f32> {
        self.state.borrow().voices.get(&voice).map(|v| v.gain)
    }

    /// Simulate the hardware finishing `count` more queued buffers.
    ///
    /// Consuming the last unprocessed buffer stops the voice, as an underflow does.
    pub(crate) fn consume(&self, voice: VoiceHandle, count: usize) {
        let mut state = self.state.borrow_mut();
        if let Some(v) = state.voices.get_mut(&voice) {
            if v.state != SourceState::Playing {
                return;
            }
            v.processed = (v.processed + count).min(v.queue.len());
            if v.processed == v.queue.len() {
                v.state = SourceState::Stopped;
            }
        }
    }

    /// Simulate the voice stopping on its own, keeping the queue.
    pub(crate) fn force_state(&self, voice: VoiceHandle, new_state: SourceState) {
        if let Some(v) = self.state.borrow_mut().voices.get_mut(&voice) {
            v.state = new_state;
        }
    }

    fn with_voice<R>(
        &self,
        voice: VoiceHandle,
        call: Option<Call>,
        f: impl FnOnce(&mut FakeVoice) -> R,
    ) -> Option<R> {
        let mut state = self.state.borrow_mut();
        if let Some(call) = call {
            state.journal.push(call);
        }
        match state.voices.get_mut(&voice) {
            Some(v) => Some(f(v)),
            None => {
                state.latch(NativeError::InvalidName);
                None
            },
        }
    }
}

impl NativeAudio for FakeNative {
    fn open_device(&self, selector: Option<&str>) -> Option<DeviceId> {
        let mut state = self.state.borrow_mut();
        state.journal.push(Call::OpenDevice(selector.map(str::to_string)));
        if state.fail_open {
            return None;
        }
        Some(DeviceId(state.next_id()))
    }

    fn close_device(&self, device: DeviceId) {
        self.state.borrow_mut().journal.push(Call::CloseDevice(device));
    }

    fn create_context(
        &self,
        _device: DeviceId,
        attributes: Option<&ContextAttributes>,
    ) -> Option<ContextId> {
        let mut state = self.state.borrow_mut();
        state.journal.push(Call::CreateContext(attributes.copied()));
        if state.fail_context {
            return None;
        }
        Some(ContextId(state.next_id()))
    }

    fn make_context_current(&self, context: Option<ContextId>) -> bool {
        self.state.borrow_mut().journal.push(Call::MakeCurrent(context));
        true
    }

    fn destroy_context(&self, context: ContextId) {
        self.state.borrow_mut().journal.push(Call::DestroyContext(context));
    }

    fn set_listener(&self, listener: &Listener) {
        self.state.borrow_mut().journal.push(Call::SetListener(*listener));
    }

    fn gen_source(&self) -> Option<VoiceHandle> {
        let mut state = self.state.borrow_mut();
        if state.voices.len() >= state.max_voices {
            state.latch(NativeError::OutOfMemory);
            return None;
        }
        let voice = VoiceHandle::from_raw(state.next_id());
        state.voices.insert(
            voice,
            FakeVoice {
                gain: 1.0,
                ..FakeVoice::default()
            },
        );
        state.journal.push(Call::GenSource(voice));
        Some(voice)
    }

    fn delete_source(&self, voice: VoiceHandle) {
        let mut state = self.state.borrow_mut();
        state.journal.push(Call::DeleteSource(voice));
        if state.voices.remove(&voice).is_none() {
            state.latch(NativeError::InvalidName);
        }
    }

    fn source_play(&self, voice: VoiceHandle) {
        self.with_voice(voice, Some(Call::Play(voice)), |v| {
            if v.state == SourceState::Stopped {
                v.processed = 0;
            }
            v.state = SourceState::Playing;
        });
    }

    fn source_pause(&self, voice: VoiceHandle) {
        self.with_voice(voice, Some(Call::Pause(voice)), |v| {
            if v.state == SourceState::Playing {
                v.state = SourceState::Paused;
            }
        });
    }

    fn source_stop(&self, voice: VoiceHandle) {
        self.with_voice(voice, Some(Call::Stop(voice)), |v| {
            v.state = SourceState::Stopped;
            v.processed = v.queue.len();
        });
    }

    fn source_state(&self, voice: VoiceHandle) -> SourceState {
        self.with_voice(voice, None, |v| v.state).unwrap_or_default()
    }

    fn set_source_buffer(&self, voice: VoiceHandle, buffer: Option<BufferSlot>) {
        self.with_voice(voice, Some(Call::SetBuffer(voice, buffer)), |v| {
            v.queue.clear();
            v.processed = 0;
            if let Some(slot) = buffer {
                v.queue.push_back(slot);
            }
        });
    }

    fn set_source_looping(&self, voice: VoiceHandle, looping: bool) {
        self.with_voice(voice, Some(Call::SetLooping(voice, looping)), |_| ());
    }

    fn set_source_gain(&self, voice: VoiceHandle, gain: f32) {
        self.with_voice(voice, Some(Call::SetGain(voice, gain)), |v| v.gain = gain);
    }

    fn buffers_queued(&self, voice: VoiceHandle) -> usize {
        self.with_voice(voice, None, |v| v.queue.len()).unwrap_or(0)
    }

    fn buffers_processed(&self, voice: VoiceHandle) -> usize {
        let extra = self.state.borrow().overreport;
        self.with_voice(voice, None, |v| v.processed + extra)
            .unwrap_or(0)
    }

    fn queue_buffers(&self, voice: VoiceHandle, buffers: &[BufferSlot]) {
        let mut state = self.state.borrow_mut();
        for slot in buffers {
            state.journal.push(Call::Queue(voice, *slot));
        }
        if std::mem::take(&mut state.fail_next_queue) {
            state.latch(NativeError::InvalidOperation);
        }
        match state.voices.get_mut(&voice) {
            Some(v) => v.queue.extend(buffers.iter().copied()),
            None => state.latch(NativeError::InvalidName),
        }
    }

    fn unqueue_buffer(&self, voice: VoiceHandle) -> Option<BufferSlot> {
        let mut state = self.state.borrow_mut();
        let slot = match state.voices.get_mut(&voice) {
            Some(v) if v.processed > 0 => {
                v.processed -= 1;
                v.queue.pop_front()
            },
            _ => None,
        };
        if slot.is_none() {
            state.latch(NativeError::InvalidValue);
        }
        state.journal.push(Call::Unqueue(voice, slot));
        slot
    }

    fn gen_buffers(&self, count: usize) -> Vec<BufferSlot> {
        let mut state = self.state.borrow_mut();
        state.journal.push(Call::GenBuffers(count));
        (0..count)
            .map(|_| {
                let slot = BufferSlot::from_raw(state.next_id());
                state.buffers.insert(slot, Vec::new());
                slot
            })
            .collect()
    }

    fn delete_buffers(&self, buffers: &[BufferSlot]) {
        let mut state = self.state.borrow_mut();
        state.journal.push(Call::DeleteBuffers(buffers.to_vec()));
        for slot in buffers {
            if state.is_queued(*slot) {
                state.latch(NativeError::InvalidOperation);
                continue;
            }
            state.buffers.remove(slot);
        }
    }

    fn buffer_data(
        &self,
        buffer: BufferSlot,
        format: Option<PcmFormat>,
        data: &[u8],
        _sample_rate: u32,
    ) {
        let mut state = self.state.borrow_mut();
        state.journal.push(Call::BufferData(buffer, data.len()));
        if format.is_none() {
            state.latch(NativeError::InvalidEnum);
            return;
        }
        match state.buffers.get_mut(&buffer) {
            Some(stored) => *stored = data.to_vec(),
            None => state.latch(NativeError::InvalidName),
        }
    }

    fn take_error(&self) -> Option<NativeError> {
        self.state.borrow_mut().error.take()
    }
}
