//! Audio Manager
//!
//! Tracks active [`StreamingPlayer`]s by id, drives their per-frame update and
//! drops them once they report a stop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;
use wisound_common::{PlayerId, PlayerIdGenerator};

use crate::audio_context::AudioContext;
use crate::audio_native::NativeAudio;
use crate::audio_player::{PlayerSettings, StopObserver, StreamingPlayer};
use crate::audio_stream::SharedStream;

/// Collects stop notifications until the manager reaps them.
#[derive(Debug, Default)]
pub struct StopQueue {
    stopped: RefCell<Vec<PlayerId>>,
}

impl StopQueue {
    /// Take every id recorded since the last drain.
    pub fn drain(&self) -> Vec<PlayerId> {
        std::mem::take(&mut *self.stopped.borrow_mut())
    }

    /// Number of pending notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stopped.borrow().len()
    }

    /// Check if no notification is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stopped.borrow().is_empty()
    }
}

impl StopObserver for StopQueue {
    fn on_audio_stop(&self, player: PlayerId) {
        self.stopped.borrow_mut().push(player);
    }
}

/// Owns the active players.
pub struct AudioManager<N: NativeAudio> {
    context: Rc<AudioContext<N>>,
    settings: PlayerSettings,
    players: HashMap<PlayerId, StreamingPlayer<N>>,
    stops: Rc<StopQueue>,
    ids: PlayerIdGenerator,
}

impl<N: NativeAudio> std::fmt::Debug for AudioManager<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioManager")
            .field("settings", &self.settings)
            .field("active", &self.players.len())
            .field("pending_stops", &self.stops.len())
            .finish_non_exhaustive()
    }
}

impl<N: NativeAudio> AudioManager<N> {
    /// Create a manager whose players use `settings`.
    pub fn new(context: Rc<AudioContext<N>>, settings: PlayerSettings) -> Self {
        Self {
            context,
            settings,
            players: HashMap::new(),
            stops: Rc::new(StopQueue::default()),
            ids: PlayerIdGenerator::new(),
        }
    }

    /// Shared context.
    #[must_use]
    pub fn context(&self) -> &Rc<AudioContext<N>> {
        &self.context
    }

    /// Play a stream. Returns `None` if playback did not start.
    pub fn play(&mut self, stream: SharedStream, volume: f32, loop_count: i32) -> Option<PlayerId> {
        let id = self.ids.next();
        let observer: Rc<dyn StopObserver> = self.stops.clone();
        let mut player =
            StreamingPlayer::with_settings(Rc::clone(&self.context), stream, self.settings)
                .with_id(id)
                .with_observer(observer);
        player.set_loop(loop_count);
        player.play(volume);

        if !player.is_playing() {
            debug!("{} did not start", id);
            return None;
        }

        self.players.insert(id, player);
        Some(id)
    }

    /// Pause one player.
    pub fn pause(&mut self, id: PlayerId) {
        if let Some(player) = self.players.get_mut(&id) {
            player.pause();
        }
    }

    /// Resume one player.
    pub fn resume(&mut self, id: PlayerId) {
        if let Some(player) = self.players.get_mut(&id) {
            player.resume();
        }
    }

    /// Stop and drop one player.
    pub fn stop(&mut self, id: PlayerId) {
        if let Some(mut player) = self.players.remove(&id) {
            player.stop();
        }
        self.reap();
    }

    /// Change one player's volume.
    pub fn set_volume(&mut self, id: PlayerId, volume: f32) {
        if let Some(player) = self.players.get_mut(&id) {
            player.set_volume(volume);
        }
    }

    /// Pause every player.
    pub fn pause_all(&mut self) {
        for player in self.players.values_mut() {
            player.pause();
        }
    }

    /// Resume every player.
    pub fn resume_all(&mut self) {
        for player in self.players.values_mut() {
            player.resume();
        }
    }

    /// Stop and drop every player.
    pub fn stop_all(&mut self) {
        for (_, mut player) in self.players.drain() {
            player.stop();
        }
        self.stops.drain();
    }

    /// Update every player, then drop those that stopped. Call once per frame.
    pub fn update(&mut self) {
        for player in self.players.values_mut() {
            player.update();
        }
        self.reap();
    }

    fn reap(&mut self) {
        for id in self.stops.drain() {
            if self.players.remove(&id).is_some() {
                debug!("Reaped {}", id);
            }
        }
    }

    /// Number of tracked players.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.players.len()
    }

    /// Check if a player is tracked.
    #[must_use]
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Check if a tracked player is playing and not paused.
    #[must_use]
    pub fn is_playing(&self, id: PlayerId) -> bool {
        self.players
            .get(&id)
            .is_some_and(|p| p.is_playing() && !p.is_paused())
    }
}

impl<N: NativeAudio> Drop for AudioManager<N> {
    fn drop(&mut self) {
        // Players release voices before the context can go away
        self.players.clear();
    }
}
