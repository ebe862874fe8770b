//! The emoji overlay: which gesture is shown, and the images used to show it.

use std::{
    fmt,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use handmoji_gesture::gestures;

use crate::image::Image;

/// A gesture that has an emoji overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emoji {
    Victory,
    ThumbsUp,
}

impl Emoji {
    pub const ALL: [Emoji; 2] = [Emoji::Victory, Emoji::ThumbsUp];

    /// Maps a gesture name reported by a classifier to its emoji.
    ///
    /// Returns [`None`] for gestures without an emoji.
    pub fn from_gesture_name(name: &str) -> Option<Self> {
        match name {
            gestures::VICTORY => Some(Emoji::Victory),
            gestures::THUMBS_UP => Some(Emoji::ThumbsUp),
            _ => None,
        }
    }

    /// Returns the gesture name, which doubles as the asset file stem.
    pub fn name(self) -> &'static str {
        match self {
            Emoji::Victory => gestures::VICTORY,
            Emoji::ThumbsUp => gestures::THUMBS_UP,
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Permission to write the overlay state, handed out by [`OverlayState::begin_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTicket {
    generation: u64,
}

#[derive(Debug, Default)]
struct Shared {
    current: Option<Emoji>,
    generation: u64,
    disposed: bool,
}

/// The emoji currently shown, shared between the frame loop and whoever disposes it.
///
/// Every tick obtains a [`TickTicket`] before doing any work, and may only write with it if no
/// newer ticket was issued and the state was not disposed in the meantime.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    shared: Arc<Mutex<Shared>>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the emoji that is currently shown.
    pub fn current(&self) -> Option<Emoji> {
        self.lock().current
    }

    /// Starts a new tick, invalidating all previously issued tickets.
    ///
    /// Returns [`None`] once the state has been disposed.
    pub fn begin_tick(&self) -> Option<TickTicket> {
        let mut shared = self.lock();
        if shared.disposed {
            return None;
        }
        shared.generation += 1;
        Some(TickTicket {
            generation: shared.generation,
        })
    }

    /// Returns whether writes with `ticket` would still be accepted.
    pub fn is_current(&self, ticket: TickTicket) -> bool {
        let shared = self.lock();
        !shared.disposed && shared.generation == ticket.generation
    }

    /// Shows `emoji`, unless `ticket` is stale or the state was disposed.
    ///
    /// Returns whether the write was applied.
    pub fn commit(&self, ticket: TickTicket, emoji: Emoji) -> bool {
        let mut shared = self.lock();
        if shared.disposed || shared.generation != ticket.generation {
            log::debug!("dropping stale overlay update to {emoji}");
            return false;
        }
        if shared.current != Some(emoji) {
            log::info!("showing {emoji}");
        }
        shared.current = Some(emoji);
        true
    }

    /// Disposes the state, rejecting all further writes.
    ///
    /// Returns `true` if this call performed the disposal, `false` if it was already disposed.
    pub fn dispose(&self) -> bool {
        let mut shared = self.lock();
        if shared.disposed {
            return false;
        }
        shared.disposed = true;
        shared.generation += 1;
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

/// Overlay images, loaded from `<asset dir>/<gesture name>.png`.
#[derive(Debug, Clone, Default)]
pub struct OverlayAssets {
    images: [Option<Arc<Image>>; 2],
}

impl OverlayAssets {
    /// Loads the overlay image of every [`Emoji`] from `dir`.
    ///
    /// Images that fail to load are logged and left out; [`OverlayAssets::get`] returns [`None`]
    /// for them.
    pub fn load<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let images = Emoji::ALL.map(|emoji| {
            let path = dir.join(format!("{}.png", emoji.name()));
            match Image::load(&path) {
                Ok(image) => {
                    log::debug!("loaded {} overlay: {:?}", emoji, image);
                    Some(Arc::new(image))
                }
                Err(e) => {
                    log::warn!("{e:#}; {emoji} will be shown as text");
                    None
                }
            }
        });

        Self { images }
    }

    /// Uses `image` as the overlay for `emoji`.
    pub fn set(&mut self, emoji: Emoji, image: Image) {
        self.images[emoji as usize] = Some(Arc::new(image));
    }

    /// Returns the overlay image for `emoji`, if it was loaded.
    pub fn get(&self, emoji: Emoji) -> Option<&Arc<Image>> {
        self.images[emoji as usize].as_ref()
    }
}
