use serenity::model::id::GuildId;
use std::collections::{hash_map::Entry, HashMap, HashSet, VecDeque};
use tracing::{debug, error, info};

use crate::audio::{error::PlaybackError, item::PlayableItem};

/// Identifies one `start` of one item. A finish notification only advances
/// the queue when it carries the token of the entry's current playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackId(u64);

/// Outcome of [`GuildQueues::enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    /// The guild had no queue: the item is now at the front and must be
    /// started with the given token.
    Started {
        item: PlayableItem,
        playback: PlaybackId,
    },
    /// The item waits behind the playing one, at this 1-based pending position.
    Queued { position: usize },
}

/// Outcome of [`GuildQueues::finish`].
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Start this item next.
    Next {
        item: PlayableItem,
        playback: PlaybackId,
    },
    /// Nothing left; the guild entry was removed.
    Exhausted,
    /// Playback failed; the queue was left as it was.
    Stalled,
    /// Notification for a playback that is no longer current.
    Stale,
}

#[derive(Debug)]
struct GuildQueue {
    items: VecDeque<PlayableItem>,
    playback: PlaybackId,
}

/// Every guild's queue plus the loop flags.
///
/// An entry exists only while at least one item is queued or playing, and
/// its front item is the one playing. Loop flags live apart from entries and
/// outlast them.
#[derive(Debug, Default)]
pub struct GuildQueues {
    queues: HashMap<GuildId, GuildQueue>,
    loops: HashSet<GuildId>,
    last_playback: u64,
}

impl GuildQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, guild_id: GuildId, item: PlayableItem) -> Enqueued {
        match self.queues.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                let queue = entry.get_mut();
                info!("➕ Queued in guild {}: {}", guild_id, item.title());
                queue.items.push_back(item);
                Enqueued::Queued {
                    position: queue.items.len() - 1,
                }
            }
            Entry::Vacant(entry) => {
                self.last_playback += 1;
                let playback = PlaybackId(self.last_playback);
                info!("🆕 New queue for guild {}: {}", guild_id, item.title());
                entry.insert(GuildQueue {
                    items: VecDeque::from([item.clone()]),
                    playback,
                });
                Enqueued::Started { item, playback }
            }
        }
    }

    /// Removes the pending item at 1-based `position`; the playing item (0)
    /// cannot be removed this way.
    pub fn remove(&mut self, guild_id: GuildId, position: usize) -> Result<PlayableItem, PlaybackError> {
        let queue = self
            .queues
            .get_mut(&guild_id)
            .ok_or(PlaybackError::EmptyQueue)?;

        let len = queue.items.len();
        if position == 0 || position >= len {
            return Err(PlaybackError::InvalidPosition { position, len });
        }

        let removed = queue
            .items
            .remove(position)
            .ok_or(PlaybackError::InvalidPosition { position, len })?;
        debug!("❌ Removed #{} from guild {}: {}", position, guild_id, removed.title());
        Ok(removed)
    }

    /// Flips the loop flag and returns the new state.
    pub fn toggle_loop(&mut self, guild_id: GuildId) -> bool {
        let enabled = if self.loops.remove(&guild_id) {
            false
        } else {
            self.loops.insert(guild_id);
            true
        };
        info!("🔁 Loop {} for guild {}", if enabled { "on" } else { "off" }, guild_id);
        enabled
    }

    pub fn is_looping(&self, guild_id: GuildId) -> bool {
        self.loops.contains(&guild_id)
    }

    /// Drops the guild's entry. Returns whether there was one.
    pub fn clear(&mut self, guild_id: GuildId) -> bool {
        let existed = self.queues.remove(&guild_id).is_some();
        if existed {
            info!("🗑️ Cleared queue for guild {}", guild_id);
        }
        existed
    }

    pub fn items(&self, guild_id: GuildId) -> Option<Vec<PlayableItem>> {
        self.queues
            .get(&guild_id)
            .map(|queue| queue.items.iter().cloned().collect())
    }

    /// Applies the end of playback `playback` to the guild's queue.
    pub fn finish(&mut self, guild_id: GuildId, playback: PlaybackId, error: Option<&str>) -> Advance {
        let Some(queue) = self.queues.get_mut(&guild_id) else {
            debug!("Finish for guild {} without a queue", guild_id);
            return Advance::Stale;
        };

        if queue.playback != playback {
            debug!("Ignoring stale finish {:?} for guild {}", playback, guild_id);
            return Advance::Stale;
        }

        if let Some(error) = error {
            // The queue stays on the failed item until stop/leave.
            error!("❌ Playback failed in guild {}: {}", guild_id, error);
            return Advance::Stalled;
        }

        if let Some(finished) = queue.items.pop_front() {
            if self.loops.contains(&guild_id) {
                queue.items.push_back(finished);
            }
        }

        match queue.items.front().cloned() {
            Some(item) => {
                self.last_playback += 1;
                let next = PlaybackId(self.last_playback);
                queue.playback = next;
                Advance::Next { item, playback: next }
            }
            None => {
                self.queues.remove(&guild_id);
                info!("📭 Queue finished for guild {}", guild_id);
                Advance::Exhausted
            }
        }
    }
}
