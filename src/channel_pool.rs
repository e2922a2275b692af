//! Fixed pool of mixing channels.
//!
//! A channel index is, at any time, either on the free list or owned by
//! exactly one audio object. Every time an index is returned to the free
//! list its generation is bumped, so a [`ChannelId`] handed out earlier
//! stops matching and late notifications about it can be told apart from
//! notifications about the channel's current occupant.

use crate::cache::SampleId;
use crate::object::ObjectId;
use std::collections::{HashMap, VecDeque};

/// A mixing channel as handed to the backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId {
    index: u16,
    generation: u32,
}

impl ChannelId {
    pub fn new(index: u16, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Channel({}#{})", self.index, self.generation)
    }
}

#[derive(Debug, Default, Clone)]
struct ChannelSlot {
    generation: u32,
    owner: Option<ObjectId>,
    sample: Option<SampleId>,
}

#[derive(Debug)]
pub struct ChannelPool {
    slots: Vec<ChannelSlot>,
    free: VecDeque<u16>,
    by_sample: HashMap<SampleId, Vec<ChannelId>>,
}

impl ChannelPool {
    /// Creates `channel_count` channels, all free, lowest index first.
    ///
    /// `channel_count` is capped at `u16::MAX`; the engine validates its
    /// configuration before getting here.
    pub fn new(channel_count: usize) -> Self {
        let channel_count = channel_count.min(u16::MAX as usize);
        Self {
            slots: vec![ChannelSlot::default(); channel_count],
            free: (0..channel_count as u16).collect(),
            by_sample: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn owned_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Takes the lowest-numbered free channel for `owner`.
    pub fn acquire(&mut self, owner: ObjectId) -> Option<ChannelId> {
        let index = self.free.pop_front()?;
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.owner.is_none(), "free channel {} has an owner", index);
        slot.owner = Some(owner);
        Some(ChannelId::new(index, slot.generation))
    }

    /// Returns `channel` to the free list.
    ///
    /// Returns false, and does nothing, if `channel` is stale or already free.
    pub fn release(&mut self, channel: ChannelId) -> bool {
        if !self.is_current(channel) {
            log::debug!("Ignoring release of stale {}", channel);
            return false;
        }
        self.unbind(channel);

        let slot = &mut self.slots[channel.index()];
        slot.owner = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(channel.index);
        true
    }

    /// True if `channel` is owned and has not been recycled since it was issued.
    pub fn is_current(&self, channel: ChannelId) -> bool {
        self.slots
            .get(channel.index())
            .is_some_and(|slot| slot.generation == channel.generation && slot.owner.is_some())
    }

    pub fn owner(&self, channel: ChannelId) -> Option<ObjectId> {
        if self.is_current(channel) {
            self.slots[channel.index()].owner
        } else {
            None
        }
    }

    /// Records that `channel` is playing `sample`, so unloading the sample
    /// can find it.
    pub fn bind_sample(&mut self, sample: SampleId, channel: ChannelId) {
        if !self.is_current(channel) {
            return;
        }
        self.unbind(channel);
        self.slots[channel.index()].sample = Some(sample);
        self.by_sample.entry(sample).or_default().push(channel);
    }

    pub fn unbind(&mut self, channel: ChannelId) {
        let Some(slot) = self.slots.get_mut(channel.index()) else {
            return;
        };
        if slot.generation != channel.generation {
            return;
        }
        let Some(sample) = slot.sample.take() else {
            return;
        };
        if let Some(channels) = self.by_sample.get_mut(&sample) {
            channels.retain(|c| *c != channel);
            if channels.is_empty() {
                self.by_sample.remove(&sample);
            }
        }
    }

    pub fn sample_of(&self, channel: ChannelId) -> Option<SampleId> {
        if self.is_current(channel) {
            self.slots[channel.index()].sample
        } else {
            None
        }
    }

    pub fn channels_for_sample(&self, sample: SampleId) -> Vec<ChannelId> {
        self.by_sample.get(&sample).cloned().unwrap_or_default()
    }

    /// All currently owned channels, in index order.
    pub fn owned_channels(&self) -> Vec<ChannelId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.owner.is_some())
            .map(|(index, slot)| ChannelId::new(index as u16, slot.generation))
            .collect()
    }
}
