use crate::arena::Arena;
use crate::audio_data::{SampleDecoder, SymphoniaDecoder};
use crate::backend::{MAX_VOLUME, MixerBackend, SoftwareMixer, VoiceParams};
use crate::cache::{SampleCache, SampleId};
use crate::channel_pool::{ChannelId, ChannelPool};
use crate::completion::CompletionQueue;
use crate::config::SoundEngineDesc;
use crate::error::{Result, SoundError};
use crate::events::SoundEvent;
use crate::math::{Listener, Pose};
use crate::object::{
    AudioObject, FileInstanceId, InstanceId, InstanceState, ObjectId, PlaybackInstance,
    RequestId, StandaloneFile,
};
use crate::positional::{ChannelSpatial, channel_spatial, compute_distance_and_angle};
use crate::trigger::{
    ActionType, ParameterDesc, PlaybackEvent, SwitchStateDesc, TriggerDesc, TriggerId,
    TriggerSlot, effective_volume,
};
use crossbeam_channel::{Receiver, Sender, unbounded};

/// Result of [`SoundEngine::execute_trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new playback instance was started. A
    /// [`SoundEvent::TriggerFinished`] follows once all its channels end.
    Started(InstanceId),
    /// The trigger acted on existing playback and will not be reported.
    NotTracked,
}

fn send_event(sender: &Sender<SoundEvent>, event: SoundEvent) {
    if let Err(e) = sender.send(event) {
        log::warn!("Dropping sound event: {}", e);
    }
}

/// Standalone files carry no attenuation range, so they only pan.
fn file_spatial(distance: f32, angle: f32) -> ChannelSpatial {
    channel_spatial(distance, angle, None, true)
}

/// The mixing engine context.
///
/// `SoundEngine` owns the channel pool, the sample cache, every audio object
/// and playback instance, and the mixer backend. All of its methods run on
/// one update thread; the only state shared with the mixer's rendering
/// thread is the completion queue the backend reports finished channels to.
///
/// # Lifecycle
///
/// - [`init`](Self::init) validates the configuration and attaches the
///   completion queue to the backend.
/// - The host calls [`update`](Self::update) once per tick to retire
///   finished channels, refresh positional values and report completed
///   triggers through [`poll_events`](Self::poll_events).
/// - [`release`](Self::release) (or dropping the engine) halts everything.
pub struct SoundEngine<B: MixerBackend = SoftwareMixer> {
    desc: SoundEngineDesc,
    cache: SampleCache,
    pool: ChannelPool,
    completions: CompletionQueue,
    triggers: Arena<TriggerSlot>,
    instances: Arena<PlaybackInstance>,
    objects: Arena<AudioObject>,
    listener: Listener,
    muted: bool,
    released: bool,
    backend: B,
    event_sender: Sender<SoundEvent>,
    event_receiver: Receiver<SoundEvent>,
    finished_scratch: Vec<ChannelId>,
    removal_scratch: Vec<InstanceId>,
}

impl SoundEngine<SoftwareMixer> {
    /// Creates an engine driving a fresh [`SoftwareMixer`] sized from `desc`.
    pub fn with_software_mixer(desc: SoundEngineDesc) -> Result<Self> {
        let mixer = SoftwareMixer::new(desc.channel_count, desc.sample_rate);
        Self::init(desc, mixer)
    }
}

impl<B: MixerBackend> SoundEngine<B> {
    /// Creates an engine that decodes samples with symphonia.
    pub fn init(desc: SoundEngineDesc, backend: B) -> Result<Self> {
        Self::with_decoder(desc, backend, Box::new(SymphoniaDecoder))
    }

    pub fn with_decoder(
        desc: SoundEngineDesc,
        mut backend: B,
        decoder: Box<dyn SampleDecoder>,
    ) -> Result<Self> {
        desc.validate()?;

        let cache = SampleCache::new(
            decoder,
            desc.load_options.clone(),
            desc.supported_extensions.clone(),
        );
        let pool = ChannelPool::new(desc.channel_count);
        let completions = CompletionQueue::new(desc.channel_count);
        backend.attach_completion(completions.sender());
        let (event_sender, event_receiver) = unbounded();

        log::info!(
            "Sound engine initialized: {} mixing channels, {} Hz output",
            desc.channel_count,
            desc.sample_rate
        );

        Ok(Self {
            desc,
            cache,
            pool,
            completions,
            triggers: Arena::new(),
            instances: Arena::new(),
            objects: Arena::new(),
            listener: Listener::new(Pose::identity()),
            muted: false,
            released: false,
            backend,
            event_sender,
            event_receiver,
            finished_scratch: Vec::new(),
            removal_scratch: Vec::new(),
        })
    }

    /// Halts every channel and drops all objects, triggers and samples.
    ///
    /// Calling it again is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.backend.halt_all();
        drop(self.completions.swap_and_drain());
        for channel in self.pool.owned_channels() {
            self.pool.release(channel);
        }
        self.instances.clear();
        self.objects.clear();
        self.triggers.clear();
        self.cache.clear();

        log::info!("Sound engine released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Runs one engine tick.
    ///
    /// Retires every channel the backend reported as finished since the last
    /// tick, pushes fresh distance and pan values for every object with live
    /// playback, then reports and drops instances whose channels have all
    /// finished.
    pub fn update(&mut self) {
        if self.released {
            return;
        }

        let mut finished = std::mem::take(&mut self.finished_scratch);
        finished.extend(self.completions.swap_and_drain());
        for channel in finished.drain(..) {
            self.retire_channel(channel);
        }
        self.finished_scratch = finished;

        self.refresh_positions();
        self.finalize_instances();
    }

    pub fn register_object(&mut self, pose: Pose) -> ObjectId {
        let id = self.objects.insert(AudioObject::new(pose));
        log::debug!("Registered audio object {}", id);
        id
    }

    /// Removes an object, stopping everything it plays.
    ///
    /// Its trigger instances are reported as finished and its standalone
    /// files as stopped.
    pub fn unregister_object(&mut self, id: ObjectId) -> Result<()> {
        let object = self
            .objects
            .remove(id)
            .ok_or(SoundError::InvalidHandle("object"))?;

        for instance in object.instances {
            self.retire_instance(instance);
        }
        for file in object.files {
            self.backend.halt(file.channel);
            self.pool.release(file.channel);
            send_event(
                &self.event_sender,
                SoundEvent::FileStopped {
                    object: id,
                    file: file.id,
                },
            );
        }

        log::debug!("Unregistered audio object {}", id);
        Ok(())
    }

    pub fn set_object_pose(&mut self, id: ObjectId, pose: Pose) -> Result<()> {
        self.objects
            .get_mut(id)
            .ok_or(SoundError::InvalidHandle("object"))?
            .set_pose(pose);
        Ok(())
    }

    pub fn set_listener_pose(&mut self, pose: Pose) {
        self.listener.set_pose(pose);
    }

    /// Builds a trigger from authoring data.
    ///
    /// Start triggers register their sample for lazy decoding; preload it
    /// with [`load_sample`](Self::load_sample) to avoid decoding on first
    /// use.
    pub fn create_trigger(&mut self, desc: &TriggerDesc) -> TriggerId {
        let path = desc.sample_path();
        let sample = match desc.action() {
            ActionType::Start => self.cache.load(&path, true),
            _ => SampleId::from_path(&path),
        };
        self.add_trigger(PlaybackEvent::from_desc(desc, sample))
    }

    pub fn add_trigger(&mut self, event: PlaybackEvent) -> TriggerId {
        let id = self.triggers.insert(TriggerSlot::new(event));
        log::debug!(
            "Created {:?} trigger {} for sample {}",
            event.action(),
            id,
            event.sample()
        );
        id
    }

    /// Destroys a trigger, or defers it until its last live instance ends.
    ///
    /// A trigger marked for destruction can no longer be executed.
    pub fn destroy_trigger(&mut self, id: TriggerId) -> Result<()> {
        let slot = self
            .triggers
            .get_mut(id)
            .ok_or(SoundError::InvalidHandle("trigger"))?;

        if slot.live_instances == 0 {
            self.triggers.remove(id);
            log::debug!("Destroyed trigger {}", id);
        } else {
            slot.marked_for_destruction = true;
            log::debug!(
                "Deferring destruction of trigger {} until {} instances finish",
                id,
                slot.live_instances
            );
        }
        Ok(())
    }

    /// Executes `trigger` on `object`.
    ///
    /// Start triggers acquire a channel and begin a new playback instance.
    /// Stop, pause and resume triggers act on every live instance of the
    /// object that plays the same sample. A start that cannot get a channel
    /// or a decoded sample fails without touching engine state.
    pub fn execute_trigger(
        &mut self,
        object: ObjectId,
        trigger: TriggerId,
        request: RequestId,
    ) -> Result<TriggerOutcome> {
        if !self.objects.contains(object) {
            return Err(SoundError::InvalidHandle("object"));
        }
        let event = match self.triggers.get(trigger) {
            Some(slot) if !slot.marked_for_destruction => slot.event,
            _ => return Err(SoundError::InvalidHandle("trigger")),
        };

        match event.action() {
            ActionType::Start => self
                .start_instance(object, trigger, &event, request)
                .map(TriggerOutcome::Started),
            action => {
                self.control_instances(object, action, event.sample());
                Ok(TriggerOutcome::NotTracked)
            }
        }
    }

    /// Halts every trigger instance playing on `object`.
    pub fn stop_all_triggers(&mut self, object: ObjectId) -> Result<()> {
        let obj = self
            .objects
            .get(object)
            .ok_or(SoundError::InvalidHandle("object"))?;
        for id in &obj.instances {
            if let Some(instance) = self.instances.get(*id) {
                for channel in &instance.channels {
                    self.backend.halt(*channel);
                }
            }
        }
        Ok(())
    }

    /// Halts every trigger instance and stops every standalone file.
    ///
    /// Files are reported as stopped right away. Instances are reported as
    /// finished by the next [`update`](Self::update), once their channels
    /// have drained.
    pub fn stop_all(&mut self) {
        for (id, object) in self.objects.iter_mut() {
            for instance in &object.instances {
                if let Some(instance) = self.instances.get(*instance) {
                    for channel in &instance.channels {
                        self.backend.halt(*channel);
                    }
                }
            }
            for file in object.files.drain(..) {
                self.backend.halt(file.channel);
                self.pool.release(file.channel);
                send_event(
                    &self.event_sender,
                    SoundEvent::FileStopped {
                        object: id,
                        file: file.id,
                    },
                );
            }
        }
        log::debug!("Stopped all sounds");
    }

    /// Pauses every channel in use.
    pub fn pause_all(&mut self) {
        for channel in self.pool.owned_channels() {
            self.backend.pause(channel);
        }
        log::debug!("Paused all channels");
    }

    pub fn resume_all(&mut self) {
        for channel in self.pool.owned_channels() {
            self.backend.resume(channel);
        }
        log::debug!("Resumed all channels");
    }

    pub fn mute_all(&mut self) {
        self.muted = true;
        for object in self.objects.handles() {
            self.apply_object_volumes(object, None);
        }
        log::debug!("Muted all channels");
    }

    /// Restores every live channel to the volume it would have without mute.
    pub fn unmute_all(&mut self) {
        self.muted = false;
        for object in self.objects.handles() {
            self.apply_object_volumes(object, None);
        }
        log::debug!("Unmuted all channels");
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Sets the volume multiplier `object` applies to `sample`, and
    /// re-applies it to channels already playing that sample.
    pub fn set_sample_volume(
        &mut self,
        object: ObjectId,
        sample: SampleId,
        multiplier: f32,
    ) -> Result<()> {
        self.objects
            .get_mut(object)
            .ok_or(SoundError::InvalidHandle("object"))?
            .set_volume_multiplier(sample, multiplier);

        if !self.muted {
            self.apply_object_volumes(object, Some(sample));
        }
        Ok(())
    }

    pub fn set_parameter(
        &mut self,
        object: ObjectId,
        parameter: &ParameterDesc,
        value: f32,
    ) -> Result<()> {
        self.set_sample_volume(object, parameter.sample, parameter.volume_for(value))
    }

    pub fn set_switch_state(&mut self, object: ObjectId, state: &SwitchStateDesc) -> Result<()> {
        self.set_sample_volume(object, state.sample, state.value)
    }

    /// Plays a file once on `object`, outside any trigger.
    ///
    /// The outcome is also reported as [`SoundEvent::FileStarted`].
    pub fn play_file(&mut self, object: ObjectId, file: FileInstanceId, path: &str) -> Result<()> {
        let result = self.start_file(object, file, path);
        if let Err(e) = &result {
            log::warn!("Failed to play {} ({}) on {}: {}", path, file, object, e);
        }
        send_event(
            &self.event_sender,
            SoundEvent::FileStarted {
                object,
                file,
                success: result.is_ok(),
            },
        );
        result
    }

    /// Stops the standalone file `file` on `object`.
    ///
    /// Returns whether anything was playing under that id.
    pub fn stop_file(&mut self, object: ObjectId, file: FileInstanceId) -> Result<bool> {
        let obj = self
            .objects
            .get_mut(object)
            .ok_or(SoundError::InvalidHandle("object"))?;

        let mut stopped = Vec::new();
        obj.files.retain(|f| {
            if f.id == file {
                stopped.push(f.channel);
                false
            } else {
                true
            }
        });
        if stopped.is_empty() {
            log::debug!("{} is not playing on {}", file, object);
            return Ok(false);
        }

        for channel in stopped {
            self.backend.halt(channel);
            self.pool.release(channel);
        }
        send_event(&self.event_sender, SoundEvent::FileStopped { object, file });
        Ok(true)
    }

    pub fn load_sample(&mut self, path: &str, metadata_only: bool) -> SampleId {
        self.cache.load(path, metadata_only)
    }

    pub fn load_sample_from_memory(
        &mut self,
        bytes: &[u8],
        path: &str,
        override_id: Option<SampleId>,
    ) -> SampleId {
        let id = SampleCache::memory_id(path, override_id);
        if self.cache.contains(id) {
            self.free_sample_channels(id);
        }
        self.cache.load_from_memory(bytes, path, override_id)
    }

    /// Halts and frees every channel playing `sample`, then drops it from
    /// the cache.
    pub fn unload_sample(&mut self, sample: SampleId) -> bool {
        if !self.cache.contains(sample) {
            log::error!("Cannot unload {}: not cached", sample);
            return false;
        }

        self.free_sample_channels(sample);
        self.cache.remove(sample)
    }

    fn free_sample_channels(&mut self, sample: SampleId) {
        for channel in self.pool.channels_for_sample(sample) {
            self.backend.halt(channel);
            self.retire_channel(channel);
        }
    }

    /// Drains pending host notifications.
    pub fn poll_events(&self) -> Vec<SoundEvent> {
        self.event_receiver.try_iter().collect()
    }

    pub fn desc(&self) -> &SoundEngineDesc {
        &self.desc
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    pub fn object(&self, id: ObjectId) -> Option<&AudioObject> {
        self.objects.get(id)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&PlaybackInstance> {
        self.instances.get(id)
    }

    pub fn trigger(&self, id: TriggerId) -> Option<&TriggerSlot> {
        self.triggers.get(id)
    }

    fn start_instance(
        &mut self,
        object: ObjectId,
        trigger: TriggerId,
        event: &PlaybackEvent,
        request: RequestId,
    ) -> Result<InstanceId> {
        let sample = event.sample();
        let Some((data, _)) = self.cache.ensure_decoded(sample) else {
            log::error!("Trigger {} cannot start: {} is unavailable", trigger, sample);
            return Err(SoundError::SampleUnavailable(sample));
        };
        let (multiplier, pose) = match self.objects.get(object) {
            Some(obj) => (obj.volume_multiplier(sample), obj.pose()),
            None => return Err(SoundError::InvalidHandle("object")),
        };

        let Some(channel) = self.pool.acquire(object) else {
            log::warn!(
                "No free channel for trigger {} on object {} ({} channels in use)",
                trigger,
                object,
                self.pool.capacity()
            );
            return Err(SoundError::ChannelsExhausted);
        };

        let (distance, angle) = compute_distance_and_angle(&self.listener.pose(), &pose);
        let params = VoiceParams::default()
            .loops(event.loops())
            .fade_in(event.fade_in())
            .volume(effective_volume(event.volume(), multiplier, self.muted))
            .spatial(channel_spatial(
                distance,
                angle,
                event.attenuation(),
                event.panning(),
            ));

        if let Err(e) = self.backend.play(channel, data, params) {
            self.pool.release(channel);
            return Err(e);
        }
        self.pool.bind_sample(sample, channel);

        let id = self
            .instances
            .insert(PlaybackInstance::new(trigger, object, request, channel));
        if let Some(obj) = self.objects.get_mut(object) {
            obj.instances.push(id);
        }
        if let Some(slot) = self.triggers.get_mut(trigger) {
            slot.live_instances += 1;
        }

        log::debug!(
            "Trigger {} started instance {} on {} for {}",
            trigger,
            id,
            channel,
            request
        );
        Ok(id)
    }

    fn control_instances(&mut self, object: ObjectId, action: ActionType, sample: SampleId) {
        let Some(obj) = self.objects.get(object) else {
            return;
        };

        for id in &obj.instances {
            let Some(instance) = self.instances.get(*id) else {
                continue;
            };
            let Some(slot) = self.triggers.get(instance.trigger) else {
                continue;
            };
            if slot.event.sample() != sample {
                continue;
            }

            let fade_out = slot.event.fade_out();
            for &channel in &instance.channels {
                match action {
                    ActionType::Stop if fade_out.is_zero() => self.backend.halt(channel),
                    ActionType::Stop => self.backend.fade_out(channel, fade_out),
                    ActionType::Pause => self.backend.pause(channel),
                    ActionType::Resume => self.backend.resume(channel),
                    ActionType::Start => {}
                }
            }
        }
    }

    fn start_file(&mut self, object: ObjectId, file: FileInstanceId, path: &str) -> Result<()> {
        if !self.objects.contains(object) {
            return Err(SoundError::InvalidHandle("object"));
        }

        let sample = self.cache.load(path, false);
        if !sample.is_valid() {
            return Err(SoundError::SampleUnavailable(SampleId::from_path(path)));
        }
        let (data, _) = self
            .cache
            .ensure_decoded(sample)
            .ok_or(SoundError::SampleUnavailable(sample))?;

        let (multiplier, pose) = match self.objects.get(object) {
            Some(obj) => (obj.volume_multiplier(sample), obj.pose()),
            None => return Err(SoundError::InvalidHandle("object")),
        };
        let channel = self
            .pool
            .acquire(object)
            .ok_or(SoundError::ChannelsExhausted)?;

        let (distance, angle) = compute_distance_and_angle(&self.listener.pose(), &pose);
        let params = VoiceParams::default()
            .volume(effective_volume(MAX_VOLUME, multiplier, self.muted))
            .spatial(file_spatial(distance, angle));
        if let Err(e) = self.backend.play(channel, data, params) {
            self.pool.release(channel);
            return Err(e);
        }
        self.pool.bind_sample(sample, channel);

        if let Some(obj) = self.objects.get_mut(object) {
            obj.files.push(StandaloneFile {
                id: file,
                sample,
                channel,
            });
        }
        log::debug!("Playing {} as {} on {}", path, file, channel);
        Ok(())
    }

    /// Detaches a finished channel from whatever it played for and returns
    /// it to the pool. Stale ids are ignored.
    fn retire_channel(&mut self, channel: ChannelId) -> bool {
        let Some(owner) = self.pool.owner(channel) else {
            log::debug!("Ignoring completion of stale {}", channel);
            return false;
        };

        match self.objects.get_mut(owner) {
            Some(object) => {
                let instances = &mut self.instances;
                let detached = object
                    .instances
                    .iter()
                    .any(|id| instances.get_mut(*id).is_some_and(|i| i.detach(channel)));

                if !detached {
                    if let Some(pos) = object.files.iter().position(|f| f.channel == channel) {
                        let file = object.files.swap_remove(pos);
                        send_event(
                            &self.event_sender,
                            SoundEvent::FileFinished {
                                object: owner,
                                file: file.id,
                            },
                        );
                    } else {
                        log::warn!("{} finished but nothing on {} owns it", channel, owner);
                    }
                }
            }
            None => {
                debug_assert!(false, "owner {} of {} no longer exists", owner, channel);
                log::error!("Owner {} of {} no longer exists", owner, channel);
            }
        }

        self.pool.release(channel)
    }

    fn refresh_positions(&mut self) {
        let listener = self.listener.pose();

        for (_, object) in self.objects.iter() {
            if !object.is_playing() {
                continue;
            }
            let (distance, angle) = compute_distance_and_angle(&listener, &object.pose());

            let spatial = file_spatial(distance, angle);
            for file in &object.files {
                self.backend.set_spatial(file.channel, spatial);
            }

            for id in &object.instances {
                let Some(instance) = self.instances.get(*id) else {
                    continue;
                };
                if instance.state != InstanceState::Playing {
                    continue;
                }
                let Some(slot) = self.triggers.get(instance.trigger) else {
                    continue;
                };
                let spatial = channel_spatial(
                    distance,
                    angle,
                    slot.event.attenuation(),
                    slot.event.panning(),
                );
                for channel in &instance.channels {
                    self.backend.set_spatial(*channel, spatial);
                }
            }
        }
    }

    fn finalize_instances(&mut self) {
        let mut removable = std::mem::take(&mut self.removal_scratch);
        removable.extend(
            self.instances
                .iter()
                .filter(|(_, instance)| instance.state == InstanceState::ToBeRemoved)
                .map(|(id, _)| id),
        );
        for id in removable.drain(..) {
            self.retire_instance(id);
        }
        self.removal_scratch = removable;
    }

    /// Reports and drops an instance, halting any channel it still holds.
    fn retire_instance(&mut self, id: InstanceId) {
        let Some(instance) = self.instances.remove(id) else {
            return;
        };

        for channel in &instance.channels {
            self.backend.halt(*channel);
            self.pool.release(*channel);
        }
        if let Some(object) = self.objects.get_mut(instance.object) {
            object.instances.retain(|i| *i != id);
        }

        send_event(
            &self.event_sender,
            SoundEvent::TriggerFinished {
                object: instance.object,
                instance: id,
                request: instance.request,
            },
        );
        self.release_trigger_ref(instance.trigger);
    }

    fn release_trigger_ref(&mut self, trigger: TriggerId) {
        let Some(slot) = self.triggers.get_mut(trigger) else {
            debug_assert!(false, "trigger {} freed while instances were live", trigger);
            log::error!("Trigger {} freed while instances were live", trigger);
            return;
        };

        debug_assert!(slot.live_instances > 0);
        slot.live_instances = slot.live_instances.saturating_sub(1);
        if slot.live_instances == 0 && slot.marked_for_destruction {
            self.triggers.remove(trigger);
            log::debug!("Destroyed deferred trigger {}", trigger);
        }
    }

    fn apply_object_volumes(&mut self, object: ObjectId, only: Option<SampleId>) {
        let muted = self.muted;
        let Some(obj) = self.objects.get(object) else {
            return;
        };

        for id in &obj.instances {
            let Some(instance) = self.instances.get(*id) else {
                continue;
            };
            let Some(slot) = self.triggers.get(instance.trigger) else {
                continue;
            };
            let sample = slot.event.sample();
            if only.is_some_and(|s| s != sample) {
                continue;
            }
            let volume = effective_volume(
                slot.event.volume(),
                obj.volume_multiplier(sample),
                muted,
            );
            for channel in &instance.channels {
                self.backend.set_volume(*channel, volume);
            }
        }

        for file in &obj.files {
            if only.is_some_and(|s| s != file.sample) {
                continue;
            }
            let volume = effective_volume(MAX_VOLUME, obj.volume_multiplier(file.sample), muted);
            self.backend.set_volume(file.channel, volume);
        }
    }
}

impl<B: MixerBackend> Drop for SoundEngine<B> {
    fn drop(&mut self) {
        self.release();
    }
}
