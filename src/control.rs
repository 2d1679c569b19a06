// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! The periodic fan control loop.
//!
//! Each tick samples every channel, resolves the channel's control law from
//! the latest profile store snapshot, and issues actuation commands. Ticks
//! never overlap: the next one is only scheduled after every backend call
//! of the current one has resolved.
//!
//! A failed backend call holds the last known value and is retried on the
//! next tick; nothing here is fatal to the loop.

use crate::backend::{FanBackend, TEMP_SCALE};
use crate::curve;
use crate::point::{FanPoint, TEMP_MIN};
use crate::profile::{ControlLaw, ModeKind, ProfileStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Used when a channel reports no usable maximum RPM.
pub const DEFAULT_MAX_RPM: u32 = 5000;

/// Shortest tick period; faster settings are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

const MODE_EVENT_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Observable data
// ---------------------------------------------------------------------------

/// One channel's state after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub channel: usize,
    /// Mode the channel is following
    pub mode: ModeKind,
    /// Measured point, once both temperature and speed have been read
    pub now: Option<FanPoint>,
    /// Commanded point; `None` under hardware control
    pub set: Option<FanPoint>,
    /// Last known fan speed in RPM
    pub rpm: Option<u32>,
    /// Last known temperature in Celsius
    pub temp_c: Option<f64>,
}

/// A channel switched between hardware and software control laws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeChange {
    pub channel: usize,
    pub mode: ModeKind,
}

/// Why [`ControlLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown was requested.
    Stopped,
    /// No channel supports software fan control.
    Unsupported,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ChannelState {
    enabled: bool,
    /// Mode last commanded successfully; `None` forces a re-send.
    applied: Option<ModeKind>,
    rpm: Option<u32>,
    temp_c: Option<f64>,
    max_rpm: Option<u32>,
    set: Option<FanPoint>,
}

/// Drives all channels of one backend.
pub struct ControlLoop<B> {
    backend: Arc<B>,
    store: watch::Receiver<ProfileStore>,
    app: watch::Receiver<Option<String>>,
    interval: Duration,
    channels: Vec<ChannelState>,
    samples: watch::Sender<Vec<Sample>>,
    modes: broadcast::Sender<ModeChange>,
}

impl<B: FanBackend> ControlLoop<B> {
    /// `store` supplies profile snapshots and `app` the running application
    /// context; both are read once per tick.
    pub fn new(
        backend: Arc<B>,
        store: watch::Receiver<ProfileStore>,
        app: watch::Receiver<Option<String>>,
        interval: Duration,
    ) -> Self {
        let channels = (0..backend.channel_count())
            .map(|_| ChannelState {
                enabled: true,
                ..ChannelState::default()
            })
            .collect();
        let (samples, _) = watch::channel(Vec::new());
        let (modes, _) = broadcast::channel(MODE_EVENT_CAPACITY);
        if interval < MIN_INTERVAL {
            log::warn!("Poll interval {interval:?} too short, using {MIN_INTERVAL:?}");
        }

        Self {
            backend,
            store,
            app,
            interval: interval.max(MIN_INTERVAL),
            channels,
            samples,
            modes,
        }
    }

    /// Latest samples, updated once per tick.
    pub fn subscribe_samples(&self) -> watch::Receiver<Vec<Sample>> {
        self.samples.subscribe()
    }

    /// Mode transitions as they are commanded.
    pub fn subscribe_modes(&self) -> broadcast::Receiver<ModeChange> {
        self.modes.subscribe()
    }

    /// Ask every channel whether software control is supported. Unsupported
    /// channels are handed to the hardware governor and never touched again.
    /// Returns false when no channel is left.
    pub async fn probe(&mut self) -> bool {
        for (channel, st) in self.channels.iter_mut().enumerate() {
            let adapted = match self.backend.fan_is_adapted(channel).await {
                Ok(adapted) => adapted,
                Err(e) => {
                    log::warn!("Channel {channel}: support query failed: {e}");
                    false
                }
            };
            if adapted {
                continue;
            }

            log::warn!("Channel {channel}: fan control not supported, leaving it automatic");
            st.enabled = false;
            if let Err(e) = self.backend.set_fan_auto(channel, true).await {
                log::error!("Channel {channel}: failed to restore automatic control: {e}");
            }
        }
        self.channels.iter().any(|st| st.enabled)
    }

    /// Run one control step over every enabled channel.
    pub async fn tick(&mut self) -> Vec<Sample> {
        let laws: Vec<ControlLaw> = {
            let app = self.app.borrow().clone();
            let store = self.store.borrow();
            (0..self.channels.len())
                .map(|channel| store.law_for(channel, app.as_deref()))
                .collect()
        };

        let mut samples = Vec::with_capacity(laws.len());
        for (channel, law) in laws.into_iter().enumerate() {
            if self.channels[channel].enabled {
                samples.push(self.tick_channel(channel, law).await);
            }
        }
        samples
    }

    async fn tick_channel(&mut self, channel: usize, law: ControlLaw) -> Sample {
        let backend = &self.backend;
        let st = &mut self.channels[channel];

        // Sample; failures hold the previous reading.
        match backend.fan_rpm(channel).await {
            Ok(rpm) => st.rpm = Some(rpm),
            Err(e) => log::debug!("Channel {channel}: RPM read failed, holding: {e}"),
        }
        match backend.fan_temperature(channel).await {
            Ok(raw) => st.temp_c = Some(raw as f64 / TEMP_SCALE),
            Err(e) => log::debug!("Channel {channel}: temperature read failed, holding: {e}"),
        }
        if st.max_rpm.is_none() {
            match backend.fan_max_rpm(channel).await {
                Ok(max) if max > 0 => st.max_rpm = Some(max),
                Ok(_) => log::debug!("Channel {channel}: zero max RPM reported"),
                Err(e) => log::debug!("Channel {channel}: max RPM read failed: {e}"),
            }
        }

        let max_rpm = st.max_rpm.unwrap_or(DEFAULT_MAX_RPM);
        let now = match (st.temp_c, st.rpm) {
            (Some(t), Some(rpm)) => Some(FanPoint::new(t, rpm as f64 * 100.0 / max_rpm as f64)),
            _ => None,
        };

        // Resolve the set point.
        let set = match &law {
            ControlLaw::NoControl => None,
            ControlLaw::Fixed(speed) => Some(FanPoint::new(st.temp_c.unwrap_or(TEMP_MIN), *speed)),
            ControlLaw::Curve(points) => st
                .temp_c
                .and_then(|t| curve::evaluate(points, t).map(|speed| FanPoint::new(t, speed)))
                .or(st.set),
        };
        st.set = set;

        let mode = law.kind();
        let sample = Sample {
            channel,
            mode,
            now,
            set,
            rpm: st.rpm,
            temp_c: st.temp_c,
        };

        // Nothing to follow yet; don't take manual control blind.
        if mode != ModeKind::NoControl && set.is_none() {
            log::debug!("Channel {channel}: no set point yet, skipping actuation");
            return sample;
        }

        if st.applied != Some(mode) {
            let auto = mode == ModeKind::NoControl;
            match backend.set_fan_auto(channel, auto).await {
                Ok(()) => {
                    log::info!("Channel {channel}: switched to {mode:?}");
                    st.applied = Some(mode);
                    // No receivers is fine.
                    let _ = self.modes.send(ModeChange { channel, mode });
                }
                Err(e) => {
                    log::warn!("Channel {channel}: mode change failed, retrying next tick: {e}");
                    st.applied = None;
                    return sample;
                }
            }
        }

        if let Some(set) = set {
            if let Err(e) = backend.set_fan_percent(channel, set.speed_pct).await {
                log::warn!("Channel {channel}: speed command failed, retrying next tick: {e}");
                st.applied = None;
            }
        }

        sample
    }

    /// Run until `shutdown` becomes true (or its sender is dropped).
    ///
    /// A tick in flight when shutdown is requested completes, and its
    /// results are discarded.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LoopExit {
        if !self.probe().await {
            log::warn!("No controllable fans, control loop disabled");
            return LoopExit::Unsupported;
        }

        log::info!(
            "Control loop started ({} channel(s), every {:?})",
            self.channels.iter().filter(|st| st.enabled).count(),
            self.interval
        );

        loop {
            let samples = self.tick().await;
            if *shutdown.borrow() {
                break;
            }
            self.samples.send_replace(samples);

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Control loop stopped");
        LoopExit::Stopped
    }
}

/// Hand every channel back to the hardware governor (safety fallback).
pub async fn restore_automatic<B: FanBackend>(backend: &B) {
    for channel in 0..backend.channel_count() {
        if let Err(e) = backend.set_fan_auto(channel, true).await {
            log::warn!("Failed to restore automatic control for channel {channel}: {e}");
        }
    }
}
