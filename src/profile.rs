// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Fan profiles and the profile store.
//!
//! A profile bundles a control mode with the values every mode needs (fixed
//! speed, curve points), so switching modes in the editor never loses data.
//! The store keys profiles by name and maps fan channels to profile names,
//! globally and per application.

use crate::curve;
use crate::point::{FanPoint, SPEED_MAX, SPEED_MIN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed speed given to freshly created profiles.
pub const DEFAULT_FIXED_SPEED: f64 = 50.0;

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Which control law a profile uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    /// Leave the fan to the hardware governor.
    #[default]
    NoControl,
    /// Constant speed regardless of temperature.
    Fixed,
    /// Piecewise-linear curve through the profile's points.
    Curve,
}

/// The resolved control law for one channel. Consumers match on it
/// exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlLaw {
    NoControl,
    /// Speed in percent
    Fixed(f64),
    /// Points in evaluation order
    Curve(Vec<FanPoint>),
}

impl ControlLaw {
    pub fn kind(&self) -> ModeKind {
        match self {
            ControlLaw::NoControl => ModeKind::NoControl,
            ControlLaw::Fixed(_) => ModeKind::Fixed,
            ControlLaw::Curve(_) => ModeKind::Curve,
        }
    }
}

/// A named fan-control profile (the name is the store key).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FanProfile {
    /// Round edited points to the grid
    #[serde(default)]
    pub snap_to_grid: bool,
    #[serde(default)]
    pub mode: ModeKind,
    /// Speed percent used in `Fixed` mode
    #[serde(default = "default_fixed_speed")]
    pub fixed_speed: f64,
    /// Curve points used in `Curve` mode
    #[serde(default)]
    pub points: Vec<FanPoint>,
}

impl Default for FanProfile {
    fn default() -> Self {
        Self {
            snap_to_grid: false,
            mode: ModeKind::NoControl,
            fixed_speed: DEFAULT_FIXED_SPEED,
            points: Vec::new(),
        }
    }
}

impl FanProfile {
    /// A fixed-speed profile.
    pub fn fixed(speed_pct: f64) -> Self {
        Self {
            mode: ModeKind::Fixed,
            fixed_speed: clamp_speed(speed_pct),
            ..Self::default()
        }
    }

    /// A curve profile. Points are sorted automatically.
    pub fn curve(mut points: Vec<FanPoint>) -> Self {
        curve::sort_points(&mut points);
        Self {
            mode: ModeKind::Curve,
            points,
            ..Self::default()
        }
    }

    /// Resolve the profile into the law the control loop applies.
    pub fn law(&self) -> ControlLaw {
        match self.mode {
            ModeKind::NoControl => ControlLaw::NoControl,
            ModeKind::Fixed => ControlLaw::Fixed(clamp_speed(self.fixed_speed)),
            ModeKind::Curve => {
                let mut points = self.points.clone();
                curve::sort_points(&mut points);
                ControlLaw::Curve(points)
            }
        }
    }
}

pub(crate) fn clamp_speed(speed_pct: f64) -> f64 {
    if speed_pct.is_nan() {
        SPEED_MIN
    } else {
        speed_pct.clamp(SPEED_MIN, SPEED_MAX)
    }
}

fn default_fixed_speed() -> f64 {
    DEFAULT_FIXED_SPEED
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// One channel -> profile mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelAssignment {
    /// Physical fan index
    pub channel: usize,
    /// Profile name
    pub profile: String,
}

/// Named profiles plus channel assignments.
///
/// Global assignments apply everywhere; per-app assignments override them
/// while that application is running. A channel without an assignment is
/// left under hardware control.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileStore {
    #[serde(default)]
    profiles: BTreeMap<String, FanProfile>,
    #[serde(default)]
    assignments: Vec<ChannelAssignment>,
    #[serde(default)]
    apps: BTreeMap<String, Vec<ChannelAssignment>>,
}

impl ProfileStore {
    /// A store seeded with the built-in "silent" and "performance" curves.
    pub fn with_defaults() -> Self {
        let mut store = Self::default();
        store.add("silent", FanProfile::curve(curve::default_silent_points()));
        store.add(
            "performance",
            FanProfile::curve(curve::default_performance_points()),
        );
        store
    }

    /// Insert or overwrite a profile. Fails on a blank name; the name is
    /// stored exactly as given.
    pub fn add(&mut self, name: &str, mut profile: FanProfile) -> bool {
        if name.trim().is_empty() {
            return false;
        }
        curve::sort_points(&mut profile.points);
        profile.fixed_speed = clamp_speed(profile.fixed_speed);
        self.profiles.insert(name.to_string(), profile);
        log::info!("Saved profile '{name}'");
        true
    }

    /// Delete a profile. Assignments that pointed at it fall back to the
    /// channel's global profile; global assignments to it are dropped.
    /// Returns false (and changes nothing) if the profile does not exist.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.profiles.remove(name).is_none() {
            return false;
        }

        self.assignments.retain(|a| a.profile != name);

        let globals = self.assignments.clone();
        for overrides in self.apps.values_mut() {
            overrides.retain_mut(|a| {
                if a.profile != name {
                    return true;
                }
                match globals.iter().find(|g| g.channel == a.channel) {
                    Some(g) => {
                        a.profile = g.profile.clone();
                        true
                    }
                    None => false,
                }
            });
        }
        self.apps.retain(|_, overrides| !overrides.is_empty());

        log::info!("Deleted profile '{name}'");
        true
    }

    /// Assign a profile to a channel (`profile = None` unassigns).
    ///
    /// With `app = None` the global assignment changes; otherwise the
    /// override for that application does. Fails if the named profile does
    /// not exist.
    pub fn assign(&mut self, channel: usize, app: Option<&str>, profile: Option<&str>) -> bool {
        if let Some(name) = profile {
            if !self.profiles.contains_key(name) {
                return false;
            }
        }

        let list = match app {
            None => &mut self.assignments,
            Some(app) => self.apps.entry(app.to_string()).or_default(),
        };

        list.retain(|a| a.channel != channel);
        if let Some(name) = profile {
            list.push(ChannelAssignment {
                channel,
                profile: name.to_string(),
            });
            list.sort_by_key(|a| a.channel);
        }
        self.apps.retain(|_, overrides| !overrides.is_empty());

        match (app, profile) {
            (None, Some(p)) => log::info!("Channel {channel}: using profile '{p}'"),
            (None, None) => log::info!("Channel {channel}: unassigned"),
            (Some(a), Some(p)) => log::info!("Channel {channel}: using profile '{p}' for {a}"),
            (Some(a), None) => log::info!("Channel {channel}: override for {a} cancelled"),
        }
        true
    }

    /// Effective profile name for a channel in an application context.
    pub fn assignment(&self, channel: usize, app: Option<&str>) -> Option<&str> {
        let app_override = app
            .and_then(|app| self.apps.get(app))
            .and_then(|list| list.iter().find(|a| a.channel == channel));

        app_override
            .or_else(|| self.assignments.iter().find(|a| a.channel == channel))
            .map(|a| a.profile.as_str())
    }

    /// Control law for a channel; `NoControl` when nothing is assigned.
    pub fn law_for(&self, channel: usize, app: Option<&str>) -> ControlLaw {
        self.assignment(channel, app)
            .and_then(|name| self.profiles.get(name))
            .map(FanProfile::law)
            .unwrap_or(ControlLaw::NoControl)
    }

    pub fn get(&self, name: &str) -> Option<&FanProfile> {
        self.profiles.get(name)
    }

    /// All profiles by name.
    pub fn list(&self) -> &BTreeMap<String, FanProfile> {
        &self.profiles
    }

    /// Global assignments, ordered by channel.
    pub fn assignments(&self) -> &[ChannelAssignment] {
        &self.assignments
    }

    /// Per-application overrides.
    pub fn app_assignments(&self) -> &BTreeMap<String, Vec<ChannelAssignment>> {
        &self.apps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_name_round_trips() {
        let mut store = ProfileStore::default();
        let before = store.clone();

        assert!(store.add(" quiet", FanProfile::fixed(40.0)));
        assert!(store.get(" quiet").is_some());
        assert!(store.assign(0, None, Some(" quiet")));
        assert_eq!(store.assignment(0, None), Some(" quiet"));

        assert!(store.remove(" quiet"));
        assert_eq!(store, before);
        assert!(!store.assign(0, None, Some(" quiet")));
    }

    #[test]
    fn test_add_rejects_empty_name() {
        let mut store = ProfileStore::default();
        assert!(!store.add("", FanProfile::fixed(40.0)));
        assert!(!store.add("   ", FanProfile::fixed(40.0)));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_add_overwrites() {
        let mut store = ProfileStore::default();
        assert!(store.add("quiet", FanProfile::fixed(20.0)));
        assert!(store.add("quiet", FanProfile::fixed(35.0)));
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.get("quiet").unwrap().fixed_speed, 35.0);
    }

    #[test]
    fn test_add_then_remove_restores_previous_state() {
        let mut store = ProfileStore::with_defaults();
        let before = store.clone();
        assert!(store.add("temp", FanProfile::fixed(70.0)));
        assert!(store.remove("temp"));
        assert_eq!(store, before);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut store = ProfileStore::with_defaults();
        let before = store.clone();
        assert!(!store.remove("nope"));
        assert_eq!(store, before);
    }

    #[test]
    fn test_remove_falls_back_to_global_assignment() {
        let mut store = ProfileStore::with_defaults();
        store.add("game", FanProfile::fixed(80.0));
        assert!(store.assign(0, None, Some("silent")));
        assert!(store.assign(0, Some("1234"), Some("game")));
        assert_eq!(store.assignment(0, Some("1234")), Some("game"));

        store.remove("game");
        assert_eq!(store.assignment(0, Some("1234")), Some("silent"));

        store.remove("silent");
        assert_eq!(store.assignment(0, None), None);
        assert_eq!(store.assignment(0, Some("1234")), None);
        assert!(store.app_assignments().is_empty());
    }

    #[test]
    fn test_assign_unknown_profile_fails() {
        let mut store = ProfileStore::default();
        assert!(!store.assign(0, None, Some("ghost")));
        assert!(store.assignments().is_empty());
    }

    #[test]
    fn test_assign_and_cancel() {
        let mut store = ProfileStore::with_defaults();
        store.assign(1, None, Some("performance"));
        store.assign(0, None, Some("silent"));
        assert_eq!(store.assignments()[0].channel, 0);
        assert_eq!(store.assignment(1, Some("other-app")), Some("performance"));

        store.assign(1, None, None);
        assert_eq!(store.assignment(1, None), None);
        assert_eq!(store.law_for(1, None), ControlLaw::NoControl);
    }

    #[test]
    fn test_law_for_resolves_mode() {
        let mut store = ProfileStore::default();
        store.add("fixed", FanProfile::fixed(150.0));
        store.add(
            "curve",
            FanProfile {
                mode: ModeKind::Curve,
                points: vec![FanPoint::new(70.0, 90.0), FanPoint::new(30.0, 10.0)],
                ..FanProfile::default()
            },
        );
        store.assign(0, None, Some("fixed"));
        store.assign(1, None, Some("curve"));

        assert_eq!(store.law_for(0, None), ControlLaw::Fixed(100.0));
        assert_eq!(
            store.law_for(1, None),
            ControlLaw::Curve(vec![FanPoint::new(30.0, 10.0), FanPoint::new(70.0, 90.0)])
        );
    }

    #[test]
    fn test_mode_switch_keeps_values() {
        let mut profile = FanProfile::curve(curve::default_silent_points());
        profile.mode = ModeKind::Fixed;
        assert_eq!(profile.law().kind(), ModeKind::Fixed);
        profile.mode = ModeKind::Curve;
        assert_eq!(profile.law(), ControlLaw::Curve(curve::default_silent_points()));
    }
}
