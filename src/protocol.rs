// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Client-daemon protocol over Unix domain sockets.
//!
//! Messages are newline-delimited JSON. The client sends a [`Request`]
//! and the daemon replies with a [`Response`]. After `subscribe`, the
//! daemon also pushes `status` on every control loop tick, `mode` on every
//! mode transition and `profiles` whenever the profile store changes.

use crate::control::Sample;
use crate::profile::{ChannelAssignment, FanProfile, ModeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Requests (UI -> Daemon)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Request latest samples and assignments.
    #[serde(rename = "get_status")]
    GetStatus,

    /// List all profiles.
    #[serde(rename = "list_profiles")]
    ListProfiles,

    /// Create or overwrite a profile.
    #[serde(rename = "upsert_profile")]
    UpsertProfile { name: String, profile: FanProfile },

    /// Delete a profile by name.
    #[serde(rename = "delete_profile")]
    DeleteProfile { name: String },

    /// Assign a profile to a channel, globally or for one app.
    /// `profile: null` cancels the assignment.
    #[serde(rename = "assign")]
    Assign {
        channel: usize,
        #[serde(default)]
        app: Option<String>,
        #[serde(default)]
        profile: Option<String>,
    },

    /// Report the application now running (`null` for none).
    #[serde(rename = "set_app")]
    SetApp {
        #[serde(default)]
        app: Option<String>,
    },

    /// Push status, mode and profile updates until disconnect.
    #[serde(rename = "subscribe")]
    Subscribe,
}

// ---------------------------------------------------------------------------
// Responses (Daemon -> UI)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Current runtime state.
    #[serde(rename = "status")]
    Status {
        channels: Vec<ChannelInfo>,
        samples: Vec<Sample>,
        assignments: Vec<ChannelAssignment>,
        app: Option<String>,
    },

    /// A channel changed control mode (pushed to subscribers).
    #[serde(rename = "mode")]
    Mode { channel: usize, mode: ModeKind },

    /// All profiles by name.
    #[serde(rename = "profiles")]
    Profiles {
        profiles: BTreeMap<String, FanProfile>,
    },

    /// Operation succeeded.
    #[serde(rename = "ok")]
    Ok { message: String },

    /// Operation failed.
    #[serde(rename = "error")]
    Error { message: String },
}

/// A fan channel as shown to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelInfo {
    pub channel: usize,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Encode a message as a newline-delimited JSON string.
pub fn encode<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    let mut s = serde_json::to_string(msg)?;
    s.push('\n');
    Ok(s)
}

/// Decode a message from a JSON string (newline-trimmed).
pub fn decode<'a, T: Deserialize<'a>>(s: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(s.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::FanPoint;

    #[test]
    fn test_encode_is_one_line() {
        let line = encode(&Request::GetStatus).unwrap();
        assert_eq!(line, "{\"type\":\"get_status\"}\n");
    }

    #[test]
    fn test_assign_defaults_to_global_unassign() {
        let req: Request = decode(r#"{"type":"assign","channel":1}"#).unwrap();
        assert_eq!(
            req,
            Request::Assign {
                channel: 1,
                app: None,
                profile: None,
            }
        );
    }

    #[test]
    fn test_upsert_profile_from_client_json() {
        let req: Request = decode(
            r#"{"type":"upsert_profile","name":"quiet","profile":{"mode":"curve","points":[{"temp_c":70,"speed_pct":120}]}}"#,
        )
        .unwrap();
        let Request::UpsertProfile { name, profile } = req else {
            panic!("wrong request");
        };
        assert_eq!(name, "quiet");
        assert_eq!(profile.points, vec![FanPoint::new(70.0, 100.0)]);
        assert!(!profile.snap_to_grid);
    }

    #[test]
    fn test_unknown_request_is_error() {
        assert!(decode::<Request>(r#"{"type":"reboot"}"#).is_err());
    }
}
