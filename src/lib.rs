// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Fan curve control engine for handheld devices.
//!
//! The library holds the control law evaluation, the profile store, the
//! interactive curve editor and the periodic control loop. The
//! `fanctl-daemon` binary wires them to hwmon and a Unix socket.

pub mod backend;
pub mod canvas;
pub mod config;
pub mod control;
pub mod curve;
pub mod editor;
pub mod gesture;
pub mod hwmon;
pub mod point;
pub mod profile;
pub mod protocol;
