//! Stove Watch - A smart stove safety monitor.
//!
//! # Overview
//!
//! A background monitor replays a video source, classifies each frame as
//! flame present/absent by counting orange/yellow pixels, and publishes the
//! latest verdict. Clients report their GPS position over HTTP; when a flame
//! is burning and the client is farther from home than the configured limit,
//! the response raises an alert.
//!
//! # Modules
//!
//! - [`geo`]: Haversine distance between coordinates
//! - [`vision`]: HSV color-threshold flame classification
//! - [`source`]: Replayable frame sources (image sequences, video files)
//! - [`monitor`]: The cancellable classification loop
//! - [`state`]: Shared verdict cell between the monitor and handlers
//! - [`alert`]: Alert rule and status messages
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP API handlers

pub mod alert;
pub mod api;
pub mod config;
pub mod geo;
pub mod monitor;
pub mod source;
pub mod state;
pub mod vision;
