//! # Change Notification Buses
//!
//! Broadcast channels carrying catalog change notifications, built on
//! `tokio::sync::broadcast`.
//!
//! Two independent channels are exposed:
//!
//! - **Media channel**: entity added / updated / deleted notifications,
//!   each carrying a bitmask describing which listing surfaces are stale
//!   (see the `UPDATE_*` / `ADDED_*` constants).
//! - **Discovery channel**: background scan progress and completion, plus
//!   entry-point ban/unban/removal and the working-state flag.
//!
//! Listeners subscribe to either channel without affecting the other.
//! Emission never blocks: each subscriber owns a bounded buffer and a slow
//! subscriber observes `RecvError::Lagged` instead of stalling emitters.
//!
//! ## Usage
//!
//! ```rust
//! use catalog_runtime::events::{EventBus, MediaEvent, ADDED_VIDEO};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut media = bus.subscribe_media();
//!
//! bus.emit_media(MediaEvent::Added {
//!     ids: vec![42],
//!     mask: ADDED_VIDEO,
//! })
//! .ok();
//!
//! let event = media.recv().await.unwrap();
//! assert!(matches!(event, MediaEvent::Added { .. }));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default per-subscriber buffer size for both channels.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Change masks
// ============================================================================

/// An audio listing changed.
pub const UPDATE_AUDIO: u32 = 1 << 0;
/// An audio listing changed and is now empty.
pub const UPDATE_AUDIO_EMPTY: u32 = 1 << 1;
/// A video listing changed.
pub const UPDATE_VIDEO: u32 = 1 << 2;
/// An audio entity was added.
pub const ADDED_AUDIO: u32 = 1 << 3;
/// An audio entity was added to a previously empty listing.
pub const ADDED_AUDIO_EMPTY: u32 = 1 << 4;
/// A video entity was added.
pub const ADDED_VIDEO: u32 = 1 << 5;
/// A file selected out of a transport descriptor was added.
pub const ADDED_TRANSPORT_FILE: u32 = 1 << 6;

// ============================================================================
// Media channel events
// ============================================================================

/// Catalog entity change notification.
///
/// `mask` is a combination of the `UPDATE_*` / `ADDED_*` constants telling
/// listeners which listing surfaces need refreshing without re-querying
/// everything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MediaEvent {
    /// Entities were added to the catalog.
    Added { ids: Vec<i64>, mask: u32 },
    /// Existing entities were mutated in place.
    Updated { ids: Vec<i64>, mask: u32 },
    /// Entities were removed, identified by id.
    Deleted { ids: Vec<i64> },
}

impl MediaEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            MediaEvent::Added { .. } => "Entities added to catalog",
            MediaEvent::Updated { .. } => "Catalog entities updated",
            MediaEvent::Deleted { .. } => "Entities removed from catalog",
        }
    }

    /// The ids this event refers to.
    pub fn ids(&self) -> &[i64] {
        match self {
            MediaEvent::Added { ids, .. }
            | MediaEvent::Updated { ids, .. }
            | MediaEvent::Deleted { ids } => ids,
        }
    }
}

// ============================================================================
// Discovery channel events
// ============================================================================

/// Background discovery and entry-point notifications.
///
/// `session` identifies one rescan pass; callers that discarded a rescan
/// compare the session id and ignore late completions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DiscoveryEvent {
    /// A scan pass reached the given entry point.
    Progress { session: String, entry_point: String },
    /// A scan pass finished.
    Completed { session: String },
    /// An entry point was banned from future discovery.
    EntryPointBanned { path: String },
    /// A previously banned entry point was unbanned.
    EntryPointUnbanned { path: String },
    /// An entry point was removed from the catalog configuration.
    EntryPointRemoved { path: String },
    /// The catalog's background-work flag flipped.
    WorkingChanged { working: bool },
}

impl DiscoveryEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            DiscoveryEvent::Progress { .. } => "Discovery progressed",
            DiscoveryEvent::Completed { .. } => "Discovery completed",
            DiscoveryEvent::EntryPointBanned { .. } => "Entry point banned",
            DiscoveryEvent::EntryPointUnbanned { .. } => "Entry point unbanned",
            DiscoveryEvent::EntryPointRemoved { .. } => "Entry point removed",
            DiscoveryEvent::WorkingChanged { .. } => "Background work flag changed",
        }
    }
}

// ============================================================================
// Event bus
// ============================================================================

/// Paired broadcast channels for catalog notifications.
///
/// Cloning the bus clones the senders; every `subscribe_*` call creates an
/// independent receiver. Past events are not replayed.
#[derive(Clone)]
pub struct EventBus {
    media: broadcast::Sender<MediaEvent>,
    discovery: broadcast::Sender<DiscoveryEvent>,
}

impl EventBus {
    /// Creates a bus whose subscribers each buffer up to `capacity` events
    /// per channel before lagging.
    pub fn new(capacity: usize) -> Self {
        let (media, _) = broadcast::channel(capacity);
        let (discovery, _) = broadcast::channel(capacity);
        Self { media, discovery }
    }

    /// Publishes a media-channel event to all media subscribers.
    ///
    /// Returns the number of subscribers reached, or an error when nobody
    /// is listening (callers typically ignore that case).
    pub fn emit_media(&self, event: MediaEvent) -> Result<usize, SendError<MediaEvent>> {
        self.media.send(event)
    }

    /// Publishes a discovery-channel event to all discovery subscribers.
    pub fn emit_discovery(
        &self,
        event: DiscoveryEvent,
    ) -> Result<usize, SendError<DiscoveryEvent>> {
        self.discovery.send(event)
    }

    /// Creates a new media-channel subscriber.
    pub fn subscribe_media(&self) -> Receiver<MediaEvent> {
        self.media.subscribe()
    }

    /// Creates a new discovery-channel subscriber.
    pub fn subscribe_discovery(&self) -> Receiver<DiscoveryEvent> {
        self.discovery.subscribe()
    }

    /// Number of active media-channel subscribers.
    pub fn media_subscriber_count(&self) -> usize {
        self.media.receiver_count()
    }

    /// Number of active discovery-channel subscribers.
    pub fn discovery_subscriber_count(&self) -> usize {
        self.discovery.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("media_subscribers", &self.media_subscriber_count())
            .field("discovery_subscribers", &self.discovery_subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let event = MediaEvent::Deleted { ids: vec![1] };
        assert!(bus.emit_media(event).is_err());
    }

    #[tokio::test]
    async fn test_media_fan_out() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe_media();
        let mut sub2 = bus.subscribe_media();

        let event = MediaEvent::Added {
            ids: vec![7, 8],
            mask: ADDED_VIDEO | ADDED_TRANSPORT_FILE,
        };
        let reached = bus.emit_media(event.clone()).unwrap();
        assert_eq!(reached, 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let bus = EventBus::new(10);
        let mut media = bus.subscribe_media();
        let mut discovery = bus.subscribe_discovery();

        // A discovery event must not reach media subscribers and vice versa.
        bus.emit_discovery(DiscoveryEvent::WorkingChanged { working: true })
            .unwrap();
        bus.emit_media(MediaEvent::Updated {
            ids: vec![3],
            mask: UPDATE_AUDIO,
        })
        .unwrap();

        assert_eq!(
            discovery.recv().await.unwrap(),
            DiscoveryEvent::WorkingChanged { working: true }
        );
        assert_eq!(
            media.recv().await.unwrap(),
            MediaEvent::Updated {
                ids: vec![3],
                mask: UPDATE_AUDIO,
            }
        );
        assert!(media.try_recv().is_err());
        assert!(discovery.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe_media();

        for id in 0..5 {
            bus.emit_media(MediaEvent::Deleted { ids: vec![id] }).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn test_subscriber_counts() {
        let bus = EventBus::default();
        assert_eq!(bus.media_subscriber_count(), 0);
        assert_eq!(bus.discovery_subscriber_count(), 0);

        let _m = bus.subscribe_media();
        let _d1 = bus.subscribe_discovery();
        let _d2 = bus.subscribe_discovery();
        assert_eq!(bus.media_subscriber_count(), 1);
        assert_eq!(bus.discovery_subscriber_count(), 2);
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = DiscoveryEvent::Progress {
            session: "scan-1".to_string(),
            entry_point: "/media/videos".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("scan-1"));

        let back: DiscoveryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_mask_bits_are_distinct() {
        let all = [
            UPDATE_AUDIO,
            UPDATE_AUDIO_EMPTY,
            UPDATE_VIDEO,
            ADDED_AUDIO,
            ADDED_AUDIO_EMPTY,
            ADDED_VIDEO,
            ADDED_TRANSPORT_FILE,
        ];
        let mut seen = 0u32;
        for bit in all {
            assert_eq!(seen & bit, 0, "mask bits must not overlap");
            seen |= bit;
        }
    }

    #[test]
    fn test_event_ids_accessor() {
        let event = MediaEvent::Deleted { ids: vec![1, 2, 3] };
        assert_eq!(event.ids(), &[1, 2, 3]);
        assert_eq!(event.description(), "Entities removed from catalog");
    }
}
