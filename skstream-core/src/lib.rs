//! # skstream Core
//!
//! Platform-independent processing of a Signal K delta stream for a
//! chart plotter.
//!
//! This crate contains the pure state logic with **zero I/O dependencies**:
//! no sockets, no timers, no clock reads. Every operation that depends on
//! time takes `now` as an argument, so the same code runs under a tokio
//! worker, in tests with a fake clock, or anywhere else.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  skstream-core (no tokio/async deps)                          │
//! │  ├── delta/        (stream message model, lenient decoding)   │
//! │  ├── store/        (typed entity records per group)           │
//! │  ├── interpreter/  (path -> field dispatch tables)            │
//! │  ├── liveness/     (updated / stale / expired tagging)        │
//! │  ├── filter/       (group enable, state, spatial extent)      │
//! │  ├── course/       (navigation data reconstruction)           │
//! │  └── processor/    (session object tying it all together)     │
//! └───────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 ┌────────────┴────────────┐
//!                 │  skstream-worker        │
//!                 │  (timers, websocket,    │
//!                 │   track fetch, CLI)     │
//!                 └─────────────────────────┘
//! ```
//!
//! ## Key Modules
//!
//! - [`processor`] - The [`StreamProcessor`] session: apply deltas, emit snapshots
//! - [`interpreter`] - Maps a dotted path + value onto a typed entity field
//! - [`liveness`] - Per-cycle liveness tags and the age sweep
//! - [`filter`] - Group, lifecycle-state and spatial filtering
//! - [`course`] - Course API reconstruction into [`NavData`]
//! - [`notify`] - Classification of `notifications.*` paths
//!
//! ## Example: Processing a Delta
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use skstream_core::{Delta, StreamProcessor, StreamSettings};
//!
//! let now = Utc.timestamp_millis_opt(0).unwrap();
//! let mut processor = StreamProcessor::new(StreamSettings::default(), now);
//!
//! let delta = Delta::from_value(&json!({
//!     "context": "vessels.urn:mrn:imo:mmsi:123456789",
//!     "updates": [{ "values": [
//!         { "path": "navigation.position", "value": { "longitude": 10.0, "latitude": 20.0 } }
//!     ]}]
//! }));
//! processor.process_delta(&delta, now);
//!
//! let message = processor.emit(now);
//! assert_eq!(message.result.store.ais_targets.len(), 1);
//! ```

pub mod course;
pub mod delta;
pub mod entity;
pub mod error;
pub mod filter;
pub mod geo;
pub mod interpreter;
pub mod liveness;
pub mod mode;
pub mod notify;
pub mod processor;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod units;

// Re-export commonly used types
pub use course::{CourseReconstructor, NavData, Route, RouteLookup};
pub use delta::{Delta, PathValue, StreamMessage, Update};
pub use entity::{Aircraft, AtoN, SarBeacon, Target, TargetBase, Track, Vessel};
pub use error::StreamError;
pub use filter::{FilterConfig, GroupFilter, TargetFilter};
pub use geo::{Extent, Position};
pub use liveness::{AisStatus, Liveness, LivenessTags, TargetAges};
pub use mode::{PlaybackOptions, StreamMode};
pub use notify::{Notification, NotificationData};
pub use processor::StreamProcessor;
pub use settings::{SettingsOptions, StreamSettings};
pub use snapshot::{Snapshot, UpdateMessage};
pub use store::{EntityStore, Group};
