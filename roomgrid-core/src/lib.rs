//! `RoomGrid` core - participant visibility and stream resolution
//!
//! This crate holds the decision logic behind a video-conferencing grid.
//! Rendering, the HTTP client and the media transport stay outside; they
//! plug in through traits.
//!
//! ## Architecture
//!
//! - **`StreamResolver`**: maps a participant to a media stream through
//!   layered key heuristics
//! - **`compute_visibility`**: selects and labels the participants a viewer
//!   sees, hiding departed and locally removed ones
//! - **`ActionCoordinator`**: confirm-then-apply remove/promote/demote with
//!   optimistic suppression
//! - **`PinnedSet`**: FIFO-bounded pins
//! - **`SessionEventBus`**: session-scoped notifications
//! - **`GridSession`**: ties the above together for one viewer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roomgrid_core::{GridConfig, GridSession, ParticipantAction, Viewer};
//!
//! let session = GridSession::new(Viewer::host("1"), api, &GridConfig::default());
//! session.apply_roster(roster);
//! let grid = session.visible();
//!
//! session.request_action(ParticipantAction::Remove, &user_id)?;
//! session.confirm_action(&user_id).await?;
//! ```

pub mod actions;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod participant;
pub mod pinned;
pub mod resolver;
pub mod session;
pub mod stream;
pub mod suppression;
pub mod types;
pub mod visibility;

pub use actions::{
    ActionCoordinator, ActionOutcome, ActionState, ApiResponse, ParticipantAction, ParticipantApi,
    PendingAction, PromoteRequest, RemoveParticipantRequest,
};
pub use config::{Config, GridConfig, LoggingConfig};
pub use error::{Error, Result};
pub use events::{SessionEvent, SessionEventBus};
pub use participant::{load_roster, parse_roster, Participant, ParticipantStatus};
pub use pinned::{PinChange, PinnedSet};
pub use resolver::{Resolution, ResolutionPath, ResolverRules, StreamResolver};
pub use session::GridSession;
pub use stream::{
    load_registry, MediaStream, MediaTrack, PublicationAdapter, StreamAdapter, StreamHandle,
    StreamRegistry, TrackKind, TrackPublication, TrackState,
};
pub use suppression::{Suppression, SuppressionSet, MAX_SUPPRESSION_TTL};
pub use types::UserId;
pub use visibility::{compute_visibility, EmptyState, LabelType, Viewer, VisibilityDecision};
