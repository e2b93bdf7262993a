//! Plain data structs for every entity in the store (§3), plus the closed
//! enumerations they reference. These mirror the teacher's flat `models.rs`
//! convention, split one-file-per-entity because there are many more
//! entities here than in the teacher's chat schema.

pub mod classification;
pub mod content;
pub mod draft;
pub mod entity;
pub mod enums;
pub mod gem;
pub mod message;
pub mod metadata;
pub mod profile;
pub mod run;
pub mod segment;
pub mod sync_state;
pub mod thread;

pub use classification::{AiClassification, ClassificationOverride};
pub use content::ParsedContent;
pub use draft::EngagementDraft;
pub use entity::ExtractedEntity;
pub use gem::{Gem, GemExplanation, GemSignal};
pub use message::{Attachment, Message};
pub use metadata::{ParsedMetadata, SenderTemporal};
pub use profile::{KnownContact, RelationshipSource, SenderProfile, SenderRelationship};
pub use run::{AiAuditEntry, PipelineRun};
pub use segment::SenderSegment;
pub use sync_state::SyncState;
pub use thread::Thread;
