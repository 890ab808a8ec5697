//! Requirement assignment, document version tracking, review and case folders.
//!
//! Requirements come from the visa type's catalog entry (or ad-hoc additions) on the
//! appointment day. Each requirement carries a gated chain of document versions; agent
//! reviews drive the requirement state, and the case folder aggregates those states into
//! progress and the final disposition.

pub mod blob;
pub mod catalog;
pub mod domain;
pub mod folder;
pub mod notify;
pub mod repository;
pub mod router;
pub mod service;
pub mod versioning;

#[cfg(test)]
mod tests;

pub use blob::{BlobError, BlobRef, BlobStore, InMemoryBlobStore};
pub use catalog::{CatalogError, RequirementCatalog, RequirementType, StaticCatalog, VisaType};
pub use domain::{
    CaseFolder, CaseRuleViolation, DocumentId, DocumentState, DocumentVersion, FinalOutcome,
    FolderState, FolderSummary, Requirement, RequirementId, RequirementState, UploadStatus,
};
pub use notify::{
    Notification, NotificationAck, NotificationKind, Notifier, NotifyError, OutboxNotifier,
};
pub use repository::CaseRepository;
pub use router::casework_router;
pub use service::{CaseworkError, CaseworkService, ReviewOutcome};
pub use versioning::UploadBlock;
