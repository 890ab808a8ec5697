use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::blob::{content_type, document_path, BlobError, BlobStore};
use super::catalog::{CatalogError, RequirementCatalog, RequirementType};
use super::domain::{
    CaseFolder, CaseRuleViolation, DocumentId, DocumentState, DocumentVersion, FinalOutcome,
    FolderState, FolderSummary, Requirement, RequirementId, UploadStatus,
};
use super::notify::{NotificationAck, NotificationKind, Notifier};
use super::repository::CaseRepository;
use super::versioning::{self, UploadBlock};
use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::workflows::directory::service::repository_kind;
use crate::workflows::directory::{Applicant, ApplicantId, DirectoryRepository};
use crate::workflows::persistence::{Constraint, RepositoryError, Sequence};
use crate::workflows::scheduling::{AppointmentId, AppointmentRepository};

static REQUIREMENT_SEQUENCE: Sequence = Sequence::new("req");
static DOCUMENT_SEQUENCE: Sequence = Sequence::new("doc");

const MAX_FOLDER_SYNC_ATTEMPTS: usize = 3;

/// Result of an approve/reject action.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub version: DocumentVersion,
    pub requirement: Requirement,
    pub folder_state: FolderState,
    pub notification: Option<NotificationAck>,
    /// Set when the review was stored but the applicant could not be notified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_error: Option<String>,
}

/// Requirement assignment, document versioning, review and folder disposition.
pub struct CaseworkService<S, K, B, N> {
    store: Arc<S>,
    catalog: Arc<K>,
    blobs: Arc<B>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<S, K, B, N> CaseworkService<S, K, B, N>
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        catalog: Arc<K>,
        blobs: Arc<B>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            blobs,
            notifier,
            clock,
        }
    }

    /// Creates the catalog requirements for the applicant's visa type during their appointment.
    /// Codes the applicant already holds are skipped; returns only the new requirements.
    pub fn assign_from_catalog(
        &self,
        applicant_id: &ApplicantId,
        appointment_id: &AppointmentId,
    ) -> Result<Vec<Requirement>, CaseworkError> {
        let applicant = self.applicant(applicant_id)?;
        let visa = applicant
            .visa_type
            .clone()
            .ok_or_else(|| CaseRuleViolation::MissingVisaType(applicant.id.clone()))?;

        let appointment = self
            .store
            .fetch_appointment(appointment_id)?
            .filter(|appointment| appointment.applicant == applicant.id && appointment.is_pending())
            .ok_or_else(|| CaseRuleViolation::NoPendingAppointment(applicant.id.clone()))?;
        let scheduled = self.clock.local_date(appointment.start);
        if scheduled != self.clock.today() {
            return Err(CaseRuleViolation::NotAppointmentDay { scheduled }.into());
        }

        self.ensure_folder_mutable(&applicant.id)?;
        let codes = self.catalog.requirements_for(&visa)?;
        let existing = self.store.requirements_for_applicant(&applicant.id)?;

        let mut created = Vec::new();
        for code in codes {
            if existing.iter().any(|requirement| requirement.code == code) {
                continue;
            }
            match self.create_requirement(&applicant.id, &code) {
                Ok(requirement) => created.push(requirement),
                Err(CaseworkError::Repository(RepositoryError::Conflict(
                    Constraint::RequirementPerApplicant,
                ))) => {
                    warn!(applicant = %applicant.id, code = %code, "requirement assigned concurrently");
                }
                Err(err) => return Err(err),
            }
        }

        self.sync_folder(&applicant.id)?;
        info!(
            applicant = %applicant.id,
            visa = %visa,
            assigned = created.len(),
            "catalog requirements assigned"
        );
        Ok(created)
    }

    /// Ad-hoc requirement outside the visa type's catalog list.
    pub fn add_requirement(
        &self,
        applicant_id: &ApplicantId,
        code: &str,
    ) -> Result<Requirement, CaseworkError> {
        let applicant = self.applicant(applicant_id)?;
        self.ensure_folder_mutable(&applicant.id)?;

        let requirement = match self.create_requirement(&applicant.id, code) {
            Err(CaseworkError::Repository(RepositoryError::Conflict(
                Constraint::RequirementPerApplicant,
            ))) => {
                return Err(CaseRuleViolation::RequirementAlreadyAssigned(code.to_string()).into())
            }
            other => other?,
        };

        self.sync_folder(&applicant.id)?;
        info!(applicant = %applicant.id, requirement = %requirement.id, code = %requirement.code, "requirement added");
        Ok(requirement)
    }

    pub fn remove_requirement(&self, id: &RequirementId) -> Result<Requirement, CaseworkError> {
        let requirement = self.requirement(id)?;
        self.ensure_folder_mutable(&requirement.applicant)?;
        if !self.store.versions(id)?.is_empty() {
            return Err(CaseRuleViolation::RequirementHasVersions(requirement.name).into());
        }

        let removed = match self.store.delete_requirement(id) {
            Err(RepositoryError::Conflict(Constraint::RequirementInUse)) => {
                return Err(CaseRuleViolation::RequirementHasVersions(requirement.name).into())
            }
            other => other?,
        };
        self.sync_folder(&removed.applicant)?;
        info!(requirement = %removed.id, applicant = %removed.applicant, "requirement removed");
        Ok(removed)
    }

    /// Stores the content and records the next version, pending review.
    pub fn upload(
        &self,
        requirement_id: &RequirementId,
        original_name: &str,
        content: &[u8],
    ) -> Result<DocumentVersion, CaseworkError> {
        let original_name = original_name.trim();
        if original_name.is_empty() {
            return Err(CaseworkError::MissingField("filename"));
        }

        let mut requirement = self.requirement(requirement_id)?;
        self.ensure_folder_mutable(&requirement.applicant)?;
        let latest = self.store.latest_version(&requirement.id)?;
        let number = versioning::next_version(&requirement, latest.as_ref())?;

        let applicant = self.applicant(&requirement.applicant)?;
        let visa = applicant
            .visa_type
            .as_deref()
            .ok_or_else(|| CaseRuleViolation::MissingVisaType(applicant.id.clone()))?;
        let id = DocumentId(DOCUMENT_SEQUENCE.next());
        let path = document_path(
            applicant.storage_owner(),
            visa,
            &requirement.name,
            number,
            &id.0,
            original_name,
        );

        let blob = self.blobs.put(&path, content)?;
        let version = DocumentVersion {
            id,
            requirement: requirement.id.clone(),
            version: number,
            state: DocumentState::PendingReview,
            blob: blob.clone(),
            original_name: original_name.to_string(),
            content_type: content_type(original_name),
            observations: None,
            uploaded_at: self.clock.now(),
            reviewed_at: None,
        };
        versioning::apply_upload(&mut requirement);

        match self.store.commit_upload(requirement, version) {
            Ok(stored) => {
                info!(
                    requirement = %stored.requirement,
                    version = stored.version,
                    blob = %stored.blob,
                    bytes = content.len(),
                    "document uploaded"
                );
                Ok(stored)
            }
            Err(err) => {
                if let Err(cleanup) = self.blobs.delete(&blob.0) {
                    warn!(blob = %blob, error = %cleanup, "orphaned blob could not be removed");
                }
                Err(err.into())
            }
        }
    }

    pub fn approve(&self, document_id: &DocumentId) -> Result<ReviewOutcome, CaseworkError> {
        let (mut version, mut requirement) = self.reviewable(document_id)?;
        versioning::approve(&mut version, &mut requirement, self.clock.now())?;
        self.finish_review(version, requirement, NotificationKind::Approval)
    }

    /// Sends the version back to the applicant with `reason`; uploads reopen.
    pub fn reject(
        &self,
        document_id: &DocumentId,
        reason: &str,
    ) -> Result<ReviewOutcome, CaseworkError> {
        let (mut version, mut requirement) = self.reviewable(document_id)?;
        versioning::reject(&mut version, &mut requirement, reason, self.clock.now())?;
        self.finish_review(version, requirement, NotificationKind::Rejection)
    }

    /// Requirement types a visa type demands, in catalog order.
    pub fn visa_requirements(&self, visa_code: &str) -> Result<Vec<RequirementType>, CaseworkError> {
        let codes = self.catalog.requirements_for(visa_code)?;
        codes
            .iter()
            .map(|code| {
                self.catalog
                    .requirement_type(code)
                    .ok_or_else(|| CaseworkError::from(CatalogError::UnknownRequirementType(code.clone())))
            })
            .collect()
    }

    pub fn progress(&self, applicant: &ApplicantId) -> Result<u8, CaseworkError> {
        Ok(super::folder::progress(&self.requirements(applicant)?))
    }

    pub fn folder(&self, applicant: &ApplicantId) -> Result<CaseFolder, CaseworkError> {
        self.store
            .fetch_folder(applicant)?
            .ok_or_else(|| CaseworkError::not_found("case folder", &applicant.0))
    }

    pub fn folder_summary(&self, applicant: &ApplicantId) -> Result<FolderSummary, CaseworkError> {
        let folder = self.folder(applicant)?;
        let requirements = self.requirements(applicant)?;
        Ok(folder.summary(&requirements))
    }

    /// Closes an approved folder with the issuing authority's decision.
    pub fn record_final_result(
        &self,
        applicant: &ApplicantId,
        outcome: FinalOutcome,
        reason: Option<&str>,
    ) -> Result<CaseFolder, CaseworkError> {
        let mut folder = self.folder(applicant)?;
        let expected = folder.state;
        folder.record_final_result(outcome, reason, self.clock.now())?;
        self.store.transition_folder(expected, folder.clone())?;
        info!(applicant = %folder.applicant, state = %folder.state, "final result recorded");
        Ok(folder)
    }

    pub fn upload_status(&self, requirement_id: &RequirementId) -> Result<UploadStatus, CaseworkError> {
        let requirement = self.requirement(requirement_id)?;
        let folder = self.store.fetch_folder(&requirement.applicant)?;
        if let Some(Err(violation)) = folder.as_ref().map(CaseFolder::ensure_mutable) {
            return Ok(UploadStatus {
                allowed: false,
                next_version: None,
                reason: violation.to_string(),
            });
        }
        let latest = self.store.latest_version(&requirement.id)?;
        Ok(versioning::upload_status(&requirement, latest.as_ref()))
    }

    pub fn requirements(&self, applicant: &ApplicantId) -> Result<Vec<Requirement>, CaseworkError> {
        Ok(self.store.requirements_for_applicant(applicant)?)
    }

    pub fn requirement(&self, id: &RequirementId) -> Result<Requirement, CaseworkError> {
        self.store
            .fetch_requirement(id)?
            .ok_or_else(|| CaseworkError::not_found("requirement", &id.0))
    }

    pub fn versions(&self, requirement: &RequirementId) -> Result<Vec<DocumentVersion>, CaseworkError> {
        self.requirement(requirement)?;
        Ok(self.store.versions(requirement)?)
    }

    /// Version metadata plus the stored bytes.
    pub fn read_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<(DocumentVersion, Vec<u8>), CaseworkError> {
        let version = self.version(document_id)?;
        let bytes = self.blobs.get(&version.blob)?;
        Ok((version, bytes))
    }

    fn applicant(&self, id: &ApplicantId) -> Result<Applicant, CaseworkError> {
        self.store
            .fetch_applicant(id)?
            .ok_or_else(|| CaseworkError::not_found("applicant", &id.0))
    }

    fn version(&self, id: &DocumentId) -> Result<DocumentVersion, CaseworkError> {
        self.store
            .fetch_version(id)?
            .ok_or_else(|| CaseworkError::not_found("document", &id.0))
    }

    fn reviewable(
        &self,
        document_id: &DocumentId,
    ) -> Result<(DocumentVersion, Requirement), CaseworkError> {
        let version = self.version(document_id)?;
        let requirement = self.requirement(&version.requirement)?;
        self.ensure_folder_mutable(&requirement.applicant)?;
        Ok((version, requirement))
    }

    fn finish_review(
        &self,
        version: DocumentVersion,
        requirement: Requirement,
        kind: NotificationKind,
    ) -> Result<ReviewOutcome, CaseworkError> {
        self.store
            .commit_review(version.clone(), requirement.clone())?;
        let folder_state = self.sync_folder(&requirement.applicant)?;
        info!(
            document = %version.id,
            requirement = %requirement.id,
            state = %version.state,
            folder = %folder_state,
            "document reviewed"
        );

        let applicant = self.applicant(&requirement.applicant)?;
        let message = match kind {
            NotificationKind::Approval => format!(
                "Your document '{}' (version {}) was approved.",
                requirement.name, version.version
            ),
            NotificationKind::Rejection => format!(
                "Your document '{}' (version {}) was rejected: {}. Please upload a new version.",
                requirement.name,
                version.version,
                version.observations.as_deref().unwrap_or_default()
            ),
        };

        let (notification, notification_error) =
            match self.notifier.notify(applicant.contact(), kind, &message) {
                Ok(ack) => (Some(ack), None),
                Err(err) => {
                    warn!(applicant = %applicant.id, error = %err, "review notification failed");
                    (None, Some(err.to_string()))
                }
            };

        Ok(ReviewOutcome {
            version,
            requirement,
            folder_state,
            notification,
            notification_error,
        })
    }

    fn create_requirement(
        &self,
        applicant: &ApplicantId,
        code: &str,
    ) -> Result<Requirement, CaseworkError> {
        let requirement_type = self
            .catalog
            .requirement_type(code)
            .filter(|requirement| requirement.active)
            .ok_or_else(|| CatalogError::UnknownRequirementType(code.to_string()))?;

        let requirement = Requirement::missing(
            RequirementId(REQUIREMENT_SEQUENCE.next()),
            applicant.clone(),
            requirement_type.code,
            requirement_type.name,
        );
        Ok(self.store.insert_requirement(requirement)?)
    }

    fn ensure_folder_mutable(&self, applicant: &ApplicantId) -> Result<(), CaseworkError> {
        match self.store.fetch_folder(applicant)? {
            Some(folder) => Ok(folder.ensure_mutable()?),
            None => Ok(()),
        }
    }

    /// Opens the folder on first use and realigns open/approved with the requirements.
    /// A closed folder is reported as is.
    fn sync_folder(&self, applicant: &ApplicantId) -> Result<FolderState, CaseworkError> {
        for attempt in 1..=MAX_FOLDER_SYNC_ATTEMPTS {
            let mut folder = self.fetch_or_open_folder(applicant)?;
            let expected = folder.state;
            let requirements = self.store.requirements_for_applicant(applicant)?;
            if !folder.refresh(&requirements) {
                return Ok(folder.state);
            }

            match self.store.transition_folder(expected, folder.clone()) {
                Ok(()) => {
                    info!(
                        applicant = %applicant,
                        state = %folder.state,
                        "case folder state changed"
                    );
                    return Ok(folder.state);
                }
                Err(RepositoryError::Conflict(Constraint::FolderState)) => {
                    warn!(
                        attempt,
                        applicant = %applicant,
                        from = %expected,
                        "case folder moved concurrently"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepositoryError::Conflict(Constraint::FolderState).into())
    }

    fn fetch_or_open_folder(&self, applicant: &ApplicantId) -> Result<CaseFolder, CaseworkError> {
        if let Some(folder) = self.store.fetch_folder(applicant)? {
            return Ok(folder);
        }
        let folder = CaseFolder::open(applicant.clone(), self.clock.now());
        match self.store.insert_folder(folder) {
            Ok(folder) => {
                info!(applicant = %applicant, "case folder opened");
                Ok(folder)
            }
            Err(RepositoryError::Conflict(Constraint::FolderPerApplicant)) => Ok(self
                .store
                .fetch_folder(applicant)?
                .ok_or(RepositoryError::NotFound)?),
            Err(err) => Err(err.into()),
        }
    }
}

/// Error raised by the casework service.
#[derive(Debug, thiserror::Error)]
pub enum CaseworkError {
    #[error(transparent)]
    Rule(#[from] CaseRuleViolation),
    #[error(transparent)]
    UploadNotAllowed(#[from] UploadBlock),
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CaseworkError {
    fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CaseworkError::Rule(_) | CaseworkError::MissingField(_) => ErrorKind::Validation,
            CaseworkError::UploadNotAllowed(_) => ErrorKind::UploadNotAllowed,
            CaseworkError::NotFound { .. } => ErrorKind::NotFound,
            CaseworkError::Catalog(err) => err.kind(),
            CaseworkError::Blob(BlobError::NotFound(_)) => ErrorKind::NotFound,
            CaseworkError::Blob(BlobError::Unavailable(_)) => ErrorKind::Internal,
            CaseworkError::Repository(err) => repository_kind(err),
        }
    }
}
