//! Domain model types shared across RDR services
//!
//! Code tables are closed enumerations: every parse goes through an explicit
//! match with an "unrecognized" arm that surfaces a validation error instead
//! of passing unknown codes through.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lifecycle state of a deceased report
///
/// A report is created PENDING (or APPROVED directly for unpaired
/// participants) and transitions exactly once via review to APPROVED or
/// DENIED. Both review outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Pending,
    Approved,
    Denied,
}

impl ReportStatus {
    /// Storage code
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "PENDING",
            ReportStatus::Approved => "APPROVED",
            ReportStatus::Denied => "DENIED",
        }
    }

    /// Parse a storage code
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "PENDING" => Ok(ReportStatus::Pending),
            "APPROVED" => Ok(ReportStatus::Approved),
            "DENIED" => Ok(ReportStatus::Denied),
            other => Err(Error::Internal(format!("Unrecognized report status: {}", other))),
        }
    }

    /// External (client) vocabulary for this status
    pub fn to_client(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "preliminary",
            ReportStatus::Approved => "final",
            ReportStatus::Denied => "cancelled",
        }
    }

    /// Parse the external (client) vocabulary
    pub fn from_client(value: &str) -> Result<Self> {
        match value {
            "preliminary" => Ok(ReportStatus::Pending),
            "final" => Ok(ReportStatus::Approved),
            "cancelled" => Ok(ReportStatus::Denied),
            other => Err(Error::InvalidInput(format!("Unrecognized status: {}", other))),
        }
    }
}

/// How a deceased report originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeceasedNotification {
    /// Derived from electronic health records
    Ehr,
    /// Staff attempted to contact the participant
    AttemptedContact,
    /// Next of kin notified the awardee organization
    NextKinHpo,
    /// Next of kin notified the support desk
    NextKinSupport,
    /// Anything else; requires a free-text description
    Other,
}

impl DeceasedNotification {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeceasedNotification::Ehr => "EHR",
            DeceasedNotification::AttemptedContact => "ATTEMPTED_CONTACT",
            DeceasedNotification::NextKinHpo => "NEXT_KIN_HPO",
            DeceasedNotification::NextKinSupport => "NEXT_KIN_SUPPORT",
            DeceasedNotification::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "EHR" => Ok(DeceasedNotification::Ehr),
            "ATTEMPTED_CONTACT" => Ok(DeceasedNotification::AttemptedContact),
            "NEXT_KIN_HPO" => Ok(DeceasedNotification::NextKinHpo),
            "NEXT_KIN_SUPPORT" => Ok(DeceasedNotification::NextKinSupport),
            "OTHER" => Ok(DeceasedNotification::Other),
            other => Err(Error::InvalidInput(format!(
                "Unrecognized notification code: {}",
                other
            ))),
        }
    }

    /// Whether this notification category requires a structured reporter block
    /// (name and relationship mandatory, email and phone optional).
    pub fn requires_reporter(&self) -> bool {
        matches!(
            self,
            DeceasedNotification::AttemptedContact
                | DeceasedNotification::NextKinHpo
                | DeceasedNotification::NextKinSupport
        )
    }
}

/// Why a pending report was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    IncorrectParticipant,
    MarkedInError,
    InsufficientInformation,
    Other,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::IncorrectParticipant => "INCORRECT_PARTICIPANT",
            DenialReason::MarkedInError => "MARKED_IN_ERROR",
            DenialReason::InsufficientInformation => "INSUFFICIENT_INFORMATION",
            DenialReason::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "INCORRECT_PARTICIPANT" => Ok(DenialReason::IncorrectParticipant),
            "MARKED_IN_ERROR" => Ok(DenialReason::MarkedInError),
            "INSUFFICIENT_INFORMATION" => Ok(DenialReason::InsufficientInformation),
            "OTHER" => Ok(DenialReason::Other),
            other => Err(Error::InvalidInput(format!(
                "Unrecognized denial reason: {}",
                other
            ))),
        }
    }
}

/// Reporter-to-participant relationship
///
/// The external survey system encodes these as small integers (1-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReporterRelationship {
    Parent,
    Child,
    Sibling,
    Spouse,
    Other,
}

impl ReporterRelationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReporterRelationship::Parent => "PARENT",
            ReporterRelationship::Child => "CHILD",
            ReporterRelationship::Sibling => "SIBLING",
            ReporterRelationship::Spouse => "SPOUSE",
            ReporterRelationship::Other => "OTHER",
        }
    }

    /// Map the survey system's integer relationship code
    pub fn from_survey_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(ReporterRelationship::Parent),
            2 => Ok(ReporterRelationship::Child),
            3 => Ok(ReporterRelationship::Sibling),
            4 => Ok(ReporterRelationship::Spouse),
            5 => Ok(ReporterRelationship::Other),
            other => Err(Error::InvalidInput(format!(
                "Unrecognized relationship code: {}",
                other
            ))),
        }
    }
}

/// Deceased status projected onto the participant summary read-model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeceasedStatus {
    Unset,
    Pending,
    Approved,
}

impl DeceasedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeceasedStatus::Unset => "UNSET",
            DeceasedStatus::Pending => "PENDING",
            DeceasedStatus::Approved => "APPROVED",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "UNSET" => Ok(DeceasedStatus::Unset),
            "PENDING" => Ok(DeceasedStatus::Pending),
            "APPROVED" => Ok(DeceasedStatus::Approved),
            other => Err(Error::Internal(format!("Unrecognized deceased status: {}", other))),
        }
    }
}

/// An API identity: (system, username), unique together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiUser {
    pub id: i64,
    pub system: String,
    pub username: String,
}

/// A participant, paired to an awardee organization or unpaired (NULL)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub participant_id: i64,
    pub organization_external_id: Option<String>,
}

/// A deceased participant report
#[derive(Debug, Clone, PartialEq)]
pub struct DeceasedReport {
    pub id: i64,
    pub participant_id: i64,
    pub status: ReportStatus,
    pub notification: DeceasedNotification,
    pub notification_other: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_relationship: Option<String>,
    pub reporter_email: Option<String>,
    pub reporter_phone: Option<String>,
    pub author_id: i64,
    pub authored: DateTime<Utc>,
    pub reviewer_id: Option<i64>,
    pub reviewed: Option<DateTime<Utc>>,
    pub date_of_death: Option<NaiveDate>,
    pub cause_of_death: Option<String>,
    pub denial_reason: Option<DenialReason>,
    pub denial_reason_other: Option<String>,
}

/// Denormalized participant summary row (read-model)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantSummary {
    pub participant_id: i64,
    pub deceased_status: DeceasedStatus,
    pub deceased_authored: Option<DateTime<Utc>>,
    pub date_of_death: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub recontact_method: Option<String>,
}
