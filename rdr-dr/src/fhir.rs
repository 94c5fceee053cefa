//! FHIR-style observation envelope for deceased reports
//!
//! The client wire format is an Observation-shaped JSON document tagged
//! `code.text = "DeceasedReport"`. Status uses the external vocabulary
//! (preliminary/final/cancelled); notification and denial reasons travel as
//! reference codes with a human-readable display only for the OTHER case;
//! reporter details nest in a single extension block keyed by fixed URLs.

use chrono::{DateTime, NaiveDate, Utc};
use rdr_common::db::models::{
    ApiUser, DeceasedNotification, DeceasedReport, DenialReason, ReportStatus,
};
use rdr_common::{time, Error, Result};
use serde::{Deserialize, Serialize};

/// Required tag in `code.text`
pub const OBSERVATION_CODE: &str = "DeceasedReport";

/// Extension URL carrying the reporter block
pub const EXT_REPORTER: &str =
    "https://rdr-platform.org/fhir/StructureDefinition/deceased-reporter";
/// Nested extension URL: reporter-to-participant relationship code
pub const EXT_REPORTER_RELATIONSHIP: &str =
    "https://rdr-platform.org/fhir/StructureDefinition/deceased-reporter-relationship";
/// Nested extension URL: reporter email
pub const EXT_REPORTER_EMAIL: &str =
    "https://rdr-platform.org/fhir/StructureDefinition/deceased-reporter-email";
/// Nested extension URL: reporter phone
pub const EXT_REPORTER_PHONE: &str =
    "https://rdr-platform.org/fhir/StructureDefinition/deceased-reporter-phone";
/// Extension URL carrying the denial reason reference
pub const EXT_DENIAL_REASON: &str =
    "https://rdr-platform.org/fhir/StructureDefinition/denial-reason";

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservationPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub performer: Vec<Performer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Identifier {
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeText {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Performer {
    #[serde(rename = "type")]
    pub system: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Extension {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_human_name: Option<HumanName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanName {
    pub text: String,
}

// ── Parsed submission types ─────────────────────────────────────────────────

/// A validated report creation request, ready for the lifecycle engine
#[derive(Debug, Clone)]
pub struct ReportSubmission {
    pub notification: DeceasedNotification,
    pub notification_other: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_relationship: Option<String>,
    pub reporter_email: Option<String>,
    pub reporter_phone: Option<String>,
    pub author_system: String,
    pub author_username: String,
    pub authored: DateTime<Utc>,
    pub date_of_death: Option<NaiveDate>,
    pub cause_of_death: Option<String>,
}

/// A validated review request (approve or deny)
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub status: ReportStatus,
    pub reviewer_system: String,
    pub reviewer_username: String,
    pub reviewed: DateTime<Utc>,
    pub date_of_death: Option<NaiveDate>,
    pub denial_reason: Option<DenialReason>,
    pub denial_reason_other: Option<String>,
}

// ── Parsing ─────────────────────────────────────────────────────────────────

fn deserialize_payload(value: &serde_json::Value) -> Result<ObservationPayload> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::InvalidInput(format!("Malformed observation: {}", e)))
}

fn require_performer(payload: &ObservationPayload) -> Result<(String, String)> {
    let performer = payload
        .performer
        .first()
        .ok_or_else(|| Error::InvalidInput("Missing performer".to_string()))?;
    if performer.system.is_empty() || performer.reference.is_empty() {
        return Err(Error::InvalidInput(
            "Performer requires type and reference".to_string(),
        ));
    }
    Ok((performer.system.clone(), performer.reference.clone()))
}

fn require_issued(payload: &ObservationPayload) -> Result<DateTime<Utc>> {
    let issued = payload
        .issued
        .as_deref()
        .ok_or_else(|| Error::InvalidInput("Missing issued timestamp".to_string()))?;
    time::parse_client_timestamp(issued)
}

fn parse_effective_date(payload: &ObservationPayload) -> Result<Option<NaiveDate>> {
    payload
        .effective_date_time
        .as_deref()
        .map(time::parse_client_date)
        .transpose()
}

fn require_code_tag(payload: &ObservationPayload) -> Result<()> {
    match &payload.code {
        Some(code) if code.text == OBSERVATION_CODE => Ok(()),
        _ => Err(Error::InvalidInput(format!(
            "code.text must be \"{}\"",
            OBSERVATION_CODE
        ))),
    }
}

/// Parse and validate a report creation request
///
/// Validation order: status literal, notification code, reporter block,
/// performer, issued timestamp.
pub fn parse_submission(value: &serde_json::Value) -> Result<ReportSubmission> {
    let payload = deserialize_payload(value)?;
    require_code_tag(&payload)?;

    // Creation must be submitted as "preliminary"
    let status = payload
        .status
        .as_deref()
        .ok_or_else(|| Error::InvalidInput("Missing status".to_string()))?;
    if ReportStatus::from_client(status)? != ReportStatus::Pending {
        return Err(Error::InvalidInput(format!(
            "Status must be \"preliminary\" for creation, got \"{}\"",
            status
        )));
    }

    // Notification descriptor
    let encounter = payload
        .encounter
        .as_ref()
        .ok_or_else(|| Error::InvalidInput("Missing encounter".to_string()))?;
    let code = encounter
        .reference
        .as_deref()
        .ok_or_else(|| Error::InvalidInput("Missing encounter.reference".to_string()))?;
    let notification = DeceasedNotification::parse(code)?;

    let notification_other = if notification == DeceasedNotification::Other {
        let display = encounter.display.clone().filter(|d| !d.is_empty());
        Some(display.ok_or_else(|| {
            Error::InvalidInput("Notification OTHER requires encounter.display".to_string())
        })?)
    } else {
        None
    };

    // Reporter block, mandatory for the kin/support/attempted-contact categories
    let mut reporter_name = None;
    let mut reporter_relationship = None;
    let mut reporter_email = None;
    let mut reporter_phone = None;
    if notification.requires_reporter() {
        let block = payload
            .extension
            .iter()
            .find(|ext| ext.url == EXT_REPORTER)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Notification {} requires a reporter extension",
                    notification.as_str()
                ))
            })?;

        reporter_name = block
            .value_human_name
            .as_ref()
            .map(|name| name.text.clone())
            .filter(|text| !text.is_empty());
        if reporter_name.is_none() {
            return Err(Error::InvalidInput("Missing reporter name".to_string()));
        }

        for nested in &block.extension {
            match nested.url.as_str() {
                EXT_REPORTER_RELATIONSHIP => reporter_relationship = nested.value_code.clone(),
                EXT_REPORTER_EMAIL => reporter_email = nested.value_string.clone(),
                EXT_REPORTER_PHONE => reporter_phone = nested.value_string.clone(),
                _ => {}
            }
        }
        if reporter_relationship.is_none() {
            return Err(Error::InvalidInput(
                "Missing reporter relationship".to_string(),
            ));
        }
    }

    let (author_system, author_username) = require_performer(&payload)?;
    let authored = require_issued(&payload)?;
    let date_of_death = parse_effective_date(&payload)?;

    Ok(ReportSubmission {
        notification,
        notification_other,
        reporter_name,
        reporter_relationship,
        reporter_email,
        reporter_phone,
        author_system,
        author_username,
        authored,
        date_of_death,
        cause_of_death: None,
    })
}

/// Parse and validate a review request
///
/// The review body carries the same envelope as a creation request, so the
/// `code.text` tag is required here too.
pub fn parse_review(value: &serde_json::Value) -> Result<ReviewDecision> {
    let payload = deserialize_payload(value)?;
    require_code_tag(&payload)?;

    let status_literal = payload
        .status
        .as_deref()
        .ok_or_else(|| Error::InvalidInput("Missing status".to_string()))?;
    let status = ReportStatus::from_client(status_literal)?;
    if status == ReportStatus::Pending {
        return Err(Error::InvalidInput(
            "Review status must be \"final\" or \"cancelled\"".to_string(),
        ));
    }

    let (reviewer_system, reviewer_username) = require_performer(&payload)?;
    let reviewed = require_issued(&payload)?;
    let date_of_death = parse_effective_date(&payload)?;

    let mut denial_reason = None;
    let mut denial_reason_other = None;
    if status == ReportStatus::Denied {
        let reference = payload
            .extension
            .iter()
            .find_map(|ext| ext.value_reference.as_ref())
            .ok_or_else(|| {
                Error::InvalidInput("Denial requires a denial reason reference".to_string())
            })?;
        let code = reference
            .reference
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("Missing denial reason code".to_string()))?;
        let reason = DenialReason::parse(code)?;
        if reason == DenialReason::Other {
            let display = reference.display.clone().filter(|d| !d.is_empty());
            denial_reason_other = Some(display.ok_or_else(|| {
                Error::InvalidInput("Denial reason OTHER requires a description".to_string())
            })?);
        }
        denial_reason = Some(reason);
    }

    Ok(ReviewDecision {
        status,
        reviewer_system,
        reviewer_username,
        reviewed,
        date_of_death,
        denial_reason,
        denial_reason_other,
    })
}

// ── Serialization ───────────────────────────────────────────────────────────

/// Serialize a report to the client wire format
pub fn to_client_json(
    report: &DeceasedReport,
    author: &ApiUser,
    reviewer: Option<&ApiUser>,
) -> serde_json::Value {
    let mut extension = Vec::new();

    if report.notification.requires_reporter() {
        let mut nested = Vec::new();
        if let Some(relationship) = &report.reporter_relationship {
            nested.push(Extension {
                url: EXT_REPORTER_RELATIONSHIP.to_string(),
                value_code: Some(relationship.clone()),
                ..Default::default()
            });
        }
        if let Some(email) = &report.reporter_email {
            nested.push(Extension {
                url: EXT_REPORTER_EMAIL.to_string(),
                value_string: Some(email.clone()),
                ..Default::default()
            });
        }
        if let Some(phone) = &report.reporter_phone {
            nested.push(Extension {
                url: EXT_REPORTER_PHONE.to_string(),
                value_string: Some(phone.clone()),
                ..Default::default()
            });
        }
        extension.push(Extension {
            url: EXT_REPORTER.to_string(),
            value_human_name: report
                .reporter_name
                .as_ref()
                .map(|text| HumanName { text: text.clone() }),
            extension: nested,
            ..Default::default()
        });
    }

    if let Some(reason) = report.denial_reason {
        extension.push(Extension {
            url: EXT_DENIAL_REASON.to_string(),
            value_reference: Some(Reference {
                reference: Some(reason.as_str().to_string()),
                // Display only carries the free-text description for OTHER
                display: report.denial_reason_other.clone(),
            }),
            ..Default::default()
        });
    }

    let mut performer = vec![Performer {
        system: author.system.clone(),
        reference: author.username.clone(),
    }];
    if let Some(reviewer) = reviewer {
        performer.push(Performer {
            system: reviewer.system.clone(),
            reference: reviewer.username.clone(),
        });
    }

    let payload = ObservationPayload {
        identifier: Some(Identifier {
            value: report.id.to_string(),
        }),
        code: Some(CodeText {
            text: OBSERVATION_CODE.to_string(),
        }),
        status: Some(report.status.to_client().to_string()),
        subject: Some(Reference {
            reference: Some(format!("Participant/{}", report.participant_id)),
            display: None,
        }),
        encounter: Some(Reference {
            reference: Some(report.notification.as_str().to_string()),
            display: report.notification_other.clone(),
        }),
        extension,
        performer,
        issued: Some(time::format_timestamp(report.authored)),
        effective_date_time: report.date_of_death.map(|d| d.to_string()),
    };

    serde_json::to_value(payload).expect("observation payload serializes")
}
