//! Accommodation requests and their state transitions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::error::{AccommodationError, AccommodationResult};
use crate::models::{property::Property, user::Gender};

/// Payment state as recorded by the payment processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = AccommodationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(AccommodationError::Validation(format!(
                "Unknown payment status '{}'",
                other
            ))),
        }
    }
}

/// Administrative state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = AccommodationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(AccommodationError::Validation(format!(
                "Unknown request status '{}'",
                other
            ))),
        }
    }
}

/// Accommodation request entity
///
/// `assigned_property_id` is set exactly when `status` is `Approved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccommodationRequest {
    pub id: i64,
    pub user_id: Uuid,
    pub gender: Gender,
    pub payment_status: PaymentStatus,
    pub assigned_property_id: Option<i64>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub nights: i32,
    pub room_number: Option<String>,
    pub status: RequestStatus,
    pub checked_in: bool,
    pub created_at: DateTime<Utc>,
}

/// A planned status change and the bed it frees, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub release: Option<i64>,
}

impl AccommodationRequest {
    /// The property holding this request's bed
    pub fn held_property(&self) -> Option<i64> {
        match self.status {
            RequestStatus::Approved => self.assigned_property_id,
            _ => None,
        }
    }

    /// Only pending requests may receive a property. Re-assignment goes
    /// through a release first.
    pub fn ensure_assignable(&self) -> AccommodationResult<()> {
        match self.status {
            RequestStatus::Pending => Ok(()),
            RequestStatus::Approved => Err(AccommodationError::InvalidState(format!(
                "Request {} is already assigned; reject or reopen it before reassigning",
                self.id
            ))),
            RequestStatus::Rejected => Err(AccommodationError::InvalidState(format!(
                "Request {} is rejected; reopen it before assigning",
                self.id
            ))),
        }
    }

    /// Plan an administrative status change.
    ///
    /// Approval only happens through assignment. Leaving `Approved` releases
    /// the held bed, and is refused while the participant is checked in.
    pub fn plan_status_change(&self, to: RequestStatus) -> AccommodationResult<StatusChange> {
        let from = self.status;
        if from == to {
            return Ok(StatusChange {
                from,
                to,
                release: None,
            });
        }

        if to == RequestStatus::Approved {
            return Err(AccommodationError::InvalidState(
                "Requests are approved by assigning a property".to_string(),
            ));
        }
        if self.checked_in {
            return Err(AccommodationError::InvalidState(format!(
                "Request {} is checked in; undo the check-in first",
                self.id
            )));
        }

        Ok(StatusChange {
            from,
            to,
            release: self.held_property(),
        })
    }

    /// Validate a check-in flag change against the current state.
    ///
    /// Checking in needs an approved request and happens once. Clearing the
    /// flag is only valid on a checked-in request.
    pub fn ensure_check_in_change(&self, checked_in: bool) -> AccommodationResult<()> {
        match (checked_in, self.checked_in) {
            (true, true) => Err(AccommodationError::Conflict(format!(
                "Request {} is already checked in",
                self.id
            ))),
            (true, false) if self.status != RequestStatus::Approved => {
                Err(AccommodationError::InvalidState(format!(
                    "Request {} has no assigned accommodation yet",
                    self.id
                )))
            }
            (false, false) => Err(AccommodationError::InvalidState(format!(
                "Request {} is not checked in",
                self.id
            ))),
            _ => Ok(()),
        }
    }
}

/// Request joined with its participant and assigned property
#[derive(Debug, Clone, Serialize)]
pub struct RequestEntry {
    #[serde(flatten)]
    pub request: AccommodationRequest,
    pub user_name: String,
    pub participant_id: String,
    pub phone: Option<String>,
    pub property_name: Option<String>,
}

/// Raw booking payload submitted by a participant
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    /// Blank falls back to the gender on the participant's profile
    #[serde(default)]
    pub gender: String,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
}

/// Validated booking
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccommodationRequest {
    pub user_id: Uuid,
    pub gender: Gender,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub nights: i32,
}

impl SubmitRequest {
    /// Fill a blank gender from the participant's profile
    pub fn with_profile_gender(mut self, profile_gender: Option<Gender>) -> Self {
        if self.gender.trim().is_empty() {
            if let Some(gender) = profile_gender {
                self.gender = gender.as_str().to_string();
            }
        }
        self
    }
}

impl NewAccommodationRequest {
    /// Validate a submission. Nights come from the stay dates, or default to
    /// one when no dates are given.
    pub fn from_submission(user_id: Uuid, raw: SubmitRequest) -> AccommodationResult<Self> {
        let gender = raw.gender.parse()?;

        let nights = match (raw.check_in_date, raw.check_out_date) {
            (Some(check_in), Some(check_out)) => {
                let nights = (check_out - check_in).num_days();
                if nights < 1 {
                    return Err(AccommodationError::Validation(
                        "Check-out must be after check-in".to_string(),
                    ));
                }
                i32::try_from(nights).map_err(|_| {
                    AccommodationError::Validation("Stay is too long".to_string())
                })?
            }
            (None, None) => 1,
            _ => {
                return Err(AccommodationError::Validation(
                    "Both check-in and check-out dates are required".to_string(),
                ));
            }
        };

        Ok(Self {
            user_id,
            gender,
            check_in_date: raw.check_in_date,
            check_out_date: raw.check_out_date,
            nights,
        })
    }
}

/// Result of a committed assignment
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub request: AccommodationRequest,
    pub property: Property,
}

/// Normalise an administrator-entered room number; blank clears it
pub fn normalize_room_number(room_number: Option<&str>) -> Option<String> {
    room_number
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: RequestStatus, assigned: Option<i64>) -> AccommodationRequest {
        AccommodationRequest {
            id: 7,
            user_id: Uuid::new_v4(),
            gender: Gender::Female,
            payment_status: PaymentStatus::Paid,
            assigned_property_id: assigned,
            check_in_date: None,
            check_out_date: None,
            nights: 1,
            room_number: None,
            status,
            checked_in: false,
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_only_pending_requests_are_assignable() {
        assert!(request(RequestStatus::Pending, None).ensure_assignable().is_ok());
        assert!(matches!(
            request(RequestStatus::Approved, Some(1)).ensure_assignable(),
            Err(AccommodationError::InvalidState(_))
        ));
        assert!(request(RequestStatus::Rejected, None)
            .ensure_assignable()
            .is_err());
    }

    #[test]
    fn test_rejecting_approved_request_releases_bed() {
        let change = request(RequestStatus::Approved, Some(4))
            .plan_status_change(RequestStatus::Rejected)
            .unwrap();
        assert_eq!(change.release, Some(4));
        assert_eq!(change.to, RequestStatus::Rejected);

        let reopen = request(RequestStatus::Rejected, None)
            .plan_status_change(RequestStatus::Pending)
            .unwrap();
        assert_eq!(reopen.release, None);
    }

    #[test]
    fn test_checked_in_request_keeps_its_bed() {
        let mut checked_in = request(RequestStatus::Approved, Some(4));
        checked_in.checked_in = true;

        for to in [RequestStatus::Rejected, RequestStatus::Pending] {
            assert!(matches!(
                checked_in.plan_status_change(to),
                Err(AccommodationError::InvalidState(_))
            ));
        }
        assert!(checked_in
            .plan_status_change(RequestStatus::Approved)
            .is_ok());
    }

    #[test]
    fn test_approval_only_through_assignment() {
        assert!(matches!(
            request(RequestStatus::Pending, None).plan_status_change(RequestStatus::Approved),
            Err(AccommodationError::InvalidState(_))
        ));

        let unchanged = request(RequestStatus::Approved, Some(2))
            .plan_status_change(RequestStatus::Approved)
            .unwrap();
        assert_eq!(unchanged.release, None);
    }

    #[test]
    fn test_check_in_is_one_way_and_needs_approval() {
        let pending = request(RequestStatus::Pending, None);
        assert!(matches!(
            pending.ensure_check_in_change(true),
            Err(AccommodationError::InvalidState(_))
        ));

        let mut approved = request(RequestStatus::Approved, Some(1));
        assert!(approved.ensure_check_in_change(true).is_ok());
        assert!(approved.ensure_check_in_change(false).is_err());

        approved.checked_in = true;
        assert!(matches!(
            approved.ensure_check_in_change(true),
            Err(AccommodationError::Conflict(_))
        ));
        assert!(approved.ensure_check_in_change(false).is_ok());
    }

    #[test]
    fn test_submission_derives_nights() {
        let user_id = Uuid::new_v4();
        let booking = NewAccommodationRequest::from_submission(
            user_id,
            SubmitRequest {
                gender: "female".to_string(),
                check_in_date: date(2025, 3, 14),
                check_out_date: date(2025, 3, 17),
            },
        )
        .unwrap();
        assert_eq!(booking.nights, 3);
        assert_eq!(booking.gender, Gender::Female);

        let default_stay = NewAccommodationRequest::from_submission(
            user_id,
            SubmitRequest {
                gender: "Male".to_string(),
                check_in_date: None,
                check_out_date: None,
            },
        )
        .unwrap();
        assert_eq!(default_stay.nights, 1);
    }

    #[test]
    fn test_submission_rejects_bad_dates_and_missing_gender() {
        let user_id = Uuid::new_v4();
        let inverted = SubmitRequest {
            gender: "Male".to_string(),
            check_in_date: date(2025, 3, 17),
            check_out_date: date(2025, 3, 17),
        };
        assert!(NewAccommodationRequest::from_submission(user_id, inverted).is_err());

        let half = SubmitRequest {
            gender: "Male".to_string(),
            check_in_date: date(2025, 3, 17),
            check_out_date: None,
        };
        assert!(NewAccommodationRequest::from_submission(user_id, half).is_err());

        let no_gender = SubmitRequest {
            gender: " ".to_string(),
            check_in_date: None,
            check_out_date: None,
        };
        assert!(NewAccommodationRequest::from_submission(user_id, no_gender).is_err());
    }

    #[test]
    fn test_blank_gender_falls_back_to_profile() {
        let blank = SubmitRequest {
            gender: String::new(),
            check_in_date: None,
            check_out_date: None,
        };
        let filled = blank.clone().with_profile_gender(Some(Gender::Other));
        assert_eq!(filled.gender, "Other");
        assert!(blank.with_profile_gender(None).gender.is_empty());

        let chosen = SubmitRequest {
            gender: "Female".to_string(),
            check_in_date: None,
            check_out_date: None,
        };
        assert_eq!(chosen.with_profile_gender(Some(Gender::Male)).gender, "Female");
    }

    #[test]
    fn test_room_number_normalisation() {
        assert_eq!(normalize_room_number(Some(" B-204 ")), Some("B-204".to_string()));
        assert_eq!(normalize_room_number(Some("   ")), None);
        assert_eq!(normalize_room_number(None), None);
    }
}
