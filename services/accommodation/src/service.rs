//! Accommodation workflow operations used by the HTTP handlers

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::compatibility::{PropertyOption, compatible_properties};
use crate::error::{AccommodationError, AccommodationResult};
use crate::models::{
    AccommodationRequest, Assignment, CreatePropertyRequest, NewAccommodationRequest, NewProperty,
    PaymentStatus, PortalSettings, Property, PropertySummary, RequestEntry, RequestStatus,
    SubmitRequest, UpdateSettings,
};
use crate::queue::{QueueFilter, QueueQuery, QueueView};
use crate::repositories::{PropertyStore, RequestStore, UserDirectory};
use crate::settings::SettingsCache;

/// Who is changing a check-in flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskActor {
    /// Administrators may check in while the desk is closed and may undo
    Admin,
    /// Volunteers staffing the check-in desk
    Volunteer,
}

/// Accommodation workflow service
#[derive(Clone)]
pub struct AccommodationService {
    properties: Arc<dyn PropertyStore>,
    requests: Arc<dyn RequestStore>,
    users: Arc<dyn UserDirectory>,
    settings: SettingsCache,
}

impl AccommodationService {
    pub fn new(
        properties: Arc<dyn PropertyStore>,
        requests: Arc<dyn RequestStore>,
        users: Arc<dyn UserDirectory>,
        settings: SettingsCache,
    ) -> Self {
        Self {
            properties,
            requests,
            users,
            settings,
        }
    }

    /// All properties with their free beds
    pub async fn list_properties(&self) -> AccommodationResult<Vec<PropertySummary>> {
        let properties = self.properties.list().await?;
        Ok(properties.into_iter().map(PropertySummary::from).collect())
    }

    pub async fn create_property(
        &self,
        payload: CreatePropertyRequest,
    ) -> AccommodationResult<Property> {
        let property = NewProperty::try_from(payload)?;
        self.properties.create(&property).await
    }

    pub async fn delete_property(&self, id: i64) -> AccommodationResult<()> {
        self.properties.delete(id).await
    }

    /// Request queue with statistics over every request and property
    pub async fn queue(&self, query: &QueueQuery) -> AccommodationResult<QueueView> {
        let filter = QueueFilter::parse(query)?;
        let entries = self.requests.list_entries().await?;
        let properties = self.properties.list().await?;

        Ok(QueueView::build(entries, &properties, &filter))
    }

    /// Submit the caller's booking while accommodation is open
    pub async fn submit_request(
        &self,
        user_id: Uuid,
        payload: SubmitRequest,
    ) -> AccommodationResult<AccommodationRequest> {
        if !self.settings.current().await?.accommodation_open {
            return Err(AccommodationError::Closed("Accommodation booking"));
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AccommodationError::not_found("User", user_id))?;

        let payload = payload.with_profile_gender(user.gender);
        let request = NewAccommodationRequest::from_submission(user_id, payload)?;
        self.requests.create(&request).await
    }

    pub async fn my_request(&self, user_id: Uuid) -> AccommodationResult<RequestEntry> {
        self.requests
            .find_entry_by_user(user_id)
            .await?
            .ok_or_else(|| AccommodationError::not_found("Accommodation request for user", user_id))
    }

    /// Properties compatible with the request's gender, in listing order
    pub async fn options_for(&self, request_id: i64) -> AccommodationResult<Vec<PropertyOption>> {
        let request = self.find_request(request_id).await?;
        let properties = self.properties.list().await?;

        Ok(compatible_properties(request.gender, &properties))
    }

    /// Commit an administrator's property choice for a pending request
    pub async fn assign(
        &self,
        request_id: i64,
        property_id: i64,
        room_number: Option<&str>,
    ) -> AccommodationResult<Assignment> {
        let request = self.find_request(request_id).await?;
        if request.payment_status != PaymentStatus::Paid {
            warn!(request_id, "Assigning accommodation to an unpaid request");
        }

        self.requests
            .assign(request_id, property_id, room_number)
            .await
    }

    pub async fn change_status(
        &self,
        request_id: i64,
        status: &str,
    ) -> AccommodationResult<AccommodationRequest> {
        let status: RequestStatus = status.parse()?;
        self.requests.change_status(request_id, status).await
    }

    pub async fn set_payment_status(
        &self,
        request_id: i64,
        payment_status: &str,
    ) -> AccommodationResult<AccommodationRequest> {
        let payment_status: PaymentStatus = payment_status.parse()?;
        self.requests
            .set_payment_status(request_id, payment_status)
            .await
    }

    pub async fn set_room_number(
        &self,
        request_id: i64,
        room_number: Option<&str>,
    ) -> AccommodationResult<AccommodationRequest> {
        self.requests.set_room_number(request_id, room_number).await
    }

    /// Check a request in, or (admin only, confirmed) undo a check-in
    pub async fn set_checked_in(
        &self,
        actor: DeskActor,
        request_id: i64,
        checked_in: bool,
        confirm: bool,
    ) -> AccommodationResult<AccommodationRequest> {
        if checked_in {
            self.ensure_desk_open(actor).await?;
        } else {
            if actor != DeskActor::Admin {
                return Err(AccommodationError::InvalidState(
                    "Only administrators can undo a check-in".to_string(),
                ));
            }
            if !confirm {
                return Err(AccommodationError::Validation(
                    "Undoing a check-in must be confirmed".to_string(),
                ));
            }
            info!(request_id, "Administrator undoing check-in");
        }

        self.requests.set_checked_in(request_id, checked_in).await
    }

    /// Desk check-in from a scanned participant id
    pub async fn check_in_participant(
        &self,
        actor: DeskActor,
        participant_id: &str,
    ) -> AccommodationResult<AccommodationRequest> {
        let participant_id = participant_id.trim();
        if participant_id.is_empty() {
            return Err(AccommodationError::Validation(
                "Participant id is required".to_string(),
            ));
        }

        self.ensure_desk_open(actor).await?;

        let request = self
            .requests
            .find_by_participant(participant_id)
            .await?
            .ok_or_else(|| AccommodationError::not_found("Participant request", participant_id))?;

        self.requests.set_checked_in(request.id, true).await
    }

    pub async fn delete_request(&self, request_id: i64) -> AccommodationResult<Option<i64>> {
        self.requests.delete(request_id).await
    }

    pub async fn settings(&self) -> AccommodationResult<PortalSettings> {
        self.settings.current().await
    }

    pub async fn update_settings(
        &self,
        update: &UpdateSettings,
    ) -> AccommodationResult<PortalSettings> {
        self.settings.update(update).await
    }

    async fn find_request(&self, request_id: i64) -> AccommodationResult<AccommodationRequest> {
        self.requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| AccommodationError::not_found("Request", request_id))
    }

    async fn ensure_desk_open(&self, actor: DeskActor) -> AccommodationResult<()> {
        if actor == DeskActor::Admin {
            return Ok(());
        }
        if !self.settings.current().await?.check_in_open {
            return Err(AccommodationError::Closed("Check-in"));
        }
        Ok(())
    }
}
