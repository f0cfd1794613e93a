//! In-memory store for single-node runs and tests
//!
//! All tables live behind one Tokio mutex, so every trait method is atomic
//! with respect to every other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AccommodationError, AccommodationResult};
use crate::models::{
    AccommodationRequest, Assignment, NewAccommodationRequest, NewProperty, PaymentStatus,
    PortalSettings, Property, RequestEntry, RequestStatus, UserProfile,
    request::normalize_room_number,
};
use crate::repositories::{PropertyStore, RequestStore, SettingsStore, UserDirectory};

#[derive(Debug, Default)]
struct InnerState {
    users: HashMap<Uuid, UserProfile>,
    /// Creation order
    properties: Vec<Property>,
    /// Creation order
    requests: Vec<AccommodationRequest>,
    settings: PortalSettings,
    last_property_id: i64,
    last_request_id: i64,
}

impl InnerState {
    fn property_index(&self, id: i64) -> AccommodationResult<usize> {
        self.properties
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| AccommodationError::not_found("Property", id))
    }

    fn request_index(&self, id: i64) -> AccommodationResult<usize> {
        self.requests
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AccommodationError::not_found("Request", id))
    }

    fn entry(&self, request: &AccommodationRequest) -> Option<RequestEntry> {
        let user = self.users.get(&request.user_id)?;
        let property_name = request.assigned_property_id.and_then(|id| {
            self.properties
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.clone())
        });

        Some(RequestEntry {
            request: request.clone(),
            user_name: user.name.clone(),
            participant_id: user.participant_id.clone(),
            phone: user.phone.clone(),
            property_name,
        })
    }

    fn release_bed(&mut self, property_id: i64) {
        match self.properties.iter_mut().find(|p| p.id == property_id) {
            Some(property) if property.occupied > 0 => property.occupied -= 1,
            _ => warn!(property_id, "Released a bed from a property with no occupancy"),
        }
    }
}

/// In-memory implementation of every store trait
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl MemoryStore {
    /// Creates an empty store with all portal toggles closed
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a participant in the directory
    pub async fn insert_user(&self, user: UserProfile) {
        let mut state = self.state.lock().await;
        state.users.insert(user.id, user);
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn list(&self) -> AccommodationResult<Vec<Property>> {
        Ok(self.state.lock().await.properties.clone())
    }

    async fn find_by_id(&self, id: i64) -> AccommodationResult<Option<Property>> {
        let state = self.state.lock().await;
        Ok(state.properties.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, property: &NewProperty) -> AccommodationResult<Property> {
        let mut state = self.state.lock().await;
        state.last_property_id += 1;

        let created = Property {
            id: state.last_property_id,
            name: property.name.clone(),
            property_type: property.property_type,
            gender: property.gender,
            capacity: property.capacity,
            occupied: 0,
            cost_price: property.cost_price,
            selling_price: property.selling_price,
            contact_name: property.contact_name.clone(),
            contact_phone: property.contact_phone.clone(),
            address: property.address.clone(),
            created_at: Utc::now(),
        };
        state.properties.push(created.clone());

        info!(property_id = created.id, name = %created.name, "Property created");
        Ok(created)
    }

    async fn delete(&self, id: i64) -> AccommodationResult<()> {
        let mut state = self.state.lock().await;
        let index = state.property_index(id)?;

        let assigned = state
            .requests
            .iter()
            .filter(|r| r.assigned_property_id == Some(id))
            .count();
        if assigned > 0 {
            return Err(AccommodationError::Conflict(format!(
                "Property {} still has {} assigned request(s)",
                id, assigned
            )));
        }

        state.properties.remove(index);
        info!(property_id = id, "Property deleted");
        Ok(())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn list_entries(&self) -> AccommodationResult<Vec<RequestEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .iter()
            .rev()
            .filter_map(|r| state.entry(r))
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> AccommodationResult<Option<AccommodationRequest>> {
        let state = self.state.lock().await;
        Ok(state.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn find_entry_by_user(&self, user_id: Uuid) -> AccommodationResult<Option<RequestEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .iter()
            .find(|r| r.user_id == user_id)
            .and_then(|r| state.entry(r)))
    }

    async fn find_by_participant(
        &self,
        participant_id: &str,
    ) -> AccommodationResult<Option<AccommodationRequest>> {
        let state = self.state.lock().await;
        let wanted = participant_id.trim();

        let user_id = state
            .users
            .values()
            .find(|u| u.participant_id.eq_ignore_ascii_case(wanted))
            .map(|u| u.id);

        Ok(user_id.and_then(|id| state.requests.iter().find(|r| r.user_id == id).cloned()))
    }

    async fn create(
        &self,
        request: &NewAccommodationRequest,
    ) -> AccommodationResult<AccommodationRequest> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&request.user_id) {
            return Err(AccommodationError::not_found("User", request.user_id));
        }
        if state.requests.iter().any(|r| r.user_id == request.user_id) {
            return Err(AccommodationError::Conflict(format!(
                "User {} already has an accommodation request",
                request.user_id
            )));
        }

        state.last_request_id += 1;
        let created = AccommodationRequest {
            id: state.last_request_id,
            user_id: request.user_id,
            gender: request.gender,
            payment_status: PaymentStatus::Pending,
            assigned_property_id: None,
            check_in_date: request.check_in_date,
            check_out_date: request.check_out_date,
            nights: request.nights,
            room_number: None,
            status: RequestStatus::Pending,
            checked_in: false,
            created_at: Utc::now(),
        };
        state.requests.push(created.clone());

        info!(request_id = created.id, user_id = %created.user_id, "Accommodation request created");
        Ok(created)
    }

    async fn assign(
        &self,
        request_id: i64,
        property_id: i64,
        room_number: Option<&str>,
    ) -> AccommodationResult<Assignment> {
        let mut state = self.state.lock().await;

        let request_index = state.request_index(request_id)?;
        state.requests[request_index].ensure_assignable()?;
        let gender = state.requests[request_index].gender;

        let property_index = state.property_index(property_id)?;
        let property = &mut state.properties[property_index];
        if !property.gender.admits(gender) {
            return Err(AccommodationError::Validation(format!(
                "{} ({}) does not accept {} participants",
                property.name, property.gender, gender
            )));
        }
        if !property.has_free_bed() {
            warn!(request_id, property_id, "Assignment rejected: property is full");
            return Err(AccommodationError::CapacityExceeded { property_id });
        }
        property.occupied += 1;
        let property = property.clone();

        let request = &mut state.requests[request_index];
        request.assigned_property_id = Some(property_id);
        request.status = RequestStatus::Approved;
        if let Some(room) = normalize_room_number(room_number) {
            request.room_number = Some(room);
        }
        let request = request.clone();

        info!(
            request_id,
            property_id,
            occupied = property.occupied,
            capacity = property.capacity,
            "Request assigned"
        );
        Ok(Assignment { request, property })
    }

    async fn change_status(
        &self,
        request_id: i64,
        status: RequestStatus,
    ) -> AccommodationResult<AccommodationRequest> {
        let mut state = self.state.lock().await;

        let index = state.request_index(request_id)?;
        let change = state.requests[index].plan_status_change(status)?;
        if change.from == change.to {
            return Ok(state.requests[index].clone());
        }

        if let Some(property_id) = change.release {
            state.release_bed(property_id);
        }

        let request = &mut state.requests[index];
        request.status = change.to;
        request.assigned_property_id = None;

        info!(
            request_id,
            from = %change.from,
            to = %change.to,
            released = ?change.release,
            "Request status changed"
        );
        Ok(request.clone())
    }

    async fn set_payment_status(
        &self,
        request_id: i64,
        payment_status: PaymentStatus,
    ) -> AccommodationResult<AccommodationRequest> {
        let mut state = self.state.lock().await;
        let index = state.request_index(request_id)?;

        let request = &mut state.requests[index];
        request.payment_status = payment_status;

        info!(request_id, payment_status = %payment_status, "Payment status updated");
        Ok(request.clone())
    }

    async fn set_room_number(
        &self,
        request_id: i64,
        room_number: Option<&str>,
    ) -> AccommodationResult<AccommodationRequest> {
        let mut state = self.state.lock().await;
        let index = state.request_index(request_id)?;

        let request = &mut state.requests[index];
        request.room_number = normalize_room_number(room_number);
        Ok(request.clone())
    }

    async fn set_checked_in(
        &self,
        request_id: i64,
        checked_in: bool,
    ) -> AccommodationResult<AccommodationRequest> {
        let mut state = self.state.lock().await;
        let index = state.request_index(request_id)?;

        let request = &mut state.requests[index];
        request.ensure_check_in_change(checked_in)?;
        request.checked_in = checked_in;

        info!(request_id, checked_in, "Check-in state changed");
        Ok(request.clone())
    }

    async fn delete(&self, request_id: i64) -> AccommodationResult<Option<i64>> {
        let mut state = self.state.lock().await;
        let index = state.request_index(request_id)?;

        let released = state.requests[index].held_property();
        if let Some(property_id) = released {
            state.release_bed(property_id);
        }
        state.requests.remove(index);

        info!(request_id, released = ?released, "Request deleted");
        Ok(released)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AccommodationResult<Option<UserProfile>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> AccommodationResult<PortalSettings> {
        Ok(self.state.lock().await.settings)
    }

    async fn save(&self, settings: &PortalSettings) -> AccommodationResult<()> {
        self.state.lock().await.settings = *settings;
        info!(?settings, "Portal settings saved");
        Ok(())
    }
}
