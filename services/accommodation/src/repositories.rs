//! Storage seams for the accommodation workflow
//!
//! Each trait has a PostgreSQL repository and is also implemented by the
//! in-memory [`memory::MemoryStore`]. Occupancy is only ever changed through
//! [`RequestStore::assign`], [`RequestStore::change_status`] and
//! [`RequestStore::delete`], each of which updates the property and the
//! request atomically.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AccommodationResult;
use crate::models::{
    AccommodationRequest, Assignment, NewAccommodationRequest, NewProperty, PaymentStatus,
    PortalSettings, Property, RequestEntry, RequestStatus, UserProfile,
};

pub mod memory;
pub mod property;
pub mod request;
pub mod settings;
pub mod user;

pub use memory::MemoryStore;
pub use property::PropertyRepository;
pub use request::RequestRepository;
pub use settings::SettingsRepository;
pub use user::UserRepository;

/// Accommodation inventory
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// All properties in creation order
    async fn list(&self) -> AccommodationResult<Vec<Property>>;

    async fn find_by_id(&self, id: i64) -> AccommodationResult<Option<Property>>;

    async fn create(&self, property: &NewProperty) -> AccommodationResult<Property>;

    /// Hard delete. Fails with `Conflict` while any request holds a bed here.
    async fn delete(&self, id: i64) -> AccommodationResult<()>;
}

/// Accommodation requests and the assignment engine
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Every request with participant and property details, newest first
    async fn list_entries(&self) -> AccommodationResult<Vec<RequestEntry>>;

    async fn find_by_id(&self, id: i64) -> AccommodationResult<Option<AccommodationRequest>>;

    async fn find_entry_by_user(&self, user_id: Uuid) -> AccommodationResult<Option<RequestEntry>>;

    async fn find_by_participant(
        &self,
        participant_id: &str,
    ) -> AccommodationResult<Option<AccommodationRequest>>;

    /// Fails with `Conflict` when the user already has a request
    async fn create(
        &self,
        request: &NewAccommodationRequest,
    ) -> AccommodationResult<AccommodationRequest>;

    /// Take one bed in `property_id` for a pending request and approve it.
    ///
    /// The occupancy increment is guarded by `occupied < capacity`; when the
    /// guard fails nothing changes and `CapacityExceeded` is returned.
    async fn assign(
        &self,
        request_id: i64,
        property_id: i64,
        room_number: Option<&str>,
    ) -> AccommodationResult<Assignment>;

    /// Change the administrative status, releasing the bed when leaving
    /// `Approved`
    async fn change_status(
        &self,
        request_id: i64,
        status: RequestStatus,
    ) -> AccommodationResult<AccommodationRequest>;

    async fn set_payment_status(
        &self,
        request_id: i64,
        payment_status: PaymentStatus,
    ) -> AccommodationResult<AccommodationRequest>;

    async fn set_room_number(
        &self,
        request_id: i64,
        room_number: Option<&str>,
    ) -> AccommodationResult<AccommodationRequest>;

    /// Set the checked-in flag after validating the transition
    async fn set_checked_in(
        &self,
        request_id: i64,
        checked_in: bool,
    ) -> AccommodationResult<AccommodationRequest>;

    /// Hard delete; returns the property whose bed was released, if any
    async fn delete(&self, request_id: i64) -> AccommodationResult<Option<i64>>;
}

/// Read-only participant directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AccommodationResult<Option<UserProfile>>;
}

/// Persisted portal toggles
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> AccommodationResult<PortalSettings>;

    async fn save(&self, settings: &PortalSettings) -> AccommodationResult<()>;
}
