//! Domain models and request/response payloads for the accommodation service

pub mod property;
pub mod request;
pub mod settings;
pub mod user;

// Re-export for convenience
pub use property::{
    CreatePropertyRequest, GenderPolicy, NewProperty, Property, PropertySummary, PropertyType,
};
pub use request::{
    AccommodationRequest, Assignment, NewAccommodationRequest, PaymentStatus, RequestEntry,
    RequestStatus, StatusChange, SubmitRequest,
};
pub use settings::{PortalSettings, UpdateSettings};
pub use user::{Gender, UserProfile};
