//! Accommodation inventory: PGs, hostels and hotels

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::OnceLock};

use crate::error::{AccommodationError, AccommodationResult};
use crate::models::user::Gender;

/// Kind of accommodation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "PG")]
    Pg,
    Hostel,
    Hotel,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Pg => "PG",
            PropertyType::Hostel => "Hostel",
            PropertyType::Hotel => "Hotel",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = AccommodationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pg" => Ok(PropertyType::Pg),
            "hostel" => Ok(PropertyType::Hostel),
            "hotel" => Ok(PropertyType::Hotel),
            other => Err(AccommodationError::Validation(format!(
                "Unknown property type '{}', expected PG, Hostel or Hotel",
                other
            ))),
        }
    }
}

/// Which participants a property accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenderPolicy {
    Boys,
    Girls,
    #[serde(rename = "Co-ed")]
    CoEd,
}

impl GenderPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderPolicy::Boys => "Boys",
            GenderPolicy::Girls => "Girls",
            GenderPolicy::CoEd => "Co-ed",
        }
    }

    /// Read a stored policy. Missing or unrecognised values are co-ed.
    pub fn from_stored(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(GenderPolicy::CoEd)
    }

    /// Whether a participant of `gender` may be placed here
    pub fn admits(&self, gender: Gender) -> bool {
        match self {
            GenderPolicy::CoEd => true,
            GenderPolicy::Boys => gender == Gender::Male,
            GenderPolicy::Girls => gender == Gender::Female,
        }
    }
}

impl fmt::Display for GenderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenderPolicy {
    type Err = AccommodationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "boys" => Ok(GenderPolicy::Boys),
            "girls" => Ok(GenderPolicy::Girls),
            "co-ed" | "coed" => Ok(GenderPolicy::CoEd),
            other => Err(AccommodationError::Validation(format!(
                "Unknown gender policy '{}', expected Boys, Girls or Co-ed",
                other
            ))),
        }
    }
}

/// Property entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub gender: GenderPolicy,
    pub capacity: i32,
    pub occupied: i32,
    pub cost_price: i64,
    pub selling_price: i64,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Property {
    /// Free beds, never negative
    pub fn available_beds(&self) -> i32 {
        (self.capacity - self.occupied).max(0)
    }

    pub fn has_free_bed(&self) -> bool {
        self.occupied < self.capacity
    }
}

/// Property as listed to administrators
#[derive(Debug, Clone, Serialize)]
pub struct PropertySummary {
    #[serde(flatten)]
    pub property: Property,
    pub available_beds: i32,
}

impl From<Property> for PropertySummary {
    fn from(property: Property) -> Self {
        let available_beds = property.available_beds();
        Self {
            property,
            available_beds,
        }
    }
}

/// Raw property creation payload as submitted by an administrator
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePropertyRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub gender: Option<String>,
    pub capacity: i32,
    #[serde(default)]
    pub cost_price: i64,
    #[serde(default)]
    pub selling_price: i64,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

/// Validated property creation payload
#[derive(Debug, Clone, PartialEq)]
pub struct NewProperty {
    pub name: String,
    pub property_type: PropertyType,
    pub gender: GenderPolicy,
    pub capacity: i32,
    pub cost_price: i64,
    pub selling_price: i64,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

impl TryFrom<CreatePropertyRequest> for NewProperty {
    type Error = AccommodationError;

    fn try_from(raw: CreatePropertyRequest) -> AccommodationResult<Self> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(AccommodationError::Validation(
                "Property name is required".to_string(),
            ));
        }

        let property_type = raw.property_type.parse()?;
        let gender = match non_empty(raw.gender) {
            Some(policy) => policy.parse()?,
            None => GenderPolicy::CoEd,
        };

        if raw.capacity < 0 {
            return Err(AccommodationError::Validation(
                "Capacity cannot be negative".to_string(),
            ));
        }
        if raw.cost_price < 0 || raw.selling_price < 0 {
            return Err(AccommodationError::Validation(
                "Prices cannot be negative".to_string(),
            ));
        }

        let contact_phone = non_empty(raw.contact_phone);
        if let Some(phone) = &contact_phone {
            validate_phone(phone)?;
        }

        Ok(NewProperty {
            name,
            property_type,
            gender,
            capacity: raw.capacity,
            cost_price: raw.cost_price,
            selling_price: raw.selling_price,
            contact_name: non_empty(raw.contact_name),
            contact_phone,
            address: non_empty(raw.address),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate a contact phone number: optional leading `+`, 10 to 15 digits,
/// spaces and dashes allowed between digits
pub fn validate_phone(phone: &str) -> AccommodationResult<()> {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("Failed to compile phone regex"));

    let compact: String = phone.chars().filter(|c| *c != ' ' && *c != '-').collect();
    if !regex.is_match(&compact) {
        return Err(AccommodationError::Validation(format!(
            "Invalid contact phone '{}'",
            phone
        )));
    }

    Ok(())
}
