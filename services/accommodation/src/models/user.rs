//! Participant profile as read from the user directory

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::error::AccommodationError;

/// Participant gender, the compatibility key against a property's policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = AccommodationError;

    /// Case-insensitive; surrounding whitespace is ignored
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "" => Err(AccommodationError::Validation(
                "Gender selection is required".to_string(),
            )),
            other => Err(AccommodationError::Validation(format!(
                "Unknown gender '{}', expected Male, Female or Other",
                other
            ))),
        }
    }
}

/// Participant profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub gender: Option<Gender>,
    pub participant_id: String,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parse_is_case_insensitive() {
        assert_eq!("FEMALE".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!(" male ".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("Other".parse::<Gender>().unwrap(), Gender::Other);
    }

    #[test]
    fn test_gender_parse_rejects_unknown_and_empty() {
        assert!(matches!(
            "".parse::<Gender>(),
            Err(AccommodationError::Validation(_))
        ));
        assert!(matches!(
            "boys".parse::<Gender>(),
            Err(AccommodationError::Validation(_))
        ));
    }
}
