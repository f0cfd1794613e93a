//! Which properties a participant can be placed in

use serde::Serialize;

use crate::models::{Gender, Property, PropertySummary};

/// A candidate property for a request
///
/// Full properties stay in the list but are not selectable.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyOption {
    #[serde(flatten)]
    pub summary: PropertySummary,
    pub selectable: bool,
}

impl PropertyOption {
    pub fn property(&self) -> &Property {
        &self.summary.property
    }
}

/// Properties whose gender policy admits `gender`, in input order.
pub fn compatible_properties(gender: Gender, properties: &[Property]) -> Vec<PropertyOption> {
    properties
        .iter()
        .filter(|p| p.gender.admits(gender))
        .map(|p| PropertyOption {
            selectable: p.has_free_bed(),
            summary: PropertySummary::from(p.clone()),
        })
        .collect()
}
