//! Administrator request queue: search, filters and aggregate counts

use serde::{Deserialize, Serialize};

use crate::error::AccommodationResult;
use crate::models::{PaymentStatus, Property, RequestEntry, RequestStatus};

/// Query parameters for the request queue
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueQuery {
    /// Case-insensitive substring of participant name or participant id
    pub search: Option<String>,
    /// Filter by request status
    pub status: Option<String>,
    /// Filter by payment status
    pub payment_status: Option<String>,
}

/// Parsed queue filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueFilter {
    search: Option<String>,
    status: Option<RequestStatus>,
    payment_status: Option<PaymentStatus>,
}

impl QueueFilter {
    pub fn parse(query: &QueueQuery) -> AccommodationResult<Self> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let status = match query.status.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(s.parse()?),
            _ => None,
        };

        let payment_status = match query.payment_status.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(s.parse()?),
            _ => None,
        };

        Ok(Self {
            search,
            status,
            payment_status,
        })
    }

    pub fn matches(&self, entry: &RequestEntry) -> bool {
        if let Some(status) = self.status {
            if entry.request.status != status {
                return false;
            }
        }
        if let Some(payment) = self.payment_status {
            if entry.request.payment_status != payment {
                return false;
            }
        }
        match &self.search {
            Some(term) => {
                entry.user_name.to_lowercase().contains(term)
                    || entry.participant_id.to_lowercase().contains(term)
            }
            None => true,
        }
    }
}

/// Aggregate counts shown above the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub checked_in: usize,
    pub available_beds: i64,
}

impl QueueStats {
    /// Counts cover every request regardless of the active filter
    pub fn compute(entries: &[RequestEntry], properties: &[Property]) -> Self {
        let count = |status: RequestStatus| {
            entries
                .iter()
                .filter(|e| e.request.status == status)
                .count()
        };

        Self {
            total: entries.len(),
            pending: count(RequestStatus::Pending),
            approved: count(RequestStatus::Approved),
            checked_in: entries.iter().filter(|e| e.request.checked_in).count(),
            available_beds: properties
                .iter()
                .map(|p| i64::from(p.available_beds()))
                .sum(),
        }
    }
}

/// Filtered queue plus statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub requests: Vec<RequestEntry>,
    pub stats: QueueStats,
}

impl QueueView {
    pub fn build(
        entries: Vec<RequestEntry>,
        properties: &[Property],
        filter: &QueueFilter,
    ) -> Self {
        let stats = QueueStats::compute(&entries, properties);
        let requests = entries.into_iter().filter(|e| filter.matches(e)).collect();
        Self { requests, stats }
    }
}
