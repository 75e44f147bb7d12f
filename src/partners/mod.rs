//! Business partner lookup.
//!
//! A [`PartnerDirectory`] resolves a free-text company name to a
//! [`PartnerRecord`]. Two sources exist: the in-process
//! [`StaticPartnerDirectory`] and the [`RemotePartnerDirectory`], which calls a
//! partner lookup tool on a remote tool server. The orchestrator only sees the
//! trait.

pub mod remote_directory;
pub mod static_directory;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use remote_directory::RemotePartnerDirectory;
pub use static_directory::StaticPartnerDirectory;

/// Maximum number of "did you mean" suggestions returned on a miss.
pub const MAX_SUGGESTIONS: usize = 3;

/// A business partner and its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRecord {
    pub id: String,
    pub name: String,
    pub city: String,
    pub country: String,
}

impl PartnerRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            city: city.into(),
            country: country.into(),
        }
    }

    /// Location in `"City, Country"` form, as accepted by the weather client.
    pub fn location(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

/// Source of partner records.
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    /// Resolve a company name.
    ///
    /// Fails with [`TripcastError::PartnerNotFound`](crate::TripcastError::PartnerNotFound)
    /// when nothing matches.
    async fn lookup(&self, query_name: &str) -> Result<PartnerRecord>;
}

/// Case-insensitive match over records in insertion order.
///
/// An exact name match wins over any partial match; among partial matches the
/// first record wins.
pub fn find_match<'a>(records: &'a [PartnerRecord], query_name: &str) -> Option<&'a PartnerRecord> {
    let needle = query_name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    records
        .iter()
        .find(|p| p.name.to_lowercase() == needle)
        .or_else(|| records.iter().find(|p| p.name.to_lowercase().contains(&needle)))
}

/// Names sharing at least one word with the query, in insertion order.
pub fn suggest(records: &[PartnerRecord], query_name: &str) -> Vec<String> {
    let lowered = query_name.trim().to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    records
        .iter()
        .filter(|p| {
            let name = p.name.to_lowercase();
            words.iter().any(|w| name.contains(w))
        })
        .take(MAX_SUGGESTIONS)
        .map(|p| p.name.clone())
        .collect()
}
