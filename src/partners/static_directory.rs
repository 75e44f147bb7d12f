use super::{find_match, suggest, PartnerDirectory, PartnerRecord};
use crate::error::{Result, TripcastError};
use async_trait::async_trait;
use tracing::debug;

/// In-memory partner table, loaded once and never mutated.
#[derive(Debug, Clone)]
pub struct StaticPartnerDirectory {
    records: Vec<PartnerRecord>,
}

impl StaticPartnerDirectory {
    pub fn new(records: Vec<PartnerRecord>) -> Self {
        Self { records }
    }

    /// The built-in development table of ten partners.
    pub fn with_sample_partners() -> Self {
        Self::new(vec![
            PartnerRecord::new("BP001", "Acme Corp", "New York", "USA"),
            PartnerRecord::new("BP002", "TechVentures GmbH", "Berlin", "Germany"),
            PartnerRecord::new("BP003", "Global Innovations Ltd", "London", "UK"),
            PartnerRecord::new("BP004", "Pacific Solutions", "Tokyo", "Japan"),
            PartnerRecord::new("BP005", "Nordic Systems AB", "Stockholm", "Sweden"),
            PartnerRecord::new("BP006", "Alpine Technologies SA", "Zurich", "Switzerland"),
            PartnerRecord::new("BP007", "Southern Cross Enterprises", "Sydney", "Australia"),
            PartnerRecord::new("BP008", "Maple Leaf Industries", "Toronto", "Canada"),
            PartnerRecord::new("BP009", "Dragon Tech Co", "Shanghai", "China"),
            PartnerRecord::new("BP010", "Sunset Digital", "San Francisco", "USA"),
        ])
    }

    pub fn records(&self) -> &[PartnerRecord] {
        &self.records
    }
}

impl Default for StaticPartnerDirectory {
    fn default() -> Self {
        Self::with_sample_partners()
    }
}

#[async_trait]
impl PartnerDirectory for StaticPartnerDirectory {
    async fn lookup(&self, query_name: &str) -> Result<PartnerRecord> {
        match find_match(&self.records, query_name) {
            Some(record) => {
                debug!(query = query_name, partner_id = %record.id, "Partner resolved");
                Ok(record.clone())
            }
            None => Err(TripcastError::PartnerNotFound {
                query: query_name.trim().to_string(),
                suggestions: suggest(&self.records, query_name),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exact_match() {
        let directory = StaticPartnerDirectory::default();
        let partner = directory.lookup("Acme Corp").await.unwrap();

        assert_eq!(partner.id, "BP001");
        assert_eq!(partner.city, "New York");
        assert_eq!(partner.country, "USA");
    }

    #[tokio::test]
    async fn test_exact_match_for_every_partner_regardless_of_casing() {
        let directory = StaticPartnerDirectory::default();
        for record in directory.records() {
            let upper = directory.lookup(&record.name.to_uppercase()).await.unwrap();
            let lower = directory.lookup(&record.name.to_lowercase()).await.unwrap();
            assert_eq!(&upper, record);
            assert_eq!(&lower, record);
        }
    }

    #[tokio::test]
    async fn test_partial_match() {
        let directory = StaticPartnerDirectory::default();
        let partner = directory.lookup("Tech").await.unwrap();

        assert_eq!(partner.name, "TechVentures GmbH");
        assert_eq!(partner.city, "Berlin");
        assert_eq!(partner.country, "Germany");
    }

    #[tokio::test]
    async fn test_every_substring_of_a_name_resolves() {
        let directory = StaticPartnerDirectory::default();
        let name = "Nordic Systems AB";
        for start in 0..name.len() {
            for end in (start + 1)..=name.len() {
                let fragment = &name[start..end];
                if fragment.trim().is_empty() {
                    continue;
                }
                let partner = directory.lookup(fragment).await.unwrap();
                assert!(partner.name.to_lowercase().contains(&fragment.trim().to_lowercase()));
            }
        }
    }

    #[tokio::test]
    async fn test_case_insensitive_partial() {
        let directory = StaticPartnerDirectory::default();
        let partner = directory.lookup("TECHVENTURES").await.unwrap();
        assert_eq!(partner.name, "TechVentures GmbH");
    }

    #[tokio::test]
    async fn test_no_match() {
        let directory = StaticPartnerDirectory::default();
        let err = directory.lookup("NonExistent Company").await.unwrap_err();

        match err {
            TripcastError::PartnerNotFound { query, suggestions } => {
                assert_eq!(query, "NonExistent Company");
                assert!(suggestions.is_empty());
            }
            other => panic!("Expected PartnerNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_match_offers_suggestions() {
        let directory = StaticPartnerDirectory::default();
        let err = directory.lookup("Dragon Industries").await.unwrap_err();

        match err {
            TripcastError::PartnerNotFound { suggestions, .. } => {
                assert!(suggestions.contains(&"Dragon Tech Co".to_string()));
                assert!(suggestions.contains(&"Maple Leaf Industries".to_string()));
            }
            other => panic!("Expected PartnerNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_query() {
        let directory = StaticPartnerDirectory::default();
        assert!(directory.lookup("").await.is_err());
    }
}
