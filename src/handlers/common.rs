use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// One-based page number
    #[serde(default)]
    pub page: Option<u64>,
    /// Items per page, capped by server configuration
    #[serde(default)]
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Resolves the raw query into a usable (page, per_page) pair. Page is
    /// one-based; a missing per_page falls back to the configured default
    /// and explicit values are capped by the configured maximum.
    pub fn normalized(&self, default_per_page: u64, max_per_page: u64) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, max_per_page);
        (page, per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let params: PaginationParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.normalized(20, 100), (1, 20));
    }

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let params = PaginationParams {
            page: Some(0),
            per_page: Some(5000),
        };
        assert_eq!(params.normalized(20, 100), (1, 100));

        let params = PaginationParams {
            page: Some(3),
            per_page: Some(0),
        };
        assert_eq!(params.normalized(20, 100), (3, 1));
    }
}
