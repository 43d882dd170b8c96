//! HTTP route handlers.
//!
//! Each module owns the request/response DTOs for its resource; domain
//! types never appear directly in a payload. Handlers stay thin: decode,
//! call a repository, encode.

pub mod health;
pub mod ledger;
pub mod orders;
pub mod payments;
pub mod products;
pub mod services;

use serde::Deserialize;
use tally_db::Database;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Common `skip`/`limit` pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

impl PageParams {
    /// Sanitized `(skip, limit)` pair.
    ///
    /// Negative inputs collapse to zero; a raw negative LIMIT would mean
    /// "no limit" to SQLite.
    pub fn bounds(&self) -> (i64, i64) {
        (self.skip.max(0), self.limit.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_clamp_negatives() {
        let params = PageParams { skip: -5, limit: -1 };
        assert_eq!(params.bounds(), (0, 0));

        let params = PageParams { skip: 20, limit: 50 };
        assert_eq!(params.bounds(), (20, 50));
    }
}
