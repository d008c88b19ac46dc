//! Cache key construction.
//!
//! Keys are colon-delimited namespace paths (`domain:qualifier:...`). The
//! caller decides qualifier order; it must be the same for the same logical
//! query or repeated calls will miss.

use std::fmt::Display;

/// Join a namespace prefix and qualifiers into a key
///
/// ```
/// use sfa_cache::keys::cache_key;
///
/// assert_eq!(cache_key("sales", &["trend", "7"]), "sales:trend:7");
/// ```
#[must_use]
pub fn cache_key<P: Display>(prefix: &str, parts: &[P]) -> String {
    let mut key = String::from(prefix);
    for part in parts {
        key.push(':');
        key.push_str(&part.to_string());
    }
    key
}

pub const DASHBOARD_KPI: &str = "dashboard:kpi";

#[must_use]
pub fn sales_trend(days: u32) -> String {
    format!("sales:trend:{days}")
}

#[must_use]
pub fn top_customers(limit: usize) -> String {
    format!("customers:top:{limit}")
}

#[must_use]
pub fn top_products(limit: usize) -> String {
    format!("products:top:{limit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_mixed_parts() {
        assert_eq!(cache_key("transactions", &[2024, 11]), "transactions:2024:11");
        assert_eq!(cache_key::<&str>("dashboard", &[]), "dashboard");
    }

    #[test]
    fn test_well_known_keys() {
        assert_eq!(sales_trend(30), "sales:trend:30");
        assert_eq!(top_customers(10), "customers:top:10");
        assert_eq!(top_products(5), "products:top:5");
    }
}
