//! # TTL Policy
//!
//! Per-domain cache lifetimes. The facade is TTL-agnostic; callers pick a
//! TTL from here when they write.

use std::time::Duration;

/// TTL for filter option lists
pub const FILTERS_TTL: Duration = Duration::from_secs(900);

/// TTL for static/configuration data
pub const STATIC_TTL: Duration = Duration::from_secs(1800);

/// Logical data domains with their own TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlPolicy {
    DashboardKpi,
    SalesTrend,
    TopCustomers,
    TopProducts,
    Transactions,
    Customers,
    Products,
    Journeys,
    Visits,
    Targets,
}

impl TtlPolicy {
    pub const ALL: [Self; 10] = [
        Self::DashboardKpi,
        Self::SalesTrend,
        Self::TopCustomers,
        Self::TopProducts,
        Self::Transactions,
        Self::Customers,
        Self::Products,
        Self::Journeys,
        Self::Visits,
        Self::Targets,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DashboardKpi => "dashboard_kpi",
            Self::SalesTrend => "sales_trend",
            Self::TopCustomers => "top_customers",
            Self::TopProducts => "top_products",
            Self::Transactions => "transactions",
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Journeys => "journeys",
            Self::Visits => "visits",
            Self::Targets => "targets",
        }
    }
}

/// Cache TTL configuration
#[derive(Debug, Clone, Copy)]
pub struct CacheTtl {
    pub dashboard_kpi: Duration,
    pub sales_trend: Duration,
    pub top_customers: Duration,
    pub top_products: Duration,
    pub transactions: Duration,
    pub customers: Duration,
    pub products: Duration,
    pub journeys: Duration,
    pub visits: Duration,
    pub targets: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            dashboard_kpi: Duration::from_secs(300),
            sales_trend: Duration::from_secs(900),
            top_customers: Duration::from_secs(1800),
            top_products: Duration::from_secs(1800),
            transactions: Duration::from_secs(600),
            customers: Duration::from_secs(3600),
            products: Duration::from_secs(7200),
            journeys: Duration::from_secs(1800),
            visits: Duration::from_secs(600),
            targets: Duration::from_secs(1800),
        }
    }
}

impl CacheTtl {
    #[must_use]
    pub const fn ttl_for(&self, policy: TtlPolicy) -> Duration {
        match policy {
            TtlPolicy::DashboardKpi => self.dashboard_kpi,
            TtlPolicy::SalesTrend => self.sales_trend,
            TtlPolicy::TopCustomers => self.top_customers,
            TtlPolicy::TopProducts => self.top_products,
            TtlPolicy::Transactions => self.transactions,
            TtlPolicy::Customers => self.customers,
            TtlPolicy::Products => self.products,
            TtlPolicy::Journeys => self.journeys,
            TtlPolicy::Visits => self.visits,
            TtlPolicy::Targets => self.targets,
        }
    }
}

/// TTL for a report filtered by a named date range.
///
/// Recent ranges change often and get short lifetimes; closed historical
/// periods are stable and get long ones.
#[must_use]
pub fn ttl_for_date_range(range: &str, has_custom_dates: bool) -> Duration {
    if has_custom_dates {
        return Duration::from_secs(900);
    }

    let secs = match range.to_ascii_lowercase().as_str() {
        "today" | "yesterday" => 600,
        "thisweek" | "lastweek" | "last7days" => 900,
        "thismonth" | "last30days" => 1800,
        "lastmonth" | "thisquarter" | "lastquarter" | "thisyear" | "lastyear" => 3600,
        _ => 900,
    };
    Duration::from_secs(secs)
}

/// `Cache-Control` header value for an HTTP response cached for `ttl`
#[must_use]
pub fn cache_control_header(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    format!(
        "public, s-maxage={secs}, stale-while-revalidate={}",
        secs.saturating_mul(2)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let ttl = CacheTtl::default();
        assert_eq!(ttl.ttl_for(TtlPolicy::DashboardKpi), Duration::from_secs(300));
        assert_eq!(ttl.ttl_for(TtlPolicy::SalesTrend), Duration::from_secs(900));
        assert_eq!(ttl.ttl_for(TtlPolicy::Products), Duration::from_secs(7200));
        assert_eq!(ttl.ttl_for(TtlPolicy::Visits), Duration::from_secs(600));
    }

    #[test]
    fn test_every_policy_has_positive_ttl() {
        let ttl = CacheTtl::default();
        for policy in TtlPolicy::ALL {
            assert!(!ttl.ttl_for(policy).is_zero(), "{}", policy.as_str());
        }
    }

    #[test]
    fn test_date_range_ttl() {
        assert_eq!(ttl_for_date_range("today", false).as_secs(), 600);
        assert_eq!(ttl_for_date_range("Last7Days", false).as_secs(), 900);
        assert_eq!(ttl_for_date_range("thisMonth", false).as_secs(), 1800);
        assert_eq!(ttl_for_date_range("lastYear", false).as_secs(), 3600);
        assert_eq!(ttl_for_date_range("whenever", false).as_secs(), 900);
        assert_eq!(ttl_for_date_range("lastYear", true).as_secs(), 900);
    }

    #[test]
    fn test_cache_control_header() {
        assert_eq!(
            cache_control_header(Duration::from_secs(600)),
            "public, s-maxage=600, stale-while-revalidate=1200"
        );
    }
}
