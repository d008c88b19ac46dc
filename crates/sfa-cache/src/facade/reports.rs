//! Typed helpers for the well-known dashboard reports.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::ReportCache;
use crate::keys;
use crate::outcome::WriteOutcome;
use crate::ttl::TtlPolicy;

impl ReportCache {
    async fn cache_report<T: Serialize + ?Sized>(
        &self,
        key: &str,
        policy: TtlPolicy,
        value: &T,
    ) -> WriteOutcome {
        let ttl = self.config.ttl.ttl_for(policy);
        self.set(key, value, Some(ttl)).await
    }

    pub async fn cache_kpi<T: Serialize + ?Sized>(&self, kpi: &T) -> WriteOutcome {
        self.cache_report(keys::DASHBOARD_KPI, TtlPolicy::DashboardKpi, kpi)
            .await
    }

    pub async fn cached_kpi<T: DeserializeOwned>(&self) -> Option<T> {
        self.get(keys::DASHBOARD_KPI).await
    }

    pub async fn cache_sales_trend<T: Serialize + ?Sized>(
        &self,
        days: u32,
        trend: &T,
    ) -> WriteOutcome {
        self.cache_report(&keys::sales_trend(days), TtlPolicy::SalesTrend, trend)
            .await
    }

    pub async fn cached_sales_trend<T: DeserializeOwned>(&self, days: u32) -> Option<T> {
        self.get(&keys::sales_trend(days)).await
    }

    pub async fn cache_top_customers<T: Serialize + ?Sized>(
        &self,
        limit: usize,
        customers: &T,
    ) -> WriteOutcome {
        self.cache_report(
            &keys::top_customers(limit),
            TtlPolicy::TopCustomers,
            customers,
        )
        .await
    }

    pub async fn cached_top_customers<T: DeserializeOwned>(&self, limit: usize) -> Option<T> {
        self.get(&keys::top_customers(limit)).await
    }

    pub async fn cache_top_products<T: Serialize + ?Sized>(
        &self,
        limit: usize,
        products: &T,
    ) -> WriteOutcome {
        self.cache_report(&keys::top_products(limit), TtlPolicy::TopProducts, products)
            .await
    }

    pub async fn cached_top_products<T: DeserializeOwned>(&self, limit: usize) -> Option<T> {
        self.get(&keys::top_products(limit)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::CacheConfig;
    use crate::facade::ReportCache;

    #[tokio::test(start_paused = true)]
    async fn test_kpi_uses_kpi_ttl() {
        let cache = ReportCache::fallback_only(CacheConfig::default());
        cache.initialize().await;

        assert!(cache.cache_kpi(&serde_json::json!({"sales": 10})).await.is_applied());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.cached_kpi::<serde_json::Value>().await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.cached_kpi::<serde_json::Value>().await.is_none());
    }

    #[tokio::test]
    async fn test_helpers_use_distinct_keys() {
        let cache = ReportCache::fallback_only(CacheConfig::default());
        cache.initialize().await;

        cache.cache_top_customers(10, &vec!["acme"]).await;
        cache.cache_top_products(10, &vec!["widget"]).await;
        cache.cache_sales_trend(30, &vec![1.5, 2.5]).await;

        assert_eq!(
            cache.cached_top_customers::<Vec<String>>(10).await,
            Some(vec!["acme".to_string()])
        );
        assert_eq!(
            cache.cached_top_products::<Vec<String>>(10).await,
            Some(vec!["widget".to_string()])
        );
        assert_eq!(cache.cached_top_customers::<Vec<String>>(5).await, None);
        assert_eq!(
            cache.cached_sales_trend::<Vec<f64>>(30).await,
            Some(vec![1.5, 2.5])
        );
    }
}
