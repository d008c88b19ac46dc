//! End-to-end behaviour of the report cache across both tiers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fake::Fake;
use fake::faker::company::en::CompanyName;
use serde::{Deserialize, Serialize};
use sfa_cache::remote::{MemoryConnector, MemoryRemote};
use sfa_cache::{
    BackendHealth, CacheConfig, DomainEvent, Lookup, ReportCache, Tier, keys,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DashboardKpi {
    total_sales: f64,
    transactions: u32,
    active_customers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TopCustomer {
    name: String,
    revenue: u64,
}

fn config() -> CacheConfig {
    let mut config = CacheConfig::default();
    config.redis.max_retries = 1;
    config.redis.retry_delay = Duration::from_millis(10);
    config
}

async fn remote_cache() -> (ReportCache, Arc<MemoryRemote>) {
    let remote = Arc::new(MemoryRemote::new());
    let cache = ReportCache::with_connector(
        config(),
        Arc::new(MemoryConnector::new(Arc::clone(&remote))),
    );
    assert_eq!(cache.initialize().await, Some(BackendHealth::Ready));
    (cache, remote)
}

async fn unreachable_cache() -> ReportCache {
    let cache = ReportCache::with_connector(config(), Arc::new(MemoryConnector::unreachable()));
    assert_eq!(cache.initialize().await, Some(BackendHealth::Degraded));
    cache
}

fn kpi() -> DashboardKpi {
    DashboardKpi {
        total_sales: 152_340.5,
        transactions: 812,
        active_customers: 97,
    }
}

#[tokio::test(start_paused = true)]
async fn kpi_expires_after_its_ttl() {
    let cache = unreachable_cache().await;
    let ttl = cache.config().ttl.dashboard_kpi;
    assert_eq!(ttl, Duration::from_secs(300));

    cache.set(keys::DASHBOARD_KPI, &kpi(), Some(ttl)).await;
    tokio::time::advance(Duration::from_secs(200)).await;
    assert_eq!(cache.get::<DashboardKpi>(keys::DASHBOARD_KPI).await, Some(kpi()));

    tokio::time::advance(Duration::from_secs(101)).await;
    assert_eq!(cache.get::<DashboardKpi>(keys::DASHBOARD_KPI).await, None);
}

#[tokio::test(start_paused = true)]
async fn remote_entries_expire_too() {
    let (cache, remote) = remote_cache().await;

    cache.set("dashboard:kpi", &kpi(), Some(Duration::from_secs(300))).await;
    assert!(remote.contains_key("dashboard:kpi"));

    tokio::time::advance(Duration::from_secs(301)).await;
    let lookup = cache.lookup::<DashboardKpi>("dashboard:kpi").await;
    assert!(matches!(lookup, Lookup::Miss(Tier::Remote)));
}

#[tokio::test]
async fn new_transaction_spares_top_customers() {
    for (cache, _remote) in [remote_cache().await, (unreachable_cache().await, Arc::default())] {
        cache.set(keys::DASHBOARD_KPI, &kpi(), None).await;
        cache.set(&keys::sales_trend(7), &vec![1, 2, 3], None).await;
        cache.set("transactions:recent:50", &vec!["t1"], None).await;
        cache.set(&keys::top_customers(10), &vec!["acme"], None).await;

        let report = cache.invalidate_event(DomainEvent::NewTransaction).await;
        assert!(report.is_complete());
        assert_eq!(report.removed(), 3);

        assert_eq!(cache.get::<DashboardKpi>(keys::DASHBOARD_KPI).await, None);
        assert_eq!(cache.get::<Vec<u32>>(&keys::sales_trend(7)).await, None);
        assert_eq!(cache.get::<Vec<String>>("transactions:recent:50").await, None);
        assert_eq!(
            cache.get::<Vec<String>>(&keys::top_customers(10)).await,
            Some(vec!["acme".to_string()])
        );
    }
}

#[tokio::test]
async fn customer_update_clears_top_customers_and_kpi() {
    let (cache, remote) = remote_cache().await;
    cache.set(keys::DASHBOARD_KPI, &kpi(), None).await;
    cache.set(&keys::top_customers(10), &vec!["acme"], None).await;
    cache.set(&keys::top_products(10), &vec!["widget"], None).await;

    let report = cache.invalidate_group("customer-update").await;
    assert_eq!(report.removed(), 2);
    assert!(!remote.contains_key("dashboard:kpi"));
    assert!(remote.contains_key("products:top:10"));
}

#[tokio::test]
async fn unreachable_remote_still_serves() {
    let cache = unreachable_cache().await;

    let outcome = cache.set("k", &"v", None).await;
    assert_eq!(outcome.tier(), Some(Tier::Fallback));

    let lookup = cache.lookup::<String>("k").await;
    assert!(matches!(lookup, Lookup::Hit(ref v, Tier::Fallback) if v == "v"));
}

#[tokio::test]
async fn remote_outage_mid_flight_is_transparent() {
    let (cache, remote) = remote_cache().await;
    let calls = &AtomicUsize::new(0);

    let compute = || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        kpi()
    };
    assert_eq!(cache.get_or_set("dashboard:kpi", None, compute).await, kpi());

    remote.set_failing(true);
    // Remote read fails; the value is recomputed and lands in the fallback tier
    let compute = || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        kpi()
    };
    assert_eq!(cache.get_or_set("dashboard:kpi", None, compute).await, kpi());
    assert_eq!(cache.backend_health(), Some(BackendHealth::Degraded));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = cache.stats();
    assert!(stats.errors >= 1);
    assert_eq!(stats.fallback_entries, 1);
}

#[tokio::test]
async fn get_or_set_populates_once() {
    let (cache, remote) = remote_cache().await;
    let calls = &AtomicUsize::new(0);

    for _ in 0..3 {
        let value = cache
            .get_or_set(&keys::top_customers(5), None, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                vec![TopCustomer {
                    name: "Acme".into(),
                    revenue: 9_000,
                }]
            })
            .await;
        assert_eq!(value.len(), 1);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(remote.contains_key("customers:top:5"));
}

#[tokio::test]
async fn generated_reports_round_trip() {
    let (cache, _remote) = remote_cache().await;

    let customers: Vec<TopCustomer> = (0..10)
        .map(|_| TopCustomer {
            name: CompanyName().fake(),
            revenue: (1_000..1_000_000).fake(),
        })
        .collect();

    assert!(cache.cache_top_customers(10, &customers).await.is_applied());
    assert_eq!(
        cache.cached_top_customers::<Vec<TopCustomer>>(10).await,
        Some(customers)
    );
}

#[tokio::test]
async fn pattern_invalidation_is_anchored() {
    let cache = ReportCache::fallback_only(config());
    cache.initialize().await;

    cache.set("sales:trend:7", &1, None).await;
    cache.set("sales:trend:30", &1, None).await;
    cache.set("archive:sales:trend:7", &1, None).await;

    let outcome = cache.invalidate_pattern("sales:trend:*").await;
    assert_eq!(outcome.affected(), 2);
    assert_eq!(cache.get::<u32>("archive:sales:trend:7").await, Some(1));
}
