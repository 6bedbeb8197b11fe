use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use service_registry::services::registry::{
    Registry, RegistryConfig, ServiceHealthStatus, ServiceInfo,
};

const T: Duration = Duration::from_secs(30);

fn registry() -> Registry {
    Registry::new(RegistryConfig {
        health_check_interval: T,
        staleness_factor: 2,
    })
}

#[test]
fn register_unregister_scenario() {
    let registry = registry();

    let ack = registry.register(ServiceInfo::new("A").with_service_id("A-1"));
    assert_eq!(ack.service_id, "A-1");

    let all = registry.get_all_services();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "A");

    assert!(registry.unregister("A-1"));
    assert!(!registry.unregister("A-1"));
}

#[test]
fn same_explicit_id_overwrites_instead_of_duplicating() {
    let registry = registry();
    registry.register(ServiceInfo::new("chat").with_service_id("chat-1"));
    registry.register(ServiceInfo::new("chat").with_service_id("chat-1").with_version("1.1"));

    let all = registry.get_all_services();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].version, "1.1");
}

#[test]
fn get_service_projects_caller_fields_only() {
    let registry = registry();
    let info = ServiceInfo::new("auth")
        .with_service_id("auth-1")
        .with_version("0.3.0")
        .with_status(ServiceHealthStatus::Starting)
        .with_metadata("region", "eu")
        .with_address("10.1.0.2", 4000);
    registry.register(info.clone());

    // 投影与注册时提交的信息完全一致，没有额外的内部字段
    assert_eq!(registry.get_service("auth"), Some(info));

    registry.unregister("auth-1");
    assert_eq!(registry.get_service("auth"), None);
}

#[test]
fn unknown_heartbeat_is_a_noop() {
    let registry = registry();
    assert!(!registry.heartbeat("missing-1"));
    assert!(registry.get_all_services().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_record_is_evicted_by_sweep() {
    let registry = registry();
    registry.register(ServiceInfo::new("A").with_service_id("A-1"));

    tokio::time::advance(T * 2).await;
    // 恰好 2T 不算超时
    assert_eq!(registry.sweep_expired(), 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(registry.sweep_expired(), 1);
    assert!(registry.get_all_services().is_empty());
    assert!(!registry.heartbeat("A-1"));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_before_threshold_keeps_record() {
    let registry = registry();
    registry.register(ServiceInfo::new("A").with_service_id("A-1"));
    registry.register(ServiceInfo::new("B").with_service_id("B-1"));

    // 1.9T 时只有 A 发送心跳
    tokio::time::advance(Duration::from_secs(57)).await;
    assert!(registry.heartbeat("A-1"));

    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(registry.sweep_expired(), 1);

    let names: Vec<_> = registry
        .get_all_services()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["A"]);
}

#[tokio::test(start_paused = true)]
async fn staleness_factor_is_independent_of_interval() {
    let registry = Registry::new(RegistryConfig {
        health_check_interval: T,
        staleness_factor: 3,
    });
    registry.register(ServiceInfo::new("A").with_service_id("A-1"));

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(registry.sweep_expired(), 0);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(registry.sweep_expired(), 1);
}

#[tokio::test(start_paused = true)]
async fn background_health_check_evicts_silent_services() {
    let registry = Registry::start(RegistryConfig {
        health_check_interval: T,
        staleness_factor: 2,
    });
    registry.register(ServiceInfo::new("silent").with_service_id("silent-1"));
    registry.register(ServiceInfo::new("chatty").with_service_id("chatty-1"));

    // 每 15 秒心跳一次，与注册方默认节奏一致
    for _ in 0..6 {
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(registry.heartbeat("chatty-1"));
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    let names: Vec<_> = registry
        .get_all_services()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["chatty"]);

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn heartbeat_racing_sweep_is_never_lost() {
    let registry = registry();
    let ids: Vec<String> = (0..32).map(|i| format!("svc-{i}")).collect();
    for id in &ids {
        registry.register(ServiceInfo::new(id.clone()).with_service_id(id.clone()));
    }
    // 全部记录都已超过剔除阈值
    tokio::time::advance(2 * T + Duration::from_secs(1)).await;

    let done = Arc::new(AtomicBool::new(false));
    let sweeper = {
        let registry = registry.clone();
        let done = done.clone();
        tokio::task::spawn_blocking(move || {
            let mut evicted = 0;
            while !done.load(Ordering::SeqCst) {
                evicted += registry.sweep_expired();
                std::thread::yield_now();
            }
            evicted + registry.sweep_expired()
        })
    };

    // 阻塞线程池中的线程与清扫真正并行执行
    let mut beaters = Vec::new();
    for chunk in ids.chunks(8) {
        let registry = registry.clone();
        let chunk = chunk.to_vec();
        beaters.push(tokio::task::spawn_blocking(move || {
            chunk
                .into_iter()
                .map(|id| {
                    std::thread::yield_now();
                    let kept = registry.heartbeat(&id);
                    (id, kept)
                })
                .collect::<Vec<_>>()
        }));
    }

    let mut outcomes = Vec::new();
    for beater in beaters {
        outcomes.extend(beater.await.unwrap());
    }
    done.store(true, Ordering::SeqCst);
    let evicted = sweeper.await.unwrap();

    let kept = outcomes.iter().filter(|(_, kept)| *kept).count();
    assert_eq!(kept + evicted, ids.len());
    assert_eq!(registry.len(), kept);
    for (id, kept) in outcomes {
        // 心跳成功的记录必须仍然存在，失败的必须已被剔除
        assert_eq!(registry.heartbeat(&id), kept, "record {id}");
    }
}
