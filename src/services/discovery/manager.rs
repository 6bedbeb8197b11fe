use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::error::DiscoveryError;
use super::factory::ConnectionFactory;
use super::source::RegistrySource;
use super::types::{ConnectionSlot, DiscoveryConfig, ReconcileReport};
use crate::services::registry::ServiceInfo;

type ClientPool<C> = Arc<DashMap<String, ConnectionSlot<C>>>;

enum OpenOutcome {
    Opened,
    Failed,
    // 连接建立期间槽位已被移除，新连接随即关闭
    Discarded,
}

enum SlotAction<C> {
    Keep,
    Open,
    Rebind { connection: C, previous: String },
}

/// 服务发现：让出站连接池与注册表成员保持一致
///
/// 每个服务名最多持有一个连接。连接的建立与关闭各自在独立任务中执行并带超时，
/// 某个服务卡住只会推迟该服务自身的可用时间。
pub struct ServiceDiscovery<S, F: ConnectionFactory> {
    source: Arc<S>,
    factory: Arc<F>,
    clients: ClientPool<F::Connection>,
    config: DiscoveryConfig,
    // 同一时刻只允许一轮对账
    reconcile_lock: Arc<Mutex<()>>,
    task_tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl<S, F: ConnectionFactory> Clone for ServiceDiscovery<S, F> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            factory: self.factory.clone(),
            clients: self.clients.clone(),
            config: self.config.clone(),
            reconcile_lock: self.reconcile_lock.clone(),
            task_tracker: self.task_tracker.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S, F: ConnectionFactory> fmt::Debug for ServiceDiscovery<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDiscovery")
            .field("config", &self.config)
            .field("pooled", &self.clients.len())
            .finish_non_exhaustive()
    }
}

impl<S: RegistrySource, F: ConnectionFactory> ServiceDiscovery<S, F> {
    /// 创建服务发现组件，不执行对账也不启动定时器
    pub fn new(source: Arc<S>, factory: Arc<F>, config: DiscoveryConfig) -> Self {
        Self {
            source,
            factory,
            clients: Arc::new(DashMap::new()),
            config,
            reconcile_lock: Arc::new(Mutex::new(())),
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 同步执行首次对账后启动定期对账
    pub async fn start(source: Arc<S>, factory: Arc<F>, config: DiscoveryConfig) -> Self {
        let discovery = Self::new(source, factory, config);
        let report = discovery.reconcile().await;
        tracing::info!(
            connected = report.opened.len(),
            failed = report.failed.len(),
            "Initial service discovery completed"
        );
        discovery.start_discovery_loop();
        discovery
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    fn start_discovery_loop(&self) {
        let discovery = self.clone();
        let shutdown = self.shutdown.clone();
        let period = self.config.interval;

        self.task_tracker.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let report = discovery.reconcile().await;
                        if !report.is_noop() {
                            tracing::info!(
                                opened = ?report.opened,
                                failed = ?report.failed,
                                closed = ?report.closed,
                                abandoned = ?report.abandoned,
                                rebound = ?report.rebound,
                                "Service discovery cycle changed connection pool"
                            );
                        }
                    }
                }
            }
        });
    }

    /// 执行一轮对账：为新出现的服务名建立连接，关闭已消失服务名的连接，
    /// 所选实例的目标地址变化时改连新地址
    pub async fn reconcile(&self) -> ReconcileReport {
        let _guard = self.reconcile_lock.lock().await;
        let mut report = ReconcileReport::default();

        let services = match self.source.get_all_services().await {
            Ok(services) => services,
            Err(e) => {
                // 拿不到快照时保留现有连接，下个周期再试
                tracing::error!(error = %e, "Service discovery failed");
                return report;
            }
        };

        // 同名实例只取最早注册的那个
        let mut names = HashSet::new();
        let wanted: Vec<ServiceInfo> = services
            .into_iter()
            .filter(|service| names.insert(service.name.clone()))
            .collect();

        let mut opening = Vec::new();
        let mut retiring = Vec::new();
        for service in wanted {
            let target = self.factory.target(&service);
            let action = match self.clients.entry(service.name.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(ConnectionSlot::Connecting);
                    SlotAction::Open
                }
                Entry::Occupied(mut entry) => {
                    let moved = matches!(
                        entry.get(),
                        ConnectionSlot::Open { target: current, .. } if *current != target
                    );
                    if moved {
                        match entry.insert(ConnectionSlot::Connecting) {
                            ConnectionSlot::Open { connection, target: previous } => {
                                SlotAction::Rebind { connection, previous }
                            }
                            _ => SlotAction::Keep,
                        }
                    } else {
                        SlotAction::Keep
                    }
                }
            };

            match action {
                SlotAction::Keep => {}
                SlotAction::Open => opening.push(self.spawn_open(service, target)),
                SlotAction::Rebind {
                    connection,
                    previous,
                } => {
                    tracing::info!(
                        service_name = %service.name,
                        from = %previous,
                        to = %target,
                        "Service target changed, reconnecting"
                    );
                    report.rebound.push(service.name.clone());
                    retiring.push(self.spawn_close(&service.name, connection, false));
                    opening.push(self.spawn_open(service, target));
                }
            }
        }

        let stale: Vec<String> = self
            .clients
            .iter()
            .filter(|entry| !names.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let closing: Vec<_> = stale
            .into_iter()
            .filter_map(|name| self.begin_close(&name))
            .collect();

        for result in join_all(opening).await {
            match result {
                Ok((name, OpenOutcome::Opened)) => report.opened.push(name),
                Ok((name, OpenOutcome::Failed)) => report.failed.push(name),
                Ok((_, OpenOutcome::Discarded)) => {}
                Err(e) => tracing::error!(error = %e, "Connection task panicked"),
            }
        }

        for result in join_all(closing).await {
            match result {
                Ok((name, true)) => report.closed.push(name),
                Ok((name, false)) => report.abandoned.push(name),
                Err(e) => tracing::error!(error = %e, "Close task panicked"),
            }
        }

        for result in join_all(retiring).await {
            match result {
                Ok((_, true)) => {}
                Ok((name, false)) => report.abandoned.push(name),
                Err(e) => tracing::error!(error = %e, "Close task panicked"),
            }
        }

        report
    }

    fn spawn_open(
        &self,
        service: ServiceInfo,
        target: String,
    ) -> JoinHandle<(String, OpenOutcome)> {
        let factory = self.factory.clone();
        let clients = self.clients.clone();
        let connect_timeout = self.config.connect_timeout;
        let close_timeout = self.config.close_timeout;

        self.task_tracker.spawn(async move {
            let service_name = service.name.clone();
            let result = match tokio::time::timeout(connect_timeout, factory.open(&service)).await
            {
                Ok(result) => result,
                Err(_) => Err(DiscoveryError::Timeout {
                    service_name: service_name.clone(),
                    timeout: connect_timeout,
                }),
            };

            let connection = match result {
                Ok(connection) => connection,
                Err(e) => {
                    clients.remove_if(&service_name, |_, slot| {
                        matches!(slot, ConnectionSlot::Connecting)
                    });
                    tracing::error!(
                        service_name = %service_name,
                        target = %target,
                        error = %e,
                        "Failed to register client for service"
                    );
                    return (service_name, OpenOutcome::Failed);
                }
            };

            let installed = match clients.get_mut(&service_name) {
                Some(mut slot) => {
                    if matches!(*slot, ConnectionSlot::Connecting) {
                        *slot = ConnectionSlot::Open {
                            connection: connection.clone(),
                            target: target.clone(),
                        };
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };

            if installed {
                tracing::info!(
                    service_name = %service_name,
                    target = %target,
                    "Registered client for service"
                );
                (service_name, OpenOutcome::Opened)
            } else {
                tracing::warn!(
                    service_name = %service_name,
                    "Service disappeared while connecting, discarding new connection"
                );
                Self::close_connection(&factory, &service_name, connection, close_timeout).await;
                (service_name, OpenOutcome::Discarded)
            }
        })
    }

    // Open -> Closing，之后 get_client 对该服务名返回 None
    fn begin_close(&self, service_name: &str) -> Option<JoinHandle<(String, bool)>> {
        let previous = {
            let mut slot = self.clients.get_mut(service_name)?;
            std::mem::replace(slot.value_mut(), ConnectionSlot::Closing)
        };

        match previous {
            ConnectionSlot::Open { connection, .. } => {
                Some(self.spawn_close(service_name, connection, true))
            }
            ConnectionSlot::Connecting => {
                // 建立中的连接会在完成时发现槽位已不存在并自行关闭
                self.clients
                    .remove_if(service_name, |_, slot| matches!(slot, ConnectionSlot::Closing));
                None
            }
            ConnectionSlot::Closing => None,
        }
    }

    // release_slot 为 false 时槽位已被新连接占用，只关闭旧连接
    fn spawn_close(
        &self,
        service_name: &str,
        connection: F::Connection,
        release_slot: bool,
    ) -> JoinHandle<(String, bool)> {
        let factory = self.factory.clone();
        let clients = self.clients.clone();
        let close_timeout = self.config.close_timeout;
        let service_name = service_name.to_string();

        self.task_tracker.spawn(async move {
            let closed =
                Self::close_connection(&factory, &service_name, connection, close_timeout).await;
            if release_slot {
                clients.remove_if(&service_name, |_, slot| matches!(slot, ConnectionSlot::Closing));
                tracing::info!(service_name = %service_name, "Removed client for service");
            }
            (service_name, closed)
        })
    }

    // 关闭失败或超时只记录日志，不重试
    async fn close_connection(
        factory: &Arc<F>,
        service_name: &str,
        connection: F::Connection,
        close_timeout: Duration,
    ) -> bool {
        match tokio::time::timeout(close_timeout, factory.close(service_name, connection)).await {
            Ok(Ok(())) => {
                tracing::debug!(service_name = %service_name, "Closed connection for service");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(
                    service_name = %service_name,
                    error = %e,
                    "Failed to close connection for service"
                );
                false
            }
            Err(_) => {
                tracing::error!(
                    service_name = %service_name,
                    timeout_secs = close_timeout.as_secs(),
                    "Timed out closing connection for service, abandoning it"
                );
                false
            }
        }
    }

    /// 获取服务名对应的已建立连接；建立中或关闭中的连接返回 None
    pub fn get_client(&self, service_name: &str) -> Option<F::Connection> {
        let slot = self.clients.get(service_name)?;
        match slot.value() {
            ConnectionSlot::Open { connection, .. } => Some(connection.clone()),
            ConnectionSlot::Connecting | ConnectionSlot::Closing => None,
        }
    }

    /// 当前持有连接的服务名
    pub fn connected_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .clients
            .iter()
            .filter(|entry| matches!(entry.value(), ConnectionSlot::Open { .. }))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// 停止定期对账并关闭全部连接
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        let _guard = self.reconcile_lock.lock().await;
        let names: Vec<String> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        let closing: Vec<_> = names
            .iter()
            .filter_map(|name| self.begin_close(name))
            .collect();

        let closed = join_all(closing)
            .await
            .into_iter()
            .filter(|result| matches!(result, Ok((_, true))))
            .count();
        self.clients.clear();

        tracing::info!(closed_connections = closed, "Service discovery stopped");
    }
}
