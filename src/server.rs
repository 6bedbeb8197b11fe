use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tonic::transport::Server;

use crate::config::Config;
use crate::registry::registry_service_server::RegistryServiceServer;
use crate::services::discovery::{GrpcConnectionFactory, ServiceDiscovery};
use crate::services::registry::{Registry, RegistryGrpcService};

/// 运行注册中心：启动过期检查与服务发现，提供 gRPC 入口，收到关闭信号后依次退出
pub async fn run<F>(config: Config, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send,
{
    let addr: SocketAddr = config.listen_addr.parse()?;

    // 初始化服务注册表
    let registry = Registry::start(config.registry_config());

    let factory = Arc::new(GrpcConnectionFactory::new(
        config.broker_url(),
        Duration::from_secs(config.connect_timeout_secs),
    ));
    let discovery = ServiceDiscovery::start(
        Arc::new(registry.clone()),
        factory,
        config.discovery_config(),
    )
    .await;

    tracing::info!(%addr, "Registry server listening");

    let served = Server::builder()
        .add_service(RegistryServiceServer::new(RegistryGrpcService::new(
            registry.clone(),
        )))
        .serve_with_shutdown(addr, shutdown)
        .await;

    // 无论服务是否异常退出都释放连接与定时任务
    discovery.shutdown().await;
    registry.shutdown().await;

    served?;
    tracing::info!("Registry server stopped");
    Ok(())
}

/// 等待 Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
