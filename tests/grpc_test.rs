use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tonic::transport::Server;

use service_registry::config::Config;
use service_registry::registry::registry_service_server::RegistryServiceServer;
use service_registry::registry::{GetAllServicesRequest, registry_service_client::RegistryServiceClient};
use service_registry::server;
use service_registry::services::client::{
    AgentConfig, RegistrationAgent, RegistryClient, RegistryClientError,
};
use service_registry::services::discovery::{
    DiscoveryConfig, GrpcConnectionFactory, ServiceDiscovery,
};
use service_registry::services::registry::{
    Registry, RegistryGrpcService, SERVICE_ID_METADATA_KEY, ServiceInfo,
};

fn free_addr() -> std::net::SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr")
}

async fn connect(addr: std::net::SocketAddr) -> RegistryClient {
    let url = format!("http://{addr}");
    for _ in 0..100 {
        if let Ok(client) = RegistryClient::connect(&url).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("registry at {url} never became reachable");
}

// 直接用给定的注册表启动 gRPC 服务，便于测试中观察注册表状态
fn serve(registry: Registry, addr: std::net::SocketAddr) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(
        Server::builder()
            .add_service(RegistryServiceServer::new(RegistryGrpcService::new(registry)))
            .serve_with_shutdown(addr, async {
                rx.await.ok();
            }),
    );
    tx
}

#[tokio::test(flavor = "multi_thread")]
async fn server_handles_full_lifecycle_and_shuts_down() {
    let addr = free_addr();
    let config = Config {
        listen_addr: addr.to_string(),
        ..Default::default()
    };

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server::run(config, async {
        rx.await.ok();
    }));
    let client = connect(addr).await;

    let ack = client
        .register(ServiceInfo::new("A").with_service_id("A-1").with_version("1.0"))
        .await
        .unwrap();
    assert_eq!(ack.service_id, "A-1");

    let all = client.get_all_services().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "A");
    assert_eq!(all[0].version, "1.0");

    assert!(client.heartbeat("A-1").await.unwrap());
    assert!(!client.heartbeat("B-1").await.unwrap());

    assert!(client.unregister("A-1").await.unwrap());
    assert!(!client.unregister("A-1").await.unwrap());
    assert_eq!(client.get_service("A").await.unwrap(), None);

    tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_registration_is_rejected_at_the_boundary() {
    let registry = Registry::default();
    let addr = free_addr();
    let _shutdown = serve(registry.clone(), addr);
    let client = connect(addr).await;

    match client.register(ServiceInfo::new("")).await {
        Err(RegistryClientError::Grpc(status)) => {
            assert_eq!(status.code(), tonic::Code::InvalidArgument);
        }
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
    assert!(registry.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn agent_registers_and_unregisters() {
    let registry = Registry::default();
    let addr = free_addr();
    let _shutdown = serve(registry.clone(), addr);
    let client = connect(addr).await;

    let agent = RegistrationAgent::new(
        client,
        AgentConfig {
            service_name: "chat".into(),
            version: "2.1.0".into(),
            heartbeat_interval: Duration::from_millis(50),
            ..Default::default()
        },
    );
    agent.start().await.unwrap();

    let info = registry.get_service("chat").expect("agent should be registered");
    assert_eq!(info.version, "2.1.0");
    assert_eq!(
        info.metadata.get(SERVICE_ID_METADATA_KEY).map(String::as_str),
        Some(agent.service_id())
    );
    assert!(info.metadata.contains_key("startTime"));

    agent.stop().await;
    assert!(registry.get_service("chat").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn agent_registers_again_after_eviction() {
    let registry = Registry::default();
    let addr = free_addr();
    let _shutdown = serve(registry.clone(), addr);
    let client = connect(addr).await;

    let agent = RegistrationAgent::new(
        client,
        AgentConfig {
            service_name: "bot".into(),
            heartbeat_interval: Duration::from_millis(50),
            ..Default::default()
        },
    );
    agent.start().await.unwrap();
    assert!(registry.unregister(agent.service_id()));

    let mut restored = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if registry.get_service("bot").is_some() {
            restored = true;
            break;
        }
    }
    assert!(restored, "agent should re-register after its record disappeared");

    agent.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn discovery_connects_to_registered_address_through_remote_registry() {
    let registry = Registry::default();
    let addr = free_addr();
    let _shutdown = serve(registry.clone(), addr);
    let client = connect(addr).await;

    // 注册中心自身作为被发现的服务
    client
        .register(ServiceInfo::new("registry").with_address("127.0.0.1", addr.port()))
        .await
        .unwrap();

    let factory = Arc::new(GrpcConnectionFactory::new(
        "http://127.0.0.1:1",
        Duration::from_secs(2),
    ));
    let discovery = ServiceDiscovery::start(
        Arc::new(client.clone()),
        factory,
        DiscoveryConfig {
            interval: Duration::from_secs(3600),
            ..Default::default()
        },
    )
    .await;

    let connection = discovery.get_client("registry").expect("connection should be open");
    assert_eq!(connection.endpoint, format!("http://127.0.0.1:{}", addr.port()));

    let mut raw = RegistryServiceClient::new(connection.channel);
    let services = raw
        .get_all_services(GetAllServicesRequest {})
        .await
        .unwrap()
        .into_inner()
        .services;
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, "registry");

    discovery.shutdown().await;
    assert!(discovery.get_client("registry").is_none());
}
