use super::service::Registry;
use super::types::{RegistrationAck, ServiceInfo};

pub const SERVICE_REGISTER: &str = "service.register";
pub const SERVICE_UNREGISTER: &str = "service.unregister";
pub const SERVICE_HEARTBEAT: &str = "service.heartbeat";
pub const SERVICE_GET: &str = "service.get";
pub const SERVICE_GET_ALL: &str = "service.getAll";

/// 注册表可处理的全部消息
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryMessage {
    Register(ServiceInfo),
    Unregister { service_id: String },
    Heartbeat { service_id: String },
    GetService { service_name: String },
    GetAllServices,
}

impl RegistryMessage {
    pub fn pattern(&self) -> &'static str {
        match self {
            RegistryMessage::Register(_) => SERVICE_REGISTER,
            RegistryMessage::Unregister { .. } => SERVICE_UNREGISTER,
            RegistryMessage::Heartbeat { .. } => SERVICE_HEARTBEAT,
            RegistryMessage::GetService { .. } => SERVICE_GET,
            RegistryMessage::GetAllServices => SERVICE_GET_ALL,
        }
    }

    /// 事件无需回复，查询需要回复
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            RegistryMessage::Register(_)
                | RegistryMessage::Unregister { .. }
                | RegistryMessage::Heartbeat { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryReply {
    Registered(RegistrationAck),
    Unregistered(bool),
    HeartbeatAccepted(bool),
    Service(Option<ServiceInfo>),
    Services(Vec<ServiceInfo>),
}

impl Registry {
    /// 分发一条消息到对应的注册表操作
    pub fn handle(&self, message: RegistryMessage) -> RegistryReply {
        let pattern = message.pattern();
        match message {
            RegistryMessage::Register(info) => {
                tracing::info!(pattern, service_name = %info.name, "Service registration request received");
                RegistryReply::Registered(self.register(info))
            }
            RegistryMessage::Unregister { service_id } => {
                tracing::info!(pattern, service_id = %service_id, "Service unregistration request received");
                RegistryReply::Unregistered(self.unregister(&service_id))
            }
            RegistryMessage::Heartbeat { service_id } => {
                tracing::debug!(pattern, service_id = %service_id, "Heartbeat received from service");
                RegistryReply::HeartbeatAccepted(self.heartbeat(&service_id))
            }
            RegistryMessage::GetService { service_name } => {
                tracing::debug!(pattern, service_name = %service_name, "Service request received");
                RegistryReply::Service(self.get_service(&service_name))
            }
            RegistryMessage::GetAllServices => {
                tracing::debug!(pattern, "All services request received");
                RegistryReply::Services(self.get_all_services())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_match_wire_names() {
        let register = RegistryMessage::Register(ServiceInfo::new("a"));
        assert_eq!(register.pattern(), "service.register");
        assert!(register.is_event());

        let get_all = RegistryMessage::GetAllServices;
        assert_eq!(get_all.pattern(), "service.getAll");
        assert!(!get_all.is_event());
    }

    #[test]
    fn handle_routes_to_registry_operations() {
        let registry = Registry::default();

        let reply = registry.handle(RegistryMessage::Register(
            ServiceInfo::new("A").with_service_id("A-1"),
        ));
        assert_eq!(
            reply,
            RegistryReply::Registered(RegistrationAck {
                service_id: "A-1".into()
            })
        );

        assert_eq!(
            registry.handle(RegistryMessage::Heartbeat {
                service_id: "A-1".into()
            }),
            RegistryReply::HeartbeatAccepted(true)
        );

        match registry.handle(RegistryMessage::GetService {
            service_name: "A".into(),
        }) {
            RegistryReply::Service(Some(info)) => assert_eq!(info.name, "A"),
            other => panic!("unexpected reply: {other:?}"),
        }

        assert_eq!(
            registry.handle(RegistryMessage::Unregister {
                service_id: "A-1".into()
            }),
            RegistryReply::Unregistered(true)
        );
        assert_eq!(
            registry.handle(RegistryMessage::GetAllServices),
            RegistryReply::Services(Vec::new())
        );
    }
}
