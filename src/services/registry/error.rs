use tonic::Status;

/// 注册表边界校验错误
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid payload: field `{field}` {reason}")]
    InvalidPayload { field: &'static str, reason: String },
}

impl RegistryError {
    pub fn missing(field: &'static str) -> Self {
        Self::InvalidPayload {
            field,
            reason: "is required".to_string(),
        }
    }
}

impl From<RegistryError> for Status {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidPayload { .. } => Status::invalid_argument(err.to_string()),
        }
    }
}
