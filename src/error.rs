use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("No access key available for this record type")]
    NoAccess,

    #[error("Version conflict on safe update or delete")]
    Conflict,

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Signing requires a version 2 configuration with signing keys")]
    SignatureUnavailable,

    #[error("Email-based client lookup is not supported")]
    EmailLookupUnsupported,

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid argument: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Transport(format!("request timed out: {err}"))
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
