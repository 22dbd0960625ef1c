pub mod config;
pub mod gateway;
pub mod input;
pub mod monitor;
pub mod session;
pub mod types;

pub use config::{ChatConfig, ConfigError, PayloadKind};
pub use gateway::{ChatError, ErrorCode, Gateway, HttpGateway};
pub use session::{ChatState, SessionStore, SendOutcome};
