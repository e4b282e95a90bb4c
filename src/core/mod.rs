//! 核心层：错误分类、错误恢复、后台执行宿主

pub mod error;
pub mod host;
pub mod recovery;

pub use error::{AgentError, RecoveryAction, SessionError};
pub use host::{ExecutionHost, HostHandle, HostRegistry};
pub use recovery::RecoveryEngine;
