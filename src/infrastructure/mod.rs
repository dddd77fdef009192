pub mod encryption;
pub mod fs_secure;
pub mod logging;
pub mod pbkdf2;
pub mod rpc;

pub use logging::{init_default_logging, init_logging, LoggingGuard};
pub use rpc::{HttpRpcTransport, RpcTransport};
