pub mod connection_cache;
pub mod providers;
pub mod wallet_export;
pub mod wallet_manager;

pub use connection_cache::ConnectionCache;
pub use providers::{
    create_provider, ChainProvider, ConnectionState, HttpTransportFactory, Signer,
    TransportFactory,
};
pub use wallet_export::{ExportBundle, ExportFormat};
pub use wallet_manager::{CreateWalletOptions, StorageOptions, WalletManager};
