pub mod decode;
pub mod relay_client;

pub use relay_client::RelayClient;
