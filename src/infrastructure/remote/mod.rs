mod connector;
pub mod wire;

pub use connector::{HttpConnectorFactory, HttpRemoteConnector, StaticCredentials};
