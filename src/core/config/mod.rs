pub mod data;
pub mod io;

pub use data::{ClientSettings, Config, GatewaySettings};
pub use io::ConfigError;
