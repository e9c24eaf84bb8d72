pub mod climate;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod find_button;
pub mod io;
pub mod load_button;
pub mod messaging;
pub mod node;
pub mod presence;
pub mod topics;
pub mod types;

pub use climate::FrameCache;
pub use config::{LineConfig, MonitorConfig, NetworkConfig, NodeConfig};
pub use error::{LinkError, SensorError};
pub use io::{ClimateSensor, DigitalInput, Indicator, LineIo, Publisher, RangeSensor};
pub use messaging::SessionOptions;
pub use node::LineNode;
pub use topics::*;
pub use types::{ConnectivityState, LineSnapshot, LineState, MessagingEvent, Publication};
