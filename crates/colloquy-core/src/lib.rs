pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use bus::{EventBus, Subscription};
pub use config::ColloquyConfig;
pub use error::{ColloquyError, Result, TransportFault};
pub use events::ConversationEvent;
pub use types::*;
