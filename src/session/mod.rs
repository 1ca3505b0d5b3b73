pub mod gateway;
pub mod poller;
pub mod relay;
pub mod store;

pub use gateway::SessionGateway;
pub use poller::{Phase, SessionView};
pub use relay::TokenRelay;
pub use store::SessionStore;
