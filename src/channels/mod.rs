pub mod discord;
pub mod dispatcher;
pub mod types;


pub use dispatcher::MessageDispatcher;
pub use types::{DispatchResult, NormalizedMessage};
