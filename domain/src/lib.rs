//! Domain layer of the social platform: who is making a request, where they
//! may go, and the hosted backend services those answers come from.

pub use events::Id;

pub mod credential;
pub mod error;
pub mod gateway;
pub mod message;
pub mod message_change;
pub mod route_policy;
pub mod session;
pub mod user_session;
