pub(crate) mod health_check_controller;
pub(crate) mod message_controller;
pub(crate) mod session_controller;
pub(crate) mod user_session_controller;
pub(crate) mod webhook_controller;
