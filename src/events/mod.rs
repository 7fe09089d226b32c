pub mod message;
pub mod twitch;

pub use message::handle_message;
pub use twitch::run_twitch;
