pub mod history;
pub mod session;

pub use history::ChatHistory;
pub use session::Conversation;
