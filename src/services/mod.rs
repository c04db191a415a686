pub mod access_guard;
pub mod conversation_service;
pub mod message_service;
pub mod participant_service;
pub mod presence;
pub mod read_state;

pub use access_guard::ConversationAccess;
pub use conversation_service::{ConversationStore, CreateConversation};
pub use message_service::{AppendMessage, MessageLog, MessagePolicy};
pub use participant_service::{ParticipantRegistry, RemovalOutcome};
pub use presence::PresenceBroadcaster;
pub use read_state::ReadStateTracker;
