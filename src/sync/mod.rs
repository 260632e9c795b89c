pub mod cache;
pub mod client;
pub mod engine;
pub mod error;
pub mod session;

pub use cache::{Merge, MessageCache};
pub use client::SyncClient;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use session::{ConversationSession, SessionState};
