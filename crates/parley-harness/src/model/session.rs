//! Model session.

/// A connected client in the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSession {
    /// Display name, once chosen.
    pub username: Option<String>,
    /// Model time of the last accepted post.
    pub last_post_ms: Option<u64>,
}
