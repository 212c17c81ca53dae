//! User directory
//!
//! Conversations bind a [`User`] for chat personalization. There is no
//! authentication; the directory is an injected [`UserStore`].

mod store;

pub use store::{InMemoryUserStore, User, UserStore};
