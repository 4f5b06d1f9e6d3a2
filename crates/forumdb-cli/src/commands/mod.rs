//! Command handlers for forumctl
//!
//! - inspect: read-only views of forums, threads, posts and members
//! - service: status and clear

pub mod inspect;
pub mod service;

pub use inspect::{PostsArgs, UsersArgs};
