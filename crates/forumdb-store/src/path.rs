//! Materialized Post Paths
//!
//! Every post stores the ids of its ancestors followed by its own id:
//!
//! ```text
//! 5              root post 5            path = [5]
//! ├── 6          reply to 5             path = [5, 6]
//! │   └── 9      reply to 6             path = [5, 6, 9]
//! └── 7          reply to 5             path = [5, 7]
//! 8              root post 8            path = [8]
//! ```
//!
//! Comparing paths lexicographically (a proper prefix sorts first) yields the
//! depth-first pre-order of the thread: `[5] < [5,6] < [5,6,9] < [5,7] < [8]`.
//!
//! ## Storage Encoding
//!
//! Paths are stored as raw bytes: each id as 8 big-endian bytes, concatenated.
//! Post ids are positive, so byte-wise comparison of two encodings (what SQLite
//! does for BLOB and PostgreSQL for BYTEA) is exactly the lexicographic
//! comparison of the id sequences. The database can therefore `ORDER BY path`
//! and compare against a cursor path without decoding anything.

use crate::error::{ForumError, Result};
use crate::pagination::Direction;
use std::cmp::Ordering;

const ID_WIDTH: usize = std::mem::size_of::<i64>();

/// Ancestry path of a post, ending with the post's own id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PostPath(Vec<i64>);

impl PostPath {
    /// Path of a root post.
    pub fn root(id: i64) -> Self {
        PostPath(vec![id])
    }

    /// Path of a reply with id `id` whose parent has this path.
    pub fn child(&self, id: i64) -> Self {
        let mut ids = Vec::with_capacity(self.0.len() + 1);
        ids.extend_from_slice(&self.0);
        ids.push(id);
        PostPath(ids)
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    /// Id of the root post of the tree this path belongs to.
    pub fn root_id(&self) -> Option<i64> {
        self.0.first().copied()
    }

    /// Id of the post the path ends at.
    pub fn leaf_id(&self) -> Option<i64> {
        self.0.last().copied()
    }

    /// 0 for a root post.
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Lexicographic comparison, reversed for [`Direction::Desc`].
    pub fn compare(&self, other: &PostPath, direction: Direction) -> Ordering {
        direction.apply(self.0.cmp(&other.0))
    }

    /// True when the path starts at one of `root_ids`.
    pub fn is_descendant_of_any(&self, root_ids: &[i64]) -> bool {
        self.root_id().is_some_and(|root| root_ids.contains(&root))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() * ID_WIDTH);
        for id in &self.0 {
            bytes.extend_from_slice(&id.to_be_bytes());
        }
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() % ID_WIDTH != 0 {
            return Err(ForumError::CorruptPath(format!(
                "{} bytes is not a whole number of ids",
                bytes.len()
            )));
        }

        let ids = bytes
            .chunks_exact(ID_WIDTH)
            .map(|chunk| {
                let mut buf = [0u8; ID_WIDTH];
                buf.copy_from_slice(chunk);
                i64::from_be_bytes(buf)
            })
            .collect();

        Ok(PostPath(ids))
    }
}

impl From<Vec<i64>> for PostPath {
    fn from(ids: Vec<i64>) -> Self {
        PostPath(ids)
    }
}

impl std::fmt::Display for PostPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
