//! Positional context and limits shared by the structural encoder and decoder.

use std::fmt;

use serde::Deserialize;

use crate::error::{CompatError, Result};

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodingKey {
    Key(String),
    Index(usize),
}

impl fmt::Display for CodingKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodingKey::Key(key) => write!(f, "{}", key),
            CodingKey::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// The chain of keys and indexes leading from the root value to a node,
/// rendered as `a.b[2].c`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodingPath {
    keys: Vec<CodingKey>,
}

impl CodingPath {
    pub fn root() -> Self {
        Self { keys: Vec::new() }
    }
    pub fn child(&self, key: CodingKey) -> Self {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.extend_from_slice(&self.keys);
        keys.push(key);
        Self { keys }
    }
    pub fn depth(&self) -> usize {
        self.keys.len()
    }
    pub fn keys(&self) -> &[CodingKey] {
        &self.keys
    }
}

impl fmt::Display for CodingPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.keys.is_empty() {
            return f.write_str("<root>");
        }
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 && matches!(key, CodingKey::Key(_)) {
                f.write_str(".")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CodingOptions {
    /// Deepest container nesting accepted before giving up with
    /// [`CompatError::DepthLimitExceeded`].
    pub max_depth: usize,
}

impl Default for CodingOptions {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl CodingOptions {
    pub(crate) fn check_depth(&self, path: &CodingPath) -> Result<()> {
        if path.depth() > self.max_depth {
            return Err(CompatError::DepthLimitExceeded {
                limit: self.max_depth,
                path: path.to_string(),
            });
        }
        Ok(())
    }
}
