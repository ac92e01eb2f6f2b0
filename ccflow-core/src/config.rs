use std::env;
use std::path::PathBuf;

use dirs::home_dir;

use crate::error::{CcflowError, Result};

/// Display limits applied while turning raw content into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub thinking_limit: usize,
    pub tool_input_limit: usize,
    /// Limit for the whole-input preview used when no known key is present.
    pub tool_input_fallback_limit: usize,
    pub tool_result_limit: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            thinking_limit: 500,
            tool_input_limit: 200,
            tool_input_fallback_limit: 100,
            tool_result_limit: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeRoot {
    pub root: PathBuf,
}

impl ClaudeRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env_or_home() -> Result<Self> {
        // Precedence:
        // 1) CLAUDE_CONFIG_DIR (official Claude Code config/data root env)
        // 2) ~/.claude (Claude default)
        if let Some(root) = env::var_os("CLAUDE_CONFIG_DIR").filter(|path| !path.is_empty()) {
            return Ok(Self::new(root));
        }

        let home = home_dir().ok_or(CcflowError::HomeDirectoryNotFound)?;
        Ok(Self::new(home.join(".claude")))
    }

    pub fn projects_root(&self) -> PathBuf {
        self.root.join("projects")
    }
}
