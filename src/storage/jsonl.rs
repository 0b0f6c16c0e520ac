//! JSONL storage for conversation turn logs

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::message::Turn;

/// Append-only JSONL backend for conversation history
pub struct JsonlStorage {
    base_path: PathBuf,
}

impl JsonlStorage {
    /// Create a new JSONL storage
    pub fn new(config: &Config) -> Result<Self> {
        let base_path = config.data_dir.join("conversations");
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the path to the log file for a conversation
    fn log_path(&self, owner_id: &str, conversation_id: &str) -> PathBuf {
        self.base_path
            .join(owner_id)
            .join(format!("{}.jsonl", conversation_id))
    }

    /// Append a turn to the log
    pub fn append(&self, turn: &Turn) -> Result<()> {
        let owner_dir = self.base_path.join(&turn.owner_id);
        std::fs::create_dir_all(&owner_dir)?;

        let path = self.log_path(&turn.owner_id, &turn.conversation_id);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let json = serde_json::to_string(turn)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all turns for a conversation
    pub fn read_all(&self, owner_id: &str, conversation_id: &str) -> Result<Vec<Turn>> {
        let path = self.log_path(owner_id, conversation_id);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);

        let mut turns = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let turn: Turn = serde_json::from_str(&line)?;
            turns.push(turn);
        }

        Ok(turns)
    }

    /// Read the last N turns for a conversation
    pub fn read_last_n(&self, owner_id: &str, conversation_id: &str, n: usize) -> Result<Vec<Turn>> {
        let all = self.read_all(owner_id, conversation_id)?;
        let start = all.len().saturating_sub(n);
        Ok(all[start..].to_vec())
    }

    /// Delete a conversation's turn log
    pub fn delete_conversation(&self, owner_id: &str, conversation_id: &str) -> Result<()> {
        let path = self.log_path(owner_id, conversation_id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// List all conversations for an owner
    pub fn list_conversations(&self, owner_id: &str) -> Result<Vec<String>> {
        let owner_dir = self.base_path.join(owner_id);

        if !owner_dir.exists() {
            return Ok(Vec::new());
        }

        let mut conversations = Vec::new();
        for entry in std::fs::read_dir(&owner_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "jsonl").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    conversations.push(stem.to_string_lossy().to_string());
                }
            }
        }

        Ok(conversations)
    }
}
