//! Per-level high score table
//!
//! Persisted as the second record of each level file using the grammar
//! `name:score;name:score;`. Entries are kept sorted descending by score,
//! ties in insertion order. One entry per player name.

use serde::{Deserialize, Serialize};

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Player nickname
    pub name: String,
    /// Best score for this level
    pub score: u64,
}

impl HighScoreEntry {
    pub fn new(name: impl Into<String>, score: u64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Result of merging a finished run into the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// The table changed (player's entry inserted or raised)
    pub updated: bool,
    /// The table's top score rose (celebration-worthy)
    pub new_best: bool,
    /// 1-indexed rank of the player's entry after the merge
    pub rank: Option<usize>,
}

/// High score leaderboard for one level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HighScoreTable {
    entries: Vec<HighScoreEntry>,
    /// Optional top-N cap; `None` keeps every entry
    #[serde(skip)]
    limit: Option<usize>,
}

impl HighScoreTable {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            limit: None,
        }
    }

    /// Build from unordered entries (stable sort, first occurrence of a name wins ties)
    pub fn from_entries(entries: impl IntoIterator<Item = HighScoreEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            let existing = table.entries.iter().position(|e| e.name == entry.name);
            match existing {
                Some(i) if table.entries[i].score >= entry.score => continue,
                Some(i) => {
                    table.entries.remove(i);
                }
                None => {}
            }
            table.entries.push(entry);
        }
        table.entries.sort_by(|a, b| b.score.cmp(&a.score));
        table
    }

    /// Cap the table at `limit` entries (drops the lowest immediately)
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        if let Some(limit) = limit {
            self.entries.truncate(limit);
        }
        self
    }

    /// Parse the `name:score;` record. An empty or blank record is an empty table.
    pub fn parse_record(record: &str) -> Result<Self, String> {
        let mut entries = Vec::new();
        for item in record.trim().split(';') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (name, score) = item
                .rsplit_once(':')
                .ok_or_else(|| format!("high score record '{}' has no ':'", item))?;
            let score = score
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("bad score in '{}': {}", item, e))?;
            entries.push(HighScoreEntry::new(name.trim(), score));
        }
        Ok(Self::from_entries(entries))
    }

    /// Serialize to the `name:score;` record (empty string for an empty table)
    pub fn to_record(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}:{};", e.name, e.score))
            .collect()
    }

    pub fn entries(&self) -> &[HighScoreEntry] {
        &self.entries
    }

    /// Check if the leaderboard is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Get the top entry (if any)
    pub fn best(&self) -> Option<&HighScoreEntry> {
        self.entries.first()
    }

    /// Top score, 0 for an empty table
    pub fn top_score(&self) -> u64 {
        self.best().map(|e| e.score).unwrap_or(0)
    }

    /// Stored score for a player
    pub fn score_of(&self, name: &str) -> Option<u64> {
        let name = sanitize_name(name);
        self.entries.iter().find(|e| e.name == name).map(|e| e.score)
    }

    /// Check if a score would enter the table for this player
    pub fn qualifies(&self, name: &str, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if let Some(previous) = self.score_of(name) {
            return score > previous;
        }
        match self.limit {
            Some(limit) if self.entries.len() >= limit => {
                self.entries.last().map(|e| score > e.score).unwrap_or(true)
            }
            _ => true,
        }
    }

    /// Merge a finished run.
    ///
    /// The player's entry is inserted or replaced only when `score` beats their
    /// stored score; otherwise the table is untouched.
    pub fn merge(&mut self, name: &str, score: u64) -> MergeOutcome {
        if !self.qualifies(name, score) {
            return MergeOutcome::default();
        }

        let previous_top = self.top_score();
        let name = sanitize_name(name);
        self.entries.retain(|e| e.name != name);

        // Insert after every entry with an equal or higher score
        let pos = self
            .entries
            .iter()
            .position(|e| score > e.score)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, HighScoreEntry::new(name, score));

        if let Some(limit) = self.limit {
            self.entries.truncate(limit);
        }

        MergeOutcome {
            updated: true,
            new_best: score > previous_top,
            rank: Some(pos + 1),
        }
    }
}

/// Strip the record separators out of a nickname
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c == ':' || c == ';' || c.is_control() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "player".to_string()
    } else {
        cleaned
    }
}
