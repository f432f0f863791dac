use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::from_str;
use sibyl_core::{Error, PromptRecord, Result};
use std::fs;
use std::path::Path;

/// Shape of one value in the prompt input file. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct PromptInput {
    /// Rendered prompt.
    prompt: String,
}

/// Per-user prompts in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptStore {
    records: Vec<PromptRecord>,
}

impl PromptStore {
    /// Loads prompts from a JSON object keyed by user id.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not have the expected shape.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let store = Self::from_json_str(&contents)?;
        tracing::info!("Loaded {} prompts from {}", store.len(), path.display());
        Ok(store)
    }

    /// Parses prompts from a JSON object keyed by user id, keeping key order.
    ///
    /// # Errors
    /// Returns `InvalidPrompts` if the document is not an object of `{ "prompt": string }` values.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let inputs: IndexMap<String, PromptInput> = from_str(contents)
            .map_err(|error| Error::InvalidPrompts(error.to_string()))?;

        Ok(Self {
            records: inputs
                .into_iter()
                .map(|(user_id, input)| PromptRecord::new(user_id, input.prompt))
                .collect(),
        })
    }

    /// Builds a store from records, keeping the first position of each user id.
    ///
    /// A repeated user id replaces the earlier prompt in place.
    pub fn from_records<I: IntoIterator<Item = PromptRecord>>(records: I) -> Self {
        let mut by_user: IndexMap<String, String> = IndexMap::new();
        for record in records {
            by_user.insert(record.user_id, record.prompt);
        }

        Self {
            records: by_user
                .into_iter()
                .map(|(user_id, prompt)| PromptRecord::new(user_id, prompt))
                .collect(),
        }
    }

    /// Iterates over prompts in input order.
    pub fn iter(&self) -> impl Iterator<Item = &PromptRecord> {
        self.records.iter()
    }

    /// Returns the number of users.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether there are no prompts.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
