//! Prompt construction from per-user message history.
//!
//! Each user's most recent messages are concatenated oldest to newest and
//! substituted into a named template. The resulting file is the input of an
//! inference run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string_pretty};
use sibyl_core::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Placeholder replaced by the aggregated messages.
pub const PLACEHOLDER: &str = "{}";

/// A single message from a user's history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    /// Message body
    pub message: String,
}

/// A user's message history, newest message first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserMessages {
    /// Messages, newest first
    pub msg_data: Vec<Message>,
}

/// Prepared input for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedPrompt {
    /// Aggregated message window
    pub raw_text: String,
    /// Rendered prompt
    pub prompt: String,
}

/// Joins the `window` most recent messages, oldest first, one per line.
///
/// `messages` must be ordered newest first. Users with fewer messages than
/// `window` contribute all of them.
pub fn aggregate_messages(messages: &[Message], window: usize) -> String {
    let keep = window.min(messages.len());
    messages
        .iter()
        .take(keep)
        .rev()
        .fold(String::new(), |mut aggregated, entry| {
            aggregated.push_str(&entry.message);
            aggregated.push('\n');
            aggregated
        })
}

/// Named prompt templates loaded from TOML.
///
/// ```toml
/// [templates]
/// stance = "Messages:\n{}\nStance:"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplates {
    /// Template text keyed by name
    templates: BTreeMap<String, String>,
}

impl PromptTemplates {
    /// Loads templates from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses templates from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML of the expected shape.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Returns the template names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Substitutes `messages` for the placeholder of template `name`.
    ///
    /// Templates use format-string braces: `{}` is the single placeholder,
    /// `{{` and `}}` produce literal braces.
    ///
    /// # Errors
    /// Returns a `Config` error for an unknown template, or one that does not
    /// contain exactly one placeholder or has an unmatched brace.
    pub fn render(&self, name: &str, messages: &str) -> Result<String> {
        let template = self.templates.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            Error::Config(format!("Unknown template {name:?}; available: {known:?}"))
        })?;

        fill_placeholder(name, template, messages)
    }
}

/// Expands brace escapes and replaces the one `{}` placeholder with `messages`.
fn fill_placeholder(name: &str, template: &str, messages: &str) -> Result<String> {
    let malformed = |reason: String| Error::Config(format!("Template {name:?} {reason}"));
    let mut rendered = String::with_capacity(template.len() + messages.len());
    let mut filled = false;
    let mut chars = template.chars().peekable();

    while let Some(current) = chars.next() {
        match (current, chars.peek().copied()) {
            ('{', Some('{')) => {
                chars.next();
                rendered.push('{');
            }
            ('{', Some('}')) => {
                chars.next();
                if filled {
                    return Err(malformed(format!("has more than one {PLACEHOLDER} placeholder")));
                }
                filled = true;
                rendered.push_str(messages);
            }
            ('}', Some('}')) => {
                chars.next();
                rendered.push('}');
            }
            ('{' | '}', _) => return Err(malformed(format!("has an unmatched {current:?}"))),
            _ => rendered.push(current),
        }
    }

    if !filled {
        return Err(malformed(format!("has no {PLACEHOLDER} placeholder")));
    }
    Ok(rendered)
}

/// Loads message history keyed by user id, keeping file order.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_message_history(path: &Path) -> Result<IndexMap<String, UserMessages>> {
    let contents = fs::read_to_string(path)?;
    from_str(&contents).map_err(|error| Error::InvalidPrompts(error.to_string()))
}

/// Builds one prompt per user from their message window.
///
/// # Errors
/// Returns an error if the template cannot be rendered.
pub fn build_prompts(
    history: &IndexMap<String, UserMessages>,
    templates: &PromptTemplates,
    template_name: &str,
    window: usize,
) -> Result<IndexMap<String, PreparedPrompt>> {
    history
        .iter()
        .map(|(user_id, user)| {
            let raw_text = aggregate_messages(&user.msg_data, window);
            let prompt = templates.render(template_name, &raw_text)?;
            Ok((user_id.clone(), PreparedPrompt { raw_text, prompt }))
        })
        .collect()
}

/// Writes prepared prompts as pretty JSON keyed by user id.
///
/// # Errors
/// Returns an error if the parent directory or file cannot be written.
pub fn write_prepared(path: &Path, prepared: &IndexMap<String, PreparedPrompt>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_string_pretty(prepared)?)?;
    tracing::info!("Wrote {} prompts to {}", prepared.len(), path.display());
    Ok(())
}
