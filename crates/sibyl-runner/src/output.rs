use csv::{QuoteStyle, Terminator, WriterBuilder};
use sibyl_core::{CompletionResult, Result};
use std::fs;
use std::path::Path;

/// Column names of the prediction table.
pub const HEADER: [&str; 3] = ["user_id", "prompt", "prediction"];

/// Writes the prediction table: header row, every field quoted, `\n` line endings.
///
/// # Errors
/// Returns an error if the parent directory or file cannot be created or written.
pub fn write_results(path: &Path, results: &[CompletionResult]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_path(path)?;

    writer.write_record(HEADER)?;
    for result in results {
        writer.write_record([&result.user_id, &result.prompt, &result.prediction])?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} predictions to {}", results.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(user_id: &str, prompt: &str, prediction: &str) -> CompletionResult {
        CompletionResult {
            user_id: user_id.to_owned(),
            prompt: prompt.to_owned(),
            prediction: prediction.to_owned(),
        }
    }

    #[test]
    fn test_all_fields_quoted() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("out").join("predictions.csv");

        write_results(
            &path,
            &[row("u1", "A", "yes"), row("u2", "say \"hi\",\nthen stop", "no")],
        )
        .expect("Failed to write results");

        let contents = fs::read_to_string(&path).expect("read output");
        assert_eq!(
            contents,
            "\"user_id\",\"prompt\",\"prediction\"\n\
             \"u1\",\"A\",\"yes\"\n\
             \"u2\",\"say \"\"hi\"\",\nthen stop\",\"no\"\n"
        );
    }

    #[test]
    fn test_empty_results_still_have_header() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("predictions.csv");

        write_results(&path, &[]).expect("Failed to write results");

        let contents = fs::read_to_string(&path).expect("read output");
        assert_eq!(contents, "\"user_id\",\"prompt\",\"prediction\"\n");
    }
}
