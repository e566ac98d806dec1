use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use voxai_core::responder::Prompts;

/// Reads every `.md` file in `dir_path` into a `file stem -> content` map.
pub fn read_prompt_files(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// Loads prompt overrides from `dir_path`, falling back to the built-in
/// prompts when the directory does not exist.
pub fn load_prompts(dir_path: &Path) -> Result<Prompts> {
    if !dir_path.exists() {
        tracing::info!(
            "No prompts directory at {}, using built-in prompts",
            dir_path.display()
        );
        return Ok(Prompts::default());
    }
    let files = read_prompt_files(dir_path)?;
    tracing::info!("Loaded {} prompt file(s) from {}", files.len(), dir_path.display());
    Ok(Prompts::from_map(files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;
    use voxai_core::responder::{INTENT_SYSTEM_PROMPT, REPLY_SYSTEM_PROMPT};

    #[test]
    fn test_read_prompt_files_only_takes_markdown() -> Result<()> {
        // 1. Arrange: a directory with prompts, a stray file and a subdirectory.
        let dir = tempdir()?;
        let dir_path = dir.path();

        let mut reply = File::create(dir_path.join("reply_system.md"))?;
        writeln!(reply, "You are a terse assistant. Reply in JSON.")?;

        let mut notes = File::create(dir_path.join("notes.txt"))?;
        writeln!(notes, "not a prompt")?;

        std::fs::create_dir(dir_path.join("drafts"))?;

        // 2. Act
        let files = read_prompt_files(dir_path)?;

        // 3. Assert
        assert_eq!(files.len(), 1, "Should only load .md files");
        assert_eq!(
            files.get("reply_system").unwrap(),
            "You are a terse assistant. Reply in JSON.\n"
        );
        assert!(files.get("notes").is_none());

        Ok(())
    }

    #[test]
    fn test_load_prompts_overrides_only_present_files() -> Result<()> {
        let dir = tempdir()?;
        let mut intent = File::create(dir.path().join("intent_system.md"))?;
        writeln!(intent, "Answer with one word.")?;

        let prompts = load_prompts(dir.path())?;

        assert_eq!(prompts.intent_system, "Answer with one word.");
        assert_eq!(prompts.reply_system, REPLY_SYSTEM_PROMPT);
        Ok(())
    }

    #[test]
    fn test_missing_directory_uses_builtin_prompts() -> Result<()> {
        let prompts = load_prompts(Path::new("nonexistent_dir_for_testing_prompts"))?;

        assert_eq!(prompts.intent_system, INTENT_SYSTEM_PROMPT);
        assert_eq!(prompts, Prompts::default());
        Ok(())
    }

    #[test]
    fn test_read_prompt_files_from_nonexistent_dir_fails() {
        let result = read_prompt_files(Path::new("nonexistent_dir_for_testing_prompts"));
        assert!(result.is_err());
    }
}
