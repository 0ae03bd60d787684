// src/pipeline/writer.rs

use crate::{constants, error::*, utils};
use log::debug;
use std::{fs, path::PathBuf};

/// Writes one `.txt` per transcript under `<output>/<module>/`.
pub struct TranscriptWriter {
    output_dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    /// Returns the written path relative to the output directory, with `/`
    /// separators. Never overwrites: name collisions get a numeric suffix.
    pub fn write(&self, module_name: &str, title: &str, text: &str) -> AppResult<String> {
        fs::create_dir_all(&self.output_dir)?;
        let relative_dir = if module_name.trim().is_empty() {
            PathBuf::new()
        } else {
            PathBuf::from(utils::safe_dir_name(module_name))
        };
        let dir = utils::secure_join_path(&self.output_dir, &relative_dir)?;
        fs::create_dir_all(&dir)?;

        let stem = match utils::sanitize_filename(title) {
            s if s == "unknown" || s == "unnamed" => constants::UNTITLED_VIDEO.to_string(),
            s => s,
        };
        let path = utils::unique_file_path(&dir, &stem, "txt");
        fs::write(&path, text)?;
        debug!("Transcript written to {:?}", path);

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(if relative_dir.as_os_str().is_empty() {
            file_name
        } else {
            format!("{}/{}", relative_dir.to_string_lossy(), file_name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_under_module_dir_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());

        let first = writer.write("Week 1: Intro", "Lecture 1", "one").unwrap();
        let second = writer.write("Week 1: Intro", "Lecture 1", "two").unwrap();
        let loose = writer.write("", "", "three").unwrap();

        assert_eq!(first, "Week_1_Intro/Lecture 1.txt");
        assert_eq!(second, "Week_1_Intro/Lecture 1_1.txt");
        assert_eq!(loose, format!("{}.txt", constants::UNTITLED_VIDEO));
        assert_eq!(fs::read_to_string(dir.path().join(&first)).unwrap(), "one");
        assert_eq!(fs::read_to_string(dir.path().join(&second)).unwrap(), "two");
    }
}
