//! File persistence for generated artifacts.

use std::path::Path;

use schemaforge::{GeneratedFile, Result, SchemaError};
use tracing::{info, warn};

/// Outcome of one write pass.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: usize,
    pub skipped: Vec<String>,
}

/// Write generated files into `dir`, creating it if needed.
///
/// Without `force`, an existing file is skipped and reported rather than
/// overwritten; the pass continues with the remaining files.
pub fn write_files(dir: &Path, files: &[GeneratedFile], force: bool) -> Result<WriteReport> {
    std::fs::create_dir_all(dir)?;

    let mut report = WriteReport::default();
    for file in files {
        let path = dir.join(&file.name);
        if path.exists() && !force {
            let conflict = SchemaError::FileAlreadyExists(path.display().to_string());
            warn!("{} (use --force to overwrite)", conflict);
            report.skipped.push(file.name.clone());
            continue;
        }
        std::fs::write(&path, &file.content)?;
        report.written += 1;
    }

    info!(
        written = report.written,
        skipped = report.skipped.len(),
        "wrote generated files to {}",
        dir.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_file(name: &str) -> GeneratedFile {
        GeneratedFile {
            name: name.to_string(),
            content: "<?php\n".to_string(),
        }
    }

    #[test]
    fn test_writes_and_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("database/migrations");
        let report = write_files(&nested, &[make_test_file("a.php")], false).unwrap();
        assert_eq!(report.written, 1);
        assert!(nested.join("a.php").exists());
    }

    #[test]
    fn test_existing_file_is_skipped_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.php"), "old").unwrap();

        let report = write_files(dir.path(), &[make_test_file("a.php")], false).unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped, vec!["a.php".to_string()]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.php")).unwrap(),
            "old"
        );

        let report = write_files(dir.path(), &[make_test_file("a.php")], true).unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.php")).unwrap(),
            "<?php\n"
        );
    }
}
