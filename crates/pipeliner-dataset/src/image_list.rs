//! An on-disk list of image paths, one per line.

use crate::error::DatasetManifestError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Paths read from an image-list file, normalised to absolute form and
/// sorted. Relative entries resolve against the list file's own directory.
#[derive(Debug, Clone, Default)]
pub struct ImageList {
    files: Vec<Utf8PathBuf>,
}

impl ImageList {
    pub fn load(list_file: &Utf8Path) -> Result<Self, DatasetManifestError> {
        let content = fs::read_to_string(list_file)
            .map_err(|_| DatasetManifestError::DatasetFileNotFound(list_file.to_path_buf()))?;
        let base = list_file.parent().unwrap_or(Utf8Path::new("."));

        let mut files: Vec<Utf8PathBuf> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                let p = Utf8Path::new(l);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    base.join(p)
                }
            })
            .collect();
        files.sort();
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.files.iter()
    }

    /// Count of non-empty lines currently present in `list_file`, without
    /// loading or sorting the whole list. Used by the scheduler's progress
    /// poller, which re-reads a growing file many times per task.
    pub fn count_lines(list_file: &Utf8Path) -> usize {
        match fs::read_to_string(list_file) {
            Ok(content) => content.lines().filter(|l| !l.trim().is_empty()).count(),
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_sorts_relative_entries() {
        let dir = tempfile::tempdir().unwrap();
        let list_path = dir.path().join("images.txt");
        let mut f = std::fs::File::create(&list_path).unwrap();
        writeln!(f, "b.png").unwrap();
        writeln!(f, "a.png").unwrap();
        writeln!(f).unwrap();

        let list = ImageList::load(Utf8Path::from_path(&list_path).unwrap()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().next().unwrap().as_str().ends_with("a.png"));
    }

    #[test]
    fn count_lines_returns_zero_for_missing_file() {
        let missing = Utf8Path::new("/nonexistent/path/images.txt");
        assert_eq!(ImageList::count_lines(missing), 0);
    }

    #[test]
    fn count_lines_ignores_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let list_path = dir.path().join("images.txt");
        std::fs::write(&list_path, "a.png\n\nb.png\n\n").unwrap();
        assert_eq!(ImageList::count_lines(Utf8Path::from_path(&list_path).unwrap()), 2);
    }
}
