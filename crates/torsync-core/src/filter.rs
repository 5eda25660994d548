//! Selection of the files that get persisted.

use crate::model::FileSnapshot;

/// Extension allow-list for persisted file rows; empty keeps every file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    extensions: Vec<String>,
}

impl FileFilter {
    /// Build a filter from extensions with or without a leading dot.
    #[must_use]
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    /// Whether `path` should be persisted.
    #[must_use]
    pub fn accepts(&self, path: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.rsplit_once('.').is_some_and(|(_, ext)| {
            self.extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
    }

    /// Keep only the accepted files.
    #[must_use]
    pub fn apply(&self, files: Vec<FileSnapshot>) -> Vec<FileSnapshot> {
        files
            .into_iter()
            .filter(|file| self.accepts(&file.attributes.path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileAttributes;

    fn file(index: u32, path: &str) -> FileSnapshot {
        FileSnapshot {
            index,
            attributes: FileAttributes {
                path: path.into(),
                size: 1,
                priority: 4,
                progress: 0,
            },
        }
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = FileFilter::default();
        assert!(filter.accepts("readme"));
        assert_eq!(filter.apply(vec![file(0, "a.nfo")]).len(), 1);
    }

    #[test]
    fn extensions_match_case_insensitively() {
        let filter = FileFilter::new([".MKV", "mp4", " "]);
        assert!(filter.accepts("Show/S01E01.mkv"));
        assert!(filter.accepts("clip.MP4"));
        assert!(!filter.accepts("Show/sample.nfo"));
        assert!(!filter.accepts("noext"));

        let kept = filter.apply(vec![file(0, "a.mkv"), file(1, "b.txt"), file(2, "c.mp4")]);
        let indexes: Vec<u32> = kept.iter().map(|f| f.index).collect();
        assert_eq!(indexes, vec![0, 2]);
    }
}
