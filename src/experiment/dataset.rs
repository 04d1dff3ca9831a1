// Dataset - labeled audio discovery and feature table assembly
//
// Layout on disk:
//
//   <root>/train/{good,bad}/*.{mp3,wav,flac,m4a,aac}
//   <root>/test/{good,bad}/*.{mp3,wav,flac,m4a,aac}
//
// The split is decided by the folder a file sits in; nothing is resampled.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::analysis::{FeatureExtractor, FeatureVector};
use crate::audio::SUPPORTED_EXTENSIONS;
use crate::error::{log_audio_error, ExperimentError};

/// Binary beat label; the discriminant is the encoded class index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Bad = 0,
    Good = 1,
}

impl Label {
    /// Classes in encoded order (sorted by name)
    pub const ALL: [Label; 2] = [Label::Bad, Label::Good];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Label::Bad => "bad",
            Label::Good => "good",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Audio files of one split, by label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledFiles {
    pub good: Vec<PathBuf>,
    pub bad: Vec<PathBuf>,
}

impl LabeledFiles {
    pub fn len(&self) -> usize {
        self.good.len() + self.bad.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Good files first, then bad
    pub fn iter(&self) -> impl Iterator<Item = (&Path, Label)> {
        self.good
            .iter()
            .map(|p| (p.as_path(), Label::Good))
            .chain(self.bad.iter().map(|p| (p.as_path(), Label::Bad)))
    }
}

/// List the supported audio files directly inside `dir`
///
/// Files are grouped by extension in `SUPPORTED_EXTENSIONS` order and sorted
/// by name inside each group. A missing directory yields an empty list.
pub fn find_audio_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("[Dataset] Cannot read {}: {}", dir.display(), err);
            return Vec::new();
        }
    };

    let mut by_extension: Vec<Vec<PathBuf>> = vec![Vec::new(); SUPPORTED_EXTENSIONS.len()];
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if let Some(slot) = SUPPORTED_EXTENSIONS
            .iter()
            .position(|supported| ext.eq_ignore_ascii_case(supported))
        {
            by_extension[slot].push(path);
        }
    }

    by_extension
        .into_iter()
        .flat_map(|mut group| {
            group.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            group
        })
        .collect()
}

/// Per-folder file counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetCounts {
    pub train_good: usize,
    pub train_bad: usize,
    pub test_good: usize,
    pub test_bad: usize,
}

impl DatasetCounts {
    pub fn total(&self) -> usize {
        self.train_good + self.train_bad + self.test_good + self.test_bad
    }

    /// Training split lacks one of the classes
    pub fn train_missing_class(&self) -> bool {
        self.train_good == 0 || self.train_bad == 0
    }

    /// Test split lacks one of the classes
    pub fn test_missing_class(&self) -> bool {
        self.test_good == 0 || self.test_bad == 0
    }
}

/// Verified `train/` and `test/` folder structure under a root
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    /// Folders that must exist, relative to the root
    pub const REQUIRED: [&'static str; 4] = ["train/good", "train/bad", "test/good", "test/bad"];

    /// Check that the root and all four label folders exist
    ///
    /// # Errors
    /// `MissingFolder` naming the first folder that is absent
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ExperimentError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ExperimentError::missing(&root));
        }
        for relative in Self::REQUIRED {
            let dir = root.join(relative);
            if !dir.is_dir() {
                return Err(ExperimentError::missing(&dir));
            }
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn train_dir(&self) -> PathBuf {
        self.root.join("train")
    }

    pub fn test_dir(&self) -> PathBuf {
        self.root.join("test")
    }

    /// Labeled audio files of a split folder
    pub fn split_files(&self, split_dir: &Path) -> LabeledFiles {
        let files = LabeledFiles {
            good: find_audio_files(&split_dir.join("good")),
            bad: find_audio_files(&split_dir.join("bad")),
        };
        log::info!(
            "[Dataset] Found {} good beats and {} bad beats in {}",
            files.good.len(),
            files.bad.len(),
            split_dir.file_name().and_then(|n| n.to_str()).unwrap_or("?")
        );
        files
    }

    pub fn counts(&self) -> DatasetCounts {
        let count = |relative: &str| find_audio_files(&self.root.join(relative)).len();
        DatasetCounts {
            train_good: count("train/good"),
            train_bad: count("train/bad"),
            test_good: count("test/good"),
            test_bad: count("test/bad"),
        }
    }
}

/// Human-readable description of the expected folder layout
pub fn expected_layout(root: &str) -> String {
    let lines = [
        format!("{}/", root),
        "├── train/".to_string(),
        "│   ├── good/     # good training beats".to_string(),
        "│   └── bad/      # bad training beats".to_string(),
        "└── test/".to_string(),
        "    ├── good/     # good test beats".to_string(),
        "    └── bad/      # bad test beats".to_string(),
        String::new(),
        "Supported formats: MP3, WAV, FLAC, M4A, AAC".to_string(),
    ];
    lines.join("\n")
}

/// Feature table with one label per row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledDataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<Label>,
}

impl LabeledDataset {
    /// Build a table from feature vectors
    ///
    /// Columns follow `feature_names`, or the first vector's order when
    /// `None`. Names a vector lacks are filled with 0.
    pub fn from_vectors(
        samples: Vec<(FeatureVector, Label)>,
        feature_names: Option<&[String]>,
    ) -> Self {
        let feature_names: Vec<String> = match feature_names {
            Some(names) => names.to_vec(),
            None => samples
                .first()
                .map(|(v, _)| v.names().map(str::to_string).collect())
                .unwrap_or_default(),
        };

        let mut rows = Vec::with_capacity(samples.len());
        let mut labels = Vec::with_capacity(samples.len());
        for (vector, label) in samples {
            rows.push(
                feature_names
                    .iter()
                    .map(|name| vector.get(name).map_or(0.0, |v| v.as_f64()))
                    .collect(),
            );
            labels.push(label);
        }

        Self {
            feature_names,
            rows,
            labels,
        }
    }

    /// Extract every file; failures are logged and skipped
    pub fn extract(
        files: &LabeledFiles,
        extractor: &FeatureExtractor,
        feature_names: Option<&[String]>,
    ) -> Self {
        let mut samples = Vec::with_capacity(files.len());
        for (path, label) in files.iter() {
            match extractor.extract_file(path) {
                Ok(report) => {
                    log::info!("[Dataset] Processed: {} ({})", display_name(path), label);
                    samples.push((report.features, label));
                }
                Err(err) => {
                    log_audio_error(&err, &format!("processing {}", path.display()));
                }
            }
        }

        let dataset = Self::from_vectors(samples, feature_names);
        log::info!(
            "[Dataset] Dataset created: {} samples, {} features",
            dataset.len(),
            dataset.n_features()
        );
        dataset
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// `(rows, features)`
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.n_features())
    }

    /// Encoded labels (bad = 0, good = 1)
    pub fn encoded_labels(&self) -> Vec<usize> {
        self.labels.iter().map(|l| l.index()).collect()
    }

    /// Class names present, in encoded order
    pub fn classes(&self) -> Vec<String> {
        Label::ALL
            .iter()
            .filter(|label| self.labels.contains(*label))
            .map(|label| label.name().to_string())
            .collect()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    fn make_layout(root: &Path) {
        for relative in DatasetLayout::REQUIRED {
            fs::create_dir_all(root.join(relative)).unwrap();
        }
    }

    #[test]
    fn test_label_encoding() {
        assert_eq!(Label::Bad.index(), 0);
        assert_eq!(Label::Good.index(), 1);
        assert_eq!(Label::from_index(1), Some(Label::Good));
        assert_eq!(Label::from_index(2), None);
        assert_eq!(Label::Good.to_string(), "good");
    }

    #[test]
    fn test_find_audio_files_groups_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.wav", "a.wav", "c.MP3", "notes.txt", "z.flac"] {
            touch(&dir.path().join(name));
        }
        fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let names: Vec<String> = find_audio_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["c.MP3", "a.wav", "b.wav", "z.flac"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        assert!(find_audio_files(Path::new("/nonexistent/beats")).is_empty());
    }

    #[test]
    fn test_layout_requires_all_folders() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DatasetLayout::open(dir.path().join("beats")),
            Err(ExperimentError::MissingFolder { .. })
        ));

        fs::create_dir_all(dir.path().join("train/good")).unwrap();
        fs::create_dir_all(dir.path().join("train/bad")).unwrap();
        fs::create_dir_all(dir.path().join("test/good")).unwrap();
        match DatasetLayout::open(dir.path()) {
            Err(ExperimentError::MissingFolder { path }) => assert!(path.ends_with("test/bad")),
            other => panic!("unexpected {:?}", other),
        }

        fs::create_dir_all(dir.path().join("test/bad")).unwrap();
        assert!(DatasetLayout::open(dir.path()).is_ok());
    }

    #[test]
    fn test_counts_and_warnings() {
        let dir = tempfile::tempdir().unwrap();
        make_layout(dir.path());
        touch(&dir.path().join("train/good/a.wav"));
        touch(&dir.path().join("train/good/b.mp3"));
        touch(&dir.path().join("test/bad/c.m4a"));

        let layout = DatasetLayout::open(dir.path()).unwrap();
        let counts = layout.counts();
        assert_eq!(
            counts,
            DatasetCounts {
                train_good: 2,
                train_bad: 0,
                test_good: 0,
                test_bad: 1
            }
        );
        assert_eq!(counts.total(), 3);
        assert!(counts.train_missing_class());
        assert!(counts.test_missing_class());

        let train = layout.split_files(&layout.train_dir());
        assert_eq!(train.len(), 2);
        assert!(train.iter().all(|(_, label)| label == Label::Good));
    }

    #[test]
    fn test_from_vectors_aligns_columns() {
        let mut a = FeatureVector::new();
        a.insert("x", 1.0);
        a.insert("y", 2.0);
        let mut b = FeatureVector::new();
        b.insert("y", 5.0);

        let names = vec!["y".to_string(), "x".to_string()];
        let dataset =
            LabeledDataset::from_vectors(vec![(a, Label::Good), (b, Label::Bad)], Some(&names));
        assert_eq!(dataset.rows, vec![vec![2.0, 1.0], vec![5.0, 0.0]]);
        assert_eq!(dataset.encoded_labels(), vec![1, 0]);
        assert_eq!(dataset.classes(), vec!["bad", "good"]);
        assert_eq!(dataset.shape(), (2, 2));
    }

    #[test]
    fn test_expected_layout_mentions_every_folder() {
        let text = expected_layout("beats");
        assert!(text.starts_with("beats/"));
        for folder in ["train/", "test/", "good/", "bad/"] {
            assert!(text.contains(folder));
        }
    }
}
