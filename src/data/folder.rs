use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// One image file and the index of the class folder it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSample {
    pub path: PathBuf,
    pub label: usize,
}

/// A labelled dataset laid out as `root/<class>/<image>`.
///
/// Classes are indexed by sorted folder name and files are kept in sorted
/// order, so scanning the same directory twice gives the same samples.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<ImageSample>,
}

impl ImageFolder {
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let mut class_dirs = Vec::new();
        for entry in fs::read_dir(&root)
            .with_context(|| format!("Cannot read dataset directory '{}'", root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                class_dirs.push(entry.path());
            }
        }
        class_dirs.sort();

        if class_dirs.is_empty() {
            bail!(
                "Dataset directory '{}' has no class sub-directories",
                root.display()
            );
        }

        let mut classes = Vec::with_capacity(class_dirs.len());
        let mut samples = Vec::new();
        for (label, dir) in class_dirs.iter().enumerate() {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let mut files = Vec::new();
            for entry in fs::read_dir(dir)
                .with_context(|| format!("Cannot read class directory '{}'", dir.display()))?
            {
                let path = entry?.path();
                if !is_image_file(&path) {
                    continue;
                }
                match image::image_dimensions(&path) {
                    Ok(_) => files.push(path),
                    Err(err) => {
                        tracing::warn!("Skipping unreadable image '{}': {}", path.display(), err)
                    }
                }
            }
            files.sort();

            tracing::debug!("Class '{}' ({}): {} images", name, label, files.len());
            samples.extend(files.into_iter().map(|path| ImageSample { path, label }));
            classes.push(name);
        }

        Ok(Self {
            root,
            classes,
            samples,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn samples(&self) -> &[ImageSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Ordered per-class split into `(train, validation)`.
    ///
    /// `train_split` is the training share: the last `ceil(n * train_split)`
    /// files of every class go to training and the ones before them to
    /// validation. No shuffling.
    pub fn split(&self, train_split: f64) -> (Vec<ImageSample>, Vec<ImageSample>) {
        let mut train = Vec::new();
        let mut validation = Vec::new();

        for label in 0..self.classes.len() {
            let class: Vec<&ImageSample> =
                self.samples.iter().filter(|s| s.label == label).collect();
            let train_count = ((class.len() as f64) * train_split).ceil() as usize;
            let cut = class.len().saturating_sub(train_count);

            validation.extend(class[..cut].iter().map(|s| (*s).clone()));
            train.extend(class[cut..].iter().map(|s| (*s).clone()));
        }

        tracing::debug!(
            "Dataset split: {} training, {} validation",
            train.len(),
            validation.len()
        );

        (train, validation)
    }

    /// Human readable `{name: index}` map of the classes.
    pub fn class_indices(&self) -> String {
        let entries: Vec<String> = self
            .classes
            .iter()
            .enumerate()
            .map(|(index, name)| format!("'{name}': {index}"))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}
