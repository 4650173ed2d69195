use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

// @const: Characters not allowed in provider key names
static UNSAFE_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-]+").unwrap());

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    /// Find files with a specific extension in a directory, sorted by path
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        let extension = extension.trim_start_matches('.');

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext.to_string_lossy().eq_ignore_ascii_case(extension) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }

    /// Reduce a document name to characters safe inside a provider object key
    pub fn sanitize_document_name(name: &str) -> String {
        let sanitized = UNSAFE_NAME_CHARS.replace_all(name.trim(), "_");
        let sanitized = sanitized.trim_matches('_');
        if sanitized.is_empty() {
            "narration".to_string()
        } else {
            sanitized.to_string()
        }
    }

    /// Write bytes to a temporary file next to `destination`
    ///
    /// Nothing appears at `destination` until the returned file is committed; dropping
    /// it removes the temporary file.
    pub fn stage_bytes<P: AsRef<Path>>(destination: P, bytes: &[u8]) -> io::Result<StagedFile> {
        let destination = destination.as_ref();
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(bytes)?;
        temp.flush()?;
        temp.as_file().sync_all()?;

        Ok(StagedFile {
            temp,
            destination: destination.to_path_buf(),
        })
    }
}

/// Fully written temporary file waiting to be renamed over its destination
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl StagedFile {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Atomically rename the temp file over the destination
    pub fn commit(self) -> io::Result<PathBuf> {
        let destination = self.destination;
        self.temp.persist(&destination).map_err(|e| e.error)?;
        Ok(destination)
    }
}
