//! File collection and the `index` command.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use docqa_core::chunk::chunk_document;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{extract_text, is_supported};
use crate::generate::create_generator;
use crate::session::{IngestError, Session, SourceFile};

/// One collected path: its bytes, or why they could not be read.
pub type Collected = Result<SourceFile, IngestError>;

/// Read `paths` into memory.
///
/// Files named explicitly are read whatever their extension, so an
/// unsupported file is reported as skipped rather than silently dropped.
/// Directories are walked recursively keeping supported extensions only.
/// The result is sorted by path. Entries that cannot be walked or read
/// (a dangling symlink, a permission error) become per-file
/// [`IngestError::Read`] outcomes; only a named path that does not exist
/// fails the whole call.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<Collected>> {
    let mut found: Vec<(PathBuf, Option<io::Error>)> = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(true) {
                match entry {
                    Ok(entry) => {
                        if entry.file_type().is_file()
                            && is_supported(&display_name(entry.path()))
                        {
                            found.push((entry.into_path(), None));
                        }
                    }
                    Err(err) => {
                        let failed = err.path().unwrap_or(path.as_path()).to_path_buf();
                        found.push((failed, Some(io::Error::from(err))));
                    }
                }
            }
        } else if path.is_file() {
            found.push((path.clone(), None));
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found.dedup_by(|a, b| a.0 == b.0);

    Ok(found
        .into_iter()
        .map(|(path, walk_error)| {
            let name = display_name(&path);
            let bytes = match walk_error {
                Some(source) => Err(source),
                None => std::fs::read(&path),
            };
            match bytes {
                Ok(bytes) => Ok(SourceFile::new(name, bytes)),
                Err(source) => {
                    debug!(path = %path.display(), error = %source, "unreadable");
                    Err(IngestError::Read { name, source })
                }
            }
        })
        .collect())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Create a session and index `paths` into it. Skipped files are reported
/// on stderr.
pub async fn build_session(config: &Config, paths: &[PathBuf]) -> Result<Session> {
    let collected = collect_files(paths)?;
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let mut session = Session::new(config.clone(), embedder, generator)?;

    let mut files = Vec::with_capacity(collected.len());
    for item in collected {
        match item {
            Ok(file) => files.push(file),
            Err(e) => eprintln!("skip {}", e),
        }
    }
    for outcome in session.index_files(&files).await {
        if let Err(e) = outcome {
            eprintln!("skip {}", e);
        }
    }
    Ok(session)
}

/// Extract and chunk without embedding.
fn preview_file(config: &Config, file: &SourceFile) -> Result<usize, IngestError> {
    let text = extract_text(&file.bytes, &file.name).map_err(|source| IngestError::Extract {
        name: file.name.clone(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(IngestError::EmptyText {
            name: file.name.clone(),
        });
    }
    let chunks = chunk_document(
        &file.name,
        &text,
        config.chunking.chunk_size,
        config.chunking.overlap,
    );
    Ok(chunks.len())
}

/// `docqa index`: per-file report plus totals.
pub async fn run_index(config: &Config, paths: &[PathBuf], dry_run: bool) -> Result<()> {
    let collected = collect_files(paths)?;
    let total_files = collected.len();

    let mut session = if dry_run {
        None
    } else {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Some(Session::new(config.clone(), embedder, generator)?)
    };

    let mut indexed = 0usize;
    let mut total_chunks = 0usize;
    for item in collected {
        let outcome = match (item, session.as_mut()) {
            (Err(e), _) => Err(e),
            (Ok(file), None) => preview_file(config, &file).map(|chunks| (file.name, chunks)),
            (Ok(file), Some(session)) => session
                .index_file(&file)
                .await
                .map(|doc| (doc.name, doc.chunks)),
        };
        match outcome {
            Ok((name, chunks)) => {
                indexed += 1;
                total_chunks += chunks;
                println!("ok {}: {} chunks", name, chunks);
            }
            Err(e) => println!("skip {}", e),
        }
    }

    println!(
        "{}indexed {} of {} files, {} chunks",
        if dry_run { "(dry-run) " } else { "" },
        indexed,
        total_files,
        total_chunks
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readable(collected: Vec<Collected>) -> Vec<SourceFile> {
        collected
            .into_iter()
            .map(|item| item.expect("file should be readable"))
            .collect()
    }

    #[test]
    fn test_collect_walks_directories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "bee").unwrap();
        std::fs::write(dir.path().join("nested/a.md"), "ay").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1]).unwrap();

        let files = readable(collect_files(&[dir.path().to_path_buf()]).unwrap());
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.md"]);
        assert_eq!(files[0].bytes, b"bee");
    }

    #[test]
    fn test_explicit_files_kept_even_if_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("image.png");
        std::fs::write(&png, [0u8, 1]).unwrap();

        let files = readable(collect_files(&[png.clone(), png]).unwrap());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "image.png");
    }

    #[test]
    fn test_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_files(&[dir.path().join("nope.txt")]).unwrap_err();
        assert!(err.to_string().contains("nope.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_skipped_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "still here").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.txt"), dir.path().join("stale.txt"))
            .unwrap();

        let collected = collect_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(collected.len(), 2);
        match &collected[0] {
            Ok(file) => {
                assert_eq!(file.name, "good.txt");
                assert_eq!(file.bytes, b"still here");
            }
            Err(e) => panic!("good.txt should be readable: {}", e),
        }
        match &collected[1] {
            Err(e @ IngestError::Read { .. }) => {
                assert_eq!(e.file_name(), "stale.txt");
                assert!(e.to_string().starts_with("stale.txt: "), "{}", e);
            }
            other => panic!("expected a read skip, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dry_run_survives_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "still here").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.md"), dir.path().join("stale.md"))
            .unwrap();

        run_index(&Config::default(), &[dir.path().to_path_buf()], true)
            .await
            .unwrap();
    }

    #[test]
    fn test_preview_counts_chunks() {
        let mut config = Config::default();
        config.chunking.chunk_size = 4;
        config.chunking.overlap = 1;

        let file = SourceFile::new("notes.txt", "a b c d e f g h i j");
        assert_eq!(preview_file(&config, &file).unwrap(), 3);

        let blank = SourceFile::new("blank.txt", " ");
        assert!(matches!(
            preview_file(&config, &blank),
            Err(IngestError::EmptyText { .. })
        ));
    }

    #[tokio::test]
    async fn test_dry_run_needs_no_backend() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let mut config = Config::default();
        config.embedding.provider = "openai".into();

        run_index(&config, &[dir.path().to_path_buf()], true)
            .await
            .unwrap();
    }
}
