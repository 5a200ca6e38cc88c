//! # Corpus Artifact Loader
//!
//! Reads the two parallel corpus artifacts produced by the data pipeline
//! and turns them into verse records.
//!
//! ## Artifact Layout:
//! - **Embeddings file**: `u32` count, `u32` dimension (both little-endian),
//!   then `count * dimension` little-endian f32 values, row-major
//! - **Metadata file**: JSON array of `{surah, ayah, arabic_text,
//!   english_text}` objects, index-aligned with the embedding rows
//!
//! ## Integrity Checks (all fail startup):
//! - Embedding payload must match the header exactly (no truncation, no
//!   trailing bytes)
//! - Dimension must be non-zero
//! - The two artifacts must agree on the verse count
//! - Every surah and ayah number must be at least 1

use crate::corpus::index::VerseRecord;
use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// One verse entry as stored in the metadata artifact.
#[derive(Debug, Deserialize)]
struct VerseMeta {
    surah: u32,
    ayah: u32,
    arabic_text: String,
    english_text: String,
}

/// Load the corpus from its two artifacts into verse records.
///
/// ## Parameters:
/// - **embeddings_path**: Path to the binary embeddings file
/// - **metadata_path**: Path to the JSON metadata file
///
/// ## Returns:
/// - **Ok(records)**: One record per verse, embeddings attached
/// - **Err(anyhow::Error)**: Any missing file or integrity failure
pub fn load_corpus(
    embeddings_path: impl AsRef<Path>,
    metadata_path: impl AsRef<Path>,
) -> Result<Vec<VerseRecord>> {
    let embeddings_path = embeddings_path.as_ref();
    let metadata_path = metadata_path.as_ref();

    let (count, dimension, values) = read_embeddings(embeddings_path)?;
    let metas = read_metadata(metadata_path)?;

    if metas.len() != count {
        return Err(anyhow!(
            "Corpus artifacts disagree: '{}' holds {} vectors but '{}' holds {} verses",
            embeddings_path.display(),
            count,
            metadata_path.display(),
            metas.len()
        ));
    }

    let mut records = Vec::with_capacity(count);
    for (i, meta) in metas.into_iter().enumerate() {
        if meta.surah == 0 || meta.ayah == 0 {
            return Err(anyhow!(
                "Verse entry {} in '{}' has non-positive position {}:{}",
                i,
                metadata_path.display(),
                meta.surah,
                meta.ayah
            ));
        }

        let start = i * dimension;
        records.push(VerseRecord {
            surah: meta.surah,
            ayah: meta.ayah,
            arabic_text: meta.arabic_text,
            english_text: meta.english_text,
            embedding: values[start..start + dimension].to_vec(),
        });
    }

    tracing::info!(
        "Loaded verse corpus: {} verses, {}-dimensional embeddings",
        records.len(),
        dimension
    );

    Ok(records)
}

/// Read the binary embeddings artifact.
///
/// Returns (count, dimension, flat row-major values).
fn read_embeddings(path: &Path) -> Result<(usize, usize, Vec<f32>)> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open embeddings file '{}'", path.display()))?;
    let mut reader = BufReader::new(file);

    let count = reader
        .read_u32::<LittleEndian>()
        .with_context(|| format!("Embeddings file '{}' is missing its header", path.display()))?
        as usize;
    let dimension = reader
        .read_u32::<LittleEndian>()
        .with_context(|| format!("Embeddings file '{}' is missing its header", path.display()))?
        as usize;

    if dimension == 0 {
        return Err(anyhow!(
            "Embeddings file '{}' declares zero-dimensional vectors",
            path.display()
        ));
    }

    let mut values = vec![0.0f32; count * dimension];
    reader
        .read_f32_into::<LittleEndian>(&mut values)
        .with_context(|| {
            format!(
                "Embeddings file '{}' is shorter than its header declares ({} vectors of dimension {})",
                path.display(),
                count,
                dimension
            )
        })?;

    // The header must account for the whole file
    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(anyhow!(
            "Embeddings file '{}' has trailing data beyond its declared {} vectors",
            path.display(),
            count
        ));
    }

    Ok((count, dimension, values))
}

/// Read and parse the JSON metadata artifact.
fn read_metadata(path: &Path) -> Result<Vec<VerseMeta>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open metadata file '{}'", path.display()))?;
    let metas: Vec<VerseMeta> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse metadata file '{}'", path.display()))?;
    Ok(metas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;
    use std::path::PathBuf;

    /// Fixture directory with the two artifacts, removed on drop.
    struct ArtifactDir {
        dir: PathBuf,
    }

    impl ArtifactDir {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "dhikra-corpus-test-{}-{}",
                tag,
                std::process::id()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self { dir }
        }

        fn embeddings_path(&self) -> PathBuf {
            self.dir.join("embeddings.bin")
        }

        fn metadata_path(&self) -> PathBuf {
            self.dir.join("verses.json")
        }

        fn write_embeddings(&self, count: u32, dimension: u32, values: &[f32]) {
            let mut file = File::create(self.embeddings_path()).unwrap();
            file.write_u32::<LittleEndian>(count).unwrap();
            file.write_u32::<LittleEndian>(dimension).unwrap();
            for value in values {
                file.write_f32::<LittleEndian>(*value).unwrap();
            }
        }

        fn write_metadata(&self, json: &str) {
            let mut file = File::create(self.metadata_path()).unwrap();
            file.write_all(json.as_bytes()).unwrap();
        }
    }

    impl Drop for ArtifactDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    const TWO_VERSES: &str = r#"[
        {"surah": 1, "ayah": 1, "arabic_text": "بسم الله", "english_text": "In the name of God"},
        {"surah": 1, "ayah": 2, "arabic_text": "الحمد لله", "english_text": "Praise be to God"}
    ]"#;

    #[test]
    fn test_load_valid_corpus() {
        let fixture = ArtifactDir::new("valid");
        fixture.write_embeddings(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        fixture.write_metadata(TWO_VERSES);

        let records = load_corpus(fixture.embeddings_path(), fixture.metadata_path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].surah, 1);
        assert_eq!(records[0].ayah, 1);
        assert_eq!(records[0].embedding, vec![1.0, 0.0, 0.0]);
        assert_eq!(records[1].ayah, 2);
        assert_eq!(records[1].embedding, vec![0.0, 1.0, 0.0]);
        assert_eq!(records[1].english_text, "Praise be to God");
    }

    #[test]
    fn test_load_rejects_count_mismatch() {
        let fixture = ArtifactDir::new("count-mismatch");
        // Three vectors but only two metadata entries
        fixture.write_embeddings(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        fixture.write_metadata(TWO_VERSES);

        let result = load_corpus(fixture.embeddings_path(), fixture.metadata_path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("disagree"));
    }

    #[test]
    fn test_load_rejects_zero_dimension() {
        let fixture = ArtifactDir::new("zero-dim");
        fixture.write_embeddings(2, 0, &[]);
        fixture.write_metadata(TWO_VERSES);

        assert!(load_corpus(fixture.embeddings_path(), fixture.metadata_path()).is_err());
    }

    #[test]
    fn test_load_rejects_truncated_payload() {
        let fixture = ArtifactDir::new("truncated");
        // Header promises 2x3 values but only 4 are present
        fixture.write_embeddings(2, 3, &[1.0, 0.0, 0.0, 0.0]);
        fixture.write_metadata(TWO_VERSES);

        assert!(load_corpus(fixture.embeddings_path(), fixture.metadata_path()).is_err());
    }

    #[test]
    fn test_load_rejects_trailing_data() {
        let fixture = ArtifactDir::new("trailing");
        // One extra value past what the header declares
        fixture.write_embeddings(2, 2, &[1.0, 0.0, 0.0, 1.0, 9.9]);
        fixture.write_metadata(TWO_VERSES);

        assert!(load_corpus(fixture.embeddings_path(), fixture.metadata_path()).is_err());
    }

    #[test]
    fn test_load_rejects_non_positive_positions() {
        let fixture = ArtifactDir::new("bad-position");
        fixture.write_embeddings(1, 2, &[1.0, 0.0]);
        fixture.write_metadata(
            r#"[{"surah": 0, "ayah": 1, "arabic_text": "x", "english_text": "y"}]"#,
        );

        assert!(load_corpus(fixture.embeddings_path(), fixture.metadata_path()).is_err());
    }

    #[test]
    fn test_load_rejects_missing_files() {
        let fixture = ArtifactDir::new("missing");
        fixture.write_metadata(TWO_VERSES);

        assert!(load_corpus(fixture.embeddings_path(), fixture.metadata_path()).is_err());
    }
}
