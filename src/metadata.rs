//! Sample metadata: a table of per-sample columns keyed by sample ID.
//!
//! Columns are either numeric or categorical; types are inferred when a
//! metadata file is loaded. Merging never mutates in place: each merge
//! produces a new set restricted to the samples shared by both sides, and
//! a column name that already exists is a hard error rather than an
//! overwrite.

use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;
use log::warn;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{KmerizerError, Result};

/// One metadata column, typed at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataColumn {
    /// Missing cells are NaN.
    Numeric(Vec<f64>),
    /// Missing cells are empty strings.
    Categorical(Vec<String>),
}

/// Per-sample metadata with uniquely named columns.
#[derive(Debug, Clone)]
pub struct SampleMetadata {
    sample_ids: Vec<String>,
    sample_index: HashMap<String, usize>,
    columns: IndexMap<String, MetadataColumn>,
}

impl SampleMetadata {
    /// Creates a column-less set over the given samples.
    pub fn new(sample_ids: Vec<String>) -> Result<Self> {
        let mut sample_index = HashMap::with_capacity(sample_ids.len());
        for (i, id) in sample_ids.iter().enumerate() {
            if sample_index.insert(id.clone(), i).is_some() {
                return Err(KmerizerError::DuplicateId(id.clone()));
            }
        }
        Ok(SampleMetadata {
            sample_ids,
            sample_index,
            columns: IndexMap::new(),
        })
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn contains_sample(&self, id: &str) -> bool {
        self.sample_index.contains_key(id)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&MetadataColumn> {
        self.columns.get(name)
    }

    pub fn numeric_column(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name) {
            Some(MetadataColumn::Numeric(values)) => Some(values),
            _ => None,
        }
    }

    pub fn categorical_column(&self, name: &str) -> Option<&[String]> {
        match self.columns.get(name) {
            Some(MetadataColumn::Categorical(values)) => Some(values),
            _ => None,
        }
    }

    /// Numeric columns in insertion order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().filter_map(|(name, col)| match col {
            MetadataColumn::Numeric(values) => Some((name.as_str(), values.as_slice())),
            MetadataColumn::Categorical(_) => None,
        })
    }

    /// Adds a categorical column over exactly the current samples.
    pub fn insert_categorical(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        self.check_new_column(name, values.len())?;
        self.columns
            .insert(name.to_string(), MetadataColumn::Categorical(values));
        Ok(())
    }

    /// Adds a numeric column over exactly the current samples.
    pub fn insert_numeric(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.check_new_column(name, values.len())?;
        self.columns
            .insert(name.to_string(), MetadataColumn::Numeric(values));
        Ok(())
    }

    fn check_new_column(&self, name: &str, len: usize) -> Result<()> {
        if self.columns.contains_key(name) {
            return Err(KmerizerError::ColumnCollision(name.to_string()));
        }
        if len != self.sample_ids.len() {
            return Err(KmerizerError::ShapeMismatch(format!(
                "column '{}' has {} values for {} samples",
                name,
                len,
                self.sample_ids.len()
            )));
        }
        Ok(())
    }

    /// Inner-joins a numeric column into a new metadata set.
    ///
    /// The result keeps only samples present on both sides, in this set's
    /// order, with every existing column restricted to those samples. A
    /// column name that already exists fails with
    /// [`KmerizerError::ColumnCollision`] before any joining happens.
    pub fn merge_numeric(&self, name: &str, ids: &[String], values: &[f64]) -> Result<Self> {
        if self.columns.contains_key(name) {
            return Err(KmerizerError::ColumnCollision(name.to_string()));
        }
        if ids.len() != values.len() {
            return Err(KmerizerError::ShapeMismatch(format!(
                "column '{}' has {} values for {} sample IDs",
                name,
                values.len(),
                ids.len()
            )));
        }

        let incoming: HashMap<&str, f64> = ids
            .iter()
            .map(|id| id.as_str())
            .zip(values.iter().copied())
            .collect();
        let mut kept_rows = Vec::new();
        let mut merged_ids = Vec::new();
        let mut merged_values = Vec::new();
        for (row, id) in self.sample_ids.iter().enumerate() {
            if let Some(&value) = incoming.get(id.as_str()) {
                kept_rows.push(row);
                merged_ids.push(id.clone());
                merged_values.push(value);
            }
        }
        if merged_ids.is_empty() {
            return Err(KmerizerError::ShapeMismatch(format!(
                "merging column '{name}' leaves no shared samples"
            )));
        }
        if merged_ids.len() < self.sample_ids.len() {
            warn!(
                "merging column '{}' dropped {} of {} samples",
                name,
                self.sample_ids.len() - merged_ids.len(),
                self.sample_ids.len()
            );
        }

        let mut merged = SampleMetadata::new(merged_ids)?;
        for (col_name, col) in &self.columns {
            let restricted = match col {
                MetadataColumn::Numeric(v) => {
                    MetadataColumn::Numeric(kept_rows.iter().map(|&i| v[i]).collect())
                }
                MetadataColumn::Categorical(v) => {
                    MetadataColumn::Categorical(kept_rows.iter().map(|&i| v[i].clone()).collect())
                }
            };
            merged.columns.insert(col_name.clone(), restricted);
        }
        merged
            .columns
            .insert(name.to_string(), MetadataColumn::Numeric(merged_values));
        Ok(merged)
    }
}

/// Loads sample metadata from a tab-separated file.
///
/// The first column holds sample identifiers; every other column becomes
/// numeric if all its non-empty cells parse as numbers, categorical
/// otherwise. Rows whose identifier starts with '#' (directive rows) are
/// skipped.
pub fn load_metadata(path: &Path) -> Result<SampleMetadata> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(KmerizerError::TableFormat(format!(
            "metadata file '{}' has no header row",
            path.display()
        )));
    }
    let column_names: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut sample_ids = Vec::new();
    let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); column_names.len()];
    for record in reader.records() {
        let record = record?;
        let id = record.get(0).unwrap_or("").trim().to_string();
        if id.is_empty() {
            warn!("skipping metadata row with an empty sample ID");
            continue;
        }
        if id.starts_with('#') {
            continue;
        }
        sample_ids.push(id);
        for (i, cell) in raw_columns.iter_mut().enumerate() {
            cell.push(record.get(i + 1).unwrap_or("").trim().to_string());
        }
    }
    if sample_ids.is_empty() {
        return Err(KmerizerError::TableFormat(format!(
            "metadata file '{}' contains no samples",
            path.display()
        )));
    }

    let mut metadata = SampleMetadata::new(sample_ids)?;
    for (name, raw) in column_names.into_iter().zip(raw_columns) {
        let parsed: Option<Vec<f64>> = {
            let mut values = Vec::with_capacity(raw.len());
            let mut any_number = false;
            let mut numeric = true;
            for cell in &raw {
                if cell.is_empty() {
                    values.push(f64::NAN);
                } else if let Ok(v) = cell.parse::<f64>() {
                    values.push(v);
                    any_number = true;
                } else {
                    numeric = false;
                    break;
                }
            }
            (numeric && any_number).then_some(values)
        };
        match parsed {
            Some(values) => metadata.insert_numeric(&name, values)?,
            None => metadata.insert_categorical(&name, raw)?,
        }
    }
    Ok(metadata)
}

/// Writes metadata as a tab-separated file with a `sample-id` first column.
pub fn write_metadata(metadata: &SampleMetadata, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let mut header = vec!["sample-id".to_string()];
    header.extend(metadata.column_names().map(String::from));
    writer.write_record(&header)?;

    for (row, id) in metadata.sample_ids().iter().enumerate() {
        let mut record = vec![id.clone()];
        for name in metadata.column_names() {
            let cell = match metadata.column(name) {
                Some(MetadataColumn::Numeric(v)) => {
                    if v[row].is_nan() {
                        String::new()
                    } else {
                        format!("{}", v[row])
                    }
                }
                Some(MetadataColumn::Categorical(v)) => v[row].clone(),
                None => String::new(),
            };
            record.push(cell);
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    fn base_metadata() -> SampleMetadata {
        let mut m = SampleMetadata::new(vec![
            "s1".to_string(),
            "s2".to_string(),
            "s3".to_string(),
        ])
        .unwrap();
        m.insert_categorical(
            "group",
            vec!["a".to_string(), "a".to_string(), "b".to_string()],
        )
        .unwrap();
        m
    }

    #[test]
    fn test_load_infers_column_types() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.tsv");
        write_file(
            &path,
            "sample-id\tgroup\tdepth\nS1\tcontrol\t12.5\nS2\ttreatment\t\nS3\tcontrol\t9\n",
        );

        let metadata = load_metadata(&path).unwrap();
        assert_eq!(metadata.sample_ids(), ["S1", "S2", "S3"]);
        assert_eq!(
            metadata.categorical_column("group").unwrap(),
            ["control", "treatment", "control"]
        );
        let depth = metadata.numeric_column("depth").unwrap();
        assert_eq!(depth[0], 12.5);
        assert!(depth[1].is_nan());
        assert_eq!(depth[2], 9.0);
    }

    #[test]
    fn test_load_skips_directive_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.tsv");
        write_file(
            &path,
            "sample-id\tgroup\n#q2:types\tcategorical\nS1\tcontrol\n",
        );

        let metadata = load_metadata(&path).unwrap();
        assert_eq!(metadata.sample_ids(), ["S1"]);
    }

    #[test]
    fn test_load_rejects_duplicate_sample_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.tsv");
        write_file(&path, "sample-id\tgroup\nS1\ta\nS1\tb\n");

        assert!(matches!(
            load_metadata(&path),
            Err(KmerizerError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_merge_adds_column_and_keeps_order() {
        let metadata = base_metadata();
        let merged = metadata
            .merge_numeric(
                "shannon_entropy",
                &["s3".to_string(), "s1".to_string(), "s2".to_string()],
                &[3.0, 1.0, 2.0],
            )
            .unwrap();

        // Values align by sample ID, order follows the existing set.
        assert_eq!(merged.sample_ids(), ["s1", "s2", "s3"]);
        assert_eq!(
            merged.numeric_column("shannon_entropy").unwrap(),
            [1.0, 2.0, 3.0]
        );
        // The original is untouched.
        assert!(metadata.column("shannon_entropy").is_none());
    }

    #[test]
    fn test_merge_inner_joins_samples() {
        let metadata = base_metadata();
        let merged = metadata
            .merge_numeric(
                "observed_features",
                &["s1".to_string(), "s3".to_string()],
                &[10.0, 30.0],
            )
            .unwrap();

        assert_eq!(merged.sample_ids(), ["s1", "s3"]);
        assert_eq!(
            merged.categorical_column("group").unwrap(),
            ["a", "b"]
        );
        assert_eq!(
            merged.numeric_column("observed_features").unwrap(),
            [10.0, 30.0]
        );
    }

    #[test]
    fn test_merge_rejects_column_collision() {
        let metadata = base_metadata();
        let once = metadata
            .merge_numeric("pc1", &["s1".to_string()], &[0.5])
            .unwrap();
        let err = once
            .merge_numeric("pc1", &["s1".to_string()], &[0.7])
            .unwrap_err();
        assert!(matches!(err, KmerizerError::ColumnCollision(name) if name == "pc1"));
    }

    #[test]
    fn test_merge_with_no_shared_samples_fails() {
        let metadata = base_metadata();
        assert!(metadata
            .merge_numeric("pc1", &["other".to_string()], &[0.5])
            .is_err());
    }

    #[test]
    fn test_round_trip_through_tsv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merged.tsv");
        let metadata = base_metadata()
            .merge_numeric(
                "shannon_entropy",
                &["s1".to_string(), "s2".to_string(), "s3".to_string()],
                &[1.5, 2.5, 3.5],
            )
            .unwrap();

        write_metadata(&metadata, &path).unwrap();
        let reloaded = load_metadata(&path).unwrap();
        assert_eq!(reloaded.sample_ids(), metadata.sample_ids());
        assert_eq!(
            reloaded.numeric_column("shannon_entropy").unwrap(),
            [1.5, 2.5, 3.5]
        );
        assert_eq!(
            reloaded.categorical_column("group").unwrap(),
            ["a", "a", "b"]
        );
    }
}
