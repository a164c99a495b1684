//! Tab-separated table formats and the ordination JSON writer.
//!
//! Feature tables use the biom-style layout: a `#OTU ID` header row naming
//! the samples, then one row per feature. Leading comment lines before the
//! header are ignored.

use csv::{ReaderBuilder, WriterBuilder};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::diversity::{AlphaDiversity, DistanceMatrix};
use crate::error::{KmerizerError, Result};
use crate::ordination::OrdinationResult;
use crate::table::FeatureTable;

const TABLE_HEADER: &str = "#OTU ID";

/// Reads a feature x sample table from biom-style TSV.
///
/// Every value must be a finite non-negative number.
pub fn read_feature_table(path: &Path) -> Result<FeatureTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut sample_ids: Option<Vec<String>> = None;
    let mut feature_ids: Vec<String> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let first = record.get(0).unwrap_or("").trim();

        let samples = match &sample_ids {
            None => {
                if first == TABLE_HEADER {
                    sample_ids = Some(record.iter().skip(1).map(|s| s.trim().to_string()).collect());
                } else if first.starts_with('#') {
                    // Comment line above the header, e.g. a biom provenance note.
                } else {
                    return Err(KmerizerError::TableFormat(format!(
                        "expected a '{TABLE_HEADER}' header row, found '{first}'"
                    )));
                }
                continue;
            }
            Some(samples) => samples,
        };

        if record.len() != samples.len() + 1 {
            return Err(KmerizerError::TableFormat(format!(
                "row '{}' has {} values for {} samples",
                first,
                record.len() - 1,
                samples.len()
            )));
        }
        feature_ids.push(first.to_string());
        for cell in record.iter().skip(1) {
            let value: f64 = cell.trim().parse().map_err(|_| {
                KmerizerError::TableFormat(format!("value '{}' in row '{}' is not a number", cell, first))
            })?;
            if !value.is_finite() || value < 0.0 {
                return Err(KmerizerError::TableFormat(format!(
                    "value {value} in row '{first}' is negative or not finite"
                )));
            }
            values.push(value);
        }
    }

    let sample_ids = sample_ids.ok_or_else(|| {
        KmerizerError::TableFormat(format!("no '{TABLE_HEADER}' header row found"))
    })?;
    let data = Array2::from_shape_vec((feature_ids.len(), sample_ids.len()), values)
        .map_err(|e| KmerizerError::ShapeMismatch(e.to_string()))?;
    FeatureTable::from_parts(data, feature_ids, sample_ids)
}

/// Writes a feature table in the same biom-style TSV layout.
pub fn write_feature_table(table: &FeatureTable, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    let mut header = vec![TABLE_HEADER.to_string()];
    header.extend(table.sample_ids().iter().cloned());
    writer.write_record(&header)?;

    let matrix = table.matrix();
    for (row, id) in table.feature_ids().iter().enumerate() {
        let mut record = Vec::with_capacity(table.n_samples() + 1);
        record.push(id.clone());
        for value in matrix.row(row) {
            record.push(format!("{value}"));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a square distance matrix with sample IDs on both axes.
pub fn write_distance_matrix(distances: &DistanceMatrix, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    let mut header = vec![String::new()];
    header.extend(distances.sample_ids().iter().cloned());
    writer.write_record(&header)?;

    for (row, id) in distances.sample_ids().iter().enumerate() {
        let mut record = Vec::with_capacity(distances.n_samples() + 1);
        record.push(id.clone());
        for col in 0..distances.n_samples() {
            record.push(format!("{}", distances.get(row, col)));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes an alpha-diversity vector as a two-column TSV.
pub fn write_alpha_vector(alpha: &AlphaDiversity, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(["sample-id", alpha.name()])?;
    for (id, value) in alpha.iter() {
        let formatted = format!("{value}");
        writer.write_record([id, formatted.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes an ordination result as pretty-printed JSON.
pub fn write_ordination(result: &OrdinationResult, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use std::fs;
    use tempfile::tempdir;

    fn table() -> FeatureTable {
        FeatureTable::from_parts(
            arr2(&[[10.0, 20.5], [5.0, 0.0]]),
            vec!["f1".to_string(), "f2".to_string()],
            vec!["s1".to_string(), "s2".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_feature_table_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.tsv");
        write_feature_table(&table(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "#OTU ID\ts1\ts2\nf1\t10\t20.5\nf2\t5\t0\n");

        let reloaded = read_feature_table(&path).unwrap();
        assert_eq!(reloaded.feature_ids(), table().feature_ids());
        assert_eq!(reloaded.sample_ids(), table().sample_ids());
        assert_eq!(reloaded.matrix(), table().matrix());
    }

    #[test]
    fn test_read_skips_leading_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.tsv");
        fs::write(
            &path,
            "# Constructed from biom file\n#OTU ID\ts1\nf1\t3\n",
        )
        .unwrap();

        let table = read_feature_table(&path).unwrap();
        assert_eq!(table.dimensions(), (1, 1));
        assert_eq!(table.feature_row("f1").unwrap()[0], 3.0);
    }

    #[test]
    fn test_read_rejects_missing_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.tsv");
        fs::write(&path, "f1\t3\nf2\t4\n").unwrap();
        assert!(matches!(
            read_feature_table(&path),
            Err(KmerizerError::TableFormat(_))
        ));
    }

    #[test]
    fn test_read_rejects_negative_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("neg.tsv");
        fs::write(&path, "#OTU ID\ts1\nf1\t-3\n").unwrap();
        assert!(matches!(
            read_feature_table(&path),
            Err(KmerizerError::TableFormat(_))
        ));
    }

    #[test]
    fn test_read_rejects_ragged_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.tsv");
        fs::write(&path, "#OTU ID\ts1\ts2\nf1\t3\n").unwrap();
        assert!(matches!(
            read_feature_table(&path),
            Err(KmerizerError::TableFormat(_))
        ));
    }

    #[test]
    fn test_write_distance_matrix_layout() {
        let dm = DistanceMatrix::from_parts(
            vec!["s1".to_string(), "s2".to_string()],
            arr2(&[[0.0, 0.25], [0.25, 0.0]]),
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("dm.tsv");
        write_distance_matrix(&dm, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "\ts1\ts2\ns1\t0\t0.25\ns2\t0.25\t0\n");
    }

    #[test]
    fn test_write_alpha_vector_layout() {
        let alpha = AlphaDiversity::from_parts(
            "observed_features",
            vec!["s1".to_string(), "s2".to_string()],
            vec![14.0, 9.0],
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("alpha.tsv");
        write_alpha_vector(&alpha, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "sample-id\tobserved_features\ns1\t14\ns2\t9\n"
        );
    }

    #[test]
    fn test_ordination_json_round_trip() {
        let result = OrdinationResult::from_parts(
            vec!["s1".to_string(), "s2".to_string()],
            arr2(&[[1.0, 0.0], [-1.0, 0.0]]),
            vec![2.0, 0.0],
            vec![1.0, 0.0],
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("pcoa.json");
        write_ordination(&result, &path).unwrap();

        let reloaded: OrdinationResult =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded.sample_ids(), result.sample_ids());
        assert_eq!(reloaded.proportion_explained(), result.proportion_explained());
        assert_eq!(reloaded.coordinates(), result.coordinates());
    }
}
