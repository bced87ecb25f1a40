use parquet::errors::ParquetError;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{fs::File, path::Path};

/// Footer-level facts about a Parquet file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetSummary {
    pub rows: i64,
    pub row_groups: usize,
    pub columns: Vec<String>,
    pub created_by: Option<String>,
}

/// Read the footer of `path`. Fails on truncated or non-Parquet files,
/// which is how an interrupted download shows up.
pub fn summarize(path: &Path) -> Result<ParquetSummary, ParquetError> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let meta = reader.metadata();
    let file_meta = meta.file_metadata();

    Ok(ParquetSummary {
        rows: file_meta.num_rows(),
        row_groups: meta.num_row_groups(),
        columns: file_meta
            .schema_descr()
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        created_by: file_meta.created_by().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::tiny_parquet;
    use tempfile::tempdir;

    #[test]
    fn reads_rows_and_columns() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("trips.parquet");
        std::fs::write(&path, tiny_parquet(&[1, 2, 3])).unwrap();

        let summary = summarize(&path).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.row_groups, 1);
        assert_eq!(summary.columns, vec!["passenger_count".to_string()]);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("trips.parquet");
        let mut bytes = tiny_parquet(&[1, 2, 3]);
        bytes.truncate(bytes.len() / 2);
        std::fs::write(&path, bytes).unwrap();

        assert!(summarize(&path).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempdir().unwrap();
        assert!(summarize(&tmp.path().join("absent.parquet")).is_err());
    }
}
