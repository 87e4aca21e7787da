use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryFileError {
    #[error("could not open query file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read query file: {0}")]
    Csv(#[from] csv::Error),
}

/// Read search queries from the first column of a delimited file.
pub fn read_queries(path: &Path) -> Result<Vec<String>, QueryFileError> {
    let file = File::open(path).map_err(|source| QueryFileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_queries(file)
}

/// The first row is a header and is skipped. Cells are trimmed; blank cells
/// and rows without a first column are dropped. Rows may differ in length.
pub fn parse_queries<R: Read>(reader: R) -> Result<Vec<String>, QueryFileError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut queries = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if let Some(query) = record.get(0).filter(|cell| !cell.is_empty()) {
            queries.push(query.to_string());
        }
    }
    Ok(queries)
}
