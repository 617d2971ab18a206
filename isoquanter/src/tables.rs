//! CSV reporter and impurity tables
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use isoquant::{ImpurityTable, ReporterChannel, ReporterSet};

use crate::QuanterError;

#[derive(Debug, Deserialize)]
struct ReporterRow {
    #[serde(rename = "Label")]
    label: String,
    #[serde(rename = "ReporterMass")]
    mass: f64,
}

fn csv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader)
}

/// Read custom reporter channels from a table with `Label` and `ReporterMass`
/// columns
pub fn read_reporter_table_from<R: io::Read>(reader: R) -> Result<ReporterSet, QuanterError> {
    let mut channels = Vec::new();
    for row in csv_reader(reader).deserialize() {
        let row: ReporterRow = row?;
        channels.push(ReporterChannel::new(row.label, row.mass));
    }
    Ok(ReporterSet::custom(channels)?)
}

pub fn read_reporter_table(path: impl AsRef<Path>) -> Result<ReporterSet, QuanterError> {
    let path = path.as_ref();
    let reporters = read_reporter_table_from(fs::File::open(path)?)?;
    debug!(
        "Read {} reporter channels from {}",
        reporters.len(),
        path.display()
    );
    Ok(reporters)
}

/// Read an impurity table. The first column holds channel labels and every
/// other header is a signed nominal mass offset (`-2`, `-1`, `+1`, `+2`), with
/// impurities given in percent.
pub fn read_impurity_table_from<R: io::Read>(
    reader: R,
    name: &str,
) -> Result<ImpurityTable, QuanterError> {
    let format_error = |reason: String| QuanterError::TableFormatError {
        path: name.to_string(),
        reason,
    };

    let mut reader = csv_reader(reader);
    let headers = reader.headers()?.clone();
    let offsets = headers
        .iter()
        .skip(1)
        .map(|h| {
            h.parse::<i32>()
                .map_err(|_| format_error(format!("{h:?} is not a mass offset")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if offsets.is_empty() {
        return Err(format_error("no mass offset columns".into()));
    }

    let mut labels = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(label) = record.get(0) else {
            continue;
        };
        let row = record
            .iter()
            .skip(1)
            .map(|v| {
                v.parse::<f64>().map_err(|_| {
                    format_error(format!("{label} has a non-numeric impurity {v:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        labels.push(label.to_string());
        values.push(row);
    }
    Ok(ImpurityTable::new(labels, offsets, values)?)
}

pub fn read_impurity_table(path: impl AsRef<Path>) -> Result<ImpurityTable, QuanterError> {
    let path = path.as_ref();
    let table = read_impurity_table_from(fs::File::open(path)?, &path.display().to_string())?;
    debug!(
        "Read impurities for {} channels across {} offsets from {}",
        table.len(),
        table.offsets().len(),
        path.display()
    );
    Ok(table)
}

#[cfg(test)]
mod test {
    use super::*;
    use isoquant::{QuantError, ReagentKind};

    const TMT6_IMPURITIES: &str = "\
Label,-2,-1,+1,+2
tmt126,0.0,0.0,8.2,0.0
tmt127N,0.0,0.4,7.3,0.0
tmt128C,0.0,1.2,6.5,0.0
tmt129N,0.0,1.5,5.8,0.0
tmt130C,0.0,2.6,4.9,0.0
tmt131,0.0,3.4,3.9,0.0
";

    #[test]
    fn test_read_impurity_table() {
        let table = read_impurity_table_from(TMT6_IMPURITIES.as_bytes(), "tmt6.csv").unwrap();
        assert_eq!(table.offsets(), &[-2, -1, 1, 2]);
        assert_eq!(table.len(), 6);
        assert_eq!(table.get("tmt127N", 1), Some(7.3));
        assert_eq!(table.get("tmt131", -1), Some(3.4));

        let reporters = ReporterSet::builtin(ReagentKind::Tmt6).unwrap();
        let matrix = isoquant::CorrectionMatrix::build(&reporters, &table).unwrap();
        assert_eq!(matrix.len(), 6);
    }

    #[test]
    fn test_malformed_impurity_table() {
        let err = read_impurity_table_from("Label,-1,one\ntmt126,0.0,0.0\n".as_bytes(), "bad.csv")
            .unwrap_err();
        assert!(matches!(err, QuanterError::TableFormatError { .. }));

        let err =
            read_impurity_table_from("Label,-1,+1\ntmt126,0.0,x\n".as_bytes(), "bad.csv").unwrap_err();
        assert!(matches!(err, QuanterError::TableFormatError { .. }));

        let err = read_impurity_table_from("Label,0,+1\ntmt126,0.0,1.0\n".as_bytes(), "bad.csv")
            .unwrap_err();
        assert!(matches!(
            err,
            QuanterError::QuantError(QuantError::InvalidImpurityTable(_))
        ));

        let err = read_impurity_table_from("Label,-1,+1\ntmt126,0.0\n".as_bytes(), "bad.csv")
            .unwrap_err();
        assert!(matches!(err, QuanterError::CsvError(_)));
    }

    #[test]
    fn test_read_reporter_table() {
        let reporters = read_reporter_table_from(
            "Label, ReporterMass\n# light and heavy\nlight, 126.5\nheavy, 127.5\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(reporters.labels(), vec!["light", "heavy"]);
        assert_eq!(reporters.kind(), ReagentKind::Custom);

        let err = read_reporter_table_from("Label,ReporterMass\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            QuanterError::QuantError(QuantError::EmptyChannelSet)
        ));

        let err =
            read_reporter_table_from("Label,ReporterMass\nlight,heavy\n".as_bytes()).unwrap_err();
        assert!(matches!(err, QuanterError::CsvError(_)));
    }
}
