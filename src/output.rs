use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::replay::RateColumn;
use crate::trace::CategoryTrace;

/// `<out_dir>/<src basename>_reg<category>.data`
pub fn output_path(out_dir: &Path, src_file: &Path, category: &str) -> PathBuf {
    let base = src_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string());
    out_dir.join(format!("{base}_reg{category}.data"))
}

/// Writes one space-separated row per event, with the rate columns appended
/// after the trace columns. The leading index column has an empty header.
pub fn write_rate_table<W: Write>(
    mut out: W,
    trace: &CategoryTrace,
    columns: &[RateColumn],
) -> io::Result<()> {
    for column in columns {
        if column.values.len() != trace.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "rate column '{}' has {} values for {} events",
                    column.name,
                    column.values.len(),
                    trace.len()
                ),
            ));
        }
    }

    write!(out, " time_sec region relative_time_sec interarrival_sec")?;
    for column in columns {
        write!(out, " {}", column.name)?;
    }
    writeln!(out)?;

    for (i, row) in trace.rows.iter().enumerate() {
        write!(
            out,
            "{i} {} {} {} {}",
            row.time_sec, trace.category, row.relative_time_sec, row.interarrival_sec
        )?;
        for column in columns {
            write!(out, " {}", column.values[i])?;
        }
        writeln!(out)?;
    }
    out.flush()
}

pub fn write_rate_file(path: &Path, trace: &CategoryTrace, columns: &[RateColumn]) -> io::Result<()> {
    let file = File::create(path)?;
    write_rate_table(BufWriter::new(file), trace, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, values: &[u64]) -> RateColumn {
        RateColumn {
            name: name.to_string(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn path_uses_source_basename() {
        let p = output_path(Path::new("/out"), Path::new("/data/wc_day46.log"), "3");
        assert_eq!(p, PathBuf::from("/out/wc_day46.log_reg3.data"));
    }

    #[test]
    fn table_layout() {
        let trace = CategoryTrace::prepare("3", vec![10, 10, 12]);
        let cols = vec![column("1sec", &[1, 2, 0]), column("10sec", &[1, 2, 0])];
        let mut buf = Vec::new();
        write_rate_table(&mut buf, &trace, &cols).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], " time_sec region relative_time_sec interarrival_sec 1sec 10sec");
        assert_eq!(lines[1], "0 10 3 0 0 1 1");
        assert_eq!(lines[2], "1 10 3 0 0 2 2");
        assert_eq!(lines[3], "2 12 3 2 2 0 0");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn rejects_misaligned_columns() {
        let trace = CategoryTrace::prepare("3", vec![1, 2]);
        let err = write_rate_table(Vec::new(), &trace, &[column("x", &[1])]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_reg1.data");
        let trace = CategoryTrace::prepare("1", vec![0, 1]);
        write_rate_file(&path, &trace, &[column("1sec", &[1, 0])]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("1 1 1 1 1 0\n"));
    }
}
