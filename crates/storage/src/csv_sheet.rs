//! CSV encoding of [`Sheet`]s.
//!
//! Sheets are read with flexible record lengths (spreadsheet exports often
//! drop trailing empty cells) and written atomically: a temp file beside the
//! target is written first and then renamed over it.

use std::io;
use std::path::{Path, PathBuf};

use rollcall_core::sheet::Sheet;

/// Parse CSV bytes with a header row.
pub fn parse_sheet(bytes: &[u8]) -> Result<Sheet, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let mut headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if let Some(first) = headers.first_mut() {
        // Excel writes a UTF-8 BOM in front of the first header
        *first = first.trim_start_matches('\u{feff}').to_string();
    }

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?.iter().map(str::to_string).collect());
    }

    Ok(Sheet { headers, records })
}

/// Parse CSV bytes that have no header row.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    reader
        .records()
        .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
        .collect()
}

/// Encode a sheet as CSV bytes.
pub fn encode_sheet(sheet: &Sheet) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(&sheet.headers)?;
    for record in &sheet.records {
        writer.write_record(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Write `sheet` to `path` via a temp file and rename.
pub fn write_sheet_atomic(path: &Path, sheet: &Sheet) -> io::Result<()> {
    let bytes = encode_sheet(sheet).map_err(io::Error::other)?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ragged_rows_and_strips_bom() {
        let bytes = "\u{feff}Registration Id,Email Id,Attendance *\n2403001,a@x.edu,PRESENT\n2403002,b@x.edu\n";
        let sheet = parse_sheet(bytes.as_bytes()).unwrap();
        assert_eq!(sheet.headers[0], "Registration Id");
        assert_eq!(sheet.records.len(), 2);
        assert_eq!(sheet.records[1].len(), 2);
    }

    #[test]
    fn quoted_cells_survive_write_and_read() {
        let sheet = Sheet::new(
            vec!["Name".into(), "Note".into()],
            vec![vec!["Rao, K".into(), "said \"hi\"".into()]],
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_sheet_atomic(&path, &sheet).unwrap();

        let back = parse_sheet(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, sheet);
        assert!(!dir.path().join("out.csv.tmp").exists());
    }

    #[test]
    fn headerless_rows() {
        let rows = parse_rows(b"1,2403001,AMY\n2,2403002,RAJ\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][2], "RAJ");
    }
}
