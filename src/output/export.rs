//! JSON Lines export of stored records

use crate::crawler::DetailRecord;
use crate::storage::Storage;
use crate::DirectoryError;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One exported line: the record plus where it came from
#[derive(Debug, Serialize)]
struct ExportLine<'a> {
    url: &'a str,
    run_id: i64,
    #[serde(flatten)]
    record: &'a DetailRecord,
}

/// Writes stored records to `output_path`, one JSON object per line
///
/// # Arguments
///
/// * `storage` - The storage backend holding the records
/// * `output_path` - Destination file, overwritten
/// * `run_id` - Export one run only, or every run when `None`
///
/// # Returns
///
/// The number of records written
pub fn export_records(
    storage: &dyn Storage,
    output_path: &Path,
    run_id: Option<i64>,
) -> Result<usize, DirectoryError> {
    let records = storage.load_records(run_id)?;

    let mut writer = BufWriter::new(File::create(output_path)?);
    for stored in &records {
        let line = ExportLine {
            url: &stored.url,
            run_id: stored.run_id,
            record: &stored.data,
        };
        serde_json::to_writer(&mut writer, &line)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    tracing::info!(
        "Exported {} record(s) to {}",
        records.len(),
        output_path.display()
    );

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_export_writes_one_line_per_record() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash", "Texas").unwrap();
        storage
            .commit_handled(
                run_id,
                "https://example.com/pub/jane",
                &[],
                Some(&DetailRecord {
                    first_name: Some("Jane".to_string()),
                    awards: vec!["Top Doctor, 2022".to_string()],
                    ..DetailRecord::default()
                }),
            )
            .unwrap();
        storage
            .commit_handled(
                run_id,
                "https://example.com/pub/sam",
                &[],
                Some(&DetailRecord::default()),
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let written = export_records(&storage, &path, None).unwrap();
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["url"], "https://example.com/pub/jane");
        assert_eq!(lines[0]["run_id"], run_id);
        assert_eq!(lines[0]["first_name"], "Jane");
        assert_eq!(lines[0]["awards"][0], "Top Doctor, 2022");
        assert!(lines[1].get("first_name").is_none());
    }

    #[test]
    fn test_export_empty_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");

        assert_eq!(export_records(&storage, &path, Some(7)).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
