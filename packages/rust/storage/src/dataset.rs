//! Line-delimited JSON persistence for enriched datasets.
//!
//! One [`PaperRecord`] per line. Writes go through a temporary file and a
//! rename, so an interrupted rewrite never leaves a half-written dataset in
//! place of a good one.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use paperscout_shared::{PaperRecord, PaperScoutError, Result};

/// Persist `records` to `path` as JSONL, replacing any existing file.
pub fn persist_dataset(records: &[PaperRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PaperScoutError::io(parent, e))?;
    }

    let tmp_path = path.with_extension("jsonl.tmp");
    {
        let file =
            std::fs::File::create(&tmp_path).map_err(|e| PaperScoutError::io(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| PaperScoutError::Storage(format!("serialize record: {e}")))?;
            writeln!(writer, "{line}").map_err(|e| PaperScoutError::io(&tmp_path, e))?;
        }
        writer.flush().map_err(|e| PaperScoutError::io(&tmp_path, e))?;
    }
    std::fs::rename(&tmp_path, path).map_err(|e| PaperScoutError::io(path, e))?;

    tracing::debug!(?path, count = records.len(), "dataset persisted");
    Ok(())
}

/// Reload a dataset persisted by [`persist_dataset`].
///
/// Parsing is strict: a line that no longer deserializes is a
/// [`PaperScoutError::Parse`], not a skip — dataset files are owned
/// artifacts, so corruption here means the file must be rebuilt.
pub fn reload_dataset(path: &Path) -> Result<Vec<PaperRecord>> {
    let file = std::fs::File::open(path).map_err(|e| PaperScoutError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| PaperScoutError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PaperRecord = serde_json::from_str(&line).map_err(|e| {
            PaperScoutError::parse(format!(
                "{}:{}: invalid dataset line: {e}",
                path.display(),
                lineno + 1
            ))
        })?;
        records.push(record);
    }
    Ok(records)
}
