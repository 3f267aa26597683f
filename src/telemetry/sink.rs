use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Serialize, Deserialize};

use crate::error::{HarnessError, Result};

/// One scalar on the metric stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    /// Global optimizer step at emission time.
    pub step: u64,
    pub epoch: usize,
}

/// Destination for per-step and per-epoch scalars.
pub trait MetricSink {
    fn emit(&mut self, record: MetricRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line to `<run_dir>/log/metrics.jsonl`.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| HarnessError::io(path, e))?;
        Ok(JsonlSink { path: path.to_path_buf(), writer: BufWriter::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricSink for JsonlSink {
    fn emit(&mut self, record: MetricRecord) -> Result<()> {
        log::trace!("{} = {:.6} (step {})", record.name, record.value, record.step);
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n").map_err(|e| HarnessError::io(&self.path, e))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| HarnessError::io(&self.path, e))
    }
}

/// Keeps records in memory; clones share the same buffer so a test can
/// hand one clone to the controller and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<MetricRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything accepted so far. Records pushed before a panic in another
    /// holder of the buffer are still returned.
    pub fn records(&self) -> Vec<MetricRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Values emitted under `name`, in emission order.
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.records().into_iter().filter(|r| r.name == name).map(|r| r.value).collect()
    }
}

impl MetricSink for MemorySink {
    fn emit(&mut self, record: MetricRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| HarnessError::Telemetry(format!("memory sink poisoned; dropped `{}`", record.name)))?;
        records.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonl_sink_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log").join("metrics.jsonl");
        let mut sink = JsonlSink::create(&path).unwrap();
        for step in 0..3 {
            sink.emit(MetricRecord { name: "tr_loss_step".into(), value: 0.5, step, epoch: 0 }).unwrap();
        }
        sink.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let records: Vec<MetricRecord> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].step, 2);
    }

    #[test]
    fn poisoned_memory_sink_rejects_records() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.emit(MetricRecord { name: "val_change_f1".into(), value: 0.4, step: 0, epoch: 0 }).unwrap();

        let holder = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.records.lock().unwrap();
            panic!("holder panicked");
        })
        .join();

        let err = writer.emit(MetricRecord { name: "val_change_f1".into(), value: 0.6, step: 1, epoch: 1 }).unwrap_err();
        assert!(matches!(err, HarnessError::Telemetry(_)));
        assert_eq!(sink.values("val_change_f1"), vec![0.4]);
    }
}
