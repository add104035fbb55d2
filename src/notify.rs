use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::HospitalAlert;

/// Best-effort hospital channel; callers log a failed `send` and carry on.
pub trait NotificationSink: Send + Sync {
    fn send(&self, alert: &HospitalAlert) -> anyhow::Result<()>;
}

/// Emits alerts into the log stream only.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn send(&self, alert: &HospitalAlert) -> anyhow::Result<()> {
        tracing::info!(
            hospital = %alert.hospital_id,
            surge = alert.surge,
            window_end = %alert.time_window.to_rfc3339(),
            "hospital surge notification"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct DispatchRecord<'a> {
    id: Uuid,
    dispatched_at: DateTime<Utc>,
    hospital_id: &'a str,
    surge: u32,
    time_window: DateTime<Utc>,
}

/// Appends one JSON record per alert to the wrapped writer.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> NotificationSink for JsonLinesSink<W> {
    fn send(&self, alert: &HospitalAlert) -> anyhow::Result<()> {
        let record = DispatchRecord {
            id: Uuid::new_v4(),
            dispatched_at: Utc::now(),
            hospital_id: &alert.hospital_id,
            surge: alert.surge,
            time_window: alert.time_window,
        };
        let line = serde_json::to_string(&record)?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("notification writer lock poisoned"))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}
