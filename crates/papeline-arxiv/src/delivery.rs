//! Record delivery: dated JSONL files or signed batch POSTs

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use papeline_core::{Retryable, StreamError, Transport, is_shutdown_requested, retry_with_backoff};

use crate::config::{Delivery, LocalConfig, RemoteConfig};
use crate::error::PipelineError;
use crate::record::PaperRecord;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Delivery target for one run.
#[derive(Debug)]
pub enum Dispatcher {
    Local(LocalSink),
    Remote(RemoteSink),
}

impl Dispatcher {
    pub fn from_config(delivery: &Delivery) -> Self {
        match delivery {
            Delivery::Local(local) => Self::Local(LocalSink::new(local)),
            Delivery::Remote(remote) => Self::Remote(RemoteSink::new(remote.clone())),
        }
    }

    /// Deliver `records` in order. Returns how many were delivered.
    ///
    /// `window_end` names the local output file.
    pub fn deliver<T: Transport>(
        &self,
        records: &[PaperRecord],
        window_end: DateTime<Utc>,
        transport: &T,
        pb: &ProgressBar,
    ) -> Result<usize, PipelineError> {
        match self {
            Self::Local(sink) => sink.write(records, window_end),
            Self::Remote(sink) => sink.send(records, transport, pb),
        }
    }

    /// Where records go, for logs and the run summary.
    pub fn describe(&self, window_end: DateTime<Utc>) -> String {
        match self {
            Self::Local(sink) => sink.path_for(window_end).display().to_string(),
            Self::Remote(sink) => sink.config.url.clone(),
        }
    }
}

/// Appends one JSON object per line to `{output_dir}/{YYYY-MM-DD}.jsonl`.
#[derive(Debug, Clone)]
pub struct LocalSink {
    output_dir: PathBuf,
}

impl LocalSink {
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn path_for(&self, window_end: DateTime<Utc>) -> PathBuf {
        self.output_dir
            .join(format!("{}.jsonl", window_end.format("%Y-%m-%d")))
    }

    pub fn write(
        &self,
        records: &[PaperRecord],
        window_end: DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        if records.is_empty() {
            return Ok(0);
        }
        let path = self.path_for(window_end);
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| PipelineError::io(&self.output_dir, e))?;
        append_lines(&path, records).map_err(|e| PipelineError::io(&path, e))?;
        log::info!("Wrote {} records to {}", records.len(), path.display());
        Ok(records.len())
    }
}

fn append_lines(path: &Path, records: &[PaperRecord]) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// POSTs JSON arrays of records, signed when a key is configured.
#[derive(Debug, Clone)]
pub struct RemoteSink {
    config: RemoteConfig,
}

/// Failed POST attempt. Only network failures and 5xx are worth repeating.
#[derive(Debug)]
struct PostError(StreamError);

impl std::fmt::Display for PostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Retryable for PostError {
    fn is_retryable(&self) -> bool {
        match self.0.status() {
            Some(status) => status >= 500,
            None => self.0.is_retryable(),
        }
    }
}

impl RemoteSink {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    /// Body and headers for one batch, signed when a key is configured.
    pub fn prepare(&self, body: Vec<u8>) -> (Vec<u8>, Vec<(String, String)>) {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(key) = &self.config.api_key {
            headers.push((API_KEY_HEADER.to_string(), key.clone()));
        }
        match &self.config.signer {
            Some(signer) => {
                let signed = signer.sign(body);
                headers.extend(signed.headers());
                (signed.body, headers)
            }
            None => (body, headers),
        }
    }

    pub fn send<T: Transport>(
        &self,
        records: &[PaperRecord],
        transport: &T,
        pb: &ProgressBar,
    ) -> Result<usize, PipelineError> {
        let batch_size = self.config.batch_size.max(1);
        let batches = records.len().div_ceil(batch_size);
        let mut delivered = 0;

        for (i, batch) in records.chunks(batch_size).enumerate() {
            if is_shutdown_requested() {
                return Err(PipelineError::Interrupted);
            }
            pb.set_message(format!("batch {}/{batches}", i + 1));

            let body = serde_json::to_vec(batch)
                .map_err(|e| PipelineError::Delivery(StreamError::Io(e.into())))?;
            let (body, headers) = self.prepare(body);
            let label = format!("batch {}/{batches}", i + 1);

            retry_with_backoff(&label, &self.config.retry, pb, |_attempt| {
                let resp = transport
                    .post(&self.config.url, &headers, &body)
                    .map_err(PostError)?;
                if resp.is_success() {
                    Ok(())
                } else {
                    Err(PostError(StreamError::from_status(resp.status, &resp.body)))
                }
            })
            .map_err(|PostError(e)| match e {
                StreamError::Http {
                    status: Some(status),
                    message,
                } if (400..500).contains(&status) => PipelineError::DeliveryAuth { status, message },
                other => PipelineError::Delivery(other),
            })?;

            delivered += batch.len();
            log::debug!("Delivered batch {}/{batches} ({} records)", i + 1, batch.len());
        }

        if delivered > 0 {
            log::info!("Delivered {delivered} records to {}", self.config.url);
        }
        Ok(delivered)
    }
}
