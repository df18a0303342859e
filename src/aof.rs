// Append-only file.
// Every accepted write is appended as the RESP array the client sent. On
// startup the file is read back from the beginning and each record is
// re-executed, which rebuilds the keyspace exactly as it was.

use crate::{
    cmd::{is_write_request, split_request, CommandError},
    CodecError, Engine, Execution, RespEncode, RespError, RespFrame, RespFrameCodec,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

// Pending records are written out early once they grow past this.
const PENDING_CAP: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum AofError {
    #[error("cannot open AOF file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("AOF I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("AOF record {record} is corrupt: {source}")]
    Corrupt {
        record: usize,
        #[source]
        source: RespError,
    },
}

/// What a replay did with the records it found.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub skipped: usize,
    /// The file ended in the middle of a record.
    pub truncated: bool,
}

#[derive(Debug)]
pub struct Aof {
    path: PathBuf,
    // One lock for append, flush and logged execution, so records never
    // interleave and file order is the order writes were applied.
    log: Mutex<LogFile>,
}

#[derive(Debug)]
struct LogFile {
    file: File,
    /// Whole encoded records not yet handed to the file.
    pending: Vec<u8>,
    /// File length up to the end of the last record known to be written.
    len: u64,
}

impl LogFile {
    fn push(&mut self, record: RespFrame) {
        self.pending.extend_from_slice(&record.encode());
    }

    // On failure the file is cut back to `len` and the records stay pending,
    // so a half-written record never sits in front of later ones.
    async fn write_pending(&mut self) -> Result<(), AofError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let written = match self.file.write_all(&self.pending).await {
            Ok(()) => self.file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.file.set_len(self.len).await?;
            return Err(e.into());
        }

        self.len += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }

    async fn sync(&mut self) -> Result<(), AofError> {
        self.write_pending().await?;
        self.file.sync_data().await?;
        Ok(())
    }
}

impl Aof {
    /// Opens (or creates) the log at `path` and replays it into `engine`.
    pub async fn open(path: impl AsRef<Path>, engine: &Engine) -> Result<Self, AofError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| AofError::Open {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(open_err)?;
        let len = file.metadata().await.map_err(open_err)?.len();

        let aof = Aof {
            path,
            log: Mutex::new(LogFile {
                file,
                pending: Vec::new(),
                len,
            }),
        };

        let stats = aof.replay(engine).await?;
        info!(
            "Replayed AOF {}: {} applied, {} skipped",
            aof.path.display(),
            stats.applied,
            stats.skipped
        );
        Ok(aof)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs one client request, logging it when it is an accepted write.
    ///
    /// Writes are applied and logged under the log lock, so two writes to the
    /// same key reach the file in the order they hit the keyspace. Reads skip
    /// the lock. A failed append is logged; the client still gets its answer.
    pub async fn execute(&self, engine: &Engine, frame: RespFrame) -> RespFrame {
        let is_write = matches!(&frame, RespFrame::Array(request) if is_write_request(request));
        if !is_write {
            return engine.execute(frame).response;
        }

        let mut log = self.log.lock().await;
        let Execution { response, record } = engine.execute(frame);
        if let Some(record) = record {
            log.push(record);
            if log.pending.len() >= PENDING_CAP {
                if let Err(e) = log.write_pending().await {
                    error!("Failed to append to AOF {}: {}", self.path.display(), e);
                }
            }
        }
        response
    }

    /// Adds `record` to the end of the log. Durable only after the next flush.
    pub async fn append(&self, record: RespFrame) -> Result<(), AofError> {
        let mut log = self.log.lock().await;
        log.push(record);
        if log.pending.len() >= PENDING_CAP {
            log.write_pending().await?;
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), AofError> {
        self.log.lock().await.sync().await
    }

    /// Re-executes every record in the file against `engine`, discarding the responses.
    ///
    /// A record cut short by the end of the file stops the replay without an
    /// error. Records that are not commands, or that the engine rejects, are
    /// skipped with a warning.
    pub async fn replay(&self, engine: &Engine) -> Result<ReplayStats, AofError> {
        // held for the whole replay so no append can race it
        let mut log = self.log.lock().await;
        log.write_pending().await?;

        let file = File::open(&self.path)
            .await
            .map_err(|source| AofError::Open {
                path: self.path.clone(),
                source,
            })?;
        let mut frames = FramedRead::new(file, RespFrameCodec);

        let mut stats = ReplayStats::default();
        let mut record = 0;
        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) if e.is_unexpected_end() => {
                    warn!(
                        "AOF {} ends with an incomplete record after {} records, ignoring it",
                        self.path.display(),
                        record
                    );
                    stats.truncated = true;
                    break;
                }
                Err(CodecError::Io(e)) => return Err(e.into()),
                Err(CodecError::Resp(source)) => return Err(AofError::Corrupt { record, source }),
            };

            match replay_record(engine, frame) {
                Ok(()) => stats.applied += 1,
                Err(e) => {
                    warn!("Skipping AOF record {}: {}", record, e);
                    stats.skipped += 1;
                }
            }
            record += 1;
        }

        drop(log);
        Ok(stats)
    }

    /// Flushes the log every `every` until `shutdown` resolves, then flushes once more.
    pub fn spawn_flusher<F>(self: &Arc<Self>, every: Duration, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let aof = Arc::clone(self);
        tokio::spawn(async move {
            tokio::pin!(shutdown);
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {
                        if let Err(e) = aof.flush().await {
                            error!("AOF flush failed: {}", e);
                        }
                    }
                }
            }

            if let Err(e) = aof.flush().await {
                error!("Final AOF flush failed: {}", e);
            }
            debug!("AOF flusher stopped");
        })
    }
}

fn replay_record(engine: &Engine, frame: RespFrame) -> Result<(), CommandError> {
    let RespFrame::Array(request) = frame else {
        return Err(CommandError::InvalidRequest(
            "AOF record is not an array".to_string(),
        ));
    };
    let (name, args) = split_request(request)?;
    engine.try_dispatch(&name, args)?;
    Ok(())
}
