//! Batched payload copy jobs
//!
//! Pulling payloads out of an archive is a pile of independent byte-span
//! copies: open the source, seek, stream `length` bytes to a destination
//! file. Jobs are accumulated first and only run together, so callers can
//! guarantee that every lookup resolved before the first byte of output is
//! written. The copy phase itself runs on a bounded rayon pool.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::error::{Error, Result};

/// Tunables for the copy pool, passed in explicitly by callers rather than
/// read from ambient state.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorConfig {
    /// I/O buffer size per copy job, in bytes.
    pub buffer_size: usize,
    /// Worker threads for the copy pool; 0 uses the rayon default.
    pub max_threads: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
            max_threads: 0,
        }
    }
}

/// Progress of a batched copy run.
///
/// Purely observational: the counter never feeds back into scheduling.
#[derive(Debug, Clone)]
pub struct CopyProgress {
    /// Jobs started so far (1-indexed).
    pub current: usize,
    /// Total number of jobs.
    pub total: usize,
    /// Destination file name of the job being reported.
    pub current_file: Option<String>,
}

/// Progress callback for batched copies.
///
/// Must be `Sync + Send` because jobs report from worker threads.
pub type CopyProgressCallback<'a> = &'a (dyn Fn(&CopyProgress) + Sync + Send);

/// One independent copy job: a byte span of a source file streamed to a
/// destination path.
#[derive(Debug, Clone)]
pub struct CopyJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Absolute byte offset of the span within `source`.
    pub offset: u64,
    pub length: u64,
}

/// Accumulates copy jobs, then runs them all on a bounded worker pool.
#[derive(Debug, Default)]
pub struct DataExtractor {
    config: ExtractorConfig,
    jobs: Vec<CopyJob>,
}

impl DataExtractor {
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            jobs: Vec::new(),
        }
    }

    /// Queue one copy job. Nothing touches the filesystem until [`run`].
    ///
    /// [`run`]: DataExtractor::run
    pub fn add(
        &mut self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        offset: u64,
        length: u64,
    ) {
        self.jobs.push(CopyJob {
            source: source.into(),
            destination: destination.into(),
            offset,
            length,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run every queued job. Each job opens its own file handles, so jobs
    /// share no mutable state beyond the progress counter.
    ///
    /// A failed job is logged and recorded but does not stop its siblings;
    /// if any failed, the run returns a single summary error after all jobs
    /// finish.
    ///
    /// # Errors
    /// Returns [`Error::ExtractionPartialFailure`] naming the failure count
    /// and first cause, or [`Error::ThreadPool`] if the bounded pool cannot
    /// be built.
    ///
    /// [`Error::ExtractionPartialFailure`]: crate::Error::ExtractionPartialFailure
    /// [`Error::ThreadPool`]: crate::Error::ThreadPool
    pub fn run(&self, progress: CopyProgressCallback) -> Result<()> {
        let total = self.jobs.len();
        let processed = AtomicUsize::new(0);
        let buffer_size = self.config.buffer_size;

        let run_jobs = || -> Vec<(PathBuf, String)> {
            self.jobs
                .par_iter()
                .filter_map(|job| {
                    let file_name = job
                        .destination
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string());

                    let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(&CopyProgress {
                        current,
                        total,
                        current_file: file_name,
                    });

                    match copy_span(job, buffer_size) {
                        Ok(()) => None,
                        Err(e) => {
                            tracing::warn!(
                                "copy failed for {}: {e}",
                                job.destination.display()
                            );
                            Some((job.destination.clone(), e.to_string()))
                        }
                    }
                })
                .collect()
        };

        let errors = if self.config.max_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.max_threads)
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;
            pool.install(run_jobs)
        } else {
            run_jobs()
        };

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ExtractionPartialFailure {
                total,
                failed: errors.len(),
                first_error: errors[0].1.clone(),
            })
        }
    }
}

/// Stream one byte span from source to destination.
fn copy_span(job: &CopyJob, buffer_size: usize) -> Result<()> {
    if let Some(parent) = job.destination.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut source = BufReader::with_capacity(buffer_size, File::open(&job.source)?);
    source.seek(SeekFrom::Start(job.offset))?;
    let mut span = source.take(job.length);

    let mut dest = BufWriter::with_capacity(buffer_size, File::create(&job.destination)?);
    let copied = io::copy(&mut span, &mut dest)?;
    dest.flush()?;

    if copied != job.length {
        return Err(Error::UnexpectedEof);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_accumulate_without_touching_disk() {
        let mut extractor = DataExtractor::new(ExtractorConfig::default());
        assert!(extractor.is_empty());
        extractor.add("/nonexistent/src", "/nonexistent/dst", 0, 4);
        assert_eq!(extractor.len(), 1);
    }

    #[test]
    fn test_run_copies_spans() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, b"0123456789abcdef").unwrap();

        let mut extractor = DataExtractor::new(ExtractorConfig {
            buffer_size: 4,
            max_threads: 2,
        });
        extractor.add(&source, dir.path().join("a.bin"), 0, 4);
        extractor.add(&source, dir.path().join("b.bin"), 10, 6);
        extractor.run(&|_| {}).unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.bin")).unwrap(), b"0123");
        assert_eq!(std::fs::read(dir.path().join("b.bin")).unwrap(), b"abcdef");
    }

    #[test]
    fn test_failed_job_reports_summary() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, b"short").unwrap();

        let mut extractor = DataExtractor::new(ExtractorConfig::default());
        extractor.add(&source, dir.path().join("ok.bin"), 0, 5);
        // Span runs past the end of the source.
        extractor.add(&source, dir.path().join("bad.bin"), 0, 100);
        let err = extractor.run(&|_| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::ExtractionPartialFailure { failed: 1, .. }
        ));
        // The sibling job still completed.
        assert_eq!(std::fs::read(dir.path().join("ok.bin")).unwrap(), b"short");
    }
}
