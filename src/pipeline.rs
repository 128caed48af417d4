//! Wires the scan, the probe pool and the result stream together.
//!
//! ```text
//! generate_pairs --(pairs, cap 3)--> probe_pairs --(mismatches, cap 3)--> check_hosts
//! ```
//!
//! Each stage owns the sender it writes to, so a queue closes exactly when
//! the stage feeding it returns.

use std::io::Write;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::Settings;
use crate::hosts::{generate_pairs, strip_bom};
use crate::report::Reporter;
use crate::{CheckError, KnownTimeouts, Mismatch, MismatchReason, Pair, Prober};

/// Capacity of both the pair queue and the result queue.
pub const QUEUE_CAPACITY: usize = 3;

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Pairs that failed their probe
    pub mismatches: usize,
    /// Valid pairs read from the file
    pub pairs: usize,
    /// Pairs not dialed because their address had already timed out
    pub skipped: usize,
    /// Distinct addresses whose connect timed out
    pub timed_out: usize,
    /// Lines dropped because the address did not parse
    pub invalid_lines: usize,
}

/// Counters returned by [`probe_pairs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Pairs that were dialed
    pub probed: usize,
    /// Pairs dropped because their address was already known to time out
    pub skipped: usize,
}

/// Probes pairs from `pairs` with at most `threads` probes in flight.
///
/// A slot is taken before a pair is dequeued and released when its probe
/// task ends, however it ends. Pairs whose address is already in `known`
/// are skipped without a result. A connect timeout adds the address to
/// `known`. Every other failure is sent to `results` as is.
///
/// Returns once `pairs` is closed and drained and every probe has finished;
/// dropping `results` at that point closes the result stream. On
/// cancellation no further pairs are taken and in-flight probes are aborted.
pub async fn probe_pairs<P>(
    mut pairs: mpsc::Receiver<Pair>,
    prober: Arc<P>,
    threads: usize,
    known: KnownTimeouts,
    results: mpsc::Sender<Mismatch>,
    cancel: CancellationToken,
) -> PoolStats
where
    P: Prober + ?Sized + 'static,
{
    let slots = Arc::new(Semaphore::new(threads.clamp(1, Semaphore::MAX_PERMITS)));
    let mut probes = JoinSet::new();
    let mut stats = PoolStats::default();

    loop {
        let slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            slot = Arc::clone(&slots).acquire_owned() => match slot {
                Ok(slot) => slot,
                Err(_) => break,
            },
        };
        let pair = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            pair = pairs.recv() => match pair {
                Some(pair) => pair,
                None => break,
            },
        };

        while let Some(done) = probes.try_join_next() {
            log_join_failure(done);
        }

        if known.contains(&pair.ip) {
            debug!(%pair, "skipping, address already timed out");
            stats.skipped += 1;
            continue;
        }

        stats.probed += 1;
        let prober = Arc::clone(&prober);
        let known = known.clone();
        let results = results.clone();
        probes.spawn(async move {
            let _slot = slot;
            let Err(reason) = prober.hello(&pair).await else {
                return;
            };
            if reason == MismatchReason::ConnectTimeout && known.insert(pair.ip) {
                debug!(ip = %pair.ip, "address timed out, skipping its other pairs");
            }
            // the aggregator only goes away when the run is being torn down
            let _ = results.send(Mismatch { pair, reason }).await;
        });
    }

    if cancel.is_cancelled() {
        probes.abort_all();
    }
    while let Some(done) = probes.join_next().await {
        log_join_failure(done);
    }
    stats
}

fn log_join_failure(done: Result<(), JoinError>) {
    if let Err(e) = done {
        if e.is_panic() {
            error!(error = %e, "probe task panicked");
        }
    }
}

/// Checks every pair of the hosts file at `settings.path`.
///
/// Opens the file, skips a leading UTF-8 BOM and hands the rest to
/// [`check_reader`]. A file that cannot be opened is returned as
/// `CheckError::Open` before anything is written.
pub async fn check_hosts<P, W>(
    settings: &Settings,
    prober: P,
    out: W,
    cancel: CancellationToken,
) -> Result<Summary, CheckError>
where
    P: Prober + 'static,
    W: Write,
{
    let file = File::open(&settings.path)
        .await
        .map_err(|source| CheckError::Open {
            path: settings.path.clone(),
            source,
        })?;
    let mut reader = BufReader::new(file);
    strip_bom(&mut reader)
        .await
        .map_err(|source| CheckError::Read { line: 1, source })?;

    check_reader(reader, settings, prober, out, cancel).await
}

/// Checks every pair read from `reader`.
///
/// Mismatches are written to `out` as they arrive, followed by the total
/// count. A read error is returned instead of the count, after the
/// mismatches already found have been written. When `cancel` fires,
/// in-flight probes are aborted and `CheckError::Interrupted` is returned.
pub async fn check_reader<R, P, W>(
    reader: R,
    settings: &Settings,
    prober: P,
    out: W,
    cancel: CancellationToken,
) -> Result<Summary, CheckError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    P: Prober + 'static,
    W: Write,
{
    let cancel = cancel.child_token();
    let known = KnownTimeouts::new();
    let (pair_tx, pair_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (result_tx, mut result_rx) = mpsc::channel(QUEUE_CAPACITY);

    let generator = tokio::spawn(generate_pairs(reader, pair_tx, cancel.clone()));
    let pool = tokio::spawn(probe_pairs(
        pair_rx,
        Arc::new(prober),
        settings.threads,
        known.clone(),
        result_tx,
        cancel.clone(),
    ));

    let mut reporter = Reporter::new(out, settings.output);
    let mut mismatches = 0;
    while let Some(mismatch) = result_rx.recv().await {
        mismatches += 1;
        if let Err(source) = reporter.mismatch(&mismatch) {
            cancel.cancel();
            return Err(CheckError::Write { source });
        }
    }

    let scan = generator.await??;
    let pool = pool.await?;
    if cancel.is_cancelled() {
        return Err(CheckError::Interrupted);
    }

    reporter
        .total(mismatches)
        .map_err(|source| CheckError::Write { source })?;

    let summary = Summary {
        mismatches,
        pairs: scan.pairs,
        skipped: pool.skipped,
        timed_out: known.count(),
        invalid_lines: scan.invalid_lines,
    };
    debug!(?summary, probed = pool.probed, "check finished");
    Ok(summary)
}
