//! Hosts-file scanning: line parsing, BOM handling and the pair generator.

use std::io;
use std::net::IpAddr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{CheckError, Pair};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Counters collected while scanning a hosts file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Lines read, including blanks and comments
    pub lines: usize,
    /// Lines skipped because the address did not parse
    pub invalid_lines: usize,
    /// Pairs handed to the probe queue
    pub pairs: usize,
}

/// Splits one hosts-file line into its address token and hostnames.
///
/// Returns `None` for blank lines and whole-line comments. A trailing
/// `# comment` is cut off before tokenizing. The address token is not
/// validated here and the hostname list may be empty.
pub fn parse_line(line: &str) -> Option<(&str, Vec<&str>)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let data = match trimmed.find('#') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };
    let mut fields = data.split_whitespace();
    let ip = fields.next()?;
    Some((ip, fields.collect()))
}

/// Consumes a leading UTF-8 byte-order mark, if there is one.
///
/// Returns whether a BOM was skipped. Without a BOM nothing is consumed.
pub async fn strip_bom<R>(reader: &mut R) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let head = reader.fill_buf().await?;
    if head.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Reads `reader` line by line and sends one [`Pair`] per hostname.
///
/// This task owns the only pair sender: the queue closes when it returns,
/// after the last send and with any read error already captured in the
/// returned `Result`. Sending waits while the queue is full. Lines whose
/// address does not parse are logged and skipped. Stops early, without an
/// error, when `cancel` fires or the receiving side goes away.
pub async fn generate_pairs<R>(
    mut reader: R,
    pairs: mpsc::Sender<Pair>,
    cancel: CancellationToken,
) -> Result<ScanStats, CheckError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ScanStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let line_no = stats.lines + 1;
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(_) => stats.lines = line_no,
            Err(source) => {
                return Err(CheckError::Read {
                    line: line_no,
                    source,
                })
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let Some((ip, hostnames)) = parse_line(&line) else {
            continue;
        };
        let ip: IpAddr = match ip.parse() {
            Ok(ip) => ip,
            Err(_) => {
                warn!(line = line_no, ip, "invalid ip, skipping line");
                stats.invalid_lines += 1;
                continue;
            }
        };
        debug!(%ip, ?hostnames, "scanned");

        for hostname in hostnames {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(stats),
                sent = pairs.send(Pair::new(ip, hostname)) => {
                    if sent.is_err() {
                        return Ok(stats);
                    }
                }
            }
            stats.pairs += 1;
        }
    }

    Ok(stats)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, BufReader, ReadBuf};

    async fn collect(input: &[u8]) -> (Result<ScanStats, CheckError>, Vec<Pair>) {
        let (tx, mut rx) = mpsc::channel(64);
        let result = generate_pairs(input, tx, CancellationToken::new()).await;
        let mut pairs = Vec::new();
        while let Some(pair) = rx.recv().await {
            pairs.push(pair);
        }
        (result, pairs)
    }

    #[test]
    fn test_parse_line_skips_blank_and_comments() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   \t  "), None);
        assert_eq!(parse_line("# 1.2.3.4 a.com"), None);
        assert_eq!(parse_line("   #indented comment"), None);
    }

    #[test]
    fn test_parse_line_strips_trailing_comment() {
        assert_eq!(
            parse_line("1.2.3.4 a.com # note"),
            Some(("1.2.3.4", vec!["a.com"]))
        );
        assert_eq!(
            parse_line("1.2.3.4 a.com#b.com"),
            Some(("1.2.3.4", vec!["a.com"]))
        );
    }

    #[test]
    fn test_parse_line_splits_on_whitespace_runs() {
        assert_eq!(
            parse_line("  1.2.3.4\t a.com   b.com\r\n"),
            Some(("1.2.3.4", vec!["a.com", "b.com"]))
        );
    }

    #[test]
    fn test_parse_line_does_not_validate() {
        assert_eq!(parse_line("not-an-ip"), Some(("not-an-ip", vec![])));
        assert_eq!(parse_line("127.0.0.1"), Some(("127.0.0.1", vec![])));
    }

    #[tokio::test]
    async fn test_strip_bom_consumes_exactly_three_bytes() {
        let mut input: &[u8] = b"\xEF\xBB\xBF1.2.3.4 a.com\n";
        assert!(strip_bom(&mut input).await.unwrap());
        assert_eq!(input, b"1.2.3.4 a.com\n");
    }

    #[tokio::test]
    async fn test_strip_bom_keeps_plain_input() {
        let mut input: &[u8] = b"1.2.3.4 a.com\n";
        assert!(!strip_bom(&mut input).await.unwrap());
        assert_eq!(input, b"1.2.3.4 a.com\n");

        let mut empty: &[u8] = b"";
        assert!(!strip_bom(&mut empty).await.unwrap());
    }

    #[tokio::test]
    async fn test_one_pair_per_hostname() {
        let (result, pairs) = collect(b"1.2.3.4 a.com b.com c.com\n::1 localhost\n").await;
        let stats = result.unwrap();

        assert_eq!(stats.pairs, 4);
        assert_eq!(stats.lines, 2);
        assert_eq!(
            pairs,
            vec![
                Pair::new("1.2.3.4".parse().unwrap(), "a.com"),
                Pair::new("1.2.3.4".parse().unwrap(), "b.com"),
                Pair::new("1.2.3.4".parse().unwrap(), "c.com"),
                Pair::new("::1".parse().unwrap(), "localhost"),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_ips_are_skipped() {
        let input = b"999.1.1.1 bad.com\nnot-an-ip other.com\n# comment\n\n10.0.0.1 good.com";
        let (result, pairs) = collect(input).await;
        let stats = result.unwrap();

        assert_eq!(stats.invalid_lines, 2);
        assert_eq!(stats.lines, 5);
        assert_eq!(pairs, vec![Pair::new("10.0.0.1".parse().unwrap(), "good.com")]);
    }

    #[tokio::test]
    async fn test_address_without_hostnames_emits_nothing() {
        let (result, pairs) = collect(b"127.0.0.1\n").await;
        assert_eq!(result.unwrap().pairs, 0);
        assert!(pairs.is_empty());
    }

    /// Serves `data` once, then fails every read.
    pub(crate) struct FailAfter {
        pub(crate) data: &'static [u8],
        pub(crate) served: bool,
    }

    impl AsyncRead for FailAfter {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.served {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "device lost")));
            }
            self.served = true;
            buf.put_slice(self.data);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_error_is_returned() {
        let reader = BufReader::new(FailAfter {
            data: b"1.2.3.4 a.com\n",
            served: false,
        });
        let (tx, mut rx) = mpsc::channel(8);

        let result = generate_pairs(reader, tx, CancellationToken::new()).await;

        match result {
            Err(CheckError::Read { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected ReadError, got {:?}", other),
        }
        assert_eq!(
            rx.recv().await,
            Some(Pair::new("1.2.3.4".parse().unwrap(), "a.com"))
        );
        // the sender was dropped with the task, so the queue is closed
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_cancel_stops_scanning() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = generate_pairs(&b"1.2.3.4 a.com b.com\n"[..], tx, cancel)
            .await
            .unwrap();

        assert_eq!(stats.pairs, 0);
        assert_eq!(rx.recv().await, None);
    }
}
