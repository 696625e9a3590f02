// Vision feed adapter: newline-delimited JSON candidates into the engine.

use futures_util::stream::{self, Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::VisionCandidate;

/// Parse each line as a `VisionCandidate` and forward it. Malformed lines are
/// dropped with a warning. Returns the number of candidates forwarded once
/// the stream ends or the receiver is dropped.
pub async fn forward_candidates<S>(lines: S, tx: mpsc::Sender<VisionCandidate>) -> usize
where
    S: Stream<Item = String>,
{
    let mut lines = std::pin::pin!(lines);
    let mut forwarded = 0;
    while let Some(line) = lines.next().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<VisionCandidate>(line) {
            Ok(candidate) => {
                debug!("Vision candidate: {:?}", candidate);
                if tx.send(candidate).await.is_err() {
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!("Dropping malformed vision line: {}", e),
        }
    }
    forwarded
}

/// Lines from any async reader (stdin in the binary) as a stream.
pub fn lines_from<R>(reader: R) -> impl Stream<Item = String>
where
    R: AsyncRead + Unpin,
{
    stream::unfold(BufReader::new(reader).lines(), |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(e) => {
                warn!("Vision feed read error: {}", e);
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_valid_lines_and_skips_garbage() {
        let input = vec![
            r#"{"entity_name":"Breece Hall","drafter_name":"Blitz Brigade","round":1,"pick_in_round":3}"#.to_string(),
            "not json".to_string(),
            "".to_string(),
            r#"{"entity_name":"Puka Nacua"}"#.to_string(),
        ];
        let (tx, mut rx) = mpsc::channel(8);
        let n = forward_candidates(stream::iter(input), tx).await;
        assert_eq!(n, 2);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.round, Some(1));
        let second = rx.recv().await.unwrap();
        assert!(second.round.is_none());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn reads_lines_from_reader() {
        let data: &[u8] = b"{\"round\":2}\n\n{\"round\":3}\n";
        let (tx, mut rx) = mpsc::channel(8);
        let n = forward_candidates(lines_from(data), tx).await;
        assert_eq!(n, 2);
        assert_eq!(rx.recv().await.unwrap().round, Some(2));
        assert_eq!(rx.recv().await.unwrap().round, Some(3));
    }
}
