use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::ChildStdin;
use tracing::warn;

use roam_console::LogHub;

use crate::types::RunnerError;

/// Write one command line to the child's stdin.
pub(crate) async fn write_line(stdin: &mut ChildStdin, line: &str) -> Result<(), RunnerError> {
    let mut payload = line.as_bytes().to_vec();
    payload.push(b'\n');
    stdin
        .write_all(&payload)
        .await
        .map_err(|err| RunnerError::Io(err.to_string()))?;
    stdin
        .flush()
        .await
        .map_err(|err| RunnerError::Io(err.to_string()))
}

/// Publish every line read from `reader` as `<prefix><line>` until EOF.
/// Bytes are decoded lossily and a trailing `\r` is dropped.
pub(crate) async fn pump_lines<R>(reader: R, hub: LogHub, channel: String, prefix: String)
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(raw)) => {
                let text = String::from_utf8_lossy(&raw);
                let text = text.strip_suffix('\r').unwrap_or(&text);
                hub.publish(&channel, format!("{prefix}{text}"));
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, channel = %channel, "output pump read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pump_lines;
    use roam_console::LogHub;

    #[tokio::test]
    async fn pump_prefixes_and_decodes_lossily() {
        let hub = LogHub::new();
        let mut sub = hub.subscribe("out");
        let input: &[u8] = b"hello\r\nbad \xff byte\nlast";

        pump_lines(input, hub.clone(), "out".to_owned(), "[MC]: ".to_owned()).await;

        assert_eq!(sub.try_recv().as_deref(), Some("[MC]: hello"));
        assert_eq!(
            sub.try_recv().as_deref(),
            Some("[MC]: bad \u{fffd} byte")
        );
        assert_eq!(sub.try_recv().as_deref(), Some("[MC]: last"));
        assert_eq!(sub.try_recv(), None);
    }
}
