//! Outcome classification by tee-and-peek on the diagnostics channel.
//!
//! The diagnostics stream is duplicated into two byte-identical views. One
//! view (the probe) is read once to learn whether anything was written; the
//! other (the pass-through) keeps every byte for the failure response.
//! Neither step waits for the module to exit unless it is still writing.

use bebop_core::Outcome;

use crate::channel::{byte_channel, ByteReceiver, HostStreams};

/// The two readable views produced by [`tee`].
#[derive(Debug)]
pub struct TeeViews {
    /// Untouched copy, drained into the failure response.
    pub pass_through: ByteReceiver,
    /// Copy consumed only to test for the presence of data.
    pub probe: ByteReceiver,
}

/// Split `source` into two independent views that observe the same chunks.
///
/// A background forwarder copies every chunk into both views. Views buffer
/// independently, so a view that is never read does not stall the other.
/// Once both views are dropped the forwarder stops, and later writes to the
/// source are discarded.
///
/// Must be called from within a Tokio runtime.
#[must_use]
pub fn tee(mut source: ByteReceiver) -> TeeViews {
    let (pass_tx, pass_rx) = byte_channel();
    let (probe_tx, probe_rx) = byte_channel();

    tokio::spawn(async move {
        while let Some(chunk) = source.read().await {
            if pass_tx.is_closed() && probe_tx.is_closed() {
                break;
            }
            probe_tx.send_chunk(chunk.clone());
            pass_tx.send_chunk(chunk);
        }
    });

    TeeViews {
        pass_through: pass_rx,
        probe: probe_rx,
    }
}

/// Answer "has at least one byte arrived?" with exactly one read.
///
/// End of stream with no data means no diagnostics. An abort marker is
/// treated the same way: it carries no diagnostic bytes. The probe is
/// released afterwards.
pub async fn has_any_bytes_arrived(mut probe: ByteReceiver) -> bool {
    matches!(probe.read().await, Some(Ok(_)))
}

impl HostStreams {
    /// Decide success or failure from the diagnostics channel.
    ///
    /// On failure the stdout reader is dropped before draining diagnostics,
    /// so none of the module's output reaches the response and its further
    /// writes are discarded.
    pub async fn classify(self) -> Outcome<ByteReceiver> {
        let HostStreams { stdout, stderr } = self;
        let TeeViews {
            pass_through,
            probe,
        } = tee(stderr);

        if has_any_bytes_arrived(probe).await {
            drop(stdout);
            Outcome::Failure(pass_through.read_to_string().await)
        } else {
            Outcome::Success(stdout)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::VirtualChannels;

    #[tokio::test]
    async fn tee_views_observe_identical_bytes() {
        let (tx, rx) = byte_channel();
        let views = tee(rx);
        tx.write(b"error: ");
        tx.write(b"unexpected token");
        drop(tx);

        let probe = views.probe.read_to_string().await;
        let pass = views.pass_through.read_to_string().await;
        assert_eq!(probe, "error: unexpected token");
        assert_eq!(pass, probe, "views must be byte-identical");
    }

    #[tokio::test]
    async fn probe_is_false_when_stream_ends_empty() {
        let (tx, rx) = byte_channel();
        drop(tx);
        let views = tee(rx);
        assert!(!has_any_bytes_arrived(views.probe).await);
    }

    #[tokio::test]
    async fn probe_does_not_consume_pass_through() {
        let (tx, rx) = byte_channel();
        let views = tee(rx);
        tx.write(b"line 1: bad field\n");
        assert!(has_any_bytes_arrived(views.probe).await);

        tx.write(b"line 2: missing brace\n");
        drop(tx);
        assert_eq!(
            views.pass_through.read_to_string().await,
            "line 1: bad field\nline 2: missing brace\n",
            "first chunk must still be delivered after probing"
        );
    }

    #[tokio::test]
    async fn probe_waits_while_writer_is_open_and_silent() {
        let (tx, rx) = byte_channel();
        let views = tee(rx);
        let pending =
            tokio::time::timeout(Duration::from_millis(20), has_any_bytes_arrived(views.probe))
                .await;
        assert!(pending.is_err(), "probe must not decide before data or end of stream");
        drop(tx);
    }

    #[tokio::test]
    async fn probe_treats_abort_as_no_diagnostics() {
        let (tx, rx) = byte_channel();
        tx.abort("trap");
        drop(tx);
        let views = tee(rx);
        assert!(!has_any_bytes_arrived(views.probe).await);
    }

    #[tokio::test]
    async fn classify_without_diagnostics_returns_live_stdout() {
        let (module, host) = VirtualChannels::open("").split();
        module.stdout.write(b"{\"generator\":\"ts\"}");
        drop(module);

        match host.classify().await {
            Outcome::Success(stdout) => {
                assert_eq!(stdout.read_to_string().await, "{\"generator\":\"ts\"}");
            }
            Outcome::Failure(text) => panic!("expected success, got diagnostics {text:?}"),
        }
    }

    #[tokio::test]
    async fn classify_with_diagnostics_returns_text_and_drops_stdout() {
        let (module, host) = VirtualChannels::open("").split();
        let stdout = module.stdout.clone();
        module.stdout.write(b"partial output");
        module.stderr.write(b"error: not a valid schema");
        drop(module);

        match host.classify().await {
            Outcome::Failure(text) => assert_eq!(text, "error: not a valid schema"),
            Outcome::Success(_) => panic!("expected failure"),
        }
        assert!(stdout.is_closed(), "stdout reader must be dropped on failure");
    }

    #[tokio::test]
    async fn classify_success_does_not_wait_for_stdout_to_close() {
        let (module, host) = VirtualChannels::open("").split();
        let stdout = module.stdout.clone();
        drop(module);

        let outcome = tokio::time::timeout(Duration::from_secs(1), host.classify()).await;
        let Ok(Outcome::Success(mut reader)) = outcome else {
            panic!("classification must finish once stderr closes");
        };

        stdout.write(b"still streaming");
        drop(stdout);
        assert!(matches!(reader.read().await, Some(Ok(_))));
    }
}
