//! In-process duplex transport pair.
//!
//! Two connected [`Transport`]s over unbounded channels: frames sent on one
//! side appear on the other, in order, unchanged. Used by the test suite and
//! usable as a loopback link between two runtimes in one process.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use kataribe_core::error::{KataribeError, Result};

use super::{Frame, Transport};

pub struct DuplexTransport {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

/// Create a connected pair. Frames sent on `a` are received by `b` and vice
/// versa.
pub fn duplex_pair() -> (DuplexTransport, DuplexTransport) {
    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    let a = DuplexTransport {
        tx: std::sync::Mutex::new(Some(tx_a)),
        rx: Mutex::new(rx_b),
    };
    let b = DuplexTransport {
        tx: std::sync::Mutex::new(Some(tx_b)),
        rx: Mutex::new(rx_a),
    };
    (a, b)
}

impl DuplexTransport {
    fn sender(&self) -> Option<mpsc::UnboundedSender<Frame>> {
        self.tx.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl Transport for DuplexTransport {
    async fn send(&self, frame: Frame) -> Result<()> {
        let Some(tx) = self.sender() else {
            return Err(KataribeError::Transport("duplex link closed".into()));
        };
        tx.send(frame)
            .map_err(|_| KataribeError::Transport("peer side gone".into()))
    }

    async fn recv(&self) -> Option<Frame> {
        self.rx.lock().await.recv().await
    }

    async fn close(&self, _code: Option<u16>, _reason: Option<&str>) {
        // dropping our sender ends the peer's recv stream
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }

    fn is_open(&self) -> bool {
        self.sender().is_some_and(|tx| !tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn frames_cross_the_pair_in_order() {
        let (a, b) = duplex_pair();
        a.send(Frame::Value(json!({ "n": 1 }))).await.expect("send");
        a.send(Frame::Text("second".into())).await.expect("send");
        match b.recv().await.expect("first frame") {
            Frame::Value(v) => assert_eq!(v["n"], 1),
            other => panic!("unexpected frame: {other:?}"),
        }
        match b.recv().await.expect("second frame") {
            Frame::Text(s) => assert_eq!(s, "second"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_ends_the_peer_stream() {
        let (a, b) = duplex_pair();
        assert!(a.is_open());
        a.close(None, None).await;
        assert!(!a.is_open());
        assert!(b.recv().await.is_none());
        assert!(a.send(Frame::Text("late".into())).await.is_err());
    }
}
