//! Minimal server-sent-events decoder for the order feed.
//!
//! Frames are separated by a blank line. Only `data:` lines of frames whose
//! event name is absent or `order` are decoded; keep-alive comments and
//! undecodable frames are skipped.

use std::fmt::Display;

use futures_util::{stream, Stream, StreamExt};
use tracing::{debug, warn};

use ftk_order::Order;

pub const ORDER_EVENT: &str = "order";

pub(crate) fn order_events<S, B, E>(bytes: S) -> impl Stream<Item = Order> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    stream::unfold((bytes, Vec::<u8>::new()), |(mut bytes, mut buf)| async move {
        loop {
            if let Some(end) = frame_end(&buf) {
                let frame: Vec<u8> = buf.drain(..end).collect();
                if let Some(order) = parse_frame(&String::from_utf8_lossy(&frame)) {
                    return Some((order, (bytes, buf)));
                }
                continue;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    warn!(error = %e, "order feed transport error; feed closed");
                    return None;
                }
                None => {
                    // A final frame without the trailing blank line still counts.
                    if buf.is_empty() {
                        return None;
                    }
                    let rest = String::from_utf8_lossy(&buf).to_string();
                    buf.clear();
                    if let Some(order) = parse_frame(&rest) {
                        return Some((order, (bytes, buf)));
                    }
                    return None;
                }
            }
        }
    })
}

/// Index one past the blank line terminating the first complete frame.
fn frame_end(buf: &[u8]) -> Option<usize> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn parse_frame(frame: &str) -> Option<Order> {
    let mut event: Option<&str> = None;
    let mut data: Vec<&str> = Vec::new();
    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(v) = line.strip_prefix("event:") {
            event = Some(v.trim());
        } else if let Some(v) = line.strip_prefix("data:") {
            data.push(v.strip_prefix(' ').unwrap_or(v));
        }
    }
    if data.is_empty() || event.is_some_and(|e| e != ORDER_EVENT) {
        return None;
    }
    match serde_json::from_str::<Order>(&data.join("\n")) {
        Ok(order) => Some(order),
        Err(e) => {
            debug!(error = %e, "skipping undecodable order frame");
            None
        }
    }
}
