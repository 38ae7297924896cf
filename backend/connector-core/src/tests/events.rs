use crate::events::{EventRegistry, EventSubscriber, FrameBuffer};

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

fn recording_subscriber(log: Arc<Mutex<Vec<String>>>, tag: &str) -> Arc<dyn EventSubscriber> {
    let tag = tag.to_string();
    Arc::new(move |data: &Value| {
        if let Ok(mut entries) = log.lock() {
            entries.push(format!("{tag}:{data}"));
        }
    })
}

/// **VALUE**: Verifies subscribers fire in registration order and removal
/// is by exact handle.
///
/// **WHY THIS MATTERS**: Consumers rely on ordered dispatch (the built-in
/// selection listener must run before UI listeners that read the
/// selection). Removal by reference lets two subscribers share an event
/// name without clobbering each other.
///
/// **BUG THIS CATCHES**: A registry backed by an unordered set, or removal
/// matching by event name alone.
#[test]
fn given_multiple_subscribers_when_dispatched_then_insertion_order_preserved() {
    let registry = EventRegistry::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = registry.add("select", recording_subscriber(log.clone(), "first"));
    let _second = registry.add("select", recording_subscriber(log.clone(), "second"));

    registry.dispatch("select", &json!(1));
    assert_eq!(
        *log.lock().expect("log lock"),
        vec!["first:1".to_string(), "second:1".to_string()]
    );

    // Removing the first handle leaves the second in place
    registry.remove("select", &first);
    registry.dispatch("select", &json!(2));
    assert_eq!(
        log.lock().expect("log lock").last(),
        Some(&"second:2".to_string())
    );
}

/// **VALUE**: Verifies removal of never-registered handles and dispatch of
/// unsubscribed events are harmless no-ops.
///
/// **WHY THIS MATTERS**: The stream delivers every host-app event whether
/// or not anyone cares; unsubscribed events must be dropped silently, and
/// double-removal happens naturally during teardown.
///
/// **BUG THIS CATCHES**: Panics or phantom registrations on the no-op
/// paths.
#[test]
fn given_unknown_subscriber_or_event_when_removed_or_dispatched_then_noop() {
    let registry = EventRegistry::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let never_registered = recording_subscriber(log.clone(), "ghost");
    registry.remove("select", &never_registered);

    registry.dispatch("nobody-listens", &json!({}));

    let registered = registry.add("select", recording_subscriber(log.clone(), "real"));
    registry.remove("other-event", &registered);
    registry.dispatch("select", &json!(1));
    assert_eq!(log.lock().expect("log lock").len(), 1);
}

/// **VALUE**: Exercises SSE frame reassembly across arbitrary chunk
/// boundaries.
///
/// **WHY THIS MATTERS**: TCP gives no framing guarantees; an envelope
/// split mid-JSON must still parse once the closing blank line arrives.
///
/// **BUG THIS CATCHES**: Treating each chunk as a whole frame, or losing
/// buffered bytes between chunks.
#[test]
fn given_chunked_stream_when_pushed_then_frames_reassembled() {
    let mut buffer = FrameBuffer::default();

    assert!(buffer.push("data: {\"event\":\"select\",").is_empty());
    assert!(buffer.push("\"data\":{\"collection\":{\"name\":\"A\"}}}\n").is_empty());

    let envelopes = buffer.push("\ndata: {\"event\":\"init\",\"data\":{}}\n\n");
    assert_eq!(envelopes.len(), 2);
    assert_eq!(envelopes[0].event, "select");
    assert_eq!(envelopes[0].data["collection"]["name"], "A");
    assert_eq!(envelopes[1].event, "init");
}

/// **VALUE**: Verifies tolerant parsing: CRLF line endings, comment and
/// non-data fields, multi-line data, and unparsable frames.
///
/// **WHY THIS MATTERS**: The SSE wire format allows keep-alive comments and
/// CRLF; a strict parser would wedge the stream on the first heartbeat.
///
/// **BUG THIS CATCHES**: A bad frame poisoning the buffer so later valid
/// frames never dispatch.
#[test]
fn given_noise_in_stream_when_pushed_then_only_valid_envelopes_survive() {
    let mut buffer = FrameBuffer::default();

    // Comment-only frame: nothing to dispatch
    assert!(buffer.push(": keep-alive\n\n").is_empty());

    // CRLF endings and an ignored field
    let envelopes =
        buffer.push("retry: 1000\r\ndata: {\"event\":\"select\",\"data\":5}\r\n\r\n");
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].data, json!(5));

    // Unparsable frame is discarded, the next one still parses
    assert!(buffer.push("data: {nope\n\n").is_empty());
    let envelopes = buffer.push("data: {\"event\":\"init\",\"data\":null}\n\n");
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].event, "init");

    // Multi-line data joins with newlines before parsing
    let envelopes = buffer.push("data: {\"event\":\"select\",\ndata: \"data\":7}\n\n");
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].data, json!(7));
}
