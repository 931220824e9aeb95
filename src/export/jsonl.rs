//! JSONL rendering.
//!
//! One JSON object per event, followed by one summary object per attempt.
//! Each line is self-contained, so output can be piped to `jq` while a run is
//! still in progress.

use serde_json::{json, Map, Value};

use crate::runner::Attempt;
use crate::trace::Event;

/// An event as a flat JSON object: `kind`, offsets and the payload fields.
///
/// `attempt` is the sequence number of the attempt the event belongs to, and
/// is left out when `None`.
pub fn event_record(attempt: Option<usize>, event: &Event) -> serde_json::Result<Value> {
    let mut record = Map::new();
    if let Some(sequence) = attempt {
        record.insert("attempt".into(), json!(sequence));
    }
    record.insert("offset_us".into(), json!(event.offset.as_micros() as u64));
    record.insert("offset_ms".into(), json!(event.offset.as_millis() as u64));
    if let Value::Object(payload) = serde_json::to_value(&event.payload)? {
        record.extend(payload);
    }
    Ok(Value::Object(record))
}

/// The outcome of an attempt as one JSON object.
pub fn summary_record(attempt: &Attempt) -> Value {
    json!({
        "attempt": attempt.sequence(),
        "url": attempt.request().url().as_str(),
        "state": attempt.state().to_string(),
        "verdict": attempt.verdict().to_string(),
        "disposal": attempt.disposal().to_string(),
        "corroborated": attempt.corroborated(),
        "status": attempt.status(),
        "version": attempt.version(),
        "body_bytes": attempt.body_bytes(),
        "error": attempt.error().map(|e| e.to_string()),
        "event_count": attempt.events().len(),
        "observer_faults": attempt.observer_faults().len(),
        "ordering_violations": attempt
            .ordering_violations()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>(),
    })
}

/// A single line for one event, without trailing newline.
pub fn format_event(attempt: Option<usize>, event: &Event) -> serde_json::Result<String> {
    serde_json::to_string(&event_record(attempt, event)?)
}

/// All event lines of the attempt followed by its summary line.
pub fn format_attempt(attempt: &Attempt) -> serde_json::Result<String> {
    let mut out = String::new();
    for event in attempt.events() {
        out.push_str(&format_event(Some(attempt.sequence()), event)?);
        out.push('\n');
    }
    out.push_str(&serde_json::to_string(&summary_record(attempt))?);
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::time::Duration;

    use crate::trace::{ConnectionDescriptor, EventPayload};

    fn events() -> Vec<Event> {
        vec![
            Event::new(
                Duration::ZERO,
                EventPayload::GetConn {
                    host_port: "127.0.0.1:8080".into(),
                },
            ),
            Event::new(
                Duration::from_micros(1_500),
                EventPayload::GotConn(ConnectionDescriptor::pooled(
                    Some(SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))),
                    Some(Duration::from_micros(250)),
                )),
            ),
            Event::new(Duration::from_millis(3), EventPayload::GotFirstResponseByte),
            Event::new(Duration::from_millis(4), EventPayload::PutIdleConn { error: None }),
        ]
    }

    #[test]
    fn test_event_record_flattens_payload() {
        let events = events();
        let record = event_record(Some(2), &events[1]).unwrap();
        assert_eq!(record["attempt"], 2);
        assert_eq!(record["kind"], "GotConn");
        assert_eq!(record["offset_us"], 1_500);
        assert_eq!(record["offset_ms"], 1);
        assert_eq!(record["reused"], true);
        assert_eq!(record["idle_time_us"], 250);
        assert_eq!(record["remote_addr"], "127.0.0.1:8080");
        assert!(record.get("inferred").is_none());
    }

    #[test]
    fn test_inferred_conn_is_flagged() {
        let event = Event::new(
            Duration::from_millis(152),
            EventPayload::GotConn(ConnectionDescriptor::pooled(None, None).mark_inferred()),
        );
        let record = event_record(Some(2), &event).unwrap();
        assert_eq!(record["inferred"], true);
        assert!(record.get("idle_time_us").is_none());
    }

    #[test]
    fn test_record_without_attempt_omits_field() {
        let events = events();
        let record = event_record(None, &events[2]).unwrap();
        assert!(record.get("attempt").is_none());
        assert_eq!(record["kind"], "GotFirstResponseByte");
    }

    #[test]
    fn test_dns_names_match_hook_names() {
        let event = Event::new(
            Duration::ZERO,
            EventPayload::DnsDone {
                addrs: vec![],
                error: Some("no such host".into()),
            },
        );
        let record = event_record(None, &event).unwrap();
        assert_eq!(record["kind"], "DNSDone");
        assert_eq!(record["error"], "no such host");
    }

    #[test]
    fn test_format_attempt_lines_parse() {
        let attempt = Attempt::fixture("http://127.0.0.1:8080/", events());
        let text = format_attempt(&attempt).unwrap();
        assert_eq!(text, format_attempt(&attempt).unwrap());

        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 5);
        let summary = &lines[4];
        assert_eq!(summary["verdict"], "reused");
        assert_eq!(summary["disposal"], "pooled");
        assert_eq!(summary["corroborated"], true);
        assert_eq!(summary["error"], Value::Null);
    }
}
