//! Metrics hooks.
//!
//! Subsystems publish named events (`pdu_received`, `vm_commit`,
//! `federation_retry`, ...) onto a broadcast channel rather than reaching
//! into a global string-keyed registry. A metrics exporter binary (or a
//! test) subscribes and aggregates; a process with no subscriber pays only
//! the cost of a channel send.

use tokio::sync::broadcast;

/// One observation emitted by a subsystem.
#[derive(Debug, Clone)]
pub struct MetricEvent {
    pub name: &'static str,
    pub value: f64,
    pub kind: MetricKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Publisher handle held by subsystems. Cloning is cheap (it's a broadcast
/// sender); a full process has exactly one of these, threaded down from
/// the binary's `Context`.
#[derive(Clone)]
pub struct MetricsPublisher {
    tx: broadcast::Sender<MetricEvent>,
}

impl MetricsPublisher {
    pub fn new(capacity: usize) -> (Self, MetricsSubscriber) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx: tx.clone() }, MetricsSubscriber { rx })
    }

    pub fn counter(&self, name: &'static str, value: f64) {
        self.emit(name, value, MetricKind::Counter);
    }

    pub fn gauge(&self, name: &'static str, value: f64) {
        self.emit(name, value, MetricKind::Gauge);
    }

    pub fn histogram(&self, name: &'static str, value: f64) {
        self.emit(name, value, MetricKind::Histogram);
    }

    fn emit(&self, name: &'static str, value: f64, kind: MetricKind) {
        // No receivers is the common case outside of an exporter process;
        // `send` returning an error there is expected, not an error to log.
        let _ = self.tx.send(MetricEvent { name, value, kind });
    }
}

/// Subscriber handle held by an exporter or test harness.
pub struct MetricsSubscriber {
    rx: broadcast::Receiver<MetricEvent>,
}

impl MetricsSubscriber {
    pub async fn recv(&mut self) -> Option<MetricEvent> {
        self.rx.recv().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let (publisher, mut subscriber) = MetricsPublisher::new(16);
        publisher.counter("pdu_received", 1.0);
        let event = subscriber.recv().await.expect("event");
        assert_eq!(event.name, "pdu_received");
        assert_eq!(event.kind, MetricKind::Counter);
    }

    #[test]
    fn publish_without_subscriber_does_not_panic() {
        let (publisher, _subscriber) = MetricsPublisher::new(16);
        publisher.gauge("queue_depth", 42.0);
    }
}
