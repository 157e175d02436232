use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::models::LineId;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }
}

/// Events emitted while submitting an approval session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// A new order section was created for a synthetic line.
    SectionCreated {
        order_number: String,
        base_order: String,
        timestamp: DateTime<Utc>,
    },
    AllocationSubmitted {
        line_id: LineId,
        order_number: String,
        approved_qty: Decimal,
        final_rate: Decimal,
        timestamp: DateTime<Utc>,
    },
    SubmissionFailed {
        line_id: LineId,
        order_number: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// Drains the event channel, logging each event. Returns the number of
/// events seen once every sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) -> usize {
    info!("Starting event processing loop");
    let mut processed = 0;

    while let Some(event) = rx.recv().await {
        processed += 1;
        match &event {
            Event::SectionCreated { order_number, .. } => {
                info!(order_number = %order_number, "Order section created");
            }
            Event::AllocationSubmitted {
                line_id,
                order_number,
                approved_qty,
                ..
            } => {
                info!(
                    line_id = %line_id,
                    order_number = %order_number,
                    approved_qty = %approved_qty,
                    "Allocation submitted"
                );
            }
            Event::SubmissionFailed {
                line_id, reason, ..
            } => {
                warn!(line_id = %line_id, reason = %reason, "Allocation submission failed");
            }
        }
    }

    info!(processed, "Event processing loop finished");
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_events_flow_through_channel() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::AllocationSubmitted {
                line_id: LineId::new("L1"),
                order_number: "DO-5A".into(),
                approved_qty: dec!(10),
                final_rate: dec!(1500),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        drop(sender);

        assert_eq!(process_events(rx).await, 1);
    }

    #[tokio::test]
    async fn test_send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let result = sender
            .send(Event::SectionCreated {
                order_number: "DO-5C".into(),
                base_order: "DO-5".into(),
                timestamp: Utc::now(),
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ServiceError::EventError(_)));
        assert_eq!(err.code(), "event_error");
        assert!(err.is_recoverable());
    }
}
