//! Measurement streams
//!
//! Cancelable per-capability measurement sequences. A stream is infinite,
//! bounded only by disconnect, and is not restartable once it ends; a
//! fresh `SensorDevice::stream` call starts a new logical subscription.
//! Dropping the stream triggers the stop sequence, which the session
//! issues exactly once per prior start.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::domain::capability::Capability;
use crate::domain::measurement::Measurement;
use crate::infrastructure::bluetooth::session::Command;

#[derive(Debug)]
pub struct MeasurementStream {
    capability: Capability,
    receiver: mpsc::UnboundedReceiver<Measurement>,
    control: mpsc::UnboundedSender<Command>,
}

impl MeasurementStream {
    pub(crate) fn new(
        capability: Capability,
        receiver: mpsc::UnboundedReceiver<Measurement>,
        control: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            capability,
            receiver,
            control,
        }
    }

    /// The capability this stream carries.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Next decoded measurement, or `None` once the session is gone.
    pub async fn next(&mut self) -> Option<Measurement> {
        self.receiver.recv().await
    }
}

impl Stream for MeasurementStream {
    type Item = Measurement;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Measurement>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for MeasurementStream {
    fn drop(&mut self) {
        let _ = self.control.send(Command::StopStream {
            capability: self.capability,
        });
    }
}
