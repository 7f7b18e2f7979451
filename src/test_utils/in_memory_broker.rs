//! In-memory stand-in for an AMQP broker.

use std::{io, sync::Arc};

use parking_lot::Mutex;

use crate::amqp_sender::{BrokerConnector, BrokerLink};

/// Message accepted by the [`InMemoryBroker`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct BrokerState {
    published: Vec<PublishedMessage>,
    connects: usize,
    open_links: usize,
    failing_connects: usize,
    failing_publishes: usize,
}

/// Broker recording published messages, with scripted failures.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed connector sharing this broker's state.
    pub fn connector(&self) -> Box<dyn BrokerConnector> {
        Box::new(self.clone())
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.state.lock().failing_connects = count;
    }

    /// Make the next `count` publish calls fail.
    pub fn fail_next_publishes(&self, count: usize) {
        self.state.lock().failing_publishes = count;
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    /// Number of successful connections opened so far.
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Number of links opened and not yet closed.
    pub fn open_links(&self) -> usize {
        self.state.lock().open_links
    }
}

impl BrokerConnector for InMemoryBroker {
    fn connect(&self) -> io::Result<Box<dyn BrokerLink>> {
        let mut state = self.state.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        state.connects += 1;
        state.open_links += 1;
        Ok(Box::new(InMemoryLink {
            broker: self.clone(),
        }))
    }

    fn describe(&self) -> String {
        "amqp://in-memory".to_owned()
    }
}

struct InMemoryLink {
    broker: InMemoryBroker,
}

impl BrokerLink for InMemoryLink {
    fn publish(&mut self, exchange: &str, routing_key: &str, body: &[u8]) -> io::Result<()> {
        let mut state = self.broker.state.lock();
        if state.failing_publishes > 0 {
            state.failing_publishes -= 1;
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        state.published.push(PublishedMessage {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            body: body.to_vec(),
        });
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.broker.state.lock().open_links -= 1;
        Ok(())
    }
}
