use crate::core::packet::Packet;
use crate::transport::connection::Connection;
use std::sync::Arc;

/// Connection lifecycle and traffic notifications.
///
/// Callbacks are fire-and-forget and run synchronously on the task that caused
/// them: `on_connect` on the opening task, `on_send` on the send loop,
/// `on_receive` on the receive loop, `on_disconnect` on whichever caller closed
/// the connection first. Keep them short; hand heavy work to another task.
pub trait ConnectionObserver: Send + Sync {
    fn on_connect(&self, _connection: &Connection) {}
    fn on_disconnect(&self, _connection: &Connection) {}
    fn on_send(&self, _connection: &Connection, _packet: &Packet) {}
    fn on_receive(&self, _connection: &Connection, _packet: &Packet) {}
}

/// Fans every notification out to each subscriber, in subscription order.
#[derive(Clone, Default)]
pub struct Subscribers {
    observers: Vec<Arc<dyn ConnectionObserver>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn ConnectionObserver>) {
        self.observers.push(observer);
    }

    /// Move every subscriber of `other` to the end of this list.
    pub fn append(&mut self, mut other: Subscribers) {
        self.observers.append(&mut other.observers);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ConnectionObserver for Subscribers {
    fn on_connect(&self, connection: &Connection) {
        for observer in &self.observers {
            observer.on_connect(connection);
        }
    }

    fn on_disconnect(&self, connection: &Connection) {
        for observer in &self.observers {
            observer.on_disconnect(connection);
        }
    }

    fn on_send(&self, connection: &Connection, packet: &Packet) {
        for observer in &self.observers {
            observer.on_send(connection, packet);
        }
    }

    fn on_receive(&self, connection: &Connection, packet: &Packet) {
        for observer in &self.observers {
            observer.on_receive(connection, packet);
        }
    }
}
