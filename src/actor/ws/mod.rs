//! WebSocket Actor - Broadcasts bus messages
//!
//! ```text
//! Notifier --BusMessage--> WsActor --text frame--> Clients
//! listener --AddClient-->     |
//! ```
//!
//! Every message is serialized once and written to each client. The last
//! `compile:error` is kept until a `compile:success` and replayed to clients
//! that connect in between.

mod server;

pub use server::start_ws_server;

use std::net::TcpStream;

use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::messages::WsMsg;
use crate::bus::BusMessage;

pub struct WsActor {
    bus_rx: mpsc::UnboundedReceiver<BusMessage>,
    rx: mpsc::Receiver<WsMsg>,
    clients: Vec<WebSocket<TcpStream>>,
    /// Replayed to new clients.
    last_error: Option<BusMessage>,
}

impl WsActor {
    pub fn new(bus_rx: mpsc::UnboundedReceiver<BusMessage>, rx: mpsc::Receiver<WsMsg>) -> Self {
        Self {
            bus_rx,
            rx,
            clients: Vec::new(),
            last_error: None,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                msg = self.rx.recv() => match msg {
                    Some(WsMsg::AddClient(stream)) => self.add_client(stream),
                    Some(WsMsg::Shutdown) | None => break,
                },
                message = self.bus_rx.recv() => match message {
                    Some(message) => self.publish(message),
                    None => break,
                },
            }
        }

        crate::debug!("ws"; "closing {} client(s)", self.clients.len());
        for mut client in self.clients.drain(..) {
            let _ = client.close(None);
            let _ = client.flush();
        }
    }

    fn add_client(&mut self, stream: TcpStream) {
        let mut ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                crate::debug!("ws"; "handshake failed: {}", e);
                return;
            }
        };

        let greeting = std::iter::once(BusMessage::connected()).chain(self.last_error.clone());
        for message in greeting {
            if let Err(e) = ws.send(text(&message)) {
                crate::debug!("ws"; "client dropped during greeting: {}", e);
                return;
            }
        }
        self.clients.push(ws);
    }

    fn publish(&mut self, message: BusMessage) {
        remember_error(&mut self.last_error, &message);

        let frame = text(&message);
        let before = self.clients.len();
        self.clients.retain_mut(|client| client.send(frame.clone()).is_ok());

        let dropped = before - self.clients.len();
        if dropped > 0 {
            crate::debug!("ws"; "dropped {} dead client(s)", dropped);
        }
    }
}

fn text(message: &BusMessage) -> Message {
    Message::Text(message.to_json().into())
}

fn remember_error(slot: &mut Option<BusMessage>, message: &BusMessage) {
    match message {
        BusMessage::CompileError { .. } => *slot = Some(message.clone()),
        BusMessage::CompileSuccess => *slot = None,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc as std_mpsc;

    #[test]
    fn test_remember_error() {
        let mut slot = None;
        let error = BusMessage::compile_error("unexpected token", Some("main.js".into()));

        remember_error(&mut slot, &error);
        assert_eq!(slot, Some(error.clone()));

        remember_error(&mut slot, &BusMessage::PackagesReload);
        assert_eq!(slot, Some(error));

        remember_error(&mut slot, &BusMessage::CompileSuccess);
        assert_eq!(slot, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_client_receives_greeting_and_broadcasts() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let (frames_tx, frames_rx) = std_mpsc::channel::<String>();
        let client = std::thread::spawn(move || {
            let (mut ws, _) = tungstenite::connect(format!("ws://127.0.0.1:{port}")).unwrap();
            while let Ok(Message::Text(frame)) = ws.read() {
                if frames_tx.send(frame.to_string()).is_err() {
                    break;
                }
            }
        });

        let (stream, _) = listener.accept().unwrap();
        let (bus_tx, bus_rx) = mpsc::unbounded_channel();
        let (ws_tx, ws_rx) = mpsc::channel(4);
        let actor = tokio::spawn(WsActor::new(bus_rx, ws_rx).run());

        ws_tx.send(WsMsg::AddClient(stream)).await.unwrap();
        let first = frames_rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(BusMessage::from_json(&first).map(|m| m.kind()), Some("connected"));

        bus_tx.send(BusMessage::script_add("/main.js", 1)).unwrap();
        let second = frames_rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(
            BusMessage::from_json(&second),
            Some(BusMessage::script_add("/main.js", 1))
        );

        ws_tx.send(WsMsg::Shutdown).await.unwrap();
        actor.await.unwrap();
        client.join().unwrap();
    }
}
