use crate::context::CancellationToken;
use crate::protocol::{Header, Message, HEADER_SIZE};
use crate::types::ConnectionId;
use crate::{BridgeError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

const ACCEPT_IDLE: Duration = Duration::from_millis(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound half of a message transport.
///
/// Delivery to any single connection is ordered; there is no ordering
/// guarantee across connections.
pub trait Transport: Send + Sync {
    fn send(&self, to: ConnectionId, message: &Message);

    /// Send to every live connection, optionally skipping one.
    fn broadcast(&self, message: &Message, except: Option<ConnectionId>);

    /// Close a connection. Its `Disconnected` event still follows.
    fn disconnect(&self, id: ConnectionId);
}

/// Inbound session traffic, in the order the transport observed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected(ConnectionId),
    Disconnected(ConnectionId),
    Message(ConnectionId, Message),
}

/// Read one framed message.
pub fn read_message<R: Read>(reader: &mut R, max_payload: u32) -> Result<Message> {
    let mut head = [0u8; HEADER_SIZE];
    reader.read_exact(&mut head)?;
    let header = Header::decode(&head).ok_or(BridgeError::Truncated {
        expected: HEADER_SIZE,
        actual: head.len(),
    })?;
    header.validate(max_payload)?;

    let mut payload = vec![0u8; header.payload_length as usize];
    reader.read_exact(&mut payload)?;
    Ok(Message::from_parts(header, payload))
}

/// Write one framed message.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    writer.write_all(&message.to_bytes())?;
    Ok(())
}

struct Peer {
    stream: TcpStream,
    reader: Option<JoinHandle<()>>,
}

/// Write side of every live TCP connection.
pub struct Peers {
    table: Mutex<HashMap<ConnectionId, Peer>>,
}

impl Peers {
    fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Peer>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_to(id: ConnectionId, peer: &Peer, bytes: &[u8]) {
        if let Err(e) = (&peer.stream).write_all(bytes) {
            // The reader notices the shutdown and reports the disconnect.
            log::warn!("write to connection {} failed: {}", id, e);
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
    }
}

impl Transport for Peers {
    fn send(&self, to: ConnectionId, message: &Message) {
        let bytes = message.to_bytes();
        match self.lock().get(&to) {
            Some(peer) => Peers::write_to(to, peer, &bytes),
            None => log::debug!("send to unknown connection {} dropped", to),
        }
    }

    fn broadcast(&self, message: &Message, except: Option<ConnectionId>) {
        let bytes = message.to_bytes();
        for (&id, peer) in self.lock().iter() {
            if Some(id) != except {
                Peers::write_to(id, peer, &bytes);
            }
        }
    }

    fn disconnect(&self, id: ConnectionId) {
        if let Some(peer) = self.lock().get(&id) {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
    }
}

/// TCP listener plus one reader thread per connection.
///
/// Connection identifiers are issued from 1 upward and never reused.
/// Reader threads push [`SessionEvent`]s into a single ordered channel
/// which the owner drains with [`TcpServer::recv_timeout`].
pub struct TcpServer {
    local_addr: SocketAddr,
    peers: Arc<Peers>,
    events: Receiver<SessionEvent>,
    stop: CancellationToken,
    acceptor: Option<JoinHandle<()>>,
}

impl TcpServer {
    /// Bind the listening endpoint and start accepting connections.
    pub fn bind(addr: SocketAddr, max_payload: u32) -> Result<TcpServer> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (sender, events) = crossbeam_channel::unbounded();
        let peers = Arc::new(Peers::new());
        let stop = CancellationToken::new();

        let accept_peers = peers.clone();
        let accept_stop = stop.clone();
        let acceptor = std::thread::Builder::new()
            .name("hvr-accept".into())
            .spawn(move || {
                accept_loop(listener, accept_peers, sender, accept_stop, max_payload);
            })?;

        log::info!("Listening for peripherals on {}", local_addr);

        Ok(TcpServer {
            local_addr,
            peers,
            events,
            stop,
            acceptor: Some(acceptor),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Outbound handle shared with the registry and the device pool.
    pub fn transport(&self) -> Arc<Peers> {
        self.peers.clone()
    }

    /// Receive the next session event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent> {
        self.events.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => BridgeError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => BridgeError::ChannelDisconnected,
        })
    }

    /// Try to receive a session event without blocking.
    pub fn try_recv(&self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Stop accepting, close every connection and join all transport threads.
    pub fn shutdown(&mut self) {
        self.stop.cancel();
        if let Some(thread) = self.acceptor.take() {
            let _ = thread.join();
        }

        let drained: Vec<(ConnectionId, Peer)> = self.peers.lock().drain().collect();
        for (id, mut peer) in drained {
            let _ = peer.stream.shutdown(Shutdown::Both);
            if let Some(reader) = peer.reader.take() {
                let _ = reader.join();
            }
            log::debug!("connection {} closed on shutdown", id);
        }
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Issues connection identifiers from 1 upward, never reusing one.
struct ConnectionIds {
    next: Option<ConnectionId>,
}

impl ConnectionIds {
    fn new() -> Self {
        Self::starting_at(1)
    }

    fn starting_at(first: ConnectionId) -> Self {
        Self { next: Some(first) }
    }

    /// `None` once the identifier space is used up.
    fn issue(&mut self) -> Option<ConnectionId> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(id)
    }
}

fn accept_loop(
    listener: TcpListener,
    peers: Arc<Peers>,
    sender: Sender<SessionEvent>,
    stop: CancellationToken,
    max_payload: u32,
) {
    let mut ids = ConnectionIds::new();

    loop {
        if stop.is_cancelled() {
            log::info!("Acceptor stopping (stop flag set)");
            break;
        }

        match listener.accept() {
            Ok((stream, addr)) => {
                let Some(id) = ids.issue() else {
                    log::warn!("Connection identifiers exhausted, refusing {}", addr);
                    let _ = stream.shutdown(Shutdown::Both);
                    continue;
                };
                match open_peer(id, stream, &peers, &sender, max_payload) {
                    Ok(()) => log::info!("Connection {} accepted from {}", id, addr),
                    Err(e) => log::warn!("Failed to open connection from {}: {}", addr, e),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_IDLE);
            }
            Err(e) => {
                log::warn!("accept error: {}", e);
                std::thread::sleep(ACCEPT_IDLE);
            }
        }
    }
}

fn open_peer(
    id: ConnectionId,
    stream: TcpStream,
    peers: &Arc<Peers>,
    sender: &Sender<SessionEvent>,
    max_payload: u32,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    let read_half = stream.try_clone()?;

    peers.lock().insert(
        id,
        Peer {
            stream,
            reader: None,
        },
    );
    sender
        .send(SessionEvent::Connected(id))
        .map_err(|_| BridgeError::ChannelDisconnected)?;

    let reader_peers = peers.clone();
    let reader_sender = sender.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("hvr-peer-{}", id))
        .spawn(move || {
            reader_loop(id, read_half, reader_peers, reader_sender, max_payload);
        });

    match spawned {
        Ok(handle) => {
            if let Some(peer) = peers.lock().get_mut(&id) {
                peer.reader = Some(handle);
            }
            Ok(())
        }
        Err(e) => {
            if let Some(peer) = peers.lock().remove(&id) {
                let _ = peer.stream.shutdown(Shutdown::Both);
            }
            let _ = sender.send(SessionEvent::Disconnected(id));
            Err(e.into())
        }
    }
}

fn reader_loop(
    id: ConnectionId,
    mut stream: TcpStream,
    peers: Arc<Peers>,
    sender: Sender<SessionEvent>,
    max_payload: u32,
) {
    loop {
        match read_message(&mut stream, max_payload) {
            Ok(message) => {
                if sender.send(SessionEvent::Message(id, message)).is_err() {
                    log::info!("Session channel closed, stopping reader {}", id);
                    break;
                }
            }
            Err(BridgeError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                log::info!("Connection {} closed by peer", id);
                break;
            }
            Err(e) => {
                log::warn!("Connection {} dropped: {}", id, e);
                break;
            }
        }
    }

    if let Some(peer) = peers.lock().remove(&id) {
        let _ = peer.stream.shutdown(Shutdown::Both);
    }
    let _ = sender.send(SessionEvent::Disconnected(id));
}
