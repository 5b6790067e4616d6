//! Peripheral side of the session.
//!
//! Connects to a bridge, registers one device, mirrors every device the
//! bridge announces and streams the local device state as updates.

use crate::config::DEFAULT_MAX_PAYLOAD;
use crate::protocol::{Message, MessageKind};
use crate::transport::{read_message, write_message};
use crate::types::{ConnectionId, DeviceDescriptor};
use crate::{BridgeError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::collections::BTreeMap;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// What a processed inbound message meant for the local session.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The bridge accepted the connection; registration has been sent.
    Accepted,
    Identity(ConnectionId),
    Added(DeviceDescriptor),
    Updated(DeviceDescriptor),
    Removed(ConnectionId),
}

pub struct PeripheralClient {
    stream: TcpStream,
    inbound: Receiver<Message>,
    reader: Option<JoinHandle<()>>,
    descriptor: DeviceDescriptor,
    id: Option<ConnectionId>,
    devices: BTreeMap<ConnectionId, DeviceDescriptor>,
}

impl PeripheralClient {
    /// Connect and start reading. Registration happens once the bridge accepts.
    pub fn connect(addr: SocketAddr, descriptor: DeviceDescriptor) -> Result<PeripheralClient> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_half = stream.try_clone()?;

        let (sender, inbound) = crossbeam_channel::unbounded();
        let reader = std::thread::Builder::new()
            .name("hvr-client".into())
            .spawn(move || client_reader_loop(read_half, sender))?;

        log::info!("Connected to bridge at {}", addr);

        Ok(PeripheralClient {
            stream,
            inbound,
            reader: Some(reader),
            descriptor,
            id: None,
            devices: BTreeMap::new(),
        })
    }

    /// Identifier assigned by the bridge, once registered.
    pub fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Local device state sent with the next update.
    pub fn descriptor_mut(&mut self) -> &mut DeviceDescriptor {
        &mut self.descriptor
    }

    /// Mirror of every device the bridge has announced, including this one.
    pub fn devices(&self) -> &BTreeMap<ConnectionId, DeviceDescriptor> {
        &self.devices
    }

    /// Process everything received so far without blocking.
    pub fn poll(&mut self) -> Result<Vec<ClientEvent>> {
        let mut events = Vec::new();
        while let Ok(message) = self.inbound.try_recv() {
            if let Some(event) = self.handle(message)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Process inbound messages until one produces an event matching `want`.
    pub fn wait_for<F>(&mut self, timeout: Duration, mut want: F) -> Result<ClientEvent>
    where
        F: FnMut(&ClientEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let message = self.inbound.recv_timeout(remaining).map_err(|e| match e {
                crossbeam_channel::RecvTimeoutError::Timeout => BridgeError::Timeout,
                crossbeam_channel::RecvTimeoutError::Disconnected => {
                    BridgeError::ChannelDisconnected
                }
            })?;
            if let Some(event) = self.handle(message)? {
                if want(&event) {
                    return Ok(event);
                }
            }
        }
    }

    /// Send the local descriptor as an update. No-op until registered.
    pub fn send_update(&mut self) -> Result<()> {
        let Some(id) = self.id else {
            return Ok(());
        };
        self.descriptor.id = id;
        write_message(&mut self.stream, &Message::update_device(&self.descriptor))
    }

    /// Close the connection and join the reader.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }

    fn handle(&mut self, message: Message) -> Result<Option<ClientEvent>> {
        let event = match message.kind() {
            Some(MessageKind::Accepted) => {
                write_message(&mut self.stream, &Message::register(&self.descriptor))?;
                Some(ClientEvent::Accepted)
            }
            Some(MessageKind::AssignIdentity) => match message.identity() {
                Ok(id) => {
                    log::info!("Assigned identity {}", id);
                    self.id = Some(id);
                    self.descriptor.id = id;
                    Some(ClientEvent::Identity(id))
                }
                Err(e) => {
                    log::warn!("Bad identity message: {}", e);
                    None
                }
            },
            Some(kind @ (MessageKind::AddDevice | MessageKind::UpdateDevice)) => {
                match message.descriptor() {
                    Ok(desc) => {
                        self.devices.insert(desc.id, desc);
                        if kind == MessageKind::AddDevice {
                            log::debug!("Device {} added", desc.id);
                            Some(ClientEvent::Added(desc))
                        } else {
                            Some(ClientEvent::Updated(desc))
                        }
                    }
                    Err(e) => {
                        log::warn!("Bad {:?} message: {}", kind, e);
                        None
                    }
                }
            }
            Some(MessageKind::RemoveDevice) => match message.identity() {
                Ok(id) => {
                    log::debug!("Device {} removed", id);
                    self.devices.remove(&id);
                    Some(ClientEvent::Removed(id))
                }
                Err(e) => {
                    log::warn!("Bad removal message: {}", e);
                    None
                }
            },
            _ => None,
        };
        Ok(event)
    }
}

impl Drop for PeripheralClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn client_reader_loop(mut stream: TcpStream, sender: Sender<Message>) {
    loop {
        match read_message(&mut stream, DEFAULT_MAX_PAYLOAD) {
            Ok(message) => {
                if sender.send(message).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::info!("Bridge connection closed: {}", e);
                break;
            }
        }
    }
}
