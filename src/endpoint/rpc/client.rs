use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tracing::{debug, warn};

use crate::endpoint::Transceiver;
use crate::endpoint::transceiver::PendingActions;
use crate::error::TransportError;
use crate::signal::{Action, Event, Signal, SignalRegistry};

use super::frame::{read_frame, write_frame};

/// Inspector side of the binary RPC transport.
pub struct RpcTransceiver {
    signals: Arc<SignalRegistry>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: AsyncMutex<OwnedWriteHalf>,
    pending: Arc<PendingActions>,
}

impl RpcTransceiver {
    /// Connects to an [`RpcEndpoint`](super::RpcEndpoint).
    pub async fn connect(
        addr: SocketAddr,
        signals: Arc<SignalRegistry>,
        capacity: usize,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            signals,
            reader: Mutex::new(Some(reader)),
            writer: AsyncMutex::new(writer),
            pending: Arc::new(PendingActions::new(capacity)),
        })
    }

    /// Actions that answer no pending event. Available once.
    pub fn unsolicited(&self) -> Option<mpsc::Receiver<Action>> {
        self.pending.take_unsolicited()
    }
}

#[async_trait]
impl Transceiver for RpcTransceiver {
    async fn start(&self) -> Result<(), TransportError> {
        let mut reader = self.reader.lock().take().ok_or(TransportError::AlreadyStarted)?;
        let signals = Arc::clone(&self.signals);
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            loop {
                let bytes = match read_frame(&mut reader).await {
                    Ok(Some(b)) => b,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "rpc transceiver read failed");
                        break;
                    }
                };
                match signals.decode_action(&bytes) {
                    Ok(action) => pending.resolve(action),
                    Err(e) => warn!(error = %e, "dropping malformed action frame"),
                }
            }
            debug!("rpc transceiver reader stopped");
        });
        Ok(())
    }

    async fn send_event(
        &self,
        event: Event,
    ) -> Result<Option<oneshot::Receiver<Action>>, TransportError> {
        let id = event.id().to_string();
        let slot = self.pending.expect(&event);
        let payload = Signal::from(event).to_json_vec();
        let mut writer = self.writer.lock().await;
        if let Err(e) = write_frame(&mut *writer, &payload).await {
            self.pending.forget(&id);
            return Err(e);
        }
        Ok(slot)
    }
}
