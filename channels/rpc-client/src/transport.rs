// Copyright 2019-2021 Aeternity Anstalt.
// This file is part of Aeternity Channels.

// Aeternity Channels is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Aeternity Channels is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Aeternity Channels.  If not, see <http://www.gnu.org/licenses/>.

//! Full-duplex text-frame transport to the channel FSM service.

use crate::error::{Error, Result};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
	connect_async,
	tungstenite::protocol::Message,
	MaybeTlsStream, WebSocketStream,
};

/// One persistent full-duplex text-frame channel to a node.
///
/// The session layer owns the transport exclusively and drives it from a
/// single task, so implementations don't need to be split or shared.
#[async_trait]
pub trait Transport: Send + 'static {
	/// Send one text frame. Fails once the transport is closed.
	async fn send(&mut self, frame: String) -> Result<()>;
	/// Receive the next text frame. `None` means the remote side has
	/// closed the connection.
	async fn next_frame(&mut self) -> Option<Result<String>>;
	/// Close the transport.
	async fn close(&mut self) -> Result<()>;
}

/// Websocket transport used against a real channel node.
pub struct WsTransport {
	inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
	/// Connect to the channel FSM service at given `ws://` or `wss://` URL.
	///
	/// Connect failure is fatal for the session: there is no implicit
	/// retry here, the caller decides whether to try again.
	pub async fn connect(url: &str) -> Result<Self> {
		log::info!(target: "channel", "Connecting to channel node at {}", url);
		let (inner, _) = connect_async(url).await?;
		Ok(WsTransport { inner })
	}
}

#[async_trait]
impl Transport for WsTransport {
	async fn send(&mut self, frame: String) -> Result<()> {
		self.inner.send(Message::Text(frame)).await.map_err(Into::into)
	}

	async fn next_frame(&mut self) -> Option<Result<String>> {
		while let Some(message) = self.inner.next().await {
			match message {
				Ok(Message::Text(frame)) => return Some(Ok(frame)),
				Ok(Message::Close(_)) => return None,
				// ping/pong is handled by the library, anything else is
				// not part of the protocol
				Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => (),
				Ok(Message::Binary(_)) => {
					log::trace!(target: "channel", "Ignoring binary frame from channel node");
				},
				Err(error) => return Some(Err(error.into())),
			}
		}
		None
	}

	async fn close(&mut self) -> Result<()> {
		self.inner.close(None).await.map_err(Into::into)
	}
}

/// In-memory transport for tests: what one half sends, the other receives.
#[cfg(any(feature = "test-helpers", test))]
pub struct PairTransport {
	tx: futures::channel::mpsc::UnboundedSender<String>,
	rx: futures::channel::mpsc::UnboundedReceiver<String>,
}

/// Remote ("node") half of the [`PairTransport`], driven by test code.
#[cfg(any(feature = "test-helpers", test))]
pub struct RemoteEndpoint {
	tx: futures::channel::mpsc::UnboundedSender<String>,
	rx: futures::channel::mpsc::UnboundedReceiver<String>,
}

#[cfg(any(feature = "test-helpers", test))]
impl PairTransport {
	/// Create a connected transport pair: the client half and the remote
	/// endpoint a scripted node implementation drives.
	pub fn pair() -> (PairTransport, RemoteEndpoint) {
		let (client_tx, remote_rx) = futures::channel::mpsc::unbounded();
		let (remote_tx, client_rx) = futures::channel::mpsc::unbounded();
		(
			PairTransport { tx: client_tx, rx: client_rx },
			RemoteEndpoint { tx: remote_tx, rx: remote_rx },
		)
	}
}

#[cfg(any(feature = "test-helpers", test))]
#[async_trait]
impl Transport for PairTransport {
	async fn send(&mut self, frame: String) -> Result<()> {
		self.tx
			.unbounded_send(frame)
			.map_err(|_| Error::Disconnected { last_node_error: None })
	}

	async fn next_frame(&mut self) -> Option<Result<String>> {
		self.rx.next().await.map(Ok)
	}

	async fn close(&mut self) -> Result<()> {
		self.tx.close_channel();
		self.rx.close();
		Ok(())
	}
}

#[cfg(any(feature = "test-helpers", test))]
impl RemoteEndpoint {
	/// Push a raw frame to the client. Frames sent after the client is
	/// gone are silently dropped.
	pub fn send(&self, frame: impl Into<String>) {
		let _ = self.tx.unbounded_send(frame.into());
	}

	/// Receive the next raw frame from the client.
	pub async fn next_frame(&mut self) -> Option<String> {
		self.rx.next().await
	}

	/// Drop the connection, as seen from the client side.
	pub fn close(&mut self) {
		self.tx.close_channel();
		self.rx.close();
	}
}
