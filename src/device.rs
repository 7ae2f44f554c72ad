//! One-shot command sessions against the light's control port.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::codec::ValueCodec;
use crate::protocol::{self, ProtocolError, Reply};

/// How long to wait for the control port to accept a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed before prompt")]
    UnexpectedEof,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A connected session on the light's control port.
///
/// The light serves one command at a time on a plain TCP socket. Sessions are
/// short-lived: callers open one, run the exchanges they need, and drop it.
#[derive(Debug)]
pub struct DeviceSession {
    stream: BufReader<TcpStream>,
    codec: ValueCodec,
}

impl DeviceSession {
    /// Connect to the light and consume its banner.
    pub async fn open(address: &str, codec: ValueCodec) -> Result<Self, DeviceError> {
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(DeviceError::Connect(format!("{address}: {e}"))),
            Err(_) => {
                return Err(DeviceError::Connect(format!(
                    "{address}: timed out after {}s",
                    CONNECT_TIMEOUT.as_secs()
                )));
            }
        };

        let mut session = Self {
            stream: BufReader::new(stream),
            codec,
        };
        // Discard the banner so the first exchange starts at a prompt.
        session.read_to_prompt().await?;
        debug!("Connected to light at {}", address);
        Ok(session)
    }

    /// Wavelength label of each channel, in channel order.
    pub async fn wavelengths(&mut self) -> Result<Vec<String>, DeviceError> {
        let reply = self.exchange(protocol::GET_WAVELENGTHS).await?;
        Ok(reply.into_words())
    }

    /// Current relative power of each channel, decoded to intensities.
    pub async fn relative_power(&mut self) -> Result<Vec<f64>, DeviceError> {
        let reply = self.exchange(protocol::GET_RELATIVE_POWER).await?;
        let raw = reply.integers()?;
        Ok(raw.iter().map(|&v| self.codec.decode(v)).collect())
    }

    /// Apply intensities across the light's channels, one per channel.
    pub async fn set_relative_power(&mut self, intensities: &[f64]) -> Result<(), DeviceError> {
        let levels: Vec<u16> = intensities.iter().map(|&v| self.codec.encode(v)).collect();
        self.exchange(&protocol::set_power_command(&levels)).await?;
        Ok(())
    }

    async fn exchange(&mut self, command: &str) -> Result<Reply, DeviceError> {
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;
        let raw = self.read_to_prompt().await?;
        Ok(Reply::parse(command, &raw)?)
    }

    async fn read_to_prompt(&mut self) -> Result<String, DeviceError> {
        let mut buf = Vec::new();
        self.stream.read_until(protocol::PROMPT, &mut buf).await?;
        if buf.last() != Some(&protocol::PROMPT) {
            return Err(DeviceError::UnexpectedEof);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
