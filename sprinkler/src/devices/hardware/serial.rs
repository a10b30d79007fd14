use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use uuid::Uuid;

/// Baud rate the servo controller firmware is flashed with.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Failures talking to the servo controller.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The port could not be opened, the head cannot be driven at all.
    #[error("could not open serial port {port}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },
    /// A line could not be written.
    #[error("failed to write to the servo controller")]
    Write(#[from] std::io::Error),
}

/// Write only, line oriented channel to the sprinkler head. Lines are
/// fire and forget, nothing is read back from the device.
pub trait LineTransport {
    /// Write one newline terminated line, waiting until the bytes have
    /// been handed to the device.
    fn write_line(&mut self, line: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Serial port settings for the servo controller.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct SerialConfig {
    /// Device path, such as `/dev/ttyUSB0` or `COM5`.
    pub port_name: String,
    /// Line speed of the port.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl SerialConfig {
    /// * `port_name`: device path of the servo controller.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Serial connection to the servo controller. The port is opened
/// once and held for the life of the process; dropping the link
/// releases it.
pub struct SerialLink {
    /// Unique identifier, helpful for trouble shooting and logging.
    uuid: Uuid,
    port_name: String,
    stream: SerialStream,
}

impl SerialLink {
    /// Open the port described by `config`. Must be called from within
    /// a tokio runtime.
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let stream = tokio_serial::new(&config.port_name, config.baud_rate)
            .open_native_async()
            .map_err(|source| TransportError::Open {
                port: config.port_name.clone(),
                source,
            })?;
        let link = Self {
            uuid: Uuid::new_v4(),
            port_name: config.port_name.clone(),
            stream,
        };
        tracing::info!(
            uuid = %link.uuid,
            port = %link.port_name,
            baud = config.baud_rate,
            "opened serial link"
        );
        Ok(link)
    }
}

impl LineTransport for SerialLink {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
