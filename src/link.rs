//! # Byte Source Drivers
//!
//! Glue between a transport and a [`FrameDecoder`]. The decoder itself never does
//! I/O; these helpers read chunks from a source and hand them over in order.
//!
//! - [`pump`]: any blocking [`std::io::Read`] (capture files, stdin, pipes) until EOF.
//! - [`poll_until_shutdown`]: a timeout-driven source polled until a shutdown signal.
//! - [`SerialLink`] (feature `serial`): a UART opened 8N1 and polled until shutdown.
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # {
//! use stxframe::config::SerialConfig;
//! use stxframe::link::SerialLink;
//! use stxframe::protocol::{FrameDecoder, Recorder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut link = SerialLink::open(&SerialConfig::default()).await?;
//!     let mut decoder = FrameDecoder::new(Recorder::default());
//!     let (_tx, rx) = tokio::sync::watch::channel(false);
//!     link.run(&mut decoder, rx).await?;
//!     Ok(())
//! }
//! # }
//! ```

use std::io::{ErrorKind, Read};

use log::{debug, error, info, trace};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use crate::error::Result;
use crate::logutil::hex_snippet;
use crate::protocol::{FrameDecoder, PacketSink};

#[cfg(feature = "serial")]
pub use serial::SerialLink;

/// Feed everything `reader` yields into `decoder`, `chunk` bytes at a time.
///
/// Returns the number of bytes read. A packet cut off by EOF stays pending in
/// the decoder rather than being reported.
pub fn pump<R, S>(mut reader: R, decoder: &mut FrameDecoder<S>, chunk: usize) -> Result<u64>
where
    R: Read,
    S: PacketSink,
{
    let mut buffer = vec![0u8; chunk.max(1)];
    let mut total: u64 = 0;
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                trace!("RAW {} bytes: {}", n, hex_snippet(&buffer[..n], 64));
                decoder.process(&buffer[..n]);
                total += n as u64;
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    debug!(
        "source exhausted after {} bytes; decoder left in {}",
        total,
        decoder.phase().name()
    );
    Ok(total)
}

/// Poll `reader` and feed the decoder until `shutdown` turns true.
///
/// Read timeouts and empty reads mean an idle link, and an interrupted read
/// (EINTR) is retried; only the shutdown flag ends the loop normally. Returns
/// the number of bytes consumed.
pub async fn poll_until_shutdown<R, S>(
    reader: &mut R,
    label: &str,
    decoder: &mut FrameDecoder<S>,
    chunk: usize,
    shutdown: watch::Receiver<bool>,
) -> Result<u64>
where
    R: Read + ?Sized,
    S: PacketSink,
{
    let mut buffer = vec![0u8; chunk.max(1)];
    let mut total: u64 = 0;
    info!("Listening on {}", label);

    while !*shutdown.borrow() {
        match reader.read(&mut buffer) {
            Ok(n) if n > 0 => {
                trace!("RAW {} bytes: {}", n, hex_snippet(&buffer[..n], 64));
                decoder.process(&buffer[..n]);
                total += n as u64;
            }
            Ok(_) => {
                sleep(Duration::from_millis(10)).await;
            }
            Err(ref e) if e.kind() == ErrorKind::TimedOut => {
                // Idle link
                sleep(Duration::from_millis(10)).await;
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {
                debug!("Read on {} interrupted (EINTR), retrying", label);
                sleep(Duration::from_millis(10)).await;
            }
            Err(e) => {
                error!("Read error on {}: {}", label, e);
                return Err(e.into());
            }
        }
    }

    info!("{} closed after {} bytes", label, total);
    Ok(total)
}

#[cfg(feature = "serial")]
mod serial {
    use std::io::Read;

    use anyhow::{anyhow, Result};
    use log::{debug, info};
    use serialport::SerialPort;
    use tokio::sync::watch;
    use tokio::time::{sleep, Duration};

    use crate::config::SerialConfig;
    use crate::protocol::{FrameDecoder, PacketSink};

    /// An open UART feeding one decoder.
    pub struct SerialLink {
        port_name: String,
        port: Box<dyn SerialPort>,
        read_chunk: usize,
    }

    impl SerialLink {
        /// Open the configured port as 8N1 and discard whatever the device
        /// buffered before we attached.
        pub async fn open(config: &SerialConfig) -> Result<Self> {
            info!(
                "Opening serial link {} at {} baud",
                config.port, config.baud_rate
            );
            let mut builder = serialport::new(&config.port, config.baud_rate)
                .timeout(Duration::from_millis(config.read_timeout_ms));
            #[cfg(unix)]
            {
                builder = builder
                    .data_bits(serialport::DataBits::Eight)
                    .stop_bits(serialport::StopBits::One)
                    .parity(serialport::Parity::None);
            }
            let mut port = builder
                .open()
                .map_err(|e| anyhow!("Failed to open serial port {}: {}", config.port, e))?;

            // Settle, then drop stale bytes so the first frame starts clean
            sleep(Duration::from_millis(150)).await;
            let mut purge_buf = [0u8; 512];
            if let Ok(available) = port.bytes_to_read() {
                if available > 0 {
                    let _ = port.read(&mut purge_buf);
                    debug!("Purged {} stale bytes from {}", available, config.port);
                }
            }

            Ok(Self {
                port_name: config.port.clone(),
                port,
                read_chunk: config.read_chunk.max(1),
            })
        }

        pub fn port_name(&self) -> &str {
            &self.port_name
        }

        /// Poll the port and feed the decoder until `shutdown` turns true.
        /// Returns the number of bytes consumed.
        pub async fn run<S: PacketSink>(
            &mut self,
            decoder: &mut FrameDecoder<S>,
            shutdown: watch::Receiver<bool>,
        ) -> Result<u64> {
            let total = super::poll_until_shutdown(
                &mut *self.port,
                &self.port_name,
                decoder,
                self.read_chunk,
                shutdown,
            )
            .await?;
            Ok(total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Recorder;
    use std::io::Cursor;

    /// Reader that returns one byte per call and a spurious EINTR in between.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        interrupt_next: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(std::io::Error::new(ErrorKind::Interrupted, "signal"));
            }
            self.interrupt_next = true;
            if self.pos >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn pump_feeds_whole_source() {
        let mut decoder = FrameDecoder::new(Recorder::default());
        let wire: [u8; 7] = [0xFF, 0x02, 0x02, 0x01, 0x02, 0x03, 0x03];
        let n = pump(Cursor::new(wire), &mut decoder, 3).unwrap();
        assert_eq!(n, 7);
        assert_eq!(decoder.sink().packets().count(), 1);
    }

    #[test]
    fn pump_retries_interrupted_reads() {
        let mut decoder = FrameDecoder::new(Recorder::default());
        let source = Trickle {
            data: vec![0x02, 0x01, 0x41, 0x41, 0x03],
            pos: 0,
            interrupt_next: true,
        };
        let n = pump(source, &mut decoder, 16).unwrap();
        assert_eq!(n, 5);
        let packets: Vec<&[u8]> = decoder.sink().packets().collect();
        assert_eq!(packets, vec![&b"A"[..]]);
    }

    #[test]
    fn pump_propagates_hard_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::BrokenPipe, "gone"))
            }
        }
        let mut decoder = FrameDecoder::new(Recorder::default());
        assert!(matches!(
            pump(Broken, &mut decoder, 8),
            Err(crate::error::Error::Io(_))
        ));
    }

    /// Serial-style source: one EINTR, then the frame, then idle timeouts
    /// until it flips the shutdown flag itself.
    struct Flaky {
        script: Vec<std::io::Result<Vec<u8>>>,
        shutdown: watch::Sender<bool>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.script.is_empty() {
                let _ = self.shutdown.send(true);
                return Err(std::io::Error::new(ErrorKind::TimedOut, "idle"));
            }
            let bytes = self.script.remove(0)?;
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(bytes.len())
        }
    }

    #[tokio::test]
    async fn poll_survives_interrupted_reads() {
        let (tx, rx) = watch::channel(false);
        let mut source = Flaky {
            script: vec![
                Err(std::io::Error::new(ErrorKind::Interrupted, "signal")),
                Ok(vec![0x02, 0x01, 0x41]),
                Err(std::io::Error::new(ErrorKind::TimedOut, "idle")),
                Err(std::io::Error::new(ErrorKind::Interrupted, "signal")),
                Ok(vec![0x41, 0x03]),
            ],
            shutdown: tx,
        };
        let mut decoder = FrameDecoder::new(Recorder::default());
        let n = poll_until_shutdown(&mut source, "test", &mut decoder, 16, rx)
            .await
            .unwrap();
        assert_eq!(n, 5);
        let packets: Vec<&[u8]> = decoder.sink().packets().collect();
        assert_eq!(packets, vec![&b"A"[..]]);
    }

    #[tokio::test]
    async fn poll_propagates_hard_errors() {
        let (tx, rx) = watch::channel(false);
        let mut source = Flaky {
            script: vec![Err(std::io::Error::new(ErrorKind::BrokenPipe, "gone"))],
            shutdown: tx,
        };
        let mut decoder = FrameDecoder::new(Recorder::default());
        assert!(matches!(
            poll_until_shutdown(&mut source, "test", &mut decoder, 16, rx).await,
            Err(crate::error::Error::Io(_))
        ));
    }
}
