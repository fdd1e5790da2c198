use crate::abort::AbortFlag;
use crate::config::DeltaGenConfig;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One connection to DeltaGen's command port.
/// Implementations never panic or bubble transport errors up: they log them and report
/// "not alive" / "no reply" instead.
pub trait Channel: Send {
    /// Open a fresh connection, dropping any previous one.
    fn connect(&mut self) -> bool;

    /// Write one command, e.g. `VARIANT Paint red;`.
    fn send(&mut self, command: &str);

    /// Wait up to `timeout` for one response line.
    fn receive(&mut self, timeout: Duration) -> Option<String>;

    /// Send the liveness probe and report whether anything came back within `timeout`.
    fn is_alive(&mut self, timeout: Duration) -> bool;

    /// Safe to call more than once.
    fn close(&mut self);

    /// False once the peer hung up or a write failed, until the next `connect`.
    fn is_connected(&self) -> bool {
        true
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn connect(&mut self) -> bool {
        (**self).connect()
    }

    fn send(&mut self, command: &str) {
        (**self).send(command)
    }

    fn receive(&mut self, timeout: Duration) -> Option<String> {
        (**self).receive(timeout)
    }

    fn is_alive(&mut self, timeout: Duration) -> bool {
        (**self).is_alive(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

#[derive(Debug)]
pub struct TcpChannel {
    address: String,
    probe_command: String,
    stream: Option<TcpStream>,
    // bytes received but not yet handed out as a line
    pending: Vec<u8>,
}

impl TcpChannel {
    pub fn new(address: impl Into<String>, probe_command: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            probe_command: probe_command.into(),
            stream: None,
            pending: Vec::new(),
        }
    }

    pub fn from_config(config: &DeltaGenConfig) -> Self {
        Self::new(config.address(), config.probe_command.clone())
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let line = self.pending.drain(..=end).collect::<Vec<u8>>();
        Some(String::from_utf8_lossy(&line).trim_end().to_owned())
    }

    // a peer that answers without a trailing newline still counts as an answer
    fn take_rest(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end().to_owned())
    }
}

impl Channel for TcpChannel {
    fn connect(&mut self) -> bool {
        self.close();

        let addresses = match self.address.to_socket_addrs() {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!("Unable to resolve {}: {e}", self.address);
                return false;
            }
        };

        for address in addresses {
            match TcpStream::connect_timeout(&address, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Unable to set TCP_NODELAY: {e}");
                    }
                    info!("Connected to DeltaGen at {address}");
                    self.stream = Some(stream);
                    return true;
                }
                Err(e) => debug!("Connection to {address} failed: {e}"),
            }
        }

        warn!("Could not connect to DeltaGen at {}", self.address);
        false
    }

    fn send(&mut self, command: &str) {
        let Some(stream) = self.stream.as_mut() else {
            warn!("Not connected, dropping command: {command}");
            return;
        };

        debug!("-> {command}");
        if let Err(e) = stream
            .write_all(command.as_bytes())
            .and_then(|_| stream.flush())
        {
            error!("Unable to send {command}: {e}");
            self.close();
        }
    }

    fn receive(&mut self, timeout: Duration) -> Option<String> {
        if let Some(line) = self.take_line() {
            return Some(line);
        }

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 4096];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.take_rest();
            }

            let stream = self.stream.as_mut()?;
            if let Err(e) = stream.set_read_timeout(Some(remaining)) {
                warn!("Unable to set read timeout: {e}");
                return None;
            }

            match stream.read(&mut buf) {
                Ok(0) => {
                    warn!("DeltaGen closed the connection");
                    self.stream = None;
                    return self.take_rest();
                }
                Ok(read) => {
                    self.pending.extend_from_slice(&buf[..read]);
                    if let Some(line) = self.take_line() {
                        debug!("<- {line}");
                        return Some(line);
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return self.take_rest();
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Unable to read from DeltaGen: {e}");
                    self.close();
                    return None;
                }
            }
        }
    }

    fn is_alive(&mut self, timeout: Duration) -> bool {
        if self.stream.is_none() {
            return false;
        }
        // stale replies must not answer the probe
        self.pending.clear();
        let probe = self.probe_command.clone();
        self.send(&probe);
        self.receive(timeout).is_some()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("Closed connection to {}", self.address);
        }
        self.pending.clear();
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Probe timeout used by retry `attempt` (0 based): the base timeout doubled per attempt.
pub fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

/// Connect and probe, retrying with a growing timeout. Gives up early when aborted.
pub fn connect_with_retry<C: Channel + ?Sized>(
    channel: &mut C,
    config: &DeltaGenConfig,
    abort: &AbortFlag,
) -> bool {
    let attempts = config.connect_retries.max(1);
    for attempt in 0..attempts {
        if abort.is_aborted() {
            return false;
        }

        let timeout = backoff(config.probe_timeout(), attempt);
        if channel.connect() && channel.is_alive(timeout) {
            return true;
        }

        channel.close();
        warn!(
            "DeltaGen did not answer (attempt {}/{attempts}, timeout {timeout:?})",
            attempt + 1
        );
        if attempt + 1 < attempts && abort.sleep(timeout) {
            return false;
        }
    }
    false
}
