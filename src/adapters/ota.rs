//! Network firmware update listener, backed by the `esp-ota` crate.
//!
//! Implements [`OtaPort`]. Once started, a worker thread accepts TCP
//! connections on the configured port, one at a time:
//!
//! ```text
//!   client ── u32 LE image length ──▶ listener       OtaSession::begin
//!   client ── image bytes ─────────▶ listener       OtaSession::write_chunk
//!   client ◀── "OK\n" | "ERR <reason>\n" ──         OtaSession::finalize
//! ```
//!
//! After a successful transfer the device restarts into the new image. On
//! host builds the flash is simulated and the listener keeps serving.

use core::fmt;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{info, warn};

use crate::app::ports::{OtaError, OtaPort};

const MAX_FIRMWARE_SIZE: u32 = 4 * 1024 * 1024;
const CHUNK_SIZE: usize = 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(10);
const OTA_TASK_STACK: usize = 8 * 1024;

// ── Session errors ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    AlreadyInProgress,
    InvalidSize,
    BeginFailed,
    WriteFailed,
    VerifyFailed,
    BootSetFailed,
    IncompleteTransfer,
    NotReceiving,
    Overflow,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInProgress => write!(f, "update already in progress"),
            Self::InvalidSize => write!(f, "image size out of range (max 4 MB)"),
            Self::BeginFailed => write!(f, "no inactive partition"),
            Self::WriteFailed => write!(f, "flash write failed"),
            Self::VerifyFailed => write!(f, "image verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::IncompleteTransfer => write!(f, "connection closed before the full image"),
            Self::NotReceiving => write!(f, "no update in progress"),
            Self::Overflow => write!(f, "data beyond declared image size"),
        }
    }
}

// ── Session state machine ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Receiving { expected_size: u32, bytes_written: u32 },
    ReadyToReboot,
    Failed,
}

/// One image transfer into the inactive OTA partition.
pub struct OtaSession {
    state: SessionState,
    #[cfg(target_os = "espidf")]
    update: Option<esp_ota::OtaUpdate>,
}

impl Default for OtaSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OtaSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            #[cfg(target_os = "espidf")]
            update: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn begin(&mut self, image_size: u32) -> Result<(), TransferError> {
        if matches!(self.state, SessionState::Receiving { .. }) {
            return Err(TransferError::AlreadyInProgress);
        }
        if image_size == 0 || image_size > MAX_FIRMWARE_SIZE {
            return Err(TransferError::InvalidSize);
        }

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                TransferError::BeginFailed
            })?;
            self.update = Some(update);
        }

        self.state = SessionState::Receiving {
            expected_size: image_size,
            bytes_written: 0,
        };
        info!("OTA: receiving {} bytes", image_size);
        Ok(())
    }

    /// Append `data`. Returns the running total.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<u32, TransferError> {
        let SessionState::Receiving {
            expected_size,
            bytes_written,
        } = self.state
        else {
            return Err(TransferError::NotReceiving);
        };
        let total = bytes_written + data.len() as u32;
        if total > expected_size {
            return Err(TransferError::Overflow);
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.update.as_mut() else {
                return Err(TransferError::NotReceiving);
            };
            if let Err(e) = update.write(data) {
                warn!("esp-ota write failed: {:?}", e);
                self.abort();
                return Err(TransferError::WriteFailed);
            }
        }

        self.state = SessionState::Receiving {
            expected_size,
            bytes_written: total,
        };
        Ok(total)
    }

    /// Verify the image and make it the boot partition.
    pub fn finalize(&mut self) -> Result<(), TransferError> {
        match self.state {
            SessionState::Receiving {
                expected_size,
                bytes_written,
            } if bytes_written == expected_size => {}
            SessionState::Receiving { .. } => return Err(TransferError::IncompleteTransfer),
            _ => return Err(TransferError::NotReceiving),
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.update.take() else {
                self.state = SessionState::Failed;
                return Err(TransferError::NotReceiving);
            };
            let mut completed = update.finalize().map_err(|e| {
                warn!("esp-ota finalize failed: {:?}", e);
                self.state = SessionState::Failed;
                TransferError::VerifyFailed
            })?;
            completed.set_as_boot_partition().map_err(|e| {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                self.state = SessionState::Failed;
                TransferError::BootSetFailed
            })?;
        }

        self.state = SessionState::ReadyToReboot;
        info!("OTA: image accepted");
        Ok(())
    }

    pub fn abort(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            // Dropping the handle aborts the update.
            self.update.take();
        }
        self.state = SessionState::Idle;
        warn!("OTA: aborted");
    }
}

// ── Transfer over one connection ──────────────────────────────

/// Receive one length-prefixed image from `stream` into `session`.
pub fn receive_image(stream: &mut impl Read, session: &mut OtaSession) -> Result<u32, TransferError> {
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .map_err(|_| TransferError::IncompleteTransfer)?;
    let size = u32::from_le_bytes(header);
    session.begin(size)?;

    let mut chunk = [0u8; CHUNK_SIZE];
    let mut total = 0;
    while total < size {
        let want = CHUNK_SIZE.min((size - total) as usize);
        let n = match stream.read(&mut chunk[..want]) {
            Ok(0) | Err(_) => {
                session.abort();
                return Err(TransferError::IncompleteTransfer);
            }
            Ok(n) => n,
        };
        total = session.write_chunk(&chunk[..n])?;
    }
    session.finalize()?;
    Ok(total)
}

fn serve_connection(mut stream: TcpStream, images: &AtomicU32) {
    if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
        warn!("OTA: read timeout not set ({})", e);
    }
    let mut session = OtaSession::new();
    let reply = match receive_image(&mut stream, &mut session) {
        Ok(size) => {
            info!("OTA: {} byte image written", size);
            images.fetch_add(1, Ordering::SeqCst);
            "OK\n".to_string()
        }
        Err(e) => {
            warn!("OTA: transfer failed ({})", e);
            format!("ERR {}\n", e)
        }
    };
    if let Err(e) = stream.write_all(reply.as_bytes()).and_then(|()| stream.flush()) {
        warn!("OTA: reply not sent ({})", e);
    }

    #[cfg(target_os = "espidf")]
    {
        if session.state() == SessionState::ReadyToReboot {
            info!("OTA: rebooting into new firmware");
            drop(stream);
            esp_ota::restart();
        }
    }
}

// ── Port adapter ──────────────────────────────────────────────

#[derive(Default)]
pub struct OtaListener {
    local_addr: Option<SocketAddr>,
    images: Arc<AtomicU32>,
}

impl OtaListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Images accepted since start.
    pub fn images_received(&self) -> u32 {
        self.images.load(Ordering::SeqCst)
    }
}

impl OtaPort for OtaListener {
    fn start(&mut self, port: u16) -> Result<(), OtaError> {
        if self.local_addr.is_some() {
            return Err(OtaError::AlreadyListening);
        }
        let listener = TcpListener::bind(("0.0.0.0", port)).map_err(|e| {
            warn!("OTA: bind to port {} failed ({})", port, e);
            OtaError::BindFailed
        })?;
        let addr = listener.local_addr().map_err(|_| OtaError::BindFailed)?;

        let images = self.images.clone();
        std::thread::Builder::new()
            .name("ota".into())
            .stack_size(OTA_TASK_STACK)
            .spawn(move || {
                for stream in listener.incoming() {
                    match stream {
                        Ok(stream) => serve_connection(stream, &images),
                        Err(e) => warn!("OTA: accept failed ({})", e),
                    }
                }
            })
            .map_err(|_| OtaError::BindFailed)?;

        self.local_addr = Some(addr);
        info!("OTA: listening on {}", addr);
        Ok(())
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn mark_running_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}
