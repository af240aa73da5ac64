//! bttag-dummy - In-memory NFC tag emulator for testing
//!
//! [`DummyTag`] emulates a physical tag exposing one or more technologies
//! backed by memory. It is useful for testing and development without a
//! reader. Memory can be inspected through [`Shared`] handles after the tag
//! has been moved into a writer thread.
//!
//! Faults can be injected ([`Faults`]) and a write can be held at a given
//! point with a [`pause_gate`] to test cancellation.

#![warn(missing_docs)]

mod classic;
mod ndef;
mod ultralight;

pub use classic::{ClassicMemory, DummyClassic, FACTORY_TRAILER};
pub use ndef::{DummyNdef, DummyNdefFormatable, NdefMemory};
pub use ultralight::{DummyUltralight, UltralightMemory};

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bttag_core::tech::{
    ClassicTech, CloseHandle, NdefFormatableTech, NdefTech, Tag, TagCapabilities, TransportError,
    TransportResult, UltralightKind, UltralightTech,
};

/// State shared between a test and a tag owned by someone else
#[derive(Debug, Default)]
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Shared<T> {
    fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Lock the state
    pub fn lock(&self) -> MutexGuard<'_, T> {
        // A panicking test thread must not hide the memory from the others
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Injected failures
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Connecting fails with [`TransportError::TagLost`]
    pub fail_connect: bool,
    /// The tag leaves the field on this write (0-based); it and every later
    /// call fail
    pub lose_after_writes: Option<usize>,
    /// The post-lock wake command fails
    pub fail_wake: bool,
}

/// Holds a write until the test resumes it
pub struct PauseGate {
    at_write: usize,
    reached: Sender<()>,
    resume: Receiver<()>,
}

impl PauseGate {
    fn pause(self) {
        let _ = self.reached.send(());
        let _ = self.resume.recv();
    }
}

/// Test side of a [`PauseGate`]
pub struct GateController {
    reached: Receiver<()>,
    resume: Sender<()>,
}

impl GateController {
    /// Wait until the held write is reached
    pub fn wait_reached(&self, timeout: Duration) -> bool {
        self.reached.recv_timeout(timeout).is_ok()
    }

    /// Let the held write continue
    pub fn resume(&self) {
        let _ = self.resume.send(());
    }
}

/// Gate holding write number `at_write` (0-based) before it reaches memory
pub fn pause_gate(at_write: usize) -> (PauseGate, GateController) {
    let (reached_tx, reached_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel();
    (
        PauseGate {
            at_write,
            reached: reached_tx,
            resume: resume_rx,
        },
        GateController {
            reached: reached_rx,
            resume: resume_tx,
        },
    )
}

#[derive(Default)]
struct PortState {
    connected: bool,
    lost: bool,
    faults: Faults,
    writes: usize,
    gate: Option<PauseGate>,
}

/// RF link of one tag, shared by its technologies and its close handle
#[derive(Clone, Default)]
pub struct Port(Arc<Mutex<PortState>>);

impl Port {
    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn connect(&self) -> TransportResult<()> {
        let mut state = self.lock();
        if state.faults.fail_connect || state.lost {
            return Err(TransportError::TagLost);
        }
        state.connected = true;
        Ok(())
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub(crate) fn close(&self) -> TransportResult<()> {
        self.lock().connected = false;
        Ok(())
    }

    /// Fail unless the link is up
    pub(crate) fn ensure_connected(&self) -> TransportResult<()> {
        let state = self.lock();
        if state.lost {
            Err(TransportError::TagLost)
        } else if !state.connected {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    /// Account for one write, applying faults and the pause gate
    pub(crate) fn before_write(&self) -> TransportResult<()> {
        let gate = {
            let mut state = self.lock();
            if state.lost {
                return Err(TransportError::TagLost);
            }
            if !state.connected {
                return Err(TransportError::Closed);
            }

            let n = state.writes;
            state.writes += 1;

            if state.faults.lose_after_writes == Some(n) {
                log::debug!("Dummy tag lost at write {}", n);
                state.lost = true;
                state.connected = false;
                return Err(TransportError::TagLost);
            }

            let hold = state.gate.as_ref().is_some_and(|g| g.at_write == n);
            if hold {
                state.gate.take()
            } else {
                None
            }
        };

        if let Some(gate) = gate {
            gate.pause();
        }

        // Closed from another thread while held
        self.ensure_connected()
    }

    pub(crate) fn faults(&self) -> Faults {
        self.lock().faults.clone()
    }

    /// Number of write operations attempted
    pub fn writes(&self) -> usize {
        self.lock().writes
    }
}

/// Close handle of a dummy tag
pub struct DummyCloseHandle(Port);

impl CloseHandle for DummyCloseHandle {
    fn close(&self) -> TransportResult<()> {
        log::debug!("Dummy tag closed through handle");
        self.0.close()
    }
}

/// Emulated physical tag
pub struct DummyTag {
    id: Vec<u8>,
    port: Port,
    ndef: Option<DummyNdef>,
    formatable: Option<DummyNdefFormatable>,
    ultralight: Option<DummyUltralight>,
    classic: Option<DummyClassic>,
}

impl DummyTag {
    /// Tag with the given UID and no technologies
    pub fn new(id: &[u8]) -> Self {
        Self {
            id: id.to_vec(),
            port: Port::default(),
            ndef: None,
            formatable: None,
            ultralight: None,
            classic: None,
        }
    }

    /// Add an NDEF technology accepting messages up to `max_size` bytes
    pub fn with_ndef(mut self, max_size: usize) -> Self {
        self.ndef = Some(DummyNdef::new(self.port.clone(), max_size));
        self
    }

    /// Add an NDEF format technology for blank tags of `capacity` bytes
    pub fn with_formatable(mut self, capacity: usize) -> Self {
        self.formatable = Some(DummyNdefFormatable::new(self.port.clone(), capacity));
        self
    }

    /// Add Ultralight page access
    pub fn with_ultralight(mut self, kind: UltralightKind) -> Self {
        self.ultralight = Some(DummyUltralight::new(self.port.clone(), kind, &self.id));
        self
    }

    /// Add Classic sector access with `sectors` 4-block sectors
    pub fn with_classic(mut self, sectors: usize) -> Self {
        self.classic = Some(DummyClassic::new(self.port.clone(), sectors, &self.id));
        self
    }

    /// Inject failures
    pub fn with_faults(self, faults: Faults) -> Self {
        self.port.lock().faults = faults;
        self
    }

    /// Hold a write at the gate
    pub fn with_pause_gate(self, gate: PauseGate) -> Self {
        self.port.lock().gate = Some(gate);
        self
    }

    /// Blank Ultralight tag
    pub fn ultralight(kind: UltralightKind) -> Self {
        Self::new(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]).with_ultralight(kind)
    }

    /// Blank Classic tag
    pub fn classic(sectors: usize) -> Self {
        Self::new(&[0xDE, 0xAD, 0xBE, 0xEF]).with_classic(sectors)
    }

    /// NDEF formatted tag
    pub fn ndef(max_size: usize) -> Self {
        Self::new(&[0x04, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).with_ndef(max_size)
    }

    /// Blank NDEF formatable tag
    pub fn formatable(capacity: usize) -> Self {
        Self::new(&[0x04, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F]).with_formatable(capacity)
    }

    /// RF link
    pub fn port(&self) -> Port {
        self.port.clone()
    }

    /// NDEF memory, if the tag has NDEF
    pub fn ndef_memory(&self) -> Option<Shared<NdefMemory>> {
        self.ndef.as_ref().map(DummyNdef::memory)
    }

    /// Formatable memory, if the tag is formatable
    pub fn formatable_memory(&self) -> Option<Shared<NdefMemory>> {
        self.formatable.as_ref().map(DummyNdefFormatable::memory)
    }

    /// Ultralight pages, if the tag is an Ultralight
    pub fn ultralight_memory(&self) -> Option<Shared<UltralightMemory>> {
        self.ultralight.as_ref().map(DummyUltralight::memory)
    }

    /// Classic blocks, if the tag is a Classic
    pub fn classic_memory(&self) -> Option<Shared<ClassicMemory>> {
        self.classic.as_ref().map(DummyClassic::memory)
    }
}

impl Tag for DummyTag {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn capabilities(&self) -> TagCapabilities {
        let mut caps = TagCapabilities::empty();
        caps.set(TagCapabilities::NDEF, self.ndef.is_some());
        caps.set(TagCapabilities::NDEF_FORMATABLE, self.formatable.is_some());
        caps.set(TagCapabilities::ULTRALIGHT, self.ultralight.is_some());
        caps.set(TagCapabilities::CLASSIC, self.classic.is_some());
        caps
    }

    fn ndef(&mut self) -> Option<&mut dyn NdefTech> {
        self.ndef.as_mut().map(|t| t as &mut dyn NdefTech)
    }

    fn ndef_formatable(&mut self) -> Option<&mut dyn NdefFormatableTech> {
        self.formatable
            .as_mut()
            .map(|t| t as &mut dyn NdefFormatableTech)
    }

    fn ultralight(&mut self) -> Option<&mut dyn UltralightTech> {
        self.ultralight.as_mut().map(|t| t as &mut dyn UltralightTech)
    }

    fn classic(&mut self) -> Option<&mut dyn ClassicTech> {
        self.classic.as_mut().map(|t| t as &mut dyn ClassicTech)
    }

    fn close_handle(&self) -> Arc<dyn CloseHandle> {
        Arc::new(DummyCloseHandle(self.port.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bttag_core::error::Error;
    use bttag_core::medium::{resolve, Medium};

    #[test]
    fn test_resolve_prefers_ndef() {
        let mut tag = DummyTag::ultralight(UltralightKind::UltralightC).with_ndef(137);
        assert_eq!(resolve(&mut tag).unwrap(), Medium::Ndef { max_size: 137 });
    }

    #[test]
    fn test_resolve_order() {
        let mut tag = DummyTag::new(&[1])
            .with_classic(16)
            .with_ultralight(UltralightKind::Ultralight);
        assert_eq!(
            resolve(&mut tag).unwrap(),
            Medium::Ultralight {
                kind: UltralightKind::Ultralight
            }
        );

        let mut tag = DummyTag::new(&[1]).with_classic(16).with_formatable(256);
        assert_eq!(resolve(&mut tag).unwrap(), Medium::NdefFormatable);

        let mut tag = DummyTag::classic(40);
        assert_eq!(resolve(&mut tag).unwrap(), Medium::Classic { sectors: 32 });
    }

    #[test]
    fn test_resolve_unsupported() {
        let mut tag = DummyTag::new(&[1, 2, 3, 4]);
        assert!(matches!(resolve(&mut tag), Err(Error::UnsupportedMedium)));
    }

    #[test]
    fn test_close_handle_drops_link() {
        let tag = DummyTag::ndef(100);
        let port = tag.port();
        port.connect().unwrap();
        tag.close_handle().close().unwrap();
        assert!(!port.is_connected());
        assert!(matches!(port.before_write(), Err(TransportError::Closed)));
    }

    #[test]
    fn test_lose_after_writes() {
        let tag = DummyTag::ndef(100).with_faults(Faults {
            lose_after_writes: Some(1),
            ..Faults::default()
        });
        let port = tag.port();
        port.connect().unwrap();
        port.before_write().unwrap();
        assert!(matches!(port.before_write(), Err(TransportError::TagLost)));
        assert!(matches!(port.connect(), Err(TransportError::TagLost)));
        assert_eq!(port.writes(), 2);
    }
}
