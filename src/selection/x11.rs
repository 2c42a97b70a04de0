//! X11 selection backend — ownership window, atoms, event wait.
//!
//! Wraps `x11rb::rust_connection::RustConnection`. The ownership handle
//! is an unmapped 1×1 window; dropping [`X11Selection`] destroys it,
//! which also gives up the selection, and closes the connection.

use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    self, Atom, AtomEnum, CreateWindowAux, EventMask, PropMode, SELECTION_NOTIFY_EVENT,
    SelectionNotifyEvent, Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, CURRENT_TIME};

use super::target::TargetSet;
use super::{Payload, Request, SelectionBackend, SelectionError, SelectionEvent};

/// Name of the selection this process publishes to.
pub const CLIPBOARD_SELECTION: &str = "CLIPBOARD";

/// Owner of one X11 selection.
pub struct X11Selection {
    conn: RustConnection,
    window: Window,
    selection: Atom,
    targets: TargetSet,
}

impl X11Selection {
    /// Connect to `$DISPLAY`, create the ownership window and intern
    /// the selection and target atoms.
    pub fn connect(selection_name: &str) -> Result<Self, SelectionError> {
        let (conn, screen_num) =
            RustConnection::connect(None).map_err(|e| SelectionError::Connect(e.to_string()))?;

        let root = conn.setup().roots[screen_num].root;

        let window = conn
            .generate_id()
            .map_err(|e| SelectionError::X11(format!("generate_id: {e}")))?;
        xproto::create_window(
            &conn,
            COPY_DEPTH_FROM_PARENT,
            window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &CreateWindowAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )
        .map_err(|e| SelectionError::X11(format!("create_window: {e}")))?;

        let selection = intern(&conn, selection_name)?;
        let targets = TargetSet::resolve(|t| intern(&conn, t.name()))?;

        tracing::debug!(
            screen = screen_num,
            window = format_args!("0x{window:08x}"),
            selection = selection_name,
            "ownership window created"
        );

        Ok(Self {
            conn,
            window,
            selection,
            targets,
        })
    }

    /// Map a raw X11 event onto what the broker cares about.
    fn classify(&self, event: Event) -> Option<SelectionEvent> {
        match event {
            Event::SelectionClear(e) if e.selection == self.selection && e.owner == self.window => {
                Some(SelectionEvent::Cleared)
            }
            Event::SelectionRequest(e) => Some(SelectionEvent::Request(Request {
                requestor: e.requestor,
                selection: e.selection,
                target: e.target,
                property: e.property,
                time: e.time,
            })),
            // Unchecked requests report failures here, e.g. a requestor
            // window destroyed before its property was written.
            Event::Error(e) => {
                tracing::debug!(error = ?e, "X11 error event");
                None
            }
            _ => None,
        }
    }
}

impl SelectionBackend for X11Selection {
    fn targets(&self) -> &TargetSet {
        &self.targets
    }

    fn claim(&mut self) -> Result<(), SelectionError> {
        xproto::set_selection_owner(&self.conn, self.window, self.selection, CURRENT_TIME)
            .map_err(|e| SelectionError::X11(format!("set_selection_owner: {e}")))?;
        Ok(())
    }

    fn is_owner(&mut self) -> Result<bool, SelectionError> {
        let owner = xproto::get_selection_owner(&self.conn, self.selection)
            .map_err(|e| SelectionError::X11(format!("get_selection_owner: {e}")))?
            .reply()
            .map_err(|e| SelectionError::X11(format!("get_selection_owner reply: {e}")))?
            .owner;
        Ok(owner == self.window)
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<SelectionEvent>, SelectionError> {
        let x11_err = |e: x11rb::errors::ConnectionError| SelectionError::X11(format!("{e}"));

        // Events may already be queued from an earlier read.
        if let Some(event) = self.conn.poll_for_event().map_err(x11_err)? {
            return Ok(self.classify(event));
        }
        self.conn.flush().map_err(x11_err)?;

        let raw_fd = self.conn.stream().as_raw_fd();
        // SAFETY: raw_fd is the X11 connection fd, valid while conn is alive.
        let borrowed = unsafe { BorrowedFd::borrow_raw(raw_fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];

        match poll(&mut fds, poll_timeout(timeout)) {
            Ok(0) => return Ok(None), // Timeout — let the caller check timers.
            Ok(_) => {}
            Err(nix::Error::EINTR) => return Ok(None),
            Err(e) => return Err(SelectionError::Poll(e)),
        }

        let event = self.conn.poll_for_event().map_err(x11_err)?;
        Ok(event.and_then(|e| self.classify(e)))
    }

    fn write_property(
        &mut self,
        requestor: Window,
        property: Atom,
        payload: Payload<'_>,
    ) -> Result<(), SelectionError> {
        let sent = match payload {
            Payload::Atoms(atoms) => self.conn.change_property32(
                PropMode::REPLACE,
                requestor,
                property,
                AtomEnum::ATOM,
                atoms,
            ),
            Payload::Text { type_, data } => {
                self.conn
                    .change_property8(PropMode::REPLACE, requestor, property, type_, data)
            }
        };
        sent.map_err(|e| SelectionError::X11(format!("change_property: {e}")))?;
        Ok(())
    }

    fn notify(&mut self, request: &Request, property: Atom) -> Result<(), SelectionError> {
        let event = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: request.time,
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property,
        };
        xproto::send_event(
            &self.conn,
            false,
            request.requestor,
            EventMask::NO_EVENT,
            event,
        )
        .map_err(|e| SelectionError::X11(format!("send_event: {e}")))?;

        // Round trip so the requestor sees replies promptly and in order.
        self.conn
            .sync()
            .map_err(|e| SelectionError::X11(format!("sync: {e}")))
    }
}

impl Drop for X11Selection {
    /// Best-effort release — errors are logged.
    fn drop(&mut self) {
        if let Err(e) = xproto::destroy_window(&self.conn, self.window) {
            tracing::debug!(error = %e, "destroy_window failed");
        }
        if let Err(e) = self.conn.sync() {
            tracing::debug!(error = %e, "sync after destroy_window failed");
        }
    }
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom, SelectionError> {
    Ok(xproto::intern_atom(conn, false, name.as_bytes())
        .map_err(|e| SelectionError::X11(format!("intern_atom {name}: {e}")))?
        .reply()
        .map_err(|e| SelectionError::X11(format!("intern_atom {name} reply: {e}")))?
        .atom)
}

/// Round a wait up to whole milliseconds so a sub-millisecond remainder
/// does not turn into a busy loop. Longer waits are capped; the caller
/// simply waits again.
fn poll_timeout(timeout: Duration) -> PollTimeout {
    let ms = timeout.as_micros().div_ceil(1000);
    PollTimeout::from(u16::try_from(ms).unwrap_or(u16::MAX))
}
