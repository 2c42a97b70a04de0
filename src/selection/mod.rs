//! Selection broker — claims the clipboard and serves it until done.
//!
//! Architecture: a pure state machine ([`state::Session`] driven by
//! [`handler::handle_event`]) and a blocking driver, [`serve`], that
//! performs all display I/O through a [`SelectionBackend`]. The X11
//! backend lives in [`x11`].
//!
//! Lifecycle: unowned → claiming → owning → done. Owning is entered
//! only after the display confirms the claim; done is terminal.

pub mod handler;
pub mod state;
pub mod target;
pub mod x11;

use std::time::{Duration, Instant};

use x11rb::protocol::xproto::{Atom, Timestamp, Window};

use crate::content::Content;
use handler::{Answer, Response};
use state::{DoneReason, Phase, Session, Timeouts};
use target::TargetSet;

/// Selection broker errors.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("X11 connect failed: {0}")]
    Connect(String),
    #[error("X11: {0}")]
    X11(String),
    #[error("selection claim rejected: another client owns it")]
    ClaimRejected,
    #[error("poll error on X11 fd: {0}")]
    Poll(nix::Error),
}

/// A conversion request from another client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
    pub time: Timestamp,
}

/// Events the broker reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// Another client became the selection owner.
    Cleared,
    /// A client asked for the selection in some target.
    Request(Request),
}

/// Data written to a requestor's property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// `TARGETS` reply: type `ATOM`, format 32.
    Atoms(&'a [Atom]),
    /// Content reply: format 8, typed as the requested target.
    Text { type_: Atom, data: &'a [u8] },
}

/// Display primitives the broker needs.
///
/// Implemented by [`x11::X11Selection`]. Releasing the ownership
/// handle is the implementor's `Drop`.
pub trait SelectionBackend {
    /// Supported targets bound to this display's atoms.
    fn targets(&self) -> &TargetSet;

    /// Ask to become the selection owner.
    fn claim(&mut self) -> Result<(), SelectionError>;

    /// Whether the display reports this process as the current owner.
    fn is_owner(&mut self) -> Result<bool, SelectionError>;

    /// Block for at most `timeout` waiting for the next event.
    ///
    /// `Ok(None)` means the wait ended with nothing to classify: the
    /// timeout elapsed or an unrelated event arrived.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<SelectionEvent>, SelectionError>;

    /// Store `payload` as `property` on `requestor`.
    fn write_property(
        &mut self,
        requestor: Window,
        property: Atom,
        payload: Payload<'_>,
    ) -> Result<(), SelectionError>;

    /// Acknowledge `request` naming `property` (or `NONE` on refusal),
    /// then wait until the display has processed it.
    fn notify(&mut self, request: &Request, property: Atom) -> Result<(), SelectionError>;
}

/// Claim the selection and answer requests until the session is done.
///
/// Fails with [`SelectionError::ClaimRejected`] without waiting for a
/// single event if the claim is not confirmed. On success returns why
/// the session ended.
pub fn serve<B: SelectionBackend>(
    backend: &mut B,
    content: &Content,
    timeouts: Timeouts,
) -> Result<DoneReason, SelectionError> {
    let claimed_at = Instant::now();
    backend.claim()?;
    if !backend.is_owner()? {
        return Err(SelectionError::ClaimRejected);
    }
    let mut session = Session::start(timeouts, claimed_at);
    let targets = backend.targets().clone();
    tracing::debug!(bytes = content.len(), "selection claimed");

    loop {
        let timeout = session.next_wake(Instant::now());
        let event = backend.next_event(timeout)?;

        // The absolute deadline is checked before the event is looked at.
        if !session.expire_if_overdue(Instant::now())
            && let Some(event) = event
        {
            let response =
                handler::handle_event(&mut session, &targets, content, event, Instant::now());
            if let Some(response) = response {
                respond(backend, &response)?;
            }
        }

        session.expire_grace_if_elapsed(Instant::now());

        if let Phase::Done(reason) = session.phase() {
            tracing::debug!(%reason, deliveries = session.deliveries(), "selection session done");
            return Ok(reason);
        }
    }
}

/// Write the answer (if any) and acknowledge the request.
fn respond<B: SelectionBackend>(
    backend: &mut B,
    response: &Response<'_>,
) -> Result<(), SelectionError> {
    if let Answer::Property { property, payload } = response.answer {
        backend.write_property(response.request.requestor, property, payload)?;
    }
    backend.notify(&response.request, response.notify_property())
}
