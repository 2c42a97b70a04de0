//! Event handling for an owned selection.
//!
//! Pure logic — no I/O. [`handle_event`] updates the [`Session`] and
//! returns the answer the driver must write and acknowledge.

use std::time::Instant;

use x11rb::NONE;
use x11rb::protocol::xproto::Atom;

use super::state::{DoneReason, Session};
use super::target::TargetSet;
use super::{Payload, Request, SelectionEvent};
use crate::content::Content;

/// How a request is answered.
#[derive(Debug, PartialEq, Eq)]
pub enum Answer<'a> {
    /// Write `payload` to `property` on the requestor, then acknowledge
    /// naming that property.
    Property { property: Atom, payload: Payload<'a> },
    /// Acknowledge with property `None`.
    Refused,
}

/// An answer addressed to the request that prompted it.
#[derive(Debug, PartialEq, Eq)]
pub struct Response<'a> {
    pub request: Request,
    pub answer: Answer<'a>,
}

impl Response<'_> {
    /// Property named in the acknowledgment.
    pub fn notify_property(&self) -> Atom {
        match self.answer {
            Answer::Property { property, .. } => property,
            Answer::Refused => NONE,
        }
    }
}

/// Apply one event to the session.
///
/// Returns `Some` when the event is a request that must be answered.
/// Ownership loss ends the session and produces no answer.
pub fn handle_event<'a>(
    session: &mut Session,
    targets: &'a TargetSet,
    content: &'a Content,
    event: SelectionEvent,
    now: Instant,
) -> Option<Response<'a>> {
    match event {
        SelectionEvent::Cleared => {
            session.finish(DoneReason::OwnershipLost);
            None
        }
        SelectionEvent::Request(request) => {
            Some(answer_request(session, targets, content, request, now))
        }
    }
}

fn answer_request<'a>(
    session: &mut Session,
    targets: &'a TargetSet,
    content: &'a Content,
    request: Request,
    now: Instant,
) -> Response<'a> {
    let Some(payload) = targets.encode(request.target, content) else {
        tracing::debug!(
            requestor = request.requestor,
            target = request.target,
            "refusing unsupported target"
        );
        return Response {
            request,
            answer: Answer::Refused,
        };
    };

    if matches!(payload, Payload::Text { .. }) {
        session.record_delivery(now);
        tracing::debug!(
            requestor = request.requestor,
            bytes = content.len(),
            deliveries = session.deliveries(),
            "delivering content"
        );
    } else {
        tracing::debug!(requestor = request.requestor, "listing targets");
    }

    // Obsolete clients leave the property unset and expect the reply
    // under the target's name.
    let property = if request.property == NONE {
        request.target
    } else {
        request.property
    };

    Response {
        request,
        answer: Answer::Property { property, payload },
    }
}
