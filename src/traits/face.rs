// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use crate::packet::{Data, Interest};

/// Minimum spacing between outbound interests from one engine instance.
///
/// Dispatches go through [`Face::schedule`] with this delay, which keeps the
/// rate limit cooperative and preserves the total ordering of interests.
pub const INTEREST_PACING: Duration = Duration::from_millis(100);

/// Outcome of an expressed interest, delivered by the face.
#[derive(Debug)]
pub enum FaceEvent {
    /// A data packet arrived for the interest.
    Data(Data),
    /// The network refused the interest.
    Nack,
    /// No response arrived within the interest lifetime.
    Timeout,
}

/// Continuation invoked with the interest's outcome.
pub type OnFaceResponse = Box<dyn FnOnce(Interest, FaceEvent)>;

/// Deferred closure run by the face's event loop.
pub type ScheduledEvent = Box<dyn FnOnce()>;

/// Schedules `action` behind the interest pacing delay, handing the face
/// back to it.
pub(crate) fn schedule_paced(
    face: std::rc::Rc<dyn Face>,
    action: impl FnOnce(std::rc::Rc<dyn Face>) + 'static,
) {
    let inner_face = face.clone();
    face.schedule(INTEREST_PACING, Box::new(move || action(inner_face)));
}

/// The network layer.
///
/// Implementations drive a single-threaded cooperative event loop: both
/// engines mutate their state only from callbacks the face invokes, so a
/// face must never deliver events concurrently.
pub trait Face {
    /// Expresses an interest and eventually delivers exactly one
    /// [`FaceEvent`] for it.
    fn express_interest(&self, interest: Interest, on_response: OnFaceResponse);

    /// Runs `event` after `delay` on the face's event loop.
    fn schedule(&self, delay: Duration, event: ScheduledEvent);
}
