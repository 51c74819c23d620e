// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data and interest packets and the selectors the protocol uses.
//!
//! These types model the slice of the NDN data plane the two engines need:
//! named data with an opaque content and a detached signature, interests
//! with exclude filters and a rightmost-child selector for E-KEY discovery,
//! and forwarding-hint links walked as a fallback after NACKs.
use serde::{Deserialize, Serialize};

use crate::name::{Component, Name};

/// Named, signable unit of content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    name: Name,
    #[serde(with = "serde_bytes")]
    content: Vec<u8>,
    signature: Option<Vec<u8>>,
}

impl Data {
    pub fn new(name: Name, content: Vec<u8>) -> Self {
        Self {
            name,
            content,
            signature: None,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = Some(signature);
    }
}

/// Exclude filter over the name component following the interest name.
///
/// `after` rules out components strictly greater, `before` rules out
/// components less than or equal. Both bounds can be active at once, which
/// is how a producer narrows in on an E-KEY covering its timeslot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclude {
    before: Option<Component>,
    after: Option<Component>,
}

impl Exclude {
    /// Excludes every component greater than `component`.
    pub fn exclude_after(&mut self, component: Component) {
        self.after = Some(component);
    }

    /// Excludes every component less than or equal to `component`.
    pub fn exclude_before(&mut self, component: Component) {
        self.before = Some(component);
    }

    pub fn is_excluded(&self, component: &Component) -> bool {
        if self.after.as_ref().is_some_and(|after| component > after) {
            return true;
        }
        self.before.as_ref().is_some_and(|before| component <= before)
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

/// Forwarding-hint link: an ordered list of delegation names tried in turn
/// when interests are NACKed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    delegations: Vec<Name>,
}

impl Link {
    /// The empty link; interests carrying it have no fallback.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(delegations: Vec<Name>) -> Self {
        Self { delegations }
    }

    pub fn delegations(&self) -> &[Name] {
        &self.delegations
    }

    pub fn len(&self) -> usize {
        self.delegations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegations.is_empty()
    }
}

/// Request for a single data packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    name: Name,
    exclude: Exclude,
    rightmost_child: bool,
    link: Option<Link>,
    selected_delegation: Option<usize>,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            exclude: Exclude::default(),
            rightmost_child: false,
            link: None,
            selected_delegation: None,
        }
    }

    pub fn with_exclude(mut self, exclude: Exclude) -> Self {
        self.exclude = exclude;
        self
    }

    /// Requests the rightmost matching child, i.e. the latest E-KEY.
    pub fn with_rightmost_child(mut self) -> Self {
        self.rightmost_child = true;
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn exclude(&self) -> &Exclude {
        &self.exclude
    }

    pub fn rightmost_child(&self) -> bool {
        self.rightmost_child
    }

    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }

    /// Attaches a forwarding-hint link.
    pub fn set_link(&mut self, link: Link) {
        self.link = Some(link);
    }

    pub fn selected_delegation(&self) -> Option<usize> {
        self.selected_delegation
    }

    pub fn select_delegation(&mut self, index: usize) {
        self.selected_delegation = Some(index);
    }

    /// True when `data` is an acceptable response: the interest name is a
    /// prefix of the data name and the first uncovered component passes the
    /// exclude filter.
    pub fn matches_data(&self, data: &Data) -> bool {
        if !self.name.is_prefix_of(data.name()) {
            return false;
        }
        if self.exclude.is_empty() {
            return true;
        }
        match data.name().component(self.name.len() as isize) {
            Some(component) => !self.exclude.is_excluded(component),
            None => true,
        }
    }
}
