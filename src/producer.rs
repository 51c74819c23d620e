// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer side of the protocol: content-key lifecycle and group key
//! wrapping.
//!
//! A producer owns one content key per wall-clock hour. Publishing for a new
//! hour generates a fresh key, then wraps it once for every E-KEY namespace
//! node covering the producer's data type, so that every branch of the
//! access hierarchy can grant its consumers access. E-KEYs are fetched
//! asynchronously with exclude filters that narrow in on a key whose
//! coverage interval contains the timeslot; observed E-KEYs are cached per
//! node together with their coverage, so later hours inside the same
//! interval wrap without any network traffic.
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use crate::crypto::Rng;
use crate::encrypted_content::EncryptAlgorithm;
use crate::encryptor::{encrypt_data, EncryptParams};
use crate::error::{ErrorCode, OnError};
use crate::name::{components, Component, Name};
use crate::packet::{Data, Exclude, Interest, Link};
use crate::store::KeyStore;
use crate::timeslot::Timeslot;
use crate::traits::{schedule_paced, DataSigner, Face, FaceEvent};

/// Invoked with all wrapped content-key packets once a key request
/// completes.
pub type OnEncryptedKeys = Rc<dyn Fn(&[Data])>;

/// Producer of group-encrypted content under a fixed namespace.
pub struct Producer<S> {
    face: Rc<dyn Face>,
    state: Rc<RefCell<ProducerState<S>>>,
}

struct ProducerState<S> {
    /// `<prefix>/SAMPLE/<dataType>`.
    namespace: Name,
    /// Most recently observed E-KEY per namespace node.
    ekey_info: BTreeMap<Name, KeyInfo>,
    /// In-flight key wrappings, keyed by the unix-millis of their timeslot.
    key_requests: HashMap<i64, KeyRequest>,
    store: S,
    signer: Rc<dyn DataSigner>,
    max_repeat_attempts: u8,
    key_retrieval_link: Link,
    rng: Rng,
}

/// Coverage and bits of the E-KEY last seen for one namespace node.
#[derive(Default)]
struct KeyInfo {
    coverage: Option<(Timeslot, Timeslot)>,
    key_bits: Vec<u8>,
}

impl KeyInfo {
    /// Covered means `begin <= timeslot < end`.
    fn covers(&self, timeslot: Timeslot) -> bool {
        self.coverage
            .is_some_and(|(begin, end)| begin <= timeslot && timeslot < end)
    }
}

/// Book-keeping for one in-flight content-key publication.
struct KeyRequest {
    interest_count: usize,
    repeat_attempts: HashMap<Name, u8>,
    encrypted_keys: Vec<Data>,
}

impl KeyRequest {
    fn new(interest_count: usize) -> Self {
        Self {
            interest_count,
            repeat_attempts: HashMap::new(),
            encrypted_keys: Vec::new(),
        }
    }
}

impl<S: KeyStore + 'static> Producer<S> {
    /// Creates a producer publishing under `<prefix>/SAMPLE/<data_type>`.
    ///
    /// One E-KEY subscription is precomputed for every non-empty prefix of
    /// `data_type`, from the full type down to its first component:
    /// `<prefix>/READ/<data_type_prefix>/E-KEY`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        face: Rc<dyn Face>,
        prefix: Name,
        data_type: Name,
        store: S,
        signer: Rc<dyn DataSigner>,
        max_repeat_attempts: u8,
        key_retrieval_link: Link,
        rng: Rng,
    ) -> Self {
        let mut ekey_info = BTreeMap::new();
        let read_prefix = prefix.clone().append(components::READ);
        let mut node_type = data_type.clone();
        while !node_type.is_empty() {
            let node = read_prefix
                .clone()
                .append_name(&node_type)
                .append(components::E_KEY);
            ekey_info.insert(node, KeyInfo::default());
            node_type = node_type.prefix(-1);
        }

        let namespace = prefix.append(components::SAMPLE).append_name(&data_type);

        Self {
            face,
            state: Rc::new(RefCell::new(ProducerState {
                namespace,
                ekey_info,
                key_requests: HashMap::new(),
                store,
                signer,
                max_repeat_attempts,
                key_retrieval_link,
                rng,
            })),
        }
    }

    /// Ensures a content key exists for the hour containing `timeslot` and
    /// returns its name.
    ///
    /// For a fresh hour this generates and persists a key, then starts one
    /// wrapping per E-KEY namespace node: nodes with a cached covering E-KEY
    /// wrap immediately, the others fetch an E-KEY first. Once all nodes
    /// settle, `on_keys` receives the wrapped packets.
    pub fn create_content_key(
        &self,
        timeslot: Timeslot,
        on_keys: Option<OnEncryptedKeys>,
        on_error: OnError,
    ) -> Name {
        let hour = timeslot.floor_hour();
        let content_key_name = {
            let state = self.state.borrow();
            state
                .namespace
                .clone()
                .append(components::C_KEY)
                .append(hour.iso_string())
        };

        // Covered nodes wrap synchronously with cached bits, uncovered nodes
        // fetch. Worked out under the borrow, dispatched after it.
        let mut covered: Vec<(Name, Vec<u8>)> = Vec::new();
        let mut uncovered: Vec<Name> = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            match state.store.has_content_key(timeslot) {
                Ok(true) => return content_key_name,
                Ok(false) => {}
                Err(err) => {
                    drop(state);
                    on_error(ErrorCode::General, err.to_string());
                    return content_key_name;
                }
            }

            let content_key = match state.rng.fresh_content_key() {
                Ok(key) => key,
                Err(err) => {
                    drop(state);
                    on_error(ErrorCode::EncryptionFailure, err.to_string());
                    return content_key_name;
                }
            };
            if let Err(err) = state.store.add_content_key(timeslot, content_key.as_bytes()) {
                drop(state);
                on_error(ErrorCode::General, err.to_string());
                return content_key_name;
            }

            let mut request = KeyRequest::new(state.ekey_info.len());
            for (node, info) in &state.ekey_info {
                if info.covers(timeslot) {
                    let (begin, end) = info.coverage.expect("covering key has coverage");
                    let ekey_name = node
                        .clone()
                        .append(begin.iso_string())
                        .append(end.iso_string());
                    covered.push((ekey_name, info.key_bits.clone()));
                } else {
                    request.repeat_attempts.insert(node.clone(), 0);
                    uncovered.push(node.clone());
                }
            }
            state.key_requests.insert(timeslot.unix_millis(), request);
        }

        for (ekey_name, key_bits) in covered {
            Self::encrypt_content_key(&self.state, &key_bits, ekey_name, timeslot, &on_keys, &on_error);
        }
        for node in uncovered {
            let mut exclude = Exclude::default();
            exclude.exclude_after(Component::from(&timeslot));
            let interest = Interest::new(node)
                .with_exclude(exclude)
                .with_rightmost_child();
            Self::send_key_interest(
                self.face.clone(),
                Rc::downgrade(&self.state),
                interest,
                0,
                timeslot,
                on_keys.clone(),
                on_error.clone(),
            );
        }

        content_key_name
    }

    /// Encrypts `content` for `timeslot` and returns the signed data packet,
    /// named `<namespace>/<ISO timeslot>`. Content-key wrapping is kicked
    /// off as a side effect and runs to completion in the background.
    pub fn produce(
        &self,
        timeslot: Timeslot,
        content: &[u8],
        on_error: OnError,
    ) -> Option<Data> {
        let content_key_name = self.create_content_key(timeslot, None, on_error.clone());

        let state = self.state.borrow();
        let content_key = match state.store.get_content_key(timeslot) {
            Ok(Some(bits)) => bits,
            Ok(None) => {
                drop(state);
                on_error(
                    ErrorCode::General,
                    format!("no content key for timeslot {timeslot}"),
                );
                return None;
            }
            Err(err) => {
                drop(state);
                on_error(ErrorCode::General, err.to_string());
                return None;
            }
        };

        let data_name = state.namespace.clone().append(timeslot.iso_string());
        match encrypt_data(
            data_name,
            content,
            &content_key_name,
            &content_key,
            &EncryptParams::new(EncryptAlgorithm::AesCbc),
            &state.rng,
        ) {
            Ok(mut data) => {
                state.signer.sign(&mut data);
                Some(data)
            }
            Err(err) => {
                drop(state);
                on_error(ErrorCode::EncryptionFailure, err.to_string());
                None
            }
        }
    }

    /// Wraps the content key under one E-KEY, signs the packet and settles
    /// the node's slot in the key request. Returns whether wrapping
    /// succeeded; either way the request's counter moves, so completion
    /// cannot be lost to a single bad key.
    fn encrypt_content_key(
        state_rc: &Rc<RefCell<ProducerState<S>>>,
        encryption_key: &[u8],
        ekey_name: Name,
        timeslot: Timeslot,
        on_keys: &Option<OnEncryptedKeys>,
        on_error: &OnError,
    ) -> bool {
        let time_count = timeslot.unix_millis();
        let outcome = {
            let state = state_rc.borrow();
            if !state.key_requests.contains_key(&time_count) {
                // The request already completed, e.g. a late E-KEY after
                // every other node settled.
                return false;
            }
            Self::build_wrapped_key(&state, encryption_key, ekey_name, timeslot)
        };

        let success = match outcome {
            Ok(data) => {
                let mut state = state_rc.borrow_mut();
                if let Some(request) = state.key_requests.get_mut(&time_count) {
                    request.encrypted_keys.push(data);
                }
                true
            }
            Err((code, message)) => {
                on_error(code, message);
                false
            }
        };
        Self::update_key_request(state_rc, time_count, on_keys);
        success
    }

    fn build_wrapped_key(
        state: &ProducerState<S>,
        encryption_key: &[u8],
        ekey_name: Name,
        timeslot: Timeslot,
    ) -> Result<Data, (ErrorCode, String)> {
        let content_key = state
            .store
            .get_content_key(timeslot)
            .map_err(|err| (ErrorCode::General, err.to_string()))?
            .ok_or_else(|| {
                (
                    ErrorCode::General,
                    format!("no content key for timeslot {timeslot}"),
                )
            })?;

        let key_name = state
            .namespace
            .clone()
            .append(components::C_KEY)
            .append(timeslot.floor_hour().iso_string());

        let mut data = encrypt_data(
            key_name,
            &content_key,
            &ekey_name,
            encryption_key,
            &EncryptParams::new(EncryptAlgorithm::RsaOaep),
            &state.rng,
        )
        .map_err(|err| (ErrorCode::EncryptionFailure, err.to_string()))?;
        state.signer.sign(&mut data);
        Ok(data)
    }

    /// Settles one slot of a key request; at zero the request completes and
    /// `on_keys` receives everything that was wrapped.
    fn update_key_request(
        state_rc: &Rc<RefCell<ProducerState<S>>>,
        time_count: i64,
        on_keys: &Option<OnEncryptedKeys>,
    ) {
        let finished = {
            let mut state = state_rc.borrow_mut();
            match state.key_requests.get_mut(&time_count) {
                Some(request) => {
                    request.interest_count = request.interest_count.saturating_sub(1);
                    if request.interest_count == 0 {
                        state
                            .key_requests
                            .remove(&time_count)
                            .map(|request| request.encrypted_keys)
                    } else {
                        None
                    }
                }
                None => None,
            }
        };
        if let Some(keys) = finished {
            tracing::debug!(wrapped = keys.len(), "key request complete");
            if let Some(callback) = on_keys {
                callback(&keys);
            }
        }
    }

    fn send_key_interest(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ProducerState<S>>>,
        interest: Interest,
        delegation_index: usize,
        timeslot: Timeslot,
        on_keys: Option<OnEncryptedKeys>,
        on_error: OnError,
    ) {
        tracing::debug!(interest = %interest.name(), %timeslot, "fetching E-KEY");
        schedule_paced(face, move |face| {
            let response_face = face.clone();
            face.express_interest(
                interest,
                Box::new(move |interest, event| match event {
                    FaceEvent::Data(data) => Self::handle_covering_key(
                        response_face,
                        state,
                        interest,
                        data,
                        delegation_index,
                        timeslot,
                        on_keys,
                        on_error,
                    ),
                    FaceEvent::Timeout => Self::handle_timeout(
                        response_face,
                        state,
                        interest,
                        delegation_index,
                        timeslot,
                        on_keys,
                        on_error,
                    ),
                    FaceEvent::Nack => Self::handle_nack(
                        response_face,
                        state,
                        interest,
                        delegation_index,
                        timeslot,
                        on_keys,
                        on_error,
                    ),
                }),
            );
        });
    }

    /// An E-KEY arrived for one namespace node.
    #[allow(clippy::too_many_arguments)]
    fn handle_covering_key(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ProducerState<S>>>,
        interest: Interest,
        data: Data,
        delegation_index: usize,
        timeslot: Timeslot,
        on_keys: Option<OnEncryptedKeys>,
        on_error: OnError,
    ) {
        let Some(state_rc) = state.upgrade() else {
            return;
        };

        let key_name = data.name().clone();
        let (begin, end) = match Self::coverage_bounds(&key_name) {
            Ok(bounds) => bounds,
            Err(message) => {
                on_error(ErrorCode::General, message);
                return;
            }
        };

        if timeslot >= end {
            // The key covers an earlier period; go back for a later one,
            // additionally ruling out everything up to this key's begin.
            {
                let mut st = state_rc.borrow_mut();
                let Some(request) = st.key_requests.get_mut(&timeslot.unix_millis()) else {
                    return;
                };
                request.repeat_attempts.insert(interest.name().clone(), 0);
            }

            let mut exclude = interest.exclude().clone();
            if let Some(begin_component) = key_name.component(-2) {
                exclude.exclude_before(begin_component.clone());
            }
            let new_interest = Interest::new(interest.name().clone())
                .with_exclude(exclude)
                .with_rightmost_child();
            tracing::debug!(interest = %new_interest.name(), "stale E-KEY, re-fetching");
            Self::send_key_interest(
                face,
                state,
                new_interest,
                delegation_index,
                timeslot,
                on_keys,
                on_error,
            );
        } else {
            // The key covers the timeslot; wrap, and on success remember it
            // as the node's current E-KEY.
            let encryption_key = data.content().to_vec();
            if Self::encrypt_content_key(
                &state_rc,
                &encryption_key,
                key_name,
                timeslot,
                &on_keys,
                &on_error,
            ) {
                let mut st = state_rc.borrow_mut();
                if let Some(info) = st.ekey_info.get_mut(interest.name()) {
                    info.coverage = Some((begin, end));
                    info.key_bits = encryption_key;
                }
            }
        }
    }

    fn handle_timeout(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ProducerState<S>>>,
        interest: Interest,
        delegation_index: usize,
        timeslot: Timeslot,
        on_keys: Option<OnEncryptedKeys>,
        on_error: OnError,
    ) {
        let Some(state_rc) = state.upgrade() else {
            return;
        };
        let retry = {
            let mut st = state_rc.borrow_mut();
            let max_repeat_attempts = st.max_repeat_attempts;
            let Some(request) = st.key_requests.get_mut(&timeslot.unix_millis()) else {
                return;
            };
            let attempts = request
                .repeat_attempts
                .entry(interest.name().clone())
                .or_insert(0);
            if *attempts < max_repeat_attempts {
                *attempts += 1;
                true
            } else {
                false
            }
        };

        if retry {
            tracing::debug!(interest = %interest.name(), "E-KEY interest timed out, retrying");
            Self::send_key_interest(
                face,
                state,
                interest,
                delegation_index,
                timeslot,
                on_keys,
                on_error,
            );
        } else {
            // Out of retries; treat the eventual timeout as a NACK.
            Self::handle_nack(
                face,
                state,
                interest,
                delegation_index,
                timeslot,
                on_keys,
                on_error,
            );
        }
    }

    fn handle_nack(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ProducerState<S>>>,
        mut interest: Interest,
        delegation_index: usize,
        timeslot: Timeslot,
        on_keys: Option<OnEncryptedKeys>,
        on_error: OnError,
    ) {
        let Some(state_rc) = state.upgrade() else {
            return;
        };
        let link = state_rc.borrow().key_retrieval_link.clone();

        if !link.is_empty() {
            if interest.selected_delegation().is_none() {
                // The link was not used yet; attach it now.
                interest.set_link(link);
                interest.select_delegation(0);
                Self::send_key_interest(face, state, interest, 0, timeslot, on_keys, on_error);
                return;
            }
            let next = delegation_index + 1;
            if next < link.len() {
                interest.select_delegation(next);
                Self::send_key_interest(face, state, interest, next, timeslot, on_keys, on_error);
                return;
            }
        }

        // No options left for this node; give the slot up so the request can
        // complete with whatever the other nodes delivered.
        tracing::debug!(interest = %interest.name(), "giving up on E-KEY fetch");
        Self::update_key_request(&state_rc, timeslot.unix_millis(), &on_keys);
    }

    /// Reads `<begin>/<end>` off the tail of an E-KEY packet name.
    fn coverage_bounds(key_name: &Name) -> Result<(Timeslot, Timeslot), String> {
        let begin = key_name
            .component(-2)
            .ok_or_else(|| format!("E-KEY name {key_name} lacks coverage components"))
            .and_then(|component| {
                Timeslot::from_component(component).map_err(|err| err.to_string())
            })?;
        let end = key_name
            .component(-1)
            .ok_or_else(|| format!("E-KEY name {key_name} lacks coverage components"))
            .and_then(|component| {
                Timeslot::from_component(component).map_err(|err| err.to_string())
            })?;
        if begin > end {
            return Err(format!("E-KEY coverage bounds are inverted in {key_name}"));
        }
        Ok((begin, end))
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl<S: KeyStore + 'static> Producer<S> {
    /// E-KEY subscription names precomputed for this producer.
    pub fn ekey_nodes(&self) -> Vec<Name> {
        self.state.borrow().ekey_info.keys().cloned().collect()
    }

    /// Number of key requests still in flight.
    pub fn pending_key_requests(&self) -> usize {
        self.state.borrow().key_requests.len()
    }

    /// Runs `inspect` against the producer's key store.
    pub fn with_store<R>(&self, inspect: impl FnOnce(&S) -> R) -> R {
        inspect(&self.state.borrow().store)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::crypto::{aes, rsa, Rng};
    use crate::encrypted_content::{EncryptAlgorithm, EncryptedContent};
    use crate::error::noop_on_error;
    use crate::name::{Component, Name};
    use crate::packet::{Data, Link};
    use crate::store::{KeyStore, MemoryKeyStore};
    use crate::test_utils::{ekey_data, TestFace};
    use crate::timeslot::Timeslot;
    use crate::traits::{Face, FaceEvent, NullSigner};

    use super::{OnEncryptedKeys, Producer};

    fn producer(
        face: &Rc<TestFace>,
        data_type: &str,
        max_repeat_attempts: u8,
        link: Link,
    ) -> Producer<MemoryKeyStore> {
        Producer::new(
            face.clone() as Rc<dyn Face>,
            Name::from("/p"),
            Name::from(data_type),
            MemoryKeyStore::new(),
            Rc::new(NullSigner),
            max_repeat_attempts,
            link,
            Rng::from_seed([9; 32]),
        )
    }

    /// Collects every completed batch of wrapped content-key packets.
    fn key_collector() -> (Rc<RefCell<Vec<Vec<Data>>>>, OnEncryptedKeys) {
        let batches: Rc<RefCell<Vec<Vec<Data>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = batches.clone();
        let on_keys: OnEncryptedKeys = Rc::new(move |keys| sink.borrow_mut().push(keys.to_vec()));
        (batches, on_keys)
    }

    /// Answers every E-KEY interest with a key covering `[begin, end)`.
    fn serve_ekey(face: &Rc<TestFace>, begin: &str, end: &str, public_der: Vec<u8>) {
        let begin = begin.to_string();
        let end = end.to_string();
        face.set_responder(move |interest| {
            FaceEvent::Data(ekey_data(interest.name(), &begin, &end, &public_der))
        });
    }

    #[test]
    fn ekey_subscriptions_cover_every_data_type_prefix() {
        let face = Rc::new(TestFace::new());
        let producer = producer(&face, "/x/y", 3, Link::none());

        let nodes = producer.ekey_nodes();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.contains(&Name::from("/p/READ/x/E-KEY")));
        assert!(nodes.contains(&Name::from("/p/READ/x/y/E-KEY")));
    }

    #[test]
    fn content_keys_are_shared_per_hour_and_coverage_is_cached() {
        let face = Rc::new(TestFace::new());
        let pair = rsa::generate_keypair(2048).unwrap();
        serve_ekey(
            &face,
            "20240101T000000",
            "20240102T000000",
            pair.encrypt_key().to_vec(),
        );
        let producer = producer(&face, "/x", 3, Link::none());
        let (batches, on_keys) = key_collector();

        let t1 = Timeslot::from_iso("20240101T100500").unwrap();
        let name = producer.create_content_key(t1, Some(on_keys.clone()), noop_on_error());
        assert_eq!(name.to_string(), "/p/SAMPLE/x/C-KEY/20240101T100000");
        face.run();

        assert_eq!(face.sent_count(), 1);
        assert_eq!(batches.borrow().len(), 1);
        assert_eq!(batches.borrow()[0].len(), 1);
        assert_eq!(producer.pending_key_requests(), 0);

        // Same hour: the existing key is reused without any network or
        // crypto work.
        let t2 = Timeslot::from_iso("20240101T105500").unwrap();
        let name = producer.create_content_key(t2, Some(on_keys.clone()), noop_on_error());
        assert_eq!(name.to_string(), "/p/SAMPLE/x/C-KEY/20240101T100000");
        assert_eq!(face.sent_count(), 1);
        assert_eq!(batches.borrow().len(), 1);
        assert_eq!(producer.with_store(|store| store.content_key_count()), 1);

        // Next hour inside the cached coverage interval: a new key is
        // wrapped immediately, with zero interests.
        let t3 = Timeslot::from_iso("20240101T110500").unwrap();
        let name = producer.create_content_key(t3, Some(on_keys), noop_on_error());
        assert_eq!(name.to_string(), "/p/SAMPLE/x/C-KEY/20240101T110000");
        assert_eq!(face.sent_count(), 1);
        assert_eq!(batches.borrow().len(), 2);
        assert_eq!(producer.with_store(|store| store.content_key_count()), 2);

        let wrapped = &batches.borrow()[1][0];
        assert_eq!(wrapped.name().to_string(), "/p/SAMPLE/x/C-KEY/20240101T110000");
        let record = EncryptedContent::decode(wrapped.content()).unwrap();
        assert_eq!(
            record.key_locator().to_string(),
            "/p/READ/x/E-KEY/20240101T000000/20240102T000000"
        );
    }

    #[test]
    fn stale_ekey_triggers_a_narrowed_refetch() {
        let face = Rc::new(TestFace::new());
        let pair = rsa::generate_keypair(2048).unwrap();
        let public_der = pair.encrypt_key().to_vec();

        // First response covers an old period, the second covers the
        // requested timeslot.
        let mut responses = vec![
            ("20240103T000000", "20240104T000000"),
            ("20240101T000000", "20240102T000000"),
        ];
        face.set_responder(move |interest| {
            let (begin, end) = responses.pop().expect("at most two fetches");
            FaceEvent::Data(ekey_data(interest.name(), begin, end, &public_der))
        });

        let producer = producer(&face, "/x", 3, Link::none());
        let (batches, on_keys) = key_collector();

        let timeslot = Timeslot::from_iso("20240103T100000").unwrap();
        producer.create_content_key(timeslot, Some(on_keys), noop_on_error());
        face.run();

        let sent = face.sent();
        assert_eq!(sent.len(), 2);

        // The re-issued interest rules out everything up to the stale key's
        // begin and still asks for the rightmost child.
        let refetch = &sent[1];
        assert!(refetch.rightmost_child());
        assert!(refetch
            .exclude()
            .is_excluded(&Component::from("20240101T000000")));
        assert!(refetch
            .exclude()
            .is_excluded(&Component::from("20231230T000000")));
        assert!(!refetch
            .exclude()
            .is_excluded(&Component::from("20240103T000000")));

        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        let record = EncryptedContent::decode(batches[0][0].content()).unwrap();
        assert_eq!(
            record.key_locator().to_string(),
            "/p/READ/x/E-KEY/20240103T000000/20240104T000000"
        );
    }

    #[test]
    fn timeout_budget_is_max_repeat_attempts_plus_one() {
        let face = Rc::new(TestFace::new());
        // No responder: every interest times out.
        let producer = producer(&face, "/x", 2, Link::none());
        let (batches, on_keys) = key_collector();

        let timeslot = Timeslot::from_iso("20240101T100000").unwrap();
        producer.create_content_key(timeslot, Some(on_keys), noop_on_error());
        face.run();

        assert_eq!(face.sent_count(), 3);
        // The request still completes, with nothing wrapped.
        assert_eq!(batches.borrow().len(), 1);
        assert!(batches.borrow()[0].is_empty());
        assert_eq!(producer.pending_key_requests(), 0);
    }

    #[test]
    fn nack_walks_the_key_retrieval_link() {
        let face = Rc::new(TestFace::new());
        let pair = rsa::generate_keypair(2048).unwrap();
        let public_der = pair.encrypt_key().to_vec();

        // Delegation 1 is the only path that answers.
        face.set_responder(move |interest| match interest.selected_delegation() {
            Some(1) => FaceEvent::Data(ekey_data(
                interest.name(),
                "20240101T000000",
                "20240102T000000",
                &public_der,
            )),
            _ => FaceEvent::Nack,
        });

        let link = Link::new(vec![Name::from("/hub/a"), Name::from("/hub/b")]);
        let producer = producer(&face, "/x", 3, link);
        let (batches, on_keys) = key_collector();

        let timeslot = Timeslot::from_iso("20240101T100000").unwrap();
        producer.create_content_key(timeslot, Some(on_keys), noop_on_error());
        face.run();

        let sent = face.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].selected_delegation(), None);
        assert_eq!(sent[1].selected_delegation(), Some(0));
        assert_eq!(sent[2].selected_delegation(), Some(1));

        assert_eq!(batches.borrow().len(), 1);
        assert_eq!(batches.borrow()[0].len(), 1);
    }

    #[test]
    fn produce_shares_the_hourly_content_key() {
        let face = Rc::new(TestFace::new());
        let pair = rsa::generate_keypair(2048).unwrap();
        serve_ekey(
            &face,
            "20240101T000000",
            "20240102T000000",
            pair.encrypt_key().to_vec(),
        );
        let producer = producer(&face, "/x", 3, Link::none());

        let t1 = Timeslot::from_iso("20240101T100500").unwrap();
        let first = producer.produce(t1, b"hello", noop_on_error()).unwrap();
        face.run();

        assert_eq!(first.name().to_string(), "/p/SAMPLE/x/20240101T100500");
        assert!(first.signature().is_some());

        let record = EncryptedContent::decode(first.content()).unwrap();
        assert_eq!(record.algorithm(), EncryptAlgorithm::AesCbc);
        assert_eq!(
            record.key_locator().to_string(),
            "/p/SAMPLE/x/C-KEY/20240101T100000"
        );

        let content_key = producer
            .with_store(|store| store.get_content_key(t1).unwrap())
            .unwrap();
        let plaintext = aes::decrypt(
            &content_key,
            record.payload(),
            record.initial_vector().unwrap(),
        )
        .unwrap();
        assert_eq!(plaintext, b"hello");

        // A later timeslot in the same hour signs under the same key row.
        let t2 = Timeslot::from_iso("20240101T105500").unwrap();
        let second = producer.produce(t2, b"world", noop_on_error()).unwrap();
        let record = EncryptedContent::decode(second.content()).unwrap();
        assert_eq!(
            record.key_locator().to_string(),
            "/p/SAMPLE/x/C-KEY/20240101T100000"
        );
        assert_eq!(producer.with_store(|store| store.content_key_count()), 1);

        let plaintext = aes::decrypt(
            &content_key,
            record.payload(),
            record.initial_vector().unwrap(),
        )
        .unwrap();
        assert_eq!(plaintext, b"world");
    }

    #[test]
    fn late_events_after_completion_are_ignored() {
        let face = Rc::new(TestFace::new());
        let producer = producer(&face, "/x", 0, Link::none());
        let (batches, on_keys) = key_collector();

        let timeslot = Timeslot::from_iso("20240101T100000").unwrap();
        producer.create_content_key(timeslot, Some(on_keys.clone()), noop_on_error());
        face.run();
        assert_eq!(batches.borrow().len(), 1);

        // A second run delivers nothing further and the completed request
        // stays gone.
        face.run();
        assert_eq!(batches.borrow().len(), 1);
        assert_eq!(producer.pending_key_requests(), 0);
    }
}
