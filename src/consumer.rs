// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumer side of the protocol: a three-stage asynchronous decryption
//! pipeline.
//!
//! Stage 1 fetches the encrypted content; its key locator names the C-KEY.
//! Stage 2 fetches the C-KEY wrapped for the group; its locator names the
//! E-KEY, from which the D-KEY name is derived. Stage 3 fetches the
//! two-block D-KEY packet and unwraps it with the consumer's own key. Keys
//! recovered along the way are cached, so later content sharing a C-KEY or
//! D-KEY decrypts without extra round-trips.
//!
//! All continuations hold a weak reference back to the consumer state;
//! dropping the [`Consumer`] orphans in-flight stages instead of reviving
//! freed state.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use thiserror::Error;

use crate::crypto::{aes, rsa, SecretBytes};
use crate::encrypted_content::{EncryptAlgorithm, EncryptedContent};
use crate::error::{ErrorCode, OnError};
use crate::name::{components, Name};
use crate::packet::{Data, Interest, Link};
use crate::store::KeyStore;
use crate::traits::{schedule_paced, DataValidator, Face, FaceEvent, NullValidator};

/// Retry budget for freshly issued interests; link-fallback re-issues get
/// none.
const INITIAL_RETRIALS: u32 = 1;

/// Invoked with the validated content packet and the recovered plaintext.
pub type OnPlaintext = Box<dyn FnOnce(&Data, &[u8])>;

type OnValidated = Box<dyn FnOnce(Data)>;

type OnKeyBits = Box<dyn FnOnce(SecretBytes)>;

/// Consumer of group-encrypted content.
pub struct Consumer<S> {
    face: Rc<dyn Face>,
    state: Rc<RefCell<ConsumerState<S>>>,
}

struct ConsumerState<S> {
    group_name: Name,
    consumer_name: Name,
    store: S,
    validator: Rc<dyn DataValidator>,
    ckey_link: Link,
    dkey_link: Link,
    ckey_cache: HashMap<Name, SecretBytes>,
    dkey_cache: HashMap<Name, SecretBytes>,
}

impl<S: KeyStore + 'static> Consumer<S> {
    pub fn new(face: Rc<dyn Face>, group_name: Name, consumer_name: Name, store: S) -> Self {
        Self {
            face,
            state: Rc::new(RefCell::new(ConsumerState {
                group_name,
                consumer_name,
                store,
                validator: Rc::new(NullValidator),
                ckey_link: Link::none(),
                dkey_link: Link::none(),
                ckey_cache: HashMap::new(),
                dkey_cache: HashMap::new(),
            })),
        }
    }

    /// Replaces the default accept-all validator.
    pub fn with_validator(self, validator: Rc<dyn DataValidator>) -> Self {
        self.state.borrow_mut().validator = validator;
        self
    }

    /// Sets the fallback links used for C-KEY and D-KEY interests.
    pub fn with_links(self, ckey_link: Link, dkey_link: Link) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.ckey_link = ckey_link;
            state.dkey_link = dkey_link;
        }
        self
    }

    /// Replaces the group this consumer fetches C-KEYs for.
    pub fn set_group(&self, group_name: Name) {
        self.state.borrow_mut().group_name = group_name;
    }

    /// Persists a decryption key provisioned to this consumer. The key name
    /// must lie under the consumer's namespace.
    pub fn add_decryption_key(&self, key_name: &Name, bits: &[u8]) -> Result<(), ConsumerError> {
        let mut state = self.state.borrow_mut();
        if !state.consumer_name.is_prefix_of(key_name) {
            return Err(ConsumerError::KeyOutsideNamespace {
                consumer: state.consumer_name.clone(),
                key: key_name.clone(),
            });
        }
        state
            .store
            .add_key(key_name, bits)
            .map_err(|err| ConsumerError::Store(err.to_string()))
    }

    /// Fetches, validates and decrypts the content under `content_name`,
    /// delivering the plaintext to `on_plaintext` or a failure to
    /// `on_error`. `delegations` is the fallback link for the content
    /// interest itself.
    pub fn consume(
        &self,
        content_name: Name,
        on_plaintext: OnPlaintext,
        on_error: OnError,
        delegations: Link,
    ) {
        let face = self.face.clone();
        let state = Rc::downgrade(&self.state);

        let stage_face = face.clone();
        let stage_state = state.clone();
        let stage_error = on_error.clone();
        let on_validated: OnValidated = Box::new(move |data| {
            Self::decrypt_content(stage_face, stage_state, data, on_plaintext, stage_error);
        });

        Self::send_interest(
            face,
            state,
            Interest::new(content_name),
            INITIAL_RETRIALS,
            delegations,
            0,
            on_validated,
            on_error,
        );
    }

    /// Stage 1: the content packet arrived; find its C-KEY.
    fn decrypt_content(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ConsumerState<S>>>,
        data: Data,
        on_plaintext: OnPlaintext,
        on_error: OnError,
    ) {
        let record = match EncryptedContent::decode(data.content()) {
            Ok(record) => record,
            Err(err) => {
                on_error(ErrorCode::InvalidEncryptedFormat, err.to_string());
                return;
            }
        };
        let ckey_name = record.key_locator().clone();

        let Some(state_rc) = state.upgrade() else {
            return;
        };
        let (cached, group_name, ckey_link) = {
            let st = state_rc.borrow();
            (
                st.ckey_cache.get(&ckey_name).cloned(),
                st.group_name.clone(),
                st.ckey_link.clone(),
            )
        };

        if let Some(ckey) = cached {
            Self::decrypt(
                &record,
                ckey.as_bytes(),
                |plaintext| on_plaintext(&data, &plaintext),
                &on_error,
            );
            return;
        }

        let interest_name = ckey_name
            .clone()
            .append(components::FOR)
            .append_name(&group_name);

        let next_face = face.clone();
        let next_state = state.clone();
        let next_error = on_error.clone();
        let on_validated: OnValidated = Box::new(move |ckey_data| {
            let cache_state = next_state.clone();
            let finish_error = next_error.clone();
            let on_ckey: OnKeyBits = Box::new(move |ckey_bits| {
                if let Some(state_rc) = cache_state.upgrade() {
                    state_rc
                        .borrow_mut()
                        .ckey_cache
                        .insert(ckey_name, ckey_bits.clone());
                }
                Self::decrypt(
                    &record,
                    ckey_bits.as_bytes(),
                    |plaintext| on_plaintext(&data, &plaintext),
                    &finish_error,
                );
            });
            Self::decrypt_ckey(next_face, next_state, ckey_data, on_ckey, next_error);
        });

        Self::send_interest(
            face,
            state,
            Interest::new(interest_name),
            INITIAL_RETRIALS,
            ckey_link,
            0,
            on_validated,
            on_error,
        );
    }

    /// Stage 2: the wrapped C-KEY arrived; find the D-KEY that unwraps it.
    fn decrypt_ckey(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ConsumerState<S>>>,
        ckey_data: Data,
        on_key: OnKeyBits,
        on_error: OnError,
    ) {
        let record = match EncryptedContent::decode(ckey_data.content()) {
            Ok(record) => record,
            Err(err) => {
                on_error(ErrorCode::InvalidEncryptedFormat, err.to_string());
                return;
            }
        };

        // The E-KEY name ends in `E-KEY/<begin>/<end>`; the matching D-KEY
        // swaps the marker and keeps the coverage bounds.
        let ekey_name = record.key_locator().clone();
        let dkey_name = ekey_name
            .prefix(-3)
            .append(components::D_KEY)
            .append_name(&ekey_name.suffix(2));

        let Some(state_rc) = state.upgrade() else {
            return;
        };
        let (cached, consumer_name, dkey_link) = {
            let st = state_rc.borrow();
            (
                st.dkey_cache.get(&dkey_name).cloned(),
                st.consumer_name.clone(),
                st.dkey_link.clone(),
            )
        };

        if let Some(dkey) = cached {
            Self::decrypt(
                &record,
                dkey.as_bytes(),
                |bits| on_key(SecretBytes::from_bytes(bits)),
                &on_error,
            );
            return;
        }

        let interest_name = dkey_name
            .clone()
            .append(components::FOR)
            .append_name(&consumer_name);

        let next_state = state.clone();
        let next_error = on_error.clone();
        let on_validated: OnValidated = Box::new(move |dkey_data| {
            let cache_state = next_state.clone();
            let finish_error = next_error.clone();
            let on_dkey: OnKeyBits = Box::new(move |dkey_bits| {
                if let Some(state_rc) = cache_state.upgrade() {
                    state_rc
                        .borrow_mut()
                        .dkey_cache
                        .insert(dkey_name, dkey_bits.clone());
                }
                Self::decrypt(
                    &record,
                    dkey_bits.as_bytes(),
                    |bits| on_key(SecretBytes::from_bytes(bits)),
                    &finish_error,
                );
            });
            Self::decrypt_dkey(next_state, dkey_data, on_dkey, next_error);
        });

        Self::send_interest(
            face,
            state,
            Interest::new(interest_name),
            INITIAL_RETRIALS,
            dkey_link,
            0,
            on_validated,
            on_error,
        );
    }

    /// Stage 3: unwrap the two-block D-KEY packet with the consumer's own
    /// key.
    fn decrypt_dkey(
        state: Weak<RefCell<ConsumerState<S>>>,
        dkey_data: Data,
        on_key: OnKeyBits,
        on_error: OnError,
    ) {
        let blocks = match EncryptedContent::decode_all(dkey_data.content()) {
            Ok(blocks) => blocks,
            Err(err) => {
                on_error(ErrorCode::InvalidEncryptedFormat, err.to_string());
                return;
            }
        };
        let Ok([nonce_block, payload_block]) = <[EncryptedContent; 2]>::try_from(blocks) else {
            on_error(
                ErrorCode::InvalidEncryptedFormat,
                "data packet does not satisfy the D-KEY packet format".to_string(),
            );
            return;
        };

        let consumer_key_name = nonce_block.key_locator().clone();
        let Some(state_rc) = state.upgrade() else {
            return;
        };
        let lookup = state_rc.borrow().store.get_key(&consumer_key_name);
        let consumer_key = match lookup {
            Ok(Some(bits)) => bits,
            Ok(None) => {
                on_error(
                    ErrorCode::NoDecryptKey,
                    format!("no decryption key {consumer_key_name} in store"),
                );
                return;
            }
            Err(err) => {
                on_error(ErrorCode::General, err.to_string());
                return;
            }
        };

        // First the nonce under the consumer key, then the payload under the
        // nonce.
        let inner_error = on_error.clone();
        Self::decrypt(
            &nonce_block,
            &consumer_key,
            move |nonce| {
                Self::decrypt(
                    &payload_block,
                    &nonce,
                    |bits| on_key(SecretBytes::from_bytes(bits)),
                    &inner_error,
                );
            },
            &on_error,
        );
    }

    /// Decrypts one record, dispatching on its wire algorithm.
    fn decrypt(
        record: &EncryptedContent,
        key_bits: &[u8],
        on_plaintext: impl FnOnce(Vec<u8>),
        on_error: &OnError,
    ) {
        let result = match record.algorithm() {
            EncryptAlgorithm::AesCbc => {
                // Decoding guarantees AES records carry an IV.
                let iv = record.initial_vector().unwrap_or_default();
                aes::decrypt(key_bits, record.payload(), iv)
            }
            EncryptAlgorithm::RsaOaep => {
                rsa::decrypt(key_bits, record.payload(), EncryptAlgorithm::RsaOaep)
            }
            other => {
                on_error(
                    ErrorCode::UnsupportedEncryptionScheme,
                    format!("{}", other.id()),
                );
                return;
            }
        };
        match result {
            Ok(plaintext) => on_plaintext(plaintext),
            Err(err) => on_error(ErrorCode::EncryptionFailure, err.to_string()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn send_interest(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ConsumerState<S>>>,
        interest: Interest,
        n_retrials: u32,
        delegations: Link,
        delegation_index: usize,
        on_validated: OnValidated,
        on_error: OnError,
    ) {
        tracing::debug!(interest = %interest.name(), retries_left = n_retrials, "expressing interest");
        schedule_paced(face, move |face| {
            let response_face = face.clone();
            face.express_interest(
                interest,
                Box::new(move |interest, event| match event {
                    FaceEvent::Data(data) => {
                        Self::handle_data(state, interest, data, on_validated, on_error)
                    }
                    FaceEvent::Timeout => Self::handle_timeout(
                        response_face,
                        state,
                        interest,
                        n_retrials,
                        delegations,
                        delegation_index,
                        on_validated,
                        on_error,
                    ),
                    FaceEvent::Nack => Self::handle_nack(
                        response_face,
                        state,
                        interest,
                        delegations,
                        delegation_index,
                        on_validated,
                        on_error,
                    ),
                }),
            );
        });
    }

    fn handle_data(
        state: Weak<RefCell<ConsumerState<S>>>,
        interest: Interest,
        data: Data,
        on_validated: OnValidated,
        on_error: OnError,
    ) {
        if !interest.matches_data(&data) {
            tracing::warn!(interest = %interest.name(), data = %data.name(), "ignoring mismatched data");
            return;
        }
        let Some(state_rc) = state.upgrade() else {
            return;
        };
        let validator = state_rc.borrow().validator.clone();
        match validator.validate(&data) {
            Ok(()) => on_validated(data),
            Err(err) => on_error(ErrorCode::Validation, err.to_string()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_timeout(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ConsumerState<S>>>,
        interest: Interest,
        n_retrials: u32,
        delegations: Link,
        delegation_index: usize,
        on_validated: OnValidated,
        on_error: OnError,
    ) {
        if n_retrials > 0 {
            Self::send_interest(
                face,
                state,
                interest,
                n_retrials - 1,
                delegations,
                delegation_index,
                on_validated,
                on_error,
            );
        } else {
            // A timed-out retry budget is treated like a NACK.
            Self::handle_nack(
                face,
                state,
                interest,
                delegations,
                delegation_index,
                on_validated,
                on_error,
            );
        }
    }

    fn handle_nack(
        face: Rc<dyn Face>,
        state: Weak<RefCell<ConsumerState<S>>>,
        mut interest: Interest,
        delegations: Link,
        delegation_index: usize,
        on_validated: OnValidated,
        on_error: OnError,
    ) {
        if !delegations.is_empty() {
            if interest.selected_delegation().is_none() {
                // The link was not used yet; attach it now.
                interest.set_link(delegations.clone());
                interest.select_delegation(0);
                Self::send_interest(face, state, interest, 0, delegations, 0, on_validated, on_error);
                return;
            }
            let next = delegation_index + 1;
            if next < delegations.len() {
                interest.select_delegation(next);
                Self::send_interest(
                    face,
                    state,
                    interest,
                    0,
                    delegations,
                    next,
                    on_validated,
                    on_error,
                );
                return;
            }
        }

        // We ran out of options.
        tracing::debug!(interest = %interest.name(), "retrieval failed");
        on_error(ErrorCode::DataRetrievalFailure, interest.name().to_string());
    }
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("key name {key} is outside the consumer namespace {consumer}")]
    KeyOutsideNamespace { consumer: Name, key: Name },

    #[error("key store error: {0}")]
    Store(String),
}
