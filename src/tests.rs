// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios driving a producer and a consumer against scripted
//! faces.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::crypto::{rsa, Rng};
use crate::name::components;
use crate::store::MemoryKeyStore;
use crate::test_utils::{dkey_packet, ekey_data, TestFace};
use crate::traits::{Face, FaceEvent, NullSigner};
use crate::{
    noop_on_error, Consumer, Data, EncryptedContent, ErrorCode, Link, Name, Producer, Timeslot,
};

const GROUP: &str = "/g";
const CONSUMER: &str = "/c";
const CONSUMER_KEY: &str = "/c/key";

fn make_producer(face: &Rc<TestFace>) -> Producer<MemoryKeyStore> {
    Producer::new(
        face.clone() as Rc<dyn Face>,
        Name::from("/p"),
        Name::from("/x/y"),
        MemoryKeyStore::new(),
        Rc::new(NullSigner),
        3,
        Link::none(),
        Rng::from_seed([1; 32]),
    )
}

fn make_consumer(face: &Rc<TestFace>, consumer_pair: &rsa::RsaKeyPair) -> Consumer<MemoryKeyStore> {
    let consumer = Consumer::new(
        face.clone() as Rc<dyn Face>,
        Name::from(GROUP),
        Name::from(CONSUMER),
        MemoryKeyStore::new(),
    );
    consumer
        .add_decryption_key(&Name::from(CONSUMER_KEY), consumer_pair.decrypt_key())
        .unwrap();
    consumer
}

/// Publishes the producer's output the way the group's repo would: content
/// under its own name, wrapped C-KEYs under `<cKeyName>/FOR/<group>`, and a
/// D-KEY packet per namespace node under `<dKeyName>/FOR/<consumer>`.
fn publish(
    content: &Data,
    wrapped_keys: &[Data],
    group_pair: &rsa::RsaKeyPair,
    consumer_pair: &rsa::RsaKeyPair,
) -> HashMap<Name, Data> {
    let mut network = HashMap::new();
    network.insert(content.name().clone(), content.clone());

    for packet in wrapped_keys {
        let republished = packet
            .name()
            .clone()
            .append(components::FOR)
            .append_name(&Name::from(GROUP));
        network.insert(
            republished.clone(),
            Data::new(republished, packet.content().to_vec()),
        );
    }

    let rng = Rng::from_seed([2; 32]);
    for base in ["/p/READ/x/y", "/p/READ/x"] {
        let dkey_interest = Name::from(base)
            .append(components::D_KEY)
            .append("20240101T000000")
            .append("20240102T000000")
            .append(components::FOR)
            .append_name(&Name::from(CONSUMER));
        let packet = dkey_packet(
            dkey_interest.clone(),
            &Name::from(CONSUMER_KEY),
            consumer_pair.encrypt_key(),
            group_pair.decrypt_key(),
            &rng,
        );
        network.insert(dkey_interest, packet);
    }
    network
}

fn serve(face: &Rc<TestFace>, network: HashMap<Name, Data>) {
    face.set_responder(move |interest| match network.get(interest.name()) {
        Some(data) => FaceEvent::Data(data.clone()),
        None => FaceEvent::Nack,
    });
}

#[test]
fn produce_then_consume_recovers_the_plaintext() {
    let group_pair = rsa::generate_keypair(2048).unwrap();
    let consumer_pair = rsa::generate_keypair(2048).unwrap();

    // Producer side: the group manager answers E-KEY interests with a key
    // covering the whole day.
    let producer_face = Rc::new(TestFace::new());
    {
        let public_der = group_pair.encrypt_key().to_vec();
        producer_face.set_responder(move |interest| {
            FaceEvent::Data(ekey_data(
                interest.name(),
                "20240101T000000",
                "20240102T000000",
                &public_der,
            ))
        });
    }
    let producer = make_producer(&producer_face);

    let wrapped: Rc<RefCell<Vec<Data>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = wrapped.clone();
    let timeslot = Timeslot::from_iso("20240101T101500").unwrap();
    producer.create_content_key(
        timeslot,
        Some(Rc::new(move |keys: &[Data]| {
            sink.borrow_mut().extend(keys.iter().cloned())
        })),
        noop_on_error(),
    );
    producer_face.run();

    let content = producer.produce(timeslot, b"hello", noop_on_error()).unwrap();
    assert_eq!(content.name().to_string(), "/p/SAMPLE/x/y/20240101T101500");
    // One wrapped C-KEY per E-KEY namespace node.
    assert_eq!(wrapped.borrow().len(), 2);

    // Consumer side.
    let network = publish(&content, &wrapped.borrow(), &group_pair, &consumer_pair);
    let consumer_face = Rc::new(TestFace::new());
    serve(&consumer_face, network);
    let consumer = make_consumer(&consumer_face, &consumer_pair);

    let plaintexts: Rc<RefCell<Vec<Vec<u8>>>> = Rc::new(RefCell::new(Vec::new()));
    let errors: Rc<RefCell<Vec<(ErrorCode, String)>>> = Rc::new(RefCell::new(Vec::new()));
    {
        let plaintexts = plaintexts.clone();
        let errors = errors.clone();
        consumer.consume(
            Name::from("/p/SAMPLE/x/y/20240101T101500"),
            Box::new(move |data, plaintext| {
                assert_eq!(data.name().to_string(), "/p/SAMPLE/x/y/20240101T101500");
                plaintexts.borrow_mut().push(plaintext.to_vec());
            }),
            Rc::new(move |code, message| errors.borrow_mut().push((code, message))),
            Link::none(),
        );
    }
    consumer_face.run();

    assert!(errors.borrow().is_empty(), "errors: {:?}", errors.borrow());
    assert_eq!(plaintexts.borrow().as_slice(), &[b"hello".to_vec()]);
}

#[test]
fn same_hour_publications_share_one_content_key() {
    let group_pair = rsa::generate_keypair(2048).unwrap();

    let producer_face = Rc::new(TestFace::new());
    {
        let public_der = group_pair.encrypt_key().to_vec();
        producer_face.set_responder(move |interest| {
            FaceEvent::Data(ekey_data(
                interest.name(),
                "20240101T000000",
                "20240102T000000",
                &public_der,
            ))
        });
    }
    let producer = make_producer(&producer_face);

    let five_past = Timeslot::from_iso("20240101T100500").unwrap();
    let five_to = Timeslot::from_iso("20240101T105500").unwrap();
    let first = producer.produce(five_past, b"one", noop_on_error()).unwrap();
    producer_face.run();
    let second = producer.produce(five_to, b"two", noop_on_error()).unwrap();

    // One C-KEY row covers the hour; both packets point at it and both are
    // signed.
    assert_eq!(producer.with_store(|store| store.content_key_count()), 1);
    assert!(first.signature().is_some());
    assert!(second.signature().is_some());
    for packet in [&first, &second] {
        let record = EncryptedContent::decode(packet.content()).unwrap();
        assert_eq!(
            record.key_locator().to_string(),
            "/p/SAMPLE/x/y/C-KEY/20240101T100000"
        );
    }
}
