//! Randomized round-trip tests for the value store.
//!
//! Every test builds value trees from a fixed seed, walks them, transfers
//! them to another owner and removes them again, checking the slab count
//! and byte footprint of the store against the baseline taken before
//! anything was built.

use strata_runtime::config::{RuntimeConfig, ENUM_RAW_VALUE_FIELD_NAME};
use strata_runtime::storage::StorageStats;
use strata_runtime::types::{
    Address, CompositeKind, CompositeTypeInfo, Location, PrimitiveType, StaticType, TypeId,
};
use strata_runtime::value::{
    ArrayValue, CompositeField, CompositeValue, DictionaryValue, IntegerKind,
};
use strata_runtime::workload::{Generator, ValueMap, WorkloadConfig};
use strata_runtime::{Session, Value};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const SEEDS: [u64; 4] = [1, 7, 42, 1_000_003];

fn owner_a() -> Option<Address> {
    Some(Address::from_bytes(b"A").expect("address"))
}

fn owner_b() -> Option<Address> {
    Some(Address::from_bytes(b"B").expect("address"))
}

fn stats(session: &Session) -> StorageStats {
    session.stats().expect("stats")
}

/// A small inline threshold so that externalized leaves show up in every
/// container.
fn tight_session() -> Session {
    Session::with_config(RuntimeConfig {
        max_inline_size: 64,
        ..RuntimeConfig::default()
    })
}

fn string_to_int64() -> StaticType {
    StaticType::dictionary(
        StaticType::Primitive(PrimitiveType::String),
        StaticType::Primitive(PrimitiveType::Int64),
    )
}

// ---------------------------------------------------------------------------
// Dictionaries
// ---------------------------------------------------------------------------

#[test]
fn dictionary_round_trip() {
    for seed in SEEDS {
        let mut session = tight_session();
        let mut generator = Generator::new(seed, WorkloadConfig::small());
        let baseline = stats(&session);

        let mut expected = ValueMap::new();
        let mut entries = Vec::new();
        for _ in 0..generator.int_up_to(40) {
            let key = generator.hashable_value(&mut session, owner_a()).expect("key");
            let value = generator
                .storable_value(&mut session, owner_a(), 0)
                .expect("value");
            expected.put(&mut session, &key, &value).expect("mirror");
            entries.push((key, value));
        }

        let dictionary = DictionaryValue::new(
            &mut session,
            StaticType::dictionary(StaticType::any_struct(), StaticType::any_struct()),
            owner_a(),
            entries,
        )
        .expect("dictionary");
        assert_eq!(dictionary.count(&session).expect("count"), expected.len());

        // Every mirrored entry is found, and equal.
        for (key, value) in expected.iter() {
            let stored = dictionary
                .get(&session, key)
                .expect("get")
                .expect("present");
            assert!(stored.equal(&session, value).expect("equal"), "seed {seed}");
        }

        // Iteration visits exactly the mirrored keys.
        let mut visited = 0;
        for entry in dictionary.iter(&session).expect("iter") {
            let (key, value) = entry.expect("entry");
            let mirrored = expected.get(&session, &key).expect("lookup").expect("known key");
            assert!(mirrored.equal(&session, &value).expect("equal"));
            visited += 1;
        }
        assert_eq!(visited, expected.len());

        // Transfer, then remove both trees.
        let copy = Value::Dictionary(dictionary)
            .transfer(&mut session, owner_b(), false)
            .expect("transfer");
        assert!(copy
            .equal(&session, &Value::Dictionary(dictionary))
            .expect("equal"));
        assert_eq!(copy.owner(), owner_b());

        copy.deep_remove(&mut session).expect("remove copy");
        Value::Dictionary(dictionary)
            .deep_remove(&mut session)
            .expect("remove original");
        expected.clear(&mut session).expect("clear mirror");

        assert_eq!(stats(&session), baseline, "seed {seed}");
    }
}

#[test]
fn dictionary_insert_remove_is_an_inverse() {
    for seed in SEEDS {
        let mut session = tight_session();
        let mut generator = Generator::new(seed, WorkloadConfig::small());
        let dictionary = DictionaryValue::new(
            &mut session,
            StaticType::dictionary(StaticType::any_struct(), StaticType::any_struct()),
            owner_a(),
            vec![],
        )
        .expect("dictionary");

        for _ in 0..50 {
            let baseline = stats(&session);
            let key = generator.hashable_value(&mut session, None).expect("key");
            let value = generator.storable_value(&mut session, None, 0).expect("value");
            assert!(!dictionary.contains_key(&session, &key).expect("contains"));

            let lookup = key.deep_copy(&mut session).expect("lookup key");
            let reference = value.deep_copy(&mut session).expect("reference");

            assert!(dictionary
                .insert(&mut session, key, value)
                .expect("insert")
                .is_none());
            let removed = dictionary
                .remove(&mut session, &lookup)
                .expect("remove")
                .expect("present");
            assert!(removed.equal(&session, &reference).expect("equal"));

            removed.deep_remove(&mut session).expect("cleanup");
            lookup.deep_remove(&mut session).expect("cleanup");
            reference.deep_remove(&mut session).expect("cleanup");
            assert_eq!(stats(&session), baseline, "seed {seed}");
        }
    }
}

#[test]
fn dictionary_overwrite_returns_prior_value() {
    let mut session = Session::in_memory();
    let dictionary = DictionaryValue::new(&mut session, string_to_int64(), owner_a(), vec![])
        .expect("dictionary");

    let prior = dictionary
        .insert(&mut session, "k".into(), Value::Int64(1))
        .expect("insert");
    assert!(prior.is_none());

    let prior = dictionary
        .insert(&mut session, "k".into(), Value::Int64(2))
        .expect("insert");
    assert!(matches!(prior, Some(Value::Int64(1))));
    assert_eq!(dictionary.count(&session).expect("count"), 1);
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

#[test]
fn array_round_trip() {
    for seed in SEEDS {
        let mut session = tight_session();
        let mut generator = Generator::new(seed, WorkloadConfig::small());
        let baseline = stats(&session);

        let count = generator.int_up_to(40);
        let array = generator
            .array_of_size(&mut session, owner_a(), 0, count)
            .expect("array");
        assert_eq!(array.count(&session).expect("count"), count);

        // Two walks produce the same sequence.
        let first: Vec<Value> = array
            .iter(&session)
            .expect("iter")
            .collect::<Result<_, _>>()
            .expect("elements");
        let second: Vec<Value> = array
            .iter(&session)
            .expect("iter")
            .collect::<Result<_, _>>()
            .expect("elements");
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert!(a.equal(&session, b).expect("equal"));
        }

        let footprint = stats(&session);
        let copy = Value::Array(array)
            .transfer(&mut session, owner_b(), false)
            .expect("transfer");
        assert!(copy.equal(&session, &Value::Array(array)).expect("equal"));
        assert_eq!(stats(&session).slab_count, footprint.slab_count * 2 - baseline.slab_count);

        copy.deep_remove(&mut session).expect("remove copy");
        assert_eq!(stats(&session), footprint, "transfer touched the source");

        Value::Array(array).deep_remove(&mut session).expect("remove");
        assert_eq!(stats(&session), baseline, "seed {seed}");
    }
}

#[test]
fn array_mutation_conserves_storage() {
    let mut session = tight_session();
    let mut generator = Generator::new(99, WorkloadConfig::small());
    let baseline = stats(&session);

    let array = ArrayValue::new(
        &mut session,
        StaticType::variable_sized(StaticType::any_struct()),
        owner_a(),
        vec![],
    )
    .expect("array");

    for i in 0..60 {
        let value = generator.storable_value(&mut session, None, 1).expect("value");
        let count = array.count(&session).expect("count");
        match i % 4 {
            0 | 1 => array.append(&mut session, value).expect("append"),
            2 => array
                .insert(&mut session, generator.int_up_to(count), value)
                .expect("insert"),
            _ if count > 0 => {
                array
                    .set(&mut session, generator.int_up_to(count - 1), value)
                    .expect("set");
                let removed = array
                    .remove(&mut session, generator.int_up_to(count - 1))
                    .expect("remove");
                removed.deep_remove(&mut session).expect("cleanup");
            }
            _ => value.deep_remove(&mut session).expect("cleanup"),
        }
    }

    Value::Array(array).deep_remove(&mut session).expect("remove");
    assert_eq!(stats(&session), baseline);
}

// ---------------------------------------------------------------------------
// Composites
// ---------------------------------------------------------------------------

#[test]
fn composite_round_trip() {
    for seed in SEEDS {
        let mut session = tight_session();
        let mut generator = Generator::new(seed, WorkloadConfig::small());
        let baseline = stats(&session);

        let composite = generator
            .composite_with_fields(&mut session, CompositeKind::Resource, owner_a(), 0, 8)
            .expect("composite");

        let names = composite.field_names(&session).expect("names");
        let mut visited = Vec::new();
        composite
            .for_each_field(&session, |name, _| {
                visited.push(name.to_string());
                true
            })
            .expect("for each");
        assert_eq!(visited, names);

        let copy = Value::Composite(composite)
            .transfer(&mut session, owner_b(), false)
            .expect("transfer");
        assert!(copy
            .equal(&session, &Value::Composite(composite))
            .expect("equal"));

        // Removing fields one by one from the copy leaves the original alone.
        let Value::Composite(copy) = copy else {
            panic!("transfer changed the kind");
        };
        for name in &names {
            copy.remove_field(&mut session, name).expect("remove field");
            assert!(copy.get_field(&session, name).expect("get").is_none());
        }
        assert_eq!(copy.field_count(&session).expect("count"), 0);
        assert_eq!(
            composite.field_count(&session).expect("count"),
            names.len()
        );

        Value::Composite(copy).deep_remove(&mut session).expect("remove copy");
        Value::Composite(composite)
            .deep_remove(&mut session)
            .expect("remove original");
        assert_eq!(stats(&session), baseline, "seed {seed}");
    }
}

#[test]
fn every_kind_survives_a_transfer() {
    let mut session = tight_session();
    let mut generator = Generator::new(2024, WorkloadConfig::small());
    let baseline = stats(&session);

    for _ in 0..200 {
        let value = generator.storable_value(&mut session, owner_a(), 0).expect("value");
        let copy = value.transfer(&mut session, owner_b(), false).expect("transfer");
        assert!(copy.equal(&session, &value).expect("equal"), "{}", value.kind_name());
        if value.storage_id().is_some() {
            assert_eq!(copy.owner(), owner_b());
            assert_ne!(copy.storage_id(), value.storage_id());
        }
        copy.deep_remove(&mut session).expect("remove copy");
        value.deep_remove(&mut session).expect("remove");
    }
    assert_eq!(stats(&session), baseline);
}

#[test]
fn move_within_the_same_owner_keeps_the_handle() {
    let mut session = Session::in_memory();
    let mut generator = Generator::new(5, WorkloadConfig::small());
    let array = generator
        .array_of_size(&mut session, owner_a(), 0, 3)
        .expect("array");
    let footprint = stats(&session);

    let moved = session
        .move_value(Value::Array(array), owner_a())
        .expect("move");
    assert_eq!(moved.storage_id(), Some(array.storage_id()));
    assert_eq!(stats(&session), footprint);

    let moved = session.move_value(moved, owner_b()).expect("move");
    assert_eq!(moved.owner(), owner_b());
    assert_eq!(stats(&session).slab_count, footprint.slab_count);
    moved.deep_remove(&mut session).expect("remove");
}

// ---------------------------------------------------------------------------
// Re-storing values read back from a parent
// ---------------------------------------------------------------------------

fn int64_array(session: &mut Session, values: &[i64]) -> Value {
    ArrayValue::new(
        session,
        StaticType::variable_sized(StaticType::Primitive(PrimitiveType::Int64)),
        None,
        values.iter().map(|n| Value::Int64(*n)).collect(),
    )
    .map(Value::Array)
    .expect("array")
}

fn nested_int64() -> StaticType {
    StaticType::variable_sized(StaticType::variable_sized(StaticType::Primitive(
        PrimitiveType::Int64,
    )))
}

#[test]
fn nested_value_appended_elsewhere_outlives_its_parent() {
    let mut session = Session::in_memory();
    let baseline = stats(&session);

    let inner = int64_array(&mut session, &[1, 2, 3]);
    let outer =
        ArrayValue::new(&mut session, nested_int64(), owner_a(), vec![inner]).expect("outer");
    let other = ArrayValue::new(&mut session, nested_int64(), owner_a(), vec![]).expect("other");

    let element = outer.get(&session, 0).expect("get");
    other.append(&mut session, element).expect("append");
    assert_eq!(stats(&session).slab_count, 4);

    Value::Array(outer).deep_remove(&mut session).expect("remove outer");
    let Value::Array(copy) = other.get(&session, 0).expect("get") else {
        panic!("element changed kind");
    };
    assert_eq!(copy.count(&session).expect("count"), 3);
    assert!(matches!(copy.get(&session, 2).expect("get"), Value::Int64(3)));

    Value::Array(other).deep_remove(&mut session).expect("remove other");
    assert_eq!(stats(&session), baseline);
}

#[test]
fn array_element_set_from_a_sibling_is_independent() {
    let mut session = Session::in_memory();
    let baseline = stats(&session);

    let first = int64_array(&mut session, &[1]);
    let second = int64_array(&mut session, &[2, 2]);
    let array = ArrayValue::new(&mut session, nested_int64(), owner_a(), vec![first, second])
        .expect("array");

    let sibling = array.get(&session, 1).expect("get");
    array.set(&mut session, 0, sibling).expect("set");
    let own = array.get(&session, 0).expect("get");
    array.set(&mut session, 0, own).expect("set to itself");

    let removed = array.remove(&mut session, 1).expect("remove");
    removed.deep_remove(&mut session).expect("cleanup");
    let Value::Array(remaining) = array.get(&session, 0).expect("get") else {
        panic!("element changed kind");
    };
    assert_eq!(remaining.count(&session).expect("count"), 2);

    Value::Array(array).deep_remove(&mut session).expect("remove");
    assert_eq!(stats(&session), baseline);
}

#[test]
fn dictionary_rebuilt_from_read_back_entries_conserves_storage() {
    for seed in SEEDS {
        let mut session = tight_session();
        let mut generator = Generator::new(seed, WorkloadConfig::small());
        let baseline = stats(&session);
        let any = StaticType::dictionary(StaticType::any_struct(), StaticType::any_struct());

        let mut entries = Vec::new();
        for _ in 0..20 {
            let key = generator.hashable_value(&mut session, owner_a()).expect("key");
            let value = generator.storable_value(&mut session, owner_a(), 0).expect("value");
            entries.push((key, value));
        }
        let source =
            DictionaryValue::new(&mut session, any.clone(), owner_a(), entries).expect("source");
        let reference = Value::Dictionary(source)
            .transfer(&mut session, owner_b(), false)
            .expect("reference");

        let read_back = source
            .iter(&session)
            .expect("iter")
            .collect::<Result<Vec<_>, _>>()
            .expect("entries");
        let rebuilt =
            DictionaryValue::new(&mut session, any.clone(), owner_a(), read_back).expect("rebuilt");
        assert!(Value::Dictionary(rebuilt)
            .equal(&session, &Value::Dictionary(source))
            .expect("equal"));

        // Reinserting every entry into its own dictionary changes nothing.
        let again = source
            .iter(&session)
            .expect("iter")
            .collect::<Result<Vec<_>, _>>()
            .expect("entries");
        for (key, value) in again {
            let prior = source.insert(&mut session, key, value).expect("insert");
            prior.expect("present").deep_remove(&mut session).expect("cleanup");
        }
        assert!(Value::Dictionary(source)
            .equal(&session, &reference)
            .expect("equal"));

        Value::Dictionary(source).deep_remove(&mut session).expect("remove source");
        assert!(Value::Dictionary(rebuilt)
            .equal(&session, &reference)
            .expect("equal"));

        Value::Dictionary(rebuilt).deep_remove(&mut session).expect("remove rebuilt");
        reference.deep_remove(&mut session).expect("remove reference");
        assert_eq!(stats(&session), baseline, "seed {seed}");
    }
}

#[test]
fn composite_fields_copied_between_composites_conserve_storage() {
    for seed in SEEDS {
        let mut session = tight_session();
        let mut generator = Generator::new(seed, WorkloadConfig::small());
        let baseline = stats(&session);

        let source = generator
            .composite_with_fields(&mut session, CompositeKind::Structure, owner_a(), 0, 5)
            .expect("source");
        let target = generator
            .composite_with_fields(&mut session, CompositeKind::Resource, owner_b(), 0, 2)
            .expect("target");
        let Value::Composite(reference) = Value::Composite(source)
            .deep_copy(&mut session)
            .expect("reference")
        else {
            panic!("copy changed kind");
        };

        for name in source.field_names(&session).expect("names") {
            let value = source
                .get_field(&session, &name)
                .expect("get")
                .expect("present");
            target.set_field(&mut session, &name, value).expect("set");
        }
        Value::Composite(source).deep_remove(&mut session).expect("remove source");

        for name in reference.field_names(&session).expect("names") {
            let expected = reference
                .get_field(&session, &name)
                .expect("get")
                .expect("present");
            let actual = target
                .get_field(&session, &name)
                .expect("get")
                .expect("present");
            assert!(actual.equal(&session, &expected).expect("equal"), "seed {seed}");
        }

        Value::Composite(target).deep_remove(&mut session).expect("remove target");
        Value::Composite(reference).deep_remove(&mut session).expect("remove reference");
        assert_eq!(stats(&session), baseline, "seed {seed}");
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_transfer_dictionary_between_owners() {
    let mut session = Session::in_memory();
    assert_eq!(session.storage().slab_count(), 0);

    let original = DictionaryValue::new(
        &mut session,
        string_to_int64(),
        owner_a(),
        vec![("a".into(), Value::Int64(1)), ("b".into(), Value::Int64(2))],
    )
    .expect("dictionary");
    assert_eq!(original.count(&session).expect("count"), 2);
    assert!(matches!(
        original.get(&session, &"a".into()).expect("get"),
        Some(Value::Int64(1))
    ));

    let copy = Value::Dictionary(original)
        .transfer(&mut session, owner_b(), false)
        .expect("transfer");
    let Value::Dictionary(copy) = copy else {
        panic!("transfer changed the kind");
    };
    assert_eq!(copy.count(&session).expect("count"), 2);
    assert!(matches!(
        copy.get(&session, &"b".into()).expect("get"),
        Some(Value::Int64(2))
    ));
    assert_eq!(original.count(&session).expect("count"), 2);
    assert_eq!(original.owner(), owner_a());

    Value::Dictionary(copy).deep_remove(&mut session).expect("remove copy");
    Value::Dictionary(original)
        .deep_remove(&mut session)
        .expect("remove original");
    assert_eq!(session.storage().slab_count(), 0);
}

#[test]
fn scenario_enum_key_lookup_by_value() {
    let mut session = Session::in_memory();
    let suit = TypeId::new(
        Location::Address {
            address: Address::from_u64(0x01),
            name: "Cards".into(),
        },
        "Cards.Suit",
    );
    session.register_type(CompositeTypeInfo::enumeration(
        suit.clone(),
        IntegerKind::UInt8.primitive_type(),
    ));

    let enum_case = |session: &mut Session, raw: u8| {
        CompositeValue::new(
            session,
            suit.clone(),
            vec![CompositeField::new(ENUM_RAW_VALUE_FIELD_NAME, Value::UInt8(raw))],
            None,
        )
        .map(Value::Composite)
        .expect("enum case")
    };

    let dictionary = DictionaryValue::new(
        &mut session,
        StaticType::dictionary(
            StaticType::Composite(suit.clone()),
            StaticType::Primitive(PrimitiveType::String),
        ),
        owner_a(),
        vec![],
    )
    .expect("dictionary");
    let baseline = session.storage().slab_count();

    let key = enum_case(&mut session, 2);
    dictionary
        .insert(&mut session, key, "hearts".into())
        .expect("insert");

    let lookup = enum_case(&mut session, 2);
    assert!(dictionary.contains_key(&session, &lookup).expect("contains"));
    let other = enum_case(&mut session, 3);
    assert!(!dictionary.contains_key(&session, &other).expect("contains"));

    let removed = dictionary
        .remove(&mut session, &lookup)
        .expect("remove")
        .expect("present");
    assert!(matches!(removed, Value::String(s) if s == "hearts"));

    lookup.deep_remove(&mut session).expect("remove lookup key");
    other.deep_remove(&mut session).expect("remove other");
    assert_eq!(session.storage().slab_count(), baseline);
}
