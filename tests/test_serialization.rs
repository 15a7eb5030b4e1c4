use scriptreg::builtins::{self, BuiltinTypes, Timespan};
use scriptreg::codec::{BincodeSerializer, SerializedValue};
use scriptreg::core::{HierarchyBuilder, TypeKey, Value};
use scriptreg::registry::{RegistryBuilder, TypeEntry, TypeRegistry};
use scriptreg::ConverterEdge;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

struct Keys {
    builtin: BuiltinTypes,
    player: TypeKey,
    chunk: TypeKey,
    ticket: TypeKey,
}

fn registry() -> (TypeRegistry, Keys) {
    let mut h = HierarchyBuilder::new();
    let builtin = builtins::declare_types(&mut h).unwrap();
    let player = h.declare("Player", &[builtin.object]).unwrap();
    let chunk = h.declare("Chunk", &[builtin.object]).unwrap();
    let ticket = h.declare("Ticket", &[builtin.object]).unwrap();

    let mut reg = RegistryBuilder::new(Arc::new(h.build()));
    builtins::register_entries(&mut reg, &builtin).unwrap();
    reg.register(TypeEntry::new("player", player).with_serialize_as(builtin.text))
        .unwrap();
    reg.register(TypeEntry::new("chunk", chunk)).unwrap();
    reg.register(
        TypeEntry::new("ticket", ticket).with_serializer(BincodeSerializer::<u32>::new().synchronous()),
    )
    .unwrap();
    let text = builtin.text;
    reg.register_converter(ConverterEdge::new(player, text, move |v| {
        Some(Value::new(text, v.downcast_ref::<String>()?.clone()))
    }));

    (
        reg.freeze().unwrap(),
        Keys {
            builtin,
            player,
            chunk,
            ticket,
        },
    )
}

#[test]
fn test_builtin_values_round_trip() {
    let (reg, k) = registry();
    let t = &k.builtin;

    let payload = reg.serialize(&Value::new(t.number, 2.5f64)).unwrap();
    assert_eq!(payload.code_name, "number");
    let back = reg.deserialize_payload(&payload).unwrap();
    assert_eq!(back.ty(), t.number);
    assert_eq!(back.downcast_ref::<f64>(), Some(&2.5));

    let payload = reg.serialize(&Value::new(t.boolean, true)).unwrap();
    assert_eq!(reg.deserialize_payload(&payload).unwrap().downcast_ref::<bool>(), Some(&true));

    let payload = reg.serialize(&Value::new(t.text, "hello".to_string())).unwrap();
    assert_eq!(payload.bytes, b"\"hello\"");
    assert_eq!(
        reg.deserialize("text", &payload.bytes).unwrap().downcast_ref::<String>().unwrap(),
        "hello"
    );

    let span = Timespan::from_millis(90_000);
    let payload = reg.serialize(&Value::new(t.timespan, span)).unwrap();
    assert_eq!(
        reg.deserialize_payload(&payload).unwrap().downcast_ref::<Timespan>(),
        Some(&span)
    );
}

#[test]
fn test_serialize_as_stores_target_type() {
    let (reg, k) = registry();

    let payload = reg.serialize(&Value::new(k.player, "alex".to_string())).unwrap();
    assert_eq!(payload.code_name, "text");

    let back = reg.deserialize_payload(&payload).unwrap();
    assert_eq!(back.ty(), k.builtin.text);
    assert_eq!(back.downcast_ref::<String>().unwrap(), "alex");
}

#[test]
fn test_values_without_codec_are_not_persisted() {
    let (reg, k) = registry();
    assert!(reg.serialize(&Value::new(k.chunk, (0i32, 0i32))).is_none());
    assert!(reg.serialize(&Value::new(k.builtin.object, ())).is_none());
}

#[test]
fn test_unknown_or_corrupt_payloads_are_lost() {
    let (reg, _) = registry();
    assert!(reg.deserialize("unicorn", &[1, 2, 3]).is_none());
    assert!(reg.deserialize("chunk", &[1, 2, 3]).is_none());
    assert!(reg.deserialize("text", b"not json").is_none());
}

#[test]
fn test_mismatched_payload_is_rejected() {
    let (reg, k) = registry();
    // A number entry holding something that is not an f64
    assert!(reg.serialize(&Value::new(k.builtin.number, "three".to_string())).is_none());
}

#[test]
fn test_synchronous_serializer_off_primary_thread() {
    let (reg, k) = registry();
    assert!(reg.is_primary_context());

    let value = Value::new(k.ticket, 7u32);
    let payload = thread::scope(|s| {
        s.spawn(|| {
            assert!(!reg.is_primary_context());
            reg.serialize(&value)
        })
        .join()
        .unwrap()
    });
    let payload = payload.unwrap();
    assert_eq!(payload.code_name, "ticket");
    assert_eq!(reg.deserialize_payload(&payload).unwrap().downcast_ref::<u32>(), Some(&7));
}

#[test]
fn test_payloads_survive_storage() {
    let (reg, k) = registry();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("variables.bin");

    let stored = vec![
        reg.serialize(&Value::new(k.builtin.number, 42.0f64)).unwrap(),
        reg.serialize(&Value::new(k.builtin.text, "saved".to_string())).unwrap(),
    ];
    let encoded: Vec<Vec<u8>> = stored.iter().map(|p| p.to_bytes().unwrap()).collect();
    fs::write(&path, bincode::serialize(&encoded).unwrap()).unwrap();

    let raw: Vec<Vec<u8>> = bincode::deserialize(&fs::read(&path).unwrap()).unwrap();
    let loaded: Vec<SerializedValue> = raw
        .iter()
        .map(|bytes| SerializedValue::from_bytes(bytes).unwrap())
        .collect();
    assert_eq!(loaded, stored);

    let number = reg.deserialize_payload(&loaded[0]).unwrap();
    assert_eq!(number.downcast_ref::<f64>(), Some(&42.0));
    let text = reg.deserialize_payload(&loaded[1]).unwrap();
    assert_eq!(text.downcast_ref::<String>().unwrap(), "saved");
}
