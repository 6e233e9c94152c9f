use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// Display

#[test]
fn scalars_print_like_sprint() {
    assert_eq!(Value::int(-3).to_string(), "-3");
    assert_eq!(Value::uint(7).to_string(), "7");
    assert_eq!(Value::float(2.5).to_string(), "2.5");
    assert_eq!(Value::Bool(true).to_string(), "true");
    assert_eq!(Value::string("hi").to_string(), "hi");
}

#[test]
fn absence_prints_distinctly() {
    assert_eq!(Value::Invalid.to_string(), "<no value>");
    assert_eq!(Value::None.to_string(), "<nil>");
}

#[test]
fn collections_print_like_sprint() {
    let list = Value::list(vec![Value::int(1), Value::string("a"), Value::None]);
    assert_eq!(list.to_string(), "[1 a <nil>]");

    let map = Value::map_from([("b", Value::int(2)), ("a", Value::int(1))]);
    assert_eq!(map.to_string(), "map[a:1 b:2]");

    let rec = Value::record(
        Record::new("Person")
            .field("Name", Value::string("Ada"))
            .field("Age", Value::int(36)),
    );
    assert_eq!(rec.to_string(), "{Ada 36}");
}

#[test]
fn presence_prints_value_and_flag() {
    assert_eq!(Value::presence(Value::int(1), true).to_string(), "{1 true}");
}

#[test]
fn some_prints_inner_value() {
    assert_eq!(Value::some(Value::string("x")).to_string(), "x");
}

// Truth

#[test]
fn truth_of_scalars() {
    assert_eq!(Value::Invalid.truth(), Some(false));
    assert_eq!(Value::None.truth(), Some(false));
    assert_eq!(Value::int(0).truth(), Some(false));
    assert_eq!(Value::int(-1).truth(), Some(true));
    assert_eq!(Value::uint(0).truth(), Some(false));
    assert_eq!(Value::float(0.0).truth(), Some(false));
    assert_eq!(Value::float(0.1).truth(), Some(true));
    assert_eq!(Value::string("").truth(), Some(false));
    assert_eq!(Value::string("0").truth(), Some(true));
}

#[test]
fn truth_of_containers() {
    assert_eq!(Value::list(vec![]).truth(), Some(false));
    assert_eq!(Value::list(vec![Value::None]).truth(), Some(true));
    assert_eq!(Value::map(BTreeMap::new()).truth(), Some(false));
    assert_eq!(Value::record(Record::new("R")).truth(), Some(true));
    assert_eq!(Value::some(Value::int(0)).truth(), Some(false));
    assert_eq!(Value::presence(Value::int(0), true).truth(), Some(true));
    assert_eq!(Value::presence(Value::int(5), false).truth(), Some(false));
}

#[test]
fn callback_handles_have_no_truth() {
    assert_eq!(Value::Block(BlockHandle::new(0)).truth(), None);
    assert!(!Value::Block(BlockHandle::new(0)).is_truthy());
}

#[derive(Debug)]
struct Bag(Vec<Value>);

impl Object for Bag {
    fn type_name(&self) -> &str {
        "Bag"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn is_empty(&self) -> Option<bool> {
        Some(self.0.is_empty())
    }

    fn iter(&self) -> Option<Box<dyn Iterator<Item = Value> + '_>> {
        Some(Box::new(self.0.iter().cloned()))
    }
}

#[test]
fn object_emptiness_drives_truth() {
    assert_eq!(Value::object(Bag(vec![])).truth(), Some(false));
    assert_eq!(Value::object(Bag(vec![Value::int(1)])).truth(), Some(true));
}

#[test]
fn downcast_recovers_host_type() {
    let v = Value::object(Bag(vec![Value::int(1)]));
    assert_eq!(v.downcast_object::<Bag>().map(|b| b.0.len()), Some(1));
    assert!(v.downcast_object::<RangeElemState>().is_none());
    assert_eq!(v.type_name(), "Bag");
}

// Iterators

struct Countdown(i64);

impl TemplateIterator for Countdown {
    type State = i64;

    fn start(&self) -> i64 {
        self.0
    }

    fn done(&self, state: &i64) -> bool {
        *state <= 0
    }

    fn next(&self, state: i64) -> (Value, i64) {
        (Value::int(state), state - 1)
    }
}

#[test]
fn template_iterator_is_driven_to_completion() {
    let v = Value::iterator(Countdown(3));
    let Value::Object(obj) = &v else {
        panic!("iterator should be an object");
    };
    let items: Vec<Value> = obj.iter().into_iter().flatten().collect();
    assert_eq!(items, vec![Value::int(3), Value::int(2), Value::int(1)]);
    assert_eq!(v.type_name(), "iterator");
}

// Misc

#[test]
fn indirect_strips_some_wrappers() {
    let v = Value::some(Value::some(Value::int(4)));
    assert_eq!(v.indirect(), &Value::int(4));
    assert_eq!(v.type_name(), "**int");
}

#[test]
fn len_counts_bytes_items_and_entries() {
    assert_eq!(Value::string("héllo").len(), Some(6));
    assert_eq!(Value::list(vec![Value::None; 3]).len(), Some(3));
    assert_eq!(Value::map_from([("a", Value::None)]).len(), Some(1));
    assert_eq!(Value::int(3).len(), None);
}

#[test]
fn zero_like_keeps_kind() {
    assert_eq!(Value::int(9).zero_like(), Value::int(0));
    assert_eq!(Value::string("x").zero_like(), Value::string(""));
    assert_eq!(Value::Bool(true).zero_like(), Value::Bool(false));
    assert_eq!(Value::record(Record::new("R")).zero_like(), Value::None);
}

#[test]
fn record_fields_keep_order_and_replace() {
    let r = Record::new("P")
        .field("A", Value::int(1))
        .field("B", Value::int(2))
        .field("A", Value::int(3));
    let names: Vec<&str> = r.fields().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(r.get("A"), Some(&Value::int(3)));
    assert_eq!(r.get("C"), None);
}

#[test]
fn heap_values_share_storage() {
    let a = Value::list(vec![Value::int(1)]);
    let b = a.clone();
    match (&a, &b) {
        (Value::List(x), Value::List(y)) => assert!(x.ptr_eq(y)),
        _ => panic!("expected lists"),
    }
    assert_eq!(a, b);
}

#[test]
fn range_state_exposes_fields() {
    let s = RangeElemState {
        value: Value::string("x"),
        index: 2,
        key: Value::int(2),
        is_first: false,
        is_last: true,
        source: Value::list(vec![]),
        data: Value::None,
    };
    assert_eq!(s.field("Index"), Some(Value::int(2)));
    assert_eq!(s.field("IsLast"), Some(Value::Bool(true)));
    assert_eq!(s.field("Nope"), None);
}

// Keys

#[test]
fn keys_order_by_class_then_value() {
    let mut keys = vec![
        Key::from("b"),
        Key::Int(10),
        Key::Bool(true),
        Key::Uint(3),
        Key::Float(-1.5),
        Key::from("a"),
        Key::Bool(false),
    ];
    keys.sort();
    assert_eq!(
        keys,
        vec![
            Key::Bool(false),
            Key::Bool(true),
            Key::Float(-1.5),
            Key::Uint(3),
            Key::Int(10),
            Key::from("a"),
            Key::from("b"),
        ]
    );
}

#[test]
fn numeric_keys_of_different_kinds_stay_distinct() {
    let m = Value::map_from([(Key::Int(1), Value::string("i")), (Key::Uint(1), Value::string("u"))]);
    assert_eq!(m.len(), Some(2));
    assert_eq!(Key::from_value(&Value::list(vec![])), None);
    assert_eq!(Key::from_value(&Value::some(Value::int(4))), Some(Key::Int(4)));
}

proptest! {
    #[test]
    fn key_order_is_total_and_antisymmetric(a in any::<i64>(), b in any::<u64>(), c in any::<f64>()) {
        let keys = [Key::Int(a), Key::Uint(b), Key::Float(c)];
        for x in &keys {
            for y in &keys {
                prop_assert_eq!(x.cmp(y), y.cmp(x).reverse());
            }
        }
    }

    #[test]
    fn integer_display_matches_std(n in any::<i64>()) {
        prop_assert_eq!(Value::int(n).to_string(), n.to_string());
    }
}
