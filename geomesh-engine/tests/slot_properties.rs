use geomesh_engine::slot::{decode, encode};
use geomesh_types::Value;
use proptest::prelude::*;

proptest! {
    #[test]
    fn ints_round_trip(i in any::<i64>()) {
        prop_assert_eq!(decode(&encode(&Value::Int(i))), Value::Int(i));
    }

    #[test]
    fn doubles_round_trip_bit_exact(bits in any::<u64>()) {
        let d = f64::from_bits(bits);
        let back = decode(&encode(&Value::Double(d)));
        prop_assert_eq!(back.as_double().map(f64::to_bits), Some(bits));
    }

    #[test]
    fn byte_strings_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let v = Value::String(bytes);
        prop_assert_eq!(decode(&encode(&v)), v);
    }

    #[test]
    fn bools_round_trip(b in any::<bool>()) {
        prop_assert_eq!(decode(&encode(&Value::Bool(b))), Value::Bool(b));
    }
}
