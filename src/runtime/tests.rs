//! Unit tests for the runtime primitives, called the way generated code
//! calls them.

use pretty_assertions::assert_eq;

use super::{
    containers::*,
    handle_stats,
    numeric::*,
    record_fault, reset,
    strings::{self, *},
    take_fault, HandleStats, SlotKind,
};

fn read(handle: *mut String) -> String {
    let text = String::from(strings::as_str(handle));
    rt_string_free(handle);
    text
}

#[test]
fn test_string_assign_is_deep() {
    let src = rt_int_to_string(42);
    let dest = rt_string_assign(std::ptr::null_mut(), src);

    assert_ne!(src, dest);
    rt_string_free(src);
    assert_eq!(read(dest), "42");
}

#[test]
fn test_float_formatting() {
    assert_eq!(read(rt_float_to_string(5.0)), "5.000000");
    assert_eq!(read(rt_float_to_string(-0.125)), "-0.125000");
}

#[test]
fn test_string_parsing() {
    let number = rt_int_to_string(17);
    assert_eq!(rt_string_to_int(number), 17);
    assert_eq!(rt_string_to_float(number), 17.0);
    rt_string_free(number);

    let word = rt_bool_to_string(1);
    assert_eq!(rt_string_to_int(word), 0);
    assert_eq!(read(word), "true");
}

#[test]
fn test_string_case_and_trim() {
    let text = rt_string_concat(rt_bool_to_string(0), rt_int_to_string(1));

    assert_eq!(read(rt_string_upper(text)), "FALSE1");
    assert_eq!(read(rt_string_substr(text, 1, 3)), "als");
    assert_eq!(rt_string_len(text), 6);
    rt_string_free(text);
}

#[test]
fn test_substring_fault() {
    take_fault();
    let text = rt_int_to_string(123);

    assert_eq!(read(rt_string_substr(text, 9, 1)), "");
    assert!(take_fault().is_some());
    rt_string_free(text);
}

#[test]
fn test_vec_push_len_get() {
    let vec = rt_vec_new(SlotKind::Int as i32);
    for value in [1i64, 2, 3] {
        rt_vec_push(vec, value as u64);
    }
    rt_vec_push(vec, (-4i64) as u64);

    assert_eq!(rt_vec_len(vec), 4);
    assert_eq!(rt_vec_get(vec, 3) as i64, -4);
    assert_eq!(rt_vec_contains(vec, 2), 1);
    assert_eq!(read(rt_vec_to_string(vec)), "[1, 2, 3, -4]");
    rt_vec_free(vec);
}

#[test]
fn test_vec_out_of_bounds_faults() {
    take_fault();
    let vec = rt_vec_range(0, 3);

    assert_eq!(rt_vec_get(vec, 3), 0);
    let fault = take_fault();
    assert_eq!(fault.as_deref(), Some("index 3 out of bounds for length 3"));
    rt_vec_free(vec);
}

#[test]
fn test_vec_strings_are_copied() {
    let vec = rt_vec_new(SlotKind::Str as i32);
    let text = rt_int_to_string(7);
    rt_vec_push(vec, text as usize as u64);
    rt_string_free(text);

    let out = rt_vec_get(vec, 0) as usize as *mut String;
    assert_eq!(read(out), "7");
    rt_vec_free(vec);
}

#[test]
fn test_vec_assign_replaces() {
    let src = rt_vec_fill(SlotKind::Float as i32, 1.5f64.to_bits(), 2);
    let dest = rt_vec_range(0, 10);
    let result = rt_vec_assign(dest, src);

    assert_eq!(result, dest);
    assert_eq!(rt_vec_len(dest), 2);
    assert_eq!(f64::from_bits(rt_vec_get(dest, 1)), 1.5);
    rt_vec_free(src);
    rt_vec_free(dest);
}

#[test]
fn test_set_keeps_insertion_order() {
    let set = rt_set_new(SlotKind::Int as i32);
    for value in [3u64, 1, 3, 2] {
        rt_set_insert(set, value);
    }

    assert_eq!(rt_set_len(set), 3);

    let mut keys = vec![];
    rt_set_iter_start(set);
    while rt_set_iter_next(set) != 0 {
        keys.push(rt_set_iter_key(set));
    }
    assert_eq!(keys, vec![3, 1, 2]);
    rt_set_free(set);
}

#[test]
fn test_map_insert_get() {
    let map = rt_map_new(SlotKind::Str as i32, SlotKind::Int as i32);
    let key = rt_int_to_string(1);
    rt_map_insert(map, key as usize as u64, 10);
    rt_map_insert(map, key as usize as u64, 11);

    assert_eq!(rt_map_len(map), 1);
    assert_eq!(rt_map_get(map, key as usize as u64), 11);
    assert_eq!(rt_map_contains(map, key as usize as u64), 1);
    assert_eq!(read(rt_map_to_string(map)), "{1: 11}");
    rt_string_free(key);
    rt_map_free(map);
}

#[test]
fn test_map_missing_key_faults() {
    take_fault();
    let map = rt_map_new(SlotKind::Int as i32, SlotKind::Float as i32);

    assert_eq!(f64::from_bits(rt_map_get(map, 5)), 0.0);
    assert_eq!(take_fault().as_deref(), Some("key 5 not found in map"));
    rt_map_free(map);
}

#[test]
fn test_first_fault_is_kept() {
    take_fault();
    record_fault(String::from("first"));
    record_fault(String::from("second"));

    assert_eq!(take_fault().as_deref(), Some("first"));
}

#[test]
fn test_check_index() {
    take_fault();
    assert_eq!(rt_check_index(2, 4), 2);
    assert!(take_fault().is_none());
    assert_eq!(rt_check_index(4, 4), 0);
    assert!(take_fault().is_some());
}

#[test]
fn test_random_is_inclusive() {
    for _ in 0..100 {
        let value = rt_math_random(3, 1);
        assert!((1..=3).contains(&value));
    }
    assert_eq!(rt_math_random(5, 5), 5);
}

#[test]
fn test_free_null_is_noop() {
    rt_string_free(std::ptr::null_mut());
    rt_vec_free(std::ptr::null_mut());
    rt_set_free(std::ptr::null_mut());
    rt_map_free(std::ptr::null_mut());
}

#[test]
fn test_remainder() {
    reset();
    assert_eq!(rt_math_mod(7, 3), 1);
    assert_eq!(rt_math_mod(-7, 3), -1);
    assert_eq!(rt_math_mod(i64::MIN, -1), 0);
    assert!(take_fault().is_none());

    assert_eq!(rt_math_mod(5, 0), 0);
    assert_eq!(take_fault().as_deref(), Some("remainder of 5 by zero"));
}

#[test]
fn test_handles_are_counted() {
    reset();
    let text = rt_int_to_string(1);
    let copy = rt_string_assign(std::ptr::null_mut(), text);
    let vec = rt_vec_new(SlotKind::Int as i32);
    assert_eq!(
        handle_stats(),
        HandleStats {
            allocated: 3,
            released: 0
        }
    );

    rt_string_free(text);
    rt_string_free(copy);
    rt_vec_free(vec);
    rt_string_free(std::ptr::null_mut());
    assert_eq!(handle_stats().released, 3);
    assert_eq!(handle_stats().live(), 0);
    assert!(take_fault().is_none());
}

#[test]
fn test_double_release_is_caught() {
    reset();
    let first = rt_string_new();
    rt_string_free(first);
    let address = first as usize;

    // A stale handle is neither freed nor counted twice.
    let second = rt_string_new();
    if second as usize != address {
        rt_string_free(first);
        assert!(take_fault().unwrap().starts_with("release of unknown handle"));
    }
    rt_string_free(second);
    assert_eq!(handle_stats().released, 2);
}
