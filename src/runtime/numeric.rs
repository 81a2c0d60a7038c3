use rand::Rng;

use super::record_fault;

/// Bounds check for dynamically indexed fixed vectors and strings.
///
/// Returns the index when it is in range, otherwise records a fault and
/// returns 0 so the access stays inside the storage.
#[no_mangle]
pub extern "C" fn rt_check_index(index: i64, length: i64) -> i64 {
    if index < 0 || index >= length {
        record_fault(format!(
            "index {} out of bounds for length {}",
            index, length
        ));
        return 0;
    }
    index
}

/// Signed integer remainder. A zero divisor records a fault and yields 0;
/// `MIN % -1` yields 0.
#[no_mangle]
pub extern "C" fn rt_math_mod(value: i64, divisor: i64) -> i64 {
    if divisor == 0 {
        record_fault(format!("remainder of {} by zero", value));
        return 0;
    }
    value.wrapping_rem(divisor)
}

#[no_mangle]
pub extern "C" fn rt_math_pow(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

#[no_mangle]
pub extern "C" fn rt_math_sqrt(value: f64) -> f64 {
    value.sqrt()
}

#[no_mangle]
pub extern "C" fn rt_math_sin(value: f64) -> f64 {
    value.sin()
}

#[no_mangle]
pub extern "C" fn rt_math_cos(value: f64) -> f64 {
    value.cos()
}

/// Uniform integer in `lo..=hi`; the bounds may come in either order.
#[no_mangle]
pub extern "C" fn rt_math_random(lo: i64, hi: i64) -> i64 {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    rand::thread_rng().gen_range(lo..=hi)
}
