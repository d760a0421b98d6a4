use cq_physical::SimdClass;

/// Detects the widest SIMD lane width the current CPU exposes at process
/// start, the same `is_x86_feature_detected!` runtime-check idiom a
/// columnar aggregation path reaches for when it has no portable-SIMD
/// equivalent to lean on -- detection here gates *strategy choice*
/// (`CostSignals::wants_simd`), not lane width: `cq_predicate::leaf`'s
/// comparison kernels always fold their mask eight rows at a time via
/// `Bitmap::and_mask8` regardless of the class reported here.
#[cfg(target_arch = "x86_64")]
pub fn detect_simd_class() -> SimdClass {
    if is_x86_feature_detected!("avx512f") {
        SimdClass::Lanes512
    } else if is_x86_feature_detected!("avx2") {
        SimdClass::Lanes256
    } else if is_x86_feature_detected!("sse2") {
        SimdClass::Lanes128
    } else {
        SimdClass::None
    }
}

#[cfg(not(target_arch = "x86_64"))]
pub fn detect_simd_class() -> SimdClass {
    SimdClass::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_simd_class_does_not_panic() {
        let _ = detect_simd_class();
    }
}
