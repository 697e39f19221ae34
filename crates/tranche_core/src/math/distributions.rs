//! Normal and Student-t distribution functions.
//!
//! This module provides:
//! - `norm_cdf`, `norm_pdf`: Standard normal CDF and density
//! - `norm_inv_cdf`: Standard normal quantile
//! - `student_t_cdf`: Student-t CDF with real degrees of freedom
//!
//! The complementary error function uses Cody's rational approximations,
//! accurate to double precision, so tail probabilities keep their relative
//! accuracy. The quantile is polished with one Halley step against
//! `norm_cdf`, making `norm_cdf(norm_inv_cdf(p))` consistent to rounding.

use std::f64::consts::{PI, SQRT_2};

/// 1 / sqrt(2 * pi)
const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Numerator of `erf(x) / x` on `|x| <= 0.46875`, in `x²`.
const ERF_A: [f64; 5] = [
    3.161_123_743_870_565_6,
    113.864_154_151_050_16,
    377.485_237_685_302_02,
    3_209.377_589_138_469_5,
    0.185_777_706_184_603_15,
];
const ERF_B: [f64; 4] = [
    23.601_290_952_344_121,
    244.024_637_934_444_17,
    1_282.616_526_077_372_3,
    2_844.236_833_439_170_6,
];

/// `erfc(y) exp(y²)` on `0.46875 < y <= 4`.
const ERFC_C: [f64; 9] = [
    0.564_188_496_988_670_1,
    8.883_149_794_388_376,
    66.119_190_637_141_63,
    298.635_138_197_400_13,
    881.952_221_241_769_1,
    1_712.047_612_634_070_6,
    2_051.078_377_826_071_5,
    1_230.339_354_797_997_2,
    2.153_115_354_744_038_5e-8,
];
const ERFC_D: [f64; 8] = [
    15.744_926_110_709_835,
    117.693_950_891_312_5,
    537.181_101_862_009_9,
    1_621.389_574_566_690_2,
    3_290.799_235_733_459_6,
    4_362.619_090_143_247,
    3_439.367_674_143_721_6,
    1_230.339_354_803_749_42,
];

/// Asymptotic correction in `1 / y²` for `y > 4`.
const ERFC_P: [f64; 6] = [
    0.305_326_634_961_232_34,
    0.360_344_899_949_804_44,
    0.125_781_726_111_229_25,
    0.016_083_785_148_742_276_6,
    6.587_491_615_298_378e-4,
    0.016_315_387_137_302_098,
];
const ERFC_Q: [f64; 5] = [
    2.568_520_192_289_822,
    1.872_952_849_923_467_3,
    0.527_905_102_951_428_4,
    0.060_518_341_312_441_32,
    0.002_335_204_976_268_691_8,
];

/// 1 / sqrt(pi)
const FRAC_1_SQRT_PI: f64 = 0.564_189_583_547_756_3;

/// Beyond this `erfc` underflows.
const ERFC_XBIG: f64 = 26.543;

/// Complementary error function.
///
/// Cody's rational Chebyshev approximations on `[0, 0.46875]`,
/// `(0.46875, 4]` and `(4, inf)`; relative error below 1e-15 wherever the
/// result is a normal number.
pub fn erfc(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let y = x.abs();
    if y <= 0.46875 {
        let ysq = if y > f64::EPSILON { y * y } else { 0.0 };
        let mut num = ERF_A[4] * ysq;
        let mut den = ysq;
        for (a, b) in ERF_A[..3].iter().zip(&ERF_B[..3]) {
            num = (num + a) * ysq;
            den = (den + b) * ysq;
        }
        return 1.0 - x * (num + ERF_A[3]) / (den + ERF_B[3]);
    }

    let scaled = if y <= 4.0 {
        let mut num = ERFC_C[8] * y;
        let mut den = y;
        for (c, d) in ERFC_C[..7].iter().zip(&ERFC_D[..7]) {
            num = (num + c) * y;
            den = (den + d) * y;
        }
        (num + ERFC_C[7]) / (den + ERFC_D[7])
    } else if y >= ERFC_XBIG {
        return if x < 0.0 { 2.0 } else { 0.0 };
    } else {
        let inv_sq = 1.0 / (y * y);
        let mut num = ERFC_P[5] * inv_sq;
        let mut den = inv_sq;
        for (p, q) in ERFC_P[..4].iter().zip(&ERFC_Q[..4]) {
            num = (num + p) * inv_sq;
            den = (den + q) * inv_sq;
        }
        (FRAC_1_SQRT_PI - inv_sq * (num + ERFC_P[4]) / (den + ERFC_Q[4])) / y
    };
    // exp(-y²) split so the square of the truncated part is exact
    let head = (y * 16.0).trunc() / 16.0;
    let tail = (y - head) * (y + head);
    let ans = scaled * (-head * head).exp() * (-tail).exp();
    if x < 0.0 {
        2.0 - ans
    } else {
        ans
    }
}

/// Standard normal cumulative distribution function.
///
/// # Examples
/// ```
/// use tranche_core::math::distributions::norm_cdf;
///
/// assert_eq!(norm_cdf(0.0), 0.5);
/// assert!((norm_cdf(1.959963985) - 0.975).abs() < 1e-9);
/// ```
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal probability density function.
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal quantile (inverse CDF).
///
/// Returns `-inf` for `p <= 0`, `+inf` for `p >= 1` and NaN for NaN input.
///
/// # Examples
/// ```
/// use tranche_core::math::distributions::{norm_cdf, norm_inv_cdf};
///
/// let x = norm_inv_cdf(0.05);
/// assert!((x + 1.644853627).abs() < 1e-6);
/// assert!((norm_cdf(x) - 0.05).abs() < 1e-12);
/// ```
pub fn norm_inv_cdf(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    // Acklam's rational approximation
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let x = if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    // One Halley step against norm_cdf
    let e = norm_cdf(x) - p;
    let u = e * (2.0 * PI).sqrt() * (0.5 * x * x).exp();
    x - u / (1.0 + 0.5 * x * u)
}

/// Natural log of the gamma function (Lanczos, g = 7).
fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = COEF[0];
    let t = x + 7.5;
    for (i, c) in COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Continued fraction for the regularised incomplete beta function.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-15;
    const FPMIN: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularised incomplete beta function I_x(a, b).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Student-t cumulative distribution function with `nu > 0` degrees of freedom.
///
/// # Examples
/// ```
/// use tranche_core::math::distributions::student_t_cdf;
///
/// assert!((student_t_cdf(0.0, 4.0) - 0.5).abs() < 1e-12);
/// // t(1) is Cauchy: F(1) = 3/4
/// assert!((student_t_cdf(1.0, 1.0) - 0.75).abs() < 1e-10);
/// ```
pub fn student_t_cdf(t: f64, nu: f64) -> f64 {
    if t.is_nan() || nu.is_nan() || nu <= 0.0 {
        return f64::NAN;
    }
    let x = nu / (nu + t * t);
    let tail = 0.5 * incomplete_beta(0.5 * nu, 0.5, x);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ========================================
    // Normal distribution
    // ========================================

    #[test]
    fn test_norm_cdf_reference_values() {
        assert_relative_eq!(norm_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_relative_eq!(norm_cdf(1.0), 0.841_344_746_068_543, epsilon = 1e-14);
        assert_relative_eq!(norm_cdf(-2.0), 0.022_750_131_948_179, epsilon = 1e-14);
        assert_relative_eq!(norm_cdf(-6.0), 9.865_876_450_377e-10, max_relative = 1e-12);
    }

    #[test]
    fn test_erfc_double_precision() {
        assert_eq!(erfc(0.0), 1.0);
        // One point per approximation interval plus the reflection
        assert_relative_eq!(erfc(0.3), 0.671_373_240_540_872_6, max_relative = 1e-15);
        assert_relative_eq!(erfc(1.0), 0.157_299_207_050_285_13, max_relative = 1e-15);
        assert_relative_eq!(erfc(10.0), 2.088_487_583_762_545e-45, max_relative = 1e-14);
        assert_relative_eq!(erfc(-3.0), 1.999_977_909_503_001_5, max_relative = 1e-15);
        assert_eq!(erfc(30.0), 0.0);
        assert_eq!(erfc(f64::INFINITY), 0.0);
        assert_eq!(erfc(f64::NEG_INFINITY), 2.0);
        assert!(erfc(f64::NAN).is_nan());
    }

    #[test]
    fn test_norm_cdf_symmetry() {
        for &x in &[0.1, 0.7, 1.3, 2.9, 4.5] {
            assert_relative_eq!(norm_cdf(x) + norm_cdf(-x), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_norm_pdf_reference_values() {
        assert_relative_eq!(norm_pdf(0.0), FRAC_1_SQRT_2PI);
        assert_relative_eq!(norm_pdf(1.0), 0.241_970_724_519_143, epsilon = 1e-12);
    }

    #[test]
    fn test_norm_inv_cdf_round_trip() {
        for &p in &[1e-10, 1e-4, 0.01, 0.3, 0.5, 0.8, 0.99, 1.0 - 1e-6] {
            let x = norm_inv_cdf(p);
            assert_relative_eq!(norm_cdf(x), p, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_norm_inv_cdf_edges() {
        assert_eq!(norm_inv_cdf(0.0), f64::NEG_INFINITY);
        assert_eq!(norm_inv_cdf(1.0), f64::INFINITY);
        assert!(norm_inv_cdf(f64::NAN).is_nan());
    }

    // ========================================
    // Student-t
    // ========================================

    #[test]
    fn test_student_t_cdf_reference_values() {
        // t(2): F(t) = 1/2 + t / (2 sqrt(2 + t^2))
        for &t in &[-3.0, -0.5, 0.25, 2.0] {
            let expected = 0.5 + t / (2.0 * (2.0f64 + t * t).sqrt());
            assert_relative_eq!(student_t_cdf(t, 2.0), expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_student_t_approaches_normal() {
        assert_relative_eq!(student_t_cdf(1.5, 1e6), norm_cdf(1.5), epsilon = 1e-5);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_norm_cdf_monotonic(x in -8.0f64..8.0, dx in 1e-3f64..1.0) {
                prop_assert!(norm_cdf(x) <= norm_cdf(x + dx));
            }

            #[test]
            fn test_student_t_cdf_bounded(t in -50.0f64..50.0, nu in 0.5f64..30.0) {
                let f = student_t_cdf(t, nu);
                prop_assert!((0.0..=1.0).contains(&f));
            }
        }
    }
}
