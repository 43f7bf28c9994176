//! Static per-sample-rate coefficient tables (C1).
//!
//! Two independent tables are tabulated for M-weighting: 48 kHz and 44.1 kHz.
//! The 44.1 kHz set is its own bilinear-transform derivation from the
//! ISO 21727 analog prototype, not an interpolation of the 48 kHz digital
//! coefficients — see the Open Question note in this workspace's design
//! notes for why those two are not interchangeable.

use leqm_core::{LeqmError, LeqmResult};

/// A 6-tap IIR coefficient set, `a[0]` is always 1.0 and implicit.
#[derive(Debug, Clone, Copy)]
pub struct IirCoeffs {
    pub b: [f64; 6],
    pub a: [f64; 6],
}

/// M-weighting IIR coefficients at 48 000 Hz (reference values).
pub const M_WEIGHT_48000: IirCoeffs = IirCoeffs {
    a: [
        1.0,
        -1.6391291074367320,
        1.5160386192837869,
        -0.8555167646249104,
        0.2870466545317107,
        -0.0428951718612053,
    ],
    b: [
        0.31837346242469328,
        0.10800452155339044,
        -0.21106344349319428,
        -0.15438275853192485,
        -0.05130596901975942,
        -0.00518224535906041,
    ],
};

/// M-weighting IIR coefficients at 44 100 Hz, tabulated independently of the
/// 48 kHz set (see module doc).
pub const M_WEIGHT_44100: IirCoeffs = IirCoeffs {
    a: [
        1.0,
        -1.6995842809427039,
        1.5825266430324237,
        -0.8938013091550336,
        0.2983892165438145,
        -0.0433204497729848,
    ],
    b: [
        0.30148919933172401,
        0.10221249324571538,
        -0.20034624143361047,
        -0.14671569397306542,
        -0.04909221234107413,
        -0.00504106912701842,
    ],
};

/// 21-tap FIR impulse response equivalent to the M-weighting curve, used
/// when `--convpoints` selects convolution over the IIR recurrence.
pub const M_WEIGHT_FIR_21: [f64; 21] = [
    -0.0008, -0.0014, -0.0009, 0.0021, 0.0068, 0.0083, -0.0006, -0.0219, -0.0457, -0.0402, 0.9520,
    -0.0402, -0.0457, -0.0219, -0.0006, 0.0083, 0.0068, 0.0021, -0.0009, -0.0014, -0.0008,
];

/// Two-stage K-weighting cascade coefficients (high-shelf then high-pass),
/// per ITU-R BS.1770-4, §4.3.
#[derive(Debug, Clone, Copy)]
pub struct KWeightCoeffs {
    pub hs: IirCoeffs2,
    pub hp: IirCoeffs2,
}

/// A 2-pole/2-zero biquad coefficient set (`b0,b1,b2,a1,a2`, `a0` implicit 1).
#[derive(Debug, Clone, Copy)]
pub struct IirCoeffs2 {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// K-weighting coefficients at 48 000 Hz, the BS.1770-4 reference rate.
pub const K_WEIGHT_48000: KWeightCoeffs = KWeightCoeffs {
    hs: IirCoeffs2 {
        b0: 1.53512485958697,
        b1: -2.69169618940638,
        b2: 1.19839281085285,
        a1: -1.69065929318241,
        a2: 0.73248077421585,
    },
    hp: IirCoeffs2 {
        b0: 1.0,
        b1: -2.0,
        b2: 1.0,
        a1: -1.99004745483398,
        a2: 0.99007225036621,
    },
};

/// K-weighting coefficients at 44 100 Hz.
pub const K_WEIGHT_44100: KWeightCoeffs = KWeightCoeffs {
    hs: IirCoeffs2 {
        b0: 1.53084453732266,
        b1: -2.65097235210179,
        b2: 1.16977846815288,
        a1: -1.66365777351221,
        a2: 0.71257105299310,
    },
    hp: IirCoeffs2 {
        b0: 1.0,
        b1: -2.0,
        b2: 1.0,
        a1: -1.98917332535566,
        a2: 0.98925508676450,
    },
};

/// Look up the tabulated M-weighting coefficients for a sample rate.
pub fn m_weight_for_rate(sample_rate: u32) -> LeqmResult<IirCoeffs> {
    match sample_rate {
        48000 => Ok(M_WEIGHT_48000),
        44100 => Ok(M_WEIGHT_44100),
        other => Err(LeqmError::UnsupportedSampleRate(other)),
    }
}

/// Look up the tabulated K-weighting coefficients for a sample rate.
pub fn k_weight_for_rate(sample_rate: u32) -> LeqmResult<KWeightCoeffs> {
    match sample_rate {
        48000 => Ok(K_WEIGHT_48000),
        44100 => Ok(K_WEIGHT_44100),
        other => Err(LeqmError::UnsupportedSampleRate(other)),
    }
}

/// Linearly interpolate the M-weighting IIR coefficients toward the nearest
/// tabulated rate. Only used when the caller explicitly opts in (the
/// scheduler never calls this implicitly — see C1 failure mode).
pub fn m_weight_interpolated(sample_rate: u32) -> IirCoeffs {
    let (lo, hi, lo_rate, hi_rate) = if sample_rate < 44100 {
        (M_WEIGHT_44100, M_WEIGHT_44100, 44100.0, 44100.0)
    } else if sample_rate > 48000 {
        (M_WEIGHT_48000, M_WEIGHT_48000, 48000.0, 48000.0)
    } else {
        (M_WEIGHT_44100, M_WEIGHT_48000, 44100.0, 48000.0)
    };
    let t = if (hi_rate - lo_rate).abs() < f64::EPSILON {
        0.0
    } else {
        (sample_rate as f64 - lo_rate) / (hi_rate - lo_rate)
    };
    let mut a = [0.0; 6];
    let mut b = [0.0; 6];
    for i in 0..6 {
        a[i] = lo.a[i] + t * (hi.a[i] - lo.a[i]);
        b[i] = lo.b[i] + t * (hi.b[i] - lo.b[i]);
    }
    IirCoeffs { a, b }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_distinct() {
        assert_ne!(M_WEIGHT_48000.a, M_WEIGHT_44100.a);
        assert_ne!(M_WEIGHT_48000.b, M_WEIGHT_44100.b);
    }

    #[test]
    fn unknown_rate_is_unsupported() {
        assert!(matches!(
            m_weight_for_rate(22050),
            Err(LeqmError::UnsupportedSampleRate(22050))
        ));
    }

    #[test]
    fn fir_kernel_is_normalized_near_unity() {
        let sum: f64 = M_WEIGHT_FIR_21.iter().sum();
        assert!((sum - 1.0).abs() < 0.05);
    }
}
