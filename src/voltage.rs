//! Conversion between millivolts and the 8-bit codes of the rated and
//! overdrive clamp voltage registers.
//!
//! Encoding rounds to the nearest step and saturates at `0xff`; decoding
//! rounds to the nearest millivolt.

/// Rated voltage resolution in µV per LSB
pub const RATED_VOLTAGE_STEP_UV: u32 = 21_330;

/// Overdrive clamp voltage resolution in µV per LSB
pub const CLAMP_VOLTAGE_STEP_UV: u32 = 5_600;

fn encode(millivolts: u16, step_uv: u32) -> u8 {
    let code = (u32::from(millivolts) * 1000 + step_uv / 2) / step_uv;
    if code > 0xff {
        0xff
    } else {
        code as u8
    }
}

fn decode(code: u8, step_uv: u32) -> u16 {
    ((u32::from(code) * step_uv + 500) / 1000) as u16
}

pub fn encode_rated_voltage_mv(millivolts: u16) -> u8 {
    encode(millivolts, RATED_VOLTAGE_STEP_UV)
}

pub fn decode_rated_voltage_mv(code: u8) -> u16 {
    decode(code, RATED_VOLTAGE_STEP_UV)
}

pub fn encode_clamp_voltage_mv(millivolts: u16) -> u8 {
    encode(millivolts, CLAMP_VOLTAGE_STEP_UV)
}

pub fn decode_clamp_voltage_mv(code: u8) -> u16 {
    decode(code, CLAMP_VOLTAGE_STEP_UV)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rated_voltage_examples() {
        assert_eq!(encode_rated_voltage_mv(3300), 155);
        assert_eq!(decode_rated_voltage_mv(155), 3306);
        assert_eq!(encode_rated_voltage_mv(0), 0);
    }

    #[test]
    fn clamp_voltage_examples() {
        assert_eq!(encode_clamp_voltage_mv(806), 144);
        assert_eq!(decode_clamp_voltage_mv(0x90), 806);
    }

    #[test]
    fn encode_saturates() {
        assert_eq!(encode_rated_voltage_mv(u16::MAX), 0xff);
        assert_eq!(encode_clamp_voltage_mv(1500), 0xff);
        assert_eq!(encode_clamp_voltage_mv(1428), 0xff);
    }

    #[test]
    fn decode_then_encode_is_stable_within_one_step() {
        for mv in (0..5400u16).step_by(7) {
            let back = decode_rated_voltage_mv(encode_rated_voltage_mv(mv));
            assert!((i32::from(back) - i32::from(mv)).abs() <= 11);
        }
        for code in 0..=255u8 {
            assert_eq!(encode_clamp_voltage_mv(decode_clamp_voltage_mv(code)), code);
        }
    }
}
