//! # Compensation Algorithm
//!
//! 64-bit fixed-point conversion of raw BMP280 ADC codes into temperature and
//! pressure, as published in the sensor datasheet.
//!
//! ## Ordering
//!
//! The pressure stage consumes the *fine temperature* produced by the
//! temperature stage, so temperature is always compensated first. The fine
//! temperature never leaves this module.
//!
//! ## Exactness
//!
//! Integer truncation makes these formulas non-associative: every shift,
//! multiply and division below is kept in datasheet order. All intermediates
//! are `i64` and all shifts are arithmetic.

/// Mask for a 20-bit ADC code
const ADC_MASK: u32 = 0x000F_FFFF;

/// Size of the calibration block starting at register 0x88
pub const CALIBRATION_LEN: usize = 24;

/// Size of the raw data block starting at register 0xF7
pub const RAW_SAMPLE_LEN: usize = 6;

/// Factory trimming coefficients, read once per sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSet {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl CalibrationSet {
    /// Decode the little-endian calibration block (`dig_T1` .. `dig_P9`)
    pub fn from_bytes(b: &[u8; CALIBRATION_LEN]) -> Self {
        let u = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([b[i], b[i + 1]]);

        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }
}

/// One pair of raw 20-bit ADC codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    adc_temperature: u32,
    adc_pressure: u32,
}

impl RawSample {
    /// Create a sample, truncating both codes to 20 bits
    pub fn new(adc_temperature: u32, adc_pressure: u32) -> Self {
        Self {
            adc_temperature: adc_temperature & ADC_MASK,
            adc_pressure: adc_pressure & ADC_MASK,
        }
    }

    /// Rebuild both codes from the burst read at 0xF7..0xFC
    ///
    /// Layout: `press_msb, press_lsb, press_xlsb, temp_msb, temp_lsb, temp_xlsb`,
    /// where the xlsb byte carries the low nibble in its upper four bits.
    pub fn from_bytes(b: &[u8; RAW_SAMPLE_LEN]) -> Self {
        let code = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };

        Self::new(code(b[3], b[4], b[5]), code(b[0], b[1], b[2]))
    }

    pub fn adc_temperature(&self) -> u32 {
        self.adc_temperature
    }

    pub fn adc_pressure(&self) -> u32 {
        self.adc_pressure
    }
}

/// Compensated output of one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompensatedReading {
    /// Temperature in hundredths of a degree Celsius
    pub temperature_centidegrees: i32,
    /// Pressure in pascal, Q24.8 fixed point
    pub pressure_pa_q8: u32,
}

impl CompensatedReading {
    /// Temperature in °C
    pub fn temperature_c(&self) -> f64 {
        f64::from(self.temperature_centidegrees) / 100.0
    }

    /// Pressure in Pa
    pub fn pressure_pa(&self) -> f64 {
        f64::from(self.pressure_pa_q8) / 256.0
    }

    /// Pressure in hPa
    pub fn pressure_hpa(&self) -> f64 {
        self.pressure_pa() / 100.0
    }
}

/// Compensate one raw sample with the sensor's calibration
///
/// Pure and deterministic. A zero first-stage pressure divisor yields a
/// pressure of exactly 0 instead of dividing by zero.
pub fn compensate(calibration: &CalibrationSet, raw: &RawSample) -> CompensatedReading {
    let fine_temperature = fine_temperature(calibration, raw.adc_temperature);
    let temperature_centidegrees = ((fine_temperature * 5 + 128) >> 8) as i32;
    let pressure = compensate_pressure(calibration, raw.adc_pressure, fine_temperature);

    CompensatedReading {
        temperature_centidegrees,
        pressure_pa_q8: pressure.clamp(0, i64::from(u32::MAX)) as u32,
    }
}

fn fine_temperature(c: &CalibrationSet, adc_t: u32) -> i64 {
    let adc_t = i64::from(adc_t);
    let t1 = i64::from(c.t1);
    let t2 = i64::from(c.t2);
    let t3 = i64::from(c.t3);

    let v1 = (((adc_t >> 3) - (t1 << 1)) * t2) >> 11;
    let v2 = (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * t3) >> 14;
    v1 + v2
}

fn compensate_pressure(c: &CalibrationSet, adc_p: u32, fine_temperature: i64) -> i64 {
    let p1 = i64::from(c.p1);
    let p2 = i64::from(c.p2);
    let p3 = i64::from(c.p3);
    let p4 = i64::from(c.p4);
    let p5 = i64::from(c.p5);
    let p6 = i64::from(c.p6);
    let p7 = i64::from(c.p7);
    let p8 = i64::from(c.p8);
    let p9 = i64::from(c.p9);

    let mut v1 = fine_temperature - 128_000;
    let mut v2 = v1 * v1 * p6;
    v2 += (v1 * p5) << 17;
    v2 += p4 << 35;
    v1 = ((v1 * v1 * p3) >> 8) + ((v1 * p2) << 12);
    v1 = (((1i64 << 47) + v1) * p1) >> 33;
    if v1 == 0 {
        return 0;
    }

    let mut p = 1_048_576 - i64::from(adc_p);
    p = (((p << 31) - v2) * 3125) / v1;
    let v1 = (p9 * (p >> 13) * (p >> 13)) >> 25;
    let v2 = (p8 * p) >> 19;
    ((p + v1 + v2) >> 8) + (p7 << 4)
}

/// Altitude above the reference level from the barometric formula
///
/// `44330 * (1 - (p / p0) ^ 0.1903)`, decreasing monotonically with pressure.
pub fn altitude_m(pressure_hpa: f64, sea_level_hpa: f64) -> f64 {
    44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Datasheet reference coefficients
    pub fn datasheet_calibration() -> CalibrationSet {
        CalibrationSet {
            t1: 27504,
            t2: 26435,
            t3: -1000,
            p1: 36477,
            p2: -10685,
            p3: 3024,
            p4: 2855,
            p5: 140,
            p6: -7,
            p7: 15500,
            p8: -14500,
            p9: 6000,
        }
    }

    /// Datasheet reference ADC codes
    pub fn datasheet_sample() -> RawSample {
        RawSample::new(519_888, 415_148)
    }

    /// Calibration block bytes as they sit in the sensor's NVM
    pub fn datasheet_calibration_bytes() -> [u8; CALIBRATION_LEN] {
        let c = datasheet_calibration();
        let words: [[u8; 2]; 12] = [
            c.t1.to_le_bytes(),
            c.t2.to_le_bytes(),
            c.t3.to_le_bytes(),
            c.p1.to_le_bytes(),
            c.p2.to_le_bytes(),
            c.p3.to_le_bytes(),
            c.p4.to_le_bytes(),
            c.p5.to_le_bytes(),
            c.p6.to_le_bytes(),
            c.p7.to_le_bytes(),
            c.p8.to_le_bytes(),
            c.p9.to_le_bytes(),
        ];
        let mut bytes = [0u8; CALIBRATION_LEN];
        for (i, w) in words.iter().enumerate() {
            bytes[2 * i] = w[0];
            bytes[2 * i + 1] = w[1];
        }
        bytes
    }

    /// Raw data block for [`datasheet_sample`]
    pub const DATASHEET_RAW_BYTES: [u8; RAW_SAMPLE_LEN] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00];
}
