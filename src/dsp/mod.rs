pub mod calibration;
pub mod correlate;
pub mod spectrum;
