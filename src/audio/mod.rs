pub mod chirp;
pub mod device;
