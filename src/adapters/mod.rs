pub mod camera;
pub mod frames;
pub mod haptics;
pub mod http;
pub mod speech;
pub mod still;
#[cfg(feature = "v4l2")]
pub mod v4l2;
