#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod recognizer;

#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraStream, available_cameras, start_camera_stream};
pub use recognizer::{latest_channel, start_recognizer};
