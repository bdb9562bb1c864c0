mod capture_signature;

pub use capture_signature::{sign_capture, verify_capture, CaptureSignature, CaptureSignatureError};
