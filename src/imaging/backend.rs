//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the catalog needs:
//! identify, transform, and thumbnail. All of them work on in-memory bytes so
//! the backend never touches storage.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests swap in a recording mock.

use super::params::{ThumbnailParams, TransformParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Unsupported rotation: {0} degrees (expected 0, 90, 180 or 270)")]
    InvalidRotation(u32),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// `Send + Sync + 'static` so a backend can be shared with the worker pool
/// behind an `Arc`.
pub trait ImageBackend: Send + Sync + 'static {
    /// Read pixel dimensions. Zero-area images are a decode error.
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError>;

    /// Run the stencil pipeline and return lossless output bytes.
    fn transform(&self, source: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError>;

    /// Render the catalog preview.
    fn thumbnail(&self, source: &[u8], params: &ThumbnailParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::Rotation;
    use std::sync::Mutex;

    /// Mock backend that records operations without decoding anything.
    ///
    /// `transform` output encodes the parameters so tests can tell which
    /// settings produced a stored asset. `failing_thumbnail` makes every
    /// thumbnail fail to encode.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        pub failing_thumbnail: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(usize),
        Transform {
            source_len: usize,
            params: TransformParams,
        },
        Thumbnail {
            source_len: usize,
            edge: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Bytes a mock transform produces for the given parameters.
        pub fn rendered(params: &TransformParams) -> Vec<u8> {
            format!(
                "rot={} mh={} mv={} b={} c={} t={}",
                params.rotation.degrees(),
                params.mirror_h,
                params.mirror_v,
                params.brightness.value(),
                params.contrast.value(),
                params.thermal_mode
            )
            .into_bytes()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(source.len()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::Decode("No mock dimensions".to_string()))
        }

        fn transform(
            &self,
            source: &[u8],
            params: &TransformParams,
        ) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Transform {
                source_len: source.len(),
                params: *params,
            });
            Ok(Self::rendered(params))
        }

        fn thumbnail(
            &self,
            source: &[u8],
            params: &ThumbnailParams,
        ) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Thumbnail {
                source_len: source.len(),
                edge: params.edge,
                quality: params.quality.value(),
            });
            if self.failing_thumbnail {
                return Err(BackendError::Encode("mock thumbnail failure".to_string()));
            }
            Ok(b"thumb".to_vec())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(b"abc").unwrap();
        assert_eq!(result.as_tuple(), (800, 600));

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Identify(3)]);
    }

    #[test]
    fn mock_identify_without_dimensions_is_decode_error() {
        let backend = MockBackend::new();
        assert!(matches!(
            backend.identify(b""),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn mock_transform_encodes_params() {
        let backend = MockBackend::new();
        let params = TransformParams {
            rotation: Rotation::Quarter,
            ..TransformParams::default()
        };

        let out = backend.transform(b"src", &params).unwrap();
        assert_eq!(out, MockBackend::rendered(&params));
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Transform { source_len: 3, params: p } if p.rotation == Rotation::Quarter
        ));
    }

    #[test]
    fn mock_thumbnail_can_fail_to_encode() {
        let backend = MockBackend {
            failing_thumbnail: true,
            ..MockBackend::new()
        };
        let params = ThumbnailParams::default();
        assert!(matches!(
            backend.thumbnail(b"src", &params),
            Err(BackendError::Encode(_))
        ));
    }
}
