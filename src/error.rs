use reqwest::StatusCode;
use thiserror::Error;

use crate::app_state::Phase;

/// Rejections raised while turning a file or frame into an [`crate::ImagePayload`].
#[derive(Debug, Error)]
pub enum InputError {
    #[error("The selected file is empty.")]
    Empty,

    #[error("Image is too large ({size} bytes). The limit is {limit} bytes.")]
    TooLarge { size: usize, limit: usize },

    #[error("The selected file is not a recognizable image.")]
    UnrecognizedFormat,

    #[error("Unsupported image type {0}. Please use JPG, PNG or WEBP.")]
    UnsupportedMediaType(String),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera access was denied. Please allow camera permissions and try again.")]
    PermissionDenied,

    #[error("No camera was found on this device.")]
    NotFound,

    #[error("Unable to access the camera: {0}")]
    Unavailable(String),

    #[error("The camera is not live.")]
    NotLive,

    #[error("Failed to read a frame from the camera: {0}")]
    Frame(String),

    #[error(transparent)]
    Input(#[from] InputError),
}

/// Failures of a single analysis call.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("API Key is missing. Please check your environment configuration.")]
    MissingCredential,

    #[error("API Key contains characters that cannot be sent in a request header.")]
    InvalidCredential,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Invalid service base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("API Error {status}: {message}")]
    Service { status: StatusCode, message: String },

    #[error("No response received from the analysis service.")]
    EmptyResponse,

    /// `reason` is kept for logs only; the display text stays generic.
    #[error("Failed to parse nutritional data.")]
    MalformedResponse { reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot submit a new image while {0:?}; reset first")]
pub struct TransitionError(pub Phase);

/// Why a submission never reached the analysis call.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
