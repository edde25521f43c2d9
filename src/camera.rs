//! Live camera capture.
//!
//! The platform side (device enumeration, the actual video stream) sits behind
//! [`MediaDevices`], [`MediaStream`] and [`MediaTrack`]. [`CameraSession`]
//! owns the stream while it is open and guarantees every track is stopped
//! exactly once, whichever way the session ends.

use std::future::Future;

use image::{RgbImage, imageops::FilterType};
use log::{debug, info, warn};

use crate::{constants::CAPTURE_JPEG_QUALITY, error::CameraError, image_processor::ImagePayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    /// Rear camera.
    #[default]
    Environment,
    User,
}

#[derive(Debug, Clone, Default)]
pub struct StreamConstraints {
    pub facing: FacingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

pub trait MediaTrack: Send {
    fn stop(&mut self);
}

pub trait MediaStream: Send {
    type Track: MediaTrack;

    fn tracks_mut(&mut self) -> &mut [Self::Track];

    /// Resolution the hardware delivers, independent of how it is displayed.
    fn native_resolution(&self) -> Resolution;

    /// The most recent video frame.
    fn current_frame(&mut self) -> Result<RgbImage, CameraError>;
}

pub trait MediaDevices {
    type Stream: MediaStream;

    fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

/// Stops all tracks of the wrapped stream once, at the latest on drop.
struct StreamGuard<S: MediaStream> {
    stream: S,
    released: bool,
}

impl<S: MediaStream> StreamGuard<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            released: false,
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        let tracks = self.stream.tracks_mut();
        debug!("Stopping {} camera track(s)", tracks.len());
        for track in tracks {
            track.stop();
        }
        self.released = true;
    }
}

impl<S: MediaStream> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraState {
    Closed,
    Opening,
    Live,
    /// Closed after a failure; the message is meant for the capture UI.
    Failed(String),
}

pub struct CameraSession<D: MediaDevices> {
    devices: D,
    constraints: StreamConstraints,
    state: CameraState,
    stream: Option<StreamGuard<D::Stream>>,
    display_size: Option<Resolution>,
}

impl<D: MediaDevices> CameraSession<D> {
    pub fn new(devices: D) -> Self {
        Self::with_constraints(devices, StreamConstraints::default())
    }

    pub fn with_constraints(devices: D, constraints: StreamConstraints) -> Self {
        Self {
            devices,
            constraints,
            state: CameraState::Closed,
            stream: None,
            display_size: None,
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == CameraState::Live
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            CameraState::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn native_resolution(&self) -> Option<Resolution> {
        self.stream
            .as_ref()
            .map(|guard| guard.stream.native_resolution())
    }

    /// Size of the on-screen preview. Never used for captures.
    pub fn set_display_size(&mut self, size: Resolution) {
        self.display_size = Some(size);
    }

    pub fn display_size(&self) -> Option<Resolution> {
        self.display_size
    }

    /// Requests the camera. An already open stream is released first.
    ///
    /// If this future is dropped before the device answers the session stays
    /// `Opening` until [`CameraSession::close`] is called.
    pub async fn open(&mut self) -> Result<Resolution, CameraError> {
        self.release_stream();
        self.state = CameraState::Opening;
        info!("Opening camera ({:?} facing)", self.constraints.facing);

        match self.devices.open(&self.constraints).await {
            Ok(stream) => {
                let guard = StreamGuard::new(stream);
                let resolution = guard.stream.native_resolution();
                self.stream = Some(guard);
                self.state = CameraState::Live;
                info!(
                    "Camera live at {}x{}",
                    resolution.width, resolution.height
                );
                Ok(resolution)
            }
            Err(err) => {
                warn!("Camera unavailable: {}", err);
                self.state = CameraState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Snapshots the current frame at native resolution and closes the session.
    pub fn capture(&mut self) -> Result<ImagePayload, CameraError> {
        if self.state != CameraState::Live {
            return Err(CameraError::NotLive);
        }
        let Some(guard) = self.stream.as_mut() else {
            return Err(CameraError::NotLive);
        };

        let native = guard.stream.native_resolution();
        let result = guard
            .stream
            .current_frame()
            .and_then(|frame| draw_at_resolution(frame, native))
            .and_then(|canvas| {
                ImagePayload::from_frame(&canvas, CAPTURE_JPEG_QUALITY).map_err(CameraError::from)
            });

        match result {
            Ok(payload) => {
                self.close();
                Ok(payload)
            }
            Err(err) => {
                warn!("Capture failed: {}", err);
                self.release_stream();
                self.state = CameraState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Releases the hardware. Safe to call any number of times.
    pub fn close(&mut self) {
        self.release_stream();
        self.state = CameraState::Closed;
    }

    fn release_stream(&mut self) {
        if let Some(mut guard) = self.stream.take() {
            guard.release();
        }
    }
}

fn draw_at_resolution(frame: RgbImage, target: Resolution) -> Result<RgbImage, CameraError> {
    if target.width == 0 || target.height == 0 {
        return Err(CameraError::Frame(
            "stream reported no resolution".to_string(),
        ));
    }
    if frame.dimensions() == (target.width, target.height) {
        return Ok(frame);
    }
    debug!(
        "Scaling {}x{} frame to native {}x{}",
        frame.width(),
        frame.height(),
        target.width,
        target.height
    );
    Ok(image::imageops::resize(
        &frame,
        target.width,
        target.height,
        FilterType::Triangle,
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::image_processor::MediaType;

    pub(crate) struct MockTrack {
        stops: Arc<AtomicUsize>,
    }

    impl MediaTrack for MockTrack {
        // Counts every call so double stops show up in the tests.
        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) struct MockStream {
        tracks: Vec<MockTrack>,
        native: Resolution,
        frame: Option<Resolution>,
    }

    impl MediaStream for MockStream {
        type Track = MockTrack;

        fn tracks_mut(&mut self) -> &mut [MockTrack] {
            &mut self.tracks
        }

        fn native_resolution(&self) -> Resolution {
            self.native
        }

        fn current_frame(&mut self) -> Result<RgbImage, CameraError> {
            let size = self
                .frame
                .ok_or_else(|| CameraError::Frame("sensor returned nothing".to_string()))?;
            Ok(RgbImage::from_pixel(
                size.width,
                size.height,
                image::Rgb([90, 160, 60]),
            ))
        }
    }

    #[derive(Clone, Copy)]
    pub(crate) enum Behaviour {
        Grant,
        Deny,
        Hang,
    }

    #[derive(Clone)]
    pub(crate) struct MockDevices {
        pub(crate) behaviour: Behaviour,
        pub(crate) tracks_per_stream: usize,
        pub(crate) native: Resolution,
        pub(crate) frame: Option<Resolution>,
        pub(crate) opened_tracks: Arc<AtomicUsize>,
        pub(crate) stops: Arc<AtomicUsize>,
    }

    impl MockDevices {
        pub(crate) fn new(native: Resolution) -> Self {
            Self {
                behaviour: Behaviour::Grant,
                tracks_per_stream: 2,
                native,
                frame: Some(native),
                opened_tracks: Arc::new(AtomicUsize::new(0)),
                stops: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub(crate) fn opened(&self) -> usize {
            self.opened_tracks.load(Ordering::SeqCst)
        }

        pub(crate) fn stopped(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    impl MediaDevices for MockDevices {
        type Stream = MockStream;

        fn open(
            &self,
            constraints: &StreamConstraints,
        ) -> impl Future<Output = Result<MockStream, CameraError>> + Send {
            assert_eq!(constraints.facing, FacingMode::Environment);
            let devices = self.clone();
            async move {
                match devices.behaviour {
                    Behaviour::Deny => Err(CameraError::PermissionDenied),
                    Behaviour::Hang => std::future::pending().await,
                    Behaviour::Grant => {
                        let tracks = (0..devices.tracks_per_stream)
                            .map(|_| MockTrack {
                                stops: devices.stops.clone(),
                            })
                            .collect();
                        devices
                            .opened_tracks
                            .fetch_add(devices.tracks_per_stream, Ordering::SeqCst);
                        Ok(MockStream {
                            tracks,
                            native: devices.native,
                            frame: devices.frame,
                        })
                    }
                }
            }
        }
    }

    fn hd() -> Resolution {
        Resolution::new(1280, 720)
    }

    #[tokio::test]
    async fn open_then_close_stops_every_track() {
        let devices = MockDevices::new(hd());
        let mut session = CameraSession::new(devices.clone());

        assert_eq!(session.open().await.unwrap(), hd());
        assert!(session.is_live());
        session.close();

        assert_eq!(session.state(), &CameraState::Closed);
        assert_eq!(devices.opened(), 2);
        assert_eq!(devices.stopped(), devices.opened());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let devices = MockDevices::new(hd());
        let mut session = CameraSession::new(devices.clone());
        session.open().await.unwrap();

        session.close();
        session.close();
        session.close();

        assert_eq!(devices.stopped(), 2);
    }

    #[tokio::test]
    async fn rapid_reopen_releases_previous_stream() {
        let devices = MockDevices::new(hd());
        let mut session = CameraSession::new(devices.clone());

        session.open().await.unwrap();
        session.open().await.unwrap();
        session.open().await.unwrap();
        assert_eq!(devices.stopped(), 4);

        session.close();
        assert_eq!(devices.opened(), 6);
        assert_eq!(devices.stopped(), 6);
    }

    #[tokio::test]
    async fn dropping_live_session_stops_tracks() {
        let devices = MockDevices::new(hd());
        {
            let mut session = CameraSession::new(devices.clone());
            session.open().await.unwrap();
        }
        assert_eq!(devices.stopped(), devices.opened());
    }

    #[tokio::test]
    async fn capture_uses_native_resolution_not_display_size() {
        let mut devices = MockDevices::new(hd());
        devices.frame = Some(Resolution::new(640, 360));
        let mut session = CameraSession::new(devices.clone());
        session.set_display_size(Resolution::new(320, 180));
        session.open().await.unwrap();

        let payload = session.capture().unwrap();
        let decoded = image::load_from_memory(payload.bytes()).unwrap();

        assert_eq!(session.display_size(), Some(Resolution::new(320, 180)));
        assert_eq!((decoded.width(), decoded.height()), (1280, 720));
        assert!(!payload.is_empty());
        assert_eq!(payload.media_type(), MediaType::Jpeg);
        assert_eq!(session.state(), &CameraState::Closed);
        assert_eq!(devices.stopped(), 2);
    }

    #[tokio::test]
    async fn only_one_capture_per_session() {
        let devices = MockDevices::new(hd());
        let mut session = CameraSession::new(devices.clone());
        session.open().await.unwrap();

        session.capture().unwrap();
        assert!(matches!(session.capture(), Err(CameraError::NotLive)));
        assert_eq!(devices.stopped(), 2);
    }

    #[tokio::test]
    async fn denied_access_fails_without_reserving_hardware() {
        let mut devices = MockDevices::new(hd());
        devices.behaviour = Behaviour::Deny;
        let mut session = CameraSession::new(devices.clone());

        let err = session.open().await.unwrap_err();
        assert!(matches!(err, CameraError::PermissionDenied));
        assert!(session.error_message().unwrap().contains("denied"));
        assert_eq!(devices.opened(), 0);

        session.close();
        assert_eq!(session.state(), &CameraState::Closed);
    }

    #[tokio::test]
    async fn failed_frame_grab_releases_stream() {
        let mut devices = MockDevices::new(hd());
        devices.frame = None;
        let mut session = CameraSession::new(devices.clone());
        session.open().await.unwrap();

        assert!(matches!(session.capture(), Err(CameraError::Frame(_))));
        assert!(matches!(session.state(), CameraState::Failed(_)));
        assert_eq!(devices.stopped(), 2);
    }

    #[tokio::test]
    async fn abandoned_open_leaves_nothing_reserved() {
        let mut devices = MockDevices::new(hd());
        devices.behaviour = Behaviour::Hang;
        let mut session = CameraSession::new(devices.clone());

        let timed_out = tokio::time::timeout(Duration::from_millis(20), session.open()).await;
        assert!(timed_out.is_err());
        assert_eq!(session.state(), &CameraState::Opening);

        session.close();
        assert_eq!(session.state(), &CameraState::Closed);
        assert_eq!(devices.opened(), 0);
        assert_eq!(devices.stopped(), 0);
    }

    #[test]
    fn capture_while_closed_is_rejected() {
        let mut session = CameraSession::new(MockDevices::new(hd()));
        assert!(matches!(session.capture(), Err(CameraError::NotLive)));
    }
}
