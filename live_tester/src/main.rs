use anyhow::{Context, Result};
use image::RgbImage;
use opencv::{
    core::{self, Mat, Rect, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use signal_watch::{
    Controller, FramePoll, FrameSource, Overlay, OverlayKind, Point, PointerEvent, PointerQueue,
    SourceSpec, SqliteSink, Surface, SurfaceControl, WatchConfig, WatchError, WatchResult,
};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "signal_watch=info,live_tester=info";

fn main() -> Result<()> {
    // --- 1. Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    // --- 2. Configuration ---
    // Usage: live_tester [<camera index | video path>] [<database path>]
    let mut config = WatchConfig::from_env().context("invalid SW_* configuration")?;
    let args: Vec<String> = env::args().collect();
    if let Some(source) = args.get(1) {
        config.source = source.parse().context("invalid frame source argument")?;
    }
    if let Some(database) = args.get(2) {
        config.database_path = PathBuf::from(database);
    }
    info!(?config, "starting signal watch");

    // --- 3. Event Sink ---
    let sink = SqliteSink::open(&config.database_path).with_context(|| {
        format!("could not open event database {}", config.database_path.display())
    })?;

    // --- 4. Video I/O Initialization ---
    let source = CaptureSource::open(&config.source)
        .with_context(|| format!("could not open frame source {:?}", config.source))?;

    let controller =
        Controller::new(sink).with_max_consecutive_misses(config.max_consecutive_misses);
    let mut surface = WindowSurface::open(&config, controller.pointer_queue())
        .context("could not open display window")?;

    // --- 5. Main Processing Loop ---
    let outcome = controller.run(source, &mut surface);
    surface.close();
    let stats = outcome?;

    println!(
        "Watch finished ({:?}): {} frames, {} missed, {} transitions recorded in {}",
        stats.exit,
        stats.ticks,
        stats.missed_frames,
        stats.events_recorded,
        config.database_path.display()
    );
    Ok(())
}

fn cv_source_err(error: opencv::Error) -> WatchError {
    WatchError::Source(error.to_string())
}

fn cv_surface_err(error: opencv::Error) -> WatchError {
    WatchError::Surface(error.to_string())
}

/// Frames from an OpenCV capture device or video file.
struct CaptureSource {
    cap: VideoCapture,
    /// Files end when a read fails; cameras are allowed to drop frames.
    is_file: bool,
    frame: Mat,
}

impl CaptureSource {
    fn open(spec: &SourceSpec) -> WatchResult<Self> {
        let (cap, is_file) = match spec {
            SourceSpec::Camera(index) => (
                VideoCapture::new(*index, videoio::CAP_ANY).map_err(cv_source_err)?,
                false,
            ),
            SourceSpec::File(path) => (
                VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
                    .map_err(cv_source_err)?,
                true,
            ),
        };
        if !cap.is_opened().map_err(cv_source_err)? {
            return Err(WatchError::Source(format!("{spec:?} could not be opened")));
        }
        Ok(Self {
            cap,
            is_file,
            frame: Mat::default(),
        })
    }

    fn not_read(&self) -> FramePoll {
        if self.is_file {
            FramePoll::End
        } else {
            FramePoll::Missed
        }
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self) -> WatchResult<FramePoll> {
        if !self.cap.read(&mut self.frame).map_err(cv_source_err)? || self.frame.empty() {
            return Ok(self.not_read());
        }

        // Convert the OpenCV Mat (BGR) to a packed RGB buffer for the watcher.
        let mut rgb = Mat::default();
        imgproc::cvt_color(&self.frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(cv_source_err)?;
        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let buffer = rgb.data_bytes().map_err(cv_source_err)?.to_vec();

        match RgbImage::from_raw(width, height, buffer) {
            Some(image) => Ok(FramePoll::Frame(image)),
            None => {
                warn!(width, height, "captured frame has an unexpected layout");
                Ok(self.not_read())
            }
        }
    }

    fn release(mut self) -> WatchResult<()> {
        self.cap.release().map_err(cv_source_err)
    }
}

/// A HighGUI window with pointer input, optionally mirrored to a video file.
struct WindowSurface {
    window_name: String,
    quit_key: i32,
    record_path: Option<PathBuf>,
    writer: Option<VideoWriter>,
}

impl WindowSurface {
    fn open(config: &WatchConfig, queue: PointerQueue) -> WatchResult<Self> {
        highgui::named_window(&config.window_name, highgui::WINDOW_AUTOSIZE).map_err(cv_surface_err)?;
        highgui::set_mouse_callback(
            &config.window_name,
            Some(Box::new(move |event, x, y, _flags| {
                let pos = Point::new(x, y);
                match event {
                    highgui::EVENT_LBUTTONDOWN => queue.push(PointerEvent::Down(pos)),
                    highgui::EVENT_MOUSEMOVE => queue.push(PointerEvent::Move(pos)),
                    highgui::EVENT_LBUTTONUP => queue.push(PointerEvent::Up(pos)),
                    _ => {}
                }
            })),
        )
        .map_err(cv_surface_err)?;

        Ok(Self {
            window_name: config.window_name.clone(),
            quit_key: config.quit_key as i32,
            record_path: config.record_path.clone(),
            writer: None,
        })
    }

    /// Lazily opens the recording writer once the frame size is known.
    fn writer_for(&mut self, size: core::Size) -> WatchResult<Option<&mut VideoWriter>> {
        if self.writer.is_none() {
            if let Some(path) = &self.record_path {
                let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v').map_err(cv_surface_err)?;
                let writer = VideoWriter::new(&path.to_string_lossy(), fourcc, 30.0, size, true)
                    .map_err(cv_surface_err)?;
                info!(path = %path.display(), "recording annotated stream");
                self.writer = Some(writer);
            }
        }
        Ok(self.writer.as_mut())
    }

    fn close(mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(error) = writer.release() {
                warn!(%error, "could not finalise recording");
            }
        }
        if let Err(error) = highgui::destroy_all_windows() {
            warn!(%error, "could not close display window");
        }
    }
}

impl Surface for WindowSurface {
    fn present(&mut self, frame: &RgbImage, overlays: &[Overlay]) -> WatchResult<()> {
        // --- 1. Back to a BGR Mat ---
        let mut rgb = Mat::new_rows_cols_with_default(
            frame.height() as i32,
            frame.width() as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(cv_surface_err)?;
        rgb.data_bytes_mut()
            .map_err(cv_surface_err)?
            .copy_from_slice(frame.as_raw());
        let mut output_frame = Mat::default();
        imgproc::cvt_color(&rgb, &mut output_frame, imgproc::COLOR_RGB2BGR, 0).map_err(cv_surface_err)?;

        // --- 2. Overlays ---
        for overlay in overlays {
            draw_overlay(&mut output_frame, overlay).map_err(cv_surface_err)?;
        }

        // --- 3. Show and record ---
        highgui::imshow(&self.window_name, &output_frame).map_err(cv_surface_err)?;
        let size = output_frame.size().map_err(cv_surface_err)?;
        if let Some(writer) = self.writer_for(size)? {
            writer.write(&output_frame).map_err(cv_surface_err)?;
        }
        Ok(())
    }

    fn poll(&mut self) -> WatchResult<SurfaceControl> {
        let key = highgui::wait_key(1).map_err(cv_surface_err)?;
        if key >= 0 && (key & 0xFF) == self.quit_key {
            Ok(SurfaceControl::Quit)
        } else {
            Ok(SurfaceControl::Continue)
        }
    }
}

fn draw_overlay(frame: &mut Mat, overlay: &Overlay) -> opencv::Result<()> {
    let rect = Rect::new(
        overlay.rect.x,
        overlay.rect.y,
        overlay.rect.width as i32,
        overlay.rect.height as i32,
    );
    match overlay.kind {
        OverlayKind::Region { id, flags } => {
            let color = Scalar::new(0.0, 255.0, 0.0, 0.0); // Green
            imgproc::rectangle(frame, rect, color, 2, imgproc::LINE_8, 0)?;
            let label = format!("#{} {}/3", id, flags.stage());
            imgproc::put_text(
                frame,
                &label,
                core::Point::new(rect.x, (rect.y - 4).max(12)),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.45,
                color,
                1,
                imgproc::LINE_8,
                false,
            )?;
        }
        OverlayKind::Provisional => {
            let color = Scalar::new(0.0, 255.0, 255.0, 0.0); // Yellow
            imgproc::rectangle(frame, rect, color, 1, imgproc::LINE_8, 0)?;
        }
    }
    Ok(())
}
