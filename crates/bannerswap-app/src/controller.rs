//! The controller: single owner of the editing session and everything it
//! talks to.
//!
//! All editing happens here, on one thread. Decoding is handed to a
//! [`LoadWorker`]; its results come back through [`Controller::pump`].
//! Every upload bumps a generation counter and a document result whose
//! generation is no longer current is dropped.

use crate::config::AppConfig;
use crate::gallery::BannerGallery;
use crate::indicator::{IndicatorSlot, LoadingOperation, RenderTimeout};
use crate::notice::Notice;
use crate::worker::{LoadEvent, LoadJob, LoadOutcome, LoadWorker};
use bannerswap_core::{
    DocumentKind, DocumentLoader, EditingSession, EntityId, LoadError, LoadedDocument, PageRenderCache,
    SessionError, SessionResult, SessionState, ZDirection,
};
use bannerswap_render::{ExportEncoder, ExportError, ExportFormat, ExportOutput};
use kurbo::{Point, Vec2};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Controller errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("Unknown banner {0}")]
    UnknownBanner(String),
    #[error("Load worker stopped")]
    WorkerStopped,
}

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Editing commands.
#[derive(Debug, Clone)]
pub enum Command {
    UploadDocument { filename: String, bytes: Vec<u8> },
    UploadBanner { filename: String, bytes: Vec<u8> },
    /// Place a gallery banner by ID.
    PlaceBanner(String),
    SetSelectionMode(bool),
    SelectAt(Point),
    BeginDrag(Point),
    Drag(Point),
    EndDrag,
    DeleteSelected,
    Reorder(ZDirection),
    GoToPage(u32),
    NextPage,
    PreviousPage,
    /// Leave the editor: drop the session and any pending loads.
    Reset,
}

#[derive(Debug, Clone, Copy)]
enum PageStep {
    To(u32),
    Next,
    Previous,
}

/// Owns the session, page cache, loader worker and exporter.
pub struct Controller {
    config: AppConfig,
    session: EditingSession,
    document: Option<LoadedDocument>,
    cache: PageRenderCache,
    exporter: ExportEncoder,
    gallery: BannerGallery,
    worker: LoadWorker,
    indicator: IndicatorSlot,
    notices: Vec<Notice>,
    timeouts: Vec<RenderTimeout>,
    /// Last generation handed out.
    generation: u64,
    /// Generation of the newest document upload.
    document_generation: u64,
    in_flight: usize,
}

impl Controller {
    pub fn new(config: AppConfig, loader: DocumentLoader) -> Self {
        log::info!(
            "Starting controller (PDF support: {})",
            if loader.supports_pdf() { "yes" } else { "no" }
        );
        Self {
            session: EditingSession::new(config.editor.clone()),
            cache: PageRenderCache::new(config.editor.cache_ttl()),
            document: None,
            exporter: ExportEncoder::new(),
            gallery: BannerGallery::new(),
            worker: LoadWorker::spawn(loader),
            indicator: IndicatorSlot::new(),
            notices: Vec::new(),
            timeouts: Vec::new(),
            generation: 0,
            document_generation: 0,
            in_flight: 0,
            config,
        }
    }

    /// Replace the export encoder.
    pub fn with_exporter(mut self, exporter: ExportEncoder) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &EditingSession {
        &self.session
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn cache(&self) -> &PageRenderCache {
        &self.cache
    }

    pub fn gallery(&self) -> &BannerGallery {
        &self.gallery
    }

    pub fn indicator(&self) -> &IndicatorSlot {
        &self.indicator
    }

    /// Whether any upload is still being decoded.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Take all pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Take all indicator timeouts recorded so far.
    pub fn take_timeouts(&mut self) -> Vec<RenderTimeout> {
        std::mem::take(&mut self.timeouts)
    }

    /// Apply one command.
    pub fn handle(&mut self, command: Command) -> ControllerResult<()> {
        match command {
            Command::UploadDocument { filename, bytes } => self.upload_document(&filename, bytes).map(drop),
            Command::UploadBanner { filename, bytes } => self.upload_banner(&filename, bytes).map(drop),
            Command::PlaceBanner(id) => self.place_banner(&id).map(drop),
            Command::SetSelectionMode(enabled) => self.set_selection_mode(enabled),
            Command::SelectAt(point) => {
                self.session.select_at(point);
                Ok(())
            }
            Command::BeginDrag(point) => {
                self.session.begin_drag(point);
                Ok(())
            }
            Command::Drag(point) => {
                self.session.update_drag(point);
                Ok(())
            }
            Command::EndDrag => {
                self.session.end_drag();
                Ok(())
            }
            Command::DeleteSelected => self.delete_selected(),
            Command::Reorder(direction) => {
                self.reorder(direction);
                Ok(())
            }
            Command::GoToPage(page) => self.go_to_page(page).map(drop),
            Command::NextPage => self.next_page().map(drop),
            Command::PreviousPage => self.previous_page().map(drop),
            Command::Reset => {
                self.reset();
                Ok(())
            }
        }
    }

    fn notify(&mut self, notice: Notice) {
        log::warn!("{}", notice.message);
        self.notices.push(notice);
    }

    fn fail<T>(&mut self, notice: Notice, error: impl Into<ControllerError>) -> ControllerResult<T> {
        self.notify(notice);
        Err(error.into())
    }

    fn edit<T>(&mut self, op: impl FnOnce(&mut EditingSession) -> SessionResult<T>) -> ControllerResult<T> {
        match op(&mut self.session) {
            Ok(value) => Ok(value),
            Err(e) => self.fail(Notice::session_failed(&e), e),
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn submit(&mut self, job: LoadJob) -> ControllerResult<()> {
        if !self.worker.submit(job) {
            self.indicator.clear();
            return Err(ControllerError::WorkerStopped);
        }
        self.in_flight += 1;
        Ok(())
    }

    /// Start decoding a listing image or PDF. Any load still in flight is
    /// superseded. Returns the load's generation.
    pub fn upload_document(&mut self, filename: &str, bytes: Vec<u8>) -> ControllerResult<u64> {
        let kind = match DocumentKind::from_filename(filename) {
            Ok(kind) => kind,
            Err(e) => return self.fail(Notice::document_load_failed(&e), e),
        };
        let generation = self.next_generation();
        self.document_generation = generation;
        let operation = match kind {
            DocumentKind::Image(_) => LoadingOperation::ImageLoad,
            DocumentKind::Pdf => LoadingOperation::PdfLoad,
        };
        self.indicator
            .show(operation, generation, Instant::now(), &self.config.editor.timeouts);
        log::info!("Uploading {} (generation {})", filename, generation);
        self.submit(LoadJob::Document {
            generation,
            filename: filename.to_string(),
            bytes,
        })?;
        Ok(generation)
    }

    /// Start decoding a banner for the gallery.
    pub fn upload_banner(&mut self, filename: &str, bytes: Vec<u8>) -> ControllerResult<u64> {
        match DocumentKind::from_filename(filename) {
            Ok(DocumentKind::Image(_)) => {}
            Ok(DocumentKind::Pdf) => {
                let e = LoadError::UnsupportedFormat(filename.to_string());
                return self.fail(Notice::banner_load_failed(&e), e);
            }
            Err(e) => return self.fail(Notice::banner_load_failed(&e), e),
        }
        let generation = self.next_generation();
        self.indicator.show(
            LoadingOperation::BannerLoad,
            generation,
            Instant::now(),
            &self.config.editor.timeouts,
        );
        self.submit(LoadJob::Banner {
            generation,
            filename: filename.to_string(),
            bytes,
        })?;
        Ok(generation)
    }

    /// Apply finished loads and take down overdue indicators.
    pub fn pump(&mut self) -> usize {
        self.pump_at(Instant::now())
    }

    /// [`Controller::pump`] with an explicit clock.
    pub fn pump_at(&mut self, now: Instant) -> usize {
        if let Some(timeout) = self.indicator.expire(now) {
            log::warn!("Loading indicator timed out: {}", timeout);
            self.timeouts.push(timeout);
        }
        let events = self.worker.poll_events();
        let applied = events.len();
        for event in events {
            self.apply(event);
        }
        applied
    }

    /// Block until every queued load has finished or `limit` elapses.
    /// Returns true when nothing is left in flight.
    pub fn wait_idle(&mut self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while self.in_flight > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.worker.wait_event(deadline - now) {
                Some(event) => self.apply(event),
                None => break,
            }
            self.pump();
        }
        self.in_flight == 0
    }

    fn apply(&mut self, event: LoadEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.indicator.clear_for(event.generation);
        match event.outcome {
            LoadOutcome::Document(result) => {
                if event.generation != self.document_generation {
                    log::info!(
                        "Discarding stale load of {} (generation {}, current {})",
                        event.filename,
                        event.generation,
                        self.document_generation
                    );
                    return;
                }
                match result {
                    Ok(document) => self.install(document),
                    Err(e) => self.notify(Notice::document_load_failed(&e)),
                }
            }
            LoadOutcome::Banner(result) => match result {
                Ok(banner) => self.gallery.add(banner),
                Err(e) => self.notify(Notice::banner_load_failed(&e)),
            },
        }
    }

    /// Replace the session with one showing `document`.
    fn install(&mut self, document: LoadedDocument) {
        let mut session = EditingSession::new(self.config.editor.clone());
        if let Err(e) = session.load_document(&document, &mut self.cache) {
            self.cache.clear(document.id());
            self.notify(Notice::session_failed(&e));
            return;
        }
        if let Some(previous) = self.document.take() {
            self.cache.clear(previous.id());
        }
        self.session = session;
        self.document = Some(document);
    }

    /// Drop the session, the document and any loads still in flight.
    pub fn reset(&mut self) {
        if let Some(previous) = self.document.take() {
            self.cache.clear(previous.id());
        }
        self.document_generation = self.next_generation();
        self.indicator.clear();
        self.session.reset();
    }

    /// Place a gallery banner on the canvas.
    pub fn place_banner(&mut self, banner_id: &str) -> ControllerResult<EntityId> {
        let Some(banner) = self.gallery.get(banner_id).cloned() else {
            return Err(ControllerError::UnknownBanner(banner_id.to_string()));
        };
        self.edit(|session| session.add_overlay(banner))
    }

    pub fn set_selection_mode(&mut self, enabled: bool) -> ControllerResult<()> {
        self.edit(|session| session.set_selection_mode(enabled))
    }

    pub fn select_at(&mut self, point: Point) -> Option<EntityId> {
        self.session.select_at(point)
    }

    pub fn delete_selected(&mut self) -> ControllerResult<()> {
        self.edit(|session| session.delete_selected()).map(drop)
    }

    /// Returns false when nothing is selected.
    pub fn reorder(&mut self, direction: ZDirection) -> bool {
        self.session.reorder(direction)
    }

    pub fn move_selected(&mut self, delta: Vec2) -> ControllerResult<()> {
        self.edit(|session| session.move_selected(delta))
    }

    pub fn scale_selected(&mut self, factor: f64) -> ControllerResult<()> {
        self.edit(|session| session.scale_selected(factor))
    }

    pub fn go_to_page(&mut self, page: u32) -> ControllerResult<u32> {
        self.turn_page(PageStep::To(page))
    }

    pub fn next_page(&mut self) -> ControllerResult<u32> {
        self.turn_page(PageStep::Next)
    }

    pub fn previous_page(&mut self) -> ControllerResult<u32> {
        self.turn_page(PageStep::Previous)
    }

    fn turn_page(&mut self, step: PageStep) -> ControllerResult<u32> {
        let generation = self.next_generation();
        let Some(pdf) = self.document.as_ref().and_then(LoadedDocument::as_pdf) else {
            let e = if self.document.is_some() {
                SessionError::NotPaginated
            } else {
                SessionError::NoDocument
            };
            return self.fail(Notice::session_failed(&e), e);
        };
        self.indicator.show(
            LoadingOperation::PageRender,
            generation,
            Instant::now(),
            &self.config.editor.timeouts,
        );
        let result = match step {
            PageStep::To(page) => self
                .session
                .render_page(page, pdf, &mut self.cache)
                .map(|_| page),
            PageStep::Next => self.session.next_page(pdf, &mut self.cache),
            PageStep::Previous => self.session.previous_page(pdf, &mut self.cache),
        };
        self.indicator.clear_for(generation);
        match result {
            Ok(page) => Ok(page),
            Err(e) => self.fail(Notice::session_failed(&e), e),
        }
    }

    /// Export as an image after asking for a format. Any answer other than
    /// "png" or "jpg" cancels and returns `None`.
    pub fn export_image(&mut self, answer: &str) -> ControllerResult<Option<ExportOutput>> {
        if self.session.state() == SessionState::Empty {
            let e = ExportError::EmptyCanvas;
            return self.fail(Notice::export_failed(&e), e);
        }
        let Some(format) = ExportFormat::from_prompt(answer) else {
            log::debug!("Image export cancelled ({:?})", answer);
            return Ok(None);
        };
        self.export(format).map(Some)
    }

    /// Export as a single-page PDF, or PNG if the PDF cannot be built.
    pub fn export_pdf(&mut self) -> ControllerResult<ExportOutput> {
        self.export(ExportFormat::Pdf)
    }

    /// Export in `format`.
    pub fn export(&mut self, format: ExportFormat) -> ControllerResult<ExportOutput> {
        match self.exporter.export(&mut self.session, format) {
            Ok(output) => {
                if output.fallback.is_some() {
                    self.notify(Notice::pdf_fallback());
                }
                Ok(output)
            }
            Err(e) => self.fail(Notice::export_failed(&e), e),
        }
    }
}
