//! Main application for the Subtitle Uploader GUI

// HTTP client for the transcription service
mod api;
// Data models for job tasks, results, and UI events
mod model;
// Backend/model option tables
mod options;
// Job submission and status polling tasks
mod poller;
// Durable job handles for restart recovery
mod store;
// Track analysis types and labeling
mod tracks;

use model::{JobPhase, JobResult, JobTask, UiEvent, indicator_key};

// Asynchronous submit/poll tasks from the poller module
use poller::{run_job, watch_job};

use api::{ApiClient, SubmissionRequest};
use options::{BURN_TYPE_OPTIONS, ModelBackend, PROCESSOR_OPTIONS};
use store::{JobStore, StoredJob};
use tracks::{TrackDescriptor, partition_tracks};

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::Visuals;
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for media file selection dialogs
use rfd::FileDialog;
use std::{path::PathBuf, sync::Arc};
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and runtime, launches GUI
fn main() -> Result<(), eframe::Error> {
    // Structured logging, filtered by RUST_LOG (defaults to info)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Create a new Tokio runtime and store it globally
    let rt = Arc::new(Runtime::new().unwrap());
    RUNTIME.set(rt).unwrap();

    // Configure default native options for egui window
    let options = eframe::NativeOptions::default();
    // Run the application
    eframe::run_native(
        "Subtitle Uploader",
        options,
        Box::new(|cc| {
            // Use dark theme visuals
            let visuals = Visuals::dark();
            cc.egui_ctx.set_visuals(visuals);
            // Instantiate app state, re-attaching any persisted jobs
            Box::new(MyApp::new())
        }),
    )
}

/// Application state for the GUI
struct MyApp {
    /// Shared HTTP client for the transcription service
    api: Arc<ApiClient>,
    /// Durable job handles, for re-attaching poll loops after a restart
    store: JobStore,
    /// Event sender cloned into every spawned task
    events_tx: UnboundedSender<UiEvent>,
    /// Incoming task events, drained once per frame
    events_rx: UnboundedReceiver<UiEvent>,

    /// Target language codes, whitespace-separated
    langs_input: String,
    /// Source language code; empty lets the server auto-detect
    original_lang_input: String,
    /// Selected transcription backend
    selected_backend: ModelBackend,
    /// Selected model name; always one of the backend's options
    selected_model: String,
    /// Selected processing device
    selected_processor: String,
    /// Align subtitle timings after transcription
    align: bool,
    /// Selected subtitle burn type
    selected_burn_type: String,
    /// Media file picked for the next submission
    selected_file: Option<PathBuf>,
    /// Validation message shown under the submit button
    form_error: Option<String>,

    /// Audio tracks found in the selected file
    audio_tracks: Vec<TrackDescriptor>,
    /// Subtitle tracks found in the selected file
    subtitle_tracks: Vec<TrackDescriptor>,
    /// Track selectors are hidden until analysis reports ≥1 track
    show_track_ui: bool,
    /// Chosen audio stream index; None lets the server pick
    selected_audio_track: Option<u32>,
    /// Chosen subtitle stream index; None lets the server pick
    selected_subtitle_track: Option<u32>,
    /// Reuse the selected subtitle track instead of transcribing
    use_subtitles_only: bool,

    /// One indicator per submitted file, in submission order
    jobs: Vec<JobTask>,
    /// Append-only groups of completed-job output rows
    results: Vec<JobResult>,
    /// The results table stays hidden until the first completed job
    show_results: bool,
}

impl MyApp {
    /// Initial state: empty form with server defaults, plus a poll loop
    /// for every job handle left in the store by a previous run.
    fn new() -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        let backend = ModelBackend::FasterWhisper;

        let mut app = Self {
            api: Arc::new(ApiClient::from_env()),
            store: JobStore::from_env(),
            events_tx,
            events_rx,
            langs_input: String::new(),
            original_lang_input: String::new(),
            selected_backend: backend,
            selected_model: backend.default_model().to_string(),
            selected_processor: PROCESSOR_OPTIONS[0].to_string(),
            align: true,
            selected_burn_type: BURN_TYPE_OPTIONS[0].to_string(),
            selected_file: None,
            form_error: None,
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
            show_track_ui: false,
            selected_audio_track: None,
            selected_subtitle_track: None,
            use_subtitles_only: false,
            jobs: Vec::new(),
            results: Vec::new(),
            show_results: false,
        };
        app.rehydrate();
        app
    }

    /// Re-enter Processing for every persisted job handle.
    fn rehydrate(&mut self) {
        for StoredJob { job_id, filename } in self.store.load() {
            let key = indicator_key(&filename);
            self.upsert_task(&key, &filename, JobPhase::Processing);
            let api = Arc::clone(&self.api);
            let tx = self.events_tx.clone();
            RUNTIME
                .get()
                .unwrap()
                .spawn(watch_job(api, job_id, filename, key, tx));
        }
    }

    /// Reuse the indicator for `key` if one exists, otherwise append one.
    fn upsert_task(&mut self, key: &str, filename: &str, phase: JobPhase) {
        if let Some(task) = self.jobs.iter_mut().find(|t| t.key == key) {
            task.filename = filename.to_string();
            task.phase = phase;
        } else {
            self.jobs.push(JobTask {
                key: key.to_string(),
                filename: filename.to_string(),
                phase,
            });
        }
    }

    /// Update the indicator for `key`, if it still exists.
    fn set_phase(&mut self, key: &str, phase: JobPhase) {
        if let Some(task) = self.jobs.iter_mut().find(|t| t.key == key) {
            task.phase = phase;
        }
    }

    /// Apply one task event to the UI state.
    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::JobAccepted { key, job_id, filename } => {
                // Persist the handle so a restart can re-attach the poll loop
                self.store.add(StoredJob {
                    job_id,
                    filename: filename.clone(),
                });
                self.upsert_task(&key, &filename, JobPhase::Processing);
            }
            UiEvent::JobDone { key, job_id, result } => {
                self.store.remove(&job_id);
                self.set_phase(&key, JobPhase::Done);
                // Results are append-only; groups from other jobs stay put
                self.results.push(result);
                self.show_results = true;
            }
            UiEvent::JobFailed { key, job_id, message } => {
                if let Some(job_id) = job_id {
                    self.store.remove(&job_id);
                }
                self.set_phase(&key, JobPhase::Failed(message));
            }
            UiEvent::TracksAnalyzed { tracks } => {
                self.show_track_ui = !tracks.is_empty();
                let (audio, subtitle) = partition_tracks(&tracks);
                self.audio_tracks = audio;
                self.subtitle_tracks = subtitle;
                self.selected_audio_track = None;
                self.selected_subtitle_track = None;
                self.use_subtitles_only = false;
            }
            UiEvent::AnalyzeFailed => self.reset_track_ui(),
        }
    }

    /// Hide and clear the track selectors.
    fn reset_track_ui(&mut self) {
        self.show_track_ui = false;
        self.audio_tracks.clear();
        self.subtitle_tracks.clear();
        self.selected_audio_track = None;
        self.selected_subtitle_track = None;
        self.use_subtitles_only = false;
    }

    /// Kick off track analysis for a newly picked file. Each selection
    /// fully replaces the previous analyzer state; a failure only hides
    /// the selectors and never blocks submission.
    fn analyze_selected_file(&mut self, path: PathBuf, ctx: &egui::Context) {
        self.reset_track_ui();

        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        let ctx = ctx.clone();
        RUNTIME.get().unwrap().spawn(async move {
            match api.analyze(&path).await {
                Ok(tracks) => {
                    let _ = tx.send(UiEvent::TracksAnalyzed { tracks });
                }
                Err(err) => {
                    warn!(error = %err, "track analysis failed");
                    let _ = tx.send(UiEvent::AnalyzeFailed);
                }
            }
            ctx.request_repaint();
        });
    }

    /// Validate the form and spawn one submit/poll task.
    fn submit(&mut self) {
        // No file picked: visible validation error, no network call
        let Some(file_path) = self.selected_file.clone() else {
            self.form_error = Some("Select a media file first.".to_string());
            return;
        };
        self.form_error = None;

        let request = SubmissionRequest {
            file_path,
            langs: self.langs_input.trim().to_string(),
            original_lang: self.original_lang_input.trim().to_string(),
            model: self.selected_model.clone(),
            model_type: self.selected_backend,
            align: self.align,
            processor: self.selected_processor.clone(),
            subtitle_burn_type: self.selected_burn_type.clone(),
            audio_track: self.selected_audio_track,
            subtitle_track: self.selected_subtitle_track,
            use_subtitles_only: if self.show_track_ui && !self.subtitle_tracks.is_empty() {
                Some(self.use_subtitles_only)
            } else {
                None
            },
        };

        let filename = request.source_filename();
        let key = indicator_key(&filename);
        // Same-named re-submissions reuse the existing indicator
        self.upsert_task(&key, &filename, JobPhase::Uploading);

        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        RUNTIME.get().unwrap().spawn(run_job(api, request, key, tx));
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Drain task events before drawing
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }

        // 2️⃣ Right-side panel: one indicator per submitted file
        egui::SidePanel::right("jobs_panel").show(ctx, |ui| {
            ui.heading("Jobs");
            ui.separator();

            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                    for task in &self.jobs {
                        ui.group(|ui| {
                            ui.label(&task.filename);
                            ui.horizontal(|ui| {
                                if !task.phase.is_terminal() {
                                    ui.spinner();
                                }
                                let status_text = match &task.phase {
                                    JobPhase::Uploading => "⬆️ Uploading...".to_string(),
                                    JobPhase::Processing => "⏳ Processing...".to_string(),
                                    JobPhase::Done => "✅ Done".to_string(),
                                    JobPhase::Failed(message) => format!("❌ {message}"),
                                };
                                ui.label(status_text);
                            });
                        });
                    }
                });
        });

        // 3️⃣ Bottom panel: results table, revealed on first completion
        if self.show_results {
            egui::TopBottomPanel::bottom("results_panel").show(ctx, |ui| {
                ui.heading("Download Results");
                egui::ScrollArea::vertical()
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        egui::Grid::new("results_table").striped(true).show(ui, |ui| {
                            ui.strong("Source");
                            ui.strong("Time");
                            ui.strong("Output");
                            ui.strong("File");
                            ui.end_row();

                            for result in &self.results {
                                for (row_idx, row) in result.rows.iter().enumerate() {
                                    // The group's first row carries the source
                                    // filename and the processing time
                                    if row_idx == 0 {
                                        ui.label(&result.source_filename);
                                        match result.duration_seconds {
                                            Some(secs) => ui.label(format!("{secs} s")),
                                            None => ui.label(""),
                                        };
                                    } else {
                                        ui.label("");
                                        ui.label("");
                                    }
                                    ui.label(&row.label);
                                    ui.hyperlink_to(
                                        &row.filename,
                                        self.api.download_url(&row.filename),
                                    );
                                    ui.end_row();
                                }
                            }
                        });
                    });
            });
        }

        // 4️⃣ Main panel: the upload form
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Subtitle Uploader");

            ui.label("Target languages (space-separated, empty for none):");
            ui.text_edit_singleline(&mut self.langs_input);

            ui.label("Original language (empty to auto-detect):");
            ui.text_edit_singleline(&mut self.original_lang_input);

            // Backend selector; switching resets the model list and lands
            // on the new list's first entry
            ui.label("Model backend:");
            egui::ComboBox::from_id_source("backend")
                .selected_text(self.selected_backend.wire_name())
                .show_ui(ui, |ui| {
                    for backend in ModelBackend::ALL {
                        if ui
                            .selectable_value(&mut self.selected_backend, backend, backend.wire_name())
                            .changed()
                        {
                            self.selected_model = backend.default_model().to_string();
                        }
                    }
                });

            ui.label("Model:");
            egui::ComboBox::from_id_source("model")
                .selected_text(&self.selected_model)
                .show_ui(ui, |ui| {
                    for model in self.selected_backend.model_options() {
                        ui.selectable_value(&mut self.selected_model, model.to_string(), *model);
                    }
                });

            ui.label("Processor:");
            egui::ComboBox::from_id_source("processor")
                .selected_text(&self.selected_processor)
                .show_ui(ui, |ui| {
                    for processor in PROCESSOR_OPTIONS {
                        ui.selectable_value(&mut self.selected_processor, processor.to_string(), *processor);
                    }
                });

            ui.checkbox(&mut self.align, "Align subtitle timings");

            ui.label("Subtitle burn type:");
            egui::ComboBox::from_id_source("burn_type")
                .selected_text(&self.selected_burn_type)
                .show_ui(ui, |ui| {
                    for burn_type in BURN_TYPE_OPTIONS {
                        ui.selectable_value(&mut self.selected_burn_type, burn_type.to_string(), *burn_type);
                    }
                });

            // File selection; every pick re-runs track analysis
            ui.horizontal(|ui| {
                if ui.button("Choose media file…").clicked() {
                    if let Some(path) = FileDialog::new()
                        .add_filter(
                            "Media",
                            &["mp4", "mkv", "avi", "mov", "webm", "mp3", "wav", "m4a", "flac"],
                        )
                        .pick_file()
                    {
                        self.selected_file = Some(path.clone());
                        self.analyze_selected_file(path, ctx);
                    }
                }
                match &self.selected_file {
                    Some(path) => ui.label(
                        path.file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    ),
                    None => ui.label("no file selected"),
                };
            });

            // Track selectors, visible only when analysis found tracks
            if self.show_track_ui {
                ui.separator();
                ui.label("Audio track:");
                egui::ComboBox::from_id_source("audio_track")
                    .selected_text(track_selection_text(&self.audio_tracks, self.selected_audio_track))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.selected_audio_track, None, "server default");
                        for track in &self.audio_tracks {
                            ui.selectable_value(&mut self.selected_audio_track, Some(track.index), track.label());
                        }
                    });

                ui.label("Subtitle track:");
                egui::ComboBox::from_id_source("subtitle_track")
                    .selected_text(track_selection_text(&self.subtitle_tracks, self.selected_subtitle_track))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.selected_subtitle_track, None, "server default");
                        for track in &self.subtitle_tracks {
                            ui.selectable_value(&mut self.selected_subtitle_track, Some(track.index), track.label());
                        }
                    });

                if !self.subtitle_tracks.is_empty() {
                    ui.checkbox(
                        &mut self.use_subtitles_only,
                        "Use existing subtitles only (skip transcription)",
                    );
                }
            }

            ui.separator();

            // Submit button logic; validation runs before any network call
            if ui.button("Upload & Transcribe").clicked() {
                self.submit();
            }
            if let Some(message) = &self.form_error {
                ui.colored_label(egui::Color32::RED, message);
            }
        });

        // Request periodic repaint for job updates
        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}

/// Selector text for the currently chosen track, if any.
fn track_selection_text(tracks: &[TrackDescriptor], selected: Option<u32>) -> String {
    match selected {
        None => "server default".to_string(),
        Some(index) => tracks
            .iter()
            .find(|t| t.index == index)
            .map(|t| t.label())
            .unwrap_or_else(|| format!("#{index}")),
    }
}
