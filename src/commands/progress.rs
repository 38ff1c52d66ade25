//! Progress rendering
//!
//! Stages run on a worker thread and report through a bounded channel; the
//! main thread drains it into indicatif bars until the stage drops its sink.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mspflash_core::progress::DEFAULT_CAPACITY;
use mspflash_core::{progress_channel, ProgressEvent, ProgressReceiver, ProgressSink};
use std::time::Duration;

/// Create a byte progress bar style
fn create_bytes_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
        .progress_chars("#>-"))
}

/// Create a percentage bar style for tool phases
fn create_phase_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
        .progress_chars("#>-"))
}

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

/// Percentage carried by a tool line such as `Writing at 0x00010000... (42 %)`
pub fn tick_percent(line: &str) -> Option<u64> {
    let head = line[..line.rfind('%')?].trim_end();
    let start = head.rfind(['(', ' ']).map(|i| i + 1).unwrap_or(0);
    let value: f32 = head[start..].parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u64)
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    download_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            download_bar: None,
        }
    }

    fn create_phase_bar(&mut self, message: String) {
        self.finish("done");
        let pb = self.multi.add(ProgressBar::new(100));
        pb.set_style(create_phase_style().unwrap_or_else(|_| ProgressStyle::default_bar()));
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn create_spinner(&mut self, message: String) {
        self.finish("done");
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()));
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            if let Some(len) = pb.length() {
                pb.set_position(len);
            }
            pb.finish_with_message(format!("{} ({})", pb.message(), message));
        }
    }

    fn download(&mut self, downloaded: u64, total: Option<u64>) {
        let pb = self.download_bar.get_or_insert_with(|| {
            let pb = match total {
                Some(total) => {
                    let pb = ProgressBar::new(total);
                    pb.set_style(
                        create_bytes_style().unwrap_or_else(|_| ProgressStyle::default_bar()),
                    );
                    pb
                }
                None => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::default_spinner()
                            .template("{spinner:.green} {bytes} ({bytes_per_sec})")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    pb
                }
            };
            self.multi.add(pb)
        });
        pb.set_position(downloaded);
    }

    /// Render one event
    pub fn handle(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Message(msg) => match &self.current_bar {
                Some(pb) => pb.set_message(msg),
                None => {
                    let _ = self.multi.println(msg);
                }
            },
            ProgressEvent::Download { downloaded, total, .. } => self.download(downloaded, total),
            ProgressEvent::Extracting => {
                if let Some(pb) = self.download_bar.take() {
                    pb.finish();
                }
                self.create_spinner("Extracting package...".to_string());
            }
            ProgressEvent::Phase(phase) => self.create_phase_bar(phase.to_string()),
            ProgressEvent::ToolTick(line) => {
                if let Some(pb) = &self.current_bar {
                    match (pb.length(), tick_percent(&line)) {
                        (Some(_), Some(percent)) => pb.set_position(percent),
                        _ => pb.set_message(line),
                    }
                }
            }
            ProgressEvent::Erasing => {
                self.create_spinner("Erasing flash (this may take a while)...".to_string())
            }
            ProgressEvent::Finished { succeeded } => {
                if let Some(pb) = self.download_bar.take() {
                    pb.finish();
                }
                if succeeded {
                    self.finish("done");
                } else if let Some(pb) = self.current_bar.take() {
                    pb.abandon_with_message(format!("{} (failed)", pb.message()));
                }
            }
        }
    }

    /// Render events until every sink is dropped
    pub fn run(mut self, rx: ProgressReceiver) {
        for event in rx {
            self.handle(event);
        }
        if let Some(pb) = self.download_bar.take() {
            pb.finish();
        }
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `stage` on a worker thread while rendering its progress here
pub fn with_progress<T, F>(stage: F) -> T
where
    T: Send,
    F: FnOnce(ProgressSink) -> T + Send,
{
    let (sink, rx) = progress_channel(DEFAULT_CAPACITY);
    std::thread::scope(|s| {
        let worker = s.spawn(move || stage(sink));
        IndicatifProgress::new().run(rx);
        worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}
