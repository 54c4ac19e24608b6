use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tickwork_core::timers::{load_definitions, spawn_definitions};
use tickwork_core::{ServiceConfig, TimerHandle, TimerService, TimerSnapshot};

/// Options for a simulated pump run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub definitions: PathBuf,
    pub frames: u64,
    pub fps: f64,
    pub time_scale: Option<f64>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames: u64,
    pub fired: u64,
    pub remaining: Vec<TimerSnapshot>,
}

/// Render an error with its source chain on one line
pub fn describe(err: &dyn Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Spawn the definitions at frame 0 and pump until every timer is gone or
/// `frames` frames have passed.
pub fn run(opts: &RunOptions) -> Result<RunSummary, String> {
    if opts.fps.is_nan() || opts.fps <= 0.0 {
        return Err(format!("fps must be positive, got {}", opts.fps));
    }

    let config = match &opts.config {
        Some(path) => ServiceConfig::load(path).map_err(|e| describe(&e))?,
        None => ServiceConfig::load_user_or_default(),
    };
    let service = TimerService::with_config(&config);
    if let Some(scale) = opts.time_scale {
        service.set_time_scale(scale);
    }
    service.set_fault_observer(|fault| tracing::error!(error = %fault, "timer fault"));

    let definitions = load_definitions(&opts.definitions).map_err(|e| describe(&e))?;

    let fired = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&fired);
    let frame_secs = 1.0 / opts.fps;
    let spawned = spawn_definitions(&service, &definitions, 0, 0.0, move |timer: &TimerHandle| {
        counter.fetch_add(1, Ordering::Relaxed);
        let name = timer.name().unwrap_or_default();
        tracing::info!(id = %timer.id(), name = %name, "timer fired");
    });
    tracing::info!(
        timers = spawned.len(),
        frames = opts.frames,
        fps = opts.fps,
        time_scale = service.time_scale(),
        "starting pump"
    );

    let mut frames = 0;
    for frame in 1..=opts.frames {
        frames = frame;
        let remaining = service.process_all(frame, frame as f64 * frame_secs);
        if remaining == 0 {
            tracing::info!(frame, "all timers finished");
            break;
        }
    }

    let remaining = service
        .ids()
        .into_iter()
        .filter_map(|id| service.find_by_id(id).and_then(|h| h.snapshot()))
        .collect();

    Ok(RunSummary {
        frames,
        fired: fired.load(Ordering::Relaxed),
        remaining,
    })
}

/// Parse and validate a definitions file
pub fn check(path: &Path) -> Result<usize, String> {
    let definitions = load_definitions(path).map_err(|e| describe(&e))?;
    for def in &definitions {
        tracing::debug!(name = %def.name, kind = ?def.kind, "definition ok");
    }
    Ok(definitions.len())
}

pub fn print_summary(summary: &RunSummary) -> Result<(), String> {
    println!(
        "pumped {} frames, {} firings, {} timers live",
        summary.frames,
        summary.fired,
        summary.remaining.len()
    );
    if !summary.remaining.is_empty() {
        let json = serde_json::to_string_pretty(&summary.remaining).map_err(|e| e.to_string())?;
        println!("{json}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_definitions(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("tickwork-cli-{}-{name}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn write_config(name: &str) -> PathBuf {
        write_definitions(&format!("{name}-config"), "time_scale = 1.0\nlog_faults = false\n")
    }

    #[test]
    fn run_pumps_until_done() {
        let defs = write_definitions(
            "done",
            "[[timer]]\nname = \"a\"\ndelay_ticks = 3\n\n[[timer]]\nname = \"b\"\nkind = \"repeat\"\nrepeat = 2\ndelay_ticks = 2\n",
        );
        let summary = run(&RunOptions {
            definitions: defs.clone(),
            frames: 100,
            fps: 60.0,
            time_scale: None,
            config: Some(write_config("done")),
        })
        .unwrap();

        assert_eq!(summary.fired, 3);
        assert_eq!(summary.frames, 4);
        assert!(summary.remaining.is_empty());
        let _ = std::fs::remove_file(defs);
    }

    #[test]
    fn run_reports_live_timers_when_frames_run_out() {
        let defs = write_definitions(
            "live",
            "[[timer]]\nname = \"tick\"\nkind = \"interval\"\ndelay_ticks = 1\n",
        );
        let summary = run(&RunOptions {
            definitions: defs.clone(),
            frames: 5,
            fps: 60.0,
            time_scale: None,
            config: Some(write_config("live")),
        })
        .unwrap();

        assert_eq!(summary.fired, 5);
        assert_eq!(summary.remaining.len(), 1);
        assert_eq!(summary.remaining[0].name, "tick");
        let _ = std::fs::remove_file(defs);
    }

    #[test]
    fn run_rejects_bad_fps_and_missing_file() {
        let opts = RunOptions {
            definitions: PathBuf::from("/nonexistent/defs.toml"),
            frames: 1,
            fps: 0.0,
            time_scale: None,
            config: None,
        };
        assert!(run(&opts).unwrap_err().contains("fps"));

        let err = check(Path::new("/nonexistent/defs.toml")).unwrap_err();
        assert!(err.starts_with("failed to read timer file"));
    }
}
