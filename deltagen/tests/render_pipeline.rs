use deltagen::models::render_plan::RenderPlan;
use deltagen::models::render_preset::{PresetEntry, RenderPresetDraft};
use deltagen::models::status::{Status, Summary};
use deltagen::models::variant::Variant;
use deltagen::render_log::LOG_FILE_NAME;
use deltagen::timing::plan_seconds;
use deltagen::{Channel, DeltaGen, DeltaGenConfig, Worker};
use image::{Rgb, RgbImage};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Stand-in for DeltaGen: confirms variants and renders `IMAGE` commands into real PNG files.
#[derive(Clone, Default)]
struct FakeDeltaGen {
    sent: Arc<Mutex<Vec<String>>>,
    last: Option<String>,
    offline: bool,
    // IMAGE commands to leave unrendered, by 1 based position
    skip: Vec<usize>,
    never_render: bool,
    rendered: usize,
    // stops answering for good once this many IMAGE commands went out
    offline_after: Option<usize>,
    // liveness probes to ignore once rendering started
    missed_probes: usize,
}

impl FakeDeltaGen {
    fn render(&mut self, command: &str) {
        let Some(rest) = command.strip_prefix("IMAGE \"") else {
            return;
        };
        let Some((path, size)) = rest.split_once('"') else {
            return;
        };
        self.rendered += 1;
        if self.never_render || self.skip.contains(&self.rendered) {
            return;
        }
        let mut size = size.trim().trim_end_matches(';').split_whitespace();
        let width = size.next().and_then(|w| w.parse().ok()).unwrap_or(1);
        let height = size.next().and_then(|h| h.parse().ok()).unwrap_or(1);
        RgbImage::from_pixel(width, height, Rgb([30, 60, 90]))
            .save(path)
            .unwrap();
    }

    fn is_offline(&self) -> bool {
        self.offline || self.offline_after.is_some_and(|n| self.rendered >= n)
    }

    fn commands(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Channel for FakeDeltaGen {
    fn connect(&mut self) -> bool {
        !self.is_offline()
    }

    fn send(&mut self, command: &str) {
        self.sent.lock().unwrap().push(command.to_owned());
        self.render(command);
        self.last = Some(command.to_owned());
    }

    fn receive(&mut self, _timeout: Duration) -> Option<String> {
        let command = self.last.take()?;
        let body = command.strip_prefix("VARIANT ")?.trim_end_matches(';');
        let (name, value) = body.split_once(' ')?;
        Some(format!(r#"EVENT variant_state "Scene" "{name}" "{value}""#))
    }

    fn is_alive(&mut self, _timeout: Duration) -> bool {
        if self.rendered > 0 && self.missed_probes > 0 {
            self.missed_probes -= 1;
            return false;
        }
        !self.is_offline()
    }

    fn close(&mut self) {}
}

fn config() -> DeltaGenConfig {
    DeltaGenConfig {
        connect_retries: 1,
        probe_timeout_ms: 1,
        command_delay_ms: 0,
        confirmation_timeout_ms: 10,
        poll_interval_ms: 10,
        ..Default::default()
    }
}

fn draft(
    name: &str,
    entries: &[(&str, Vec<Variant>)],
    viewsets: &[&str],
    sampling: &str,
    resolution: &str,
) -> RenderPresetDraft {
    let presets = entries
        .iter()
        .enumerate()
        .map(|(i, (name, variants))| (i, PresetEntry::new(*name, variants.clone())))
        .collect();
    RenderPresetDraft {
        name: name.to_owned(),
        viewsets: viewsets.iter().map(|v| v.to_string()).collect(),
        presets,
        sampling: Some(sampling.to_owned()),
        resolution: Some(resolution.to_owned()),
        file_extension: Some("png".to_owned()),
    }
}

fn plan(drafts: Vec<RenderPresetDraft>) -> RenderPlan {
    let drafts = drafts.into_iter().enumerate().collect::<BTreeMap<_, _>>();
    RenderPlan::try_from_drafts(drafts).unwrap()
}

fn collect(worker: &Worker) -> Vec<Status> {
    let mut events = Vec::new();
    while let Some(status) = worker.next_status(Duration::from_secs(10)) {
        let terminal = status.is_terminal();
        events.push(status);
        if terminal {
            break;
        }
    }
    events
}

fn file_names(summary: &Summary) -> Vec<String> {
    summary
        .images
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn image_command(dir: &Path, name: &str, resolution: &str) -> String {
    format!("IMAGE \"{}\" {resolution};", dir.join(name).to_string_lossy())
}

#[test]
fn single_preset_end_to_end() {
    let out = tempfile::tempdir().unwrap();
    let plan = plan(vec![draft(
        "Beauty",
        &[
            ("Exterior", vec![Variant::new("Paint", "red")]),
            ("Interior", vec![Variant::new("Seats", "leather")]),
            ("Night", Vec::new()),
        ],
        &[],
        "3",
        "1280 720",
    )]);
    let config = config();
    let expected = 1280.0 * 8.0 * config.machine_factor * 1280.0 * config.res_factor * 3.0;
    assert!((plan_seconds(&plan, &config) - expected).abs() < 1e-9);

    let fake = FakeDeltaGen::default();
    let worker = DeltaGen::new(config).render_with(fake.clone(), plan, out.path().to_path_buf());
    let events = collect(&worker);
    let summary = worker.join().unwrap();

    assert_eq!(
        fake.commands(),
        vec![
            "SUBSCRIBE VARIANT_STATE;".to_owned(),
            "IMAGE_SAA_QUALITY VIEWER 8;".to_owned(),
            "VARIANT Paint red;".to_owned(),
            image_command(out.path(), "001_Exterior.png", "1280 720"),
            "VARIANT Seats leather;".to_owned(),
            image_command(out.path(), "002_Interior.png", "1280 720"),
            image_command(out.path(), "003_Night.png", "1280 720"),
            "SIZE VIEWER 1280 720;UNFREEZE VIEWER;".to_owned(),
        ]
    );
    assert!(matches!(events.first(), Some(Status::Estimated { images: 3, .. })));
    assert!(matches!(events.last(), Some(Status::Finished(_))));
    let confirmed = events
        .iter()
        .filter(|e| matches!(e, Status::Dispatched(r) if r.is_confirmed()))
        .count();
    assert_eq!(confirmed, 2);
    assert_eq!(
        file_names(&summary),
        vec!["001_Exterior.png", "002_Interior.png", "003_Night.png"]
    );
    assert_eq!((summary.sent, summary.total, summary.failed), (3, 3, 0));
    assert_eq!(
        image::image_dimensions(&summary.images[0]).unwrap(),
        (1280, 720)
    );

    let log = fs::read_to_string(out.path().join(LOG_FILE_NAME)).unwrap();
    assert!(log.contains(&summary.run_id.to_string()));
    assert!(log.contains("001_Exterior.png"));
    assert!(log.contains("Seats leather"));
}

#[test]
fn counter_runs_across_render_presets() {
    let out = tempfile::tempdir().unwrap();
    let plan = plan(vec![
        draft(
            "A",
            &[("Exterior", vec![Variant::new("Paint", "blue")])],
            &["VIEWSET Front;", "VIEWSET \"Rear Left\";"],
            "0",
            "64 32",
        ),
        draft("B", &[("Interior", Vec::new())], &[], "1", "32 16"),
    ]);

    let fake = FakeDeltaGen::default();
    let worker = DeltaGen::new(config()).render_with(fake.clone(), plan, out.path().to_path_buf());
    collect(&worker);
    let summary = worker.join().unwrap();

    assert_eq!(
        file_names(&summary),
        vec![
            "001_Exterior_Front.png",
            "002_Exterior_Rear_Left.png",
            "003_Interior.png"
        ]
    );
    assert!(summary.images.iter().all(|p| p.exists()));

    // variants go out again before every viewset, the viewset right before the image
    let commands = fake.commands();
    let variants = commands.iter().filter(|c| c.starts_with("VARIANT")).count();
    assert_eq!(variants, 2);
    let rear = commands
        .iter()
        .position(|c| c == "VIEWSET \"Rear Left\";")
        .unwrap();
    assert!(commands[rear + 1].starts_with("IMAGE \""));
    assert!(commands.contains(&"IMAGE_SAA_QUALITY VIEWER 2;".to_owned()));
}

#[test]
fn abort_while_waiting_for_a_file_tears_down() {
    let out = tempfile::tempdir().unwrap();
    let plan = plan(vec![draft(
        "Slow",
        &[
            ("First", vec![Variant::new("Paint", "red")]),
            ("Second", vec![Variant::new("Paint", "green")]),
        ],
        &[],
        "2",
        "64 32",
    )]);
    let config = DeltaGenConfig {
        poll_interval_ms: 50,
        ..config()
    };

    let fake = FakeDeltaGen {
        never_render: true,
        ..Default::default()
    };
    let worker = DeltaGen::new(config).render_with(fake.clone(), plan, out.path().to_path_buf());

    let waiting = Instant::now();
    while !fake.commands().iter().any(|c| c.starts_with("IMAGE \"")) {
        assert!(waiting.elapsed() < Duration::from_secs(5));
        thread::sleep(Duration::from_millis(5));
    }
    let sent_before = fake.commands().len();

    let aborted_at = Instant::now();
    worker.abort();
    assert!(worker.wait(Duration::from_secs(1)));
    assert!(aborted_at.elapsed() < Duration::from_millis(500));

    let events = collect(&worker);
    assert!(matches!(events.last(), Some(Status::Aborted(s)) if s.connected && s.sent == 0));

    let after = fake.commands()[sent_before..].to_vec();
    assert_eq!(after, vec!["SIZE VIEWER 1280 720;UNFREEZE VIEWER;".to_owned()]);
}

#[test]
fn no_connection_ends_before_any_side_effect() {
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("renders");
    let plan = plan(vec![draft("A", &[("Exterior", Vec::new())], &[], "0", "8 8")]);

    let fake = FakeDeltaGen {
        offline: true,
        ..Default::default()
    };
    let worker = DeltaGen::new(config()).render_with(fake.clone(), plan, target.clone());
    let events = collect(&worker);

    assert!(events
        .iter()
        .any(|e| matches!(e, Status::NoConnection { .. })));
    assert!(matches!(events.last(), Some(Status::Aborted(s)) if !s.connected));
    assert!(fake.commands().is_empty());
    assert!(!target.exists());
}

#[test]
fn failed_image_is_logged_and_the_run_continues() {
    let out = tempfile::tempdir().unwrap();
    let plan = plan(vec![draft(
        "A",
        &[("One", Vec::new()), ("Two", Vec::new())],
        &[],
        "0",
        "8 8",
    )]);
    let config = DeltaGenConfig {
        verify_timeout_secs: 0,
        ..config()
    };

    let fake = FakeDeltaGen {
        skip: vec![1],
        ..Default::default()
    };
    let worker = DeltaGen::new(config).render_with(fake, plan, out.path().to_path_buf());
    let events = collect(&worker);
    let summary = worker.join().unwrap();

    assert!(events
        .iter()
        .any(|e| matches!(e, Status::ImageFailed { counter: 1, .. })));
    assert!(matches!(events.last(), Some(Status::Finished(_))));
    assert_eq!(file_names(&summary), vec!["002_Two.png"]);
    assert_eq!(summary.failed, 1);

    let log = fs::read_to_string(out.path().join(LOG_FILE_NAME)).unwrap();
    assert!(log.contains("FAILED 001_One.png"));
}

#[test]
fn separate_directories_and_conversion() {
    let out = tempfile::tempdir().unwrap();
    let plan = plan(vec![
        draft("Front Views", &[("Exterior", Vec::new())], &[], "0", "16 8"),
        draft("Interior", &[("Cockpit", Vec::new())], &[], "0", "16 8"),
    ]);
    let config = DeltaGenConfig {
        separate_directories: true,
        convert_to: Some("jpg".to_owned()),
        ..config()
    };

    let worker = DeltaGen::new(config).render_with(
        FakeDeltaGen::default(),
        plan,
        out.path().to_path_buf(),
    );
    collect(&worker);
    let summary = worker.join().unwrap();

    let expected: Vec<PathBuf> = vec![
        out.path().join("Front_Views").join("001_Exterior.png"),
        out.path().join("Interior").join("002_Cockpit.png"),
    ];
    assert_eq!(summary.images, expected);
    for image in &expected {
        assert!(image.with_extension("jpg").exists());
        assert!(image.parent().unwrap().join(LOG_FILE_NAME).exists());
    }
}

fn two_presets() -> RenderPlan {
    plan(vec![
        draft("A", &[("Exterior", Vec::new())], &[], "0", "8 8"),
        draft("B", &[("Interior", Vec::new())], &[], "0", "8 8"),
    ])
}

#[test]
fn peer_lost_between_render_presets_ends_the_run() {
    let out = tempfile::tempdir().unwrap();
    let fake = FakeDeltaGen {
        offline_after: Some(1),
        ..Default::default()
    };

    let started = Instant::now();
    let worker =
        DeltaGen::new(config()).render_with(fake.clone(), two_presets(), out.path().to_path_buf());
    let events = collect(&worker);
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(events
        .iter()
        .any(|e| matches!(e, Status::NoConnection { .. })));
    assert!(matches!(
        events.last(),
        Some(Status::Aborted(s)) if !s.connected && s.sent == 1
    ));
    let images = fake
        .commands()
        .iter()
        .filter(|c| c.starts_with("IMAGE \""))
        .count();
    assert_eq!(images, 1);
}

#[test]
fn missed_probe_reconnects_and_prepares_the_viewer_again() {
    let out = tempfile::tempdir().unwrap();
    let fake = FakeDeltaGen {
        missed_probes: 1,
        ..Default::default()
    };

    let worker =
        DeltaGen::new(config()).render_with(fake.clone(), two_presets(), out.path().to_path_buf());
    let events = collect(&worker);
    let summary = worker.join().unwrap();

    assert!(matches!(events.last(), Some(Status::Finished(_))));
    assert_eq!(file_names(&summary), vec!["001_Exterior.png", "002_Interior.png"]);
    let subscribes = fake
        .commands()
        .iter()
        .filter(|c| c.as_str() == "SUBSCRIBE VARIANT_STATE;")
        .count();
    assert_eq!(subscribes, 2);
}
