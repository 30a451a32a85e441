use std::sync::{Arc, mpsc};

use eframe::egui::Pos2;
use genfill::EditError;
use genfill::ops::edit_api::{EditService, MockEditService};
use genfill::session::{EditSession, SessionState, SubmitOutcome};
use genfill::settings::EditorSettings;
use image::{Rgba, RgbaImage};

fn session() -> EditSession {
    let settings = EditorSettings {
        square_size: 64,
        initial_scale: 1.0,
        ..EditorSettings::default()
    };
    let mut session = EditSession::new(settings);
    session.load_image(RgbaImage::from_pixel(64, 48, Rgba([10, 20, 30, 255])));
    session
}

#[test]
fn request_on_worker_thread_applies_when_polled() {
    let mut session = session();
    session.set_brush_width(10.0);
    session.pointer_down(Pos2::ZERO, Pos2::new(32.0, 24.0));
    session.pointer_move(Pos2::ZERO, Pos2::new(40.0, 24.0));
    session.pointer_up();

    let mock = Arc::new(MockEditService::new(vec![RgbaImage::from_pixel(
        64,
        64,
        Rgba([200, 0, 0, 255]),
    )]));
    let ticket = session.begin_submit("a red square").unwrap();

    let (tx, rx) = mpsc::channel();
    let service: Arc<dyn EditService> = mock.clone();
    rayon::spawn(move || {
        let outcome = service.request_edit(&ticket.request);
        let _ = tx.send((ticket.id, outcome));
    });

    // a second submission while the first is out is refused
    assert!(matches!(
        session.begin_submit("again"),
        Err(EditError::SubmissionInFlight)
    ));
    // pointer input is ignored while loading
    session.pointer_down(Pos2::ZERO, Pos2::new(5.0, 5.0));
    assert!(session.is_loading());

    let (id, outcome) = rx.recv().unwrap();
    assert_eq!(
        session.finish_submit(id, outcome),
        SubmitOutcome::Applied { candidates: 1 }
    );
    assert_eq!(mock.calls(), 1);
    assert_eq!(session.state(), SessionState::Idle);
    let canvas = session.canvas().unwrap();
    assert_eq!(canvas.dimensions(), (64, 48));
    assert!(canvas.pixels().all(|p| *p == Rgba([200, 0, 0, 255])));
}

#[test]
fn loading_a_new_image_makes_reply_stale() {
    let mut session = session();
    let ticket = session.begin_submit("").unwrap();
    let mock = MockEditService::new(vec![RgbaImage::new(64, 64)]);
    let outcome = mock.request_edit(&ticket.request);

    session.load_image(RgbaImage::from_pixel(64, 64, Rgba([1, 1, 1, 255])));
    assert_eq!(session.finish_submit(ticket.id, outcome), SubmitOutcome::Discarded);
    assert!(session.results().is_empty());
    assert!(!session.is_loading());
    assert_eq!(*session.canvas().unwrap().get_pixel(0, 0), Rgba([1, 1, 1, 255]));
}
