mod common;

use std::any::Any;
use std::sync::{Arc, Mutex};

use aisound_lite::playback::{
    CallbackEvent, EventKind, Notification, PlaybackBridge, Synth, SynthRef,
};

use common::Recorder;

struct Synthesizer;

fn synth() -> Synth {
    Arc::new(Synthesizer)
}

fn weak(synth: &Synth) -> SynthRef {
    Arc::downgrade(synth)
}

#[test]
fn events_are_published_in_order() {
    let recorder = Recorder::default();
    let bridge = PlaybackBridge::new(recorder.handler());
    let synth = synth();
    bridge.set_synth(weak(&synth));
    bridge.speech_started();

    bridge.dispatch(CallbackEvent::unit_boundary(Some(5)));
    assert!(bridge.is_playing());
    assert_eq!(5, bridge.last_index());
    bridge.dispatch(CallbackEvent::unit_boundary(Some(12)));
    assert!(bridge.is_playing());
    assert_eq!(12, bridge.last_index());
    bridge.dispatch(CallbackEvent::utterance_finished());
    assert!(!bridge.is_playing());

    assert_eq!(vec!["index 5", "index 12", "done"], recorder.events());
}

#[test]
fn boundary_without_marker_resets_index_silently() {
    let recorder = Recorder::default();
    let bridge = PlaybackBridge::new(recorder.handler());
    let synth = synth();
    bridge.set_synth(weak(&synth));

    bridge.dispatch(CallbackEvent::unit_boundary(Some(7)));
    bridge.dispatch(CallbackEvent::unit_boundary(None));
    assert_eq!(0, bridge.last_index());
    bridge.dispatch(CallbackEvent::unit_boundary(Some(0)));
    assert_eq!(0, bridge.last_index());

    assert_eq!(vec!["index 7"], recorder.events());
}

#[test]
fn notifications_carry_the_synthesizer() {
    let received = Arc::new(Mutex::new(Vec::<Notification>::new()));
    let bridge = PlaybackBridge::new({
        let received = received.clone();
        move |notification: Notification| received.lock().unwrap().push(notification)
    });
    let synth = synth();
    bridge.set_synth(weak(&synth));

    bridge.dispatch(CallbackEvent::unit_boundary(Some(3)));
    bridge.dispatch(CallbackEvent::utterance_finished());

    let received = received.lock().unwrap();
    assert_eq!(2, received.len());
    for notification in received.iter() {
        assert!(Arc::ptr_eq(&synth, notification.synth()));
        assert!(notification.synth().downcast_ref::<Synthesizer>().is_some());
    }
    assert!(matches!(received[0], Notification::IndexReached { index: 3, .. }));
    assert!(matches!(received[1], Notification::DoneSpeaking { .. }));
}

#[test]
fn dead_synthesizer_gets_no_notifications() {
    let recorder = Recorder::default();
    let bridge = PlaybackBridge::new(recorder.handler());
    let synth = synth();
    bridge.set_synth(weak(&synth));
    drop(synth);

    bridge.speech_started();
    bridge.dispatch(CallbackEvent::unit_boundary(Some(4)));
    bridge.dispatch(CallbackEvent::utterance_finished());

    assert!(recorder.events().is_empty());
    assert_eq!(4, bridge.last_index());
    assert!(!bridge.is_playing());
}

#[test]
fn unset_synthesizer_gets_no_notifications() {
    let recorder = Recorder::default();
    let bridge = PlaybackBridge::new(recorder.handler());
    bridge.speech_cancelled();
    assert!(recorder.events().is_empty());
}

#[test]
fn cancellation_publishes_done() {
    let recorder = Recorder::default();
    let bridge = PlaybackBridge::new(recorder.handler());
    let synth = synth();
    bridge.set_synth(weak(&synth));

    bridge.speech_started();
    bridge.speech_cancelled();
    assert!(!bridge.is_playing());
    assert_eq!(vec!["done"], recorder.events());
}

#[test]
fn synthesizer_can_be_replaced() {
    let received = Arc::new(Mutex::new(Vec::<Synth>::new()));
    let bridge = PlaybackBridge::new({
        let received = received.clone();
        move |notification: Notification| received.lock().unwrap().push(notification.synth().clone())
    });
    let first = synth();
    let second: Arc<dyn Any + Send + Sync> = Arc::new(Synthesizer);

    bridge.set_synth(weak(&first));
    bridge.dispatch(CallbackEvent::utterance_finished());
    bridge.set_synth(weak(&second));
    bridge.dispatch(CallbackEvent::utterance_finished());

    let received = received.lock().unwrap();
    assert!(Arc::ptr_eq(&first, &received[0]));
    assert!(Arc::ptr_eq(&second, &received[1]));
}

#[test]
fn event_codes_match_the_engine() {
    assert_eq!(Some(EventKind::UnitBoundary), EventKind::from_code(0));
    assert_eq!(Some(EventKind::UtteranceFinished), EventKind::from_code(1));
    assert_eq!(None, EventKind::from_code(2));
    assert_eq!("unit_boundary", EventKind::UnitBoundary.to_string());
    let name: &'static str = EventKind::UtteranceFinished.into();
    assert_eq!("utterance_finished", name);
}
