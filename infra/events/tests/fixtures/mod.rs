#![allow(dead_code, unreachable_pub)]

use herald_events::{
    Breakable, Cancellable, Capabilities, DispatchError, Event, ListenerResult, Subscriber,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Listener category used by most tests.
pub trait Recorder: Send + Sync {
    fn on_record(&self, event: &mut RecordEvent) -> ListenerResult;
}

/// Second, non-abortable category.
pub trait Observer: Send + Sync {
    fn on_observe(&self, event: &mut ObserveEvent) -> ListenerResult;
}

/// Abortable, cancellable event that records which listeners saw it.
#[derive(Debug, Default)]
pub struct RecordEvent {
    pub trail: Vec<&'static str>,
    pub flow: Breakable,
    pub veto: Cancellable,
}

impl Event for RecordEvent {
    type Listener = dyn Recorder;

    fn call(&mut self, listener: &dyn Recorder) -> ListenerResult {
        listener.on_record(self)
    }

    fn is_abort(&self) -> bool {
        self.flow.is_abort()
    }
}

#[derive(Debug, Default)]
pub struct ObserveEvent {
    pub count: usize,
}

impl Event for ObserveEvent {
    type Listener = dyn Observer;

    fn call(&mut self, listener: &dyn Observer) -> ListenerResult {
        listener.on_observe(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Record,
    Stop,
    Cancel,
    Fail,
    Panic,
}

/// Appends its name to the trail, then applies its action.
#[derive(Debug)]
pub struct Tag {
    pub name: &'static str,
    pub action: Action,
    pub calls: AtomicUsize,
}

impl Tag {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recorder for Tag {
    fn on_record(&self, event: &mut RecordEvent) -> ListenerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        event.trail.push(self.name);
        match self.action {
            Action::Record => Ok(()),
            Action::Stop => {
                event.flow.stop_handling();
                Ok(())
            },
            Action::Cancel => {
                event.veto.cancel();
                Ok(())
            },
            Action::Fail => Err(format!("{} failed", self.name).into()),
            Action::Panic => panic!("{} panicked", self.name),
        }
    }
}

impl Observer for Tag {
    fn on_observe(&self, event: &mut ObserveEvent) -> ListenerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        event.count += 1;
        Ok(())
    }
}

impl Subscriber for Tag {
    fn capabilities(self: Arc<Self>, capabilities: &mut Capabilities) {
        capabilities.serve::<dyn Recorder>(self.clone()).serve::<dyn Observer>(self);
    }
}

/// A listener that declares no categories.
#[derive(Debug)]
pub struct Mute;

impl Subscriber for Mute {
    fn capabilities(self: Arc<Self>, _capabilities: &mut Capabilities) {}
}

#[must_use]
pub fn tag(name: &'static str) -> Arc<Tag> {
    tag_with(name, Action::Record)
}

#[must_use]
pub fn tag_with(name: &'static str, action: Action) -> Arc<Tag> {
    Arc::new(Tag { name, action, calls: AtomicUsize::new(0) })
}

/// Collects every error passed to the error handler.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink(Arc<Mutex<Vec<String>>>);

impl ErrorSink {
    pub fn handler(&self) -> impl Fn(DispatchError) + Send + Sync + 'static {
        let sink = Arc::clone(&self.0);
        move |err| sink.lock().unwrap().push(err.to_string())
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
