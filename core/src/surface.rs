//! Host-side model of the visual surface and the document around it
//!
//! A core draws into a [`Surface`] and receives keyboard input through
//! listeners on either the surface or the [`Document`]. Native hosts forward
//! their window events into [`Document::dispatch`] or
//! [`Surface::target`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    KeyDown { key_code: u32 },
    KeyUp { key_code: u32 },
    GamepadConnected { gamepad: Gamepad },
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::KeyDown { .. } => EventKind::KeyDown,
            HostEvent::KeyUp { .. } => EventKind::KeyUp,
            HostEvent::GamepadConnected { .. } => EventKind::GamepadConnected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    KeyUp,
    GamepadConnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gamepad {
    pub index: u32,
    pub id: String,
}

pub type Listener = Arc<dyn Fn(&HostEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Something listeners can be attached to.
#[derive(Default)]
pub struct EventTarget {
    listeners: Mutex<Vec<(ListenerId, EventKind, Listener)>>,
    next_id: AtomicU64,
}

impl EventTarget {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, EventKind, Listener)>> {
        self.listeners.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, kind, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _, _)| *existing != id);
        listeners.len() != before
    }

    /// Deliver an event to every matching listener; returns how many ran.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        // Listeners run outside the lock so they may add or remove listeners.
        let matching: Vec<Listener> = self
            .lock()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|(_, k, _)| *k == kind).count()
    }
}

/// The drawing surface a core renders into.
pub struct Surface {
    id: Option<String>,
    size: Mutex<Size>,
    attached: AtomicBool,
    target: EventTarget,
}

impl Surface {
    pub const DEFAULT_SIZE: Size = Size::new(640, 480);

    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    pub fn with_id(id: impl Into<String>) -> Arc<Self> {
        Self::build(Some(id.into()))
    }

    fn build(id: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            id,
            size: Mutex::new(Self::DEFAULT_SIZE),
            attached: AtomicBool::new(false),
            target: EventTarget::default(),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn size(&self) -> Size {
        *self.size.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_size(&self, size: Size) {
        *self.size.lock().unwrap_or_else(|p| p.into_inner()) = size;
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> &EventTarget {
        &self.target
    }
}

/// An element found in the document.
#[derive(Clone)]
pub enum Element {
    Surface(Arc<Surface>),
    Other { tag: String },
}

/// The page-level container: element lookup, global listeners and gamepads.
#[derive(Default)]
pub struct Document {
    elements: Mutex<HashMap<String, Element>>,
    target: EventTarget,
    gamepads: Mutex<Vec<Gamepad>>,
}

impl Document {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_element(&self, id: impl Into<String>, element: Element) {
        self.elements
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id.into(), element);
    }

    pub fn element_by_id(&self, id: &str) -> Option<Element> {
        self.elements
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(id)
            .cloned()
    }

    /// Attach a surface, registering it under its id when it has one.
    pub fn attach(&self, surface: &Arc<Surface>) {
        if let Some(id) = surface.id() {
            self.insert_element(id, Element::Surface(surface.clone()));
        }
        surface.attached.store(true, Ordering::SeqCst);
    }

    pub fn target(&self) -> &EventTarget {
        &self.target
    }

    pub fn dispatch(&self, event: &HostEvent) -> usize {
        self.target.dispatch(event)
    }

    /// Record a newly connected pad and notify listeners.
    pub fn connect_gamepad(&self, gamepad: Gamepad) {
        self.gamepads
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(gamepad.clone());
        self.dispatch(&HostEvent::GamepadConnected { gamepad });
    }

    pub fn connected_gamepads(&self) -> Vec<Gamepad> {
        self.gamepads
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
