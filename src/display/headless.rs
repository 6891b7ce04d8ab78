use crate::display::{DisplayEvent, DisplayHost, WindowSetup};
use crate::geometry::{ScreenSize, WindowState};
use crate::model::ContentEntry;

/// Display host without a native window.
///
/// Keeps what a window would show and logs every change. Used when no
/// windowing backend is available and by tests.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    title: String,
    entries: Vec<ContentEntry>,
    current: usize,
    geometry: Option<WindowState>,
    screens: Vec<ScreenSize>,
    shown: usize,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend these screens are attached
    pub fn with_screens(mut self, screens: Vec<ScreenSize>) -> Self {
        self.screens = screens;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn entries(&self) -> &[ContentEntry] {
        &self.entries
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of events shown since the window opened
    pub fn shown_events(&self) -> usize {
        self.shown
    }
}

impl DisplayHost for HeadlessHost {
    fn open(&mut self, setup: &WindowSetup, entries: &[ContentEntry], current: usize) {
        self.title = setup.title.clone();
        self.entries = entries.to_vec();
        self.current = current;
        self.geometry = Some(WindowState {
            width: setup.width,
            height: setup.height,
            x: 0,
            y: 0,
        });
        tracing::info!(
            "Window '{}' opened at {}x{} with {} entr{}",
            setup.title,
            setup.width,
            setup.height,
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" }
        );
    }

    fn show(&mut self, event: &DisplayEvent) {
        match event {
            DisplayEvent::EntryAdded {
                entries,
                index,
                current_index,
            } => {
                tracing::info!(
                    "Showing {} entries, added '{}'",
                    entries.len(),
                    entries.get(*index).map(|e| e.name.as_str()).unwrap_or("")
                );
                self.current = *current_index;
            }
            DisplayEvent::ContentReplaced {
                entries,
                current_index,
            } => {
                tracing::info!(
                    "Showing '{}' ({} entries)",
                    entries
                        .get(*current_index)
                        .map(|e| e.name.as_str())
                        .unwrap_or(""),
                    entries.len()
                );
                self.current = *current_index;
            }
        }
        self.entries = event.entries().to_vec();
        self.shown += 1;
    }

    fn geometry(&self) -> Option<WindowState> {
        self.geometry
    }

    fn set_position(&mut self, x: i32, y: i32) {
        if let Some(geometry) = &mut self.geometry {
            geometry.x = x;
            geometry.y = y;
        }
    }

    fn screens(&self) -> Vec<ScreenSize> {
        self.screens.clone()
    }

    fn is_open(&self) -> bool {
        self.geometry.is_some()
    }
}
