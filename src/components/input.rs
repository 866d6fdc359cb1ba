//! Single input-dispatch service. The host registers it once and feeds it
//! every pointer, wheel and key event; it forwards them to whichever tool is
//! active on the project.

use egui::{Key, Modifiers, PointerButton, Pos2};

use crate::project::{PointerPhase, Project, Shortcut};

/// Host-agnostic input event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerMoved {
        pos: Pos2,
        modifiers: Modifiers,
    },
    PointerPressed {
        pos: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerReleased {
        pos: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
    },
    Key {
        key: Key,
        modifiers: Modifiers,
        /// Keyboard focus is inside a text field.
        in_text_input: bool,
    },
    /// Positive `delta_y` scrolls down / zooms out.
    Wheel {
        delta_y: f32,
        modifiers: Modifiers,
    },
}

impl InputEvent {
    /// Translate a raw egui event. `modifiers` are the ones held when the
    /// event arrived (egui does not attach them to every variant).
    pub fn from_egui(event: &egui::Event, modifiers: Modifiers, in_text_input: bool) -> Option<Self> {
        match event {
            egui::Event::PointerMoved(pos) => Some(InputEvent::PointerMoved {
                pos: *pos,
                modifiers,
            }),
            egui::Event::PointerButton {
                pos,
                button,
                pressed,
                modifiers,
                ..
            } => Some(if *pressed {
                InputEvent::PointerPressed {
                    pos: *pos,
                    button: *button,
                    modifiers: *modifiers,
                }
            } else {
                InputEvent::PointerReleased {
                    pos: *pos,
                    button: *button,
                    modifiers: *modifiers,
                }
            }),
            egui::Event::Key {
                key,
                pressed: true,
                modifiers,
                ..
            } => Some(InputEvent::Key {
                key: *key,
                modifiers: *modifiers,
                in_text_input,
            }),
            egui::Event::Scroll(delta) if delta.y != 0.0 => Some(InputEvent::Wheel {
                delta_y: -delta.y,
                modifiers,
            }),
            egui::Event::Zoom(factor) if *factor != 1.0 => Some(InputEvent::Wheel {
                delta_y: if *factor > 1.0 { -1.0 } else { 1.0 },
                modifiers: Modifiers {
                    ctrl: true,
                    command: true,
                    ..modifiers
                },
            }),
            _ => None,
        }
    }
}

/// Routes input to the active tool of a [`Project`]. Tracks whether the
/// primary button is held so moves go to `tool_move` (anywhere) or `move`
/// (inside the canvas surface only).
#[derive(Debug, Default)]
pub struct InputDispatcher {
    attached: bool,
    button_held: bool,
}

impl InputDispatcher {
    /// A dispatcher that is already attached.
    pub fn new() -> Self {
        Self {
            attached: true,
            button_held: false,
        }
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Stop handling events. A held button is forgotten.
    pub fn detach(&mut self) {
        self.attached = false;
        self.button_held = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn button_held(&self) -> bool {
        self.button_held
    }

    /// Handle one event. Returns whether it reached the engine.
    pub fn dispatch(&mut self, project: &mut Project, event: InputEvent) -> bool {
        if !self.attached {
            return false;
        }
        match event {
            InputEvent::PointerMoved { pos, modifiers } => {
                if self.button_held {
                    project.pointer(PointerPhase::Drag, pos, modifiers);
                    true
                } else if project.area_contains(pos) {
                    project.pointer(PointerPhase::Hover, pos, modifiers);
                    true
                } else {
                    false
                }
            }
            InputEvent::PointerPressed {
                pos,
                button,
                modifiers,
            } => {
                if button != PointerButton::Primary || !project.area_contains(pos) {
                    return false;
                }
                self.button_held = true;
                project.pointer(PointerPhase::Down, pos, modifiers);
                true
            }
            InputEvent::PointerReleased { pos, modifiers, .. } => {
                let was_down = std::mem::take(&mut self.button_held);
                project.pointer(PointerPhase::Up { was_down }, pos, modifiers);
                true
            }
            InputEvent::Key {
                key,
                modifiers,
                in_text_input,
            } => {
                if !(modifiers.ctrl || modifiers.command) || in_text_input {
                    return false;
                }
                let Some(shortcut) = Shortcut::from_key(key) else { return false };
                project.shortcut(shortcut);
                true
            }
            InputEvent::Wheel { delta_y, modifiers } => project.wheel(delta_y, modifiers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};

    #[test]
    fn egui_scroll_up_is_negative_wheel() {
        let ev = InputEvent::from_egui(&egui::Event::Scroll(vec2(0.0, 3.0)), Modifiers::NONE, false);
        assert_eq!(
            ev,
            Some(InputEvent::Wheel {
                delta_y: -3.0,
                modifiers: Modifiers::NONE
            })
        );
    }

    #[test]
    fn egui_button_maps_to_press_and_release() {
        let press = egui::Event::PointerButton {
            pos: pos2(1.0, 2.0),
            button: PointerButton::Primary,
            pressed: true,
            modifiers: Modifiers::SHIFT,
        };
        assert!(matches!(
            InputEvent::from_egui(&press, Modifiers::NONE, false),
            Some(InputEvent::PointerPressed { modifiers, .. }) if modifiers.shift
        ));
    }

    #[test]
    fn egui_key_release_is_ignored() {
        let release = egui::Event::Key {
            key: Key::Z,
            pressed: false,
            repeat: false,
            modifiers: Modifiers::CTRL,
        };
        assert_eq!(InputEvent::from_egui(&release, Modifiers::CTRL, false), None);
    }
}
