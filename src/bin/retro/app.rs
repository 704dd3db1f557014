//! Event loop: terminal input in, session calls out.

use std::{
    collections::HashMap,
    io::stdout,
    path::PathBuf,
    time::{Duration, Instant},
};

use color_eyre::eyre::Result as EyreResult;
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        MouseButton, MouseEvent, MouseEventKind, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
};
use ratatui::{layout::Position, DefaultTerminal};

use retro_synth::{
    config::{save_preset, AppConfig},
    control::{Control, Orientation, PointerSample, PressControl, PressEvent, Toggle},
    engine::NativeEngine,
    notes::NoteId,
    params::{ParamId, Waveform},
    session::Session,
};

use crate::ui::{self, PanelLayout};

/// Without key-release reporting a held key is only visible through
/// auto-repeat; a key silent this long counts as released.
const HOLD_TIMEOUT: Duration = Duration::from_millis(600);
/// Terminal rows are coarse; one row of drag counts as this many pixels.
const ROW_PIXELS: f64 = 10.0;
const COLUMN_PIXELS: f64 = 5.0;
const NUDGE: f64 = 0.02;
const COARSE_NUDGE: f64 = 0.1;
const LEVEL_WINDOW: usize = 1024;

pub struct Slot {
    pub id: ParamId,
    pub control: Control,
}

pub struct Pad {
    pub key: String,
    pub pad: PressControl<NoteId>,
}

pub struct App {
    session: Session<NativeEngine>,
    pub slots: Vec<Slot>,
    pub pads: Vec<Pad>,
    pub focus: usize,
    dragging: Option<usize>,
    pub filter_on: Toggle,
    pub reverb_on: Toggle,
    held: HashMap<String, Instant>,
    key_release: bool,
    preset_path: PathBuf,
    level: Vec<f32>,
    pub status: String,
    layout: PanelLayout,
    should_quit: bool,
}

fn control_for(id: ParamId, value: f64, config: &AppConfig) -> Control {
    let controls = &config.controls;
    match id {
        ParamId::Volume => Control::slider(
            id.range(),
            Orientation::Vertical,
            value,
            controls.slider_settings(),
        ),
        ParamId::ReverbMix => Control::slider(
            id.range(),
            Orientation::Horizontal,
            value,
            controls.slider_settings(),
        ),
        _ => Control::knob(id.range(), value, controls.knob_settings()),
    }
}

fn key_name(code: KeyCode) -> Option<String> {
    match code {
        KeyCode::Char(c) => Some(c.to_lowercase().to_string()),
        _ => None,
    }
}

fn pointer(mouse: &MouseEvent) -> PointerSample {
    PointerSample::mouse(
        f64::from(mouse.column) * COLUMN_PIXELS,
        f64::from(mouse.row) * ROW_PIXELS,
    )
}

impl App {
    pub fn new(session: Session<NativeEngine>, config: &AppConfig, preset_path: PathBuf) -> Self {
        let params = session.params();
        let slots = ParamId::ALL
            .iter()
            .map(|&id| Slot {
                id,
                control: control_for(id, params.get(id), config),
            })
            .collect();
        let filter_on = Toggle::new(params.filter().enabled);
        let reverb_on = Toggle::new(params.reverb().enabled);
        let mut app = Self {
            session,
            slots,
            pads: Vec::new(),
            focus: 0,
            dragging: None,
            filter_on,
            reverb_on,
            held: HashMap::new(),
            key_release: false,
            preset_path,
            level: vec![0.0; LEVEL_WINDOW],
            status: String::from("play with the keyboard, drag knobs with the mouse"),
            layout: PanelLayout::default(),
            should_quit: false,
        };
        app.rebuild_pads();
        app
    }

    pub fn session(&self) -> &Session<NativeEngine> {
        &self.session
    }

    pub fn key_release_reported(&self) -> bool {
        self.key_release
    }

    pub fn report(&mut self, err: &dyn std::error::Error) {
        tracing::warn!(error = %err, "action failed");
        self.status = err.to_string();
    }

    fn rebuild_pads(&mut self) {
        self.pads = self
            .session
            .keys()
            .layout()
            .into_iter()
            .map(|(key, note)| Pad {
                key,
                pad: PressControl::new(note),
            })
            .collect();
    }

    /// Peak and RMS of the newest analyser samples.
    pub fn level(&self) -> (f32, f32) {
        if self.level.is_empty() {
            return (0.0, 0.0);
        }
        let peak = self.level.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (self.level.iter().map(|&x| x * x).sum::<f32>() / self.level.len() as f32).sqrt();
        (peak, rms)
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        execute!(stdout(), EnableMouseCapture, EnableFocusChange)?;
        self.key_release = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false);
        if self.key_release {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        tracing::info!(key_release = self.key_release, "ui started");

        let result = self.event_loop(terminal);

        if self.key_release {
            execute!(stdout(), PopKeyboardEnhancementFlags)?;
        }
        execute!(stdout(), DisableMouseCapture, DisableFocusChange)?;
        self.session.shutdown();
        result
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_level();
            self.expire_held_keys(Instant::now());

            let mut layout = PanelLayout::default();
            terminal.draw(|frame| layout = ui::draw(frame, self))?;
            self.layout = layout;

            if event::poll(Duration::from_millis(16))? {
                match event::read()? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::FocusLost => {
                        let released = self.session.release_all();
                        self.held.clear();
                        tracing::debug!(released, "focus lost");
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn poll_level(&mut self) {
        let mut window = std::mem::take(&mut self.level);
        match self.session.analyser_snapshot(&mut window) {
            Ok(n) => window.truncate(n),
            Err(err) => {
                tracing::debug!(error = %err, "analyser read failed");
                window.clear();
            }
        }
        window.resize(LEVEL_WINDOW, 0.0);
        self.level = window;
    }

    fn expire_held_keys(&mut self, now: Instant) {
        if self.key_release {
            return;
        }
        let expired: Vec<String> = self
            .held
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) >= HOLD_TIMEOUT)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.held.remove(&key);
            self.session.key_up(&key);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            if let Some(name) = key_name(key.code) {
                self.session.key_up(&name);
            }
            return;
        }
        let repeat = key.kind == KeyEventKind::Repeat;

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if !repeat {
                    self.save();
                }
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Tab => self.focus = (self.focus + 1) % self.slots.len(),
            KeyCode::BackTab => {
                self.focus = (self.focus + self.slots.len() - 1) % self.slots.len();
            }
            KeyCode::Up => self.nudge(NUDGE),
            KeyCode::Down => self.nudge(-NUDGE),
            KeyCode::PageUp => self.nudge(COARSE_NUDGE),
            KeyCode::PageDown => self.nudge(-COARSE_NUDGE),
            KeyCode::Left => self.shift_octave(-1),
            KeyCode::Right => self.shift_octave(1),
            KeyCode::Char(c @ '1'..='4') => {
                if !repeat {
                    self.toggle(c);
                }
            }
            code => {
                if let Some(name) = key_name(code) {
                    self.play_key(name, repeat);
                }
            }
        }
    }

    fn play_key(&mut self, name: String, repeat: bool) {
        let repeat = if self.key_release {
            repeat
        } else {
            // auto-repeat arrives as plain presses
            self.held.insert(name.clone(), Instant::now()).is_some()
        };
        if let Err(err) = self.session.key_down(&name, repeat) {
            self.report(&err);
        }
    }

    fn nudge(&mut self, fraction: f64) {
        let Some(slot) = self.slots.get_mut(self.focus) else {
            return;
        };
        let id = slot.id;
        let value = slot.control.nudge(fraction);
        self.apply(id, value);
    }

    fn apply(&mut self, id: ParamId, value: f64) {
        if let Err(err) = self.session.set_param(id, value) {
            self.report(&err);
        }
    }

    fn shift_octave(&mut self, delta: i32) {
        let released = self.session.release_all();
        self.held.clear();
        let shift = (self.session.keys().octave_shift() + delta).clamp(-3, 3);
        self.session.keys_mut().set_octave_shift(shift);
        self.rebuild_pads();
        tracing::debug!(shift, released, "octave shift");
    }

    fn toggle(&mut self, digit: char) {
        let result = match digit {
            '1' => {
                let next = self.session.params().oscillator().waveform.next();
                self.session.set_waveform(next)
            }
            '2' => {
                let on = !self.session.params().filter().enabled;
                let result = self.session.set_filter_enabled(on);
                // the store is the truth even when the engine write failed
                self.filter_on.set(self.session.params().filter().enabled);
                result
            }
            '3' => {
                let toggled = self.session.params().filter().filter_type.toggled();
                self.session.set_filter_type(toggled)
            }
            '4' => {
                let on = !self.session.params().reverb().enabled;
                let result = self.session.set_reverb_enabled(on);
                self.reverb_on.set(self.session.params().reverb().enabled);
                result
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.report(&err);
        }
    }

    fn save(&mut self) {
        match save_preset(&self.preset_path, self.session.params()) {
            Ok(()) => self.status = format!("saved {}", self.preset_path.display()),
            Err(err) => self.report(&err),
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let now = Instant::now();
        let at = Position::new(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(index) = self.layout.slot_at(at) {
                    self.focus = index;
                    self.dragging = Some(index);
                    self.slots[index].control.on_drag_start(pointer(&mouse), now);
                } else if let Some(index) = self.layout.pad_at(at) {
                    if let Some(PressEvent::On(note)) = self.pads[index].pad.press() {
                        self.pad_event(PressEvent::On(note));
                    }
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(index) = self.dragging {
                    let slot = &mut self.slots[index];
                    let id = slot.id;
                    if let Some(value) = slot.control.on_drag_move(pointer(&mouse), now) {
                        self.apply(id, value);
                    }
                    return;
                }
                let over = self.layout.pad_at(at);
                let left: Vec<PressEvent<NoteId>> = self
                    .pads
                    .iter_mut()
                    .enumerate()
                    .filter(|(i, _)| Some(*i) != over)
                    .filter_map(|(_, p)| p.pad.leave())
                    .collect();
                for event in left {
                    self.pad_event(event);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(index) = self.dragging.take() {
                    let slot = &mut self.slots[index];
                    let id = slot.id;
                    if let Some(value) = slot.control.on_drag_end(now) {
                        self.apply(id, value);
                    }
                }
                let released: Vec<PressEvent<NoteId>> = self
                    .pads
                    .iter_mut()
                    .filter(|p| p.pad.is_pressed())
                    .map(|p| p.pad.release())
                    .collect();
                for event in released {
                    self.pad_event(event);
                }
            }
            _ => {}
        }
    }

    fn pad_event(&mut self, event: PressEvent<NoteId>) {
        match event {
            PressEvent::On(note) => {
                if let Err(err) = self.session.note_on(note) {
                    self.report(&err);
                }
            }
            PressEvent::Off(note) => {
                self.session.note_off(note);
            }
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.session.params().oscillator().waveform
    }
}
