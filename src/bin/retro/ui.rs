//! Panel rendering. Values, toggles, held notes and a level readout; no
//! scopes or envelope plots.

use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use retro_synth::{
    control::{mapping::format_value, ControlKind, KnobSweep},
    engine::{AudioEngine, ContextState},
};

use crate::app::App;

/// Screen areas from the last frame, for mouse hit testing.
#[derive(Debug, Default, Clone)]
pub struct PanelLayout {
    slots: Vec<Rect>,
    pads: Vec<Rect>,
}

impl PanelLayout {
    pub fn slot_at(&self, at: Position) -> Option<usize> {
        self.slots.iter().position(|r| r.contains(at))
    }

    pub fn pad_at(&self, at: Position) -> Option<usize> {
        self.pads.iter().position(|r| r.contains(at))
    }
}

fn on_off(on: bool) -> Span<'static> {
    if on {
        Span::styled("ON ", Style::default().fg(Color::Green))
    } else {
        Span::styled("OFF", Style::default().fg(Color::DarkGray))
    }
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let session = app.session();
    let params = session.params();
    let running = session.manager().engine().context_state() == ContextState::Running;
    let (peak, rms) = app.level();

    let line = Line::from(vec![
        Span::styled(
            format!(" {}  ", app.waveform().label()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("filter "),
        on_off(params.filter().enabled),
        Span::raw(format!(" {}  reverb ", params.filter().filter_type.label())),
        on_off(params.reverb().enabled),
        Span::styled(
            format!("  peak {peak:.2}  rms {rms:.2}  "),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            if running { "running" } else { "suspended" },
            Style::default().fg(if running { Color::Green } else { Color::Yellow }),
        ),
    ]);
    let block = Block::default().title(" retro ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_slots(frame: &mut Frame, area: Rect, app: &App) -> Vec<Rect> {
    let constraints = vec![Constraint::Ratio(1, app.slots.len() as u32); app.slots.len()];
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (i, (slot, cell)) in app.slots.iter().zip(cells.iter()).enumerate() {
        let focused = i == app.focus;
        let border = if slot.control.is_dragging() {
            Style::default().fg(Color::Yellow)
        } else if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let gesture = match slot.control.kind() {
            ControlKind::Knob => format!("{:+.0}°", slot.control.angle(KnobSweep::default())),
            ControlKind::Slider(_) => format!("{:.0}%", slot.control.normalized() * 100.0),
        };
        let text = vec![
            Line::from(format_value(slot.control.value(), slot.id.unit())),
            Line::from(Span::styled(gesture, Style::default().fg(Color::DarkGray))),
        ];
        let block = Block::default()
            .title(format!(" {} ", slot.id.label()))
            .borders(Borders::ALL)
            .border_style(border);
        frame.render_widget(Paragraph::new(text).block(block), *cell);
    }
    cells.to_vec()
}

fn render_pads(frame: &mut Frame, area: Rect, app: &App) -> Vec<Rect> {
    if app.pads.is_empty() {
        return Vec::new();
    }
    let constraints = vec![Constraint::Ratio(1, app.pads.len() as u32); app.pads.len()];
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let active = app.session().active_notes();
    for (pad, cell) in app.pads.iter().zip(cells.iter()) {
        let note = pad.pad.target();
        let style = if active.contains(&note) {
            Style::default().fg(Color::Black).bg(Color::Green)
        } else if note.pitch_class().ends_with('#') {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Black).bg(Color::White)
        };
        let text = vec![
            Line::from(Span::styled(
                pad.key.to_uppercase(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(note.to_string()),
        ];
        frame.render_widget(Paragraph::new(text).style(style), *cell);
    }
    cells.to_vec()
}

/// Draws the panel and returns where the controls ended up.
pub fn draw(frame: &mut Frame, app: &App) -> PanelLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // status
            Constraint::Length(4), // controls
            Constraint::Length(3), // keyboard
            Constraint::Length(1), // message
            Constraint::Length(1), // help
        ])
        .split(frame.area());

    render_status(frame, chunks[0], app);
    let slots = render_slots(frame, chunks[1], app);
    let pads = render_pads(frame, chunks[2], app);

    frame.render_widget(
        Paragraph::new(format!(" {}", app.status)).style(Style::default().fg(Color::Yellow)),
        chunks[3],
    );

    let release_hint = if app.key_release_reported() {
        ""
    } else {
        "  (notes release after a short hold)"
    };
    let help = Paragraph::new(format!(
        " [Tab] Focus  [Up/Down] Adjust  [Left/Right] Octave  [1] Wave  [2] Filter  [3] LP/HP  [4] Reverb  [Ctrl+S] Save  [Esc] Quit{release_hint}"
    ))
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[4]);

    PanelLayout { slots, pads }
}
