use crate::client::AppSnapshot;
use coinflip_client::{
    events::CoinSide,
    game::{
        Phase,
        STAKE_PRESETS,
    },
    view::{
        FeedRow,
        FeedView,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};

pub type InputEventReceiver = EventStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    ChooseSide(CoinSide),
    ToggleSide,
    PresetStake(usize),
    OpenStakeModal,
    SetStake(String),
    Flip,
    Settle,
    Withdraw,
    RefreshBalance,
    OpenHowToPlay,
    Redraw,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    phase: Phase,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    StakeModal(StakeState),
    HowToPlay,
    QuitModal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct StakeState {
    input: String,
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    events
        .next()
        .await
        .ok_or_else(|| eyre!("terminal input stream closed"))?
        .wrap_err("reading terminal input failed")
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    // key handling depends on where the current flip is
    state.phase = snap.phase;
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Map one terminal event to an app action, updating modal state on the way.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        Event::Key(k) if k.kind == KeyEventKind::Press => interpret_key(state, k),
        _ => None,
    }
}

fn interpret_key(state: &mut UiState, k: KeyEvent) -> Option<UserEvent> {
    if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::StakeModal(ss) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let stake = std::mem::take(&mut ss.input);
                state.mode = Mode::Normal;
                Some(UserEvent::SetStake(stake))
            }
            KeyCode::Backspace => {
                ss.input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                ss.input.push(c);
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('.') if !ss.input.contains('.') => {
                ss.input.push('.');
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::HowToPlay => match k.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?') | KeyCode::Char('q') => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => interpret_normal_key(state, k.code),
    }
}

fn interpret_normal_key(state: &mut UiState, code: KeyCode) -> Option<UserEvent> {
    if let Phase::Resolved { .. } = state.phase {
        if matches!(code, KeyCode::Enter | KeyCode::Char('c')) {
            return Some(UserEvent::Settle);
        }
    }
    Some(match code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Char('h') => UserEvent::ChooseSide(CoinSide::Heads),
        KeyCode::Char('t') => UserEvent::ChooseSide(CoinSide::Tails),
        KeyCode::Left | KeyCode::Right => UserEvent::ToggleSide,
        KeyCode::Char(c @ '1'..='6') => {
            let idx = c.to_digit(10).map_or(0, |d| d as usize - 1);
            UserEvent::PresetStake(idx)
        }
        KeyCode::Char('b') => {
            state.mode = Mode::StakeModal(StakeState::default());
            UserEvent::OpenStakeModal
        }
        KeyCode::Char('f') | KeyCode::Enter => UserEvent::Flip,
        KeyCode::Char('w') => UserEvent::Withdraw,
        KeyCode::Char('r') => UserEvent::RefreshBalance,
        KeyCode::Char('?') => {
            state.mode = Mode::HowToPlay;
            UserEvent::OpenHowToPlay
        }
        _ => return None,
    })
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // wallet
            Constraint::Length(12), // bet panel + recent flips
            Constraint::Min(6),     // your bets
            Constraint::Length(10), // status/errors + help
        ])
        .split(f.area());

    draw_wallet_panel(f, chunks[0], snap);
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);
    draw_bet_panel(f, middle[0], snap);
    draw_feed(f, middle[1], "Recent Flips", &snap.recent);
    draw_feed(f, chunks[2], "Your Bets", &snap.own);
    draw_bottom(f, chunks[3], snap);
    draw_modals(f, state, snap);
}

fn draw_wallet_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let balance = snap
        .balance
        .as_deref()
        .map_or_else(|| "-".to_string(), |b| format!("{b} POL"));
    let text = format!(
        "Wallet: {} | Withdrawable: {} | Contract: {}",
        snap.wallet_label, balance, snap.contract
    );
    let widget = Paragraph::new(fit_width(&text, area.width.saturating_sub(2)))
        .block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_bet_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("Flip");
    let lines: Vec<Line> = match snap.phase {
        Phase::AwaitingOutcome => vec![
            Line::from(""),
            Line::from("Flipping...").style(Style::default().fg(Color::Yellow).bold()),
            Line::from(""),
            Line::from(format!("{} for {} POL", snap.side, snap.stake)),
            Line::from("Waiting for the Roll event").style(Style::default().fg(Color::DarkGray)),
        ],
        Phase::Resolved { won } => {
            let (headline, color) = if won {
                ("YOU WON!", Color::Green)
            } else {
                ("YOU LOST.", Color::Red)
            };
            vec![
                Line::from(""),
                Line::from(headline).style(Style::default().fg(color).bold()),
                Line::from(""),
                Line::from(format!("[Enter] {}", snap.settle_label)),
            ]
        }
        Phase::Withdrawing => vec![
            Line::from(""),
            Line::from("Withdrawing...").style(Style::default().fg(Color::Yellow)),
        ],
        Phase::Idle => {
            let side = |s: CoinSide| {
                let style = if snap.side == s {
                    Style::default().fg(Color::Black).bg(Color::Yellow).bold()
                } else {
                    Style::default().fg(Color::Yellow)
                };
                Span::styled(format!(" {} ", s.to_string().to_uppercase()), style)
            };
            let presets = STAKE_PRESETS
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let marker = if *p == snap.stake { "*" } else { "" };
                    format!("{}:{p}{marker}", i + 1)
                })
                .join("  ");
            let flip_style = if snap.can_flip {
                Style::default().fg(Color::Green).bold()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            vec![
                Line::from("CHOOSE WHAT TO BET ON"),
                Line::from(vec![side(CoinSide::Heads), Span::raw("  "), side(CoinSide::Tails)]),
                Line::from(""),
                Line::from("CHOOSE A BET AMOUNT (POL)"),
                Line::from(presets),
                Line::from(format!("Stake: {} POL", snap.stake)),
                Line::from(""),
                Line::from("[f] FLIP COIN").style(flip_style),
            ]
        }
    };
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(p, area);
}

fn draw_feed(f: &mut Frame, area: Rect, title: &str, view: &FeedView) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let width = area.width.saturating_sub(2);
    let lines: Vec<Line> = match view {
        FeedView::Rows { caption, rows } => {
            let mut lines = Vec::new();
            if let Some(caption) = caption {
                lines.push(
                    Line::from(fit_width(caption, width))
                        .style(Style::default().fg(Color::Gray)),
                );
            }
            for row in rows {
                lines.extend(row_lines(row, width));
            }
            lines
        }
        other => {
            let color = match other {
                FeedView::Loading => Color::Blue,
                FeedView::Error(_) => Color::Red,
                FeedView::ConnectWallet => Color::Yellow,
                _ => Color::Gray,
            };
            let message = other.message().unwrap_or_default();
            vec![Line::from(message).style(Style::default().fg(color))]
        }
    };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(block);
    f.render_widget(p, area);
}

fn row_lines(row: &FeedRow, width: u16) -> Vec<Line<'static>> {
    let color = if row.won { Color::Green } else { Color::Red };
    let mut lines = vec![Line::from(fit_width(&row.text, width)).style(Style::default().fg(color))];
    if let Some(detail) = &row.detail {
        lines.push(
            Line::from(fit_width(detail, width)).style(Style::default().fg(Color::DarkGray)),
        );
    }
    lines
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(3)])
        .split(area);

    let status_widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            for line in snap.status.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let mut lines: Vec<Line> = vec![Line::from(snap.status.clone())];
        for e in snap.errors.iter().rev().take(5).rev() {
            lines.push(Line::from(e.clone()).style(Style::default().fg(Color::Red)));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
    };
    f.render_widget(status_widget, chunks[0]);

    let help = [
        "h/t or ←/→ side",
        "1-6 preset",
        "b stake",
        "f flip",
        "w withdraw",
        "r balance",
        "? how to play",
        "q quit",
    ]
    .iter()
    .join(" | ");
    let help = Paragraph::new(help).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[1]);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match &state.mode {
        Mode::StakeModal(ss) => {
            let area = centered_rect(40, 30, f.area());
            let block = Block::default().borders(Borders::ALL).title("Bet Amount");
            let p = Paragraph::new(format!(
                "Current: {} POL\nNew: {}_\n\nEnter=confirm Esc=cancel digits and . to edit",
                snap.stake, ss.input
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::HowToPlay => {
            let area = centered_rect(60, 50, f.area());
            let block = Block::default().borders(Borders::ALL).title("How to play");
            let p = Paragraph::new(vec![
                Line::from("1. Unlock a wallet (--keystore)"),
                Line::from("2. Choose Heads or Tails"),
                Line::from("3. Choose a bet amount and flip"),
                Line::from("4. Wait for the outcome"),
                Line::from("5. Withdraw and play again"),
                Line::from(""),
                Line::from(
                    "If a flip takes too long, everything is still settled on chain; \
                     check Your Bets once the explorer catches up.",
                ),
            ])
            .wrap(Wrap { trim: true });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(30, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Quit");
            let p = Paragraph::new("Quit coinflip? (y/n)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Cut `text` to `width` terminal columns, ending in `…` when shortened.
fn fit_width(text: &str, width: u16) -> String {
    let width = usize::from(width);
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}
