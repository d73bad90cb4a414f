use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Sparkline, Wrap};

use hashtycoon::scheduler::SchedulerState;
use hashtycoon::session::SessionStatus;

use crate::app::{App, Modal, PaneFocus, format_hashrate, format_price_delta};

pub fn draw(f: &mut Frame<'_>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(7),
        ])
        .split(f.size());

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_chunks[0]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_chunks[1]);

    draw_status(f, chunks[0], app);
    draw_fleet(f, left_chunks[0], app);
    draw_bank(f, left_chunks[1], app);
    draw_shop(f, right_chunks[0], app);
    draw_chart(f, right_chunks[1], app);
    draw_ticker(f, chunks[2], app);
    draw_footer(f, chunks[3], app);

    match app.session.status() {
        SessionStatus::Won => draw_won(f, app),
        SessionStatus::Lost => draw_lost(f, app),
        SessionStatus::Playing => {
            if let Some(modal) = &app.feed.modal {
                draw_modal(f, app, modal);
            }
        }
    }
}

fn draw_status(f: &mut Frame<'_>, area: Rect, app: &App) {
    let state = app.session.state();
    let block = Block::default()
        .title("Bitcoin Mining Tycoon")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let clock = match app.session.scheduler_state() {
        SchedulerState::Running => Span::styled(
            format!("▶ {}", state.speed.label()),
            Style::default().fg(Color::LightGreen),
        ),
        SchedulerState::PausedByUser => {
            Span::styled("⏸ Paused", Style::default().fg(Color::Yellow))
        }
        SchedulerState::PausedForEvent | SchedulerState::PausedForNotification => {
            Span::styled("⏸ Waiting", Style::default().fg(Color::Gray))
        }
    };
    let pool = if state.in_mining_pool {
        Span::styled("Pool: joined", Style::default().fg(Color::LightCyan))
    } else if state.mining_pools_available {
        Span::styled("Pool: solo (P to join)", Style::default().fg(Color::Gray))
    } else {
        Span::styled("Pool: locked", Style::default().fg(Color::DarkGray))
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(
                state.date.format("%Y-%m-%d").to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  |  Cash "),
            Span::styled(format!("${:.2}", state.cash), Style::default().fg(Color::LightGreen)),
            Span::raw("  |  BTC "),
            Span::styled(format!("{:.4}", state.coin), Style::default().fg(Color::LightCyan)),
            Span::raw("  |  "),
            clock,
        ]),
        Line::from(vec![
            Span::styled("Difficulty ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{:.2}", state.current_difficulty)),
            Span::raw("  |  Network "),
            Span::raw(format_hashrate(app.session.network_hashrate())),
            Span::raw("  |  Reward "),
            Span::raw(format!("{} BTC", app.session.block_reward())),
            Span::raw("  |  Bill in "),
            Span::styled(
                format!("{}d", state.days_until_bill),
                Style::default().fg(if state.days_until_bill <= 5 {
                    Color::LightRed
                } else {
                    Color::White
                }),
            ),
            Span::raw(format!(" (${:.2})  |  ", state.monthly_power_cost())),
            pool,
        ]),
    ];
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_fleet(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Mining Fleet", app.focus == PaneFocus::Fleet);
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let state = app.session.state();
    let segments = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let estimate = app.session.estimate(state.aggregate_hashrate());
    let header = Paragraph::new(vec![Line::from(vec![
        Span::styled("Total ", Style::default().fg(Color::Gray)),
        Span::styled(
            format_hashrate(state.aggregate_hashrate()),
            Style::default().fg(Color::LightGreen),
        ),
        Span::raw("  |  ~"),
        Span::styled(
            format!("{:.2} BTC/mo", estimate.coin),
            Style::default().fg(Color::LightCyan),
        ),
    ])]);
    f.render_widget(header, segments[0]);

    let fleet = state.fleet();
    if fleet.is_empty() {
        let paragraph = Paragraph::new("No hardware. Buy a miner in the shop.")
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, segments[1]);
        return;
    }

    let items: Vec<ListItem> = fleet
        .iter()
        .map(|entry| {
            let wear_color = if entry.durability < 25.0 {
                Color::LightRed
            } else if entry.durability < 60.0 {
                Color::Yellow
            } else {
                Color::LightGreen
            };
            let content = Line::from(vec![
                Span::styled(
                    format!("{:>3}×", entry.count),
                    Style::default().fg(Color::LightGreen),
                ),
                Span::raw(" "),
                Span::styled(format!("{:<18}", entry.name), Style::default().fg(Color::White)),
                Span::raw(format!(" {:>12}", format_hashrate(entry.hashrate))),
                Span::raw("  wear "),
                Span::styled(format!("{:>3.0}%", entry.durability), Style::default().fg(wear_color)),
                Span::raw(format!("  ${:.0}/mo", entry.power_cost * entry.count as f64)),
            ]);
            ListItem::new(vec![content])
        })
        .collect();

    let list = List::new(items).highlight_style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let mut list_state = ListState::default();
    if app.focus == PaneFocus::Fleet {
        list_state.select(Some(app.fleet_selected));
    }
    f.render_stateful_widget(list, segments[1], &mut list_state);
}

fn draw_shop(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Hardware Shop", app.focus == PaneFocus::Shop);
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let listings = app.session.listings();
    if listings.is_empty() {
        let paragraph = Paragraph::new("Nothing on sale yet.").wrap(Wrap { trim: true });
        f.render_widget(paragraph, inner);
        return;
    }

    let cash = app.session.state().cash;
    let items: Vec<ListItem> = listings
        .iter()
        .map(|listing| {
            let estimate = app.session.estimate(listing.hashrate);
            let price_color = if listing.current_price <= cash {
                Color::LightCyan
            } else {
                Color::DarkGray
            };
            let content = Line::from(vec![
                Span::styled(format!("{:<18}", listing.name), Style::default().fg(Color::White)),
                Span::raw(format!(" {:>12}", format_hashrate(listing.hashrate))),
                Span::styled(
                    format!("  ${:.2}", listing.current_price),
                    Style::default().fg(price_color),
                ),
                Span::raw(format!("  ~{:.2} BTC/mo", estimate.coin)),
            ]);
            ListItem::new(vec![content])
        })
        .collect();

    let list = List::new(items).highlight_style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let mut list_state = ListState::default();
    if app.focus == PaneFocus::Shop {
        list_state.select(Some(app.shop_selected));
    }
    f.render_stateful_widget(list, inner, &mut list_state);
}

fn draw_bank(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Bank & Exchange", app.focus == PaneFocus::Bank);
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let state = app.session.state();
    let quote = match state.current_price {
        Some(price) => {
            let short = state.price_history.short();
            let delta = match (short.iter().rev().nth(1), short.back()) {
                (Some(prev), Some(last)) => last - prev,
                _ => 0.0,
            };
            vec![
                Span::styled(format!("${:.2}", price), Style::default().fg(Color::Yellow)),
                Span::raw("  ("),
                Span::styled(format_price_delta(delta), Style::default().fg(Color::Gray)),
                Span::raw(")"),
            ]
        }
        None => vec![Span::styled(
            "no market yet",
            Style::default().fg(Color::DarkGray),
        )],
    };
    let holdings = state.coin * state.current_price.unwrap_or(0.0);

    let mut market_line = vec![Span::styled("Market ", Style::default().fg(Color::Gray))];
    market_line.extend(quote);
    let lines = vec![
        Line::from(vec![
            Span::styled("BTC ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{:.4}", state.coin), Style::default().fg(Color::LightCyan)),
            Span::raw("  ≈ "),
            Span::styled(format!("${:.2}", holdings), Style::default().fg(Color::LightGreen)),
        ]),
        Line::from(market_line),
        Line::from(""),
        Line::from("← sell 1  |  → buy 1  |  [B] buy 10  |  [M] sell 10  |  [A] sell all"),
    ];

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
    f.render_widget(paragraph, inner);
}

fn draw_chart(f: &mut Frame<'_>, area: Rect, app: &App) {
    let timeframe = app.session.state().chart_timeframe;
    let title = format!("Price ({}) [C]", timeframe.label());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let series = app.session.chart();
    if series.iter().all(|point| point.price <= 0.0) {
        let paragraph = Paragraph::new("No price history yet.")
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    // Sparkline wants integers; plot in cents.
    let values: Vec<u64> = series
        .iter()
        .map(|point| (point.price * 100.0).round().max(0.0) as u64)
        .collect();
    let width = block.inner(area).width as usize;
    let visible = &values[values.len().saturating_sub(width)..];
    let sparkline = Sparkline::default()
        .block(block)
        .data(visible)
        .style(Style::default().fg(Color::Yellow));
    f.render_widget(sparkline, area);
}

fn draw_ticker(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .title("Headlines")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let headlines = app.session.headlines();
    let line = if headlines.is_empty() {
        Line::from(Span::styled(
            "Quiet day on the wires.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let headline = headlines[app.headline_index % headlines.len()];
        Line::from(Span::styled(
            headline.text.clone(),
            Style::default().fg(Color::LightYellow),
        ))
    };

    let paragraph = Paragraph::new(line).alignment(Alignment::Left);
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);
    f.render_widget(paragraph, inner);
}

fn draw_footer(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Ops & Feed")
        .border_style(Style::default().fg(Color::Gray));
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(inner);

    let instruction_lines = vec![
        Line::from("Tab cycle focus | Space pause | F speed | Q quit"),
        Line::from("Fleet: ↑↓ select  S sell one  Shift+S sell all  R repair"),
        Line::from("Shop: ↑↓ select  Enter buy"),
        Line::from("Bank: ← sell → buy  B bulk buy  M bulk sell  A sell all"),
        Line::from("P join/leave pool | C chart | Shift+N new game"),
    ];
    let instruction = Paragraph::new(instruction_lines).wrap(Wrap { trim: true });
    f.render_widget(instruction, columns[0]);

    let mut message_lines: Vec<Line> = Vec::new();
    for msg in app.feed.messages.iter() {
        message_lines.push(Line::from(Span::raw(msg.clone())));
    }
    if message_lines.is_empty() {
        message_lines.push(Line::from(Span::styled(
            "Awaiting the next block...",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let feed = Paragraph::new(message_lines).wrap(Wrap { trim: true });
    f.render_widget(feed, columns[1]);
}

fn draw_modal(f: &mut Frame<'_>, app: &App, modal: &Modal) {
    let (title, lines) = match modal {
        Modal::Event { date, text } => (
            "Historical Event",
            vec![
                Line::from(Span::styled(
                    date.format("%B %-d, %Y").to_string(),
                    Style::default().fg(Color::Gray),
                )),
                Line::from(""),
                Line::from(text.clone()),
            ],
        ),
        Modal::Hardware(listing) => {
            let estimate = app.session.estimate(listing.hashrate);
            (
                "New Hardware Available",
                vec![
                    Line::from(Span::styled(
                        listing.name.clone(),
                        Style::default()
                            .fg(Color::LightCyan)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::from(""),
                    Line::from(format!("Hashrate: {}", format_hashrate(listing.hashrate))),
                    Line::from(format!("Price: ${:.2}", listing.current_price)),
                    Line::from(format!("Power: ${:.2}/month", listing.power_cost)),
                    Line::from(format!(
                        "Estimated: {:.4} BTC (${:.2}) per month",
                        estimate.coin, estimate.cash
                    )),
                ],
            )
        }
    };
    let hint = match modal {
        Modal::Event { .. } => "Enter continue  |  X skip all",
        Modal::Hardware(_) => "B buy now  |  Enter close  |  X skip all",
    };
    let mut lines = lines;
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    draw_popup(f, title, lines, Color::Cyan);
}

fn draw_won(f: &mut Frame<'_>, app: &App) {
    let state = app.session.state();
    let lines = vec![
        Line::from(Span::styled(
            "You reached $1,000,000!",
            Style::default()
                .fg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("Date: {}", state.date.format("%Y-%m-%d"))),
        Line::from(format!("Cash: ${:.2}", state.cash)),
        Line::from(""),
        Line::from(Span::styled(
            "Enter keep playing  |  N new game  |  Q quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    draw_popup(f, "Millionaire", lines, Color::LightGreen);
}

fn draw_lost(f: &mut Frame<'_>, app: &App) {
    let state = app.session.state();
    let lines = vec![
        Line::from(Span::styled(
            "The power company cut you off.",
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("Date: {}", state.date.format("%Y-%m-%d"))),
        Line::from(format!("BTC left: {:.4}", state.coin)),
        Line::from(""),
        Line::from(Span::styled(
            "N new game  |  Q quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    draw_popup(f, "Game Over", lines, Color::LightRed);
}

fn draw_popup(f: &mut Frame<'_>, title: &str, lines: Vec<Line<'_>>, accent: Color) {
    let area = centered_rect(60, 40, f.size());
    let block = Block::default()
        .title(Span::styled(
            title,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn pane_block<'a>(title: &'a str, focused: bool) -> Block<'a> {
    let border_style = if focused {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    Block::default()
        .title(Span::styled(title, Style::default().fg(Color::White)))
        .borders(Borders::ALL)
        .border_style(border_style)
}
