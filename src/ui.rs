use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction as LayoutDirection, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthChar;

use crate::api::{Comment, FeedItem};
use crate::comments::{AddOutcome, CommentLikeOutcome, CommentThreadManager, LoadOutcome};
use crate::data::{CommentService, InteractionService, ViewService};
use crate::feed::{Direction, FeedController, FeedResponse};
use crate::gesture::{DragTracker, GestureNavigator, Thresholds};
use crate::player::Playback;
use crate::realtime::{ChannelCommand, EventBridge};
use crate::session::{can_comment, Viewer};
use crate::views::ViewRecorder;

/// Error banners dismiss themselves after roughly five seconds.
const ERROR_BANNER_TTL: Duration = Duration::from_secs(5);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const COLOR_ACCENT: Color = Color::Yellow;
const COLOR_DIM: Color = Color::DarkGray;

struct Spinner {
    index: usize,
}

impl Spinner {
    fn new() -> Self {
        Self { index: 0 }
    }

    fn advance(&mut self) -> bool {
        self.index = (self.index + 1) % SPINNER_FRAMES.len();
        true
    }

    fn reset(&mut self) {
        self.index = 0;
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index]
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CommentMode {
    Browse,
    Compose,
}

struct ErrorBanner {
    message: String,
    shown_at: Instant,
}

pub struct Options {
    pub status_message: String,
    pub items: Vec<FeedItem>,
    pub initial_index: usize,
    pub viewer: Viewer,
    pub interaction_service: Arc<dyn InteractionService>,
    pub comment_service: Arc<dyn CommentService>,
    pub view_service: Arc<dyn ViewService>,
    pub player: Box<dyn Playback>,
    pub thresholds: Thresholds,
    pub points_per_cell: f32,
    pub realtime_commands: Option<Sender<ChannelCommand>>,
    pub response_tx: Sender<FeedResponse>,
    pub response_rx: Receiver<FeedResponse>,
    pub config_path: String,
    pub share_base_url: String,
}

pub struct Model {
    controller: FeedController,
    navigator: GestureNavigator,
    drag: DragTracker,
    viewer: Viewer,
    status_message: String,
    error_banner: Option<ErrorBanner>,
    comment_mode: CommentMode,
    comment_input: String,
    reply_target: Option<String>,
    selected_comment: usize,
    spinner: Spinner,
    needs_redraw: bool,
    response_rx: Receiver<FeedResponse>,
    config_path: String,
    share_base_url: String,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let views = ViewRecorder::new(opts.view_service);
        let comments = CommentThreadManager::new(opts.comment_service, opts.response_tx.clone());
        let bridge = EventBridge::new(opts.realtime_commands);
        let mut controller = FeedController::new(
            opts.player,
            views,
            comments,
            bridge,
            opts.interaction_service,
            opts.response_tx,
        );
        controller.set_items(opts.items, opts.initial_index);

        let mut model = Self {
            controller,
            navigator: GestureNavigator::new(opts.thresholds),
            drag: DragTracker::new(opts.points_per_cell),
            viewer: opts.viewer,
            status_message: opts.status_message,
            error_banner: None,
            comment_mode: CommentMode::Browse,
            comment_input: String::new(),
            reply_target: None,
            selected_comment: 0,
            spinner: Spinner::new(),
            needs_redraw: true,
            response_rx: opts.response_rx,
            config_path: opts.config_path,
            share_base_url: opts.share_base_url,
        };
        model.refresh_comment_permission();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        self.controller.shutdown();

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.show_error(format!("Error: {err:#}"));
                            }
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                let mut ticked = false;
                if self.is_loading() && self.spinner.advance() {
                    ticked = true;
                } else if !self.is_loading() {
                    self.spinner.reset();
                }
                if let Some(banner) = &self.error_banner {
                    if banner.shown_at.elapsed() >= ERROR_BANNER_TTL {
                        self.error_banner = None;
                        ticked = true;
                    }
                }
                if ticked {
                    self.mark_dirty();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.controller.comments().is_loading() || self.controller.comments().is_submitting()
    }

    fn show_error(&mut self, message: String) {
        self.error_banner = Some(ErrorBanner {
            message,
            shown_at: Instant::now(),
        });
        self.mark_dirty();
    }

    fn poll_async(&mut self) -> bool {
        let mut handled = false;
        while let Ok(message) = self.response_rx.try_recv() {
            handled = true;
            self.handle_async_response(message);
        }
        handled
    }

    fn handle_async_response(&mut self, message: FeedResponse) {
        match message {
            FeedResponse::CommentsLoaded {
                request_id,
                item_id,
                result,
            } => match self.controller.commit_comments(request_id, &item_id, result) {
                LoadOutcome::Applied { count } => {
                    self.selected_comment = 0;
                    if self.controller.comments().is_panel_open() {
                        self.status_message = if count == 0 {
                            "No comments yet. Be the first!".to_string()
                        } else {
                            format!("{} comments loaded", self.controller.comments().total_count())
                        };
                    }
                }
                LoadOutcome::Stale => {}
                LoadOutcome::Failed(err) => {
                    log::warn!("failed to load comments for {item_id}: {err}");
                }
            },
            FeedResponse::CommentAdded {
                item_id,
                parent_id,
                result,
            } => match self
                .controller
                .commit_comment_add(&item_id, parent_id.as_deref(), result)
            {
                AddOutcome::Added { reply } => {
                    self.comment_input.clear();
                    self.reply_target = None;
                    self.comment_mode = CommentMode::Browse;
                    self.status_message = if reply {
                        "Reply posted.".to_string()
                    } else {
                        "Comment posted.".to_string()
                    };
                }
                AddOutcome::Stale => {}
                AddOutcome::Failed(err) => {
                    self.show_error(format!("Failed to post comment: {err}"));
                }
            },
            FeedResponse::CommentLikeUpdated { comment_id, result } => {
                match self.controller.commit_comment_like(&comment_id, result) {
                    CommentLikeOutcome::Applied | CommentLikeOutcome::Unknown => {}
                    CommentLikeOutcome::Failed(err) => {
                        self.show_error(format!("Failed to update comment like: {err}"));
                    }
                }
            }
            FeedResponse::LikeConfirmed { item_id, result } => match result {
                Ok(update) => {
                    self.controller.confirm_like(&item_id, &update);
                }
                Err(err) => {
                    // The optimistic value stays; the failure is only shown.
                    self.show_error(format!("Failed to update like: {err:#}"));
                }
            },
            FeedResponse::BookmarkConfirmed { error, .. } => {
                if let Some(err) = error {
                    self.show_error(format!("Failed to update bookmark: {err}"));
                }
            }
            FeedResponse::PlaybackFinished { item_id } => {
                if self.controller.playback_finished(&item_id) {
                    self.after_activation();
                }
            }
            FeedResponse::Push(event) => {
                self.controller.handle_push(&event);
            }
        }
        self.mark_dirty();
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.controller.comments().is_panel_open() {
            self.handle_comment_key(code);
            return Ok(false);
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.transition(Direction::Next),
            KeyCode::Char('k') | KeyCode::Up => self.transition(Direction::Previous),
            KeyCode::Char(' ') => {
                self.controller.toggle_pause();
                self.status_message = "Toggled playback.".to_string();
                self.mark_dirty();
            }
            KeyCode::Char('l') => self.like_active(),
            KeyCode::Char('b') => self.bookmark_active(),
            KeyCode::Char('c') => self.open_comments(),
            KeyCode::Char('o') => self.open_author_page(),
            KeyCode::Char('y') => self.copy_share_link(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_comment_key(&mut self, code: KeyCode) {
        match self.comment_mode {
            CommentMode::Compose => match code {
                KeyCode::Esc => {
                    self.comment_mode = CommentMode::Browse;
                    self.reply_target = None;
                    self.mark_dirty();
                }
                KeyCode::Enter => self.submit_comment_input(),
                KeyCode::Backspace => {
                    self.comment_input.pop();
                    self.mark_dirty();
                }
                KeyCode::Char(ch) => {
                    self.comment_input.push(ch);
                    self.mark_dirty();
                }
                _ => {}
            },
            CommentMode::Browse => match code {
                KeyCode::Esc | KeyCode::Char('q') => self.close_comments(),
                KeyCode::Char('j') | KeyCode::Down => self.move_comment_selection(1),
                KeyCode::Char('k') | KeyCode::Up => self.move_comment_selection(-1),
                KeyCode::Char('l') => self.like_selected_comment(),
                KeyCode::Char('r') => self.start_reply(),
                KeyCode::Char('c') | KeyCode::Char('i') => self.start_top_level_comment(),
                _ => {}
            },
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.drag.begin(mouse.row),
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(sample) = self.drag.finish(mouse.row) {
                    if let Some(swipe) = self.navigator.on_drag_end(sample) {
                        self.transition(swipe.into());
                    }
                }
            }
            MouseEventKind::ScrollDown => self.transition(Direction::Next),
            MouseEventKind::ScrollUp => self.transition(Direction::Previous),
            _ => {}
        }
    }

    fn transition(&mut self, direction: Direction) {
        if self.controller.transition(direction) {
            self.after_activation();
        } else if !self.controller.is_empty() {
            self.status_message = match direction {
                Direction::Next => "End of the feed.".to_string(),
                Direction::Previous => "Already at the first video.".to_string(),
            };
        }
        self.mark_dirty();
    }

    fn after_activation(&mut self) {
        self.selected_comment = 0;
        self.reply_target = None;
        self.comment_mode = CommentMode::Browse;
        self.refresh_comment_permission();
        if let Some(item) = self.controller.active_item() {
            self.status_message = format!(
                "{}/{} · {}",
                self.controller.current_index() + 1,
                self.controller.len(),
                item.title
            );
        }
        self.mark_dirty();
    }

    /// The capability rule lives outside the comment manager; it is
    /// re-evaluated here for every active item and pushed in as a flag.
    fn refresh_comment_permission(&mut self) {
        let permitted = self
            .controller
            .active_item()
            .map(|item| can_comment(&self.viewer, item))
            .unwrap_or(false);
        self.controller.comments_mut().set_permitted(permitted);
    }

    fn like_active(&mut self) {
        if !self.viewer.is_signed_in() {
            self.show_error("Sign in to like videos.".to_string());
            return;
        }
        let Some(item) = self.controller.active_item() else {
            return;
        };
        let title = item.title.clone();
        if let Some(state) = self.controller.toggle_like() {
            self.status_message = if state.is_liked {
                format!("Liked \"{title}\" (sending...)")
            } else {
                format!("Removed like from \"{title}\" (sending...)")
            };
            self.mark_dirty();
        }
    }

    fn bookmark_active(&mut self) {
        if !self.viewer.is_signed_in() {
            self.show_error("Sign in to save videos.".to_string());
            return;
        }
        if let Some(state) = self.controller.toggle_bookmark() {
            self.status_message = if state.is_bookmarked {
                "Saved to bookmarks (sending...)".to_string()
            } else {
                "Removed from bookmarks (sending...)".to_string()
            };
            self.mark_dirty();
        }
    }

    fn open_comments(&mut self) {
        if self.controller.is_empty() {
            return;
        }
        self.controller.comments_mut().set_panel_open(true);
        self.comment_mode = CommentMode::Browse;
        self.selected_comment = 0;
        self.status_message = format!(
            "{} comments",
            self.controller.comments().total_count()
        );
        self.mark_dirty();
    }

    fn close_comments(&mut self) {
        self.controller.comments_mut().set_panel_open(false);
        self.comment_mode = CommentMode::Browse;
        self.reply_target = None;
        self.mark_dirty();
    }

    fn move_comment_selection(&mut self, delta: i32) {
        let rows = comment_rows(self.controller.comments().comments());
        if rows.is_empty() {
            return;
        }
        let len = rows.len() as i32;
        let next = (self.selected_comment as i32 + delta).clamp(0, len - 1);
        self.selected_comment = next as usize;
        self.mark_dirty();
    }

    fn selected_row(&self) -> Option<CommentRow> {
        comment_rows(self.controller.comments().comments())
            .into_iter()
            .nth(self.selected_comment)
    }

    fn like_selected_comment(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if let Err(err) = self.controller.toggle_comment_like(&row.id) {
            self.show_error(format!("{err:#}"));
        }
    }

    fn start_reply(&mut self) {
        if !self.controller.comments().is_permitted() {
            self.show_error("Only the video's author may comment here.".to_string());
            return;
        }
        // Replies always attach to the top-level comment, also when a reply
        // row is selected.
        let Some(row) = self.selected_row() else {
            return;
        };
        self.reply_target = Some(row.parent_id);
        self.comment_mode = CommentMode::Compose;
        self.comment_input.clear();
        self.mark_dirty();
    }

    fn start_top_level_comment(&mut self) {
        if !self.controller.comments().is_permitted() {
            self.show_error("Only the video's author may comment here.".to_string());
            return;
        }
        self.reply_target = None;
        self.comment_mode = CommentMode::Compose;
        self.comment_input.clear();
        self.mark_dirty();
    }

    fn submit_comment_input(&mut self) {
        let text = self.comment_input.trim().to_string();
        if text.is_empty() {
            return;
        }
        let result = match self.reply_target.clone() {
            Some(parent_id) => self.controller.submit_reply(&parent_id, &text),
            None => self.controller.submit_comment(&text),
        };
        match result {
            Ok(()) => {
                self.status_message = "Posting comment...".to_string();
                self.mark_dirty();
            }
            Err(err) => self.show_error(format!("{err:#}")),
        }
    }

    fn open_author_page(&mut self) {
        let Some(item) = self.controller.active_item() else {
            return;
        };
        let author_id = item.author.id.trim().to_string();
        if author_id.is_empty() {
            // Terminal precondition failure: nothing to retry.
            self.show_error("No author is linked to this video.".to_string());
            return;
        }
        let url = format!("{}/profile/{author_id}", self.share_base_url);
        match webbrowser::open(&url) {
            Ok(()) => {
                self.status_message = "Opened the author's page in your browser.".to_string();
                self.mark_dirty();
            }
            Err(err) => self.show_error(format!("Failed to open browser: {err}")),
        }
    }

    fn copy_share_link(&mut self) {
        let Some(item) = self.controller.active_item() else {
            return;
        };
        let url = format!("{}/video/{}", self.share_base_url, item.id);
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(url.clone())) {
            Ok(()) => {
                self.status_message = "Share link copied to clipboard.".to_string();
                self.mark_dirty();
            }
            Err(_) => {
                self.status_message = format!("Share link: {url}");
                self.mark_dirty();
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let layout = Layout::default()
            .direction(LayoutDirection::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(frame.size());

        self.draw_status(frame, layout[0]);
        self.draw_stage(frame, layout[1]);
        self.draw_help(frame, layout[2]);

        if self.controller.comments().is_panel_open() {
            self.draw_comments(frame, layout[1]);
        }
        if let Some(banner) = &self.error_banner {
            draw_banner(frame, layout[1], &banner.message);
        }
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let position = if self.controller.is_empty() {
            String::new()
        } else {
            format!(
                "{}/{}",
                self.controller.current_index() + 1,
                self.controller.len()
            )
        };
        let line = Line::from(vec![
            Span::styled(status_text, Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled(position, Style::default().fg(COLOR_DIM)),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_stage(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = Block::default().borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(item) = self.controller.active_item() else {
            let empty = Paragraph::new(format!(
                "No videos in the feed.\n\nAPI settings live in {}.",
                self.config_path
            ))
            .alignment(Alignment::Center)
            .style(Style::default().fg(COLOR_DIM));
            frame.render_widget(empty, inner);
            return;
        };

        let state = self.controller.social_state(&item.id);
        let like_marker = if state.is_liked { "♥" } else { "♡" };
        let bookmark_marker = if state.is_bookmarked { "★ saved" } else { "☆" };

        let mut lines = Vec::new();
        lines.push(Line::from(Span::styled(
            item.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "{} · {}",
                item.author.display_name(),
                time_ago(item.created_at)
            ),
            Style::default().fg(COLOR_DIM),
        )));
        lines.push(Line::default());
        let width = inner.width.saturating_sub(2).max(16) as usize;
        for wrapped in textwrap::wrap(&item.description, width) {
            lines.push(Line::from(wrapped.into_owned()));
        }
        if !item.tags.is_empty() {
            let tags = item
                .tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(Line::from(Span::styled(
                tags,
                Style::default().fg(Color::Cyan),
            )));
        }
        lines.push(Line::default());
        lines.push(Line::from(vec![
            Span::styled(
                format!("{like_marker} {}", format_count(state.likes_count)),
                Style::default().fg(if state.is_liked {
                    Color::Red
                } else {
                    Color::White
                }),
            ),
            Span::raw("   "),
            Span::raw(format!("🗨 {}", format_count(item.comments_count))),
            Span::raw("   "),
            Span::styled(
                bookmark_marker.to_string(),
                Style::default().fg(if state.is_bookmarked {
                    COLOR_ACCENT
                } else {
                    Color::White
                }),
            ),
        ]));
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            progress_dots(self.controller.current_index(), self.controller.len()),
            Style::default().fg(COLOR_DIM),
        )));

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, inner);
    }

    fn draw_help(&self, frame: &mut Frame<'_>, area: Rect) {
        let help = if self.controller.comments().is_panel_open() {
            match self.comment_mode {
                CommentMode::Compose => "Enter send · Esc cancel",
                CommentMode::Browse => "j/k select · l like · r reply · c comment · Esc close",
            }
        } else {
            "j/k or swipe to browse · Space pause · l like · b save · c comments · o order · y share · q quit"
        };
        frame.render_widget(
            Paragraph::new(help).style(Style::default().fg(COLOR_DIM)),
            area,
        );
    }

    fn draw_comments(&self, frame: &mut Frame<'_>, area: Rect) {
        let height = (area.height as u32 * 3 / 5).max(8) as u16;
        let height = height.min(area.height);
        let panel = Rect {
            x: area.x,
            y: area.y + (area.height - height),
            width: area.width,
            height,
        };
        frame.render_widget(Clear, panel);

        let title = format!(" Comments ({}) ", self.controller.comments().total_count());
        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        if inner.height < 2 {
            return;
        }
        let list_area = Rect {
            height: inner.height - 1,
            ..inner
        };
        let input_area = Rect {
            y: inner.y + inner.height - 1,
            height: 1,
            ..inner
        };

        let rows = comment_rows(self.controller.comments().comments());
        let mut lines = Vec::new();
        if rows.is_empty() {
            let text = if self.controller.comments().is_loading() {
                "Loading comments..."
            } else {
                "No comments yet."
            };
            lines.push(Line::from(Span::styled(
                text,
                Style::default().fg(COLOR_DIM),
            )));
        } else {
            let visible = list_area.height as usize;
            let selected = self.selected_comment.min(rows.len() - 1);
            let start = selected.saturating_sub(visible.saturating_sub(1));
            for (index, row) in rows.iter().enumerate().skip(start).take(visible) {
                let comment = self
                    .controller
                    .comments()
                    .comments()
                    .iter()
                    .flat_map(|top| std::iter::once(top).chain(top.replies.iter()))
                    .find(|comment| comment.id == row.id);
                let Some(comment) = comment else { continue };
                let indent = if row.is_reply() { "  └ " } else { "" };
                let like_part = if comment.like_count > 0 {
                    format!(" ♥{}", comment.like_count)
                } else {
                    String::new()
                };
                let text = format!(
                    "{indent}{}: {}{like_part}",
                    comment.author.display_name(),
                    comment.content
                );
                let text = truncate_to_width(&text, list_area.width as usize);
                let style = if index == selected {
                    Style::default()
                        .fg(Color::Black)
                        .bg(COLOR_ACCENT)
                } else if row.is_reply() {
                    Style::default().fg(COLOR_DIM)
                } else {
                    Style::default()
                };
                lines.push(Line::from(Span::styled(text, style)));
            }
        }
        frame.render_widget(Paragraph::new(lines), list_area);

        let input_line = match self.comment_mode {
            CommentMode::Compose => {
                let prompt = match &self.reply_target {
                    Some(_) => "reply> ",
                    None => "comment> ",
                };
                Line::from(vec![
                    Span::styled(prompt, Style::default().fg(COLOR_ACCENT)),
                    Span::raw(self.comment_input.clone()),
                    Span::styled("█", Style::default().fg(COLOR_ACCENT)),
                ])
            }
            CommentMode::Browse => {
                if self.controller.comments().is_permitted() {
                    Line::from(Span::styled(
                        "press c to comment, r to reply",
                        Style::default().fg(COLOR_DIM),
                    ))
                } else {
                    Line::from(Span::styled(
                        "commenting is not available on this video",
                        Style::default().fg(COLOR_DIM),
                    ))
                }
            }
        };
        frame.render_widget(Paragraph::new(input_line), input_area);
    }
}

fn draw_banner(frame: &mut Frame<'_>, area: Rect, message: &str) {
    if area.height == 0 || area.width < 8 {
        return;
    }
    let text = truncate_to_width(message, area.width.saturating_sub(4) as usize);
    let width = (text.chars().count() as u16 + 2).min(area.width.saturating_sub(2));
    let banner = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + 1,
        width,
        height: 1,
    };
    frame.render_widget(Clear, banner);
    frame.render_widget(
        Paragraph::new(format!(" {text} "))
            .style(Style::default().fg(Color::White).bg(Color::Red)),
        banner,
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CommentRow {
    id: String,
    /// Top-level comment this row belongs to; for top-level rows, itself.
    parent_id: String,
}

impl CommentRow {
    fn is_reply(&self) -> bool {
        self.id != self.parent_id
    }
}

fn comment_rows(comments: &[Comment]) -> Vec<CommentRow> {
    let mut rows = Vec::new();
    for comment in comments {
        rows.push(CommentRow {
            id: comment.id.clone(),
            parent_id: comment.id.clone(),
        });
        for reply in &comment.replies {
            rows.push(CommentRow {
                id: reply.id.clone(),
                parent_id: comment.id.clone(),
            });
        }
    }
    rows
}

fn progress_dots(current: usize, len: usize) -> String {
    const MAX_DOTS: usize = 24;
    if len == 0 {
        return String::new();
    }
    if len <= MAX_DOTS {
        return (0..len)
            .map(|i| if i == current { "●" } else { "○" })
            .collect::<Vec<_>>()
            .join(" ");
    }
    format!("{} of {}", current + 1, len)
}

fn format_count(count: i64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

fn time_ago(created_at: Option<DateTime<Utc>>) -> String {
    let Some(created) = created_at else {
        return "recently".to_string();
    };
    let seconds = (Utc::now() - created).num_seconds().max(0);
    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3_600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h ago", seconds / 3_600)
    } else if seconds < 604_800 {
        format!("{}d ago", seconds / 86_400)
    } else {
        created.format("%-d %b %Y").to_string()
    }
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let mut width = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            out.push('…');
            return out;
        }
        width += ch_width;
        out.push(ch);
    }
    out
}
