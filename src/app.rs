use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;

use crate::api;
use crate::config;
use crate::data::{
    self, CommentService, FeedService, InteractionService, ViewService,
};
use crate::gesture::Thresholds;
use crate::player::{MpvPlayer, NullPlayer, Playback};
use crate::realtime;
use crate::session::{Role, Viewer};
use crate::ui;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let viewer = Viewer {
        id: cfg.viewer.id.clone(),
        name: cfg.viewer.name.clone(),
        role: Role::parse(&cfg.viewer.role),
    };

    let token_provider: Option<Arc<dyn api::TokenProvider>> = if cfg.api.token.trim().is_empty() {
        None
    } else {
        Some(Arc::new(api::StaticTokenProvider::new(cfg.api.token.clone())))
    };
    let client = api::Client::new(api::ClientConfig {
        user_agent: cfg.api.user_agent.clone(),
        base_url: Some(cfg.api.base_url.clone()),
        timeout: Some(cfg.api.timeout),
        http_client: None,
        token_provider,
    })
    .context("build api client")?;
    let client = Arc::new(client);

    let feed_service: Arc<dyn FeedService> = Arc::new(data::ApiFeedService::new(client.clone()));
    let mut interaction_service: Arc<dyn InteractionService> =
        Arc::new(data::ApiInteractionService::new(client.clone()));
    let mut comment_service: Arc<dyn CommentService> =
        Arc::new(data::ApiCommentService::new(client.clone()));
    let mut view_service: Arc<dyn ViewService> = Arc::new(data::ApiViewService::new(client.clone()));

    // The ordered list is handed to the feed once; it is never paginated or
    // refetched from inside the player.
    let query = api::FeedQuery {
        limit: Some(cfg.api.feed_limit),
        ..api::FeedQuery::default()
    };
    let mut status;
    let items = match feed_service.load_feed(query) {
        Ok(items) if !items.is_empty() => {
            status = format!(
                "Loaded {} videos. j/k or swipe to browse, q to quit.",
                items.len()
            );
            items
        }
        Ok(_) => {
            status = "The feed is empty right now; showing sample videos.".to_string();
            offline_services(
                &mut interaction_service,
                &mut comment_service,
                &mut view_service,
            );
            data::MockFeedService.load_feed(api::FeedQuery::default())?
        }
        Err(err) => {
            log::warn!("feed load failed: {err:#}");
            status = format!("Offline: {err:#}. Showing sample videos.");
            offline_services(
                &mut interaction_service,
                &mut comment_service,
                &mut view_service,
            );
            data::MockFeedService.load_feed(api::FeedQuery::default())?
        }
    };

    let (response_tx, response_rx) = unbounded();

    let realtime_commands = if cfg.realtime.enabled {
        match realtime::connect(&cfg.realtime.url, response_tx.clone()) {
            Ok(commands) => Some(commands),
            Err(err) => {
                // One attempt only; the feed works without live updates.
                log::warn!("push channel unavailable: {err:#}");
                status = format!("{status} Live updates unavailable.");
                None
            }
        }
    } else {
        None
    };

    let player: Box<dyn Playback> = if cfg.player.enabled {
        match MpvPlayer::spawn(&cfg.player.command, response_tx.clone()) {
            Ok(player) => Box::new(player),
            Err(err) => {
                log::warn!("playback disabled: {err:#}");
                status = format!("{status} Playback disabled (mpv unavailable).");
                Box::new(NullPlayer)
            }
        }
    } else {
        Box::new(NullPlayer)
    };

    let options = ui::Options {
        status_message: status,
        items,
        initial_index: 0,
        viewer,
        interaction_service,
        comment_service,
        view_service,
        player,
        thresholds: Thresholds {
            distance: cfg.gesture.distance_threshold,
            velocity: cfg.gesture.velocity_threshold,
        },
        points_per_cell: cfg.gesture.points_per_cell,
        realtime_commands,
        response_tx,
        response_rx,
        config_path: display_path,
        share_base_url: share_base_url(&cfg.api.base_url),
    };

    let mut model = ui::Model::new(options);
    model.run()
}

fn offline_services(
    interactions: &mut Arc<dyn InteractionService>,
    comments: &mut Arc<dyn CommentService>,
    views: &mut Arc<dyn ViewService>,
) {
    *interactions = Arc::new(data::MockInteractionService);
    *comments = Arc::new(data::MockCommentService::default());
    *views = Arc::new(data::MockViewService);
}

/// Share links point at the web frontend, which lives one level above the
/// API prefix.
fn share_base_url(api_base: &str) -> String {
    api_base
        .trim_end_matches('/')
        .trim_end_matches("/api")
        .to_string()
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/vitrine/config.yaml".to_string()
    }
}
