use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{ApiClient, LoginOutcome};
use crate::config::Config;

/// Seed message shown until the server-side history arrives.
pub const GREETING: &str = "Hi, how can I help you today?";

/// Display name for the assistant side of the conversation.
pub const ASSISTANT_NAME: &str = "Aariv";

/// Error shown when a login request never completes (connection refused,
/// unparseable body). Server-rejected logins show the server's message.
pub const SERVER_ERROR_MESSAGE: &str = "Server error, please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

fn greeting_message() -> ChatMessage {
    ChatMessage {
        role: ChatRole::Assistant,
        content: GREETING.to_string(),
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Login state
    pub username_input: String,
    pub password_input: String,
    pub login_field: LoginField,
    pub login_error: Option<String>,
    pub login_notice: Option<String>,
    pub login_task: Option<JoinHandle<anyhow::Result<LoginOutcome>>>,

    // Chat state (message list is append-only; a successful history fetch
    // or clear replaces it wholesale)
    pub chat_messages: Vec<ChatMessage>,
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input, in chars
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub history_task: Option<JoinHandle<anyhow::Result<Vec<ChatMessage>>>>,
    pub reply_tasks: Vec<JoinHandle<anyhow::Result<String>>>,
    pub clear_task: Option<JoinHandle<anyhow::Result<String>>>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Backend client
    pub api: ApiClient,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let api = ApiClient::new(&config.server_url());

        Self {
            should_quit: false,
            screen: Screen::Login,
            input_mode: InputMode::Editing,

            username_input: String::new(),
            password_input: String::new(),
            login_field: LoginField::Username,
            login_error: None,
            login_notice: None,
            login_task: None,

            chat_messages: vec![greeting_message()],
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            history_task: None,
            reply_tasks: Vec::new(),
            clear_task: None,

            animation_frame: 0,

            api,
        }
    }

    // Login actions

    /// Submit the login form. Both fields are required; nothing is sent
    /// while either is empty or while a login is already in flight.
    pub fn submit_login(&mut self) {
        if self.login_task.is_some() {
            return;
        }
        if self.username_input.is_empty() || self.password_input.is_empty() {
            self.login_error = Some("Username and password are required".to_string());
            return;
        }

        let api = self.api.clone();
        let username = self.username_input.clone();
        let password = self.password_input.clone();
        self.login_task = Some(tokio::spawn(async move {
            api.login(&username, &password).await
        }));
    }

    /// Dismiss the login success notice and switch to the chat view. This is
    /// the login success callback; it runs once per accepted login.
    pub fn acknowledge_notice(&mut self) {
        if self.login_notice.take().is_some() {
            self.enter_chat();
        }
    }

    /// Mount the chat view and start loading the server-side history.
    /// Credentials do not outlive the login view.
    pub fn enter_chat(&mut self) {
        self.username_input.clear();
        self.password_input.clear();
        self.screen = Screen::Chat;
        self.input_mode = InputMode::Editing;

        let api = self.api.clone();
        self.history_task = Some(tokio::spawn(async move { api.chat_history().await }));
    }

    // Chat actions

    /// Send the typed message. Whitespace-only input is ignored; otherwise
    /// the message shows up immediately and the request runs in the
    /// background. Several sends may be in flight at once; replies append
    /// in whatever order they complete.
    pub fn submit_message(&mut self) {
        if self.chat_input.trim().is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.chat_input);
        self.chat_cursor = 0;
        self.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: text.clone(),
        });
        self.scroll_chat_to_bottom();

        let api = self.api.clone();
        self.reply_tasks.push(tokio::spawn(async move { api.chat(&text).await }));
    }

    /// Ask the server to reset the conversation. The local transcript only
    /// resets once the server confirms.
    pub fn clear_conversation(&mut self) {
        if self.clear_task.is_some() {
            return;
        }

        let api = self.api.clone();
        self.clear_task = Some(tokio::spawn(async move { api.clear_history().await }));
    }

    pub fn awaiting_reply(&self) -> bool {
        !self.reply_tasks.is_empty()
    }

    /// Collect any finished background requests. Called on every tick, so a
    /// reply appears whenever its request happens to complete.
    pub async fn poll_tasks(&mut self) {
        if let Some(task) = self.login_task.take() {
            if !task.is_finished() {
                self.login_task = Some(task);
            } else {
                match task.await {
                    Ok(Ok(LoginOutcome::Accepted(message))) => {
                        self.login_error = None;
                        self.login_notice = Some(message);
                    }
                    Ok(Ok(LoginOutcome::Rejected(message))) => {
                        self.login_error = Some(message);
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "login request failed");
                        self.login_error = Some(SERVER_ERROR_MESSAGE.to_string());
                    }
                    Err(e) => {
                        warn!(error = %e, "login task panicked");
                        self.login_error = Some(SERVER_ERROR_MESSAGE.to_string());
                    }
                }
            }
        }

        if let Some(task) = self.history_task.take() {
            if !task.is_finished() {
                self.history_task = Some(task);
            } else {
                match task.await {
                    Ok(Ok(history)) => {
                        // Replace the transcript wholesale, greeting included,
                        // even when the server returns an empty list.
                        self.chat_messages = history;
                        self.scroll_chat_to_bottom();
                    }
                    Ok(Err(e)) => warn!(error = %e, "failed to load chat history"),
                    Err(e) => warn!(error = %e, "history task panicked"),
                }
            }
        }

        let tasks = std::mem::take(&mut self.reply_tasks);
        for task in tasks {
            if !task.is_finished() {
                self.reply_tasks.push(task);
                continue;
            }
            match task.await {
                Ok(Ok(answer)) => {
                    self.chat_messages.push(ChatMessage {
                        role: ChatRole::Assistant,
                        content: answer,
                    });
                    self.scroll_chat_to_bottom();
                }
                // The optimistic message stays put; the failure is only logged.
                Ok(Err(e)) => warn!(error = %e, "chat request failed"),
                Err(e) => warn!(error = %e, "chat task panicked"),
            }
        }

        if let Some(task) = self.clear_task.take() {
            if !task.is_finished() {
                self.clear_task = Some(task);
            } else {
                match task.await {
                    Ok(Ok(message)) => {
                        info!(message = %message, "conversation cleared");
                        self.chat_messages = vec![greeting_message()];
                        self.chat_scroll = 0;
                    }
                    Ok(Err(e)) => warn!(error = %e, "clear request failed"),
                    Err(e) => warn!(error = %e, "clear task panicked"),
                }
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.awaiting_reply() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_half_page_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(self.chat_height / 2);
    }

    pub fn scroll_half_page_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(self.chat_height / 2);
    }

    pub fn scroll_chat_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Scroll so the newest message (or the "Thinking" indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.chat_messages {
            total_lines += 1; // Role line ("You:" or "Aariv:")
            for line in msg.content.lines() {
                // Character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.awaiting_reply() {
            total_lines += 2; // Role line + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::json;
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn dead_base_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn app_for(base_url: &str) -> App {
        let config = Config {
            server_url: Some(base_url.to_string()),
        };
        App::new(&config)
    }

    /// Drive `poll_tasks` until every background request has been harvested.
    async fn settle(app: &mut App) {
        for _ in 0..200 {
            app.poll_tasks().await;
            let idle = app.login_task.is_none()
                && app.history_task.is_none()
                && app.reply_tasks.is_empty()
                && app.clear_task.is_none();
            if idle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background tasks did not settle");
    }

    #[tokio::test]
    async fn test_empty_login_fields_send_no_request() {
        let mut app = app_for("http://127.0.0.1:1");

        app.submit_login();
        assert!(app.login_task.is_none());
        assert_eq!(
            app.login_error.as_deref(),
            Some("Username and password are required")
        );

        app.username_input = "admin".to_string();
        app.submit_login();
        assert!(app.login_task.is_none());
    }

    #[tokio::test]
    async fn test_accepted_login_switches_to_chat_once() {
        let router = Router::new()
            .route(
                "/api/login",
                post(|| async { Json(json!({ "message": "Login successful" })) }),
            )
            .route("/api/chat_history", get(|| async { Json(json!([])) }));
        let base = serve(router).await;
        let mut app = app_for(&base);

        app.username_input = "admin".to_string();
        app.password_input = "password123".to_string();
        app.submit_login();
        assert!(app.login_task.is_some());
        settle(&mut app).await;

        // Success surfaces as a blocking notice; the view has not switched yet.
        assert_eq!(app.login_notice.as_deref(), Some("Login successful"));
        assert_eq!(app.screen, Screen::Login);
        assert!(app.login_error.is_none());

        app.acknowledge_notice();
        assert_eq!(app.screen, Screen::Chat);
        assert!(app.login_notice.is_none());
        assert!(app.history_task.is_some());
        assert!(app.username_input.is_empty());
        assert!(app.password_input.is_empty());

        // A second acknowledge is a no-op.
        app.acknowledge_notice();
        assert_eq!(app.screen, Screen::Chat);
        settle(&mut app).await;
    }

    #[tokio::test]
    async fn test_rejected_login_shows_server_message() {
        let router = Router::new().route(
            "/api/login",
            post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "message": "invalid" }))) }),
        );
        let base = serve(router).await;
        let mut app = app_for(&base);

        app.username_input = "admin".to_string();
        app.password_input = "nope".to_string();
        app.submit_login();
        settle(&mut app).await;

        assert_eq!(app.login_error.as_deref(), Some("invalid"));
        assert!(app.login_notice.is_none());
        assert_eq!(app.screen, Screen::Login);
    }

    #[tokio::test]
    async fn test_login_transport_failure_shows_generic_error() {
        let base = dead_base_url().await;
        let mut app = app_for(&base);

        app.username_input = "admin".to_string();
        app.password_input = "password123".to_string();
        app.submit_login();
        settle(&mut app).await;

        assert_eq!(app.login_error.as_deref(), Some(SERVER_ERROR_MESSAGE));
        assert_eq!(app.screen, Screen::Login);
    }

    #[tokio::test]
    async fn test_history_replaces_greeting() {
        let router = Router::new().route(
            "/api/chat_history",
            get(|| async { Json(json!([ { "role": "user", "content": "hi" } ])) }),
        );
        let base = serve(router).await;
        let mut app = app_for(&base);
        assert_eq!(app.chat_messages, vec![greeting_message()]);

        app.enter_chat();
        settle(&mut app).await;

        assert_eq!(app.chat_messages.len(), 1);
        assert_eq!(app.chat_messages[0].role, ChatRole::User);
        assert_eq!(app.chat_messages[0].content, "hi");
    }

    #[tokio::test]
    async fn test_history_failure_keeps_greeting() {
        let base = dead_base_url().await;
        let mut app = app_for(&base);

        app.enter_chat();
        settle(&mut app).await;

        assert_eq!(app.chat_messages, vec![greeting_message()]);
    }

    #[tokio::test]
    async fn test_submit_appends_optimistically_then_reply() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { Json(json!({ "answer": "world" })) }),
        );
        let base = serve(router).await;
        let mut app = app_for(&base);

        app.chat_input = "hello".to_string();
        app.submit_message();

        // User bubble shows before the server answers.
        assert_eq!(app.chat_messages.len(), 2);
        assert_eq!(app.chat_messages[1].role, ChatRole::User);
        assert_eq!(app.chat_messages[1].content, "hello");
        assert!(app.chat_input.is_empty());
        assert!(app.awaiting_reply());

        settle(&mut app).await;

        assert_eq!(app.chat_messages.len(), 3);
        assert_eq!(app.chat_messages[2].role, ChatRole::Assistant);
        assert_eq!(app.chat_messages[2].content, "world");
        assert!(!app.awaiting_reply());
    }

    #[tokio::test]
    async fn test_whitespace_message_sends_nothing() {
        let mut app = app_for("http://127.0.0.1:1");

        app.chat_input = "   ".to_string();
        app.submit_message();
        assert_eq!(app.chat_messages.len(), 1);
        assert!(app.reply_tasks.is_empty());

        app.chat_input.clear();
        app.submit_message();
        assert_eq!(app.chat_messages.len(), 1);
        assert!(app.reply_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_reply_transport_failure_leaves_user_message() {
        let base = dead_base_url().await;
        let mut app = app_for(&base);

        app.chat_input = "hello".to_string();
        app.submit_message();
        settle(&mut app).await;

        // Optimistic bubble stays, no reply, no error bubble.
        assert_eq!(app.chat_messages.len(), 2);
        assert_eq!(app.chat_messages[1].role, ChatRole::User);
        assert_eq!(app.chat_messages[1].content, "hello");
    }

    #[tokio::test]
    async fn test_concurrent_sends_each_get_a_reply() {
        let router = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(json!({ "answer": format!("re: {}", body["message"].as_str().unwrap()) }))
            }),
        );
        let base = serve(router).await;
        let mut app = app_for(&base);

        app.chat_input = "first".to_string();
        app.submit_message();
        app.chat_input = "second".to_string();
        app.submit_message();
        assert_eq!(app.reply_tasks.len(), 2);

        settle(&mut app).await;

        // Greeting + two user bubbles + two replies; reply order is whatever
        // completion order happened to be.
        assert_eq!(app.chat_messages.len(), 5);
        let replies: Vec<&str> = app
            .chat_messages
            .iter()
            .filter(|m| m.role == ChatRole::Assistant && m.content.starts_with("re: "))
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(replies.len(), 2);
        assert!(replies.contains(&"re: first"));
        assert!(replies.contains(&"re: second"));
    }

    #[tokio::test]
    async fn test_clear_resets_to_greeting() {
        let router = Router::new().route(
            "/api/clear",
            post(|| async { Json(json!({ "message": "Conversation history cleared." })) }),
        );
        let base = serve(router).await;
        let mut app = app_for(&base);

        app.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: "hello".to_string(),
        });
        app.clear_conversation();
        settle(&mut app).await;

        assert_eq!(app.chat_messages, vec![greeting_message()]);
    }

    #[tokio::test]
    async fn test_clear_failure_keeps_transcript() {
        let base = dead_base_url().await;
        let mut app = app_for(&base);

        app.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: "hello".to_string(),
        });
        app.clear_conversation();
        settle(&mut app).await;

        assert_eq!(app.chat_messages.len(), 2);
    }

    #[test]
    fn test_animation_only_advances_while_waiting() {
        let config = Config {
            server_url: Some("http://127.0.0.1:1".to_string()),
        };
        let mut app = App::new(&config);

        app.tick_animation();
        assert_eq!(app.animation_frame, 0);
    }
}
