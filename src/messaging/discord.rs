//! Discord implementation of [`MessagingPort`].
//!
//! Actions go through the REST API. Replies and reactions arrive over the
//! gateway websocket and are fanned out on a broadcast channel; a short
//! ring buffer of recent events covers replies that land before the waiter
//! subscribes.

use crate::campaign::{ParticipantOutcome, Report, ReportEntry};
use crate::config::DiscordConfig;
use crate::messaging::traits::{
    ChannelRef, MessageRef, MessagingError, MessagingPort, Participant, Reaction, ReactionFilter,
    Reply, ReplyFilter,
};
use crate::store::Answer;
use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{OnceCell, broadcast, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// GUILDS | GUILD_MEMBERS | GUILD_MESSAGES | GUILD_MESSAGE_REACTIONS |
// DIRECT_MESSAGES | DIRECT_MESSAGE_REACTIONS | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = 46_595;
const EVENT_CHANNEL_CAPACITY: usize = 256;
const RECENT_EVENT_LIMIT: usize = 256;
const MEMBER_PAGE_SIZE: usize = 1000;
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const EMBED_DESCRIPTION_LIMIT: usize = 4096;
const EMBEDS_PER_MESSAGE: usize = 10;
/// "Cannot send messages to this user".
const CANNOT_DM_USER: u64 = 50_007;
const PRESENCE_ACTIVITY: &str = "Tracking Check-ins";
const ACTIVITY_WATCHING: u8 = 3;
/// Sessions that lasted this long reset the reconnect backoff.
const STABLE_SESSION: Duration = Duration::from_secs(300);

/// A message seen on the gateway.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: String,
    pub channel_id: String,
    /// `None` for direct messages.
    pub guild_id: Option<String>,
    pub author_id: String,
    pub author_is_bot: bool,
    pub content: String,
    pub received_at: Instant,
}

/// A reaction seen on the gateway.
#[derive(Debug, Clone)]
pub struct InboundReaction {
    pub message_id: String,
    pub channel_id: String,
    pub user_id: String,
    /// Unicode emoji, or `name:id` for custom emoji.
    pub symbol: String,
    pub received_at: Instant,
}

/// Inbound gateway traffic the engine cares about.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Message(InboundMessage),
    Reaction(InboundReaction),
}

#[derive(Debug, thiserror::Error)]
enum RestError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status {
        status: StatusCode,
        code: Option<u64>,
        message: String,
    },
}

impl RestError {
    /// The recipient does not accept direct messages from the bot.
    fn refuses_direct_messages(&self) -> bool {
        match self {
            Self::Status { status, code, .. } => {
                *code == Some(CANNOT_DM_USER)
                    || *status == StatusCode::FORBIDDEN
                    || *status == StatusCode::NOT_FOUND
            }
            Self::Request(_) => false,
        }
    }

    fn into_messaging(self, direct: bool) -> MessagingError {
        if direct && self.refuses_direct_messages() {
            MessagingError::Unreachable(self.to_string())
        } else {
            MessagingError::Transport(self.to_string())
        }
    }
}

impl From<RestError> for MessagingError {
    fn from(err: RestError) -> Self {
        err.into_messaging(false)
    }
}

fn decode_error(err: reqwest::Error) -> MessagingError {
    MessagingError::Transport(format!("unexpected discord response: {err}"))
}

/// Discord adapter using the gateway websocket and REST API.
pub struct DiscordAdapter {
    bot_token: String,
    bot_user_id: String,
    api_base: String,
    roster_channel: ChannelRef,
    guild_id: OnceCell<String>,
    client: reqwest::Client,
    events: broadcast::Sender<GatewayEvent>,
    recent: Mutex<VecDeque<GatewayEvent>>,
    last_sent: Mutex<HashMap<String, Instant>>,
    direct_channels: Mutex<HashSet<String>>,
    ready: watch::Sender<bool>,
}

impl DiscordAdapter {
    /// Build an adapter. The roster is the membership of the guild that
    /// owns `roster_channel` unless `config.guild_id` is set.
    pub fn new(config: &DiscordConfig, roster_channel: ChannelRef) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (ready, _) = watch::channel(false);
        Self {
            bot_token: config.bot_token.clone(),
            bot_user_id: Self::bot_user_id_from_token(&config.bot_token).unwrap_or_default(),
            api_base: config.api_base_url.trim_end_matches('/').to_owned(),
            roster_channel,
            guild_id: OnceCell::new_with(config.guild_id.clone()),
            client: reqwest::Client::new(),
            events,
            recent: Mutex::new(VecDeque::with_capacity(RECENT_EVENT_LIMIT)),
            last_sent: Mutex::new(HashMap::new()),
            direct_channels: Mutex::new(HashSet::new()),
            ready,
        }
    }

    fn bot_user_id_from_token(token: &str) -> Option<String> {
        let first = token.split('.').next()?;
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(first)
            .ok()?;
        String::from_utf8(decoded).ok()
    }

    /// Receive every inbound gateway event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Wait until a gateway session is identified. Returns `false` on
    /// timeout.
    pub async fn wait_until_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.ready.subscribe();
        matches!(tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await, Ok(Ok(_)))
    }

    /// Keep a gateway session alive until `cancel` fires, reconnecting with
    /// capped exponential backoff.
    pub async fn run_forever(&self, cancel: CancellationToken) {
        let mut backoff_secs = 2u64;
        loop {
            let started = Instant::now();
            let outcome = self.run_session(&cancel).await;
            self.ready.send_replace(false);
            match outcome {
                Ok(()) if cancel.is_cancelled() => break,
                Ok(()) => warn!("discord gateway session ended; reconnecting"),
                Err(e) => warn!("discord gateway failed: {e:#}; retrying in {backoff_secs}s"),
            }
            if started.elapsed() >= STABLE_SESSION {
                backoff_secs = 2;
            }
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
            }
            backoff_secs = backoff_secs.saturating_mul(2).min(60);
        }
        info!("discord gateway stopped");
    }

    async fn run_session(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("discord bot token is empty");
        }

        let gateway: Value = self
            .rest(Method::GET, "/gateway/bot", None)
            .await?
            .json()
            .await?;
        let gateway_url = gateway
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or("wss://gateway.discord.gg");
        let ws_url = format!("{gateway_url}/?v=10&encoding=json");

        let (stream, _) = tokio_tungstenite::connect_async(&ws_url).await?;
        let (mut write, mut read) = stream.split();

        let hello = read
            .next()
            .await
            .ok_or_else(|| anyhow::anyhow!("no hello"))??;
        let hello_json: Value = match hello {
            Message::Text(text) => serde_json::from_str(&text)?,
            _ => anyhow::bail!("unexpected discord hello payload"),
        };
        let heartbeat_interval_ms = hello_json
            .get("d")
            .and_then(|v| v.get("heartbeat_interval"))
            .and_then(Value::as_u64)
            .unwrap_or(41_250);

        let identify = identify_payload(&self.bot_token);
        write.send(Message::Text(identify.to_string())).await?;

        let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_interval_ms));
        heartbeat.tick().await;
        let mut seq: Option<u64> = None;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    let beat = json!({"op": 1, "d": seq});
                    if write.send(Message::Text(beat.to_string())).await.is_err() {
                        anyhow::bail!("discord heartbeat failed");
                    }
                }
                maybe_msg = read.next() => {
                    let raw = match maybe_msg {
                        Some(Ok(Message::Text(text))) => text.to_string(),
                        Some(Ok(Message::Close(_))) | None => {
                            anyhow::bail!("discord websocket closed");
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => anyhow::bail!("discord websocket error: {err}"),
                    };
                    let Ok(payload) = serde_json::from_str::<Value>(&raw) else {
                        continue;
                    };
                    if let Some(s) = payload.get("s").and_then(Value::as_u64) {
                        seq = Some(s);
                    }

                    match payload.get("op").and_then(Value::as_u64).unwrap_or_default() {
                        0 => {
                            let name = payload.get("t").and_then(Value::as_str).unwrap_or_default();
                            if name == "READY" {
                                info!("discord gateway ready");
                                self.ready.send_replace(true);
                            }
                            let data = payload.get("d").unwrap_or(&Value::Null);
                            if let Some(event) = parse_dispatch(name, data, &self.bot_user_id) {
                                self.publish_event(event);
                            }
                        }
                        1 => {
                            let beat = json!({"op": 1, "d": seq});
                            write.send(Message::Text(beat.to_string())).await?;
                        }
                        7 => anyhow::bail!("discord requested a reconnect"),
                        9 => anyhow::bail!("discord invalidated the session"),
                        _ => {}
                    }
                }
            }
        }
    }

    fn publish_event(&self, event: GatewayEvent) {
        {
            let mut recent = lock(&self.recent);
            if recent.len() >= RECENT_EVENT_LIMIT {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn note_sent(&self, channel: &ChannelRef) {
        lock(&self.last_sent).insert(channel.as_str().to_owned(), Instant::now());
    }

    fn is_direct(&self, channel: &ChannelRef) -> bool {
        lock(&self.direct_channels).contains(channel.as_str())
    }

    async fn rest(&self, method: Method, path: &str, body: Option<&Value>) -> Result<reqwest::Response, RestError> {
        let url = format!("{}{path}", self.api_base);
        let mut rate_limited = 0;
        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("Authorization", format!("Bot {}", self.bot_token));
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let text = response.text().await.unwrap_or_default();
            let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            if status == StatusCode::TOO_MANY_REQUESTS && rate_limited < MAX_RATE_LIMIT_RETRIES {
                rate_limited += 1;
                let retry_after = parsed
                    .get("retry_after")
                    .and_then(Value::as_f64)
                    .unwrap_or(1.0)
                    .clamp(0.0, 60.0);
                warn!("discord rate limited on {method} {path}; waiting {retry_after:.2}s");
                tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                continue;
            }

            return Err(RestError::Status {
                status,
                code: parsed.get("code").and_then(Value::as_u64),
                message: parsed
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or(text),
            });
        }
    }

    async fn guild_id(&self) -> Result<&str, MessagingError> {
        self.guild_id
            .get_or_try_init(|| async {
                let channel: Value = self
                    .rest(Method::GET, &format!("/channels/{}", self.roster_channel), None)
                    .await?
                    .json()
                    .await
                    .map_err(decode_error)?;
                channel
                    .get("guild_id")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        MessagingError::Transport(format!(
                            "roster channel {} does not belong to a guild",
                            self.roster_channel
                        ))
                    })
            })
            .await
            .map(String::as_str)
    }

    fn recent_match<T>(&self, mut pick: impl FnMut(&GatewayEvent) -> Option<T>) -> Option<T> {
        lock(&self.recent).iter().find_map(&mut pick)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn match_reply(event: &GatewayEvent, channel: &ChannelRef, filter: &ReplyFilter, since: Instant) -> Option<Reply> {
    let GatewayEvent::Message(message) = event else {
        return None;
    };
    if message.channel_id != channel.as_str() || message.author_id != filter.author || message.received_at < since {
        return None;
    }
    Some(Reply {
        message: MessageRef {
            channel: channel.clone(),
            id: message.id.clone(),
        },
        author: message.author_id.clone(),
        text: message.content.clone(),
        received_at: message.received_at,
    })
}

fn match_reaction(event: &GatewayEvent, target: &MessageRef, filter: &ReactionFilter) -> Option<Reaction> {
    let GatewayEvent::Reaction(reaction) = event else {
        return None;
    };
    if reaction.message_id != target.id || reaction.user_id != filter.user || !filter.allows(&reaction.symbol) {
        return None;
    }
    Some(Reaction {
        symbol: reaction.symbol.clone(),
        user: reaction.user_id.clone(),
        received_at: reaction.received_at,
    })
}

/// Turn a gateway dispatch into an engine event. The bot's own traffic is
/// dropped.
pub fn parse_dispatch(name: &str, data: &Value, bot_user_id: &str) -> Option<GatewayEvent> {
    let str_field = |value: &Value, key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
    match name {
        "MESSAGE_CREATE" => {
            let author = data.get("author")?;
            let author_id = str_field(author, "id")?;
            if author_id == bot_user_id {
                return None;
            }
            Some(GatewayEvent::Message(InboundMessage {
                id: str_field(data, "id")?,
                channel_id: str_field(data, "channel_id")?,
                guild_id: str_field(data, "guild_id"),
                author_is_bot: author.get("bot").and_then(Value::as_bool).unwrap_or(false),
                author_id,
                content: str_field(data, "content").unwrap_or_default().trim().to_owned(),
                received_at: Instant::now(),
            }))
        }
        "MESSAGE_REACTION_ADD" => {
            let user_id = str_field(data, "user_id")?;
            if user_id == bot_user_id {
                return None;
            }
            let emoji = data.get("emoji")?;
            let emoji_name = str_field(emoji, "name")?;
            let symbol = match str_field(emoji, "id") {
                Some(id) => format!("{emoji_name}:{id}"),
                None => emoji_name,
            };
            Some(GatewayEvent::Reaction(InboundReaction {
                message_id: str_field(data, "message_id")?,
                channel_id: str_field(data, "channel_id")?,
                user_id,
                symbol,
                received_at: Instant::now(),
            }))
        }
        _ => None,
    }
}

fn participant_from_member(member: &Value) -> Option<Participant> {
    let user = member.get("user")?;
    let id = user.get("id").and_then(Value::as_str)?;
    let label = [member.get("nick"), user.get("global_name"), user.get("username")]
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .unwrap_or(id);
    let participant = if user.get("bot").and_then(Value::as_bool).unwrap_or(false) {
        Participant::bot(id, label)
    } else {
        Participant::new(id, label)
    };
    Some(participant)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Gateway identify (op 2). The bot shows as "Watching Tracking Check-ins".
fn identify_payload(token: &str) -> Value {
    json!({
        "op": 2,
        "d": {
            "token": token,
            "intents": GATEWAY_INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "rollcall",
                "device": "rollcall"
            },
            "presence": {
                "activities": [{ "name": PRESENCE_ACTIVITY, "type": ACTIVITY_WATCHING }],
                "status": "online",
                "since": null,
                "afk": false
            }
        }
    })
}

fn deadline_after(timeout: Duration) -> Result<Instant, MessagingError> {
    Instant::now()
        .checked_add(timeout)
        .ok_or_else(|| MessagingError::Transport(format!("wait of {}s is out of range", timeout.as_secs())))
}

fn answer_lines<'a>(answers: impl Iterator<Item = &'a Answer>) -> Vec<String> {
    answers
        .map(|answer| format!("**{}**\n{}", answer.prompt, answer.value))
        .collect()
}

fn entry_description(entry: &ReportEntry) -> String {
    match &entry.outcome {
        ParticipantOutcome::Answered(answers) => answer_lines(answers.iter()).join("\n\n"),
        ParticipantOutcome::Unreachable { reason, answers } => {
            let mut lines = answer_lines(answers.iter().filter(|a| !a.value.is_no_response()));
            lines.push(format!("_Unreachable: {reason}_"));
            lines.join("\n\n")
        }
        ParticipantOutcome::Failed { reason } => format!("_Check-in failed: {reason}_"),
    }
}

/// One embed per participant, in roster order.
pub fn report_embeds(report: &Report) -> Vec<Value> {
    report
        .entries
        .iter()
        .map(|entry| {
            json!({
                "title": "Weekly Check-in",
                "author": { "name": format!("Responses from {}", entry.participant.label) },
                "description": truncate_chars(&entry_description(entry), EMBED_DESCRIPTION_LIMIT),
                "timestamp": report.finished_at.to_rfc3339(),
            })
        })
        .collect()
}

#[async_trait]
impl MessagingPort for DiscordAdapter {
    fn id(&self) -> &'static str {
        "discord"
    }

    async fn resolve_roster(&self) -> Result<Vec<Participant>, MessagingError> {
        let guild = self.guild_id().await?;
        let mut roster = Vec::new();
        let mut after = "0".to_owned();
        loop {
            let page: Vec<Value> = self
                .rest(
                    Method::GET,
                    &format!("/guilds/{guild}/members?limit={MEMBER_PAGE_SIZE}&after={after}"),
                    None,
                )
                .await?
                .json()
                .await
                .map_err(decode_error)?;
            let page_len = page.len();
            for participant in page.iter().filter_map(participant_from_member) {
                after.clone_from(&participant.id);
                roster.push(participant);
            }
            if page_len < MEMBER_PAGE_SIZE {
                break;
            }
        }
        debug!(guild, members = roster.len(), "roster resolved");
        Ok(roster)
    }

    async fn verify_channel(&self, channel: &ChannelRef) -> Result<(), MessagingError> {
        self.rest(Method::GET, &format!("/channels/{channel}"), None)
            .await?;
        Ok(())
    }

    async fn open_direct_channel(&self, participant: &Participant) -> Result<ChannelRef, MessagingError> {
        let body = json!({ "recipient_id": participant.id });
        let channel: Value = self
            .rest(Method::POST, "/users/@me/channels", Some(&body))
            .await
            .map_err(|e| e.into_messaging(true))?
            .json()
            .await
            .map_err(decode_error)?;
        let id = channel
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| MessagingError::Transport("direct channel response had no id".to_owned()))?;
        lock(&self.direct_channels).insert(id.to_owned());
        Ok(ChannelRef::new(id))
    }

    async fn send_message(&self, channel: &ChannelRef, content: &str) -> Result<MessageRef, MessagingError> {
        self.note_sent(channel);
        let body = json!({ "content": content });
        let message: Value = self
            .rest(Method::POST, &format!("/channels/{channel}/messages"), Some(&body))
            .await
            .map_err(|e| e.into_messaging(self.is_direct(channel)))?
            .json()
            .await
            .map_err(decode_error)?;
        let id = message
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| MessagingError::Transport("sent message response had no id".to_owned()))?;
        Ok(MessageRef {
            channel: channel.clone(),
            id: id.to_owned(),
        })
    }

    async fn add_reaction(&self, message: &MessageRef, symbol: &str) -> Result<(), MessagingError> {
        let path = format!(
            "/channels/{}/messages/{}/reactions/{}/@me",
            message.channel,
            message.id,
            urlencoding::encode(symbol)
        );
        self.rest(Method::PUT, &path, None).await?;
        Ok(())
    }

    async fn await_reply(
        &self,
        channel: &ChannelRef,
        filter: &ReplyFilter,
        timeout: Duration,
    ) -> Result<Reply, MessagingError> {
        let deadline = deadline_after(timeout)?;
        let mut rx = self.events.subscribe();
        let since = lock(&self.last_sent)
            .get(channel.as_str())
            .copied()
            .unwrap_or_else(Instant::now);
        if let Some(reply) = self.recent_match(|event| match_reply(event, channel, filter, since)) {
            return Ok(reply);
        }

        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => return Err(MessagingError::Timeout),
                Ok(Ok(event)) => {
                    if let Some(reply) = match_reply(&event, channel, filter, since) {
                        return Ok(reply);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, "reply listener lagged behind gateway events");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(MessagingError::Transport("gateway event stream closed".to_owned()));
                }
            }
        }
    }

    async fn await_reaction(
        &self,
        message: &MessageRef,
        filter: &ReactionFilter,
        timeout: Duration,
    ) -> Result<Reaction, MessagingError> {
        let deadline = deadline_after(timeout)?;
        let mut rx = self.events.subscribe();
        if let Some(reaction) = self.recent_match(|event| match_reaction(event, message, filter)) {
            return Ok(reaction);
        }

        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => return Err(MessagingError::Timeout),
                Ok(Ok(event)) => {
                    if let Some(reaction) = match_reaction(&event, message, filter) {
                        return Ok(reaction);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, "reaction listener lagged behind gateway events");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(MessagingError::Transport("gateway event stream closed".to_owned()));
                }
            }
        }
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), MessagingError> {
        self.rest(
            Method::DELETE,
            &format!("/channels/{}/messages/{}", message.channel, message.id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn publish_report(&self, channel: &ChannelRef, report: &Report) -> Result<(), MessagingError> {
        let path = format!("/channels/{channel}/messages");
        let embeds = report_embeds(report);
        if embeds.is_empty() {
            let body = json!({ "content": "Check-in finished: nobody was on the roster." });
            self.rest(Method::POST, &path, Some(&body)).await?;
            return Ok(());
        }

        for (index, chunk) in embeds.chunks(EMBEDS_PER_MESSAGE).enumerate() {
            let content = if index == 0 {
                format!(
                    "Check-in responses: {} answered, {} unreachable, {} failed",
                    report.answered_count(),
                    report.unreachable_count(),
                    report.failed_count()
                )
            } else {
                String::new()
            };
            let body = json!({ "content": content, "embeds": chunk });
            self.rest(Method::POST, &path, Some(&body)).await?;
        }
        info!(%channel, run_id = %report.run_id, "report published");
        Ok(())
    }
}
