//! The Mattermost adapter.
//!
//! [`BridgeBuilder::connect`] resolves the transports, logs in, and starts the
//! background tasks; [`MattermostBridge::send`] carries relay messages the
//! other way.

use crate::avatar::AvatarCache;
use crate::connect::{self, ConnectionMode, ConnectionPlan};
use crate::dispatch::WebhookDispatcher;
use crate::error::BridgeError;
use crate::event::{LoopMarker, NativeEvent};
use crate::filter::{DropReason, FilterOptions, InboundFilter, Verdict};
use crate::session::{new_session, SchemaRevision, SessionAdapter, SessionConnector, SessionCredentials};
use crate::topic;
use crate::translate::Translator;
use crate::version;
use crate::webhook::{IncomingMessage, WebhookClient, WebhookListener, WebhookSender};
use crate::Result;
use chatrelay_core::config::{GeneralConfig, MattermostConfig};
use chatrelay_core::{Event, InstanceId, Message};
use parking_lot::Mutex;
use reqwest::Client;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Account of the Mattermost plugin bridge, which never touches headers.
pub const PLUGIN_ACCOUNT: &str = "mattermost.plugin";

/// Capacity of the native event and webhook queues.
const QUEUE_SIZE: usize = 100;

/// Configures and connects a [`MattermostBridge`].
pub struct BridgeBuilder {
    config: MattermostConfig,
    general: GeneralConfig,
    instance_id: InstanceId,
    connector: Option<Arc<dyn SessionConnector>>,
    webhook_sender: Option<Arc<dyn WebhookSender>>,
    revision: Option<SchemaRevision>,
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("account", &self.config.account())
            .field("instance_id", &self.instance_id)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl BridgeBuilder {
    /// Start from the adapter configuration.
    pub fn new(config: MattermostConfig) -> Self {
        Self {
            config,
            general: GeneralConfig::default(),
            instance_id: InstanceId::generate(),
            connector: None,
            webhook_sender: None,
            revision: None,
        }
    }

    /// Shared settings.
    pub fn general(mut self, general: GeneralConfig) -> Self {
        self.general = general;
        self
    }

    /// Fix the instance id used for the loop marker.
    pub fn instance_id(mut self, id: InstanceId) -> Self {
        self.instance_id = id;
        self
    }

    /// Session client factory; required whenever a session is configured.
    pub fn connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the HTTP webhook client.
    pub fn webhook_sender(mut self, sender: Arc<dyn WebhookSender>) -> Self {
        self.webhook_sender = Some(sender);
        self
    }

    /// Force a schema revision, skipping configuration and probing.
    pub fn revision(mut self, revision: SchemaRevision) -> Self {
        self.revision = Some(revision);
        self
    }

    async fn pick_revision(&self) -> Result<SchemaRevision> {
        if let Some(revision) = self
            .revision
            .or_else(|| SchemaRevision::from_config(self.config.api_revision))
        {
            return Ok(revision);
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(self.config.skip_tls_verify)
            .timeout(Duration::from_secs(10))
            .build()?;
        let reported =
            version::probe_server_version(&client, &self.config.server, self.config.no_tls).await;
        Ok(reported
            .as_deref()
            .and_then(SchemaRevision::from_server_version)
            .unwrap_or(SchemaRevision::Legacy))
    }

    async fn open_session(&self, plan: &ConnectionPlan) -> Result<Option<Arc<dyn SessionAdapter>>> {
        let Some(auth) = plan.session else {
            return Ok(None);
        };
        let connector = self.connector.as_ref().ok_or_else(|| {
            BridgeError::Config("a session is configured but no session connector was provided".to_string())
        })?;

        let revision = self.pick_revision().await?;
        info!("Using mattermost v6 methods: {}", revision.is_modern());

        let credentials = SessionCredentials::from_config(&self.config, auth);
        let session = new_session(revision, connector.as_ref(), &credentials);

        info!(
            "Connecting {} (team: {}) on {}",
            self.config.login, self.config.team, self.config.server
        );
        session.login().await?;
        info!("Connection succeeded");

        Ok(Some(session))
    }

    /// Bring up every configured transport.
    ///
    /// Accepted inbound messages are pushed onto `remote`. Login or bind
    /// failures abort and are returned; nothing is left running.
    pub async fn connect(self, remote: mpsc::Sender<Message>) -> Result<MattermostBridge> {
        let plan = connect::resolve(&self.config)?;
        let account = self.config.account();
        let marker = LoopMarker::new(&self.instance_id);
        let avatars = Arc::new(AvatarCache::new());
        let translator = Translator::new(
            account.clone(),
            self.config.edit_suffix.clone(),
            self.general.media_server_download.clone(),
            avatars.clone(),
        );

        let dispatcher = match plan.webhook_url.as_deref() {
            Some(url) => {
                let sender: Arc<dyn WebhookSender> = match &self.webhook_sender {
                    Some(sender) => sender.clone(),
                    None => Arc::new(WebhookClient::new(url, self.config.skip_tls_verify)?),
                };
                Some(WebhookDispatcher::new(sender, marker.clone(), &self.config, &self.general))
            }
            None => None,
        };

        let session = self.open_session(&plan).await?;

        let listener = match plan.webhook_bind.as_deref() {
            Some(addr) => Some(WebhookListener::bind(addr).await?),
            None => None,
        };
        let webhook_addr = listener.as_ref().map(WebhookListener::local_addr).transpose()?;

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let (team_id, bot_username) = match &session {
            Some(session) if plan.receives_via_session() => {
                let team_id = session.team_id();
                let bot_username = session.bot_username();
                let filter = InboundFilter::new(
                    FilterOptions {
                        no_send_join_part: self.config.no_send_join_part,
                        edit_disable: self.config.edit_disable,
                    },
                    marker.clone(),
                    team_id.clone(),
                    bot_username.clone(),
                    account.clone(),
                );

                let (events_tx, events_rx) = mpsc::channel(QUEUE_SIZE);
                tasks.extend(session.spawn_loops(Some(events_tx), cancel.clone()));
                tasks.push(tokio::spawn(pump_events(
                    events_rx,
                    filter,
                    translator.clone(),
                    remote.clone(),
                    cancel.clone(),
                )));
                (team_id, bot_username)
            }
            Some(session) => {
                debug!("Session is send-only, receiving through the webhook listener");
                tasks.extend(session.spawn_loops(None, cancel.clone()));
                (session.team_id(), session.bot_username())
            }
            None => (String::new(), String::new()),
        };

        if let Some(listener) = listener {
            let (hook_tx, hook_rx) = mpsc::channel(QUEUE_SIZE);
            let stop = cancel.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = listener.run(hook_tx, stop).await {
                    error!("Webhook listener failed: {}", e);
                }
            }));
            tasks.push(tokio::spawn(pump_webhooks(
                hook_rx,
                translator,
                remote,
                cancel.clone(),
            )));
        }

        info!("Mattermost adapter {} connected ({})", account, plan.mode);

        Ok(MattermostBridge {
            account,
            prefix_messages_with_nick: self.config.prefix_messages_with_nick,
            plan,
            session,
            dispatcher,
            marker,
            avatars,
            team_id,
            bot_username,
            webhook_addr,
            cancel,
            tasks: Mutex::new(tasks),
        })
    }
}

async fn pump_events(
    mut events: mpsc::Receiver<Box<dyn NativeEvent>>,
    filter: InboundFilter,
    translator: Translator,
    remote: mpsc::Sender<Message>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let message = match filter.classify(event.as_ref()) {
            Verdict::Forward => translator.from_event(event.as_ref()),
            Verdict::JoinLeave(notice) => {
                debug!("Sending JOIN_LEAVE event from {} to gateway", notice.account);
                notice
            }
            Verdict::Drop(DropReason::OwnMessage) => {
                debug!("sent by us, ignoring");
                continue;
            }
            Verdict::Drop(reason) => {
                debug!("Dropping {} event: {:?}", event.event_kind(), reason);
                continue;
            }
        };

        debug!("<= Sending message from {} on {} to gateway", message.username, message.account);
        if remote.send(message).await.is_err() {
            warn!("Relay bus closed, stopping inbound pump");
            break;
        }
    }
}

async fn pump_webhooks(
    mut hooks: mpsc::Receiver<IncomingMessage>,
    translator: Translator,
    remote: mpsc::Sender<Message>,
    cancel: CancellationToken,
) {
    loop {
        let incoming = tokio::select! {
            _ = cancel.cancelled() => break,
            incoming = hooks.recv() => match incoming {
                Some(incoming) => incoming,
                None => break,
            },
        };

        let message = translator.from_webhook(&incoming);
        debug!("<= Sending message from {} on {} to gateway", message.username, message.account);
        if remote.send(message).await.is_err() {
            warn!("Relay bus closed, stopping webhook pump");
            break;
        }
    }
}

/// A connected Mattermost adapter.
pub struct MattermostBridge {
    account: String,
    prefix_messages_with_nick: bool,
    plan: ConnectionPlan,
    session: Option<Arc<dyn SessionAdapter>>,
    dispatcher: Option<WebhookDispatcher>,
    marker: LoopMarker,
    avatars: Arc<AvatarCache>,
    team_id: String,
    bot_username: String,
    webhook_addr: Option<SocketAddr>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for MattermostBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MattermostBridge")
            .field("account", &self.account)
            .field("mode", &self.plan.mode)
            .field("team_id", &self.team_id)
            .field("bot_username", &self.bot_username)
            .field("webhook_addr", &self.webhook_addr)
            .finish_non_exhaustive()
    }
}

impl MattermostBridge {
    /// Account identifier, `mattermost.<name>`.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Resolved connection mode.
    pub fn mode(&self) -> ConnectionMode {
        self.plan.mode
    }

    /// Resolved transports.
    pub fn plan(&self) -> &ConnectionPlan {
        &self.plan
    }

    /// Schema revision of the session, if one is open.
    pub fn revision(&self) -> Option<SchemaRevision> {
        self.session.as_ref().map(|s| s.revision())
    }

    /// Team the session is scoped to; empty without a session.
    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    /// Username of the session account; empty without a session.
    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    /// Loop marker stamped on outbound posts.
    pub fn marker(&self) -> &LoopMarker {
        &self.marker
    }

    /// Avatar cache.
    pub fn avatars(&self) -> &Arc<AvatarCache> {
        &self.avatars
    }

    /// Address of the webhook listener, if one is running.
    pub fn webhook_addr(&self) -> Option<SocketAddr> {
        self.webhook_addr
    }

    /// Deliver a relay message to Mattermost.
    ///
    /// Returns the new post id when posted through the session, or an empty
    /// string otherwise.
    pub async fn send(&self, msg: &Message) -> Result<String> {
        debug!("=> Receiving {:?} from {} for {}", msg.event, msg.account, msg.channel);

        if msg.event == Event::AvatarDownload {
            self.avatars.record_from_message(msg);
            return Ok(String::new());
        }

        let mut msg = msg.clone();
        if msg.event == Event::UserAction {
            msg.text = format!("*{}*", msg.text);
        }

        if msg.event == Event::TopicChange && self.session.is_some() {
            self.change_channel_header(&msg).await?;
            return Ok(String::new());
        }

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(&msg).await?;
            return Ok(String::new());
        }

        self.post_via_session(msg).await
    }

    async fn post_via_session(&self, mut msg: Message) -> Result<String> {
        let Some(session) = &self.session else {
            return Err(BridgeError::not_supported("no outbound transport is configured"));
        };

        if !matches!(msg.event, Event::Plain | Event::UserAction | Event::JoinLeave) {
            debug!("Skipping {} event for session", msg.event.as_str());
            return Ok(String::new());
        }

        if self.prefix_messages_with_nick {
            msg.text = format!("{}{}", msg.username, msg.text);
        }
        let urls: Vec<String> = msg
            .files()
            .iter()
            .filter(|f| !f.url.is_empty())
            .map(|f| f.url.clone())
            .collect();
        for url in urls {
            msg.text.push_str(&url);
        }

        let channel_id = session.channel_id(&msg.channel, &self.team_id).await?;
        match session
            .post_message(&channel_id, &msg.text, &msg.parent_id, self.marker.props())
            .await
        {
            Ok(id) => Ok(id),
            Err(e) => {
                error!("Posting to {} failed: {}", msg.channel, e);
                Err(e)
            }
        }
    }

    /// Apply a header change notification to its channel.
    pub async fn change_channel_header(&self, msg: &Message) -> Result<()> {
        if self.account == PLUGIN_ACCOUNT {
            return Err(BridgeError::not_supported("header changes are ignored for the plugin account"));
        }
        let Some(session) = &self.session else {
            return Err(BridgeError::not_supported("webhook clients cannot change channel headers"));
        };

        let channel_id = session.channel_id(&msg.channel, &self.team_id).await?;
        let header = match topic::extract_topic(&msg.text) {
            Ok(change) => change.new,
            Err(e) => {
                debug!("Using header text verbatim: {}", e);
                topic::header_text(&msg.text).to_string()
            }
        };

        session.update_channel_header(&channel_id, &header).await
    }

    /// Stop every background task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Adapter task ended abnormally: {}", e);
            }
        }
        info!("Mattermost adapter {} stopped", self.account);
    }
}

impl Drop for MattermostBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
