//! Command routing.
//!
//! One handler invocation per inbound chat message. The router owns the
//! author→session table: each author gets a slot behind its own async
//! mutex, held for the whole handling of one message, so same-author
//! messages are strictly serialized even when the transport delivers them
//! concurrently, and the one-session-per-author invariant has a single
//! enforcement point. Raw `Session` references never leave the slot.

mod text;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::compile::{self, Toolchain};
use crate::fetch;
use crate::models::{Author, RegistryError};
use crate::session::{Session, SessionError};
use crate::store::{author_key, Store};

/// One inbound chat message, as delivered by the transport.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub event_id: String,
    pub author_id: String,
    pub channel: String,
    pub text: String,
}

/// Outbound half of the chat transport.
pub trait Transport: Send + Sync {
    fn send(&self, channel: &str, text: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Per-author mutable state: at most one live session.
#[derive(Default)]
struct AuthorSlot {
    session: Option<Session>,
}

/// The single entry point for inbound messages.
pub struct Router<S> {
    store: S,
    tools: Toolchain,
    settle: Duration,
    slots: Mutex<HashMap<String, Arc<Mutex<AuthorSlot>>>>,
}

impl<S: Store> Router<S> {
    pub fn new(store: S, tools: Toolchain, settle: Duration) -> Self {
        Self {
            store,
            tools,
            settle,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one inbound message, sending every reply through `transport`.
    ///
    /// Validation problems are rendered to the user and swallowed;
    /// infrastructure failures are rendered generically to the user AND
    /// returned to the caller for logging.
    pub async fn handle<T: Transport>(&self, msg: &InboundMessage, transport: &T) -> Result<()> {
        if msg.author_id.is_empty() {
            transport.send(&msg.channel, text::UNKNOWN_ERROR).await?;
            return Ok(());
        }

        let slot = self.slot(&msg.author_id).await;
        let mut slot = slot.lock().await;

        let mut author = match self.load_or_welcome(msg, transport).await {
            Ok(author) => author,
            Err(err) => {
                let _ = transport.send(&msg.channel, text::UNKNOWN_ERROR).await;
                return Err(err);
            }
        };

        // With a session live, unprefixed text is gameplay input; prefixed
        // text has the prefix stripped and falls through to the commands.
        let mut command = msg.text.as_str();
        if slot.session.is_some() {
            match command.strip_prefix(author.options.prefix.as_str()) {
                Some(stripped) => command = stripped,
                None => return self.play(&mut slot, msg, transport).await,
            }
        }

        let fields: Vec<&str> = command.split_whitespace().collect();
        let Some(first) = fields.first() else {
            return Ok(());
        };
        let verb = if fields.len() >= 2 {
            format!("{} {}", first, fields[1]).to_lowercase()
        } else {
            first.to_lowercase()
        };

        debug!(event = %msg.event_id, author = %msg.author_id, verb = %verb, "dispatching command");

        match verb.as_str() {
            "help" | "h" => transport.send(&msg.channel, text::HELP).await,
            "story" | "stories" | "s" | "story list" | "list stories" => {
                transport.send(&msg.channel, &text::story_list(&author)).await
            }
            "story add" | "stories add" | "add stories" => {
                self.story_add(&mut author, &fields, msg, transport).await
            }
            "story remove" | "stories remove" | "story rem" | "stories rem" => {
                self.story_remove(&slot, &mut author, &fields, msg, transport)
                    .await
            }
            "story start" | "stories start" => {
                self.story_start(&mut slot, &author, &fields, msg, transport)
                    .await
            }
            "story end" | "stories end" => match slot.session.take() {
                Some(mut session) => {
                    session.close().await;
                    info!(author = %msg.author_id, story = session.story_name(), "session ended");
                    transport.send(&msg.channel, text::STOPPED_SESSION).await
                }
                None => transport.send(&msg.channel, text::NO_ACTIVE_SESSION).await,
            },
            "option" | "options" | "o" | "option list" | "list options" => {
                transport
                    .send(&msg.channel, &text::option_list(&author))
                    .await
            }
            "option set" | "options set" | "set option" | "set options" => {
                self.option_set(&mut author, &fields, msg, transport).await
            }
            _ => {
                transport
                    .send(&msg.channel, &text::unknown_command(&verb))
                    .await
            }
        }
    }

    /// Close every live session. Called on shutdown; sessions also kill
    /// their children on drop, this just makes teardown orderly.
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self.slots.lock().await.values().cloned().collect();
        for slot in slots {
            let mut slot = slot.lock().await;
            if let Some(mut session) = slot.session.take() {
                session.close().await;
            }
        }
    }

    async fn slot(&self, author_id: &str) -> Arc<Mutex<AuthorSlot>> {
        let mut slots = self.slots.lock().await;
        slots.entry(author_id.to_string()).or_default().clone()
    }

    /// Load the author record, or create it and send the one-time welcome.
    /// The new record is persisted before the message is processed further.
    async fn load_or_welcome<T: Transport>(
        &self,
        msg: &InboundMessage,
        transport: &T,
    ) -> Result<Author> {
        let key = author_key(&msg.author_id);
        match self.store.get(&key).await.context("loading author record")? {
            Some(raw) => serde_json::from_slice(&raw).context("decoding author record"),
            None => {
                transport
                    .send(&msg.channel, text::WELCOME)
                    .await
                    .context("sending welcome")?;

                let author = Author::new(msg.author_id.clone());
                self.persist(&author).await?;
                info!(author = %author.id, "registered new author");
                Ok(author)
            }
        }
    }

    async fn persist(&self, author: &Author) -> Result<()> {
        let raw = serde_json::to_vec(author).context("serializing author record")?;
        self.store
            .set(&author_key(&author.id), &raw)
            .await
            .context("persisting author record")
    }

    /// Forward gameplay input to the live session and reply with its
    /// output. A dead interpreter clears the session so the author can
    /// start over.
    async fn play<T: Transport>(
        &self,
        slot: &mut AuthorSlot,
        msg: &InboundMessage,
        transport: &T,
    ) -> Result<()> {
        let run_result = match slot.session.as_mut() {
            Some(session) => session.run(&msg.text).await,
            None => return Ok(()),
        };

        match run_result {
            Ok(()) => {}
            Err(err @ (SessionError::Disabled(_) | SessionError::MetaCommand)) => {
                return transport.send(&msg.channel, &text::run_error(&err)).await;
            }
            Err(SessionError::Exited) => {
                return self.clear_dead_session(slot, msg, transport).await;
            }
            Err(err) => {
                let _ = transport.send(&msg.channel, &text::run_error(&err)).await;
                return Err(anyhow::Error::new(err).context("forwarding session input"));
            }
        }

        let output = match slot.session.as_mut() {
            Some(session) => session.output().await,
            None => return Ok(()),
        };

        match output {
            Ok(out) => transport.send(&msg.channel, &out).await,
            Err(SessionError::Exited) => self.clear_dead_session(slot, msg, transport).await,
            Err(err) => {
                let _ = transport.send(&msg.channel, &text::run_error(&err)).await;
                Err(anyhow::Error::new(err).context("draining session output"))
            }
        }
    }

    async fn clear_dead_session<T: Transport>(
        &self,
        slot: &mut AuthorSlot,
        msg: &InboundMessage,
        transport: &T,
    ) -> Result<()> {
        if let Some(mut session) = slot.session.take() {
            info!(author = %msg.author_id, story = session.story_name(), "interpreter died, clearing session");
            session.close().await;
        }
        transport.send(&msg.channel, text::SESSION_DIED).await
    }

    async fn story_add<T: Transport>(
        &self,
        author: &mut Author,
        fields: &[&str],
        msg: &InboundMessage,
        transport: &T,
    ) -> Result<()> {
        if fields.len() < 4 {
            return transport.send(&msg.channel, text::NEED_NAME_AND_URL).await;
        }
        let (name, url) = (fields[2], fields[3]);

        let source = match fetch::fetch_source(url).await {
            Ok(source) => source,
            Err(err) => {
                return transport
                    .send(&msg.channel, &text::invalid_story(&err))
                    .await;
            }
        };

        let compiled = {
            let story = match author.upsert_story(name, source) {
                Ok(story) => story,
                Err(err) => {
                    return transport
                        .send(&msg.channel, &text::invalid_story(&err))
                        .await;
                }
            };
            match compile::compile(&self.tools, &story.source).await {
                Ok(build) => {
                    story.set_build(build);
                    Ok(())
                }
                Err(err) => Err(err),
            }
        };

        // A failed compile is reported and propagated; nothing is
        // persisted, so the stored record (and any previous good build)
        // stands untouched.
        if let Err(err) = compiled {
            transport
                .send(&msg.channel, &text::compile_failed(&err))
                .await?;
            return Err(anyhow::Error::new(err).context("compiling story"));
        }

        if let Err(err) = self.persist(author).await {
            let _ = transport.send(&msg.channel, text::UNKNOWN_ERROR).await;
            return Err(err);
        }

        info!(author = %author.id, story = name, "story added");
        transport.send(&msg.channel, &text::added_story(name)).await
    }

    async fn story_remove<T: Transport>(
        &self,
        slot: &AuthorSlot,
        author: &mut Author,
        fields: &[&str],
        msg: &InboundMessage,
        transport: &T,
    ) -> Result<()> {
        if fields.len() < 3 {
            return transport.send(&msg.channel, text::NEED_STORY_NAME).await;
        }
        let name = fields[2];

        // A story can't be removed out from under its own live session.
        if slot
            .session
            .as_ref()
            .is_some_and(|session| session.story_name() == name)
        {
            return transport
                .send(&msg.channel, &text::story_in_session(name))
                .await;
        }

        if let Err(err) = author.remove_story(name) {
            return transport
                .send(&msg.channel, &text::invalid_story(&err))
                .await;
        }

        if let Err(err) = self.persist(author).await {
            let _ = transport.send(&msg.channel, text::UNKNOWN_ERROR).await;
            return Err(err);
        }

        info!(author = %author.id, story = name, "story removed");
        transport
            .send(&msg.channel, &text::removed_story(name))
            .await
    }

    async fn story_start<T: Transport>(
        &self,
        slot: &mut AuthorSlot,
        author: &Author,
        fields: &[&str],
        msg: &InboundMessage,
        transport: &T,
    ) -> Result<()> {
        if fields.len() < 3 {
            return transport.send(&msg.channel, text::NEED_STORY_NAME).await;
        }
        let name = fields[2];

        let Some(story) = author.story(name) else {
            let err = RegistryError::UnknownStory(name.to_string());
            return transport
                .send(&msg.channel, &text::invalid_story(&err))
                .await;
        };

        if let Some(live) = slot.session.as_ref() {
            return transport
                .send(&msg.channel, &text::session_already_active(live.story_name()))
                .await;
        }

        let Some(build) = story.build.as_deref() else {
            return transport
                .send(&msg.channel, &text::story_not_built(name))
                .await;
        };

        let mut session = match Session::materialize(name, build, self.settle) {
            Ok(session) => session,
            Err(err) => {
                let _ = transport
                    .send(&msg.channel, &text::start_failed(&err))
                    .await;
                return Err(anyhow::Error::new(err).context("materializing session"));
            }
        };

        if let Err(err) = session.start(&self.tools.frotz).await {
            let _ = transport
                .send(&msg.channel, &text::start_failed(&err))
                .await;
            return Err(anyhow::Error::new(err).context("starting interpreter"));
        }

        transport
            .send(
                &msg.channel,
                &text::started_session(name, &author.options.prefix),
            )
            .await?;

        // The interpreter's opening text is the first thing the author
        // sees.
        match session.output().await {
            Ok(opening) => transport.send(&msg.channel, &opening).await?,
            Err(err) => {
                session.close().await;
                let _ = transport
                    .send(&msg.channel, &text::start_failed(&err))
                    .await;
                return Err(anyhow::Error::new(err).context("reading interpreter opening"));
            }
        }

        info!(author = %author.id, story = name, "session started");
        slot.session = Some(session);
        Ok(())
    }

    async fn option_set<T: Transport>(
        &self,
        author: &mut Author,
        fields: &[&str],
        msg: &InboundMessage,
        transport: &T,
    ) -> Result<()> {
        if fields.len() < 4 {
            return transport
                .send(&msg.channel, text::NEED_OPTION_AND_VALUE)
                .await;
        }
        let (name, value) = (fields[2], fields[3]);

        if let Err(err) = author.set_option(name, value) {
            return transport
                .send(&msg.channel, &text::invalid_option(&err))
                .await;
        }

        if let Err(err) = self.persist(author).await {
            let _ = transport.send(&msg.channel, text::UNKNOWN_ERROR).await;
            return Err(err);
        }

        transport
            .send(&msg.channel, &text::set_option(name, value))
            .await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::compile::tests::{fake_tool, fake_toolchain};
    use crate::store::MemoryStore;

    const TEST_SETTLE: Duration = Duration::from_millis(200);

    /// Transport that records every send.
    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<(String, String)>>>);

    impl Recorder {
        async fn texts(&self) -> Vec<String> {
            self.0.lock().await.iter().map(|(_, t)| t.clone()).collect()
        }

        async fn last(&self) -> String {
            self.0
                .lock()
                .await
                .last()
                .map(|(_, t)| t.clone())
                .unwrap_or_default()
        }

        async fn clear(&self) {
            self.0.lock().await.clear();
        }
    }

    impl Transport for Recorder {
        async fn send(&self, channel: &str, text: &str) -> Result<()> {
            self.0
                .lock()
                .await
                .push((channel.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn msg(author: &str, body: &str) -> InboundMessage {
        InboundMessage {
            event_id: "ev-1".to_string(),
            author_id: author.to_string(),
            channel: "general".to_string(),
            text: body.to_string(),
        }
    }

    /// Router over a memory store and fake compilers, with the fake
    /// interpreter that echoes input lines back.
    fn test_router(dir: &std::path::Path) -> Router<MemoryStore> {
        let mut tools = fake_toolchain(dir);
        tools.frotz = fake_tool(
            dir,
            "dfrotz-echo",
            r#"printf 'West of House\n>'
while read -r line; do printf 'You typed: %s\n>' "$line"; done"#,
        );
        Router::new(MemoryStore::new(), tools, TEST_SETTLE)
    }

    /// Serve `body` for up to `hits` requests on a local port.
    fn serve_source(body: &'static str, hits: usize) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();

        std::thread::spawn(move || {
            for _ in 0..hits {
                let Ok(request) = server.recv() else { return };
                let _ = request.respond(tiny_http::Response::from_string(body));
            }
        });

        format!("http://127.0.0.1:{port}/story.ni")
    }

    async fn stored_author(router: &Router<MemoryStore>, id: &str) -> Option<Author> {
        let raw = router.store.get(&author_key(id)).await.unwrap()?;
        Some(serde_json::from_slice(&raw).unwrap())
    }

    #[tokio::test]
    async fn empty_author_id_gets_generic_error() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();

        router.handle(&msg("", "hello"), &recorder).await.unwrap();
        assert_eq!(recorder.texts().await, vec![text::UNKNOWN_ERROR]);
    }

    #[tokio::test]
    async fn first_contact_welcomes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();

        router.handle(&msg("alice", "hello"), &recorder).await.unwrap();

        let texts = recorder.texts().await;
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], text::WELCOME);
        assert!(texts[1].contains("don't understand"));

        let author = stored_author(&router, "alice").await.unwrap();
        assert_eq!(author.options.prefix, "?");
        assert!(author.stories.is_empty());

        // No second welcome.
        recorder.clear().await;
        router.handle(&msg("alice", "help"), &recorder).await.unwrap();
        assert_eq!(recorder.texts().await, vec![text::HELP]);
    }

    #[tokio::test]
    async fn story_add_needs_name_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();

        router
            .handle(&msg("alice", "story add onlyname"), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.last().await, text::NEED_NAME_AND_URL);

        let author = stored_author(&router, "alice").await.unwrap();
        assert!(author.stories.is_empty());
    }

    #[tokio::test]
    async fn story_add_rejects_bad_urls() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();

        router
            .handle(&msg("alice", "story add cave ftp://example.com/x"), &recorder)
            .await
            .unwrap();
        assert!(recorder.last().await.contains("http and https"));
    }

    #[tokio::test]
    async fn story_add_then_remove_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();
        let url = serve_source("\"Cave\" by Alice", 1);

        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.last().await, text::added_story("cave"));

        let author = stored_author(&router, "alice").await.unwrap();
        assert_eq!(author.stories.len(), 1);
        assert!(author.story("cave").unwrap().build.is_some());

        router
            .handle(&msg("alice", "story remove cave"), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.last().await, text::removed_story("cave"));
        let author = stored_author(&router, "alice").await.unwrap();
        assert!(author.stories.is_empty());

        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();
        assert!(recorder.last().await.contains("no story found"));
    }

    #[tokio::test]
    async fn failed_compile_keeps_previous_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut router = test_router(dir.path());
        let recorder = Recorder::default();

        let url = serve_source("\"Cave\" by Alice", 1);
        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();
        let before = stored_author(&router, "alice").await.unwrap();
        let good_build = before.story("cave").unwrap().build.clone().unwrap();

        // Break stage 1 and re-add: the reply carries diagnostics, the
        // handler reports the failure, and the stored build is untouched.
        router.tools.inform7 =
            fake_tool(dir.path(), "ni-broken", "echo 'Problem: nope' >&2; exit 1");
        let url = serve_source("garbage", 1);
        let result = router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await;
        assert!(result.is_err());
        assert!(recorder.last().await.contains("Problem: nope"));

        let after = stored_author(&router, "alice").await.unwrap();
        assert_eq!(after.story("cave").unwrap().build.as_ref(), Some(&good_build));
    }

    #[tokio::test]
    async fn option_set_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();

        router
            .handle(&msg("alice", "option set prefix !"), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.last().await, text::set_option("prefix", "!"));

        router.handle(&msg("alice", "option"), &recorder).await.unwrap();
        assert!(recorder.last().await.contains("'!'"));

        router
            .handle(&msg("alice", "option set color red"), &recorder)
            .await
            .unwrap();
        assert!(recorder.last().await.contains("unknown"));
    }

    #[tokio::test]
    async fn start_of_unbuilt_story_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();

        // Author with a story that has source but no successful build.
        let mut author = Author::new("alice");
        author.upsert_story("cave", b"source".to_vec()).unwrap();
        router.persist(&author).await.unwrap();

        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.last().await, text::story_not_built("cave"));

        // No session was created.
        let slot = router.slot("alice").await;
        assert!(slot.lock().await.session.is_none());
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();
        let url = serve_source("\"Cave\" by Alice", 1);

        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();

        recorder.clear().await;
        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();
        let texts = recorder.texts().await;
        assert!(texts[0].contains("is running"));
        assert_eq!(texts[1], "West of House");

        // Unprefixed text is gameplay.
        router.handle(&msg("alice", "go north"), &recorder).await.unwrap();
        assert_eq!(recorder.last().await, "You typed: go north");

        // Prefixed text is a meta-command again.
        router.handle(&msg("alice", "?story end"), &recorder).await.unwrap();
        assert_eq!(recorder.last().await, text::STOPPED_SESSION);

        router.handle(&msg("alice", "story end"), &recorder).await.unwrap();
        assert_eq!(recorder.last().await, text::NO_ACTIVE_SESSION);
    }

    #[tokio::test]
    async fn second_start_reports_active_session() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();
        let url = serve_source("\"Cave\" by Alice", 1);

        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();
        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();

        router
            .handle(&msg("alice", "?story start cave"), &recorder)
            .await
            .unwrap();
        assert_eq!(
            recorder.last().await,
            text::session_already_active("cave")
        );

        router.shutdown().await;
    }

    #[tokio::test]
    async fn racing_starts_leave_exactly_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();
        let url = serve_source("\"Cave\" by Alice", 1);

        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();

        // Two identical starts delivered concurrently. The per-author lock
        // serializes them; whichever runs second sees a live session and
        // its text is routed as gameplay input, not a second start.
        recorder.clear().await;
        let start = msg("alice", "story start cave");
        let (a, b) = tokio::join!(
            router.handle(&start, &recorder),
            router.handle(&start, &recorder),
        );
        a.unwrap();
        b.unwrap();

        let texts = recorder.texts().await;
        let started = texts.iter().filter(|t| t.contains("is running")).count();
        assert_eq!(started, 1);

        let slot = router.slot("alice").await;
        assert!(slot.lock().await.session.is_some());
        router.shutdown().await;
    }

    #[tokio::test]
    async fn remove_is_refused_while_story_is_running() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();
        let url = serve_source("\"Cave\" by Alice", 1);

        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();
        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();

        router
            .handle(&msg("alice", "?story remove cave"), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.last().await, text::story_in_session("cave"));

        let author = stored_author(&router, "alice").await.unwrap();
        assert!(author.story("cave").is_some());
        router.shutdown().await;
    }

    #[tokio::test]
    async fn changed_prefix_governs_session_routing() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();
        let url = serve_source("\"Cave\" by Alice", 1);

        router
            .handle(&msg("alice", "option set prefix !"), &recorder)
            .await
            .unwrap();
        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();
        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();

        // The old default prefix no longer marks meta-commands: this goes
        // to the story.
        router
            .handle(&msg("alice", "?story end"), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.last().await, "You typed: ?story end");

        router
            .handle(&msg("alice", "!story end"), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.last().await, text::STOPPED_SESSION);
    }

    #[tokio::test]
    async fn dead_interpreter_clears_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut router = test_router(dir.path());
        // Interpreter that dies after the first input line.
        router.tools.frotz = fake_tool(
            dir.path(),
            "dfrotz-dying",
            r#"printf 'Hi\n>'
read -r line
exit 0"#,
        );
        let recorder = Recorder::default();
        let url = serve_source("\"Cave\" by Alice", 1);

        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();
        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();

        // First gameplay input kills the fake; the router notices on this
        // or the following message and clears the session.
        router.handle(&msg("alice", "x"), &recorder).await.unwrap();
        if recorder.last().await != text::SESSION_DIED {
            router.handle(&msg("alice", "x"), &recorder).await.unwrap();
            assert_eq!(recorder.last().await, text::SESSION_DIED);
        }

        let slot = router.slot("alice").await;
        assert!(slot.lock().await.session.is_none());

        // The author is free to start again.
        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();
        assert!(recorder.last().await != text::NO_ACTIVE_SESSION);
    }

    #[tokio::test]
    async fn in_session_disabled_inputs_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());
        let recorder = Recorder::default();
        let url = serve_source("\"Cave\" by Alice", 1);

        router
            .handle(&msg("alice", &format!("story add cave {url}")), &recorder)
            .await
            .unwrap();
        router
            .handle(&msg("alice", "story start cave"), &recorder)
            .await
            .unwrap();

        router.handle(&msg("alice", "save"), &recorder).await.unwrap();
        assert!(recorder.last().await.contains("disabled"));

        router.handle(&msg("alice", "quit"), &recorder).await.unwrap();
        assert!(recorder.last().await.contains("disabled"));

        router.shutdown().await;
    }
}
