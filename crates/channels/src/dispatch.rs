//! Dispatcher: routes inbound channel messages to the session controller.
//!
//! Each requester gets a worker task with its own queue, so one requester's
//! messages are handled strictly in arrival order while different requesters
//! proceed concurrently. Workers live as long as the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use rollcall_core::channel::{ChannelMessage, InboundKind, OutboundDocument, OutboundMessage};
use rollcall_core::error::ChannelError;
use rollcall_core::outcome::SubmitOutcome;
use rollcall_core::session::RequesterId;
use rollcall_session::SessionController;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::registry::ChannelRegistry;
use crate::render;

/// One thing to send back to the chat a message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Message(OutboundMessage),
    Document(OutboundDocument),
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Reply::Message(OutboundMessage::text(text))
    }
}

/// Work out the replies for one inbound message, driving the controller.
pub async fn respond(controller: &SessionController, msg: &ChannelMessage) -> Vec<Reply> {
    let requester = msg.requester();
    match &msg.kind {
        InboundKind::Command { name, .. } => match name.as_str() {
            "start" => {
                controller.await_mode(&requester).await;
                vec![
                    Reply::text(render::welcome()),
                    Reply::Message(render::choose_mode()),
                ]
            }
            "help" => vec![Reply::text(render::help())],
            "status" => vec![Reply::Message(render::status(
                &controller.phase(&requester).await,
            ))],
            other => vec![Reply::text(render::unknown_command(other))],
        },
        InboundKind::ModeSelected { mode, .. } => {
            match controller.select_mode(&requester, *mode).await {
                Ok(outcome) => vec![Reply::text(render::mode_selected(&outcome))],
                Err(e) => vec![Reply::Message(render::error(&e))],
            }
        }
        InboundKind::Text { text } => match controller.submit_text(&requester, text).await {
            Ok(outcome) => submission_replies(&outcome),
            Err(e) => vec![Reply::Message(render::error(&e))],
        },
    }
}

fn submission_replies(outcome: &SubmitOutcome) -> Vec<Reply> {
    let mut replies = vec![Reply::text(render::submission(&outcome.result))];

    if outcome.exported {
        if let Some(path) = &outcome.artifact.path {
            replies.push(Reply::Document(OutboundDocument {
                path: path.clone(),
                file_name: render::ARTIFACT_FILE_NAME.into(),
                caption: Some(render::document_caption(outcome.result.updated.len())),
            }));
        }
    }
    if let Some(report) = render::report(&outcome.report) {
        replies.push(Reply::text(report));
    }
    replies.push(Reply::Message(render::next_step()));
    replies
}

async fn deliver(registry: &ChannelRegistry, msg: &ChannelMessage, replies: Vec<Reply>) {
    let channel = msg.channel_id.0.as_str();
    for reply in replies {
        let sent = match &reply {
            Reply::Message(message) => registry.send_to(channel, &msg.chat_id, message).await,
            Reply::Document(document) => {
                match registry.send_document_to(channel, &msg.chat_id, document).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        warn!(channel, chat_id = %msg.chat_id, error = %e, "Artifact delivery failed");
                        let notice = OutboundMessage::text(format!(
                            "⚠️ Sheet updated but couldn't send the file: {e}"
                        ));
                        registry.send_to(channel, &msg.chat_id, &notice).await
                    }
                }
            }
        };
        if let Err(e) = sent {
            warn!(channel, chat_id = %msg.chat_id, error = %e, "Reply delivery failed");
        }
    }
}

/// Handle one message end to end: acknowledge, respond, deliver.
async fn handle(controller: &SessionController, registry: &ChannelRegistry, msg: &ChannelMessage) {
    if let InboundKind::ModeSelected {
        callback_id: Some(callback_id),
        ..
    } = &msg.kind
    {
        if let Err(e) = registry.acknowledge_on(&msg.channel_id.0, callback_id).await {
            debug!(error = %e, "Callback acknowledgement failed");
        }
    }
    let replies = respond(controller, msg).await;
    deliver(registry, msg, replies).await;
}

pub struct Dispatcher {
    controller: Arc<SessionController>,
    registry: Arc<ChannelRegistry>,
    workers: Mutex<HashMap<RequesterId, mpsc::UnboundedSender<ChannelMessage>>>,
}

impl Dispatcher {
    pub fn new(controller: Arc<SessionController>, registry: Arc<ChannelRegistry>) -> Self {
        Self {
            controller,
            registry,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Consume the merged inbound stream until every channel has closed.
    pub async fn run(
        &self,
        mut inbound: mpsc::Receiver<(String, Result<ChannelMessage, ChannelError>)>,
    ) {
        while let Some((channel, msg)) = inbound.recv().await {
            match msg {
                Ok(msg) => self.route(msg).await,
                Err(ChannelError::Unauthorized { sender_id, .. }) => {
                    debug!(channel = %channel, sender = %sender_id, "Dropped message from blocked sender");
                }
                Err(e) => warn!(channel = %channel, error = %e, "Channel error"),
            }
        }
        info!("All channels closed, dispatcher stopping");
    }

    /// Queue a message on its requester's worker, spawning one if needed.
    pub async fn route(&self, msg: ChannelMessage) {
        let requester = msg.requester();
        let mut workers = self.workers.lock().await;

        let msg = match workers.get(&requester) {
            Some(tx) => match tx.send(msg) {
                Ok(()) => return,
                Err(mpsc::error::SendError(msg)) => msg,
            },
            None => msg,
        };

        let tx = self.spawn_worker(&requester);
        if tx.send(msg).is_err() {
            warn!(requester = %requester, "Worker exited before its first message");
        }
        workers.insert(requester, tx);
    }

    /// Number of requesters that currently have a worker.
    #[cfg(test)]
    async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    fn spawn_worker(&self, requester: &RequesterId) -> mpsc::UnboundedSender<ChannelMessage> {
        let (tx, mut rx) = mpsc::unbounded_channel::<ChannelMessage>();
        let controller = self.controller.clone();
        let registry = self.registry.clone();
        let requester = requester.clone();
        debug!(requester = %requester, "Spawning requester worker");

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                handle(&controller, &registry, &msg).await;
            }
            debug!(requester = %requester, "Requester worker finished");
        });
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rollcall_core::channel::{Channel, ChannelId};
    use rollcall_core::roster::{Roster, RosterSchema};
    use rollcall_core::session::SessionMode;
    use rollcall_core::sheet::Sheet;
    use rollcall_storage::{FileSnapshotArchive, InMemoryArchive, InMemoryRosterStore};
    use std::time::Duration;

    fn roster() -> Roster {
        let records = (1..=5)
            .map(|i| {
                vec![
                    format!("24037277559210{i:02}"),
                    format!("s{i}@x.edu"),
                    "PRESENT".to_string(),
                ]
            })
            .collect();
        let sheet = Sheet::new(
            vec![
                "Registration Id".into(),
                "Email Id".into(),
                "Attendance *".into(),
            ],
            records,
        );
        Roster::from_sheet(sheet, &RosterSchema::default()).unwrap()
    }

    fn controller() -> SessionController {
        SessionController::new(
            Arc::new(InMemoryRosterStore::new(roster())),
            Arc::new(InMemoryArchive::new()),
        )
    }

    fn message(kind: InboundKind) -> ChannelMessage {
        ChannelMessage {
            channel_id: ChannelId("test".into()),
            sender_id: "42".into(),
            sender_name: None,
            chat_id: "chat-42".into(),
            kind,
        }
    }

    fn text(t: &str) -> ChannelMessage {
        message(InboundKind::Text { text: t.into() })
    }

    fn select(mode: SessionMode) -> ChannelMessage {
        message(InboundKind::ModeSelected {
            mode,
            callback_id: Some("cb-1".into()),
        })
    }

    fn texts(replies: &[Reply]) -> Vec<String> {
        replies
            .iter()
            .filter_map(|r| match r {
                Reply::Message(m) => Some(m.text.clone()),
                Reply::Document(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn start_prompts_for_mode() {
        let ctl = controller();
        let replies = respond(
            &ctl,
            &message(InboundKind::Command {
                name: "start".into(),
                args: String::new(),
            }),
        )
        .await;
        assert_eq!(replies.len(), 2);
        assert!(matches!(&replies[1], Reply::Message(m) if m.offer_modes));
    }

    #[tokio::test]
    async fn text_without_session_asks_for_mode() {
        let replies = respond(&controller(), &text("1")).await;
        assert_eq!(replies.len(), 1);
        assert!(matches!(&replies[0], Reply::Message(m) if m.offer_modes && m.text.contains("session mode")));
    }

    #[tokio::test]
    async fn submission_sends_summary_report_and_next_prompt() {
        let ctl = controller();
        respond(&ctl, &select(SessionMode::New)).await;
        let replies = respond(&ctl, &text("3,1")).await;

        let texts = texts(&replies);
        assert_eq!(texts.len(), 3);
        assert!(texts[0].starts_with("✅ Marked 2 student(s)"));
        assert!(texts[1].ends_with("ABSENTEES:\n\n01-s1\n03-s3\n"));
        assert_eq!(texts[2], "What would you like to do next?");
        // in-memory artifacts have no file to send
        assert!(!replies.iter().any(|r| matches!(r, Reply::Document(_))));
    }

    #[tokio::test]
    async fn file_artifacts_are_sent_as_documents() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = SessionController::new(
            Arc::new(InMemoryRosterStore::new(roster())),
            Arc::new(FileSnapshotArchive::new(dir.path(), "attendance", 5)),
        );
        respond(&ctl, &select(SessionMode::New)).await;

        let replies = respond(&ctl, &text("2")).await;
        let Some(Reply::Document(doc)) = replies.get(1) else {
            panic!("expected a document, got {replies:?}");
        };
        assert_eq!(doc.file_name, "Updated_Attendance.csv");
        assert!(doc.path.exists());
        assert!(doc.caption.as_deref().unwrap().contains("1 student(s)"));

        // nothing changed: no document the second time
        let replies = respond(&ctl, &text("2")).await;
        assert!(!replies.iter().any(|r| matches!(r, Reply::Document(_))));
    }

    #[tokio::test]
    async fn status_reflects_session() {
        let ctl = controller();
        let status = message(InboundKind::Command {
            name: "status".into(),
            args: String::new(),
        });
        assert!(matches!(&respond(&ctl, &status).await[0], Reply::Message(m) if m.offer_modes));

        respond(&ctl, &select(SessionMode::New)).await;
        respond(&ctl, &text("1,2")).await;
        let replies = respond(&ctl, &status).await;
        assert!(texts(&replies)[0].contains("Absent: 2 of 5"));
    }

    #[tokio::test]
    async fn unknown_command_points_to_help() {
        let replies = respond(
            &controller(),
            &message(InboundKind::Command {
                name: "frobnicate".into(),
                args: String::new(),
            }),
        )
        .await;
        assert!(texts(&replies)[0].contains("/help"));
    }

    /// Channel recording everything sent through it.
    struct Recorder {
        id: ChannelId,
        log: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Channel for Recorder {
        fn name(&self) -> &str {
            "test"
        }

        fn id(&self) -> &ChannelId {
            &self.id
        }

        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }

        async fn send(&self, chat_id: &str, message: &OutboundMessage) -> Result<(), ChannelError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{chat_id}|{}", message.text));
            Ok(())
        }

        async fn send_document(
            &self,
            _chat_id: &str,
            _document: &OutboundDocument,
        ) -> Result<(), ChannelError> {
            Err(ChannelError::DeliveryFailed {
                channel: "test".into(),
                reason: "too large".into(),
            })
        }

        async fn acknowledge(&self, callback_id: &str) -> Result<(), ChannelError> {
            self.log.lock().unwrap().push(format!("ack|{callback_id}"));
            Ok(())
        }

        fn is_allowed(&self, _sender_id: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn dispatcher_acks_orders_and_reports_delivery_failures() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder {
            id: ChannelId("test".into()),
            log: std::sync::Mutex::new(Vec::new()),
        });
        let mut registry = ChannelRegistry::new();
        registry.register(recorder.clone());
        let controller = Arc::new(SessionController::new(
            Arc::new(InMemoryRosterStore::new(roster())),
            Arc::new(FileSnapshotArchive::new(dir.path(), "attendance", 5)),
        ));
        let dispatcher = Arc::new(Dispatcher::new(controller.clone(), Arc::new(registry)));

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.run(rx).await }
        });
        tx.send(("test".into(), Ok(select(SessionMode::New)))).await.unwrap();
        tx.send(("test".into(), Ok(text("4")))).await.unwrap();
        tx.send(("test".into(), Ok(text("4")))).await.unwrap();
        drop(tx);
        runner.await.unwrap();

        // wait for the worker to drain its queue
        let requester = RequesterId::scoped("test", "42");
        for _ in 0..100 {
            if recorder.log.lock().unwrap().len() >= 9 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(log[0], "ack|cb-1");
        assert!(log[1].contains("New Absent mode"));
        assert!(log[2].contains("Marked 1 student(s)"));
        assert!(log[3].contains("couldn't send the file: "));
        assert!(log.iter().any(|l| l.contains("Already absent")));
        assert_eq!(dispatcher.worker_count().await, 1);
        assert!(matches!(
            controller.phase(&requester).await,
            rollcall_core::session::SessionPhase::Active { absent: 1, .. }
        ));
    }
}
