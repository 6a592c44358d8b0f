use log::{debug, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::actions::ActionCatalog;
use crate::config::BotConfig;
use crate::constants::NICK_ORDINAL_WIDTH;
use crate::controller::ServerController;
use crate::correlation::nick_predicate;
use crate::errors::SampleError;
use crate::sample::SampleResult;
use crate::template::{PendingLine, TemplateParams, render};
use crate::types::{ChannelName, Nickname};

/// `<prefix><ordinal>` with the ordinal zero-filled to a fixed width, so that nicks
/// sharing a prefix all have the same length and none is a prefix of another.
/// `None` once the ordinal no longer fits.
pub fn padded_nick(prefix: &str, ordinal: u32) -> Option<Nickname> {
    let width = NICK_ORDINAL_WIDTH;
    let nick = format!("{prefix}{ordinal:0width$}");
    (nick.len() == prefix.len() + width).then_some(Nickname(nick))
}

/// Cyclic list of action lines, fixed when built. Lines still need their channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionQueue {
    lines: Vec<PendingLine>,
    position: usize,
}

impl ActionQueue {
    /// Renders every enabled category, shuffles the categories and flattens their lines.
    pub fn build<R: Rng + ?Sized>(
        catalog: &ActionCatalog,
        params: &TemplateParams,
        rng: &mut R,
    ) -> Result<Self, SampleError> {
        let mut categories: Vec<Vec<PendingLine>> = catalog
            .templates()
            .iter()
            .map(|template| {
                template
                    .lines
                    .iter()
                    .map(|line| render(line, params))
                    .collect()
            })
            .collect();
        categories.shuffle(rng);
        let lines: Vec<PendingLine> = categories.into_iter().flatten().collect();
        if lines.is_empty() {
            return Err(SampleError::EmptyActionQueue);
        }
        Ok(ActionQueue { lines, position: 0 })
    }

    /// Current line; the cursor then moves one step, wrapping at the end.
    pub fn next_line(&mut self) -> &PendingLine {
        let index = self.position;
        self.position = (self.position + 1) % self.lines.len();
        &self.lines[index]
    }

    pub fn lines(&self) -> &[PendingLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug)]
struct Session {
    nick: Nickname,
    queue: ActionQueue,
}

#[derive(Debug)]
enum Phase {
    Uninitialized,
    Ready(Session),
    Closed,
}

/// One simulated bot. Each `sample` sends the next queued action to one of the connected
/// clients, in turn, and waits for a line mentioning the bot's nick.
#[derive(Debug)]
pub struct VirtualUser {
    controller: ServerController,
    bot: BotConfig,
    catalog: Arc<ActionCatalog>,
    ordinal: u32,
    rng: StdRng,
    phase: Phase,
}

impl VirtualUser {
    pub fn new(
        controller: ServerController,
        bot: BotConfig,
        catalog: Arc<ActionCatalog>,
        ordinal: u32,
    ) -> Self {
        VirtualUser {
            controller,
            bot,
            catalog,
            ordinal,
            rng: StdRng::from_entropy(),
            phase: Phase::Uninitialized,
        }
    }

    /// Fixes the shuffle and channel rolls, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn nick(&self) -> Option<&Nickname> {
        match &self.phase {
            Phase::Ready(session) => Some(&session.nick),
            _ => None,
        }
    }

    pub fn queue(&self) -> Option<&ActionQueue> {
        match &self.phase {
            Phase::Ready(session) => Some(&session.queue),
            _ => None,
        }
    }

    fn label(&self) -> String {
        match self.nick() {
            Some(nick) => nick.to_string(),
            None => format!("{}#{}", self.bot.prefix, self.ordinal),
        }
    }

    /// Runs one invocation. Never fails: errors end up in the result.
    pub async fn sample(&mut self) -> SampleResult {
        let mut result = SampleResult::new(self.label());
        match self.run_sample(&mut result).await {
            Ok(reply) => result.set_success(reply),
            Err(e) => {
                debug!("{} sample failed: {e}", result.label);
                result.set_failure(&e);
            }
        }
        result.sample_end();
        result
    }

    async fn run_sample(&mut self, result: &mut SampleResult) -> Result<String, SampleError> {
        let server = self
            .controller
            .current()
            .await
            .ok_or(SampleError::NoServer)?;
        if !server.is_listening() {
            return Err(SampleError::ServerNotListening);
        }
        if server.active_connection_count() == 0 {
            return Err(SampleError::NoConnectedClient);
        }
        if self.bot.prefix.trim().is_empty() {
            return Err(SampleError::MissingBotPrefix);
        }

        let (nick, pending_line) = {
            let session = self.session()?;
            (session.nick.clone(), session.queue.next_line().clone())
        };
        let line = if pending_line.needs_channel() {
            pending_line.with_channel(&self.roll_channel().0)
        } else {
            pending_line.to_string()
        };
        result.label = nick.to_string();
        result.request_text = line.clone();

        let pending = server.wait_for(&nick.0, nick_predicate(&nick.0));
        result.sample_start();
        let Some(client) = server.send_to_next_client(&line).await else {
            return Err(SampleError::NoConnectedClient);
        };
        trace!("{nick} sent {line} to client #{client}, awaiting reply");
        let reply = pending.wait(self.bot.reply_timeout()).await?;
        result.sample_end();
        Ok(reply)
    }

    /// Builds the nick and the queue on first use.
    fn session(&mut self) -> Result<&mut Session, SampleError> {
        if let Phase::Uninitialized = self.phase {
            if self.bot.channels == 0 {
                return Err(SampleError::InvalidConfig(
                    "at least one channel is required".to_owned(),
                ));
            }
            let nick = padded_nick(&self.bot.prefix, self.ordinal).ok_or_else(|| {
                SampleError::InvalidConfig(format!("virtual user #{} out of range", self.ordinal))
            })?;
            let params = TemplateParams::new(&nick.0, &self.bot.target_nick, &self.bot.command);
            let queue = ActionQueue::build(&self.catalog, &params, &mut self.rng)?;
            debug!("{nick} ready with {} queued actions", queue.len());
            self.phase = Phase::Ready(Session { nick, queue });
        }
        match &mut self.phase {
            Phase::Ready(session) => Ok(session),
            Phase::Uninitialized | Phase::Closed => Err(SampleError::Cancelled),
        }
    }

    fn roll_channel(&mut self) -> ChannelName {
        let number = self.rng.gen_range(0..self.bot.channels.max(1));
        ChannelName(format!("{}{number}", self.bot.channel_prefix))
    }

    /// Drops the queue and any waiter still registered for this user. Later samples fail.
    pub async fn teardown(&mut self) {
        if let Phase::Ready(session) = &self.phase {
            if let Some(server) = self.controller.current().await {
                server.correlation().clear_owner(&session.nick.0);
            }
        }
        self.phase = Phase::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionCategory;
    use crate::template::unresolved_placeholders;

    #[test]
    fn test_padded_nick_is_fixed_width() {
        assert_eq!(padded_nick("vu", 0).unwrap().0, "vu0000000");
        assert_eq!(padded_nick("jmeterBot", 1).unwrap().0, "jmeterBot0000001");
        assert_eq!(padded_nick("jmeterBot", 10).unwrap().0, "jmeterBot0000010");
        assert!(padded_nick("vu", 10_000_000).is_none());

        let one = padded_nick("vu", 1).unwrap().0;
        let ten = padded_nick("vu", 10).unwrap().0;
        assert!(!ten.starts_with(&one) && !one.starts_with(&ten));
    }

    #[test]
    fn test_queue_cycles_in_fixed_order() {
        let catalog = ActionCatalog::only(&[
            ActionCategory::ChannelMessage,
            ActionCategory::OperatorOp,
            ActionCategory::UserQuit,
            ActionCategory::PmAction,
        ]);
        let params = TemplateParams::new("vu0000003", "target", "?jmeter");
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = ActionQueue::build(&catalog, &params, &mut rng).unwrap();
        let n = catalog.line_count();
        assert_eq!(queue.len(), n);

        let visited: Vec<PendingLine> = (0..n).map(|_| queue.next_line().clone()).collect();
        assert_eq!(visited, queue.lines().to_vec());
        let mut sorted = visited.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), n, "each line exactly once");
        assert_eq!(queue.next_line(), &visited[0]);

        // lines of a category stay together and in template order
        let texts: Vec<String> = visited.iter().map(|l| l.with_channel("#c")).collect();
        let op = texts.iter().position(|l| l.contains(" +o ")).unwrap();
        assert!(texts[op + 1].contains(" -o "));
    }

    #[test]
    fn test_queue_lines_keep_only_channel_placeholder() {
        let catalog = ActionCatalog::from_config(&crate::config::ActionsConfig::default());
        let params = TemplateParams::new("vu0000000", "target", "?jmeter");
        let queue = ActionQueue::build(&catalog, &params, &mut StdRng::seed_from_u64(1)).unwrap();
        for line in queue.lines() {
            let sent = line.with_channel("#jmeter0");
            assert!(unresolved_placeholders(&sent).is_empty(), "{sent}");
        }
    }

    #[test]
    fn test_empty_catalog_cannot_build_queue() {
        let params = TemplateParams::new("vu0000000", "", "");
        assert!(matches!(
            ActionQueue::build(&ActionCatalog::default(), &params, &mut StdRng::seed_from_u64(1)),
            Err(SampleError::EmptyActionQueue)
        ));
    }

    #[test]
    fn test_channel_roll_stays_in_range() {
        let bot = BotConfig {
            channel_prefix: "#t".to_owned(),
            channels: 3,
            ..BotConfig::default()
        };
        let mut user = VirtualUser::new(
            ServerController::new(),
            bot,
            Arc::new(ActionCatalog::default()),
            0,
        )
        .with_seed(42);
        for _ in 0..100 {
            let channel = user.roll_channel();
            assert!(["#t0", "#t1", "#t2"].contains(&channel.0.as_str()), "{channel}");
        }
    }

    #[tokio::test]
    async fn test_sample_without_server_fails() {
        let mut user = VirtualUser::new(
            ServerController::new(),
            BotConfig::default(),
            Arc::new(ActionCatalog::only(&[ActionCategory::ChannelMessage])),
            0,
        );
        let result = user.sample().await;
        assert!(!result.success);
        assert_eq!(
            result.error_text.as_deref(),
            Some("IRC server has not been started")
        );
        assert!(user.nick().is_none(), "no session before preconditions hold");
    }
}
