//! Flood-control scheduler.
//!
//! Every outgoing line costs a weight taken from a token budget. Lines are
//! written straight away while the budget is positive and queued otherwise;
//! a one-second [`tick`](FloodScheduler::tick) replenishes the budget, drains
//! the NORMAL queue before the LOW queue, and promotes delayed lines whose
//! release time has come.

use crate::config::FloodConfig;
use crate::engine::handler::Handler;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Bypasses pacing entirely. Reserved for disconnect-time messages.
    High,
    Normal,
    /// Served only when nothing NORMAL is waiting.
    Low,
}

/// Where transmitted lines go. Receives the handler attached to the line,
/// which becomes active from that moment on.
pub trait Transmit {
    fn transmit(&mut self, line: &str, handler: Option<Handler>);
}

/// One serialized line on its way out. `command` picks the weight class.
#[derive(Debug)]
pub struct Outgoing<'a> {
    pub command: &'a str,
    pub line: String,
    pub priority: Priority,
    /// Activated when the line is actually written.
    pub handler: Option<Handler>,
    pub delay_secs: u32,
}

impl<'a> Outgoing<'a> {
    pub fn new(command: &'a str, line: impl Into<String>, priority: Priority) -> Self {
        Self {
            command,
            line: line.into(),
            priority,
            handler: None,
            delay_secs: 0,
        }
    }

    pub fn with_handler(mut self, handler: Option<Handler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn delayed(mut self, delay_secs: u32) -> Self {
        self.delay_secs = delay_secs;
        self
    }
}

/// A line waiting for budget or for its release time.
#[derive(Debug)]
struct QueuedMessage {
    line: String,
    weight: i32,
    priority: Priority,
    handler: Option<Handler>,
    release_at: Option<Instant>,
}

/// Queue allocation failed. The handler that was meant to ride along is
/// handed back untouched.
#[derive(Debug)]
pub struct QueueFull {
    pub handler: Option<Handler>,
}

pub struct FloodScheduler {
    config: FloodConfig,
    budget: i32,
    normal: VecDeque<QueuedMessage>,
    low: VecDeque<QueuedMessage>,
    delayed: Vec<QueuedMessage>,
    armed: bool,
}

impl FloodScheduler {
    pub fn new(config: FloodConfig) -> Self {
        Self {
            budget: config.max_budget,
            config,
            normal: VecDeque::new(),
            low: VecDeque::new(),
            delayed: Vec::new(),
            armed: false,
        }
    }

    pub fn budget(&self) -> i32 {
        self.budget
    }

    pub fn config(&self) -> &FloodConfig {
        &self.config
    }

    /// Lines waiting in the NORMAL, LOW and delayed queues together.
    pub fn queued(&self) -> usize {
        self.normal.len() + self.low.len() + self.delayed.len()
    }

    pub fn queued_delayed(&self) -> usize {
        self.delayed.len()
    }

    /// The tick timer is created on first use and stays alive afterwards.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn allowed(&self) -> bool {
        self.budget > 0
    }

    /// `1 + len / bytes_per_weight + class`, where the class depends on
    /// how expensive the command is for the server.
    pub fn weight(&self, command: &str, byte_len: usize) -> i32 {
        let cfg = &self.config;
        let class = match command {
            "PRIVMSG" | "NOTICE" => cfg.chat_weight,
            "TOPIC" | "KICK" | "MODE" | "ISON" | "WHO" => cfg.query_weight,
            "WHOIS" => cfg.whois_weight,
            _ => cfg.default_weight,
        };
        let by_length = i32::try_from(byte_len / cfg.bytes_per_weight.max(1)).unwrap_or(i32::MAX);
        1i32.saturating_add(by_length).saturating_add(class)
    }

    /// Transmit `line` now if the budget allows (or the priority is HIGH)
    /// and no delay was asked for; queue it otherwise.
    pub fn send(
        &mut self,
        outgoing: Outgoing<'_>,
        now: Instant,
        sink: &mut dyn Transmit,
    ) -> Result<(), QueueFull> {
        let Outgoing {
            command,
            line,
            priority,
            handler,
            delay_secs,
        } = outgoing;
        self.armed = true;
        let weight = self.weight(command, line.len());

        if (self.allowed() && delay_secs == 0) || priority == Priority::High {
            self.transmit(line, weight, handler, sink);
            return Ok(());
        }

        let release_at = (delay_secs > 0).then(|| now + Duration::from_secs(u64::from(delay_secs)));
        debug!(
            command,
            weight,
            budget = self.budget,
            ?priority,
            delay_secs,
            "queueing outgoing line"
        );
        self.enqueue(QueuedMessage {
            line,
            weight,
            priority,
            handler,
            release_at,
        })
    }

    fn enqueue(&mut self, message: QueuedMessage) -> Result<(), QueueFull> {
        if message.release_at.is_some() {
            if self.delayed.try_reserve(1).is_err() {
                return Err(QueueFull {
                    handler: message.handler,
                });
            }
            self.delayed.push(message);
            return Ok(());
        }

        let queue = match message.priority {
            Priority::Low => &mut self.low,
            Priority::High | Priority::Normal => &mut self.normal,
        };
        if queue.try_reserve(1).is_err() {
            return Err(QueueFull {
                handler: message.handler,
            });
        }
        queue.push_back(message);
        Ok(())
    }

    fn transmit(&mut self, line: String, weight: i32, handler: Option<Handler>, sink: &mut dyn Transmit) {
        sink.transmit(&line, handler);
        self.budget -= weight;
        trace!(weight, budget = self.budget, "line transmitted");
    }

    /// One-second timer callback.
    pub fn tick(&mut self, now: Instant, sink: &mut dyn Transmit) {
        if !self.armed {
            return;
        }

        if self.budget < self.config.max_budget {
            self.budget = (self.budget + self.config.replenish_per_tick).min(self.config.max_budget);
        }

        while self.allowed() {
            let Some(message) = self.normal.pop_front().or_else(|| self.low.pop_front()) else {
                break;
            };
            self.transmit(message.line, message.weight, message.handler, sink);
        }

        // Rescan from the start after every promotion.
        while let Some(index) = self
            .delayed
            .iter()
            .position(|m| m.release_at.is_some_and(|at| now >= at))
        {
            let mut message = self.delayed.remove(index);
            message.release_at = None;
            if let Err(full) = self.enqueue(message) {
                // Dropping the handler is all that can be done here.
                debug!(handler = ?full.handler, "could not promote delayed line");
                break;
            }
        }
    }

    /// Connection teardown: drop everything queued (and the handlers riding
    /// along) and start over with a full budget.
    pub fn reset(&mut self) {
        self.normal.clear();
        self.low.clear();
        self.delayed.clear();
        self.budget = self.config.max_budget;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::handler::{HandlerContext, ReplyHandler};
    use crate::irc::Message;

    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
        handlers: Vec<&'static str>,
    }

    impl Transmit for Recorder {
        fn transmit(&mut self, line: &str, handler: Option<Handler>) {
            self.lines.push(line.to_string());
            if let Some(handler) = handler {
                self.handlers.push(handler.name());
            }
        }
    }

    struct Named(&'static str);

    impl ReplyHandler for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn handle_reply(&mut self, _: &mut HandlerContext<'_>, _: &Message, _: u16) -> bool {
            false
        }
    }

    fn config(max_budget: i32) -> FloodConfig {
        FloodConfig {
            max_budget,
            ..FloodConfig::default()
        }
    }

    fn send(
        s: &mut FloodScheduler,
        line: &str,
        priority: Priority,
        delay: u32,
        now: Instant,
        rec: &mut Recorder,
    ) {
        let command = line.split(' ').next().unwrap();
        s.send(Outgoing::new(command, line, priority).delayed(delay), now, rec)
            .unwrap();
    }

    #[test]
    fn test_budget_overflow_waits_for_tick() {
        for budget in [10, 3, 7] {
            let mut s = FloodScheduler::new(config(budget));
            let mut rec = Recorder::default();
            let t0 = Instant::now();

            for i in 0..=budget {
                send(&mut s, &format!("PRIVMSG #c m{i}"), Priority::Normal, 0, t0, &mut rec);
            }
            assert_eq!(rec.lines.len(), budget as usize);
            assert_eq!(s.budget(), 0);
            assert_eq!(s.queued(), 1);

            s.tick(t0 + Duration::from_secs(1), &mut rec);
            assert_eq!(rec.lines.len(), budget as usize + 1);
            assert_eq!(rec.lines.last().unwrap(), &format!("PRIVMSG #c m{budget}"));
            assert_eq!(s.budget(), 0);
        }
    }

    #[test]
    fn test_fifo_within_priority_and_normal_before_low() {
        let mut s = FloodScheduler::new(config(1));
        let mut rec = Recorder::default();
        let t0 = Instant::now();

        send(&mut s, "PRIVMSG #c first", Priority::Normal, 0, t0, &mut rec);
        send(&mut s, "PRIVMSG #c low1", Priority::Low, 0, t0, &mut rec);
        send(&mut s, "PRIVMSG #c normal1", Priority::Normal, 0, t0, &mut rec);
        send(&mut s, "PRIVMSG #c low2", Priority::Low, 0, t0, &mut rec);
        send(&mut s, "PRIVMSG #c normal2", Priority::Normal, 0, t0, &mut rec);
        assert_eq!(rec.lines, ["PRIVMSG #c first"]);

        for second in 1..=4 {
            s.tick(t0 + Duration::from_secs(second), &mut rec);
        }
        assert_eq!(
            rec.lines,
            [
                "PRIVMSG #c first",
                "PRIVMSG #c normal1",
                "PRIVMSG #c normal2",
                "PRIVMSG #c low1",
                "PRIVMSG #c low2",
            ]
        );
    }

    #[test]
    fn test_high_priority_preempts_queue() {
        let mut s = FloodScheduler::new(config(2));
        let mut rec = Recorder::default();
        let t0 = Instant::now();

        send(&mut s, "PRIVMSG #c a", Priority::Normal, 0, t0, &mut rec);
        send(&mut s, "PRIVMSG #c b", Priority::Normal, 0, t0, &mut rec);
        send(&mut s, "PRIVMSG #c queued", Priority::Normal, 0, t0, &mut rec);
        assert_eq!(s.queued(), 1);

        send(&mut s, "QUIT :bye", Priority::High, 0, t0, &mut rec);
        assert_eq!(rec.lines.last().unwrap(), "QUIT :bye");
        assert_eq!(s.queued(), 1);
        // QUIT weighs 2 (default class), so the budget went negative.
        assert_eq!(s.budget(), -2);

        s.tick(t0 + Duration::from_secs(1), &mut rec);
        assert_eq!(rec.lines.len(), 3);
        s.tick(t0 + Duration::from_secs(2), &mut rec);
        s.tick(t0 + Duration::from_secs(3), &mut rec);
        assert_eq!(rec.lines.last().unwrap(), "PRIVMSG #c queued");
    }

    #[test]
    fn test_delayed_line_is_promoted_after_release_time() {
        let mut s = FloodScheduler::new(config(10));
        let mut rec = Recorder::default();
        let t0 = Instant::now();

        send(&mut s, "LIST", Priority::Normal, 5, t0, &mut rec);
        assert!(rec.lines.is_empty());
        assert_eq!(s.queued_delayed(), 1);

        s.tick(t0 + Duration::from_secs(4), &mut rec);
        assert_eq!(s.queued_delayed(), 1);

        s.tick(t0 + Duration::from_secs(5), &mut rec);
        assert_eq!(s.queued_delayed(), 0);
        assert_eq!(s.queued(), 1);

        s.tick(t0 + Duration::from_secs(6), &mut rec);
        assert_eq!(rec.lines, ["LIST"]);
    }

    #[test]
    fn test_delayed_lines_keep_their_priority() {
        let mut s = FloodScheduler::new(config(1));
        let mut rec = Recorder::default();
        let t0 = Instant::now();

        send(&mut s, "PRIVMSG #c x", Priority::Normal, 0, t0, &mut rec);
        send(&mut s, "ISON alice", Priority::Low, 1, t0, &mut rec);
        send(&mut s, "PRIVMSG #c y", Priority::Normal, 1, t0, &mut rec);

        // Promotion happens after draining, so both wait one more tick.
        s.tick(t0 + Duration::from_secs(1), &mut rec);
        assert_eq!(rec.lines.len(), 1);
        s.tick(t0 + Duration::from_secs(2), &mut rec);
        assert_eq!(rec.lines.last().unwrap(), "PRIVMSG #c y");
        for second in 3..=6 {
            s.tick(t0 + Duration::from_secs(second), &mut rec);
        }
        assert_eq!(rec.lines.last().unwrap(), "ISON alice");
    }

    #[test]
    fn test_weight_classes() {
        let s = FloodScheduler::new(FloodConfig::default());
        assert_eq!(s.weight("PRIVMSG", 20), 1);
        assert_eq!(s.weight("NOTICE", 250), 3);
        assert_eq!(s.weight("MODE", 20), 3);
        assert_eq!(s.weight("ISON", 20), 3);
        assert_eq!(s.weight("WHOIS", 20), 4);
        assert_eq!(s.weight("JOIN", 20), 2);

        let custom = FloodScheduler::new(FloodConfig {
            bytes_per_weight: 10,
            whois_weight: 0,
            ..FloodConfig::default()
        });
        assert_eq!(custom.weight("WHOIS", 25), 3);
    }

    #[test]
    fn test_handler_rides_with_queued_line() {
        let mut s = FloodScheduler::new(config(1));
        let mut rec = Recorder::default();
        let t0 = Instant::now();

        send(&mut s, "PRIVMSG #c fill", Priority::Normal, 0, t0, &mut rec);
        let who = Outgoing::new("WHO", "WHO alice", Priority::Normal)
            .with_handler(Some(Handler::reply(Named("who"))));
        s.send(who, t0, &mut rec).unwrap();
        assert!(rec.handlers.is_empty());

        s.tick(t0 + Duration::from_secs(1), &mut rec);
        assert_eq!(rec.handlers, ["who"]);
    }

    #[test]
    fn test_tick_is_idle_until_first_send() {
        let mut s = FloodScheduler::new(config(3));
        let mut rec = Recorder::default();
        s.tick(Instant::now(), &mut rec);
        assert!(!s.is_armed());
        assert_eq!(s.budget(), 3);
    }

    #[test]
    fn test_reset_drops_queues() {
        let mut s = FloodScheduler::new(config(1));
        let mut rec = Recorder::default();
        let t0 = Instant::now();
        send(&mut s, "PRIVMSG #c a", Priority::Normal, 0, t0, &mut rec);
        send(&mut s, "PRIVMSG #c b", Priority::Low, 0, t0, &mut rec);
        send(&mut s, "PRIVMSG #c c", Priority::Normal, 9, t0, &mut rec);
        assert_eq!(s.queued(), 2);

        s.reset();
        assert_eq!(s.queued(), 0);
        assert_eq!(s.budget(), 1);
    }
}
